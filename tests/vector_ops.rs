//! Test lane operations: swizzles, shuffles, masks, packing and widening.
//!
//! The four-lane selects are checked exhaustively in a single routine per
//! operation; the eight- and sixteen-lane swizzles are sampled with proptest.
//! The 64-bit packs are checked for their lane results and for touching only
//! eight bytes of memory.

use proptest::prelude::*;
use reactor::{
    Byte16, Byte8, Config, Float2, Function, Int, Int2, Int4, Pointer, Short4, Short8, UInt4, ULong2, UShort4,
    UShort8,
};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Lane `i` of a four-lane select: nibble `3 - i`, `bits` wide.
fn select_lane(select: u16, i: usize, bits: u16) -> usize {
    ((select >> (12 - 4 * i)) & ((1 << bits) - 1)) as usize
}

type Int4Out = unsafe extern "C" fn(*mut i32, *const i32, *const i32);

#[test]
fn test_all_four_lane_swizzles() {
    init_logging();
    let selects: Vec<u16> = (0..256u16)
        .map(|s| ((s >> 6) & 3) << 12 | ((s >> 4) & 3) << 8 | ((s >> 2) & 3) << 4 | (s & 3))
        .collect();

    let f = Function::<Int4Out>::with_config(Config::default()).unwrap();
    let out = f.arg::<Pointer<Int4>>(0).rvalue();
    let v = f.arg::<Pointer<Int4>>(1).rvalue().load();
    for (i, &select) in selects.iter().enumerate() {
        out.element(i as i32).store(v.swizzle(select));
    }
    f.ret_void();
    let routine = f.finalize("swizzles").unwrap();

    let input = [10, 11, 12, 13];
    let mut out = vec![0i32; 4 * selects.len()];
    unsafe { routine.function()(out.as_mut_ptr(), input.as_ptr(), std::ptr::null()) };

    for (i, &select) in selects.iter().enumerate() {
        let expected: Vec<i32> = (0..4).map(|lane| input[select_lane(select, lane, 2)]).collect();
        assert_eq!(&out[4 * i..4 * i + 4], &expected[..], "swizzle {select:#06x}");
    }
}

#[test]
fn test_all_four_lane_shuffles() {
    init_logging();
    let selects: Vec<u16> = (0..4096u16)
        .map(|s| ((s >> 9) & 7) << 12 | ((s >> 6) & 7) << 8 | ((s >> 3) & 7) << 4 | (s & 7))
        .collect();

    let f = Function::<Int4Out>::with_config(Config::default()).unwrap();
    let out = f.arg::<Pointer<Int4>>(0).rvalue();
    let a = f.arg::<Pointer<Int4>>(1).rvalue().load();
    let b = f.arg::<Pointer<Int4>>(2).rvalue().load();
    for (i, &select) in selects.iter().enumerate() {
        out.element(i as i32).store(a.shuffle(b, select));
    }
    f.ret_void();
    let routine = f.finalize("shuffles").unwrap();

    let lhs = [1, 2, 3, 4];
    let rhs = [-1, -2, -3, -4];
    let both = [lhs, rhs].concat();
    let mut out = vec![0i32; 4 * selects.len()];
    unsafe { routine.function()(out.as_mut_ptr(), lhs.as_ptr(), rhs.as_ptr()) };

    for (i, &select) in selects.iter().enumerate() {
        let expected: Vec<i32> = (0..4).map(|lane| both[select_lane(select, lane, 3)]).collect();
        assert_eq!(&out[4 * i..4 * i + 4], &expected[..], "shuffle {select:#06x}");
    }
}

#[test]
fn test_all_four_lane_masks() {
    init_logging();
    let selects: Vec<u16> = (0..256u16)
        .map(|s| ((s >> 6) & 3) << 12 | ((s >> 4) & 3) << 8 | ((s >> 2) & 3) << 4 | (s & 3))
        .collect();

    let f = Function::<Int4Out>::with_config(Config::default()).unwrap();
    let out = f.arg::<Pointer<Int4>>(0).rvalue();
    let a = f.arg::<Pointer<Int4>>(1).rvalue().load();
    let b = f.arg::<Pointer<Int4>>(2).rvalue().load();
    for (i, &select) in selects.iter().enumerate() {
        out.element(i as i32).store(a.mask(b, select));
    }
    f.ret_void();
    let routine = f.finalize("masks").unwrap();

    let lhs = [1, 2, 3, 4];
    let rhs = [50, 60, 70, 80];
    let mut out = vec![0i32; 4 * selects.len()];
    unsafe { routine.function()(out.as_mut_ptr(), lhs.as_ptr(), rhs.as_ptr()) };

    for (i, &select) in selects.iter().enumerate() {
        let mut expected = lhs;
        for lane in 0..4 {
            let target = select_lane(select, lane, 2);
            expected[target] = rhs[target];
        }
        assert_eq!(&out[4 * i..4 * i + 4], &expected[..], "mask {select:#06x}");
    }
}

#[test]
fn test_lane_access_and_sign_mask() {
    init_logging();
    let f = Function::<unsafe extern "C" fn(*mut i32, *const i32)>::with_config(Config::default()).unwrap();
    let out = f.arg::<Pointer<Int>>(0).rvalue();
    let v = f.arg::<Pointer<Int4>>(1).rvalue().load();
    out.element(0).store(v.x() + v.w());
    out.element(1).store(v.insert(100, 2).z());
    out.element(2).store(v.lt(f.constant::<Int4>([0; 4])).sign_mask());
    out.element(3).store(v.gt(f.constant::<Int4>([-10; 4])).all_true().cast::<Int>());
    f.ret_void();
    let routine = f.finalize("lanes").unwrap();

    let input = [-3, 5, -7, 9];
    let mut out = [0i32; 4];
    unsafe { routine.function()(out.as_mut_ptr(), input.as_ptr()) };
    assert_eq!(out, [6, 100, 0b0101, 1]);
}

#[test]
fn test_pack_and_widen() {
    init_logging();
    let f = Function::<unsafe extern "C" fn(*mut i16, *mut u16, *const i32, *const i32)>::with_config(Config::default())
        .unwrap();
    let signed_out = f.arg::<Pointer<Short8>>(0).rvalue();
    let widened_out = f.arg::<Pointer<UShort8>>(1).rvalue();
    let a = f.arg::<Pointer<Int4>>(2).rvalue().load();
    let b = f.arg::<Pointer<Int4>>(3).rvalue().load();
    let packed = a.pack_signed(b);
    signed_out.store(packed);
    let bytes = packed.pack_unsigned(packed);
    widened_out.store(bytes.widen_low());
    f.ret_void();
    let routine = f.finalize("pack").unwrap();

    let a = [1, -1, 40000, -40000];
    let b = [300, 255, 256, i32::MIN];
    let mut signed = [0i16; 8];
    let mut widened = [0u16; 8];
    unsafe { routine.function()(signed.as_mut_ptr(), widened.as_mut_ptr(), a.as_ptr(), b.as_ptr()) };

    assert_eq!(signed, [1, -1, i16::MAX, i16::MIN, 300, 255, 256, i16::MIN]);
    assert_eq!(widened, [1, 0, 255, 0, 255, 255, 255, 0]);
}

#[test]
fn test_unsigned_widen_to_long2() {
    init_logging();
    let f = Function::<unsafe extern "C" fn(*mut u64, *const u32)>::with_config(Config::default()).unwrap();
    let out = f.arg::<Pointer<ULong2>>(0).rvalue();
    let v = f.arg::<Pointer<UInt4>>(1).rvalue().load();
    out.element(0).store(v.widen_low());
    out.element(1).store(v.widen_high());
    f.ret_void();
    let routine = f.finalize("widen_u32").unwrap();

    let input = [u32::MAX, 1, 0x8000_0000, 7];
    let mut out = [0u64; 4];
    unsafe { routine.function()(out.as_mut_ptr(), input.as_ptr()) };
    assert_eq!(out, [u32::MAX as u64, 1, 0x8000_0000, 7]);
}

#[test]
fn test_int2_stores_eight_bytes() {
    init_logging();
    let f = Function::<unsafe extern "C" fn(*mut i32, *const i32, *const i32)>::with_config(Config::default()).unwrap();
    let out = f.arg::<Pointer<Int2>>(0).rvalue();
    let a = f.arg::<Pointer<Int2>>(1).rvalue().load();
    let b = f.arg::<Pointer<Int2>>(2).rvalue().load();
    out.element(0).store(a + b);
    out.element(1).store((a * b).swizzle(0x10));
    out.element(2).store(a.lt(b));
    out.element(3).store(f.splat::<Int2>(a.y()) - 1);
    f.ret_void();
    let routine = f.finalize("int2").unwrap();

    let a = [7, -3];
    let b = [5, 4];
    let mut out = [99i32; 9];
    unsafe { routine.function()(out.as_mut_ptr(), a.as_ptr(), b.as_ptr()) };
    assert_eq!(out, [12, 1, -12, 35, 0, -1, -4, -4, 99]);
}

#[test]
fn test_float2_lanes_and_casts() {
    init_logging();
    let f = Function::<unsafe extern "C" fn(*mut f32, *mut i32, *const f32) -> i32>::with_config(Config::default())
        .unwrap();
    let floats = f.arg::<Pointer<Float2>>(0).rvalue();
    let ints = f.arg::<Pointer<Int2>>(1).rvalue();
    let v = f.arg::<Pointer<Float2>>(2).rvalue().load();
    floats.element(0).store(v * 2.0 + 1.0);
    floats.element(1).store(v.swizzle(0x10).max(v));
    floats.element(2).store(v.round_int().cast::<Float2>());
    ints.element(0).store(v.cast::<Int2>());
    ints.element(1).store(v.gt(0.0));
    f.ret(v.lt(0.0).sign_mask() + v.ge(0.0).all_true().cast::<Int>() * 10);
    let routine = f.finalize("float2").unwrap();

    let input = [-2.5f32, 3.75];
    let mut floats = [0f32; 7];
    floats[6] = 42.0;
    let mut ints = [0i32; 4];
    let mask = unsafe { routine.function()(floats.as_mut_ptr(), ints.as_mut_ptr(), input.as_ptr()) };
    assert_eq!(floats, [-4.0, 8.5, 3.75, 3.75, -2.0, 4.0, 42.0]);
    assert_eq!(ints, [-2, 3, 0, -1]);
    assert_eq!(mask, 0b01);
}

#[test]
fn test_short_and_byte_packs() {
    init_logging();
    let f = Function::<unsafe extern "C" fn(*mut i32, *mut u16, *const i16, *const u8, *const u8)>::with_config(
        Config::default(),
    )
    .unwrap();
    let ints = f.arg::<Pointer<Int4>>(0).rvalue();
    let shorts = f.arg::<Pointer<UShort8>>(1).rvalue();
    let s = f.arg::<Pointer<Short4>>(2).rvalue().load();
    let a = f.arg::<Pointer<Byte8>>(3).rvalue().load();
    let b = f.arg::<Pointer<Byte8>>(4).rvalue().load();
    ints.element(0).store(s.cast::<Int4>());
    ints.element(1).store(s.bitcast::<UShort4>().cast::<Int4>());
    ints.element(2).store(s.swizzle(0x3210).cast::<Int4>());
    shorts.element(0).store(a.add_sat(b).cast::<UShort8>());
    shorts.element(1).store(a.unpack_low(b).cast::<UShort8>());
    f.ret_void();
    let routine = f.finalize("short4_byte8").unwrap();

    let s: [i16; 4] = [-1, 2, i16::MIN, 300];
    let a: [u8; 8] = [0, 1, 100, 200, 250, 255, 17, 128];
    let b: [u8; 8] = [5, 255, 100, 100, 10, 0, 1, 128];
    let mut ints = [0i32; 12];
    let mut shorts = [0u16; 16];
    unsafe { routine.function()(ints.as_mut_ptr(), shorts.as_mut_ptr(), s.as_ptr(), a.as_ptr(), b.as_ptr()) };

    assert_eq!(&ints[0..4], &[-1, 2, -32768, 300]);
    assert_eq!(&ints[4..8], &[0xFFFF, 2, 0x8000, 300]);
    assert_eq!(&ints[8..12], &[300, -32768, 2, -1]);
    let saturated: Vec<u16> = (0..8).map(|i| a[i].saturating_add(b[i]) as u16).collect();
    assert_eq!(&shorts[0..8], &saturated[..]);
    assert_eq!(&shorts[8..16], &[0, 5, 1, 255, 100, 100, 200, 100]);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn test_short8_swizzle(select in any::<u32>()) {
        let f = Function::<unsafe extern "C" fn(*mut i16, *const i16)>::with_config(Config::default()).unwrap();
        let out = f.arg::<Pointer<Short8>>(0).rvalue();
        let v = f.arg::<Pointer<Short8>>(1).rvalue().load();
        out.store(v.swizzle(select));
        f.ret_void();
        let routine = f.finalize("short8_swizzle").unwrap();

        let input: [i16; 8] = [-8, 7, -6, 5, -4, 3, -2, 1];
        let mut result = [0i16; 8];
        unsafe { routine.function()(result.as_mut_ptr(), input.as_ptr()) };
        for lane in 0..8 {
            let index = ((select >> (28 - 4 * lane)) & 7) as usize;
            prop_assert_eq!(result[lane], input[index]);
        }
    }

    #[test]
    fn test_byte8_swizzle(select in any::<u32>()) {
        let f = Function::<unsafe extern "C" fn(*mut u8, *const u8)>::with_config(Config::default()).unwrap();
        let out = f.arg::<Pointer<Byte8>>(0).rvalue();
        let v = f.arg::<Pointer<Byte8>>(1).rvalue().load();
        out.store(v.swizzle(select));
        f.ret_void();
        let routine = f.finalize("byte8_swizzle").unwrap();

        let input: [u8; 8] = [11, 22, 33, 44, 55, 66, 77, 88];
        let mut result = [0u8; 9];
        unsafe { routine.function()(result.as_mut_ptr(), input.as_ptr()) };
        for lane in 0..8 {
            let index = ((select >> (28 - 4 * lane)) & 7) as usize;
            prop_assert_eq!(result[lane], input[index]);
        }
        prop_assert_eq!(result[8], 0);
    }

    #[test]
    fn test_byte16_swizzle(select in any::<u64>()) {
        let f = Function::<unsafe extern "C" fn(*mut u8, *const u8)>::with_config(Config::default()).unwrap();
        let out = f.arg::<Pointer<Byte16>>(0).rvalue();
        let v = f.arg::<Pointer<Byte16>>(1).rvalue().load();
        out.store(v.swizzle(select));
        f.ret_void();
        let routine = f.finalize("byte16_swizzle").unwrap();

        let input: [u8; 16] = std::array::from_fn(|i| (i as u8) * 16 + 1);
        let mut result = [0u8; 16];
        unsafe { routine.function()(result.as_mut_ptr(), input.as_ptr()) };
        for lane in 0..16 {
            let index = ((select >> (60 - 4 * lane)) & 0xF) as usize;
            prop_assert_eq!(result[lane], input[index]);
        }
    }
}
