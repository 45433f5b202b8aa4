//! Test value casts, bit casts and half-precision conversion.
//!
//! Float to integer conversions truncate toward zero and saturate, with NaN
//! converting to zero, which is exactly what Rust's `as` does on the host.

use reactor::expr::cast::{f32_to_half_bits, half_bits_to_f32};
use reactor::{Byte, Config, Float, Float4, Function, Half, Int, Int4, Pointer, Short, UInt};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

const FLOAT_SAMPLES: [f32; 14] = [
    0.0,
    -0.0,
    0.5,
    -0.5,
    1.99,
    -1.99,
    255.5,
    256.0,
    -129.0,
    65535.0,
    3.0e9,
    -3.0e9,
    f32::INFINITY,
    f32::NEG_INFINITY,
];

#[test]
fn test_float_to_int_saturates() {
    init_logging();
    let f = Function::<unsafe extern "C" fn(*mut i32, f32)>::with_config(Config::default()).unwrap();
    let out = f.arg::<Pointer<Int>>(0).rvalue();
    let x = f.arg::<Float>(1).rvalue();
    out.element(0).store(x.cast::<Int>());
    out.element(1).store(x.cast::<UInt>().bitcast::<Int>());
    out.element(2).store(x.cast::<Short>().cast::<Int>());
    out.element(3).store(x.cast::<Byte>().cast::<Int>());
    f.ret_void();
    let routine = f.finalize("float_to_int").unwrap();

    for x in FLOAT_SAMPLES.into_iter().chain([f32::NAN]) {
        let mut out = [0i32; 4];
        unsafe { routine.function()(out.as_mut_ptr(), x) };
        assert_eq!(out[0], x as i32, "{x} as i32");
        assert_eq!(out[1] as u32, x as u32, "{x} as u32");
        assert_eq!(out[2], (x as i16) as i32, "{x} as i16");
        assert_eq!(out[3], (x as u8) as i32, "{x} as u8");
    }
}

#[test]
fn test_int_to_float_and_back() {
    init_logging();
    let f = Function::<unsafe extern "C" fn(u32) -> f32>::with_config(Config::default()).unwrap();
    let x = f.arg::<UInt>(0).rvalue();
    f.ret(x.cast::<Float>());
    let routine = f.finalize("uint_to_float").unwrap();

    for x in [0u32, 1, 12345, 0x8000_0000, u32::MAX] {
        assert_eq!(unsafe { routine.function()(x) }, x as f32);
    }
}

#[test]
fn test_vector_conversions() {
    init_logging();
    let f = Function::<unsafe extern "C" fn(*mut i32, *mut f32, *const f32)>::with_config(Config::default()).unwrap();
    let ints = f.arg::<Pointer<Int4>>(0).rvalue();
    let floats = f.arg::<Pointer<Float4>>(1).rvalue();
    let v = f.arg::<Pointer<Float4>>(2).rvalue().load();
    let rounded = v.round_int();
    ints.store(rounded);
    floats.store(rounded.cast::<Float4>() * 0.5);
    f.ret_void();
    let routine = f.finalize("float4_convert").unwrap();

    let input = [2.5f32, -1.5, 1.0e10, f32::NAN];
    let mut ints = [0i32; 4];
    let mut floats = [0f32; 4];
    unsafe { routine.function()(ints.as_mut_ptr(), floats.as_mut_ptr(), input.as_ptr()) };
    assert_eq!(ints, [2, -2, i32::MAX, 0]);
    assert_eq!(floats, [1.0, -1.0, i32::MAX as f32 * 0.5, 0.0]);
}

#[test]
fn test_bool_conversions() {
    init_logging();
    let f = Function::<unsafe extern "C" fn(f32, i32) -> i32>::with_config(Config::default()).unwrap();
    let x = f.arg::<Float>(0).rvalue();
    let n = f.arg::<Int>(1).rvalue();
    let float_truth = x.cast::<reactor::Bool>().cast::<Int>();
    let int_truth = n.cast::<reactor::Bool>().cast::<Int>();
    f.ret(float_truth * 2 + int_truth);
    let routine = f.finalize("truth").unwrap();

    unsafe {
        assert_eq!(routine.function()(0.0, 0), 0);
        assert_eq!(routine.function()(-0.0, 5), 1);
        assert_eq!(routine.function()(0.25, -1), 3);
        assert_eq!(routine.function()(f32::NAN, 0), 2);
    }
}

#[test]
fn test_traced_half_matches_host() {
    init_logging();
    let f = Function::<unsafe extern "C" fn(*mut u16, *mut f32, f32)>::with_config(Config::default()).unwrap();
    let bits_out = f.arg::<Pointer<Half>>(0).rvalue();
    let float_out = f.arg::<Pointer<Float>>(1).rvalue();
    let x = f.arg::<Float>(2).rvalue();
    let half = x.to_half();
    bits_out.store(half);
    float_out.store(half.to_float());
    f.ret_void();
    let routine = f.finalize("half").unwrap();

    let samples = [
        0.0f32, -0.0, 1.0, -2.5, 0.1, 1.0 / 3.0, 65504.0, 65520.0, 1.0e6, 6.1e-5, 5.96e-8, 1.0e-7, 3.0e-5, -7.0e-6,
    ];
    for x in samples {
        let mut bits = 0u16;
        let mut back = 0f32;
        unsafe { routine.function()(&mut bits, &mut back, x) };
        assert_eq!(bits, f32_to_half_bits(x), "to_half({x})");
        assert_eq!(back.to_bits(), half_bits_to_f32(bits).to_bits(), "to_float(to_half({x}))");
    }
}
