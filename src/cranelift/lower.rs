// Expansions for operations that have no single Cranelift instruction on every host: lane
// by lane vector fallbacks, scalar saturating arithmetic, the high half of narrow products,
// float to small-integer conversion with saturation, masked vector access through a scratch
// slot, and the float math helpers called through their host addresses. All of them emit
// straight-line code at the given cursor so the caller's block structure stays unchanged.

use crate::core::{FloatPredicate, MathFunction, Type};
use cranelift_codegen::cursor::FuncCursor;
use cranelift_codegen::ir::condcodes::{FloatCC, IntCC};
use cranelift_codegen::ir::{self, types, Endianness, InstBuilder, MemFlags, SigRef};

/// Memory flags for bitcasts between vector shapes.
pub(super) fn little_endian() -> MemFlags {
    MemFlags::new().with_endianness(Endianness::Little)
}

fn value_type(c: &FuncCursor<'_>, value: ir::Value) -> types::Type {
    c.func.dfg.value_type(value)
}

fn signed_max(bits: u32) -> i64 {
    if bits >= 64 {
        i64::MAX
    } else {
        (1i64 << (bits - 1)) - 1
    }
}

/// Apply a scalar `op` to every lane pair of `a` and `b`.
pub(super) fn lanewise(
    c: &mut FuncCursor<'_>,
    lanes: u32,
    a: ir::Value,
    b: ir::Value,
    op: impl Fn(&mut FuncCursor<'_>, ir::Value, ir::Value) -> ir::Value,
) -> ir::Value {
    let mut result = a;
    for lane in 0..lanes as u8 {
        let x = c.ins().extractlane(a, lane);
        let y = c.ins().extractlane(b, lane);
        let r = op(c, x, y);
        result = c.ins().insertlane(result, r, lane);
    }
    result
}

/// Apply a scalar `op` to every lane of `x`.
pub(super) fn lanewise_unary(
    c: &mut FuncCursor<'_>,
    lanes: u32,
    x: ir::Value,
    op: impl Fn(&mut FuncCursor<'_>, ir::Value) -> ir::Value,
) -> ir::Value {
    let mut result = x;
    for lane in 0..lanes as u8 {
        let e = c.ins().extractlane(x, lane);
        let r = op(c, e);
        result = c.ins().insertlane(result, r, lane);
    }
    result
}

/// Saturating add/sub and rounding average exist natively for 8 and 16-bit lanes.
pub(super) fn has_native_saturation(ty: Type) -> bool {
    ty.is_vector() && ty.element().bits() <= 16
}

/// Plain load of `ty`; 64-bit packs fill the low half of the register.
pub(super) fn load(c: &mut FuncCursor<'_>, ty: Type, cl: types::Type, flags: MemFlags, p: ir::Value) -> ir::Value {
    if !ty.is_half_vector() {
        return c.ins().load(cl, flags, p, 0);
    }
    let bits = c.ins().load(types::I64, flags, p, 0);
    let wide = c.ins().scalar_to_vector(types::I64X2, bits);
    c.ins().bitcast(cl, little_endian(), wide)
}

pub(super) fn store(c: &mut FuncCursor<'_>, ty: Type, flags: MemFlags, x: ir::Value, p: ir::Value) {
    if ty.is_half_vector() {
        let wide = c.ins().bitcast(types::I64X2, little_endian(), x);
        let bits = c.ins().extractlane(wide, 0);
        c.ins().store(flags, bits, p, 0);
    } else {
        c.ins().store(flags, x, p, 0);
    }
}

/// A load that is never merged with or forwarded from another access. Aligned
/// scalars read their bits with an atomic load; everything else is placed
/// after a fence. Stores need no counterpart: Cranelift never removes them.
pub(super) fn volatile_load(c: &mut FuncCursor<'_>, ty: Type, cl: types::Type, flags: MemFlags, p: ir::Value) -> ir::Value {
    if ty.is_vector() || !flags.aligned() {
        c.ins().fence();
        return load(c, ty, cl, flags, p);
    }
    if cl.is_float() {
        let bits = c.ins().atomic_load(cl.as_int(), MemFlags::new(), p);
        c.ins().bitcast(cl, MemFlags::new(), bits)
    } else {
        c.ins().atomic_load(cl, MemFlags::new(), p)
    }
}

/// Saturated result when signed overflow happened: MAX for a non-negative `a`, MIN otherwise.
fn signed_saturation(c: &mut FuncCursor<'_>, a: ir::Value, bits: u32) -> ir::Value {
    let sign = c.ins().sshr_imm(a, i64::from(bits - 1));
    c.ins().bxor_imm(sign, super::mask_immediate(signed_max(bits), bits))
}

pub(super) fn add_sat(c: &mut FuncCursor<'_>, a: ir::Value, b: ir::Value, signed: bool) -> ir::Value {
    let ty = value_type(c, a);
    let sum = c.ins().iadd(a, b);
    if signed {
        let x = c.ins().bxor(sum, a);
        let y = c.ins().bxor(sum, b);
        let overflow = c.ins().band(x, y);
        let overflow = c.ins().icmp_imm(IntCC::SignedLessThan, overflow, 0);
        let saturated = signed_saturation(c, a, ty.bits());
        c.ins().select(overflow, saturated, sum)
    } else {
        let wrapped = c.ins().icmp(IntCC::UnsignedLessThan, sum, a);
        let ones = c.ins().iconst(ty, super::mask_immediate(-1, ty.bits()));
        c.ins().select(wrapped, ones, sum)
    }
}

pub(super) fn sub_sat(c: &mut FuncCursor<'_>, a: ir::Value, b: ir::Value, signed: bool) -> ir::Value {
    let ty = value_type(c, a);
    let diff = c.ins().isub(a, b);
    if signed {
        let x = c.ins().bxor(a, b);
        let y = c.ins().bxor(a, diff);
        let overflow = c.ins().band(x, y);
        let overflow = c.ins().icmp_imm(IntCC::SignedLessThan, overflow, 0);
        let saturated = signed_saturation(c, a, ty.bits());
        c.ins().select(overflow, saturated, diff)
    } else {
        let underflow = c.ins().icmp(IntCC::UnsignedLessThan, a, b);
        let zero = c.ins().iconst(ty, 0);
        c.ins().select(underflow, zero, diff)
    }
}

/// `(a | b) - ((a ^ b) >> 1)`, the rounding average without overflow.
pub(super) fn average(c: &mut FuncCursor<'_>, a: ir::Value, b: ir::Value) -> ir::Value {
    let or = c.ins().bor(a, b);
    let xor = c.ins().bxor(a, b);
    let half = c.ins().ushr_imm(xor, 1);
    c.ins().isub(or, half)
}

pub(super) fn mul_high(c: &mut FuncCursor<'_>, a: ir::Value, b: ir::Value, signed: bool) -> ir::Value {
    let ty = value_type(c, a);
    if ty.bits() >= 32 {
        return if signed { c.ins().smulhi(a, b) } else { c.ins().umulhi(a, b) };
    }

    let (a, b) = if signed {
        (c.ins().sextend(types::I32, a), c.ins().sextend(types::I32, b))
    } else {
        (c.ins().uextend(types::I32, a), c.ins().uextend(types::I32, b))
    };
    let product = c.ins().imul(a, b);
    let high = if signed {
        c.ins().sshr_imm(product, i64::from(ty.bits()))
    } else {
        c.ins().ushr_imm(product, i64::from(ty.bits()))
    };
    c.ins().ireduce(ty, high)
}

pub(super) fn min_max(
    c: &mut FuncCursor<'_>,
    ty: Type,
    a: ir::Value,
    b: ir::Value,
    signed: bool,
    min: bool,
) -> ir::Value {
    let cc = match (signed, min) {
        (true, true) => IntCC::SignedLessThan,
        (true, false) => IntCC::SignedGreaterThan,
        (false, true) => IntCC::UnsignedLessThan,
        (false, false) => IntCC::UnsignedGreaterThan,
    };

    if !ty.is_vector() {
        let pick = c.ins().icmp(cc, a, b);
        c.ins().select(pick, a, b)
    } else if ty.element().bits() == 64 {
        let pick = c.ins().icmp(cc, a, b);
        c.ins().bitselect(pick, a, b)
    } else {
        match (signed, min) {
            (true, true) => c.ins().smin(a, b),
            (true, false) => c.ins().smax(a, b),
            (false, true) => c.ins().umin(a, b),
            (false, false) => c.ins().umax(a, b),
        }
    }
}

/// Host remainder with C `fmodf` semantics.
pub(super) extern "C" fn reactor_fmodf(a: f32, b: f32) -> f32 {
    a % b
}

pub(super) extern "C" fn reactor_powf(a: f32, b: f32) -> f32 {
    a.powf(b)
}

pub(super) extern "C" fn reactor_exp2f(x: f32) -> f32 {
    x.exp2()
}

pub(super) extern "C" fn reactor_log2f(x: f32) -> f32 {
    x.log2()
}

pub(super) extern "C" fn reactor_sinf(x: f32) -> f32 {
    x.sin()
}

pub(super) extern "C" fn reactor_cosf(x: f32) -> f32 {
    x.cos()
}

/// Host address of the helper computing `function`.
pub(super) fn math_helper(function: MathFunction) -> usize {
    let helper: extern "C" fn(f32) -> f32 = match function {
        MathFunction::Exp2 => reactor_exp2f,
        MathFunction::Log2 => reactor_log2f,
        MathFunction::Sin => reactor_sinf,
        MathFunction::Cos => reactor_cosf,
    };
    helper as usize
}

pub(super) fn binary_helper(pow: bool) -> usize {
    let helper: extern "C" fn(f32, f32) -> f32 = if pow { reactor_powf } else { reactor_fmodf };
    helper as usize
}

/// Call the scalar float helper at `address` on `args`.
pub(super) fn host_call(
    c: &mut FuncCursor<'_>,
    signature: SigRef,
    pointer: types::Type,
    address: usize,
    args: &[ir::Value],
) -> ir::Value {
    let callee = c.ins().iconst(pointer, address as i64);
    let call = c.ins().call_indirect(signature, callee, args);
    c.func.dfg.inst_results(call)[0]
}

/// Saturating float to integer conversion into `to`.
pub(super) fn float_to_int(c: &mut FuncCursor<'_>, to: types::Type, x: ir::Value, signed: bool) -> ir::Value {
    if to.lane_bits() >= 32 {
        return if signed {
            c.ins().fcvt_to_sint_sat(to, x)
        } else {
            c.ins().fcvt_to_uint_sat(to, x)
        };
    }

    let bits = to.bits();
    let wide = if signed {
        c.ins().fcvt_to_sint_sat(types::I32, x)
    } else {
        c.ins().fcvt_to_uint_sat(types::I32, x)
    };
    let (lo, hi) = if signed {
        (-(1i64 << (bits - 1)), signed_max(bits))
    } else {
        (0, (1i64 << bits) - 1)
    };
    let lo_cc = if signed { IntCC::SignedLessThan } else { IntCC::UnsignedLessThan };
    let hi_cc = if signed { IntCC::SignedGreaterThan } else { IntCC::UnsignedGreaterThan };

    let lo_value = c.ins().iconst(types::I32, super::mask_immediate(lo, 32));
    let hi_value = c.ins().iconst(types::I32, hi);
    let below = c.ins().icmp(lo_cc, wide, lo_value);
    let clamped = c.ins().select(below, lo_value, wide);
    let above = c.ins().icmp(hi_cc, clamped, hi_value);
    let clamped = c.ins().select(above, hi_value, clamped);
    c.ins().ireduce(to, clamped)
}

pub(super) fn int_to_float(c: &mut FuncCursor<'_>, to: types::Type, x: ir::Value, from: Type, signed: bool) -> ir::Value {
    let x = if !from.is_vector() && from.bits() < 32 {
        if signed {
            c.ins().sextend(types::I32, x)
        } else {
            c.ins().uextend(types::I32, x)
        }
    } else {
        x
    };
    if signed {
        c.ins().fcvt_from_sint(to, x)
    } else {
        c.ins().fcvt_from_uint(to, x)
    }
}

pub(super) fn fcmp(c: &mut FuncCursor<'_>, pred: FloatPredicate, a: ir::Value, b: ir::Value) -> ir::Value {
    let cc = match pred {
        FloatPredicate::Oeq => FloatCC::Equal,
        FloatPredicate::Ogt => FloatCC::GreaterThan,
        FloatPredicate::Oge => FloatCC::GreaterThanOrEqual,
        FloatPredicate::Olt => FloatCC::LessThan,
        FloatPredicate::Ole => FloatCC::LessThanOrEqual,
        FloatPredicate::Ord => FloatCC::Ordered,
        FloatPredicate::Uno => FloatCC::Unordered,
        FloatPredicate::Une => FloatCC::NotEqual,
        FloatPredicate::Ugt => FloatCC::UnorderedOrGreaterThan,
        FloatPredicate::Uge => FloatCC::UnorderedOrGreaterThanOrEqual,
        FloatPredicate::Ult => FloatCC::UnorderedOrLessThan,
        FloatPredicate::Ule => FloatCC::UnorderedOrLessThanOrEqual,
        FloatPredicate::One => {
            let ordered = c.ins().fcmp(FloatCC::Ordered, a, b);
            let ne = c.ins().fcmp(FloatCC::NotEqual, a, b);
            return c.ins().band(ordered, ne);
        }
        FloatPredicate::Ueq => {
            let unordered = c.ins().fcmp(FloatCC::Unordered, a, b);
            let eq = c.ins().fcmp(FloatCC::Equal, a, b);
            return c.ins().bor(unordered, eq);
        }
    };
    c.ins().fcmp(cc, a, b)
}

/// Result type of a saturating narrow of two `from` vectors.
pub(super) fn narrowed(from: Type, signed_result: bool) -> Type {
    match (from.element().bits(), signed_result) {
        (16, true) => Type::I8X16,
        (16, false) => Type::U8X16,
        (32, true) => Type::I16X8,
        (32, false) => Type::U16X8,
        _ => panic!("no narrowing from {from}"),
    }
}

/// Result type of widening half the lanes of `from`. A 64-bit pack widens all
/// of its lanes into a full register.
pub(super) fn widened(from: Type) -> Type {
    match from {
        Type::U8X16 | Type::U8X8 => Type::U16X8,
        Type::I8X16 | Type::I8X8 => Type::I16X8,
        Type::I16X8 | Type::I16X4 => Type::I32X4,
        Type::U16X8 | Type::U16X4 => Type::U32X4,
        Type::I32X4 | Type::I32X2 => Type::I64X2,
        Type::U32X4 | Type::U32X2 => Type::U64X2,
        _ => panic!("no widening from {from}"),
    }
}

/// Return zero of `ret`, closing a block nothing branched out of.
pub(super) fn default_return(c: &mut FuncCursor<'_>, ret: Option<types::Type>) {
    match ret {
        None => {
            c.ins().return_(&[]);
        }
        Some(ty) => {
            let zero = if ty == types::F32 {
                c.ins().f32const(0.0)
            } else {
                c.ins().iconst(ty, 0)
            };
            c.ins().return_(&[zero]);
        }
    }
}

/// Operands shared by masked loads and stores.
pub(super) struct MaskedAccess {
    pub ptr: ir::Value,
    pub mask: ir::Value,
    /// Inactive lanes read from and write to this slot.
    pub scratch: ir::StackSlot,
    pub pointer: types::Type,
    pub element: types::Type,
    pub lanes: u32,
}

impl MaskedAccess {
    /// Address for `lane` and whether the lane is active.
    fn lane_address(&self, c: &mut FuncCursor<'_>, dummy: ir::Value, lane: u8) -> (ir::Value, ir::Value) {
        let mask = c.ins().extractlane(self.mask, lane);
        let active = c.ins().icmp_imm(IntCC::NotEqual, mask, 0);
        let offset = i64::from(lane) * i64::from(self.element.bytes());
        let address = c.ins().iadd_imm(self.ptr, offset);
        (c.ins().select(active, address, dummy), active)
    }
}

pub(super) fn masked_load(c: &mut FuncCursor<'_>, access: MaskedAccess, zero: ir::Value, zero_masked: bool) -> ir::Value {
    let dummy = c.ins().stack_addr(access.pointer, access.scratch, 0);
    let mut result = zero;
    for lane in 0..access.lanes as u8 {
        let (address, active) = access.lane_address(c, dummy, lane);
        let mut value = c.ins().load(access.element, MemFlags::new(), address, 0);
        if zero_masked {
            let zero = if access.element == types::F32 {
                c.ins().f32const(0.0)
            } else {
                c.ins().iconst(access.element, 0)
            };
            value = c.ins().select(active, value, zero);
        }
        result = c.ins().insertlane(result, value, lane);
    }
    result
}

pub(super) fn masked_store(c: &mut FuncCursor<'_>, access: MaskedAccess, value: ir::Value) {
    let dummy = c.ins().stack_addr(access.pointer, access.scratch, 0);
    for lane in 0..access.lanes as u8 {
        let (address, _) = access.lane_address(c, dummy, lane);
        let element = c.ins().extractlane(value, lane);
        c.ins().store(MemFlags::new(), element, address, 0);
    }
}
