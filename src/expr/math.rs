// This module adds the math helpers that are not operators: min/max/clamp and abs for every
// arithmetic kind, the float rounding family with frac and an exact reciprocal, infinity
// tests, and the integer SIMD idioms (high half of a product, saturating add/sub, rounding
// average). Bit counting works per lane and counts the full lane width for a zero lane.
// exp2, log2, pow, sin and cos are backend transcendental calls with the host libm's
// precision; mul_add is fused. Float min/max return the other operand when one is NaN only
// if the backend instruction does; NaN propagation is backend-defined. abs of the most
// negative integer wraps to itself.

//! Math helpers.

use super::kinds::*;
use super::{IntoRValue, RValue, ReactorType};
use crate::core::{MathFunction, RoundingMode, Session, Type, Value};

/// A float constant of type `ty`, broadcast for vectors.
fn float_constant(session: &Session, ty: Type, value: f32) -> Value {
    session.free_value(|b| {
        if ty.is_vector() {
            b.create_constant_float_vector(ty, &vec![value; ty.lanes() as usize])
        } else {
            b.create_constant_float(ty, value)
        }
    })
}

impl<'s, T: Arithmetic> RValue<'s, T> {
    pub fn min(self, rhs: Self) -> Self {
        if T::TYPE.is_float() {
            self.zip(rhs, "fmin", |b, l, r| b.create_fmin(l, r))
        } else {
            let signed = T::TYPE.is_signed();
            self.zip(rhs, "min", |b, l, r| b.create_min(l, r, signed))
        }
    }

    pub fn max(self, rhs: Self) -> Self {
        if T::TYPE.is_float() {
            self.zip(rhs, "fmax", |b, l, r| b.create_fmax(l, r))
        } else {
            let signed = T::TYPE.is_signed();
            self.zip(rhs, "max", |b, l, r| b.create_max(l, r, signed))
        }
    }

    /// `min(max(self, lo), hi)`.
    pub fn clamp(self, lo: Self, hi: Self) -> Self {
        self.max(lo).min(hi)
    }

    /// Absolute value; the identity on unsigned kinds.
    pub fn abs(self) -> Self {
        if T::TYPE.is_float() {
            self.map("fabs", |b, v| b.create_fabs(v))
        } else if T::TYPE.is_signed() {
            self.max(-self)
        } else {
            self
        }
    }

    /// High half of the double-width product.
    pub fn mul_high(self, rhs: Self) -> Self {
        assert!(!T::TYPE.is_float(), "mul_high takes integer kinds, got {}", T::TYPE);
        let signed = T::TYPE.is_signed();
        self.zip(rhs, "mulhigh", |b, l, r| b.create_mul_high(l, r, signed))
    }

    pub fn add_sat(self, rhs: Self) -> Self {
        assert!(!T::TYPE.is_float(), "add_sat takes integer kinds, got {}", T::TYPE);
        let signed = T::TYPE.is_signed();
        self.zip(rhs, "addsat", |b, l, r| b.create_add_sat(l, r, signed))
    }

    pub fn sub_sat(self, rhs: Self) -> Self {
        assert!(!T::TYPE.is_float(), "sub_sat takes integer kinds, got {}", T::TYPE);
        let signed = T::TYPE.is_signed();
        self.zip(rhs, "subsat", |b, l, r| b.create_sub_sat(l, r, signed))
    }

    /// Unsigned rounding average `(a + b + 1) >> 1` without intermediate overflow.
    pub fn average(self, rhs: Self) -> Self {
        assert!(
            !T::TYPE.is_float() && !T::TYPE.is_signed(),
            "average takes unsigned integer kinds, got {}",
            T::TYPE
        );
        self.zip(rhs, "average", |b, l, r| b.create_average(l, r))
    }
}

impl<'s, T: Integer> RValue<'s, T> {
    /// Number of leading zero bits.
    pub fn ctlz(self) -> Self {
        assert!(!T::TYPE.is_bool(), "ctlz takes integer kinds");
        self.map("ctlz", |b, v| b.create_ctlz(v))
    }

    /// Number of trailing zero bits.
    pub fn cttz(self) -> Self {
        assert!(!T::TYPE.is_bool(), "cttz takes integer kinds");
        self.map("cttz", |b, v| b.create_cttz(v))
    }

    pub fn popcount(self) -> Self {
        assert!(!T::TYPE.is_bool(), "popcount takes integer kinds");
        self.map("popcount", |b, v| b.create_popcount(v))
    }
}

impl<'s, T: FloatKind> RValue<'s, T> {
    pub fn sqrt(self) -> Self {
        self.map("sqrt", |b, v| b.create_sqrt(v))
    }

    /// Exact `1 / sqrt(self)`.
    pub fn rcp_sqrt(self) -> Self {
        self.sqrt().rcp()
    }

    /// `self * b + c` with a single rounding.
    pub fn mul_add(self, b: impl IntoRValue<'s, T>, c: impl IntoRValue<'s, T>) -> Self {
        let session = self.session();
        let (a, b, c) = (self.value(), b.into_rvalue(session).value(), c.into_rvalue(session).value());
        let result = session.instr("fma", &[a, b, c], |backend| backend.create_fma(a, b, c));
        RValue::from_value(session, result)
    }

    pub fn exp2(self) -> Self {
        self.math(MathFunction::Exp2)
    }

    pub fn log2(self) -> Self {
        self.math(MathFunction::Log2)
    }

    /// Sine of an angle in radians.
    pub fn sin(self) -> Self {
        self.math(MathFunction::Sin)
    }

    pub fn cos(self) -> Self {
        self.math(MathFunction::Cos)
    }

    pub fn pow(self, exponent: impl IntoRValue<'s, T>) -> Self {
        let exponent = exponent.into_rvalue(self.session());
        self.zip(exponent, "pow", |b, l, r| b.create_pow(l, r))
    }

    fn math(self, function: MathFunction) -> Self {
        self.map("math", |b, v| b.create_math(function, v))
    }

    /// Round to nearest, ties to even.
    pub fn round(self) -> Self {
        self.rounded(RoundingMode::Nearest)
    }

    pub fn floor(self) -> Self {
        self.rounded(RoundingMode::Floor)
    }

    pub fn ceil(self) -> Self {
        self.rounded(RoundingMode::Ceil)
    }

    pub fn trunc(self) -> Self {
        self.rounded(RoundingMode::Trunc)
    }

    /// `self - floor(self)`.
    pub fn frac(self) -> Self {
        let floor = self.floor();
        self.zip(floor, "fsub", |b, l, r| b.create_fsub(l, r))
    }

    /// Exact `1 / self`.
    pub fn rcp(self) -> Self {
        let one = float_constant(self.session(), T::TYPE, 1.0);
        let one = RValue::<T>::from_value(self.session(), one);
        one.zip(self, "fdiv", |b, l, r| b.create_fdiv(l, r))
    }

    fn rounded(self, mode: RoundingMode) -> Self {
        self.map("round", |b, v| b.create_round(v, mode))
    }
}

impl<'s, T: FloatKind + Comparable> RValue<'s, T> {
    /// True (or all-ones) where the value is an infinity of either sign.
    pub fn is_inf(self) -> RValue<'s, T::Output> {
        let inf = float_constant(self.session(), T::TYPE, f32::INFINITY);
        let inf = RValue::<T>::from_value(self.session(), inf);
        self.abs_float().eq(inf)
    }

    fn abs_float(self) -> Self {
        self.map("fabs", |b, v| b.create_fabs(v))
    }
}

impl<'s> RValue<'s, Float> {
    /// Round to the nearest integer, ties to even.
    pub fn round_int(self) -> RValue<'s, Int> {
        self.round().cast::<Int>()
    }
}

impl<'s> RValue<'s, Float4> {
    pub fn round_int(self) -> RValue<'s, Int4> {
        self.round().cast::<Int4>()
    }
}

impl<'s> RValue<'s, Float2> {
    pub fn round_int(self) -> RValue<'s, Int2> {
        self.round().cast::<Int2>()
    }
}
