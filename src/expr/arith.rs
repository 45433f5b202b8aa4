// This module implements the arithmetic and bitwise operators of the expression layer on
// top of std::ops. The generic implementations cover every kind at once and pick the
// backend instruction from the kind's type descriptor: float kinds use the float
// instructions, signed integer kinds use signed division, remainder and arithmetic right
// shift, unsigned kinds the unsigned forms. Literal operands are handled by per-kind macro
// expansions so that `x + 1` and `1 - x` work with the kind's host literal type. Vector
// shifts accept either a vector of per-lane amounts or one u32 amount for all lanes. Shift
// amounts are taken modulo the lane width. Bool negation is an xor with true so that the
// byte stays 0 or 1.

//! Arithmetic and bitwise operators.

use super::kinds::*;
use super::{IntoRValue, RValue, ReactorType};
use crate::core::Type;
use std::ops::{Add, BitAnd, BitOr, BitXor, Div, Mul, Neg, Not, Rem, Shl, Shr, Sub};

impl<'s, T: Arithmetic> Add for RValue<'s, T> {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        if T::TYPE.is_float() {
            self.zip(rhs, "fadd", |b, l, r| b.create_fadd(l, r))
        } else {
            self.zip(rhs, "add", |b, l, r| b.create_add(l, r))
        }
    }
}

impl<'s, T: Arithmetic> Sub for RValue<'s, T> {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        if T::TYPE.is_float() {
            self.zip(rhs, "fsub", |b, l, r| b.create_fsub(l, r))
        } else {
            self.zip(rhs, "sub", |b, l, r| b.create_sub(l, r))
        }
    }
}

impl<'s, T: Arithmetic> Mul for RValue<'s, T> {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self {
        if T::TYPE.is_float() {
            self.zip(rhs, "fmul", |b, l, r| b.create_fmul(l, r))
        } else {
            self.zip(rhs, "mul", |b, l, r| b.create_mul(l, r))
        }
    }
}

impl<'s, T: Arithmetic> Div for RValue<'s, T> {
    type Output = Self;

    fn div(self, rhs: Self) -> Self {
        if T::TYPE.is_float() {
            self.zip(rhs, "fdiv", |b, l, r| b.create_fdiv(l, r))
        } else if T::TYPE.is_signed() {
            self.zip(rhs, "sdiv", |b, l, r| b.create_sdiv(l, r))
        } else {
            self.zip(rhs, "udiv", |b, l, r| b.create_udiv(l, r))
        }
    }
}

impl<'s, T: Arithmetic> Rem for RValue<'s, T> {
    type Output = Self;

    fn rem(self, rhs: Self) -> Self {
        if T::TYPE.is_float() {
            self.zip(rhs, "frem", |b, l, r| b.create_frem(l, r))
        } else if T::TYPE.is_signed() {
            self.zip(rhs, "srem", |b, l, r| b.create_srem(l, r))
        } else {
            self.zip(rhs, "urem", |b, l, r| b.create_urem(l, r))
        }
    }
}

impl<'s, T: Arithmetic> Neg for RValue<'s, T> {
    type Output = Self;

    fn neg(self) -> Self {
        if T::TYPE.is_float() {
            self.map("fneg", |b, v| b.create_fneg(v))
        } else {
            self.map("neg", |b, v| b.create_neg(v))
        }
    }
}

impl<'s, T: Integer> BitAnd for RValue<'s, T> {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self {
        self.zip(rhs, "and", |b, l, r| b.create_and(l, r))
    }
}

impl<'s, T: Integer> BitOr for RValue<'s, T> {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        self.zip(rhs, "or", |b, l, r| b.create_or(l, r))
    }
}

impl<'s, T: Integer> BitXor for RValue<'s, T> {
    type Output = Self;

    fn bitxor(self, rhs: Self) -> Self {
        self.zip(rhs, "xor", |b, l, r| b.create_xor(l, r))
    }
}

impl<'s, T: Integer> Not for RValue<'s, T> {
    type Output = Self;

    fn not(self) -> Self {
        if T::TYPE.is_bool() {
            let one = self.session().free_value(|b| b.create_constant_int(Type::BOOL, 1));
            let one = RValue::<T>::from_value(self.session(), one);
            self.zip(one, "xor", |b, l, r| b.create_xor(l, r))
        } else {
            self.map("not", |b, v| b.create_not(v))
        }
    }
}

impl<'s, T: Integer> Shl for RValue<'s, T> {
    type Output = Self;

    fn shl(self, rhs: Self) -> Self {
        self.zip(rhs, "shl", |b, l, r| b.create_shl(l, r))
    }
}

impl<'s, T: Integer> Shr for RValue<'s, T> {
    type Output = Self;

    fn shr(self, rhs: Self) -> Self {
        if T::TYPE.is_signed() {
            self.zip(rhs, "ashr", |b, l, r| b.create_ashr(l, r))
        } else {
            self.zip(rhs, "lshr", |b, l, r| b.create_lshr(l, r))
        }
    }
}

impl<'s, T: VectorKind + Integer> RValue<'s, T> {
    /// Shift every lane left by the same amount.
    pub fn shl_all(self, amount: u32) -> Self {
        let amount = self.uniform_amount(amount);
        self.zip(amount, "shl", |b, l, r| b.create_shl(l, r))
    }

    /// Shift every lane right (arithmetic for signed lanes) by the same amount.
    pub fn shr_all(self, amount: u32) -> Self {
        let amount = self.uniform_amount(amount);
        if T::TYPE.is_signed() {
            self.zip(amount, "ashr", |b, l, r| b.create_ashr(l, r))
        } else {
            self.zip(amount, "lshr", |b, l, r| b.create_lshr(l, r))
        }
    }

    fn uniform_amount(self, amount: u32) -> RValue<'s, UInt> {
        self.session().constant::<UInt>(amount)
    }
}

/// Operators taking a host literal on the right-hand side.
macro_rules! literal_rhs {
    ($kind:ident, $host:ty, [$($tr:ident :: $m:ident),*]) => {$(
        impl<'s> $tr<$host> for RValue<'s, $kind> {
            type Output = RValue<'s, $kind>;

            fn $m(self, rhs: $host) -> Self::Output {
                let rhs: RValue<'s, $kind> = rhs.into_rvalue(self.session());
                $tr::$m(self, rhs)
            }
        }
    )*};
}

/// Operators taking a host literal on the left-hand side.
macro_rules! literal_lhs {
    ($kind:ident, $host:ty, [$($tr:ident :: $m:ident),*]) => {$(
        impl<'s> $tr<RValue<'s, $kind>> for $host {
            type Output = RValue<'s, $kind>;

            fn $m(self, rhs: RValue<'s, $kind>) -> Self::Output {
                let lhs: RValue<'s, $kind> = self.into_rvalue(rhs.session());
                $tr::$m(lhs, rhs)
            }
        }
    )*};
}

macro_rules! integer_literals {
    ($($kind:ident: $host:ty),*) => {$(
        literal_rhs!($kind, $host, [
            Add::add, Sub::sub, Mul::mul, Div::div, Rem::rem,
            BitAnd::bitand, BitOr::bitor, BitXor::bitxor, Shl::shl, Shr::shr
        ]);
        literal_lhs!($kind, $host, [Add::add, Sub::sub, Mul::mul, BitAnd::bitand, BitOr::bitor]);
    )*};
}

macro_rules! vector_literals {
    ($($kind:ident: $host:ty),*) => {$(
        literal_rhs!($kind, $host, [
            Add::add, Sub::sub, Mul::mul, Div::div, Rem::rem,
            BitAnd::bitand, BitOr::bitor, BitXor::bitxor
        ]);
        literal_lhs!($kind, $host, [Add::add, Sub::sub, Mul::mul]);
    )*};
}

integer_literals!(
    Byte: u8, SByte: i8, Short: i16, UShort: u16,
    Int: i32, UInt: u32, Long: i64, ULong: u64
);

vector_literals!(
    Byte16: u8, SByte16: i8, Short8: i16, UShort8: u16,
    Int4: i32, UInt4: u32, Long2: i64, ULong2: u64,
    Byte8: u8, SByte8: i8, Short4: i16, UShort4: u16, Int2: i32, UInt2: u32
);

literal_rhs!(Bool, bool, [BitAnd::bitand, BitOr::bitor, BitXor::bitxor]);
literal_rhs!(Float, f32, [Add::add, Sub::sub, Mul::mul, Div::div, Rem::rem]);
literal_lhs!(Float, f32, [Add::add, Sub::sub, Mul::mul, Div::div]);
literal_rhs!(Float4, f32, [Add::add, Sub::sub, Mul::mul, Div::div, Rem::rem]);
literal_lhs!(Float4, f32, [Add::add, Sub::sub, Mul::mul, Div::div]);
literal_rhs!(Float2, f32, [Add::add, Sub::sub, Mul::mul, Div::div, Rem::rem]);
literal_lhs!(Float2, f32, [Add::add, Sub::sub, Mul::mul, Div::div]);
