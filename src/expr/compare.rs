// This module provides comparisons. Rust's comparison operators must return bool, so the
// traced comparisons are methods: eq, ne, lt, le, gt, ge. Scalars produce a Bool; vectors
// produce an integer mask of the same lane shape whose lanes are all ones where the
// comparison holds and zero elsewhere (Float4 compares into an Int4, Float2 into an Int2).
// Integer predicates follow the kind's signedness. Scalar float comparisons are ordered
// (false on NaN) except ne on vectors, which is unordered so that a NaN lane compares
// unequal to everything; compare_float exposes every predicate for the cases that need the
// other flavour.

//! Comparison methods.

use super::kinds::{Comparable, FloatKind};
use super::{IntoRValue, RValue};
use crate::core::{FloatPredicate, IntPredicate};

impl<'s, T: Comparable> RValue<'s, T> {
    pub fn eq(self, rhs: impl IntoRValue<'s, T>) -> RValue<'s, T::Output> {
        self.compare(rhs, IntPredicate::Eq, IntPredicate::Eq, FloatPredicate::Oeq)
    }

    pub fn ne(self, rhs: impl IntoRValue<'s, T>) -> RValue<'s, T::Output> {
        let float = if T::TYPE.is_vector() {
            FloatPredicate::Une
        } else {
            FloatPredicate::One
        };
        self.compare(rhs, IntPredicate::Ne, IntPredicate::Ne, float)
    }

    pub fn lt(self, rhs: impl IntoRValue<'s, T>) -> RValue<'s, T::Output> {
        self.compare(rhs, IntPredicate::Slt, IntPredicate::Ult, FloatPredicate::Olt)
    }

    pub fn le(self, rhs: impl IntoRValue<'s, T>) -> RValue<'s, T::Output> {
        self.compare(rhs, IntPredicate::Sle, IntPredicate::Ule, FloatPredicate::Ole)
    }

    pub fn gt(self, rhs: impl IntoRValue<'s, T>) -> RValue<'s, T::Output> {
        self.compare(rhs, IntPredicate::Sgt, IntPredicate::Ugt, FloatPredicate::Ogt)
    }

    pub fn ge(self, rhs: impl IntoRValue<'s, T>) -> RValue<'s, T::Output> {
        self.compare(rhs, IntPredicate::Sge, IntPredicate::Uge, FloatPredicate::Oge)
    }

    fn compare(
        self,
        rhs: impl IntoRValue<'s, T>,
        signed: IntPredicate,
        unsigned: IntPredicate,
        float: FloatPredicate,
    ) -> RValue<'s, T::Output> {
        let rhs = rhs.into_rvalue(self.session());
        if T::TYPE.is_float() {
            self.zip(rhs, "fcmp", |b, l, r| b.create_fcmp(float, l, r))
        } else {
            let pred = if T::TYPE.is_signed() { signed } else { unsigned };
            self.zip(rhs, "icmp", |b, l, r| b.create_icmp(pred, l, r))
        }
    }
}

impl<'s, T: FloatKind + Comparable> RValue<'s, T> {
    /// Compare with an explicit predicate, ordered or unordered.
    pub fn compare_float(self, pred: FloatPredicate, rhs: impl IntoRValue<'s, T>) -> RValue<'s, T::Output> {
        let rhs = rhs.into_rvalue(self.session());
        self.zip(rhs, "fcmp", |b, l, r| b.create_fcmp(pred, l, r))
    }

    /// True (or all-ones) where the value is NaN.
    pub fn is_nan(self) -> RValue<'s, T::Output> {
        self.zip(self, "fcmp", |b, l, r| b.create_fcmp(FloatPredicate::Uno, l, r))
    }
}
