// This module is the typed expression vocabulary that tracing code is written in. RValue<T>
// wraps a single backend value together with the session it belongs to; T is a zero-sized
// kind marker (Int, Float4, Pointer<Byte>, ...) that fixes which operators, casts and lane
// operations are available. Every operator emits its backend instruction immediately
// through the session; nothing is buffered or folded at this level. Literal host values
// (an i32 for Int, an f32 or [f32; 4] for Float4) convert into constants through the
// Literal and IntoRValue traits, which is also what lets variables be stored from plain
// numbers. The submodules add the kind markers, operator implementations, comparisons,
// casts, vector lane operations, math helpers, pointers/references, typed variables and
// atomics.

//! Typed values and operators.

pub mod arith;
pub mod atomic;
pub mod cast;
pub mod compare;
pub mod kinds;
pub mod math;
pub mod pointer;
pub mod variable;
pub mod vector;

use crate::core::{Backend, Session, Type, Value};
use std::fmt;
use std::marker::PhantomData;

pub use kinds::*;
pub use pointer::{Argument, Pointer, Reference};
pub use variable::{Array, Variable};

/// A traceable kind with a fixed backend type.
pub trait ReactorType: 'static {
    const TYPE: Type;
}

/// Kinds that can be spelled as host literals.
pub trait Literal: ReactorType + Sized {
    type Host: Copy;

    fn constant(session: &Session, value: Self::Host) -> Value;
}

/// Anything that can stand in for an `RValue<T>`: values, variables, references, literals.
pub trait IntoRValue<'s, T: ReactorType> {
    fn into_rvalue(self, session: &'s Session) -> RValue<'s, T>;
}

/// An immutable typed value produced by an operator, a load or a constant.
pub struct RValue<'s, T> {
    session: &'s Session,
    value: Value,
    _marker: PhantomData<fn() -> T>,
}

impl<'s, T> Clone for RValue<'s, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<'s, T> Copy for RValue<'s, T> {}

impl<'s, T> fmt::Debug for RValue<'s, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RValue({})", self.value)
    }
}

impl<'s, T: ReactorType> RValue<'s, T> {
    /// Wrap a backend value of type `T::TYPE`.
    pub fn from_value(session: &'s Session, value: Value) -> Self {
        session.debug_variable(value);
        Self {
            session,
            value,
            _marker: PhantomData,
        }
    }

    pub fn value(self) -> Value {
        self.value
    }

    pub fn session(self) -> &'s Session {
        self.session
    }

    pub fn ty(self) -> Type {
        T::TYPE
    }

    /// Emit a unary instruction on `self`.
    pub(crate) fn map<U: ReactorType>(
        self,
        op: &'static str,
        f: impl FnOnce(&mut dyn Backend, Value) -> Value,
    ) -> RValue<'s, U> {
        let value = self.value;
        let result = self.session.instr(op, &[value], |backend| f(backend, value));
        RValue::from_value(self.session, result)
    }

    /// Emit a binary instruction on `self` and `rhs`.
    pub(crate) fn zip<U: ReactorType, V: ReactorType>(
        self,
        rhs: RValue<'s, V>,
        op: &'static str,
        f: impl FnOnce(&mut dyn Backend, Value, Value) -> Value,
    ) -> RValue<'s, U> {
        assert!(
            std::ptr::eq(self.session, rhs.session),
            "operands of {op} belong to different sessions"
        );
        let (lhs, rhs) = (self.value, rhs.value);
        let result = self.session.instr(op, &[lhs, rhs], |backend| f(backend, lhs, rhs));
        RValue::from_value(self.session, result)
    }
}

impl<'s, T: ReactorType> IntoRValue<'s, T> for RValue<'s, T> {
    fn into_rvalue(self, _session: &'s Session) -> RValue<'s, T> {
        self
    }
}

impl Session {
    /// A constant of kind `T`.
    pub fn constant<T: Literal>(&self, value: T::Host) -> RValue<'_, T> {
        RValue::from_value(self, T::constant(self, value))
    }

    /// Convert anything value-like into an `RValue`.
    pub fn rvalue<'s, T: ReactorType>(&'s self, value: impl IntoRValue<'s, T>) -> RValue<'s, T> {
        value.into_rvalue(self)
    }

    /// Scalar select: `cond ? if_true : if_false`.
    pub fn select<'s, T: ReactorType>(
        &'s self,
        cond: impl IntoRValue<'s, Bool>,
        if_true: impl IntoRValue<'s, T>,
        if_false: impl IntoRValue<'s, T>,
    ) -> RValue<'s, T> {
        let cond = cond.into_rvalue(self).value();
        let a = if_true.into_rvalue(self).value();
        let b = if_false.into_rvalue(self).value();
        let result = self.instr("select", &[cond, a, b], |backend| backend.create_select(cond, a, b));
        RValue::from_value(self, result)
    }

    /// Call the host function at `address` with the C ABI.
    ///
    /// # Safety
    ///
    /// `address` must be a function with exactly the parameter and return
    /// types given, alive for as long as the routine is used.
    pub unsafe fn call_host(
        &self,
        address: usize,
        params: &[Type],
        ret: Option<Type>,
        args: &[Value],
    ) -> Option<Value> {
        assert_eq!(params.len(), args.len(), "host call argument count mismatch");
        match ret {
            Some(ty) => Some(self.instr("call", args, |backend| {
                match backend.create_call(address, params, ret, args) {
                    Some(value) => value,
                    None => panic!("{} backend produced no {ty} call result", backend.name()),
                }
            })),
            None => {
                self.instr_void("call", args, |backend| {
                    backend.create_call(address, params, None, args);
                });
                None
            }
        }
    }
}
