// This module holds the typed front of the variable protocol. Variable<T> is a mutable,
// host-scoped slot in the traced function; it is the only way a value computed in one block
// can be observed from another. Loads and stores go through the session's variable table,
// which decides between the cached block-local value and the stack slot. Taking the address
// of a variable materializes it. Array<T> is a fixed-size stack array of T; its elements are
// only ever accessed through memory, so an array is materialized on its first indexing.
// Dropping either releases the table entry: the slot stays in the frame but is no longer
// part of the pending set.

//! Typed variables and arrays.

use super::kinds::Int;
use super::pointer::{Pointer, Reference};
use super::{IntoRValue, RValue, ReactorType};
use crate::core::{Session, VariableId};
use std::fmt;
use std::marker::PhantomData;

/// A mutable `T` local to the traced function.
pub struct Variable<'s, T> {
    session: &'s Session,
    id: VariableId,
    _marker: PhantomData<fn() -> T>,
}

impl<'s, T: ReactorType> Variable<'s, T> {
    pub fn new(session: &'s Session) -> Self {
        let id = session.declare_variable(T::TYPE, 0);
        Self {
            session,
            id,
            _marker: PhantomData,
        }
    }

    pub fn id(&self) -> VariableId {
        self.id
    }

    pub fn load(&self) -> RValue<'s, T> {
        let value = self.session.load_variable(self.id);
        RValue::from_value(self.session, value)
    }

    pub fn store(&self, value: impl IntoRValue<'s, T>) {
        let value = value.into_rvalue(self.session);
        assert!(
            std::ptr::eq(value.session(), self.session),
            "value stored into a variable of another session"
        );
        self.session.store_variable(self.id, value.value());
    }

    /// Replace the value with `f(current)`.
    pub fn update(&self, f: impl FnOnce(RValue<'s, T>) -> RValue<'s, T>) {
        self.store(f(self.load()));
    }

    /// The variable's stack address; forces materialization.
    pub fn address(&self) -> RValue<'s, Pointer<T>> {
        let address = self.session.variable_address(self.id);
        RValue::from_value(self.session, address)
    }

    pub fn is_materialized(&self) -> bool {
        self.session.is_variable_materialized(self.id)
    }
}

impl<'s, T> fmt::Debug for Variable<'s, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Variable({:?})", self.id)
    }
}

impl<'s, T> Drop for Variable<'s, T> {
    fn drop(&mut self) {
        self.session.release_variable(self.id);
    }
}

impl<'s, T: ReactorType> IntoRValue<'s, T> for &Variable<'s, T> {
    fn into_rvalue(self, _session: &'s Session) -> RValue<'s, T> {
        self.load()
    }
}

/// A fixed-size stack array of `T`.
pub struct Array<'s, T> {
    session: &'s Session,
    id: VariableId,
    len: usize,
    _marker: PhantomData<fn() -> T>,
}

impl<'s, T: ReactorType> Array<'s, T> {
    pub fn new(session: &'s Session, len: usize) -> Self {
        assert!(len > 0, "arrays hold at least one element");
        let id = session.declare_variable(T::TYPE, len);
        Self {
            session,
            id,
            len,
            _marker: PhantomData,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn base(&self) -> RValue<'s, Pointer<T>> {
        let address = self.session.variable_address(self.id);
        RValue::from_value(self.session, address)
    }

    /// Element `index`; not bounds checked at run time.
    pub fn index(&self, index: impl IntoRValue<'s, Int>) -> Reference<'s, T> {
        self.base().index(index)
    }

    /// Element at a constant index, checked while tracing.
    pub fn element(&self, index: usize) -> Reference<'s, T> {
        assert!(index < self.len, "index {index} out of bounds for array of {}", self.len);
        self.base().element(index as i32)
    }

    pub fn load(&self, index: impl IntoRValue<'s, Int>) -> RValue<'s, T> {
        self.index(index).load()
    }

    pub fn store(&self, index: impl IntoRValue<'s, Int>, value: impl IntoRValue<'s, T>) {
        self.index(index).store(value)
    }
}

impl<'s, T> Drop for Array<'s, T> {
    fn drop(&mut self) {
        self.session.release_variable(self.id);
    }
}

impl Session {
    /// Declare an uninitialized variable.
    pub fn var<T: ReactorType>(&self) -> Variable<'_, T> {
        Variable::new(self)
    }

    /// Declare a variable holding `value`.
    pub fn var_init<'s, T: ReactorType>(&'s self, value: impl IntoRValue<'s, T>) -> Variable<'s, T> {
        let variable = Variable::new(self);
        variable.store(value);
        variable
    }

    pub fn array<T: ReactorType>(&self, len: usize) -> Array<'_, T> {
        Array::new(self, len)
    }
}
