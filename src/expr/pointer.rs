// This module holds the typed address wrappers. Pointer<T> is a kind marker whose values are
// addresses; pointer values support element-indexed and byte-offset address computation and
// indirection. Reference<T> is the result of indirection: an address plus an alignment that
// can be loaded into an RValue or stored into, atomically when asked. Adding an Int to a
// pointer offsets it by that many bytes, while index/element scale by the element size.
// Argument<T> binds one routine parameter; its position and kind are checked against the
// signature the routine was declared with.

//! Pointers, references and arguments.

use super::kinds::{Bool, Comparable, Int};
use super::{IntoRValue, RValue, ReactorType};
use crate::core::{MemoryAccess, MemoryOrder, Session, Type, Value};
use std::marker::PhantomData;
use std::ops::Add;

/// Address of a `T`.
pub struct Pointer<T>(PhantomData<fn() -> T>);

impl<T: ReactorType> ReactorType for Pointer<T> {
    const TYPE: Type = Type::PTR;
}

impl<T: ReactorType> Comparable for Pointer<T> {
    type Output = Bool;
}

impl<T: ReactorType> Pointer<T> {
    pub fn null(session: &Session) -> RValue<'_, Pointer<T>> {
        let value = session.free_value(|backend| backend.create_null_value(Type::PTR));
        RValue::from_value(session, value)
    }

    /// A pointer to a fixed host address.
    pub fn from_address(session: &Session, address: usize) -> RValue<'_, Pointer<T>> {
        let value = session.free_value(|backend| backend.create_constant_pointer(address));
        RValue::from_value(session, value)
    }
}

impl<'s, T: ReactorType> RValue<'s, Pointer<T>> {
    /// The pointee, with natural alignment.
    pub fn deref(self) -> Reference<'s, T> {
        Reference::new(self.session(), self.value(), T::TYPE.alignment())
    }

    /// The pointee, with an explicit byte alignment.
    pub fn deref_aligned(self, alignment: u32) -> Reference<'s, T> {
        Reference::new(self.session(), self.value(), alignment)
    }

    pub fn load(self) -> RValue<'s, T> {
        self.deref().load()
    }

    pub fn store(self, value: impl IntoRValue<'s, T>) {
        self.deref().store(value)
    }

    /// `self[index]`, scaled by the element size.
    pub fn index(self, index: impl IntoRValue<'s, Int>) -> Reference<'s, T> {
        let index = index.into_rvalue(self.session());
        let address = self.gep(T::TYPE, index.value(), false);
        Reference::new(self.session(), address, T::TYPE.alignment())
    }

    /// `self[index]` for a constant index.
    pub fn element(self, index: i32) -> Reference<'s, T> {
        self.index(index)
    }

    /// Advance by `bytes`.
    pub fn offset(self, bytes: impl IntoRValue<'s, Int>) -> RValue<'s, Pointer<T>> {
        let bytes = bytes.into_rvalue(self.session());
        let address = self.gep(Type::U8, bytes.value(), false);
        RValue::from_value(self.session(), address)
    }

    /// Reinterpret as a pointer to another kind.
    pub fn as_pointer<U: ReactorType>(self) -> RValue<'s, Pointer<U>> {
        RValue::from_value(self.session(), self.value())
    }

    fn gep(self, ty: Type, index: Value, unsigned: bool) -> Value {
        let ptr = self.value();
        self.session().instr("gep", &[ptr, index], |backend| {
            backend.create_gep(ptr, ty, index, unsigned)
        })
    }
}

impl<'s, T: ReactorType> Add<RValue<'s, Int>> for RValue<'s, Pointer<T>> {
    type Output = Self;

    /// Byte offset.
    fn add(self, bytes: RValue<'s, Int>) -> Self {
        self.offset(bytes)
    }
}

impl<'s, T: ReactorType> Add<i32> for RValue<'s, Pointer<T>> {
    type Output = Self;

    fn add(self, bytes: i32) -> Self {
        self.offset(bytes)
    }
}

/// An addressable `T`.
pub struct Reference<'s, T> {
    session: &'s Session,
    address: Value,
    alignment: u32,
    _marker: PhantomData<fn() -> T>,
}

impl<'s, T> Clone for Reference<'s, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<'s, T> Copy for Reference<'s, T> {}

impl<'s, T: ReactorType> Reference<'s, T> {
    pub(crate) fn new(session: &'s Session, address: Value, alignment: u32) -> Self {
        Self {
            session,
            address,
            alignment,
            _marker: PhantomData,
        }
    }

    pub fn address(self) -> RValue<'s, Pointer<T>> {
        RValue::from_value(self.session, self.address)
    }

    pub fn load(self) -> RValue<'s, T> {
        self.load_with(MemoryAccess {
            alignment: self.alignment,
            ..MemoryAccess::default()
        })
    }

    pub fn store(self, value: impl IntoRValue<'s, T>) {
        self.store_with(value, MemoryAccess {
            alignment: self.alignment,
            ..MemoryAccess::default()
        })
    }

    pub fn load_volatile(self) -> RValue<'s, T> {
        self.load_with(MemoryAccess {
            volatile: true,
            alignment: self.alignment,
            order: None,
        })
    }

    pub fn load_atomic(self, order: MemoryOrder) -> RValue<'s, T> {
        assert!(!T::TYPE.is_vector() && !T::TYPE.is_float(), "atomic loads take integer kinds");
        self.load_with(MemoryAccess::atomic(order))
    }

    pub fn store_atomic(self, value: impl IntoRValue<'s, T>, order: MemoryOrder) {
        assert!(!T::TYPE.is_vector() && !T::TYPE.is_float(), "atomic stores take integer kinds");
        self.store_with(value, MemoryAccess::atomic(order))
    }

    fn load_with(self, access: MemoryAccess) -> RValue<'s, T> {
        let address = self.address;
        let value = self.session.instr("load", &[address], |backend| {
            backend.create_load(address, T::TYPE, access)
        });
        RValue::from_value(self.session, value)
    }

    fn store_with(self, value: impl IntoRValue<'s, T>, access: MemoryAccess) {
        let value = value.into_rvalue(self.session).value();
        let address = self.address;
        self.session.instr_void("store", &[value, address], |backend| {
            backend.create_store(value, address, T::TYPE, access)
        });
    }
}

impl<'s, T: ReactorType> IntoRValue<'s, T> for Reference<'s, T> {
    fn into_rvalue(self, _session: &'s Session) -> RValue<'s, T> {
        self.load()
    }
}

/// Routine parameter `index` of kind `T`.
pub struct Argument<'s, T> {
    value: RValue<'s, T>,
    index: usize,
}

impl<'s, T> Clone for Argument<'s, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<'s, T> Copy for Argument<'s, T> {}

impl<'s, T: ReactorType> Argument<'s, T> {
    pub fn rvalue(self) -> RValue<'s, T> {
        self.value
    }

    pub fn index(self) -> usize {
        self.index
    }
}

impl<'s, T: ReactorType> IntoRValue<'s, T> for Argument<'s, T> {
    fn into_rvalue(self, _session: &'s Session) -> RValue<'s, T> {
        self.value
    }
}

impl Session {
    /// Bind parameter `index`; panics if the signature declares another kind there.
    pub fn arg<T: ReactorType>(&self, index: usize) -> Argument<'_, T> {
        let value = self.argument(index, T::TYPE);
        Argument {
            value: RValue::from_value(self, value),
            index,
        }
    }
}
