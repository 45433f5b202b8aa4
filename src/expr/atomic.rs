// This module exposes atomic memory operations on integer pointers, the standalone fence
// and the masked vector loads and stores. Every read-modify-write returns the value the
// location held before the operation. Min and max follow the signedness of the pointee
// kind. Each operation takes the MemoryOrder the caller needs; backends may implement a
// weaker request with a stronger ordering. Masked accesses touch only the lanes whose mask
// lane is non-zero; a masked load fills the other lanes with zero when asked to, otherwise
// their contents are unspecified.

//! Atomics, fences and masked memory access.

use super::kinds::{Integer, VectorKind};
use super::pointer::Pointer;
use super::{IntoRValue, RValue, ReactorType};
use crate::core::{Backend, MemoryOrder, Session, Value};

type RmwFn = fn(&mut dyn Backend, Value, Value, MemoryOrder) -> Value;

impl<'s, T: Integer> RValue<'s, Pointer<T>> {
    pub fn atomic_add(self, value: impl IntoRValue<'s, T>, order: MemoryOrder) -> RValue<'s, T> {
        self.rmw("atomicadd", value, order, |b, p, v, o| b.create_atomic_add(p, v, o))
    }

    pub fn atomic_sub(self, value: impl IntoRValue<'s, T>, order: MemoryOrder) -> RValue<'s, T> {
        self.rmw("atomicsub", value, order, |b, p, v, o| b.create_atomic_sub(p, v, o))
    }

    pub fn atomic_and(self, value: impl IntoRValue<'s, T>, order: MemoryOrder) -> RValue<'s, T> {
        self.rmw("atomicand", value, order, |b, p, v, o| b.create_atomic_and(p, v, o))
    }

    pub fn atomic_or(self, value: impl IntoRValue<'s, T>, order: MemoryOrder) -> RValue<'s, T> {
        self.rmw("atomicor", value, order, |b, p, v, o| b.create_atomic_or(p, v, o))
    }

    pub fn atomic_xor(self, value: impl IntoRValue<'s, T>, order: MemoryOrder) -> RValue<'s, T> {
        self.rmw("atomicxor", value, order, |b, p, v, o| b.create_atomic_xor(p, v, o))
    }

    pub fn atomic_min(self, value: impl IntoRValue<'s, T>, order: MemoryOrder) -> RValue<'s, T> {
        if T::TYPE.is_signed() {
            self.rmw("atomicmin", value, order, |b, p, v, o| b.create_atomic_min(p, v, o))
        } else {
            self.rmw("atomicumin", value, order, |b, p, v, o| b.create_atomic_umin(p, v, o))
        }
    }

    pub fn atomic_max(self, value: impl IntoRValue<'s, T>, order: MemoryOrder) -> RValue<'s, T> {
        if T::TYPE.is_signed() {
            self.rmw("atomicmax", value, order, |b, p, v, o| b.create_atomic_max(p, v, o))
        } else {
            self.rmw("atomicumax", value, order, |b, p, v, o| b.create_atomic_umax(p, v, o))
        }
    }

    pub fn atomic_exchange(self, value: impl IntoRValue<'s, T>, order: MemoryOrder) -> RValue<'s, T> {
        self.rmw("atomicxchg", value, order, |b, p, v, o| b.create_atomic_exchange(p, v, o))
    }

    /// Store `value` if the location holds `compare`; returns the previous contents.
    pub fn compare_exchange(
        self,
        value: impl IntoRValue<'s, T>,
        compare: impl IntoRValue<'s, T>,
        order_equal: MemoryOrder,
        order_unequal: MemoryOrder,
    ) -> RValue<'s, T> {
        let session = self.session();
        let ptr = self.value();
        let value = value.into_rvalue(session).value();
        let compare = compare.into_rvalue(session).value();
        let result = session.instr("cmpxchg", &[ptr, value, compare], |b| {
            b.create_atomic_compare_exchange(ptr, value, compare, order_equal, order_unequal)
        });
        RValue::from_value(session, result)
    }

    fn rmw(self, op: &'static str, value: impl IntoRValue<'s, T>, order: MemoryOrder, f: RmwFn) -> RValue<'s, T> {
        assert!(!T::TYPE.is_vector() && !T::TYPE.is_bool(), "atomics take scalar integers, got {}", T::TYPE);
        let session = self.session();
        let ptr = self.value();
        let value = value.into_rvalue(session).value();
        let result = session.instr(op, &[ptr, value], |b| f(b, ptr, value, order));
        RValue::from_value(session, result)
    }
}

impl<'s, V: VectorKind> RValue<'s, Pointer<V>> {
    /// Load the lanes selected by `mask`.
    pub fn masked_load(self, mask: impl IntoRValue<'s, V::Mask>, alignment: u32, zero_masked: bool) -> RValue<'s, V> {
        let session = self.session();
        let ptr = self.value();
        let mask = mask.into_rvalue(session).value();
        let result = session.instr("maskedload", &[ptr, mask], |b| {
            b.create_masked_load(ptr, V::TYPE, mask, alignment, zero_masked)
        });
        RValue::from_value(session, result)
    }

    /// Store the lanes of `value` selected by `mask`.
    pub fn masked_store(self, value: impl IntoRValue<'s, V>, mask: impl IntoRValue<'s, V::Mask>, alignment: u32) {
        let session = self.session();
        let ptr = self.value();
        let value = value.into_rvalue(session).value();
        let mask = mask.into_rvalue(session).value();
        session.instr_void("maskedstore", &[ptr, value, mask], |b| {
            b.create_masked_store(ptr, value, mask, alignment)
        });
    }
}

impl Session {
    /// A memory fence with the given ordering.
    pub fn fence(&self, order: MemoryOrder) {
        self.instr_void("fence", &[], |b| b.create_fence(order));
    }
}
