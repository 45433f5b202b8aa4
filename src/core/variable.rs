// This module implements the variable materialization protocol. A declared variable starts
// out unmaterialized: stores only replace a cached block-local value, loads return that
// cached value, and the variable sits in the session's pending set. A variable is
// materialized (given a stack slot, with the cached value stored into it) on its first
// address use, on a load with no cached value, or when the session materializes all pending
// variables, which happens before every branch and every block switch. That guarantees a
// value assigned in one block is read back through memory in any later block. Returns
// discard the pending set instead, since nothing after a return can observe the cached
// values. With materialize_on_definition set the slot is allocated at declaration and every
// access goes through memory; both policies compute the same results.

//! Variable table and materialization protocol.

use super::backend::{MemoryAccess, Value};
use super::session::Session;
use super::types::Type;
use hashbrown::HashMap;

/// Identity of a declared variable within its session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VariableId(u32);

#[derive(Debug)]
struct VariableSlot {
    ty: Type,
    array_size: usize,
    /// Cached value while unmaterialized.
    rvalue: Option<Value>,
    /// Stack slot address once materialized.
    address: Option<Value>,
}

/// All variables of a session plus the pending set, keyed by identity.
#[derive(Debug, Default)]
pub struct VariableTable {
    slots: Vec<VariableSlot>,
    /// Unmaterialized variables and their declaration order.
    pending: HashMap<VariableId, u64>,
    next_order: u64,
}

impl VariableTable {
    fn declare(&mut self, ty: Type, array_size: usize) -> VariableId {
        let id = VariableId(self.slots.len() as u32);
        self.slots.push(VariableSlot {
            ty,
            array_size,
            rvalue: None,
            address: None,
        });
        id
    }

    fn add_pending(&mut self, id: VariableId) {
        self.pending.insert(id, self.next_order);
        self.next_order += 1;
    }

    /// Pending variables in declaration order.
    fn pending_in_order(&self) -> Vec<VariableId> {
        let mut pending: Vec<_> = self.pending.iter().map(|(&id, &order)| (order, id)).collect();
        pending.sort_unstable();
        pending.into_iter().map(|(_, id)| id).collect()
    }

    /// Drop the pending set and the values it cached. Returns how many were dropped.
    pub(crate) fn clear_pending(&mut self) -> usize {
        let count = self.pending.len();
        for (id, _) in self.pending.drain() {
            self.slots[id.0 as usize].rvalue = None;
        }
        count
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn is_pending(&self, id: VariableId) -> bool {
        self.pending.contains_key(&id)
    }

    pub fn is_materialized(&self, id: VariableId) -> bool {
        self.slots[id.0 as usize].address.is_some()
    }

    pub fn ty(&self, id: VariableId) -> Type {
        self.slots[id.0 as usize].ty
    }
}

impl Session {
    /// Register a new variable; it joins the pending set unless materialized eagerly.
    pub(crate) fn declare_variable(&self, ty: Type, array_size: usize) -> VariableId {
        let id = self.variables.borrow_mut().declare(ty, array_size);
        self.record_declared();

        if self.config().materialize_on_definition {
            self.materialize_variable(id);
        } else {
            self.variables.borrow_mut().add_pending(id);
        }
        id
    }

    /// Give `id` a stack slot if it has none and flush its cached value into it.
    pub(crate) fn materialize_variable(&self, id: VariableId) -> Value {
        let (ty, array_size, address, rvalue) = {
            let mut table = self.variables.borrow_mut();
            table.pending.remove(&id);
            let slot = &mut table.slots[id.0 as usize];
            (slot.ty, slot.array_size, slot.address, slot.rvalue.take())
        };

        if let Some(address) = address {
            return address;
        }

        let address = self.allocate_stack(ty, array_size);
        self.variables.borrow_mut().slots[id.0 as usize].address = Some(address);
        self.record_materialized();
        self.debug_variable(address);
        log::trace!("materialized variable {:?} ({}) at {}", id, ty, address);

        if let Some(value) = rvalue {
            self.instr_void("store", &[value], |backend| {
                backend.create_store(value, address, ty, MemoryAccess::default())
            });
        }
        address
    }

    /// Materialize every pending variable, in declaration order.
    pub fn materialize_all(&self) {
        let pending = self.variables.borrow().pending_in_order();
        if pending.is_empty() {
            return;
        }
        log::trace!("materializing {} pending variables", pending.len());
        for id in pending {
            self.materialize_variable(id);
        }
    }

    /// Forget every pending variable without giving it storage.
    ///
    /// A variable dropped this way reads as undefined until stored to again.
    pub fn kill_unmaterialized(&self) {
        let count = self.variables.borrow_mut().clear_pending();
        if count > 0 {
            log::trace!("discarded {} pending variables", count);
            self.record_discarded(count);
        }
    }

    pub(crate) fn load_variable(&self, id: VariableId) -> Value {
        let (ty, rvalue, address) = {
            let table = self.variables.borrow();
            let slot = &table.slots[id.0 as usize];
            (slot.ty, slot.rvalue, slot.address)
        };

        if let Some(value) = rvalue {
            return value;
        }

        // Read before any write: give it storage and load whatever is there.
        let address = match address {
            Some(address) => address,
            None => self.materialize_variable(id),
        };
        self.instr("load", &[], |backend| {
            backend.create_load(address, ty, MemoryAccess::default())
        })
    }

    pub(crate) fn store_variable(&self, id: VariableId, value: Value) {
        let (ty, address) = {
            let table = self.variables.borrow();
            let slot = &table.slots[id.0 as usize];
            (slot.ty, slot.address)
        };

        match address {
            Some(address) => self.instr_void("store", &[value], |backend| {
                backend.create_store(value, address, ty, MemoryAccess::default())
            }),
            None => {
                self.check_operands(&[value]);
                let mut table = self.variables.borrow_mut();
                table.slots[id.0 as usize].rvalue = Some(value);
                if !table.is_pending(id) {
                    // Killed by a return; track it again.
                    table.add_pending(id);
                }
            }
        }
    }

    pub(crate) fn variable_address(&self, id: VariableId) -> Value {
        self.materialize_variable(id)
    }

    /// The host-side variable went out of scope.
    pub(crate) fn release_variable(&self, id: VariableId) {
        let mut table = self.variables.borrow_mut();
        table.pending.remove(&id);
        table.slots[id.0 as usize].rvalue = None;
    }

    pub fn pending_variable_count(&self) -> usize {
        self.variables.borrow().pending_count()
    }

    pub fn is_variable_materialized(&self, id: VariableId) -> bool {
        self.variables.borrow().is_materialized(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pending_order_follows_declaration() {
        let mut table = VariableTable::default();
        let a = table.declare(Type::I32, 0);
        let b = table.declare(Type::F32, 0);
        let c = table.declare(Type::I32X4, 0);
        table.add_pending(c);
        table.add_pending(a);
        table.add_pending(b);

        assert_eq!(table.pending_in_order(), vec![c, a, b]);
        assert_eq!(table.pending_count(), 3);
    }

    #[test]
    fn test_clear_pending_drops_cached_values() {
        let mut table = VariableTable::default();
        let a = table.declare(Type::I32, 0);
        table.add_pending(a);
        table.slots[0].rvalue = Some(Value::new(7));

        assert_eq!(table.clear_pending(), 1);
        assert!(!table.is_pending(a));
        assert!(table.slots[0].rvalue.is_none());
        assert!(!table.is_materialized(a));
    }
}
