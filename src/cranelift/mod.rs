// This module is the Cranelift implementation of the backend seam. CraneliftBackend builds
// one cranelift_codegen::ir::Function per session directly through position-based cursors,
// so the session can reopen a block or insert at an earlier saved point without a frontend
// builder. Block-free values (constants, stack slot addresses) are recorded symbolically and
// rematerialized in each block that uses them, which keeps every use dominated by its
// definition. Operations the host ISA has no vector form for are expanded lane by lane.
// 64-bit packs use the 128-bit register types and only touch 8 bytes of memory. The
// jit submodule owns ISA selection from the session Config and turns the finished function
// into executable memory with cranelift-jit.

//! Cranelift backend.
//!
//! - `backend`: the `Backend` implementation and value bookkeeping
//! - `lower`: expansions for operations without a direct instruction
//! - `jit`: host ISA selection and executable code emission

pub mod backend;
pub mod jit;
mod lower;

pub use backend::CraneliftBackend;

use crate::core::{ScalarKind, Type};
use cranelift_codegen::ir::types;

/// Cranelift type for a Reactor type on a target with `pointer` sized addresses.
pub(crate) fn cl_type(ty: Type, pointer: types::Type) -> types::Type {
    let scalar = match ty.kind() {
        ScalarKind::Bool | ScalarKind::I8 | ScalarKind::U8 => types::I8,
        ScalarKind::I16 | ScalarKind::U16 | ScalarKind::F16 => types::I16,
        ScalarKind::I32 | ScalarKind::U32 => types::I32,
        ScalarKind::I64 | ScalarKind::U64 => types::I64,
        ScalarKind::F32 => types::F32,
        ScalarKind::Ptr => pointer,
    };
    if ty.is_vector() {
        // 64-bit packs occupy the low lanes of a full register.
        match scalar.by(128 / scalar.bits()) {
            Some(vector) => vector,
            None => panic!("no Cranelift vector type for {ty}"),
        }
    } else {
        scalar
    }
}

/// `value` truncated to the low `bits`, as the immediate Cranelift expects.
pub(crate) fn mask_immediate(value: i64, bits: u32) -> i64 {
    if bits >= 64 {
        value
    } else {
        ((value as u64) & ((1u64 << bits) - 1)) as i64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_mapping() {
        assert_eq!(cl_type(Type::BOOL, types::I64), types::I8);
        assert_eq!(cl_type(Type::U16, types::I64), types::I16);
        assert_eq!(cl_type(Type::F16, types::I64), types::I16);
        assert_eq!(cl_type(Type::PTR, types::I64), types::I64);
        assert_eq!(cl_type(Type::U8X16, types::I64), types::I8X16);
        assert_eq!(cl_type(Type::F32X4, types::I64), types::F32X4);
        assert_eq!(cl_type(Type::I64X2, types::I64), types::I64X2);
        assert_eq!(cl_type(Type::U64X2, types::I64), types::I64X2);
        assert_eq!(cl_type(Type::U8X8, types::I64), types::I8X16);
        assert_eq!(cl_type(Type::I16X4, types::I64), types::I16X8);
        assert_eq!(cl_type(Type::F32X2, types::I64), types::F32X4);
    }

    #[test]
    fn test_immediate_masking() {
        assert_eq!(mask_immediate(-1, 8), 0xFF);
        assert_eq!(mask_immediate(-1, 32), 0xFFFF_FFFF);
        assert_eq!(mask_immediate(-1, 64), -1);
        assert_eq!(mask_immediate(0x1234, 8), 0x34);
    }
}
