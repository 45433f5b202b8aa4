//! Reactor - embedded JIT code generation.
//!
//! Host code traces scalar and SIMD computations through typed values,
//! variables and structured control flow; the trace is lowered by a backend
//! into a native routine that can be called like any C function.
//!
//! # Primary Usage
//!
//! ```ignore
//! use reactor::{Function, Int};
//!
//! let f = Function::<unsafe extern "C" fn(i32) -> i32>::new()?;
//! let x = f.arg::<Int>(0).rvalue();
//! let result = f.var::<Int>();
//! result.store(x);
//! f.if_then(x.lt(0), || result.store(-x));
//! f.ret(&result);
//!
//! let routine = f.finalize("abs")?;
//! assert_eq!(unsafe { routine.function()(-5) }, 5);
//! ```
//!
//! # Architecture
//!
//! - [`core`] - Session, backend seam, types, variables, configuration
//! - [`expr`] - Typed values, operators, vectors, pointers, atomics
//! - [`control`] - If/else, loops, switch and return
//! - [`routine`] - Typed functions and finalized routines
//! - [`cranelift`] - Cranelift implementation of the backend seam
//! - `print` - Run-time printing of traced values (feature `print`)
//! - `debug` - Host backtrace driven debug info (feature `debug-info`)
//! - [`disasm`], [`elf`] - Inspection of finalized routines

pub mod control;
pub mod core;
pub mod cranelift;
pub mod disasm;
pub mod elf;
pub mod expr;
pub mod routine;

#[cfg(feature = "print")]
pub mod print;

#[cfg(feature = "debug-info")]
pub mod debug;

pub use self::core::{
    // Backend seam
    Backend, BasicBlock, MemoryOrder, Value,
    // Session management
    Config, OptimizationLevel, ReactorError, ReactorResult, Session, SessionStats, Type,
};
pub use control::IfElse;
pub use cranelift::CraneliftBackend;
pub use disasm::DisassembledInstruction;
pub use expr::{
    Argument, Array, Bool, Byte, Byte16, Byte8, Float, Float2, Float4, Half, Int, Int2, Int4, IntoRValue, Long,
    Long2, Pointer, RValue, ReactorType, Reference, SByte, SByte16, SByte8, Short, Short4, Short8, UInt, UInt2,
    UInt4, ULong, ULong2, UShort, UShort4, UShort8, Variable,
};
pub use routine::{Function, HostFunction, Routine, RoutineT};
