// This module is the hub for Reactor's foundational pieces, shared by the typed expression
// layer, the control-flow constructs and every backend: the type descriptors, the backend
// seam and its opaque handles, the trace session that replaces ambient global state, the
// variable materialization protocol, configuration, and the error type.

//! Core Reactor infrastructure.
//!
//! # Key Components
//!
//! ## Types (`types`)
//! - Immutable scalar/vector descriptors with width, signedness and lanes
//!
//! ## Backend seam (`backend`)
//! - The `Backend` trait: one creation method per instruction kind
//! - Opaque `Value` and `BasicBlock` handles
//!
//! ## Session (`session`)
//! - Owns the backend, block bookkeeping, constants and statistics
//! - Emits branches and returns, driving materialization
//!
//! ## Variables (`variable`)
//! - Pending set and lazy stack-slot allocation
//!
//! # Design Principles
//!
//! 1. **Explicit context**: all trace state hangs off one `Session`
//! 2. **Backend agnostic**: nothing above the seam names a code generator
//! 3. **Misuse panics**: only resource failures are `Result`s

pub mod backend;
pub mod config;
pub mod error;
pub mod session;
pub mod types;
pub mod variable;

pub use backend::{
    Backend,
    BasicBlock,
    CodeRange,
    CompiledCode,
    FloatPredicate,
    InsertPoint,
    IntPredicate,
    MathFunction,
    MemoryAccess,
    MemoryOrder,
    RoundingMode,
    Value,
};

pub use config::{Config, OptimizationLevel};

pub use error::{ReactorError, ReactorResult};

pub use session::{Session, SessionStats};

pub use types::{ScalarKind, Type};

pub use variable::{VariableId, VariableTable};
