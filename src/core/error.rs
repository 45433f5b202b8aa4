// This module defines the recoverable error type for Reactor using the thiserror crate.
// Misuse of the tracing vocabulary (operand type mismatches, lane indices out of range,
// values used outside their defining block) is a defect in the tracing code and panics
// at the point of misuse instead of surfacing here. What remains are failures that can
// legitimately happen at run time: the host ISA cannot be detected, the backend rejects
// the function it was handed, the JIT cannot allocate or finalize executable memory, or an
// object file cannot be written. ReactorResult<T> is the matching Result alias.

//! Error types for routine construction.
//!
//! Using thiserror for idiomatic error handling.

use thiserror::Error;

/// Errors surfaced while finalizing or exporting a routine.
#[derive(Error, Debug)]
pub enum ReactorError {
    #[error("Unsupported host target: {reason}")]
    UnsupportedTarget { reason: String },

    #[error("Invalid backend setting {name}: {reason}")]
    InvalidSetting { name: &'static str, reason: String },

    #[error("Code generation failed for {routine}: {reason}")]
    CodeGeneration { routine: String, reason: String },

    #[error("Executable memory allocation failed for {routine}: {reason}")]
    Allocation { routine: String, reason: String },

    #[error("Object emission failed: {reason}")]
    ObjectEmission { reason: String },

    #[error("Disassembly is not available for {arch}")]
    UnsupportedDisassembly { arch: &'static str },
}

/// Result type alias for routine construction.
pub type ReactorResult<T> = Result<T, ReactorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = ReactorError::Allocation {
            routine: "blend".to_string(),
            reason: "out of memory".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Executable memory allocation failed for blend: out of memory"
        );

        let err = ReactorError::InvalidSetting {
            name: "opt_level",
            reason: "unknown".to_string(),
        };
        assert!(err.to_string().contains("opt_level"));
    }
}
