//! The crate's error taxonomy: failures the builder rejects eagerly
//! ([`BuilderError`]) versus failures only a pass over a finished
//! [`crate::ir::Module`] can find ([`VerificationError`]).

use thiserror::Error;

/// An error raised synchronously by a [`crate::builder::Builder`] call.
/// The builder never lets one of these conditions into the IR; it
/// returns the error instead and leaves the module unchanged.
#[derive(Debug, Error)]
pub enum BuilderError {
    #[error("no current basic block to insert into")]
    NoInsertionPoint,

    #[error("name `{name}` is already in scope in {scope}")]
    DuplicateName { scope: String, name: String },

    #[error("basic block `{0}` is not defined in the function being built against")]
    UnknownBasicBlock(String),

    #[error("function `{0}` is not defined in this module")]
    UnknownFunction(String),
}

/// An error found by [`crate::verify::Verifier`] walking a completed
/// module. Unlike [`BuilderError`], these describe a module that already
/// exists but violates one of the data model's invariants.
#[derive(Debug, Error)]
pub enum VerificationError {
    #[error("instruction `{instruction}` expects type `{expected}` but operand has type `{found}`")]
    TypeMismatch { instruction: String, expected: String, found: String },

    #[error("basic block `{0}` does not end in a terminator")]
    MalformedTerminator(String),

    #[error("use in `{user}` refers to `{referent}`, which is not reachable from this module")]
    DanglingUse { user: String, referent: String },
}
