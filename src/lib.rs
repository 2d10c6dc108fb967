//! Core in-memory IR for a differentiable tensor-program compiler: the
//! data model, the builder that constructs it, and the pretty-printer
//! that serializes it to a stable textual surface.
//!
//! Concrete optimization/transform passes, autodiff transformation
//! logic, code generation, and a textual parser are all out of scope —
//! this crate is the substrate those collaborators are built on top of.

pub mod arena;
pub mod builder;
pub mod error;
pub mod graph;
pub mod inst;
pub mod ir;
pub mod printer;
pub mod ty;
pub mod value;
pub mod verify;

pub use arena::{Arena, Id};
pub use builder::Builder;
pub use error::{BuilderError, VerificationError};
pub use ir::Module;
pub use verify::Verifier;
