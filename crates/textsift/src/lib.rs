//! Public facade crate for `textsift`.
//!
//! This crate contains no IO or backend-specific logic.
//! It re-exports the backend-agnostic types/traits from `textsift-core`.

pub use textsift_core::*;
