//! `textsift` CLI crate (library surface).
//!
//! The primary entrypoint is the `textsift` binary. These re-exports let callers
//! reach the pipeline without depending on internal crate layout.

pub use textsift_core as core;
pub use textsift_local as local;
