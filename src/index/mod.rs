//! Indexing for per-key lookups

pub mod key;

pub use key::*;
