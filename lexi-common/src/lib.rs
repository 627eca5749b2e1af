//! Shared infrastructure for the Lexi workspace.
//!
//! Currently this is observability only: a centralised `tracing`
//! initialiser that every binary and integration test can call without
//! worrying about double-initialisation. Keep this crate light so that
//! everything can depend on it.

pub mod observability;

pub use observability::{init_logging, LogConfig, LogFormat};
