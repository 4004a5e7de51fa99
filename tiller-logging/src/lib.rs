//! Structured logging initialization for Tiller
//!
//! Every crate logs through `tracing`; this crate installs the global
//! subscriber once, driven by [`tiller_config::LoggingConfig`].

pub mod init;

pub use init::{build_filter, init_logging_from_config, init_simple_tracing};
