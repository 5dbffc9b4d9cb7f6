//! # EdgeSwarm IO
//!
//! Persistence layer for training runs and deployable controllers.
//!
//! This crate provides:
//! - Structured error handling with custom error types
//! - JSON and gzip-compressed JSON serialization
//! - A checkpoint store with integrity digests
//! - Parameter export as JSON and as a C header for firmware builds

/// Checkpoint files named by generation, with digest verification
pub mod checkpoint;
/// Error types and result aliases for I/O operations
pub mod error;
/// Exported parameter files (JSON and C header)
pub mod export;
/// Validated serialization helpers for JSON and gzip
pub mod serialization;

pub use checkpoint::CheckpointStore;
pub use error::{IoError, Result};
pub use export::{render_c_header, write_c_header, write_params_json};
pub use serialization::{
    from_json, read_json_file, read_json_gz, sha256_hex, to_json, to_json_pretty,
    write_json_file, write_json_gz,
};
