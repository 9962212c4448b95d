//! Annoload Common Library
//!
//! Shared utilities and error handling for the annoload workspace.
//!
//! # Overview
//!
//! - **Error Handling**: Common error type and result alias
//! - **Checksums**: Content digests used for input fingerprints and shape hashing
//! - **Logging**: Centralized `tracing` subscriber setup
//!
//! # Example
//!
//! ```no_run
//! use annoload_common::checksum::{compute_file_checksum, ChecksumAlgorithm};
//! use annoload_common::Result;
//!
//! fn fingerprint(path: &str) -> Result<()> {
//!     let checksum = compute_file_checksum(path, ChecksumAlgorithm::Sha256)?;
//!     println!("Input checksum: {}", checksum);
//!     Ok(())
//! }
//! ```

#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod checksum;
pub mod error;
pub mod logging;

// Re-export commonly used types
pub use error::{CommonError, Result};
