//! Tributary Common Library
//!
//! Shared foundation for the Tributary workspace members:
//!
//! - **Error Handling**: the `SyncError` taxonomy and `Result` alias
//! - **Logging**: tracing subscriber setup (console/file, text/JSON)
//! - **Hashing**: content-hash helpers used for change detection
//!
//! # Example
//!
//! ```no_run
//! use tributary_common::{Result, SyncError};
//! use tributary_common::hash::sha256_hex;
//!
//! fn fingerprint(body: &str) -> Result<String> {
//!     if body.is_empty() {
//!         return Err(SyncError::Configuration("empty body".into()));
//!     }
//!     Ok(sha256_hex(body.as_bytes()))
//! }
//! ```

pub mod error;
pub mod hash;
pub mod logging;

// Re-export commonly used types
pub use error::{Result, SyncError};
