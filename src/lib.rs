//! cookierelay - session cookie pipeline between browser stores and a
//! session-management backend
//!
//! Extraction reads a browser's SQLite cookie store for one target domain,
//! encrypts the captured set, and posts it to the backend; injection writes
//! a previously captured set back into a fresh profile's store before the
//! browser starts.

pub mod cli;
pub mod config;
pub mod crypto;
pub mod delivery;
pub mod error;
pub mod logging;
pub mod pipeline;
pub mod store;
pub mod utils;

pub use error::{RelayError, Result};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
