//! Shared plumbing for the EW-1 services and tools:
//! - logging setup with daily rotated files
//! - shutdown signal handling
//! - configuration value resolution

pub mod config_loader;
pub mod error;
pub mod logging;
pub mod shutdown;

pub use error::{Error, Result};
