//! Shared library for the report cache service
//!
//! - Environment-driven configuration
//! - HTTP-facing error type

pub mod config;
pub mod error;

// Re-export commonly used types
pub use config::Config;
pub use error::{AppError, ErrorResponse, Result};
