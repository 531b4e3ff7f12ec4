//! # Remig Common Library
//!
//! Shared code for the archive migration engine:
//! - Error types
//! - Configuration loading
//! - Clock-time (`HH:MM:SS`) parsing and formatting

pub mod config;
pub mod error;
pub mod time;

pub use config::MigrationConfig;
pub use error::{Error, Result};
