//! Error types shared across the migration crates

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Failure modes that cross crate boundaries. Per-item domain failures
/// are not errors; they travel as failure-category values through the
/// tracker and never surface here.
#[derive(Error, Debug)]
pub enum Error {
    /// Tracking database failure. Run-fatal.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration file unreadable or unparseable.
    #[error("configuration error: {0}")]
    Config(String),

    /// Malformed caller-supplied value, e.g. a cut timestamp.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// State store unavailable or inconsistent. Run-fatal: losing the
    /// store compromises the idempotence guarantee for every later item.
    #[error("state store error: {0}")]
    StateStore(String),

    /// Invariant breach that a healthy run never produces.
    #[error("internal error: {0}")]
    Internal(String),
}
