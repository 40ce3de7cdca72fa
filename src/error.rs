//! Error types surfaced by registration and response building.
//!
//! Request-time failures inside handlers are plain `anyhow::Error`s; the
//! dispatcher turns them into 500 responses. The enums here are the failures a
//! caller is expected to match on.

use thiserror::Error;

/// Startup-time failure while registering an endpoint. Always fatal.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistrationError {
    #[error("invalid path pattern {pattern:?}: {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("path pattern {pattern:?} conflicts with endpoint {existing_id} ({existing:?})")]
    DuplicatePattern {
        pattern: String,
        existing: String,
        existing_id: usize,
    },

    #[error("a suspendable handler cannot be registered as blocking")]
    BlockingSuspendable,

    #[error("unknown endpoint flag {0:?}")]
    UnknownFlag(String),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ResponseError {
    #[error("invalid status code {0}, expected 100..=599")]
    InvalidStatus(u16),
}
