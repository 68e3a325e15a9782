//! Error types for the trail verification pipeline.
//!
//! Verification *failures* are not errors: they are collected as
//! [`StepError`](crate::report::StepError) values.  `TrailError` is reserved
//! for exceptional conditions (unreadable audit source, malformed protocol
//! identity, transport failure) that prevent a stage from running at all.

use thiserror::Error;

/// The unified error type for the trail crates.
#[derive(Debug, Error)]
pub enum TrailError {
    /// A DID could not be resolved to a document.
    #[error("failed to resolve DID '{did}': {reason}")]
    DidResolution { did: String, reason: String },

    /// An outbound HTTP request failed before a response was received.
    #[error("request to {url} failed: {reason}")]
    Transport { url: String, reason: String },

    /// An audit entry id is not a valid `urn:npl:` protocol identity.
    #[error("malformed protocol identity '{id}': {reason}")]
    MalformedIdentity { id: String, reason: String },

    /// The audit document could not be read or parsed.
    #[error("cannot load audit from '{source_ref}': {reason}")]
    AuditSource { source_ref: String, reason: String },

    /// A required configuration value is missing or invalid.
    #[error("configuration error: {reason}")]
    Config { reason: String },

    /// Key material or signature envelope could not be interpreted.
    #[error("signature error: {reason}")]
    Signature { reason: String },

    /// Replay could not proceed.
    #[error("replay error: {reason}")]
    Replay { reason: String },

    /// The run was cancelled through its cancellation token.
    #[error("operation cancelled")]
    Cancelled,
}

/// Convenience alias used throughout the trail crates.
pub type TrailResult<T> = Result<T, TrailError>;
