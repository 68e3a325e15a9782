//! Core trait definitions for the trail verification pipeline.
//!
//! These traits are the seams the orchestrator is wired through:
//!
//! - `Transport`          — every outbound HTTP request
//! - `DidResolver`        — DID URI → DID document
//! - `StructureValidator` — shape checks before any cryptography
//! - `SignatureVerifier`  — per-entry JWS verification
//! - `Replayer`           — re-execution against a live runtime
//!
//! The hash-chain and state-hash checks are pure functions in `trail-audit`
//! and need no seam.

use std::path::Path;
use std::sync::Arc;

use trail_contracts::{
    audit::{AuditEntry, AuditLog},
    did::DidDocument,
    error::TrailResult,
    report::{ReplayReport, StepError},
};

use crate::transport::{HttpRequest, HttpResponse};

/// Sends one HTTP request and returns the response, whatever its status.
///
/// Implementations return `Err` only when no response was received
/// (connection failure, timeout, cancellation).
pub trait Transport: Send + Sync {
    fn send(&self, request: &HttpRequest) -> TrailResult<HttpResponse>;
}

/// Resolves a DID URI (without fragment) to its document.
///
/// Implementations shared across threads must resolve each URI at most once
/// and never hand out a partially-constructed document.
pub trait DidResolver: Send + Sync {
    fn resolve(&self, did: &str) -> TrailResult<Arc<DidDocument>>;
}

/// Checks an audit log's shape.  Must report every violation it finds.
pub trait StructureValidator: Send + Sync {
    fn validate(&self, log: &AuditLog) -> Vec<StepError>;
}

/// Verifies the proof on every entry.
///
/// A failure in one entry must not prevent checking the rest unless
/// `fail_fast` is set, in which case verification stops at the first
/// failing entry.
pub trait SignatureVerifier: Send + Sync {
    fn verify_signatures(&self, entries: &[AuditEntry], fail_fast: bool) -> Vec<StepError>;
}

/// Replays an audit log against a live protocol runtime.
///
/// Per-entry divergences are reported in the `ReplayReport`; `Err` means the
/// replay could not start at all (for example a malformed protocol identity).
pub trait Replayer: Send + Sync {
    fn replay(&self, log: &AuditLog, sources: &Path) -> TrailResult<ReplayReport>;
}
