//! # trail-core
//!
//! The verification pipeline for protocol audit trails.
//!
//! This crate provides:
//! - The trait seams (`Transport`, `DidResolver`, `StructureValidator`,
//!   `SignatureVerifier`, `Replayer`)
//! - The `Orchestrator` that runs the stages in order with fail-fast
//!   semantics
//! - The blocking HTTP transport, cancellation token, verifier settings,
//!   and audit document loading shared by the implementation crates
//!
//! ## Usage
//!
//! ```rust,ignore
//! use trail_core::{Orchestrator, VerifyOptions};
//!
//! let orchestrator = Orchestrator::new(structure, signatures).with_replayer(replayer);
//! let result = orchestrator.verify_source("audit.json", &transport, &VerifyOptions::default())?;
//! ```

pub mod cancel;
pub mod orchestrator;
pub mod settings;
pub mod source;
pub mod traits;
pub mod transport;

pub use cancel::CancellationToken;
pub use orchestrator::{Orchestrator, VerifyOptions};
pub use settings::VerifierSettings;
pub use source::load_audit;
