//! # trail-contracts
//!
//! Shared types for the trail audit verifier.
//!
//! All crates in the workspace import from here. No business logic lives in
//! this crate beyond parsing identities: only data definitions, the
//! verification report model, and the error type.

pub mod audit;
pub mod did;
pub mod error;
pub mod identity;
pub mod report;
