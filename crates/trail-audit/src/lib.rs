//! # trail-audit
//!
//! Canonical hashing and hash-chain integrity checks for protocol audit
//! trails.
//!
//! ## Overview
//!
//! Every audit entry commits to its predecessor through `previousHash`, the
//! canonical SHA-256 of the predecessor's unsigned projection.  Editing any
//! committed field of any entry (even one byte of a parameter) breaks the
//! next link, which `verify_chain` detects.  `verify_state_hash` binds the
//! final declared state to the last entry.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use trail_audit::{canonical_hash, verify_chain, verify_state_hash};
//!
//! let mut errors = verify_chain(&log.entries);
//! errors.extend(verify_state_hash(&log));
//! ```

pub mod canonical;
pub mod chain;
pub mod hash;

pub use canonical::canonical_json;
pub use chain::{verify_chain, verify_state_hash};
pub use hash::{canonical_hash, entry_hash, unsigned_projection, HASH_PREFIX};

// ── Tests ─────────────────────────────────────────────────────────────────────
