//! Hash-chain and final-state integrity checks.
//!
//! Both checks are pure: they read the audit log, recompute digests with
//! [`crate::hash`], and return every mismatch they find as a `StepError`.
//!
//! Chain rules:
//!   1. Entry 0 has no `previousHash`.
//!   2. Entry i > 0 has `previousHash == entry_hash(entry[i - 1])`.
//!
//! State rule: the canonical hash of the log's top-level `state` equals the
//! last entry's `stateHash`.

use tracing::{debug, warn};

use trail_contracts::{
    audit::{AuditEntry, AuditLog},
    report::{StepError, VerificationStep},
};

use crate::hash::{canonical_hash, entry_hash};

/// Verify `previousHash` linkage across consecutive entries.
///
/// Returns one error per broken link.  An empty slice has no links and is
/// trivially valid here; emptiness is the structure validator's concern.
pub fn verify_chain(entries: &[AuditEntry]) -> Vec<StepError> {
    let mut errors = Vec::new();

    for (index, entry) in entries.iter().enumerate() {
        let failure = if index == 0 {
            entry.previous_hash.as_ref().map(|found| {
                format!(
                    "entry 0 ({}): previousHash must be null for the first entry, found {found}",
                    entry.id
                )
            })
        } else {
            let expected = entry_hash(&entries[index - 1]);
            match entry.previous_hash.as_deref() {
                Some(actual) if actual == expected => None,
                actual => Some(format!(
                    "entry {index} ({}): previousHash mismatch: expected {expected}, actual {}",
                    entry.id,
                    actual.unwrap_or("null")
                )),
            }
        };

        if let Some(message) = failure {
            warn!(entry = index, %message, "hash chain link broken");
            errors.push(StepError::new(VerificationStep::HashChain, message));
        }
    }

    debug!(
        entries = entries.len(),
        failures = errors.len(),
        "hash chain verification complete"
    );
    errors
}

/// Verify that the final declared state matches the last entry's `stateHash`.
pub fn verify_state_hash(log: &AuditLog) -> Vec<StepError> {
    let Some(last) = log.last_entry() else {
        return Vec::new();
    };

    let computed = canonical_hash(&log.state);
    if computed == last.state_hash {
        debug!(state_hash = %computed, "final state hash verified");
        return Vec::new();
    }

    let message = format!(
        "final state hash mismatch: state hashes to {computed}, but entry {} ({}) records {}",
        log.entries.len() - 1,
        last.id,
        last.state_hash
    );
    warn!(%message, "state hash verification failed");
    vec![StepError::new(VerificationStep::StateHash, message)]
}
