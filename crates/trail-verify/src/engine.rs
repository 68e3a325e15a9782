//! Ed25519 JWS signature verifier.
//!
//! `JwsSignatureVerifier` implements `SignatureVerifier` from `trail-core`.
//! Each entry is checked on its own:
//!
//! 1. Split `proof.verificationMethod` into DID and key fragment.
//! 2. Resolve the DID document and find the method by its full URI.
//! 3. Decode the method's Ed25519 public key.
//! 4. Parse the compact JWS and check its header.
//! 5. Require the payload to equal the entry's own canonical hash.
//! 6. Verify the signature over `"{header}.{payload}"`.
//!
//! A failing entry yields one `Signature` error and the loop moves on to the
//! next entry, unless `fail_fast` is set.

use std::sync::Arc;

use ed25519_dalek::{Signature, Verifier};
use tracing::{debug, warn};

use trail_audit::entry_hash;
use trail_contracts::{
    audit::AuditEntry,
    error::{TrailError, TrailResult},
    report::{StepError, VerificationStep},
};
use trail_core::traits::{DidResolver, SignatureVerifier};

use crate::jws::{signature_error, CompactJws};
use crate::key::verifying_key;

pub struct JwsSignatureVerifier {
    resolver: Arc<dyn DidResolver>,
}

impl JwsSignatureVerifier {
    pub fn new(resolver: Arc<dyn DidResolver>) -> Self {
        Self { resolver }
    }

    /// Verify the proof on a single entry.
    pub fn verify_entry(&self, entry: &AuditEntry) -> TrailResult<()> {
        let method_uri = entry.proof.verification_method.as_str();
        let did = match method_uri.split_once('#') {
            Some((did, fragment)) if !did.is_empty() && !fragment.is_empty() => did,
            _ => {
                return Err(signature_error(format!(
                    "verificationMethod '{method_uri}' has no key fragment"
                )))
            }
        };

        let document = self.resolver.resolve(did)?;
        let method = document.find_method(method_uri).ok_or_else(|| {
            signature_error(format!(
                "verification method {method_uri} not found in DID document"
            ))
        })?;
        let key = verifying_key(method)?;

        let jws = CompactJws::parse(&entry.proof.jws)?;
        jws.check_header()?;

        let payload = jws.payload_text()?;
        let expected = entry_hash(entry);
        if payload != expected {
            return Err(signature_error(format!(
                "JWS payload does not match entry hash: expected {expected}, found {payload}"
            )));
        }

        let signature = Signature::from_slice(&jws.signature_bytes()?)
            .map_err(|e| signature_error(format!("malformed Ed25519 signature: {e}")))?;
        key.verify(jws.signing_input().as_bytes(), &signature)
            .map_err(|_| signature_error("Ed25519 signature verification failed".to_string()))
    }
}

impl SignatureVerifier for JwsSignatureVerifier {
    fn verify_signatures(&self, entries: &[AuditEntry], fail_fast: bool) -> Vec<StepError> {
        let mut errors = Vec::new();

        for (index, entry) in entries.iter().enumerate() {
            match self.verify_entry(entry) {
                Ok(()) => debug!(entry = index, "signature verified"),
                Err(e) => {
                    let message = format!("entry {index} ({}): {}", entry.id, describe(&e));
                    warn!(entry = index, %message, "signature check failed");
                    errors.push(StepError::new(VerificationStep::Signature, message));
                    if fail_fast {
                        break;
                    }
                }
            }
        }

        debug!(
            checked = entries.len(),
            failures = errors.len(),
            "signature stage complete"
        );
        errors
    }
}

/// Signature errors already read as a sentence; other errors keep their
/// own context.
fn describe(error: &TrailError) -> String {
    match error {
        TrailError::Signature { reason } => reason.clone(),
        other => other.to_string(),
    }
}
