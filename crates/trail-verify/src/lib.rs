//! # trail-verify
//!
//! The two audit checks that need more than hashing:
//!
//! 1. **Structure** ([`structure::SchemaStructureValidator`]): JSON Schema
//!    validation via the `jsonschema` crate, reporting every blank required
//!    field and an empty log.
//! 2. **Signature** ([`engine::JwsSignatureVerifier`]): per-entry Ed25519
//!    compact JWS verification over the entry's canonical hash, with keys
//!    resolved through a `DidResolver`.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use trail_verify::{JwsSignatureVerifier, SchemaStructureValidator};
//!
//! let structure = SchemaStructureValidator::new()?;
//! let signatures = JwsSignatureVerifier::new(resolver);
//! ```

pub mod engine;
pub mod jws;
pub mod key;
pub mod structure;

pub use engine::JwsSignatureVerifier;
pub use structure::SchemaStructureValidator;

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use base64::Engine;
    use serde_json::json;

    use trail_contracts::{
        audit::AuditLog,
        did::{DidDocument, PublicKeyJwk},
        report::VerificationStep,
    };
    use trail_core::traits::{SignatureVerifier, StructureValidator};
    use trail_fixtures::{sample_log, StaticDidResolver, TestSigner, ISSUER_DID, OTHER_SEED};

    use super::jws::CompactJws;
    use super::key::verifying_key;
    use super::*;

    // ── Helpers ──────────────────────────────────────────────────────────────

    fn verifier_for(document: DidDocument) -> JwsSignatureVerifier {
        JwsSignatureVerifier::new(Arc::new(StaticDidResolver::new().with_document(document)))
    }

    fn issuer_verifier() -> JwsSignatureVerifier {
        verifier_for(TestSigner::issuer().did_document())
    }

    fn messages(log: &AuditLog, fail_fast: bool) -> Vec<String> {
        issuer_verifier()
            .verify_signatures(&log.entries, fail_fast)
            .into_iter()
            .map(|e| {
                assert_eq!(e.step, VerificationStep::Signature);
                e.message
            })
            .collect()
    }

    fn structure_messages(log: &AuditLog) -> Vec<String> {
        SchemaStructureValidator::new()
            .unwrap()
            .validate(log)
            .into_iter()
            .map(|e| {
                assert_eq!(e.step, VerificationStep::Structure);
                e.message
            })
            .collect()
    }

    // ── Structure ────────────────────────────────────────────────────────────

    #[test]
    fn well_formed_log_passes_structure() {
        assert!(structure_messages(&sample_log()).is_empty());
    }

    #[test]
    fn empty_log_is_reported() {
        let log: AuditLog = serde_json::from_value(json!({ "audit_log": [], "state": {} })).unwrap();
        assert_eq!(structure_messages(&log), vec!["audit log has no entries"]);
    }

    /// Every blank field is reported, in entry order, without short-circuit.
    #[test]
    fn every_blank_field_is_reported() {
        let mut log = sample_log();
        log.entries[2].proof.jws = String::new();
        log.entries[1].id = "   ".to_string();
        log.entries[1].action.name = String::new();

        let messages = structure_messages(&log);
        assert_eq!(
            messages,
            vec![
                "entry 1: action.name must not be blank",
                "entry 1: id must not be blank",
                "entry 2: proof.jws must not be blank",
            ]
        );
    }

    #[test]
    fn missing_fields_in_wire_form_are_blank() {
        let log: AuditLog = serde_json::from_value(json!({
            "audit_log": [{ "action": { "name": "Iou" } }],
            "state": {}
        }))
        .unwrap();

        let messages = structure_messages(&log);
        assert_eq!(messages.len(), 5, "messages: {messages:?}");
        assert!(messages.iter().all(|m| m.starts_with("entry 0: ")));
        assert!(messages.contains(&"entry 0: proof.verificationMethod must not be blank".to_string()));
    }

    // ── Signature: passing ───────────────────────────────────────────────────

    #[test]
    fn valid_signatures_pass() {
        assert!(messages(&sample_log(), false).is_empty());
    }

    /// Padded base64url in the JWK is accepted.
    #[test]
    fn padded_public_key_is_accepted() {
        let signer = TestSigner::issuer();
        let mut document = signer.did_document();
        if let Some(jwk) = document.verification_method[0].public_key_jwk.as_mut() {
            jwk.x.push('=');
        }
        let log = sample_log();
        assert!(verifier_for(document)
            .verify_signatures(&log.entries, false)
            .is_empty());
    }

    // ── Signature: tampering ─────────────────────────────────────────────────

    /// Editing a projected field after signing breaks the payload binding.
    #[test]
    fn tampered_entry_reports_payload_mismatch() {
        let mut log = sample_log();
        log.entries[1].action.name = "steal".to_string();

        let messages = messages(&log, false);
        assert_eq!(messages.len(), 1);
        assert!(messages[0].starts_with("entry 1 ("), "{}", messages[0]);
        assert!(
            messages[0].contains("JWS payload does not match entry hash"),
            "{}",
            messages[0]
        );
    }

    /// A two-segment JWS fails its own entry only; later entries are still
    /// checked.
    #[test]
    fn malformed_jws_is_contained() {
        let mut log = sample_log();
        log.entries[0].proof.jws = "abc.def".to_string();
        log.entries[2].action.parameters.insert("x".to_string(), json!(1));

        let messages = messages(&log, false);
        assert_eq!(messages.len(), 2, "messages: {messages:?}");
        assert!(messages[0].starts_with("entry 0 ("));
        assert!(messages[0].contains("JWS must have 3 segments, found 2"));
        assert!(messages[1].starts_with("entry 2 ("));
    }

    #[test]
    fn fail_fast_stops_at_first_failing_entry() {
        let mut log = sample_log();
        log.entries[0].proof.jws = "abc.def".to_string();
        log.entries[2].proof.jws = "abc".to_string();

        assert_eq!(messages(&log, true).len(), 1);
        assert_eq!(messages(&log, false).len(), 2);
    }

    /// A signature from a different key fails even though the payload
    /// matches.
    #[test]
    fn wrong_key_fails_verification() {
        let impostor = TestSigner::new(OTHER_SEED, ISSUER_DID, "key-1");
        let mut log = sample_log();
        impostor.sign_entry(&mut log.entries[1]);

        let messages = messages(&log, false);
        assert_eq!(messages.len(), 1);
        assert!(messages[0].contains("Ed25519 signature verification failed"));
    }

    #[test]
    fn non_eddsa_header_is_rejected() {
        let mut log = sample_log();
        let jws = log.entries[0].proof.jws.clone();
        let rest = jws.split_once('.').map(|(_, rest)| rest).unwrap();
        let header = URL_SAFE_NO_PAD.encode(r#"{"alg":"HS256"}"#);
        log.entries[0].proof.jws = format!("{header}.{rest}");

        let messages = messages(&log, false);
        assert_eq!(messages.len(), 1);
        assert!(messages[0].contains("unsupported JWS algorithm"), "{}", messages[0]);
    }

    // ── Signature: key material ──────────────────────────────────────────────

    #[test]
    fn missing_key_fragment_is_reported() {
        let mut log = sample_log();
        log.entries[0].proof.verification_method = ISSUER_DID.to_string();

        let messages = messages(&log, false);
        assert_eq!(messages.len(), 1);
        assert!(messages[0].contains("has no key fragment"));
    }

    #[test]
    fn unknown_method_is_reported() {
        let mut log = sample_log();
        log.entries[0].proof.verification_method = format!("{ISSUER_DID}#key-9");

        let messages = messages(&log, false);
        assert!(messages[0].contains("not found in DID document"), "{}", messages[0]);
    }

    #[test]
    fn unresolvable_did_is_reported_per_entry() {
        let verifier = JwsSignatureVerifier::new(Arc::new(StaticDidResolver::new()));
        let log = sample_log();

        let errors = verifier.verify_signatures(&log.entries, false);
        assert_eq!(errors.len(), 3);
        assert!(errors[0].message.contains("failed to resolve DID 'did:web:example.com'"));
    }

    #[test]
    fn unsupported_key_types_are_rejected() {
        let mut method = TestSigner::issuer().verification_method_entry();
        method.method_type = "RsaVerificationKey2018".to_string();
        assert!(verifying_key(&method).is_err());

        let mut method = TestSigner::issuer().verification_method_entry();
        method.public_key_jwk = Some(PublicKeyJwk {
            kty: "EC".to_string(),
            crv: "P-256".to_string(),
            x: "AAAA".to_string(),
        });
        assert!(verifying_key(&method).is_err());
    }

    #[test]
    fn short_public_key_is_rejected() {
        let mut method = TestSigner::issuer().verification_method_entry();
        if let Some(jwk) = method.public_key_jwk.as_mut() {
            jwk.x = URL_SAFE_NO_PAD.encode([1u8; 16]);
        }
        let error = verifying_key(&method).unwrap_err().to_string();
        assert!(error.contains("must be 32 bytes, found 16"), "{error}");
    }

    // ── JWS envelope ─────────────────────────────────────────────────────────

    #[test]
    fn jws_parse_requires_three_non_empty_segments() {
        assert!(CompactJws::parse("a.b.c").is_ok());
        assert!(CompactJws::parse("a.b").is_err());
        assert!(CompactJws::parse("a.b.c.d").is_err());
        assert!(CompactJws::parse("a..c").is_err());
        assert_eq!(CompactJws::parse("a.b.c").unwrap().signing_input(), "a.b");
    }
}
