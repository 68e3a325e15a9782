//! Deterministic Ed25519 signer and the DID document that publishes its key.
//!
//! Keys are derived from fixed seeds, so every test run produces the same
//! signatures and the same DID documents.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use ed25519_dalek::{Signer, SigningKey};
use serde_json::json;

use trail_audit::entry_hash;
use trail_contracts::{
    audit::{AuditEntry, Proof},
    did::{DidDocument, PublicKeyJwk, VerificationMethod},
};

/// Seed for the default signer.
pub const ISSUER_SEED: [u8; 32] = [7; 32];

/// Seed for a second, unrelated signer.
pub const OTHER_SEED: [u8; 32] = [42; 32];

pub const ISSUER_DID: &str = "did:web:example.com";

/// Signs audit entries the way the protocol runtime does: a compact JWS whose
/// payload is the entry's canonical hash.
#[derive(Debug, Clone)]
pub struct TestSigner {
    key: SigningKey,
    did: String,
    key_id: String,
}

impl TestSigner {
    pub fn new(seed: [u8; 32], did: impl Into<String>, key_id: impl Into<String>) -> Self {
        Self {
            key: SigningKey::from_bytes(&seed),
            did: did.into(),
            key_id: key_id.into(),
        }
    }

    /// `did:web:example.com#key-1` with `ISSUER_SEED`.
    pub fn issuer() -> Self {
        Self::new(ISSUER_SEED, ISSUER_DID, "key-1")
    }

    pub fn did(&self) -> &str {
        &self.did
    }

    /// Full verification method URI: `{did}#{key_id}`.
    pub fn verification_method(&self) -> String {
        format!("{}#{}", self.did, self.key_id)
    }

    /// base64url (unpadded) public key, as published in the JWK `x` member.
    pub fn public_key_x(&self) -> String {
        URL_SAFE_NO_PAD.encode(self.key.verifying_key().to_bytes())
    }

    pub fn verification_method_entry(&self) -> VerificationMethod {
        VerificationMethod {
            id: self.verification_method(),
            method_type: "JsonWebKey2020".to_string(),
            controller: self.did.clone(),
            public_key_jwk: Some(PublicKeyJwk {
                kty: "OKP".to_string(),
                crv: "Ed25519".to_string(),
                x: self.public_key_x(),
            }),
        }
    }

    /// A DID document publishing this signer's key.
    pub fn did_document(&self) -> DidDocument {
        DidDocument {
            id: self.did.clone(),
            verification_method: vec![self.verification_method_entry()],
        }
    }

    /// Compact JWS over `payload` with an `EdDSA` header.
    pub fn sign_payload(&self, payload: &str) -> String {
        let header = URL_SAFE_NO_PAD.encode(json!({ "alg": "EdDSA" }).to_string());
        let body = URL_SAFE_NO_PAD.encode(payload);
        let signing_input = format!("{header}.{body}");
        let signature = self.key.sign(signing_input.as_bytes());
        format!(
            "{signing_input}.{}",
            URL_SAFE_NO_PAD.encode(signature.to_bytes())
        )
    }

    /// Attach a fresh proof to `entry`, signing its current unsigned
    /// projection.
    pub fn sign_entry(&self, entry: &mut AuditEntry) {
        entry.proof = Proof {
            proof_type: "JsonWebSignature2020".to_string(),
            created: entry.timestamp.clone(),
            verification_method: self.verification_method(),
            proof_purpose: "assertionMethod".to_string(),
            jws: self.sign_payload(&entry_hash(entry)),
        };
    }
}
