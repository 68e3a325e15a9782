//! DID document types (subset of DID Core needed for Ed25519 verification).

use serde::{Deserialize, Serialize};

/// Key material published by a signer at its `did:web` location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DidDocument {
    pub id: String,

    #[serde(default)]
    pub verification_method: Vec<VerificationMethod>,
}

impl DidDocument {
    /// Find the verification method whose `id` equals the full method URI
    /// (`did:web:example.com#key-1`).
    pub fn find_method(&self, method_id: &str) -> Option<&VerificationMethod> {
        self.verification_method.iter().find(|m| m.id == method_id)
    }
}

/// One named key within a DID document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationMethod {
    pub id: String,

    /// `Ed25519VerificationKey2020` or `JsonWebKey2020` for usable keys.
    #[serde(rename = "type")]
    pub method_type: String,

    #[serde(default)]
    pub controller: String,

    #[serde(default)]
    pub public_key_jwk: Option<PublicKeyJwk>,
}

/// An OKP JSON Web Key.  Only `kty = "OKP"`, `crv = "Ed25519"` is usable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicKeyJwk {
    pub kty: String,

    #[serde(default)]
    pub crv: String,

    /// base64url-encoded public key bytes.
    #[serde(default)]
    pub x: String,
}
