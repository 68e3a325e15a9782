//! Verification method → Ed25519 public key.

use ed25519_dalek::VerifyingKey;

use trail_contracts::{did::VerificationMethod, error::TrailResult};

use crate::jws::{decode_base64url, signature_error};

/// Method types that can carry an Ed25519 key.
pub const SUPPORTED_METHOD_TYPES: [&str; 2] = ["Ed25519VerificationKey2020", "JsonWebKey2020"];

/// Extract the Ed25519 public key published by `method`.
///
/// The method type must be Ed25519-capable and its JWK must be
/// `kty = OKP`, `crv = Ed25519` with a 32-byte `x`.
pub fn verifying_key(method: &VerificationMethod) -> TrailResult<VerifyingKey> {
    if !SUPPORTED_METHOD_TYPES.contains(&method.method_type.as_str()) {
        return Err(signature_error(format!(
            "verification method {} has unsupported type '{}'",
            method.id, method.method_type
        )));
    }
    let Some(jwk) = &method.public_key_jwk else {
        return Err(signature_error(format!(
            "verification method {} has no publicKeyJwk",
            method.id
        )));
    };
    if jwk.kty != "OKP" || jwk.crv != "Ed25519" {
        return Err(signature_error(format!(
            "verification method {} key must be OKP/Ed25519, found {}/{}",
            method.id, jwk.kty, jwk.crv
        )));
    }

    let bytes = decode_base64url(&jwk.x)
        .map_err(|e| signature_error(format!("public key is not valid base64url: {e}")))?;
    let bytes: [u8; 32] = bytes.as_slice().try_into().map_err(|_| {
        signature_error(format!(
            "Ed25519 public key must be 32 bytes, found {}",
            bytes.len()
        ))
    })?;
    VerifyingKey::from_bytes(&bytes)
        .map_err(|e| signature_error(format!("invalid Ed25519 public key: {e}")))
}
