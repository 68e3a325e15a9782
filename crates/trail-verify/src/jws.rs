//! Compact JWS envelopes: `base64url(header).base64url(payload).base64url(signature)`.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde_json::Value;

use trail_contracts::error::{TrailError, TrailResult};

/// The only algorithm audit proofs are signed with.
pub const EDDSA: &str = "EdDSA";

/// A compact JWS split into its three encoded segments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompactJws<'a> {
    pub header: &'a str,
    pub payload: &'a str,
    pub signature: &'a str,
}

impl<'a> CompactJws<'a> {
    /// Split `jws` on `.`; anything other than three non-empty segments is
    /// rejected.
    pub fn parse(jws: &'a str) -> TrailResult<Self> {
        let segments: Vec<&str> = jws.split('.').collect();
        let &[header, payload, signature] = segments.as_slice() else {
            return Err(signature_error(format!(
                "JWS must have 3 segments, found {}",
                segments.len()
            )));
        };
        if header.is_empty() || payload.is_empty() || signature.is_empty() {
            return Err(signature_error("JWS has an empty segment".to_string()));
        }
        Ok(Self {
            header,
            payload,
            signature,
        })
    }

    /// The bytes the signature covers: `"{header}.{payload}"`.
    pub fn signing_input(&self) -> String {
        format!("{}.{}", self.header, self.payload)
    }

    /// Decode the protected header and check its `alg`, when present.
    pub fn check_header(&self) -> TrailResult<()> {
        let bytes = decode_segment("header", self.header)?;
        let header: Value = serde_json::from_slice(&bytes)
            .map_err(|e| signature_error(format!("JWS header is not JSON: {e}")))?;
        let Some(header) = header.as_object() else {
            return Err(signature_error("JWS header is not a JSON object".to_string()));
        };
        match header.get("alg") {
            None => Ok(()),
            Some(Value::String(alg)) if alg == EDDSA => Ok(()),
            Some(other) => Err(signature_error(format!(
                "unsupported JWS algorithm {other}, expected \"{EDDSA}\""
            ))),
        }
    }

    /// The payload as UTF-8 text.
    pub fn payload_text(&self) -> TrailResult<String> {
        let bytes = decode_segment("payload", self.payload)?;
        String::from_utf8(bytes)
            .map_err(|_| signature_error("JWS payload is not UTF-8".to_string()))
    }

    pub fn signature_bytes(&self) -> TrailResult<Vec<u8>> {
        decode_segment("signature", self.signature)
    }
}

/// Decode base64url, tolerating trailing `=` padding.
pub fn decode_base64url(segment: &str) -> Result<Vec<u8>, base64::DecodeError> {
    URL_SAFE_NO_PAD.decode(segment.trim_end_matches('='))
}

fn decode_segment(name: &str, segment: &str) -> TrailResult<Vec<u8>> {
    decode_base64url(segment)
        .map_err(|e| signature_error(format!("JWS {name} is not valid base64url: {e}")))
}

pub(crate) fn signature_error(reason: String) -> TrailError {
    TrailError::Signature { reason }
}
