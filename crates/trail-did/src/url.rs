//! `did:web` → HTTPS document location.
//!
//!   did:web:example.com                  → {scheme}://example.com/.well-known/did.json
//!   did:web:example.com%3A8443           → {scheme}://example.com:8443/.well-known/did.json
//!   did:web:example.com:user:alice       → {scheme}://example.com/user/alice/did.json

use percent_encoding::percent_decode_str;

use trail_contracts::error::{TrailError, TrailResult};

const DID_WEB_PREFIX: &str = "did:web:";

/// The URL a `did:web` document is served from.
///
/// Each segment is percent-decoded.  `host_override` replaces the host (and
/// port) while keeping any path segments.  A trailing `#fragment` on `did`
/// is ignored.
pub fn did_web_url(did: &str, scheme: &str, host_override: Option<&str>) -> TrailResult<String> {
    let error = |reason: String| TrailError::DidResolution {
        did: did.to_string(),
        reason,
    };

    let bare = did.split('#').next().unwrap_or(did);
    let Some(rest) = bare.strip_prefix(DID_WEB_PREFIX) else {
        let method = bare.split(':').nth(1).unwrap_or("");
        return Err(error(format!(
            "unsupported DID method '{method}': only did:web is supported"
        )));
    };

    let mut segments = rest.split(':').map(|segment| {
        percent_decode_str(segment)
            .decode_utf8()
            .map(|decoded| decoded.into_owned())
            .map_err(|e| error(format!("did:web segment '{segment}' is not valid UTF-8: {e}")))
    });
    let host = segments.next().transpose()?.unwrap_or_default();
    if host.is_empty() {
        return Err(error("did:web identifier has no host".to_string()));
    }
    let path = segments.collect::<TrailResult<Vec<String>>>()?;
    if path.iter().any(|s| s.is_empty()) {
        return Err(error("did:web identifier has an empty path segment".to_string()));
    }

    let authority = host_override.unwrap_or(&host);
    if path.is_empty() {
        Ok(format!("{scheme}://{authority}/.well-known/did.json"))
    } else {
        Ok(format!("{scheme}://{authority}/{}/did.json", path.join("/")))
    }
}
