//! Loading audit documents from a local path or an `http(s)://` URL.

use std::path::Path;

use tracing::info;

use trail_contracts::{
    audit::AuditLog,
    error::{TrailError, TrailResult},
};

use crate::traits::Transport;
use crate::transport::HttpRequest;

/// True when `source` names a remote document rather than a file.
pub fn is_remote(source: &str) -> bool {
    source.starts_with("http://") || source.starts_with("https://")
}

/// Load and parse the audit document at `source`.
///
/// Remote sources are fetched through `transport`; a non-2xx response is an
/// `AuditSource` error naming the status.
pub fn load_audit(source: &str, transport: &dyn Transport) -> TrailResult<AuditLog> {
    let text = if is_remote(source) {
        let response = transport
            .send(&HttpRequest::get(source))
            .map_err(|e| audit_error(source, e.to_string()))?;
        if !response.is_success() {
            return Err(audit_error(source, format!("HTTP {}", response.status)));
        }
        response.body
    } else {
        std::fs::read_to_string(Path::new(source)).map_err(|e| audit_error(source, e.to_string()))?
    };

    let log = parse_audit(&text, source)?;
    info!(
        source = %source,
        entries = log.entries.len(),
        "audit document loaded"
    );
    Ok(log)
}

/// Parse the JSON text of an audit document.
pub fn parse_audit(text: &str, source: &str) -> TrailResult<AuditLog> {
    serde_json::from_str(text).map_err(|e| audit_error(source, format!("invalid audit JSON: {e}")))
}

fn audit_error(source: &str, reason: String) -> TrailError {
    TrailError::AuditSource {
        source_ref: source.to_string(),
        reason,
    }
}
