//! In-memory stand-ins for the network seams.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use trail_contracts::{
    did::DidDocument,
    error::{TrailError, TrailResult},
};
use trail_core::traits::{DidResolver, Transport};
use trail_core::transport::{HttpRequest, HttpResponse};

// ── StaticDidResolver ────────────────────────────────────────────────────────

/// Resolves DIDs from a fixed table and counts lookups.
#[derive(Default)]
pub struct StaticDidResolver {
    documents: HashMap<String, Arc<DidDocument>>,
    calls: AtomicUsize,
}

impl StaticDidResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_document(mut self, document: DidDocument) -> Self {
        self.documents
            .insert(document.id.clone(), Arc::new(document));
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl DidResolver for StaticDidResolver {
    fn resolve(&self, did: &str) -> TrailResult<Arc<DidDocument>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.documents
            .get(did)
            .cloned()
            .ok_or_else(|| TrailError::DidResolution {
                did: did.to_string(),
                reason: "unknown DID".to_string(),
            })
    }
}

// ── RecordingTransport ───────────────────────────────────────────────────────

/// Answers requests from canned responses keyed by URL and records every
/// request it sees.  Unknown URLs get a `404`.
#[derive(Default)]
pub struct RecordingTransport {
    responses: Mutex<HashMap<String, HttpResponse>>,
    failures: Mutex<HashMap<String, String>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(self, url: &str, response: HttpResponse) -> Self {
        if let Ok(mut responses) = self.responses.lock() {
            responses.insert(url.to_string(), response);
        }
        self
    }

    /// Fail requests to `url` as if the connection was refused.
    pub fn fail(self, url: &str, reason: &str) -> Self {
        if let Ok(mut failures) = self.failures.lock() {
            failures.insert(url.to_string(), reason.to_string());
        }
        self
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }

    /// Number of requests sent to `url`.
    pub fn count_for(&self, url: &str) -> usize {
        self.requests().iter().filter(|r| r.url == url).count()
    }
}

impl Transport for RecordingTransport {
    fn send(&self, request: &HttpRequest) -> TrailResult<HttpResponse> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }
        if let Some(reason) = self
            .failures
            .lock()
            .ok()
            .and_then(|f| f.get(&request.url).cloned())
        {
            return Err(TrailError::Transport {
                url: request.url.clone(),
                reason,
            });
        }
        Ok(self
            .responses
            .lock()
            .ok()
            .and_then(|r| r.get(&request.url).cloned())
            .unwrap_or_else(|| HttpResponse::new(404, "not found")))
    }
}
