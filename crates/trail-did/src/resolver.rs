//! `WebDidResolver`: fetches `did:web` documents and memoizes them.
//!
//! Each DID gets its own slot in the cache.  The first caller for a DID
//! holds the slot's lock while it fetches; concurrent callers for the same
//! DID wait on that lock and then read the stored document, so a document is
//! fetched at most once and never observed half-built.  Callers for other
//! DIDs are not blocked.  A failed fetch leaves the slot empty, so the next
//! call retries.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, info, warn};

use trail_contracts::{
    did::DidDocument,
    error::{TrailError, TrailResult},
};
use trail_core::settings::DidSettings;
use trail_core::traits::{DidResolver, Transport};
use trail_core::transport::HttpRequest;

use crate::url::did_web_url;

type Slot = Arc<Mutex<Option<Arc<DidDocument>>>>;

pub struct WebDidResolver {
    transport: Arc<dyn Transport>,
    scheme: String,
    host_override: Option<String>,
    cache: Mutex<HashMap<String, Slot>>,
}

impl WebDidResolver {
    pub fn new(transport: Arc<dyn Transport>, settings: &DidSettings) -> Self {
        Self {
            transport,
            scheme: settings.scheme.clone(),
            host_override: settings.host_override.clone(),
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Number of documents resolved and cached so far.
    pub fn cached_count(&self) -> usize {
        let cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        cache
            .values()
            .filter(|slot| {
                slot.lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .is_some()
            })
            .count()
    }

    fn slot(&self, did: &str) -> Slot {
        let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        cache.entry(did.to_string()).or_default().clone()
    }

    fn fetch(&self, did: &str) -> TrailResult<DidDocument> {
        let url = did_web_url(did, &self.scheme, self.host_override.as_deref())?;
        let error = |reason: String| TrailError::DidResolution {
            did: did.to_string(),
            reason,
        };

        debug!(did = %did, url = %url, "fetching DID document");
        let response = self
            .transport
            .send(&HttpRequest::get(url.as_str()))
            .map_err(|e| error(format!("GET {url} failed: {e}")))?;
        if response.status != 200 {
            return Err(error(format!("GET {url} returned HTTP {}", response.status)));
        }

        let document: DidDocument = response
            .json(&url)
            .map_err(|e| error(format!("GET {url}: {e}")))?;
        if document.id != did {
            warn!(did = %did, document_id = %document.id, "DID document id differs from requested DID");
        }
        Ok(document)
    }
}

impl DidResolver for WebDidResolver {
    fn resolve(&self, did: &str) -> TrailResult<Arc<DidDocument>> {
        let slot = self.slot(did);
        let mut cached = slot.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(document) = cached.as_ref() {
            return Ok(Arc::clone(document));
        }

        let document = Arc::new(self.fetch(did)?);
        info!(
            did = %did,
            methods = document.verification_method.len(),
            "DID document resolved"
        );
        *cached = Some(Arc::clone(&document));
        Ok(document)
    }
}
