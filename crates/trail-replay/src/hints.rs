//! Which party most likely owns an action, from the protocol sources.
//!
//! A best-effort scan of `.npl` files for declarations such as
//! `protocol[issuer, payee] Iou(` and `permission[payee | issuer] pay(`.
//! Only the first listed party is kept.  The result orders token attempts;
//! it is never authoritative.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

static PROTOCOL_DECL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\bprotocol\s*\[\s*([^\]]*)\]\s*([A-Za-z_][A-Za-z0-9_]*)\s*\(")
        .expect("protocol declaration regex is valid")
});

static ACTION_DECL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:permission|obligation)\s*\[\s*([^\]]*)\]\s*([A-Za-z_][A-Za-z0-9_]*)\s*\(")
        .expect("action declaration regex is valid")
});

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PartyHints {
    constructors: HashMap<String, String>,
    actions: HashMap<String, String>,
}

impl PartyHints {
    /// Scan every `.npl` file under `sources`, in path order.
    pub fn scan(sources: &Path) -> Self {
        let mut hints = Self::default();
        let mut files = Vec::new();
        collect_npl_files(sources, &mut files);
        files.sort();

        for file in &files {
            match std::fs::read_to_string(file) {
                Ok(text) => hints.add_source(&text),
                Err(e) => debug!(file = %file.display(), error = %e, "skipping unreadable source"),
            }
        }
        debug!(
            files = files.len(),
            protocols = hints.constructors.len(),
            actions = hints.actions.len(),
            "party hints scanned"
        );
        hints
    }

    /// Add the declarations found in one source text.  Earlier
    /// declarations win.
    pub fn add_source(&mut self, text: &str) {
        for captures in PROTOCOL_DECL.captures_iter(text) {
            if let Some(party) = first_party(&captures[1]) {
                self.constructors
                    .entry(captures[2].to_string())
                    .or_insert(party);
            }
        }
        for captures in ACTION_DECL.captures_iter(text) {
            if let Some(party) = first_party(&captures[1]) {
                self.actions.entry(captures[2].to_string()).or_insert(party);
            }
        }
    }

    pub fn for_constructor(&self, protocol_name: &str) -> Option<&str> {
        self.constructors.get(protocol_name).map(String::as_str)
    }

    pub fn for_action(&self, action_name: &str) -> Option<&str> {
        self.actions.get(action_name).map(String::as_str)
    }
}

fn first_party(list: &str) -> Option<String> {
    list.split(['|', ','])
        .map(str::trim)
        .find(|p| !p.is_empty())
        .map(str::to_string)
}

fn collect_npl_files(path: &Path, out: &mut Vec<PathBuf>) {
    if path.is_file() {
        if path.extension().is_some_and(|ext| ext == "npl") {
            out.push(path.to_path_buf());
        }
        return;
    }
    let Ok(entries) = std::fs::read_dir(path) else {
        return;
    };
    for entry in entries.flatten() {
        collect_npl_files(&entry.path(), out);
    }
}
