//! Party credentials from `npl.yml` / `npl.yaml`.
//!
//! Only the `local:` section is read:
//!
//! ```yaml
//! local:
//!   authUrl: http://localhost:11000/realms/app/protocol/openid-connect/token
//!   clientId: app
//!   parties:
//!     issuer: { username: alice, password: secret }
//!   tokens:
//!     payee: eyJ...
//!   username: admin
//!   password: admin
//!   token: eyJ...
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{debug, info};

use trail_contracts::error::{TrailError, TrailResult};

pub const CONFIG_FILE_NAMES: [&str; 2] = ["npl.yml", "npl.yaml"];

#[derive(Debug, Default, Deserialize)]
struct NplFile {
    #[serde(default)]
    local: LocalConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LocalConfig {
    /// Password-grant token endpoint.
    pub auth_url: Option<String>,
    pub client_id: String,
    pub client_secret: Option<String>,
    /// Per-party credentials exchanged for bearer tokens.
    pub parties: BTreeMap<String, PartyCredentials>,
    /// Pre-issued per-party bearer tokens.
    pub tokens: BTreeMap<String, String>,
    /// Legacy single credential applied to every party.
    pub username: Option<String>,
    pub password: Option<String>,
    /// Legacy single static token.
    pub token: Option<String>,
}

impl Default for LocalConfig {
    fn default() -> Self {
        Self {
            auth_url: None,
            client_id: "app".to_string(),
            client_secret: None,
            parties: BTreeMap::new(),
            tokens: BTreeMap::new(),
            username: None,
            password: None,
            token: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PartyCredentials {
    pub username: String,
    pub password: String,
}

/// The first `npl.yml`/`npl.yaml` in `sources` or one of its ancestors.
pub fn find_config(sources: &Path) -> Option<PathBuf> {
    let start = if sources.is_file() {
        sources.parent()?
    } else {
        sources
    };
    start.ancestors().find_map(|dir| {
        CONFIG_FILE_NAMES
            .iter()
            .map(|name| dir.join(name))
            .find(|candidate| candidate.is_file())
    })
}

/// Load the `local` section for `sources`.  No file means no credentials.
///
/// Returns `Config` if a file exists but cannot be read or parsed.
pub fn load_config(sources: &Path) -> TrailResult<LocalConfig> {
    let Some(path) = find_config(sources) else {
        debug!(sources = %sources.display(), "no npl.yml found; replaying without credentials");
        return Ok(LocalConfig::default());
    };
    let text = std::fs::read_to_string(&path).map_err(|e| TrailError::Config {
        reason: format!("failed to read '{}': {e}", path.display()),
    })?;
    let config = parse_config(&text, &path)?;
    info!(
        path = %path.display(),
        parties = config.parties.len(),
        tokens = config.tokens.len(),
        "replay credentials loaded"
    );
    Ok(config)
}

pub fn parse_config(text: &str, path: &Path) -> TrailResult<LocalConfig> {
    if text.trim().is_empty() {
        return Ok(LocalConfig::default());
    }
    let file: NplFile = serde_yaml::from_str(text).map_err(|e| TrailError::Config {
        reason: format!("failed to parse '{}': {e}", path.display()),
    })?;
    Ok(file.local)
}
