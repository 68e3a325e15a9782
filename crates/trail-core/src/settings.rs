//! Verifier settings loaded from TOML, the environment, and defaults.
//!
//! `VerifierSettings::from_toml_str` / `from_file` parse an optional settings
//! file; every field has a default so an empty document is valid.
//! `apply_env` then layers environment overrides on top.  Command-line flags
//! are applied last by the binary.
//!
//! Example:
//! ```toml
//! fail_fast = false
//!
//! [did]
//! scheme = "http"
//! host_override = "localhost:8080"
//!
//! [http]
//! connect_timeout_secs = 5
//! timeout_secs = 20
//!
//! [replay]
//! enabled = true
//! base_url = "http://localhost:12000"
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use trail_contracts::error::{TrailError, TrailResult};

/// Environment variable overriding the replay runtime base URL.
pub const ENV_REPLAY_BASE_URL: &str = "NPL_REPLAY_BASE_URL";

/// Environment variable enabling verbose diagnostics.
pub const ENV_VERBOSE: &str = "TRAIL_VERBOSE";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VerifierSettings {
    /// Stop after the first stage that reports an error.
    pub fail_fast: bool,
    pub did: DidSettings,
    pub http: HttpSettings,
    pub replay: ReplaySettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DidSettings {
    /// `https` (default) or `http`.
    pub scheme: String,
    /// Resolve every `did:web` against this `host[:port]` instead of the
    /// host named in the DID.
    pub host_override: Option<String>,
}

impl Default for DidSettings {
    fn default() -> Self {
        Self {
            scheme: "https".to_string(),
            host_override: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpSettings {
    pub connect_timeout_secs: u64,
    pub timeout_secs: u64,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 10,
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplaySettings {
    pub enabled: bool,
    pub base_url: String,
}

impl Default for ReplaySettings {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: "http://localhost:12000".to_string(),
        }
    }
}

impl VerifierSettings {
    /// Parse `s` as TOML settings.
    ///
    /// Returns `TrailError::Config` if the TOML is malformed, does not match
    /// the settings schema, or carries invalid values.
    pub fn from_toml_str(s: &str) -> TrailResult<Self> {
        let settings: VerifierSettings = toml::from_str(s).map_err(|e| TrailError::Config {
            reason: format!("failed to parse settings TOML: {e}"),
        })?;
        settings.validate()?;
        Ok(settings)
    }

    /// Read the file at `path` and parse it as TOML settings.
    pub fn from_file(path: &Path) -> TrailResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| TrailError::Config {
            reason: format!("failed to read settings file '{}': {e}", path.display()),
        })?;
        Self::from_toml_str(&contents)
    }

    /// Apply environment overrides from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_env_from(|key| std::env::var(key).ok());
    }

    /// Apply environment overrides using `lookup` in place of the process
    /// environment.
    pub fn apply_env_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup(ENV_REPLAY_BASE_URL).filter(|u| !u.trim().is_empty()) {
            self.replay.base_url = url;
        }
    }

    /// Check values that TOML types alone cannot constrain.
    pub fn validate(&self) -> TrailResult<()> {
        if self.did.scheme != "http" && self.did.scheme != "https" {
            return Err(TrailError::Config {
                reason: format!(
                    "did.scheme must be 'http' or 'https', got '{}'",
                    self.did.scheme
                ),
            });
        }
        if self.http.timeout_secs == 0 || self.http.connect_timeout_secs == 0 {
            return Err(TrailError::Config {
                reason: "http timeouts must be greater than zero".to_string(),
            });
        }
        if self.replay.base_url.trim().is_empty() {
            return Err(TrailError::Config {
                reason: "replay.base_url must not be empty".to_string(),
            });
        }
        Ok(())
    }
}

/// True when a verbosity toggle value means "on".
pub fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
