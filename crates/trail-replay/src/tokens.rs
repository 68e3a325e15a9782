//! Bearer tokens per party and the order in which they are tried.

use std::collections::BTreeMap;

use serde::Deserialize;
use tracing::{debug, warn};

use trail_core::traits::Transport;
use trail_core::transport::HttpRequest;

use crate::config::LocalConfig;

/// Label used for the legacy single credential.
pub const LEGACY_LABEL: &str = "<default>";

/// One authorization attempt.  `token` is `None` for an unauthenticated
/// call.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    pub label: String,
    pub token: Option<String>,
}

impl std::fmt::Debug for Credential {
    // Tokens stay out of logs and panic messages.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("label", &self.label)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// Tokens resolved once per replay run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PartyTokens {
    by_party: BTreeMap<String, String>,
    legacy: Option<String>,
}

impl PartyTokens {
    /// Build tokens directly; used when credentials come from elsewhere.
    pub fn new(by_party: BTreeMap<String, String>, legacy: Option<String>) -> Self {
        Self { by_party, legacy }
    }

    /// Resolve every configured credential.
    ///
    /// Per party, password-grant credentials win over pre-issued tokens.  A
    /// party whose exchange fails is logged and left out.
    pub fn resolve(config: &LocalConfig, transport: &dyn Transport) -> Self {
        let mut by_party = BTreeMap::new();

        for (party, credentials) in &config.parties {
            match password_grant(config, transport, &credentials.username, &credentials.password) {
                Ok(token) => {
                    debug!(party = %party, "party token acquired");
                    by_party.insert(party.clone(), token);
                }
                Err(reason) => warn!(party = %party, %reason, "party token unavailable"),
            }
        }
        for (party, token) in &config.tokens {
            by_party
                .entry(party.clone())
                .or_insert_with(|| token.clone());
        }

        let legacy = match (&config.token, &config.username, &config.password) {
            (Some(token), _, _) => Some(token.clone()),
            (None, Some(username), Some(password)) => {
                match password_grant(config, transport, username, password) {
                    Ok(token) => Some(token),
                    Err(reason) => {
                        warn!(%reason, "default token unavailable");
                        None
                    }
                }
            }
            _ => None,
        };

        Self { by_party, legacy }
    }

    pub fn is_empty(&self) -> bool {
        self.by_party.is_empty() && self.legacy.is_none()
    }

    pub fn parties(&self) -> impl Iterator<Item = &str> {
        self.by_party.keys().map(String::as_str)
    }

    /// Tokens to try, in order: the hinted party, the audited parties
    /// (sorted), every other known party (sorted), then the legacy token.
    /// Each token appears once.  With no tokens at all, a single
    /// unauthenticated attempt.
    pub fn priority(&self, hint: Option<&str>, audited_parties: &[String]) -> Vec<Credential> {
        let mut sorted_audited: Vec<&str> = audited_parties.iter().map(String::as_str).collect();
        sorted_audited.sort_unstable();

        let order = hint
            .into_iter()
            .chain(sorted_audited)
            .chain(self.by_party.keys().map(String::as_str));

        let mut attempts: Vec<Credential> = Vec::new();
        for party in order {
            let Some(token) = self.by_party.get(party) else {
                continue;
            };
            if attempts.iter().any(|a| a.token.as_ref() == Some(token)) {
                continue;
            }
            attempts.push(Credential {
                label: party.to_string(),
                token: Some(token.clone()),
            });
        }
        if let Some(token) = &self.legacy {
            if !attempts.iter().any(|a| a.token.as_ref() == Some(token)) {
                attempts.push(Credential {
                    label: LEGACY_LABEL.to_string(),
                    token: Some(token.clone()),
                });
            }
        }

        if attempts.is_empty() {
            attempts.push(Credential {
                label: "anonymous".to_string(),
                token: None,
            });
        }
        attempts
    }
}

/// Exchange a username and password for an access token.
fn password_grant(
    config: &LocalConfig,
    transport: &dyn Transport,
    username: &str,
    password: &str,
) -> Result<String, String> {
    let Some(auth_url) = config.auth_url.as_deref() else {
        return Err("no authUrl configured for password grant".to_string());
    };

    let mut fields = vec![
        ("grant_type".to_string(), "password".to_string()),
        ("client_id".to_string(), config.client_id.clone()),
        ("username".to_string(), username.to_string()),
        ("password".to_string(), password.to_string()),
    ];
    if let Some(secret) = &config.client_secret {
        fields.push(("client_secret".to_string(), secret.clone()));
    }

    let response = transport
        .send(&HttpRequest::post_form(auth_url, fields))
        .map_err(|e| e.to_string())?;
    if !response.is_success() {
        return Err(format!("token endpoint returned HTTP {}", response.status));
    }
    response
        .json::<TokenResponse>(auth_url)
        .map(|r| r.access_token)
        .map_err(|e| e.to_string())
}
