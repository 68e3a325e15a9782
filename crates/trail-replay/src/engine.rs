//! The replay engine: re-executes an audit log against a live runtime.
//!
//! Per run:
//!
//!   AwaitingConstruction ──construct ok──▶ Active { live_id }
//!          │                                   │
//!          └──construct failed──▶ Failed       └── invoke, fetch, compare
//!
//! Every entry is visited.  Each divergence or failed call adds one message
//! to the report; only a malformed identity, an unreadable `npl.yml`, or
//! cancellation ends the run early.

use std::path::Path;
use std::sync::Arc;

use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use trail_audit::canonical_hash;
use trail_contracts::{
    audit::{ActionKind, AuditEntry, AuditLog},
    error::{TrailError, TrailResult},
    identity::ProtocolIdentity,
    report::ReplayReport,
};
use trail_core::settings::ReplaySettings;
use trail_core::traits::{Replayer, Transport};
use trail_core::transport::{HttpRequest, HttpResponse};

use crate::config::load_config;
use crate::hints::PartyHints;
use crate::normalize::{
    is_positional, normalize_live_id, normalize_parameters, normalize_value, project_state,
};
use crate::tokens::{Credential, PartyTokens};

const PARTIES_KEY: &str = "@parties";

pub struct ReplayEngine {
    transport: Arc<dyn Transport>,
    base_url: String,
}

impl ReplayEngine {
    pub fn new(transport: Arc<dyn Transport>, base_url: impl Into<String>) -> Self {
        Self {
            transport,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn from_settings(transport: Arc<dyn Transport>, settings: &ReplaySettings) -> Self {
        Self::new(transport, settings.base_url.clone())
    }

    /// Replay with credentials and hints supplied by the caller instead of
    /// being read from `sources`.
    pub fn replay_with(
        &self,
        log: &AuditLog,
        tokens: &PartyTokens,
        hints: &PartyHints,
    ) -> TrailResult<ReplayReport> {
        let first = log.entries.first().ok_or_else(|| TrailError::Replay {
            reason: "audit log has no entries".to_string(),
        })?;
        let identity = ProtocolIdentity::parse(&first.id)?;
        let route = format!("{}{}", self.base_url, identity.route());

        info!(
            protocol = %identity.protocol_name,
            package = %identity.package_path,
            entries = log.entries.len(),
            base_url = %self.base_url,
            "replay starting"
        );

        let mut run = ReplayRun {
            transport: self.transport.as_ref(),
            tokens,
            hints,
            identity: &identity,
            route,
            audited_state: &log.state,
            audited_parties: audited_parties(log),
            phase: Phase::AwaitingConstruction,
            replayed: 0,
            errors: Vec::new(),
        };

        for (index, entry) in log.entries.iter().enumerate() {
            if let Err(message) = run.step(index, entry)? {
                let message = format!("entry {index} ({}): {message}", entry.action.name);
                warn!(entry = index, %message, "replay divergence");
                run.errors.push(message);
            }
        }

        let report = ReplayReport::new(run.replayed, run.errors);
        info!(
            replayed = report.entries_replayed,
            failures = report.errors.len(),
            "replay complete"
        );
        Ok(report)
    }
}

impl Replayer for ReplayEngine {
    fn replay(&self, log: &AuditLog, sources: &Path) -> TrailResult<ReplayReport> {
        // Identity problems surface before any credential exchange.
        if let Some(first) = log.entries.first() {
            ProtocolIdentity::parse(&first.id)?;
        }
        let config = load_config(sources)?;
        let tokens = PartyTokens::resolve(&config, self.transport.as_ref());
        let hints = PartyHints::scan(sources);
        self.replay_with(log, &tokens, &hints)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Phase {
    AwaitingConstruction,
    Active { live_id: String },
    Failed,
}

#[derive(Deserialize)]
struct Constructed {
    #[serde(rename = "@id")]
    id: String,
}

/// Ephemeral per-run state.
struct ReplayRun<'a> {
    transport: &'a dyn Transport,
    tokens: &'a PartyTokens,
    hints: &'a PartyHints,
    identity: &'a ProtocolIdentity,
    route: String,
    audited_state: &'a Value,
    audited_parties: Vec<String>,
    phase: Phase,
    replayed: usize,
    errors: Vec<String>,
}

/// Outer `Err` ends the run; inner `Err` is one entry's failure.
type StepOutcome = TrailResult<Result<(), String>>;

impl ReplayRun<'_> {
    fn step(&mut self, index: usize, entry: &AuditEntry) -> StepOutcome {
        let kind = entry
            .action
            .kind
            .unwrap_or_else(|| ActionKind::inferred(index));
        debug!(entry = index, kind = kind.as_str(), action = %entry.action.name, "replaying entry");

        match (&self.phase, kind) {
            (Phase::AwaitingConstruction, ActionKind::Constructor) => {
                let live_id = match self.construct(entry)? {
                    Ok(live_id) => live_id,
                    Err(message) => {
                        self.phase = Phase::Failed;
                        return Ok(Err(message));
                    }
                };
                debug!(live_id = %live_id, "instance constructed");
                self.replayed += 1;
                self.phase = Phase::Active {
                    live_id: live_id.clone(),
                };
                self.compare_state(entry, &live_id)
            }
            (Phase::AwaitingConstruction | Phase::Failed, _) => {
                Ok(Err("cannot replay action before constructor".to_string()))
            }
            (Phase::Active { .. }, ActionKind::Constructor) => Ok(Err(
                "unexpected constructor: the instance was already constructed".to_string(),
            )),
            (Phase::Active { live_id }, ActionKind::Permission | ActionKind::Obligation) => {
                let live_id = live_id.clone();
                if let Err(message) = self.invoke(entry, &live_id)? {
                    return Ok(Err(message));
                }
                self.replayed += 1;
                self.compare_state(entry, &live_id)
            }
        }
    }

    fn construct(&self, entry: &AuditEntry) -> TrailResult<Result<String, String>> {
        let url = format!("{}/", self.route);
        let body = constructor_body(entry, self.audited_state);
        let hint = self.hints.for_constructor(&self.identity.protocol_name);
        let response = match self.call(HttpRequest::post_json(url.as_str(), body), hint)? {
            Ok(response) => response,
            Err(message) => return Ok(Err(format!("constructor failed: {message}"))),
        };
        Ok(response
            .json::<Constructed>(&url)
            .map(|c| c.id)
            .map_err(|_| "constructor response has no @id".to_string()))
    }

    fn invoke(&self, entry: &AuditEntry, live_id: &str) -> StepOutcome {
        let url = format!("{}/{live_id}/{}", self.route, entry.action.name);
        let body = Value::Object(normalize_parameters(&entry.action.parameters));
        let hint = self.hints.for_action(&entry.action.name);
        Ok(self
            .call(HttpRequest::post_json(url, body), hint)?
            .map(|_| ())
            .map_err(|message| format!("action failed: {message}")))
    }

    fn compare_state(&self, entry: &AuditEntry, live_id: &str) -> StepOutcome {
        let url = format!("{}/{live_id}/", self.route);
        let credentials = self.credentials(None);
        let response = match self.call_with(&HttpRequest::get(url.as_str()), &credentials)? {
            Ok(response) => response,
            Err(message) => return Ok(Err(format!("failed to fetch state: {message}"))),
        };
        let state: Value = match response.json(&url) {
            Ok(state) => state,
            Err(e) => return Ok(Err(format!("failed to read state: {e}"))),
        };

        let audited_id = self.identity.protocol_id.to_string();
        let normalized = normalize_live_id(&state, live_id, &audited_id);
        let computed = canonical_hash(&project_state(normalized, self.audited_state));
        if computed == entry.state_hash {
            debug!(action = %entry.action.name, "state hash reproduced");
            return Ok(Ok(()));
        }
        Ok(Err(format!(
            "state hash mismatch: audit records {}, replay produced {computed}; \
             the protocol logic has likely changed since this audit was recorded",
            entry.state_hash
        )))
    }

    fn credentials(&self, hint: Option<&str>) -> Vec<Credential> {
        self.tokens.priority(hint, &self.audited_parties)
    }

    fn call(
        &self,
        request: HttpRequest,
        hint: Option<&str>,
    ) -> TrailResult<Result<HttpResponse, String>> {
        let credentials = self.credentials(hint);
        self.call_with(&request, &credentials)
    }

    /// Try each credential in turn.  `403` moves on to the next one; any
    /// other failure ends the attempt.
    fn call_with(
        &self,
        request: &HttpRequest,
        credentials: &[Credential],
    ) -> TrailResult<Result<HttpResponse, String>> {
        for credential in credentials {
            let attempt = request.clone().with_bearer(credential.token.as_deref());
            let response = match self.transport.send(&attempt) {
                Ok(response) => response,
                Err(TrailError::Cancelled) => return Err(TrailError::Cancelled),
                Err(e) => return Ok(Err(e.to_string())),
            };
            if response.status == 403 {
                debug!(party = %credential.label, url = %request.url, "forbidden; trying next party");
                continue;
            }
            if response.is_success() {
                debug!(party = %credential.label, url = %request.url, "call accepted");
                return Ok(Ok(response));
            }
            return Ok(Err(format!(
                "HTTP {} from {}",
                response.status, request.url
            )));
        }
        Ok(Err(format!(
            "every party was refused (403) by {}",
            request.url
        )))
    }
}

/// Party names from the audited final state, else from the constructor's
/// parameters.
fn audited_parties(log: &AuditLog) -> Vec<String> {
    let from_state = log.state.get(PARTIES_KEY);
    let from_params = log
        .entries
        .first()
        .and_then(|e| e.action.parameters.get(PARTIES_KEY));
    let Some(parties) = from_state.filter(|p| !is_empty(p)).or(from_params) else {
        return Vec::new();
    };
    let mut names: Vec<String> = match parties {
        Value::Object(map) => map.keys().cloned().collect(),
        Value::Array(items) => items
            .iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect(),
        _ => Vec::new(),
    };
    names.sort();
    names
}

/// `@parties` plus the named constructor arguments.  Positional `argN`
/// placeholders are replaced by the audited state's own named fields.
fn constructor_body(entry: &AuditEntry, audited_state: &Value) -> Value {
    let parameters = &entry.action.parameters;
    let mut body = Map::new();

    let parties = audited_state
        .get(PARTIES_KEY)
        .filter(|p| !is_empty(p))
        .or_else(|| parameters.get(PARTIES_KEY));
    if let Some(parties) = parties {
        body.insert(PARTIES_KEY.to_string(), parties.clone());
    }

    let mut positional = false;
    for (key, value) in parameters {
        if key == PARTIES_KEY {
            continue;
        }
        if is_positional(key) {
            positional = true;
            continue;
        }
        body.insert(key.clone(), normalize_value(value));
    }

    if positional {
        if let Some(state) = audited_state.as_object() {
            for (key, value) in state {
                if !key.starts_with('@') && !body.contains_key(key) {
                    body.insert(key.clone(), normalize_value(value));
                }
            }
        }
    }
    Value::Object(body)
}

fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::Arc;

    use serde_json::json;

    use trail_contracts::audit::AuditLog;
    use trail_contracts::error::TrailError;
    use trail_core::traits::Replayer;
    use trail_fixtures::{sample_log, sample_states, AuditLogBuilder, FakeRuntime, TestSigner};

    use super::*;

    // ── Helpers ───────────────────────────────────────────────────────────────

    const BASE: &str = "http://localhost:12000";
    const ROUTE: &str = "/npl/demo/Iou";
    const LIVE_ID: &str = "11111111-2222-3333-4444-555555555555";

    fn runtime(states: Vec<Value>) -> Arc<FakeRuntime> {
        Arc::new(FakeRuntime::new(BASE, ROUTE, LIVE_ID, states))
    }

    fn party_tokens() -> PartyTokens {
        PartyTokens::new(
            BTreeMap::from([
                ("issuer".to_string(), "issuer-token".to_string()),
                ("payee".to_string(), "payee-token".to_string()),
            ]),
            None,
        )
    }

    fn replay(runtime: &Arc<FakeRuntime>, log: &AuditLog, hints: &PartyHints) -> ReplayReport {
        ReplayEngine::new(Arc::clone(runtime) as Arc<dyn Transport>, BASE)
            .replay_with(log, &party_tokens(), hints)
            .unwrap()
    }

    // ── Reproduction ──────────────────────────────────────────────────────────

    /// The runtime assigns a new instance id; after normalization every
    /// state still hashes to the audited value.
    #[test]
    fn replay_reproduces_audited_states_under_new_id() {
        let runtime = runtime(sample_states());
        let report = replay(&runtime, &sample_log(), &PartyHints::default());

        assert!(report.success, "errors: {:?}", report.errors);
        assert_eq!(report.entries_replayed, 3);

        let posts = runtime.runtime_posts();
        assert_eq!(posts.len(), 3);
        assert_eq!(posts[0].url, format!("{BASE}{ROUTE}/"));
        assert_eq!(posts[1].url, format!("{BASE}{ROUTE}/{LIVE_ID}/pay"));
        assert_eq!(posts[2].url, format!("{BASE}{ROUTE}/{LIVE_ID}/forgive"));
    }

    #[test]
    fn constructor_body_carries_parties_and_arguments() {
        let runtime = runtime(sample_states());
        replay(&runtime, &sample_log(), &PartyHints::default());

        let posts = runtime.runtime_posts();
        assert_eq!(
            posts[0].body,
            trail_core::transport::RequestBody::Json(json!({
                "@parties": { "issuer": {}, "payee": {} },
                "forAmount": 100
            }))
        );
        assert_eq!(
            posts[1].body,
            trail_core::transport::RequestBody::Json(json!({ "amount": 40 }))
        );
    }

    /// A runtime that computes a different state reports the entry and
    /// keeps going.
    #[test]
    fn changed_logic_is_reported_per_entry() {
        let mut states = sample_states();
        states[1]["paid"] = json!(41);
        let runtime = runtime(states);

        let report = replay(&runtime, &sample_log(), &PartyHints::default());
        assert!(!report.success);
        assert_eq!(report.entries_replayed, 3);
        assert_eq!(report.errors.len(), 1);
        assert!(report.errors[0].starts_with("entry 1 (pay): state hash mismatch"));
        assert!(report.errors[0].contains("logic has likely changed"));
    }

    // ── Authorization ─────────────────────────────────────────────────────────

    /// A 403 moves on to the next party's token.
    #[test]
    fn forbidden_falls_through_to_next_party() {
        let runtime = Arc::new(
            FakeRuntime::new(BASE, ROUTE, LIVE_ID, sample_states())
                .require_token("pay", "payee-token"),
        );
        let report = replay(&runtime, &sample_log(), &PartyHints::default());
        assert!(report.success, "errors: {:?}", report.errors);

        let bearers: Vec<Option<String>> = runtime
            .runtime_posts()
            .into_iter()
            .filter(|r| r.url.ends_with("/pay"))
            .map(|r| r.bearer)
            .collect();
        assert_eq!(
            bearers,
            vec![Some("issuer-token".to_string()), Some("payee-token".to_string())]
        );
    }

    /// The hinted party is tried first.
    #[test]
    fn party_hint_is_tried_first() {
        let runtime = Arc::new(
            FakeRuntime::new(BASE, ROUTE, LIVE_ID, sample_states())
                .require_token("pay", "payee-token"),
        );
        let mut hints = PartyHints::default();
        hints.add_source("permission[payee] pay(amount: Number) { }");

        let report = replay(&runtime, &sample_log(), &hints);
        assert!(report.success, "errors: {:?}", report.errors);
        assert_eq!(runtime.runtime_posts().len(), 3);
    }

    /// When construction fails nothing downstream is called.
    #[test]
    fn failed_constructor_blocks_later_entries() {
        let runtime = Arc::new(
            FakeRuntime::new(BASE, ROUTE, LIVE_ID, sample_states()).require_token("Iou", "nobody"),
        );
        let report = replay(&runtime, &sample_log(), &PartyHints::default());

        assert_eq!(report.entries_replayed, 0);
        assert_eq!(report.errors.len(), 3);
        assert!(report.errors[0].contains("constructor failed: every party was refused (403)"));
        assert_eq!(
            report.errors[1],
            "entry 1 (pay): cannot replay action before constructor"
        );
        assert_eq!(
            report.errors[2],
            "entry 2 (forgive): cannot replay action before constructor"
        );
        // Two constructor attempts, one per token, and nothing else.
        assert_eq!(runtime.runtime_posts().len(), 2);
    }

    #[test]
    fn failed_action_is_reported_and_replay_continues() {
        let runtime = Arc::new(
            FakeRuntime::new(BASE, ROUTE, LIVE_ID, sample_states()).fail_action("pay", 500),
        );
        let report = replay(&runtime, &sample_log(), &PartyHints::default());

        assert!(report.errors[0].starts_with("entry 1 (pay): action failed: HTTP 500"));
        // forgive still runs, but from the wrong state.
        assert_eq!(report.errors.len(), 2);
        assert!(report.errors[1].starts_with("entry 2 (forgive): state hash mismatch"));
        assert_eq!(report.entries_replayed, 2);
    }

    #[test]
    fn second_constructor_is_an_error() {
        let states = sample_states();
        let log = AuditLogBuilder::new(TestSigner::issuer())
            .constructor(json!({ "forAmount": 100 }), states[0].clone())
            .constructor(json!({ "forAmount": 100 }), states[0].clone())
            .build();
        let runtime = runtime(states);

        let report = replay(&runtime, &log, &PartyHints::default());
        assert_eq!(report.errors.len(), 1);
        assert!(report.errors[0].contains("unexpected constructor"));
    }

    /// Entries without a `type` are dispatched by position.
    #[test]
    fn untyped_entries_are_inferred() {
        let states = sample_states();
        let log = AuditLogBuilder::new(TestSigner::issuer())
            .untyped("Iou", json!({ "forAmount": 100 }), states[0].clone())
            .untyped("pay", json!({ "amount": "40" }), states[1].clone())
            .build();
        let runtime = runtime(states);

        let report = replay(&runtime, &log, &PartyHints::default());
        assert!(report.success, "errors: {:?}", report.errors);
        // "40" was sent as a number.
        assert_eq!(
            runtime.runtime_posts()[1].body,
            trail_core::transport::RequestBody::Json(json!({ "amount": 40 }))
        );
    }

    /// Obligations dispatch like permissions, under a nested package path.
    #[test]
    fn obligations_are_invoked_under_nested_packages() {
        let identity = ProtocolIdentity {
            package_path: "finance/loans".to_string(),
            ..trail_fixtures::default_identity()
        };
        let states = sample_states();
        let log = AuditLogBuilder::new(TestSigner::issuer())
            .with_identity(identity)
            .constructor(json!({ "forAmount": 100 }), states[0].clone())
            .obligation("pay", json!({ "amount": 40 }), states[1].clone())
            .build();
        let runtime = Arc::new(FakeRuntime::new(
            BASE,
            "/npl/finance/loans/Iou",
            LIVE_ID,
            states,
        ));

        let report = replay(&runtime, &log, &PartyHints::default());
        assert!(report.success, "errors: {:?}", report.errors);
        assert_eq!(
            runtime.runtime_posts()[1].url,
            format!("{BASE}/npl/finance/loans/Iou/{LIVE_ID}/pay")
        );
    }

    // ── Constructor body ──────────────────────────────────────────────────────

    #[test]
    fn positional_arguments_are_replaced_by_state_fields() {
        let log = AuditLogBuilder::new(TestSigner::issuer())
            .constructor(json!({ "arg0": "100" }), sample_states()[0].clone())
            .build();
        let body = constructor_body(&log.entries[0], &log.state);
        assert_eq!(
            body,
            json!({
                "@parties": { "issuer": {}, "payee": {} },
                "forAmount": 100,
                "paid": 0
            })
        );
    }

    #[test]
    fn parties_fall_back_to_constructor_parameters() {
        let log = AuditLogBuilder::new(TestSigner::issuer())
            .constructor(json!({ "@parties": ["alice"], "limit": "5" }), json!({}))
            .build();
        assert_eq!(
            constructor_body(&log.entries[0], &log.state),
            json!({ "@parties": ["alice"], "limit": 5 })
        );
        assert_eq!(audited_parties(&log), vec!["alice".to_string()]);
    }

    // ── Aborts ────────────────────────────────────────────────────────────────

    #[test]
    fn malformed_identity_aborts_replay() {
        let mut log = sample_log();
        log.entries[0].id = "urn:npl:example.com/not-a-protocol".to_string();
        let dir = tempfile::tempdir().unwrap();

        let engine = ReplayEngine::new(runtime(sample_states()), BASE);
        assert!(matches!(
            engine.replay(&log, dir.path()),
            Err(TrailError::MalformedIdentity { .. })
        ));
    }

    #[test]
    fn empty_log_aborts_replay() {
        let engine = ReplayEngine::new(runtime(sample_states()), BASE);
        let log = AuditLog {
            entries: Vec::new(),
            state: json!({}),
        };
        assert!(matches!(
            engine.replay_with(&log, &PartyTokens::default(), &PartyHints::default()),
            Err(TrailError::Replay { .. })
        ));
    }

    // ── From sources ──────────────────────────────────────────────────────────

    /// Credentials come from `npl.yml` and hints from the `.npl` sources.
    #[test]
    fn replay_from_sources_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("npl.yml"),
            format!(
                "local:\n  authUrl: {BASE}/token\n  parties:\n    issuer:\n      username: alice\n      password: secret\n"
            ),
        )
        .unwrap();
        let src = dir.path().join("src").join("main").join("npl");
        std::fs::create_dir_all(&src).unwrap();
        std::fs::write(
            src.join("iou.npl"),
            "protocol[issuer, payee] Iou(var forAmount: Number) {\n  permission[issuer] pay(amount: Number) { }\n}\n",
        )
        .unwrap();

        let runtime = Arc::new(
            FakeRuntime::new(BASE, ROUTE, LIVE_ID, sample_states())
                .with_auth(&format!("{BASE}/token"))
                .with_user("alice", "secret", "alice-token")
                .require_token("Iou", "alice-token")
                .require_token("pay", "alice-token"),
        );
        let engine = ReplayEngine::new(Arc::clone(&runtime) as Arc<dyn Transport>, BASE);

        let report = engine.replay(&sample_log(), &src).unwrap();
        assert!(report.success, "errors: {:?}", report.errors);
        assert_eq!(report.entries_replayed, 3);
    }
}
