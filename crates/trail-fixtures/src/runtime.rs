//! A scripted protocol runtime behind the `Transport` seam.
//!
//! `FakeRuntime` answers the construct, invoke and fetch endpoints for one
//! protocol route plus an optional password-grant endpoint.  After the n-th
//! successful call (the constructor is call 1) a state fetch returns the n-th
//! state template with `{{id}}` replaced by the runtime's live instance id.

use std::collections::HashMap;
use std::sync::Mutex;

use serde_json::{json, Value};

use trail_contracts::error::TrailResult;
use trail_core::traits::Transport;
use trail_core::transport::{HttpRequest, HttpResponse, Method, RequestBody};

use crate::builder::instantiate;

#[derive(Default)]
struct Progress {
    constructed: bool,
    calls: usize,
    requests: Vec<HttpRequest>,
}

pub struct FakeRuntime {
    base_url: String,
    route: String,
    live_id: String,
    states: Vec<Value>,
    /// Action name (protocol name for the constructor) → the only token it
    /// accepts.  Unlisted actions accept any caller.
    required_tokens: HashMap<String, String>,
    /// Action name → status returned instead of executing it.
    failing_actions: HashMap<String, u16>,
    auth_url: Option<String>,
    /// (username, password) → access token
    users: HashMap<(String, String), String>,
    progress: Mutex<Progress>,
}

impl FakeRuntime {
    /// `route` is the protocol route prefix, e.g. `/npl/demo/Iou`.
    pub fn new(base_url: &str, route: &str, live_id: &str, states: Vec<Value>) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            route: route.to_string(),
            live_id: live_id.to_string(),
            states,
            required_tokens: HashMap::new(),
            failing_actions: HashMap::new(),
            auth_url: None,
            users: HashMap::new(),
            progress: Mutex::new(Progress::default()),
        }
    }

    pub fn require_token(mut self, action: &str, token: &str) -> Self {
        self.required_tokens
            .insert(action.to_string(), token.to_string());
        self
    }

    pub fn fail_action(mut self, action: &str, status: u16) -> Self {
        self.failing_actions.insert(action.to_string(), status);
        self
    }

    /// Serve a password grant at `auth_url`.
    pub fn with_auth(mut self, auth_url: &str) -> Self {
        self.auth_url = Some(auth_url.to_string());
        self
    }

    pub fn with_user(mut self, username: &str, password: &str, token: &str) -> Self {
        self.users
            .insert((username.to_string(), password.to_string()), token.to_string());
        self
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.progress
            .lock()
            .map(|p| p.requests.clone())
            .unwrap_or_default()
    }

    /// POST requests to the protocol route, in order.
    pub fn runtime_posts(&self) -> Vec<HttpRequest> {
        let prefix = format!("{}{}", self.base_url, self.route);
        self.requests()
            .into_iter()
            .filter(|r| r.method == Method::Post && r.url.starts_with(&prefix))
            .collect()
    }

    fn authorize(&self, action: &str, request: &HttpRequest) -> bool {
        match self.required_tokens.get(action) {
            Some(token) => request.bearer.as_deref() == Some(token.as_str()),
            None => true,
        }
    }

    fn password_grant(&self, request: &HttpRequest) -> HttpResponse {
        let RequestBody::Form(fields) = &request.body else {
            return HttpResponse::new(400, "expected form body");
        };
        let field = |name: &str| {
            fields
                .iter()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.clone())
                .unwrap_or_default()
        };
        if field("grant_type") != "password" {
            return HttpResponse::new(400, r#"{"error":"unsupported_grant_type"}"#);
        }
        match self.users.get(&(field("username"), field("password"))) {
            Some(token) => HttpResponse::new(200, json!({ "access_token": token }).to_string()),
            None => HttpResponse::new(401, r#"{"error":"invalid_grant"}"#),
        }
    }

    fn current_state(&self, calls: usize) -> Option<Value> {
        if calls == 0 || self.states.is_empty() {
            return None;
        }
        let index = (calls - 1).min(self.states.len() - 1);
        Some(instantiate(&self.states[index], &self.live_id))
    }
}

impl Transport for FakeRuntime {
    fn send(&self, request: &HttpRequest) -> TrailResult<HttpResponse> {
        let mut progress = match self.progress.lock() {
            Ok(p) => p,
            Err(poisoned) => poisoned.into_inner(),
        };
        progress.requests.push(request.clone());

        if self.auth_url.as_deref() == Some(request.url.as_str()) {
            return Ok(self.password_grant(request));
        }

        let prefix = format!("{}{}/", self.base_url, self.route);
        let Some(rest) = request.url.strip_prefix(&prefix) else {
            return Ok(HttpResponse::new(404, "unknown route"));
        };
        let instance_prefix = format!("{}/", self.live_id);

        let response = match (request.method, rest) {
            (Method::Post, "") => {
                let name = self.route.rsplit('/').next().unwrap_or_default();
                if !self.authorize(name, request) {
                    HttpResponse::new(403, "forbidden")
                } else {
                    progress.constructed = true;
                    progress.calls = 1;
                    HttpResponse::new(200, json!({ "@id": self.live_id }).to_string())
                }
            }
            (Method::Get, r) if r == instance_prefix => match self.current_state(progress.calls) {
                Some(state) => HttpResponse::new(200, state.to_string()),
                None => HttpResponse::new(404, "no such instance"),
            },
            (Method::Post, r) => match r.strip_prefix(&instance_prefix) {
                Some(action) if progress.constructed && !action.is_empty() => {
                    if !self.authorize(action, request) {
                        HttpResponse::new(403, "forbidden")
                    } else if let Some(status) = self.failing_actions.get(action) {
                        HttpResponse::new(*status, "action failed")
                    } else {
                        progress.calls += 1;
                        HttpResponse::new(200, "{}")
                    }
                }
                _ => HttpResponse::new(404, "no such instance"),
            },
            _ => HttpResponse::new(404, "unknown route"),
        };
        Ok(response)
    }
}
