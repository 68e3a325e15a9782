//! HTTP request/response model and the blocking `reqwest` transport.
//!
//! Requests are plain data so that tests can record and answer them without
//! a network.  `HttpTransport` is the production implementation: every
//! request is bounded by connect and total timeouts, and is refused once the
//! run's `CancellationToken` has fired.

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use trail_contracts::error::{TrailError, TrailResult};

use crate::cancel::CancellationToken;
use crate::settings::HttpSettings;
use crate::traits::Transport;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Empty,
    Json(Value),
    /// `application/x-www-form-urlencoded` fields, in order.
    Form(Vec<(String, String)>),
}

/// One outbound request.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub bearer: Option<String>,
    pub body: RequestBody,
}

impl HttpRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            url: url.into(),
            bearer: None,
            body: RequestBody::Empty,
        }
    }

    pub fn post_json(url: impl Into<String>, body: Value) -> Self {
        Self {
            method: Method::Post,
            url: url.into(),
            bearer: None,
            body: RequestBody::Json(body),
        }
    }

    pub fn post_form(url: impl Into<String>, fields: Vec<(String, String)>) -> Self {
        Self {
            method: Method::Post,
            url: url.into(),
            bearer: None,
            body: RequestBody::Form(fields),
        }
    }

    pub fn with_bearer(mut self, token: Option<&str>) -> Self {
        self.bearer = token.map(str::to_string);
        self
    }
}

/// A received response.  Non-2xx statuses are still `Ok` responses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Parse the body as JSON.  `url` is only used for the error message.
    pub fn json<T: DeserializeOwned>(&self, url: &str) -> TrailResult<T> {
        serde_json::from_str(&self.body).map_err(|e| TrailError::Transport {
            url: url.to_string(),
            reason: format!("response body is not valid JSON: {e}"),
        })
    }
}

/// Blocking `reqwest` transport with bounded timeouts.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::blocking::Client,
    cancel: CancellationToken,
}

impl HttpTransport {
    /// Build a transport from HTTP settings.
    ///
    /// Returns `Config` when the underlying client cannot be initialized.
    pub fn new(settings: &HttpSettings, cancel: CancellationToken) -> TrailResult<Self> {
        let client = reqwest::blocking::Client::builder()
            .connect_timeout(Duration::from_secs(settings.connect_timeout_secs))
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(|e| TrailError::Config {
                reason: format!("failed to initialize HTTP client: {e}"),
            })?;
        Ok(Self { client, cancel })
    }
}

impl Transport for HttpTransport {
    fn send(&self, request: &HttpRequest) -> TrailResult<HttpResponse> {
        if self.cancel.is_cancelled() {
            return Err(TrailError::Cancelled);
        }

        let mut builder = match request.method {
            Method::Get => self.client.get(&request.url),
            Method::Post => self.client.post(&request.url),
        };
        builder = builder.header(reqwest::header::ACCEPT, "application/json");
        if let Some(token) = &request.bearer {
            builder = builder.bearer_auth(token);
        }
        builder = match &request.body {
            RequestBody::Empty => builder,
            RequestBody::Json(body) => builder.json(body),
            RequestBody::Form(fields) => builder.form(fields),
        };

        let transport_error = |e: reqwest::Error| TrailError::Transport {
            url: request.url.clone(),
            reason: e.to_string(),
        };

        let response = builder.send().map_err(transport_error)?;
        let status = response.status().as_u16();
        let body = response.text().map_err(transport_error)?;

        debug!(method = ?request.method, url = %request.url, status, "http exchange");
        Ok(HttpResponse { status, body })
    }
}
