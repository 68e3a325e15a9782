//! Builds correctly chained, correctly signed audit logs.

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use serde_json::{Map, Value};
use uuid::Uuid;

use trail_audit::{canonical_hash, entry_hash};
use trail_contracts::{
    audit::{Action, ActionKind, AuditEntry, AuditLog},
    identity::ProtocolIdentity,
};

use crate::signer::TestSigner;

/// Placeholder for the protocol instance id inside state templates.
pub const ID_PLACEHOLDER: &str = "{{id}}";

/// 2026-01-01T00:00:00Z
const BASE_EPOCH_SECS: i64 = 1_767_225_600;

pub const DEFAULT_PROTOCOL_ID: Uuid = Uuid::from_u128(0x3fa85f64_5717_4562_b3fc_2c963f66afa6);

/// The identity every builder starts with:
/// `urn:npl:example.com/npl/demo/Iou/3fa85f64-...`.
pub fn default_identity() -> ProtocolIdentity {
    ProtocolIdentity {
        host: "example.com".to_string(),
        package_path: "demo".to_string(),
        protocol_name: "Iou".to_string(),
        protocol_id: DEFAULT_PROTOCOL_ID,
        index: None,
    }
}

/// Replace every `{{id}}` in the strings of `template` with `id`.
pub fn instantiate(template: &Value, id: &str) -> Value {
    match template {
        Value::String(s) => Value::String(s.replace(ID_PLACEHOLDER, id)),
        Value::Array(items) => Value::Array(items.iter().map(|v| instantiate(v, id)).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), instantiate(v, id)))
                .collect(),
        ),
        other => other.clone(),
    }
}

/// Fixed, strictly increasing timestamp for entry `index`.
pub fn timestamp(index: usize) -> String {
    let at: DateTime<Utc> = DateTime::UNIX_EPOCH + Duration::seconds(BASE_EPOCH_SECS + index as i64);
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Accumulates entries, linking and signing each as it is added.
///
/// State arguments are templates: `{{id}}` is replaced with the audited
/// protocol uuid before hashing.
pub struct AuditLogBuilder {
    signer: TestSigner,
    identity: ProtocolIdentity,
    entries: Vec<AuditEntry>,
    state: Value,
}

impl AuditLogBuilder {
    pub fn new(signer: TestSigner) -> Self {
        Self {
            signer,
            identity: default_identity(),
            entries: Vec::new(),
            state: Value::Object(Map::new()),
        }
    }

    pub fn with_identity(mut self, identity: ProtocolIdentity) -> Self {
        self.identity = identity;
        self
    }

    pub fn constructor(self, parameters: Value, state: Value) -> Self {
        let name = self.identity.protocol_name.clone();
        self.push(Some(ActionKind::Constructor), &name, parameters, state)
    }

    pub fn permission(self, name: &str, parameters: Value, state: Value) -> Self {
        self.push(Some(ActionKind::Permission), name, parameters, state)
    }

    pub fn obligation(self, name: &str, parameters: Value, state: Value) -> Self {
        self.push(Some(ActionKind::Obligation), name, parameters, state)
    }

    /// An entry whose action carries no `type`.
    pub fn untyped(self, name: &str, parameters: Value, state: Value) -> Self {
        self.push(None, name, parameters, state)
    }

    fn push(
        mut self,
        kind: Option<ActionKind>,
        name: &str,
        parameters: Value,
        state: Value,
    ) -> Self {
        let index = self.entries.len();
        let state = instantiate(&state, &self.identity.protocol_id.to_string());
        let id = ProtocolIdentity {
            index: Some(index as u64),
            ..self.identity.clone()
        }
        .to_string();

        let mut entry = AuditEntry {
            id,
            timestamp: timestamp(index),
            action: Action {
                kind,
                name: name.to_string(),
                parameters: match parameters {
                    Value::Object(map) => map,
                    _ => Map::new(),
                },
            },
            notification_hashes: Vec::new(),
            state_hash: canonical_hash(&state),
            previous_hash: self.entries.last().map(entry_hash),
            proof: Default::default(),
        };
        self.signer.sign_entry(&mut entry);

        self.entries.push(entry);
        self.state = state;
        self
    }

    /// The finished log; its final `state` is the last entry's state.
    pub fn build(self) -> AuditLog {
        AuditLog {
            entries: self.entries,
            state: self.state,
        }
    }
}
