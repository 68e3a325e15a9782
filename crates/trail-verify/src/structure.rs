//! Structure validation against an embedded JSON Schema.
//!
//! The audit log is serialized back to its wire form and validated with the
//! `jsonschema` crate.  Every violation is collected; pointer paths such as
//! `/audit_log/0/proof/jws` are reported as `entry 0: proof.jws`.

use jsonschema::Validator;
use serde_json::{json, Value};
use tracing::{debug, warn};

use trail_contracts::{
    audit::AuditLog,
    error::{TrailError, TrailResult},
    report::{StepError, VerificationStep},
};
use trail_core::traits::StructureValidator;

/// Required non-blank fields of every entry.  Blank means empty or
/// whitespace only.
pub fn audit_schema() -> Value {
    json!({
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "type": "object",
        "required": ["audit_log"],
        "properties": {
            "audit_log": {
                "type": "array",
                "minItems": 1,
                "items": {
                    "type": "object",
                    "required": ["id", "timestamp", "action", "stateHash", "proof"],
                    "properties": {
                        "id": { "$ref": "#/$defs/nonBlank" },
                        "timestamp": { "$ref": "#/$defs/nonBlank" },
                        "stateHash": { "$ref": "#/$defs/nonBlank" },
                        "action": {
                            "type": "object",
                            "required": ["name"],
                            "properties": {
                                "name": { "$ref": "#/$defs/nonBlank" }
                            }
                        },
                        "proof": {
                            "type": "object",
                            "required": ["verificationMethod", "jws"],
                            "properties": {
                                "verificationMethod": { "$ref": "#/$defs/nonBlank" },
                                "jws": { "$ref": "#/$defs/nonBlank" }
                            }
                        }
                    }
                }
            },
            "state": { "type": "object" }
        },
        "$defs": {
            "nonBlank": { "type": "string", "pattern": "\\S" }
        }
    })
}

pub struct SchemaStructureValidator {
    validator: Validator,
}

impl SchemaStructureValidator {
    /// Compile the embedded audit schema.
    ///
    /// Returns `Config` if the schema fails to compile.
    pub fn new() -> TrailResult<Self> {
        let validator = jsonschema::validator_for(&audit_schema()).map_err(|e| TrailError::Config {
            reason: format!("invalid audit JSON Schema: {e}"),
        })?;
        Ok(Self { validator })
    }
}

impl StructureValidator for SchemaStructureValidator {
    fn validate(&self, log: &AuditLog) -> Vec<StepError> {
        let document = match serde_json::to_value(log) {
            Ok(document) => document,
            Err(e) => {
                return vec![StepError::new(
                    VerificationStep::Structure,
                    format!("audit log cannot be serialized: {e}"),
                )]
            }
        };

        let mut violations: Vec<(Option<usize>, String, String)> = self
            .validator
            .iter_errors(&document)
            .map(|error| {
                let pointer = error.instance_path.to_string();
                let (index, message) = describe(&pointer, &error.to_string());
                (index, pointer, message)
            })
            .collect();
        // Log order, then field path.
        violations.sort();

        let errors: Vec<StepError> = violations
            .into_iter()
            .map(|(_, _, message)| {
                warn!(%message, "structure violation");
                StepError::new(VerificationStep::Structure, message)
            })
            .collect();

        debug!(
            entries = log.entries.len(),
            failures = errors.len(),
            "structure stage complete"
        );
        errors
    }
}

/// Turn a JSON pointer into a message.  Returns the entry index alongside
/// so that violations can be ordered by entry.
fn describe(pointer: &str, detail: &str) -> (Option<usize>, String) {
    let segments: Vec<&str> = pointer.trim_start_matches('/').split('/').collect();
    match segments.as_slice() {
        ["audit_log"] => (None, "audit log has no entries".to_string()),
        ["audit_log", index, field @ ..] if !field.is_empty() => {
            let entry = index.parse::<usize>().ok();
            let label = entry.map_or_else(|| (*index).to_string(), |i| i.to_string());
            (
                entry,
                format!("entry {label}: {} must not be blank", field.join(".")),
            )
        }
        _ => (None, format!("schema violation at '{pointer}': {detail}")),
    }
}
