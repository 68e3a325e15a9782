//! Value normalization for outgoing parameters and fetched state.

use serde_json::{Map, Number, Value};

/// Restore the JSON type of a stringly-typed value: integer, then float,
/// then strict `true`/`false`, else the original string.  Applied
/// recursively through arrays and objects.
pub fn normalize_value(value: &Value) -> Value {
    match value {
        Value::String(s) => normalize_scalar(s),
        Value::Array(items) => Value::Array(items.iter().map(normalize_value).collect()),
        Value::Object(map) => Value::Object(normalize_parameters(map)),
        other => other.clone(),
    }
}

pub fn normalize_parameters(parameters: &Map<String, Value>) -> Map<String, Value> {
    parameters
        .iter()
        .map(|(k, v)| (k.clone(), normalize_value(v)))
        .collect()
}

fn normalize_scalar(s: &str) -> Value {
    if let Ok(i) = s.parse::<i64>() {
        return Value::Number(i.into());
    }
    if let Some(n) = s
        .parse::<f64>()
        .ok()
        .filter(|f| f.is_finite())
        .and_then(Number::from_f64)
    {
        return Value::Number(n);
    }
    match s {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        _ => Value::String(s.to_string()),
    }
}

/// Rewrite the runtime-assigned `live_id` to `audited_id` in `@id` and in
/// every `@actions` URL, so that a replayed instance compares equal to the
/// audited one.
pub fn normalize_live_id(state: &Value, live_id: &str, audited_id: &str) -> Value {
    let mut state = state.clone();
    if live_id == audited_id {
        return state;
    }
    let Some(object) = state.as_object_mut() else {
        return state;
    };

    if let Some(Value::String(id)) = object.get_mut("@id") {
        *id = id.replace(live_id, audited_id);
    }
    if let Some(Value::Object(actions)) = object.get_mut("@actions") {
        for url in actions.values_mut() {
            if let Value::String(s) = url {
                *s = s.replace(live_id, audited_id);
            }
        }
    }
    state
}

/// Keep only the top-level keys of `state` that the audited final state
/// carries.  An empty or non-object reference leaves `state` unchanged.
pub fn project_state(state: Value, reference: &Value) -> Value {
    let Some(keys) = reference.as_object().filter(|r| !r.is_empty()) else {
        return state;
    };
    match state {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .filter(|(k, _)| keys.contains_key(k))
                .collect(),
        ),
        other => other,
    }
}

/// `arg0`, `arg1`, ...: positional constructor placeholders.
pub fn is_positional(key: &str) -> bool {
    key.strip_prefix("arg")
        .is_some_and(|rest| !rest.is_empty() && rest.bytes().all(|b| b.is_ascii_digit()))
}
