//! Turning venue responses into plain JSON.
//!
//! Typed schemas already carry money as `Decimal`, which serializes as a
//! string. Payloads relayed without a schema may still contain fractional
//! JSON numbers; [`normalize`] rewrites those as strings so callers never see
//! a float for a price or size.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

const ENVELOPE_KEYS: [&str; 2] = ["data", "result"];

/// Deserialize `value`, looking through a `data` or `result` envelope.
///
/// A body is only read as bare when neither key is present, so an envelope
/// holding `null` fails instead of yielding an all-default value.
pub fn unwrap_envelope<T: DeserializeOwned>(value: Value) -> serde_json::Result<T> {
    match value {
        Value::Object(mut map) if ENVELOPE_KEYS.iter().any(|k| map.contains_key(*k)) => {
            let inner = ENVELOPE_KEYS
                .iter()
                .find_map(|k| map.remove(*k))
                .unwrap_or(Value::Null);
            serde_json::from_value(inner)
        }
        bare => serde_json::from_value(bare),
    }
}

pub fn to_plain<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<Value> {
    Ok(normalize(serde_json::to_value(value)?))
}

pub fn normalize(value: Value) -> Value {
    match value {
        Value::Number(n) if n.is_f64() => Value::String(n.to_string()),
        Value::Array(items) => Value::Array(items.into_iter().map(normalize).collect()),
        Value::Object(map) => Value::Object(map.into_iter().map(|(k, v)| (k, normalize(v))).collect()),
        other => other,
    }
}
