use crate::core::error::BridgeError;
use rust_decimal::Decimal;
use serde_json::{Map, Value};
use std::str::FromStr;

pub const MASKED: &str = "***MASKED***";

/// Request parameters as received from the caller.
///
/// Lookups treat `null` and empty strings as absent, the same way the calling
/// layer treats them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Params(Map<String, Value>);

impl From<Map<String, Value>> for Params {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl Params {
    pub fn from_json(raw: &str) -> Result<Self, BridgeError> {
        match serde_json::from_str::<Value>(raw) {
            Ok(Value::Object(map)) => Ok(Self(map)),
            Ok(other) => Err(BridgeError::MalformedRequest(format!(
                "expected a JSON object, got {}",
                kind(&other)
            ))),
            Err(e) => Err(BridgeError::MalformedRequest(e.to_string())),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        match self.0.get(key) {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) if s.is_empty() => None,
            Some(v) => Some(v),
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn keys(&self) -> Vec<String> {
        self.0.keys().cloned().collect()
    }

    pub fn raw(&self, key: &str) -> Value {
        self.0.get(key).cloned().unwrap_or(Value::Null)
    }

    /// String form of a scalar parameter. Numbers keep their JSON spelling.
    pub fn text(&self, key: &str) -> Option<String> {
        match self.get(key)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    /// First present key wins.
    pub fn text_any(&self, keys: &[&str]) -> Option<String> {
        keys.iter().find_map(|k| self.text(k))
    }

    pub fn text_or(&self, key: &str, default: &str) -> String {
        self.text(key).unwrap_or_else(|| default.to_string())
    }

    pub fn require_text(&self, key: &str) -> Result<String, BridgeError> {
        self.text(key)
            .ok_or_else(|| BridgeError::MissingParam(key.to_string()))
    }

    pub fn flag(&self, key: &str) -> Result<bool, BridgeError> {
        match self.get(key) {
            None => Ok(false),
            Some(Value::Bool(b)) => Ok(*b),
            Some(Value::String(s)) => match s.to_ascii_lowercase().as_str() {
                "true" | "1" | "yes" => Ok(true),
                "false" | "0" | "no" => Ok(false),
                _ => Err(BridgeError::invalid(key, format!("expected a boolean, got {s:?}"))),
            },
            Some(Value::Number(n)) => Ok(n.as_f64().is_some_and(|f| f != 0.0)),
            Some(other) => Err(BridgeError::invalid(
                key,
                format!("expected a boolean, got {}", kind(other)),
            )),
        }
    }

    pub fn u64_opt(&self, key: &str) -> Result<Option<u64>, BridgeError> {
        let Some(value) = self.get(key) else {
            return Ok(None);
        };
        let parsed = match value {
            Value::Number(n) => n.as_u64(),
            Value::String(s) => s.trim().parse::<u64>().ok(),
            _ => None,
        };
        parsed
            .map(Some)
            .ok_or_else(|| BridgeError::invalid(key, "expected a non-negative integer"))
    }

    pub fn require_u64(&self, key: &str) -> Result<u64, BridgeError> {
        self.u64_opt(key)?
            .ok_or_else(|| BridgeError::MissingParam(key.to_string()))
    }

    pub fn u64_or(&self, key: &str, default: u64) -> Result<u64, BridgeError> {
        Ok(self.u64_opt(key)?.unwrap_or(default))
    }

    pub fn decimal_opt(&self, key: &str) -> Result<Option<Decimal>, BridgeError> {
        let Some(raw) = self.text(key) else {
            return Ok(None);
        };
        Decimal::from_str(raw.trim())
            .or_else(|_| Decimal::from_scientific(raw.trim()))
            .map(Some)
            .map_err(|_| BridgeError::invalid(key, format!("expected a decimal, got {raw:?}")))
    }

    pub fn require_decimal(&self, key: &str) -> Result<Decimal, BridgeError> {
        self.decimal_opt(key)?
            .ok_or_else(|| BridgeError::MissingParam(key.to_string()))
    }

    /// `"***MASKED***"` when the secret was supplied, `null` otherwise.
    pub fn masked(&self, key: &str) -> Value {
        if self.contains(key) {
            Value::String(MASKED.to_string())
        } else {
            Value::Null
        }
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str_exact(s).unwrap()
    }

    fn params(value: Value) -> Params {
        match value {
            Value::Object(map) => Params::from(map),
            _ => unreachable!(),
        }
    }

    #[test]
    fn text_treats_empty_and_null_as_absent() {
        let p = params(json!({"a": "", "b": null, "c": "x", "d": 12, "e": 0.5}));
        assert_eq!(p.text("a"), None);
        assert_eq!(p.text("b"), None);
        assert_eq!(p.text("c").as_deref(), Some("x"));
        assert_eq!(p.text("d").as_deref(), Some("12"));
        assert_eq!(p.text("e").as_deref(), Some("0.5"));
        assert_eq!(p.text_any(&["a", "b", "d"]).as_deref(), Some("12"));
    }

    #[test]
    fn missing_required_param_names_the_key() {
        let p = Params::default();
        let err = p.require_text("market_name").unwrap_err();
        assert_eq!(err.to_string(), "Missing required parameter: market_name");
    }

    #[test]
    fn decimals_accept_strings_and_numbers() {
        let p = params(json!({"a": "0.001", "b": 2, "c": "abc"}));
        assert_eq!(p.require_decimal("a").unwrap(), dec("0.001"));
        assert_eq!(p.require_decimal("b").unwrap(), dec("2"));
        assert!(p.require_decimal("c").is_err());
    }

    #[test]
    fn flags_parse_loosely() {
        let p = params(json!({"a": true, "b": "false", "c": "maybe"}));
        assert!(p.flag("a").unwrap());
        assert!(!p.flag("b").unwrap());
        assert!(!p.flag("missing").unwrap());
        assert!(p.flag("c").is_err());
    }

    #[test]
    fn numeric_flags_follow_their_value() {
        let p = params(json!({"zero": 0, "zero_f": 0.0, "one": 1, "half": 0.5}));
        assert!(!p.flag("zero").unwrap());
        assert!(!p.flag("zero_f").unwrap());
        assert!(p.flag("one").unwrap());
        assert!(p.flag("half").unwrap());
    }

    #[test]
    fn integers_from_strings() {
        let p = params(json!({"vault": "10001", "limit": 5, "bad": "-1"}));
        assert_eq!(p.require_u64("vault").unwrap(), 10001);
        assert_eq!(p.u64_or("limit", 50).unwrap(), 5);
        assert_eq!(p.u64_or("absent", 50).unwrap(), 50);
        assert!(p.u64_opt("bad").is_err());
    }

    #[test]
    fn from_json_rejects_non_objects() {
        assert!(Params::from_json("[1,2]").is_err());
        assert!(Params::from_json("{not json").is_err());
        assert!(Params::from_json(r#"{"a":1}"#).unwrap().contains("a"));
    }

    #[test]
    fn secrets_mask_only_when_present() {
        let p = params(json!({"api_key": "k"}));
        assert_eq!(p.masked("api_key"), json!(MASKED));
        assert_eq!(p.masked("private_key"), Value::Null);
    }
}
