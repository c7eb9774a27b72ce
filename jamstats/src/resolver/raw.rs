//! Untrusted shape of the understanding service's reply.

use serde::{Deserialize, Deserializer};
use serde_json::Value;

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawIntent {
    pub kind: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub entities: RawEntities,
    pub confidence: Option<f64>,
    pub response_template: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub parts: Vec<RawIntent>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub inherit: Vec<String>,
}

/// Every field is optional and loosely typed; models return numbers as
/// strings and vice versa.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawEntities {
    pub song: Option<String>,
    pub second_song: Option<String>,
    pub venue: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub year: Option<Value>,
    pub show_date: Option<String>,
    pub country: Option<String>,
    pub position: Option<String>,
    pub threshold_minutes: Option<Value>,
    pub metric: Option<String>,
    pub direction: Option<String>,
    pub limit: Option<Value>,
    pub percentile: Option<Value>,
}

/// Read a number that may arrive as a JSON number or a numeric string.
pub fn loose_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().trim_end_matches('+').parse().ok(),
        _ => None,
    }
}

/// Decode a reply into a [`RawIntent`], or describe why it is malformed.
pub fn decode(value: Value) -> Result<RawIntent, String> {
    if !value.is_object() {
        return Err(format!("expected a JSON object, got {}", type_name(&value)));
    }
    let raw: RawIntent =
        serde_json::from_value(value).map_err(|e| format!("reply does not match the intent shape: {e}"))?;
    check_shape(&raw, 0)?;
    Ok(raw)
}

fn check_shape(raw: &RawIntent, depth: usize) -> Result<(), String> {
    if raw.kind.as_deref().map_or(true, |k| k.trim().is_empty()) {
        return Err("missing intent kind".to_string());
    }
    match raw.confidence {
        None if depth == 0 => return Err("missing confidence".to_string()),
        Some(c) if !(0.0..=1.0).contains(&c) => {
            return Err(format!("confidence {c} is outside 0..1"))
        }
        _ => {}
    }
    for part in &raw.parts {
        check_shape(part, depth + 1)?;
    }
    Ok(())
}

fn type_name(value: &Value) -> &'static str {
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

    #[test]
    fn decodes_well_formed_reply() {
        let raw = decode(json!({
            "kind": "superlative-performance",
            "entities": {"song": "Tweezer", "metric": "duration", "direction": "max", "year": "2023"},
            "confidence": 0.92,
            "response_template": null
        }))
        .unwrap();
        assert_eq!(raw.kind.as_deref(), Some("superlative-performance"));
        assert_eq!(raw.entities.song.as_deref(), Some("Tweezer"));
        assert_eq!(raw.entities.year.as_ref().and_then(loose_number), Some(2023.0));
    }

    #[test]
    fn rejects_non_objects_and_missing_fields() {
        assert!(decode(json!("superlative")).is_err());
        assert!(decode(json!([{"kind": "gap-lookup"}])).is_err());
        assert!(decode(json!({"confidence": 0.9})).is_err());
        assert!(decode(json!({"kind": "gap-lookup"})).is_err());
        assert!(decode(json!({"kind": "gap-lookup", "confidence": 7})).is_err());
        assert!(decode(json!({"kind": "gap-lookup", "confidence": 0.9, "entities": {"song": 12}})).is_err());
    }

    #[test]
    fn compound_parts_may_omit_confidence() {
        let raw = decode(json!({
            "kind": "compound",
            "confidence": 0.8,
            "parts": [
                {"kind": "gap-lookup", "entities": {"song": "Fluffhead"}},
                {"kind": "last-played", "entities": {"song": "Fluffhead"}, "confidence": 0.7}
            ]
        }))
        .unwrap();
        assert_eq!(raw.parts.len(), 2);
        assert!(decode(json!({"kind": "compound", "confidence": 0.8, "parts": [{"entities": {}}]})).is_err());
    }

    #[test]
    fn loose_number_accepts_strings() {
        assert_eq!(loose_number(&json!("20+")), Some(20.0));
        assert_eq!(loose_number(&json!(25)), Some(25.0));
        assert_eq!(loose_number(&json!(true)), None);
    }
}
