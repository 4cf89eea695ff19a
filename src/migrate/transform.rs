// src/migrate/transform.rs
//! Pure field conversions shared by every phase.

use chrono::{DateTime, TimeZone, Utc};
use serde_json::{Map, Value};

/// Coerce a source timestamp into a concrete instant.
///
/// Accepted shapes: RFC 3339 string, epoch seconds or milliseconds as a
/// number, or a `{seconds, nanos}` map. Anything absent or malformed falls
/// back to `fallback`, which the driver pins to the run-start instant so the
/// whole run shares one default.
pub fn coerce_timestamp(value: Option<&Value>, fallback: DateTime<Utc>) -> DateTime<Utc> {
    let Some(value) = value else {
        return fallback;
    };

    match value {
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or(fallback),
        Value::Number(n) => {
            let Some(raw) = n.as_i64() else {
                return fallback;
            };
            // Values past the year 9999 in seconds are taken as milliseconds.
            let instant = if raw.abs() >= 253_402_300_800 {
                Utc.timestamp_millis_opt(raw)
            } else {
                Utc.timestamp_opt(raw, 0)
            };
            instant.single().unwrap_or(fallback)
        }
        Value::Object(map) => {
            let seconds = map.get("seconds").and_then(Value::as_i64);
            let nanos = map.get("nanos").and_then(Value::as_i64).unwrap_or(0);
            match seconds {
                Some(secs) => Utc
                    .timestamp_opt(secs, nanos.clamp(0, 999_999_999) as u32)
                    .single()
                    .unwrap_or(fallback),
                None => fallback,
            }
        }
        _ => fallback,
    }
}

/// Integer coercion: numbers pass through, numeric strings are parsed.
pub fn coerce_i64(value: Option<&Value>) -> Option<i64> {
    match value? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

/// Float coercion: numbers pass through, numeric strings are parsed.
pub fn coerce_f64(value: Option<&Value>) -> Option<f64> {
    match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

/// Extract a list of strings, dropping non-string elements.
pub fn string_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    }
}

/// Iterate the object elements of an embedded list, skipping anything else.
pub fn object_list(value: Option<&Value>) -> impl Iterator<Item = &Map<String, Value>> {
    value
        .and_then(Value::as_array)
        .map(|items| items.as_slice())
        .unwrap_or_default()
        .iter()
        .filter_map(Value::as_object)
}

/// Borrow a string field.
pub fn opt_str<'a>(fields: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    fields.get(key).and_then(Value::as_str)
}

/// Borrow a string field, treating the empty string as absent.
pub fn non_empty_str<'a>(fields: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    opt_str(fields, key).filter(|s| !s.trim().is_empty())
}

/// Hoist the legacy nested `preferences` shape to the top level.
///
/// Older user documents stored profile data under a `preferences` map. An
/// existing top-level key always wins over the nested one.
pub fn flatten_preferences(mut fields: Map<String, Value>) -> Map<String, Value> {
    let Some(Value::Object(preferences)) = fields.remove("preferences") else {
        return fields;
    };

    for (key, value) in preferences {
        fields.entry(key).or_insert(value);
    }
    fields
}
