//! Lenient field decoding for backend payloads.
//!
//! The backend leaves fields `null` as readily as it omits them, and its
//! timestamps are not always RFC 3339. A single odd field must not sink the
//! whole list it sits in.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Epoch values above this are read as milliseconds.
const EPOCH_MS_THRESHOLD: f64 = 100_000_000_000.0;

const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// `null` decodes to `T::default()`. Pair with `#[serde(default)]` so a
/// missing field does too.
pub fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Optional timestamp accepting RFC 3339, naive ISO 8601 (read as UTC) or
/// epoch seconds/milliseconds. Anything else decodes to `None`.
pub fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Value>::deserialize(deserializer)?
        .as_ref()
        .and_then(parse_timestamp))
}

/// Interpret a JSON value as a point in time.
pub fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(text) => parse_timestamp_str(text),
        Value::Number(n) => {
            let raw = n.as_f64()?;
            let millis = if raw.abs() >= EPOCH_MS_THRESHOLD {
                raw
            } else {
                raw * 1000.0
            };
            Utc.timestamp_millis_opt(millis as i64).single()
        }
        _ => None,
    }
}

fn parse_timestamp_str(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if let Ok(t) = DateTime::parse_from_rfc3339(text) {
        return Some(t.with_timezone(&Utc));
    }
    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, Deserialize)]
    struct Row {
        #[serde(default, deserialize_with = "null_as_default")]
        count: u64,
        #[serde(default, deserialize_with = "null_as_default")]
        label: String,
        #[serde(default, deserialize_with = "lenient_timestamp")]
        at: Option<DateTime<Utc>>,
    }

    #[test]
    fn test_null_and_missing_fields_default() {
        let row: Row = serde_json::from_str(r#"{"count": null, "label": null, "at": null}"#).unwrap();
        assert_eq!(row.count, 0);
        assert_eq!(row.label, "");
        assert!(row.at.is_none());

        let row: Row = serde_json::from_str("{}").unwrap();
        assert_eq!(row.count, 0);
        assert!(row.at.is_none());
    }

    #[test]
    fn test_wrong_type_still_fails_for_plain_fields() {
        assert!(serde_json::from_str::<Row>(r#"{"count": "many"}"#).is_err());
    }

    #[test]
    fn test_timestamp_formats() {
        let expected = "2024-03-01T12:00:00+00:00";
        for value in [
            json!("2024-03-01T12:00:00Z"),
            json!("2024-03-01T14:00:00+02:00"),
            json!("2024-03-01T12:00:00"),
            json!("2024-03-01 12:00:00"),
            json!(1_709_294_400),
            json!(1_709_294_400_000_i64),
        ] {
            assert_eq!(
                parse_timestamp(&value).map(|t| t.to_rfc3339()),
                Some(expected.to_string()),
                "{value}"
            );
        }
    }

    #[test]
    fn test_naive_timestamp_keeps_fraction() {
        let at = parse_timestamp(&json!("2024-03-01T12:00:00.250")).unwrap();
        assert_eq!(at.timestamp_subsec_millis(), 250);
    }

    #[test]
    fn test_unparseable_timestamp_is_none() {
        assert!(parse_timestamp(&json!("yesterday")).is_none());
        assert!(parse_timestamp(&json!(true)).is_none());

        let row: Row = serde_json::from_str(r#"{"at": "soon"}"#).unwrap();
        assert!(row.at.is_none());
    }
}
