/*!
 * Serde utilities for common serialization/deserialization patterns.
 *
 * The document store accumulated three timestamp representations over the
 * platform's lifetime: structured `{seconds, nanoseconds}` objects, RFC3339
 * strings, and legacy `YYYY-MM-DD` date strings written by early versions of
 * the offer workflow. Normalization happens here, once, at the store
 * boundary, so every call site sees a single `DateTime<Utc>` type.
 */

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Deserialize a timestamp that may be structured, RFC3339, epoch millis,
/// or a legacy date string.
///
/// # Usage with serde
///
/// ```rust
/// use chrono::{DateTime, Utc};
/// use serde::Deserialize;
/// use roofline_core::utils::serde::deserialize_flexible_timestamp;
///
/// #[derive(Deserialize)]
/// struct Offer {
///     #[serde(deserialize_with = "deserialize_flexible_timestamp")]
///     sent_at: DateTime<Utc>,
/// }
/// ```
pub fn deserialize_flexible_timestamp<'de, D>(
    deserializer: D,
) -> std::result::Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;
    let value = Value::deserialize(deserializer)?;
    parse_timestamp_value(&value)
        .ok_or_else(|| D::Error::custom(format!("unrecognized timestamp value: {value}")))
}

/// Optional variant of [`deserialize_flexible_timestamp`]; null and missing
/// both yield `None`.
pub fn deserialize_optional_flexible_timestamp<'de, D>(
    deserializer: D,
) -> std::result::Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;
    let value: Option<Value> = Option::deserialize(deserializer)?;
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(v) => parse_timestamp_value(&v)
            .map(Some)
            .ok_or_else(|| D::Error::custom(format!("unrecognized timestamp value: {v}"))),
    }
}

/// Parse any of the supported timestamp shapes into `DateTime<Utc>`.
pub fn parse_timestamp_value(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => parse_timestamp_str(s),
        // Epoch milliseconds.
        Value::Number(n) => n.as_i64().and_then(DateTime::<Utc>::from_timestamp_millis),
        // Structured store timestamp: {seconds, nanoseconds} with or without
        // the underscore prefix used by the wire format.
        Value::Object(obj) => {
            let seconds = obj
                .get("seconds")
                .or_else(|| obj.get("_seconds"))?
                .as_i64()?;
            let nanos = obj
                .get("nanoseconds")
                .or_else(|| obj.get("_nanoseconds"))
                .and_then(Value::as_i64)
                .unwrap_or(0);
            DateTime::<Utc>::from_timestamp(seconds, nanos as u32)
        }
        _ => None,
    }
}

fn parse_timestamp_str(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    // Legacy date-only strings, interpreted as midnight UTC.
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0).map(|ndt| ndt.and_utc());
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_rfc3339_string() {
        let dt = parse_timestamp_value(&json!("2025-03-01T12:30:00Z")).unwrap();
        assert_eq!(dt.to_rfc3339(), "2025-03-01T12:30:00+00:00");
    }

    #[test]
    fn test_parse_legacy_date_string() {
        let dt = parse_timestamp_value(&json!("2023-11-05")).unwrap();
        assert_eq!(dt.to_rfc3339(), "2023-11-05T00:00:00+00:00");
    }

    #[test]
    fn test_parse_structured_timestamp() {
        let dt = parse_timestamp_value(&json!({"seconds": 1700000000, "nanoseconds": 0})).unwrap();
        assert_eq!(dt.timestamp(), 1700000000);

        let underscored =
            parse_timestamp_value(&json!({"_seconds": 1700000000, "_nanoseconds": 5000})).unwrap();
        assert_eq!(underscored.timestamp(), 1700000000);
    }

    #[test]
    fn test_parse_epoch_millis() {
        let dt = parse_timestamp_value(&json!(1700000000000i64)).unwrap();
        assert_eq!(dt.timestamp(), 1700000000);
    }

    #[test]
    fn test_garbage_is_none() {
        assert!(parse_timestamp_value(&json!("not a date")).is_none());
        assert!(parse_timestamp_value(&json!(true)).is_none());
        assert!(parse_timestamp_value(&json!({"foo": 1})).is_none());
    }
}
