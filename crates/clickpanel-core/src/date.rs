//! Date normalization for epoch-millisecond payloads.

use serde_json::Value;
use time::OffsetDateTime;
use time::macros::format_description;

/// Convert an epoch-millisecond value into a UTC timestamp.
///
/// Accepts numeric strings (the common wire form) and JSON numbers. Empty
/// strings, `null`, and unparsable input yield `None`.
#[must_use]
pub fn from_epoch_millis(value: &Value) -> Option<OffsetDateTime> {
    let millis = match value {
        Value::String(text) => text.trim().parse::<i64>().ok()?,
        Value::Number(number) => number
            .as_i64()
            .or_else(|| number.as_f64().map(truncate_float))?,
        _ => return None,
    };
    OffsetDateTime::from_unix_timestamp_nanos(i128::from(millis) * 1_000_000).ok()
}

/// Same as [`from_epoch_millis`] for an optional value.
#[must_use]
pub fn from_optional_millis(value: Option<&Value>) -> Option<OffsetDateTime> {
    value.and_then(from_epoch_millis)
}

/// Render a timestamp as a calendar date (`YYYY-MM-DD`).
#[must_use]
pub fn calendar_date(ts: OffsetDateTime) -> String {
    let format = format_description!("[year]-[month]-[day]");
    ts.format(format).unwrap_or_else(|_| ts.date().to_string())
}

#[allow(clippy::cast_possible_truncation)]
fn truncate_float(value: f64) -> i64 {
    value as i64
}

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used, clippy::unwrap_used)]
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_string_and_number_millis() {
        let from_string = from_epoch_millis(&json!("1700000000000")).expect("string millis");
        let from_number = from_epoch_millis(&json!(1_700_000_000_000_i64)).expect("numeric millis");
        assert_eq!(from_string, from_number);
        assert_eq!(from_string.unix_timestamp(), 1_700_000_000);
    }

    #[test]
    fn rejects_garbage() {
        assert!(from_epoch_millis(&json!("")).is_none());
        assert!(from_epoch_millis(&json!("tomorrow")).is_none());
        assert!(from_epoch_millis(&Value::Null).is_none());
        assert!(from_optional_millis(None).is_none());
    }

    #[test]
    fn calendar_date_is_iso() {
        let ts = from_epoch_millis(&json!("1700000000000")).expect("must parse");
        assert_eq!(calendar_date(ts), "2023-11-14");
    }
}
