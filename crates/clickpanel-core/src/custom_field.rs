//! Typed custom field values.
//!
//! The wire `type` string drives a closed set of kinds, and each kind knows how
//! to normalize its raw JSON value. Unknown types keep the raw value.

use std::fmt;

use serde::Serialize;
use serde_json::Value;
use time::OffsetDateTime;

use crate::date;
use crate::wire::{IdRepr, RawCustomField};

/// Closed enumeration of custom field types.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CustomFieldKind {
    /// Free text.
    Text,
    /// Email address.
    Email,
    /// Phone number.
    Phone,
    /// Link.
    Url,
    /// Geographic location (rendered as text).
    Location,
    /// Single-line text.
    ShortText,
    /// Multi-line text.
    LongText,
    /// Numeric value.
    Number,
    /// Epoch-millisecond date.
    Date,
    /// Boolean checkbox.
    Checkbox,
    /// Single choice out of configured options.
    DropDown,
    /// Multiple labels out of configured options.
    Labels,
    /// One or more users.
    User,
    /// Links to other tasks or lists.
    Relation,
    /// Any type this crate does not know about.
    Other(String),
}

impl CustomFieldKind {
    /// Map a wire type discriminator to a kind.
    #[must_use]
    pub fn from_wire(raw: &str) -> Self {
        match raw {
            "text" => Self::Text,
            "email" => Self::Email,
            "phone" => Self::Phone,
            "url" => Self::Url,
            "location" => Self::Location,
            "short_text" => Self::ShortText,
            "long_text" => Self::LongText,
            "number" | "currency" => Self::Number,
            "date" => Self::Date,
            "checkbox" => Self::Checkbox,
            "drop_down" | "dropdown" => Self::DropDown,
            "label" | "labels" => Self::Labels,
            "user" | "users" | "person" => Self::User,
            "task" | "tasks" | "relation" | "list_relationship" => Self::Relation,
            other => Self::Other(other.to_owned()),
        }
    }

    const fn is_textual(&self) -> bool {
        matches!(
            self,
            Self::Text
                | Self::Email
                | Self::Phone
                | Self::Url
                | Self::Location
                | Self::ShortText
                | Self::LongText
        )
    }
}

/// Normalized value of a custom field.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum CustomFieldValue {
    /// No value set.
    Empty,
    /// Text-like value.
    Text(String),
    /// Numeric value.
    Number(f64),
    /// Date value.
    Date(#[serde(with = "time::serde::rfc3339")] OffsetDateTime),
    /// Checkbox value.
    Bool(bool),
    /// Selected drop-down option label.
    Choice(String),
    /// Selected labels.
    Labels(Vec<String>),
    /// Users, by display name.
    People(Vec<String>),
    /// Related items, by name or id.
    Relations(Vec<String>),
    /// Value of an unknown type, kept as is.
    Raw(Value),
}

impl CustomFieldValue {
    /// Returns true when nothing is set.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }
}

impl fmt::Display for CustomFieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => f.write_str("–"),
            Self::Text(text) | Self::Choice(text) => f.write_str(text),
            Self::Number(number) => write!(f, "{number}"),
            Self::Date(ts) => f.write_str(&date::calendar_date(*ts)),
            Self::Bool(true) => f.write_str("yes"),
            Self::Bool(false) => f.write_str("no"),
            Self::Labels(items) | Self::People(items) | Self::Relations(items) => {
                f.write_str(&items.join(", "))
            }
            Self::Raw(Value::String(text)) => f.write_str(text),
            Self::Raw(value) => write!(f, "{value}"),
        }
    }
}

/// Custom field attached to a task.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CustomField {
    /// Field id.
    pub id: String,
    /// Field name.
    pub name: String,
    /// Field type.
    pub kind: CustomFieldKind,
    /// Normalized value.
    pub value: CustomFieldValue,
}

impl CustomField {
    /// Normalize a wire field. Fields without an id are dropped.
    #[must_use]
    pub fn from_wire(raw: RawCustomField) -> Option<Self> {
        let id = raw.id.map(IdRepr::into_string)?;
        let kind = raw
            .kind
            .as_deref()
            .map_or_else(|| CustomFieldKind::Other(String::new()), CustomFieldKind::from_wire);
        let value = normalize(&kind, raw.value, raw.type_config.as_ref());
        Some(Self {
            id,
            name: raw.name.unwrap_or_default(),
            kind,
            value,
        })
    }
}

fn normalize(kind: &CustomFieldKind, value: Option<Value>, config: Option<&Value>) -> CustomFieldValue {
    let Some(value) = value.filter(|v| !is_blank(v)) else {
        return CustomFieldValue::Empty;
    };

    if kind.is_textual() {
        return CustomFieldValue::Text(plain_text(&value));
    }

    match kind {
        CustomFieldKind::Number => number(&value).map_or(CustomFieldValue::Raw(value), CustomFieldValue::Number),
        CustomFieldKind::Date => {
            date::from_epoch_millis(&value).map_or(CustomFieldValue::Empty, CustomFieldValue::Date)
        }
        CustomFieldKind::Checkbox => CustomFieldValue::Bool(matches!(&value, Value::Bool(true))
            || matches!(&value, Value::String(s) if s == "true")),
        CustomFieldKind::DropDown => CustomFieldValue::Choice(choice_label(&value, config)),
        CustomFieldKind::Labels => CustomFieldValue::Labels(
            as_items(&value).map(|item| option_label(item, config)).collect(),
        ),
        CustomFieldKind::User => CustomFieldValue::People(
            as_items(&value)
                .map(|user| {
                    first_string(user, &["username", "name", "email"]).unwrap_or_else(|| "user".to_owned())
                })
                .collect(),
        ),
        CustomFieldKind::Relation => CustomFieldValue::Relations(
            as_items(&value)
                .map(|item| first_string(item, &["name", "id"]).unwrap_or_else(|| "related".to_owned()))
                .collect(),
        ),
        _ => CustomFieldValue::Raw(value),
    }
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(text) => text.is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}

fn plain_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

fn number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

/// Iterate an array value, or treat a scalar/object as a single item.
fn as_items(value: &Value) -> Box<dyn Iterator<Item = &Value> + '_> {
    match value {
        Value::Array(items) => Box::new(items.iter()),
        other => Box::new(std::iter::once(other)),
    }
}

fn first_string(value: &Value, keys: &[&str]) -> Option<String> {
    match value {
        Value::Object(map) => keys.iter().find_map(|key| match map.get(*key) {
            Some(Value::String(text)) if !text.is_empty() => Some(text.clone()),
            Some(Value::Number(number)) => Some(number.to_string()),
            _ => None,
        }),
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

fn configured_options(config: Option<&Value>) -> &[Value] {
    config
        .and_then(|cfg| cfg.get("options"))
        .and_then(Value::as_array)
        .map_or(&[][..], Vec::as_slice)
}

/// Resolve a drop-down value: an inline object, an option index, or an option id.
fn choice_label(value: &Value, config: Option<&Value>) -> String {
    if let Some(label) = first_string_of_object(value, &["label", "name"]) {
        return label;
    }
    let options = configured_options(config);
    let by_index = value.as_u64().and_then(|idx| {
        options.iter().find(|opt| {
            opt.get("orderindex")
                .and_then(|o| o.as_u64().or_else(|| o.as_str().and_then(|s| s.parse().ok())))
                == Some(idx)
        })
    });
    let by_id = value
        .as_str()
        .and_then(|id| options.iter().find(|opt| opt.get("id").and_then(Value::as_str) == Some(id)));
    by_index
        .or(by_id)
        .and_then(|opt| first_string(opt, &["name", "label"]))
        .unwrap_or_else(|| match value {
            Value::Number(idx) => format!("option {idx}"),
            other => plain_text(other),
        })
}

/// Resolve a label entry: an inline object or a raw option id.
fn option_label(item: &Value, config: Option<&Value>) -> String {
    if let Some(label) = first_string_of_object(item, &["label", "name"]) {
        return label;
    }
    let id = first_string(item, &["id"]).unwrap_or_default();
    configured_options(config)
        .iter()
        .find(|opt| opt.get("id").and_then(Value::as_str) == Some(id.as_str()))
        .and_then(|opt| first_string(opt, &["label", "name"]))
        .unwrap_or(id)
}

fn first_string_of_object(value: &Value, keys: &[&str]) -> Option<String> {
    if value.is_object() {
        first_string(value, keys)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used, clippy::unwrap_used)]
    use super::*;
    use serde_json::json;

    fn field(kind: &str, value: Value, config: Option<Value>) -> CustomField {
        CustomField::from_wire(RawCustomField {
            id: Some(IdRepr::Text("cf".into())),
            name: Some("Field".into()),
            kind: Some(kind.into()),
            value: Some(value),
            type_config: config,
        })
        .expect("field with id must normalize")
    }

    #[test]
    fn empty_values_normalize_to_empty() {
        assert!(field("text", Value::Null, None).value.is_empty());
        assert!(field("labels", json!([]), None).value.is_empty());
        assert!(field("short_text", json!(""), None).value.is_empty());
        assert_eq!(field("text", Value::Null, None).value.to_string(), "–");
    }

    #[test]
    fn synonyms_share_a_kind() {
        assert_eq!(CustomFieldKind::from_wire("dropdown"), CustomFieldKind::DropDown);
        assert_eq!(CustomFieldKind::from_wire("drop_down"), CustomFieldKind::DropDown);
        assert_eq!(CustomFieldKind::from_wire("person"), CustomFieldKind::User);
        assert_eq!(CustomFieldKind::from_wire("list_relationship"), CustomFieldKind::Relation);
        assert_eq!(
            CustomFieldKind::from_wire("emoji"),
            CustomFieldKind::Other("emoji".into())
        );
    }

    #[test]
    fn scalar_kinds_normalize() {
        assert_eq!(field("number", json!("12.5"), None).value, CustomFieldValue::Number(12.5));
        assert_eq!(field("checkbox", json!("true"), None).value, CustomFieldValue::Bool(true));
        assert_eq!(field("checkbox", json!(false), None).value.to_string(), "no");
        assert_eq!(
            field("date", json!("1700000000000"), None).value.to_string(),
            "2023-11-14"
        );
    }

    #[test]
    fn drop_down_resolves_through_options() {
        let config = json!({"options": [
            {"id": "a", "name": "Low", "orderindex": 0},
            {"id": "b", "name": "High", "orderindex": 1}
        ]});
        assert_eq!(
            field("drop_down", json!(1), Some(config.clone())).value,
            CustomFieldValue::Choice("High".into())
        );
        assert_eq!(
            field("drop_down", json!("a"), Some(config)).value,
            CustomFieldValue::Choice("Low".into())
        );
        assert_eq!(field("drop_down", json!(3), None).value.to_string(), "option 3");
    }

    #[test]
    fn labels_users_and_relations_join() {
        let config = json!({"options": [{"id": "x", "label": "Backend"}]});
        assert_eq!(
            field("labels", json!(["x", {"label": "Inline"}]), Some(config)).value.to_string(),
            "Backend, Inline"
        );
        assert_eq!(
            field("users", json!([{"username": "ana"}, {"email": "bo@example.invalid"}]), None)
                .value
                .to_string(),
            "ana, bo@example.invalid"
        );
        assert_eq!(
            field("tasks", json!([{"id": "t1"}, {"name": "Roadmap"}]), None).value.to_string(),
            "t1, Roadmap"
        );
    }

    #[test]
    fn unknown_kinds_keep_raw_value() {
        let value = field("emoji", json!({"count": 3}), None).value;
        assert_eq!(value, CustomFieldValue::Raw(json!({"count": 3})));
        assert_eq!(value.to_string(), r#"{"count":3}"#);
    }
}
