//! The Message type - the dynamic value flowing between blocks.
//!
//! A message is a tagged sum over the JSON-ish shapes blocks exchange:
//! numbers, booleans, strings, null, arrays, objects, and an opaque error
//! variant. Messages are value-copied at channel boundaries.

use std::collections::BTreeMap;

use serde::de::{Deserialize, Deserializer};
use serde::ser::{Serialize, Serializer};

/// A dynamic value passed between blocks.
///
/// Kernels variant-check their inputs at entry; a failed check produces an
/// [`Message::Error`] on the kernel's first output rather than a crash.
///
/// # Wire form
///
/// Messages serialize to JSON: number → JSON number (non-finite → null),
/// boolean → boolean, string → string, null → null, array → array, object →
/// object, error → `{"error": "<text>"}`.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum Message {
    /// Absence of a value. Also the result of a path-resolution miss.
    #[default]
    Null,
    /// Boolean value.
    Bool(bool),
    /// 64-bit floating point. The only numeric shape blocks compute with.
    Number(f64),
    /// UTF-8 string.
    String(String),
    /// Ordered sequence of messages.
    Array(Vec<Message>),
    /// Mapping from string keys to messages.
    Object(BTreeMap<String, Message>),
    /// An opaque error produced by a kernel. Flows downstream like any
    /// other value; never aborts the runtime.
    Error(String),
}

impl Message {
    /// Create an error-typed message.
    pub fn error(text: impl Into<String>) -> Self {
        Message::Error(text.into())
    }

    /// Check if this message is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Message::Null)
    }

    /// Check if this message is error-typed.
    pub fn is_error(&self) -> bool {
        matches!(self, Message::Error(_))
    }

    /// The numeric value, if this message is a number.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Message::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// The boolean value, if this message is a boolean.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Message::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// The string contents, if this message is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Message::String(s) => Some(s),
            _ => None,
        }
    }

    /// The elements, if this message is an array.
    pub fn as_array(&self) -> Option<&[Message]> {
        match self {
            Message::Array(items) => Some(items),
            _ => None,
        }
    }

    /// The mapping, if this message is an object.
    pub fn as_object(&self) -> Option<&BTreeMap<String, Message>> {
        match self {
            Message::Object(map) => Some(map),
            _ => None,
        }
    }

    /// Convert to the JSON wire form.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Message::Null => serde_json::Value::Null,
            Message::Bool(b) => serde_json::Value::Bool(*b),
            Message::Number(n) => serde_json::Number::from_f64(*n)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Message::String(s) => serde_json::Value::String(s.clone()),
            Message::Array(items) => {
                serde_json::Value::Array(items.iter().map(Message::to_json).collect())
            }
            Message::Object(map) => serde_json::Value::Object(
                map.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
            Message::Error(text) => {
                let mut map = serde_json::Map::new();
                map.insert(
                    "error".to_string(),
                    serde_json::Value::String(text.clone()),
                );
                serde_json::Value::Object(map)
            }
        }
    }

    /// Build a message from a JSON value.
    ///
    /// All objects map to [`Message::Object`]; the error wire form is not
    /// sniffed back out, so serialization is lossy for the error variant.
    pub fn from_json(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Message::Null,
            serde_json::Value::Bool(b) => Message::Bool(b),
            serde_json::Value::Number(n) => Message::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Message::String(s),
            serde_json::Value::Array(items) => {
                Message::Array(items.into_iter().map(Message::from_json).collect())
            }
            serde_json::Value::Object(map) => Message::Object(
                map.into_iter()
                    .map(|(k, v)| (k, Message::from_json(v)))
                    .collect(),
            ),
        }
    }
}

impl Serialize for Message {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Message {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        serde_json::Value::deserialize(deserializer).map(Message::from_json)
    }
}

// Conversion from common types

impl From<bool> for Message {
    fn from(v: bool) -> Self {
        Message::Bool(v)
    }
}

impl From<f64> for Message {
    fn from(v: f64) -> Self {
        Message::Number(v)
    }
}

impl From<i32> for Message {
    fn from(v: i32) -> Self {
        Message::Number(v as f64)
    }
}

impl From<String> for Message {
    fn from(v: String) -> Self {
        Message::String(v)
    }
}

impl From<&str> for Message {
    fn from(v: &str) -> Self {
        Message::String(v.to_string())
    }
}

impl<T: Into<Message>> From<Vec<T>> for Message {
    fn from(v: Vec<T>) -> Self {
        Message::Array(v.into_iter().map(Into::into).collect())
    }
}

impl From<BTreeMap<String, Message>> for Message {
    fn from(v: BTreeMap<String, Message>) -> Self {
        Message::Object(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accessors_match_variants() {
        assert_eq!(Message::Number(2.5).as_number(), Some(2.5));
        assert_eq!(Message::Bool(true).as_bool(), Some(true));
        assert_eq!(Message::from("hi").as_str(), Some("hi"));
        assert!(Message::Null.is_null());
        assert!(Message::error("boom").is_error());

        assert_eq!(Message::from("hi").as_number(), None);
        assert_eq!(Message::Number(1.0).as_bool(), None);
    }

    #[test]
    fn structural_equality() {
        assert_eq!(Message::from(vec![1.0, 2.0]), Message::from(vec![1.0, 2.0]));
        assert_ne!(Message::from(vec![1.0, 2.0]), Message::from(vec![2.0, 1.0]));
        assert_eq!(Message::error("x"), Message::error("x"));
        assert_ne!(Message::Number(1.0), Message::Bool(true));
    }

    #[test]
    fn wire_form_number() {
        let json = serde_json::to_string(&Message::Number(5.0)).unwrap();
        assert_eq!(json, "5.0");
    }

    #[test]
    fn wire_form_error() {
        let json = serde_json::to_string(&Message::error("bad input")).unwrap();
        assert_eq!(json, r#"{"error":"bad input"}"#);
    }

    #[test]
    fn wire_form_nan_is_null() {
        let json = serde_json::to_string(&Message::Number(f64::NAN)).unwrap();
        assert_eq!(json, "null");
    }

    #[test]
    fn wire_form_aggregates() {
        let mut map = BTreeMap::new();
        map.insert("xs".to_string(), Message::from(vec![1.0, 2.0]));
        map.insert("ok".to_string(), Message::Bool(true));
        let json = serde_json::to_string(&Message::Object(map)).unwrap();
        assert_eq!(json, r#"{"ok":true,"xs":[1.0,2.0]}"#);
    }

    #[test]
    fn from_json_round_trip_plain_data() {
        let value: serde_json::Value =
            serde_json::from_str(r#"{"a": [1.5, "two", null], "b": false}"#).unwrap();
        let message = Message::from_json(value.clone());
        assert_eq!(message.to_json(), value);
    }

    #[test]
    fn from_json_widens_integers() {
        let value: serde_json::Value = serde_json::from_str("[1, 2]").unwrap();
        assert_eq!(
            Message::from_json(value),
            Message::Array(vec![Message::Number(1.0), Message::Number(2.0)])
        );
    }

    #[test]
    fn deserialize_via_serde() {
        let message: Message = serde_json::from_str("[1.5, true]").unwrap();
        assert_eq!(
            message,
            Message::Array(vec![Message::Number(1.5), Message::Bool(true)])
        );
    }

    #[test]
    fn message_default_is_null() {
        assert!(Message::default().is_null());
    }
}
