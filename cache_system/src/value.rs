//! Values read back from the cache
//!
//! Writes store opaque strings. Reads reconstruct JSON objects and arrays
//! when the whole stored string parses as one, and hand back the raw text
//! otherwise.

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::warn;

/// A value fetched from the cache
#[derive(Debug, Clone, PartialEq)]
pub enum CachedValue {
    /// Stored string was a JSON object or array
    Json(Value),
    /// Anything else, returned verbatim
    Text(String),
}

impl CachedValue {
    /// Interpret a stored string.
    ///
    /// Only strings whose trimmed form starts and ends with matching braces or
    /// brackets are parsed. A failed parse falls back to the raw string.
    pub fn from_stored(key: &str, raw: String) -> Self {
        if !looks_like_json(&raw) {
            return Self::Text(raw);
        }

        match serde_json::from_str::<Value>(raw.trim()) {
            Ok(value) => Self::Json(value),
            Err(err) => {
                warn!(key = %key, error = %err, "cached value looked like JSON but failed to parse");
                Self::Text(raw)
            }
        }
    }

    pub fn is_json(&self) -> bool {
        matches!(self, Self::Json(_))
    }

    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Self::Json(value) => Some(value),
            Self::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Json(_) => None,
        }
    }

    /// Convert into a JSON value; text becomes a JSON string
    pub fn into_json(self) -> Value {
        match self {
            Self::Json(value) => value,
            Self::Text(text) => Value::String(text),
        }
    }

    /// Deserialize the JSON payload into a concrete type
    pub fn deserialize<T: DeserializeOwned>(self) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.into_json())
    }
}

fn looks_like_json(raw: &str) -> bool {
    let trimmed = raw.trim();
    (trimmed.starts_with('{') && trimmed.ends_with('}'))
        || (trimmed.starts_with('[') && trimmed.ends_with(']'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_object_and_array_are_parsed() {
        let object = CachedValue::from_stored("k", r#"{"id":1,"tags":["a"]}"#.to_string());
        assert_eq!(object, CachedValue::Json(json!({"id": 1, "tags": ["a"]})));

        let array = CachedValue::from_stored("k", "  [1, 2, 3]\n".to_string());
        assert_eq!(array, CachedValue::Json(json!([1, 2, 3])));
    }

    #[test]
    fn test_plain_strings_are_untouched() {
        for raw in ["hello", "42", "true", "null", "\"quoted\"", ""] {
            let value = CachedValue::from_stored("k", raw.to_string());
            assert_eq!(value, CachedValue::Text(raw.to_string()));
        }
    }

    #[test]
    fn test_embedded_braces_are_not_json() {
        let raw = "prefix {\"id\":1} suffix".to_string();
        assert_eq!(
            CachedValue::from_stored("k", raw.clone()),
            CachedValue::Text(raw)
        );
    }

    #[test]
    fn test_malformed_json_falls_back_to_raw_string() {
        let raw = "{not json}".to_string();
        assert_eq!(
            CachedValue::from_stored("k", raw.clone()),
            CachedValue::Text(raw)
        );

        let raw = "[1, 2,]".to_string();
        assert_eq!(
            CachedValue::from_stored("k", raw.clone()),
            CachedValue::Text(raw)
        );
    }

    #[test]
    fn test_accessors() {
        let json = CachedValue::Json(json!({"id": 1}));
        assert!(json.is_json());
        assert_eq!(json.as_json(), Some(&json!({"id": 1})));
        assert_eq!(json.as_text(), None);

        let text = CachedValue::Text("plain".to_string());
        assert!(!text.is_json());
        assert_eq!(text.as_text(), Some("plain"));
        assert_eq!(text.into_json(), json!("plain"));
    }

    #[test]
    fn test_deserialize_into_struct() {
        #[derive(Debug, serde::Deserialize, PartialEq)]
        struct User {
            id: u32,
        }

        let value = CachedValue::from_stored("user:1", r#"{"id":7}"#.to_string());
        assert_eq!(value.deserialize::<User>().unwrap(), User { id: 7 });
    }
}
