//! Serde helpers for RWPM fields that are a single value when there is one
//! item and an array otherwise.

use serde::de::{Deserialize, Deserializer};
use serde::ser::Serializer;
use serde_json::Value;

/// `Vec<String>` that accepts a string or an array of strings, and writes a
/// bare string when it holds exactly one item. Non-string array items are
/// skipped and duplicates removed.
pub mod strings {
    use super::*;

    pub fn serialize<S: Serializer>(values: &[String], serializer: S) -> Result<S::Ok, S::Error> {
        match values {
            [single] => serializer.serialize_str(single),
            _ => serializer.collect_seq(values),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
        Ok(from_value(&Value::deserialize(deserializer)?))
    }

    pub fn from_value(value: &Value) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        let mut push = |s: &str| {
            if !out.iter().any(|o| o == s) {
                out.push(s.to_string());
            }
        };
        match value {
            Value::String(s) => push(s.as_str()),
            Value::Array(items) => items.iter().filter_map(Value::as_str).for_each(push),
            _ => {}
        }
        out
    }
}

/// `Vec<T>` that accepts a single object or an array, and writes a single
/// value when it holds exactly one item.
pub mod items {
    use super::*;
    use serde::Serialize;
    use serde::de::DeserializeOwned;

    pub fn serialize<T, S>(values: &[T], serializer: S) -> Result<S::Ok, S::Error>
    where
        T: Serialize,
        S: Serializer,
    {
        match values {
            [single] => single.serialize(serializer),
            _ => serializer.collect_seq(values),
        }
    }

    pub fn deserialize<'de, T, D>(deserializer: D) -> Result<Vec<T>, D::Error>
    where
        T: DeserializeOwned,
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        let items = match value {
            Value::Array(items) => items,
            Value::Null => Vec::new(),
            other => vec![other],
        };
        items
            .into_iter()
            .map(|v| serde_json::from_value(v).map_err(serde::de::Error::custom))
            .collect()
    }
}

pub fn is_false(b: &bool) -> bool {
    !*b
}
