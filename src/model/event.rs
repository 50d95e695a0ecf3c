//! The Event: a mutable mapping from string keys to typed values.
//!
//! Two reserved keys: `_raw` (immutable once set) and `_meta`
//! (system-populated). `_raw` must never be dropped by any transform.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const RAW_KEY: &str = "_raw";
pub const META_KEY: &str = "_meta";

/// A typed value held in an [`Event`] map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            Value::Float(f) => Some(*f as i64),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    /// Apply `f` to every string value reachable from this value, recursing
    /// into nested maps and lists. Used by the PII redactor.
    pub fn map_strings_mut(&mut self, f: &mut impl FnMut(&mut String)) {
        match self {
            Value::Str(s) => f(s),
            Value::List(items) => {
                for item in items {
                    item.map_strings_mut(f);
                }
            }
            Value::Map(map) => {
                for v in map.values_mut() {
                    v.map_strings_mut(f);
                }
            }
            _ => {}
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

/// System-populated metadata attached to every event at framing time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventMeta {
    pub source_id: String,
    pub received_at_unix_nanos: i64,
    pub framing_hint: Option<String>,
}

impl EventMeta {
    pub fn new(source_id: impl Into<String>) -> Self {
        Self {
            source_id: source_id.into(),
            received_at_unix_nanos: Utc::now().timestamp_nanos_opt().unwrap_or_default(),
            framing_hint: None,
        }
    }

    pub fn with_framing_hint(mut self, hint: impl Into<String>) -> Self {
        self.framing_hint = Some(hint.into());
        self
    }
}

/// The unit of work flowing through the pipeline: a mutable mapping with
/// two reserved, specially-governed keys.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    fields: BTreeMap<String, Value>,
}

impl Event {
    /// Construct a fresh event from raw bytes received on a source. `_raw`
    /// is set once here and is thereafter immutable (enforced by omitting
    /// any API that would let callers remove or replace it).
    pub fn from_raw(raw: impl Into<String>, meta: EventMeta) -> Self {
        let mut fields = BTreeMap::new();
        fields.insert(RAW_KEY.to_string(), Value::Str(raw.into()));
        fields.insert(META_KEY.to_string(), meta_to_value(&meta));
        Self { fields }
    }

    /// The immutable original bytes of the record, as text. Always present.
    pub fn raw(&self) -> &str {
        self.fields
            .get(RAW_KEY)
            .and_then(Value::as_str)
            .expect("_raw is always present on a constructed Event")
    }

    pub fn source_id(&self) -> Option<&str> {
        self.fields
            .get(META_KEY)
            .and_then(Value::as_map)
            .and_then(|m| m.get("source_id"))
            .and_then(Value::as_str)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    /// Insert a value, refusing to touch `_raw`. Callers that need to set
    /// `_meta` sub-fields should go through [`Event::merge_meta`].
    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        let key = key.into();
        if key == RAW_KEY {
            return;
        }
        self.fields.insert(key, value);
    }

    /// Insert only if the key is not already present — the "do not
    /// overwrite" rule shared by `universal_kv` and regex-predicate
    /// named captures.
    pub fn insert_if_absent(&mut self, key: impl Into<String>, value: Value) -> bool {
        let key = key.into();
        if key == RAW_KEY || self.fields.contains_key(&key) {
            return false;
        }
        self.fields.insert(key, value);
        true
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        if key == RAW_KEY {
            return None;
        }
        self.fields.remove(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.fields.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&String, &mut Value)> {
        self.fields.iter_mut()
    }

    /// Approximate serialized size in bytes, used by the batcher's
    /// `maxBytes` trigger.
    pub fn approx_serialized_size(&self) -> usize {
        serde_json::to_vec(self).map(|v| v.len()).unwrap_or(0)
    }
}

fn meta_to_value(meta: &EventMeta) -> Value {
    let mut map = BTreeMap::new();
    map.insert("source_id".to_string(), Value::Str(meta.source_id.clone()));
    map.insert(
        "received_at_unix_nanos".to_string(),
        Value::Int(meta.received_at_unix_nanos),
    );
    if let Some(hint) = &meta.framing_hint {
        map.insert("framing_hint".to_string(), Value::Str(hint.clone()));
    }
    Value::Map(map)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_is_preserved_and_cannot_be_overwritten() {
        let mut ev = Event::from_raw("hello=world", EventMeta::new("s1"));
        assert_eq!(ev.raw(), "hello=world");
        ev.insert(RAW_KEY, Value::Str("tampered".into()));
        assert_eq!(ev.raw(), "hello=world");
        assert!(ev.remove(RAW_KEY).is_none());
        assert_eq!(ev.raw(), "hello=world");
    }

    #[test]
    fn insert_if_absent_never_overwrites() {
        let mut ev = Event::from_raw("x", EventMeta::new("s1"));
        assert!(ev.insert_if_absent("severity", Value::Str("high".into())));
        assert!(!ev.insert_if_absent("severity", Value::Str("low".into())));
        assert_eq!(ev.get("severity").unwrap().as_str(), Some("high"));
    }

    #[test]
    fn source_id_roundtrips_through_meta() {
        let ev = Event::from_raw("x", EventMeta::new("src-42"));
        assert_eq!(ev.source_id(), Some("src-42"));
    }
}
