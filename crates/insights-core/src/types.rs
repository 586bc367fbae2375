//! Core data types for insight records
//!
//! Records are schemaless. Every field is optional and may hold any JSON
//! value, so a record is an ordered map from field name to [`FieldValue`].

use crate::error::{CoreError, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// A value stored in a document field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    /// Explicit JSON null
    Null,
    /// Boolean value
    Boolean(bool),
    /// 64-bit signed integer
    Integer(i64),
    /// 64-bit floating point
    Float(f64),
    /// UTF-8 string
    String(String),
    /// Ordered list of values
    Array(Vec<FieldValue>),
    /// Embedded document
    Object(Document),
}

impl FieldValue {
    /// Get the type name of this field value
    pub fn type_name(&self) -> &'static str {
        match self {
            FieldValue::Null => "null",
            FieldValue::Boolean(_) => "boolean",
            FieldValue::Integer(_) => "integer",
            FieldValue::Float(_) => "float",
            FieldValue::String(_) => "string",
            FieldValue::Array(_) => "array",
            FieldValue::Object(_) => "object",
        }
    }

    /// Whether the value is a number
    pub fn is_numeric(&self) -> bool {
        matches!(self, FieldValue::Integer(_) | FieldValue::Float(_))
    }

    /// Null and the empty string count as missing
    pub fn is_missing(&self) -> bool {
        match self {
            FieldValue::Null => true,
            FieldValue::String(s) => s.is_empty(),
            _ => false,
        }
    }

    /// Try to convert to f64
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Integer(v) => Some(*v as f64),
            FieldValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    /// Try to convert to i64. Floats convert only when they hold a whole number.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            FieldValue::Integer(v) => Some(*v),
            FieldValue::Float(v) if v.fract() == 0.0 && v.abs() < i64::MAX as f64 => {
                Some(*v as i64)
            }
            _ => None,
        }
    }

    /// Try to get as string reference
    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Try to get as embedded document
    pub fn as_document(&self) -> Option<&Document> {
        match self {
            FieldValue::Object(doc) => Some(doc),
            _ => None,
        }
    }

    /// Key used to bucket values when grouping.
    ///
    /// Numbers are keyed by numeric value so `6` and `6.0` land in the same
    /// group; every other kind is keyed by its JSON rendering.
    pub fn canonical_key(&self) -> String {
        match self {
            FieldValue::Null => "null".to_string(),
            FieldValue::Boolean(b) => format!("b:{}", b),
            FieldValue::Integer(i) => format!("n:{}", i),
            FieldValue::Float(f) => match self.as_i64() {
                Some(i) => format!("n:{}", i),
                None => format!("n:{}", f),
            },
            FieldValue::String(s) => format!("s:{}", s),
            FieldValue::Array(items) => {
                let keys: Vec<String> = items.iter().map(FieldValue::canonical_key).collect();
                format!("a:[{}]", keys.join(","))
            }
            FieldValue::Object(doc) => {
                let keys: Vec<String> = doc
                    .iter()
                    .map(|(k, v)| format!("{}={}", k, v.canonical_key()))
                    .collect();
                format!("o:{{{}}}", keys.join(","))
            }
        }
    }

    fn kind_rank(&self) -> u8 {
        match self {
            FieldValue::Null => 0,
            FieldValue::Integer(_) | FieldValue::Float(_) => 1,
            FieldValue::String(_) => 2,
            FieldValue::Object(_) => 3,
            FieldValue::Array(_) => 4,
            FieldValue::Boolean(_) => 5,
        }
    }

    /// Total order used by sort stages.
    ///
    /// Kinds order as null < numbers < strings < objects < arrays < booleans.
    /// Numbers compare numerically regardless of integer/float representation.
    pub fn compare(&self, other: &FieldValue) -> Ordering {
        match (self, other) {
            (FieldValue::Integer(a), FieldValue::Integer(b)) => a.cmp(b),
            (a, b) if a.is_numeric() && b.is_numeric() => {
                let (x, y) = (a.as_f64().unwrap_or(0.0), b.as_f64().unwrap_or(0.0));
                x.total_cmp(&y)
            }
            (FieldValue::String(a), FieldValue::String(b)) => a.cmp(b),
            (FieldValue::Boolean(a), FieldValue::Boolean(b)) => a.cmp(b),
            (FieldValue::Array(a), FieldValue::Array(b)) => {
                for (x, y) in a.iter().zip(b.iter()) {
                    match x.compare(y) {
                        Ordering::Equal => continue,
                        other => return other,
                    }
                }
                a.len().cmp(&b.len())
            }
            (FieldValue::Object(a), FieldValue::Object(b)) => {
                for ((ka, va), (kb, vb)) in a.iter().zip(b.iter()) {
                    let ord = ka.cmp(kb).then_with(|| va.compare(vb));
                    if ord != Ordering::Equal {
                        return ord;
                    }
                }
                a.len().cmp(&b.len())
            }
            _ => self.kind_rank().cmp(&other.kind_rank()),
        }
    }
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        FieldValue::Float(v)
    }
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        FieldValue::Integer(v)
    }
}

impl From<i32> for FieldValue {
    fn from(v: i32) -> Self {
        FieldValue::Integer(v as i64)
    }
}

impl From<u64> for FieldValue {
    fn from(v: u64) -> Self {
        if v <= i64::MAX as u64 {
            FieldValue::Integer(v as i64)
        } else {
            FieldValue::Float(v as f64)
        }
    }
}

impl From<String> for FieldValue {
    fn from(v: String) -> Self {
        FieldValue::String(v)
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        FieldValue::String(v.to_string())
    }
}

impl From<bool> for FieldValue {
    fn from(v: bool) -> Self {
        FieldValue::Boolean(v)
    }
}

impl From<Document> for FieldValue {
    fn from(v: Document) -> Self {
        FieldValue::Object(v)
    }
}

impl From<Vec<FieldValue>> for FieldValue {
    fn from(v: Vec<FieldValue>) -> Self {
        FieldValue::Array(v)
    }
}

/// A schemaless record: field names mapped to values, in insertion order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Document {
    fields: IndexMap<String, FieldValue>,
}

impl Document {
    /// Create an empty document
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, key: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.insert(key, value);
        self
    }

    /// Insert or replace a field
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<FieldValue>) {
        self.fields.insert(key.into(), value.into());
    }

    /// Get a top-level field
    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.fields.get(key)
    }

    /// Get a field by dotted path, descending into embedded documents
    pub fn get_path(&self, path: &str) -> Option<&FieldValue> {
        let mut parts = path.split('.');
        let first = parts.next()?;
        let mut current = self.fields.get(first)?;
        for part in parts {
            current = current.as_document()?.get(part)?;
        }
        Some(current)
    }

    /// True when the field is absent, null, or the empty string
    pub fn is_missing(&self, path: &str) -> bool {
        self.get_path(path).map_or(true, FieldValue::is_missing)
    }

    /// Convert a parsed JSON value into a document. Only JSON objects qualify.
    pub fn from_json(value: serde_json::Value) -> Result<Self> {
        if !value.is_object() {
            return Err(CoreError::InvalidDocument(format!(
                "expected a JSON object, got {}",
                json_kind(&value)
            )));
        }
        Ok(serde_json::from_value(value)?)
    }

    /// Remove a field
    pub fn remove(&mut self, key: &str) -> Option<FieldValue> {
        self.fields.shift_remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Iterate fields in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&String, &FieldValue)> {
        self.fields.iter()
    }
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

impl FromIterator<(String, FieldValue)> for Document {
    fn from_iter<I: IntoIterator<Item = (String, FieldValue)>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_keeps_integer_and_float_kinds() {
        let doc: Document =
            serde_json::from_str(r#"{"intensity": 6, "relevance": 2.5, "topic": "oil"}"#).unwrap();
        assert_eq!(doc.get("intensity"), Some(&FieldValue::Integer(6)));
        assert_eq!(doc.get("relevance"), Some(&FieldValue::Float(2.5)));
        assert_eq!(doc.get("topic"), Some(&FieldValue::String("oil".to_string())));

        let json = serde_json::to_string(&doc).unwrap();
        assert_eq!(json, r#"{"intensity":6,"relevance":2.5,"topic":"oil"}"#);
    }

    #[test]
    fn test_from_json_rejects_non_objects() {
        assert!(Document::from_json(serde_json::json!({"title": "x"})).is_ok());
        let err = Document::from_json(serde_json::json!([1, 2])).unwrap_err();
        assert!(err.to_string().contains("array"));
    }

    #[test]
    fn test_field_order_is_preserved() {
        let doc = Document::new().with("z", 1i64).with("a", 2i64).with("m", 3i64);
        let keys: Vec<&String> = doc.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["z", "a", "m"]);
    }

    #[test]
    fn test_is_missing() {
        let doc: Document =
            serde_json::from_str(r#"{"topic": "", "region": null, "country": "India", "intensity": 0}"#)
                .unwrap();
        assert!(doc.is_missing("topic"));
        assert!(doc.is_missing("region"));
        assert!(doc.is_missing("sector"));
        assert!(!doc.is_missing("country"));
        assert!(!doc.is_missing("intensity"));
    }

    #[test]
    fn test_get_path_nested() {
        let inner = Document::new().with("region", "Asia").with("topic", "gas");
        let doc = Document::new().with("_id", inner);
        assert_eq!(doc.get_path("_id.region").and_then(FieldValue::as_str), Some("Asia"));
        assert!(doc.get_path("_id.missing").is_none());
        assert!(doc.get_path("_id.region.deeper").is_none());
    }

    #[test]
    fn test_canonical_key_merges_numeric_kinds() {
        assert_eq!(
            FieldValue::Integer(6).canonical_key(),
            FieldValue::Float(6.0).canonical_key()
        );
        assert_ne!(
            FieldValue::Integer(6).canonical_key(),
            FieldValue::String("6".to_string()).canonical_key()
        );
    }

    #[test]
    fn test_compare_numbers_across_kinds() {
        assert_eq!(FieldValue::Integer(3).compare(&FieldValue::Float(2.5)), Ordering::Greater);
        assert_eq!(FieldValue::Float(3.0).compare(&FieldValue::Integer(3)), Ordering::Equal);
        assert_eq!(FieldValue::Integer(10).compare(&FieldValue::Integer(9)), Ordering::Greater);
    }

    #[test]
    fn test_compare_orders_kinds() {
        let null = FieldValue::Null;
        let num = FieldValue::Integer(100);
        let text = FieldValue::String("a".to_string());
        assert_eq!(null.compare(&num), Ordering::Less);
        assert_eq!(num.compare(&text), Ordering::Less);
        assert_eq!(text.compare(&FieldValue::Boolean(false)), Ordering::Less);
    }

    #[test]
    fn test_as_i64_only_for_whole_numbers() {
        assert_eq!(FieldValue::Float(2016.0).as_i64(), Some(2016));
        assert_eq!(FieldValue::Float(2.5).as_i64(), None);
        assert_eq!(FieldValue::String("7".to_string()).as_i64(), None);
    }
}
