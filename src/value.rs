//! Attribute values and the in-memory record resources hydrate into.

use chrono::{NaiveDate, NaiveDateTime};
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// Wire format used when a datetime attribute is serialized without a field pattern.
pub const DATETIME_WIRE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";
pub const DATE_WIRE_FORMAT: &str = "%Y-%m-%d";

/// Internal (typed) value of a record attribute.
#[derive(Clone, Debug, PartialEq)]
pub enum AttrValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    DateTime(NaiveDateTime),
    Date(NaiveDate),
    Json(Value),
}

impl AttrValue {
    /// Identity mapping from JSON: no coercion beyond picking the closest variant.
    pub fn from_json(v: &Value) -> Self {
        match v {
            Value::Null => AttrValue::Null,
            Value::Bool(b) => AttrValue::Bool(*b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => AttrValue::Int(i),
                None => AttrValue::Float(n.as_f64().unwrap_or(0.0)),
            },
            Value::String(s) => AttrValue::Text(s.clone()),
            Value::Array(_) | Value::Object(_) => AttrValue::Json(v.clone()),
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            AttrValue::Null => Value::Null,
            AttrValue::Bool(b) => Value::Bool(*b),
            AttrValue::Int(i) => Value::Number((*i).into()),
            AttrValue::Float(f) => serde_json::Number::from_f64(*f)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            AttrValue::Text(s) => Value::String(s.clone()),
            AttrValue::DateTime(d) => Value::String(d.format(DATETIME_WIRE_FORMAT).to_string()),
            AttrValue::Date(d) => Value::String(d.format(DATE_WIRE_FORMAT).to_string()),
            AttrValue::Json(v) => v.clone(),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, AttrValue::Null)
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            AttrValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttrValue::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Ordering between values of compatible kinds; `None` when they cannot be compared.
    pub fn compare(&self, other: &AttrValue) -> Option<Ordering> {
        match (self, other) {
            (AttrValue::Int(a), AttrValue::Int(b)) => Some(a.cmp(b)),
            (AttrValue::Int(a), AttrValue::Float(b)) => (*a as f64).partial_cmp(b),
            (AttrValue::Float(a), AttrValue::Int(b)) => a.partial_cmp(&(*b as f64)),
            (AttrValue::Float(a), AttrValue::Float(b)) => a.partial_cmp(b),
            (AttrValue::Text(a), AttrValue::Text(b)) => Some(a.cmp(b)),
            (AttrValue::Bool(a), AttrValue::Bool(b)) => Some(a.cmp(b)),
            (AttrValue::DateTime(a), AttrValue::DateTime(b)) => Some(a.cmp(b)),
            (AttrValue::Date(a), AttrValue::Date(b)) => Some(a.cmp(b)),
            (AttrValue::DateTime(a), AttrValue::Date(b)) => Some(a.date().cmp(b)),
            (AttrValue::Date(a), AttrValue::DateTime(b)) => Some(a.cmp(&b.date())),
            (AttrValue::Null, AttrValue::Null) => Some(Ordering::Equal),
            (AttrValue::Json(a), AttrValue::Json(b)) if a == b => Some(Ordering::Equal),
            _ => None,
        }
    }

    /// Text view used by the string operators (contains/startswith/endswith).
    pub fn to_text(&self) -> Option<String> {
        match self {
            AttrValue::Null => None,
            AttrValue::Text(s) => Some(s.clone()),
            other => match other.to_json() {
                Value::String(s) => Some(s),
                v => Some(v.to_string()),
            },
        }
    }
}

impl From<&str> for AttrValue {
    fn from(s: &str) -> Self {
        AttrValue::Text(s.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(s: String) -> Self {
        AttrValue::Text(s)
    }
}

impl From<i64> for AttrValue {
    fn from(i: i64) -> Self {
        AttrValue::Int(i)
    }
}

impl From<bool> for AttrValue {
    fn from(b: bool) -> Self {
        AttrValue::Bool(b)
    }
}

/// An object bound to a resource: attribute name to value.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Record {
    attrs: BTreeMap<String, AttrValue>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, attribute: &str) -> Option<&AttrValue> {
        self.attrs.get(attribute)
    }

    /// Attribute value, `Null` when unset.
    pub fn value(&self, attribute: &str) -> AttrValue {
        self.attrs.get(attribute).cloned().unwrap_or(AttrValue::Null)
    }

    pub fn set(&mut self, attribute: impl Into<String>, value: impl Into<AttrValue>) {
        self.attrs.insert(attribute.into(), value.into());
    }

    pub fn with(mut self, attribute: impl Into<String>, value: impl Into<AttrValue>) -> Self {
        self.set(attribute, value);
        self
    }

    pub fn remove(&mut self, attribute: &str) -> Option<AttrValue> {
        self.attrs.remove(attribute)
    }

    pub fn contains(&self, attribute: &str) -> bool {
        self.attrs.contains_key(attribute)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &AttrValue)> {
        self.attrs.iter()
    }

    /// True when the attribute is unset or null (e.g. an unsaved primary key).
    pub fn is_unset(&self, attribute: &str) -> bool {
        self.attrs.get(attribute).map(AttrValue::is_null).unwrap_or(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn json_identity_picks_closest_variant() {
        assert_eq!(AttrValue::from_json(&json!(3)), AttrValue::Int(3));
        assert_eq!(AttrValue::from_json(&json!(1.5)), AttrValue::Float(1.5));
        assert_eq!(AttrValue::from_json(&json!("a")), AttrValue::Text("a".into()));
        assert_eq!(AttrValue::from_json(&json!([1])), AttrValue::Json(json!([1])));
    }

    #[test]
    fn compare_mixes_numbers_but_not_text() {
        assert_eq!(AttrValue::Int(2).compare(&AttrValue::Float(2.5)), Some(Ordering::Less));
        assert_eq!(AttrValue::Int(2).compare(&AttrValue::Text("2".into())), None);
    }

    #[test]
    fn unset_attributes_read_as_null() {
        let r = Record::new().with("name", "x");
        assert!(r.is_unset("id"));
        assert_eq!(r.value("id"), AttrValue::Null);
        assert_eq!(r.value("name"), AttrValue::Text("x".into()));
    }
}
