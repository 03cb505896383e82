//! Filter triples and query-string parsing.
//!
//! Query parameters take the form `field` or `field__operator`. A parameter becomes a filter only
//! when the resource declares the field in its filtering rules with that operator; anything else
//! is dropped without error.

use crate::value::{AttrValue, Record};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

/// Separator between field name and operator in query parameters.
pub const LOOKUP_SEP: &str = "__";

/// Query parameters consumed by pagination, never treated as filters.
pub const RESERVED_PARAMS: &[&str] = &["page", "limit"];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operator {
    #[serde(rename = "exact")]
    Exact,
    #[serde(rename = "gt")]
    Gt,
    #[serde(rename = "gte")]
    Gte,
    #[serde(rename = "lt")]
    Lt,
    #[serde(rename = "lte")]
    Lte,
    #[serde(rename = "contains")]
    Contains,
    #[serde(rename = "startswith")]
    StartsWith,
    #[serde(rename = "endswith")]
    EndsWith,
    #[serde(rename = "is_null")]
    IsNull,
    #[serde(rename = "in")]
    In,
}

impl Operator {
    pub const ALL: [Operator; 10] = [
        Operator::Exact,
        Operator::Gt,
        Operator::Gte,
        Operator::Lt,
        Operator::Lte,
        Operator::Contains,
        Operator::StartsWith,
        Operator::EndsWith,
        Operator::IsNull,
        Operator::In,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::Exact => "exact",
            Operator::Gt => "gt",
            Operator::Gte => "gte",
            Operator::Lt => "lt",
            Operator::Lte => "lte",
            Operator::Contains => "contains",
            Operator::StartsWith => "startswith",
            Operator::EndsWith => "endswith",
            Operator::IsNull => "is_null",
            Operator::In => "in",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operator {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Operator::ALL.iter().copied().find(|op| op.as_str() == s).ok_or(())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum FilterValue {
    One(AttrValue),
    Many(Vec<AttrValue>),
}

/// A validated filter on a record attribute.
#[derive(Clone, Debug, PartialEq)]
pub struct Filter {
    pub field: String,
    pub op: Operator,
    pub value: FilterValue,
}

impl Filter {
    pub fn new(field: impl Into<String>, op: Operator, value: AttrValue) -> Self {
        Filter {
            field: field.into(),
            op,
            value: FilterValue::One(value),
        }
    }

    pub fn exact(field: impl Into<String>, value: impl Into<AttrValue>) -> Self {
        Self::new(field, Operator::Exact, value.into())
    }

    pub fn is_in(field: impl Into<String>, values: Vec<AttrValue>) -> Self {
        Filter {
            field: field.into(),
            op: Operator::In,
            value: FilterValue::Many(values),
        }
    }

    /// Evaluate the filter against a record. `exact` against null means "is null".
    pub fn matches(&self, record: &Record) -> bool {
        let attr = record.value(&self.field);
        match (&self.op, &self.value) {
            (Operator::In, FilterValue::Many(values)) => values
                .iter()
                .any(|v| attr.compare(v) == Some(Ordering::Equal) && !attr.is_null()),
            (_, FilterValue::Many(_)) => false,
            (Operator::IsNull, FilterValue::One(v)) => is_truthy(v) == attr.is_null(),
            (Operator::Exact, FilterValue::One(AttrValue::Null)) => attr.is_null(),
            (op, FilterValue::One(v)) => {
                if attr.is_null() {
                    return false;
                }
                match op {
                    Operator::Exact => attr.compare(v) == Some(Ordering::Equal),
                    Operator::Gt => attr.compare(v) == Some(Ordering::Greater),
                    Operator::Gte => matches!(attr.compare(v), Some(Ordering::Greater | Ordering::Equal)),
                    Operator::Lt => attr.compare(v) == Some(Ordering::Less),
                    Operator::Lte => matches!(attr.compare(v), Some(Ordering::Less | Ordering::Equal)),
                    Operator::Contains | Operator::StartsWith | Operator::EndsWith => {
                        match (attr.to_text(), v.to_text()) {
                            (Some(a), Some(b)) => match op {
                                Operator::Contains => a.contains(&b),
                                Operator::StartsWith => a.starts_with(&b),
                                _ => a.ends_with(&b),
                            },
                            _ => false,
                        }
                    }
                    Operator::IsNull | Operator::In => false,
                }
            }
        }
    }
}

/// Truthiness used by `is_null` and boolean coercion.
pub fn is_truthy(v: &AttrValue) -> bool {
    match v {
        AttrValue::Null => false,
        AttrValue::Bool(b) => *b,
        AttrValue::Int(i) => *i != 0,
        AttrValue::Float(f) => *f != 0.0,
        AttrValue::Text(s) => !matches!(
            s.trim().to_ascii_lowercase().as_str(),
            "" | "0" | "false" | "no" | "off"
        ),
        AttrValue::DateTime(_) | AttrValue::Date(_) => true,
        AttrValue::Json(j) => match j {
            serde_json::Value::Array(a) => !a.is_empty(),
            serde_json::Value::Object(o) => !o.is_empty(),
            _ => true,
        },
    }
}

/// Declared filtering rules: field name to allowed operators.
pub type FilteringRules = HashMap<String, HashSet<Operator>>;

/// An accepted query parameter, value still in wire form.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawFilter {
    pub field: String,
    pub op: Operator,
    pub value: String,
}

/// Split `field__op` into its parts; a bare name means `exact`.
pub fn split_lookup(key: &str) -> (&str, Option<Operator>) {
    match key.rsplit_once(LOOKUP_SEP) {
        Some((field, op)) => match op.parse() {
            Ok(op) => (field, Some(op)),
            Err(()) => (field, None),
        },
        None => (key, Some(Operator::Exact)),
    }
}

/// Keep only the parameters allowed by `filtering`.
pub fn parse_query_filters<'a, I>(params: I, filtering: &FilteringRules) -> Vec<RawFilter>
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let mut out = Vec::new();
    for (key, value) in params {
        if RESERVED_PARAMS.contains(&key) {
            continue;
        }
        let (field, op) = split_lookup(key);
        let allowed = match (op, filtering.get(field)) {
            (Some(op), Some(ops)) if ops.contains(&op) => Some(op),
            _ => None,
        };
        match allowed {
            Some(op) => out.push(RawFilter {
                field: field.to_string(),
                op,
                value: value.to_string(),
            }),
            None => tracing::debug!(param = %key, "filter not declared, ignored"),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rules() -> FilteringRules {
        let mut r = FilteringRules::new();
        r.insert(
            "name".into(),
            [Operator::Exact, Operator::StartsWith].into_iter().collect(),
        );
        r
    }

    #[test]
    fn lookup_defaults_to_exact() {
        assert_eq!(split_lookup("name"), ("name", Some(Operator::Exact)));
        assert_eq!(split_lookup("name__startswith"), ("name", Some(Operator::StartsWith)));
        assert_eq!(split_lookup("created__at__gte"), ("created__at", Some(Operator::Gte)));
        assert_eq!(split_lookup("name__bogus"), ("name", None));
    }

    #[test]
    fn undeclared_pairs_are_dropped() {
        let params = vec![
            ("name__startswith", "test1"),
            ("name__endswith", "1"),
            ("age", "3"),
            ("page", "2"),
        ];
        let out = parse_query_filters(params, &rules());
        assert_eq!(
            out,
            vec![RawFilter {
                field: "name".into(),
                op: Operator::StartsWith,
                value: "test1".into()
            }]
        );
    }

    #[test]
    fn matches_follow_sql_null_semantics() {
        let r = Record::new().with("name", "test1").with("category", AttrValue::Null);
        assert!(Filter::new("name", Operator::StartsWith, "test".into()).matches(&r));
        assert!(!Filter::new("name", Operator::EndsWith, "2".into()).matches(&r));
        assert!(Filter::exact("category", AttrValue::Null).matches(&r));
        assert!(!Filter::new("category", Operator::Gt, AttrValue::Int(0)).matches(&r));
        assert!(Filter::new("category", Operator::IsNull, AttrValue::Bool(true)).matches(&r));
        assert!(Filter::is_in("name", vec!["a".into(), "test1".into()]).matches(&r));
    }

    #[test]
    fn operator_names_round_trip_through_config() {
        let ops: Vec<Operator> = serde_json::from_str(r#"["exact","startswith","is_null","in"]"#).unwrap();
        assert_eq!(ops, vec![Operator::Exact, Operator::StartsWith, Operator::IsNull, Operator::In]);
    }
}
