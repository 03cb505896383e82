//! Resource fields: typed accessors between wire JSON and record attributes.

use crate::config::options::DEFAULT_PRIMARY_KEY;
use crate::error::{AppError, FieldError};
use crate::filter::Filter;
use crate::query::Slice;
use crate::resource::ModelResource;
use crate::value::{AttrValue, Record};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

pub const DEFAULT_DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
pub const DEFAULT_DATE_FORMAT: &str = "%Y-%m-%d";

/// Upper bound on related objects a to-many field enumerates.
pub const TO_MANY_LIMIT: u64 = 1000;

/// Dehydration context: which view is being rendered.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sender {
    List,
    Details,
}

#[derive(Clone)]
pub enum FieldKind {
    Char,
    Text,
    Integer,
    Float,
    Boolean,
    DateTime { format: String },
    Date { format: String },
    Url,
    ForeignKey { related: Arc<ModelResource> },
    ToMany {
        related: Arc<ModelResource>,
        /// Attribute on the related records that points back at us.
        related_attribute: String,
        /// Our attribute the relation matches against; the owning model's primary key when unset.
        owner_key: Option<String>,
        full: bool,
    },
}

impl FieldKind {
    pub fn name(&self) -> &'static str {
        match self {
            FieldKind::Char => "char",
            FieldKind::Text => "text",
            FieldKind::Integer => "integer",
            FieldKind::Float => "float",
            FieldKind::Boolean => "boolean",
            FieldKind::DateTime { .. } => "datetime",
            FieldKind::Date { .. } => "date",
            FieldKind::Url => "url",
            FieldKind::ForeignKey { .. } => "foreign_key",
            FieldKind::ToMany { .. } => "to_many",
        }
    }
}

impl fmt::Debug for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldKind::DateTime { format } | FieldKind::Date { format } => {
                write!(f, "{}({})", self.name(), format)
            }
            FieldKind::ForeignKey { related } => {
                write!(f, "foreign_key({})", related.options().resource_name)
            }
            FieldKind::ToMany { related, related_attribute, .. } => write!(
                f,
                "to_many({}.{})",
                related.options().resource_name,
                related_attribute
            ),
            other => f.write_str(other.name()),
        }
    }
}

#[derive(Clone, Debug)]
pub struct Field {
    pub attribute: String,
    pub required: bool,
    pub nullable: bool,
    pub readonly: bool,
    pub show: HashSet<Sender>,
    pub pk: bool,
    pub kind: FieldKind,
}

impl Field {
    pub fn new(attribute: impl Into<String>, kind: FieldKind) -> Self {
        Field {
            attribute: attribute.into(),
            required: false,
            nullable: false,
            readonly: false,
            show: [Sender::List, Sender::Details].into_iter().collect(),
            pk: false,
            kind,
        }
    }

    pub fn char(attribute: impl Into<String>) -> Self {
        Self::new(attribute, FieldKind::Char)
    }

    pub fn text(attribute: impl Into<String>) -> Self {
        Self::new(attribute, FieldKind::Text)
    }

    pub fn integer(attribute: impl Into<String>) -> Self {
        Self::new(attribute, FieldKind::Integer)
    }

    pub fn float(attribute: impl Into<String>) -> Self {
        Self::new(attribute, FieldKind::Float)
    }

    pub fn boolean(attribute: impl Into<String>) -> Self {
        Self::new(attribute, FieldKind::Boolean)
    }

    pub fn datetime(attribute: impl Into<String>) -> Self {
        Self::new(
            attribute,
            FieldKind::DateTime {
                format: DEFAULT_DATETIME_FORMAT.into(),
            },
        )
    }

    pub fn date(attribute: impl Into<String>) -> Self {
        Self::new(
            attribute,
            FieldKind::Date {
                format: DEFAULT_DATE_FORMAT.into(),
            },
        )
    }

    pub fn url(attribute: impl Into<String>) -> Self {
        Self::new(attribute, FieldKind::Url)
    }

    pub fn foreign_key(attribute: impl Into<String>, related: Arc<ModelResource>) -> Self {
        Self::new(attribute, FieldKind::ForeignKey { related })
    }

    pub fn to_many(
        attribute: impl Into<String>,
        related: Arc<ModelResource>,
        related_attribute: impl Into<String>,
    ) -> Self {
        Self::new(
            attribute,
            FieldKind::ToMany {
                related,
                related_attribute: related_attribute.into(),
                owner_key: None,
                full: false,
            },
        )
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub fn readonly(mut self) -> Self {
        self.readonly = true;
        self
    }

    pub fn primary_key(mut self) -> Self {
        self.pk = true;
        self
    }

    pub fn show(mut self, senders: &[Sender]) -> Self {
        self.show = senders.iter().copied().collect();
        self
    }

    /// Parsing pattern for datetime and date fields; ignored by other kinds.
    pub fn with_format(mut self, pattern: impl Into<String>) -> Self {
        match &mut self.kind {
            FieldKind::DateTime { format } | FieldKind::Date { format } => *format = pattern.into(),
            _ => {}
        }
        self
    }

    /// Render related objects in full instead of by primary key (to-many only).
    pub fn full(mut self) -> Self {
        if let FieldKind::ToMany { full, .. } = &mut self.kind {
            *full = true;
        }
        self
    }

    /// Attribute of the owning record a to-many relation matches against.
    pub fn owner_key(mut self, key: impl Into<String>) -> Self {
        if let FieldKind::ToMany { owner_key, .. } = &mut self.kind {
            *owner_key = Some(key.into());
        }
        self
    }

    pub fn visible_to(&self, sender: Option<Sender>) -> bool {
        sender.map(|s| self.show.contains(&s)).unwrap_or(true)
    }

    /// Coercion that needs no persistence access. Foreign keys coerce to the related key type.
    pub fn convert_scalar(&self, raw: &Value) -> Result<AttrValue, FieldError> {
        if raw.is_null() {
            return if self.nullable {
                Ok(AttrValue::Null)
            } else {
                Err(FieldError::InvalidValue("null is not allowed".into()))
            };
        }
        match &self.kind {
            FieldKind::Char | FieldKind::Text => Ok(AttrValue::from_json(raw)),
            FieldKind::Integer => convert_integer(raw),
            FieldKind::Float => convert_float(raw),
            FieldKind::Boolean => Ok(AttrValue::Bool(crate::filter::is_truthy(&AttrValue::from_json(raw)))),
            FieldKind::DateTime { format } => {
                let s = raw
                    .as_str()
                    .ok_or_else(|| FieldError::InvalidValue("Invalid datetime format".into()))?;
                NaiveDateTime::parse_from_str(s, format)
                    .map(AttrValue::DateTime)
                    .map_err(|_| FieldError::InvalidValue("Invalid datetime format".into()))
            }
            FieldKind::Date { format } => {
                let s = raw
                    .as_str()
                    .ok_or_else(|| FieldError::InvalidValue("Invalid date format".into()))?;
                NaiveDate::parse_from_str(s, format)
                    .map(AttrValue::Date)
                    .map_err(|_| FieldError::InvalidValue("Invalid date format".into()))
            }
            FieldKind::Url => convert_url(raw),
            FieldKind::ForeignKey { related } => related.pk_field().convert_scalar(raw),
            FieldKind::ToMany { .. } => Err(FieldError::Unsupported(self.attribute.clone())),
        }
    }

    /// Coerce a query-string value (filters, path segments).
    pub fn convert_lookup(&self, raw: &str) -> Result<AttrValue, FieldError> {
        self.convert_scalar(&Value::String(raw.to_string()))
    }

    /// Full conversion. Foreign keys are resolved against the related resource and fail with
    /// `DoesNotExist` when no row matches.
    pub async fn convert(&self, raw: &Value) -> Result<AttrValue, AppError> {
        let value = self
            .convert_scalar(raw)
            .map_err(|e| AppError::from_field(&self.attribute, e))?;
        if let FieldKind::ForeignKey { related } = &self.kind {
            if value.is_null() {
                return Ok(value);
            }
            let pk_attribute = related.pk_field().attribute.clone();
            let found = related
                .adapter()
                .select(&[Filter::exact(pk_attribute, value.clone())], &[], Some(Slice::first()))
                .await?;
            if found.is_empty() {
                return Err(AppError::DoesNotExist);
            }
        }
        Ok(value)
    }

    /// Convert `raw` and assign it. Readonly fields are left untouched.
    pub async fn hydrate(&self, obj: &mut Record, raw: &Value) -> Result<(), AppError> {
        if let FieldKind::ToMany { .. } = self.kind {
            return Err(AppError::Unsupported(self.attribute.clone()));
        }
        if self.readonly {
            return Ok(());
        }
        let value = self.convert(raw).await?;
        obj.set(self.attribute.clone(), value);
        Ok(())
    }

    /// External value of the attribute.
    pub async fn dehydrate(&self, obj: &Record) -> Result<Value, AppError> {
        let value = obj.value(&self.attribute);
        Ok(match (&self.kind, &value) {
            (FieldKind::DateTime { format }, AttrValue::DateTime(d)) => {
                Value::String(d.format(format).to_string())
            }
            (FieldKind::DateTime { format }, AttrValue::Date(d)) => {
                d.and_hms_opt(0, 0, 0)
                    .map(|dt| Value::String(dt.format(format).to_string()))
                    .unwrap_or(Value::Null)
            }
            (FieldKind::Date { format }, AttrValue::Date(d)) => Value::String(d.format(format).to_string()),
            (FieldKind::Date { format }, AttrValue::DateTime(d)) => {
                Value::String(d.date().format(format).to_string())
            }
            (
                FieldKind::ToMany {
                    related,
                    related_attribute,
                    owner_key,
                    full,
                },
                _,
            ) => {
                let owner = obj.value(owner_key.as_deref().unwrap_or(DEFAULT_PRIMARY_KEY));
                if owner.is_null() {
                    return Ok(Value::Array(Vec::new()));
                }
                let rows = related
                    .adapter()
                    .select(
                        &[Filter::exact(related_attribute.clone(), owner)],
                        &related.ordering_attributes(),
                        Some(Slice::new(0, TO_MANY_LIMIT)),
                    )
                    .await?;
                let mut out = Vec::with_capacity(rows.len());
                for rel in &rows {
                    if *full {
                        out.push(Value::Object(related.dehydrate(rel, None).await?));
                    } else {
                        out.push(rel.value(&related.pk_field().attribute).to_json());
                    }
                }
                Value::Array(out)
            }
            _ => value.to_json(),
        })
    }
}

fn convert_integer(raw: &Value) -> Result<AttrValue, FieldError> {
    let invalid = || FieldError::InvalidValue(format!("invalid literal for integer: {}", raw));
    match raw {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| {
                n.as_f64()
                    .map(f64::trunc)
                    .filter(|f| *f >= i64::MIN as f64 && *f < i64::MAX as f64)
                    .map(|f| f as i64)
            })
            .map(AttrValue::Int)
            .ok_or_else(invalid),
        Value::Bool(b) => Ok(AttrValue::Int(*b as i64)),
        Value::String(s) => s.trim().parse::<i64>().map(AttrValue::Int).map_err(|_| invalid()),
        _ => Err(invalid()),
    }
}

fn convert_float(raw: &Value) -> Result<AttrValue, FieldError> {
    let invalid = || FieldError::InvalidValue(format!("could not convert to float: {}", raw));
    match raw {
        Value::Number(n) => n.as_f64().map(AttrValue::Float).ok_or_else(invalid),
        Value::String(s) => s.trim().parse::<f64>().map(AttrValue::Float).map_err(|_| invalid()),
        _ => Err(invalid()),
    }
}

fn convert_url(raw: &Value) -> Result<AttrValue, FieldError> {
    let invalid = || FieldError::InvalidValue("Invalid URL value".into());
    let s = raw.as_str().ok_or_else(invalid)?.trim();
    let parsed = url::Url::parse(s).map_err(|_| invalid())?;
    match parsed.host_str() {
        Some(host) if !host.is_empty() => Ok(AttrValue::Text(s.to_string())),
        _ => Err(invalid()),
    }
}
