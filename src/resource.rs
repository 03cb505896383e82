//! Resources: a named set of fields plus options, and model resources bound to an adapter.
//!
//! A [`ModelResource`] derives its fields from the bound model's columns, lets explicitly
//! declared fields override them, and turns path segments and query filters into adapter
//! filters. Mutating operations validate existence first, then the payload, then mutate.

use crate::adapters::{Adapter, AdapterRegistry};
use crate::config::options::{ResourceMeta, ResourceOptions};
use crate::error::{AppError, ConfigError};
use crate::fields::{Field, FieldKind, Sender};
use crate::filter::{is_truthy, Filter, FilterValue, Operator, RawFilter};
use crate::model::ModelSchema;
use crate::pagination::Paginator;
use crate::query::{Query, Slice};
use crate::response::{ListPage, Object, PageMeta};
use crate::value::{AttrValue, Record};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::future::Future;
use std::ops::Deref;
use std::pin::Pin;
use std::sync::Arc;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// JSON object payload of a create or update request.
pub type Payload = serde_json::Map<String, Value>;

/// Path-derived equality lookups: field name to raw segment value.
pub type Kwargs = [(String, String)];

#[derive(Debug)]
pub struct Resource {
    fields: BTreeMap<String, Field>,
    options: ResourceOptions,
}

impl Resource {
    pub fn builder(name: impl Into<String>) -> ResourceBuilder {
        ResourceBuilder {
            name: name.into(),
            meta: None,
            fields: BTreeMap::new(),
        }
    }

    pub fn options(&self) -> &ResourceOptions {
        &self.options
    }

    pub fn fields(&self) -> &BTreeMap<String, Field> {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.get(name)
    }

    /// Assign every writable field present in `data`. A required field missing from `data`
    /// fails before anything else is converted.
    pub async fn hydrate(&self, obj: &mut Record, data: &Payload) -> Result<(), AppError> {
        if let Some((name, _)) = self
            .fields
            .iter()
            .find(|(name, f)| !f.readonly && f.required && !data.contains_key(name.as_str()))
        {
            return Err(AppError::MissingRequiredField(name.clone()));
        }
        self.hydrate_partial(obj, data).await
    }

    /// Assign the writable fields present in `data`; absent ones are left untouched.
    pub async fn hydrate_partial(&self, obj: &mut Record, data: &Payload) -> Result<(), AppError> {
        for (name, field) in &self.fields {
            if field.readonly {
                continue;
            }
            if let Some(raw) = data.get(name) {
                field.hydrate(obj, raw).await?;
            }
        }
        Ok(())
    }

    /// Project the fields visible to `sender`; every field when `sender` is `None`.
    pub async fn dehydrate(&self, obj: &Record, sender: Option<Sender>) -> Result<Object, AppError> {
        let mut out = Object::new();
        for (name, field) in &self.fields {
            if field.visible_to(sender) {
                out.insert(name.clone(), field.dehydrate(obj).await?);
            }
        }
        Ok(out)
    }
}

pub struct ResourceBuilder {
    name: String,
    meta: Option<ResourceMeta>,
    fields: BTreeMap<String, Field>,
}

impl ResourceBuilder {
    pub fn meta(mut self, meta: ResourceMeta) -> Self {
        self.meta = Some(meta);
        self
    }

    pub fn field(mut self, name: impl Into<String>, field: Field) -> Self {
        self.fields.insert(name.into(), field);
        self
    }

    pub fn build(self) -> Resource {
        Resource {
            options: ResourceOptions::new(self.meta, &self.name),
            fields: self.fields,
        }
    }
}

/// A resource bound to a persistence model through an adapter.
pub struct ModelResource {
    resource: Resource,
    adapter: Arc<dyn Adapter>,
    pk: Field,
}

impl Deref for ModelResource {
    type Target = Resource;

    fn deref(&self) -> &Resource {
        &self.resource
    }
}

impl std::fmt::Debug for ModelResource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelResource")
            .field("name", &self.options.resource_name)
            .field("engine", &self.adapter.engine())
            .field("fields", &self.fields.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl ModelResource {
    pub fn builder(schema: ModelSchema) -> ModelResourceBuilder {
        ModelResourceBuilder {
            schema,
            meta: None,
            fields: Vec::new(),
            adapter: None,
            related: HashMap::new(),
        }
    }

    pub fn adapter(&self) -> &Arc<dyn Adapter> {
        &self.adapter
    }

    pub fn schema(&self) -> &ModelSchema {
        self.adapter.schema()
    }

    /// Field named by `options.primary_key`.
    pub fn pk_field(&self) -> &Field {
        &self.pk
    }

    /// Declared ordering translated from field names to attributes; `-` is kept.
    pub fn ordering_attributes(&self) -> Vec<String> {
        self.options
            .ordering
            .iter()
            .filter_map(|key| {
                let (name, prefix) = match key.strip_prefix('-') {
                    Some(name) => (name, "-"),
                    None => (key.as_str(), ""),
                };
                self.field(name).map(|f| format!("{}{}", prefix, f.attribute))
            })
            .collect()
    }

    fn field_or_err(&self, name: &str) -> Result<&Field, AppError> {
        self.field(name).ok_or_else(|| {
            AppError::Config(ConfigError::UnknownField {
                resource: self.options.resource_name.clone(),
                field: name.to_string(),
            })
        })
    }

    /// Equality filters from path segments. A segment that cannot name a row (unparseable key,
    /// missing related object) fails with `DoesNotExist`.
    pub async fn filters_from_kwargs(&self, kwargs: &Kwargs) -> Result<Vec<Filter>, AppError> {
        let mut out = Vec::with_capacity(kwargs.len());
        for (name, raw) in kwargs {
            let field = self.field_or_err(name)?;
            let value = match field.convert(&Value::String(raw.clone())).await {
                Ok(v) => v,
                Err(AppError::InvalidValue { .. }) | Err(AppError::DoesNotExist) => {
                    return Err(AppError::DoesNotExist)
                }
                Err(e) => return Err(e),
            };
            out.push(Filter::exact(field.attribute.clone(), value));
        }
        Ok(out)
    }

    /// Convert accepted query parameters. String operators match on raw text, `in` takes a
    /// comma-separated list, `is_null` takes a truthy flag.
    pub fn filters_from_raw(&self, raw: Vec<RawFilter>) -> Result<Vec<Filter>, AppError> {
        let mut out = Vec::with_capacity(raw.len());
        for rf in raw {
            let Some(field) = self.field(&rf.field) else {
                tracing::debug!(field = %rf.field, "filter on undeclared field ignored");
                continue;
            };
            let attribute = field.attribute.clone();
            let convert = |s: &str| field.convert_lookup(s).map_err(|e| AppError::from_field(&rf.field, e));
            let filter = match rf.op {
                Operator::Contains | Operator::StartsWith | Operator::EndsWith => {
                    Filter::new(attribute, rf.op, AttrValue::Text(rf.value.clone()))
                }
                Operator::IsNull => Filter::new(
                    attribute,
                    rf.op,
                    AttrValue::Bool(is_truthy(&AttrValue::Text(rf.value.clone()))),
                ),
                Operator::In => {
                    let values = rf
                        .value
                        .split(',')
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(convert)
                        .collect::<Result<Vec<_>, _>>()?;
                    Filter {
                        field: attribute,
                        op: rf.op,
                        value: FilterValue::Many(values),
                    }
                }
                op => Filter::new(attribute, op, convert(&rf.value)?),
            };
            out.push(filter);
        }
        Ok(out)
    }

    /// Unevaluated query over `filters` plus the path-derived equality filters.
    pub async fn get_object_list(&self, filters: Vec<Filter>, kwargs: &Kwargs) -> Result<Query, AppError> {
        let mut filters = filters;
        filters.extend(self.filters_from_kwargs(kwargs).await?);
        Ok(Query::new(self.adapter.clone(), filters, self.ordering_attributes()))
    }

    pub async fn get_object(&self, kwargs: &Kwargs) -> Result<Record, AppError> {
        let filters = self.filters_from_kwargs(kwargs).await?;
        self.adapter
            .select(&filters, &[], Some(Slice::first()))
            .await?
            .into_iter()
            .next()
            .ok_or(AppError::DoesNotExist)
    }

    pub fn create_object(&self) -> Record {
        self.adapter.create_object()
    }

    pub async fn save_object(&self, obj: &mut Record) -> Result<(), AppError> {
        self.adapter.save(obj).await
    }

    /// Bulk delete; returns the affected-row count (zero when the path names no row).
    pub async fn delete_object(&self, kwargs: &Kwargs) -> Result<u64, AppError> {
        let filters = match self.filters_from_kwargs(kwargs).await {
            Ok(f) => f,
            Err(AppError::DoesNotExist) => return Ok(0),
            Err(e) => return Err(e),
        };
        self.adapter.delete(&filters).await
    }

    /// Boxed so to-many fields can render related resources in full.
    pub fn dehydrate<'a>(&'a self, obj: &'a Record, sender: Option<Sender>) -> BoxFuture<'a, Result<Object, AppError>> {
        Box::pin(self.resource.dehydrate(obj, sender))
    }

    /// One page of `query`. `limit` defaults to `options.limit` and is clamped to
    /// `[1, max_limit]`; `page` starts at 1.
    pub async fn paginate(&self, query: Query, page: Option<u64>, limit: Option<u64>) -> Result<ListPage, AppError> {
        let limit = limit
            .unwrap_or(u64::from(self.options.limit))
            .clamp(1, u64::from(self.options.max_limit));
        let paginator = Paginator::new(query, page.unwrap_or(1), limit);
        let total_count = paginator.total_count().await?;
        let items = paginator.items().await?;
        let mut objects = Vec::with_capacity(items.len());
        for item in &items {
            objects.push(self.dehydrate(item, Some(Sender::List)).await?);
        }
        Ok(ListPage {
            meta: PageMeta {
                limit: paginator.page_size(),
                offset: paginator.offset(),
                total_count,
            },
            objects,
        })
    }
}

pub struct ModelResourceBuilder {
    schema: ModelSchema,
    meta: Option<ResourceMeta>,
    fields: Vec<(String, Field)>,
    adapter: Option<Result<Arc<dyn Adapter>, ConfigError>>,
    related: HashMap<String, Arc<ModelResource>>,
}

impl ModelResourceBuilder {
    pub fn meta(mut self, meta: ResourceMeta) -> Self {
        self.meta = Some(meta);
        self
    }

    /// Declare a field; it replaces any field derived from the model under the same name.
    pub fn field(mut self, name: impl Into<String>, field: Field) -> Self {
        self.fields.push((name.into(), field));
        self
    }

    /// Bind an explicit adapter instead of detecting one.
    pub fn adapter(mut self, adapter: Arc<dyn Adapter>) -> Self {
        self.adapter = Some(Ok(adapter));
        self
    }

    /// Detect the adapter from the registry's engines.
    pub fn registry(mut self, registry: &AdapterRegistry) -> Self {
        self.adapter = Some(registry.detect(&self.schema));
        self
    }

    /// Resource used to resolve foreign-key columns that reference `model`.
    pub fn related(mut self, model: impl Into<String>, resource: Arc<ModelResource>) -> Self {
        self.related.insert(model.into(), resource);
        self
    }

    pub fn build(self) -> Result<ModelResource, ConfigError> {
        let adapter = self.adapter.unwrap_or_else(|| {
            Err(ConfigError::NoAdapter {
                model: self.schema.name.clone(),
                engine: self.schema.engine.clone(),
            })
        })?;
        let schema = adapter.schema();
        let mut meta = self.meta.unwrap_or_default();
        if meta.primary_key.is_none() {
            meta.primary_key = Some(schema.primary_key.clone());
        }
        let options = ResourceOptions::new(Some(meta), &schema.name);

        let mut skip: HashSet<String> = options.excludes.clone();
        skip.extend(self.fields.iter().map(|(name, _)| name.clone()));
        let mut fields = adapter.get_fields(&skip, &self.related);
        fields.extend(self.fields);

        let unknown = |field: &str| ConfigError::UnknownField {
            resource: options.resource_name.clone(),
            field: field.to_string(),
        };
        let pk = fields
            .get(&options.primary_key)
            .cloned()
            .ok_or_else(|| unknown(&options.primary_key))?;
        for field in fields.values_mut() {
            if let FieldKind::ToMany { owner_key: owner_key @ None, .. } = &mut field.kind {
                *owner_key = Some(pk.attribute.clone());
            }
        }
        if let Some(name) = options.filtering.keys().find(|name| !fields.contains_key(*name)) {
            return Err(unknown(name));
        }
        if let Some(key) = options
            .ordering
            .iter()
            .find(|key| !fields.contains_key(key.trim_start_matches('-')))
        {
            return Err(unknown(key));
        }

        tracing::info!(
            resource = %options.resource_name,
            engine = %adapter.engine(),
            fields = fields.len(),
            "resource built"
        );
        Ok(ModelResource {
            resource: Resource { fields, options },
            adapter,
            pk,
        })
    }
}
