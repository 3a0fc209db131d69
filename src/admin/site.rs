//! Admin registry and the per-model resource seam.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;

use super::model_admin::{InlineKind, ModelAdmin, DISPLAY};
use super::Row;
use crate::error::AppError;
use crate::store::Store;
use crate::{orders, restaurants, users};

/// Binds a [`ModelAdmin`] description to the store operations of one model.
///
/// Rows handed to the changelist carry the serialized record, its display string under
/// [`DISPLAY`], foreign keys rendered by their display string, and `a__b` lookup keys
/// used by search and filters.
#[async_trait]
pub trait AdminResource: Send + Sync {
    fn admin(&self) -> &ModelAdmin;

    async fn rows(&self, store: &dyn Store) -> Result<Vec<Row>, AppError>;

    async fn record(&self, store: &dyn Store, id: i64) -> Result<Row, AppError>;

    async fn inline_rows(&self, _store: &dyn Store, _id: i64) -> Result<Vec<Vec<Row>>, AppError> {
        Ok(Vec::new())
    }

    async fn create(&self, store: &dyn Store, form: Value) -> Result<Row, AppError>;

    async fn update(&self, store: &dyn Store, id: i64, form: Value) -> Result<Row, AppError>;

    async fn delete(&self, store: &dyn Store, id: i64) -> Result<(), AppError>;

    /// Object storage prefix for photo uploads, if the model has a photo.
    fn upload_to(&self) -> Option<&'static str> {
        None
    }

    async fn set_photo(&self, _store: &dyn Store, _id: i64, _key: &str) -> Result<Row, AppError> {
        Err(AppError::BadRequest(format!(
            "{} has no photo field",
            self.admin().model
        )))
    }
}

/// Serializes a record into an admin row.
pub fn to_row<T: Serialize>(record: &T) -> Result<Row, AppError> {
    match serde_json::to_value(record) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(AppError::Internal(format!("record serialized to {other}"))),
        Err(e) => Err(AppError::Internal(e.to_string())),
    }
}

/// Like [`to_row`], with the display string attached.
pub fn display_row<T: Serialize>(record: &T, display: impl Into<String>) -> Result<Row, AppError> {
    let mut row = to_row(record)?;
    row.insert(DISPLAY.into(), Value::String(display.into()));
    Ok(row)
}

/// Decodes a submitted JSON form.
pub fn parse_form<T: DeserializeOwned>(form: Value) -> Result<T, AppError> {
    serde_json::from_value(form).map_err(|e| AppError::BadRequest(format!("invalid form: {e}")))
}

#[derive(Debug, Serialize)]
pub struct FieldValue {
    pub name: String,
    pub value: Value,
    pub readonly: bool,
}

#[derive(Debug, Serialize)]
pub struct FieldsetValues {
    pub name: &'static str,
    pub collapse: bool,
    pub fields: Vec<FieldValue>,
}

#[derive(Debug, Serialize)]
pub struct InlineRows {
    pub model: &'static str,
    pub kind: InlineKind,
    pub fields: Vec<&'static str>,
    pub extra: usize,
    pub rows: Vec<Row>,
}

#[derive(Debug, Serialize)]
pub struct ChangeForm {
    pub model: &'static str,
    pub id: i64,
    pub display: Value,
    pub fieldsets: Vec<FieldsetValues>,
    pub inlines: Vec<InlineRows>,
    pub record: Row,
}

fn field_value(record: &Row, field: &str) -> Value {
    record
        .get(field)
        .or_else(|| record.get(&format!("{field}_id")))
        .cloned()
        .unwrap_or(Value::Null)
}

/// Builds the change form of one record: its values grouped by fieldset plus inline rows.
pub async fn change_form(
    resource: &dyn AdminResource,
    store: &dyn Store,
    id: i64,
) -> Result<ChangeForm, AppError> {
    let admin = resource.admin();
    let record = resource.record(store, id).await?;

    let fieldsets = if admin.fieldsets.is_empty() {
        vec![FieldsetValues {
            name: "",
            collapse: false,
            fields: record
                .keys()
                .filter(|k| k.as_str() != "id" && k.as_str() != DISPLAY)
                .map(|name| FieldValue {
                    name: name.clone(),
                    value: field_value(&record, name),
                    readonly: admin.is_readonly(name),
                })
                .collect(),
        }]
    } else {
        admin
            .fieldsets
            .iter()
            .map(|fs| FieldsetValues {
                name: fs.name,
                collapse: fs.collapse,
                fields: fs
                    .fields
                    .iter()
                    .map(|name| FieldValue {
                        name: name.to_string(),
                        value: field_value(&record, name),
                        readonly: admin.is_readonly(name),
                    })
                    .collect(),
            })
            .collect()
    };

    let children = resource.inline_rows(store, id).await?;
    let inlines = admin
        .inlines
        .iter()
        .zip(children.into_iter().chain(std::iter::repeat_with(Vec::new)))
        .map(|(inline, rows)| InlineRows {
            model: inline.model,
            kind: inline.kind,
            fields: inline.fields.clone(),
            extra: inline.extra,
            rows,
        })
        .collect();

    Ok(ChangeForm {
        model: admin.model,
        id,
        display: record.get(DISPLAY).cloned().unwrap_or(Value::Null),
        fieldsets,
        inlines,
        record,
    })
}

/// Drops read-only fields from a submitted form.
pub fn strip_readonly(admin: &ModelAdmin, form: &mut Value) {
    if let Value::Object(map) = form {
        map.retain(|k, _| !admin.is_readonly(k));
    }
}

/// All registered models, keyed by model name.
#[derive(Default)]
pub struct AdminSite {
    resources: BTreeMap<&'static str, Arc<dyn AdminResource>>,
}

impl AdminSite {
    pub fn new() -> Self {
        Self::default()
    }

    /// The site with every model of the application registered.
    pub fn default_site() -> Self {
        let mut site = Self::new();
        users::admin::register(&mut site);
        restaurants::admin::register(&mut site);
        orders::admin::register(&mut site);
        site
    }

    pub fn register(&mut self, resource: impl AdminResource + 'static) {
        let model = resource.admin().model;
        self.resources.insert(model, Arc::new(resource));
    }

    pub fn get(&self, model: &str) -> Result<Arc<dyn AdminResource>, AppError> {
        self.resources
            .get(model)
            .cloned()
            .ok_or_else(|| AppError::UnknownModel(model.to_string()))
    }

    pub fn models(&self) -> impl Iterator<Item = &ModelAdmin> {
        self.resources.values().map(|r| r.admin())
    }
}
