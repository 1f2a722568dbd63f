//! Generic dialog-driven CRUD lifecycle shared by every entity screen.
//!
//! One controller per entity type owns the dialog state machine, the working
//! form copy and the submit protocol, so list/detail screens bind to it
//! instead of duplicating open/validate/submit plumbing per feature.

use std::{
    collections::{BTreeMap, BTreeSet},
    sync::Arc,
};

use async_trait::async_trait;
use db::StoreError;
use serde::Serialize;
use serde_json::{Map, Value};
use strum_macros::{Display, EnumString};
use thiserror::Error;
use tracing::{info, warn};
use ts_rs::TS;

/// Field-name → human-readable message. Absence of a key means the field is
/// valid. Recomputed on blur and submit, never persisted.
pub type ValidationErrors = BTreeMap<String, String>;

/// Working copy of the entity under edit.
pub type FormValues = Map<String, Value>;

/// Pure validation function supplied per entity type.
pub type Validator = Arc<dyn Fn(&FormValues) -> ValidationErrors + Send + Sync>;

#[derive(Debug, Error)]
pub enum CrudError {
    #[error("cannot delete {entity}: id is missing or invalid")]
    MissingId { entity: String },
    #[error("unknown form field: {field}")]
    UnknownField { field: String },
    #[error("field {field} is not a number: {raw:?}")]
    InvalidNumber { field: String, raw: String },
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Persistence delegate backing one controller. The controller never talks to
/// the document-store adapter directly.
#[async_trait]
pub trait EntityGateway<T>: Send + Sync {
    /// Refresh the backing list; called after every successful mutation.
    async fn fetch(&self) -> Result<(), StoreError>;

    async fn create(&self, data: FormValues) -> Result<T, StoreError>;

    async fn update(&self, id: &str, data: FormValues) -> Result<(), StoreError>;

    async fn delete(&self, id: &str) -> Result<(), StoreError>;
}

/// Observational side-effect hooks (toasts and the like). They must not
/// affect control flow.
pub trait CrudHooks: Send + Sync {
    fn on_create_success(&self) {}
    fn on_update_success(&self) {}
    fn on_delete_success(&self) {}
    fn on_error(&self, _error: &CrudError) {}
}

/// Hooks that do nothing.
pub struct NoHooks;

impl CrudHooks for NoHooks {}

/// Access to the string document id the dialog protocol keys on.
pub trait Identified {
    fn id(&self) -> &str;
}

impl<M: db::models::Model> Identified for M {
    fn id(&self) -> &str {
        db::models::Model::id(self)
    }
}

/// Which interaction the dialog is running.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, serde::Deserialize, TS, EnumString, Display,
    Default,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum CrudMode {
    Create,
    Read,
    Update,
    Delete,
    #[default]
    None,
}

/// HTML input kind driving value coercion; only `Number` is special-cased.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, serde::Deserialize, TS, EnumString, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum InputType {
    Text,
    Number,
    Date,
    Select,
}

/// What a `handle_submit` call did. Failures never escape the controller;
/// the outcome is observational.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, TS, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SubmitOutcome {
    /// Mutation persisted, list refreshed, dialog closed.
    Saved,
    /// Validation errors recorded; dialog stays open.
    Invalid,
    /// Another submission is already in flight.
    Rejected,
    /// Store call failed; `on_error` fired and the dialog stays open.
    Failed,
    /// No active create/update/delete interaction.
    Ignored,
}

/// Authoritative state of one CRUD interaction.
#[derive(Debug, Clone, Serialize)]
pub struct CrudState<T> {
    pub is_dialog_open: bool,
    pub mode: CrudMode,
    pub current_entity: Option<T>,
    pub is_loading: bool,
}

impl<T> CrudState<T> {
    fn idle() -> Self {
        Self {
            is_dialog_open: false,
            mode: CrudMode::None,
            current_entity: None,
            is_loading: false,
        }
    }

    fn open(mode: CrudMode, current_entity: Option<T>) -> Self {
        Self {
            is_dialog_open: true,
            mode,
            current_entity,
            is_loading: false,
        }
    }
}

/// Form working copy plus per-field touch/error bookkeeping.
#[derive(Debug, Clone, Default, Serialize)]
pub struct FormState {
    pub values: FormValues,
    pub touched: BTreeSet<String>,
    pub errors: ValidationErrors,
}

impl FormState {
    fn seeded(values: FormValues) -> Self {
        Self {
            values,
            ..Self::default()
        }
    }
}

/// Configuration supplied at construction.
pub struct CrudConfig<T> {
    pub entity_name: String,
    /// Blank-record shape used to seed the form on create.
    pub default_entity: FormValues,
    pub gateway: Arc<dyn EntityGateway<T>>,
    pub validate: Option<Validator>,
    pub hooks: Arc<dyn CrudHooks>,
}

impl<T> CrudConfig<T> {
    pub fn new(
        entity_name: impl Into<String>,
        default_entity: FormValues,
        gateway: Arc<dyn EntityGateway<T>>,
    ) -> Self {
        Self {
            entity_name: entity_name.into(),
            default_entity,
            gateway,
            validate: None,
            hooks: Arc::new(NoHooks),
        }
    }

    pub fn with_validate(mut self, validate: Validator) -> Self {
        self.validate = Some(validate);
        self
    }

    pub fn with_hooks(mut self, hooks: Arc<dyn CrudHooks>) -> Self {
        self.hooks = hooks;
        self
    }
}

pub struct CrudController<T> {
    entity_name: String,
    default_entity: FormValues,
    gateway: Arc<dyn EntityGateway<T>>,
    validate: Option<Validator>,
    hooks: Arc<dyn CrudHooks>,
    state: CrudState<T>,
    form: FormState,
    /// Accepted form field names: the default-entity template keys, extended
    /// with the seeded entity's keys while editing.
    known_fields: BTreeSet<String>,
}

impl<T> CrudController<T>
where
    T: Identified + Serialize + Send + Sync,
{
    pub fn new(config: CrudConfig<T>) -> Self {
        let known_fields = config.default_entity.keys().cloned().collect();
        Self {
            entity_name: config.entity_name,
            default_entity: config.default_entity,
            gateway: config.gateway,
            validate: config.validate,
            hooks: config.hooks,
            state: CrudState::idle(),
            form: FormState::default(),
            known_fields,
        }
    }

    pub fn state(&self) -> &CrudState<T> {
        &self.state
    }

    pub fn form(&self) -> &FormState {
        &self.form
    }

    /// Open the dialog on a blank record.
    pub fn create_new(&mut self) {
        self.known_fields = self.default_entity.keys().cloned().collect();
        self.form = FormState::seeded(self.default_entity.clone());
        self.state = CrudState::open(CrudMode::Create, None);
    }

    /// Open the dialog seeded with an existing entity.
    pub fn edit(&mut self, entity: T) {
        let values = object_of(&entity);
        self.known_fields = self
            .default_entity
            .keys()
            .chain(values.keys())
            .cloned()
            .collect();
        self.form = FormState::seeded(values);
        self.state = CrudState::open(CrudMode::Update, Some(entity));
    }

    /// Open the confirmation dialog for deletion. The form is not touched.
    pub fn confirm_delete(&mut self, entity: T) {
        self.state = CrudState::open(CrudMode::Delete, Some(entity));
    }

    /// Close the dialog and drop the interaction. Mode and entity are reset
    /// here so a late submit cannot land on a stale reference.
    pub fn close_dialog(&mut self) {
        self.state = CrudState::idle();
    }

    /// Record one field edit. `Number` inputs map the empty string to null
    /// and parse everything else; other input kinds store the raw string.
    pub fn handle_change(
        &mut self,
        field: &str,
        raw: &str,
        input_type: InputType,
    ) -> Result<(), CrudError> {
        self.check_field(field)?;
        let value = match input_type {
            InputType::Number if raw.is_empty() => Value::Null,
            InputType::Number => parse_number(field, raw)?,
            _ => Value::String(raw.to_string()),
        };
        self.form.values.insert(field.to_string(), value);
        Ok(())
    }

    /// Mark a field as touched and, when a validator is configured, recompute
    /// the full error mapping from the current values.
    pub fn handle_blur(&mut self, field: &str) -> Result<(), CrudError> {
        self.check_field(field)?;
        self.form.touched.insert(field.to_string());
        if let Some(validate) = &self.validate {
            self.form.errors = validate(&self.form.values);
        }
        Ok(())
    }

    /// Run the submit protocol for the active mode.
    pub async fn handle_submit(&mut self) -> SubmitOutcome {
        if self.state.is_loading {
            warn!(
                entity = %self.entity_name,
                "submit rejected: another submission is in flight"
            );
            return SubmitOutcome::Rejected;
        }
        if !matches!(
            self.state.mode,
            CrudMode::Create | CrudMode::Update | CrudMode::Delete
        ) {
            return SubmitOutcome::Ignored;
        }

        // Make every validation message visible, even for untouched fields.
        self.form.touched = self.form.values.keys().cloned().collect();

        if let Some(validate) = &self.validate {
            self.form.errors = validate(&self.form.values);
            if !self.form.errors.is_empty() {
                return SubmitOutcome::Invalid;
            }
        }

        let data = normalize(&self.form.values);
        self.state.is_loading = true;

        match self.dispatch(data).await {
            Ok(()) => {
                self.state.is_loading = false;
                self.close_dialog();
                SubmitOutcome::Saved
            }
            Err(error) => {
                self.state.is_loading = false;
                warn!(entity = %self.entity_name, error = %error, "submit failed");
                self.hooks.on_error(&error);
                SubmitOutcome::Failed
            }
        }
    }

    /// Human-readable dialog title for the active mode.
    pub fn dialog_title(&self) -> String {
        match self.state.mode {
            CrudMode::Create => format!("Create {}", self.entity_name),
            CrudMode::Update => format!("Edit {}", self.entity_name),
            CrudMode::Delete => format!("Delete {}", self.entity_name),
            CrudMode::Read | CrudMode::None => self.entity_name.clone(),
        }
    }

    async fn dispatch(&self, data: FormValues) -> Result<(), CrudError> {
        match self.state.mode {
            CrudMode::Create => {
                self.gateway.create(data).await?;
                self.gateway.fetch().await?;
                self.hooks.on_create_success();
            }
            CrudMode::Update => {
                let id = self.current_id();
                self.gateway.update(&id, data).await?;
                self.gateway.fetch().await?;
                self.hooks.on_update_success();
            }
            CrudMode::Delete => {
                let id = self.current_id();
                if id.is_empty() {
                    return Err(CrudError::MissingId {
                        entity: self.entity_name.clone(),
                    });
                }
                info!(entity = %self.entity_name, id = %id, "deleting entity");
                self.gateway.delete(&id).await?;
                self.gateway.fetch().await?;
                self.hooks.on_delete_success();
            }
            CrudMode::Read | CrudMode::None => {}
        }
        Ok(())
    }

    fn current_id(&self) -> String {
        self.state
            .current_entity
            .as_ref()
            .map(|entity| entity.id().to_string())
            .unwrap_or_default()
    }

    fn check_field(&self, field: &str) -> Result<(), CrudError> {
        if self.known_fields.contains(field) {
            Ok(())
        } else {
            Err(CrudError::UnknownField {
                field: field.to_string(),
            })
        }
    }

    #[cfg(test)]
    fn force_loading(&mut self) {
        self.state.is_loading = true;
    }
}

fn parse_number(field: &str, raw: &str) -> Result<Value, CrudError> {
    if let Ok(int) = raw.parse::<i64>() {
        return Ok(Value::from(int));
    }
    raw.parse::<f64>()
        .ok()
        .and_then(serde_json::Number::from_f64)
        .map(Value::Number)
        .ok_or_else(|| CrudError::InvalidNumber {
            field: field.to_string(),
            raw: raw.to_string(),
        })
}

/// HTML inputs hand optional fields back as `""`; the store expects null.
fn normalize(values: &FormValues) -> FormValues {
    values
        .iter()
        .map(|(key, value)| {
            let value = match value {
                Value::String(s) if s.is_empty() => Value::Null,
                other => other.clone(),
            };
            (key.clone(), value)
        })
        .collect()
}

/// Build a form template (or seed) from any serializable record, typically a
/// model's `Create*` payload with `Default` values.
pub fn form_template<T: Serialize>(value: &T) -> FormValues {
    object_of(value)
}

fn object_of<T: Serialize>(entity: &T) -> FormValues {
    match serde_json::to_value(entity) {
        Ok(Value::Object(map)) => map,
        Ok(_) | Err(_) => {
            warn!("entity did not serialize to a JSON object; seeding an empty form");
            FormValues::new()
        }
    }
}
