//! Per-type child configuration form contracts.
//!
//! Each block type may register one form that validates the config a child of
//! that type is saved with. Types without a form accept any JSON object.

use crate::model::block::is_valid_block_type;
use serde_json::Value;
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

/// One rejected field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormFieldError {
    pub field: String,
    pub message: String,
}

impl FormFieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl Display for FormFieldError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validation capability owned by one block type.
pub trait SubBlockConfigForm: Send + Sync {
    fn block_type(&self) -> &str;
    /// Checks `config` as submitted for a child of this type.
    fn validate(&self, config: &Value) -> Result<(), Vec<FormFieldError>>;
}

/// Form registration errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormRegistryError {
    InvalidBlockType(String),
    DuplicateBlockType(String),
}

impl Display for FormRegistryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidBlockType(value) => write!(f, "form block type is invalid: {value}"),
            Self::DuplicateBlockType(value) => {
                write!(f, "form already registered for block type: {value}")
            }
        }
    }
}

impl Error for FormRegistryError {}

/// Registered forms keyed by block type.
#[derive(Default)]
pub struct FormRegistry {
    forms: BTreeMap<String, Arc<dyn SubBlockConfigForm>>,
}

impl FormRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, form: Arc<dyn SubBlockConfigForm>) -> Result<(), FormRegistryError> {
        let block_type = form.block_type().trim().to_string();
        if !is_valid_block_type(&block_type) {
            return Err(FormRegistryError::InvalidBlockType(block_type));
        }
        if self.forms.contains_key(&block_type) {
            return Err(FormRegistryError::DuplicateBlockType(block_type));
        }
        self.forms.insert(block_type, form);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.forms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.forms.is_empty()
    }

    pub fn get(&self, block_type: &str) -> Option<Arc<dyn SubBlockConfigForm>> {
        self.forms.get(block_type).cloned()
    }
}
