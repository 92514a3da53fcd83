//! Child configuration use-case service.
//!
//! # Invariants
//! - When the container's layout requires titles, a child is never saved
//!   with a blank title.
//! - Config is a JSON object.

use super::relationship_service::{RelationshipError, RelationshipService};
use crate::form::{FormFieldError, FormRegistry};
use crate::layout::LayoutRegistry;
use crate::model::block::{BlockId, BlockInstance};
use crate::repo::block_repo::BlockRepository;
use crate::repo::scope_repo::ScopeRepository;
use log::info;
use serde_json::Value;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Errors from child configuration.
#[derive(Debug)]
pub enum ChildConfigError {
    Relationship(RelationshipError),
    ConfigNotObject,
    /// The container's layout needs a title on every child.
    TitleRequired { layout_id: String },
    /// The block type's form rejected the config.
    Rejected(Vec<FormFieldError>),
}

impl Display for ChildConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Relationship(err) => write!(f, "{err}"),
            Self::ConfigNotObject => write!(f, "child config must be a JSON object"),
            Self::TitleRequired { layout_id } => {
                write!(f, "layout `{layout_id}` requires a title on every child")
            }
            Self::Rejected(errors) => {
                let joined = errors
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join("; ");
                write!(f, "child config rejected: {joined}")
            }
        }
    }
}

impl Error for ChildConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Relationship(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RelationshipError> for ChildConfigError {
    fn from(value: RelationshipError) -> Self {
        Self::Relationship(value)
    }
}

/// Saves child configs against the container's layout and the child's form.
pub struct ChildConfigService<'a, B: BlockRepository, S: ScopeRepository> {
    relationships: &'a RelationshipService<B, S>,
    layouts: &'a LayoutRegistry,
    forms: &'a FormRegistry,
}

impl<'a, B: BlockRepository, S: ScopeRepository> ChildConfigService<'a, B, S> {
    pub fn new(
        relationships: &'a RelationshipService<B, S>,
        layouts: &'a LayoutRegistry,
        forms: &'a FormRegistry,
    ) -> Self {
        Self {
            relationships,
            layouts,
            forms,
        }
    }

    /// Validates and stores one child's config.
    pub fn configure_child(
        &self,
        container_uuid: BlockId,
        child_uuid: BlockId,
        config: Value,
    ) -> Result<BlockInstance, ChildConfigError> {
        let container = self.relationships.get_container(container_uuid)?;
        let children = self.relationships.list_children(container_uuid)?;
        let child = children
            .into_iter()
            .find(|child| child.block_uuid == child_uuid)
            .ok_or(RelationshipError::ChildNotInContainer {
                child_uuid,
                container_uuid,
            })?;

        if !config.is_object() {
            return Err(ChildConfigError::ConfigNotObject);
        }

        if let Some(layout) = self.layouts.resolve(container.presentation()) {
            let has_title = config
                .get("title")
                .and_then(Value::as_str)
                .is_some_and(|title| !title.trim().is_empty());
            if layout.requires_title && !has_title {
                return Err(ChildConfigError::TitleRequired {
                    layout_id: layout.id.clone(),
                });
            }
        }

        if let Some(form) = self.forms.get(&child.block_type) {
            form.validate(&config).map_err(ChildConfigError::Rejected)?;
        }

        self.relationships
            .blocks()
            .update_config(child_uuid, &config)
            .map_err(RelationshipError::from)?;
        info!(
            "event=child_configure module=child_config status=ok child={} container={} block_type={}",
            child_uuid, container_uuid, child.block_type
        );
        self.relationships
            .get_block(child_uuid)
            .map_err(Into::into)
    }
}
