//! Container render model.
//!
//! # Responsibility
//! - Turn a container's ordered children into the item list a layout
//!   template consumes.
//!
//! # Invariants
//! - Items follow child listing order.
//! - Children the host cannot render are skipped and do not affect the
//!   odd/even stripe of the remaining items.
//! - Only the first item is marked active.

use crate::layout::LayoutRegistry;
use crate::model::block::{BlockId, BlockInstance, CONTAINER_DISPLAY_NAME};
use crate::repo::block_repo::BlockRepository;
use crate::repo::scope_repo::ScopeRepository;
use crate::service::relationship_service::{RelationshipError, RelationshipService};
use log::debug;
use serde::Serialize;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Output of rendering one child.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlockContent {
    pub title: String,
    pub text: String,
    pub footer: String,
}

/// Host capability that renders one child block.
pub trait BlockRenderer {
    /// Returns `None` when the block type is unknown to the host.
    fn render(&self, block: &BlockInstance) -> Option<BlockContent>;
}

/// One child as presented to the layout template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderItem {
    pub id: BlockId,
    /// `block_<type>`.
    pub class: String,
    #[serde(rename = "type")]
    pub block_type: String,
    pub is_odd: bool,
    pub active: bool,
    pub title: String,
    pub content: String,
    pub footer: String,
}

/// Template name plus items for one container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderModel {
    pub container_id: BlockId,
    /// Container's configured title, else `CONTAINER_DISPLAY_NAME`.
    pub title: String,
    pub layout_id: String,
    pub template: String,
    pub items: Vec<RenderItem>,
}

#[derive(Debug)]
pub enum RenderError {
    Relationship(RelationshipError),
    /// The layout registry is empty.
    NoLayout,
}

impl Display for RenderError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Relationship(err) => write!(f, "{err}"),
            Self::NoLayout => write!(f, "no layout registered"),
        }
    }
}

impl Error for RenderError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Relationship(err) => Some(err),
            Self::NoLayout => None,
        }
    }
}

impl From<RelationshipError> for RenderError {
    fn from(value: RelationshipError) -> Self {
        Self::Relationship(value)
    }
}

/// Builds the render model of one container.
pub fn build_render_model<B: BlockRepository, S: ScopeRepository>(
    relationships: &RelationshipService<B, S>,
    layouts: &LayoutRegistry,
    renderer: &dyn BlockRenderer,
    container_uuid: BlockId,
) -> Result<RenderModel, RenderError> {
    let container = relationships.get_container(container_uuid)?;
    let layout = layouts
        .resolve(container.presentation())
        .ok_or(RenderError::NoLayout)?;

    let mut items = Vec::new();
    for child in relationships.list_children(container_uuid)? {
        let Some(content) = renderer.render(&child) else {
            debug!(
                "event=render_child module=render status=skipped child={} block_type={}",
                child.block_uuid, child.block_type
            );
            continue;
        };
        let index = items.len();
        items.push(RenderItem {
            id: child.block_uuid,
            class: format!("block_{}", child.block_type),
            block_type: child.block_type,
            is_odd: index % 2 == 0,
            active: index == 0,
            title: content.title,
            content: content.text,
            footer: content.footer,
        });
    }

    Ok(RenderModel {
        container_id: container_uuid,
        title: container
            .title()
            .unwrap_or(CONTAINER_DISPLAY_NAME)
            .to_string(),
        layout_id: layout.id.clone(),
        template: layout.template.clone(),
        items,
    })
}
