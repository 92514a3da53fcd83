//! Privacy export delegation.
//!
//! Containers store no personal data themselves. A container placed on a
//! user's dashboard belongs to that user, and each child's data is exported
//! by the child type's own exporter, so this service only reports which
//! scopes to hand to whom.

use super::relationship_service::RelationshipError;
use crate::model::block::{ScopeId, ScopeLevel};
use crate::repo::block_repo::BlockRepository;
use crate::repo::scope_repo::ScopeRepository;
use std::collections::BTreeMap;

/// Privacy delegation facade.
pub struct PrivacyService<B: BlockRepository, S: ScopeRepository> {
    blocks: B,
    scopes: S,
}

impl<B: BlockRepository, S: ScopeRepository> PrivacyService<B, S> {
    pub fn new(blocks: B, scopes: S) -> Self {
        Self { blocks, scopes }
    }

    /// Block scopes of containers owned directly by the user's scope.
    pub fn containers_for_user(&self, user_key: &str) -> Result<Vec<ScopeId>, RelationshipError> {
        let Some(user_scope) = self.scopes.find_scope(ScopeLevel::User, user_key)? else {
            return Ok(Vec::new());
        };

        let mut container_scopes = Vec::new();
        for block in self.blocks.list_blocks_in_scope(user_scope.scope_uuid)? {
            if !block.is_container() {
                continue;
            }
            if let Some(scope) = self.scopes.block_scope(block.block_uuid)? {
                container_scopes.push(scope.scope_uuid);
            }
        }
        Ok(container_scopes)
    }

    /// Groups the children of the given container scopes by exporter
    /// component (`block_<type>`), keyed and ordered by component name.
    pub fn child_scopes_by_type(
        &self,
        container_scopes: &[ScopeId],
    ) -> Result<BTreeMap<String, Vec<ScopeId>>, RelationshipError> {
        let mut grouped: BTreeMap<String, Vec<ScopeId>> = BTreeMap::new();
        for container_scope in container_scopes {
            for child in self.blocks.list_blocks_in_scope(*container_scope)? {
                if let Some(scope) = self.scopes.block_scope(child.block_uuid)? {
                    grouped
                        .entry(format!("block_{}", child.block_type))
                        .or_default()
                        .push(scope.scope_uuid);
                }
            }
        }
        Ok(grouped)
    }
}
