use multiblock_core::backup::{
    BackupArchive, BackupError, BackupPlan, BackupTaskKind, ResequenceOutcome, RestorePlan,
    RestoreTask, RestoreTaskKind, TaskUnit,
};
use multiblock_core::db::open_db_in_memory;
use multiblock_core::model::block::{BlockPosition, NewBlockInstance};
use multiblock_core::repo::block_repo::ChildRelocation;
use multiblock_core::{
    BlockId, BlockInstance, BlockRepository, Placement, RelationshipService, Scope, ScopeId,
    ScopeLevel, ScopeRepository, SqliteBlockRepository, SqliteScopeRepository, StoreError,
    StoreResult,
};
use proptest::prelude::*;
use rusqlite::Connection;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use uuid::Uuid;

fn setup() -> Connection {
    open_db_in_memory().unwrap()
}

fn course(scopes: &SqliteScopeRepository<'_>, key: &str) -> Scope {
    scopes
        .create_scope(None, ScopeLevel::Course, Some(key))
        .unwrap()
}

fn create_block(
    blocks: &impl BlockRepository,
    scope: &Scope,
    block_type: &str,
) -> BlockInstance {
    blocks
        .create_block(&NewBlockInstance {
            block_type: block_type.to_string(),
            parent_scope_uuid: scope.scope_uuid,
            placement: Placement::new("course-view-*", "side-pre"),
            config: json!({ "title": block_type }),
            append_weight: true,
        })
        .unwrap()
}

struct Tree {
    container: BlockInstance,
    inner: BlockInstance,
    plain: BlockInstance,
}

/// Course with one container holding `html`, a nested container holding
/// `calendar_month`, and a plain block beside the container.
fn build_tree<B: BlockRepository, S: ScopeRepository>(
    service: &RelationshipService<B, S>,
    scope: &Scope,
) -> Tree {
    let container = create_block(service.blocks(), scope, "multiblock");
    service
        .add_child(container.block_uuid, "html", json!({}))
        .unwrap();
    let inner = create_block(service.blocks(), scope, "multiblock");
    service
        .move_child_into(inner.block_uuid, container.block_uuid)
        .unwrap();
    service
        .add_child(inner.block_uuid, "calendar_month", json!({}))
        .unwrap();
    let plain = create_block(service.blocks(), scope, "html");
    Tree {
        container,
        inner,
        plain,
    }
}

#[test]
fn backup_expands_progress_by_every_nested_child() {
    let conn = setup();
    let scopes = SqliteScopeRepository::try_new(&conn).unwrap();
    let scope = course(&scopes, "1");
    let service = RelationshipService::new(SqliteBlockRepository::try_new(&conn).unwrap(), scopes);
    let tree = build_tree(&service, &scope);

    let mut plan = BackupPlan::new();
    plan.add_block(&tree.container);
    plan.add_block(&tree.plain);
    plan.execute(&service).unwrap();

    assert_eq!(plan.progress().last_stage_max(), Some(2 + 3));
    assert_eq!(plan.progress().last_stage_current(), Some(5));
    assert!(plan.tasks().iter().all(|task| task.executed));
    assert_eq!(plan.tasks()[2].container_uuid, Some(tree.container.block_uuid));
    assert!(plan.tasks().iter().all(|task| task.file_areas().is_empty()
        && task.configdata_encoded_attributes().is_empty()
        && task.settings().is_empty()));

    let archive = plan.into_archive();
    let types = archive
        .records
        .iter()
        .map(|record| record.block.block_type.as_str())
        .collect::<Vec<_>>();
    assert_eq!(
        types,
        vec!["multiblock", "html", "multiblock", "calendar_month", "html"]
    );
    assert_eq!(archive.records[2].block.block_uuid, tree.inner.block_uuid);
    assert_eq!(archive.records[3].container_uuid, Some(tree.inner.block_uuid));
}

#[test]
fn backup_of_plain_block_adds_no_units() {
    let conn = setup();
    let scopes = SqliteScopeRepository::try_new(&conn).unwrap();
    let scope = course(&scopes, "1");
    let service = RelationshipService::new(SqliteBlockRepository::try_new(&conn).unwrap(), scopes);
    let plain = create_block(service.blocks(), &scope, "html");

    let mut plan = BackupPlan::new();
    plan.add_block(&plain);
    plan.execute(&service).unwrap();

    assert_eq!(plan.tasks().len(), 1);
    assert_eq!(plan.tasks()[0].kind, BackupTaskKind::Block);
    assert_eq!(plan.progress().last_stage_max(), Some(1));
}

/// Block repository that fails to load one block.
struct FailingBlocks<'conn> {
    inner: SqliteBlockRepository<'conn>,
    fail_on: BlockId,
}

impl BlockRepository for FailingBlocks<'_> {
    fn create_block(&self, block: &NewBlockInstance) -> StoreResult<BlockInstance> {
        self.inner.create_block(block)
    }

    fn get_block(&self, block_uuid: BlockId) -> StoreResult<Option<BlockInstance>> {
        if block_uuid == self.fail_on {
            return Err(StoreError::InvalidData("simulated read failure".to_string()));
        }
        self.inner.get_block(block_uuid)
    }

    fn list_blocks_in_scope(&self, scope_uuid: ScopeId) -> StoreResult<Vec<BlockInstance>> {
        self.inner.list_blocks_in_scope(scope_uuid)
    }

    fn list_blocks_of_type(&self, block_type: &str) -> StoreResult<Vec<BlockInstance>> {
        self.inner.list_blocks_of_type(block_type)
    }

    fn next_weight(&self, scope_uuid: ScopeId) -> StoreResult<i64> {
        self.inner.next_weight(scope_uuid)
    }

    fn update_weights(&self, weights: &[(BlockId, i64)]) -> StoreResult<()> {
        self.inner.update_weights(weights)
    }

    fn update_config(&self, block_uuid: BlockId, config: &Value) -> StoreResult<()> {
        self.inner.update_config(block_uuid, config)
    }

    fn list_positions(&self, block_uuid: BlockId) -> StoreResult<Vec<BlockPosition>> {
        self.inner.list_positions(block_uuid)
    }

    fn list_positions_in_scope(
        &self,
        block_uuid: BlockId,
        scope_uuid: ScopeId,
    ) -> StoreResult<Vec<BlockPosition>> {
        self.inner.list_positions_in_scope(block_uuid, scope_uuid)
    }

    fn insert_position(&self, position: &BlockPosition) -> StoreResult<()> {
        self.inner.insert_position(position)
    }

    fn relocate_child(&self, relocation: &ChildRelocation) -> StoreResult<BlockInstance> {
        self.inner.relocate_child(relocation)
    }

    fn relocate_children(&self, relocations: &[ChildRelocation]) -> StoreResult<()> {
        self.inner.relocate_children(relocations)
    }

    fn dissolve_container(
        &self,
        container_uuid: BlockId,
        relocations: &[ChildRelocation],
    ) -> StoreResult<()> {
        self.inner.dissolve_container(container_uuid, relocations)
    }

    fn delete_block_tree(&self, block_uuid: BlockId) -> StoreResult<usize> {
        self.inner.delete_block_tree(block_uuid)
    }
}

#[test]
fn child_failure_aborts_whole_backup() {
    let conn = setup();
    let scopes = SqliteScopeRepository::try_new(&conn).unwrap();
    let scope = course(&scopes, "1");
    let setup_service =
        RelationshipService::new(SqliteBlockRepository::try_new(&conn).unwrap(), scopes);
    let tree = build_tree(&setup_service, &scope);
    let broken_child = setup_service
        .list_children(tree.inner.block_uuid)
        .unwrap()
        .remove(0);

    let service = RelationshipService::new(
        FailingBlocks {
            inner: SqliteBlockRepository::try_new(&conn).unwrap(),
            fail_on: broken_child.block_uuid,
        },
        SqliteScopeRepository::try_new(&conn).unwrap(),
    );
    let mut plan = BackupPlan::new();
    plan.add_block(&tree.container);
    plan.add_block(&tree.plain);

    let err = plan.execute(&service).unwrap_err();
    match err {
        BackupError::ChildFailed {
            container_uuid,
            source,
            ..
        } => {
            assert_eq!(container_uuid, tree.container.block_uuid);
            assert!(matches!(
                *source,
                BackupError::ChildFailed { child_uuid, .. } if child_uuid == broken_child.block_uuid
            ));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(!plan.tasks()[1].executed, "plain block must not run after a failure");
}

#[test]
fn restore_splices_container_before_first_plain_block() {
    let mut plan = RestorePlan::new();
    plan.add_task(RestoreTask::structural("A"));
    plan.add_task(RestoreTask::container("B", Uuid::new_v4()));
    plan.add_task(RestoreTask::block("X", Uuid::new_v4()));

    let outcome = plan.add_task(RestoreTask::container("M", Uuid::new_v4()));

    assert_eq!(outcome, Some(ResequenceOutcome::Spliced(2)));
    let labels = plan
        .tasks()
        .iter()
        .map(|task| task.label.as_str())
        .collect::<Vec<_>>();
    assert_eq!(labels, vec!["A", "B", "M", "X"]);
}

#[test]
fn restore_keeps_container_last_without_plain_blocks() {
    let mut plan = RestorePlan::new();
    plan.add_task(RestoreTask::structural("root"));
    plan.add_task(RestoreTask::structural("course"));

    let outcome = plan.add_task(RestoreTask::container("M", Uuid::new_v4()));

    assert_eq!(outcome, Some(ResequenceOutcome::Tail));
    assert_eq!(plan.tasks().last().map(|task| task.label.as_str()), Some("M"));
}

fn kind_strategy() -> impl Strategy<Value = RestoreTaskKind> {
    prop_oneof![
        Just(RestoreTaskKind::Structural),
        Just(RestoreTaskKind::Block),
        Just(RestoreTaskKind::Container),
    ]
}

proptest! {
    #[test]
    fn containers_precede_every_earlier_plain_block(
        kinds in prop::collection::vec(kind_strategy(), 0..16),
    ) {
        let mut plan = RestorePlan::new();
        for (order, kind) in kinds.iter().enumerate() {
            let label = order.to_string();
            let task = match kind {
                RestoreTaskKind::Structural => RestoreTask::structural(label),
                RestoreTaskKind::Block => RestoreTask::block(label, Uuid::new_v4()),
                RestoreTaskKind::Container => RestoreTask::container(label, Uuid::new_v4()),
            };
            plan.add_task(task);
        }

        let placed = plan
            .tasks()
            .iter()
            .map(|task| (task.label.parse::<usize>().unwrap(), task.kind))
            .collect::<Vec<_>>();
        prop_assert_eq!(placed.len(), kinds.len());

        for (container_pos, (container_order, kind)) in placed.iter().enumerate() {
            if *kind != RestoreTaskKind::Container {
                continue;
            }
            for (block_pos, (block_order, other)) in placed.iter().enumerate() {
                if *other == RestoreTaskKind::Block && block_order < container_order {
                    prop_assert!(container_pos < block_pos);
                }
            }
        }

        let non_containers = placed
            .iter()
            .filter(|(_, kind)| *kind != RestoreTaskKind::Container)
            .map(|(order, _)| *order)
            .collect::<Vec<_>>();
        let mut sorted = non_containers.clone();
        sorted.sort_unstable();
        prop_assert_eq!(non_containers, sorted);
    }
}

#[test]
fn archive_restores_into_new_course_in_order() {
    let conn = setup();
    let scopes = SqliteScopeRepository::try_new(&conn).unwrap();
    let source_course = course(&scopes, "1");
    let target_course = course(&scopes, "2");
    let service = RelationshipService::new(SqliteBlockRepository::try_new(&conn).unwrap(), scopes);
    let tree = build_tree(&service, &source_course);

    let mut backup = BackupPlan::new();
    backup.add_block(&tree.container);
    backup.add_block(&tree.plain);
    backup.execute(&service).unwrap();
    let encoded = serde_json::to_string(&backup.into_archive()).unwrap();
    let archive: BackupArchive = serde_json::from_str(&encoded).unwrap();

    let plan = archive.restore_plan();
    let kinds = plan.tasks().iter().map(|task| task.kind).collect::<Vec<_>>();
    assert_eq!(
        kinds,
        vec![
            RestoreTaskKind::Structural,
            RestoreTaskKind::Container,
            RestoreTaskKind::Container,
            RestoreTaskKind::Block,
            RestoreTaskKind::Block,
            RestoreTaskKind::Block,
        ]
    );

    let scope_map = BTreeMap::from([(source_course.scope_uuid, target_course.scope_uuid)]);
    let summary = plan
        .execute(&archive, service.blocks(), service.scopes(), &scope_map)
        .unwrap();
    assert_eq!(summary.restored.len(), 5);

    let restored_container = summary.restored[&tree.container.block_uuid];
    let children = service.list_children(restored_container).unwrap();
    let types = children
        .iter()
        .map(|child| child.block_type.as_str())
        .collect::<Vec<_>>();
    assert_eq!(types, vec!["html", "multiblock"]);
    let restored_inner = summary.restored[&tree.inner.block_uuid];
    assert_eq!(service.list_children(restored_inner).unwrap().len(), 1);
    assert_eq!(
        service
            .find_nearest_noncontainer_ancestor(restored_inner)
            .unwrap()
            .scope_uuid,
        target_course.scope_uuid
    );
}
