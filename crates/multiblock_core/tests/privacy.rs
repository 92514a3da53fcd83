use multiblock_core::model::block::NewBlockInstance;
use multiblock_core::service::privacy_service::PrivacyService;
use multiblock_core::{
    open_db_in_memory, BlockInstance, BlockRepository, Placement, ScopeId, ScopeLevel,
    ScopeRepository, SqliteBlockRepository, SqliteScopeRepository,
};
use rusqlite::Connection;
use serde_json::json;

fn setup() -> Connection {
    open_db_in_memory().unwrap()
}

fn create_block(
    blocks: &SqliteBlockRepository<'_>,
    block_type: &str,
    parent_scope_uuid: ScopeId,
) -> BlockInstance {
    blocks
        .create_block(&NewBlockInstance {
            block_type: block_type.to_string(),
            parent_scope_uuid,
            placement: Placement::new("my-index", "content"),
            config: json!({}),
            append_weight: true,
        })
        .unwrap()
}

fn scope_of(scopes: &SqliteScopeRepository<'_>, block: &BlockInstance) -> ScopeId {
    scopes
        .block_scope(block.block_uuid)
        .unwrap()
        .unwrap()
        .scope_uuid
}

#[test]
fn unknown_user_owns_nothing() {
    let conn = setup();
    let privacy = PrivacyService::new(
        SqliteBlockRepository::try_new(&conn).unwrap(),
        SqliteScopeRepository::try_new(&conn).unwrap(),
    );

    assert!(privacy.containers_for_user("404").unwrap().is_empty());
    assert!(privacy.child_scopes_by_type(&[]).unwrap().is_empty());
}

#[test]
fn dashboard_containers_delegate_children_by_type() {
    let conn = setup();
    let blocks = SqliteBlockRepository::try_new(&conn).unwrap();
    let scopes = SqliteScopeRepository::try_new(&conn).unwrap();
    let system = scopes.create_scope(None, ScopeLevel::System, None).unwrap();
    let user = scopes
        .create_scope(Some(system.scope_uuid), ScopeLevel::User, Some("7"))
        .unwrap();
    let other_user = scopes
        .create_scope(Some(system.scope_uuid), ScopeLevel::User, Some("8"))
        .unwrap();

    let container = create_block(&blocks, "multiblock", user.scope_uuid);
    create_block(&blocks, "html", user.scope_uuid);
    create_block(&blocks, "multiblock", other_user.scope_uuid);
    let container_scope = scope_of(&scopes, &container);
    let note = create_block(&blocks, "html", container_scope);
    let calendar = create_block(&blocks, "calendar_month", container_scope);
    let nested = create_block(&blocks, "multiblock", container_scope);
    create_block(&blocks, "html", scope_of(&scopes, &nested));

    let privacy = PrivacyService::new(blocks, scopes);
    let owned = privacy.containers_for_user("7").unwrap();
    assert_eq!(owned, vec![container_scope]);

    let grouped = privacy.child_scopes_by_type(&owned).unwrap();
    assert_eq!(
        grouped.keys().map(String::as_str).collect::<Vec<_>>(),
        vec!["block_calendar_month", "block_html", "block_multiblock"]
    );
    let scopes = SqliteScopeRepository::try_new(&conn).unwrap();
    assert_eq!(grouped["block_html"], vec![scope_of(&scopes, &note)]);
    assert_eq!(
        grouped["block_calendar_month"],
        vec![scope_of(&scopes, &calendar)]
    );
    assert_eq!(grouped["block_multiblock"], vec![scope_of(&scopes, &nested)]);
}
