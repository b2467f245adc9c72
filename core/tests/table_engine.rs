// core/tests/table_engine.rs
//
// End-to-end tests through the manager with the reference table engine.
//
// Tests cover:
// - Typing, committing and destroying a session
// - Catalog after building an index
// - Bad schema config surfaces as an engine failure
// - Candidate delete hides a phrase
// - Snapshot JSON shape
// - Learned phrases persisted by maintenance across managers (DirFs)

mod common;

use std::sync::Arc;

use common::LUNA_CONFIG;
use imegate_core::keys::{key_code, keysym};
use imegate_core::table::TableEngineFactory;
use imegate_core::{
    CandidateOp, DirFs, EngineManager, FileSystem, GateConfig, GateError, LogSink, MemoryFs,
    SchemaDescriptor, Session,
};

async fn ready_manager(fs: Arc<dyn FileSystem>) -> EngineManager {
    let manager = EngineManager::new(TableEngineFactory::new(), GateConfig::default());
    manager.initialize(LogSink::tracing(), fs).await.unwrap();
    manager
}

async fn type_text(session: &Session, text: &str) {
    for ch in text.chars() {
        assert!(session.process_key(key_code(ch), 0).await.unwrap());
    }
}

#[tokio::test]
async fn test_type_commit_destroy() {
    common::init_tracing();
    let manager = ready_manager(Arc::new(MemoryFs::new())).await;
    let session = manager
        .create_session("luna_pinyin_simp", LUNA_CONFIG)
        .await
        .unwrap();

    assert!(session.process_key(key_code('n'), 0).await.unwrap());
    let ctx = session.get_context().await.unwrap();
    assert_eq!(ctx.composition.preedit, "n");
    assert!(!ctx.menu.candidates.is_empty());
    assert!(session.get_status().await.unwrap().is_composing);

    assert!(session.process_key(key_code(' '), 0).await.unwrap());
    let commit = session.get_commit().await.unwrap();
    assert!(!commit.is_empty());
    assert_eq!(commit.text, "你");
    // Consumed by the first read.
    assert!(session.get_commit().await.unwrap().is_empty());
    assert_eq!(
        session.get_current_schema().await.unwrap(),
        "luna_pinyin_simp"
    );

    session.destroy().await.unwrap();
    assert!(matches!(
        session.process_key(key_code('n'), 0).await,
        Err(GateError::SessionDestroyed)
    ));
    manager.destroy().await.unwrap();
}

#[tokio::test]
async fn test_clear_composition_and_unhandled_keys() {
    let manager = ready_manager(Arc::new(MemoryFs::new())).await;
    let session = manager
        .create_session("luna_pinyin_simp", LUNA_CONFIG)
        .await
        .unwrap();

    // Nothing to edit yet.
    assert!(!session.process_key(keysym::BACKSPACE, 0).await.unwrap());

    type_text(&session, "nihao").await;
    session.clear_composition().await.unwrap();
    let ctx = session.get_context().await.unwrap();
    assert!(!ctx.has_visible_state());
    assert!(session.get_commit().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_catalog_after_rebuild() {
    let manager = ready_manager(Arc::new(MemoryFs::new())).await;
    assert!(manager.list_schemas().await.unwrap().is_empty());

    manager
        .rebuild_index("luna_pinyin_simp", LUNA_CONFIG)
        .await
        .unwrap();
    assert_eq!(
        manager.list_schemas().await.unwrap(),
        vec![SchemaDescriptor::new(
            "luna_pinyin_simp",
            "Luna Pinyin (simplified)"
        )]
    );
}

#[tokio::test]
async fn test_bad_schema_config() {
    let manager = ready_manager(Arc::new(MemoryFs::new())).await;

    let err = manager
        .rebuild_index("luna_pinyin_simp", "[schema]\nid = ")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        GateError::EngineOperationFailed {
            operation: "rebuild_index",
            ..
        }
    ));

    // Config declares a different schema id.
    let err = manager
        .create_session("cangjie5", LUNA_CONFIG)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        GateError::EngineOperationFailed {
            operation: "create_session",
            ..
        }
    ));

    // Empty id: the engine hands back no session.
    assert!(manager.create_session("", LUNA_CONFIG).await.is_err());
    assert_eq!(manager.live_sessions().await.unwrap(), 0);
}

#[tokio::test]
async fn test_candidate_delete_hides_phrase() {
    let manager = ready_manager(Arc::new(MemoryFs::new())).await;
    let session = manager
        .create_session("luna_pinyin_simp", LUNA_CONFIG)
        .await
        .unwrap();

    type_text(&session, "wo").await;
    session
        .action_candidate_on_current_page(0, CandidateOp::Delete)
        .await
        .unwrap();
    let ctx = session.get_context().await.unwrap();
    let texts: Vec<&str> = ctx.menu.candidates.iter().map(|c| c.text.as_str()).collect();
    assert_eq!(texts, vec!["窝"]);

    // Out of range on the current page.
    let err = session
        .action_candidate_on_current_page(3, CandidateOp::Select)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        GateError::CandidateActionFailed {
            index: 3,
            op: CandidateOp::Select
        }
    ));

    session.action_candidate_named(0, "select").await.unwrap();
    assert_eq!(session.get_commit().await.unwrap().text, "窝");
}

#[tokio::test]
async fn test_context_json_shape() {
    let manager = ready_manager(Arc::new(MemoryFs::new())).await;
    let session = manager
        .create_session("luna_pinyin_simp", LUNA_CONFIG)
        .await
        .unwrap();
    type_text(&session, "ni").await;

    let json = serde_json::to_value(session.get_context().await.unwrap()).unwrap();
    assert_eq!(json["composition"]["preedit"], "ni");
    assert_eq!(json["menu"]["pageSize"], 5);
    assert_eq!(json["menu"]["candidates"][0]["text"], "你");
    assert_eq!(json["commitTextPreview"], "你");
}

#[tokio::test]
async fn test_learning_persists_on_disk() {
    let root = std::env::temp_dir().join(format!("imegate-test-{}", std::process::id()));
    let _ = std::fs::remove_dir_all(&root);

    {
        let manager = ready_manager(Arc::new(DirFs::new(root.clone()))).await;
        let session = manager
            .create_session("luna_pinyin_simp", LUNA_CONFIG)
            .await
            .unwrap();
        type_text(&session, "ni").await;
        // Pick the second candidate so ranking changes.
        session
            .action_candidate_on_current_page(1, CandidateOp::Select)
            .await
            .unwrap();
        assert_eq!(session.get_commit().await.unwrap().text, "尼");
        manager.perform_maintenance().await.unwrap();
        session.destroy().await.unwrap();
        manager.destroy().await.unwrap();
    }
    assert!(root.join("user/luna_pinyin_simp.userdb.bin").exists());
    assert!(root.join("build/luna_pinyin_simp.prism.fst").exists());

    let manager = ready_manager(Arc::new(DirFs::new(root.clone()))).await;
    let session = manager
        .create_session("luna_pinyin_simp", LUNA_CONFIG)
        .await
        .unwrap();
    type_text(&session, "ni").await;
    let ctx = session.get_context().await.unwrap();
    assert_eq!(ctx.menu.candidates[0].text, "尼");
    manager.destroy().await.unwrap();

    let _ = std::fs::remove_dir_all(&root);
}
