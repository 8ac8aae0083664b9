use pm_core::{ChildInput, Main, MainPatch, TableInput, ToolInput, now_ms, parse_rfc3339_ms};
use pm_storage::{
    CancelToken, CreateMainRequest, DeleteMainRequest, GetMainRequest, SqliteStore,
    UpdateMainRequest,
};
use tempfile::TempDir;

fn open_store() -> (TempDir, SqliteStore) {
    let dir = tempfile::tempdir().expect("temp dir must be creatable");
    let store = SqliteStore::open(dir.path()).expect("fresh storage should open");
    (dir, store)
}

fn create_tool_main(store: &mut SqliteStore) -> Main {
    store
        .create_main(
            &CancelToken::new(),
            CreateMainRequest {
                title: "Workshop A".to_string(),
                child: ChildInput::Tool(ToolInput {
                    title: "Hammer".to_string(),
                    description: None,
                }),
            },
        )
        .expect("main should be created")
}

fn get(store: &SqliteStore, id: i64, include_deleted: bool) -> Option<Main> {
    store
        .get_main(
            &CancelToken::new(),
            GetMainRequest {
                id,
                include_deleted,
            },
        )
        .expect("get should succeed")
}

#[test]
fn title_update_round_trips_and_advances_updated_at() {
    let (_dir, mut store) = open_store();
    let main = create_tool_main(&mut store);

    let updated = store
        .update_main(
            &CancelToken::new(),
            UpdateMainRequest {
                id: main.id,
                patch: MainPatch {
                    title: Some("X".to_string()),
                    deleted_at: None,
                },
            },
        )
        .expect("update should succeed");
    assert_eq!(updated.title, "X");
    assert!(updated.updated_at_ms > main.updated_at_ms);

    let fetched = get(&store, main.id, false).expect("main stays visible");
    assert_eq!(fetched, updated);
    assert_eq!(fetched.child_kind, main.child_kind);
    assert_eq!(fetched.child_id, main.child_id);
    assert_eq!(fetched.created_at_ms, main.created_at_ms);
    assert!(fetched.deleted_at_ms.is_none());
}

#[test]
fn every_update_strictly_advances_updated_at() {
    let (_dir, mut store) = open_store();
    let main = create_tool_main(&mut store);
    let cancel = CancelToken::new();

    let mut previous = main.updated_at_ms;
    for _ in 0..3 {
        let updated = store
            .update_main(
                &cancel,
                UpdateMainRequest {
                    id: main.id,
                    patch: MainPatch::default(),
                },
            )
            .expect("empty patch should still succeed");
        assert!(updated.updated_at_ms > previous);
        assert_eq!(updated.title, main.title);
        previous = updated.updated_at_ms;
    }
}

#[test]
fn malformed_deleted_at_is_rejected_before_any_write() {
    let (_dir, mut store) = open_store();
    let main = create_tool_main(&mut store);

    let err = store
        .update_main(
            &CancelToken::new(),
            UpdateMainRequest {
                id: main.id,
                patch: MainPatch {
                    title: Some("never applied".to_string()),
                    deleted_at: Some("yesterday".to_string()),
                },
            },
        )
        .expect_err("bad timestamp must fail");
    assert_eq!(err.code(), "INVALID_ARGUMENT");
    assert!(err.to_string().contains("yesterday"));

    let unchanged = get(&store, main.id, false).expect("main stays visible");
    assert_eq!(unchanged, main);
}

#[test]
fn deleted_at_patch_hides_main_and_marks_child() {
    let (_dir, mut store) = open_store();
    let cancel = CancelToken::new();
    let main = store
        .create_main(
            &cancel,
            CreateMainRequest {
                title: "Dining".to_string(),
                child: ChildInput::Table(TableInput {
                    name: "Oak".to_string(),
                }),
            },
        )
        .expect("main should be created");

    let updated = store
        .update_main(
            &cancel,
            UpdateMainRequest {
                id: main.id,
                patch: MainPatch {
                    title: None,
                    deleted_at: Some("2024-05-01T12:00:00+02:00".to_string()),
                },
            },
        )
        .expect("update should succeed");
    assert_eq!(updated.deleted_at_ms, Some(1_714_557_600_000));

    assert!(get(&store, main.id, false).is_none());
    let table = store
        .resolver(updated)
        .table(&cancel)
        .expect("table lookup should succeed")
        .expect("table must exist");
    assert_eq!(table.deleted_at_ms, Some(1_714_557_600_000));

    let again = store
        .delete_main(&cancel, DeleteMainRequest { id: main.id })
        .expect("delete should succeed");
    assert!(!again, "main was already deleted through the patch");
}

#[test]
fn future_deleted_at_does_not_drag_updated_at_forward() {
    let (_dir, mut store) = open_store();
    let cancel = CancelToken::new();
    let main = create_tool_main(&mut store);
    let future = "2999-01-01T00:00:00Z";
    let future_ms = parse_rfc3339_ms(future).expect("valid timestamp");

    let updated = store
        .update_main(
            &cancel,
            UpdateMainRequest {
                id: main.id,
                patch: MainPatch {
                    title: None,
                    deleted_at: Some(future.to_string()),
                },
            },
        )
        .expect("update should succeed");
    let after_ms = now_ms();
    assert_eq!(updated.deleted_at_ms, Some(future_ms));
    assert!(updated.updated_at_ms > main.updated_at_ms);
    assert!(updated.updated_at_ms <= after_ms);

    let tool = store
        .resolver(updated)
        .tool(&cancel)
        .expect("tool lookup should succeed")
        .expect("tool must exist");
    assert_eq!(tool.deleted_at_ms, Some(future_ms));
    assert!(tool.updated_at_ms > main.updated_at_ms);
    assert!(tool.updated_at_ms <= after_ms);
}

#[test]
fn updating_unknown_main_is_not_found() {
    let (_dir, mut store) = open_store();
    let err = store
        .update_main(
            &CancelToken::new(),
            UpdateMainRequest {
                id: 12,
                patch: MainPatch {
                    title: Some("ghost".to_string()),
                    deleted_at: None,
                },
            },
        )
        .expect_err("unknown id must fail");
    assert_eq!(err.code(), "NOT_FOUND");
}
