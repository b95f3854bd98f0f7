use geolens_core::config::ModelSelection;
use geolens_core::session::{
    DeleteOutcome, Message, MessagePart, SessionCatalog, SessionStore, ToolDataUpdate,
};
use geolens_core::transport::ToolCompletionSink;
use geolens_core::types::{SessionId, ToolCallId};
use proptest::prelude::*;
use serde_json::{Value, json};
use tempfile::TempDir;

fn selection() -> ModelSelection {
    ModelSelection::new("openai", "gpt-4.1-mini")
}

fn object(value: Value) -> serde_json::Map<String, Value> {
    match value {
        Value::Object(map) => map,
        other => panic!("expected object, got {other}"),
    }
}

#[test]
fn tool_data_updater_merges_over_previous_entry() {
    let store = SessionStore::new(selection());
    let session_id = store.current_session_id();
    let t1 = ToolCallId::from("t1");

    assert!(store.record_tool_completion(
        &session_id,
        &t1,
        ToolDataUpdate::replace(object(json!({"x": 1}))),
    ));
    assert!(store.record_tool_completion(
        &session_id,
        &t1,
        ToolDataUpdate::update(|mut previous| {
            previous.insert("y".into(), json!(2));
            previous
        }),
    ));

    assert_eq!(
        store.tool_data(&session_id, &t1),
        Some(object(json!({"x": 1, "y": 2})))
    );
}

#[test]
fn tool_data_is_scoped_per_session() {
    let store = SessionStore::new(selection());
    let first = store.current_session_id();
    let second = store.create_session(None, selection());
    let t1 = ToolCallId::from("t1");

    store.record_tool_completion(&first, &t1, ToolDataUpdate::merge(object(json!({"a": 1}))));
    assert!(store.tool_data(&second, &t1).is_none());
    assert!(!store.record_tool_completion(
        &SessionId::from("missing"),
        &t1,
        ToolDataUpdate::merge(object(json!({"a": 1}))),
    ));
}

#[test]
fn tool_data_survives_finish_commit() {
    let store = SessionStore::new(selection());
    let session_id = store.current_session_id();
    let t1 = ToolCallId::from("t1");
    store.record_tool_completion(&session_id, &t1, ToolDataUpdate::merge(object(json!({"k": 8}))));

    store.commit_finish(
        &session_id,
        vec![
            Message::user("Q").with_id("u1"),
            Message::assistant(vec![MessagePart::text("A")]),
        ],
    );
    store.commit_error(&session_id, "late failure");

    assert_eq!(store.tool_data(&session_id, &t1), Some(object(json!({"k": 8}))));
    let results = store.analysis_results(&session_id).unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].error_message.as_deref(), Some("late failure"));
}

#[test]
fn catalog_round_trip_restores_sessions_without_runtime_state() {
    let dir = TempDir::new().unwrap();
    let store = SessionStore::new(selection());
    let first = store.current_session_id();
    store.rename_session(&first, "Income clusters");
    store.replace_messages(&first, vec![Message::user("Q").with_id("u1")]);
    let second = store.create_session(Some("Flood risk".into()), ModelSelection::new("ollama", "llama3"));
    store.switch_session(first.clone());

    store.catalog().save(dir.path()).unwrap();
    let restored = SessionStore::from_catalog(SessionCatalog::load(dir.path()).unwrap(), selection());

    assert_eq!(restored.current_session_id(), first);
    let names: Vec<String> = restored.sessions().into_iter().map(|s| s.name).collect();
    assert_eq!(names, vec!["Flood risk".to_string(), "Income clusters".to_string()]);
    assert_eq!(
        restored.session(&second).map(|s| s.selection()),
        Some(ModelSelection::new("ollama", "llama3"))
    );
    assert_eq!(restored.messages(&first), Some(Vec::new()));
}

#[test]
fn missing_catalog_bootstraps_one_session() {
    let dir = TempDir::new().unwrap();
    let catalog = SessionCatalog::load(dir.path()).unwrap();
    let store = SessionStore::from_catalog(catalog, selection());
    assert_eq!(store.session_count(), 1);
    assert!(store.current_session().is_some());
}

#[derive(Debug, Clone)]
enum Op {
    Create,
    Delete(usize),
    Switch(usize),
    SwitchUnknown,
    Rename(usize),
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => Just(Op::Create),
        3 => (0usize..8).prop_map(Op::Delete),
        2 => (0usize..8).prop_map(Op::Switch),
        1 => Just(Op::SwitchUnknown),
        1 => (0usize..8).prop_map(Op::Rename),
    ]
}

fn id_at(store: &SessionStore, index: usize) -> SessionId {
    let sessions = store.sessions();
    sessions[index % sessions.len()].id.clone()
}

proptest! {
    #[test]
    fn registry_is_never_empty(ops in prop::collection::vec(arb_op(), 0..40)) {
        let store = SessionStore::new(selection());

        for op in ops {
            match op {
                Op::Create => {
                    let id = store.create_session(None, selection());
                    prop_assert_eq!(store.current_session_id(), id);
                }
                Op::Delete(i) => {
                    let target = id_at(&store, i);
                    let was_current = store.current_session_id() == target;
                    let before = store.session_count();
                    match store.delete_session(&target) {
                        DeleteOutcome::Deleted { repointed } => {
                            prop_assert_eq!(store.session_count(), before - 1);
                            prop_assert_eq!(repointed, was_current);
                            if repointed {
                                prop_assert!(store.current_session().is_some());
                            }
                        }
                        DeleteOutcome::RefusedLastSession => prop_assert_eq!(before, 1),
                        DeleteOutcome::NotFound => prop_assert!(false, "listed session not found"),
                    }
                }
                Op::Switch(i) => {
                    let target = id_at(&store, i);
                    store.switch_session(target.clone());
                    prop_assert_eq!(store.current_session_id(), target);
                }
                Op::SwitchUnknown => store.switch_session(SessionId::from("unknown")),
                Op::Rename(i) => {
                    let target = id_at(&store, i);
                    store.rename_session(&target, "renamed");
                    prop_assert_eq!(store.session(&target).map(|s| s.name), Some("renamed".to_string()));
                }
            }
            prop_assert!(store.session_count() >= 1);
        }
    }
}
