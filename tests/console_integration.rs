use std::sync::Arc;
use std::time::Duration;

use botdeck::backend::types::{BotSummary, ColumnInfo, TableDetail};
use botdeck::backend::MockBackend;
use botdeck::config::ConsoleConfig;
use botdeck::error::ConsoleError;
use botdeck::metadata::{comment, ColumnPatch, SubmitPhase};
use botdeck::ConsoleState;

fn fast_config() -> ConsoleConfig {
    ConsoleConfig {
        resolver_quiet_period_ms: 10,
        settle_delay_ms: 10,
        status_display_ms: 200,
        ..Default::default()
    }
}

fn seeded_backend() -> Arc<MockBackend> {
    let backend = Arc::new(MockBackend::new());
    backend.insert_table(
        "customers",
        TableDetail {
            description: "customer accounts".to_string(),
            columns: vec![ColumnInfo {
                name: "email".to_string(),
                column_type: "varchar".to_string(),
                comment: Some(comment::encode("", &[])),
            }],
        },
    );
    backend.insert_table(
        "orders",
        TableDetail {
            description: "order headers".to_string(),
            columns: vec![ColumnInfo {
                name: "customer_id".to_string(),
                column_type: "int".to_string(),
                comment: None,
            }],
        },
    );
    backend
}

fn state_with(backend: Arc<MockBackend>) -> ConsoleState {
    ConsoleState::with_backend(fast_config(), backend)
}

#[tokio::test]
async fn state_wires_up_against_any_backend() {
    let backend = seeded_backend();
    let state = state_with(backend);

    let tables = state.metadata.tables().await.unwrap();
    assert_eq!(tables, vec!["customers".to_string(), "orders".to_string()]);
    assert_eq!(state.metadata.submit_phase(), SubmitPhase::Idle);
    assert!(!state.metadata.has_modifications());
    assert!(state.bots.bots().await.is_empty());
}

#[tokio::test]
async fn column_edit_then_revert_leaves_no_pending_entry() {
    let backend = seeded_backend();
    let state = state_with(backend);

    state.metadata.table_detail("customers").await.unwrap();
    state
        .metadata
        .edit_column(
            "customers",
            "email",
            ColumnPatch::description("primary contact email"),
        )
        .unwrap();

    let pending = state.metadata.pending();
    let edit = pending.column_edit("customers", "email").unwrap();
    assert!(edit.is_modified);

    // Clearing description and foreign keys back to the server values
    // removes the entry rather than marking it unmodified.
    state
        .metadata
        .edit_column("customers", "email", ColumnPatch::description(""))
        .unwrap();
    state
        .metadata
        .edit_column("customers", "email", ColumnPatch::foreign_keys(Vec::new()))
        .unwrap();
    assert!(!state.metadata.has_modifications());
}

#[tokio::test]
async fn editing_an_unloaded_table_is_rejected() {
    let backend = seeded_backend();
    let state = state_with(backend);

    let err = state
        .metadata
        .edit_column("customers", "email", ColumnPatch::description("x"))
        .unwrap_err();
    assert!(matches!(err, ConsoleError::TableNotLoaded { .. }));
}

#[tokio::test]
async fn reverted_edits_clear_affected_bots_without_a_lookup() {
    let backend = seeded_backend();
    backend.associate_bot(
        "customers",
        BotSummary {
            id: "crm-bot".to_string(),
            name: None,
            description: None,
        },
    );
    let state = state_with(backend.clone());

    state.metadata.table_detail("customers").await.unwrap();
    state
        .metadata
        .edit_column("customers", "email", ColumnPatch::description("contact"))
        .unwrap();
    tokio::time::sleep(Duration::from_millis(40)).await;
    assert_eq!(state.metadata.affected_bots().bots.len(), 1);
    assert_eq!(backend.call_count("find_bots_by_tables"), 1);

    // Revert: the empty touched set short-circuits client-side.
    state
        .metadata
        .edit_column("customers", "email", ColumnPatch::description(""))
        .unwrap();
    let affected = state.metadata.affected_bots();
    assert!(affected.bots.is_empty());
    assert!(!affected.loading);
    tokio::time::sleep(Duration::from_millis(40)).await;
    assert_eq!(backend.call_count("find_bots_by_tables"), 1);
}

#[tokio::test]
async fn failed_submission_preserves_every_pending_edit() {
    let backend = seeded_backend();
    let state = state_with(backend.clone());

    state.metadata.table_detail("customers").await.unwrap();
    state.metadata.table_detail("orders").await.unwrap();
    state
        .metadata
        .edit_column("customers", "email", ColumnPatch::description("contact"))
        .unwrap();
    state
        .metadata
        .edit_description("orders", "all order headers")
        .unwrap();

    backend.fail("update_tables", ConsoleError::transport("gateway timeout"));
    let err = state.metadata.submit().await.unwrap_err();
    assert!(matches!(err, ConsoleError::Submission { .. }));

    let pending = state.metadata.pending();
    assert_eq!(pending.column_count(), 1);
    assert_eq!(pending.description_count(), 1);
    assert!(matches!(
        state.metadata.submit_phase(),
        SubmitPhase::Failed { .. }
    ));

    // Retry without re-typing anything.
    backend.clear_failure("update_tables");
    let phase = state.metadata.submit().await.unwrap();
    assert_eq!(phase, SubmitPhase::Success);
    assert!(!state.metadata.has_modifications());
}

#[tokio::test]
async fn successful_submission_clears_edits_and_invalidates_the_cache() {
    let backend = seeded_backend();
    let state = state_with(backend.clone());

    state.metadata.table_detail("customers").await.unwrap();
    state
        .metadata
        .edit_column(
            "customers",
            "email",
            ColumnPatch::description("primary contact email"),
        )
        .unwrap();

    let phase = state.metadata.submit().await.unwrap();
    assert_eq!(phase, SubmitPhase::Success);
    assert!(!state.metadata.has_modifications());

    // The grouped payload carried only the changed fields.
    let payload = backend.last_table_update().unwrap();
    assert_eq!(payload.len(), 1);
    assert_eq!(payload[0].name, "customers");
    assert!(payload[0].description.is_none());
    assert_eq!(
        payload[0].columns[0].comment,
        comment::encode("primary contact email", &[])
    );

    // The detail cache was evicted; the refetch observes committed truth.
    assert_eq!(backend.call_count("table_detail"), 1);
    let detail = state.metadata.table_detail("customers").await.unwrap();
    assert_eq!(backend.call_count("table_detail"), 2);
    assert_eq!(
        detail.columns[0].comment.as_deref(),
        Some(comment::encode("primary contact email", &[]).as_str())
    );
}

#[tokio::test]
async fn commit_with_affected_bots_syncs_exactly_the_snapshot() {
    let backend = seeded_backend();
    backend.associate_bot(
        "orders",
        BotSummary {
            id: "billing-bot".to_string(),
            name: Some("Billing".to_string()),
            description: None,
        },
    );
    let state = state_with(backend.clone());

    state.metadata.table_detail("orders").await.unwrap();
    state
        .metadata
        .edit_description("orders", "order headers incl. refunds")
        .unwrap();

    // Let the debounced resolver land before committing.
    tokio::time::sleep(Duration::from_millis(40)).await;
    assert_eq!(state.metadata.affected_bots().bots.len(), 1);

    let phase = state.metadata.submit().await.unwrap();
    assert_eq!(phase, SubmitPhase::Success);
    assert_eq!(
        backend.last_vector_sync(),
        Some(vec!["billing-bot".to_string()])
    );
    assert!(state.metadata.affected_bots().bots.is_empty());
}

#[tokio::test]
async fn commit_without_affected_bots_never_calls_vector_sync() {
    let backend = seeded_backend();
    let state = state_with(backend.clone());

    state.metadata.table_detail("orders").await.unwrap();
    state
        .metadata
        .edit_description("orders", "renamed")
        .unwrap();

    let phase = state.metadata.submit().await.unwrap();
    assert_eq!(phase, SubmitPhase::Success);
    assert_eq!(backend.call_count("update_vector_stores"), 0);
}

#[tokio::test]
async fn vector_sync_failure_reports_tables_as_saved() {
    let backend = seeded_backend();
    backend.associate_bot(
        "orders",
        BotSummary {
            id: "billing-bot".to_string(),
            name: None,
            description: None,
        },
    );
    let state = state_with(backend.clone());

    state.metadata.table_detail("orders").await.unwrap();
    state
        .metadata
        .edit_description("orders", "order headers v2")
        .unwrap();
    tokio::time::sleep(Duration::from_millis(40)).await;

    backend.fail(
        "update_vector_stores",
        ConsoleError::transport("index service down"),
    );
    let err = state.metadata.submit().await.unwrap_err();
    assert!(matches!(err, ConsoleError::VectorStoreSync { .. }));
    assert!(matches!(
        state.metadata.submit_phase(),
        SubmitPhase::VectorStoreSyncFailed { .. }
    ));
    // The table data is already committed; edits are gone.
    assert!(!state.metadata.has_modifications());
    let detail = state.metadata.table_detail("orders").await.unwrap();
    assert_eq!(detail.description, "order headers v2");
}

#[tokio::test]
async fn two_steps_chat_round_trip_with_deferred_execution() {
    use botdeck::backend::types::{Row, TwoStepsReply, TwoStepsStatus};

    let backend = seeded_backend();
    let reply = TwoStepsReply {
        status: TwoStepsStatus::Ok,
        message: Some("Here are your customers:".to_string()),
        sql: Some("SELECT email FROM customers".to_string()),
        table_list: vec!["customers".to_string()],
        result: None,
        error: None,
        token_usage: None,
    };
    backend.script_two_steps_reply(reply);
    let mut row = Row::new();
    row.insert(
        "email".to_string(),
        serde_json::Value::String("a@example.com".to_string()),
    );
    backend.script_sql_rows(vec![row]);

    let state = state_with(backend);
    let session = state.two_steps_session();

    let id = session.send("list customer emails").await.unwrap();
    let transcript = session.transcript();
    let turn = transcript.iter().find(|m| m.id == id).unwrap();
    let blocks = botdeck::chat::sql_blocks(&turn.content);
    assert_eq!(blocks, vec!["SELECT email FROM customers".to_string()]);

    // No inline result came back; the operator executes the block.
    assert!(session.result(id).is_none());
    session.execute(id, &blocks[0]).await.unwrap();
    let outcome = session.result(id).unwrap();
    assert_eq!(outcome.rows.unwrap().len(), 1);
}

#[tokio::test]
async fn directory_lists_commands_prompts_and_models() {
    use botdeck::backend::types::{CommandInfo, PromptInfo, VectorStore};

    let backend = seeded_backend();
    backend.insert_command(CommandInfo {
        id: "cmd-1".to_string(),
        name: "reindex".to_string(),
        description: None,
    });
    backend.insert_prompt(PromptInfo {
        id: "prompt-1".to_string(),
        name: "sql-system".to_string(),
        content: Some("You translate questions into SQL.".to_string()),
    });
    backend.insert_vector_store(VectorStore {
        id: "vs-1".to_string(),
        name: Some("billing".to_string()),
        status: None,
        created_at: None,
    });
    backend.script_models(vec!["gpt-4o".to_string(), "gpt-4o-mini".to_string()]);

    let state = state_with(backend);
    assert_eq!(state.bots.refresh_commands().await.unwrap().len(), 1);
    assert_eq!(state.bots.refresh_prompts().await.unwrap().len(), 1);
    assert_eq!(state.bots.refresh_vector_stores().await.unwrap().len(), 1);

    let session = state.two_steps_session();
    assert_eq!(session.models().await.unwrap().len(), 2);
}

#[tokio::test]
async fn bot_directory_vector_store_lifecycle() {
    use botdeck::backend::types::Bot;

    let backend = seeded_backend();
    backend.insert_bot(Bot {
        id: "billing-bot".to_string(),
        name: "Billing".to_string(),
        description: None,
        prompt: None,
        tables: vec!["orders".to_string()],
        metadata: Default::default(),
    });
    let state = state_with(backend);

    state.bots.refresh_bots().await.unwrap();
    let store_id = state.bots.create_vector_store("billing-bot").await.unwrap();
    let bots = state.bots.bots().await;
    assert_eq!(
        bots[0].metadata.vector_store_id.as_deref(),
        Some(store_id.as_str())
    );

    state.bots.delete_vector_store(&store_id).await.unwrap();
    let bots = state.bots.bots().await;
    assert!(bots[0].metadata.vector_store_id.is_none());
}
