//! QA tests for save/load behavior through the session API.
//!
//! Run with: `cargo test -p saga-core --test qa_persistence`

use saga_core::testing::{assert_item_quantity, MockBackend, MockTurn, TestHarness};
use saga_core::{GameSession, SaveError, SavedGame, SessionConfig, SessionError, SAVE_VERSION};
use tempfile::TempDir;

// =============================================================================
// SAVE AND LOAD
// =============================================================================

#[tokio::test]
async fn test_progress_survives_a_save_load_cycle() {
    let temp_dir = TempDir::new().expect("temp directory");
    let save_file = temp_dir.path().join("jin.json");

    let mut harness = TestHarness::with_config(
        SessionConfig::new("Jin").with_initial_context("The plaza is slick with rain."),
    );
    harness.expect_turn(MockTurn::narrative("You take the dagger.").with_state_changes(
        serde_json::from_str(r#"{"player": {"inventoryAdd": [{"name": "Dagger"}], "gold": 40}}"#)
            .unwrap(),
    ));
    harness.input("take the dagger").await.unwrap();
    harness.session.save(&save_file).await.unwrap();

    let loaded = GameSession::load(&save_file, SessionConfig::new("placeholder"), MockBackend::new())
        .await
        .unwrap();

    let state = loaded.snapshot().unwrap();
    assert_item_quantity(&state, "Dagger", 1);
    assert_eq!(state.player.gold, 40);
    assert_eq!(loaded.player_name(), "Jin");
    assert_eq!(loaded.initial_context(), "The plaza is slick with rain.");
    // Conversation history is session-local and not persisted.
    assert!(loaded.orchestrator().history().entries().is_empty());
}

#[tokio::test]
async fn test_snapshot_on_disk_is_versioned_camel_case_json() {
    let temp_dir = TempDir::new().expect("temp directory");
    let save_file = temp_dir.path().join("wire.json");

    let harness = TestHarness::new();
    harness.session.save(&save_file).await.unwrap();

    let raw = tokio::fs::read_to_string(&save_file).await.unwrap();
    let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(value["version"], SAVE_VERSION);
    assert!(value["state"].is_object());
    assert!(value["initialContext"].is_string());
    assert!(value["timestamp"].is_string());
    assert_eq!(value["state"]["player"]["name"], "Jin");
}

// =============================================================================
// CORRUPTION
// =============================================================================

#[tokio::test]
async fn test_snapshot_without_state_is_rejected_as_corrupt() {
    let temp_dir = TempDir::new().expect("temp directory");
    let save_file = temp_dir.path().join("broken.json");
    tokio::fs::write(&save_file, r#"{"initialContext": "x", "version": "1"}"#)
        .await
        .unwrap();

    let Err(err) = GameSession::load(&save_file, SessionConfig::new("Jin"), MockBackend::new()).await
    else {
        panic!("expected the corrupt snapshot to be rejected");
    };
    assert!(matches!(err, SessionError::Save(SaveError::Corrupt)));
}

#[tokio::test]
async fn test_unreadable_snapshot_is_a_json_error_not_corrupt() {
    let err = SavedGame::from_json("{{{").unwrap_err();
    assert!(matches!(err, SaveError::Json(_)));
}

#[tokio::test]
async fn test_missing_file_surfaces_io_error() {
    let temp_dir = TempDir::new().expect("temp directory");
    let missing = temp_dir.path().join("never-written.json");

    let Err(err) = GameSession::load(&missing, SessionConfig::new("Jin"), MockBackend::new()).await
    else {
        panic!("expected the missing snapshot to fail to load");
    };
    assert!(matches!(err, SessionError::Save(SaveError::Io(_))));
}
