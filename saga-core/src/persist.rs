//! Save/load of session snapshots.
//!
//! A save is an opaque snapshot: the full state document, the session's
//! initial-context string, an ISO-8601 timestamp, and a schema version.
//! The history window is intentionally not persisted; a loaded session
//! starts with an empty window.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use tokio::fs;

use crate::document::GameStateDocument;

/// Current snapshot schema version.
pub const SAVE_VERSION: &str = "1";

/// Errors from persistence operations.
#[derive(Debug, Error)]
pub enum SaveError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The payload is not a usable snapshot (no `state` key).
    #[error("corrupt save: missing state")]
    Corrupt,
}

/// A persisted session snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedGame {
    /// The complete game-state document.
    pub state: GameStateDocument,

    /// The opening context the session was started with.
    pub initial_context: String,

    /// When the save was created (ISO-8601).
    pub timestamp: String,

    /// Snapshot schema version.
    pub version: String,
}

impl SavedGame {
    /// Snapshot the given state now.
    pub fn new(state: GameStateDocument, initial_context: impl Into<String>) -> Self {
        Self {
            state,
            initial_context: initial_context.into(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            version: SAVE_VERSION.to_string(),
        }
    }

    /// Write the snapshot as pretty JSON.
    pub async fn save_json(&self, path: impl AsRef<Path>) -> Result<(), SaveError> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content).await?;
        Ok(())
    }

    /// Read a snapshot, rejecting payloads without a `state` key before
    /// attempting the typed decode.
    pub async fn load_json(path: impl AsRef<Path>) -> Result<Self, SaveError> {
        let content = fs::read_to_string(path).await?;
        Self::from_json(&content)
    }

    /// Decode a snapshot from a JSON string.
    pub fn from_json(content: &str) -> Result<Self, SaveError> {
        let value: serde_json::Value = serde_json::from_str(content)?;
        if value.get("state").is_none() {
            return Err(SaveError::Corrupt);
        }
        Ok(serde_json::from_value(value)?)
    }
}

/// Default save path for a session, with the name sanitized to
/// filesystem-safe characters.
pub fn save_path(base_dir: impl AsRef<Path>, session_name: &str) -> std::path::PathBuf {
    let sanitized = session_name
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '_' })
        .collect::<String>();
    base_dir.as_ref().join(format!("{sanitized}.json"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CoreConfig;

    fn sample_state() -> GameStateDocument {
        GameStateDocument::new("Jin", "The Gate Plaza", &CoreConfig::default())
    }

    #[test]
    fn test_snapshot_carries_version_and_timestamp() {
        let saved = SavedGame::new(sample_state(), "You wake in the plaza.");
        assert_eq!(saved.version, SAVE_VERSION);
        assert!(saved.timestamp.contains('T'));
    }

    #[test]
    fn test_wire_uses_camel_case() {
        let saved = SavedGame::new(sample_state(), "ctx");
        let json = serde_json::to_string(&saved).unwrap();
        assert!(json.contains("\"initialContext\""));
        assert!(json.contains("\"state\""));
    }

    #[test]
    fn test_missing_state_is_corrupt() {
        let err = SavedGame::from_json(r#"{"initialContext": "x", "version": "1"}"#).unwrap_err();
        assert!(matches!(err, SaveError::Corrupt));
    }

    #[test]
    fn test_invalid_json_is_json_error() {
        let err = SavedGame::from_json("{not json").unwrap_err();
        assert!(matches!(err, SaveError::Json(_)));
    }

    #[tokio::test]
    async fn test_save_and_load_roundtrip() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("session.json");

        let mut state = sample_state();
        state.player.gold = 250;
        let saved = SavedGame::new(state.clone(), "You wake in the plaza.");
        saved.save_json(&path).await.unwrap();

        let loaded = SavedGame::load_json(&path).await.unwrap();
        assert_eq!(loaded.state, state);
        assert_eq!(loaded.initial_context, "You wake in the plaza.");
    }

    #[test]
    fn test_save_path_sanitizes() {
        let path = save_path("/saves", "Jin's Run!");
        assert!(path.to_string_lossy().ends_with("Jin_s_Run_.json"));
    }
}
