//! GameSession - the primary public API.
//!
//! Wraps the orchestrator, configuration, and persistence into a
//! single facade: create a session, feed it player actions, save or
//! load snapshots, reset.

use std::path::Path;
use thiserror::Error;
use uuid::Uuid;

use crate::backend::Backend;
use crate::config::CoreConfig;
use crate::document::GameStateDocument;
use crate::history::HistoryWindow;
use crate::orchestrator::{ActionOrchestrator, TurnError, TurnReport};
use crate::persist::{SaveError, SavedGame};
use crate::store::{StateStore, StoreError};

/// Errors from session operations.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("turn error: {0}")]
    Turn(#[from] TurnError),

    #[error("save error: {0}")]
    Save(#[from] SaveError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// Configuration for creating a new session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Player character name.
    pub player_name: String,

    /// Starting location.
    pub starting_location: String,

    /// Opening context shown to the player and persisted with saves.
    pub initial_context: String,

    /// Engine tunables.
    pub core: CoreConfig,
}

impl SessionConfig {
    pub fn new(player_name: impl Into<String>) -> Self {
        Self {
            player_name: player_name.into(),
            starting_location: "The Gate Plaza".to_string(),
            initial_context: String::new(),
            core: CoreConfig::default(),
        }
    }

    /// Set the starting location.
    pub fn with_starting_location(mut self, location: impl Into<String>) -> Self {
        self.starting_location = location.into();
        self
    }

    /// Set the opening context string.
    pub fn with_initial_context(mut self, context: impl Into<String>) -> Self {
        self.initial_context = context.into();
        self
    }

    /// Override the engine tunables.
    pub fn with_core(mut self, core: CoreConfig) -> Self {
        self.core = core;
        self
    }
}

/// One player's adventure: the state document, the history window, and
/// the turn machine, owned together.
pub struct GameSession<B> {
    orchestrator: ActionOrchestrator<B>,
    session_id: Uuid,
    config: SessionConfig,
}

impl<B: Backend> GameSession<B> {
    /// Start a fresh session with default state.
    pub fn new(config: SessionConfig, backend: B) -> Self {
        let doc = GameStateDocument::new(
            &config.player_name,
            &config.starting_location,
            &config.core,
        );
        let store = StateStore::new(doc, config.core.clone());
        let history = HistoryWindow::new(
            config.core.history_budget,
            config.core.summary_chunk_tokens,
        );
        Self {
            orchestrator: ActionOrchestrator::new(store, history, backend),
            session_id: Uuid::new_v4(),
            config,
        }
    }

    /// Resume a session from a snapshot file. The history window starts
    /// empty; only the document and initial context are persisted.
    pub async fn load(
        path: impl AsRef<Path>,
        mut config: SessionConfig,
        backend: B,
    ) -> Result<Self, SessionError> {
        let saved = SavedGame::load_json(path).await?;
        config.initial_context = saved.initial_context;
        config.player_name = saved.state.player.name.clone();

        let store = StateStore::new(saved.state, config.core.clone());
        let history = HistoryWindow::new(
            config.core.history_budget,
            config.core.summary_chunk_tokens,
        );
        Ok(Self {
            orchestrator: ActionOrchestrator::new(store, history, backend),
            session_id: Uuid::new_v4(),
            config,
        })
    }

    /// Write the current state to a snapshot file.
    pub async fn save(&self, path: impl AsRef<Path>) -> Result<(), SessionError> {
        let snapshot = self.orchestrator.snapshot()?;
        let saved = SavedGame::new(snapshot, &self.config.initial_context);
        saved.save_json(path).await?;
        Ok(())
    }

    /// Process one player action. The main gameplay entry point.
    pub async fn player_action(&mut self, input: &str) -> Result<TurnReport, SessionError> {
        Ok(self.orchestrator.submit_action(input).await?)
    }

    /// Throw away all progress and restart with session-start defaults.
    pub fn reset(&mut self) {
        let doc = GameStateDocument::new(
            &self.config.player_name,
            &self.config.starting_location,
            &self.config.core,
        );
        self.orchestrator.store_mut().replace(doc);
        self.orchestrator.history_mut().clear();
        self.session_id = Uuid::new_v4();
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    /// The opening context this session was started with.
    pub fn initial_context(&self) -> &str {
        &self.config.initial_context
    }

    /// Immutable state snapshot for rendering.
    pub fn snapshot(&self) -> Result<GameStateDocument, StoreError> {
        self.orchestrator.snapshot()
    }

    pub fn orchestrator(&self) -> &ActionOrchestrator<B> {
        &self.orchestrator
    }

    pub fn orchestrator_mut(&mut self) -> &mut ActionOrchestrator<B> {
        &mut self.orchestrator
    }

    /// The player character's name.
    pub fn player_name(&self) -> &str {
        &self.config.player_name
    }

    /// Current location, from the live document.
    pub fn current_location(&self) -> Result<String, StoreError> {
        Ok(self.orchestrator.store().document()?.world.location.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockBackend, MockTurn};

    #[test]
    fn test_session_config_builder() {
        let config = SessionConfig::new("Jin")
            .with_starting_location("Hunter Association Lobby")
            .with_initial_context("Rain hammers the glass doors.");
        assert_eq!(config.player_name, "Jin");
        assert_eq!(config.starting_location, "Hunter Association Lobby");
        assert_eq!(config.initial_context, "Rain hammers the glass doors.");
    }

    #[tokio::test]
    async fn test_reset_restores_defaults() {
        let backend = MockBackend::new();
        backend.queue_turn(MockTurn::narrative("Gold rains from the ceiling.").with_state_changes(
            serde_json::from_str(r#"{"player": {"gold": 999}}"#).unwrap(),
        ));
        let mut session = GameSession::new(SessionConfig::new("Jin"), backend);

        session.player_action("loot the chest").await.unwrap();
        assert_eq!(session.snapshot().unwrap().player.gold, 999);
        assert!(!session.orchestrator().history().entries().is_empty());

        session.reset();
        assert_eq!(session.snapshot().unwrap().player.gold, 0);
        assert!(session.orchestrator().history().entries().is_empty());
    }

    #[tokio::test]
    async fn test_save_then_load_restores_state() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("run.json");

        let backend = MockBackend::new();
        backend.queue_turn(MockTurn::narrative("You pocket the key.").with_state_changes(
            serde_json::from_str(r#"{"player": {"inventoryAdd": [{"name": "Bronze Key"}]}}"#)
                .unwrap(),
        ));
        let config = SessionConfig::new("Jin").with_initial_context("A cold morning.");
        let mut session = GameSession::new(config, backend);
        session.player_action("take the key").await.unwrap();
        session.save(&path).await.unwrap();

        let loaded = GameSession::load(&path, SessionConfig::new("ignored"), MockBackend::new())
            .await
            .unwrap();
        let state = loaded.snapshot().unwrap();
        assert_eq!(state.player.inventory[0].name, "Bronze Key");
        assert_eq!(loaded.initial_context(), "A cold morning.");
        assert_eq!(loaded.player_name(), "Jin");
        // History is not part of the snapshot.
        assert!(loaded.orchestrator().history().entries().is_empty());
    }
}
