//! Testing utilities.
//!
//! This module provides tools for integration testing:
//! - `MockBackend` for deterministic turns without a generator service
//! - `TestHarness` for scripted game scenarios
//! - Assertion helpers for verifying document state

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::backend::{
    BackendError, ContextBundle, DialogueTurn, Narration, SceneContext, ValidationContext,
    Validator, Verdict,
};
use crate::backend::{DialogueGenerator, Narrator, Summarizer};
use crate::document::{GameStateDocument, NpcRecord};
use crate::orchestrator::TurnReport;
use crate::patch::StatePatch;
use crate::session::{GameSession, SessionConfig, SessionError};

/// One scripted turn: the verdict, the NPC reply (if routed through
/// one), and the narration.
#[derive(Debug, Clone)]
pub struct MockTurn {
    pub verdict: Verdict,
    pub dialogue: Option<DialogueTurn>,
    pub narration: Narration,

    /// When set, the narration call fails with this message instead.
    pub narration_failure: Option<String>,
}

impl MockTurn {
    /// A valid turn producing plain narration with no state changes.
    pub fn narrative(text: impl Into<String>) -> Self {
        Self {
            verdict: Verdict::approved(),
            dialogue: None,
            narration: Narration {
                narration: text.into(),
                state_changes: None,
            },
            narration_failure: None,
        }
    }

    /// A turn the validator rejects outright.
    pub fn rejected(reason: impl Into<String>) -> Self {
        Self {
            verdict: Verdict::rejected(reason),
            dialogue: None,
            narration: Narration::default(),
            narration_failure: None,
        }
    }

    /// Attach a state delta to the narration.
    pub fn with_state_changes(mut self, changes: StatePatch) -> Self {
        self.narration.state_changes = Some(changes);
        self
    }

    /// Route the turn through an NPC who answers with `dialogue`.
    pub fn with_npc(mut self, name: impl Into<String>, dialogue: impl Into<String>) -> Self {
        self.verdict = self.verdict.with_npc(name);
        let turn = self.dialogue.get_or_insert_with(DialogueTurn::default);
        turn.dialogue = dialogue.into();
        self
    }

    /// Have the NPC reply update the NPC's relationship tag.
    pub fn with_npc_relationship(mut self, relationship: impl Into<String>) -> Self {
        let turn = self.dialogue.get_or_insert_with(DialogueTurn::default);
        let changes = turn.npc_changes.get_or_insert_with(Default::default);
        changes.relationship = Some(relationship.into());
        self
    }

    /// Mark the verdict as opening a new scene.
    pub fn with_new_scene(mut self) -> Self {
        self.verdict = self.verdict.with_new_scene();
        self
    }

    /// Make the narration step fail with the given message.
    pub fn failing_narration(mut self, message: impl Into<String>) -> Self {
        self.narration_failure = Some(message.into());
        self
    }
}

#[derive(Default)]
struct MockState {
    turns: Mutex<VecDeque<MockTurn>>,
    active: Mutex<Option<MockTurn>>,
    last_validation: Mutex<Option<ValidationContext>>,
    last_bundle: Mutex<Option<ContextBundle>>,
    summarize_calls: AtomicUsize,
    fail_summaries: AtomicUsize,
}

/// A backend that replays scripted turns. Cheap to clone; clones share
/// the script, so tests can keep a handle for queueing and inspection
/// after handing one to a session.
#[derive(Clone, Default)]
pub struct MockBackend {
    state: Arc<MockState>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a scripted turn.
    pub fn queue_turn(&self, turn: MockTurn) {
        if let Ok(mut turns) = self.state.turns.lock() {
            turns.push_back(turn);
        }
    }

    /// The context projection the validator last received.
    pub fn last_validation_context(&self) -> Option<ValidationContext> {
        self.state
            .last_validation
            .lock()
            .ok()
            .and_then(|guard| guard.clone())
    }

    /// The context bundle the narrator last received.
    pub fn last_narration_context(&self) -> Option<ContextBundle> {
        self.state
            .last_bundle
            .lock()
            .ok()
            .and_then(|guard| guard.clone())
    }

    /// How many summarization calls have been made.
    pub fn summarize_calls(&self) -> usize {
        self.state.summarize_calls.load(Ordering::SeqCst)
    }

    /// Make the next `n` summarization calls fail.
    pub fn fail_next_summaries(&self, n: usize) {
        self.state.fail_summaries.store(n, Ordering::SeqCst);
    }

    fn stage_next_turn(&self) -> MockTurn {
        let next = self
            .state
            .turns
            .lock()
            .ok()
            .and_then(|mut turns| turns.pop_front())
            .unwrap_or_else(|| MockTurn::narrative("The scripted backend has no more turns."));
        if let Ok(mut active) = self.state.active.lock() {
            *active = Some(next.clone());
        }
        next
    }

    fn active_turn(&self) -> Option<MockTurn> {
        self.state.active.lock().ok().and_then(|guard| guard.clone())
    }
}

#[async_trait]
impl Validator for MockBackend {
    async fn validate(
        &self,
        _action: &str,
        context: &ValidationContext,
    ) -> Result<Verdict, BackendError> {
        if let Ok(mut last) = self.state.last_validation.lock() {
            *last = Some(context.clone());
        }
        Ok(self.stage_next_turn().verdict)
    }
}

#[async_trait]
impl DialogueGenerator for MockBackend {
    async fn generate_dialogue(
        &self,
        npc_name: &str,
        _action: &str,
        _npc_state: &NpcRecord,
        _scene: &SceneContext,
    ) -> Result<DialogueTurn, BackendError> {
        self.active_turn()
            .and_then(|turn| turn.dialogue)
            .ok_or_else(|| {
                BackendError::Service(format!("no scripted dialogue for {npc_name}"))
            })
    }
}

#[async_trait]
impl Narrator for MockBackend {
    async fn generate_narration(
        &self,
        _action: &str,
        _npc_dialogue: Option<&str>,
        context: &ContextBundle,
    ) -> Result<Narration, BackendError> {
        if let Ok(mut last) = self.state.last_bundle.lock() {
            *last = Some(context.clone());
        }
        let turn = self
            .active_turn()
            .ok_or_else(|| BackendError::Service("no scripted turn staged".to_string()))?;
        if let Some(message) = turn.narration_failure {
            return Err(BackendError::Service(message));
        }
        Ok(turn.narration)
    }
}

#[async_trait]
impl Summarizer for MockBackend {
    async fn summarize(&self, chunks: &[String]) -> Result<String, BackendError> {
        self.state.summarize_calls.fetch_add(1, Ordering::SeqCst);
        let remaining = self.state.fail_summaries.load(Ordering::SeqCst);
        if remaining > 0 {
            self.state
                .fail_summaries
                .store(remaining - 1, Ordering::SeqCst);
            return Err(BackendError::Service("scripted summarizer failure".to_string()));
        }
        Ok(format!("[Summary of {} lines]", chunks.len()))
    }
}

/// Test harness for running scripted scenarios against a full session.
pub struct TestHarness {
    pub session: GameSession<MockBackend>,
    pub backend: MockBackend,
}

impl TestHarness {
    /// Harness with a default session ("Jin" at "The Gate Plaza").
    pub fn new() -> Self {
        Self::with_config(SessionConfig::new("Jin"))
    }

    /// Harness with a custom session configuration.
    pub fn with_config(config: SessionConfig) -> Self {
        let backend = MockBackend::new();
        let session = GameSession::new(config, backend.clone());
        Self { session, backend }
    }

    /// Queue a plain narrative turn.
    pub fn expect_narrative(&mut self, text: impl Into<String>) -> &mut Self {
        self.backend.queue_turn(MockTurn::narrative(text));
        self
    }

    /// Queue an arbitrary scripted turn.
    pub fn expect_turn(&mut self, turn: MockTurn) -> &mut Self {
        self.backend.queue_turn(turn);
        self
    }

    /// Send player input through the session.
    pub async fn input(&mut self, text: &str) -> Result<TurnReport, SessionError> {
        self.session.player_action(text).await
    }

    /// Current state snapshot.
    pub fn state(&self) -> GameStateDocument {
        // The harness session is always initialized.
        self.session.snapshot().unwrap_or_else(|_| {
            GameStateDocument::new("Jin", "The Gate Plaza", &crate::config::CoreConfig::default())
        })
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Assertion Helpers
// ============================================================================

/// Assert one inventory stack exists with the expected quantity.
#[track_caller]
pub fn assert_item_quantity(state: &GameStateDocument, name: &str, quantity: u32) {
    match state.player.find_stack(name) {
        Some(stack) => assert_eq!(
            stack.quantity, quantity,
            "expected {quantity}x {name}, found {}x",
            stack.quantity
        ),
        None => panic!("expected {quantity}x {name}, item not in inventory"),
    }
}

/// Assert a quest has been recorded as completed.
#[track_caller]
pub fn assert_quest_completed(state: &GameStateDocument, name: &str) {
    assert!(
        state.quests.completed.iter().any(|q| q == name),
        "expected quest '{name}' to be completed, got {:?}",
        state.quests.completed
    );
}

/// Assert an NPC record exists.
#[track_caller]
pub fn assert_has_npc(state: &GameStateDocument, name: &str) {
    assert!(
        state.npcs.contains_key(name),
        "expected NPC '{name}' to exist"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_backend_replays_in_order() {
        let mut harness = TestHarness::new();
        harness
            .expect_narrative("Response 1")
            .expect_narrative("Response 2");

        assert_eq!(harness.input("first").await.unwrap().narration, "Response 1");
        assert_eq!(harness.input("second").await.unwrap().narration, "Response 2");
        // Exhausted scripts fall back to a default narration.
        assert!(harness
            .input("third")
            .await
            .unwrap()
            .narration
            .contains("no more turns"));
    }

    #[tokio::test]
    async fn test_harness_state_changes_flow_through() {
        let mut harness = TestHarness::new();
        harness.expect_turn(MockTurn::narrative("You pick up a potion.").with_state_changes(
            serde_json::from_str(r#"{"player": {"inventoryAdd": [{"name": "Potion", "quantity": 2}]}}"#)
                .unwrap(),
        ));

        harness.input("grab the potion").await.unwrap();
        assert_item_quantity(&harness.state(), "Potion", 2);
    }

    #[tokio::test]
    async fn test_summarizer_failure_injection() {
        let backend = MockBackend::new();
        backend.fail_next_summaries(1);
        assert!(backend.summarize(&["x".to_string()]).await.is_err());
        assert!(backend.summarize(&["x".to_string()]).await.is_ok());
        assert_eq!(backend.summarize_calls(), 2);
    }
}
