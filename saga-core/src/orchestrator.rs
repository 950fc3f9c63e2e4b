//! Turn orchestration.
//!
//! Sequences one player turn through an explicit state machine:
//! `Idle -> Validating -> (NpcTurn?) -> Narrating -> Applying -> Idle`.
//! The phase field is the mutual-exclusion mechanism: exactly one turn
//! may be in flight, and submissions while the machine is busy are
//! rejected outright rather than queued. Failures surface as structured
//! errors and re-enter `Idle`; effects already applied earlier in the
//! same turn are deliberately not rolled back.

use thiserror::Error;
use tracing::debug;

use crate::backend::{
    Backend, BackendError, ContextBundle, ContextLine, SceneContext, ValidationContext,
};
use crate::document::GameStateDocument;
use crate::history::{CompactionReport, HistoryWindow, Role};
use crate::store::{StateStore, StoreError};

/// Where the turn machine currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TurnPhase {
    #[default]
    Idle,
    Validating,
    NpcTurn,
    Narrating,
    Applying,
}

/// Errors from turn processing.
#[derive(Debug, Error)]
pub enum TurnError {
    /// A turn is already in flight; the action was not queued.
    #[error("a turn is already in progress")]
    TurnInProgress,

    /// The validator judged the action impossible. No state was
    /// mutated.
    #[error("action rejected: {reason}")]
    ValidationRejected { reason: String },

    /// An external generator failed at the named phase. Effects applied
    /// earlier in the turn stand.
    #[error("{phase:?} step failed: {source}")]
    Backend {
        phase: TurnPhase,
        source: BackendError,
    },

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Render-ready result of one completed turn.
#[derive(Debug, Clone)]
pub struct TurnReport {
    /// The narration to display.
    pub narration: String,

    /// What the involved NPC said, if the turn had an NPC step.
    pub npc_dialogue: Option<String>,

    /// Illustration trigger: the validator opened a new scene.
    pub new_scene: bool,

    /// Fresh state snapshot, taken after the apply step regardless of
    /// whether the narrator sent changes.
    pub state: GameStateDocument,

    /// What history compaction did this turn.
    pub compaction: CompactionReport,
}

/// Drives one session's turns against a generator backend. Owns the
/// state store and history window exclusively; external readers get
/// snapshots only.
pub struct ActionOrchestrator<B> {
    store: StateStore,
    history: HistoryWindow,
    backend: B,
    phase: TurnPhase,
}

impl<B: Backend> ActionOrchestrator<B> {
    pub fn new(store: StateStore, history: HistoryWindow, backend: B) -> Self {
        Self {
            store,
            history,
            backend,
            phase: TurnPhase::Idle,
        }
    }

    /// Current phase of the turn machine.
    pub fn phase(&self) -> TurnPhase {
        self.phase
    }

    pub fn store(&self) -> &StateStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut StateStore {
        &mut self.store
    }

    pub fn history(&self) -> &HistoryWindow {
        &self.history
    }

    pub fn history_mut(&mut self) -> &mut HistoryWindow {
        &mut self.history
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Immutable state snapshot for rendering.
    pub fn snapshot(&self) -> Result<GameStateDocument, StoreError> {
        self.store.snapshot()
    }

    /// Run one full turn for a raw action string.
    ///
    /// Rejected while any other turn is in flight. Whatever the
    /// outcome, the machine is back in `Idle` when this returns.
    pub async fn submit_action(&mut self, action: &str) -> Result<TurnReport, TurnError> {
        if self.phase != TurnPhase::Idle {
            return Err(TurnError::TurnInProgress);
        }
        let outcome = self.run_turn(action).await;
        self.phase = TurnPhase::Idle;
        outcome
    }

    async fn run_turn(&mut self, action: &str) -> Result<TurnReport, TurnError> {
        self.phase = TurnPhase::Validating;
        let context = self.validation_context()?;
        let verdict = self
            .backend
            .validate(action, &context)
            .await
            .map_err(|source| TurnError::Backend {
                phase: TurnPhase::Validating,
                source,
            })?;

        if !verdict.valid {
            let reason = verdict
                .reason
                .unwrap_or_else(|| "That is not possible here.".to_string());
            debug!(action, reason, "action rejected");
            return Err(TurnError::ValidationRejected { reason });
        }

        // NPC dialogue runs before narration so the narrator sees the
        // updated record.
        let mut npc_dialogue = None;
        if verdict.involve_npc {
            if let Some(npc_name) = verdict.npc_name.as_deref() {
                self.phase = TurnPhase::NpcTurn;
                let record = self.store.get_npc(npc_name)?;
                let scene = self.scene_context()?;
                let turn = self
                    .backend
                    .generate_dialogue(npc_name, action, &record, &scene)
                    .await
                    .map_err(|source| TurnError::Backend {
                        phase: TurnPhase::NpcTurn,
                        source,
                    })?;
                if let Some(changes) = turn.npc_changes {
                    self.store.update_npc(npc_name, changes)?;
                }
                npc_dialogue = Some(turn.dialogue);
            }
        }

        self.phase = TurnPhase::Narrating;
        let bundle = self.context_bundle()?;
        let narration = self
            .backend
            .generate_narration(action, npc_dialogue.as_deref(), &bundle)
            .await
            .map_err(|source| TurnError::Backend {
                phase: TurnPhase::Narrating,
                source,
            })?;

        self.phase = TurnPhase::Applying;
        if let Some(changes) = narration.state_changes {
            self.store.update(changes)?;
        }
        self.history.append_turn(Role::Player, action);
        self.history.append_turn(Role::Narrator, &narration.narration);
        let compaction = self.history.compact_if_needed(&self.backend).await;

        Ok(TurnReport {
            narration: narration.narration,
            npc_dialogue,
            new_scene: verdict.new_scene,
            state: self.store.snapshot()?,
            compaction,
        })
    }

    /// The slim document projection the validator sees.
    fn validation_context(&self) -> Result<ValidationContext, StoreError> {
        let doc = self.store.document()?;
        Ok(ValidationContext {
            location: doc.world.location.clone(),
            rank: doc.player.rank,
            level: doc.player.level,
            inventory: doc.player.inventory_names(),
        })
    }

    fn scene_context(&self) -> Result<SceneContext, StoreError> {
        let doc = self.store.document()?;
        Ok(SceneContext {
            location: doc.world.location.clone(),
            time: doc.world.time.clone(),
            dungeon: doc.world.dungeon.clone(),
        })
    }

    /// Narration context: recent window entries within the budget
    /// (read-only), all summaries in order, and a player/world
    /// snapshot.
    fn context_bundle(&self) -> Result<ContextBundle, StoreError> {
        let doc = self.store.document()?;
        let recent = self
            .history
            .recent_context(self.history.budget())
            .iter()
            .map(|entry| ContextLine {
                role: entry.role,
                text: entry.text.clone(),
            })
            .collect();
        Ok(ContextBundle {
            recent,
            summaries: self.history.summary_text(),
            player: doc.player.clone(),
            world: doc.world.clone(),
        })
    }
}
