//! External generator contracts.
//!
//! The engine treats narrative generation as four opaque async
//! capabilities: action validation, NPC dialogue, narration, and
//! history summarization. Implementations wrap whatever service
//! produces the text; the engine only depends on these traits. The
//! response shapes mirror the JSON the services speak (camelCase keys).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::document::{NpcRecord, Player, Rank, World};
use crate::history::Role;
use crate::patch::{NpcPatch, StatePatch};

/// Errors from an external generator call.
#[derive(Debug, Error)]
pub enum BackendError {
    /// The service call itself failed (transport, timeout, refusal).
    #[error("generator call failed: {0}")]
    Service(String),

    /// The service answered with something the engine cannot parse.
    #[error("malformed generator response: {0}")]
    Malformed(String),
}

// ============================================================================
// Response shapes
// ============================================================================

/// Validator verdict on one player action.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Verdict {
    pub valid: bool,

    /// Why the action was rejected, when it was.
    pub reason: Option<String>,

    /// Whether an NPC should speak before narration.
    #[serde(rename = "involveNPC")]
    pub involve_npc: bool,

    /// Which NPC, when one is involved.
    pub npc_name: Option<String>,

    /// Whether this action opens a new scene (illustration trigger).
    pub new_scene: bool,
}

impl Verdict {
    /// A plain approval with no NPC involvement.
    pub fn approved() -> Self {
        Self {
            valid: true,
            ..Self::default()
        }
    }

    /// A rejection with a user-visible reason.
    pub fn rejected(reason: impl Into<String>) -> Self {
        Self {
            valid: false,
            reason: Some(reason.into()),
            ..Self::default()
        }
    }

    /// Route the turn through the named NPC.
    pub fn with_npc(mut self, name: impl Into<String>) -> Self {
        self.involve_npc = true;
        self.npc_name = Some(name.into());
        self
    }

    /// Mark the verdict as opening a new scene.
    pub fn with_new_scene(mut self) -> Self {
        self.new_scene = true;
        self
    }
}

/// One NPC's spoken reply, with optional record changes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DialogueTurn {
    pub dialogue: String,
    pub npc_changes: Option<NpcPatch>,
}

/// Narrator output: prose plus an optional state delta.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Narration {
    pub narration: String,
    pub state_changes: Option<StatePatch>,
}

// ============================================================================
// Context projections
// ============================================================================

/// What the validator sees of the document.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationContext {
    pub location: String,
    pub rank: Rank,
    pub level: u32,
    pub inventory: Vec<String>,
}

/// Scene framing handed to the dialogue generator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneContext {
    pub location: String,
    pub time: String,
    pub dungeon: Option<String>,
}

/// One line of recent conversation inside a context bundle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextLine {
    pub role: Role,
    pub text: String,
}

/// Everything the narrator gets to work with: the recent history window
/// (read-only, within the token budget), all summaries concatenated in
/// chronological order, and a player/world snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextBundle {
    pub recent: Vec<ContextLine>,
    pub summaries: String,
    pub player: Player,
    pub world: World,
}

// ============================================================================
// Capabilities
// ============================================================================

/// Judges whether a raw action is possible in the current scene.
#[async_trait]
pub trait Validator: Send + Sync {
    async fn validate(
        &self,
        action: &str,
        context: &ValidationContext,
    ) -> Result<Verdict, BackendError>;
}

/// Produces in-character NPC dialogue.
#[async_trait]
pub trait DialogueGenerator: Send + Sync {
    async fn generate_dialogue(
        &self,
        npc_name: &str,
        action: &str,
        npc_state: &NpcRecord,
        scene: &SceneContext,
    ) -> Result<DialogueTurn, BackendError>;
}

/// Produces the turn's narration and state delta.
#[async_trait]
pub trait Narrator: Send + Sync {
    async fn generate_narration(
        &self,
        action: &str,
        npc_dialogue: Option<&str>,
        context: &ContextBundle,
    ) -> Result<Narration, BackendError>;
}

/// Compacts a batch of history entries into one summary.
#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, chunks: &[String]) -> Result<String, BackendError>;
}

/// The full generator suite the orchestrator runs against.
pub trait Backend: Validator + DialogueGenerator + Narrator + Summarizer {}

impl<T: Validator + DialogueGenerator + Narrator + Summarizer> Backend for T {}
