//! Narrative game engine with pluggable generator backends.
//!
//! This crate provides:
//! - A game-state document with deep-merge patch semantics
//! - A rolling conversation history with token-budgeted summarization
//! - A turn orchestrator that validates, voices NPCs, narrates, and
//!   applies state changes in a fixed phase order
//! - Session save/load persistence
//!
//! # Quick Start
//!
//! ```ignore
//! use saga_core::{GameSession, SessionConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = SessionConfig::new("Jin")
//!         .with_initial_context("The gate shimmers at the edge of the plaza.");
//!
//!     let backend = my_backend(); // anything implementing the four generator traits
//!     let mut session = GameSession::new(config, backend);
//!
//!     let report = session.player_action("step through the gate").await?;
//!     println!("{}", report.narration);
//!
//!     session.save("run.json").await?;
//!     Ok(())
//! }
//! ```

pub mod backend;
pub mod config;
pub mod document;
pub mod history;
pub mod orchestrator;
pub mod patch;
pub mod persist;
pub mod session;
pub mod store;
pub mod testing;
pub mod tokens;

// Primary public API
pub use backend::{
    Backend, BackendError, ContextBundle, ContextLine, DialogueGenerator, DialogueTurn, Narration,
    Narrator, SceneContext, Summarizer, ValidationContext, Validator, Verdict,
};
pub use config::CoreConfig;
pub use document::{GameStateDocument, ItemStack, NpcRecord, Player, Quests, Rank, Stats, World};
pub use history::{CompactionReport, ConversationEntry, HistoryWindow, Role, SummaryEntry};
pub use orchestrator::{ActionOrchestrator, TurnError, TurnPhase, TurnReport};
pub use patch::{NpcPatch, PlayerPatch, QuestsPatch, StatePatch, StatsPatch, WorldPatch};
pub use persist::{save_path, SaveError, SavedGame, SAVE_VERSION};
pub use session::{GameSession, SessionConfig, SessionError};
pub use store::{StateStore, StoreError};
pub use testing::{MockBackend, MockTurn, TestHarness};
pub use tokens::estimate_tokens;
