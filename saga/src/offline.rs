//! Deterministic offline backend.
//!
//! Implements the four generator capabilities with simple rules instead
//! of a remote model, so the client is playable (and scriptable) with
//! no network or credentials. The rules are intentionally transparent:
//! empty input is rejected, "talk to <name>" involves that NPC,
//! "enter"/"descend" opens a new scene, and every resolved action earns
//! ten experience.

use async_trait::async_trait;
use saga_core::{
    BackendError, ContextBundle, DialogueGenerator, DialogueTurn, Narration, Narrator, NpcRecord,
    SceneContext, Summarizer, ValidationContext, Validator, Verdict,
};

const EXPERIENCE_PER_TURN: u64 = 10;

/// Rule-based stand-in for a narrative generator service.
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineBackend;

impl OfflineBackend {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Validator for OfflineBackend {
    async fn validate(
        &self,
        action: &str,
        _context: &ValidationContext,
    ) -> Result<Verdict, BackendError> {
        let action = action.trim();
        if action.is_empty() {
            return Ok(Verdict::rejected("Say what you want to do."));
        }

        const TALK_PREFIX: &str = "talk to ";
        if action
            .get(..TALK_PREFIX.len())
            .is_some_and(|p| p.eq_ignore_ascii_case(TALK_PREFIX))
        {
            let name = action[TALK_PREFIX.len()..].trim();
            if name.is_empty() {
                return Ok(Verdict::rejected("Talk to whom?"));
            }
            return Ok(Verdict::approved().with_npc(name));
        }

        let lowered = action.to_lowercase();
        let mut verdict = Verdict::approved();
        if lowered.starts_with("enter") || lowered.starts_with("descend") {
            verdict = verdict.with_new_scene();
        }
        Ok(verdict)
    }
}

#[async_trait]
impl DialogueGenerator for OfflineBackend {
    async fn generate_dialogue(
        &self,
        npc_name: &str,
        action: &str,
        npc_state: &NpcRecord,
        scene: &SceneContext,
    ) -> Result<DialogueTurn, BackendError> {
        let dialogue = if npc_state.relationship.is_empty() {
            format!("\"{npc_name} here. First time at {}, hunter?\"", scene.location)
        } else {
            format!("\"Back again? You said: {action}.\"")
        };

        let changes = saga_core::NpcPatch {
            relationship: if npc_state.relationship.is_empty() {
                Some("acquainted".to_string())
            } else {
                None
            },
            last_seen: Some(scene.location.clone()),
            knowledge: None,
        };

        Ok(DialogueTurn {
            dialogue,
            npc_changes: Some(changes),
        })
    }
}

#[async_trait]
impl Narrator for OfflineBackend {
    async fn generate_narration(
        &self,
        action: &str,
        npc_dialogue: Option<&str>,
        context: &ContextBundle,
    ) -> Result<Narration, BackendError> {
        let mut narration = format!(
            "You {} at {}.",
            action.trim().trim_end_matches('.'),
            context.world.location
        );
        if let Some(dialogue) = npc_dialogue {
            narration.push(' ');
            narration.push_str(dialogue);
        }

        // Merge semantics overwrite scalars, so send the new total.
        let experience = context.player.experience + EXPERIENCE_PER_TURN;
        let changes = serde_json::from_value(serde_json::json!({
            "player": { "experience": experience }
        }))
        .map_err(|e| BackendError::Malformed(e.to_string()))?;

        Ok(Narration {
            narration,
            state_changes: Some(changes),
        })
    }
}

#[async_trait]
impl Summarizer for OfflineBackend {
    async fn summarize(&self, chunks: &[String]) -> Result<String, BackendError> {
        let first = chunks
            .first()
            .map(String::as_str)
            .unwrap_or("nothing of note");
        Ok(format!(
            "[Recap: {} exchanges, beginning with \"{first:.40}\"]",
            chunks.len()
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use saga_core::{CoreConfig, Player, Rank, World};

    fn context() -> ValidationContext {
        ValidationContext {
            location: "The Gate Plaza".to_string(),
            rank: Rank::E,
            level: 1,
            inventory: vec![],
        }
    }

    #[tokio::test]
    async fn test_empty_action_is_rejected() {
        let verdict = OfflineBackend::new().validate("   ", &context()).await.unwrap();
        assert!(!verdict.valid);
    }

    #[tokio::test]
    async fn test_talk_to_routes_through_the_npc() {
        let verdict = OfflineBackend::new()
            .validate("talk to Cha Hae-In", &context())
            .await
            .unwrap();
        assert!(verdict.valid);
        assert!(verdict.involve_npc);
        assert_eq!(verdict.npc_name.as_deref(), Some("Cha Hae-In"));
    }

    #[tokio::test]
    async fn test_enter_opens_a_new_scene() {
        let verdict = OfflineBackend::new()
            .validate("enter the gate", &context())
            .await
            .unwrap();
        assert!(verdict.valid && verdict.new_scene);
    }

    #[tokio::test]
    async fn test_narration_awards_experience() {
        let bundle = ContextBundle {
            recent: vec![],
            summaries: String::new(),
            player: Player::new("Jin", &CoreConfig::default()),
            world: World {
                location: "The Gate Plaza".to_string(),
                time: "dawn".to_string(),
                dungeon: None,
            },
        };
        let narration = OfflineBackend::new()
            .generate_narration("look around", None, &bundle)
            .await
            .unwrap();
        let changes = narration.state_changes.unwrap();
        assert_eq!(changes.player.unwrap().experience, Some(10));
    }
}
