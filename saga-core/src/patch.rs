//! State patches.
//!
//! Narrators hand back structural deltas as loosely-shaped JSON. That
//! wire shape is deserialized into [`StatePatch`], then decomposed into
//! an ordered list of explicit [`PatchOp`] variants before anything
//! touches the document. Special-cased keys (`inventoryAdd`,
//! `inventoryRemove`, `completeQuest`, top-level `history`) become their
//! own ops and are stripped from the generic merge.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;

use crate::document::{ItemStack, Rank};

/// Deserializer for double-optioned fields. A plain `Option<Option<T>>`
/// folds an explicit `null` into the outer `None`; this maps any present
/// value, `null` included, to `Some(...)`, so only an absent key yields
/// the outer `None`.
fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Deserialize::deserialize(deserializer).map(Some)
}

// ============================================================================
// Wire shape
// ============================================================================

/// Partial update to the player record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PlayerPatch {
    pub name: Option<String>,
    pub rank: Option<Rank>,
    pub level: Option<u32>,
    pub experience: Option<u64>,
    pub hp: Option<u32>,
    pub mp: Option<u32>,
    pub stats: Option<StatsPatch>,

    /// Wholesale inventory replacement (generic array-overwrite path).
    pub inventory: Option<Vec<ItemStack>>,

    /// Special-cased: stacks to add or increment.
    pub inventory_add: Option<Vec<ItemStack>>,

    /// Special-cased: stacks to decrement or remove.
    pub inventory_remove: Option<Vec<ItemStack>>,

    pub gold: Option<u64>,
}

/// Partial update to the stat block. Recursed into key-by-key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatsPatch {
    pub strength: Option<u32>,
    pub agility: Option<u32>,
    pub vitality: Option<u32>,
    pub intelligence: Option<u32>,
    pub perception: Option<u32>,
}

/// Partial update to the world record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct WorldPatch {
    pub location: Option<String>,
    pub time: Option<String>,

    /// Double-optioned so an explicit `"dungeon": null` clears the
    /// active dungeon while an absent key leaves it alone.
    #[serde(
        default,
        deserialize_with = "double_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub dungeon: Option<Option<String>>,
}

/// Shallow update to one NPC record. NPC fields are flat, so present
/// fields overwrite and absent fields are untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct NpcPatch {
    pub relationship: Option<String>,
    pub last_seen: Option<String>,
    pub knowledge: Option<Vec<String>>,
}

/// Partial update to quest progress.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct QuestsPatch {
    /// Double-optioned: `"current": null` clears the slot, an absent key
    /// leaves it unchanged.
    #[serde(
        default,
        deserialize_with = "double_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub current: Option<Option<String>>,

    /// Wholesale replacement of the completed list (generic
    /// array-overwrite path; deduplicated on apply).
    pub completed: Option<Vec<String>>,

    /// Special-cased: mark this quest completed.
    pub complete_quest: Option<String>,
}

/// A structural delta to the game-state document, as produced by the
/// narrator. Absent keys mean "leave unchanged".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StatePatch {
    pub player: Option<PlayerPatch>,
    pub world: Option<WorldPatch>,
    pub npcs: Option<HashMap<String, NpcPatch>>,
    pub quests: Option<QuestsPatch>,

    /// Special-cased: lines appended to the event log, never merged.
    pub history: Option<Vec<String>>,
}

// ============================================================================
// Explicit ops
// ============================================================================

/// One explicit state operation. The store dispatches on this tag
/// rather than sniffing object shapes.
#[derive(Debug, Clone, PartialEq)]
pub enum PatchOp {
    /// Increment or append inventory stacks.
    InventoryAdd(Vec<ItemStack>),

    /// Decrement or remove inventory stacks.
    InventoryRemove(Vec<ItemStack>),

    /// Mark a quest completed; `replacement` is the patch's new current
    /// quest, if it specified one.
    CompleteQuest {
        name: String,
        replacement: Option<String>,
    },

    /// Append lines to the event log.
    AppendHistory(Vec<String>),

    /// Generic deep merge of whatever remains after the special keys
    /// are stripped.
    Merge(StatePatch),
}

impl StatePatch {
    /// Decompose into ordered ops: special-cased keys first, stripped
    /// from the patch, then the generic merge of the remainder.
    pub fn into_ops(mut self) -> Vec<PatchOp> {
        let mut ops = Vec::new();

        if let Some(player) = self.player.as_mut() {
            if let Some(add) = player.inventory_add.take() {
                if !add.is_empty() {
                    ops.push(PatchOp::InventoryAdd(add));
                }
            }
            if let Some(remove) = player.inventory_remove.take() {
                if !remove.is_empty() {
                    ops.push(PatchOp::InventoryRemove(remove));
                }
            }
        }

        if let Some(quests) = self.quests.as_mut() {
            if let Some(name) = quests.complete_quest.take() {
                ops.push(PatchOp::CompleteQuest {
                    name,
                    replacement: quests.current.clone().flatten(),
                });
            }
        }

        if let Some(lines) = self.history.take() {
            if !lines.is_empty() {
                ops.push(PatchOp::AppendHistory(lines));
            }
        }

        ops.push(PatchOp::Merge(self));
        ops
    }
}
