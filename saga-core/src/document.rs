//! The game-state document.
//!
//! Contains all types for representing a running adventure: the player
//! character, the world, NPC records, quests, and the free-form event
//! log. The document is a plain data aggregate; all mutation goes
//! through [`crate::store::StateStore`].

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::config::CoreConfig;

// ============================================================================
// Player
// ============================================================================

/// Hunter rank, ordered weakest to strongest.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub enum Rank {
    #[default]
    E,
    D,
    C,
    B,
    A,
    S,
}

impl fmt::Display for Rank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let letter = match self {
            Rank::E => "E",
            Rank::D => "D",
            Rank::C => "C",
            Rank::B => "B",
            Rank::A => "A",
            Rank::S => "S",
        };
        write!(f, "{letter}")
    }
}

/// The five core stats.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stats {
    pub strength: u32,
    pub agility: u32,
    pub vitality: u32,
    pub intelligence: u32,
    pub perception: u32,
}

impl Default for Stats {
    fn default() -> Self {
        Self {
            strength: 10,
            agility: 10,
            vitality: 10,
            intelligence: 10,
            perception: 10,
        }
    }
}

/// One inventory line, identified by case-insensitive name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ItemStack {
    pub name: String,

    /// Item category ("weapon", "consumable", ...). Free text.
    #[serde(rename = "type")]
    pub kind: String,

    pub description: String,

    /// Stack size. A stored stack is always >= 1; in a patch an
    /// unspecified quantity defaults to 1.
    pub quantity: u32,
}

impl ItemStack {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Set the stack quantity.
    pub fn with_quantity(mut self, quantity: u32) -> Self {
        self.quantity = quantity;
        self
    }

    /// Set the item category.
    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = kind.into();
        self
    }

    /// Whether two stacks refer to the same item.
    pub fn same_item(&self, name: &str) -> bool {
        self.name.to_lowercase() == name.to_lowercase()
    }
}

impl Default for ItemStack {
    fn default() -> Self {
        Self {
            name: String::new(),
            kind: String::new(),
            description: String::new(),
            quantity: 1,
        }
    }
}

/// The player character.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    pub name: String,
    pub rank: Rank,
    pub level: u32,
    pub experience: u64,
    pub hp: u32,
    pub mp: u32,
    pub stats: Stats,
    pub inventory: Vec<ItemStack>,
    pub gold: u64,
}

impl Player {
    /// Create a level-1 character with full HP for the given config.
    pub fn new(name: impl Into<String>, config: &CoreConfig) -> Self {
        Self {
            name: name.into(),
            rank: Rank::E,
            level: 1,
            experience: 0,
            hp: config.max_hp(1),
            mp: 50,
            stats: Stats::default(),
            inventory: Vec::new(),
            gold: 0,
        }
    }

    /// Find an inventory stack by case-insensitive name.
    pub fn find_stack(&self, name: &str) -> Option<&ItemStack> {
        self.inventory.iter().find(|s| s.same_item(name))
    }

    /// Inventory item names, in order.
    pub fn inventory_names(&self) -> Vec<String> {
        self.inventory.iter().map(|s| s.name.clone()).collect()
    }
}

// ============================================================================
// World
// ============================================================================

/// Where and when the story currently is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct World {
    /// Free-text location description.
    pub location: String,

    /// Free-text time or turn marker.
    pub time: String,

    /// Active dungeon, if the player is inside one.
    pub dungeon: Option<String>,
}

impl World {
    pub fn new(location: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            time: "Day 1".to_string(),
            dungeon: None,
        }
    }
}

// ============================================================================
// NPCs
// ============================================================================

/// What the story knows about one NPC. All fields are flat; updates are
/// shallow merges.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct NpcRecord {
    /// Relationship tag ("stranger", "ally", "hostile", ...).
    pub relationship: String,

    /// Where the player last saw this NPC.
    pub last_seen: String,

    /// Things this NPC is known to know.
    pub knowledge: Vec<String>,
}

// ============================================================================
// Quests
// ============================================================================

/// Quest progress: one current slot plus an ordered, duplicate-free
/// record of completed quest names.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Quests {
    pub current: Option<String>,
    pub completed: Vec<String>,
}

impl Quests {
    /// Record a quest as completed, ignoring duplicates.
    pub fn record_completed(&mut self, name: &str) {
        if !self.completed.iter().any(|q| q == name) {
            self.completed.push(name.to_string());
        }
    }
}

// ============================================================================
// Document
// ============================================================================

/// The root game-state aggregate. Owned by the state store; every field
/// is mutated only through its update API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameStateDocument {
    pub player: Player,
    pub world: World,
    pub npcs: HashMap<String, NpcRecord>,
    pub quests: Quests,

    /// Free-form event log, append-only.
    #[serde(default)]
    pub history: Vec<String>,
}

impl GameStateDocument {
    /// Fresh document with fixed session-start defaults.
    pub fn new(
        player_name: impl Into<String>,
        starting_location: impl Into<String>,
        config: &CoreConfig,
    ) -> Self {
        Self {
            player: Player::new(player_name, config),
            world: World::new(starting_location),
            npcs: HashMap::new(),
            quests: Quests::default(),
            history: Vec::new(),
        }
    }
}
