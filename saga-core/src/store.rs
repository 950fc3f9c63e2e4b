//! The state store.
//!
//! Single owner of the canonical [`GameStateDocument`]. All mutation
//! flows through [`StateStore::update`], which decomposes a patch into
//! explicit ops and applies them in order: inventory add, inventory
//! remove, quest completion, history append, then the generic deep
//! merge. Missing keys never error; only touching an uninitialized
//! store does.

use thiserror::Error;
use tracing::debug;

use crate::config::CoreConfig;
use crate::document::{GameStateDocument, ItemStack, NpcRecord, Player, Quests, World};
use crate::patch::{NpcPatch, PatchOp, PlayerPatch, QuestsPatch, StatePatch, StatsPatch, WorldPatch};

/// Errors from state store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Programming error: the store was used before a document was
    /// installed.
    #[error("state store used before initialization")]
    Uninitialized,
}

/// Owns and mutates the game-state document.
#[derive(Debug, Clone)]
pub struct StateStore {
    doc: Option<GameStateDocument>,
    config: CoreConfig,
}

impl StateStore {
    /// Create a store with a document already installed.
    pub fn new(doc: GameStateDocument, config: CoreConfig) -> Self {
        Self {
            doc: Some(doc),
            config,
        }
    }

    /// Create an empty store. Every operation except `initialize` and
    /// `replace` fails until a document is installed.
    pub fn uninitialized(config: CoreConfig) -> Self {
        Self { doc: None, config }
    }

    /// Install a document into an empty store.
    pub fn initialize(&mut self, doc: GameStateDocument) {
        self.doc = Some(doc);
    }

    /// Replace the document wholesale (load path).
    pub fn replace(&mut self, doc: GameStateDocument) {
        self.doc = Some(doc);
    }

    /// Whether a document is installed.
    pub fn is_initialized(&self) -> bool {
        self.doc.is_some()
    }

    /// Borrow the document.
    pub fn document(&self) -> Result<&GameStateDocument, StoreError> {
        self.doc.as_ref().ok_or(StoreError::Uninitialized)
    }

    /// Immutable snapshot for rendering. External readers never touch
    /// the live document.
    pub fn snapshot(&self) -> Result<GameStateDocument, StoreError> {
        self.document().cloned()
    }

    /// The config this store was built with.
    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    /// Apply a structural delta to the document.
    pub fn update(&mut self, patch: StatePatch) -> Result<(), StoreError> {
        let config = self.config.clone();
        let doc = self.doc.as_mut().ok_or(StoreError::Uninitialized)?;

        for op in patch.into_ops() {
            debug!(?op, "applying state op");
            match op {
                PatchOp::InventoryAdd(stacks) => inventory_add(&mut doc.player, stacks),
                PatchOp::InventoryRemove(stacks) => inventory_remove(&mut doc.player, stacks),
                PatchOp::CompleteQuest { name, replacement } => {
                    complete_quest(&mut doc.quests, &name, replacement)
                }
                PatchOp::AppendHistory(lines) => doc.history.extend(lines),
                PatchOp::Merge(rest) => merge_document(doc, rest, &config),
            }
        }

        enforce_invariants(doc, &config);
        Ok(())
    }

    /// Read-only view of one NPC record. Returns an empty record for an
    /// unknown name; never creates an entry.
    pub fn get_npc(&self, name: &str) -> Result<NpcRecord, StoreError> {
        let doc = self.document()?;
        Ok(doc.npcs.get(name).cloned().unwrap_or_default())
    }

    /// Shallow-merge changes into one NPC record, creating it lazily.
    pub fn update_npc(&mut self, name: &str, changes: NpcPatch) -> Result<(), StoreError> {
        let doc = self.doc.as_mut().ok_or(StoreError::Uninitialized)?;
        debug!(npc = name, "updating npc record");
        let record = doc.npcs.entry(name.to_string()).or_default();
        merge_npc(record, changes);
        Ok(())
    }
}

// ============================================================================
// Special-case reducers
// ============================================================================

/// Increment matching stacks, append the rest. Identity is the
/// case-normalized item name; at most one stack per name.
fn inventory_add(player: &mut Player, stacks: Vec<ItemStack>) {
    for incoming in stacks {
        let quantity = incoming.quantity.max(1);
        if let Some(existing) = player
            .inventory
            .iter_mut()
            .find(|s| s.same_item(&incoming.name))
        {
            existing.quantity += quantity;
        } else {
            player.inventory.push(ItemStack {
                quantity,
                ..incoming
            });
        }
    }
}

/// Decrement matching stacks, dropping a stack entirely when the
/// removal meets or exceeds its quantity. Unknown items and explicit
/// zero removals are silent no-ops; an unspecified quantity arrives as
/// the wire default of 1.
fn inventory_remove(player: &mut Player, stacks: Vec<ItemStack>) {
    for outgoing in stacks {
        if outgoing.quantity == 0 {
            continue;
        }
        if let Some(idx) = player
            .inventory
            .iter()
            .position(|s| s.same_item(&outgoing.name))
        {
            if player.inventory[idx].quantity > outgoing.quantity {
                player.inventory[idx].quantity -= outgoing.quantity;
            } else {
                player.inventory.remove(idx);
            }
        }
    }
}

/// Quest completion. Completing the current quest moves it into the
/// completed list and installs the replacement (or clears the slot);
/// completing any other name only records it, idempotently.
fn complete_quest(quests: &mut Quests, name: &str, replacement: Option<String>) {
    if quests.current.as_deref() == Some(name) {
        quests.record_completed(name);
        quests.current = replacement;
    } else {
        quests.record_completed(name);
    }
}

// ============================================================================
// Generic merge
// ============================================================================

fn merge_document(doc: &mut GameStateDocument, patch: StatePatch, config: &CoreConfig) {
    if let Some(player) = patch.player {
        merge_player(&mut doc.player, player, config);
    }
    if let Some(world) = patch.world {
        merge_world(&mut doc.world, world);
    }
    if let Some(npcs) = patch.npcs {
        for (name, changes) in npcs {
            let record = doc.npcs.entry(name).or_default();
            merge_npc(record, changes);
        }
    }
    if let Some(quests) = patch.quests {
        merge_quests(&mut doc.quests, quests);
    }
}

fn merge_player(player: &mut Player, patch: PlayerPatch, config: &CoreConfig) {
    if let Some(name) = patch.name {
        player.name = name;
    }
    if let Some(rank) = patch.rank {
        player.rank = rank;
    }
    if let Some(level) = patch.level {
        player.level = level.max(1);
    }
    if let Some(experience) = patch.experience {
        player.experience = experience;
    }
    if let Some(hp) = patch.hp {
        player.hp = hp;
    }
    if let Some(mp) = patch.mp {
        player.mp = mp;
    }
    if let Some(stats) = patch.stats {
        merge_stats(player, stats);
    }
    if let Some(inventory) = patch.inventory {
        // Arrays overwrite on the generic path.
        player.inventory = inventory;
    }
    if let Some(gold) = patch.gold {
        player.gold = gold;
    }
    let cap = config.max_hp(player.level);
    if player.hp > cap {
        player.hp = cap;
    }
}

fn merge_stats(player: &mut Player, patch: StatsPatch) {
    let stats = &mut player.stats;
    if let Some(v) = patch.strength {
        stats.strength = v;
    }
    if let Some(v) = patch.agility {
        stats.agility = v;
    }
    if let Some(v) = patch.vitality {
        stats.vitality = v;
    }
    if let Some(v) = patch.intelligence {
        stats.intelligence = v;
    }
    if let Some(v) = patch.perception {
        stats.perception = v;
    }
}

fn merge_world(world: &mut World, patch: WorldPatch) {
    if let Some(location) = patch.location {
        world.location = location;
    }
    if let Some(time) = patch.time {
        world.time = time;
    }
    if let Some(dungeon) = patch.dungeon {
        world.dungeon = dungeon;
    }
}

fn merge_npc(record: &mut NpcRecord, patch: NpcPatch) {
    if let Some(relationship) = patch.relationship {
        record.relationship = relationship;
    }
    if let Some(last_seen) = patch.last_seen {
        record.last_seen = last_seen;
    }
    if let Some(knowledge) = patch.knowledge {
        record.knowledge = knowledge;
    }
}

fn merge_quests(quests: &mut Quests, patch: QuestsPatch) {
    if let Some(current) = patch.current {
        quests.current = current;
    }
    if let Some(completed) = patch.completed {
        // Overwrite, but keep the list duplicate-free.
        quests.completed.clear();
        for name in completed {
            quests.record_completed(&name);
        }
    }
}

/// Document-level invariants that must hold after every update: the
/// completed list never contains the quest that is still current, and
/// no stored stack sits at quantity zero.
fn enforce_invariants(doc: &mut GameStateDocument, _config: &CoreConfig) {
    if let Some(current) = doc.quests.current.clone() {
        doc.quests.completed.retain(|q| q != &current);
    }
    doc.player.inventory.retain(|s| s.quantity > 0);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Rank;

    fn store() -> StateStore {
        let config = CoreConfig::default();
        let doc = GameStateDocument::new("Jin", "The Gate Plaza", &config);
        StateStore::new(doc, config)
    }

    fn patch(json: &str) -> StatePatch {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_uninitialized_store_errors() {
        let mut store = StateStore::uninitialized(CoreConfig::default());
        assert!(matches!(
            store.update(StatePatch::default()),
            Err(StoreError::Uninitialized)
        ));
        assert!(store.get_npc("Cha").is_err());
        store.initialize(GameStateDocument::new("Jin", "Plaza", &CoreConfig::default()));
        assert!(store.update(StatePatch::default()).is_ok());
    }

    #[test]
    fn test_scalar_merge_leaves_siblings_untouched() {
        let mut store = store();
        let before = store.snapshot().unwrap();

        store.update(patch(r#"{"player": {"hp": 50}}"#)).unwrap();

        let doc = store.document().unwrap();
        assert_eq!(doc.player.hp, 50);
        assert_eq!(doc.player.mp, before.player.mp);
        assert_eq!(doc.player.level, before.player.level);
        assert_eq!(doc.player.name, before.player.name);
        assert_eq!(doc.world, before.world);
    }

    #[test]
    fn test_nested_stats_merge_recurses() {
        let mut store = store();
        store
            .update(patch(r#"{"player": {"stats": {"strength": 25}}}"#))
            .unwrap();
        let stats = &store.document().unwrap().player.stats;
        assert_eq!(stats.strength, 25);
        assert_eq!(stats.agility, 10);
    }

    #[test]
    fn test_hp_clamped_to_level_cap() {
        let mut store = store();
        store.update(patch(r#"{"player": {"hp": 9999}}"#)).unwrap();
        assert_eq!(store.document().unwrap().player.hp, 100);

        // Raising the level in the same patch raises the cap first.
        store
            .update(patch(r#"{"player": {"level": 5, "hp": 9999}}"#))
            .unwrap();
        assert_eq!(store.document().unwrap().player.hp, 140);
    }

    #[test]
    fn test_level_floor_is_one() {
        let mut store = store();
        store.update(patch(r#"{"player": {"level": 0}}"#)).unwrap();
        assert_eq!(store.document().unwrap().player.level, 1);
    }

    #[test]
    fn test_inventory_stacking() {
        let mut store = store();
        let add = r#"{"player": {"inventoryAdd": [{"name": "Potion", "quantity": 2}]}}"#;
        store.update(patch(add)).unwrap();
        store.update(patch(add)).unwrap();

        let inventory = &store.document().unwrap().player.inventory;
        assert_eq!(inventory.len(), 1);
        assert_eq!(inventory[0].name, "Potion");
        assert_eq!(inventory[0].quantity, 4);
    }

    #[test]
    fn test_item_identity_is_case_insensitive() {
        let mut store = store();
        store
            .update(patch(r#"{"player": {"inventoryAdd": [{"name": "sword"}]}}"#))
            .unwrap();
        store
            .update(patch(r#"{"player": {"inventoryAdd": [{"name": "Sword"}]}}"#))
            .unwrap();

        let inventory = &store.document().unwrap().player.inventory;
        assert_eq!(inventory.len(), 1);
        assert_eq!(inventory[0].quantity, 2);
        // First spelling wins for the stored name.
        assert_eq!(inventory[0].name, "sword");
    }

    #[test]
    fn test_add_defaults_quantity_to_one() {
        let mut store = store();
        store
            .update(patch(r#"{"player": {"inventoryAdd": [{"name": "Rope"}]}}"#))
            .unwrap();
        assert_eq!(store.document().unwrap().player.inventory[0].quantity, 1);
    }

    #[test]
    fn test_remove_decrements_then_drops() {
        let mut store = store();
        store
            .update(patch(
                r#"{"player": {"inventoryAdd": [{"name": "Potion", "quantity": 3}]}}"#,
            ))
            .unwrap();

        store
            .update(patch(
                r#"{"player": {"inventoryRemove": [{"name": "potion", "quantity": 1}]}}"#,
            ))
            .unwrap();
        assert_eq!(store.document().unwrap().player.inventory[0].quantity, 2);

        // Removal >= remaining quantity drops the stack entirely.
        store
            .update(patch(
                r#"{"player": {"inventoryRemove": [{"name": "Potion", "quantity": 5}]}}"#,
            ))
            .unwrap();
        assert!(store.document().unwrap().player.inventory.is_empty());
    }

    #[test]
    fn test_remove_missing_item_is_noop() {
        let mut store = store();
        let before = store.snapshot().unwrap();
        store
            .update(patch(r#"{"player": {"inventoryRemove": [{"name": "Ghost Blade"}]}}"#))
            .unwrap();
        assert_eq!(store.snapshot().unwrap(), before);
    }

    #[test]
    fn test_remove_explicit_zero_is_noop() {
        let mut store = store();
        store
            .update(patch(r#"{"player": {"inventoryAdd": [{"name": "Potion", "quantity": 2}]}}"#))
            .unwrap();
        store
            .update(patch(
                r#"{"player": {"inventoryRemove": [{"name": "Potion", "quantity": 0}]}}"#,
            ))
            .unwrap();
        assert_eq!(store.document().unwrap().player.inventory[0].quantity, 2);
    }

    #[test]
    fn test_generic_inventory_overwrites_whole_array() {
        let mut store = store();
        store
            .update(patch(r#"{"player": {"inventoryAdd": [{"name": "Potion", "quantity": 9}]}}"#))
            .unwrap();
        store
            .update(patch(r#"{"player": {"inventory": [{"name": "Key"}]}}"#))
            .unwrap();
        let inventory = &store.document().unwrap().player.inventory;
        assert_eq!(inventory.len(), 1);
        assert_eq!(inventory[0].name, "Key");
    }

    #[test]
    fn test_complete_current_quest_moves_it() {
        let mut store = store();
        store
            .update(patch(r#"{"quests": {"current": "Clear the Gate"}}"#))
            .unwrap();
        store
            .update(patch(
                r#"{"quests": {"completeQuest": "Clear the Gate", "current": "Find the Key"}}"#,
            ))
            .unwrap();

        let quests = &store.document().unwrap().quests;
        assert_eq!(quests.completed, vec!["Clear the Gate"]);
        assert_eq!(quests.current.as_deref(), Some("Find the Key"));
    }

    #[test]
    fn test_complete_quest_clears_current_when_unspecified() {
        let mut store = store();
        store
            .update(patch(r#"{"quests": {"current": "Clear the Gate"}}"#))
            .unwrap();
        store
            .update(patch(r#"{"quests": {"completeQuest": "Clear the Gate"}}"#))
            .unwrap();

        let quests = &store.document().unwrap().quests;
        assert!(quests.current.is_none());
        assert_eq!(quests.completed, vec!["Clear the Gate"]);
    }

    #[test]
    fn test_complete_quest_is_idempotent() {
        let mut store = store();
        store
            .update(patch(r#"{"quests": {"current": "Clear the Gate"}}"#))
            .unwrap();
        store
            .update(patch(r#"{"quests": {"completeQuest": "Clear the Gate"}}"#))
            .unwrap();
        store
            .update(patch(r#"{"quests": {"completeQuest": "Clear the Gate"}}"#))
            .unwrap();

        let quests = &store.document().unwrap().quests;
        assert_eq!(quests.completed.len(), 1);
        assert!(quests.current.is_none());
    }

    #[test]
    fn test_complete_non_current_quest_records_only() {
        let mut store = store();
        store
            .update(patch(r#"{"quests": {"current": "Clear the Gate"}}"#))
            .unwrap();
        store
            .update(patch(r#"{"quests": {"completeQuest": "Side Errand"}}"#))
            .unwrap();

        let quests = &store.document().unwrap().quests;
        assert_eq!(quests.current.as_deref(), Some("Clear the Gate"));
        assert_eq!(quests.completed, vec!["Side Errand"]);
    }

    #[test]
    fn test_history_appends_not_merges() {
        let mut store = store();
        store
            .update(patch(r#"{"history": ["First entry."]}"#))
            .unwrap();
        store
            .update(patch(r#"{"history": ["Second entry.", "Third entry."]}"#))
            .unwrap();
        assert_eq!(
            store.document().unwrap().history,
            vec!["First entry.", "Second entry.", "Third entry."]
        );
    }

    #[test]
    fn test_get_npc_never_creates() {
        let store = store();
        let record = store.get_npc("Cha Hae-In").unwrap();
        assert_eq!(record, NpcRecord::default());
        assert!(store.document().unwrap().npcs.is_empty());
    }

    #[test]
    fn test_update_npc_creates_lazily_and_shallow_merges() {
        let mut store = store();
        store
            .update_npc(
                "Cha Hae-In",
                NpcPatch {
                    relationship: Some("ally".to_string()),
                    ..NpcPatch::default()
                },
            )
            .unwrap();
        store
            .update_npc(
                "Cha Hae-In",
                NpcPatch {
                    last_seen: Some("Guild Hall".to_string()),
                    ..NpcPatch::default()
                },
            )
            .unwrap();

        let record = store.get_npc("Cha Hae-In").unwrap();
        assert_eq!(record.relationship, "ally");
        assert_eq!(record.last_seen, "Guild Hall");
    }

    #[test]
    fn test_npcs_merge_path_uses_same_semantics() {
        let mut store = store();
        store
            .update(patch(
                r#"{"npcs": {"Woo Jin-Chul": {"relationship": "wary"}}}"#,
            ))
            .unwrap();
        assert_eq!(store.get_npc("Woo Jin-Chul").unwrap().relationship, "wary");
    }

    #[test]
    fn test_world_merge_and_dungeon_clear() {
        let mut store = store();
        store
            .update(patch(r#"{"world": {"location": "D-Rank Gate", "dungeon": "Goblin Den"}}"#))
            .unwrap();
        let world = &store.document().unwrap().world;
        assert_eq!(world.location, "D-Rank Gate");
        assert_eq!(world.dungeon.as_deref(), Some("Goblin Den"));

        store
            .update(patch(r#"{"world": {"dungeon": null}}"#))
            .unwrap();
        assert!(store.document().unwrap().world.dungeon.is_none());
    }

    #[test]
    fn test_rank_merge() {
        let mut store = store();
        store.update(patch(r#"{"player": {"rank": "B"}}"#)).unwrap();
        assert_eq!(store.document().unwrap().player.rank, Rank::B);
    }

    #[test]
    fn test_completed_never_contains_current() {
        let mut store = store();
        store
            .update(patch(r#"{"quests": {"completed": ["Old Hunt"], "current": "Old Hunt"}}"#))
            .unwrap();
        let quests = &store.document().unwrap().quests;
        assert_eq!(quests.current.as_deref(), Some("Old Hunt"));
        assert!(quests.completed.is_empty());
    }
}
