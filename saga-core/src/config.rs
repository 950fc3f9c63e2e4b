//! Engine configuration.

use serde::{Deserialize, Serialize};

/// Default live-history token budget.
pub const DEFAULT_HISTORY_BUDGET: usize = 20_000;

/// Default token size of one summarization chunk.
pub const DEFAULT_SUMMARY_CHUNK_TOKENS: usize = 2_500;

/// Tunables for the state store and history window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreConfig {
    /// Maximum total token cost of live history entries.
    pub history_budget: usize,

    /// Token size at which an excess-history chunk is flushed to the
    /// summarizer.
    pub summary_chunk_tokens: usize,

    /// Player HP maximum at level 1.
    pub base_hp: u32,

    /// Additional HP maximum per level beyond the first.
    pub hp_per_level: u32,
}

impl CoreConfig {
    pub fn new() -> Self {
        Self {
            history_budget: DEFAULT_HISTORY_BUDGET,
            summary_chunk_tokens: DEFAULT_SUMMARY_CHUNK_TOKENS,
            base_hp: 100,
            hp_per_level: 10,
        }
    }

    /// Set the live-history token budget.
    pub fn with_history_budget(mut self, budget: usize) -> Self {
        self.history_budget = budget;
        self
    }

    /// Set the summarization chunk size in tokens.
    pub fn with_summary_chunk_tokens(mut self, tokens: usize) -> Self {
        self.summary_chunk_tokens = tokens;
        self
    }

    /// Set the HP curve.
    pub fn with_hp_curve(mut self, base_hp: u32, hp_per_level: u32) -> Self {
        self.base_hp = base_hp;
        self.hp_per_level = hp_per_level;
        self
    }

    /// Maximum HP for a character of the given level. Saturates rather
    /// than overflowing; patches can carry arbitrary levels.
    pub fn max_hp(&self, level: u32) -> u32 {
        self.base_hp
            .saturating_add(self.hp_per_level.saturating_mul(level.saturating_sub(1)))
    }
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CoreConfig::default();
        assert_eq!(config.history_budget, 20_000);
        assert_eq!(config.summary_chunk_tokens, 2_500);
    }

    #[test]
    fn test_max_hp_curve() {
        let config = CoreConfig::new().with_hp_curve(100, 10);
        assert_eq!(config.max_hp(1), 100);
        assert_eq!(config.max_hp(5), 140);
        // Level 0 never occurs, but must not underflow.
        assert_eq!(config.max_hp(0), 100);
    }

    #[test]
    fn test_max_hp_saturates_at_absurd_levels() {
        let config = CoreConfig::new().with_hp_curve(100, 10);
        assert_eq!(config.max_hp(u32::MAX), u32::MAX);
    }

    #[test]
    fn test_builder() {
        let config = CoreConfig::new()
            .with_history_budget(500)
            .with_summary_chunk_tokens(100);
        assert_eq!(config.history_budget, 500);
        assert_eq!(config.summary_chunk_tokens, 100);
    }
}
