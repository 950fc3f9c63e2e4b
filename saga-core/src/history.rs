//! The rolling conversation-history window.
//!
//! Keeps an ordered log of turn entries under a token budget. Appends
//! are cheap and never compact; compaction is an explicit async step
//! because it calls out to a summarizer. When the live log overflows,
//! the oldest entries are evicted in one batch, grouped into chunks,
//! and each chunk is condensed into one append-only summary.

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, warn};

use crate::backend::Summarizer;
use crate::config::{DEFAULT_HISTORY_BUDGET, DEFAULT_SUMMARY_CHUNK_TOKENS};
use crate::tokens::estimate_tokens;

/// Who produced a history entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    Player,
    Narrator,
    Npc,
    Summary,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Role::Player => "Player",
            Role::Narrator => "Narrator",
            Role::Npc => "NPC",
            Role::Summary => "Summary",
        };
        write!(f, "{name}")
    }
}

/// One live turn entry. Token cost is computed at creation and never
/// changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationEntry {
    pub role: Role,
    pub text: String,
    pub tokens: usize,
}

impl ConversationEntry {
    fn new(role: Role, text: String) -> Self {
        let tokens = estimate_tokens(&text);
        Self { role, text, tokens }
    }
}

/// One compacted summary. Role is always [`Role::Summary`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryEntry {
    pub text: String,
    pub tokens: usize,
}

impl SummaryEntry {
    fn new(text: String) -> Self {
        let tokens = estimate_tokens(&text);
        Self { text, tokens }
    }

    pub fn role(&self) -> Role {
        Role::Summary
    }
}

/// What one compaction pass did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompactionReport {
    /// Entries moved off the live log.
    pub evicted: usize,

    /// Summaries appended.
    pub summaries_created: usize,

    /// Summaries that fell back to raw concatenated text after the
    /// summarizer failed twice for their chunk.
    pub degraded: usize,
}

/// Bounded append log of turn text with derived summaries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryWindow {
    entries: Vec<ConversationEntry>,
    summaries: Vec<SummaryEntry>,
    budget: usize,
    chunk_tokens: usize,
}

impl HistoryWindow {
    pub fn new(budget: usize, chunk_tokens: usize) -> Self {
        Self {
            entries: Vec::new(),
            summaries: Vec::new(),
            budget,
            chunk_tokens,
        }
    }

    /// Window with the default 20 000-token budget and 2 500-token
    /// summary chunks.
    pub fn with_defaults() -> Self {
        Self::new(DEFAULT_HISTORY_BUDGET, DEFAULT_SUMMARY_CHUNK_TOKENS)
    }

    /// Append one turn entry. Never compacts.
    pub fn append_turn(&mut self, role: Role, text: impl Into<String>) {
        self.entries.push(ConversationEntry::new(role, text.into()));
    }

    /// Total token cost of the live entries.
    pub fn live_tokens(&self) -> usize {
        self.entries.iter().map(|e| e.tokens).sum()
    }

    /// The live entries, oldest first.
    pub fn entries(&self) -> &[ConversationEntry] {
        &self.entries
    }

    /// The summaries, oldest first.
    pub fn summaries(&self) -> &[SummaryEntry] {
        &self.summaries
    }

    /// All summaries concatenated in chronological order.
    pub fn summary_text(&self) -> String {
        self.summaries
            .iter()
            .map(|s| s.text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// The configured token budget.
    pub fn budget(&self) -> usize {
        self.budget
    }

    /// Drop all live entries and summaries (session reset).
    pub fn clear(&mut self) {
        self.entries.clear();
        self.summaries.clear();
    }

    /// The newest contiguous suffix of live entries whose total cost
    /// fits in `budget`, oldest first. Read-only; shares the compaction
    /// keep-side accumulation but never mutates the window. The single
    /// newest entry is always included even if it alone busts the
    /// budget.
    pub fn recent_context(&self, budget: usize) -> &[ConversationEntry] {
        &self.entries[self.keep_index(budget)..]
    }

    /// Index of the oldest entry that stays live under `budget`,
    /// accumulating newest-to-oldest.
    fn keep_index(&self, budget: usize) -> usize {
        let mut total = 0usize;
        let mut split = self.entries.len();
        while split > 0 {
            let cost = self.entries[split - 1].tokens;
            // Keep the newest entry unconditionally.
            if total + cost > budget && split != self.entries.len() {
                break;
            }
            total += cost;
            split -= 1;
        }
        split
    }

    /// Compact the live log if it exceeds the budget.
    ///
    /// Excess entries (everything older than the keep suffix) are
    /// removed in one batch, grouped oldest-to-newest into chunks of at
    /// least `chunk_tokens`, and each chunk is summarized with one
    /// awaited call — strictly sequential, so summaries land in
    /// chronological order. A chunk whose summarization fails is
    /// retried once and then preserved verbatim as a degraded summary;
    /// evicted text is never silently dropped.
    pub async fn compact_if_needed<S>(&mut self, summarizer: &S) -> CompactionReport
    where
        S: Summarizer + ?Sized,
    {
        if self.live_tokens() <= self.budget {
            return CompactionReport::default();
        }

        let split = self.keep_index(self.budget);
        let excess: Vec<ConversationEntry> = self.entries.drain(..split).collect();
        let mut report = CompactionReport {
            evicted: excess.len(),
            ..CompactionReport::default()
        };
        debug!(
            evicted = report.evicted,
            live = self.entries.len(),
            "history over budget, compacting"
        );

        let mut chunk: Vec<String> = Vec::new();
        let mut chunk_cost = 0usize;
        for entry in excess {
            chunk_cost += entry.tokens;
            chunk.push(format!("{}: {}", entry.role, entry.text));
            if chunk_cost >= self.chunk_tokens {
                self.flush_chunk(&mut chunk, summarizer, &mut report).await;
                chunk_cost = 0;
            }
        }
        // Trailing partial chunk.
        self.flush_chunk(&mut chunk, summarizer, &mut report).await;

        report
    }

    async fn flush_chunk<S>(
        &mut self,
        chunk: &mut Vec<String>,
        summarizer: &S,
        report: &mut CompactionReport,
    ) where
        S: Summarizer + ?Sized,
    {
        if chunk.is_empty() {
            return;
        }
        let lines = std::mem::take(chunk);

        let text = match summarizer.summarize(&lines).await {
            Ok(text) => text,
            Err(first) => {
                warn!(error = %first, "summarizer failed, retrying chunk");
                match summarizer.summarize(&lines).await {
                    Ok(text) => text,
                    Err(second) => {
                        // The entries are already off the live log, so
                        // keep the raw text rather than lose it.
                        warn!(error = %second, "summarizer failed twice, keeping raw chunk");
                        report.degraded += 1;
                        lines.join("\n")
                    }
                }
            }
        };

        self.summaries.push(SummaryEntry::new(text));
        report.summaries_created += 1;
    }
}

impl Default for HistoryWindow {
    fn default() -> Self {
        Self::with_defaults()
    }
}
