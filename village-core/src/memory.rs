//! Per-agent tiered memory.
//!
//! Short-term memory is a bounded working buffer. When it overflows, the
//! oldest half is summarised by the backend into a single long-term entry.
//! Long-term memory is append-only and every entry is persisted before it is
//! visible in memory, so a restarted agent sees exactly what was committed.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use tracing::debug;
use village_llm::{GenerationError, PromptId};

use crate::backend::Backend;
use crate::config::MemoryConfig;
use crate::error::Result;
use crate::persistence::VillageStore;
use crate::types::MemoryTier;

/// Rendered in place of an empty long-term memory.
pub const NO_LONG_TERM: &str = "No significant past interactions.";

/// Marks text cut to fit a context bound.
const ELLIPSIS: &str = "...";

/// Memory rendered for a prompt, each part bounded in characters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MemoryContext {
    /// `- entry` lines, newest last.
    pub short_term: String,
    /// Recent long-term entries joined by spaces.
    pub long_term: String,
}

/// Render entries as `- entry` lines.
#[must_use]
pub fn format_memory(entries: &[String]) -> String {
    entries
        .iter()
        .map(|entry| format!("- {entry}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Keep the last `limit` characters of `text`, prefixed with `...` when cut.
fn keep_tail(text: &str, limit: usize) -> String {
    let len = text.chars().count();
    if len <= limit {
        return text.to_string();
    }
    let tail: String = text.chars().skip(len - limit).collect();
    format!("{ELLIPSIS}{tail}")
}

/// Keep the first `limit` characters of `text`, followed by `...` when cut.
fn keep_head(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        return text.to_string();
    }
    let head: String = text.chars().take(limit).collect();
    format!("{head}{ELLIPSIS}")
}

/// One agent's short-term buffer and long-term history.
pub struct MemoryStore {
    agent_name: String,
    short_term: Vec<String>,
    long_term: Vec<String>,
    config: MemoryConfig,
    store: Arc<VillageStore>,
    backend: Backend,
}

impl fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryStore")
            .field("agent_name", &self.agent_name)
            .field("short_term", &self.short_term.len())
            .field("long_term", &self.long_term.len())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl MemoryStore {
    /// An empty memory for `agent_name`. Nothing is read from the store.
    #[must_use]
    pub fn new(
        agent_name: impl Into<String>,
        config: MemoryConfig,
        store: Arc<VillageStore>,
        backend: Backend,
    ) -> Self {
        Self {
            agent_name: agent_name.into(),
            short_term: Vec::new(),
            long_term: Vec::new(),
            config,
            store,
            backend,
        }
    }

    /// Restore `agent_name`'s long-term memory from the store.
    ///
    /// Short-term memory always starts empty.
    ///
    /// # Errors
    ///
    /// Returns [`VillageError::Persistence`](crate::VillageError::Persistence) if the read fails.
    pub fn load(
        agent_name: impl Into<String>,
        config: MemoryConfig,
        store: Arc<VillageStore>,
        backend: Backend,
    ) -> Result<Self> {
        let mut memory = Self::new(agent_name, config, store, backend);
        memory.long_term = memory.store.load_long_term(&memory.agent_name)?;
        Ok(memory)
    }

    /// Record `entry` into `tier`.
    ///
    /// `Long` entries are persisted before they are appended. `Short`
    /// entries are appended, then the oldest half is summarised into
    /// long-term memory until the buffer is back within its limit.
    ///
    /// # Errors
    ///
    /// - [`VillageError::Persistence`](crate::VillageError::Persistence) if a write fails.
    /// - [`VillageError::Generation`](crate::VillageError::Generation) if a summary cannot be
    ///   produced; the unsummarised entries stay in short-term memory.
    pub fn record(&mut self, entry: impl Into<String>, tier: MemoryTier) -> Result<()> {
        let entry = entry.into();
        match tier {
            MemoryTier::Long => {
                self.store.append_long_term(&self.agent_name, &entry)?;
                self.long_term.push(entry);
                Ok(())
            }
            MemoryTier::Short => {
                self.short_term.push(entry);
                self.transfer_overflow()
            }
        }
    }

    fn transfer_overflow(&mut self) -> Result<()> {
        while self.short_term.len() > self.config.short_term_limit {
            // At least one, so limits of 0 and 1 still drain.
            let count = (self.short_term.len() / 2).max(1);
            let summary = self.summarize(&self.short_term[..count])?;
            self.store.append_long_term(&self.agent_name, &summary)?;
            self.short_term.drain(..count);
            self.long_term.push(summary);
            debug!(
                agent = %self.agent_name,
                transferred = count,
                short_term = self.short_term.len(),
                long_term = self.long_term.len(),
                "Short-term memories summarised into long-term"
            );
        }
        Ok(())
    }

    /// Summarise `entries` into one paragraph.
    ///
    /// # Errors
    ///
    /// Passes through the backend's [`GenerationError`].
    pub fn summarize(&self, entries: &[String]) -> std::result::Result<String, GenerationError> {
        let memories = format_memory(entries);
        self.backend
            .generate(PromptId::Summarize, &[("memories", memories.as_str())])
    }

    /// Render both tiers for a prompt.
    ///
    /// Short-term keeps the newest tail within `short_limit_chars`. Long-term
    /// joins the last `long_term_window` entries and keeps the head within
    /// `long_limit_chars`. A cut adds `...`, so each part is at most three
    /// characters over its limit.
    #[must_use]
    pub fn render_context(&self, short_limit_chars: usize, long_limit_chars: usize) -> MemoryContext {
        let short_term = keep_tail(&format_memory(&self.short_term), short_limit_chars);

        let window_start = self
            .long_term
            .len()
            .saturating_sub(self.config.long_term_window);
        let recent = &self.long_term[window_start..];
        let joined = if recent.is_empty() {
            NO_LONG_TERM.to_string()
        } else {
            recent.join(" ")
        };
        let long_term = keep_head(&joined, long_limit_chars);

        MemoryContext {
            short_term,
            long_term,
        }
    }

    /// [`render_context`](Self::render_context) with the configured limits.
    #[must_use]
    pub fn context(&self) -> MemoryContext {
        self.render_context(self.config.short_context_chars, self.config.long_context_chars)
    }

    /// Owner of this memory.
    #[must_use]
    pub fn agent_name(&self) -> &str {
        &self.agent_name
    }

    /// Short-term entries, oldest first.
    #[must_use]
    pub fn short_term(&self) -> &[String] {
        &self.short_term
    }

    /// Long-term entries, oldest first.
    #[must_use]
    pub fn long_term(&self) -> &[String] {
        &self.long_term
    }

    /// Memory limits in force.
    #[must_use]
    pub fn config(&self) -> &MemoryConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use village_llm::ScriptedGenerator;

    fn memory_with(limit: usize, generator: Arc<ScriptedGenerator>) -> (MemoryStore, Arc<VillageStore>) {
        let store = Arc::new(VillageStore::open_in_memory().expect("open"));
        let config = MemoryConfig {
            short_term_limit: limit,
            ..MemoryConfig::default()
        };
        let backend = Backend::new(generator, Duration::from_secs(1));
        (MemoryStore::new("Evelyn", config, store.clone(), backend), store)
    }

    #[test]
    fn overflow_summarises_oldest_half() {
        let generator = Arc::new(ScriptedGenerator::always("A quiet morning of baking."));
        let (mut memory, store) = memory_with(4, generator.clone());

        for i in 0..5 {
            memory.record(format!("event {i}"), MemoryTier::Short).expect("record");
        }

        assert_eq!(memory.short_term(), ["event 2", "event 3", "event 4"]);
        assert_eq!(memory.long_term(), ["A quiet morning of baking."]);
        assert_eq!(store.load_long_term("Evelyn").expect("load").len(), 1);

        let prompts = generator.prompts();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("- event 0\n- event 1\nSummary:"));
    }

    #[test]
    fn zero_limit_drains_everything() {
        let (mut memory, _) = memory_with(0, Arc::new(ScriptedGenerator::always("summary")));
        memory.record("only", MemoryTier::Short).expect("record");
        assert!(memory.short_term().is_empty());
        assert_eq!(memory.long_term().len(), 1);
    }

    #[test]
    fn failed_summary_keeps_entries() {
        let generator = Arc::new(ScriptedGenerator::failing(GenerationError::Timeout(1000)));
        let (mut memory, store) = memory_with(2, generator);

        memory.record("a", MemoryTier::Short).expect("record");
        memory.record("b", MemoryTier::Short).expect("record");
        let err = memory.record("c", MemoryTier::Short);

        assert!(matches!(err, Err(crate::VillageError::Generation(_))));
        assert_eq!(memory.short_term(), ["a", "b", "c"]);
        assert!(memory.long_term().is_empty());
        assert!(store.load_long_term("Evelyn").expect("load").is_empty());
    }

    #[test]
    fn long_entries_are_persisted_immediately() {
        let (mut memory, store) = memory_with(20, Arc::new(ScriptedGenerator::always("unused")));
        memory.record("Talked to George about food", MemoryTier::Long).expect("record");
        assert_eq!(store.load_long_term("Evelyn").expect("load"), ["Talked to George about food"]);
        assert!(memory.short_term().is_empty());
    }

    #[test]
    fn empty_long_term_renders_placeholder() {
        let (memory, _) = memory_with(20, Arc::new(ScriptedGenerator::always("unused")));
        let context = memory.render_context(2000, 1000);
        assert_eq!(context.short_term, "");
        assert_eq!(context.long_term, NO_LONG_TERM);
    }

    #[test]
    fn long_term_is_cut_at_the_char_limit() {
        let (mut memory, _) = memory_with(20, Arc::new(ScriptedGenerator::always("unused")));
        memory.record("x".repeat(1500), MemoryTier::Long).expect("record");
        let context = memory.render_context(2000, 1000);
        assert_eq!(context.long_term.chars().count(), 1003);
        assert!(context.long_term.ends_with("..."));
    }

    #[test]
    fn long_term_window_skips_old_entries() {
        let (mut memory, _) = memory_with(20, Arc::new(ScriptedGenerator::always("unused")));
        for i in 0..60 {
            memory.record(format!("m{i}"), MemoryTier::Long).expect("record");
        }
        let context = memory.render_context(2000, 10_000);
        assert!(context.long_term.starts_with("m10 m11"));
        assert!(context.long_term.ends_with("m59"));
    }

    #[test]
    fn short_term_keeps_the_newest_tail() {
        let (mut memory, _) = memory_with(20, Arc::new(ScriptedGenerator::always("unused")));
        memory.record("old news", MemoryTier::Short).expect("record");
        memory.record("fresh bread", MemoryTier::Short).expect("record");
        let context = memory.render_context(13, 1000);
        assert_eq!(context.short_term, "...- fresh bread");
    }

    #[test]
    fn load_restores_long_term_in_order() {
        let (mut memory, store) = memory_with(20, Arc::new(ScriptedGenerator::always("unused")));
        memory.record("first", MemoryTier::Long).expect("record");
        memory.record("second", MemoryTier::Long).expect("record");

        let backend = Backend::new(Arc::new(ScriptedGenerator::always("unused")), Duration::from_secs(1));
        let restored =
            MemoryStore::load("Evelyn", MemoryConfig::default(), store, backend).expect("load");
        assert_eq!(restored.long_term(), ["first", "second"]);
        assert!(restored.short_term().is_empty());
    }
}
