//! Villagers: identity, memory, and the four things they can do.
//!
//! Every operation blocks on the backend. A failed generation is replaced
//! by an in-character fallback line and otherwise treated like a normal
//! result; persistence and summarisation failures propagate.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;
use rand::Rng;
use tracing::{debug, warn};
use village_llm::PromptId;

use crate::backend::Backend;
use crate::config::MemoryConfig;
use crate::error::{Result, WorldError};
use crate::memory::MemoryStore;
use crate::persistence::VillageStore;
use crate::records::{ActionRecord, InteractionKind, InteractionRecord};
use crate::types::{AgentDefinition, AgentId, MemoryTier};

/// Conversation topics picked when none is given.
pub const TOPICS: [&str; 5] = ["weather", "village news", "hobbies", "food", "family"];

/// Mood passed to interactive replies.
const DEFAULT_MOOD: &str = "neutral";

/// A villager with persistent identity and memory.
#[derive(Debug)]
pub struct Agent {
    id: AgentId,
    name: String,
    personality: String,
    backstory: String,
    location: Option<String>,
    memory: MemoryStore,
    backend: Backend,
    store: Arc<VillageStore>,
}

impl Agent {
    /// Load the agent named in `def`, creating its row on first use.
    ///
    /// A persisted row keeps its id, identity and location; long-term
    /// memory is restored by name.
    ///
    /// # Errors
    ///
    /// - [`VillageError::Config`](crate::VillageError::Config) if `def` is malformed.
    /// - [`VillageError::Persistence`](crate::VillageError::Persistence) on SQLite failures.
    pub fn load_or_create(
        def: &AgentDefinition,
        store: Arc<VillageStore>,
        backend: Backend,
        memory_config: MemoryConfig,
    ) -> Result<Self> {
        def.validate()?;
        let row = store.upsert_agent(def)?;
        let memory = MemoryStore::load(row.name.clone(), memory_config, store.clone(), backend.clone())?;
        debug!(
            agent = %row.name,
            id = %row.id,
            location = ?row.current_location,
            long_term = memory.long_term().len(),
            "Agent loaded"
        );
        Ok(Self {
            id: row.id,
            name: row.name,
            personality: row.personality,
            backstory: row.backstory,
            location: row.current_location,
            memory,
            backend,
            store,
        })
    }

    /// Open a conversation with `other`.
    ///
    /// Without a `topic`, one of [`TOPICS`] is drawn uniformly.
    ///
    /// # Errors
    ///
    /// Propagates persistence failures.
    pub fn speak_to<R: Rng + ?Sized>(
        &mut self,
        other: &Agent,
        topic: Option<&str>,
        rng: &mut R,
        at: DateTime<Utc>,
    ) -> Result<String> {
        let topic = topic.unwrap_or_else(|| TOPICS.choose(rng).copied().unwrap_or(TOPICS[0]));
        let text = self.generate_or_fallback(
            PromptId::Speak,
            &[
                ("name", self.name.as_str()),
                ("personality", self.personality.as_str()),
                ("other_name", other.name.as_str()),
                ("other_personality", other.personality.as_str()),
                ("topic", topic),
            ],
        );
        self.memory
            .record(format!("Talked to {} about {topic}", other.name), MemoryTier::Long)?;
        self.log_interaction(Some(other.id), InteractionKind::Talking, &text, at)?;
        Ok(text)
    }

    /// Reply to `statement`, said by `other`.
    ///
    /// # Errors
    ///
    /// Propagates persistence failures.
    pub fn react_to(&mut self, other: &Agent, statement: &str, at: DateTime<Utc>) -> Result<String> {
        let text = self.generate_or_fallback(
            PromptId::React,
            &[
                ("name", self.name.as_str()),
                ("personality", self.personality.as_str()),
                ("other_name", other.name.as_str()),
                ("statement", statement),
            ],
        );
        self.memory
            .record(format!("Reacted to {}", other.name), MemoryTier::Long)?;
        self.log_interaction(Some(other.id), InteractionKind::Reacting, &text, at)?;
        Ok(text)
    }

    /// Do something alone at the current location.
    ///
    /// The action is logged before it is remembered, so a failed summary
    /// never loses the log entry.
    ///
    /// # Errors
    ///
    /// - [`WorldError::Unplaced`] if the agent has no location yet.
    /// - Persistence and summarisation failures.
    pub fn act(&mut self, at: DateTime<Utc>) -> Result<String> {
        let location = self
            .location
            .clone()
            .ok_or_else(|| WorldError::Unplaced(self.name.clone()))?;
        let text = self.generate_or_fallback(
            PromptId::Act,
            &[
                ("name", self.name.as_str()),
                ("personality", self.personality.as_str()),
                ("location", location.as_str()),
            ],
        );
        self.store.append_action(&ActionRecord {
            timestamp: at,
            agent_id: self.id,
            location,
            action: text.clone(),
        })?;
        self.memory.record(format!("Action: {text}"), MemoryTier::Short)?;
        Ok(text)
    }

    /// Answer a user, with bounded memory context in the prompt.
    ///
    /// The logged `responding` record holds both the user's line and the
    /// reply.
    ///
    /// # Errors
    ///
    /// Propagates persistence and summarisation failures.
    pub fn respond(&mut self, user_input: &str, at: DateTime<Utc>) -> Result<String> {
        self.memory.record(format!("User: {user_input}"), MemoryTier::Short)?;
        let context = self.memory.context();
        let text = self.generate_or_fallback(
            PromptId::Respond,
            &[
                ("name", self.name.as_str()),
                ("personality", self.personality.as_str()),
                ("backstory", self.backstory.as_str()),
                ("mood", DEFAULT_MOOD),
                ("short_term", context.short_term.as_str()),
                ("long_term", context.long_term.as_str()),
                ("user_input", user_input),
            ],
        );
        let exchange = format!("User: {user_input}\n{}: {text}", self.name);
        self.log_interaction(None, InteractionKind::Responding, &exchange, at)?;
        self.memory
            .record(format!("{}: {text}", self.name), MemoryTier::Short)?;
        Ok(text)
    }

    fn generate_or_fallback(&self, prompt: PromptId, vars: &[(&str, &str)]) -> String {
        match self.backend.generate(prompt, vars) {
            Ok(text) => text,
            Err(err) => {
                warn!(agent = %self.name, prompt = %prompt, error = %err, "Generation failed, using fallback line");
                err.fallback_utterance().to_string()
            }
        }
    }

    fn log_interaction(
        &self,
        listener: Option<AgentId>,
        kind: InteractionKind,
        content: &str,
        at: DateTime<Utc>,
    ) -> Result<()> {
        self.store.append_interaction(&InteractionRecord {
            timestamp: at,
            speaker_id: self.id,
            listener_id: listener,
            kind,
            content: content.to_string(),
        })?;
        Ok(())
    }

    pub(crate) fn set_location(&mut self, location: String) {
        self.location = Some(location);
    }

    /// Database id.
    #[must_use]
    pub fn id(&self) -> AgentId {
        self.id
    }

    /// Unique name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Personality description.
    #[must_use]
    pub fn personality(&self) -> &str {
        &self.personality
    }

    /// Backstory text.
    #[must_use]
    pub fn backstory(&self) -> &str {
        &self.backstory
    }

    /// Current location, `None` until the world map places the agent.
    #[must_use]
    pub fn location(&self) -> Option<&str> {
        self.location.as_deref()
    }

    /// Short- and long-term memory.
    #[must_use]
    pub fn memory(&self) -> &MemoryStore {
        &self.memory
    }
}
