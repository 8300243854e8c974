//! Core type definitions shared across the village.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Database identifier of an agent, assigned at first persistence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentId(pub i64);

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Which memory buffer an entry is recorded into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryTier {
    /// Bounded, volatile working memory.
    Short,
    /// Unbounded, durable memory. Appends are persisted immediately.
    Long,
}

/// Static description of a villager, as written in `village.toml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentDefinition {
    /// Unique name.
    #[serde(default)]
    pub name: String,
    /// Short personality description ("friendly baker").
    #[serde(default)]
    pub personality: String,
    /// Free-form backstory.
    #[serde(default)]
    pub backstory: String,
}

impl AgentDefinition {
    /// Create a definition.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        personality: impl Into<String>,
        backstory: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            personality: personality.into(),
            backstory: backstory.into(),
        }
    }

    /// Check that the definition names and describes someone.
    ///
    /// # Errors
    /// Returns `VillageError::Config` if the name or personality is blank.
    pub fn validate(&self) -> crate::error::Result<()> {
        if self.name.trim().is_empty() {
            return Err(crate::VillageError::Config(
                "agent definition is missing a name".to_string(),
            ));
        }
        if self.personality.trim().is_empty() {
            return Err(crate::VillageError::Config(format!(
                "agent '{}' is missing a personality",
                self.name
            )));
        }
        Ok(())
    }
}
