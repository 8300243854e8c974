//! The dashboard read contract.
//!
//! The dashboard never touches live agents. It reads these rows from the
//! store, either one collection at a time or as a [`DashboardSnapshot`]
//! taken inside a single read transaction.

use serde::{Deserialize, Serialize};

use crate::records::{ActionRecord, InteractionRecord};
use crate::types::AgentId;

/// An agent as the dashboard lists it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentRow {
    /// Database id.
    pub id: AgentId,
    /// Unique name.
    pub name: String,
    /// Personality description.
    pub personality: String,
    /// Backstory.
    pub backstory: String,
    /// Where the agent is. `None` only before first placement.
    pub current_location: Option<String>,
}

/// Everything the dashboard shows, read consistently.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardSnapshot {
    /// All agents with their locations.
    pub agents: Vec<AgentRow>,
    /// Most recent interactions, newest first.
    pub interactions: Vec<InteractionRecord>,
    /// Most recent actions, newest first.
    pub actions: Vec<ActionRecord>,
}

impl DashboardSnapshot {
    /// Encode as the JSON bundle `{agents, interactions, actions}`.
    ///
    /// # Errors
    /// Returns `VillageError::Serialization` if encoding fails.
    pub fn to_json(&self) -> crate::error::Result<String> {
        serde_json::to_string(self).map_err(|e| crate::VillageError::Serialization(e.to_string()))
    }
}
