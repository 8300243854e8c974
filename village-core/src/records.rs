//! Append-only activity records written for the dashboard.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::error::VillageError;
use crate::types::AgentId;

/// What kind of turn an interaction record captures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InteractionKind {
    /// Opening line of a conversation.
    Talking,
    /// Reply to another agent's line.
    Reacting,
    /// Reply to a user, with no listening agent.
    Responding,
}

impl InteractionKind {
    /// The label stored in `interactions.interaction_type`.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Talking => "talking",
            Self::Reacting => "reacting",
            Self::Responding => "responding",
        }
    }
}

impl fmt::Display for InteractionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InteractionKind {
    type Err = VillageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "talking" => Ok(Self::Talking),
            "reacting" => Ok(Self::Reacting),
            "responding" => Ok(Self::Responding),
            _ => Err(VillageError::Serialization(format!(
                "unknown interaction type '{s}'"
            ))),
        }
    }
}

/// One conversational turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InteractionRecord {
    /// Simulated time of the turn.
    pub timestamp: DateTime<Utc>,
    /// Who spoke.
    pub speaker_id: AgentId,
    /// Who was addressed. `None` for a reply to a user.
    pub listener_id: Option<AgentId>,
    /// Kind of turn.
    #[serde(rename = "interaction_type")]
    pub kind: InteractionKind,
    /// The generated (or fallback) text.
    pub content: String,
}

/// One solo action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionRecord {
    /// Simulated time of the action.
    pub timestamp: DateTime<Utc>,
    /// Who acted.
    pub agent_id: AgentId,
    /// Where the agent was.
    pub location: String,
    /// The generated (or fallback) text.
    pub action: String,
}

/// Encode a timestamp for storage. Fixed width, so text order is time order.
#[must_use]
pub fn encode_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Decode a stored timestamp.
///
/// # Errors
/// Returns `VillageError::Serialization` if the text is not RFC 3339.
pub fn decode_timestamp(text: &str) -> Result<DateTime<Utc>, VillageError> {
    DateTime::parse_from_rfc3339(text)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| VillageError::Serialization(format!("bad timestamp '{text}': {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn kind_labels_round_trip() {
        for kind in [InteractionKind::Talking, InteractionKind::Reacting, InteractionKind::Responding] {
            assert_eq!(kind.as_str().parse::<InteractionKind>().expect("parse"), kind);
        }
        assert!("shouting".parse::<InteractionKind>().is_err());
    }

    #[test]
    fn encoded_timestamps_sort_chronologically() {
        let early = Utc.with_ymd_and_hms(2024, 5, 1, 9, 59, 0).single().expect("date");
        let late = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).single().expect("date");
        assert!(encode_timestamp(&early) < encode_timestamp(&late));
        assert_eq!(decode_timestamp(&encode_timestamp(&late)).expect("decode"), late);
    }

    #[test]
    fn interaction_serializes_with_dashboard_field_names() {
        let record = InteractionRecord {
            timestamp: Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).single().expect("date"),
            speaker_id: AgentId(1),
            listener_id: None,
            kind: InteractionKind::Responding,
            content: "Hello!".into(),
        };
        let json = serde_json::to_value(&record).expect("serialize");
        assert_eq!(json["interaction_type"], "responding");
        assert_eq!(json["speaker_id"], 1);
        assert!(json["listener_id"].is_null());
    }
}
