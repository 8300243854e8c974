//! # village-core: a small village of remembering NPCs
//!
//! Agents live on a fixed map, talk to whoever shares their location, act
//! alone otherwise, and wander. Each agent keeps two tiers of memory:
//!
//! - **Short-term**: a bounded working buffer. On overflow the oldest half
//!   is summarised by the text backend into one long-term entry.
//! - **Long-term**: append-only, persisted to SQLite before it is visible.
//!
//! Every conversational turn and solo action is logged to the same
//! database, which the dashboard feed reads on its own connection.
//!
//! ## Failure policy
//!
//! - Conversation and action text falls back to a canned line when the
//!   backend fails.
//! - Summaries and database writes never fall back; their errors propagate.

#![deny(clippy::unwrap_used)]
#![deny(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod agent;
pub mod backend;
pub mod clock;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod memory;
pub mod persistence;
pub mod records;
pub mod simulation;
pub mod telemetry;
pub mod types;
pub mod world;

pub use agent::Agent;
pub use backend::Backend;
pub use clock::Clock;
pub use config::VillageConfig;
pub use dashboard::{AgentRow, DashboardSnapshot};
pub use error::{VillageError, WorldError};
pub use memory::{MemoryContext, MemoryStore};
pub use persistence::VillageStore;
pub use records::{ActionRecord, InteractionKind, InteractionRecord};
pub use simulation::{TickReport, Village};
pub use types::*;
pub use world::WorldMap;
