//! Configuration for the village simulation.
//!
//! Maps directly to `village.toml`. Every section is optional and falls back
//! to the reference values.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use village_llm::BackendConfig;

use crate::error::{Result, VillageError};
use crate::types::AgentDefinition;
use crate::world::DEFAULT_LOCATIONS;

/// Top-level village configuration, loadable from TOML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VillageConfig {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,
    /// Per-agent memory limits.
    #[serde(default)]
    pub memory: MemoryConfig,
    /// Text generation backend.
    #[serde(default)]
    pub llm: BackendConfig,
    /// Tick loop settings.
    #[serde(default)]
    pub simulation: SimulationConfig,
    /// SQLite settings.
    #[serde(default)]
    pub persistence: PersistenceConfig,
    /// Dashboard feed settings.
    #[serde(default)]
    pub dashboard: DashboardConfig,
    /// The villagers.
    #[serde(default = "default_agents")]
    pub agents: Vec<AgentDefinition>,
}

impl Default for VillageConfig {
    fn default() -> Self {
        Self {
            general: GeneralConfig::default(),
            memory: MemoryConfig::default(),
            llm: BackendConfig::default(),
            simulation: SimulationConfig::default(),
            persistence: PersistenceConfig::default(),
            dashboard: DashboardConfig::default(),
            agents: default_agents(),
        }
    }
}

impl VillageConfig {
    /// Load configuration from a TOML string and validate it.
    ///
    /// # Errors
    /// Returns `VillageError::Config` if the TOML is invalid or fails validation.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(toml_str).map_err(|e| VillageError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, parsed, or validated.
    pub fn from_file(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Reject configurations the simulation cannot start with.
    ///
    /// # Errors
    /// Returns `VillageError::Config` describing the first problem found.
    pub fn validate(&self) -> Result<()> {
        if self.agents.is_empty() {
            return Err(VillageError::Config("no agents defined".to_string()));
        }
        let mut names = HashSet::new();
        for agent in &self.agents {
            agent.validate()?;
            if !names.insert(agent.name.as_str()) {
                return Err(VillageError::Config(format!(
                    "duplicate agent name '{}'",
                    agent.name
                )));
            }
        }
        self.simulation.validate()
    }
}

// ---------------------------------------------------------------------------
// Sub-configs
// ---------------------------------------------------------------------------

/// General settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Log level: trace, debug, info, warn, error. `RUST_LOG` takes precedence.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Emit logs as JSON lines instead of human-readable text.
    #[serde(default)]
    pub json_logs: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logs: false,
        }
    }
}

/// Per-agent memory limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// Maximum short-term entries before the oldest half is summarised.
    #[serde(default = "default_20")]
    pub short_term_limit: usize,
    /// How many of the newest long-term entries feed prompt context.
    #[serde(default = "default_50")]
    pub long_term_window: usize,
    /// Character budget for rendered short-term context.
    #[serde(default = "default_2000")]
    pub short_context_chars: usize,
    /// Character budget for rendered long-term context.
    #[serde(default = "default_1000")]
    pub long_context_chars: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            short_term_limit: 20,
            long_term_window: 50,
            short_context_chars: 2000,
            long_context_chars: 1000,
        }
    }
}

/// Tick loop settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// How many ticks `Village::run` executes.
    #[serde(default = "default_25")]
    pub ticks: u64,
    /// Per-agent, per-tick probability of moving.
    #[serde(default = "default_0_3")]
    pub move_probability: f64,
    /// Simulated seconds the clock advances each tick.
    #[serde(default = "default_60")]
    pub tick_seconds: u64,
    /// Fixed RNG seed for reproducible runs. Random when absent.
    #[serde(default)]
    pub seed: Option<u64>,
    /// Named locations, in display order.
    #[serde(default = "default_locations")]
    pub locations: Vec<String>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            ticks: 25,
            move_probability: 0.3,
            tick_seconds: 60,
            seed: None,
            locations: default_locations(),
        }
    }
}

impl SimulationConfig {
    /// # Errors
    /// Returns `VillageError::Config` for an empty or duplicated location list
    /// or a move probability outside `[0, 1]`.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.move_probability) {
            return Err(VillageError::Config(format!(
                "move_probability must be within [0, 1], got {}",
                self.move_probability
            )));
        }
        if self.locations.is_empty() {
            return Err(VillageError::Config("no locations defined".to_string()));
        }
        let mut seen = HashSet::new();
        for location in &self.locations {
            if location.trim().is_empty() || !seen.insert(location.as_str()) {
                return Err(VillageError::Config(format!(
                    "invalid or duplicate location '{location}'"
                )));
            }
        }
        Ok(())
    }
}

/// Persistence / save configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// Path of the SQLite database shared with the dashboard.
    #[serde(default = "default_db_path")]
    pub path: String,
    /// Use WAL mode so dashboard reads don't block simulation writes.
    #[serde(default = "default_true")]
    pub wal_mode: bool,
    /// How long a connection waits on a locked database, in milliseconds.
    #[serde(default = "default_5000")]
    pub busy_timeout_ms: u64,
    /// Drop the interaction and action logs when the writer opens the store.
    /// Agents and long-term memory are always kept.
    #[serde(default = "default_true")]
    pub reset_logs_on_start: bool,
    /// SQLite `synchronous` level for the writer. `full` syncs every
    /// commit to disk before the write returns.
    #[serde(default)]
    pub synchronous: SyncMode,
}

/// SQLite `synchronous` pragma levels the writer may use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    /// Sync at checkpoints only. A commit can be lost on power failure.
    Normal,
    /// Sync on every commit.
    #[default]
    Full,
}

impl SyncMode {
    /// The pragma value.
    #[must_use]
    pub fn as_pragma(self) -> &'static str {
        match self {
            Self::Normal => "NORMAL",
            Self::Full => "FULL",
        }
    }
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            wal_mode: true,
            busy_timeout_ms: 5000,
            reset_logs_on_start: true,
            synchronous: SyncMode::Full,
        }
    }
}

/// Dashboard feed configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardConfig {
    /// Seconds between pushed snapshots.
    #[serde(default = "default_10")]
    pub interval_secs: u64,
    /// How many recent interactions and actions each snapshot carries.
    #[serde(default = "default_10_usize")]
    pub recent_limit: usize,
    /// Snapshots buffered per slow observer before it starts skipping.
    #[serde(default = "default_16")]
    pub channel_capacity: usize,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            interval_secs: 10,
            recent_limit: 10,
            channel_capacity: 16,
        }
    }
}

// ---------------------------------------------------------------------------
// Serde default helpers
// ---------------------------------------------------------------------------

fn default_true() -> bool { true }
fn default_log_level() -> String { "info".to_string() }
fn default_db_path() -> String { "village.db".to_string() }
fn default_locations() -> Vec<String> { DEFAULT_LOCATIONS.iter().map(ToString::to_string).collect() }
fn default_agents() -> Vec<AgentDefinition> {
    vec![
        AgentDefinition::new("Evelyn", "friendly baker", "Runs the local bakery, loves chatting."),
        AgentDefinition::new("George", "grumpy farmer", "50-year farming veteran, outspoken."),
    ]
}
fn default_0_3() -> f64 { 0.3 }
fn default_10() -> u64 { 10 }
fn default_10_usize() -> usize { 10 }
fn default_16() -> usize { 16 }
fn default_20() -> usize { 20 }
fn default_25() -> u64 { 25 }
fn default_50() -> usize { 50 }
fn default_60() -> u64 { 60 }
fn default_1000() -> usize { 1000 }
fn default_2000() -> usize { 2000 }
fn default_5000() -> u64 { 5000 }
