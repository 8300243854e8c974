//! The tick loop.
//!
//! Each tick runs four phases in order:
//!   1. **Decide**: every unordered pair of co-located agents will talk;
//!      agents in no pair act alone.
//!   2. **Interact**: for each pair a coin flip picks the speaker, who
//!      speaks; the listener reacts. Solo agents act.
//!   3. **Move**: each agent independently relocates with probability
//!      `move_probability`.
//!   4. **Advance**: the clock moves forward by `tick_seconds`.
//!
//! All records written during a tick carry the tick's start time.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use tracing::{debug, info, warn};
use village_llm::{build_generator, Generator};

use crate::agent::Agent;
use crate::backend::Backend;
use crate::clock::{Clock, CLOCK_FORMAT};
use crate::config::VillageConfig;
use crate::error::{Result, VillageError, WorldError};
use crate::persistence::VillageStore;
use crate::types::AgentId;
use crate::world::WorldMap;

/// What happened during one tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TickReport {
    /// Zero-based tick number.
    pub tick: u64,
    /// Simulated time the tick's records are stamped with.
    pub time: DateTime<Utc>,
    /// Speak/react exchanges.
    pub conversations: usize,
    /// Solo actions.
    pub actions: usize,
    /// Successful relocations.
    pub moves: usize,
}

/// A running village: agents on a map, a clock, and a store.
#[derive(Debug)]
pub struct Village {
    config: VillageConfig,
    store: Arc<VillageStore>,
    world: WorldMap,
    clock: Clock,
    agents: Vec<Agent>,
    rng: StdRng,
    tick: u64,
}

impl Village {
    /// Build a village from `config` over an existing store and generator.
    ///
    /// Agents are loaded (or created) in roster order and placed on the map.
    ///
    /// # Errors
    ///
    /// - [`VillageError::Config`] if `config` fails validation.
    /// - [`VillageError::Persistence`] on SQLite failures.
    pub fn new(
        config: &VillageConfig,
        store: Arc<VillageStore>,
        generator: Arc<dyn Generator>,
    ) -> Result<Self> {
        config.validate()?;
        let backend = Backend::new(generator, config.llm.timeout());
        let world = WorldMap::new(config.simulation.locations.clone(), store.clone())?;
        let mut rng = match config.simulation.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let mut agents = Vec::with_capacity(config.agents.len());
        for def in &config.agents {
            let mut agent =
                Agent::load_or_create(def, store.clone(), backend.clone(), config.memory.clone())?;
            world.place(&mut agent, &mut rng)?;
            agents.push(agent);
        }

        info!(
            agents = agents.len(),
            locations = world.locations().len(),
            db = %store.db_path().display(),
            "Village ready"
        );

        Ok(Self {
            config: config.clone(),
            store,
            world,
            clock: Clock::starting_now(),
            agents,
            rng,
            tick: 0,
        })
    }

    /// Open the configured store and backend, then build the village.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be opened, the backend cannot be
    /// built, or [`Village::new`] fails.
    pub fn from_config(config: &VillageConfig) -> Result<Self> {
        config.validate()?;
        let store = Arc::new(VillageStore::open(&config.persistence.path, &config.persistence)?);
        let generator = build_generator(&config.llm)?;
        Self::new(config, store, generator)
    }

    /// Start the clock at `start` instead of the wall-clock time.
    #[must_use]
    pub fn with_start_time(mut self, start: DateTime<Utc>) -> Self {
        self.clock = Clock::new(start);
        self
    }

    /// Run one tick.
    ///
    /// # Errors
    ///
    /// Propagates persistence failures. Generation failures inside
    /// conversations and actions are absorbed as fallback lines, and a
    /// failed memory summary is logged and skipped; neither stops the tick.
    pub fn tick(&mut self) -> Result<TickReport> {
        let now = self.clock.now();
        let (pairs, solo) = self.plan();

        let mut conversations = 0;
        for (i, j) in pairs {
            let (speaker, listener) = if self.rng.gen_bool(0.5) { (i, j) } else { (j, i) };
            let (speaker, listener) = pair_mut(&mut self.agents, speaker, listener);
            let statement = speaker.speak_to(listener, None, &mut self.rng, now)?;
            let reply = listener.react_to(speaker, &statement, now)?;
            debug!(
                speaker = %speaker.name(),
                listener = %listener.name(),
                statement = %statement,
                reply = %reply,
                "Conversation"
            );
            conversations += 1;
        }

        let mut actions = 0;
        for i in solo {
            let agent = &mut self.agents[i];
            match agent.act(now) {
                Ok(action) => {
                    debug!(agent = %agent.name(), location = ?agent.location(), action = %action, "Action");
                }
                // The action is already logged and the unsummarised entries
                // stay in short-term memory; the next record retries.
                Err(VillageError::Generation(err)) => {
                    warn!(agent = %agent.name(), error = %err, "Memory summary failed; continuing tick");
                }
                Err(e) => return Err(e),
            }
            actions += 1;
        }

        let mut moves = 0;
        let move_probability = self.config.simulation.move_probability;
        for agent in &mut self.agents {
            if !self.rng.gen_bool(move_probability) {
                continue;
            }
            match self.world.relocate(agent, &mut self.rng) {
                Ok(_) => moves += 1,
                Err(VillageError::World(WorldError::NoAlternativeLocation { current })) => {
                    debug!(agent = %agent.name(), location = %current, "Nowhere else to go");
                }
                Err(e) => return Err(e),
            }
        }

        self.clock
            .advance(Duration::from_secs(self.config.simulation.tick_seconds));

        let report = TickReport {
            tick: self.tick,
            time: now,
            conversations,
            actions,
            moves,
        };
        self.tick += 1;

        info!(
            tick = report.tick,
            time = %now.format(CLOCK_FORMAT),
            conversations,
            actions,
            moves,
            "Tick complete"
        );
        Ok(report)
    }

    /// Run `ticks` ticks, stopping at the first error.
    ///
    /// # Errors
    ///
    /// Returns the first error raised by [`Village::tick`].
    pub fn run_for(&mut self, ticks: u64) -> Result<Vec<TickReport>> {
        (0..ticks).map(|_| self.tick()).collect()
    }

    /// Run the configured number of ticks.
    ///
    /// # Errors
    ///
    /// Returns the first error raised by [`Village::tick`].
    pub fn run(&mut self) -> Result<Vec<TickReport>> {
        self.run_for(self.config.simulation.ticks)
    }

    /// Let the agent named `name` answer a user at the current time.
    ///
    /// # Errors
    ///
    /// - [`VillageError::Config`] if no agent has that name.
    /// - Persistence and summarisation failures.
    pub fn respond(&mut self, name: &str, user_input: &str) -> Result<String> {
        let now = self.clock.now();
        self.agent_mut(name)?.respond(user_input, now)
    }

    /// Put the agent named `name` at `location`.
    ///
    /// # Errors
    ///
    /// - [`VillageError::Config`] if no agent has that name.
    /// - [`WorldError::UnknownLocation`] if `location` is not on the map.
    pub fn place_agent(&mut self, name: &str, location: &str) -> Result<()> {
        let agent = self
            .agents
            .iter_mut()
            .find(|a| a.name() == name)
            .ok_or_else(|| VillageError::Config(format!("no agent named '{name}'")))?;
        self.world.place_at(agent, location)
    }

    /// Pairs of co-located agents (by roster index, `i < j`) and the agents
    /// in no pair.
    fn plan(&self) -> (Vec<(usize, usize)>, Vec<usize>) {
        let n = self.agents.len();
        let index_of: HashMap<AgentId, usize> = self
            .agents
            .iter()
            .enumerate()
            .map(|(i, a)| (a.id(), i))
            .collect();
        let mut pairs = Vec::new();
        let mut paired = vec![false; n];
        for location in self.world.locations() {
            let here: Vec<usize> = self
                .world
                .agents_at(location, &self.agents)
                .iter()
                .filter_map(|a| index_of.get(&a.id()).copied())
                .collect();
            for (k, &i) in here.iter().enumerate() {
                for &j in &here[k + 1..] {
                    pairs.push((i, j));
                    paired[i] = true;
                    paired[j] = true;
                }
            }
        }
        let solo = (0..n).filter(|&i| !paired[i]).collect();
        (pairs, solo)
    }

    fn agent_mut(&mut self, name: &str) -> Result<&mut Agent> {
        self.agents
            .iter_mut()
            .find(|a| a.name() == name)
            .ok_or_else(|| VillageError::Config(format!("no agent named '{name}'")))
    }

    /// Agents in roster order.
    #[must_use]
    pub fn agents(&self) -> &[Agent] {
        &self.agents
    }

    /// The agent named `name`.
    #[must_use]
    pub fn agent(&self, name: &str) -> Option<&Agent> {
        self.agents.iter().find(|a| a.name() == name)
    }

    /// The map.
    #[must_use]
    pub fn world(&self) -> &WorldMap {
        &self.world
    }

    /// The clock.
    #[must_use]
    pub fn clock(&self) -> &Clock {
        &self.clock
    }

    /// The shared store.
    #[must_use]
    pub fn store(&self) -> &Arc<VillageStore> {
        &self.store
    }

    /// Ticks run so far.
    #[must_use]
    pub fn ticks_run(&self) -> u64 {
        self.tick
    }
}

/// Two distinct mutable elements of `items`.
fn pair_mut<T>(items: &mut [T], a: usize, b: usize) -> (&mut T, &mut T) {
    debug_assert_ne!(a, b);
    if a < b {
        let (left, right) = items.split_at_mut(b);
        (&mut left[a], &mut right[0])
    } else {
        let (left, right) = items.split_at_mut(a);
        (&mut right[0], &mut left[b])
    }
}
