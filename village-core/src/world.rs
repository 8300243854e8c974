//! The village map: a fixed set of named locations.
//!
//! The map is the only thing that moves agents. Every placement is written
//! to the store before the agent's in-memory location changes.

use std::collections::HashSet;
use std::sync::Arc;

use rand::seq::SliceRandom;
use rand::Rng;
use tracing::debug;

use crate::agent::Agent;
use crate::error::{Result, VillageError, WorldError};
use crate::persistence::VillageStore;

/// Locations of the reference village.
pub const DEFAULT_LOCATIONS: [&str; 5] = [
    "Marketplace",
    "Town Square",
    "Bakery",
    "Farmhouse",
    "River Bank",
];

/// Ordered, fixed set of locations.
#[derive(Debug)]
pub struct WorldMap {
    locations: Vec<String>,
    store: Arc<VillageStore>,
}

impl WorldMap {
    /// Build a map over `locations`.
    ///
    /// # Errors
    ///
    /// Returns [`VillageError::Config`] if `locations` is empty or repeats a name.
    pub fn new(locations: Vec<String>, store: Arc<VillageStore>) -> Result<Self> {
        if locations.is_empty() {
            return Err(VillageError::Config("world map needs at least one location".into()));
        }
        let mut seen = HashSet::new();
        if let Some(dup) = locations.iter().find(|l| !seen.insert(l.as_str())) {
            return Err(VillageError::Config(format!("duplicate location '{dup}'")));
        }
        Ok(Self { locations, store })
    }

    /// All locations, in map order.
    #[must_use]
    pub fn locations(&self) -> &[String] {
        &self.locations
    }

    /// Whether `location` is on the map.
    #[must_use]
    pub fn contains(&self, location: &str) -> bool {
        self.locations.iter().any(|l| l == location)
    }

    /// Give `agent` a location if it has none, or if its stored one is no
    /// longer on the map. Returns the agent's location.
    ///
    /// # Errors
    ///
    /// Returns [`VillageError::Persistence`] if the location cannot be saved.
    pub fn place<R: Rng + ?Sized>(&self, agent: &mut Agent, rng: &mut R) -> Result<String> {
        if let Some(current) = agent.location().filter(|l| self.contains(l)) {
            return Ok(current.to_string());
        }
        let location = self.pick(&self.locations.iter().collect::<Vec<_>>(), rng)?;
        self.store.update_location(agent.id(), &location)?;
        debug!(agent = %agent.name(), location = %location, "Agent placed");
        agent.set_location(location.clone());
        Ok(location)
    }

    /// Put `agent` at `location`.
    ///
    /// # Errors
    ///
    /// - [`WorldError::UnknownLocation`] if `location` is not on the map.
    /// - [`VillageError::Persistence`] if the location cannot be saved.
    pub fn place_at(&self, agent: &mut Agent, location: &str) -> Result<()> {
        if !self.contains(location) {
            return Err(WorldError::UnknownLocation(location.to_string()).into());
        }
        self.store.update_location(agent.id(), location)?;
        agent.set_location(location.to_string());
        Ok(())
    }

    /// Move `agent` to a location other than its current one, chosen
    /// uniformly. Returns the new location.
    ///
    /// # Errors
    ///
    /// - [`WorldError::Unplaced`] if the agent has no location.
    /// - [`WorldError::NoAlternativeLocation`] if the map has no other location.
    /// - [`VillageError::Persistence`] if the location cannot be saved.
    pub fn relocate<R: Rng + ?Sized>(&self, agent: &mut Agent, rng: &mut R) -> Result<String> {
        let current = agent
            .location()
            .ok_or_else(|| WorldError::Unplaced(agent.name().to_string()))?
            .to_string();
        let candidates: Vec<&String> = self.locations.iter().filter(|l| **l != current).collect();
        if candidates.is_empty() {
            return Err(WorldError::NoAlternativeLocation { current }.into());
        }
        let location = self.pick(&candidates, rng)?;
        self.store.update_location(agent.id(), &location)?;
        debug!(agent = %agent.name(), from = %current, to = %location, "Agent moved");
        agent.set_location(location.clone());
        Ok(location)
    }

    /// Agents currently at `location`, in input order.
    #[must_use]
    pub fn agents_at<'a>(&self, location: &str, agents: &'a [Agent]) -> Vec<&'a Agent> {
        agents
            .iter()
            .filter(|a| a.location() == Some(location))
            .collect()
    }

    fn pick<R: Rng + ?Sized>(&self, candidates: &[&String], rng: &mut R) -> Result<String> {
        candidates
            .choose(rng)
            .map(|l| (*l).clone())
            .ok_or_else(|| VillageError::Config("world map has no locations".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::Backend;
    use crate::config::MemoryConfig;
    use crate::types::AgentDefinition;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::time::Duration;
    use village_llm::ScriptedGenerator;

    fn setup(locations: &[&str]) -> (WorldMap, Agent, Arc<VillageStore>) {
        let store = Arc::new(VillageStore::open_in_memory().expect("open"));
        let backend = Backend::new(Arc::new(ScriptedGenerator::always("ok")), Duration::from_secs(1));
        let agent = Agent::load_or_create(
            &AgentDefinition::new("George", "grumpy farmer", ""),
            store.clone(),
            backend,
            MemoryConfig::default(),
        )
        .expect("agent");
        let map = WorldMap::new(locations.iter().map(ToString::to_string).collect(), store.clone())
            .expect("map");
        (map, agent, store)
    }

    #[test]
    fn empty_map_is_rejected() {
        let store = Arc::new(VillageStore::open_in_memory().expect("open"));
        assert!(WorldMap::new(Vec::new(), store).is_err());
    }

    #[test]
    fn place_assigns_and_persists() {
        let (map, mut george, store) = setup(&DEFAULT_LOCATIONS);
        let mut rng = StdRng::seed_from_u64(11);
        let location = map.place(&mut george, &mut rng).expect("place");
        assert!(map.contains(&location));
        assert_eq!(george.location(), Some(location.as_str()));
        let rows = store.list_agents().expect("list");
        assert_eq!(rows[0].current_location.as_deref(), Some(location.as_str()));
    }

    #[test]
    fn place_keeps_a_valid_location() {
        let (map, mut george, _) = setup(&DEFAULT_LOCATIONS);
        let mut rng = StdRng::seed_from_u64(11);
        map.place_at(&mut george, "Farmhouse").expect("place");
        assert_eq!(map.place(&mut george, &mut rng).expect("place"), "Farmhouse");
    }

    #[test]
    fn place_at_rejects_unknown_location() {
        let (map, mut george, _) = setup(&DEFAULT_LOCATIONS);
        let err = map.place_at(&mut george, "Castle");
        assert!(matches!(err, Err(VillageError::World(WorldError::UnknownLocation(_)))));
        assert_eq!(george.location(), None);
    }

    #[test]
    fn relocate_never_stays_put() {
        let (map, mut george, _) = setup(&DEFAULT_LOCATIONS);
        let mut rng = StdRng::seed_from_u64(2);
        map.place_at(&mut george, "Bakery").expect("place");
        for _ in 0..50 {
            let before = george.location().expect("placed").to_string();
            let after = map.relocate(&mut george, &mut rng).expect("relocate");
            assert_ne!(before, after);
        }
    }

    #[test]
    fn relocate_with_one_location_fails() {
        let (map, mut george, _) = setup(&["Bakery"]);
        let mut rng = StdRng::seed_from_u64(2);
        map.place_at(&mut george, "Bakery").expect("place");
        let err = map.relocate(&mut george, &mut rng);
        assert!(matches!(
            err,
            Err(VillageError::World(WorldError::NoAlternativeLocation { .. }))
        ));
        assert_eq!(george.location(), Some("Bakery"));
    }

    #[test]
    fn relocate_unplaced_agent_fails() {
        let (map, mut george, _) = setup(&DEFAULT_LOCATIONS);
        let mut rng = StdRng::seed_from_u64(2);
        let err = map.relocate(&mut george, &mut rng);
        assert!(matches!(err, Err(VillageError::World(WorldError::Unplaced(_)))));
    }

    #[test]
    fn agents_at_filters_by_location() {
        let (map, mut george, _) = setup(&DEFAULT_LOCATIONS);
        map.place_at(&mut george, "Farmhouse").expect("place");
        let agents = vec![george];
        assert_eq!(map.agents_at("Farmhouse", &agents).len(), 1);
        assert!(map.agents_at("Bakery", &agents).is_empty());
    }
}
