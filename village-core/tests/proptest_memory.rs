//! Property-based tests for memory and movement invariants.
//!
//! Uses `proptest` to drive random insert sequences, limits and context
//! bounds through the public API.

use std::sync::Arc;
use std::time::Duration;

use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;

use village_core::config::MemoryConfig;
use village_core::{Agent, AgentDefinition, Backend, MemoryStore, MemoryTier, VillageStore, WorldMap};
use village_llm::ScriptedGenerator;

fn memory(limit: usize) -> (MemoryStore, Arc<ScriptedGenerator>, Arc<VillageStore>) {
    let store = Arc::new(VillageStore::open_in_memory().expect("open"));
    let generator = Arc::new(ScriptedGenerator::always("summary"));
    let backend = Backend::new(generator.clone(), Duration::from_secs(1));
    let config = MemoryConfig {
        short_term_limit: limit,
        ..MemoryConfig::default()
    };
    (MemoryStore::new("Evelyn", config, store.clone(), backend), generator, store)
}

fn arb_entry() -> impl Strategy<Value = String> {
    "[a-zA-Z ,.é]{0,40}"
}

// ---------------------------------------------------------------------------
// Property: short-term memory never exceeds its limit after a record
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn short_term_stays_within_limit(
        limit in 0usize..8,
        entries in prop::collection::vec(arb_entry(), 0..40),
    ) {
        let (mut memory, _, _) = memory(limit);
        for entry in entries {
            memory.record(entry, MemoryTier::Short).expect("record");
            prop_assert!(memory.short_term().len() <= limit);
        }
    }
}

// ---------------------------------------------------------------------------
// Property: every transferred entry is accounted for by exactly one summary
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn transfers_conserve_entries(
        limit in 1usize..8,
        entries in prop::collection::vec(arb_entry(), 0..40),
    ) {
        let (mut memory, generator, store) = memory(limit);
        let total = entries.len();
        for entry in entries {
            memory.record(entry, MemoryTier::Short).expect("record");
        }

        let summarised: usize = generator
            .prompts()
            .iter()
            .map(|p| p.lines().filter(|l| l.starts_with("- ")).count())
            .sum();
        prop_assert_eq!(summarised + memory.short_term().len(), total);
        prop_assert_eq!(memory.long_term().len(), generator.call_count());
        prop_assert_eq!(store.load_long_term("Evelyn").expect("load").len(), memory.long_term().len());
    }
}

// ---------------------------------------------------------------------------
// Property: rendered context respects its character bounds
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn rendered_context_is_bounded(
        short_entries in prop::collection::vec(arb_entry(), 0..20),
        long_entries in prop::collection::vec(arb_entry(), 0..60),
        short_limit in 0usize..300,
        long_limit in 0usize..300,
    ) {
        let (mut memory, _, _) = memory(20);
        for entry in short_entries {
            memory.record(entry, MemoryTier::Short).expect("record");
        }
        for entry in long_entries {
            memory.record(entry, MemoryTier::Long).expect("record");
        }

        let context = memory.render_context(short_limit, long_limit);
        prop_assert!(context.short_term.chars().count() <= short_limit + 3);
        prop_assert!(context.long_term.chars().count() <= long_limit + 3);
    }
}

// ---------------------------------------------------------------------------
// Property: relocation always lands somewhere new and on the map
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn relocate_never_returns_current_location(
        seed in any::<u64>(),
        location_count in 2usize..7,
        moves in 1usize..20,
    ) {
        let store = Arc::new(VillageStore::open_in_memory().expect("open"));
        let backend = Backend::new(Arc::new(ScriptedGenerator::always("ok")), Duration::from_secs(1));
        let mut agent = Agent::load_or_create(
            &AgentDefinition::new("George", "grumpy farmer", ""),
            store.clone(),
            backend,
            MemoryConfig::default(),
        )
        .expect("agent");
        let locations: Vec<String> = (0..location_count).map(|i| format!("Place {i}")).collect();
        let map = WorldMap::new(locations, store).expect("map");
        let mut rng = StdRng::seed_from_u64(seed);

        map.place(&mut agent, &mut rng).expect("place");
        for _ in 0..moves {
            let before = agent.location().expect("placed").to_string();
            let after = map.relocate(&mut agent, &mut rng).expect("relocate");
            prop_assert_ne!(&before, &after);
            prop_assert!(map.contains(&after));
            prop_assert_eq!(agent.location(), Some(after.as_str()));
        }
    }
}
