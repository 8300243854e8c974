//! Village benchmark suite.
//!
//! The backend is a `ScriptedGenerator` and the store is in-memory SQLite,
//! so these measure bookkeeping cost only:
//!   short_term_record_with_transfer .. record + summarise + persist
//!   long_term_record ................. single persisted append
//!   render_context_full_window ........ 50-entry long-term render
//!   village_tick_two_agents ........... one full tick, shared location

use std::sync::Arc;
use std::time::Duration;

use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};

use village_core::config::MemoryConfig;
use village_core::{Backend, MemoryStore, MemoryTier, Village, VillageConfig, VillageStore};
use village_llm::ScriptedGenerator;

fn backend() -> Backend {
    Backend::new(
        Arc::new(ScriptedGenerator::always("A quiet, ordinary morning in the village.")),
        Duration::from_secs(1),
    )
}

fn memory(limit: usize) -> MemoryStore {
    let store = Arc::new(VillageStore::open_in_memory().expect("open store"));
    let config = MemoryConfig {
        short_term_limit: limit,
        ..MemoryConfig::default()
    };
    MemoryStore::new("Evelyn", config, store, backend())
}

/// Benchmark: Short-term record that always overflows a limit of 4.
fn bench_short_term_record(c: &mut Criterion) {
    c.bench_function("short_term_record_with_transfer", |b| {
        b.iter_batched(
            || {
                let mut m = memory(4);
                for i in 0..4 {
                    m.record(format!("Action: kneads dough batch {i}"), MemoryTier::Short)
                        .expect("record");
                }
                m
            },
            |mut m| {
                m.record(black_box("Action: pulls loaves from the oven"), MemoryTier::Short)
                    .expect("record");
                m
            },
            BatchSize::SmallInput,
        );
    });
}

/// Benchmark: Durable long-term append.
fn bench_long_term_record(c: &mut Criterion) {
    let mut m = memory(20);
    c.bench_function("long_term_record", |b| {
        b.iter(|| {
            m.record(black_box("Talked to George about the weather"), MemoryTier::Long)
                .expect("record");
        });
    });
}

/// Benchmark: Context render over a full long-term window.
fn bench_render_context(c: &mut Criterion) {
    let mut m = memory(20);
    for i in 0..60 {
        m.record(format!("Talked to George about topic number {i}"), MemoryTier::Long)
            .expect("record");
    }
    for i in 0..20 {
        m.record(format!("User: question {i}"), MemoryTier::Short)
            .expect("record");
    }
    c.bench_function("render_context_full_window", |b| {
        b.iter(|| black_box(m.render_context(black_box(2000), black_box(1000))));
    });
}

/// Benchmark: One tick with both reference agents at the Bakery.
fn bench_village_tick(c: &mut Criterion) {
    let mut config = VillageConfig::default();
    config.simulation.seed = Some(7);
    config.simulation.move_probability = 0.0;
    let store = Arc::new(VillageStore::open_in_memory().expect("open store"));
    let mut village = Village::new(
        &config,
        store,
        Arc::new(ScriptedGenerator::always("Good morning!")),
    )
    .expect("village");
    village.place_agent("Evelyn", "Bakery").expect("place");
    village.place_agent("George", "Bakery").expect("place");

    c.bench_function("village_tick_two_agents", |b| {
        b.iter(|| black_box(village.tick().expect("tick")));
    });
}

criterion_group!(
    benches,
    bench_short_term_record,
    bench_long_term_record,
    bench_render_context,
    bench_village_tick,
);
criterion_main!(benches);
