//! Integration tests for the parallel scheduler
//!
//! Tests batch partitioning, parallel mutation, and run-to-run determinism.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use understory::engine::{
    Constraint, Filter, ParallelRunnable, Scheduler, TickTime, World, batches,
};

struct Attack {
    value: i64,
}

fn armed_world(count: u32) -> (World, Filter) {
    let mut world = World::new();
    world.components_mut::<Attack>();
    let constraint = Constraint::builder().include::<Attack>().build().unwrap();
    let filter = world.filter(&constraint).unwrap();
    for i in 0..count {
        let entity = world.spawn();
        world
            .components_mut::<Attack>()
            .add(entity, Attack { value: i64::from(i) })
            .unwrap();
    }
    (world, filter)
}

// =============================================================================
// Partitioning
// =============================================================================

#[test]
fn batches_partition_without_gaps_or_overlap() {
    for (len, workers) in [(100, 4), (101, 4), (7, 3), (3, 8), (0, 4), (64, 1)] {
        let ranges = batches(len, workers);
        let mut next = 0;
        for range in &ranges {
            assert_eq!(range.start, next);
            next = range.end;
        }
        assert_eq!(next, len, "len={len} workers={workers}");
        assert!(ranges.len() <= workers);
    }
}

#[test]
fn every_member_is_visited_exactly_once() {
    let (_world, filter) = armed_world(101);
    let scheduler = Scheduler::new(4).unwrap();
    let visited = Mutex::new(Vec::new());

    scheduler.run(&filter, |batch| {
        visited.lock().unwrap().extend_from_slice(batch);
    });

    let mut visited = visited.into_inner().unwrap();
    visited.sort_unstable();
    let mut expected = filter.snapshot();
    expected.sort_unstable();
    assert_eq!(visited, expected);
}

// =============================================================================
// Parallel Mutation
// =============================================================================

#[test]
fn run_mut_touches_every_component_once() {
    for workers in [1, 2, 4] {
        let (mut world, filter) = armed_world(100);
        let scheduler = Scheduler::new(workers).unwrap();

        scheduler.run_mut(&filter, world.components_mut::<Attack>(), |_, attack| {
            attack.value += 1;
        });

        let total: i64 = world
            .components::<Attack>()
            .unwrap()
            .iter()
            .map(|(_, attack)| attack.value)
            .sum();
        assert_eq!(total, (0..100).sum::<i64>() + 100, "workers={workers}");
    }
}

#[test]
fn repeated_passes_are_deterministic_across_worker_counts() {
    for workers in [1, 2, 4] {
        let (mut world, filter) = armed_world(100);
        let scheduler = Scheduler::new(workers).unwrap();

        for _ in 0..10 {
            scheduler.run_mut(&filter, world.components_mut::<Attack>(), |_, attack| {
                attack.value += 1;
            });
        }

        for (i, entity) in filter.snapshot().into_iter().enumerate() {
            let attack = world.components::<Attack>().unwrap().get(entity).unwrap();
            assert_eq!(attack.value, i as i64 + 10, "workers={workers}");
        }
    }
}

#[test]
fn run_mut2_pairs_components_of_the_same_entity() {
    struct Speed {
        value: i64,
    }
    struct Momentum {
        value: i64,
    }

    let (world, filter) = armed_world(50);

    // Side pools keyed by the same entities; every other member lacks one.
    let mut speeds = understory::storage::ComponentPool::new();
    let mut momenta = understory::storage::ComponentPool::new();
    for (i, entity) in filter.snapshot().into_iter().enumerate() {
        speeds.add(entity, Speed { value: i as i64 }).unwrap();
        if i % 2 == 0 {
            momenta.add(entity, Momentum { value: 0 }).unwrap();
        }
    }

    let scheduler = Scheduler::new(4).unwrap();
    scheduler.run_mut2(&filter, &mut speeds, &mut momenta, |_, speed, momentum| {
        momentum.value = speed.value * 2;
    });

    for (entity, momentum) in momenta.iter() {
        let speed = speeds.get(entity).unwrap();
        assert_eq!(momentum.value, speed.value * 2);
    }
    assert_eq!(momenta.len(), 25);
    drop(world);
}

// =============================================================================
// Parallel Systems
// =============================================================================

struct TickCounter {
    ticks: Arc<AtomicU32>,
}

impl ParallelRunnable for TickCounter {
    fn run(&mut self, time: &TickTime) {
        assert_eq!(time.elapsed_ticks, 16);
        self.ticks.fetch_add(1, Ordering::Relaxed);
    }
}

#[test]
fn run_systems_executes_each_runnable_once_per_pass() {
    let scheduler = Scheduler::new(2).unwrap();
    let mut time = TickTime::new();
    time.advance(16);

    let ticks = Arc::new(AtomicU32::new(0));
    let mut systems: Vec<Box<dyn ParallelRunnable>> = (0..8)
        .map(|_| {
            Box::new(TickCounter { ticks: Arc::clone(&ticks) }) as Box<dyn ParallelRunnable>
        })
        .collect();

    scheduler.run_systems(&mut systems, &time);
    scheduler.run_systems(&mut systems, &time);

    assert_eq!(ticks.load(Ordering::Relaxed), 16);
}
