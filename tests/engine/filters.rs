//! Integration tests for constraints and incremental filters
//!
//! Tests constraint identity, seeding, and event-driven membership.

use std::sync::{Arc, Mutex};

use understory::engine::{Constraint, World};
use understory::foundation::EntityId;

struct Attack {
    value: i32,
}

struct Defense;

struct Stunned;

fn armed_constraint() -> Constraint {
    Constraint::builder()
        .include::<Attack>()
        .exclude::<Stunned>()
        .build()
        .unwrap()
}

// =============================================================================
// Constraint Identity
// =============================================================================

#[test]
fn constraint_identity_is_set_identity() {
    let a = Constraint::builder()
        .include::<Attack>()
        .include::<Defense>()
        .build()
        .unwrap();
    let b = Constraint::builder()
        .include::<Defense>()
        .include::<Attack>()
        .build()
        .unwrap();
    assert_eq!(a, b);

    let c = Constraint::builder().include::<Attack>().build().unwrap();
    assert_ne!(a, c);
}

#[test]
fn conflicting_constraints_are_rejected() {
    assert!(Constraint::builder().build().is_err());
    assert!(
        Constraint::builder()
            .include::<Attack>()
            .exclude::<Attack>()
            .build()
            .is_err()
    );
}

// =============================================================================
// Seeding and Incremental Maintenance
// =============================================================================

#[test]
fn filter_agrees_with_a_full_scan_under_churn() {
    let mut world = World::new();
    world.components_mut::<Attack>();
    world.components_mut::<Stunned>();
    let filter = world.filter(&armed_constraint()).unwrap();

    let entities: Vec<_> = (0..64).map(|_| world.spawn()).collect();
    for (i, &entity) in entities.iter().enumerate() {
        if i % 2 == 0 {
            world
                .components_mut::<Attack>()
                .add(entity, Attack { value: i as i32 })
                .unwrap();
        }
        if i % 3 == 0 {
            world.components_mut::<Stunned>().add(entity, Stunned).unwrap();
        }
    }
    for (i, &entity) in entities.iter().enumerate() {
        if i % 4 == 0 {
            world.components_mut::<Stunned>().remove(entity);
        }
        if i % 5 == 0 {
            world.components_mut::<Attack>().remove(entity);
        }
    }

    // Ground truth straight from the pools.
    let mut expected: Vec<EntityId> = entities
        .iter()
        .copied()
        .filter(|&entity| {
            world.components::<Attack>().unwrap().has(entity)
                && !world.components::<Stunned>().unwrap().has(entity)
        })
        .collect();
    expected.sort_unstable();

    let mut actual = filter.snapshot();
    actual.sort_unstable();
    assert_eq!(actual, expected);
}

#[test]
fn late_filter_creation_seeds_the_same_membership() {
    let mut world = World::new();
    world.components_mut::<Attack>();
    world.components_mut::<Stunned>();
    let live = world.filter(&armed_constraint()).unwrap();

    for i in 0..40 {
        let entity = world.spawn();
        world
            .components_mut::<Attack>()
            .add(entity, Attack { value: i })
            .unwrap();
        if i % 2 == 0 {
            world.components_mut::<Stunned>().add(entity, Stunned).unwrap();
        }
    }

    // A second world built to the same state, filtered only at the end.
    let mut fresh = World::new();
    fresh.components_mut::<Attack>();
    fresh.components_mut::<Stunned>();
    for i in 0..40 {
        let entity = fresh.spawn();
        fresh
            .components_mut::<Attack>()
            .add(entity, Attack { value: i })
            .unwrap();
        if i % 2 == 0 {
            fresh.components_mut::<Stunned>().add(entity, Stunned).unwrap();
        }
    }
    let seeded = fresh.filter(&armed_constraint()).unwrap();

    let mut a = live.snapshot();
    let mut b = seeded.snapshot();
    a.sort_unstable();
    b.sort_unstable();
    assert_eq!(a, b);
    assert_eq!(a.len(), 20);
}

#[test]
fn despawn_evicts_members_through_pool_events() {
    let mut world = World::new();
    world.components_mut::<Attack>();
    world.components_mut::<Stunned>();
    let filter = world.filter(&armed_constraint()).unwrap();

    let entity = world.spawn();
    world
        .components_mut::<Attack>()
        .add(entity, Attack { value: 1 })
        .unwrap();
    assert!(filter.contains(entity));

    world.despawn(entity).unwrap();
    assert!(!filter.contains(entity));
    assert!(filter.is_empty());
}

// =============================================================================
// Filter Observers
// =============================================================================

#[test]
fn membership_observers_mirror_pool_churn() {
    let mut world = World::new();
    world.components_mut::<Attack>();
    world.components_mut::<Stunned>();
    let filter = world.filter(&armed_constraint()).unwrap();

    let log = Arc::new(Mutex::new(Vec::new()));
    let added = Arc::clone(&log);
    filter.observe_added(Box::new(move |entity| {
        added.lock().unwrap().push(("in", entity));
    }));
    let removing = Arc::clone(&log);
    filter.observe_removing(Box::new(move |entity| {
        removing.lock().unwrap().push(("out", entity));
    }));

    let entity = world.spawn();
    world
        .components_mut::<Attack>()
        .add(entity, Attack { value: 1 })
        .unwrap();
    world.components_mut::<Stunned>().add(entity, Stunned).unwrap();
    world.components_mut::<Stunned>().remove(entity);

    let log = log.lock().unwrap();
    assert_eq!(
        *log,
        vec![("in", entity), ("out", entity), ("in", entity)]
    );
}

// =============================================================================
// Value Iteration
// =============================================================================

#[test]
fn for_each_resolves_members_to_values() {
    let mut world = World::new();
    world.components_mut::<Attack>();
    world.components_mut::<Stunned>();
    let filter = world.filter(&armed_constraint()).unwrap();

    for i in 0..10 {
        let entity = world.spawn();
        world
            .components_mut::<Attack>()
            .add(entity, Attack { value: i })
            .unwrap();
    }

    filter.for_each(world.components_mut::<Attack>(), |_, attack| {
        attack.value += 100;
    });

    let total: i32 = world
        .components::<Attack>()
        .unwrap()
        .iter()
        .map(|(_, attack)| attack.value)
        .sum();
    assert_eq!(total, (0..10).sum::<i32>() + 1_000);
}
