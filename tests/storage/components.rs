//! Integration tests for component pools
//!
//! Tests add/get/remove round trips, slot reuse, notifications, and hooks.

use std::sync::{Arc, Mutex};

use understory::foundation::EntityId;
use understory::storage::{ComponentPool, PoolConfig, PoolEvent};

#[derive(Clone, Debug, PartialEq)]
struct Health {
    current: i64,
    max: i64,
}

fn e(id: u32) -> EntityId {
    EntityId::new(id)
}

// =============================================================================
// Round Trips
// =============================================================================

#[test]
fn add_get_remove_round_trip() {
    let mut pool = ComponentPool::new();
    pool.add(e(1), Health { current: 80, max: 100 }).unwrap();

    assert!(pool.has(e(1)));
    assert_eq!(pool.get(e(1)).unwrap().current, 80);

    pool.get_mut(e(1)).unwrap().current = 90;
    assert_eq!(pool.get(e(1)).unwrap().current, 90);

    let removed = pool.remove(e(1)).unwrap();
    assert_eq!(removed, Health { current: 90, max: 100 });
    assert!(!pool.has(e(1)));
    assert!(pool.get(e(1)).is_err());
}

#[test]
fn duplicate_add_is_rejected_without_damage() {
    let mut pool = ComponentPool::new();
    pool.add(e(1), Health { current: 1, max: 1 }).unwrap();

    assert!(pool.add(e(1), Health { current: 2, max: 2 }).is_err());
    assert!(!pool.try_add(e(1), Health { current: 3, max: 3 }));
    assert_eq!(pool.len(), 1);
    assert_eq!(pool.get(e(1)).unwrap().current, 1);
}

#[test]
fn many_entities_survive_rehash() {
    let mut pool = ComponentPool::new();
    for id in 0..2_000 {
        pool.add(e(id), Health { current: i64::from(id), max: 100 })
            .unwrap();
    }
    assert_eq!(pool.len(), 2_000);
    for id in (0..2_000).step_by(17) {
        assert_eq!(pool.get(e(id)).unwrap().current, i64::from(id));
    }
}

// =============================================================================
// Slot Reuse
// =============================================================================

#[test]
fn removed_slots_are_reused_before_growth() {
    let mut pool = ComponentPool::new();
    for id in 0..100 {
        pool.add(e(id), Health { current: 0, max: 0 }).unwrap();
    }
    let slots: Vec<_> = (0..100).map(|id| pool.slot_of(e(id)).unwrap()).collect();

    for id in 0..100 {
        pool.remove(e(id));
    }
    for id in 100..200 {
        pool.add(e(id), Health { current: 0, max: 0 }).unwrap();
    }

    // Every new entry landed in a recycled physical slot.
    for id in 100..200 {
        assert!(slots.contains(&pool.slot_of(e(id)).unwrap()));
    }
}

// =============================================================================
// Notifications and Hooks
// =============================================================================

#[test]
fn structural_events_fire_in_order() {
    let mut pool = ComponentPool::new();
    let log = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&log);
    pool.observe(Box::new(move |event, entity| {
        sink.lock().unwrap().push((event, entity));
    }));

    pool.add(e(7), Health { current: 1, max: 1 }).unwrap();
    pool.remove(e(7));

    let log = log.lock().unwrap();
    assert_eq!(
        *log,
        vec![(PoolEvent::Added, e(7)), (PoolEvent::Removing, e(7))]
    );
}

#[test]
fn removing_listener_observes_the_value_before_unlink() {
    let mut pool = ComponentPool::new();
    let seen = Arc::new(Mutex::new(None));
    let sink = Arc::clone(&seen);
    pool.observe_removing(Box::new(move |_, value: &Health| {
        *sink.lock().unwrap() = Some(value.current);
    }));

    pool.add(e(1), Health { current: 42, max: 100 }).unwrap();
    pool.remove(e(1));

    assert_eq!(*seen.lock().unwrap(), Some(42));
}

#[test]
fn dispose_hook_runs_on_remove_and_clear() {
    let disposed = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&disposed);
    let mut pool = ComponentPool::with_config(PoolConfig::default().with_dispose_hook(
        move |entity: EntityId, value: &Health| {
            sink.lock().unwrap().push((entity, value.current));
        },
    ));

    pool.add(e(1), Health { current: 1, max: 1 }).unwrap();
    pool.add(e(2), Health { current: 2, max: 2 }).unwrap();
    pool.remove(e(1));
    pool.clear();

    let mut calls = disposed.lock().unwrap().clone();
    calls.sort();
    assert_eq!(calls, vec![(e(1), 1), (e(2), 2)]);
    assert!(pool.is_empty());
}

#[test]
fn clone_hook_overrides_clone() {
    let mut pool = ComponentPool::with_config(PoolConfig::default().with_clone_hook(
        |value: &Health| Health {
            current: value.max,
            max: value.max,
        },
    ));

    pool.add(e(1), Health { current: 10, max: 100 }).unwrap();
    pool.clone_to(e(1), e(2)).unwrap();

    assert_eq!(pool.get(e(2)).unwrap().current, 100);
    assert_eq!(pool.get(e(1)).unwrap().current, 10);
}

#[test]
fn update_notifies_with_old_and_new() {
    let mut pool = ComponentPool::new();
    let seen = Arc::new(Mutex::new(None));
    let sink = Arc::clone(&seen);
    pool.observe_updating(Box::new(
        move |_, old: &Health, new: &Health| {
            *sink.lock().unwrap() = Some((old.current, new.current));
        },
    ));

    pool.add(e(1), Health { current: 5, max: 10 }).unwrap();
    assert!(pool.update(e(1), Health { current: 8, max: 10 }));

    assert_eq!(*seen.lock().unwrap(), Some((5, 8)));
    assert_eq!(pool.get(e(1)).unwrap().current, 8);
}
