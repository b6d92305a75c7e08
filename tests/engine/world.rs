//! Integration tests for the world
//!
//! Tests the end-to-end loop: entities, pools, relations, hierarchy, and
//! system passes working together.

use std::sync::{Arc, Mutex};

use understory::engine::{Constraint, Scheduler, System, TickTime, World};
use understory::foundation::ErrorKind;

struct Attack {
    value: i64,
}

struct Stunned;

struct Alliance {
    strength: u8,
}

// =============================================================================
// Cascading Despawn
// =============================================================================

#[test]
fn despawn_reaches_pools_relations_filters_and_hierarchy() {
    let mut world = World::new();
    world.components_mut::<Attack>();
    world.components_mut::<Stunned>();
    let constraint = Constraint::builder().include::<Attack>().build().unwrap();
    let filter = world.filter(&constraint).unwrap();

    let hero = world.spawn();
    let sidekick = world.spawn();
    let pet = world.spawn();

    world.components_mut::<Attack>().add(hero, Attack { value: 7 }).unwrap();
    world
        .relations_mut::<Alliance>()
        .add(hero, sidekick, Alliance { strength: 5 })
        .unwrap();
    world.set_parent(pet, hero).unwrap();

    assert!(filter.contains(hero));

    world.despawn(hero).unwrap();

    assert!(!world.is_alive(hero));
    assert!(!filter.contains(hero));
    assert!(!world.components::<Attack>().unwrap().has(hero));
    assert_eq!(world.relations::<Alliance>().unwrap().count(sidekick), 0);
    assert!(world.is_alive(pet));
    assert_eq!(world.parent(pet), None);

    // The reused id starts from a clean slate.
    let reborn = world.spawn();
    assert_eq!(reborn, hero);
    assert!(!filter.contains(reborn));
    assert!(!world.components::<Attack>().unwrap().has(reborn));
}

#[test]
fn dead_entity_operations_surface_the_right_errors() {
    let mut world = World::new();
    let a = world.spawn();
    let b = world.spawn();
    world.despawn(a).unwrap();

    let err = world.despawn(a).unwrap_err();
    assert!(matches!(err.kind, ErrorKind::EntityNotFound(_)));

    let err = world.set_parent(b, a).unwrap_err();
    assert!(matches!(err.kind, ErrorKind::EntityNotFound(_)));
}

// =============================================================================
// Systems Driving the Kernel
// =============================================================================

struct RegenSystem;

impl System for RegenSystem {
    fn update(&mut self, world: &mut World, _time: &TickTime) {
        let constraint = Constraint::builder()
            .include::<Attack>()
            .exclude::<Stunned>()
            .build()
            .unwrap();
        let filter = world.filter(&constraint).unwrap();
        filter.for_each(world.components_mut::<Attack>(), |_, attack| {
            attack.value += 1;
        });
    }
}

#[test]
fn systems_query_and_mutate_through_filters() {
    let mut world = World::new();
    world.components_mut::<Attack>();
    world.components_mut::<Stunned>();
    world.add_system(Box::new(RegenSystem));

    let fighter = world.spawn();
    let bystander = world.spawn();
    world
        .components_mut::<Attack>()
        .add(fighter, Attack { value: 0 })
        .unwrap();
    world
        .components_mut::<Attack>()
        .add(bystander, Attack { value: 0 })
        .unwrap();
    world.components_mut::<Stunned>().add(bystander, Stunned).unwrap();

    for _ in 0..5 {
        world.update(16).unwrap();
    }

    assert_eq!(world.components::<Attack>().unwrap().get(fighter).unwrap().value, 5);
    assert_eq!(world.components::<Attack>().unwrap().get(bystander).unwrap().value, 0);
    assert_eq!(world.time().total_ticks, 80);
}

struct DrawLog {
    frames: Arc<Mutex<Vec<u32>>>,
}

impl System for DrawLog {
    fn draw(&mut self, _world: &mut World, time: &TickTime) {
        self.frames.lock().unwrap().push(time.cycle);
    }
}

#[test]
fn draw_passes_observe_the_clock_without_advancing_it() {
    let mut world = World::new();
    let frames = Arc::new(Mutex::new(Vec::new()));
    world.add_system(Box::new(DrawLog {
        frames: Arc::clone(&frames),
    }));

    world.update(16).unwrap();
    world.draw().unwrap();
    world.draw().unwrap();
    world.update(16).unwrap();
    world.draw().unwrap();

    assert_eq!(*frames.lock().unwrap(), vec![1, 1, 2]);
    assert_eq!(world.time().cycle, 2);
}

// =============================================================================
// World + Scheduler End to End
// =============================================================================

#[test]
fn scheduled_passes_match_the_sequential_result() {
    let constraint = Constraint::builder().include::<Attack>().build().unwrap();

    let build = |count: u32| {
        let mut world = World::new();
        world.components_mut::<Attack>();
        let filter = world.filter(&constraint).unwrap();
        for i in 0..count {
            let entity = world.spawn();
            world
                .components_mut::<Attack>()
                .add(entity, Attack { value: i64::from(i) })
                .unwrap();
        }
        (world, filter)
    };

    let (mut sequential, seq_filter) = build(257);
    seq_filter.for_each(sequential.components_mut::<Attack>(), |_, attack| {
        attack.value = attack.value * 3 + 1;
    });

    let (mut parallel, par_filter) = build(257);
    let scheduler = Scheduler::new(4).unwrap();
    scheduler.run_mut(&par_filter, parallel.components_mut::<Attack>(), |_, attack| {
        attack.value = attack.value * 3 + 1;
    });

    for entity in seq_filter.snapshot() {
        assert_eq!(
            sequential.components::<Attack>().unwrap().get(entity).unwrap().value,
            parallel.components::<Attack>().unwrap().get(entity).unwrap().value,
        );
    }
}
