//! Integration tests for relation pools
//!
//! Tests unordered-pair symmetry, adjacency consistency, and cascades.

use understory::foundation::EntityId;
use understory::storage::RelationPool;

#[derive(Debug, PartialEq)]
struct Alliance {
    strength: u8,
}

fn e(id: u32) -> EntityId {
    EntityId::new(id)
}

// =============================================================================
// Symmetry
// =============================================================================

#[test]
fn pairs_are_unordered() {
    let mut pool = RelationPool::new();
    pool.add(e(1), e(2), Alliance { strength: 5 }).unwrap();

    assert!(pool.has(e(1), e(2)));
    assert!(pool.has(e(2), e(1)));
    assert_eq!(pool.get(e(2), e(1)).unwrap().strength, 5);

    pool.get_mut(e(2), e(1)).unwrap().strength = 9;
    assert_eq!(pool.get(e(1), e(2)).unwrap().strength, 9);

    assert!(pool.add(e(2), e(1), Alliance { strength: 1 }).is_err());
}

// =============================================================================
// Adjacency Consistency Under Removal
// =============================================================================

#[test]
fn hub_survives_middle_removal() {
    let mut pool = RelationPool::new();
    let hub = e(0);
    pool.add(hub, e(1), Alliance { strength: 1 }).unwrap();
    pool.add(hub, e(2), Alliance { strength: 2 }).unwrap();
    pool.add(hub, e(3), Alliance { strength: 3 }).unwrap();

    assert_eq!(pool.remove(hub, e(2)).unwrap().strength, 2);

    assert_eq!(pool.get(hub, e(1)).unwrap().strength, 1);
    assert_eq!(pool.get(hub, e(3)).unwrap().strength, 3);
    assert_eq!(pool.count(hub), 2);

    let mut neighbors: Vec<_> = pool.relations(hub).map(|(other, _)| other).collect();
    neighbors.sort_unstable();
    assert_eq!(neighbors, vec![e(1), e(3)]);
}

#[test]
fn dense_churn_keeps_lookups_exact() {
    let mut pool = RelationPool::new();
    for i in 0..50u32 {
        pool.add(e(i), e(i + 1), Alliance { strength: (i % 250) as u8 })
            .unwrap();
    }
    // Remove every other edge, exercising swap-remove relocation.
    for i in (0..50u32).step_by(2) {
        assert!(pool.remove(e(i + 1), e(i)).is_some());
    }
    for i in (1..50u32).step_by(2) {
        assert_eq!(pool.get(e(i), e(i + 1)).unwrap().strength, (i % 250) as u8);
    }
    assert_eq!(pool.len(), 25);
}

// =============================================================================
// Cascades
// =============================================================================

#[test]
fn remove_all_detaches_an_entity_completely() {
    let mut pool = RelationPool::new();
    pool.add(e(0), e(1), Alliance { strength: 1 }).unwrap();
    pool.add(e(0), e(2), Alliance { strength: 2 }).unwrap();
    pool.add(e(1), e(2), Alliance { strength: 3 }).unwrap();
    pool.add(e(0), e(0), Alliance { strength: 4 }).unwrap();

    assert!(pool.remove_all(e(0)));

    assert_eq!(pool.count(e(0)), 0);
    assert_eq!(pool.len(), 1);
    assert!(pool.has(e(1), e(2)));
    assert!(!pool.remove_all(e(0)));
}
