//! Deterministic parallel batch execution.
//!
//! The [`Scheduler`] owns a fixed-size rayon thread pool and splits filter
//! member lists into contiguous batches, one per worker, with the remainder
//! folded into the last batch. The partition is a pure function of list
//! length and worker count, so assignment is reproducible run to run.

#![allow(clippy::cast_possible_truncation)]

use std::ops::Range;

use understory_foundation::{EntityId, Error, Result};
use understory_storage::ComponentPool;

use crate::filter::Filter;
use crate::system::ParallelRunnable;
use crate::tick::TickTime;

/// Splits `0..len` into at most `workers` contiguous ranges.
///
/// Each worker takes `len / workers` elements; the last also takes the
/// remainder. Empty ranges are dropped, so short lists yield fewer batches
/// than workers. An empty list yields no batches.
#[must_use]
pub fn batches(len: usize, workers: usize) -> Vec<Range<usize>> {
    if len == 0 || workers == 0 {
        return Vec::new();
    }
    let base = len / workers;
    let mut out = Vec::with_capacity(workers);
    let mut start = 0;
    for worker in 0..workers {
        let end = if worker == workers - 1 { len } else { start + base };
        if end > start {
            out.push(start..end);
        }
        start = end;
    }
    out
}

/// A fixed worker pool running filter batches and parallel systems.
pub struct Scheduler {
    pool: rayon::ThreadPool,
    workers: usize,
}

impl Scheduler {
    /// Builds a scheduler with `workers` dedicated threads.
    ///
    /// # Errors
    ///
    /// Returns [`understory_foundation::ErrorKind::WorkerPool`] if the
    /// thread pool cannot be constructed.
    pub fn new(workers: usize) -> Result<Self> {
        let workers = workers.max(1);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .build()
            .map_err(|e| Error::worker_pool(e.to_string()))?;
        Ok(Self { pool, workers })
    }

    /// Number of worker threads.
    #[must_use]
    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Runs `f` once per batch of the filter's current members.
    ///
    /// The member list is snapshotted before partitioning, so concurrent
    /// filter corrections do not tear a pass.
    pub fn run(&self, filter: &Filter, f: impl Fn(&[EntityId]) + Sync) {
        let members = filter.snapshot();
        let ranges = batches(members.len(), self.workers);
        self.pool.scope(|scope| {
            for range in ranges {
                let slice = &members[range];
                let f = &f;
                scope.spawn(move |_| f(slice));
            }
        });
    }

    /// Runs `f` over every member's `A` component, batches in parallel.
    ///
    /// Slots are resolved up front on the calling thread; workers then
    /// mutate disjoint slots through a raw view of the exclusively borrowed
    /// pool. Members missing from `pool` are skipped.
    pub fn run_mut<A: Send>(
        &self,
        filter: &Filter,
        pool: &mut ComponentPool<A>,
        f: impl Fn(EntityId, &mut A) + Sync,
    ) {
        let members = filter.snapshot();
        let targets: Vec<(EntityId, u32)> = members
            .iter()
            .filter_map(|&entity| pool.slot_of(entity).map(|slot| (entity, slot)))
            .collect();
        let ranges = batches(targets.len(), self.workers);
        let access = pool.par_access();
        self.pool.scope(|scope| {
            for range in ranges {
                let chunk = &targets[range];
                let f = &f;
                let access = &access;
                scope.spawn(move |_| {
                    for &(entity, slot) in chunk {
                        // SAFETY: entities are unique in a filter, each owns
                        // one slot, and batches are disjoint.
                        f(entity, unsafe { access.value_mut(slot) });
                    }
                });
            }
        });
    }

    /// Runs `f` over every member holding both an `A` and a `B` component,
    /// batches in parallel.
    pub fn run_mut2<A: Send, B: Send>(
        &self,
        filter: &Filter,
        pool_a: &mut ComponentPool<A>,
        pool_b: &mut ComponentPool<B>,
        f: impl Fn(EntityId, &mut A, &mut B) + Sync,
    ) {
        let members = filter.snapshot();
        let targets: Vec<(EntityId, u32, u32)> = members
            .iter()
            .filter_map(|&entity| {
                let slot_a = pool_a.slot_of(entity)?;
                let slot_b = pool_b.slot_of(entity)?;
                Some((entity, slot_a, slot_b))
            })
            .collect();
        let ranges = batches(targets.len(), self.workers);
        let access_a = pool_a.par_access();
        let access_b = pool_b.par_access();
        self.pool.scope(|scope| {
            for range in ranges {
                let chunk = &targets[range];
                let f = &f;
                let access_a = &access_a;
                let access_b = &access_b;
                scope.spawn(move |_| {
                    for &(entity, slot_a, slot_b) in chunk {
                        // SAFETY: unique entities, unique slots per pool,
                        // disjoint batches.
                        f(entity, unsafe { access_a.value_mut(slot_a) }, unsafe {
                            access_b.value_mut(slot_b)
                        });
                    }
                });
            }
        });
    }

    /// Runs every runnable concurrently, one spawn each, and waits for all.
    pub fn run_systems(&self, systems: &mut [Box<dyn ParallelRunnable>], time: &TickTime) {
        self.pool.scope(|scope| {
            for system in systems.iter_mut() {
                scope.spawn(move |_| system.run(time));
            }
        });
    }
}
