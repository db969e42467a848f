// src/crawl/queue.rs
// =============================================================================
// Shared state between the search loop, the scheduler and the workers.
//
// Two structures live here:
//
// - WorkQueue: FIFO of identifiers waiting for a worker.
//   Producer: the search loop. Consumer: the scheduler.
//
// - RunningRegistry: identifiers that currently have a worker.
//   Written by the scheduler (claim) and by workers (release, through the
//   RunningGuard they own). Read by the scheduler's capacity check.
//
// Both are plain collections behind a std Mutex. Critical sections are a few
// pushes and pops and never cross an .await, so a blocking mutex is fine.
// The important part is that "is there room?" and "take the slot" happen
// under ONE lock, so the registry can never hold more than `capacity` ids.
// =============================================================================

use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

// Locks a mutex, ignoring poisoning. A panicking worker can't leave these
// collections half-updated: every critical section is a single push/pop/insert.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[derive(Debug, Default)]
pub struct WorkQueue {
    pending: Mutex<VecDeque<String>>,
    // Total ever pushed, used for the max_result cap
    enqueued: AtomicUsize,
    search_done: AtomicBool,
}

impl WorkQueue {
    pub fn new() -> Self {
        Self::default()
    }

    // Appends a batch of ids in discovery order
    pub fn push_batch(&self, ids: Vec<String>) {
        let count = ids.len();
        lock(&self.pending).extend(ids);
        self.enqueued.fetch_add(count, Ordering::SeqCst);
    }

    // Puts an id back at the end of the queue (without counting it again)
    pub fn requeue(&self, id: String) {
        lock(&self.pending).push_back(id);
    }

    pub fn pop_front(&self) -> Option<String> {
        lock(&self.pending).pop_front()
    }

    pub fn len(&self) -> usize {
        lock(&self.pending).len()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.pending).is_empty()
    }

    /// How many ids have ever been enqueued
    pub fn total_enqueued(&self) -> usize {
        self.enqueued.load(Ordering::SeqCst)
    }

    /// Called once the search loop will never push again
    pub fn mark_search_done(&self) {
        self.search_done.store(true, Ordering::SeqCst);
    }

    pub fn is_search_done(&self) -> bool {
        self.search_done.load(Ordering::SeqCst)
    }
}

#[derive(Debug)]
pub struct RunningRegistry {
    running: Mutex<HashSet<String>>,
    capacity: usize,
    peak: AtomicUsize,
}

/// Outcome of one attempt to start work
#[derive(Debug)]
pub enum Claim {
    /// Got a slot for this id; the worker must own the guard
    Started(RunningGuard),
    /// Registry is full
    Full,
    /// Nothing waiting
    Empty,
    /// Front id already has a worker; it was moved to the back of the queue
    Deferred(String),
}

impl RunningRegistry {
    pub fn new(capacity: usize) -> Arc<Self> {
        Arc::new(Self {
            running: Mutex::new(HashSet::new()),
            capacity,
            peak: AtomicUsize::new(0),
        })
    }

    // Tries to move the front of `queue` into the registry
    //
    // The capacity check, the pop and the insert all happen while holding the
    // registry lock, so two claims can never both see the last free slot.
    pub fn claim_next(self: &Arc<Self>, queue: &WorkQueue) -> Claim {
        let mut running = lock(&self.running);

        if running.len() >= self.capacity {
            return Claim::Full;
        }

        let id = match queue.pop_front() {
            Some(id) => id,
            None => return Claim::Empty,
        };

        if running.contains(&id) {
            debug!(id = %id, "Already running, deferring duplicate");
            queue.requeue(id.clone());
            return Claim::Deferred(id);
        }

        running.insert(id.clone());
        self.peak.fetch_max(running.len(), Ordering::SeqCst);

        Claim::Started(RunningGuard {
            registry: Arc::clone(self),
            id,
        })
    }

    pub fn len(&self) -> usize {
        lock(&self.running).len()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.running).is_empty()
    }

    /// Highest number of ids that were ever running at once
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    fn release(&self, id: &str) {
        lock(&self.running).remove(id);
    }
}

/// Proof that a worker holds a registry slot. Dropping it frees the slot,
/// which also happens if the worker panics.
#[derive(Debug)]
pub struct RunningGuard {
    registry: Arc<RunningRegistry>,
    id: String,
}

impl RunningGuard {
    pub fn id(&self) -> &str {
        &self.id
    }
}

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.registry.release(&self.id);
    }
}

// -----------------------------------------------------------------------------
// NOTES:
//
// 1. Why does the guard hold an Arc to the registry?
//    - The guard moves into a spawned task, which must be 'static
//    - Arc lets the task keep the registry alive without borrowing it
//
// 2. Why not an async Mutex?
//    - tokio's Mutex is for locks held across .await points
//    - Here every lock is held for a handful of instructions
//    - Drop can't be async, and the guard needs to release in Drop
// -----------------------------------------------------------------------------
