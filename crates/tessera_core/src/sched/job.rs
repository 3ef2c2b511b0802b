//! # Jobs
//!
//! A job is a named group of systems run together each frame by a worker
//! pool that lives as long as the job.
//!
//! ## Frame protocol
//!
//! ```text
//!   controller (execute)                 worker 0..N
//!   ────────────────────                 ───────────
//!   build WorkPlan, fill slots           Idle: wait on wake signal
//!   generation += 1, notify_all  ──────> Running: process own slot
//!   barrier.wait()               <────── barrier.wait()
//!   collect drop lists                   Idle
//! ```
//!
//! The barrier has `workers + 1` parties. When `execute` returns, every
//! worker has finished its chunks and none is touching storage.
//!
//! ## Shutdown
//!
//! `stop()` sets the stop flag under the wake lock and broadcasts. A worker
//! only exits when no frame is pending, so a frame that was already
//! signalled always reaches the barrier.

use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Barrier};
use std::thread::{self, JoinHandle};

use parking_lot::{Condvar, Mutex};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use super::partition::{Assignment, SystemLoad, WorkPlan};
use crate::ecs::{Entity, SystemRef};
use crate::error::{EcsError, EcsResult};

/// Construction parameters for a [`Job`] beyond its systems.
#[derive(Clone, Debug)]
pub struct JobOptions {
    /// Seed for the remainder-worker RNG.
    pub seed: u64,
    /// Worker threads are named `{prefix}-{job}-{index}`.
    pub thread_name_prefix: String,
}

impl Default for JobOptions {
    fn default() -> Self {
        Self {
            seed: 0,
            thread_name_prefix: "tessera".to_owned(),
        }
    }
}

/// Wake signal state, guarded by `Shared::wake`.
struct WakeState {
    /// Bumped once per frame.
    generation: u64,
    stopped: bool,
}

/// Per-worker mailbox. Written by the controller before waking and read
/// back after the barrier; the worker holds it while running.
#[derive(Default)]
struct WorkerSlot {
    assignments: Vec<Assignment>,
    dropped: Vec<Entity>,
    /// Indices of systems whose chunk panicked.
    failed: Vec<usize>,
}

/// State shared between the controller and the workers.
struct Shared {
    name: String,
    systems: Vec<SystemRef>,
    wake: Mutex<WakeState>,
    wake_signal: Condvar,
    barrier: Barrier,
    slots: Vec<Mutex<WorkerSlot>>,
}

impl Shared {
    /// Blocks until a new frame is signalled.
    ///
    /// Returns the frame generation, or `None` once stopped with nothing pending.
    fn wait_for_frame(&self, seen: u64) -> Option<u64> {
        let mut wake = self.wake.lock();
        while wake.generation == seen && !wake.stopped {
            self.wake_signal.wait(&mut wake);
        }
        (wake.generation != seen).then_some(wake.generation)
    }

    /// Runs every chunk assigned to `worker` this frame.
    fn run_chunks(&self, worker: usize) {
        let mut slot = self.slots[worker].lock();
        let WorkerSlot {
            assignments,
            dropped,
            failed,
        } = &mut *slot;

        for assignment in assignments.iter() {
            let system = &self.systems[assignment.system];
            let range = assignment.range.clone();
            let result = panic::catch_unwind(AssertUnwindSafe(|| {
                system.process(range.start, range.end)
            }));

            match result {
                Ok(mut entities) => dropped.append(&mut entities),
                Err(payload) => {
                    tracing::error!(
                        job = %self.name,
                        system = system.name(),
                        worker,
                        from = range.start,
                        to = range.end,
                        reason = panic_message(payload.as_ref()),
                        "processing panicked"
                    );
                    failed.push(assignment.system);
                }
            }
        }
    }

    fn worker_loop(&self, worker: usize) {
        let mut seen = 0;
        while let Some(generation) = self.wait_for_frame(seen) {
            seen = generation;
            self.run_chunks(worker);
            self.barrier.wait();
        }
        tracing::debug!(job = %self.name, worker, "worker stopped");
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "<non-string panic payload>"
    }
}

/// A named group of systems with a dedicated worker pool.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use tessera_core::{Job, Passive, Quantity, System, SystemRef};
///
/// let system: SystemRef = Arc::new(System::<u32, _>::new("ticks", Quantity::One, Passive));
/// let mut job = Job::new("logic", vec![system], 2)?;
/// job.execute()?;
/// assert!(job.dropped().is_empty());
/// # Ok::<(), tessera_core::EcsError>(())
/// ```
pub struct Job {
    shared: Arc<Shared>,
    workers: Vec<JoinHandle<()>>,
    rng: ChaCha8Rng,
    dropped: Vec<Entity>,
    frames: u64,
}

impl Job {
    /// Creates a job with default options and spawns its workers.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::WorkerSpawn`] if a worker thread cannot be spawned.
    pub fn new(
        name: impl Into<String>,
        systems: Vec<SystemRef>,
        worker_count: usize,
    ) -> EcsResult<Self> {
        Self::with_options(name, systems, worker_count, &JobOptions::default())
    }

    /// Creates a job and spawns its workers.
    ///
    /// Systems are deduplicated by name, first occurrence kept. A worker
    /// count of zero is clamped to one.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::WorkerSpawn`] if a worker thread cannot be
    /// spawned. Workers spawned before the failure are stopped and joined.
    pub fn with_options(
        name: impl Into<String>,
        systems: Vec<SystemRef>,
        worker_count: usize,
        options: &JobOptions,
    ) -> EcsResult<Self> {
        let name = name.into();
        let worker_count = worker_count.max(1);

        let mut unique: Vec<SystemRef> = Vec::with_capacity(systems.len());
        for system in systems {
            if !unique.iter().any(|s| s.name() == system.name()) {
                unique.push(system);
            }
        }

        let shared = Arc::new(Shared {
            name: name.clone(),
            systems: unique,
            wake: Mutex::new(WakeState {
                generation: 0,
                stopped: false,
            }),
            wake_signal: Condvar::new(),
            barrier: Barrier::new(worker_count + 1),
            slots: (0..worker_count).map(|_| Mutex::default()).collect(),
        });

        let mut job = Self {
            shared,
            workers: Vec::with_capacity(worker_count),
            rng: ChaCha8Rng::seed_from_u64(options.seed),
            dropped: Vec::new(),
            frames: 0,
        };

        for worker in 0..worker_count {
            let shared = Arc::clone(&job.shared);
            let spawned = thread::Builder::new()
                .name(format!("{}-{name}-{worker}", options.thread_name_prefix))
                .spawn(move || shared.worker_loop(worker));

            match spawned {
                Ok(handle) => job.workers.push(handle),
                // Dropping the partial job stops and joins what was spawned.
                Err(source) => return Err(EcsError::WorkerSpawn { job: name, source }),
            }
        }

        tracing::info!(
            job = %name,
            workers = worker_count,
            systems = ?job.shared.systems.iter().map(|s| s.name()).collect::<Vec<_>>(),
            "job started"
        );

        Ok(job)
    }

    /// Runs one frame: partition, wake all workers, wait at the barrier,
    /// collect drop lists.
    ///
    /// # Errors
    ///
    /// - [`EcsError::JobStopped`] if [`Job::stop`] was called. Nothing runs.
    /// - [`EcsError::ProcessingPanicked`] if any chunk panicked. The frame
    ///   still completed and [`Job::dropped`] holds every entity the other
    ///   chunks flagged.
    pub fn execute(&mut self) -> EcsResult<()> {
        self.dropped.clear();
        let shared = &*self.shared;

        let loads: Vec<SystemLoad> = shared
            .systems
            .iter()
            .map(|system| SystemLoad {
                count: system.component_count(),
                multithreadable: system.is_multithreadable(),
            })
            .collect();
        let plan = WorkPlan::build(&loads, shared.slots.len(), &mut self.rng);
        tracing::trace!(job = %shared.name, frame = self.frames, ?plan, "work plan");

        for (slot, assignments) in shared.slots.iter().zip(plan.into_workers()) {
            let mut slot = slot.lock();
            slot.assignments = assignments;
            slot.dropped.clear();
            slot.failed.clear();
        }

        {
            let mut wake = shared.wake.lock();
            if wake.stopped {
                return Err(EcsError::JobStopped(shared.name.clone()));
            }
            wake.generation += 1;
            shared.wake_signal.notify_all();
        }

        shared.barrier.wait();

        let mut failed = Vec::new();
        for slot in &shared.slots {
            let mut slot = slot.lock();
            self.dropped.append(&mut slot.dropped);
            failed.extend(
                slot.failed
                    .drain(..)
                    .map(|index| shared.systems[index].name().to_owned()),
            );
        }
        self.frames += 1;

        if failed.is_empty() {
            Ok(())
        } else {
            Err(EcsError::ProcessingPanicked {
                job: shared.name.clone(),
                systems: failed,
            })
        }
    }

    /// Asks every worker to exit. Idempotent.
    ///
    /// Idle workers are woken and exit immediately; later calls to
    /// [`Job::execute`] fail with [`EcsError::JobStopped`].
    pub fn stop(&self) {
        let mut wake = self.shared.wake.lock();
        if !wake.stopped {
            wake.stopped = true;
            self.shared.wake_signal.notify_all();
            tracing::debug!(job = %self.shared.name, "job stopping");
        }
    }

    /// Whether [`Job::stop`] was called.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.shared.wake.lock().stopped
    }

    /// Name of the job.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.shared.name
    }

    /// Systems run by this job, deduplicated, in registration order.
    #[must_use]
    pub fn systems(&self) -> &[SystemRef] {
        &self.shared.systems
    }

    /// Number of worker threads.
    #[must_use]
    pub fn worker_count(&self) -> usize {
        self.shared.slots.len()
    }

    /// Entities flagged for removal during the last frame.
    #[must_use]
    pub fn dropped(&self) -> &[Entity] {
        &self.dropped
    }

    /// Takes the last frame's drop list, leaving it empty.
    pub fn take_dropped(&mut self) -> Vec<Entity> {
        std::mem::take(&mut self.dropped)
    }

    /// Frames executed so far.
    #[must_use]
    pub fn frames(&self) -> u64 {
        self.frames
    }
}

impl std::fmt::Debug for Job {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Job")
            .field("name", &self.shared.name)
            .field("workers", &self.worker_count())
            .field("frames", &self.frames)
            .field("stopped", &self.is_stopped())
            .finish_non_exhaustive()
    }
}

impl Drop for Job {
    fn drop(&mut self) {
        self.stop();
        for handle in self.workers.drain(..) {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::{Chunk, Passive, Processing, Quantity, System};
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Counter(u64);

    /// Increments every counter and records which thread touched it.
    #[derive(Default)]
    struct Increment {
        threads: Mutex<HashSet<thread::ThreadId>>,
        calls: AtomicUsize,
    }

    impl Processing<Counter> for Increment {
        fn run(&self, chunk: Chunk<'_, Counter>) -> Vec<Entity> {
            self.calls.fetch_add(1, Ordering::Relaxed);
            self.threads.lock().insert(thread::current().id());
            for component in chunk.components() {
                component.lock().0 += 1;
            }
            Vec::new()
        }
    }

    fn counters(name: &str, count: u32) -> Arc<System<Counter, Increment>> {
        let system = Arc::new(System::new(name, Quantity::One, Increment::default()));
        for id in 0..count {
            system.create(Entity::from_raw(id)).unwrap();
        }
        system
    }

    #[test]
    fn test_every_component_processed_once_per_frame() {
        let system = counters("counters", 101);
        let mut job = Job::new("logic", vec![system.clone() as SystemRef], 4).unwrap();

        for _ in 0..10 {
            job.execute().unwrap();
        }

        assert_eq!(job.frames(), 10);
        for component in system.storage().all_components().iter() {
            assert_eq!(component.lock().0, 10);
        }
    }

    #[test]
    fn test_single_threaded_system_runs_on_one_worker() {
        let system = counters("serial", 50);
        system.set_multithreadable(false);
        let mut job = Job::new("logic", vec![system.clone() as SystemRef], 4).unwrap();

        for _ in 0..5 {
            job.execute().unwrap();
        }

        let processing = system.processing();
        assert_eq!(processing.calls.load(Ordering::Relaxed), 5);
        assert_eq!(processing.threads.lock().len(), 1);
    }

    #[test]
    fn test_toggling_multithreadable_processes_each_component_once() {
        let system = counters("toggled", 37);
        let mut job = Job::new("logic", vec![system.clone() as SystemRef], 4).unwrap();

        for frame in 1..=12u64 {
            system.set_multithreadable(frame % 2 == 0);
            job.execute().unwrap();
            for component in system.storage().all_components().iter() {
                assert_eq!(component.lock().0, frame);
            }
        }

        // Six serial frames of one chunk, six split frames of four.
        assert_eq!(system.processing().calls.load(Ordering::Relaxed), 6 + 6 * 4);
    }

    #[test]
    fn test_zero_workers_clamped() {
        let job = Job::new("logic", Vec::new(), 0).unwrap();
        assert_eq!(job.worker_count(), 1);
    }

    #[test]
    fn test_duplicate_systems_removed() {
        let system: SystemRef = counters("counters", 3);
        let job = Job::new("logic", vec![system.clone(), system], 2).unwrap();
        assert_eq!(job.systems().len(), 1);
    }

    #[test]
    fn test_drop_lists_aggregated() {
        let doomed = |chunk: Chunk<'_, u32>| -> Vec<Entity> {
            chunk
                .components()
                .iter()
                .filter(|c| *c.lock() % 2 == 1)
                .map(|c| c.entity())
                .collect()
        };
        let system = Arc::new(System::<u32, _>::new("odd", Quantity::One, doomed));
        for id in 0..20 {
            system.create_with(Entity::from_raw(id), id).unwrap();
        }

        let mut job = Job::new("cull", vec![system as SystemRef], 3).unwrap();
        job.execute().unwrap();

        let mut dropped: Vec<u32> = job.dropped().iter().map(|e| e.id()).collect();
        dropped.sort_unstable();
        assert_eq!(dropped, (1..20).step_by(2).collect::<Vec<_>>());

        assert_eq!(job.take_dropped().len(), 10);
        assert!(job.dropped().is_empty());
    }

    #[test]
    fn test_stop_then_execute_fails() {
        let system: SystemRef = Arc::new(System::<u8, _>::new("idle", Quantity::One, Passive));
        let mut job = Job::new("logic", vec![system], 2).unwrap();
        job.execute().unwrap();

        job.stop();
        assert!(job.is_stopped());
        assert!(matches!(job.execute(), Err(EcsError::JobStopped(name)) if name == "logic"));
    }

    #[test]
    fn test_panicking_chunk_does_not_hang() {
        let explode = |chunk: Chunk<'_, u8>| -> Vec<Entity> {
            assert!(chunk.range().start != 0, "boom");
            chunk.components().iter().map(|c| c.entity()).collect()
        };
        let system = Arc::new(System::<u8, _>::new("fragile", Quantity::One, explode));
        for id in 0..8 {
            system.create(Entity::from_raw(id)).unwrap();
        }

        let mut job = Job::new("logic", vec![system as SystemRef], 2).unwrap();
        let err = job.execute().unwrap_err();
        assert!(matches!(
            err,
            EcsError::ProcessingPanicked { ref systems, .. } if systems == &["fragile".to_owned()]
        ));
        // The healthy worker's chunk still reported its entities.
        assert_eq!(job.dropped().len(), 4);

        // The pool survives and keeps running frames.
        assert!(job.execute().is_err());
        assert_eq!(job.frames(), 2);
    }
}
