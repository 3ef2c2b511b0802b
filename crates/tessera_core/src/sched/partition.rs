//! # Work Partitioning
//!
//! Splits each system's storage into contiguous `[from, to)` index ranges,
//! one per worker.
//!
//! ```text
//! total = 10, workers = 4, lucky worker = 2
//!
//!   worker:   0       1       2             3
//!   share:    2       2       2 + 10 % 4    2
//!   range:  [0,2)   [2,4)   [4,8)         [8,10)
//! ```
//!
//! Every worker gets `total / workers` items; one worker picked at random
//! also takes the remainder. Systems that cannot be split go whole to
//! worker 0.

use std::ops::Range;

use rand::Rng;

/// Worker that receives non-multithreadable systems.
pub const DESIGNATED_WORKER: usize = 0;

/// Per-frame load of one system.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SystemLoad {
    /// Components in storage at partition time.
    pub count: usize,
    /// Whether the range may be split across workers.
    pub multithreadable: bool,
}

/// One system range handed to one worker.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Assignment {
    /// Index of the system within its job.
    pub system: usize,
    /// Storage index range to process.
    pub range: Range<usize>,
}

/// Splits `[0, total)` into `workers` contiguous ranges in worker order.
///
/// Worker `lucky` receives the remainder on top of its even share.
///
/// # Panics
///
/// Panics if `workers` is zero or `lucky >= workers`.
#[must_use]
pub fn split(total: usize, workers: usize, lucky: usize) -> Vec<Range<usize>> {
    assert!(workers > 0, "at least one worker is required");
    assert!(lucky < workers, "lucky worker {lucky} out of {workers}");

    let share = total / workers;
    let remainder = total % workers;

    let mut from = 0;
    (0..workers)
        .map(|worker| {
            let amount = if worker == lucky { share + remainder } else { share };
            let range = from..from + amount;
            from += amount;
            range
        })
        .collect()
}

/// Assignments for every worker for one frame.
///
/// Built fresh each frame, so no assignment from a previous frame survives.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WorkPlan {
    workers: Vec<Vec<Assignment>>,
}

impl WorkPlan {
    /// Partitions every system load across `workers` workers.
    ///
    /// Empty ranges are not assigned.
    ///
    /// # Panics
    ///
    /// Panics if `workers` is zero.
    pub fn build<R: Rng + ?Sized>(loads: &[SystemLoad], workers: usize, rng: &mut R) -> Self {
        assert!(workers > 0, "at least one worker is required");
        let mut plan = vec![Vec::new(); workers];

        for (system, load) in loads.iter().enumerate() {
            if load.multithreadable {
                let lucky = rng.gen_range(0..workers);
                for (worker, range) in split(load.count, workers, lucky).into_iter().enumerate() {
                    if !range.is_empty() {
                        plan[worker].push(Assignment { system, range });
                    }
                }
            } else if load.count > 0 {
                plan[DESIGNATED_WORKER].push(Assignment {
                    system,
                    range: 0..load.count,
                });
            }
        }

        Self { workers: plan }
    }

    /// Number of workers the plan covers.
    #[must_use]
    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Assignments of one worker.
    #[must_use]
    pub fn assignments(&self, worker: usize) -> &[Assignment] {
        self.workers.get(worker).map_or(&[][..], Vec::as_slice)
    }

    /// Every range assigned for `system`, in worker order.
    #[must_use]
    pub fn ranges_for(&self, system: usize) -> Vec<Range<usize>> {
        self.workers
            .iter()
            .flatten()
            .filter(|a| a.system == system)
            .map(|a| a.range.clone())
            .collect()
    }

    /// Consumes the plan, yielding per-worker assignments in worker order.
    #[must_use]
    pub fn into_workers(self) -> Vec<Vec<Assignment>> {
        self.workers
    }
}
