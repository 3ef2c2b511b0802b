//! # Job Scheduling
//!
//! Runs groups of systems across fixed worker pools.
//!
//! ```text
//!   World::run
//!     ├─ Job "input"   execute ─> barrier ─> drain drop list
//!     ├─ Job "logic"   execute ─> barrier ─> drain drop list
//!     └─ Job "render"  execute ─> barrier ─> drain drop list
//! ```
//!
//! Within a job, workers run disjoint index ranges concurrently. Across
//! jobs, execution is strictly sequential.

mod job;
mod partition;

pub use job::{Job, JobOptions};
pub use partition::{split, Assignment, SystemLoad, WorkPlan, DESIGNATED_WORKER};
