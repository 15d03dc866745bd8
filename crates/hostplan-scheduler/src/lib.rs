//! hostplan-scheduler — the generic placement pipeline.
//!
//! Drives one scheduling pass over a candidate pool:
//!
//! 1. **Filter** — every registered predicate judges every candidate, in
//!    parallel on a bounded pool, short-circuiting per candidate
//! 2. **Score** — priorities map per candidate and reduce over the set;
//!    the unit's score ledger is authoritative
//! 3. **Select** — round-robin-by-score greedy fill of the requested count
//! 4. **Shape** — result items, per-guest-slot output (delegating to the
//!    group placer for affinity/HA requests), forecast and test views
//!
//! # Architecture
//!
//! ```text
//! GenericScheduler
//!   ├── SchedDriver        predicates / priorities / cache dirtying
//!   ├── predicate pool     parallel per-candidate filtering
//!   ├── priority pool      parallel per-candidate scoring
//!   ├── select_hosts       quantity-aware greedy assignment
//!   └── result             SchedResultItem / ScheduleOutput / forecast
//! ```

pub mod numa;
pub mod options;
pub mod parallel;
pub mod result;
pub mod scheduler;
pub mod select;

pub use numa::compute_numa_pin;
pub use options::SchedulerOptions;
pub use result::{
    SchedResultItem, SchedResultItemList, StorageUsed, generate_schedule_result,
    to_forecast_result, to_schedule_output, to_test_result,
};
pub use scheduler::{GenericScheduler, SchedDriver};
pub use select::{SelectedCandidate, select_hosts};
