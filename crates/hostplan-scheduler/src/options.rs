//! Scheduler tuning knobs.

use serde::{Deserialize, Serialize};

/// Configuration for one `GenericScheduler`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerOptions {
    /// Worker count for the predicate filter stage; 1 runs sequentially.
    pub predicate_parallelism: usize,
    /// Worker count for the priority map stage; 1 runs sequentially.
    pub priority_parallelism: usize,
    /// Keep evaluating a candidate's remaining predicates after one has
    /// already rejected it, instead of short-circuiting.
    pub always_check_all_predicates: bool,
}

impl Default for SchedulerOptions {
    fn default() -> Self {
        Self {
            predicate_parallelism: 8,
            priority_parallelism: 8,
            always_check_all_predicates: false,
        }
    }
}
