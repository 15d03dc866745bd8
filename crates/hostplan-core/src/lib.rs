//! hostplan-core — the scheduling engine's bookkeeping and contracts.
//!
//! One schedule call works on a [`Unit`]: the per-request aggregate that
//! holds capacity opinions, score components, rejection records, and the
//! plugins that fire during scoring and selection. Around it:
//!
//! - [`Counter`]/[`Counters`]/[`MinCounters`] — composable capacity sources
//! - [`Candidater`] — the read-only per-host resource view the caller supplies
//! - [`FitPredicate`] / [`Priority`] / [`SelectPlugin`] — the pipeline contracts
//! - [`PredicateHelper`] — verdict builder for predicate implementations
//! - [`SchedError`] — the fatal-error taxonomy; rejections are data, not errors
//!
//! # Architecture
//!
//! ```text
//! Unit (one per schedule call)
//!   ├── capacity map   candidate → {predicate → Counter}, min cached
//!   ├── score map      candidate → {component → i64}, sum cached
//!   ├── failure map    stage → rejected candidates + reasons
//!   ├── SharedResourceManager  cross-predicate reservation ledger
//!   ├── CounterManager         memoized counters ("net:<id>" → Counter)
//!   └── LogManager             per-candidate per-stage pass/fail trail
//! ```

pub mod candidate;
pub mod counter;
pub mod error;
pub mod log;
pub mod plugin;
pub mod predicate;
pub mod priority;
pub mod score;
pub mod shared;
pub mod testing;
pub mod unit;

pub use candidate::{Candidater, CandidateType, FactKind, NumaNodeFact};
pub use counter::{Counter, CounterManager, Counters, EMPTY_CAPACITY, MinCounters, NormalCounter};
pub use error::{FitError, SchedError, SchedResult, aggregate};
pub use log::{LogManager, LogMessage, SchedLog};
pub use plugin::SelectPlugin;
pub use predicate::{
    FitPredicate, InsufficientResource, PredicateFailReason, PredicateHelper, PredicateVerdict,
    UNEXPECTED_RESOURCE,
};
pub use priority::{
    HostPriority, HostPriorityList, Priority, PriorityConfig, equal_priority, sort_for_selection,
};
pub use score::{BASE_SCORE, ScoreBoard};
pub use shared::{SharedResourceCounter, SharedResourceManager};
pub use unit::{
    AllocatedDisk, AllocatedNet, AllocatedResource, AllocatedStorage, FailedCandidate,
    FailedCandidates, Unit,
};
