//! Scheduling error taxonomy.
//!
//! Only genuinely fatal conditions are errors. A candidate that merely does
//! not fit is data — a `PredicateFailReason` attached to the rejection
//! record — and never surfaces through this module.

use std::collections::BTreeMap;
use std::fmt;

use thiserror::Error;

/// Errors that can abort a scheduling pass.
#[derive(Debug, Error)]
pub enum SchedError {
    /// No candidates were supplied at all.
    #[error("no resource available to schedule, session_id={session_id:?}, info={info:?}")]
    NoResource { session_id: String, info: String },

    /// Candidates existed but every one was filtered out.
    #[error(transparent)]
    Fit(#[from] FitError),

    /// Selection ran out of capacity before satisfying the request.
    #[error("not enough resources, request/capacity: {requested}/{satisfied}")]
    NotEnoughResource { requested: i64, satisfied: i64 },

    /// Selection was handed an empty priority list.
    #[error("select_hosts got an empty priority list")]
    EmptyPriorityList,

    /// A candidate exposed an empty index key.
    #[error("candidate index key is empty")]
    EmptyIndexKey,

    /// A predicate tried to record a negative capacity.
    #[error("negative capacity {value} for candidate {candidate:?}, predicate {predicate:?}")]
    NegativeCapacity {
        candidate: String,
        predicate: String,
        value: i64,
    },

    /// A predicate itself failed (bug or external dependency), not a miss.
    #[error("predicate {name:?} failed: {source}")]
    Predicate {
        name: String,
        #[source]
        source: anyhow::Error,
    },

    /// A priority function failed.
    #[error("priority {name:?} failed: {source}")]
    Priority {
        name: String,
        #[source]
        source: anyhow::Error,
    },

    /// Several workers failed; every root cause is retained.
    #[error("{}", format_aggregate(.0))]
    Aggregate(Vec<SchedError>),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

pub type SchedResult<T> = Result<T, SchedError>;

fn format_aggregate(errs: &[SchedError]) -> String {
    let msgs: Vec<String> = errs.iter().map(|e| e.to_string()).collect();
    format!("{} scheduling errors: [{}]", errs.len(), msgs.join("; "))
}

/// Collapse worker errors: one error passes through, several aggregate.
pub fn aggregate(mut errs: Vec<SchedError>) -> SchedError {
    if errs.len() == 1 {
        errs.remove(0)
    } else {
        SchedError::Aggregate(errs)
    }
}

/// All candidates were rejected; records how many each stage filtered.
#[derive(Debug, Error)]
pub struct FitError {
    pub session_id: String,
    /// Filter stage name → number of candidates it rejected.
    pub stages: BTreeMap<String, usize>,
}

impl fmt::Display for FitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let breakdown: Vec<String> = self
            .stages
            .iter()
            .map(|(stage, count)| format!("{stage}(-{count})"))
            .collect();
        write!(
            f,
            "no resource available that matches all of the following filters: {}, session_id={:?}",
            breakdown.join(", "),
            self.session_id
        )
    }
}
