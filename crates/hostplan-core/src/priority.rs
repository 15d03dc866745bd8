//! The scoring contract.
//!
//! Priorities follow a map/reduce pattern: `map` scores candidates
//! independently (parallelizable), `reduce` runs once afterwards for
//! whole-set normalization. Their outputs are advisory — the authoritative
//! score is whatever lands in the unit's score ledger.

use std::cmp::Ordering;
use std::sync::Arc;

use crate::candidate::Candidater;
use crate::error::{SchedError, SchedResult};
use crate::unit::Unit;

/// One candidate's standing in the priority phase.
#[derive(Clone)]
pub struct HostPriority {
    pub host: String,
    pub score: i64,
    pub candidate: Arc<dyn Candidater>,
}

pub type HostPriorityList = Vec<HostPriority>;

/// Order for selection: score descending, ties by host id ascending so a
/// pass over identical inputs is reproducible.
pub fn sort_for_selection(list: &mut HostPriorityList) {
    list.sort_by(|a, b| match b.score.cmp(&a.score) {
        Ordering::Equal => a.host.cmp(&b.host),
        other => other,
    });
}

/// A scorer in the scheduling pipeline. Cloned per pass like predicates.
pub trait Priority: Send + Sync {
    fn name(&self) -> &str;

    fn clone_boxed(&self) -> Box<dyn Priority>;

    /// Precompute / opt out, mirroring `FitPredicate::pre_execute`.
    fn pre(&mut self, unit: &Unit, candidates: &[Arc<dyn Candidater>]) -> anyhow::Result<bool> {
        let _ = (unit, candidates);
        Ok(true)
    }

    /// Score one candidate, independently of the others.
    fn map(&self, unit: &Unit, candidate: &Arc<dyn Candidater>) -> anyhow::Result<HostPriority>;

    /// Whole-set pass after every `map` has completed.
    fn reduce(
        &self,
        unit: &Unit,
        candidates: &[Arc<dyn Candidater>],
        result: &mut HostPriorityList,
    ) -> anyhow::Result<()> {
        let _ = (unit, candidates, result);
        Ok(())
    }
}

/// A named, weighted priority registration.
pub struct PriorityConfig {
    pub name: String,
    /// Available to `map`/`reduce` implementations; the engine itself does
    /// not re-weight, the unit ledger is authoritative.
    pub weight: i64,
    pub priority: Box<dyn Priority>,
}

/// Fallback when no priorities are configured: every surviving candidate
/// gets an equal, well-formed entry so selection always has an ordering.
pub fn equal_priority(candidate: &Arc<dyn Candidater>) -> SchedResult<HostPriority> {
    if candidate.index_key().is_empty() {
        return Err(SchedError::EmptyIndexKey);
    }
    Ok(HostPriority {
        host: candidate.index_key().to_string(),
        score: 0,
        candidate: Arc::clone(candidate),
    })
}
