//! The filter contract and its helper.
//!
//! A predicate declares a candidate unfit (capacity 0) or fit with a
//! bounded capacity. Rejections are data, not errors: an `Err` from
//! `execute` means the predicate itself broke and aborts the whole pass.

use std::sync::Arc;

use tracing::warn;

use crate::candidate::Candidater;
use crate::counter::{Counter, EMPTY_CAPACITY, NormalCounter};
use crate::unit::Unit;

/// Reason kind for non-quantitative mismatches.
pub const UNEXPECTED_RESOURCE: &str = "unexpected_resource";

/// Typed resource shortage; lets forecast tooling aggregate rejections by
/// resource kind instead of parsing free text.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct InsufficientResource {
    pub resource: String,
    pub requested: i64,
    pub total: i64,
    pub free: i64,
}

/// One reason a predicate rejected a candidate.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PredicateFailReason {
    /// Aggregation key: a resource name for shortages, a predicate name or
    /// [`UNEXPECTED_RESOURCE`] otherwise.
    pub kind: String,
    pub reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shortage: Option<InsufficientResource>,
}

impl PredicateFailReason {
    pub fn unexpected(reason: impl Into<String>) -> Self {
        Self {
            kind: UNEXPECTED_RESOURCE.to_string(),
            reason: reason.into(),
            shortage: None,
        }
    }

    pub fn with_kind(kind: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            reason: reason.into(),
            shortage: None,
        }
    }
}

impl From<InsufficientResource> for PredicateFailReason {
    fn from(shortage: InsufficientResource) -> Self {
        Self {
            kind: shortage.resource.clone(),
            reason: format!(
                "{}: requested {}, total {}, free {}",
                shortage.resource, shortage.requested, shortage.total, shortage.free
            ),
            shortage: Some(shortage),
        }
    }
}

/// Verdict of one predicate on one candidate.
pub type PredicateVerdict = (bool, Vec<PredicateFailReason>);

/// A filter in the scheduling pipeline.
///
/// Predicates are stateful across one schedule call (they may accumulate
/// per-candidate matched resources between `pre_execute` and the plugin
/// callbacks), so each pass works on a fresh `clone_boxed` instance.
/// `execute` runs concurrently across candidates; any state it touches
/// beyond the `Unit` must be internally synchronized.
pub trait FitPredicate: Send + Sync {
    /// Stable identifier; keys capacities, failures, and logs.
    fn name(&self) -> &str;

    fn clone_boxed(&self) -> Box<dyn FitPredicate>;

    /// Run once against the full candidate list before filtering. Return
    /// `Ok(false)` to skip this predicate for the whole pass.
    fn pre_execute(
        &mut self,
        unit: &Unit,
        candidates: &[Arc<dyn Candidater>],
    ) -> anyhow::Result<bool> {
        let _ = (unit, candidates);
        Ok(true)
    }

    /// Judge one candidate.
    fn execute(&self, unit: &Unit, candidate: &dyn Candidater) -> anyhow::Result<PredicateVerdict>;
}

/// Builds a predicate verdict while forwarding capacities to the unit.
///
/// The helper starts with capacity [`EMPTY_CAPACITY`] ("no opinion"); a
/// predicate that never sets a capacity and records no failure passes the
/// candidate through unbounded.
pub struct PredicateHelper<'a> {
    predicate_name: &'a str,
    unit: &'a Unit,
    candidate: &'a dyn Candidater,
    capacity: i64,
    fails: Vec<PredicateFailReason>,
}

impl<'a> PredicateHelper<'a> {
    pub fn new(predicate_name: &'a str, unit: &'a Unit, candidate: &'a dyn Candidater) -> Self {
        Self {
            predicate_name,
            unit,
            candidate,
            capacity: EMPTY_CAPACITY,
            fails: Vec::new(),
        }
    }

    /// Record this predicate's capacity opinion; negatives clamp to 0.
    pub fn set_capacity(&mut self, capacity: i64) {
        self.set_capacity_counter(Arc::new(NormalCounter::new(capacity.max(0))));
    }

    /// Record a live counter as this predicate's capacity opinion.
    pub fn set_capacity_counter(&mut self, counter: Arc<dyn Counter>) {
        self.capacity = counter.count().max(EMPTY_CAPACITY);
        if let Err(err) = self.unit.set_capacity(
            self.candidate.index_key(),
            self.predicate_name,
            counter,
        ) {
            warn!(
                candidate = self.candidate.index_key(),
                predicate = self.predicate_name,
                error = %err,
                "capacity counter rejected"
            );
        }
    }

    pub fn append_fail(&mut self, reason: PredicateFailReason) {
        self.fails.push(reason);
    }

    pub fn append_fail_msg(&mut self, reason: impl Into<String>) {
        self.fails
            .push(PredicateFailReason::with_kind(self.predicate_name, reason));
    }

    /// Record a typed shortage of `resource` on this candidate.
    pub fn append_insufficient_resource(
        &mut self,
        resource: impl Into<String>,
        requested: i64,
        total: i64,
        free: i64,
    ) {
        self.fails.push(
            InsufficientResource {
                resource: resource.into(),
                requested,
                total,
                free,
            }
            .into(),
        );
    }

    /// Veto the candidate with a human-readable reason.
    pub fn exclude(&mut self, reason: impl Into<String>) {
        self.set_capacity(0);
        self.append_fail_msg(reason);
    }

    /// Veto with a got/want formatting convenience.
    pub fn exclude_by_mismatch(
        &mut self,
        what: &str,
        got: impl std::fmt::Display,
        want: impl std::fmt::Display,
    ) {
        self.exclude(format!("{what} is '{got}', expected '{want}'"));
    }

    /// Veto, carrying reasons collected elsewhere.
    pub fn exclude_by_fails(&mut self, reasons: Vec<PredicateFailReason>) {
        self.set_capacity(0);
        self.fails.extend(reasons);
    }

    /// Finish: failures or a zero capacity reject the candidate.
    pub fn verdict(self) -> PredicateVerdict {
        let fits = self.fails.is_empty() && self.capacity != 0;
        if !fits {
            let reasons: Vec<&str> = self.fails.iter().map(|r| r.reason.as_str()).collect();
            warn!(
                candidate = self.candidate.index_key(),
                filter = self.predicate_name,
                reasons = %reasons.join(", "),
                "candidate filtered out"
            );
        }
        (fits, self.fails)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::StubCandidate;
    use hostplan_api::SchedInfo;

    fn unit() -> Unit {
        Unit::new(SchedInfo::default())
    }

    #[test]
    fn untouched_helper_passes() {
        let unit = unit();
        let host = StubCandidate::new("h1");
        let helper = PredicateHelper::new("host_status", &unit, &host);

        let (fits, reasons) = helper.verdict();
        assert!(fits);
        assert!(reasons.is_empty());
    }

    #[test]
    fn zero_capacity_rejects_without_reasons() {
        let unit = unit();
        let host = StubCandidate::new("h1");
        let mut helper = PredicateHelper::new("host_memory", &unit, &host);
        helper.set_capacity(0);

        let (fits, reasons) = helper.verdict();
        assert!(!fits);
        assert!(reasons.is_empty());
        assert_eq!(unit.get_capacity("h1"), 0);
    }

    #[test]
    fn negative_capacity_clamps_to_zero() {
        let unit = unit();
        let host = StubCandidate::new("h1");
        let mut helper = PredicateHelper::new("host_cpu", &unit, &host);
        helper.set_capacity(-5);

        assert_eq!(unit.get_capacity("h1"), 0);
    }

    #[test]
    fn exclude_records_capacity_and_reason() {
        let unit = unit();
        let host = StubCandidate::new("h1");
        let mut helper = PredicateHelper::new("host_status", &unit, &host);
        helper.exclude("host disabled");

        let (fits, reasons) = helper.verdict();
        assert!(!fits);
        assert_eq!(reasons.len(), 1);
        assert_eq!(reasons[0].kind, "host_status");
        assert_eq!(unit.get_capacity("h1"), 0);
    }

    #[test]
    fn mismatch_formatting() {
        let unit = unit();
        let host = StubCandidate::new("h1");
        let mut helper = PredicateHelper::new("host_status", &unit, &host);
        helper.exclude_by_mismatch("status", "disabled", "enabled");

        let (_, reasons) = helper.verdict();
        assert_eq!(reasons[0].reason, "status is 'disabled', expected 'enabled'");
    }

    #[test]
    fn shortage_is_typed_for_aggregation() {
        let unit = unit();
        let host = StubCandidate::new("h1");
        let mut helper = PredicateHelper::new("host_memory", &unit, &host);
        helper.append_insufficient_resource("memory", 8192, 16384, 1024);

        let (fits, reasons) = helper.verdict();
        assert!(!fits);
        assert_eq!(reasons[0].kind, "memory");
        let shortage = reasons[0].shortage.as_ref().unwrap();
        assert_eq!(shortage.requested, 8192);
        assert_eq!(shortage.free, 1024);
    }
}
