//! The per-request scheduling unit.
//!
//! A `Unit` is created for one schedule call and discarded after result
//! extraction. It is the only mutable state predicates and priorities may
//! touch, and every field guards itself with its own mutex so candidate
//! evaluations can run concurrently without ordering assumptions.
//!
//! Capacity model: each predicate records a counter per candidate; the
//! candidate's effective capacity is the minimum across all of them. One
//! stingy predicate can veto or throttle a candidate regardless of the
//! others' opinions.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tracing::error;

use hostplan_api::SchedInfo;

use crate::candidate::Candidater;
use crate::counter::{Counter, CounterManager};
use crate::error::{SchedError, SchedResult};
use crate::log::LogManager;
use crate::plugin::SelectPlugin;
use crate::predicate::PredicateFailReason;
use crate::score::ScoreBoard;
use crate::shared::SharedResourceManager;

/// Per-candidate capacity opinions, one counter per predicate, with the
/// minimum cached until the next write.
#[derive(Default)]
struct Capacity {
    values: HashMap<String, Arc<dyn Counter>>,
    min: Option<i64>,
}

impl Capacity {
    fn set(&mut self, predicate: &str, counter: Arc<dyn Counter>) {
        self.values.insert(predicate.to_string(), counter);
        self.min = None;
    }

    fn min_value(&mut self) -> i64 {
        if let Some(min) = self.min {
            return min;
        }
        let min = self
            .values
            .values()
            .map(|c| c.count())
            .min()
            .unwrap_or(0)
            .max(0);
        self.min = Some(min);
        min
    }

    fn details(&self) -> HashMap<String, i64> {
        self.values
            .iter()
            .map(|(name, counter)| (name.clone(), counter.count()))
            .collect()
    }
}

/// One candidate rejected by one filter stage.
#[derive(Debug, Clone)]
pub struct FailedCandidate {
    pub stage: String,
    pub candidate_id: String,
    pub candidate_name: String,
    pub reasons: Vec<PredicateFailReason>,
}

/// All candidates rejected by one stage.
#[derive(Debug, Clone, Default)]
pub struct FailedCandidates {
    pub candidates: Vec<FailedCandidate>,
}

/// Storages a predicate matched for one requested disk.
#[derive(Debug, Clone, PartialEq)]
pub struct AllocatedStorage {
    pub id: String,
    pub free_capacity_mb: i64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AllocatedDisk {
    pub index: usize,
    pub storages: Vec<AllocatedStorage>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AllocatedNet {
    pub index: usize,
    pub network_ids: Vec<String>,
}

/// What the select phase bound on one candidate: the concrete sub-resources
/// (storages per disk, networks per nic) behind a feasible placement.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AllocatedResource {
    pub disks: Vec<AllocatedDisk>,
    pub nets: Vec<AllocatedNet>,
}

/// The aggregate root of one scheduling pass.
pub struct Unit {
    sched_info: SchedInfo,
    capacity_map: Mutex<HashMap<String, Capacity>>,
    score_map: Mutex<HashMap<String, ScoreBoard>>,
    failed_candidates: Mutex<HashMap<String, FailedCandidates>>,
    select_plugins: Mutex<Vec<Arc<dyn SelectPlugin>>>,
    allocated: Mutex<HashMap<String, AllocatedResource>>,
    counters: CounterManager,
    shared_resources: Arc<SharedResourceManager>,
    logs: LogManager,
}

impl Unit {
    pub fn new(sched_info: SchedInfo) -> Self {
        Self {
            sched_info,
            capacity_map: Mutex::new(HashMap::new()),
            score_map: Mutex::new(HashMap::new()),
            failed_candidates: Mutex::new(HashMap::new()),
            select_plugins: Mutex::new(Vec::new()),
            allocated: Mutex::new(HashMap::new()),
            counters: CounterManager::new(),
            shared_resources: Arc::new(SharedResourceManager::new()),
            logs: LogManager::new(),
        }
    }

    pub fn sched_info(&self) -> &SchedInfo {
        &self.sched_info
    }

    pub fn session_id(&self) -> &str {
        &self.sched_info.session_id
    }

    /// One-line request summary for logs and error messages.
    pub fn info(&self) -> String {
        self.sched_info.brief()
    }

    // ── Capacity ───────────────────────────────────────────────────

    /// Record `predicate`'s capacity opinion for `candidate_id`.
    ///
    /// A counter already reporting negative is rejected and leaves the
    /// stored state untouched.
    pub fn set_capacity(
        &self,
        candidate_id: &str,
        predicate: &str,
        counter: Arc<dyn Counter>,
    ) -> SchedResult<()> {
        let value = counter.count();
        if value < 0 {
            error!(
                candidate = candidate_id,
                predicate, value, "rejecting negative capacity counter"
            );
            return Err(SchedError::NegativeCapacity {
                candidate: candidate_id.to_string(),
                predicate: predicate.to_string(),
                value,
            });
        }
        let mut map = self.capacity_map.lock().unwrap();
        map.entry(candidate_id.to_string())
            .or_default()
            .set(predicate, counter);
        Ok(())
    }

    /// Effective capacity: the minimum across every predicate's counter,
    /// 0 for a candidate nothing has vouched for.
    pub fn get_capacity(&self, candidate_id: &str) -> i64 {
        let mut map = self.capacity_map.lock().unwrap();
        match map.get_mut(candidate_id) {
            Some(capacity) => capacity.min_value(),
            None => 0,
        }
    }

    /// Per-predicate capacity breakdown for detail output.
    pub fn capacity_details(&self, candidate_id: &str) -> HashMap<String, i64> {
        let map = self.capacity_map.lock().unwrap();
        map.get(candidate_id).map(Capacity::details).unwrap_or_default()
    }

    // ── Score ──────────────────────────────────────────────────────

    pub fn set_score(&self, candidate_id: &str, component: &str, value: i64) {
        let mut map = self.score_map.lock().unwrap();
        map.entry(candidate_id.to_string())
            .or_default()
            .set(component, value);
    }

    pub fn increase_score(&self, candidate_id: &str, component: &str, delta: i64) {
        let mut map = self.score_map.lock().unwrap();
        map.entry(candidate_id.to_string())
            .or_default()
            .increase(component, delta);
    }

    /// Component sum plus base; `BASE_SCORE` for an untouched candidate.
    pub fn get_score(&self, candidate_id: &str) -> i64 {
        let mut map = self.score_map.lock().unwrap();
        map.entry(candidate_id.to_string()).or_default().total()
    }

    pub fn score_details(&self, candidate_id: &str) -> String {
        let map = self.score_map.lock().unwrap();
        map.get(candidate_id)
            .map(ScoreBoard::details)
            .unwrap_or_default()
    }

    // ── Failure bookkeeping ────────────────────────────────────────

    /// Merge rejection records from one candidate's evaluation; safe under
    /// concurrent calls from parallel filter workers.
    pub fn append_failed_candidates(&self, records: Vec<FailedCandidate>) {
        let mut map = self.failed_candidates.lock().unwrap();
        for record in records {
            map.entry(record.stage.clone())
                .or_default()
                .candidates
                .push(record);
        }
    }

    /// Stage name → rejection records, cloned out for result shaping.
    pub fn failed_candidates(&self) -> HashMap<String, FailedCandidates> {
        self.failed_candidates.lock().unwrap().clone()
    }

    /// Stage name → rejection count, for `FitError`.
    pub fn stage_reject_counts(&self) -> std::collections::BTreeMap<String, usize> {
        self.failed_candidates
            .lock()
            .unwrap()
            .iter()
            .map(|(stage, fcs)| (stage.clone(), fcs.candidates.len()))
            .collect()
    }

    // ── Plugins ────────────────────────────────────────────────────

    pub fn append_select_plugin(&self, plugin: Arc<dyn SelectPlugin>) {
        self.select_plugins.lock().unwrap().push(plugin);
    }

    pub fn select_plugins(&self) -> Vec<Arc<dyn SelectPlugin>> {
        self.select_plugins.lock().unwrap().clone()
    }

    // ── Allocation records ─────────────────────────────────────────

    /// Mutate the allocation record of `candidate_id`, creating it on
    /// first use. Plugins call this from `on_select_end`.
    pub fn update_allocated<R>(
        &self,
        candidate_id: &str,
        f: impl FnOnce(&mut AllocatedResource) -> R,
    ) -> R {
        let mut map = self.allocated.lock().unwrap();
        f(map.entry(candidate_id.to_string()).or_default())
    }

    pub fn allocated_resource(&self, candidate_id: &str) -> AllocatedResource {
        self.allocated
            .lock()
            .unwrap()
            .get(candidate_id)
            .cloned()
            .unwrap_or_default()
    }

    // ── Shared managers ────────────────────────────────────────────

    pub fn counters(&self) -> &CounterManager {
        &self.counters
    }

    pub fn shared_resources(&self) -> &Arc<SharedResourceManager> {
        &self.shared_resources
    }

    pub fn logs(&self) -> &LogManager {
        &self.logs
    }

    /// `"<name>:<index key>"`, the per-candidate log index.
    pub fn log_index(candidate: &dyn Candidater) -> String {
        format!("{}:{}", candidate.name(), candidate.index_key())
    }
}
