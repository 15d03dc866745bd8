//! The generic scheduling pipeline.
//!
//! `schedule` runs one pass: parallel predicate filtering, parallel
//! priority scoring, greedy selection, result assembly. Predicate and
//! priority tables are snapshotted from the driver at construction — there
//! is no process-wide registry.

use std::sync::Arc;

use rayon::prelude::*;
use tracing::debug;

use hostplan_core::{
    Candidater, FailedCandidate, FitError, FitPredicate, HostPriority, HostPriorityList,
    LogMessage, PriorityConfig, SchedError, SchedLog, SchedResult, Unit, aggregate,
    equal_priority,
};

use crate::options::SchedulerOptions;
use crate::parallel::{build_pool, parallelize};
use crate::result::{SchedResultItemList, generate_schedule_result};
use crate::select::{SelectedCandidate, select_hosts};

/// What the embedding system supplies to drive the engine.
pub trait SchedDriver: Send + Sync {
    /// The filter set for this scheduler.
    fn predicates(&self) -> SchedResult<Vec<Box<dyn FitPredicate>>>;

    /// The scorer set; empty means every survivor scores equally.
    fn priority_configs(&self) -> SchedResult<Vec<PriorityConfig>>;

    /// Hook before the filter stage starts.
    fn before_predicate(&self, unit: &Unit) -> SchedResult<()> {
        let _ = unit;
        Ok(())
    }

    /// Mark selected candidates tentatively consumed in the caller's
    /// cache before the real provisioning commits.
    fn dirty_selected_candidates(&self, selected: &[SelectedCandidate]) {
        let _ = selected;
    }
}

/// The predicate/priority pipeline orchestrator.
pub struct GenericScheduler {
    driver: Arc<dyn SchedDriver>,
    predicates: Vec<Box<dyn FitPredicate>>,
    priorities: Vec<PriorityConfig>,
    options: SchedulerOptions,
    predicate_pool: rayon::ThreadPool,
    priority_pool: rayon::ThreadPool,
}

impl GenericScheduler {
    pub fn new(driver: Arc<dyn SchedDriver>, options: SchedulerOptions) -> SchedResult<Self> {
        let predicates = driver.predicates()?;
        let priorities = driver.priority_configs()?;
        let predicate_pool = build_pool(options.predicate_parallelism)?;
        let priority_pool = build_pool(options.priority_parallelism)?;
        Ok(Self {
            driver,
            predicates,
            priorities,
            options,
            predicate_pool,
            priority_pool,
        })
    }

    /// Run one scheduling pass over `candidates`.
    pub fn schedule(
        &self,
        unit: &Unit,
        candidates: &[Arc<dyn Candidater>],
    ) -> SchedResult<SchedResultItemList> {
        let is_suggestion = unit.sched_info().is_suggestion;

        if candidates.is_empty() {
            return Err(SchedError::NoResource {
                session_id: unit.session_id().to_string(),
                info: unit.info(),
            });
        }

        self.driver.before_predicate(unit)?;

        debug!(
            session_id = unit.session_id(),
            candidates = candidates.len(),
            "computing predicates"
        );
        let filtered = self.find_candidates_that_fit(unit, candidates)?;

        if filtered.is_empty() && !is_suggestion {
            return Err(FitError {
                session_id: unit.session_id().to_string(),
                stages: unit.stage_reject_counts(),
            }
            .into());
        }

        let selected = if filtered.is_empty() {
            Vec::new()
        } else {
            debug!(
                session_id = unit.session_id(),
                survivors = filtered.len(),
                "prioritizing"
            );
            let priority_list = self.prioritize_candidates(unit, &filtered)?;
            select_hosts(unit, priority_list)?
        };

        let result = generate_schedule_result(unit, &selected, &filtered, candidates);

        if !is_suggestion {
            self.driver.dirty_selected_candidates(&selected);
        }
        Ok(result)
    }

    /// Filter stage: every candidate against every surviving predicate.
    fn find_candidates_that_fit(
        &self,
        unit: &Unit,
        candidates: &[Arc<dyn Candidater>],
    ) -> SchedResult<Vec<Arc<dyn Candidater>>> {
        // Fresh clones per pass; a predicate may opt out for this request.
        let mut predicates = Vec::with_capacity(self.predicates.len());
        for predicate in &self.predicates {
            let mut cloned = predicate.clone_boxed();
            match cloned.pre_execute(unit, candidates) {
                Ok(true) => predicates.push(cloned),
                Ok(false) => debug!(predicate = predicate.name(), "predicate opted out"),
                Err(source) => {
                    return Err(SchedError::Predicate {
                        name: predicate.name().to_string(),
                        source,
                    });
                }
            }
        }
        if predicates.is_empty() {
            return Ok(candidates.to_vec());
        }
        // Deterministic evaluation order per candidate.
        predicates.sort_by(|a, b| a.name().cmp(b.name()));

        let always_check_all = self.options.always_check_all_predicates;
        let verdicts = parallelize(&self.predicate_pool, candidates, |_, candidate| {
            fits_on_candidate(unit, candidate, &predicates, always_check_all)
        });

        let mut filtered = Vec::new();
        let mut errs = Vec::new();
        for (candidate, verdict) in candidates.iter().zip(verdicts) {
            match verdict {
                Ok(true) => filtered.push(Arc::clone(candidate)),
                Ok(false) => {}
                Err(err) => errs.push(err),
            }
        }
        if !errs.is_empty() {
            return Err(aggregate(errs));
        }
        Ok(filtered)
    }

    /// Priority stage: map per candidate, reduce per priority, plugin
    /// callbacks, then read the authoritative scores back from the unit.
    fn prioritize_candidates(
        &self,
        unit: &Unit,
        candidates: &[Arc<dyn Candidater>],
    ) -> SchedResult<HostPriorityList> {
        if self.priorities.is_empty() {
            return candidates.iter().map(equal_priority).collect();
        }

        let mut priorities = Vec::with_capacity(self.priorities.len());
        for config in &self.priorities {
            let mut cloned = config.priority.clone_boxed();
            match cloned.pre(unit, candidates) {
                Ok(true) => priorities.push((config.name.clone(), cloned)),
                Ok(false) => debug!(priority = %config.name, "priority opted out"),
                Err(source) => {
                    return Err(SchedError::Priority {
                        name: config.name.clone(),
                        source,
                    });
                }
            }
        }

        // Map: all priorities for one candidate, candidates in parallel.
        let rows = parallelize(&self.priority_pool, candidates, |_, candidate| {
            priorities
                .iter()
                .map(|(name, priority)| {
                    priority
                        .map(unit, candidate)
                        .map_err(|source| SchedError::Priority {
                            name: name.clone(),
                            source,
                        })
                })
                .collect::<SchedResult<Vec<HostPriority>>>()
        });

        let mut errs = Vec::new();
        let mut columns: Vec<HostPriorityList> = priorities
            .iter()
            .map(|_| Vec::with_capacity(candidates.len()))
            .collect();
        for row in rows {
            match row {
                Ok(entries) => {
                    for (i, entry) in entries.into_iter().enumerate() {
                        columns[i].push(entry);
                    }
                }
                Err(err) => errs.push(err),
            }
        }
        if !errs.is_empty() {
            return Err(aggregate(errs));
        }

        // Reduce: whole-set normalization, only after every map joined.
        let reduce_errs: Vec<SchedError> = self.priority_pool.install(|| {
            priorities
                .par_iter()
                .zip(columns.par_iter_mut())
                .filter_map(|((name, priority), column)| {
                    priority
                        .reduce(unit, candidates, column)
                        .err()
                        .map(|source| SchedError::Priority {
                            name: name.clone(),
                            source,
                        })
                })
                .collect()
        });
        if !reduce_errs.is_empty() {
            return Err(aggregate(reduce_errs));
        }

        for candidate in candidates {
            for plugin in unit.select_plugins() {
                plugin.on_priority_end(unit, candidate.as_ref());
            }
        }

        Ok(candidates
            .iter()
            .map(|candidate| HostPriority {
                host: candidate.index_key().to_string(),
                score: unit.get_score(candidate.index_key()),
                candidate: Arc::clone(candidate),
            })
            .collect())
    }
}

/// Evaluate one candidate against the sorted predicate list.
///
/// Leaves a log entry per predicate touched. Without
/// `always_check_all`, the first rejection skips the candidate's
/// remaining predicates; other candidates are unaffected.
fn fits_on_candidate(
    unit: &Unit,
    candidate: &Arc<dyn Candidater>,
    predicates: &[Box<dyn FitPredicate>],
    always_check_all: bool,
) -> SchedResult<bool> {
    let mut fits = true;
    let mut failures = Vec::new();
    let mut logs = Vec::new();
    let log_index = Unit::log_index(candidate.as_ref());

    for predicate in predicates {
        match predicate.execute(unit, candidate.as_ref()) {
            Err(source) => {
                logs.push(SchedLog::new(
                    log_index.clone(),
                    predicate.name().to_string(),
                    vec![LogMessage {
                        kind: "error".to_string(),
                        info: source.to_string(),
                    }],
                    true,
                ));
                unit.logs().appends(logs);
                return Err(SchedError::Predicate {
                    name: predicate.name().to_string(),
                    source,
                });
            }
            Ok((fit, reasons)) => {
                let messages = reasons
                    .iter()
                    .map(|r| LogMessage {
                        kind: r.kind.clone(),
                        info: r.reason.clone(),
                    })
                    .collect();
                logs.push(SchedLog::new(
                    log_index.clone(),
                    predicate.name().to_string(),
                    messages,
                    !fit,
                ));
                if !fit {
                    failures.push(FailedCandidate {
                        stage: predicate.name().to_string(),
                        candidate_id: candidate.index_key().to_string(),
                        candidate_name: candidate.name().to_string(),
                        reasons,
                    });
                    fits = false;
                    if !always_check_all {
                        break;
                    }
                }
            }
        }
    }

    unit.logs().appends(logs);
    if !fits {
        unit.append_failed_candidates(failures);
    }
    Ok(fits)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Mutex;

    use hostplan_api::SchedInfo;
    use hostplan_core::testing::StubCandidate;
    use hostplan_core::{PredicateHelper, Priority};

    /// Test predicate: passes hosts whose id is not on the reject list,
    /// with a fixed capacity; records every execution.
    struct ListPredicate {
        name: String,
        capacity: i64,
        reject: HashSet<String>,
        executed: Arc<Mutex<Vec<(String, String)>>>,
    }

    impl ListPredicate {
        fn boxed(
            name: &str,
            capacity: i64,
            reject: &[&str],
            executed: &Arc<Mutex<Vec<(String, String)>>>,
        ) -> Box<dyn FitPredicate> {
            Box::new(Self {
                name: name.to_string(),
                capacity,
                reject: reject.iter().map(|s| s.to_string()).collect(),
                executed: Arc::clone(executed),
            })
        }
    }

    impl FitPredicate for ListPredicate {
        fn name(&self) -> &str {
            &self.name
        }

        fn clone_boxed(&self) -> Box<dyn FitPredicate> {
            Box::new(Self {
                name: self.name.clone(),
                capacity: self.capacity,
                reject: self.reject.clone(),
                executed: Arc::clone(&self.executed),
            })
        }

        fn execute(
            &self,
            unit: &Unit,
            candidate: &dyn Candidater,
        ) -> anyhow::Result<hostplan_core::PredicateVerdict> {
            self.executed
                .lock()
                .unwrap()
                .push((self.name.clone(), candidate.index_key().to_string()));
            let mut helper = PredicateHelper::new(&self.name, unit, candidate);
            if self.reject.contains(candidate.index_key()) {
                helper.exclude("on the reject list");
            } else {
                helper.set_capacity(self.capacity);
            }
            Ok(helper.verdict())
        }
    }

    struct FailingPredicate;

    impl FitPredicate for FailingPredicate {
        fn name(&self) -> &str {
            "broken"
        }

        fn clone_boxed(&self) -> Box<dyn FitPredicate> {
            Box::new(Self)
        }

        fn execute(
            &self,
            _unit: &Unit,
            _candidate: &dyn Candidater,
        ) -> anyhow::Result<hostplan_core::PredicateVerdict> {
            Err(anyhow::anyhow!("backend lookup failed"))
        }
    }

    /// Test priority: writes a score component from a canned table.
    struct TablePriority {
        name: String,
        table: Vec<(String, i64)>,
    }

    impl Priority for TablePriority {
        fn name(&self) -> &str {
            &self.name
        }

        fn clone_boxed(&self) -> Box<dyn Priority> {
            Box::new(Self {
                name: self.name.clone(),
                table: self.table.clone(),
            })
        }

        fn map(
            &self,
            unit: &Unit,
            candidate: &Arc<dyn Candidater>,
        ) -> anyhow::Result<HostPriority> {
            let id = candidate.index_key();
            let score = self
                .table
                .iter()
                .find(|(host, _)| host == id)
                .map(|(_, score)| *score)
                .unwrap_or(0);
            unit.set_score(id, &self.name, score);
            Ok(HostPriority {
                host: id.to_string(),
                score,
                candidate: Arc::clone(candidate),
            })
        }
    }

    struct TestDriver {
        predicates: Mutex<Option<Vec<Box<dyn FitPredicate>>>>,
        priorities: Mutex<Option<Vec<PriorityConfig>>>,
        dirtied: Mutex<Vec<(String, i64)>>,
    }

    impl TestDriver {
        fn new(predicates: Vec<Box<dyn FitPredicate>>, priorities: Vec<PriorityConfig>) -> Self {
            Self {
                predicates: Mutex::new(Some(predicates)),
                priorities: Mutex::new(Some(priorities)),
                dirtied: Mutex::new(Vec::new()),
            }
        }
    }

    impl SchedDriver for TestDriver {
        fn predicates(&self) -> SchedResult<Vec<Box<dyn FitPredicate>>> {
            Ok(self.predicates.lock().unwrap().take().unwrap_or_default())
        }

        fn priority_configs(&self) -> SchedResult<Vec<PriorityConfig>> {
            Ok(self.priorities.lock().unwrap().take().unwrap_or_default())
        }

        fn dirty_selected_candidates(&self, selected: &[SelectedCandidate]) {
            let mut dirtied = self.dirtied.lock().unwrap();
            for sc in selected {
                dirtied.push((sc.candidate.index_key().to_string(), sc.count));
            }
        }
    }

    fn hosts(ids: &[&str]) -> Vec<Arc<dyn Candidater>> {
        ids.iter().map(|id| StubCandidate::new(id).shared()).collect()
    }

    fn scheduler(
        predicates: Vec<Box<dyn FitPredicate>>,
        priorities: Vec<PriorityConfig>,
    ) -> (GenericScheduler, Arc<TestDriver>) {
        let driver = Arc::new(TestDriver::new(predicates, priorities));
        let scheduler =
            GenericScheduler::new(driver.clone(), SchedulerOptions::default()).unwrap();
        (scheduler, driver)
    }

    #[test]
    fn zero_candidates_is_no_resource() {
        let (scheduler, _) = scheduler(Vec::new(), Vec::new());
        let unit = Unit::new(SchedInfo::default());

        let err = scheduler.schedule(&unit, &[]).unwrap_err();
        assert!(matches!(err, SchedError::NoResource { .. }));
    }

    #[test]
    fn schedules_across_surviving_candidates() {
        let executed = Arc::new(Mutex::new(Vec::new()));
        let (scheduler, driver) = scheduler(
            vec![ListPredicate::boxed("a_filter", 10, &["h3"], &executed)],
            Vec::new(),
        );
        let unit = Unit::new(SchedInfo {
            session_id: "s-1".to_string(),
            count: 2,
            ..SchedInfo::default()
        });

        let result = scheduler.schedule(&unit, &hosts(&["h1", "h2", "h3"])).unwrap();
        let total: i64 = result.items.iter().map(|item| item.count).sum();
        assert_eq!(total, 2);
        assert!(result.items.iter().all(|item| item.id != "h3"));

        // Selected candidates are reported back for cache dirtying.
        let dirtied = driver.dirtied.lock().unwrap();
        let dirtied_total: i64 = dirtied.iter().map(|(_, count)| count).sum();
        assert_eq!(dirtied_total, 2);
    }

    #[test]
    fn all_rejected_is_fit_error_with_stage_breakdown() {
        let executed = Arc::new(Mutex::new(Vec::new()));
        let (scheduler, _) = scheduler(
            vec![ListPredicate::boxed("a_filter", 10, &["h1", "h2"], &executed)],
            Vec::new(),
        );
        let unit = Unit::new(SchedInfo::default());

        let err = scheduler.schedule(&unit, &hosts(&["h1", "h2"])).unwrap_err();
        match err {
            SchedError::Fit(fit) => {
                assert_eq!(fit.stages.get("a_filter"), Some(&2));
                assert_eq!(fit.stages.len(), 1);
            }
            other => panic!("expected FitError, got {other}"),
        }
    }

    #[test]
    fn suggestion_mode_tolerates_zero_fits() {
        let executed = Arc::new(Mutex::new(Vec::new()));
        let (scheduler, _) = scheduler(
            vec![ListPredicate::boxed("a_filter", 10, &["h1"], &executed)],
            Vec::new(),
        );
        let unit = Unit::new(SchedInfo {
            is_suggestion: true,
            ..SchedInfo::default()
        });

        let result = scheduler.schedule(&unit, &hosts(&["h1"])).unwrap();
        assert!(result.items.is_empty());
    }

    #[test]
    fn short_circuit_skips_later_predicates_for_failed_candidate_only() {
        let executed = Arc::new(Mutex::new(Vec::new()));
        // "a_filter" sorts before "b_filter" and rejects h1.
        let (scheduler, _) = scheduler(
            vec![
                ListPredicate::boxed("b_filter", 10, &[], &executed),
                ListPredicate::boxed("a_filter", 10, &["h1"], &executed),
            ],
            Vec::new(),
        );
        let unit = Unit::new(SchedInfo::default());

        scheduler.schedule(&unit, &hosts(&["h1", "h2"])).unwrap();

        let executed = executed.lock().unwrap();
        let h1_stages: Vec<&str> = executed
            .iter()
            .filter(|(_, host)| host == "h1")
            .map(|(stage, _)| stage.as_str())
            .collect();
        let h2_stages: Vec<&str> = executed
            .iter()
            .filter(|(_, host)| host == "h2")
            .map(|(stage, _)| stage.as_str())
            .collect();
        assert_eq!(h1_stages, ["a_filter"]);
        assert_eq!(h2_stages, ["a_filter", "b_filter"]);
    }

    #[test]
    fn predicate_error_aborts_the_pass() {
        let (scheduler, _) = scheduler(vec![Box::new(FailingPredicate)], Vec::new());
        let unit = Unit::new(SchedInfo::default());

        let err = scheduler.schedule(&unit, &hosts(&["h1"])).unwrap_err();
        match err {
            SchedError::Predicate { name, .. } => assert_eq!(name, "broken"),
            other => panic!("expected predicate error, got {other}"),
        }
    }

    #[test]
    fn unit_ledger_scores_drive_selection() {
        let executed = Arc::new(Mutex::new(Vec::new()));
        let (scheduler, _) = scheduler(
            vec![ListPredicate::boxed("a_filter", 1, &[], &executed)],
            vec![PriorityConfig {
                name: "table".to_string(),
                weight: 1,
                priority: Box::new(TablePriority {
                    name: "table".to_string(),
                    table: vec![("h2".to_string(), 7)],
                }),
            }],
        );
        let unit = Unit::new(SchedInfo {
            count: 1,
            ..SchedInfo::default()
        });

        let result = scheduler.schedule(&unit, &hosts(&["h1", "h2"])).unwrap();
        let placed: Vec<&str> = result
            .items
            .iter()
            .filter(|item| item.count > 0)
            .map(|item| item.id.as_str())
            .collect();
        assert_eq!(placed, ["h2"]);
    }

    /// Storage-style predicate: registers itself as a select plugin in
    /// `pre_execute` and records the concrete binding at select time.
    struct StoragePredicate {
        matched: Vec<(String, i64)>,
    }

    impl FitPredicate for StoragePredicate {
        fn name(&self) -> &str {
            "host_storage"
        }

        fn clone_boxed(&self) -> Box<dyn FitPredicate> {
            Box::new(Self {
                matched: self.matched.clone(),
            })
        }

        fn pre_execute(
            &mut self,
            unit: &Unit,
            _candidates: &[Arc<dyn Candidater>],
        ) -> anyhow::Result<bool> {
            unit.append_select_plugin(Arc::new(StoragePlugin {
                matched: self.matched.clone(),
            }));
            Ok(true)
        }

        fn execute(
            &self,
            unit: &Unit,
            candidate: &dyn Candidater,
        ) -> anyhow::Result<hostplan_core::PredicateVerdict> {
            let mut helper = PredicateHelper::new("host_storage", unit, candidate);
            helper.set_capacity(4);
            Ok(helper.verdict())
        }
    }

    struct StoragePlugin {
        matched: Vec<(String, i64)>,
    }

    impl hostplan_core::SelectPlugin for StoragePlugin {
        fn name(&self) -> &str {
            "host_storage"
        }

        fn on_select_end(&self, unit: &Unit, candidate: &dyn Candidater, _count: i64) {
            unit.update_allocated(candidate.index_key(), |res| {
                res.disks.push(hostplan_core::AllocatedDisk {
                    index: 0,
                    storages: self
                        .matched
                        .iter()
                        .map(|(id, free)| hostplan_core::AllocatedStorage {
                            id: id.clone(),
                            free_capacity_mb: *free,
                        })
                        .collect(),
                });
            });
        }
    }

    #[test]
    fn full_pass_binds_storages_into_the_output() {
        let (scheduler, _) = scheduler(
            vec![Box::new(StoragePredicate {
                matched: vec![("st-slow".to_string(), 2048), ("st-fast".to_string(), 8192)],
            })],
            Vec::new(),
        );
        let unit = Unit::new(SchedInfo {
            session_id: "s-e2e".to_string(),
            count: 1,
            disks: vec![hostplan_api::DiskConfig {
                index: 0,
                size_mb: 1024,
                backend: String::new(),
            }],
            ..SchedInfo::default()
        });

        let result = scheduler.schedule(&unit, &hosts(&["h1"])).unwrap();
        let output = crate::result::to_schedule_output(&unit, &result);

        assert_eq!(output.candidates.len(), 1);
        let resource = output.candidates[0].resource().unwrap();
        assert_eq!(resource.host_id, "h1");
        // The roomiest matched storage leads the preference list.
        assert_eq!(resource.disks[0].storage_ids, vec!["st-fast", "st-slow"]);
    }

    #[test]
    fn every_predicate_touch_is_logged() {
        let executed = Arc::new(Mutex::new(Vec::new()));
        let (scheduler, _) = scheduler(
            vec![ListPredicate::boxed("a_filter", 5, &["h2"], &executed)],
            Vec::new(),
        );
        let unit = Unit::new(SchedInfo::default());

        scheduler.schedule(&unit, &hosts(&["h1", "h2"])).unwrap();
        let logs = unit.logs().all();
        assert_eq!(logs.len(), 2);
        let failed: Vec<bool> = logs.iter().map(|log| log.failed).collect();
        assert_eq!(failed.iter().filter(|f| **f).count(), 1);
    }
}
