//! Result assembly.
//!
//! Turns the internal selection state into the external output shapes:
//! per-candidate result items (with optional suggestion padding), the
//! per-guest-slot `ScheduleOutput`, the forecast aggregation, and the raw
//! test rows. Storage choices run through a pass-local ledger so two disks
//! in one pass cannot double-book the same storage headroom.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use hostplan_api::{
    CandidateDisk, CandidateNet, CandidateResource, CandidateSlot, ForecastFilter, ForecastResult,
    ScheduleOutput, TestResultItem,
};
use hostplan_core::{AllocatedResource, AllocatedStorage, Candidater, Unit};
use hostplan_placement::place_guests;

use crate::numa::compute_numa_pin;
use crate::select::SelectedCandidate;

/// One candidate's row in the schedule result.
pub struct SchedResultItem {
    pub id: String,
    pub name: String,
    /// Placements assigned to this candidate (0 for suggestion padding).
    pub count: i64,
    pub capacity: i64,
    pub score: i64,
    pub capacity_details: HashMap<String, i64>,
    pub score_details: String,
    pub allocated: AllocatedResource,
    pub candidate: Arc<dyn Candidater>,
}

pub struct SchedResultItemList {
    pub session_id: String,
    pub items: Vec<SchedResultItem>,
    /// Candidates that survived filtering; group placement re-derives
    /// assignments from this set.
    pub filtered: Vec<Arc<dyn Candidater>>,
}

impl std::fmt::Debug for SchedResultItem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchedResultItem")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("count", &self.count)
            .field("capacity", &self.capacity)
            .field("score", &self.score)
            .field("capacity_details", &self.capacity_details)
            .field("score_details", &self.score_details)
            .field("allocated", &self.allocated)
            .field("candidate", &self.candidate.index_key())
            .finish()
    }
}

impl std::fmt::Debug for SchedResultItemList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchedResultItemList")
            .field("session_id", &self.session_id)
            .field("items", &self.items)
            .field(
                "filtered",
                &self
                    .filtered
                    .iter()
                    .map(|c| c.index_key())
                    .collect::<Vec<_>>(),
            )
            .finish()
    }
}

fn new_result_item(unit: &Unit, count: i64, candidate: &Arc<dyn Candidater>) -> SchedResultItem {
    let id = candidate.index_key().to_string();
    let show_details = unit.sched_info().show_suggestion_details;
    SchedResultItem {
        capacity: unit.get_capacity(&id),
        score: unit.get_score(&id),
        capacity_details: if show_details {
            unit.capacity_details(&id)
        } else {
            HashMap::new()
        },
        score_details: if show_details {
            unit.score_details(&id)
        } else {
            String::new()
        },
        allocated: unit.allocated_resource(&id),
        name: candidate.name().to_string(),
        count,
        id,
        candidate: Arc::clone(candidate),
    }
}

/// Build the result list: selected candidates first, then — in suggestion
/// mode — zero-count padding from the remaining fitting candidates up to
/// the suggestion limit, and from unfiltered ones when `suggestion_all`
/// or an explicit candidate list asks for them.
pub fn generate_schedule_result(
    unit: &Unit,
    selected: &[SelectedCandidate],
    filtered: &[Arc<dyn Candidater>],
    all: &[Arc<dyn Candidater>],
) -> SchedResultItemList {
    let info = unit.sched_info();
    let mut items = Vec::with_capacity(selected.len());
    let mut seen: HashSet<String> = HashSet::new();

    for sc in selected {
        items.push(new_result_item(unit, sc.count, &sc.candidate));
        seen.insert(sc.candidate.index_key().to_string());
    }

    let pad_limit = if info.is_suggestion {
        info.suggestion_limit
    } else {
        0
    };

    for candidate in all {
        if pad_limit <= items.len() as i64 {
            break;
        }
        let id = candidate.index_key();
        if !seen.contains(id) && unit.get_capacity(id) > 0 {
            seen.insert(id.to_string());
            items.push(new_result_item(unit, 0, candidate));
        }
    }

    if info.suggestion_all || !info.prefer_candidates.is_empty() {
        for candidate in all {
            if pad_limit <= items.len() as i64 {
                break;
            }
            let id = candidate.index_key();
            if !seen.contains(id) {
                seen.insert(id.to_string());
                items.push(new_result_item(unit, 0, candidate));
            }
        }
    }

    SchedResultItemList {
        session_id: info.session_id.clone(),
        items,
        filtered: filtered.to_vec(),
    }
}

/// Pass-local ledger of storage headroom already promised to earlier
/// disks, so free capacity is only counted once.
#[derive(Default)]
pub struct StorageUsed {
    used: HashMap<String, i64>,
}

impl StorageUsed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, storage_id: &str) -> i64 {
        self.used.get(storage_id).copied().unwrap_or(0)
    }

    pub fn add(&mut self, storage_id: &str, used: i64) {
        *self.used.entry(storage_id.to_string()).or_insert(0) += used;
    }
}

/// Order matched storages by remaining headroom (free minus already
/// promised), charge the request to the best one, and return all ids in
/// preference order.
fn sorted_storage_ids(
    used: &mut StorageUsed,
    req_size_mb: i64,
    storages: &[AllocatedStorage],
) -> Vec<String> {
    let mut ranked: Vec<(&AllocatedStorage, i64)> = storages
        .iter()
        .map(|s| (s, s.free_capacity_mb - used.get(&s.id)))
        .collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.id.cmp(&b.0.id)));

    let ids: Vec<String> = ranked.iter().map(|(s, _)| s.id.clone()).collect();
    if let Some(first) = ids.first() {
        used.add(first, req_size_mb);
    }
    ids
}

fn build_resource(
    unit: &Unit,
    candidate: &Arc<dyn Candidater>,
    backup: Option<&Arc<dyn Candidater>>,
    used: &mut StorageUsed,
) -> CandidateResource {
    let info = unit.sched_info();
    let allocated = unit.allocated_resource(candidate.index_key());

    let disks = allocated
        .disks
        .iter()
        .map(|disk| {
            let req_size_mb = info
                .disks
                .iter()
                .find(|d| d.index == disk.index)
                .map(|d| d.size_mb)
                .unwrap_or(0);
            CandidateDisk {
                index: disk.index,
                storage_ids: sorted_storage_ids(used, req_size_mb, &disk.storages),
            }
        })
        .collect();

    let nets = allocated
        .nets
        .iter()
        .map(|net| CandidateNet {
            index: net.index,
            network_ids: net.network_ids.clone(),
        })
        .collect();

    CandidateResource {
        host_id: candidate.index_key().to_string(),
        name: candidate.name().to_string(),
        backup_host_id: backup.map(|b| b.index_key().to_string()),
        disks,
        nets,
        cpu_numa_pin: compute_numa_pin(&candidate.numa_nodes(), info.cpu_count, info.memory_mb),
    }
}

/// Convert the result list into the per-guest-slot output.
///
/// Requests referencing instance groups or asking for HA pairs go through
/// the group placer; everything else expands the selected counts directly.
/// Either way the output has exactly one slot per requested placement.
pub fn to_schedule_output(unit: &Unit, list: &SchedResultItemList) -> ScheduleOutput {
    let info = unit.sched_info();
    let mut used = StorageUsed::new();
    let mut slots: Vec<CandidateSlot> = Vec::with_capacity(info.count.max(0) as usize);

    if info.backup || info.has_groups() {
        for placement in place_guests(unit, &list.filtered) {
            match placement.master {
                Some(master) => slots.push(CandidateSlot::Placed(build_resource(
                    unit,
                    &master,
                    placement.backup.as_ref(),
                    &mut used,
                ))),
                None => slots.push(CandidateSlot::Failed {
                    error: placement
                        .error
                        .unwrap_or_else(|| "no suitable host".to_string()),
                }),
            }
        }
    } else {
        'fill: for item in &list.items {
            for _ in 0..item.count {
                if slots.len() as i64 >= info.count {
                    break 'fill;
                }
                slots.push(CandidateSlot::Placed(build_resource(
                    unit,
                    &item.candidate,
                    None,
                    &mut used,
                )));
            }
        }
        while (slots.len() as i64) < info.count {
            slots.push(CandidateSlot::Failed {
                error: format!("no suitable host for guest {}", slots.len()),
            });
        }
    }

    ScheduleOutput {
        session_id: info.session_id.clone(),
        candidates: slots,
    }
}

/// Aggregate rejections by filter stage for forecast tooling.
pub fn to_forecast_result(unit: &Unit, list: &SchedResultItemList) -> ForecastResult {
    let info = unit.sched_info();
    let allow_count: i64 = list
        .filtered
        .iter()
        .map(|c| unit.get_capacity(c.index_key()))
        .sum();

    let mut filters: Vec<ForecastFilter> = unit
        .failed_candidates()
        .into_iter()
        .map(|(stage, fcs)| {
            let messages: BTreeSet<String> = fcs
                .candidates
                .iter()
                .flat_map(|fc| fc.reasons.iter().map(|r| r.reason.clone()))
                .collect();
            ForecastFilter {
                filter: stage,
                count: fcs.candidates.len() as i64,
                messages: messages.into_iter().collect(),
            }
        })
        .collect();
    filters.sort_by(|a, b| a.filter.cmp(&b.filter));

    ForecastResult {
        session_id: info.session_id.clone(),
        can_create: allow_count >= info.count,
        req_count: info.count,
        allow_count,
        filters,
    }
}

/// Raw per-candidate rows for the debug/test output.
pub fn to_test_result(unit: &Unit, list: &SchedResultItemList) -> Vec<TestResultItem> {
    list.items
        .iter()
        .map(|item| TestResultItem {
            id: item.id.clone(),
            name: item.name.clone(),
            count: item.count,
            capacity: item.capacity,
            score: item.score,
            capacity_details: unit.capacity_details(&item.id),
            score_details: unit.score_details(&item.id),
        })
        .collect()
}
