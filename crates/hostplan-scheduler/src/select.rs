//! Greedy quota-filling host selection.
//!
//! Walks the score-sorted candidate list round-robin, one placement per
//! candidate per round, so the requested count spreads across the best
//! hosts instead of piling onto the single top scorer. A candidate drops
//! out of the next round once its capacity is exhausted.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use hostplan_core::{
    Candidater, HostPriorityList, SchedError, SchedResult, Unit, sort_for_selection,
};

/// A candidate together with how many placements it was assigned.
pub struct SelectedCandidate {
    pub count: i64,
    pub candidate: Arc<dyn Candidater>,
}

impl std::fmt::Debug for SelectedCandidate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SelectedCandidate")
            .field("count", &self.count)
            .field("candidate", &self.candidate.index_key())
            .finish()
    }
}

/// Assign the requested count across `priority_list`.
///
/// Fails with `NotEnoughResource` when capacity runs out and the request
/// is neither exploratory nor best-effort; suggestion/best-effort passes
/// return the partial assignment instead.
pub fn select_hosts(
    unit: &Unit,
    mut priority_list: HostPriorityList,
) -> SchedResult<Vec<SelectedCandidate>> {
    if priority_list.is_empty() {
        return Err(SchedError::EmptyPriorityList);
    }

    let info = unit.sched_info();
    let requested = info.count;
    let mut remaining = requested;

    sort_for_selection(&mut priority_list);

    // Selection order is the first-assignment order, kept stable for
    // reproducible output.
    let mut selected: Vec<SelectedCandidate> = Vec::new();
    let mut index_of: HashMap<String, usize> = HashMap::new();

    'rounds: while !priority_list.is_empty() {
        let mut next_round = HostPriorityList::new();
        for item in &priority_list {
            if remaining <= 0 {
                break 'rounds;
            }
            let slot = *index_of.entry(item.host.clone()).or_insert_with(|| {
                selected.push(SelectedCandidate {
                    count: 0,
                    candidate: Arc::clone(&item.candidate),
                });
                selected.len() - 1
            });
            selected[slot].count += 1;
            remaining -= 1;
            // Still has headroom beyond what this pass assigned: the
            // candidate stays in the running for the next round.
            if unit.get_capacity(&item.host) > selected[slot].count {
                next_round.push(item.clone());
            }
        }
        priority_list = next_round;
    }

    for sc in &selected {
        for plugin in unit.select_plugins() {
            plugin.on_select_end(unit, sc.candidate.as_ref(), sc.count);
        }
    }

    debug!(
        requested,
        satisfied = requested - remaining,
        hosts = selected.len(),
        "host selection finished"
    );

    if remaining > 0 && !info.is_suggestion && !info.best_effort {
        return Err(SchedError::NotEnoughResource {
            requested,
            satisfied: requested - remaining,
        });
    }

    Ok(selected)
}
