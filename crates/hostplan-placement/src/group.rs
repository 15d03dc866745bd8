//! Per-host bookkeeping for group-aware placement.
//!
//! Each host tracks remaining room per instance group, its overall
//! remaining capacity, and how many guests this pass has already put on
//! it, split by role. `mark_used` and `unmark_used` are exact inverses;
//! the HA path relies on that to roll back a tentative master when no
//! backup can be found on the same wire.

use std::collections::HashMap;
use std::sync::Arc;

use hostplan_api::InstanceGroup;
use hostplan_core::{Candidater, Unit};

/// Which role a guest plays on a host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Master,
    Backup,
}

/// Mutable per-host state for one placement derivation.
pub struct HostState {
    pub candidate: Arc<dyn Candidater>,
    /// Remaining overall capacity (from the unit's predicate bookkeeping).
    pub capacity: i64,
    pub score: i64,
    /// Guests this pass has assigned here, either role.
    pub assigned: i64,
    pub master_count: i64,
    pub backup_count: i64,
    group_free: HashMap<String, i64>,
}

impl HostState {
    /// Snapshot a candidate's standing from the unit.
    ///
    /// Group room comes from the live free count when the host already
    /// carries members of the group, otherwise from the group's configured
    /// granularity.
    pub fn new(unit: &Unit, candidate: Arc<dyn Candidater>, groups: &[InstanceGroup]) -> Self {
        let mut group_free = HashMap::new();
        for group in groups {
            let free = candidate
                .free_group_count(&group.id)
                .unwrap_or(group.granularity);
            group_free.insert(group.id.clone(), free.max(0));
        }
        let id = candidate.index_key();
        Self {
            capacity: unit.get_capacity(id),
            score: unit.get_score(id),
            assigned: 0,
            master_count: 0,
            backup_count: 0,
            group_free,
            candidate,
        }
    }

    pub fn id(&self) -> &str {
        self.candidate.index_key()
    }

    /// Remaining room for `group` on this host.
    pub fn group_free(&self, group: &InstanceGroup) -> i64 {
        self.group_free
            .get(&group.id)
            .copied()
            .unwrap_or_else(|| group.granularity.max(0))
    }

    /// Minimum remaining room among the guest's forced groups; unbounded
    /// when the guest has none.
    pub fn min_forced_group_free(&self, groups: &[InstanceGroup]) -> i64 {
        groups
            .iter()
            .filter(|g| g.force_dispersion)
            .map(|g| self.group_free(g))
            .min()
            .unwrap_or(i64::MAX)
    }

    pub fn mark_used(&mut self, groups: &[InstanceGroup], role: Role) {
        for group in groups {
            let free = self
                .group_free
                .entry(group.id.clone())
                .or_insert_with(|| group.granularity.max(0));
            *free -= 1;
        }
        self.capacity -= 1;
        self.assigned += 1;
        match role {
            Role::Master => self.master_count += 1,
            Role::Backup => self.backup_count += 1,
        }
    }

    pub fn unmark_used(&mut self, groups: &[InstanceGroup], role: Role) {
        for group in groups {
            let free = self
                .group_free
                .entry(group.id.clone())
                .or_insert_with(|| group.granularity.max(0));
            *free += 1;
        }
        self.capacity += 1;
        self.assigned -= 1;
        match role {
            Role::Master => self.master_count -= 1,
            Role::Backup => self.backup_count -= 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hostplan_api::SchedInfo;
    use hostplan_core::NormalCounter;
    use hostplan_core::testing::StubCandidate;

    fn group(id: &str, granularity: i64, force: bool) -> InstanceGroup {
        InstanceGroup {
            id: id.to_string(),
            granularity,
            force_dispersion: force,
        }
    }

    fn unit_with_capacity(id: &str, capacity: i64) -> Unit {
        let unit = Unit::new(SchedInfo::default());
        unit.set_capacity(id, "test", Arc::new(NormalCounter::new(capacity)))
            .unwrap();
        unit
    }

    #[test]
    fn group_room_defaults_to_granularity() {
        let unit = unit_with_capacity("h1", 5);
        let groups = vec![group("g1", 2, true)];
        let state = HostState::new(&unit, StubCandidate::new("h1").shared(), &groups);

        assert_eq!(state.group_free(&groups[0]), 2);
    }

    #[test]
    fn live_free_count_overrides_granularity() {
        let unit = unit_with_capacity("h1", 5);
        let groups = vec![group("g1", 2, true)];
        let candidate = StubCandidate::new("h1").with_group_free("g1", 0).shared();
        let state = HostState::new(&unit, candidate, &groups);

        assert_eq!(state.group_free(&groups[0]), 0);
    }

    #[test]
    fn mark_and_unmark_are_exact_inverses() {
        let unit = unit_with_capacity("h1", 3);
        let groups = vec![group("g1", 2, true), group("g2", 4, false)];
        let mut state = HostState::new(&unit, StubCandidate::new("h1").shared(), &groups);

        state.mark_used(&groups, Role::Master);
        assert_eq!(state.capacity, 2);
        assert_eq!(state.assigned, 1);
        assert_eq!(state.master_count, 1);
        assert_eq!(state.group_free(&groups[0]), 1);
        assert_eq!(state.group_free(&groups[1]), 3);

        state.unmark_used(&groups, Role::Master);
        assert_eq!(state.capacity, 3);
        assert_eq!(state.assigned, 0);
        assert_eq!(state.master_count, 0);
        assert_eq!(state.group_free(&groups[0]), 2);
        assert_eq!(state.group_free(&groups[1]), 4);
    }

    #[test]
    fn min_forced_room_ignores_unforced_groups() {
        let unit = unit_with_capacity("h1", 3);
        let groups = vec![group("g1", 5, true), group("g2", 1, false)];
        let state = HostState::new(&unit, StubCandidate::new("h1").shared(), &groups);

        assert_eq!(state.min_forced_group_free(&groups), 5);
    }
}
