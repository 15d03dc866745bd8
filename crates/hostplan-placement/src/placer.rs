//! Group-aware guest placement.
//!
//! Re-derives a per-guest assignment from the already filtered, scored,
//! capacity-bounded candidate set; predicates and priorities are never
//! re-run here. Forced dispersion groups are hard constraints, unforced
//! groups only bias ranking, and HA requests pair a master with a backup
//! on a shared wire.

use std::cmp::Reverse;
use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::{debug, info, warn};

use hostplan_api::InstanceGroup;
use hostplan_core::{Candidater, Unit};

use crate::group::{HostState, Role};
use crate::wires::build_wire_hosts;

/// Outcome for one guest slot.
pub struct GuestPlacement {
    pub master: Option<Arc<dyn Candidater>>,
    pub backup: Option<Arc<dyn Candidater>>,
    pub error: Option<String>,
}

impl GuestPlacement {
    fn placed(master: &Arc<dyn Candidater>, backup: Option<&Arc<dyn Candidater>>) -> Self {
        Self {
            master: Some(Arc::clone(master)),
            backup: backup.map(Arc::clone),
            error: None,
        }
    }

    fn failed(error: String) -> Self {
        Self {
            master: None,
            backup: None,
            error: Some(error),
        }
    }
}

/// Place every requested guest, one slot per requested count.
///
/// A slot that cannot be satisfied gets an explicit error and does not
/// abort placement of the remaining guests.
pub fn place_guests(unit: &Unit, candidates: &[Arc<dyn Candidater>]) -> Vec<GuestPlacement> {
    let info = unit.sched_info();
    let groups = info.instance_groups.clone();

    let mut hosts: Vec<HostState> = candidates
        .iter()
        .map(|c| HostState::new(unit, Arc::clone(c), &groups))
        .collect();
    hosts.sort_by(|a, b| a.id().cmp(b.id()));

    if info.backup {
        place_ha(unit, &mut hosts, &groups)
    } else {
        place_simple(unit, &mut hosts, &groups)
    }
}

fn place_simple(
    unit: &Unit,
    hosts: &mut [HostState],
    groups: &[InstanceGroup],
) -> Vec<GuestPlacement> {
    let count = unit.sched_info().count;
    let mut placements = Vec::with_capacity(count as usize);

    for guest in 0..count {
        let pick = select_host(hosts, None, groups, true)
            .or_else(|| select_host(hosts, None, groups, false));
        match pick {
            Some(index) => {
                hosts[index].mark_used(groups, Role::Master);
                debug!(
                    guest,
                    host = hosts[index].id(),
                    score = hosts[index].score,
                    "guest placed"
                );
                placements.push(GuestPlacement::placed(&hosts[index].candidate, None));
            }
            None => {
                warn!(guest, "no suitable host");
                placements.push(GuestPlacement::failed(format!(
                    "no suitable host for guest {guest}"
                )));
            }
        }
    }
    placements
}

fn place_ha(
    unit: &Unit,
    hosts: &mut [HostState],
    groups: &[InstanceGroup],
) -> Vec<GuestPlacement> {
    let count = unit.sched_info().count;
    let wire_hosts = build_wire_hosts(hosts);
    // A wire that failed to produce a backup once is dropped for the
    // whole request, not just the failing guest.
    let mut no_wire: BTreeSet<String> = BTreeSet::new();
    let mut placements = Vec::with_capacity(count as usize);

    for guest in 0..count {
        // A singleton forced group per guest keeps master and backup
        // from landing on the same host.
        let mut guest_groups = groups.to_vec();
        guest_groups.push(InstanceGroup {
            id: format!("ha-pair:{guest}"),
            granularity: 1,
            force_dispersion: true,
        });

        let mut placed = None;
        for (wire, members) in &wire_hosts {
            if no_wire.contains(wire) {
                continue;
            }
            let members = members.as_slice();
            let Some(master) = select_host(hosts, Some(members), &guest_groups, true)
                .or_else(|| select_host(hosts, Some(members), &guest_groups, false))
            else {
                continue;
            };
            hosts[master].mark_used(&guest_groups, Role::Master);

            let backup = select_host(hosts, Some(members), &guest_groups, true)
                .or_else(|| select_host(hosts, Some(members), &guest_groups, false));
            match backup {
                Some(backup) => {
                    hosts[backup].mark_used(&guest_groups, Role::Backup);
                    debug!(
                        guest,
                        wire = %wire,
                        master = hosts[master].id(),
                        backup = hosts[backup].id(),
                        "ha pair placed"
                    );
                    placed = Some((master, backup));
                    break;
                }
                None => {
                    hosts[master].unmark_used(&guest_groups, Role::Master);
                    no_wire.insert(wire.clone());
                    info!(guest, wire = %wire, "wire excluded, no backup host available");
                }
            }
        }

        match placed {
            Some((master, backup)) => placements.push(GuestPlacement::placed(
                &hosts[master].candidate,
                Some(&hosts[backup].candidate),
            )),
            None => {
                warn!(guest, "no wire can host a master/backup pair");
                placements.push(GuestPlacement::failed(format!(
                    "no suitable host for guest {guest}"
                )));
            }
        }
    }
    placements
}

/// Pick the best host for one guest, or `None` when nothing qualifies.
///
/// `allowed` restricts the search to a wire's members. With `forced` every
/// group of the guest is a hard constraint; without it only groups whose
/// own `force_dispersion` flag is set stay hard.
fn select_host(
    hosts: &[HostState],
    allowed: Option<&[usize]>,
    groups: &[InstanceGroup],
    forced: bool,
) -> Option<usize> {
    let indices: Vec<usize> = match allowed {
        Some(members) => members.to_vec(),
        None => (0..hosts.len()).collect(),
    };

    let mut best: Option<usize> = None;
    for index in indices {
        let host = &hosts[index];
        if host.capacity <= 0 {
            continue;
        }
        if groups
            .iter()
            .any(|g| (forced || g.force_dispersion) && host.group_free(g) <= 0)
        {
            continue;
        }
        match best {
            Some(current) if !ranks_before(host, &hosts[current], groups) => {}
            _ => best = Some(index),
        }
    }
    best
}

/// Lexicographic host ranking: fewer backups, fewer guests this pass, more
/// forced-group room, higher score, more raw capacity, then host id for a
/// reproducible final tie-break.
fn ranks_before(a: &HostState, b: &HostState, groups: &[InstanceGroup]) -> bool {
    let key = |h: &HostState| {
        (
            h.backup_count,
            h.assigned,
            Reverse(h.min_forced_group_free(groups)),
            Reverse(h.score),
            Reverse(h.capacity),
        )
    };
    key(a).cmp(&key(b)).then_with(|| a.id().cmp(b.id())).is_lt()
}
