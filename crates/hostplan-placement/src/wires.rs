//! Wire bucketing for HA pairing.
//!
//! A master and its backup must share network reachability, so HA
//! selection only ever considers hosts within one wire at a time.

use std::collections::BTreeMap;

use crate::group::HostState;

/// Bucket host indices by wire membership. A host on several wires
/// appears in every one of its buckets. BTreeMap keeps the wire scan
/// order deterministic.
pub fn build_wire_hosts(hosts: &[HostState]) -> BTreeMap<String, Vec<usize>> {
    let mut wires: BTreeMap<String, Vec<usize>> = BTreeMap::new();
    for (index, host) in hosts.iter().enumerate() {
        for wire in host.candidate.wire_ids() {
            wires.entry(wire).or_default().push(index);
        }
    }
    wires
}

#[cfg(test)]
mod tests {
    use super::*;
    use hostplan_api::SchedInfo;
    use hostplan_core::Unit;
    use hostplan_core::testing::StubCandidate;

    fn host(id: &str, wires: &[&str]) -> HostState {
        let unit = Unit::new(SchedInfo::default());
        HostState::new(&unit, StubCandidate::new(id).with_wires(wires).shared(), &[])
    }

    #[test]
    fn hosts_land_in_every_wire_they_reach() {
        let hosts = vec![
            host("h1", &["w1"]),
            host("h2", &["w1", "w2"]),
            host("h3", &["w2"]),
            host("h4", &[]),
        ];

        let wires = build_wire_hosts(&hosts);
        assert_eq!(wires.len(), 2);
        assert_eq!(wires["w1"], vec![0, 1]);
        assert_eq!(wires["w2"], vec![1, 2]);
    }

    #[test]
    fn no_wires_means_empty_map() {
        let hosts = vec![host("h1", &[])];
        assert!(build_wire_hosts(&hosts).is_empty());
    }
}
