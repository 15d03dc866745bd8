//! Placement request types.
//!
//! A [`SchedInfo`] is immutable for the duration of one schedule call; the
//! engine only reads it. Counts and sizes are `i64` because they flow into
//! capacity arithmetic that uses a negative sentinel for "uncomputed".

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Unique identifier for a candidate host.
pub type HostId = String;

/// Unique identifier for an instance group.
pub type GroupId = String;

/// A disk the guest wants, by index.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DiskConfig {
    pub index: usize,
    /// Requested size in MiB.
    pub size_mb: i64,
    /// Storage backend hint ("local", "rbd", ...). Empty = any.
    #[serde(default)]
    pub backend: String,
}

/// A network attachment the guest wants.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct NetConfig {
    /// Explicit network to join, if any.
    #[serde(default)]
    pub network_id: Option<String>,
    /// Restrict to networks on this wire, if set.
    #[serde(default)]
    pub wire_id: Option<String>,
}

/// A passthrough device request (GPU, USB, ...).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IsolatedDeviceConfig {
    pub dev_type: String,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub vendor: String,
}

/// A named anti-affinity group the guest belongs to.
///
/// `granularity` bounds how many members of the group one host may carry.
/// `force_dispersion` makes the bound a hard constraint; otherwise it only
/// biases host ranking.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InstanceGroup {
    pub id: GroupId,
    pub granularity: i64,
    #[serde(default)]
    pub force_dispersion: bool,
}

/// One scheduling request: what to place, how many, and in which mode.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SchedInfo {
    pub session_id: String,
    /// Number of identical placements wanted.
    pub count: i64,

    pub cpu_count: i64,
    pub memory_mb: i64,
    #[serde(default)]
    pub disks: Vec<DiskConfig>,
    #[serde(default)]
    pub nets: Vec<NetConfig>,
    #[serde(default)]
    pub isolated_devices: Vec<IsolatedDeviceConfig>,
    #[serde(default)]
    pub instance_groups: Vec<InstanceGroup>,

    /// Exploratory pass: tolerate zero fits, return diagnostics.
    #[serde(default)]
    pub is_suggestion: bool,
    /// Pad the result with unfiltered candidates as well.
    #[serde(default)]
    pub suggestion_all: bool,
    /// Attach per-candidate capacity/score detail to results.
    #[serde(default)]
    pub show_suggestion_details: bool,
    /// Upper bound on result entries in suggestion mode.
    #[serde(default = "default_suggestion_limit")]
    pub suggestion_limit: i64,
    /// Accept partial placement instead of hard-failing.
    #[serde(default)]
    pub best_effort: bool,
    /// Place a master/backup (HA) pair per guest.
    #[serde(default)]
    pub backup: bool,
    #[serde(default)]
    pub live_migrate: bool,
    /// Rescheduling an existing guest rather than creating a fresh one.
    #[serde(default)]
    pub resched: bool,

    /// Explicit candidate allowlist; also enables unfiltered padding.
    #[serde(default)]
    pub prefer_candidates: Vec<HostId>,

    /// Free-form request annotations carried through to results.
    #[serde(default)]
    pub tags: HashMap<String, String>,
}

fn default_suggestion_limit() -> i64 {
    50
}

impl SchedInfo {
    /// One-line request summary for logs and error messages.
    pub fn brief(&self) -> String {
        format!(
            "count={} cpu={} mem_mb={} disks={} nets={} groups={} backup={}",
            self.count,
            self.cpu_count,
            self.memory_mb,
            self.disks.len(),
            self.nets.len(),
            self.instance_groups.len(),
            self.backup,
        )
    }

    /// Whether the request references any instance group.
    pub fn has_groups(&self) -> bool {
        !self.instance_groups.is_empty()
    }
}

impl Default for SchedInfo {
    fn default() -> Self {
        Self {
            session_id: String::new(),
            count: 1,
            cpu_count: 1,
            memory_mb: 1024,
            disks: Vec::new(),
            nets: Vec::new(),
            isolated_devices: Vec::new(),
            instance_groups: Vec::new(),
            is_suggestion: false,
            suggestion_all: false,
            show_suggestion_details: false,
            suggestion_limit: default_suggestion_limit(),
            best_effort: false,
            backup: false,
            live_migrate: false,
            resched: false,
            prefer_candidates: Vec::new(),
            tags: HashMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sched_info_roundtrips_through_json() {
        let info = SchedInfo {
            session_id: "s-1".to_string(),
            count: 3,
            disks: vec![DiskConfig {
                index: 0,
                size_mb: 10240,
                backend: "local".to_string(),
            }],
            instance_groups: vec![InstanceGroup {
                id: "grp-1".to_string(),
                granularity: 2,
                force_dispersion: true,
            }],
            ..SchedInfo::default()
        };

        let json = serde_json::to_string(&info).unwrap();
        let back: SchedInfo = serde_json::from_str(&json).unwrap();
        assert_eq!(back, info);
    }

    #[test]
    fn missing_flags_default_to_off() {
        let json = r#"{"session_id":"s-2","count":1,"cpu_count":2,"memory_mb":2048}"#;
        let info: SchedInfo = serde_json::from_str(json).unwrap();

        assert!(!info.is_suggestion);
        assert!(!info.backup);
        assert_eq!(info.suggestion_limit, 50);
        assert!(info.disks.is_empty());
    }

    #[test]
    fn brief_mentions_count_and_groups() {
        let mut info = SchedInfo::default();
        info.count = 2;
        info.instance_groups.push(InstanceGroup {
            id: "g".to_string(),
            granularity: 1,
            force_dispersion: false,
        });

        let brief = info.brief();
        assert!(brief.contains("count=2"));
        assert!(brief.contains("groups=1"));
    }
}
