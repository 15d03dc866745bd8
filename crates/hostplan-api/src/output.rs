//! Schedule output types.
//!
//! The output list always has one entry per requested placement, even under
//! failure: slots that could not be satisfied carry an error string instead
//! of being omitted, so callers can report per-guest outcomes positionally.

use serde::{Deserialize, Serialize};

// ── Schedule output ────────────────────────────────────────────────

/// Chosen storages for one requested disk, best first.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CandidateDisk {
    pub index: usize,
    pub storage_ids: Vec<String>,
}

/// Chosen networks for one requested nic, best first.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CandidateNet {
    pub index: usize,
    pub network_ids: Vec<String>,
}

/// vCPU/memory assignment on one NUMA node of the chosen host.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CpuNumaPin {
    pub node_id: u32,
    pub cpus: Vec<u32>,
    pub memory_mb: i64,
}

/// A concrete placement for one guest slot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CandidateResource {
    pub host_id: String,
    pub name: String,
    /// Backup host for HA requests.
    #[serde(default)]
    pub backup_host_id: Option<String>,
    #[serde(default)]
    pub disks: Vec<CandidateDisk>,
    #[serde(default)]
    pub nets: Vec<CandidateNet>,
    #[serde(default)]
    pub cpu_numa_pin: Vec<CpuNumaPin>,
}

/// One guest slot of the schedule output: a placement or an error.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum CandidateSlot {
    Placed(CandidateResource),
    Failed { error: String },
}

impl CandidateSlot {
    pub fn is_placed(&self) -> bool {
        matches!(self, CandidateSlot::Placed(_))
    }

    pub fn resource(&self) -> Option<&CandidateResource> {
        match self {
            CandidateSlot::Placed(r) => Some(r),
            CandidateSlot::Failed { .. } => None,
        }
    }
}

/// Final schedule decision: one slot per requested placement.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScheduleOutput {
    pub session_id: String,
    pub candidates: Vec<CandidateSlot>,
}

// ── Forecast output ────────────────────────────────────────────────

/// Rejections attributed to one filter stage.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ForecastFilter {
    pub filter: String,
    /// How many candidates this stage rejected.
    pub count: i64,
    /// Deduplicated human-readable reasons.
    pub messages: Vec<String>,
}

/// Aggregated "why doesn't this fit" view of a scheduling pass.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ForecastResult {
    pub session_id: String,
    pub can_create: bool,
    /// Placements requested.
    pub req_count: i64,
    /// Placements the surviving capacity would allow.
    pub allow_count: i64,
    pub filters: Vec<ForecastFilter>,
}

// ── Test output ────────────────────────────────────────────────────

/// Raw per-candidate capacity/score row for debugging and UI.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TestResultItem {
    pub id: String,
    pub name: String,
    pub count: i64,
    pub capacity: i64,
    pub score: i64,
    #[serde(default)]
    pub capacity_details: std::collections::HashMap<String, i64>,
    #[serde(default)]
    pub score_details: String,
}
