//! hostplan-api — wire-level types of the placement scheduler.
//!
//! A scheduling request (`SchedInfo`) describes what the caller wants to
//! place: resource quantities, how many identical placements, affinity
//! groups, and mode flags (suggestion, best-effort, HA backup). The
//! outputs describe what the engine decided:
//!
//! - [`ScheduleOutput`] — one slot per requested placement, each either a
//!   concrete `CandidateResource` or an explicit error string
//! - [`ForecastResult`] — rejection reasons aggregated per filter, for
//!   "why can't I schedule this" tooling
//! - [`TestResultItem`] — raw per-candidate capacity/score detail

pub mod output;
pub mod request;

pub use output::{
    CandidateDisk, CandidateNet, CandidateResource, CandidateSlot, CpuNumaPin, ForecastFilter,
    ForecastResult, ScheduleOutput, TestResultItem,
};
pub use request::{
    DiskConfig, InstanceGroup, IsolatedDeviceConfig, NetConfig, SchedInfo,
};
