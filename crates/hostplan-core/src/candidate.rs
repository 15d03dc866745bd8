//! The candidate contract.
//!
//! A candidate is a placement target (host or baremetal node) supplied by
//! the caller for the lifetime of one schedule call. The engine only reads
//! facts from it; all mutable state lives in the `Unit`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Which view of a resource fact to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FactKind {
    /// Currently free amount.
    Free,
    /// Physical total, ignoring consumption.
    Raw,
    /// Amount set aside for reserved-resource requests.
    Reserved,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateType {
    Host,
    Baremetal,
}

/// Free CPU/memory on one NUMA node of a candidate.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NumaNodeFact {
    pub node_id: u32,
    /// Host CPU ids still available for pinning.
    pub free_cpus: Vec<u32>,
    pub free_memory_mb: i64,
}

/// A pluggable per-host resource view.
///
/// `index_key` must be stable and unique across the candidate set; it keys
/// every capacity, score, and failure record of the pass.
pub trait Candidater: Send + Sync {
    fn index_key(&self) -> &str;

    fn name(&self) -> &str;

    fn candidate_type(&self) -> CandidateType {
        CandidateType::Host
    }

    /// Read a resource fact by key.
    fn get(&self, key: &str) -> Option<Value>;

    /// Read a resource fact in a specific view; defaults to `get`.
    fn xget(&self, key: &str, kind: FactKind) -> Option<Value> {
        let _ = kind;
        self.get(key)
    }

    /// Remaining room for members of `group_id` on this host, or `None`
    /// when the host carries no member of that group yet.
    fn free_group_count(&self, group_id: &str) -> Option<i64> {
        let _ = group_id;
        None
    }

    /// Network wires this host can reach.
    fn wire_ids(&self) -> Vec<String> {
        Vec::new()
    }

    /// NUMA topology for CPU/memory pinning; empty when not exposed.
    fn numa_nodes(&self) -> Vec<NumaNodeFact> {
        Vec::new()
    }
}
