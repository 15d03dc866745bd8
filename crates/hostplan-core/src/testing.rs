//! Test doubles for exercising the engine without a cloud inventory.
//!
//! Used by this workspace's own tests and handy for callers writing
//! predicate/priority tests against a fake host pool.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use crate::candidate::{Candidater, NumaNodeFact};

/// An in-memory candidate with canned facts.
#[derive(Debug, Clone, Default)]
pub struct StubCandidate {
    id: String,
    name: String,
    facts: HashMap<String, Value>,
    group_free: HashMap<String, i64>,
    wires: Vec<String>,
    numa: Vec<NumaNodeFact>,
}

impl StubCandidate {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            name: id.to_string(),
            ..Self::default()
        }
    }

    pub fn named(id: &str, name: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            ..Self::default()
        }
    }

    pub fn with_fact(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.facts.insert(key.to_string(), value.into());
        self
    }

    /// Pretend this host already carries members of `group_id`, leaving
    /// `free` slots.
    pub fn with_group_free(mut self, group_id: &str, free: i64) -> Self {
        self.group_free.insert(group_id.to_string(), free);
        self
    }

    pub fn with_wires(mut self, wires: &[&str]) -> Self {
        self.wires = wires.iter().map(|w| w.to_string()).collect();
        self
    }

    pub fn with_numa(mut self, numa: Vec<NumaNodeFact>) -> Self {
        self.numa = numa;
        self
    }

    pub fn shared(self) -> Arc<dyn Candidater> {
        Arc::new(self)
    }
}

impl Candidater for StubCandidate {
    fn index_key(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn get(&self, key: &str) -> Option<Value> {
        self.facts.get(key).cloned()
    }

    fn free_group_count(&self, group_id: &str) -> Option<i64> {
        self.group_free.get(group_id).copied()
    }

    fn wire_ids(&self) -> Vec<String> {
        self.wires.clone()
    }

    fn numa_nodes(&self) -> Vec<NumaNodeFact> {
        self.numa.clone()
    }
}
