//! Cross-predicate shared-resource accounting.
//!
//! When two predicates independently consume the same sub-resource within
//! one scheduling pass (a tenant-default predicate and an explicit-network
//! predicate both drawing from "free ports on network X"), each must see
//! the other's consumption. Recomputing availability independently would
//! double-count and oversell. All such resources go through this ledger.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::counter::Counter;

struct SharedResource {
    total: i64,
    reserved: i64,
}

/// Reservation ledger keyed by resource id (e.g. `"net:<id>:ports"`).
pub struct SharedResourceManager {
    resources: Mutex<HashMap<String, SharedResource>>,
}

impl SharedResourceManager {
    pub fn new() -> Self {
        Self {
            resources: Mutex::new(HashMap::new()),
        }
    }

    /// Register the total for `key`; the first registration wins, so every
    /// predicate observing the same fact registers the same baseline.
    pub fn register(&self, key: &str, total: i64) {
        let mut resources = self.resources.lock().unwrap();
        resources
            .entry(key.to_string())
            .or_insert(SharedResource { total, reserved: 0 });
    }

    /// Reserve `n` units of `key`. Returns false if the resource is
    /// unknown or the remainder would go negative; nothing is consumed
    /// on refusal.
    pub fn reserve(&self, key: &str, n: i64) -> bool {
        let mut resources = self.resources.lock().unwrap();
        match resources.get_mut(key) {
            Some(res) if res.total - res.reserved >= n => {
                res.reserved += n;
                true
            }
            _ => false,
        }
    }

    /// Remaining units of `key`, after all reservations so far.
    pub fn free(&self, key: &str) -> Option<i64> {
        let resources = self.resources.lock().unwrap();
        resources.get(key).map(|res| res.total - res.reserved)
    }

    /// A counter view of `key`, for feeding into `Unit::set_capacity`.
    pub fn counter(self: &Arc<Self>, key: &str) -> SharedResourceCounter {
        SharedResourceCounter {
            manager: Arc::clone(self),
            key: key.to_string(),
        }
    }
}

impl Default for SharedResourceManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Live view of a shared resource's remaining count.
pub struct SharedResourceCounter {
    manager: Arc<SharedResourceManager>,
    key: String,
}

impl Counter for SharedResourceCounter {
    fn count(&self) -> i64 {
        self.manager.free(&self.key).unwrap_or(0)
    }
}
