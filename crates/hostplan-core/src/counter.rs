//! Capacity counters.
//!
//! A counter answers "how many more placements can this resource still
//! absorb". Counters compose: [`Counters`] sums sub-resources that pool
//! together, [`MinCounters`] takes the minimum when several sub-resources
//! must all be simultaneously available (e.g. multiple disk backends).
//! Composite results are cached and invalidated on mutation.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Sentinel for "not yet computed". Distinct from 0, which means excluded.
pub const EMPTY_CAPACITY: i64 = -1;

/// A source of remaining capacity. Implementations must be cheap and free
/// of side effects; `count` is called many times per scheduling pass.
pub trait Counter: Send + Sync {
    fn count(&self) -> i64;
}

/// A fixed capacity value.
#[derive(Debug, Clone, Copy)]
pub struct NormalCounter(i64);

impl NormalCounter {
    pub fn new(value: i64) -> Self {
        Self(value)
    }
}

impl Counter for NormalCounter {
    fn count(&self) -> i64 {
        self.0
    }
}

struct CountersInner {
    counters: Vec<Arc<dyn Counter>>,
    sum: Option<i64>,
}

/// Sum of sub-counters with a cached total.
pub struct Counters {
    inner: Mutex<CountersInner>,
}

impl Counters {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(CountersInner {
                counters: Vec::new(),
                sum: None,
            }),
        }
    }

    /// Add a sub-counter and invalidate the cached sum.
    pub fn add(&self, counter: Arc<dyn Counter>) {
        let mut inner = self.inner.lock().unwrap();
        inner.counters.push(counter);
        inner.sum = None;
    }
}

impl Default for Counters {
    fn default() -> Self {
        Self::new()
    }
}

impl Counter for Counters {
    fn count(&self) -> i64 {
        let mut inner = self.inner.lock().unwrap();
        if let Some(sum) = inner.sum {
            return sum;
        }
        let sum = inner.counters.iter().map(|c| c.count()).sum();
        inner.sum = Some(sum);
        sum
    }
}

struct MinCountersInner {
    counters: Vec<Arc<dyn Counter>>,
    min: Option<i64>,
}

/// Minimum across sub-counters with a cached result.
///
/// With zero inputs `count` returns [`EMPTY_CAPACITY`], meaning "no
/// constraint registered" — callers must not read that as zero capacity.
pub struct MinCounters {
    inner: Mutex<MinCountersInner>,
}

impl MinCounters {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(MinCountersInner {
                counters: Vec::new(),
                min: None,
            }),
        }
    }

    pub fn add(&self, counter: Arc<dyn Counter>) {
        let mut inner = self.inner.lock().unwrap();
        inner.counters.push(counter);
        inner.min = None;
    }
}

impl Default for MinCounters {
    fn default() -> Self {
        Self::new()
    }
}

impl Counter for MinCounters {
    fn count(&self) -> i64 {
        let mut inner = self.inner.lock().unwrap();
        if let Some(min) = inner.min {
            return min;
        }
        let min = inner
            .counters
            .iter()
            .map(|c| c.count())
            .min()
            .unwrap_or(EMPTY_CAPACITY);
        inner.min = Some(min);
        min
    }
}

/// Memoizes counters by an arbitrary string key (e.g. `"net:<id>"`), so
/// every predicate consulting the same contended resource within one pass
/// sees the same counter instance.
pub struct CounterManager {
    counters: Mutex<HashMap<String, Arc<dyn Counter>>>,
}

impl CounterManager {
    pub fn new() -> Self {
        Self {
            counters: Mutex::new(HashMap::new()),
        }
    }

    pub fn get(&self, key: &str) -> Option<Arc<dyn Counter>> {
        self.counters.lock().unwrap().get(key).cloned()
    }

    /// Return the counter for `key`, creating it on first use.
    pub fn get_or_create(
        &self,
        key: &str,
        make: impl FnOnce() -> Arc<dyn Counter>,
    ) -> Arc<dyn Counter> {
        let mut counters = self.counters.lock().unwrap();
        counters.entry(key.to_string()).or_insert_with(make).clone()
    }
}

impl Default for CounterManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_sum_and_cache_invalidation() {
        let counters = Counters::new();
        counters.add(Arc::new(NormalCounter::new(3)));
        counters.add(Arc::new(NormalCounter::new(4)));
        assert_eq!(counters.count(), 7);

        // Adding after a read must invalidate the cached sum.
        counters.add(Arc::new(NormalCounter::new(5)));
        assert_eq!(counters.count(), 12);
    }

    #[test]
    fn min_counters_take_the_minimum() {
        let min = MinCounters::new();
        min.add(Arc::new(NormalCounter::new(9)));
        min.add(Arc::new(NormalCounter::new(2)));
        min.add(Arc::new(NormalCounter::new(5)));
        assert_eq!(min.count(), 2);
    }

    #[test]
    fn empty_min_counters_report_unconstrained() {
        let min = MinCounters::new();
        assert_eq!(min.count(), EMPTY_CAPACITY);
    }

    #[test]
    fn min_counters_invalidate_on_add() {
        let min = MinCounters::new();
        min.add(Arc::new(NormalCounter::new(8)));
        assert_eq!(min.count(), 8);

        min.add(Arc::new(NormalCounter::new(1)));
        assert_eq!(min.count(), 1);
    }

    #[test]
    fn counter_manager_memoizes_by_key() {
        let manager = CounterManager::new();
        let first = manager.get_or_create("net:n1", || Arc::new(NormalCounter::new(10)));
        let second = manager.get_or_create("net:n1", || Arc::new(NormalCounter::new(99)));

        // Second lookup must observe the first registration.
        assert_eq!(first.count(), 10);
        assert_eq!(second.count(), 10);
        assert!(manager.get("net:n2").is_none());
    }
}
