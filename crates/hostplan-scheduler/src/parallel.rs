//! Bounded fan-out over candidate indices.
//!
//! Both heavy stages (predicate filtering, priority mapping) fan out over
//! the candidate list on a dedicated rayon pool and join before the next
//! stage starts. Per-item closures must not assume any ordering relative
//! to other items; results come back in input order regardless.

use rayon::ThreadPool;
use rayon::prelude::*;

use hostplan_core::{SchedError, SchedResult};

/// Build a pool of `threads` workers (minimum 1).
pub fn build_pool(threads: usize) -> SchedResult<ThreadPool> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads.max(1))
        .build()
        .map_err(|e| SchedError::Internal(anyhow::anyhow!(e)))
}

/// Run `f` over every item on `pool`, returning results in input order.
pub fn parallelize<T, R, F>(pool: &ThreadPool, items: &[T], f: F) -> Vec<R>
where
    T: Sync,
    R: Send,
    F: Fn(usize, &T) -> R + Send + Sync,
{
    pool.install(|| {
        items
            .par_iter()
            .enumerate()
            .map(|(index, item)| f(index, item))
            .collect()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn results_come_back_in_input_order() {
        let pool = build_pool(4).unwrap();
        let items: Vec<usize> = (0..64).collect();

        let doubled = parallelize(&pool, &items, |_, &n| n * 2);
        let expected: Vec<usize> = (0..64).map(|n| n * 2).collect();
        assert_eq!(doubled, expected);
    }

    #[test]
    fn every_item_is_visited_once() {
        let pool = build_pool(3).unwrap();
        let items: Vec<usize> = (0..100).collect();
        let visits = AtomicUsize::new(0);

        parallelize(&pool, &items, |_, _| {
            visits.fetch_add(1, Ordering::Relaxed);
        });
        assert_eq!(visits.load(Ordering::Relaxed), 100);
    }

    #[test]
    fn single_worker_degrades_to_sequential() {
        let pool = build_pool(1).unwrap();
        let items = vec!["a", "b", "c"];

        let upper = parallelize(&pool, &items, |_, s| s.to_uppercase());
        assert_eq!(upper, vec!["A", "B", "C"]);
    }

    #[test]
    fn zero_threads_clamps_to_one() {
        assert!(build_pool(0).is_ok());
    }
}
