//! Per-candidate score bookkeeping.
//!
//! Scores are named components summed lazily. A candidate never touched by
//! any priority sits at [`BASE_SCORE`]; components shift it up or down.

use std::collections::HashMap;

/// Score of a candidate no priority has touched.
pub const BASE_SCORE: i64 = 10000;

/// Named score components for one candidate, with a cached sum.
#[derive(Debug, Default)]
pub struct ScoreBoard {
    values: HashMap<String, i64>,
    sum: Option<i64>,
}

impl ScoreBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite the component `name`.
    pub fn set(&mut self, name: &str, value: i64) {
        self.values.insert(name.to_string(), value);
        self.sum = None;
    }

    /// Add `delta` to the component `name` (created at 0 if absent).
    pub fn increase(&mut self, name: &str, delta: i64) {
        *self.values.entry(name.to_string()).or_insert(0) += delta;
        self.sum = None;
    }

    /// Total score: component sum plus the base.
    pub fn total(&mut self) -> i64 {
        let sum = match self.sum {
            Some(sum) => sum,
            None => {
                let sum = self.values.values().sum();
                self.sum = Some(sum);
                sum
            }
        };
        sum + BASE_SCORE
    }

    /// Render components for detail output, sorted by name.
    pub fn details(&self) -> String {
        let mut parts: Vec<(&String, &i64)> = self.values.iter().collect();
        parts.sort_by_key(|(name, _)| name.as_str());
        parts
            .into_iter()
            .map(|(name, value)| format!("{name}:{value}"))
            .collect::<Vec<_>>()
            .join(", ")
    }
}
