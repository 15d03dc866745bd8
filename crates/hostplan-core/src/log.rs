//! Per-candidate, per-stage scheduling log.
//!
//! Every predicate touch on every candidate leaves an entry, pass or fail,
//! so a whole pass can be replayed for diagnostics.

use std::sync::Mutex;

#[derive(Debug, Clone, PartialEq)]
pub struct LogMessage {
    /// Reason kind ("error", a predicate name, a resource name).
    pub kind: String,
    pub info: String,
}

#[derive(Debug, Clone)]
pub struct SchedLog {
    /// `"<name>:<index key>"` of the candidate.
    pub candidate: String,
    /// Filter/priority stage that produced the entry.
    pub stage: String,
    pub messages: Vec<LogMessage>,
    pub failed: bool,
}

impl SchedLog {
    pub fn new(candidate: String, stage: String, messages: Vec<LogMessage>, failed: bool) -> Self {
        Self {
            candidate,
            stage,
            messages,
            failed,
        }
    }
}

#[derive(Default)]
pub struct LogManager {
    logs: Mutex<Vec<SchedLog>>,
}

impl LogManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&self, log: SchedLog) {
        self.logs.lock().unwrap().push(log);
    }

    /// Append a batch from one candidate's evaluation in a single lock.
    pub fn appends(&self, mut logs: Vec<SchedLog>) {
        self.logs.lock().unwrap().append(&mut logs);
    }

    pub fn all(&self) -> Vec<SchedLog> {
        self.logs.lock().unwrap().clone()
    }

    /// Entries for one candidate, in evaluation order.
    pub fn for_candidate(&self, candidate: &str) -> Vec<SchedLog> {
        self.logs
            .lock()
            .unwrap()
            .iter()
            .filter(|log| log.candidate == candidate)
            .cloned()
            .collect()
    }
}
