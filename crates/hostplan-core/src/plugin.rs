//! Selection-phase callbacks.
//!
//! A predicate that needs to influence scoring or record what was actually
//! allocated registers itself as a `SelectPlugin` during `pre_execute`.
//! `on_priority_end` runs per candidate after all priority map/reduce work
//! has joined; `on_select_end` runs per selected candidate with the final
//! assigned count — filtering proves feasibility, this hook records the
//! concrete binding (disk → storage, nic → network).

use crate::candidate::Candidater;
use crate::unit::Unit;

pub trait SelectPlugin: Send + Sync {
    fn name(&self) -> &str;

    fn on_priority_end(&self, unit: &Unit, candidate: &dyn Candidater) {
        let _ = (unit, candidate);
    }

    fn on_select_end(&self, unit: &Unit, candidate: &dyn Candidater, count: i64) {
        let _ = (unit, candidate, count);
    }
}
