//! hostplan-placement — group-aware, HA-aware guest placement.
//!
//! Runs after the generic filter/score pipeline when a request references
//! instance groups or asks for a master/backup pair. It re-derives a
//! per-guest assignment from the unit's capacity/score bookkeeping:
//!
//! - **`group`** — per-host dispersion-group room and role counters
//! - **`wires`** — bucketing hosts by shared network reachability
//! - **`placer`** — host ranking, per-guest selection, HA pairing with
//!   rollback and wire exclusion

pub mod group;
pub mod placer;
pub mod wires;

pub use group::{HostState, Role};
pub use placer::{GuestPlacement, place_guests};
pub use wires::build_wire_hosts;
