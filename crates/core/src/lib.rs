//! Domain types for DevCrew.
//!
//! Everything the orchestration engine passes around lives here: the plan a
//! planner produces, the closed set of specialist workers, the shared project
//! state and the per-run execution ledger.

pub mod domain;
pub mod error;

pub use domain::*;
pub use error::{CoreError, CoreResult};
