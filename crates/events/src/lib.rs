//! Event system for DevCrew
//!
//! Run, step and project-state events are published on a broadcast bus so the
//! HTTP layer (and anything else) can follow an orchestration as it happens.

mod bus;
mod types;

pub use bus::EventBus;
pub use types::*;
