//! Background-side session ownership: which tab is being detected, start/stop
//! orchestration and event relay.

pub mod controller;
pub mod state;

pub use controller::{Coordinator, CoordinatorConfig};
pub use state::{SessionState, StartDecision, StopDecision};
