//! Domain types of the simulation layer
//!
//! Mechanism labels and the tabular records produced by a sweep.

mod record;

pub use record::{MechanismKind, ScenarioRecord};
