//! Application layer: solver, mechanisms, agents and the Monte Carlo sweep

pub mod agents;
pub mod mechanism;
pub mod simulation;
pub mod solver;
