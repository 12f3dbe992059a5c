//! Contract Core - shared domain types for the screening-contract simulator
//!
//! Everything both the optimizer and the simulation need to agree on:
//!
//! - **value_objects**: `AgentType`, `TypeDistribution`, `Contract`
//! - **entities**: `ContractMenu` and aggregated `SimulationResult`
//! - **utility**: the Agent/Principal utility model
//! - **stats**: streaming summary statistics for Monte Carlo runs

pub mod entities;
pub mod error;
pub mod stats;
pub mod utility;
pub mod value_objects;

// Re-export value objects at crate root for convenience
pub use value_objects::{AgentType, Contract, HZ_PER_MHZ, PROBABILITY_TOLERANCE, TypeDistribution};

// Re-export entities at crate root
pub use entities::{ContractMenu, MenuAudit, SimulationResult};

pub use error::ConfigError;
pub use stats::SummaryStats;
pub use utility::{DEFAULT_EPSILON, UtilityModel};
