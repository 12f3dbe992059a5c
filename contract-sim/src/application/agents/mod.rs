//! Agent Framework
//!
//! Agents carry a privately drawn type and, when offered a contract menu,
//! pick the contract that maximizes their own utility (or opt out).
//!
//! - **population**: sampling type realizations from the type distribution
//! - **selection**: the self-selection state machine and its optional trace

mod population;
mod selection;

pub use population::{AgentRealization, PopulationSampler};
pub use selection::{
    Decision, DecisionTrace, SelectionConfig, SelectionEngine, SelectionState, TraceStep,
};
