//! Screening-contract simulator for satellite spectrum sharing
//!
//! A satellite operator (the Principal) grants bandwidth to terrestrial
//! operators (Agents) whose efficiency is private. This crate designs the
//! Principal's optimal contract menu under IR/IC, lets agents self-select
//! from it, and compares the outcome against a fully informed centralized
//! allocation and a naive equal split.
//!
//! # Layers
//!
//! - **domain**: mechanism labels and result records
//! - **application**: constrained solver, mechanisms, agents, Monte Carlo sweep
//! - **infrastructure**: JSON configuration, report writer, channel diagnostics

pub mod application;
pub mod domain;
pub mod infrastructure;

// Re-export key types at crate root
pub use application::agents::{
    AgentRealization, Decision, DecisionTrace, PopulationSampler, SelectionConfig,
    SelectionEngine, SelectionState, TraceStep,
};
pub use application::mechanism::{
    AllocationScheme, CentralizedAllocation, CentralizedOptimizer, DesignerConfig,
    EqualAllocation, MechanismDesigner, MechanismError, closed_form_two_type,
};
pub use application::simulation::{MonteCarloConfig, MonteCarloRunner, RunSummary, SweepResults};
pub use application::solver::{NonlinearProgram, NonlinearSolver, SolverError, SqpConfig, SqpSolver};
pub use domain::{MechanismKind, ScenarioRecord};
pub use infrastructure::{Report, ReportError, ScenarioConfig};
