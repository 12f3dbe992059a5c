//! Allocation Mechanisms
//!
//! The three regimes compared by the simulation, all under the same utility model:
//!
//! - **designer**: optimal screening menu under IR/IC (asymmetric information)
//! - **centralized**: social-welfare maximizer that knows every type (upper bound)
//! - **equal**: split the pool evenly, no optimization (lower bound)
//!
//! [`AllocationScheme`] turns each into something the Monte Carlo runner can
//! evaluate over a sampled population.

mod centralized;
mod designer;
mod equal;
mod scheme;

pub use centralized::{CentralizedAllocation, CentralizedOptimizer};
pub use designer::{DesignerConfig, MechanismDesigner, closed_form_two_type};
pub use equal::EqualAllocation;
pub use scheme::{AllocationScheme, CentralizedScheme, ContractScheme, EqualSplitScheme};

use crate::application::solver::SolverError;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum MechanismError {
    #[error("{mechanism} optimization did not converge: {source}")]
    NotConverged {
        mechanism: &'static str,
        source: SolverError,
    },

    #[error("Optimized menu violates {constraint} by {slack:.3e}")]
    ConstraintViolation { constraint: String, slack: f64 },
}
