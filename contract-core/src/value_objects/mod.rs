mod agent_type;
mod contract;

pub use agent_type::{AgentType, PROBABILITY_TOLERANCE, TypeDistribution};
pub use contract::{Contract, HZ_PER_MHZ};
