//! Equal Allocation
//!
//! Split the whole pool evenly between the agents present. Deterministic,
//! type-blind, no payments.

use contract_core::Contract;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EqualAllocation {
    total_resource_hz: f64,
}

impl EqualAllocation {
    pub fn new(total_resource_hz: f64) -> Self {
        Self { total_resource_hz }
    }

    /// Hz per agent; zero for an empty population
    pub fn per_agent(&self, num_agents: usize) -> f64 {
        if num_agents == 0 {
            return 0.0;
        }
        self.total_resource_hz / num_agents as f64
    }

    pub fn grant(&self, num_agents: usize) -> Contract {
        Contract::grant(self.per_agent(num_agents))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split() {
        let equal = EqualAllocation::new(100e6);
        assert_eq!(equal.per_agent(4), 25e6);
        assert_eq!(equal.grant(10).resource_mhz(), 10.0);
        assert_eq!(equal.grant(10).payment(), 0.0);
    }

    #[test]
    fn test_empty_population() {
        let equal = EqualAllocation::new(100e6);
        assert_eq!(equal.per_agent(0), 0.0);
        assert_eq!(equal.grant(0), Contract::NULL);
    }
}
