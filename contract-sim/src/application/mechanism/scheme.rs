//! Allocation schemes
//!
//! A scheme turns a realized population into aggregate utilities. The three
//! regimes differ only in how a contract reaches each agent:
//!
//! - **Contract**: agents self-select from the menu and may opt out
//! - **Centralized**: the welfare-optimal grant for the agent's true type
//! - **Equal split**: the same share of the pool for everyone, no payment

use super::{CentralizedAllocation, EqualAllocation};
use crate::application::agents::{AgentRealization, DecisionTrace, SelectionEngine};
use crate::domain::MechanismKind;
use contract_core::{Contract, ContractMenu, SimulationResult, UtilityModel};

pub trait AllocationScheme: Send + Sync {
    fn kind(&self) -> MechanismKind;

    /// Aggregate utilities over `population`; an empty population yields zeros
    fn evaluate(&self, population: &[AgentRealization<'_>]) -> SimulationResult;

    /// Step-by-step account of one agent's decision, for schemes where agents choose
    fn trace(&self, _agent: &AgentRealization<'_>) -> Option<DecisionTrace> {
        None
    }

    /// The menu offered to agents, if this scheme has one
    fn menu(&self) -> Option<&ContractMenu> {
        None
    }
}

pub struct ContractScheme {
    menu: ContractMenu,
    engine: SelectionEngine,
}

impl ContractScheme {
    pub fn new(menu: ContractMenu, engine: SelectionEngine) -> Self {
        Self { menu, engine }
    }

    pub fn engine(&self) -> &SelectionEngine {
        &self.engine
    }
}

impl AllocationScheme for ContractScheme {
    fn kind(&self) -> MechanismKind {
        MechanismKind::ContractTheory
    }

    fn evaluate(&self, population: &[AgentRealization<'_>]) -> SimulationResult {
        let model = self.engine.model();
        let mut result = SimulationResult::ZERO;
        for agent in population {
            let decision = self.engine.select(&self.menu, agent.theta());
            // Opting out contributes nothing to either side
            if let Some((_, contract)) = decision.chosen {
                result.record(model.principal_utility(contract, agent.theta()), decision.utility);
            }
        }
        result
    }

    fn trace(&self, agent: &AgentRealization<'_>) -> Option<DecisionTrace> {
        Some(self.engine.select_traced(&self.menu, agent).1)
    }

    fn menu(&self) -> Option<&ContractMenu> {
        Some(&self.menu)
    }
}

pub struct CentralizedScheme {
    allocation: CentralizedAllocation,
    model: UtilityModel,
}

impl CentralizedScheme {
    pub fn new(allocation: CentralizedAllocation, model: UtilityModel) -> Self {
        Self { allocation, model }
    }

    pub fn allocation(&self) -> &CentralizedAllocation {
        &self.allocation
    }
}

impl AllocationScheme for CentralizedScheme {
    fn kind(&self) -> MechanismKind {
        MechanismKind::Centralized
    }

    fn evaluate(&self, population: &[AgentRealization<'_>]) -> SimulationResult {
        let mut result = SimulationResult::ZERO;
        for agent in population {
            let grant = self
                .allocation
                .grant_for(&agent.true_type.name)
                .copied()
                .unwrap_or(Contract::NULL);
            let theta = agent.theta();
            result.record(
                self.model.principal_utility(&grant, theta),
                self.model.agent_utility(&grant, theta),
            );
        }
        result
    }
}

pub struct EqualSplitScheme {
    allocation: EqualAllocation,
    model: UtilityModel,
}

impl EqualSplitScheme {
    pub fn new(allocation: EqualAllocation, model: UtilityModel) -> Self {
        Self { allocation, model }
    }
}

impl AllocationScheme for EqualSplitScheme {
    fn kind(&self) -> MechanismKind {
        MechanismKind::EqualAllocation
    }

    fn evaluate(&self, population: &[AgentRealization<'_>]) -> SimulationResult {
        if population.is_empty() {
            return SimulationResult::ZERO;
        }
        let grant = self.allocation.grant(population.len());
        let mut result = SimulationResult::ZERO;
        for agent in population {
            let theta = agent.theta();
            result.record(
                self.model.principal_utility(&grant, theta),
                self.model.agent_utility(&grant, theta),
            );
        }
        result
    }
}
