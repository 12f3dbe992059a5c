//! Agent Selection Engine
//!
//! An agent sees the whole menu, not just the contract designed for its type,
//! and keeps the best one it finds. Starting point is the outside option with
//! utility zero. A contract replaces the current best only if it beats it by
//! more than `tolerance`, or if it is positive while nothing has been chosen
//! yet. Exact ties keep the first contract seen.
//!
//! Because the agent checks every entry, a run of the engine doubles as an
//! IC compliance check of the optimizer's menu.

use super::AgentRealization;
use contract_core::{Contract, ContractMenu, UtilityModel};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionConfig {
    /// Improvement needed to switch contracts
    pub tolerance: f64,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self { tolerance: 1e-9 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionState {
    Evaluating,
    Decided,
}

/// Outcome of a selection; `chosen == None` means the agent opted out
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Decision<'m> {
    pub chosen: Option<(&'m str, &'m Contract)>,
    /// Utility of the chosen contract, zero when opting out
    pub utility: f64,
}

impl Decision<'_> {
    pub fn chosen_type(&self) -> Option<&str> {
        self.chosen.map(|(name, _)| name)
    }
}

/// One menu comparison
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceStep {
    pub type_name: String,
    pub utility: f64,
    pub best_before: f64,
    pub accepted: bool,
}

/// Recorded comparisons of a single agent, produced only on request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTrace {
    pub agent_id: usize,
    pub true_type: String,
    pub steps: Vec<TraceStep>,
    pub chosen: Option<String>,
    pub utility: f64,
}

/// Per-agent evaluation: `Evaluating` until every entry is seen, then `Decided`
struct Evaluation<'m> {
    state: SelectionState,
    best_utility: f64,
    chosen: Option<(&'m str, &'m Contract)>,
    steps: Option<Vec<TraceStep>>,
}

impl<'m> Evaluation<'m> {
    fn new(record: bool) -> Self {
        Self {
            state: SelectionState::Evaluating,
            best_utility: 0.0,
            chosen: None,
            steps: record.then(Vec::new),
        }
    }

    fn consider(&mut self, name: &'m str, contract: &'m Contract, utility: f64, tolerance: f64) {
        debug_assert_eq!(self.state, SelectionState::Evaluating);
        let accepted = utility > self.best_utility + tolerance
            || (self.chosen.is_none() && utility > 0.0);

        if let Some(steps) = self.steps.as_mut() {
            steps.push(TraceStep {
                type_name: name.to_string(),
                utility,
                best_before: self.best_utility,
                accepted,
            });
        }

        if accepted {
            self.best_utility = utility;
            self.chosen = Some((name, contract));
        }
    }

    fn finish(mut self) -> (Decision<'m>, Option<Vec<TraceStep>>) {
        self.state = SelectionState::Decided;
        let decision = Decision {
            chosen: self.chosen,
            utility: self.best_utility,
        };
        (decision, self.steps)
    }
}

/// Stateless selector; every call runs its own [`SelectionState`] machine
#[derive(Debug, Clone)]
pub struct SelectionEngine {
    model: UtilityModel,
    config: SelectionConfig,
}

impl SelectionEngine {
    pub fn new(model: UtilityModel, config: SelectionConfig) -> Self {
        Self { model, config }
    }

    pub fn model(&self) -> &UtilityModel {
        &self.model
    }

    fn run<'m>(&self, menu: &'m ContractMenu, theta: f64, record: bool) -> (Decision<'m>, Option<Vec<TraceStep>>) {
        let mut evaluation = Evaluation::new(record);
        for (name, contract) in menu.iter() {
            let utility = self.model.agent_utility(contract, theta);
            evaluation.consider(name, contract, utility, self.config.tolerance);
        }
        evaluation.finish()
    }

    /// Best contract for an agent of efficiency `theta`
    pub fn select<'m>(&self, menu: &'m ContractMenu, theta: f64) -> Decision<'m> {
        self.run(menu, theta, false).0
    }

    /// Same as [`Self::select`], also returning every comparison made
    pub fn select_traced<'m>(
        &self,
        menu: &'m ContractMenu,
        agent: &AgentRealization<'_>,
    ) -> (Decision<'m>, DecisionTrace) {
        let (decision, steps) = self.run(menu, agent.theta(), true);
        let trace = DecisionTrace {
            agent_id: agent.id,
            true_type: agent.true_type.name.clone(),
            steps: steps.unwrap_or_default(),
            chosen: decision.chosen_type().map(str::to_string),
            utility: decision.utility,
        };
        (decision, trace)
    }
}
