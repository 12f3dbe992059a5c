//! Contract menu: one offer per declared agent type
//!
//! Produced once per optimization call and then shared read-only by every
//! agent evaluating it. Entries keep the type distribution's declaration order.

use crate::{Contract, TypeDistribution, UtilityModel};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContractMenu {
    entries: Vec<(String, Contract)>,
}

/// Worst-case IR/IC slack of a menu against a type distribution
#[derive(Debug, Clone, PartialEq)]
pub struct MenuAudit {
    /// min over types of `u_i(c_i)`
    pub min_ir_slack: f64,
    /// Type attaining `min_ir_slack`
    pub worst_ir: String,
    /// min over pairs of `u_i(c_i) - u_i(c_j)`; `+inf` for a single type
    pub min_ic_slack: f64,
    /// `(i, j)` pair attaining `min_ic_slack`
    pub worst_ic: Option<(String, String)>,
}

impl MenuAudit {
    /// Both IR and IC hold up to `tolerance`
    pub fn holds(&self, tolerance: f64) -> bool {
        self.min_ir_slack >= -tolerance && self.min_ic_slack >= -tolerance
    }
}

impl ContractMenu {
    pub fn from_entries(entries: Vec<(String, Contract)>) -> Self {
        Self { entries }
    }

    /// Pair contracts with type names in distribution order
    ///
    /// Returns `None` when the number of contracts does not match the number
    /// of declared types.
    pub fn for_distribution(dist: &TypeDistribution, contracts: Vec<Contract>) -> Option<Self> {
        if contracts.len() != dist.len() {
            return None;
        }
        let entries = dist
            .iter()
            .zip(contracts)
            .map(|(t, c)| (t.name.clone(), c))
            .collect();
        Some(Self { entries })
    }

    pub fn get(&self, type_name: &str) -> Option<&Contract> {
        self.entries
            .iter()
            .find(|(name, _)| name == type_name)
            .map(|(_, c)| c)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Contract)> {
        self.entries.iter().map(|(name, c)| (name.as_str(), c))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// `u_i(c_i)` for the type called `type_name`
    pub fn ir_slack(
        &self,
        model: &UtilityModel,
        dist: &TypeDistribution,
        type_name: &str,
    ) -> Option<f64> {
        let theta = dist.get(type_name)?.theta;
        let own = self.get(type_name)?;
        Some(model.agent_utility(own, theta))
    }

    /// `u_i(c_i) - u_i(c_j)`: how much type `i` prefers its own contract to `j`'s
    pub fn ic_slack(
        &self,
        model: &UtilityModel,
        dist: &TypeDistribution,
        type_i: &str,
        type_j: &str,
    ) -> Option<f64> {
        let theta = dist.get(type_i)?.theta;
        let own = self.get(type_i)?;
        let other = self.get(type_j)?;
        Some(model.agent_utility(own, theta) - model.agent_utility(other, theta))
    }

    /// Evaluate every IR and IC constraint; `None` if a type has no entry
    pub fn audit(&self, model: &UtilityModel, dist: &TypeDistribution) -> Option<MenuAudit> {
        let mut audit = MenuAudit {
            min_ir_slack: f64::INFINITY,
            worst_ir: String::new(),
            min_ic_slack: f64::INFINITY,
            worst_ic: None,
        };

        for own in dist.iter() {
            let ir = self.ir_slack(model, dist, &own.name)?;
            if ir < audit.min_ir_slack {
                audit.min_ir_slack = ir;
                audit.worst_ir = own.name.clone();
            }
            for other in dist.iter().filter(|t| t.name != own.name) {
                let ic = self.ic_slack(model, dist, &own.name, &other.name)?;
                if ic < audit.min_ic_slack {
                    audit.min_ic_slack = ic;
                    audit.worst_ic = Some((own.name.clone(), other.name.clone()));
                }
            }
        }

        Some(audit)
    }
}

impl fmt::Display for ContractMenu {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (name, contract)) in self.entries.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}: {}", name, contract)?;
        }
        write!(f, "}}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::AgentType;

    fn reference() -> TypeDistribution {
        TypeDistribution::two_type(
            AgentType::new("low", 0.5, 0.5),
            AgentType::new("high", 1.0, 0.5),
        )
        .unwrap()
    }

    #[test]
    fn test_for_distribution_keeps_order() {
        let dist = reference();
        let menu = ContractMenu::for_distribution(
            &dist,
            vec![Contract::from_mhz(1.0, 0.1), Contract::from_mhz(9.0, 2.0)],
        )
        .unwrap();
        let names: Vec<&str> = menu.iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["low", "high"]);
        assert_eq!(menu.get("high").unwrap().resource_mhz(), 9.0);
    }

    #[test]
    fn test_size_mismatch() {
        let dist = reference();
        assert!(ContractMenu::for_distribution(&dist, vec![Contract::NULL]).is_none());
    }

    #[test]
    fn test_audit_detects_ic_violation() {
        let dist = reference();
        let model = UtilityModel::default();
        // Same resource, high type charged more: high prefers low's contract
        let menu = ContractMenu::for_distribution(
            &dist,
            vec![Contract::from_mhz(5.0, 0.1), Contract::from_mhz(5.0, 0.5)],
        )
        .unwrap();

        let audit = menu.audit(&model, &dist).unwrap();
        assert!(audit.min_ic_slack < 0.0);
        assert_eq!(
            audit.worst_ic,
            Some(("high".to_string(), "low".to_string()))
        );
        assert!(!audit.holds(1e-6));
    }

    #[test]
    fn test_audit_passes_separating_menu() {
        let dist = reference();
        let model = UtilityModel::default();
        let low = Contract::from_mhz(2.0, 0.5 * 3f64.ln());
        let high_payment = low.payment() + 1.0 * (10f64.ln() - 3f64.ln()) - 0.01;
        let menu = ContractMenu::for_distribution(
            &dist,
            vec![low, Contract::from_mhz(9.0, high_payment)],
        )
        .unwrap();

        let audit = menu.audit(&model, &dist).unwrap();
        assert!(audit.holds(1e-6), "{:?}", audit);
    }
}
