//! Monte Carlo sweep over the reference scenario

use approx::assert_abs_diff_eq;
use contract_core::{AgentType, TypeDistribution, UtilityModel};
use contract_sim::infrastructure::ScenarioConfig;
use contract_sim::{
    DesignerConfig, MechanismDesigner, MechanismKind, MonteCarloConfig, MonteCarloRunner, Report,
    SelectionConfig, SweepResults,
};

const SEED: u64 = 42;

fn reference_types() -> TypeDistribution {
    TypeDistribution::two_type(AgentType::new("low", 0.5, 0.5), AgentType::new("high", 1.0, 0.5))
        .unwrap()
}

fn sweep(types: &TypeDistribution, config: MonteCarloConfig, designer: DesignerConfig) -> SweepResults {
    MonteCarloRunner::with_mechanisms(
        config,
        types,
        UtilityModel::default(),
        &MechanismDesigner::new(designer),
        SelectionConfig::default(),
    )
    .run()
    .unwrap()
}

fn config(sizes: Vec<usize>, repetitions: usize) -> MonteCarloConfig {
    MonteCarloConfig::default()
        .with_population_sizes(sizes)
        .with_repetitions(repetitions)
        .with_seed(Some(SEED))
}

#[test]
fn test_empty_population_is_zero_for_all() {
    let types = reference_types();
    let results = sweep(&types, config(vec![0], 2), DesignerConfig::default());
    for kind in MechanismKind::ALL {
        let record = results.record(kind, 0).expect("every mechanism reported");
        assert_eq!(record.principal_utility, 0.0);
        assert_eq!(record.agents_utility, 0.0);
        assert_eq!(record.social_welfare, 0.0);
    }
}

#[test]
fn test_centralized_is_upper_bound() {
    let types = reference_types();
    let results = sweep(&types, config(vec![1, 5, 20, 50], 20), DesignerConfig::default());
    for n in [1, 5, 20, 50] {
        let centralized = results.record(MechanismKind::Centralized, n).unwrap().social_welfare;
        for kind in [MechanismKind::ContractTheory, MechanismKind::EqualAllocation] {
            let sw = results.record(kind, n).unwrap().social_welfare;
            assert!(sw <= centralized + 1e-6, "{} at N={}: {} > {}", kind, n, sw, centralized);
        }
    }
}

#[test]
fn test_welfare_is_sum_of_utilities() {
    let types = reference_types();
    let results = sweep(&types, config(vec![10], 5), DesignerConfig::default());
    for record in &results.records {
        assert_eq!(record.social_welfare, record.principal_utility + record.agents_utility);
    }
}

#[test]
fn test_same_seed_same_results() {
    let types = reference_types();
    let a = sweep(&types, config(vec![10, 30], 10), DesignerConfig::default());
    let b = sweep(&types, config(vec![10, 30], 10), DesignerConfig::default());
    assert_eq!(a.records, b.records);

    let other = sweep(
        &types,
        config(vec![10, 30], 10).with_seed(Some(SEED + 1)),
        DesignerConfig::default(),
    );
    assert_ne!(a.records, other.records);
}

#[test]
fn test_contract_principal_matches_expectation() {
    let types = reference_types();
    let n = 200;
    let results = sweep(&types, config(vec![n], 50), DesignerConfig::default());
    let record = results.record(MechanismKind::ContractTheory, n).unwrap();

    // Only the high type buys: P = ln 10 (less the margin), cost(9) = 0.09 + 0.405
    let per_high = 10f64.ln() - 0.495;
    assert_abs_diff_eq!(record.principal_utility / n as f64, 0.5 * per_high, epsilon = 0.05);
    // Low type is left at zero, high type pays away its whole surplus
    assert_abs_diff_eq!(record.agents_utility, 0.0, epsilon = 1e-3);
}

#[test]
fn test_failed_designer_is_skipped() {
    let types = reference_types();
    let designer = DesignerConfig {
        max_iterations: 1,
        ..Default::default()
    };
    let results = sweep(&types, config(vec![10], 3), designer);

    assert!(results.skipped.contains(&MechanismKind::ContractTheory));
    assert!(results.record(MechanismKind::ContractTheory, 10).is_none());
    assert!(results.record(MechanismKind::EqualAllocation, 10).is_some());
}

#[test]
fn test_report_efficiency_loss() {
    let types = reference_types();
    let results = sweep(&types, config(vec![10, 40], 10), DesignerConfig::default());
    let report = Report::new("reference", &results);

    for n in [10, 40] {
        let centralized = report.row(MechanismKind::Centralized, n).unwrap();
        assert_abs_diff_eq!(centralized.efficiency_loss.unwrap(), 0.0, epsilon = 1e-12);
        let contract = report.row(MechanismKind::ContractTheory, n).unwrap();
        let loss = contract.efficiency_loss.unwrap();
        assert!((-1e-9..=1.0).contains(&loss), "loss {}", loss);
    }
}

#[test]
fn test_default_scenario_config_drives_sweep() {
    let scenario = ScenarioConfig::default()
        .with_population_sizes(vec![5])
        .with_repetitions(2);
    scenario.validate().unwrap();
    let types = scenario.type_distribution().unwrap();
    let results = MonteCarloRunner::with_mechanisms(
        scenario.monte_carlo(),
        &types,
        scenario.utility_model(),
        &MechanismDesigner::new(scenario.designer.optimizer.clone()),
        scenario.selection.clone(),
    )
    .run()
    .unwrap();
    assert_eq!(results.scenarios(), MechanismKind::ALL.to_vec());
}
