//! Monte Carlo Runner

use crate::application::agents::{
    AgentRealization, DecisionTrace, PopulationSampler, SelectionConfig, SelectionEngine,
};
use crate::application::mechanism::{
    AllocationScheme, CentralizedOptimizer, CentralizedScheme, ContractScheme, EqualAllocation,
    EqualSplitScheme, MechanismDesigner, MechanismError,
};
use crate::domain::{MechanismKind, ScenarioRecord};
use contract_core::{
    ConfigError, ContractMenu, SimulationResult, SummaryStats, TypeDistribution, UtilityModel,
};
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Configuration for a population sweep
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonteCarloConfig {
    /// Population sizes to sweep
    pub population_sizes: Vec<usize>,
    /// Populations drawn per size
    pub repetitions: usize,
    /// Pool split by the equal-allocation baseline (Hz)
    pub total_resource_hz: f64,
    /// Base seed; entropy when `None`
    pub seed: Option<u64>,
    /// One worker thread per population size
    pub parallel: bool,
    /// Capture the first agent's selection trace for each size
    pub trace_first_agent: bool,
}

impl Default for MonteCarloConfig {
    fn default() -> Self {
        Self {
            population_sizes: (10..=100).step_by(10).collect(),
            repetitions: 100,
            total_resource_hz: 100e6,
            seed: Some(42),
            parallel: false,
            trace_first_agent: false,
        }
    }
}

impl MonteCarloConfig {
    /// Set population sizes (builder pattern)
    pub fn with_population_sizes(mut self, sizes: Vec<usize>) -> Self {
        self.population_sizes = sizes;
        self
    }

    /// Set repetitions (builder pattern)
    pub fn with_repetitions(mut self, repetitions: usize) -> Self {
        self.repetitions = repetitions;
        self
    }

    /// Set seed (builder pattern)
    pub fn with_seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }

    /// Set parallel sweep (builder pattern)
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Set trace capture (builder pattern)
    pub fn with_trace_first_agent(mut self, trace: bool) -> Self {
        self.trace_first_agent = trace;
        self
    }
}

/// Spread of social welfare across the repetitions of one `(mechanism, N)`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub scenario: MechanismKind,
    #[serde(rename = "N")]
    pub population_size: usize,
    pub repetitions: u64,
    pub mean: Option<f64>,
    pub std_dev: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl RunSummary {
    fn new(scenario: MechanismKind, population_size: usize, welfare: &SummaryStats) -> Self {
        Self {
            scenario,
            population_size,
            repetitions: welfare.len(),
            mean: welfare.mean(),
            std_dev: welfare.std_dev(),
            min: welfare.min(),
            max: welfare.max(),
        }
    }
}

/// Everything a sweep produces
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SweepResults {
    /// Averages, sorted by `(N, scenario)`
    pub records: Vec<ScenarioRecord>,
    /// Per-run spread, same order as `records`
    pub summaries: Vec<RunSummary>,
    /// Mechanisms left out because their optimizer failed
    pub skipped: Vec<MechanismKind>,
    /// `(N, trace)` of the first agent in the first repetition
    pub traces: Vec<(usize, DecisionTrace)>,
}

impl SweepResults {
    pub fn record(&self, scenario: MechanismKind, population_size: usize) -> Option<&ScenarioRecord> {
        self.records
            .iter()
            .find(|r| r.scenario == scenario && r.population_size == population_size)
    }

    pub fn summary(&self, scenario: MechanismKind, population_size: usize) -> Option<&RunSummary> {
        self.summaries
            .iter()
            .find(|s| s.scenario == scenario && s.population_size == population_size)
    }

    pub fn scenarios(&self) -> Vec<MechanismKind> {
        let mut kinds: Vec<_> = self.records.iter().map(|r| r.scenario).collect();
        kinds.sort();
        kinds.dedup();
        kinds
    }
}

/// Results for one population size
struct SizeOutcome {
    records: Vec<ScenarioRecord>,
    summaries: Vec<RunSummary>,
    trace: Option<DecisionTrace>,
}

/// Mixes `(N, rep)` into the base seed (splitmix64 finalizer)
pub fn repetition_seed(base: u64, population_size: usize, repetition: usize) -> u64 {
    let key = ((population_size as u64) << 32) ^ repetition as u64;
    let mut z = base ^ key.wrapping_add(1).wrapping_mul(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// Runs the population sweep over a set of allocation schemes
pub struct MonteCarloRunner<'a> {
    config: MonteCarloConfig,
    types: &'a TypeDistribution,
    schemes: Vec<Box<dyn AllocationScheme>>,
    skipped: Vec<MechanismKind>,
}

impl<'a> MonteCarloRunner<'a> {
    /// Create a runner with no schemes
    pub fn new(config: MonteCarloConfig, types: &'a TypeDistribution) -> Self {
        Self {
            config,
            types,
            schemes: Vec::new(),
            skipped: Vec::new(),
        }
    }

    /// Solve the menu and the centralized allocation once and register all
    /// three mechanisms. Optimizer failures are logged and skipped.
    pub fn with_mechanisms(
        config: MonteCarloConfig,
        types: &'a TypeDistribution,
        model: UtilityModel,
        designer: &MechanismDesigner,
        selection: SelectionConfig,
    ) -> Self {
        let total_resource_hz = config.total_resource_hz;
        let mut runner = Self::new(config, types);

        match designer.design(types, &model) {
            Ok(menu) => {
                info!(menu = %menu, "Contract menu ready");
                let engine = SelectionEngine::new(model, selection);
                runner.add_scheme(Box::new(ContractScheme::new(menu, engine)));
            }
            Err(e) => runner.skip(MechanismKind::ContractTheory, &e),
        }

        match CentralizedOptimizer::new(designer.config()).solve(types, &model) {
            Ok(allocation) => {
                info!(grants = %allocation.grants(), "Centralized allocation ready");
                runner.add_scheme(Box::new(CentralizedScheme::new(allocation, model)));
            }
            Err(e) => runner.skip(MechanismKind::Centralized, &e),
        }

        runner.add_scheme(Box::new(EqualSplitScheme::new(
            EqualAllocation::new(total_resource_hz),
            model,
        )));
        runner
    }

    /// Add a scheme to the sweep
    pub fn add_scheme(&mut self, scheme: Box<dyn AllocationScheme>) {
        self.schemes.push(scheme);
    }

    /// Record a mechanism that could not be built
    pub fn skip(&mut self, kind: MechanismKind, reason: &MechanismError) {
        warn!(mechanism = %kind, error = %reason, "Skipping mechanism");
        self.skipped.push(kind);
    }

    pub fn config(&self) -> &MonteCarloConfig {
        &self.config
    }

    /// Menu of the contract scheme, when it was solved
    pub fn contract_menu(&self) -> Option<&ContractMenu> {
        self.schemes.iter().find_map(|s| s.menu())
    }

    /// Run the sweep
    pub fn run(&self) -> Result<SweepResults, ConfigError> {
        if self.config.repetitions == 0 {
            return Err(ConfigError::InvalidSetting(
                "repetitions must be at least 1".to_string(),
            ));
        }
        let sampler = PopulationSampler::new(self.types)?;
        let base_seed = self.config.seed.unwrap_or_else(rand::random);

        info!(
            sizes = ?self.config.population_sizes,
            repetitions = self.config.repetitions,
            mechanisms = self.schemes.len(),
            parallel = self.config.parallel,
            "Starting Monte Carlo sweep"
        );

        let outcomes = if self.config.parallel {
            self.run_parallel(&sampler, base_seed)
        } else {
            self.config
                .population_sizes
                .iter()
                .map(|&n| self.run_size(&sampler, base_seed, n))
                .collect()
        };

        let mut results = SweepResults {
            skipped: self.skipped.clone(),
            ..Default::default()
        };
        for (&n, outcome) in self.config.population_sizes.iter().zip(outcomes) {
            results.records.extend(outcome.records);
            results.summaries.extend(outcome.summaries);
            if let Some(trace) = outcome.trace {
                results.traces.push((n, trace));
            }
        }
        results
            .records
            .sort_by_key(|r| (r.population_size, r.scenario));
        results
            .summaries
            .sort_by_key(|s| (s.population_size, s.scenario));

        info!(records = results.records.len(), "Monte Carlo sweep finished");
        Ok(results)
    }

    fn run_parallel(&self, sampler: &PopulationSampler<'_>, base_seed: u64) -> Vec<SizeOutcome> {
        let (tx, rx) = crossbeam_channel::unbounded();

        std::thread::scope(|scope| {
            for (index, &n) in self.config.population_sizes.iter().enumerate() {
                let tx = tx.clone();
                scope.spawn(move || {
                    let outcome = self.run_size(sampler, base_seed, n);
                    // Receiver outlives the scope
                    let _ = tx.send((index, outcome));
                });
            }
        });
        drop(tx);

        let mut indexed: Vec<(usize, SizeOutcome)> = rx.iter().collect();
        indexed.sort_by_key(|(index, _)| *index);
        indexed.into_iter().map(|(_, outcome)| outcome).collect()
    }

    fn run_size(&self, sampler: &PopulationSampler<'_>, base_seed: u64, n: usize) -> SizeOutcome {
        let repetitions = self.config.repetitions;
        let mut totals = vec![SimulationResult::ZERO; self.schemes.len()];
        let mut welfare = vec![SummaryStats::new(); self.schemes.len()];
        let mut trace = None;

        for rep in 0..repetitions {
            let population: Vec<AgentRealization<'_>> = if n == 0 {
                Vec::new()
            } else {
                let mut rng = StdRng::seed_from_u64(repetition_seed(base_seed, n, rep));
                sampler.draw(n, &mut rng)
            };

            if rep == 0 && self.config.trace_first_agent {
                trace = population
                    .first()
                    .and_then(|agent| self.schemes.iter().find_map(|s| s.trace(agent)));
                if let Some(t) = &trace {
                    debug!(population_size = n, trace = ?t, "First agent decision");
                }
            }

            for (i, scheme) in self.schemes.iter().enumerate() {
                let result = scheme.evaluate(&population);
                welfare[i].push(result.social_welfare());
                totals[i] += result;
            }
        }

        let scale = 1.0 / repetitions as f64;
        let mut records = Vec::with_capacity(self.schemes.len());
        let mut summaries = Vec::with_capacity(self.schemes.len());
        for (i, scheme) in self.schemes.iter().enumerate() {
            let kind = scheme.kind();
            let record = ScenarioRecord::new(kind, n, &totals[i].scaled(scale));
            info!(
                scenario = %kind,
                population_size = n,
                principal = record.principal_utility,
                agents = record.agents_utility,
                welfare = record.social_welfare,
                "Scenario averaged"
            );
            records.push(record);
            summaries.push(RunSummary::new(kind, n, &welfare[i]));
        }

        SizeOutcome {
            records,
            summaries,
            trace,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::mechanism::DesignerConfig;
    use contract_core::AgentType;

    fn types() -> TypeDistribution {
        TypeDistribution::two_type(AgentType::new("low", 0.5, 0.5), AgentType::new("high", 1.0, 0.5))
            .unwrap()
    }

    fn runner(types: &TypeDistribution, config: MonteCarloConfig) -> MonteCarloRunner<'_> {
        MonteCarloRunner::with_mechanisms(
            config,
            types,
            UtilityModel::default(),
            &MechanismDesigner::new(DesignerConfig::default()),
            SelectionConfig::default(),
        )
    }

    #[test]
    fn test_repetition_seed_distinct() {
        let a = repetition_seed(42, 10, 0);
        assert_ne!(a, repetition_seed(42, 10, 1));
        assert_ne!(a, repetition_seed(42, 20, 0));
        assert_ne!(a, repetition_seed(43, 10, 0));
        assert_eq!(a, repetition_seed(42, 10, 0));
    }

    #[test]
    fn test_zero_population_reports_zeros() {
        let types = types();
        let config = MonteCarloConfig::default()
            .with_population_sizes(vec![0])
            .with_repetitions(3);
        let results = runner(&types, config).run().unwrap();

        assert_eq!(results.records.len(), 3);
        for record in &results.records {
            assert_eq!(record.principal_utility, 0.0);
            assert_eq!(record.agents_utility, 0.0);
            assert_eq!(record.social_welfare, 0.0);
        }
    }

    #[test]
    fn test_records_sorted_and_complete() {
        let types = types();
        let config = MonteCarloConfig::default()
            .with_population_sizes(vec![20, 5])
            .with_repetitions(4);
        let results = runner(&types, config).run().unwrap();

        assert!(results.skipped.is_empty());
        assert_eq!(results.records.len(), 6);
        let keys: Vec<_> = results
            .records
            .iter()
            .map(|r| (r.population_size, r.scenario))
            .collect();
        let mut sorted = keys.clone();
        sorted.sort();
        assert_eq!(keys, sorted);
        assert_eq!(results.summary(MechanismKind::Centralized, 20).map(|s| s.repetitions), Some(4));
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let types = types();
        let config = MonteCarloConfig::default()
            .with_population_sizes(vec![3, 8, 15])
            .with_repetitions(5)
            .with_seed(Some(7));
        let sequential = runner(&types, config.clone()).run().unwrap();
        let parallel = runner(&types, config.with_parallel(true)).run().unwrap();
        assert_eq!(sequential.records, parallel.records);
        assert_eq!(sequential.summaries, parallel.summaries);
    }

    #[test]
    fn test_zero_repetitions_rejected() {
        let types = types();
        let config = MonteCarloConfig::default().with_repetitions(0);
        assert!(matches!(
            runner(&types, config).run(),
            Err(ConfigError::InvalidSetting(_))
        ));
    }

    #[test]
    fn test_trace_captured_on_request() {
        let types = types();
        let config = MonteCarloConfig::default()
            .with_population_sizes(vec![0, 4])
            .with_repetitions(1)
            .with_trace_first_agent(true);
        let results = runner(&types, config).run().unwrap();

        assert_eq!(results.traces.len(), 1);
        let (n, trace) = &results.traces[0];
        assert_eq!(*n, 4);
        assert_eq!(trace.agent_id, 0);
        assert_eq!(trace.steps.len(), 2);
    }
}
