//! Population sampling
//!
//! Each agent's true type is an independent draw from the type distribution.
//! Realizations borrow their type and live for a single run.

use contract_core::{AgentType, ConfigError, TypeDistribution};
use rand::Rng;
use rand::distributions::{Distribution, WeightedIndex};

/// An agent instantiated for one simulation run
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AgentRealization<'a> {
    pub id: usize,
    pub true_type: &'a AgentType,
}

impl AgentRealization<'_> {
    #[inline]
    pub fn theta(&self) -> f64 {
        self.true_type.theta
    }
}

/// Draws populations from a [`TypeDistribution`]
#[derive(Debug, Clone)]
pub struct PopulationSampler<'a> {
    types: &'a TypeDistribution,
    index: WeightedIndex<f64>,
}

impl<'a> PopulationSampler<'a> {
    pub fn new(types: &'a TypeDistribution) -> Result<Self, ConfigError> {
        let index = WeightedIndex::new(types.weights())
            .map_err(|e| ConfigError::InvalidSetting(format!("type weights: {}", e)))?;
        Ok(Self { types, index })
    }

    pub fn sample_type<R: Rng + ?Sized>(&self, rng: &mut R) -> &'a AgentType {
        &self.types.types()[self.index.sample(rng)]
    }

    /// `n` independent realizations with ids `0..n`
    pub fn draw<R: Rng + ?Sized>(&self, n: usize, rng: &mut R) -> Vec<AgentRealization<'a>> {
        (0..n)
            .map(|id| AgentRealization {
                id,
                true_type: self.sample_type(rng),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn dist() -> TypeDistribution {
        TypeDistribution::two_type(AgentType::new("low", 0.5, 0.25), AgentType::new("high", 1.0, 0.75))
            .unwrap()
    }

    #[test]
    fn test_draw_size_and_ids() {
        let types = dist();
        let sampler = PopulationSampler::new(&types).unwrap();
        let mut rng = StdRng::seed_from_u64(7);
        let population = sampler.draw(25, &mut rng);
        assert_eq!(population.len(), 25);
        assert!(population.iter().enumerate().all(|(i, a)| a.id == i));
        assert!(sampler.draw(0, &mut rng).is_empty());
    }

    #[test]
    fn test_frequencies_follow_probabilities() {
        let types = dist();
        let sampler = PopulationSampler::new(&types).unwrap();
        let mut rng = StdRng::seed_from_u64(42);
        let population = sampler.draw(20_000, &mut rng);
        let high = population.iter().filter(|a| a.true_type.name == "high").count();
        let share = high as f64 / population.len() as f64;
        assert!((share - 0.75).abs() < 0.02, "high share {}", share);
    }

    #[test]
    fn test_seeded_draws_repeat() {
        let types = dist();
        let sampler = PopulationSampler::new(&types).unwrap();
        let a = sampler.draw(50, &mut StdRng::seed_from_u64(9));
        let b = sampler.draw(50, &mut StdRng::seed_from_u64(9));
        assert_eq!(a, b);
    }
}
