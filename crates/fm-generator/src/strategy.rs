//! Candidate producers and the rule that picks one.
//!
//! Small models are cheap to sample and most samples land near the target,
//! so they are generated directly. From [`SEARCH_FEATURES_MIN`] features on,
//! random samples scatter too widely and an evolutionary search steers the
//! constraint count toward the target instead.

use fm_core::{FeatureModel, GeneratorCharacteristics};
use fm_random::ModelRng;
use fm_sampler::{
    EvolutionConfig, EvolutionaryGenerator, Objective, RandomGenerator, SamplerError,
};
use fm_solver::{DpllSolver, ProductCount};
use serde::Serialize;

use crate::fitness::ConstraintCountFitness;

/// Smallest feature count generated with [`Strategy::Search`].
pub const SEARCH_FEATURES_MIN: u32 = 10;

/// How candidates for one request are produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// One random sample per attempt.
    Direct,
    /// Fitness-guided evolutionary search per attempt.
    Search,
}

impl Strategy {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Strategy::Direct => "direct",
            Strategy::Search => "search",
        }
    }
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Pick the strategy for a target feature count.
#[must_use]
pub fn select_strategy(target_features_count: u32) -> Strategy {
    if target_features_count < SEARCH_FEATURES_MIN {
        Strategy::Direct
    } else {
        Strategy::Search
    }
}

/// One generated candidate, not yet persisted or validated.
#[derive(Debug, Clone)]
pub struct CandidateModel {
    pub model: FeatureModel,
    pub strategy: Strategy,
    /// Generations the search ran; 0 for direct candidates
    pub generations: u32,
    /// Product count up to the characteristics' cap, when it was computed
    pub products: Option<ProductCount>,
}

/// Produces one candidate per attempt.
///
/// Producers keep no state between calls: everything an attempt needs comes
/// from the characteristics and the RNG.
pub trait CandidateProducer: Send + Sync {
    fn strategy(&self) -> Strategy;

    fn produce(
        &self,
        characteristics: &GeneratorCharacteristics,
        rng: &mut ModelRng,
    ) -> Result<CandidateModel, SamplerError>;
}

/// Single random sample per attempt.
#[derive(Debug, Clone, Default)]
pub struct DirectProducer {
    generator: RandomGenerator,
    solver: DpllSolver,
}

impl DirectProducer {
    #[must_use]
    pub fn new(generator: RandomGenerator) -> Self {
        Self {
            generator,
            solver: DpllSolver::default(),
        }
    }

    /// Use `solver` for the product count.
    #[must_use]
    pub fn with_solver(mut self, solver: DpllSolver) -> Self {
        self.solver = solver;
        self
    }
}

impl CandidateProducer for DirectProducer {
    fn strategy(&self) -> Strategy {
        Strategy::Direct
    }

    fn produce(
        &self,
        characteristics: &GeneratorCharacteristics,
        rng: &mut ModelRng,
    ) -> Result<CandidateModel, SamplerError> {
        let model = self.generator.generate(characteristics, rng)?;

        let products = match self
            .solver
            .count_products(&model, characteristics.products_max)
        {
            Ok(count) => Some(count),
            Err(e) => {
                tracing::warn!(error = %e, "product count skipped");
                None
            }
        };

        Ok(CandidateModel {
            model,
            strategy: Strategy::Direct,
            generations: 0,
            products,
        })
    }
}

/// Evolutionary search maximizing [`ConstraintCountFitness`].
pub struct SearchProducer {
    generator: EvolutionaryGenerator,
}

impl SearchProducer {
    /// Search toward `target_constraints`, evolving at most
    /// `generations_max` generations of `population_size` models.
    #[must_use]
    pub fn new(target_constraints: u32, generations_max: u32, population_size: usize) -> Self {
        let config = EvolutionConfig {
            population_size,
            generations_max,
            ..Default::default()
        };
        let generator = EvolutionaryGenerator::new(
            ConstraintCountFitness::new(u64::from(target_constraints)),
            Objective::Maximize,
            config,
        )
        .with_target(1.0);

        Self { generator }
    }
}

impl CandidateProducer for SearchProducer {
    fn strategy(&self) -> Strategy {
        Strategy::Search
    }

    fn produce(
        &self,
        characteristics: &GeneratorCharacteristics,
        rng: &mut ModelRng,
    ) -> Result<CandidateModel, SamplerError> {
        let outcome = self.generator.generate(characteristics, rng)?;
        tracing::trace!(
            fitness = outcome.fitness,
            generations = outcome.generations,
            "search finished"
        );

        Ok(CandidateModel {
            model: outcome.model,
            strategy: Strategy::Search,
            generations: outcome.generations,
            products: None,
        })
    }
}
