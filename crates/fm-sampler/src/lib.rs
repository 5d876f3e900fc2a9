//! # fm-sampler
//!
//! Feature model generators.
//!
//! | Generator | Optimizes | Use |
//! |-----------|-----------|-----|
//! | [`RandomGenerator`] | nothing | single-shot sampling, cheap |
//! | [`EvolutionaryGenerator`] | a [`FitnessFunction`] | budgeted search toward a target |
//!
//! Both take [`GeneratorCharacteristics`](fm_core::GeneratorCharacteristics)
//! and a seeded [`ModelRng`](fm_random::ModelRng), so a generated model is
//! fully determined by the characteristics and the RNG state.

pub mod evolution;
pub mod random;

pub use evolution::{EvolutionConfig, EvolutionOutcome, EvolutionaryGenerator};
pub use random::{RandomGenerator, RandomGeneratorConfig};

use fm_core::{FeatureModel, StructureError};

/// Scalar objective evaluated on candidate models.
pub trait FitnessFunction: Send + Sync {
    fn fitness(&self, model: &FeatureModel) -> f64;
}

impl<F> FitnessFunction for F
where
    F: Fn(&FeatureModel) -> f64 + Send + Sync,
{
    fn fitness(&self, model: &FeatureModel) -> f64 {
        self(model)
    }
}

/// Direction of optimization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Objective {
    Maximize,
    Minimize,
}

impl Objective {
    /// Whether fitness `a` is strictly better than `b`.
    #[must_use]
    pub fn is_better(self, a: f64, b: f64) -> bool {
        match self {
            Objective::Maximize => a > b,
            Objective::Minimize => a < b,
        }
    }

    /// Whether `fitness` has reached `target`.
    #[must_use]
    pub fn reaches(self, fitness: f64, target: f64) -> bool {
        match self {
            Objective::Maximize => fitness >= target,
            Objective::Minimize => fitness <= target,
        }
    }
}

/// Generator errors.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SamplerError {
    #[error("Cannot generate a model with zero features")]
    NoFeatures,

    #[error("Population size must be positive")]
    EmptyPopulation,

    #[error("Fitness function returned {0}")]
    InvalidFitness(f64),

    #[error("Generated model is malformed: {0}")]
    Structure(#[from] StructureError),
}
