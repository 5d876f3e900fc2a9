//! Closeness of a candidate's constraint count to the requested count.

use fm_core::{FeatureModel, ModelStatistics};
use fm_sampler::FitnessFunction;

/// Score in (0, 1]: `total / target` below the target, `target / total`
/// above it, 1.0 exactly at it.
///
/// `total` sums all six counted categories (mandatory, optional,
/// alternative, or, requires, excludes). An empty model scores the
/// smallest positive value.
#[must_use]
pub fn score(stats: &ModelStatistics, target: u64) -> f64 {
    debug_assert!(target > 0, "Target constraint count must be positive");

    let total = stats.total();
    if total == 0 {
        return f64::MIN_POSITIVE;
    }

    let total = total as f64;
    let target = target as f64;
    if total > target {
        target / total
    } else {
        total / target
    }
}

/// [`score`] as a fitness function to maximize.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConstraintCountFitness {
    target: u64,
}

impl ConstraintCountFitness {
    #[must_use]
    pub fn new(target: u64) -> Self {
        Self { target }
    }

    #[must_use]
    pub fn target(&self) -> u64 {
        self.target
    }
}

impl FitnessFunction for ConstraintCountFitness {
    fn fitness(&self, model: &FeatureModel) -> f64 {
        score(&model.statistics(), self.target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats(relationships: u64, requires: u64) -> ModelStatistics {
        ModelStatistics {
            optional_count: relationships,
            requires_count: requires,
            ..Default::default()
        }
    }

    #[test]
    fn test_exact_match_scores_one() {
        assert_eq!(score(&stats(16, 24), 40), 1.0);
        assert_eq!(score(&stats(3, 0), 3), 1.0);
    }

    #[test]
    fn test_score_in_unit_interval() {
        for total in 0..200 {
            let s = score(&stats(total, 0), 40);
            assert!(s > 0.0 && s <= 1.0, "total = {}", total);
            assert_eq!(s == 1.0, total == 40);
        }
    }

    #[test]
    fn test_strictly_decreasing_away_from_target() {
        let target = 40;
        for total in 1..target {
            assert!(score(&stats(total, 0), target) < score(&stats(total + 1, 0), target));
        }
        for total in target..200 {
            assert!(score(&stats(total, 0), target) > score(&stats(total + 1, 0), target));
        }
    }

    #[test]
    fn test_counts_every_category() {
        let all = ModelStatistics {
            mandatory_count: 1,
            optional_count: 1,
            alternative_count: 1,
            or_count: 1,
            requires_count: 1,
            excludes_count: 1,
        };
        assert_eq!(score(&all, 6), 1.0);
        assert_eq!(score(&all, 12), 0.5);
        assert_eq!(score(&all, 3), 0.5);
    }

    #[test]
    fn test_empty_model_scores_smallest_positive() {
        assert_eq!(score(&ModelStatistics::default(), 10), f64::MIN_POSITIVE);
    }

    #[test]
    fn test_fitness_function_uses_model_statistics() {
        use fm_core::{FeatureId, Relationship};

        let mut model = FeatureModel::new("F0");
        let f1 = model.add_feature("F1");
        model.add_relationship(Relationship::optional(FeatureId::ROOT, f1));

        let fitness = ConstraintCountFitness::new(4);
        assert_eq!(fitness.fitness(&model), 0.25);
    }
}
