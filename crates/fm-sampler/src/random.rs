//! Single-shot random model generation.
//!
//! Builds the tree top-down: feature `i` (for `i >= 1`) hangs off a random
//! earlier feature, either alone (mandatory or optional) or together with
//! a few following features as an alternative or or group. Cross-tree
//! constraints are then placed between distinct, not yet related pairs.

use std::collections::HashSet;

use fm_core::{
    CrossTreeConstraint, FeatureId, FeatureModel, GeneratorCharacteristics, Relationship,
};
use fm_random::ModelRng;

use crate::SamplerError;

/// Shape parameters for [`RandomGenerator`].
#[derive(Debug, Clone)]
pub struct RandomGeneratorConfig {
    /// Probability that a new relationship is a group
    pub group_probability: f64,
    /// Largest group to create
    pub group_size_max: usize,
    /// Probability that a single-child relationship is mandatory
    pub mandatory_probability: f64,
    /// Probability that a cross-tree constraint is a requires
    pub requires_probability: f64,
}

impl Default for RandomGeneratorConfig {
    fn default() -> Self {
        Self {
            group_probability: 0.3,
            group_size_max: 4,
            mandatory_probability: 0.3,
            requires_probability: 0.5,
        }
    }
}

/// Unoptimized generator: one sample per call.
#[derive(Debug, Clone, Default)]
pub struct RandomGenerator {
    config: RandomGeneratorConfig,
}

impl RandomGenerator {
    #[must_use]
    pub fn new(config: RandomGeneratorConfig) -> Self {
        debug_assert!(config.group_size_max >= 2, "Groups need at least two members");
        Self { config }
    }

    #[must_use]
    pub fn config(&self) -> &RandomGeneratorConfig {
        &self.config
    }

    /// Generate one model with exactly `features_count` features and
    /// `ctc_count()` cross-tree constraints (fewer only when the model has
    /// fewer distinct feature pairs than that).
    pub fn generate(
        &self,
        characteristics: &GeneratorCharacteristics,
        rng: &mut ModelRng,
    ) -> Result<FeatureModel, SamplerError> {
        let features_count = characteristics.features_count as usize;
        if features_count == 0 {
            return Err(SamplerError::NoFeatures);
        }

        let mut model = FeatureModel::new("F0");
        model.set_name(characteristics.model_name.clone());

        let mut next = 1;
        while next < features_count {
            let parent = FeatureId(rng.gen_range(0..next));
            let remaining = features_count - next;

            if remaining >= 2 && rng.gen_bool(self.config.group_probability) {
                let size_max = self.config.group_size_max.min(remaining);
                let size = rng.gen_range(2..=size_max);
                let children: Vec<FeatureId> = (next..next + size)
                    .map(|i| model.add_feature(format!("F{}", i)))
                    .collect();
                let relationship = if rng.gen_bool(0.5) {
                    Relationship::alternative(parent, children)
                } else {
                    Relationship::or(parent, children)
                };
                model.add_relationship(relationship);
                next += size;
            } else {
                let child = model.add_feature(format!("F{}", next));
                let relationship = if rng.gen_bool(self.config.mandatory_probability) {
                    Relationship::mandatory(parent, child)
                } else {
                    Relationship::optional(parent, child)
                };
                model.add_relationship(relationship);
                next += 1;
            }
        }

        self.place_constraints(&mut model, characteristics.ctc_count(), rng);
        model.check_structure()?;

        tracing::trace!(
            features = model.features_count(),
            relationships = model.relationships().len(),
            constraints = model.constraints().len(),
            "random model"
        );

        Ok(model)
    }

    fn place_constraints(&self, model: &mut FeatureModel, requested: usize, rng: &mut ModelRng) {
        let features_count = model.features_count();
        let pairs_count = features_count * features_count.saturating_sub(1) / 2;
        let count = requested.min(pairs_count);

        let pairs: Vec<(usize, usize)> = if count * 2 < pairs_count {
            // Sparse: rejection sampling terminates quickly.
            let mut used = HashSet::with_capacity(count);
            let mut pairs = Vec::with_capacity(count);
            while pairs.len() < count {
                if let Some((a, b)) = rng.pick_distinct_pair(features_count) {
                    if used.insert((a.min(b), a.max(b))) {
                        pairs.push((a, b));
                    }
                }
            }
            pairs
        } else {
            let mut all: Vec<(usize, usize)> = (0..features_count)
                .flat_map(|a| (a + 1..features_count).map(move |b| (a, b)))
                .collect();
            rng.shuffle(&mut all);
            all.truncate(count);
            all.into_iter()
                .map(|(a, b)| if rng.gen_bool(0.5) { (a, b) } else { (b, a) })
                .collect()
        };

        for (a, b) in pairs {
            let constraint = if rng.gen_bool(self.config.requires_probability) {
                CrossTreeConstraint::requires(FeatureId(a), FeatureId(b))
            } else {
                CrossTreeConstraint::excludes(FeatureId(a), FeatureId(b))
            };
            model.add_constraint(constraint);
        }
    }
}
