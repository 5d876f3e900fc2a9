//! Evolutionary search toward a fitness target.
//!
//! Mutation-only genetic search: the initial population comes from a
//! [`RandomGenerator`], each generation keeps the elite unchanged and fills
//! the rest with mutated tournament winners. Every mutation keeps the
//! feature set intact and the tree well formed, so only the shape (and with
//! it the relationship count) evolves.
//!
//! | Mutation | Relationship count |
//! |----------|--------------------|
//! | toggle mandatory / optional | = |
//! | merge two siblings into a group | -1 |
//! | split a member out of a group | +1 |
//! | flip alternative / or | = |
//! | flip requires / excludes | = |
//! | retarget a constraint | = |

use std::cmp::Ordering;

use fm_core::{
    ConstraintKind, CrossTreeConstraint, FeatureId, FeatureModel, GeneratorCharacteristics,
    Relationship, RelationshipKind,
};
use fm_random::ModelRng;

use crate::random::RandomGenerator;
use crate::{FitnessFunction, Objective, SamplerError};

/// Attempts to find an applicable mutation before giving up on one step.
const MUTATION_TRIES_MAX: usize = 8;

/// Attempts to find a fresh pair when retargeting a constraint.
const RETARGET_TRIES_MAX: usize = 16;

/// Search parameters.
#[derive(Debug, Clone)]
pub struct EvolutionConfig {
    pub population_size: usize,
    pub generations_max: u32,
    /// Best individuals copied unchanged into the next generation
    pub elite_count: usize,
    pub tournament_size: usize,
    /// Upper bound on mutations applied to one offspring
    pub mutations_max: usize,
}

impl Default for EvolutionConfig {
    fn default() -> Self {
        Self {
            population_size: 20,
            generations_max: 5,
            elite_count: 2,
            tournament_size: 2,
            mutations_max: 3,
        }
    }
}

impl EvolutionConfig {
    /// Small population for tests.
    pub fn quick() -> Self {
        Self {
            population_size: 8,
            generations_max: 3,
            ..Default::default()
        }
    }
}

/// Result of one search.
#[derive(Debug, Clone)]
pub struct EvolutionOutcome {
    pub model: FeatureModel,
    pub fitness: f64,
    /// Generations actually evolved; 0 when the initial population already
    /// reached the target
    pub generations: u32,
}

/// Fitness-guided generator.
pub struct EvolutionaryGenerator {
    fitness: Box<dyn FitnessFunction>,
    objective: Objective,
    target: Option<f64>,
    config: EvolutionConfig,
    seeder: RandomGenerator,
}

impl EvolutionaryGenerator {
    pub fn new(
        fitness: impl FitnessFunction + 'static,
        objective: Objective,
        config: EvolutionConfig,
    ) -> Self {
        Self {
            fitness: Box::new(fitness),
            objective,
            target: None,
            config,
            seeder: RandomGenerator::default(),
        }
    }

    /// Stop as soon as the best individual reaches `target`.
    #[must_use]
    pub fn with_target(mut self, target: f64) -> Self {
        self.target = Some(target);
        self
    }

    /// Use a custom generator for the initial population.
    #[must_use]
    pub fn with_seeder(mut self, seeder: RandomGenerator) -> Self {
        self.seeder = seeder;
        self
    }

    #[must_use]
    pub fn config(&self) -> &EvolutionConfig {
        &self.config
    }

    #[must_use]
    pub fn objective(&self) -> Objective {
        self.objective
    }

    /// Run the search and return the best model found.
    pub fn generate(
        &self,
        characteristics: &GeneratorCharacteristics,
        rng: &mut ModelRng,
    ) -> Result<EvolutionOutcome, SamplerError> {
        let population_size = self.config.population_size;
        if population_size == 0 {
            return Err(SamplerError::EmptyPopulation);
        }

        let mut population = Vec::with_capacity(population_size);
        for _ in 0..population_size {
            let model = self.seeder.generate(characteristics, rng)?;
            let fitness = self.score(&model)?;
            population.push((model, fitness));
        }

        let mut generations = 0;
        loop {
            self.rank(&mut population);
            let best_fitness = population[0].1;

            tracing::trace!(generations, best_fitness, "generation ranked");

            let reached = self
                .target
                .map_or(false, |target| self.objective.reaches(best_fitness, target));
            if reached || generations >= self.config.generations_max {
                break;
            }

            generations += 1;
            let elite = self.config.elite_count.min(population_size);
            let mut next: Vec<(FeatureModel, f64)> = population[..elite].to_vec();

            while next.len() < population_size {
                let mut child = self.tournament(&population, rng).clone();
                let mutations = rng.gen_range(1..=self.config.mutations_max.max(1));
                for _ in 0..mutations {
                    mutate(&mut child, rng);
                }
                let fitness = self.score(&child)?;
                next.push((child, fitness));
            }

            population = next;
        }

        let (model, fitness) = population.swap_remove(0);
        debug_assert!(model.check_structure().is_ok());

        Ok(EvolutionOutcome {
            model,
            fitness,
            generations,
        })
    }

    fn score(&self, model: &FeatureModel) -> Result<f64, SamplerError> {
        let fitness = self.fitness.fitness(model);
        if fitness.is_nan() {
            return Err(SamplerError::InvalidFitness(fitness));
        }
        Ok(fitness)
    }

    /// Best first. The sort is stable, so ties keep population order.
    fn rank(&self, population: &mut [(FeatureModel, f64)]) {
        population.sort_by(|a, b| self.order(a.1, b.1));
    }

    fn order(&self, a: f64, b: f64) -> Ordering {
        match self.objective {
            Objective::Maximize => b.total_cmp(&a),
            Objective::Minimize => a.total_cmp(&b),
        }
    }

    fn tournament<'a>(
        &self,
        population: &'a [(FeatureModel, f64)],
        rng: &mut ModelRng,
    ) -> &'a FeatureModel {
        let mut winner = rng.gen_range(0..population.len());
        for _ in 1..self.config.tournament_size.max(1) {
            let challenger = rng.gen_range(0..population.len());
            if self
                .objective
                .is_better(population[challenger].1, population[winner].1)
            {
                winner = challenger;
            }
        }
        &population[winner].0
    }
}

/// Apply one random mutation. Returns false if none was applicable.
pub fn mutate(model: &mut FeatureModel, rng: &mut ModelRng) -> bool {
    for _ in 0..MUTATION_TRIES_MAX {
        let applied = match rng.gen_range(0..6) {
            0 => toggle_optional(model, rng),
            1 => merge_siblings(model, rng),
            2 => split_group(model, rng),
            3 => flip_group_kind(model, rng),
            4 => flip_constraint_kind(model, rng),
            _ => retarget_constraint(model, rng),
        };
        if applied {
            return true;
        }
    }
    false
}

fn indices_where(model: &FeatureModel, predicate: impl Fn(&Relationship) -> bool) -> Vec<usize> {
    model
        .relationships()
        .iter()
        .enumerate()
        .filter(|(_, r)| predicate(r))
        .map(|(i, _)| i)
        .collect()
}

fn single(parent: FeatureId, child: FeatureId, rng: &mut ModelRng) -> Relationship {
    if rng.gen_bool(0.5) {
        Relationship::mandatory(parent, child)
    } else {
        Relationship::optional(parent, child)
    }
}

fn toggle_optional(model: &mut FeatureModel, rng: &mut ModelRng) -> bool {
    let singles = indices_where(model, |r| !r.kind.is_group());
    let index = match rng.choose(&singles) {
        Some(&index) => index,
        None => return false,
    };
    let relationship = &mut model.relationships_mut()[index];
    relationship.kind = match relationship.kind {
        RelationshipKind::Mandatory => RelationshipKind::Optional,
        _ => RelationshipKind::Mandatory,
    };
    true
}

/// Fold a single-child relationship into a sibling: either a new group with
/// another single child of the same parent, or an existing group.
pub fn merge_siblings(model: &mut FeatureModel, rng: &mut ModelRng) -> bool {
    let singles = indices_where(model, |r| !r.kind.is_group());
    let first = match rng.choose(&singles) {
        Some(&index) => index,
        None => return false,
    };
    let parent = model.relationships()[first].parent;
    let partners: Vec<usize> = indices_where(model, |r| r.parent == parent)
        .into_iter()
        .filter(|&i| i != first)
        .collect();
    let partner = match rng.choose(&partners) {
        Some(&index) => index,
        None => return false,
    };

    let relationships = model.relationships_mut();
    let child = relationships[first].children[0];

    if relationships[partner].kind.is_group() {
        relationships[partner].children.push(child);
        relationships.remove(first);
    } else {
        let other = relationships[partner].children[0];
        let children = vec![other, child];
        let group = if rng.gen_bool(0.5) {
            Relationship::alternative(parent, children)
        } else {
            Relationship::or(parent, children)
        };
        relationships.remove(first.max(partner));
        relationships.remove(first.min(partner));
        relationships.push(group);
    }
    true
}

/// Move one member out of a group into its own single-child relationship;
/// a two-member group dissolves into two.
pub fn split_group(model: &mut FeatureModel, rng: &mut ModelRng) -> bool {
    let groups = indices_where(model, |r| r.kind.is_group());
    let index = match rng.choose(&groups) {
        Some(&index) => index,
        None => return false,
    };

    let member = rng.gen_range(0..model.relationships()[index].children.len());
    let relationships = model.relationships_mut();
    let parent = relationships[index].parent;
    let child = relationships[index].children.remove(member);

    if relationships[index].children.len() == 1 {
        let remaining = relationships[index].children[0];
        relationships[index] = single(parent, remaining, rng);
    }
    relationships.push(single(parent, child, rng));
    true
}

fn flip_group_kind(model: &mut FeatureModel, rng: &mut ModelRng) -> bool {
    let groups = indices_where(model, |r| r.kind.is_group());
    let index = match rng.choose(&groups) {
        Some(&index) => index,
        None => return false,
    };
    let relationship = &mut model.relationships_mut()[index];
    relationship.kind = match relationship.kind {
        RelationshipKind::Alternative => RelationshipKind::Or,
        _ => RelationshipKind::Alternative,
    };
    true
}

fn flip_constraint_kind(model: &mut FeatureModel, rng: &mut ModelRng) -> bool {
    let index = match rng.pick_index(model.constraints().len()) {
        Some(index) => index,
        None => return false,
    };
    let constraint = &mut model.constraints_mut()[index];
    *constraint = match constraint.kind {
        ConstraintKind::Requires => {
            CrossTreeConstraint::excludes(constraint.left, constraint.right)
        }
        ConstraintKind::Excludes => {
            CrossTreeConstraint::requires(constraint.left, constraint.right)
        }
    };
    true
}

/// Move a constraint to a pair of features no other constraint relates.
fn retarget_constraint(model: &mut FeatureModel, rng: &mut ModelRng) -> bool {
    let index = match rng.pick_index(model.constraints().len()) {
        Some(index) => index,
        None => return false,
    };
    let features_count = model.features_count();

    for _ in 0..RETARGET_TRIES_MAX {
        let (a, b) = match rng.pick_distinct_pair(features_count) {
            Some((a, b)) => (FeatureId(a), FeatureId(b)),
            None => return false,
        };
        let taken = model.constraints().iter().any(|c| c.relates(a, b));
        if !taken {
            let constraint = &mut model.constraints_mut()[index];
            constraint.left = a;
            constraint.right = b;
            return true;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    fn characteristics(features_count: u32) -> GeneratorCharacteristics {
        GeneratorCharacteristics::new(features_count, 0.8, "FM_TEST_0")
    }

    /// Closeness of the relationship count to `target`, in (0, 1].
    fn relationships_fitness(target: usize) -> impl Fn(&FeatureModel) -> f64 + Send + Sync {
        move |model: &FeatureModel| {
            let n = model.relationships().len() as f64;
            let t = target as f64;
            if n > t {
                t / n
            } else {
                n / t
            }
        }
    }

    #[test]
    fn test_mutations_preserve_structure() {
        let mut rng = ModelRng::new(11);
        let mut model = RandomGenerator::default()
            .generate(&characteristics(20), &mut rng)
            .unwrap();
        let constraints = model.constraints().len();

        for _ in 0..500 {
            mutate(&mut model, &mut rng);
            assert!(model.check_structure().is_ok());
            assert_eq!(model.features_count(), 20);
            assert_eq!(model.constraints().len(), constraints);
        }
    }

    #[test]
    fn test_merge_removes_one_relationship() {
        let mut model = FeatureModel::new("F0");
        let f1 = model.add_feature("F1");
        let f2 = model.add_feature("F2");
        model.add_relationship(Relationship::optional(FeatureId::ROOT, f1));
        model.add_relationship(Relationship::mandatory(FeatureId::ROOT, f2));

        assert!(merge_siblings(&mut model, &mut ModelRng::new(1)));
        assert_eq!(model.relationships().len(), 1);
        assert!(model.relationships()[0].kind.is_group());
        assert!(model.check_structure().is_ok());
    }

    #[test]
    fn test_merge_needs_a_sibling() {
        let mut model = FeatureModel::new("F0");
        let f1 = model.add_feature("F1");
        let f2 = model.add_feature("F2");
        model.add_relationship(Relationship::optional(FeatureId::ROOT, f1));
        model.add_relationship(Relationship::optional(f1, f2));

        assert!(!merge_siblings(&mut model, &mut ModelRng::new(1)));
        assert_eq!(model.relationships().len(), 2);
    }

    #[test]
    fn test_split_adds_one_relationship() {
        let mut model = FeatureModel::new("F0");
        let children: Vec<FeatureId> = (1..=3).map(|i| model.add_feature(format!("F{}", i))).collect();
        model.add_relationship(Relationship::or(FeatureId::ROOT, children));

        let mut rng = ModelRng::new(5);
        assert!(split_group(&mut model, &mut rng));
        assert_eq!(model.relationships().len(), 2);
        assert!(model.check_structure().is_ok());

        // The remaining two-member group dissolves into two singles.
        assert!(split_group(&mut model, &mut rng));
        assert_eq!(model.relationships().len(), 3);
        assert!(model.relationships().iter().all(|r| !r.kind.is_group()));
        assert!(model.check_structure().is_ok());
    }

    #[test]
    fn test_search_reaches_target() {
        let target = 10;
        let generator = EvolutionaryGenerator::new(
            relationships_fitness(target),
            Objective::Maximize,
            EvolutionConfig {
                generations_max: 200,
                ..Default::default()
            },
        )
        .with_target(1.0);

        let outcome = generator
            .generate(&characteristics(20), &mut ModelRng::new(2024))
            .unwrap();
        assert_eq!(outcome.fitness, 1.0);
        assert_eq!(outcome.model.relationships().len(), target);
        assert!(outcome.generations <= 200);
    }

    #[test]
    fn test_generations_bounded_without_target() {
        let generator = EvolutionaryGenerator::new(
            relationships_fitness(3),
            Objective::Maximize,
            EvolutionConfig::quick(),
        );
        let outcome = generator
            .generate(&characteristics(12), &mut ModelRng::new(9))
            .unwrap();
        assert_eq!(outcome.generations, EvolutionConfig::quick().generations_max);
    }

    #[test]
    fn test_elitism_never_loses_best() {
        let fitness = relationships_fitness(5);
        let generator = EvolutionaryGenerator::new(
            relationships_fitness(5),
            Objective::Maximize,
            EvolutionConfig {
                generations_max: 0,
                ..EvolutionConfig::quick()
            },
        );
        let initial = generator
            .generate(&characteristics(15), &mut ModelRng::new(77))
            .unwrap();

        let evolved = EvolutionaryGenerator::new(
            relationships_fitness(5),
            Objective::Maximize,
            EvolutionConfig {
                generations_max: 10,
                ..EvolutionConfig::quick()
            },
        )
        .generate(&characteristics(15), &mut ModelRng::new(77))
        .unwrap();

        assert_eq!(initial.generations, 0);
        assert!(evolved.fitness >= initial.fitness);
        assert_eq!(fitness(&evolved.model), evolved.fitness);
    }

    #[test]
    fn test_minimize_prefers_low_fitness() {
        let run = |generations_max| {
            EvolutionaryGenerator::new(
                |model: &FeatureModel| model.relationships().len() as f64,
                Objective::Minimize,
                EvolutionConfig {
                    generations_max,
                    ..Default::default()
                },
            )
            .generate(&characteristics(10), &mut ModelRng::new(3))
            .unwrap()
        };

        let initial = run(0);
        let evolved = run(30);
        assert!(evolved.fitness <= initial.fitness);
        assert_eq!(evolved.fitness, evolved.model.relationships().len() as f64);
    }

    #[test]
    fn test_deterministic_for_seed() {
        let generator = EvolutionaryGenerator::new(
            relationships_fitness(6),
            Objective::Maximize,
            EvolutionConfig::quick(),
        );
        let a = generator
            .generate(&characteristics(12), &mut ModelRng::new(8))
            .unwrap();
        let b = generator
            .generate(&characteristics(12), &mut ModelRng::new(8))
            .unwrap();
        assert_eq!(a.model, b.model);
        assert_eq!(a.generations, b.generations);
    }

    #[test]
    fn test_errors() {
        let empty = EvolutionaryGenerator::new(
            relationships_fitness(1),
            Objective::Maximize,
            EvolutionConfig {
                population_size: 0,
                ..Default::default()
            },
        );
        assert!(matches!(
            empty.generate(&characteristics(5), &mut ModelRng::new(1)),
            Err(SamplerError::EmptyPopulation)
        ));

        let nan = EvolutionaryGenerator::new(
            |_: &FeatureModel| f64::NAN,
            Objective::Maximize,
            EvolutionConfig::quick(),
        );
        assert!(matches!(
            nan.generate(&characteristics(5), &mut ModelRng::new(1)),
            Err(SamplerError::InvalidFitness(_))
        ));
    }
}
