//! CNF encoding of feature models.
//!
//! One variable per feature (variable `i` is feature `FeatureId(i)`):
//!
//! | Element | Clauses |
//! |---------|---------|
//! | root | `r` |
//! | any child `c` of `p` | `¬c ∨ p` |
//! | mandatory | `¬p ∨ c` |
//! | alternative / or | `¬p ∨ c1 ∨ … ∨ cn` |
//! | alternative | `¬ci ∨ ¬cj` for every pair |
//! | requires `a → b` | `¬a ∨ b` |
//! | excludes | `¬a ∨ ¬b` |

use fm_core::{ConstraintKind, FeatureId, FeatureModel, RelationshipKind};

use crate::SolverError;

/// A literal: a feature variable or its negation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Lit {
    pub var: usize,
    pub positive: bool,
}

impl Lit {
    #[must_use]
    pub fn pos(feature: FeatureId) -> Self {
        Self {
            var: feature.index(),
            positive: true,
        }
    }

    #[must_use]
    pub fn neg(feature: FeatureId) -> Self {
        Self {
            var: feature.index(),
            positive: false,
        }
    }

    /// Value of this literal under a variable assignment.
    #[must_use]
    pub fn eval(&self, value: bool) -> bool {
        value == self.positive
    }
}

pub type Clause = Vec<Lit>;

/// A formula in conjunctive normal form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cnf {
    pub vars_count: usize,
    pub clauses: Vec<Clause>,
}

impl Cnf {
    /// Check a complete assignment against every clause.
    #[must_use]
    pub fn is_satisfied_by(&self, assignment: &[bool]) -> bool {
        debug_assert_eq!(assignment.len(), self.vars_count);
        self.clauses
            .iter()
            .all(|clause| clause.iter().any(|lit| lit.eval(assignment[lit.var])))
    }
}

/// Encode a model as CNF.
///
/// Fails if the model is structurally malformed (unknown feature ids, a
/// feature with two parents, ...), since such a model has no well-defined
/// configuration space.
pub fn encode(model: &FeatureModel) -> Result<Cnf, SolverError> {
    model.check_structure()?;

    let mut clauses: Vec<Clause> = vec![vec![Lit::pos(FeatureId::ROOT)]];

    for relationship in model.relationships() {
        let parent = relationship.parent;

        for &child in &relationship.children {
            clauses.push(vec![Lit::neg(child), Lit::pos(parent)]);
        }

        match relationship.kind {
            RelationshipKind::Mandatory => {
                clauses.push(vec![Lit::neg(parent), Lit::pos(relationship.children[0])]);
            }
            RelationshipKind::Optional => {}
            RelationshipKind::Or | RelationshipKind::Alternative => {
                let mut at_least_one = vec![Lit::neg(parent)];
                at_least_one.extend(relationship.children.iter().map(|&c| Lit::pos(c)));
                clauses.push(at_least_one);

                if relationship.kind == RelationshipKind::Alternative {
                    for (i, &a) in relationship.children.iter().enumerate() {
                        for &b in &relationship.children[i + 1..] {
                            clauses.push(vec![Lit::neg(a), Lit::neg(b)]);
                        }
                    }
                }
            }
        }
    }

    for constraint in model.constraints() {
        let clause = match constraint.kind {
            ConstraintKind::Requires => vec![Lit::neg(constraint.left), Lit::pos(constraint.right)],
            ConstraintKind::Excludes => vec![Lit::neg(constraint.left), Lit::neg(constraint.right)],
        };
        clauses.push(clause);
    }

    Ok(Cnf {
        vars_count: model.features_count(),
        clauses,
    })
}
