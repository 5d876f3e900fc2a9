//! Feature model metamodel.
//!
//! A feature model is a tree of features rooted at [`FeatureId::ROOT`].
//! Every non-root feature is the child of exactly one [`Relationship`]:
//!
//! | Kind | Children | Semantics |
//! |------|----------|-----------|
//! | Mandatory | 1 | child selected iff parent selected |
//! | Optional | 1 | child selected only if parent selected |
//! | Alternative | >= 2 | exactly one child iff parent selected |
//! | Or | >= 2 | at least one child iff parent selected |
//!
//! Cross-tree constraints ([`CrossTreeConstraint`]) relate two features
//! anywhere in the tree with `requires` or `excludes`.

use serde::Serialize;

/// Index of a feature inside its [`FeatureModel`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct FeatureId(pub usize);

impl FeatureId {
    /// The root feature is always the first feature of a model.
    pub const ROOT: FeatureId = FeatureId(0);

    #[must_use]
    pub fn index(self) -> usize {
        self.0
    }
}

/// A named feature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Feature {
    pub id: FeatureId,
    pub name: String,
}

/// Kind of a structural relationship.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RelationshipKind {
    Mandatory,
    Optional,
    Alternative,
    Or,
}

impl RelationshipKind {
    /// Whether this kind groups several children under one relationship.
    #[must_use]
    pub fn is_group(self) -> bool {
        matches!(self, RelationshipKind::Alternative | RelationshipKind::Or)
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            RelationshipKind::Mandatory => "mandatory",
            RelationshipKind::Optional => "optional",
            RelationshipKind::Alternative => "alternative",
            RelationshipKind::Or => "or",
        }
    }
}

/// A structural relationship between a parent and its children.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relationship {
    pub kind: RelationshipKind,
    pub parent: FeatureId,
    pub children: Vec<FeatureId>,
}

impl Relationship {
    #[must_use]
    pub fn mandatory(parent: FeatureId, child: FeatureId) -> Self {
        Self {
            kind: RelationshipKind::Mandatory,
            parent,
            children: vec![child],
        }
    }

    #[must_use]
    pub fn optional(parent: FeatureId, child: FeatureId) -> Self {
        Self {
            kind: RelationshipKind::Optional,
            parent,
            children: vec![child],
        }
    }

    #[must_use]
    pub fn alternative(parent: FeatureId, children: Vec<FeatureId>) -> Self {
        debug_assert!(children.len() >= 2, "Alternative group needs two children");
        Self {
            kind: RelationshipKind::Alternative,
            parent,
            children,
        }
    }

    #[must_use]
    pub fn or(parent: FeatureId, children: Vec<FeatureId>) -> Self {
        debug_assert!(children.len() >= 2, "Or group needs two children");
        Self {
            kind: RelationshipKind::Or,
            parent,
            children,
        }
    }
}

/// Kind of a cross-tree constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConstraintKind {
    /// `left` selected implies `right` selected.
    Requires,
    /// `left` and `right` are never selected together.
    Excludes,
}

impl ConstraintKind {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            ConstraintKind::Requires => "requires",
            ConstraintKind::Excludes => "excludes",
        }
    }
}

/// A cross-tree constraint between two distinct features.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CrossTreeConstraint {
    pub kind: ConstraintKind,
    pub left: FeatureId,
    pub right: FeatureId,
}

impl CrossTreeConstraint {
    #[must_use]
    pub fn requires(left: FeatureId, right: FeatureId) -> Self {
        Self {
            kind: ConstraintKind::Requires,
            left,
            right,
        }
    }

    #[must_use]
    pub fn excludes(left: FeatureId, right: FeatureId) -> Self {
        Self {
            kind: ConstraintKind::Excludes,
            left,
            right,
        }
    }

    /// Whether this constraint relates the two features, in either order.
    #[must_use]
    pub fn relates(&self, a: FeatureId, b: FeatureId) -> bool {
        (self.left == a && self.right == b) || (self.left == b && self.right == a)
    }
}

/// Per-kind counts of relationships and cross-tree constraints.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ModelStatistics {
    pub mandatory_count: u64,
    pub optional_count: u64,
    pub alternative_count: u64,
    pub or_count: u64,
    pub requires_count: u64,
    pub excludes_count: u64,
}

impl ModelStatistics {
    #[must_use]
    pub fn relationships_count(&self) -> u64 {
        self.mandatory_count + self.optional_count + self.alternative_count + self.or_count
    }

    #[must_use]
    pub fn cross_tree_count(&self) -> u64 {
        self.requires_count + self.excludes_count
    }

    /// Sum over all six counted categories.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.relationships_count() + self.cross_tree_count()
    }
}

/// Structural defects detected by [`FeatureModel::check_structure`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StructureError {
    #[error("Model has no root feature")]
    Empty,

    #[error("Unknown feature id {0}")]
    UnknownFeature(usize),

    #[error("Root feature '{0}' has a parent")]
    RootHasParent(String),

    #[error("Feature '{0}' has more than one parent")]
    MultipleParents(String),

    #[error("Feature '{0}' is not attached to the tree")]
    Detached(String),

    #[error("{kind} relationship under '{parent}' has {children} children")]
    BadArity {
        kind: &'static str,
        parent: String,
        children: usize,
    },

    #[error("Constraint relates feature '{0}' to itself")]
    SelfConstraint(String),
}

/// A feature model: feature tree plus cross-tree constraints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureModel {
    name: String,
    features: Vec<Feature>,
    relationships: Vec<Relationship>,
    constraints: Vec<CrossTreeConstraint>,
}

impl FeatureModel {
    /// Create a model containing only its root feature.
    pub fn new(root_name: impl Into<String>) -> Self {
        Self {
            name: String::new(),
            features: vec![Feature {
                id: FeatureId::ROOT,
                name: root_name.into(),
            }],
            relationships: Vec::new(),
            constraints: Vec::new(),
        }
    }

    /// Create a model with no features at all (used by parsers before the
    /// root is known).
    #[must_use]
    pub fn empty() -> Self {
        Self {
            name: String::new(),
            features: Vec::new(),
            relationships: Vec::new(),
            constraints: Vec::new(),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// Add a feature and return its id. The first feature added to an
    /// empty model becomes the root.
    pub fn add_feature(&mut self, name: impl Into<String>) -> FeatureId {
        let id = FeatureId(self.features.len());
        self.features.push(Feature {
            id,
            name: name.into(),
        });
        id
    }

    pub fn add_relationship(&mut self, relationship: Relationship) {
        self.relationships.push(relationship);
    }

    pub fn add_constraint(&mut self, constraint: CrossTreeConstraint) {
        self.constraints.push(constraint);
    }

    #[must_use]
    pub fn root(&self) -> Option<&Feature> {
        self.features.first()
    }

    #[must_use]
    pub fn features(&self) -> &[Feature] {
        &self.features
    }

    #[must_use]
    pub fn feature(&self, id: FeatureId) -> Option<&Feature> {
        self.features.get(id.index())
    }

    #[must_use]
    pub fn feature_by_name(&self, name: &str) -> Option<FeatureId> {
        self.features.iter().find(|f| f.name == name).map(|f| f.id)
    }

    #[must_use]
    pub fn relationships(&self) -> &[Relationship] {
        &self.relationships
    }

    pub fn relationships_mut(&mut self) -> &mut Vec<Relationship> {
        &mut self.relationships
    }

    #[must_use]
    pub fn constraints(&self) -> &[CrossTreeConstraint] {
        &self.constraints
    }

    pub fn constraints_mut(&mut self) -> &mut Vec<CrossTreeConstraint> {
        &mut self.constraints
    }

    #[must_use]
    pub fn features_count(&self) -> usize {
        self.features.len()
    }

    /// Relationships plus cross-tree constraints.
    #[must_use]
    pub fn constraints_count(&self) -> usize {
        self.relationships.len() + self.constraints.len()
    }

    /// Parent of a feature, if it is attached to the tree.
    #[must_use]
    pub fn parent_of(&self, id: FeatureId) -> Option<FeatureId> {
        self.relationships
            .iter()
            .find(|r| r.children.contains(&id))
            .map(|r| r.parent)
    }

    /// Count relationships and constraints per kind.
    #[must_use]
    pub fn statistics(&self) -> ModelStatistics {
        let mut stats = ModelStatistics::default();
        for relationship in &self.relationships {
            match relationship.kind {
                RelationshipKind::Mandatory => stats.mandatory_count += 1,
                RelationshipKind::Optional => stats.optional_count += 1,
                RelationshipKind::Alternative => stats.alternative_count += 1,
                RelationshipKind::Or => stats.or_count += 1,
            }
        }
        for constraint in &self.constraints {
            match constraint.kind {
                ConstraintKind::Requires => stats.requires_count += 1,
                ConstraintKind::Excludes => stats.excludes_count += 1,
            }
        }

        debug_assert_eq!(stats.total() as usize, self.constraints_count());
        stats
    }

    /// Verify the feature tree is well formed.
    ///
    /// Every non-root feature must have exactly one parent and be reachable
    /// from the root; single-child kinds have one child, groups at least two;
    /// constraints never relate a feature to itself.
    pub fn check_structure(&self) -> Result<(), StructureError> {
        if self.features.is_empty() {
            return Err(StructureError::Empty);
        }

        let features_count = self.features.len();
        let mut parents: Vec<Option<FeatureId>> = vec![None; features_count];

        for relationship in &self.relationships {
            self.check_id(relationship.parent)?;

            let children = relationship.children.len();
            let arity_ok = if relationship.kind.is_group() {
                children >= 2
            } else {
                children == 1
            };
            if !arity_ok {
                return Err(StructureError::BadArity {
                    kind: relationship.kind.name(),
                    parent: self.features[relationship.parent.index()].name.clone(),
                    children,
                });
            }

            for &child in &relationship.children {
                self.check_id(child)?;
                if child == FeatureId::ROOT {
                    return Err(StructureError::RootHasParent(self.features[0].name.clone()));
                }
                if parents[child.index()].replace(relationship.parent).is_some() {
                    return Err(StructureError::MultipleParents(
                        self.features[child.index()].name.clone(),
                    ));
                }
            }
        }

        // Walk every feature up to the root; more steps than features means a cycle.
        for feature in self.features.iter().skip(1) {
            let mut current = feature.id;
            let mut steps = 0;
            while current != FeatureId::ROOT {
                match parents[current.index()] {
                    Some(parent) if steps < features_count => {
                        current = parent;
                        steps += 1;
                    }
                    _ => return Err(StructureError::Detached(feature.name.clone())),
                }
            }
        }

        for constraint in &self.constraints {
            self.check_id(constraint.left)?;
            self.check_id(constraint.right)?;
            if constraint.left == constraint.right {
                return Err(StructureError::SelfConstraint(
                    self.features[constraint.left.index()].name.clone(),
                ));
            }
        }

        Ok(())
    }

    fn check_id(&self, id: FeatureId) -> Result<(), StructureError> {
        if id.index() < self.features.len() {
            Ok(())
        } else {
            Err(StructureError::UnknownFeature(id.index()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_model() -> FeatureModel {
        let mut model = FeatureModel::new("F0");
        let f1 = model.add_feature("F1");
        let f2 = model.add_feature("F2");
        let f3 = model.add_feature("F3");
        let f4 = model.add_feature("F4");
        model.add_relationship(Relationship::mandatory(FeatureId::ROOT, f1));
        model.add_relationship(Relationship::optional(FeatureId::ROOT, f2));
        model.add_relationship(Relationship::alternative(f1, vec![f3, f4]));
        model.add_constraint(CrossTreeConstraint::requires(f2, f3));
        model.add_constraint(CrossTreeConstraint::excludes(f2, f4));
        model
    }

    #[test]
    fn test_statistics_counts_groups_once() {
        let stats = sample_model().statistics();
        assert_eq!(stats.mandatory_count, 1);
        assert_eq!(stats.optional_count, 1);
        assert_eq!(stats.alternative_count, 1);
        assert_eq!(stats.or_count, 0);
        assert_eq!(stats.requires_count, 1);
        assert_eq!(stats.excludes_count, 1);
        assert_eq!(stats.relationships_count(), 3);
        assert_eq!(stats.total(), 5);
    }

    #[test]
    fn test_constraints_count_matches_statistics() {
        let model = sample_model();
        assert_eq!(model.constraints_count(), 5);
        assert_eq!(model.features_count(), 5);
    }

    #[test]
    fn test_parent_of() {
        let model = sample_model();
        assert_eq!(model.parent_of(FeatureId(3)), Some(FeatureId(1)));
        assert_eq!(model.parent_of(FeatureId::ROOT), None);
    }

    #[test]
    fn test_check_structure_accepts_tree() {
        assert_eq!(sample_model().check_structure(), Ok(()));
    }

    #[test]
    fn test_check_structure_detects_detached_feature() {
        let mut model = sample_model();
        model.add_feature("F5");
        assert_eq!(
            model.check_structure(),
            Err(StructureError::Detached("F5".to_string()))
        );
    }

    #[test]
    fn test_check_structure_detects_second_parent() {
        let mut model = sample_model();
        model.add_relationship(Relationship::optional(FeatureId(2), FeatureId(3)));
        assert_eq!(
            model.check_structure(),
            Err(StructureError::MultipleParents("F3".to_string()))
        );
    }

    #[test]
    fn test_check_structure_detects_cycle() {
        let mut model = FeatureModel::new("F0");
        let a = model.add_feature("A");
        let b = model.add_feature("B");
        model.add_relationship(Relationship::mandatory(a, b));
        model.add_relationship(Relationship::mandatory(b, a));
        assert!(matches!(
            model.check_structure(),
            Err(StructureError::Detached(_))
        ));
    }

    #[test]
    fn test_check_structure_detects_self_constraint() {
        let mut model = sample_model();
        model.add_constraint(CrossTreeConstraint::requires(FeatureId(1), FeatureId(1)));
        assert_eq!(
            model.check_structure(),
            Err(StructureError::SelfConstraint("F1".to_string()))
        );
    }

    #[test]
    fn test_constraint_relates_either_order() {
        let c = CrossTreeConstraint::excludes(FeatureId(1), FeatureId(2));
        assert!(c.relates(FeatureId(2), FeatureId(1)));
        assert!(!c.relates(FeatureId(1), FeatureId(3)));
    }
}
