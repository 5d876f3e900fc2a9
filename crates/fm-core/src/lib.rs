//! # fm-core
//!
//! Core types for synthesized feature model generation.
//!
//! - [`FeatureModel`]: the metamodel (feature tree, relationships and
//!   cross-tree constraints) shared by the sampler, solver and serializer.
//! - [`ModelStatistics`]: per-kind relationship/constraint counts used by
//!   fitness scoring.
//! - [`GenerationRequest`] / [`GeneratorCharacteristics`]: what the user asked
//!   for, and what a single generation attempt is told to build.
//!
//! ## Counting
//!
//! Throughout the workspace the "constraint count" of a model is the number of
//! structural relationships plus the number of cross-tree constraints. A
//! mandatory or optional relationship counts once per child; an alternative or
//! or-group counts once regardless of its size.

pub mod model;
pub mod request;

pub use model::{
    ConstraintKind, CrossTreeConstraint, Feature, FeatureId, FeatureModel, ModelStatistics,
    Relationship, RelationshipKind, StructureError,
};
pub use request::{
    GenerationRequest, GeneratorCharacteristics, RequestError, CONSTRAINTS_MIN,
    MODEL_FILE_EXTENSION, PRODUCTS_MAX,
};
