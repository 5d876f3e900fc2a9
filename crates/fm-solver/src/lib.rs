//! # fm-solver
//!
//! Consistency checking for feature models.
//!
//! A model is *consistent* when at least one configuration (a selection of
//! features) satisfies every structural relationship and cross-tree
//! constraint. The model is encoded as CNF over one boolean variable per
//! feature ([`cnf::encode`]) and decided by a budgeted DPLL search
//! ([`DpllSolver`]).
//!
//! Because variables map one-to-one to features, every satisfying assignment
//! is a product of the model, so the same search also counts products
//! ([`DpllSolver::count_products`]).

pub mod cnf;
pub mod dpll;

pub use cnf::{encode, Clause, Cnf, Lit};
pub use dpll::{DpllSolver, DEFAULT_DECISIONS_MAX};

use fm_core::{FeatureModel, StructureError};

/// Decides whether a feature model admits at least one configuration.
pub trait ConsistencyChecker {
    /// `Ok(true)` if consistent, `Ok(false)` if no configuration exists.
    ///
    /// Errors mean the check could not complete, not that the model is
    /// inconsistent.
    fn is_consistent(&self, model: &FeatureModel) -> Result<bool, SolverError>;
}

/// Number of products of a model, up to an enumeration cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProductCount {
    /// All products were enumerated.
    Exact(u64),
    /// Enumeration stopped at the cap; the model has more products.
    AtLeast(u64),
}

impl ProductCount {
    /// Lower bound on the number of products.
    #[must_use]
    pub fn lower_bound(&self) -> u64 {
        match self {
            ProductCount::Exact(n) | ProductCount::AtLeast(n) => *n,
        }
    }
}

impl std::fmt::Display for ProductCount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProductCount::Exact(n) => write!(f, "{}", n),
            ProductCount::AtLeast(n) => write!(f, ">{}", n),
        }
    }
}

/// Solver errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SolverError {
    #[error("Solver gave up after {0} decisions")]
    BudgetExhausted(u64),

    #[error("Model cannot be encoded: {0}")]
    Structure(#[from] StructureError),
}
