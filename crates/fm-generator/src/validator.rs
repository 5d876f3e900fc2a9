//! Acceptance check on persisted artifacts.
//!
//! The candidate is judged by what was written to disk: the artifact is
//! parsed back and counted, so a serializer that drops or duplicates an
//! element can never produce an accepted model with the wrong count.

use std::path::Path;

use fm_solver::{ConsistencyChecker, DpllSolver, SolverError};
use fm_sxfm::SxfmError;

/// Result of checking one artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationOutcome {
    /// The model admits no configuration.
    Inconsistent,
    /// The model admits a configuration; realized counts of the parsed model.
    Consistent {
        features_count: usize,
        constraints_count: usize,
    },
}

impl ValidationOutcome {
    /// Whether this outcome accepts a model targeting `constraints_count`.
    #[must_use]
    pub fn accepts(&self, target_constraints: usize) -> bool {
        matches!(
            self,
            ValidationOutcome::Consistent { constraints_count, .. }
                if *constraints_count == target_constraints
        )
    }
}

/// The artifact could not be judged at all.
#[derive(Debug, thiserror::Error)]
pub enum ValidationFailure {
    #[error("Artifact could not be parsed: {0}")]
    Parse(#[from] SxfmError),

    #[error("Consistency check did not complete: {0}")]
    Solver(#[from] SolverError),
}

/// Parses an artifact and checks it for consistency.
#[derive(Debug, Clone, Default)]
pub struct CandidateValidator<C = DpllSolver> {
    checker: C,
}

impl<C: ConsistencyChecker> CandidateValidator<C> {
    pub fn new(checker: C) -> Self {
        Self { checker }
    }

    pub fn validate(&self, path: &Path) -> Result<ValidationOutcome, ValidationFailure> {
        let parsed = fm_sxfm::parse_file(path)?;

        if !self.checker.is_consistent(&parsed)? {
            return Ok(ValidationOutcome::Inconsistent);
        }

        Ok(ValidationOutcome::Consistent {
            features_count: parsed.features_count(),
            constraints_count: parsed.relationships().len() + parsed.constraints().len(),
        })
    }
}
