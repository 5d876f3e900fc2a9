//! JSON summary of a run.

use std::path::Path;

use fm_core::GenerationRequest;
use serde::Serialize;

use crate::controller::{AcceptedModel, GenerationError};

/// Everything needed to reproduce and audit a run.
#[derive(Debug, Clone, Serialize)]
pub struct GenerationReport {
    pub seed: u64,
    pub request: GenerationRequest,
    pub models: Vec<AcceptedModel>,
}

impl GenerationReport {
    #[must_use]
    pub fn new(seed: u64, request: GenerationRequest, models: Vec<AcceptedModel>) -> Self {
        Self {
            seed,
            request,
            models,
        }
    }

    /// Total attempts over all models.
    #[must_use]
    pub fn attempts_count(&self) -> u64 {
        self.models.iter().map(|m| m.attempts).sum()
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Write the report as pretty-printed JSON.
    pub fn write(&self, path: &Path) -> Result<(), GenerationError> {
        let report_error = |source: std::io::Error| GenerationError::Report {
            path: path.to_path_buf(),
            source,
        };
        let json = self.to_json().map_err(|e| report_error(e.into()))?;
        std::fs::write(path, json).map_err(report_error)
    }
}
