//! Generation requests and per-attempt generator characteristics.

use std::path::{Path, PathBuf};

use serde::Serialize;

/// Upper bound on the products a generator may enumerate for one candidate.
///
/// Larger values make product enumeration slow enough to stall a run.
pub const PRODUCTS_MAX: u64 = 10_000;

/// Smallest constraint count a request may ask for.
///
/// Three constraints derive two features, which hold one relationship and at
/// most one cross-tree constraint, so no model could ever reach the target.
pub const CONSTRAINTS_MIN: u32 = 4;

/// Extension of persisted model artifacts.
pub const MODEL_FILE_EXTENSION: &str = "splx";

/// Invalid request parameters.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RequestError {
    #[error("Number of constraints must be at least {min}, got {got}")]
    TooFewConstraints { got: u32, min: u32 },

    #[error("Number of feature models must be positive")]
    NoModels,

    #[error("Cross-tree constraint ratio must be within [0, 1], got {0}")]
    CtcRatioOutOfRange(f64),

    #[error("Maximum number of generations must be positive")]
    NoGenerations,
}

/// What the user asked for: `models_count` models with exactly
/// `constraints_count` relationships plus cross-tree constraints each.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationRequest {
    constraints_count: u32,
    models_count: u32,
    ctc_ratio: f64,
    generations_max: u32,
    output_dir: PathBuf,
}

impl GenerationRequest {
    /// Create a validated request.
    pub fn new(
        constraints_count: u32,
        models_count: u32,
        ctc_ratio: f64,
        generations_max: u32,
        output_dir: impl Into<PathBuf>,
    ) -> Result<Self, RequestError> {
        if constraints_count < CONSTRAINTS_MIN {
            return Err(RequestError::TooFewConstraints {
                got: constraints_count,
                min: CONSTRAINTS_MIN,
            });
        }
        if models_count == 0 {
            return Err(RequestError::NoModels);
        }
        if !(0.0..=1.0).contains(&ctc_ratio) {
            return Err(RequestError::CtcRatioOutOfRange(ctc_ratio));
        }
        if generations_max == 0 {
            return Err(RequestError::NoGenerations);
        }

        Ok(Self {
            constraints_count,
            models_count,
            ctc_ratio,
            generations_max,
            output_dir: output_dir.into(),
        })
    }

    #[must_use]
    pub fn constraints_count(&self) -> u32 {
        self.constraints_count
    }

    #[must_use]
    pub fn models_count(&self) -> u32 {
        self.models_count
    }

    #[must_use]
    pub fn ctc_ratio(&self) -> f64 {
        self.ctc_ratio
    }

    #[must_use]
    pub fn generations_max(&self) -> u32 {
        self.generations_max
    }

    #[must_use]
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Number of features to ask the generator for: `floor(3C / 4)`.
    #[must_use]
    pub fn target_features_count(&self) -> u32 {
        (u64::from(self.constraints_count) * 3 / 4) as u32
    }

    /// `FM_{constraints}_{index}`.
    #[must_use]
    pub fn model_name(&self, index: u32) -> String {
        format!("FM_{}_{}", self.constraints_count, index)
    }

    /// `FM_{constraints}_{index}.splx`.
    #[must_use]
    pub fn file_name(&self, index: u32) -> String {
        format!("{}.{}", self.model_name(index), MODEL_FILE_EXTENSION)
    }

    /// Final artifact path of the model with the given index.
    #[must_use]
    pub fn model_path(&self, index: u32) -> PathBuf {
        self.output_dir.join(self.file_name(index))
    }

    /// Characteristics for one generation attempt of model `index`.
    #[must_use]
    pub fn characteristics(&self, index: u32) -> GeneratorCharacteristics {
        GeneratorCharacteristics::new(
            self.target_features_count(),
            self.ctc_ratio,
            self.model_name(index),
        )
    }
}

/// Parameters handed to a generator for a single attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GeneratorCharacteristics {
    /// Number of features, root included
    pub features_count: u32,
    /// Cross-tree constraints as a percentage of the feature count
    pub ctc_percentage: u32,
    /// Cap on products the generator enumerates per candidate
    pub products_max: u64,
    /// Name given to the generated model
    pub model_name: String,
}

impl GeneratorCharacteristics {
    /// Build characteristics; the ratio is truncated to a whole percentage.
    pub fn new(features_count: u32, ctc_ratio: f64, model_name: impl Into<String>) -> Self {
        debug_assert!((0.0..=1.0).contains(&ctc_ratio), "CTC ratio must be in [0.0, 1.0]");

        Self {
            features_count,
            ctc_percentage: (100.0 * ctc_ratio) as u32,
            products_max: PRODUCTS_MAX,
            model_name: model_name.into(),
        }
    }

    /// Number of cross-tree constraints the generator should place.
    #[must_use]
    pub fn ctc_count(&self) -> usize {
        (u64::from(self.features_count) * u64::from(self.ctc_percentage) / 100) as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_features_count_floors() {
        for (constraints, features) in [(4, 3), (5, 3), (6, 4), (7, 5), (13, 9), (14, 10), (40, 30)] {
            let request = GenerationRequest::new(constraints, 1, 0.8, 5, ".").unwrap();
            assert_eq!(request.target_features_count(), features, "C = {}", constraints);
        }
    }

    #[test]
    fn test_target_features_count_no_overflow() {
        let request = GenerationRequest::new(u32::MAX, 1, 0.8, 5, ".").unwrap();
        assert_eq!(
            u64::from(request.target_features_count()),
            u64::from(u32::MAX) * 3 / 4
        );
    }

    #[test]
    fn test_rejects_invalid_parameters() {
        assert_eq!(
            GenerationRequest::new(2, 1, 0.8, 5, "."),
            Err(RequestError::TooFewConstraints { got: 2, min: 4 })
        );
        assert_eq!(
            GenerationRequest::new(3, 1, 0.8, 5, "."),
            Err(RequestError::TooFewConstraints { got: 3, min: 4 })
        );
        assert!(GenerationRequest::new(4, 1, 0.8, 5, ".").is_ok());
        assert_eq!(
            GenerationRequest::new(6, 0, 0.8, 5, "."),
            Err(RequestError::NoModels)
        );
        assert!(matches!(
            GenerationRequest::new(6, 1, 1.5, 5, "."),
            Err(RequestError::CtcRatioOutOfRange(_))
        ));
        assert!(matches!(
            GenerationRequest::new(6, 1, f64::NAN, 5, "."),
            Err(RequestError::CtcRatioOutOfRange(_))
        ));
        assert_eq!(
            GenerationRequest::new(6, 1, 0.8, 0, "."),
            Err(RequestError::NoGenerations)
        );
    }

    #[test]
    fn test_model_naming() {
        let request = GenerationRequest::new(6, 2, 0.8, 5, "/tmp/out").unwrap();
        assert_eq!(request.model_name(1), "FM_6_1");
        assert_eq!(request.file_name(0), "FM_6_0.splx");
        assert_eq!(request.model_path(0), PathBuf::from("/tmp/out/FM_6_0.splx"));
    }

    #[test]
    fn test_characteristics() {
        let request = GenerationRequest::new(40, 1, 0.8, 5, ".").unwrap();
        let characteristics = request.characteristics(3);
        assert_eq!(characteristics.features_count, 30);
        assert_eq!(characteristics.ctc_percentage, 80);
        assert_eq!(characteristics.products_max, PRODUCTS_MAX);
        assert_eq!(characteristics.model_name, "FM_40_3");
        assert_eq!(characteristics.ctc_count(), 24);
    }

    #[test]
    fn test_ctc_percentage_truncates() {
        let characteristics = GeneratorCharacteristics::new(10, 0.29, "m");
        assert_eq!(characteristics.ctc_percentage, 28);
        assert_eq!(characteristics.ctc_count(), 2);
    }
}
