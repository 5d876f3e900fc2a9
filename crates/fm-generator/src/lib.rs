//! # fm-generator
//!
//! Generates feature models whose relationship plus cross-tree constraint
//! count is exactly the requested number, and which admit at least one
//! configuration.
//!
//! # Usage
//!
//! ```bash
//! # Three models with 40 constraints each into ./models
//! cargo run -p fm-generator --bin fm-gen -- -c 40 -n 3 -o ./models
//!
//! # Reproducible run on four threads, with a JSON report
//! cargo run -p fm-generator --bin fm-gen -- -c 40 -n 8 --seed 7 --jobs 4 --report run.json
//! ```
//!
//! # Architecture
//!
//! ```text
//! GenerationRequest ──> select_strategy ──> CandidateProducer
//!                                           (Direct | Search)
//!                                                 │ candidate
//!                                                 ▼
//!                         persist ──> FM_{C}_{i}.splx
//!                                                 │
//!                                                 ▼
//!                         CandidateValidator (parse + solve + count)
//!                                                 │
//!                          accepted ◄─────────────┴──────────► rejected
//!                                                              (delete, retry)
//! ```

pub mod controller;
pub mod fitness;
pub mod persistence;
pub mod report;
pub mod strategy;
pub mod validator;

pub use controller::{
    AcceptedModel, AttemptCounter, ControllerConfig, GenerationController, GenerationError,
};
pub use fitness::{score, ConstraintCountFitness};
pub use persistence::{patch_header, persist, PersistenceFailure};
pub use report::GenerationReport;
pub use strategy::{
    select_strategy, CandidateModel, CandidateProducer, DirectProducer, SearchProducer, Strategy,
    SEARCH_FEATURES_MIN,
};
pub use validator::{CandidateValidator, ValidationFailure, ValidationOutcome};
