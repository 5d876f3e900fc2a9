//! Generate → persist → validate loop.
//!
//! Every requested model runs its own loop:
//!
//! ```text
//! Attempting ──> Validating ──> Accepted
//!     ^              │
//!     └── Rejected <─┘   (inconsistent or wrong count; artifact deleted)
//! ```
//!
//! Rejections are routine and retried. Generator, persistence and
//! validation failures end the whole run.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use fm_core::GenerationRequest;
use fm_random::ModelRng;
use fm_sampler::SamplerError;
use rayon::prelude::*;
use serde::Serialize;

use crate::persistence::{persist, remove_artifact, PersistenceFailure};
use crate::strategy::{
    select_strategy, CandidateProducer, DirectProducer, SearchProducer, Strategy,
};
use crate::validator::{CandidateValidator, ValidationFailure, ValidationOutcome};

/// Controller configuration.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Attempts allowed per model before giving up (`None` = unbounded)
    pub attempts_max: Option<u64>,
    /// Worker threads (0 = one per CPU)
    pub jobs: usize,
    /// Population of the evolutionary search
    pub population_size: usize,
    /// Whether to print progress lines
    pub verbose: bool,
    /// Run seed; each model draws from its own stream of it
    pub seed: u64,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            attempts_max: Some(100_000),
            jobs: 1,
            population_size: 20,
            verbose: false,
            seed: 0,
        }
    }
}

impl ControllerConfig {
    /// Quick config for tests.
    pub fn quick() -> Self {
        Self {
            attempts_max: Some(10_000),
            population_size: 10,
            ..Default::default()
        }
    }

    /// Worker threads to use for `models_count` models.
    #[must_use]
    pub fn effective_jobs(&self, models_count: u32) -> usize {
        let jobs = if self.jobs == 0 { num_cpus::get() } else { self.jobs };
        jobs.clamp(1, models_count.max(1) as usize)
    }
}

/// Run-level errors.
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("Invalid request: {0}")]
    Request(#[from] fm_core::RequestError),

    #[error("Generator failed for {model}: {source}")]
    Generation {
        model: String,
        #[source]
        source: SamplerError,
    },

    #[error("Validation failed for {model}: {source}")]
    Validation {
        model: String,
        #[source]
        source: ValidationFailure,
    },

    #[error("Persisting {model} failed: {source}")]
    Persistence {
        model: String,
        #[source]
        source: PersistenceFailure,
    },

    #[error("No acceptable candidate for {model} after {attempts} attempts")]
    InfeasibleTarget { model: String, attempts: u64 },

    #[error("Failed to build worker pool: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),

    #[error("Failed to write report {}: {source}", path.display())]
    Report {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A model that passed validation.
#[derive(Debug, Clone, Serialize)]
pub struct AcceptedModel {
    pub index: u32,
    pub name: String,
    pub path: PathBuf,
    pub strategy: Strategy,
    /// Attempts used, the accepted one included
    pub attempts: u64,
    pub inconsistent_count: u64,
    pub mismatched_count: u64,
    pub features_count: usize,
    pub constraints_count: usize,
    /// Generations the accepted candidate's search ran
    pub generations: u32,
    #[serde(rename = "elapsed_ms", serialize_with = "serialize_millis")]
    pub elapsed: Duration,
}

fn serialize_millis<S: serde::Serializer>(
    elapsed: &Duration,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX))
}

/// Attempt bookkeeping for one model's loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AttemptCounter {
    attempts: u64,
    inconsistent_count: u64,
    mismatched_count: u64,
}

impl AttemptCounter {
    /// Start the next attempt and return its 1-based number.
    pub fn begin(&mut self) -> u64 {
        self.attempts += 1;
        self.attempts
    }

    pub fn record_inconsistent(&mut self) {
        self.inconsistent_count += 1;
    }

    pub fn record_mismatch(&mut self) {
        self.mismatched_count += 1;
    }

    #[must_use]
    pub fn attempts(&self) -> u64 {
        self.attempts
    }

    #[must_use]
    pub fn inconsistent_count(&self) -> u64 {
        self.inconsistent_count
    }

    #[must_use]
    pub fn mismatched_count(&self) -> u64 {
        self.mismatched_count
    }

    /// Whether the cap leaves room for another attempt.
    #[must_use]
    pub fn can_attempt(&self, attempts_max: Option<u64>) -> bool {
        attempts_max.map_or(true, |max| self.attempts < max)
    }
}

/// Progress lines for one model.
///
/// Printed as they come when running sequentially; buffered and printed in
/// one block when workers run in parallel, so models never interleave.
struct Progress {
    verbose: bool,
    live: bool,
    lines: Vec<String>,
}

impl Progress {
    fn new(verbose: bool, live: bool) -> Self {
        Self {
            verbose,
            live,
            lines: Vec::new(),
        }
    }

    fn line(&mut self, line: impl FnOnce() -> String) {
        if !self.verbose {
            return;
        }
        if self.live {
            println!("{}", line());
        } else {
            self.lines.push(line());
        }
    }
}

impl Drop for Progress {
    fn drop(&mut self) {
        if !self.lines.is_empty() {
            use std::io::Write;
            let stdout = std::io::stdout();
            let mut out = stdout.lock();
            for line in &self.lines {
                let _ = writeln!(out, "{}", line);
            }
        }
    }
}

/// Drives generation for a whole request.
pub struct GenerationController {
    request: GenerationRequest,
    config: ControllerConfig,
    producer: Box<dyn CandidateProducer>,
    validator: CandidateValidator,
}

impl GenerationController {
    /// Controller with the producer [`select_strategy`] picks for the
    /// request's feature count.
    pub fn new(request: GenerationRequest, config: ControllerConfig) -> Self {
        let producer: Box<dyn CandidateProducer> =
            match select_strategy(request.target_features_count()) {
                Strategy::Direct => Box::new(DirectProducer::default()),
                Strategy::Search => Box::new(SearchProducer::new(
                    request.constraints_count(),
                    request.generations_max(),
                    config.population_size,
                )),
            };
        Self::with_producer(request, config, producer)
    }

    /// Controller with an explicit producer.
    pub fn with_producer(
        request: GenerationRequest,
        config: ControllerConfig,
        producer: Box<dyn CandidateProducer>,
    ) -> Self {
        debug_assert!(
            config.attempts_max != Some(0),
            "Attempt cap must allow at least one attempt"
        );
        Self {
            request,
            config,
            producer,
            validator: CandidateValidator::default(),
        }
    }

    #[must_use]
    pub fn request(&self) -> &GenerationRequest {
        &self.request
    }

    #[must_use]
    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    #[must_use]
    pub fn strategy(&self) -> Strategy {
        self.producer.strategy()
    }

    /// Generate every requested model, in index order.
    ///
    /// Stops at the first fatal error; models accepted before it stay on
    /// disk.
    pub fn run(&self) -> Result<Vec<AcceptedModel>, GenerationError> {
        let jobs = self.config.effective_jobs(self.request.models_count());

        tracing::info!(
            constraints = self.request.constraints_count(),
            models = self.request.models_count(),
            features = self.request.target_features_count(),
            strategy = %self.strategy(),
            jobs,
            seed = self.config.seed,
            "generation started"
        );

        if jobs <= 1 {
            self.run_sequential()
        } else {
            self.run_parallel(jobs)
        }
    }

    fn run_sequential(&self) -> Result<Vec<AcceptedModel>, GenerationError> {
        let stop = AtomicBool::new(false);
        let mut accepted = Vec::with_capacity(self.request.models_count() as usize);
        for index in 0..self.request.models_count() {
            if let Some(model) = self.generate_model(index, true, &stop)? {
                accepted.push(model);
            }
        }
        Ok(accepted)
    }

    fn run_parallel(&self, jobs: usize) -> Result<Vec<AcceptedModel>, GenerationError> {
        let pool = rayon::ThreadPoolBuilder::new().num_threads(jobs).build()?;
        let stop = AtomicBool::new(false);

        let results: Vec<Result<Option<AcceptedModel>, GenerationError>> = pool.install(|| {
            (0..self.request.models_count())
                .into_par_iter()
                .map(|index| {
                    let result = self.generate_model(index, false, &stop);
                    if result.is_err() {
                        stop.store(true, Ordering::SeqCst);
                    }
                    result
                })
                .collect()
        });

        let mut accepted = Vec::with_capacity(results.len());
        for result in results {
            if let Some(model) = result? {
                accepted.push(model);
            }
        }
        Ok(accepted)
    }

    /// Attempt model `index` until accepted. `Ok(None)` means another
    /// worker failed and this one stopped early.
    fn generate_model(
        &self,
        index: u32,
        live: bool,
        stop: &AtomicBool,
    ) -> Result<Option<AcceptedModel>, GenerationError> {
        let name = self.request.model_name(index);
        let path = self.request.model_path(index);
        let target = self.request.constraints_count() as usize;

        let span = tracing::info_span!("model", name = %name);
        let _enter = span.enter();

        let mut progress = Progress::new(self.config.verbose, live);
        progress.line(String::new);
        progress.line(|| {
            format!(
                "Generating feature model {} with name {}",
                index + 1,
                self.request.file_name(index).to_uppercase()
            )
        });
        progress.line(|| format!("\tNumber of features: {}", self.request.target_features_count()));

        let started = Instant::now();
        let characteristics = self.request.characteristics(index);
        let mut rng = ModelRng::for_stream(self.config.seed, u64::from(index));
        let mut counter = AttemptCounter::default();

        loop {
            if stop.load(Ordering::SeqCst) {
                return Ok(None);
            }
            if !counter.can_attempt(self.config.attempts_max) {
                tracing::warn!(attempts = counter.attempts(), "attempt cap reached");
                return Err(GenerationError::InfeasibleTarget {
                    model: name,
                    attempts: counter.attempts(),
                });
            }

            // Attempting
            let attempt = counter.begin();
            progress.line(|| format!("\tTry {}", attempt));

            let candidate = self
                .producer
                .produce(&characteristics, &mut rng)
                .map_err(|source| GenerationError::Generation {
                    model: name.clone(),
                    source,
                })?;

            tracing::debug!(
                attempt,
                strategy = %candidate.strategy,
                generations = candidate.generations,
                products = ?candidate.products,
                "candidate produced"
            );

            persist(&candidate.model, &path, &name).map_err(|source| {
                GenerationError::Persistence {
                    model: name.clone(),
                    source,
                }
            })?;

            // Validating
            let outcome = self.validator.validate(&path).map_err(|source| {
                GenerationError::Validation {
                    model: name.clone(),
                    source,
                }
            })?;

            match outcome {
                ValidationOutcome::Consistent {
                    features_count,
                    constraints_count,
                } => {
                    progress.line(|| format!("\t\tNumber of features: {}", features_count));
                    progress.line(|| format!("\t\tNumber of constraints: {}", constraints_count));

                    if outcome.accepts(target) {
                        progress.line(|| format!("DONE - {}", name));
                        tracing::info!(attempts = attempt, "model accepted");

                        return Ok(Some(AcceptedModel {
                            index,
                            name,
                            path,
                            strategy: candidate.strategy,
                            attempts: attempt,
                            inconsistent_count: counter.inconsistent_count(),
                            mismatched_count: counter.mismatched_count(),
                            features_count,
                            constraints_count,
                            generations: candidate.generations,
                            elapsed: started.elapsed(),
                        }));
                    }

                    counter.record_mismatch();
                    tracing::debug!(attempt, constraints_count, target, "count mismatch");
                }
                ValidationOutcome::Inconsistent => {
                    counter.record_inconsistent();
                    tracing::debug!(attempt, "inconsistent candidate");
                }
            }

            // Rejected
            remove_artifact(&path).map_err(|source| GenerationError::Persistence {
                model: name.clone(),
                source,
            })?;
        }
    }
}
