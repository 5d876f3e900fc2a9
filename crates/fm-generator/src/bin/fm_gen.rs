//! CLI for generating feature models with an exact constraint count.
//!
//! # Usage
//!
//! ```bash
//! # One model with 6 constraints in the current directory
//! cargo run -p fm-generator --bin fm-gen -- -c 6 -n 1
//!
//! # Ten models, 50% cross-tree constraints, 20 search generations
//! cargo run -p fm-generator --bin fm-gen -- -c 40 -n 10 --ctc 0.5 -g 20 -o ./models
//!
//! # Reproduce a run
//! FMG_SEED=12345 cargo run -p fm-generator --bin fm-gen -- -c 40 -n 10
//! ```
//!
//! Diagnostics go to stderr; set `RUST_LOG=debug` to see every attempt.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use fm_core::GenerationRequest;
use fm_generator::{ControllerConfig, GenerationController, GenerationError, GenerationReport};

#[derive(Parser, Debug)]
#[command(name = "fm-gen")]
#[command(about = "Generate consistent feature models with an exact number of constraints")]
#[command(version)]
struct Args {
    /// Relationships plus cross-tree constraints per model
    #[arg(short = 'c', long = "constraints")]
    constraints: u32,

    /// Number of feature models to generate
    #[arg(short = 'n', long = "feature-models", alias = "fm")]
    feature_models: u32,

    /// Cross-tree constraint ratio, relative to the number of features
    #[arg(long, default_value_t = 0.8)]
    ctc: f64,

    /// Maximum generations of the evolutionary search
    #[arg(short = 'g', long = "max-generations", default_value_t = 5)]
    max_generations: u32,

    /// Output directory
    #[arg(short = 'o', long = "out", default_value = "./")]
    out: PathBuf,

    /// Run seed (defaults to FMG_SEED, else random)
    #[arg(long)]
    seed: Option<u64>,

    /// Attempts per model before giving up (0 = unbounded)
    #[arg(long = "max-attempts", default_value_t = 100_000)]
    max_attempts: u64,

    /// Worker threads (0 = one per CPU)
    #[arg(long, default_value_t = 1)]
    jobs: usize,

    /// Population size of the evolutionary search
    #[arg(long, default_value_t = 20)]
    population: usize,

    /// Write a JSON run report to this file
    #[arg(long)]
    report: Option<PathBuf>,

    /// Suppress the banner and progress lines
    #[arg(short = 'q', long)]
    quiet: bool,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    if !args.quiet {
        print_banner();
    }

    let exit = match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    };

    if !args.quiet {
        println!();
        println!("DONE.");
    }
    exit
}

fn run(args: &Args) -> Result<(), GenerationError> {
    let request = GenerationRequest::new(
        args.constraints,
        args.feature_models,
        args.ctc,
        args.max_generations,
        args.out.clone(),
    )?;

    let seed = args.seed.unwrap_or_else(fm_random::get_or_generate_seed);
    let config = ControllerConfig {
        attempts_max: (args.max_attempts > 0).then_some(args.max_attempts),
        jobs: args.jobs,
        population_size: args.population.max(1),
        verbose: !args.quiet,
        seed,
    };

    if config.verbose {
        println!("Seed: {} (set FMG_SEED={} to reproduce)", seed, seed);
        println!("Output: {}", request.output_dir().display());
    }

    let controller = GenerationController::new(request.clone(), config);
    let models = controller.run()?;

    if let Some(path) = &args.report {
        let report = GenerationReport::new(seed, request, models);
        report.write(path)?;
        if !args.quiet {
            println!();
            println!(
                "Report written to: {} ({} models, {} attempts)",
                path.display(),
                report.models.len(),
                report.attempts_count()
            );
        }
    }

    Ok(())
}

fn print_banner() {
    println!("Feature Model Generator");
    println!("=======================");
    println!("Generates consistent feature models with an exact number of");
    println!("relationships plus cross-tree constraints.");
}
