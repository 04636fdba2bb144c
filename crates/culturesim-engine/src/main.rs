//! Command-line runner for culturesim.
//!
//! Loads an experiment definition (or the snapshots of an interrupted
//! one), executes every run on a bounded worker pool, and writes per-run
//! checkpoint logs plus an aggregate results file.
//!
//! # Startup Sequence
//!
//! 1. Parse the command line
//! 2. Load the executor configuration (YAML file, then environment)
//! 3. Initialize structured logging (tracing)
//! 4. Parse `--events` and plan the runs, or load snapshots to resume
//! 5. Install the Ctrl-C handler, which cancels every run
//! 6. Execute and report
//!
//! Bad input (missing files, malformed experiment lines or event specs)
//! exits with code 2 before any run starts. Exit code 1 means at least
//! one run failed or the output directory was unusable.

mod cli;
mod error;

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use culturesim_core::{
    ExecutorConfig, RunExecutor, RunStatus, SimulationRun, load_experiment, plan_runs,
};
use culturesim_events::{Event, parse_event_list};

use crate::cli::Cli;
use crate::error::EngineError;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(code) => code,
        Err(err) => {
            error!(error = format!("{err:#}"), "culturesim failed");
            eprintln!("culturesim: {err:#}");
            err.downcast_ref::<EngineError>()
                .map_or(ExitCode::FAILURE, EngineError::exit_code)
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let config = load_config(&cli)?;
    init_logging(&config.log_level, cli.json);
    info!(
        output = %config.output_dir.display(),
        workers = config.effective_workers(),
        base_seed = config.base_seed,
        snapshot_every = config.snapshot_every,
        "culturesim starting"
    );

    let events = parse_events(&cli.events)?;
    let executor = Arc::new(RunExecutor::new(config));

    let runs = if let Some(path) = &cli.experiment {
        let groups = load_experiment(path)
            .map_err(EngineError::from)
            .with_context(|| format!("loading experiment {}", path.display()))?;
        let base_seed = executor.config().base_seed;
        plan_runs(&groups, base_seed)
            .into_iter()
            .map(|planned| {
                info!(run_id = planned.run_id, seed = planned.config.seed, "run planned");
                SimulationRun::new(planned.run_id, planned.config, events.clone())
            })
            .collect::<Vec<_>>()
    } else {
        if !events.is_empty() {
            warn!("--events is ignored when resuming; runs keep their pending events");
        }
        executor
            .load_snapshots()
            .map_err(EngineError::from)
            .context("loading snapshots to resume")?
    };

    if runs.is_empty() {
        warn!("nothing to run");
        return Ok(ExitCode::SUCCESS);
    }

    tokio::spawn({
        let executor = Arc::clone(&executor);
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupt received, canceling runs at their next checkpoint");
                executor.cancel_all();
            }
        }
    });

    let reports = executor
        .run_all(runs)
        .await
        .map_err(EngineError::from)
        .context("executing runs")?;

    let failed = reports.iter().filter(|r| r.status == RunStatus::Failed).count();
    let canceled = reports.iter().filter(|r| r.status == RunStatus::Canceled).count();
    info!(
        runs = reports.len(),
        failed,
        canceled,
        results = %executor.config().results_path().display(),
        "culturesim finished"
    );
    if canceled > 0 {
        info!(
            resume = %executor.config().output_dir.display(),
            "canceled runs can be continued with --resume"
        );
    }
    Ok(if failed > 0 {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

fn load_config(cli: &Cli) -> Result<ExecutorConfig, EngineError> {
    let mut config = match &cli.config {
        Some(path) if !path.is_file() => {
            return Err(EngineError::MissingPath { path: path.clone() });
        }
        Some(path) => ExecutorConfig::from_file(path)?,
        None => ExecutorConfig::from_env()?,
    };
    if let Some(dir) = &cli.resume {
        if !dir.is_dir() {
            return Err(EngineError::MissingPath { path: dir.clone() });
        }
        config.output_dir.clone_from(dir);
    } else if let Some(dir) = &cli.output {
        config.output_dir.clone_from(dir);
    }
    if let Some(path) = cli.experiment.as_ref().filter(|p| !p.is_file()) {
        return Err(EngineError::MissingPath { path: path.clone() });
    }
    Ok(config)
}

/// `RUST_LOG` wins over the configured level.
fn init_logging(level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(true);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn parse_events(specs: &[String]) -> Result<Vec<Event>, EngineError> {
    let mut events = Vec::new();
    for spec in specs {
        events.extend(parse_event_list(spec)?);
    }
    Ok(events)
}
