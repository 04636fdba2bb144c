//! Command-line surface.

use std::path::PathBuf;

use clap::{ArgGroup, Parser};

/// Run culturesim experiments, or resume canceled ones.
#[derive(Debug, Parser)]
#[command(name = "culturesim")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Agent-based cultural dissemination experiments", long_about = None)]
#[command(group(ArgGroup::new("source").required(true).args(["experiment", "resume"])))]
pub struct Cli {
    /// Experiment definition (comma-separated, one task group per line)
    #[arg(long, value_name = "CSV")]
    pub experiment: Option<PathBuf>,

    /// Results directory of an interrupted experiment to resume
    #[arg(long, value_name = "DIR")]
    pub resume: Option<PathBuf>,

    /// Events applied to every new run, e.g. `D@U,0.1#500` (repeatable)
    #[arg(long = "events", value_name = "SPEC")]
    pub events: Vec<String>,

    /// Executor configuration (YAML)
    #[arg(long, value_name = "YAML")]
    pub config: Option<PathBuf>,

    /// Output directory, overriding the configuration
    #[arg(long, value_name = "DIR")]
    pub output: Option<PathBuf>,

    /// Emit JSON-formatted log lines
    #[arg(long)]
    pub json: bool,
}
