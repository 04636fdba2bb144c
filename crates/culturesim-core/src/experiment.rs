//! Experiment definitions.
//!
//! An experiment is a comma-separated file with one task group per line:
//!
//! ```text
//! repetitions,model,random_init,iterations,checkpoint,write_buffer,rows,cols,
//! radius,features,traits,mutation,selection_error,alpha,alpha_prime,freq_dem,freq_prop
//! ```
//!
//! Blank lines, `#` comments and a header line starting with `repetitions`
//! are skipped, as are groups with `repetitions <= 0`. Every accepted group
//! expands into `repetitions` runs with consecutive ids.

use std::path::{Path, PathBuf};

use rand::Rng;

use culturesim_types::{Configuration, ConfigurationError, ModelKind};

/// Number of columns in an experiment line.
pub const EXPERIMENT_COLUMNS: usize = 17;

/// Error type for experiment loading.
#[derive(Debug, thiserror::Error)]
pub enum ExperimentError {
    /// The experiment file could not be read.
    #[error("cannot read experiment {}: {source}", path.display())]
    Io {
        /// Experiment file.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// A line could not be parsed.
    #[error("experiment line {line}: {reason}")]
    Parse {
        /// One-based line number.
        line: usize,
        /// What was wrong.
        reason: String,
    },

    /// A line parsed but describes an invalid configuration.
    #[error("experiment line {line}: {source}")]
    Invalid {
        /// One-based line number.
        line: usize,
        /// The validation failure.
        source: ConfigurationError,
    },
}

/// One accepted line of an experiment file.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskGroup {
    /// One-based line number in the source.
    pub line: usize,
    /// Number of runs to create.
    pub repetitions: u32,
    /// Parameters shared by every run of the group; `seed` is assigned
    /// when the group is expanded.
    pub config: Configuration,
}

/// A run to create: its id and fully seeded configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedRun {
    /// Run identifier, unique within the experiment.
    pub run_id: u64,
    /// Parameters with the final seed.
    pub config: Configuration,
}

/// Read and parse an experiment file.
///
/// # Errors
///
/// Returns [`ExperimentError::Io`] if the file cannot be read, or the first
/// parse or validation error.
pub fn load_experiment(path: &Path) -> Result<Vec<TaskGroup>, ExperimentError> {
    let text = std::fs::read_to_string(path).map_err(|source| ExperimentError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_experiment(&text)
}

/// Parse experiment text.
///
/// # Errors
///
/// Returns the first malformed line ([`ExperimentError::Parse`]) or
/// invalid configuration ([`ExperimentError::Invalid`]).
pub fn parse_experiment(text: &str) -> Result<Vec<TaskGroup>, ExperimentError> {
    let mut groups = Vec::new();
    for (index, raw) in text.lines().enumerate() {
        let line = index.saturating_add(1);
        let trimmed = raw.trim();
        if trimmed.is_empty()
            || trimmed.starts_with('#')
            || trimmed.to_ascii_lowercase().starts_with("repetitions")
        {
            continue;
        }
        if let Some(group) = parse_line(line, trimmed)? {
            groups.push(group);
        }
    }
    Ok(groups)
}

fn parse_line(line: usize, text: &str) -> Result<Option<TaskGroup>, ExperimentError> {
    let fields: Vec<&str> = text.split(',').map(str::trim).collect();
    let Ok(fields) = <[&str; EXPERIMENT_COLUMNS]>::try_from(fields.as_slice()) else {
        return Err(ExperimentError::Parse {
            line,
            reason: format!("expected {EXPERIMENT_COLUMNS} columns, found {}", fields.len()),
        });
    };
    let [
        repetitions,
        model,
        random_init,
        iterations,
        checkpoint,
        write_buffer,
        rows,
        cols,
        radius,
        features,
        traits,
        mutation,
        selection_error,
        alpha,
        alpha_prime,
        democracy,
        propaganda,
    ] = fields;

    let repetitions: i64 = field(line, "repetitions", repetitions)?;
    if repetitions <= 0 {
        tracing::debug!(line, repetitions, "skipping task group without repetitions");
        return Ok(None);
    }

    let model: ModelKind = model
        .parse()
        .map_err(|source| ExperimentError::Invalid { line, source })?;
    let random_init = match random_init {
        "0" => false,
        "1" => true,
        other => {
            return Err(ExperimentError::Parse {
                line,
                reason: format!("random-init flag must be 0 or 1, found `{other}`"),
            });
        }
    };

    let config = Configuration {
        model,
        random_init,
        iterations: field(line, "iterations", iterations)?,
        checkpoint_period: field(line, "checkpoint period", checkpoint)?,
        write_buffer: field(line, "write buffer", write_buffer)?,
        rows: field(line, "rows", rows)?,
        cols: field(line, "cols", cols)?,
        radius: field(line, "radius", radius)?,
        features: field(line, "features", features)?,
        traits: field(line, "traits", traits)?,
        mutation: field(line, "mutation", mutation)?,
        selection_error: field(line, "selection error", selection_error)?,
        alpha: field(line, "alpha", alpha)?,
        alpha_prime: field(line, "alpha prime", alpha_prime)?,
        democracy_period: field(line, "democracy period", democracy)?,
        propaganda_period: field(line, "propaganda period", propaganda)?,
        seed: 0,
    };
    config
        .validate()
        .map_err(|source| ExperimentError::Invalid { line, source })?;

    Ok(Some(TaskGroup {
        line,
        repetitions: u32::try_from(repetitions).unwrap_or(u32::MAX),
        config,
    }))
}

fn field<T>(line: usize, name: &str, token: &str) -> Result<T, ExperimentError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    token.parse().map_err(|e| ExperimentError::Parse {
        line,
        reason: format!("{name} `{token}`: {e}"),
    })
}

/// Expand task groups into runs with ids starting at 0.
///
/// Groups without random initialization get `seed = base_seed + run_id`;
/// the others draw their seed from OS entropy.
pub fn plan_runs(groups: &[TaskGroup], base_seed: u64) -> Vec<PlannedRun> {
    let mut runs = Vec::new();
    let mut next_id: u64 = 0;
    let mut entropy = rand::rng();
    for group in groups {
        for _ in 0..group.repetitions {
            let seed = if group.config.random_init {
                entropy.random::<u64>()
            } else {
                base_seed.wrapping_add(next_id)
            };
            runs.push(PlannedRun {
                run_id: next_id,
                config: Configuration {
                    seed,
                    ..group.config.clone()
                },
            });
            next_id = next_id.saturating_add(1);
        }
    }
    runs
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
repetitions,model,random,iterations,checkpoint,buffer,rows,cols,radius,features,traits,mutation,se,alpha,alpha_prime,dem,prop
# baseline
2,A,0,100,10,5,8,8,1,3,4,0.001,0.0,0.5,0.5,0,0

0,I,0,100,10,5,8,8,1,3,4,0,0,0.5,0.5,0,0
1,institutional,1,200,20,5,10,12,2,5,10,0.01,0.05,0.3,0.7,10,20
";

    #[test]
    fn parses_groups_and_skips_empty_ones() {
        let groups = parse_experiment(SAMPLE).unwrap();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].line, 3);
        assert_eq!(groups[0].repetitions, 2);
        assert_eq!(groups[0].config.model, ModelKind::Axelrod);
        assert!(!groups[0].config.random_init);
        let second = &groups[1].config;
        assert_eq!(second.model, ModelKind::Institutional);
        assert!(second.random_init);
        assert_eq!((second.rows, second.cols, second.radius), (10, 12, 2));
        assert_eq!(second.democracy_period, 10);
        assert_eq!(second.propaganda_period, 20);
    }

    #[test]
    fn plan_assigns_ids_and_seeds() {
        let groups = parse_experiment(SAMPLE).unwrap();
        let runs = plan_runs(&groups, 100);
        assert_eq!(runs.len(), 3);
        assert_eq!(runs.iter().map(|r| r.run_id).collect::<Vec<_>>(), vec![0, 1, 2]);
        assert_eq!(runs[0].config.seed, 100);
        assert_eq!(runs[1].config.seed, 101);
    }

    #[test]
    fn unknown_model_is_fatal() {
        let err = parse_experiment("1,Z,0,100,10,5,8,8,1,3,4,0,0,0.5,0.5,0,0").unwrap_err();
        assert!(matches!(
            err,
            ExperimentError::Invalid {
                line: 1,
                source: ConfigurationError::UnknownModel(_)
            }
        ));
    }

    #[test]
    fn malformed_lines_report_their_number() {
        let err = parse_experiment("\n1,A,0,100\n").unwrap_err();
        assert!(matches!(err, ExperimentError::Parse { line: 2, .. }));

        let err = parse_experiment("1,A,0,lots,10,5,8,8,1,3,4,0,0,0.5,0.5,0,0").unwrap_err();
        assert!(err.to_string().contains("lots"));

        let err = parse_experiment("1,A,2,100,10,5,8,8,1,3,4,0,0,0.5,0.5,0,0").unwrap_err();
        assert!(matches!(err, ExperimentError::Parse { line: 1, .. }));
    }

    #[test]
    fn out_of_range_values_are_invalid() {
        let err = parse_experiment("1,F,0,100,10,5,8,8,1,3,1,0,0,0.5,0.5,0,0").unwrap_err();
        assert!(matches!(err, ExperimentError::Invalid { .. }));
        let err = parse_experiment("1,F,0,100,10,5,8,8,1,3,4,1.5,0,0.5,0.5,0,0").unwrap_err();
        assert!(matches!(err, ExperimentError::Invalid { .. }));
    }
}
