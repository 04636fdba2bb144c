//! The event mini-language.
//!
//! Grammar:
//!
//! ```text
//! list   := spec ( (';' | ' ')+ spec )*
//! spec   := KIND '@' dist ( '#' ITERATION )?
//! dist   := 'U,' p
//!         | 'W,' rowRatio ',' colRatio ',' radius
//!         | 'N,' rowRatio ',' colRatio ',' ceil ',' sd
//!         | 'E,' rowRatio ',' colRatio ',' ceil ',' expected
//!         | 'R,' r1 ',' c1 ',' r2 ',' c2
//! ```
//!
//! Every error names the token it could not accept.

use std::str::FromStr;

use crate::distribution::Distribution;
use crate::error::EventError;
use crate::event::{Event, EventKind};

/// Parse a list of event specs separated by semicolons or whitespace.
pub fn parse_event_list(input: &str) -> Result<Vec<Event>, EventError> {
    input
        .split(|c: char| c == ';' || c.is_whitespace())
        .filter(|token| !token.is_empty())
        .map(str::parse)
        .collect()
}

impl FromStr for Event {
    type Err = EventError;

    fn from_str(spec: &str) -> Result<Self, Self::Err> {
        let spec = spec.trim();
        let (body, at) = match spec.split_once('#') {
            Some((body, at)) => {
                let iteration = at
                    .trim()
                    .parse::<u64>()
                    .map_err(|e| EventError::parse(at, format!("schedule is not an iteration: {e}")))?;
                (body, Some(iteration))
            }
            None => (spec, None),
        };

        let (kind, dist) = body
            .split_once('@')
            .ok_or_else(|| EventError::parse(spec, "expected <kind>@<distribution>"))?;
        let kind = kind.trim();
        let mut letters = kind.chars();
        let kind = match (letters.next(), letters.next()) {
            (Some(letter), None) => EventKind::from_letter(letter),
            _ => None,
        }
        .ok_or_else(|| EventError::parse(kind, "unknown event kind (expected D, S, M, X, P or C)"))?;

        Ok(Self {
            kind,
            distribution: dist.parse()?,
            at,
        })
    }
}

impl FromStr for Distribution {
    type Err = EventError;

    fn from_str(spec: &str) -> Result<Self, Self::Err> {
        let tokens: Vec<&str> = spec.split(',').map(str::trim).collect();
        let Some((&letter, args)) = tokens.split_first() else {
            return Err(EventError::parse(spec, "empty distribution"));
        };

        let dist = match letter.to_ascii_uppercase().as_str() {
            "U" => {
                let [p] = arity(spec, args)?;
                Self::Uniform {
                    p: probability(p)?,
                }
            }
            "W" => {
                let [row, col, radius] = arity(spec, args)?;
                Self::Neumann {
                    row_ratio: probability(row)?,
                    col_ratio: probability(col)?,
                    radius: integer(radius)?,
                }
            }
            "N" => {
                let [row, col, ceil, sd] = arity(spec, args)?;
                let spread = number(sd)?;
                if spread <= 0.0 {
                    return Err(EventError::parse(sd, "standard deviation must be positive"));
                }
                Self::Normal {
                    row_ratio: probability(row)?,
                    col_ratio: probability(col)?,
                    ceil: probability(ceil)?,
                    sd: spread,
                }
            }
            "E" => {
                let [row, col, ceil, expected] = arity(spec, args)?;
                let peak = probability(ceil)?;
                let fraction = number(expected)?;
                if fraction <= 0.0 || fraction > peak {
                    return Err(EventError::parse(
                        expected,
                        format!("expected fraction must lie in (0, {peak}]"),
                    ));
                }
                Self::Expected {
                    row_ratio: probability(row)?,
                    col_ratio: probability(col)?,
                    ceil: peak,
                    expected: fraction,
                }
            }
            "R" => {
                let [r1, c1, r2, c2] = arity(spec, args)?;
                Self::Rect {
                    r1: integer(r1)?,
                    c1: integer(c1)?,
                    r2: integer(r2)?,
                    c2: integer(c2)?,
                }
            }
            _ => {
                return Err(EventError::parse(
                    letter,
                    "unknown distribution (expected U, W, N, E or R)",
                ));
            }
        };
        Ok(dist)
    }
}

fn arity<'a, const N: usize>(spec: &str, args: &[&'a str]) -> Result<[&'a str; N], EventError> {
    <[&str; N]>::try_from(args)
        .ok()
        .ok_or_else(|| EventError::parse(spec, format!("expected {N} arguments, found {}", args.len())))
}

fn number(token: &str) -> Result<f64, EventError> {
    let value = token
        .parse::<f64>()
        .map_err(|e| EventError::parse(token, format!("not a number: {e}")))?;
    if value.is_finite() {
        Ok(value)
    } else {
        Err(EventError::parse(token, "not a finite number"))
    }
}

fn probability(token: &str) -> Result<f64, EventError> {
    let value = number(token)?;
    if (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(EventError::parse(token, "must lie in [0, 1]"))
    }
}

fn integer(token: &str) -> Result<usize, EventError> {
    token
        .parse::<usize>()
        .map_err(|e| EventError::parse(token, format!("not a non-negative integer: {e}")))
}
