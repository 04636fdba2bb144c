//! Spatial trigger distributions.
//!
//! A distribution maps every cell of a grid to a trigger probability:
//!
//! | letter | distribution | probability |
//! |--------|--------------|-------------|
//! | `U` | uniform | constant `p` |
//! | `W` | Neumann | 1 within Manhattan distance `radius` of the center, else 0 |
//! | `N` | normal | `ceil * exp(-(dr^2 + dc^2) / (2 sd^2))` |
//! | `E` | expected normal | `N` with the `sd` that affects `expected * cells` on average |
//! | `R` | rectangle | 1 inside the inclusive box, else 0 |
//!
//! Centers are given as row/column ratios in `[0, 1]` and resolve to the
//! nearest cell.

use std::fmt;

use serde::{Deserialize, Serialize};

use culturesim_types::GridShape;

/// Bisection steps used to fit the `E` distribution.
const FIT_STEPS: usize = 64;

/// Per-cell trigger probability over the grid.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Distribution {
    /// Same probability everywhere.
    Uniform {
        /// Trigger probability.
        p: f64,
    },
    /// Diamond around a center, certain inside.
    Neumann {
        /// Center row as a fraction of the grid height.
        row_ratio: f64,
        /// Center column as a fraction of the grid width.
        col_ratio: f64,
        /// Manhattan radius.
        radius: usize,
    },
    /// Peak-normalized 2D Gaussian.
    Normal {
        /// Center row as a fraction of the grid height.
        row_ratio: f64,
        /// Center column as a fraction of the grid width.
        col_ratio: f64,
        /// Probability at the center.
        ceil: f64,
        /// Standard deviation in cells.
        sd: f64,
    },
    /// Gaussian whose spread is fitted to an expected affected fraction.
    Expected {
        /// Center row as a fraction of the grid height.
        row_ratio: f64,
        /// Center column as a fraction of the grid width.
        col_ratio: f64,
        /// Probability at the center.
        ceil: f64,
        /// Expected fraction of the grid triggered, in `(0, ceil]`.
        expected: f64,
    },
    /// Inclusive box of cells, certain inside.
    Rect {
        /// First corner row.
        r1: usize,
        /// First corner column.
        c1: usize,
        /// Second corner row.
        r2: usize,
        /// Second corner column.
        c2: usize,
    },
}

impl Distribution {
    /// Trigger probability of every cell, in cell order.
    pub fn probabilities(&self, shape: GridShape) -> Vec<f64> {
        match *self {
            Self::Uniform { p } => vec![p; shape.len()],
            Self::Neumann {
                row_ratio,
                col_ratio,
                radius,
            } => {
                let (cr, cc) = center(shape, row_ratio, col_ratio);
                cells(shape)
                    .map(|(r, c)| {
                        let dist = r.abs_diff(cr).saturating_add(c.abs_diff(cc));
                        if dist <= radius { 1.0 } else { 0.0 }
                    })
                    .collect()
            }
            Self::Normal {
                row_ratio,
                col_ratio,
                ceil,
                sd,
            } => gaussian(shape, center(shape, row_ratio, col_ratio), ceil, sd),
            Self::Expected {
                row_ratio,
                col_ratio,
                ceil,
                expected,
            } => {
                let at = center(shape, row_ratio, col_ratio);
                let sd = fit_sd(shape, at, ceil, expected);
                gaussian(shape, at, ceil, sd)
            }
            Self::Rect { r1, c1, r2, c2 } => {
                let (top, bottom) = (r1.min(r2), r1.max(r2));
                let (left, right) = (c1.min(c2), c1.max(c2));
                cells(shape)
                    .map(|(r, c)| {
                        if (top..=bottom).contains(&r) && (left..=right).contains(&c) {
                            1.0
                        } else {
                            0.0
                        }
                    })
                    .collect()
            }
        }
    }
}

impl fmt::Display for Distribution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::Uniform { p } => write!(f, "U,{p}"),
            Self::Neumann {
                row_ratio,
                col_ratio,
                radius,
            } => write!(f, "W,{row_ratio},{col_ratio},{radius}"),
            Self::Normal {
                row_ratio,
                col_ratio,
                ceil,
                sd,
            } => write!(f, "N,{row_ratio},{col_ratio},{ceil},{sd}"),
            Self::Expected {
                row_ratio,
                col_ratio,
                ceil,
                expected,
            } => write!(f, "E,{row_ratio},{col_ratio},{ceil},{expected}"),
            Self::Rect { r1, c1, r2, c2 } => write!(f, "R,{r1},{c1},{r2},{c2}"),
        }
    }
}

fn cells(shape: GridShape) -> impl Iterator<Item = (usize, usize)> {
    (0..shape.len()).map(move |cell| shape.coords(cell))
}

pub(crate) fn to_f64(n: usize) -> f64 {
    f64::from(u32::try_from(n).unwrap_or(u32::MAX))
}

/// Nearest cell to `ratio * (extent - 1)` on each axis.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn center(shape: GridShape, row_ratio: f64, col_ratio: f64) -> (usize, usize) {
    let axis = |ratio: f64, extent: usize| -> usize {
        let last = extent.saturating_sub(1);
        let pos = (ratio.clamp(0.0, 1.0) * to_f64(last)).round();
        (pos.max(0.0) as usize).min(last)
    };
    (axis(row_ratio, shape.rows), axis(col_ratio, shape.cols))
}

fn gaussian(shape: GridShape, (cr, cc): (usize, usize), ceil: f64, sd: f64) -> Vec<f64> {
    let two_var = 2.0 * sd * sd;
    cells(shape)
        .map(|(r, c)| {
            let dr = to_f64(r.abs_diff(cr));
            let dc = to_f64(c.abs_diff(cc));
            if two_var <= 0.0 {
                return if r == cr && c == cc { ceil } else { 0.0 };
            }
            ceil * (-dr.mul_add(dr, dc * dc) / two_var).exp()
        })
        .collect()
}

/// Standard deviation whose Gaussian sums to `expected * cells`.
///
/// The sum grows monotonically with `sd`, so bisection converges; targets
/// beyond what the widest spread reaches resolve to that spread.
fn fit_sd(shape: GridShape, at: (usize, usize), ceil: f64, expected: f64) -> f64 {
    let target = expected * to_f64(shape.len());
    let mut lo = 0.0_f64;
    let mut hi = 4.0 * to_f64(shape.rows.saturating_add(shape.cols)).max(1.0);
    for _ in 0..FIT_STEPS {
        let mid = 0.5 * (lo + hi);
        let total: f64 = gaussian(shape, at, ceil, mid).iter().sum();
        if total < target {
            lo = mid;
        } else {
            hi = mid;
        }
    }
    0.5 * (lo + hi)
}

#[cfg(test)]
#[allow(clippy::indexing_slicing)]
mod tests {
    use super::*;

    fn count_certain(p: &[f64]) -> usize {
        p.iter().filter(|&&v| (v - 1.0).abs() < f64::EPSILON).count()
    }

    #[test]
    fn uniform_is_constant() {
        let p = Distribution::Uniform { p: 0.25 }.probabilities(GridShape::new(3, 4));
        assert_eq!(p.len(), 12);
        assert!(p.iter().all(|&v| (v - 0.25).abs() < f64::EPSILON));
    }

    #[test]
    fn neumann_diamond_is_clipped() {
        let shape = GridShape::new(9, 9);
        let centered = Distribution::Neumann {
            row_ratio: 0.5,
            col_ratio: 0.5,
            radius: 2,
        };
        assert_eq!(count_certain(&centered.probabilities(shape)), 13);

        let corner = Distribution::Neumann {
            row_ratio: 0.0,
            col_ratio: 0.0,
            radius: 2,
        };
        assert_eq!(count_certain(&corner.probabilities(shape)), 6);
    }

    #[test]
    fn rect_normalizes_and_clips() {
        let shape = GridShape::new(5, 5);
        let rect = Distribution::Rect {
            r1: 3,
            c1: 9,
            r2: 1,
            c2: 2,
        };
        let p = rect.probabilities(shape);
        // Rows 1..=3, columns 2..=4 after clipping.
        assert_eq!(count_certain(&p), 9);
        assert!((p[shape.index(1, 2).unwrap_or(0)] - 1.0).abs() < f64::EPSILON);
        assert!(p[shape.index(0, 2).unwrap_or(0)].abs() < f64::EPSILON);
    }

    #[test]
    fn normal_peaks_at_center() {
        let shape = GridShape::new(11, 11);
        let normal = Distribution::Normal {
            row_ratio: 0.5,
            col_ratio: 0.5,
            ceil: 0.8,
            sd: 2.0,
        };
        let p = normal.probabilities(shape);
        let center = shape.index(5, 5).unwrap_or(0);
        assert!((p[center] - 0.8).abs() < 1e-12);
        assert!(p.iter().all(|&v| v <= p[center]));
        assert!(p[0] < 0.01);
    }

    #[test]
    fn expected_fit_matches_target_mass() {
        let shape = GridShape::new(20, 20);
        let dist = Distribution::Expected {
            row_ratio: 0.5,
            col_ratio: 0.5,
            ceil: 1.0,
            expected: 0.1,
        };
        let total: f64 = dist.probabilities(shape).iter().sum();
        assert!((total - 40.0).abs() < 1e-6, "total was {total}");
    }

    #[test]
    fn display_round_trips_the_letter() {
        let d = Distribution::Normal {
            row_ratio: 0.5,
            col_ratio: 0.25,
            ceil: 1.0,
            sd: 3.0,
        };
        assert_eq!(d.to_string(), "N,0.5,0.25,1,3");
    }
}
