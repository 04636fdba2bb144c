//! Precomputed diamond ("Neumann") neighborhoods.
//!
//! For every cell the topology stores the cells whose Manhattan distance is
//! between 1 and `radius`, clipped at the grid border (the grid is not
//! toroidal). Lists are stored contiguously: `starts[cell]..starts[cell + 1]`
//! indexes into `neighbors`.
//!
//! An interior cell has `r^2 + (r + 1)^2 - 1` neighbors; border and corner
//! cells have fewer. The lists are built per cell and are rebuilt from
//! scratch whenever a run is set up or restored, never persisted.
//!
//! No two cells are further apart than `rows + cols - 2`, so larger radii
//! are clamped to that distance before enumeration.

use culturesim_types::{Cell, GridShape};

/// Per-cell neighbor lists for one grid shape and radius.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NeighborTopology {
    shape: GridShape,
    radius: usize,
    starts: Vec<usize>,
    neighbors: Vec<Cell>,
}

impl NeighborTopology {
    /// Enumerate the neighborhood of every cell.
    ///
    /// Offsets are visited quadrant-first: for each `(i, j)` with
    /// `0 <= i + j <= radius` (excluding the origin) the four reflections
    /// `(±i, ±j)` are emitted, collapsing duplicates on the axes.
    pub fn build(shape: GridShape, radius: usize) -> Self {
        let len = shape.len();
        let radius = radius.min(max_distance(shape));
        let degree = interior_degree(radius).min(len.saturating_sub(1));
        let mut starts = Vec::with_capacity(len.saturating_add(1));
        let mut neighbors = Vec::with_capacity(len.saturating_mul(degree));

        for cell in 0..len {
            starts.push(neighbors.len());
            let (row, col) = shape.coords(cell);
            for i in 0..=radius {
                for j in 0..=radius.saturating_sub(i) {
                    if i == 0 && j == 0 {
                        continue;
                    }
                    for row_negative in [false, true] {
                        if row_negative && i == 0 {
                            continue;
                        }
                        for col_negative in [false, true] {
                            if col_negative && j == 0 {
                                continue;
                            }
                            let target = shift(row, i, row_negative)
                                .zip(shift(col, j, col_negative))
                                .and_then(|(r, c)| shape.index(r, c));
                            if let Some(target) = target {
                                neighbors.push(target);
                            }
                        }
                    }
                }
            }
        }
        starts.push(neighbors.len());

        Self {
            shape,
            radius,
            starts,
            neighbors,
        }
    }

    /// Neighbors of `cell`, or an empty slice outside the grid.
    pub fn neighbors(&self, cell: Cell) -> &[Cell] {
        let start = self.starts.get(cell).copied();
        let end = self.starts.get(cell.saturating_add(1)).copied();
        match (start, end) {
            (Some(start), Some(end)) => self.neighbors.get(start..end).unwrap_or(&[]),
            _ => &[],
        }
    }

    /// Number of neighbors of `cell`.
    pub fn degree(&self, cell: Cell) -> usize {
        self.neighbors(cell).len()
    }

    /// Grid dimensions this topology was built for.
    pub const fn shape(&self) -> GridShape {
        self.shape
    }

    /// Neighborhood radius, after clamping to the grid diameter.
    pub const fn radius(&self) -> usize {
        self.radius
    }

    /// Total number of directed neighbor links.
    pub fn link_count(&self) -> usize {
        self.neighbors.len()
    }
}

/// Neighbor count of a cell far from every border.
pub const fn interior_degree(radius: usize) -> usize {
    let r2 = radius.saturating_mul(radius);
    let r1 = radius.saturating_add(1);
    r2.saturating_add(r1.saturating_mul(r1)).saturating_sub(1)
}

/// Largest Manhattan distance between two cells of `shape`.
const fn max_distance(shape: GridShape) -> usize {
    shape
        .rows
        .saturating_add(shape.cols)
        .saturating_sub(2)
}

fn shift(base: usize, delta: usize, negative: bool) -> Option<usize> {
    if negative {
        base.checked_sub(delta)
    } else {
        base.checked_add(delta)
    }
}

#[cfg(test)]
#[allow(clippy::arithmetic_side_effects)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;

    #[test]
    fn radius_one_is_von_neumann() {
        let shape = GridShape::new(3, 3);
        let topo = NeighborTopology::build(shape, 1);
        let center = shape.index(1, 1).unwrap_or_default();
        let got: BTreeSet<Cell> = topo.neighbors(center).iter().copied().collect();
        let want: BTreeSet<Cell> = [1, 3, 5, 7].into_iter().collect();
        assert_eq!(got, want);
        assert_eq!(topo.degree(0), 2);
    }

    #[test]
    fn interior_degree_matches_formula() {
        for radius in 1..=4 {
            let side = radius * 2 + 3;
            let shape = GridShape::new(side, side);
            let topo = NeighborTopology::build(shape, radius);
            let center = shape.index(side / 2, side / 2).unwrap_or_default();
            assert_eq!(topo.degree(center), interior_degree(radius));
            assert_eq!(interior_degree(radius), radius * radius + (radius + 1) * (radius + 1) - 1);
        }
    }

    #[test]
    fn no_duplicates_and_no_self() {
        let shape = GridShape::new(7, 6);
        let topo = NeighborTopology::build(shape, 3);
        for cell in 0..shape.len() {
            let list = topo.neighbors(cell);
            let unique: BTreeSet<Cell> = list.iter().copied().collect();
            assert_eq!(unique.len(), list.len());
            assert!(!unique.contains(&cell));
        }
    }

    #[test]
    fn neighbors_are_within_manhattan_radius() {
        let shape = GridShape::new(9, 11);
        let topo = NeighborTopology::build(shape, 2);
        for cell in 0..shape.len() {
            let (r, c) = shape.coords(cell);
            for &n in topo.neighbors(cell) {
                let (nr, nc) = shape.coords(n);
                let dist = r.abs_diff(nr) + c.abs_diff(nc);
                assert!((1..=2).contains(&dist));
            }
        }
    }

    #[test]
    fn edge_cells_have_fewer_neighbors_than_interior_ones() {
        for radius in 1..=3 {
            let side = radius * 2 + 5;
            let shape = GridShape::new(side, side);
            let topo = NeighborTopology::build(shape, radius);
            let interior = interior_degree(radius);
            for k in 1..side - 1 {
                for (r, c) in [(0, k), (side - 1, k), (k, 0), (k, side - 1)] {
                    let cell = shape.index(r, c).unwrap_or_default();
                    assert!(topo.degree(cell) < interior, "radius {radius} cell ({r},{c})");
                }
            }
            for (r, c) in [(0, 0), (0, side - 1), (side - 1, 0), (side - 1, side - 1)] {
                let corner = shape.index(r, c).unwrap_or_default();
                let edge = shape.index(0, side / 2).unwrap_or_default();
                assert!(topo.degree(corner) < topo.degree(edge));
            }
        }
    }

    #[test]
    fn radius_beyond_the_grid_reaches_every_other_cell() {
        let shape = GridShape::new(4, 5);
        for radius in [7, 5_000, 1 << 40, usize::MAX] {
            let topo = NeighborTopology::build(shape, radius);
            assert_eq!(topo.radius(), 7);
            for cell in 0..shape.len() {
                let got: BTreeSet<Cell> = topo.neighbors(cell).iter().copied().collect();
                let want: BTreeSet<Cell> = (0..shape.len()).filter(|&n| n != cell).collect();
                assert_eq!(got, want);
            }
            assert_eq!(topo.link_count(), 20 * 19);
        }
    }

    #[test]
    fn outside_grid_is_empty() {
        let topo = NeighborTopology::build(GridShape::new(2, 2), 1);
        assert!(topo.neighbors(4).is_empty());
    }
}
