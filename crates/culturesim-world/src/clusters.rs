//! Connected-component counters and scalar grid metrics.
//!
//! Two agents belong to the same cluster when their full belief vectors
//! are equal and they are connected by a chain of such agents. The
//! *bordered* pass connects 4-neighbors on the grid; the *borderless* pass
//! connects along the neighborhood lists of the run's topology.
//!
//! [`ClusterMetrics`] keeps its visited flags between calls. Instead of
//! clearing them, every pass flips the meaning of `true`/`false`: a pass
//! visits every cell, so after it the flags are uniformly "seen" and the
//! next pass starts with them uniformly "unseen".

use culturesim_types::{Cell, FOREIGN};

use crate::beliefs::BeliefGrid;
use crate::topology::NeighborTopology;

/// Result of one connected-component pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClusterStats {
    /// Number of clusters.
    pub count: u64,
    /// Size of the largest cluster.
    pub largest: u64,
}

/// Reusable scratch space for cluster passes.
#[derive(Debug, Clone)]
pub struct ClusterMetrics {
    visited: Vec<bool>,
    seen: bool,
    stack: Vec<Cell>,
}

// Cells come from the belief grid and the topology built for the same shape.
#[allow(clippy::indexing_slicing)]
impl ClusterMetrics {
    /// Scratch space for a grid of `len` cells.
    pub fn new(len: usize) -> Self {
        Self {
            visited: vec![false; len],
            seen: true,
            stack: Vec::new(),
        }
    }

    /// Clusters under 4-neighbor grid adjacency.
    pub fn bordered(&mut self, beliefs: &BeliefGrid) -> ClusterStats {
        let shape = beliefs.shape();
        self.flood(beliefs, |cell, out| {
            let (r, c) = shape.coords(cell);
            for (dr, dc) in [(-1, 0), (1, 0), (0, -1), (0, 1)] {
                if let Some(n) = shape.offset(r, c, dr, dc) {
                    out.push(n);
                }
            }
        })
    }

    /// Clusters under neighborhood-radius adjacency.
    pub fn borderless(&mut self, beliefs: &BeliefGrid, topology: &NeighborTopology) -> ClusterStats {
        self.flood(beliefs, |cell, out| out.extend_from_slice(topology.neighbors(cell)))
    }

    fn flood<F>(&mut self, beliefs: &BeliefGrid, adjacent: F) -> ClusterStats
    where
        F: Fn(Cell, &mut Vec<Cell>),
    {
        let len = beliefs.shape().len();
        if self.visited.len() != len {
            self.visited = vec![!self.seen; len];
        }
        let seen = self.seen;
        let mut stats = ClusterStats::default();
        let mut frontier = Vec::new();

        for start in 0..len {
            if self.visited[start] == seen {
                continue;
            }
            self.visited[start] = seen;
            self.stack.clear();
            self.stack.push(start);
            let mut size: u64 = 0;

            while let Some(cell) = self.stack.pop() {
                size = size.saturating_add(1);
                frontier.clear();
                adjacent(cell, &mut frontier);
                for &n in &frontier {
                    if self.visited[n] != seen && beliefs.same_beliefs(cell, n) {
                        self.visited[n] = seen;
                        self.stack.push(n);
                    }
                }
            }

            stats.count = stats.count.saturating_add(1);
            stats.largest = stats.largest.max(size);
        }

        self.seen = !seen;
        stats
    }
}

/// Feature mismatches between every pair of horizontally or vertically
/// adjacent agents.
pub fn energy(beliefs: &BeliefGrid) -> u64 {
    let shape = beliefs.shape();
    let mut total: u64 = 0;
    for cell in 0..shape.len() {
        let (r, c) = shape.coords(cell);
        for (dr, dc) in [(1, 0), (0, 1)] {
            if let Some(n) = shape.offset(r, c, dr, dc) {
                let mismatches = beliefs
                    .get(cell)
                    .iter()
                    .zip(beliefs.get(n))
                    .filter(|(a, b)| a != b)
                    .count();
                total = total.saturating_add(mismatches as u64);
            }
        }
    }
    total
}

/// Features currently holding the foreign trait.
pub fn foreign_dispersion(beliefs: &BeliefGrid) -> u64 {
    beliefs.values().iter().filter(|&&v| v == FOREIGN).count() as u64
}

/// Features equal to the same feature of `starter`.
pub fn similarity(beliefs: &BeliefGrid, starter: &BeliefGrid) -> u64 {
    beliefs
        .values()
        .iter()
        .zip(starter.values())
        .filter(|(a, b)| a == b)
        .count() as u64
}

#[cfg(test)]
mod tests {
    use culturesim_types::GridShape;

    use super::*;

    fn checkerboard(rows: usize, cols: usize) -> BeliefGrid {
        let shape = GridShape::new(rows, cols);
        let values = (0..shape.len())
            .map(|cell| {
                let (r, c) = shape.coords(cell);
                i32::from((r + c) % 2 == 1)
            })
            .collect();
        BeliefGrid::from_values(shape, 1, values).unwrap_or_else(|| BeliefGrid::uniform(shape, 1, 0))
    }

    #[test]
    fn uniform_grid_is_one_cluster() {
        let grid = BeliefGrid::uniform(GridShape::new(5, 7), 3, 2);
        let mut metrics = ClusterMetrics::new(35);
        let stats = metrics.bordered(&grid);
        assert_eq!(stats, ClusterStats { count: 1, largest: 35 });
        assert_eq!(energy(&grid), 0);
    }

    #[test]
    fn checkerboard_is_all_singletons() {
        let grid = checkerboard(4, 6);
        let mut metrics = ClusterMetrics::new(24);
        let stats = metrics.bordered(&grid);
        assert_eq!(stats, ClusterStats { count: 24, largest: 1 });
        // Horizontal: 4 rows * 5 pairs, vertical: 3 * 6 pairs.
        assert_eq!(energy(&grid), 38);
    }

    #[test]
    fn borderless_merges_diagonal_neighbors() {
        let grid = checkerboard(4, 4);
        let topo = NeighborTopology::build(grid.shape(), 2);
        let mut metrics = ClusterMetrics::new(16);
        let stats = metrics.borderless(&grid, &topo);
        // Radius 2 reaches the diagonal cells, which share the parity color.
        assert_eq!(stats, ClusterStats { count: 2, largest: 8 });
    }

    #[test]
    fn repeated_passes_reuse_flags() {
        let grid = checkerboard(3, 3);
        let topo = NeighborTopology::build(grid.shape(), 1);
        let mut metrics = ClusterMetrics::new(9);
        let first = metrics.bordered(&grid);
        let second = metrics.borderless(&grid, &topo);
        let third = metrics.bordered(&grid);
        assert_eq!(first, third);
        assert_eq!(first, second);
    }

    #[test]
    fn foreign_and_similarity() {
        let starter = BeliefGrid::uniform(GridShape::new(2, 2), 2, 0);
        let mut now = starter.clone();
        now.make_foreign(3);
        now.set(0, 1, 4);
        assert_eq!(foreign_dispersion(&now), 2);
        assert_eq!(similarity(&now, &starter), 5);
    }
}
