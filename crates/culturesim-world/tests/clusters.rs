//! Cluster counting on hand-built grids.

#![allow(clippy::unwrap_used, clippy::arithmetic_side_effects)]

use culturesim_types::{GridShape, Trait};
use culturesim_world::{
    BeliefGrid, ClusterMetrics, ClusterStats, NeighborTopology, energy, foreign_dispersion,
};

fn striped(rows: usize, cols: usize) -> BeliefGrid {
    let shape = GridShape::new(rows, cols);
    let values = (0..shape.len())
        .map(|cell| Trait::try_from(shape.coords(cell).1 % 2).unwrap())
        .collect();
    BeliefGrid::from_values(shape, 1, values).unwrap()
}

#[test]
fn uniform_grid_has_one_cluster_of_everyone() {
    for (rows, cols) in [(1, 1), (3, 8), (10, 10)] {
        let grid = BeliefGrid::uniform(GridShape::new(rows, cols), 4, 3);
        let topo = NeighborTopology::build(grid.shape(), 2);
        let mut metrics = ClusterMetrics::new(rows * cols);
        let all = (rows * cols) as u64;
        assert_eq!(metrics.bordered(&grid), ClusterStats { count: 1, largest: all });
        assert_eq!(metrics.borderless(&grid, &topo), ClusterStats { count: 1, largest: all });
    }
}

#[test]
fn column_stripes() {
    let grid = striped(6, 5);
    let mut metrics = ClusterMetrics::new(30);
    assert_eq!(metrics.bordered(&grid), ClusterStats { count: 5, largest: 6 });

    // Radius 2 jumps over a column, merging stripes of the same parity.
    let topo = NeighborTopology::build(grid.shape(), 2);
    assert_eq!(metrics.borderless(&grid, &topo), ClusterStats { count: 2, largest: 18 });

    assert_eq!(energy(&grid), 6 * 4);
}

#[test]
fn dead_and_foreign_agents_cluster_by_value() {
    let shape = GridShape::new(2, 3);
    let mut grid = BeliefGrid::uniform(shape, 2, 0);
    grid.make_foreign(0);
    grid.make_foreign(1);
    grid.kill(2);
    let mut metrics = ClusterMetrics::new(6);
    let stats = metrics.bordered(&grid);
    assert_eq!(stats, ClusterStats { count: 3, largest: 3 });
    assert_eq!(foreign_dispersion(&grid), 4);
}
