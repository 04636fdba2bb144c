//! Institution arena and circular membership lists.
//!
//! Institutions are addressed by ids in the same index space as cells and
//! never move. Every agent belongs to exactly one institution; the members
//! of one institution form a circular doubly-linked list threaded through
//! the per-cell `left`/`right` arrays, so join and leave are O(1) and
//! enumeration is O(members).
//!
//! # Invariants
//!
//! - For every id with `count > 0`, following `right` from its anchor
//!   exactly `count` times returns to the anchor, visiting exactly the cells
//!   whose `membership` equals that id.
//! - `left[right[x]] == x` for every cell.
//! - Member counts sum to the number of cells.
//!
//! An id with count 0 is logically dead. Its trait slots are cleared when
//! [`InstitutionRegistry::abandon`] reuses it.

use serde::{Deserialize, Serialize};

use culturesim_types::{Cell, GridShape, Trait, UNSET};

use crate::error::WorldError;

/// Institution records plus the membership links of every agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstitutionRegistry {
    shape: GridShape,
    features: usize,
    /// Institution id of every cell.
    membership: Vec<Cell>,
    /// Previous member in the cell's circular list.
    left: Vec<Cell>,
    /// Next member in the cell's circular list.
    right: Vec<Cell>,
    /// Live member count per institution id.
    counts: Vec<u32>,
    /// Any current member of each live institution.
    anchors: Vec<Cell>,
    /// Institution traits, `id * features + feature`.
    traits: Vec<Trait>,
}

/// Iterator over the members of one institution, in list order.
#[derive(Debug, Clone)]
pub struct Members<'a> {
    right: &'a [Cell],
    next: Cell,
    remaining: u32,
}

impl Iterator for Members<'_> {
    type Item = Cell;

    fn next(&mut self) -> Option<Cell> {
        if self.remaining == 0 {
            return None;
        }
        let current = self.next;
        self.next = self.right.get(current).copied().unwrap_or(current);
        self.remaining = self.remaining.saturating_sub(1);
        Some(current)
    }
}

// Every index used below is either a cell checked by `check` or an id read
// back from `membership`, which only ever holds in-range ids.
#[allow(clippy::indexing_slicing, clippy::arithmetic_side_effects)]
impl InstitutionRegistry {
    /// Every agent founds its own institution (id = its cell) with every
    /// trait [`UNSET`].
    pub fn singletons(shape: GridShape, features: usize) -> Self {
        let len = shape.len();
        let cells: Vec<Cell> = (0..len).collect();
        Self {
            shape,
            features,
            membership: cells.clone(),
            left: cells.clone(),
            right: cells.clone(),
            counts: vec![1; len],
            anchors: cells,
            traits: vec![UNSET; len * features],
        }
    }

    /// Grid dimensions.
    pub const fn shape(&self) -> GridShape {
        self.shape
    }

    /// Trait-vector length.
    pub const fn features(&self) -> usize {
        self.features
    }

    /// Number of cells (and institution ids).
    pub fn len(&self) -> usize {
        self.membership.len()
    }

    /// Whether the arena is empty.
    pub fn is_empty(&self) -> bool {
        self.membership.is_empty()
    }

    /// Institution id of the agent at `cell`.
    pub fn institution_of(&self, cell: Cell) -> Cell {
        self.membership[cell]
    }

    /// Live member count of institution `id`.
    pub fn member_count(&self, id: Cell) -> u32 {
        self.counts[id]
    }

    /// Trait vector of institution `id`.
    pub fn traits(&self, id: Cell) -> &[Trait] {
        let start = id * self.features;
        &self.traits[start..start + self.features]
    }

    /// One trait of institution `id`.
    pub fn trait_at(&self, id: Cell, feature: usize) -> Trait {
        self.traits[id * self.features + feature]
    }

    /// Overwrite one trait of institution `id`.
    pub fn set_trait(&mut self, id: Cell, feature: usize, value: Trait) {
        self.traits[id * self.features + feature] = value;
    }

    /// Overwrite every trait of institution `id`.
    pub fn fill_traits(&mut self, id: Cell, value: Trait) {
        let start = id * self.features;
        self.traits[start..start + self.features].fill(value);
    }

    /// Reset every trait of institution `id` to [`UNSET`].
    pub fn clear_traits(&mut self, id: Cell) {
        self.fill_traits(id, UNSET);
    }

    /// Walk the circular list of institution `id`.
    ///
    /// Yields nothing for a dead institution.
    pub fn members(&self, id: Cell) -> Members<'_> {
        let remaining = self.counts.get(id).copied().unwrap_or(0);
        Members {
            right: &self.right,
            next: self.anchors.get(id).copied().unwrap_or(id),
            remaining,
        }
    }

    /// Ids of every institution with at least one member, ascending.
    pub fn live_institutions(&self) -> impl Iterator<Item = Cell> + '_ {
        self.counts
            .iter()
            .enumerate()
            .filter(|(_, count)| **count > 0)
            .map(|(id, _)| id)
    }

    /// Number of institutions with at least one member.
    pub fn institution_count(&self) -> u64 {
        self.counts.iter().filter(|c| **c > 0).count() as u64
    }

    /// Member count of the largest institution.
    pub fn largest_institution(&self) -> u64 {
        u64::from(self.counts.iter().copied().max().unwrap_or(0))
    }

    /// Make the agent at `cell` leave its institution and found a new one.
    ///
    /// A singleton member keeps its institution unchanged. Otherwise the
    /// agent is unlinked, self-linked, and given the nearest unused id
    /// (spiral search outward from `cell`), whose traits are cleared.
    /// Returns the agent's institution id after the call.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::CellOutOfRange`] for an invalid cell, or
    /// [`WorldError::NoFreeInstitution`] if no id has zero members (which
    /// cannot happen while the counts are conserved).
    pub fn abandon(&mut self, cell: Cell) -> Result<Cell, WorldError> {
        self.check(cell)?;
        let old = self.membership[cell];
        if self.counts[old] <= 1 {
            return Ok(old);
        }
        let fresh = self
            .find_free_id(cell)
            .ok_or(WorldError::NoFreeInstitution { cell })?;

        self.unlink(cell);
        self.left[cell] = cell;
        self.right[cell] = cell;
        self.membership[cell] = fresh;
        self.counts[fresh] = 1;
        self.anchors[fresh] = cell;
        self.clear_traits(fresh);
        Ok(fresh)
    }

    /// Move the agent at `cell` into the institution of the agent at
    /// `target`, splicing it in immediately after `target`.
    ///
    /// A no-op when both already share an institution.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::CellOutOfRange`] for an invalid cell.
    pub fn move_to(&mut self, cell: Cell, target: Cell) -> Result<(), WorldError> {
        self.check(cell)?;
        self.check(target)?;
        let destination = self.membership[target];
        if self.membership[cell] == destination {
            return Ok(());
        }

        self.unlink(cell);

        let after = self.right[target];
        self.right[target] = cell;
        self.left[cell] = target;
        self.right[cell] = after;
        self.left[after] = cell;
        self.membership[cell] = destination;
        self.counts[destination] += 1;
        Ok(())
    }

    /// Check the cycle invariant and conservation of member counts.
    ///
    /// Array lengths and link targets are checked first, so a registry
    /// deserialized from untrusted bytes is rejected rather than indexed.
    ///
    /// # Errors
    ///
    /// Returns the first violation found.
    pub fn verify(&self) -> Result<(), WorldError> {
        self.verify_layout()?;
        let len = self.len();
        let total: u64 = self.counts.iter().map(|&c| u64::from(c)).sum();
        if total != len as u64 {
            return Err(WorldError::CountMismatch {
                expected: len as u64,
                actual: total,
            });
        }

        let mut tally = vec![0_u32; len];
        for cell in 0..len {
            let id = self.membership[cell];
            if id >= len {
                return Err(WorldError::CellOutOfRange { cell: id, len });
            }
            tally[id] += 1;
            if self.left[self.right[cell]] != cell {
                return Err(WorldError::MembershipCorrupted {
                    institution: id,
                    reason: format!("left[right[{cell}]] does not point back"),
                });
            }
        }

        let mut seen = vec![false; len];
        for id in 0..len {
            let count = self.counts[id];
            if tally[id] != count {
                return Err(WorldError::MembershipCorrupted {
                    institution: id,
                    reason: format!("count is {count} but {} cells reference it", tally[id]),
                });
            }
            if count == 0 {
                continue;
            }
            let anchor = self.anchors[id];
            let mut current = anchor;
            for step in 0..count {
                if self.membership[current] != id {
                    return Err(WorldError::MembershipCorrupted {
                        institution: id,
                        reason: format!("step {step} reached cell {current} of another institution"),
                    });
                }
                if seen[current] {
                    return Err(WorldError::MembershipCorrupted {
                        institution: id,
                        reason: format!("cell {current} visited twice"),
                    });
                }
                seen[current] = true;
                current = self.right[current];
            }
            if current != anchor {
                return Err(WorldError::MembershipCorrupted {
                    institution: id,
                    reason: format!("walk of {count} steps ended at {current}, not {anchor}"),
                });
            }
        }
        Ok(())
    }

    fn verify_layout(&self) -> Result<(), WorldError> {
        let len = self.shape.len();
        let sized = |name: &str, actual: usize, expected: usize| {
            if actual == expected {
                Ok(())
            } else {
                Err(WorldError::ShapeMismatch {
                    reason: format!("registry {name} holds {actual} entries, expected {expected}"),
                })
            }
        };
        sized("membership", self.membership.len(), len)?;
        sized("left", self.left.len(), len)?;
        sized("right", self.right.len(), len)?;
        sized("counts", self.counts.len(), len)?;
        sized("anchors", self.anchors.len(), len)?;
        sized(
            "traits",
            self.traits.len(),
            len.saturating_mul(self.features),
        )?;

        let links = [&self.membership, &self.left, &self.right, &self.anchors];
        for &cell in links.into_iter().flatten() {
            self.check(cell)?;
        }
        Ok(())
    }

    fn check(&self, cell: Cell) -> Result<(), WorldError> {
        if cell < self.len() {
            Ok(())
        } else {
            Err(WorldError::CellOutOfRange {
                cell,
                len: self.len(),
            })
        }
    }

    /// Splice `cell` out of its list and decrement its institution's count.
    /// Leaves `cell`'s own links stale; callers relink it.
    fn unlink(&mut self, cell: Cell) {
        let id = self.membership[cell];
        let prev = self.left[cell];
        let next = self.right[cell];
        self.right[prev] = next;
        self.left[next] = prev;
        self.counts[id] -= 1;
        if self.anchors[id] == cell {
            self.anchors[id] = next;
        }
    }

    /// Nearest id with zero members, searching square rings of growing
    /// radius around `cell`, then scanning the whole arena.
    fn find_free_id(&self, cell: Cell) -> Option<Cell> {
        let (row, col) = self.shape.coords(cell);
        let max_ring = self.shape.rows.max(self.shape.cols);
        for ring in 0..=max_ring {
            if let Some(id) = self.ring_cells(row, col, ring).find(|&id| self.counts[id] == 0) {
                return Some(id);
            }
        }
        self.counts.iter().position(|&c| c == 0)
    }

    /// In-bounds cells at Chebyshev distance exactly `ring` from
    /// `(row, col)`: top edge, bottom edge, then the two sides.
    #[allow(clippy::cast_possible_wrap)]
    fn ring_cells(&self, row: usize, col: usize, ring: usize) -> impl Iterator<Item = Cell> + '_ {
        let shape = self.shape;
        let (row, col, ring) = (row as isize, col as isize, ring as isize);
        let horizontal = (-ring..=ring).flat_map(move |dc| {
            let top = [(row - ring, col + dc)];
            let bottom = if ring == 0 { None } else { Some((row + ring, col + dc)) };
            top.into_iter().chain(bottom)
        });
        let vertical = (1 - ring..ring).flat_map(move |dr| {
            [(row + dr, col - ring), (row + dr, col + ring)]
        });
        horizontal
            .chain(vertical)
            .filter_map(move |(r, c)| {
                let r = usize::try_from(r).ok()?;
                let c = usize::try_from(c).ok()?;
                shape.index(r, c)
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry(rows: usize, cols: usize) -> InstitutionRegistry {
        InstitutionRegistry::singletons(GridShape::new(rows, cols), 2)
    }

    #[test]
    fn singletons_are_valid() {
        let reg = registry(3, 4);
        assert!(reg.verify().is_ok());
        assert_eq!(reg.institution_count(), 12);
        assert_eq!(reg.largest_institution(), 1);
        assert_eq!(reg.traits(5), &[UNSET, UNSET]);
    }

    #[test]
    fn move_to_splices_after_target() {
        let mut reg = registry(2, 2);
        assert!(reg.move_to(0, 1).is_ok());
        assert!(reg.move_to(2, 1).is_ok());
        assert!(reg.verify().is_ok());
        assert_eq!(reg.institution_of(0), 1);
        assert_eq!(reg.institution_of(2), 1);
        assert_eq!(reg.member_count(1), 3);
        assert_eq!(reg.member_count(0), 0);
        let members: Vec<Cell> = reg.members(1).collect();
        assert_eq!(members, vec![1, 2, 0]);
        assert_eq!(reg.institution_count(), 2);
    }

    #[test]
    fn move_to_same_institution_is_noop() {
        let mut reg = registry(2, 2);
        assert!(reg.move_to(0, 1).is_ok());
        let before = reg.clone();
        assert!(reg.move_to(0, 1).is_ok());
        assert!(reg.move_to(1, 0).is_ok());
        assert_eq!(reg, before);
    }

    #[test]
    fn abandon_singleton_keeps_id() {
        let mut reg = registry(2, 2);
        assert_eq!(reg.abandon(3), Ok(3));
        assert!(reg.verify().is_ok());
    }

    #[test]
    fn abandon_prefers_own_free_id_and_clears_traits() {
        let mut reg = registry(3, 3);
        assert!(reg.move_to(4, 0).is_ok());
        reg.set_trait(4, 0, 7);
        // Id 4 is now free and is the nearest one to cell 4.
        assert_eq!(reg.abandon(4), Ok(4));
        assert_eq!(reg.traits(4), &[UNSET, UNSET]);
        assert!(reg.verify().is_ok());
    }

    #[test]
    fn abandon_spirals_to_nearest_free_id() {
        let mut reg = registry(3, 3);
        // Cell 8 (corner) joins institution 0; id 8 becomes free.
        assert!(reg.move_to(8, 0).is_ok());
        // Cell 1 joins institution 0 too; id 1 becomes free.
        assert!(reg.move_to(1, 0).is_ok());
        // Cell 0 leaves: nearest free id around (0,0) is 1.
        assert_eq!(reg.abandon(0), Ok(1));
        assert!(reg.verify().is_ok());
        assert_eq!(reg.member_count(0), 2);
    }

    #[test]
    fn anchor_follows_departing_member() {
        let mut reg = registry(1, 3);
        assert!(reg.move_to(1, 0).is_ok());
        assert!(reg.move_to(2, 0).is_ok());
        // Cell 0 is the anchor of institution 0; moving it away must not
        // break enumeration of the remaining members.
        assert_eq!(reg.abandon(0), Ok(1));
        assert!(reg.verify().is_ok());
        let mut rest: Vec<Cell> = reg.members(0).collect();
        rest.sort_unstable();
        assert_eq!(rest, vec![1, 2]);
    }

    #[test]
    fn out_of_range_is_an_error() {
        let mut reg = registry(2, 2);
        assert!(matches!(reg.move_to(9, 0), Err(WorldError::CellOutOfRange { .. })));
        assert!(matches!(reg.abandon(4), Err(WorldError::CellOutOfRange { .. })));
    }

    #[test]
    fn verify_detects_corruption() {
        let mut reg = registry(2, 2);
        reg.counts[0] = 2;
        assert!(reg.verify().is_err());
    }

    #[test]
    fn verify_rejects_out_of_range_links_without_indexing_them() {
        let mut reg = registry(2, 2);
        reg.membership[0] = 999;
        assert_eq!(
            reg.verify(),
            Err(WorldError::CellOutOfRange { cell: 999, len: 4 })
        );

        let mut reg = registry(2, 2);
        reg.right[3] = 4;
        assert!(matches!(reg.verify(), Err(WorldError::CellOutOfRange { cell: 4, .. })));

        let mut reg = registry(2, 2);
        reg.left.pop();
        assert!(matches!(reg.verify(), Err(WorldError::ShapeMismatch { .. })));
    }
}
