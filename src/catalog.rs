// Copyright (c) 2026-present, egdb-core contributors
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! The slice catalog: a sparse associative table keyed by piece-count
//! tuple `(bm, bk, wm, wk, color)` mapping to the list of subdbs for each
//! subslice of that slice (§4.2).

use crate::position::Color;
use crate::subdb::SubDbId;

const AXIS: usize = 6; // piece counts range 0..=5 per side.
const COLORS: usize = 2;
const CELLS: usize = AXIS * AXIS * AXIS * AXIS * COLORS;

fn cell_index(bm: u8, bk: u8, wm: u8, wk: u8, color: Color) -> usize {
    let color_idx = match color {
        Color::Black => 0,
        Color::White => 1,
    };
    color_idx
        + usize::from(wk) * COLORS
        + usize::from(wm) * COLORS * AXIS
        + usize::from(bk) * COLORS * AXIS * AXIS
        + usize::from(bm) * COLORS * AXIS * AXIS * AXIS
}

/// Dense lookup table from piece tuple to the per-subslice list of
/// subdbs. Cells are `None` until populated during `.idx` parsing; an
/// absent cell means the composition is not in the database.
pub struct SliceCatalog {
    cells: Vec<Option<Vec<SubDbId>>>,
}

impl Default for SliceCatalog {
    fn default() -> Self {
        Self {
            cells: (0..CELLS).map(|_| None).collect(),
        }
    }
}

impl SliceCatalog {
    /// Returns the subdb for `(bm, bk, wm, wk, color)`'s `subslicenum`,
    /// or `None` if the slice or that subslice is absent.
    #[must_use]
    pub fn get_subdb(
        &self,
        bm: u8,
        bk: u8,
        wm: u8,
        wk: u8,
        color: Color,
        subslicenum: u64,
    ) -> Option<SubDbId> {
        if usize::from(bm) >= AXIS
            || usize::from(bk) >= AXIS
            || usize::from(wm) >= AXIS
            || usize::from(wk) >= AXIS
        {
            return None;
        }
        let subslices = self.cells[cell_index(bm, bk, wm, wk, color)].as_ref()?;
        match subslices.get(subslicenum as usize).copied() {
            Some(id) if id.0 != u32::MAX => Some(id),
            _ => None,
        }
    }

    /// Ensures a cell exists with room for at least `subslicenum + 1`
    /// subdbs, then records `subdb` at that position. Used while parsing
    /// `.idx` files, which may emit records in any subslice order.
    pub fn set_subdb(&mut self, bm: u8, bk: u8, wm: u8, wk: u8, color: Color, subslicenum: u64, subdb: SubDbId) {
        let cell = &mut self.cells[cell_index(bm, bk, wm, wk, color)];
        let vec = cell.get_or_insert_with(Vec::new);
        let idx = subslicenum as usize;
        if vec.len() <= idx {
            vec.resize(idx + 1, SubDbId(u32::MAX));
        }
        vec[idx] = subdb;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_composition_returns_none() {
        let catalog = SliceCatalog::default();
        assert!(catalog.get_subdb(1, 0, 1, 0, Color::Black, 0).is_none());
    }

    #[test]
    fn set_then_get_round_trips() {
        let mut catalog = SliceCatalog::default();
        catalog.set_subdb(2, 0, 1, 1, Color::White, 3, SubDbId(42));
        assert_eq!(
            catalog.get_subdb(2, 0, 1, 1, Color::White, 3),
            Some(SubDbId(42))
        );
        assert!(catalog.get_subdb(2, 0, 1, 1, Color::White, 2).is_none());
        assert!(catalog.get_subdb(2, 0, 1, 1, Color::Black, 3).is_none());
    }

    #[test]
    fn out_of_range_axis_is_none() {
        let catalog = SliceCatalog::default();
        assert!(catalog.get_subdb(6, 0, 0, 0, Color::Black, 0).is_none());
    }

    #[test]
    fn unfilled_gap_left_by_out_of_order_inserts_is_none() {
        // Inserting subslice 3 before subslice 0..=2 exist leaves those
        // slots holding the sentinel id; they must read back as absent,
        // not as a bogus subdb reference.
        let mut catalog = SliceCatalog::default();
        catalog.set_subdb(1, 0, 1, 0, Color::Black, 3, SubDbId(7));
        assert!(catalog.get_subdb(1, 0, 1, 0, Color::Black, 0).is_none());
        assert!(catalog.get_subdb(1, 0, 1, 0, Color::Black, 2).is_none());
        assert_eq!(catalog.get_subdb(1, 0, 1, 0, Color::Black, 3), Some(SubDbId(7)));
    }
}
