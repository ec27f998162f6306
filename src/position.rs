// Copyright (c) 2026-present, egdb-core contributors
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! Board positions and the piece-count bookkeeping the lookup pipeline
//! needs before it ever touches the on-disk catalog.

use crate::constants::{MAX_PIECES_ONE_SIDE, MAX_PIECES_TOTAL};

/// Side to move.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Color {
    Black,
    White,
}

impl Color {
    #[must_use]
    pub const fn other(self) -> Self {
        match self {
            Self::Black => Self::White,
            Self::White => Self::Black,
        }
    }
}

/// A board position as three 64-bit bitboards.
///
/// `king` is always a subset of `black | white`. The bit layout has a
/// 1-bit gap after every 10 squares (bits 10, 21, 32, 43 are unused); this
/// crate never interprets individual bit positions itself — that is the
/// job of the [`crate::oracle::IndexOracle`] this position is eventually
/// handed to.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Position {
    pub black: u64,
    pub white: u64,
    pub king: u64,
}

impl Position {
    #[must_use]
    pub const fn new(black: u64, white: u64, king: u64) -> Self {
        Self { black, white, king }
    }

    /// Returns the position with black and white swapped. Kings stay on
    /// the same squares since `king` only records *which* squares hold a
    /// king, not whose king it is.
    #[must_use]
    pub const fn reversed(&self) -> Self {
        Self {
            black: self.white,
            white: self.black,
            king: self.king,
        }
    }
}

/// Piece counts for one position, split by side and man/king.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct PieceCount {
    pub bm: u8,
    pub bk: u8,
    pub wm: u8,
    pub wk: u8,
}

impl PieceCount {
    #[must_use]
    pub fn from_position(position: &Position) -> Self {
        Self {
            bm: (position.black & !position.king).count_ones() as u8,
            bk: (position.black & position.king).count_ones() as u8,
            wm: (position.white & !position.king).count_ones() as u8,
            wk: (position.white & position.king).count_ones() as u8,
        }
    }

    #[must_use]
    pub const fn black_total(&self) -> u8 {
        self.bm + self.bk
    }

    #[must_use]
    pub const fn white_total(&self) -> u8 {
        self.wm + self.wk
    }

    #[must_use]
    pub const fn total(&self) -> u8 {
        self.black_total() + self.white_total()
    }

    /// True when either side exceeds the per-side cap, or the combined
    /// total exceeds the database's overall cap.
    #[must_use]
    pub const fn exceeds_database_limits(&self) -> bool {
        self.black_total() > MAX_PIECES_ONE_SIDE
            || self.white_total() > MAX_PIECES_ONE_SIDE
            || self.total() > MAX_PIECES_TOTAL
    }

    /// Mirrors `needs_reversal` from the original driver: true when
    /// material favors white enough that the position should be reversed
    /// (and `color` flipped) before indexing, so the catalog only ever
    /// needs to store the non-white-dominated half of piece-tuple space.
    #[must_use]
    pub const fn needs_reversal(&self, color: Color) -> bool {
        let nb = self.black_total();
        let nw = self.white_total();
        if nw > nb {
            return true;
        }
        if nw == nb {
            if self.wk > self.bk {
                return true;
            }
            if self.bm == self.wm && self.bk == self.wk && matches!(color, Color::White) {
                return true;
            }
        }
        false
    }

    /// Swap black/white piece counts, as `reverse()` does to a [`Position`].
    #[must_use]
    pub const fn swapped(&self) -> Self {
        Self {
            bm: self.wm,
            bk: self.wk,
            wm: self.bm,
            wk: self.bk,
        }
    }
}
