// Copyright (c) 2026-present, egdb-core contributors
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! The game-theoretic value domain returned by a lookup.

/// A decoded endgame value.
///
/// Numeric identity matches the on-disk encoding used by the run-length
/// tables (`base`/`partials`) in [`crate::codec`] and the wire values
/// described for [`crate::driver::Driver::lookup`]: `Unknown = 0`,
/// `Win = 1`, `Loss = 2`, `Draw = 3`, `DrawOrLoss = 4`, `WinOrDraw = 5`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Value {
    /// Not determined, or not present in the database.
    Unknown = 0,
    /// A win for the side to move.
    Win = 1,
    /// A loss for the side to move.
    Loss = 2,
    /// A draw.
    Draw = 3,
    /// Draw or loss (partial information, side to move unresolved further).
    DrawOrLoss = 4,
    /// Win or draw (partial information).
    WinOrDraw = 5,
}

impl Value {
    /// Reconstructs a `Value` from its on-disk numeric encoding.
    #[must_use]
    pub fn from_u8(raw: u8) -> Option<Self> {
        Some(match raw {
            0 => Self::Unknown,
            1 => Self::Win,
            2 => Self::Loss,
            3 => Self::Draw,
            4 => Self::DrawOrLoss,
            5 => Self::WinOrDraw,
            _ => return None,
        })
    }

    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }
}

impl From<Value> for i32 {
    fn from(value: Value) -> Self {
        value.as_u8().into()
    }
}

/// Outcome of a [`crate::driver::Driver::lookup`] call, mirroring the
/// original interface's `{-2, -1, 0..=5}` return domain while staying
/// idiomatic at the Rust call site.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum LookupResult {
    /// The position's slice is not present in this database
    /// (`SUBDB_UNAVAILABLE`, numerically `-2`).
    Unavailable,
    /// `conditional` lookup found the target block was not cached
    /// (`NOT_IN_CACHE`, numerically `-1`). Never returned from an
    /// unconditional lookup.
    NotInCache,
    /// A concrete (possibly `Unknown`) value.
    Value(Value),
}

impl From<LookupResult> for i32 {
    fn from(value: LookupResult) -> Self {
        match value {
            LookupResult::Unavailable => -2,
            LookupResult::NotInCache => -1,
            LookupResult::Value(v) => v.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_u8() {
        for raw in 0u8..=5 {
            let v = Value::from_u8(raw).expect("valid value");
            assert_eq!(v.as_u8(), raw);
        }
        assert!(Value::from_u8(6).is_none());
    }

    #[test]
    fn lookup_result_matches_interface_ints() {
        assert_eq!(i32::from(LookupResult::Unavailable), -2);
        assert_eq!(i32::from(LookupResult::NotInCache), -1);
        assert_eq!(i32::from(LookupResult::Value(Value::Unknown)), 0);
        assert_eq!(i32::from(LookupResult::Value(Value::WinOrDraw)), 5);
    }
}
