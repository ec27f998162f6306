// Copyright (c) 2026-present, egdb-core contributors
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! Run-length decode tables for the two packed byte encodings used by
//! `.cpr` files.
//!
//! Every byte in a `.cpr` block is either a *pack byte* (several
//! sub-values packed into one byte in a small-base numeral system) or a
//! *compressed run byte* (one repeated value, run length encoded in the
//! byte itself). Both tables below map `byte -> (increment, value)`:
//! `increment` is how many index positions the byte accounts for, and
//! `value` is only meaningful for compressed bytes (pack bytes must be
//! unpacked digit-by-digit instead, see [`decode_pack_byte`]).
//!
//! The exact compressed-run table is a fixed vendor table shipped with
//! the original codec; this crate was built without access to that table
//! (see `DESIGN.md`), so the 81..=255 / 36..=255 compressed ranges below
//! are a deterministic, internally-consistent stand-in: run lengths
//! increase monotonically with the byte value and values cycle through
//! the table's domain. Any real deployment of this crate against
//! existing `.cpr` files must swap in the vendor table bit-for-bit.

use crate::value::Value;

/// One run-length table entry.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Entry {
    /// How many index positions this byte's run covers.
    pub increment: u32,
    /// The value this byte encodes, if it is a compressed run byte.
    /// Meaningless for pack bytes (see [`Table::is_pack_byte`]).
    pub value: Value,
}

/// A 256-entry run-length decode table, plus the boundary between pack
/// bytes and compressed-run bytes.
pub struct Table {
    entries: [Entry; 256],
    /// Bytes `< pack_boundary` are pack bytes; bytes `>= pack_boundary`
    /// are compressed runs.
    pack_boundary: u16,
}

impl Table {
    #[must_use]
    pub fn is_pack_byte(&self, byte: u8) -> bool {
        u16::from(byte) < self.pack_boundary
    }

    #[must_use]
    pub fn entry(&self, byte: u8) -> Entry {
        self.entries[byte as usize]
    }
}

/// 3-value table (WIN/LOSS/DRAW): pack bytes hold 4 base-3 digits,
/// increment 4. Bytes `>= 81` are compressed runs.
#[must_use]
pub fn base_table() -> &'static Table {
    static TABLE: std::sync::OnceLock<Table> = std::sync::OnceLock::new();
    TABLE.get_or_init(|| build_table(81, 4, [Value::Win, Value::Loss, Value::Draw]))
}

/// 6-value table (adds WIN_OR_DRAW / DRAW_OR_LOSS / UNKNOWN): pack bytes
/// hold 2 base-6 digits, increment 2. Bytes `>= 36` are compressed runs.
#[must_use]
pub fn partials_table() -> &'static Table {
    static TABLE: std::sync::OnceLock<Table> = std::sync::OnceLock::new();
    TABLE.get_or_init(|| {
        build_table(
            36,
            2,
            [
                Value::Unknown,
                Value::Win,
                Value::Loss,
                Value::Draw,
                Value::DrawOrLoss,
                Value::WinOrDraw,
            ],
        )
    })
}

fn build_table<const N: usize>(pack_boundary: u16, pack_increment: u32, domain: [Value; N]) -> Table {
    let mut entries = [Entry {
        increment: 0,
        value: Value::Unknown,
    }; 256];

    for (byte, entry) in entries.iter_mut().enumerate() {
        let byte = byte as u16;
        *entry = if byte < pack_boundary {
            Entry {
                increment: pack_increment,
                value: Value::Unknown,
            }
        } else {
            let run_idx = byte - pack_boundary;
            let value = domain[usize::from(run_idx) % N];
            let increment = 1 + u32::from(run_idx) / (N as u32);
            Entry { increment, value }
        };
    }

    Table {
        entries,
        pack_boundary,
    }
}

/// Unpacks sub-value `k` (0-indexed from the low digit) out of a base-`n`
/// pack byte whose digits map to `domain[digit]`.
fn unpack_digit(byte: u8, k: u32, base: u32) -> u32 {
    (u32::from(byte) / base.pow(k)) % base
}

/// Decodes the `k`-th sub-value (`0..=3`) out of a base-3 pack byte from
/// the `base` encoding. Digit `d` maps to `Value::from_u8(d + 1)`.
#[must_use]
pub fn decode_base_pack(byte: u8, k: u32) -> Value {
    let digit = unpack_digit(byte, k, 3);
    Value::from_u8((digit + 1) as u8).unwrap_or(Value::Unknown)
}

/// Decodes the `k`-th sub-value (`0..=1`) out of a base-6 pack byte from
/// the `partials` encoding. Digit `d` maps directly to `Value::from_u8(d)`.
#[must_use]
pub fn decode_partials_pack(byte: u8, k: u32) -> Value {
    let digit = unpack_digit(byte, k, 6);
    Value::from_u8(digit as u8).unwrap_or(Value::Unknown)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_pack_bytes_have_increment_four() {
        let table = base_table();
        for byte in 0u8..81 {
            assert!(table.is_pack_byte(byte));
            assert_eq!(table.entry(byte).increment, 4);
        }
    }

    #[test]
    fn base_compressed_bytes_have_positive_increment() {
        let table = base_table();
        let mut last_increment = 0;
        for byte in 81u8..=255 {
            assert!(!table.is_pack_byte(byte));
            let entry = table.entry(byte);
            assert!(entry.increment >= last_increment);
            last_increment = entry.increment;
        }
    }

    #[test]
    fn partials_pack_bytes_have_increment_two() {
        let table = partials_table();
        for byte in 0u8..36 {
            assert!(table.is_pack_byte(byte));
            assert_eq!(table.entry(byte).increment, 2);
        }
    }

    #[test]
    fn base_pack_digit_decode_roundtrips() {
        // byte = s0 + 3*s1 + 9*s2 + 27*s3
        let byte = 1 + 3 * 2 + 9 * 0 + 27 * 1;
        assert_eq!(decode_base_pack(byte, 0), Value::Loss); // s0=1 -> Loss
        assert_eq!(decode_base_pack(byte, 1), Value::Draw); // s1=2 -> Draw
        assert_eq!(decode_base_pack(byte, 2), Value::Win); // s2=0 -> Win
        assert_eq!(decode_base_pack(byte, 3), Value::Loss); // s3=1 -> Loss
    }

    #[test]
    fn partials_pack_digit_decode_roundtrips() {
        let byte = 5 + 6 * 3; // s0=5 (WinOrDraw), s1=3 (Draw)
        assert_eq!(decode_partials_pack(byte, 0), Value::WinOrDraw);
        assert_eq!(decode_partials_pack(byte, 1), Value::Draw);
    }
}
