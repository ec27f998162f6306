// Copyright (c) 2026-present, egdb-core contributors
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! Parser for the `.idx` sidecar format (§6): an ASCII, line-oriented but
//! otherwise whitespace-insensitive stream of `BASE...` records.
//!
//! The on-disk schema here is fixed by the database format itself; the
//! parsing is straightforward text processing, not the hard engineering
//! this crate is about, but its output feeds directly into the subdb
//! arena and slice catalog so it has to be exactly right.

use crate::constants::{FILE_IDX_BLOCKSIZE, IDX_BLOCK_MULT, NUM_SUBINDICES, SUBINDEX_BLOCKSIZE};
use crate::error::{Error, Result};
use crate::position::Color;
use crate::value::Value;
use std::path::Path;

/// One parsed `BASE` record, with byte offsets already converted from
/// `.idx` file-units into cache-block units (§6 "`first_idx_block` is in
/// units of `FILE_IDX_BLOCKSIZE`...").
pub struct ParsedSubDb {
    pub bm: u8,
    pub bk: u8,
    pub wm: u8,
    pub wk: u8,
    pub subslicenum: u64,
    pub color: Color,
    pub single_value: Option<Value>,
    pub has_partials: bool,
    pub first_idx_block: u32,
    pub startbyte: u32,
    pub first_subidx_block: u8,
    /// Filled in while parsing for every record except possibly the very
    /// last compressed one in the file, which the caller backfills from
    /// the `.cpr` file's byte length (§4.6 step 2).
    pub last_subidx_block: u8,
    pub indices: Vec<u32>,
    /// Index, within this file's `records`, of the previous/next
    /// not-single-value subdb. `None` for single-value records and for
    /// the ends of the chain.
    pub prev_local: Option<usize>,
    pub next_local: Option<usize>,
}

impl ParsedSubDb {
    #[must_use]
    pub fn is_single_value(&self) -> bool {
        self.single_value.is_some()
    }
}

/// All records parsed from one `.idx` file, in on-disk order.
pub struct ParsedIdxFile {
    pub records: Vec<ParsedSubDb>,
    /// Local index of the last not-single-value record, whose
    /// `last_subidx_block` still needs the file-size backfill.
    pub last_compressed_local: Option<usize>,
}

struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let b = self.peek()?;
        self.pos += 1;
        Some(b)
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(b) if b.is_ascii_whitespace()) {
            self.pos += 1;
        }
    }

    fn eat(&mut self, literal: &str) -> bool {
        if self.bytes[self.pos..].starts_with(literal.as_bytes()) {
            self.pos += literal.len();
            true
        } else {
            false
        }
    }

    /// Parses an unsigned integer with no leading skip of whitespace.
    fn parse_u64_no_skip(&mut self) -> Option<u64> {
        let start = self.pos;
        while matches!(self.peek(), Some(b) if b.is_ascii_digit()) {
            self.pos += 1;
        }
        if self.pos == start {
            return None;
        }
        std::str::from_utf8(&self.bytes[start..self.pos])
            .ok()?
            .parse()
            .ok()
    }

    /// Parses a (possibly signed, though this format never emits
    /// negative numbers) integer, skipping leading whitespace first.
    fn parse_i64(&mut self) -> Option<i64> {
        self.skip_ws();
        let start = self.pos;
        if matches!(self.peek(), Some(b'-')) {
            self.pos += 1;
        }
        let digits_start = self.pos;
        while matches!(self.peek(), Some(b) if b.is_ascii_digit()) {
            self.pos += 1;
        }
        if self.pos == digits_start {
            self.pos = start;
            return None;
        }
        std::str::from_utf8(&self.bytes[start..self.pos])
            .ok()?
            .parse()
            .ok()
    }

    fn rest_of_line(&mut self) -> &'a [u8] {
        let start = self.pos;
        while !matches!(self.peek(), None | Some(b'\n')) {
            self.pos += 1;
        }
        &self.bytes[start..self.pos]
    }
}

fn parse_error(path: &Path, message: impl Into<String>) -> Error {
    Error::IdxParse {
        path: path.to_path_buf(),
        line: 0,
        message: message.into(),
    }
}

/// Parses the full contents of an `.idx` file.
pub fn parse_idx_file(contents: &str, path: &Path) -> Result<ParsedIdxFile> {
    let mut cur = Cursor::new(contents.as_bytes());
    let mut records: Vec<ParsedSubDb> = Vec::new();
    let mut last_compressed_local: Option<usize> = None;

    loop {
        cur.skip_ws();
        if cur.peek().is_none() {
            break;
        }
        if !cur.eat("BASE") {
            return Err(parse_error(path, "expected BASE record"));
        }

        let bm = cur
            .parse_u64_no_skip()
            .ok_or_else(|| parse_error(path, "expected bm"))?;
        if !cur.eat(",") {
            return Err(parse_error(path, "expected ',' after bm"));
        }
        let bk = cur
            .parse_u64_no_skip()
            .ok_or_else(|| parse_error(path, "expected bk"))?;
        if !cur.eat(",") {
            return Err(parse_error(path, "expected ',' after bk"));
        }
        let wm = cur
            .parse_u64_no_skip()
            .ok_or_else(|| parse_error(path, "expected wm"))?;
        if !cur.eat(",") {
            return Err(parse_error(path, "expected ',' after wm"));
        }
        let wk = cur
            .parse_u64_no_skip()
            .ok_or_else(|| parse_error(path, "expected wk"))?;
        if !cur.eat(",") {
            return Err(parse_error(path, "expected ',' after wk"));
        }
        let subslicenum = cur
            .parse_u64_no_skip()
            .ok_or_else(|| parse_error(path, "expected subslicenum"))?;
        if !cur.eat(",") {
            return Err(parse_error(path, "expected ',' after subslicenum"));
        }
        let colorchar = cur.bump().ok_or_else(|| parse_error(path, "expected color"))?;
        let color = match colorchar {
            b'b' => Color::Black,
            b'w' => Color::White,
            _ => return Err(parse_error(path, "expected 'b' or 'w' color")),
        };
        if !cur.eat(":") {
            return Err(parse_error(path, "expected ':' after color"));
        }

        let marker = cur.peek().ok_or_else(|| parse_error(path, "unexpected EOF after ':'"))?;

        if marker.is_ascii_digit() {
            let raw_first_idx_block = cur
                .parse_u64_no_skip()
                .ok_or_else(|| parse_error(path, "expected first_idx_block"))? as u32;
            if !cur.eat("/") {
                return Err(parse_error(path, "expected '/' in block/startbyte"));
            }
            let startbyte_field = cur
                .parse_u64_no_skip()
                .ok_or_else(|| parse_error(path, "expected startbyte"))? as u32;

            let first_idx_block = raw_first_idx_block / IDX_BLOCK_MULT;
            let startbyte =
                startbyte_field + (raw_first_idx_block % IDX_BLOCK_MULT) * FILE_IDX_BLOCKSIZE;
            let first_subidx_block = (startbyte / SUBINDEX_BLOCKSIZE) as u8;

            // Optional '#...' comment lines.
            let mut has_partials = false;
            loop {
                match cur.peek() {
                    Some(b'\n') => {
                        cur.pos += 1;
                    }
                    Some(b'#') => {
                        cur.pos += 1;
                        let line = cur.rest_of_line();
                        if line.windows(11).any(|w| w == b"haspartials") {
                            has_partials = true;
                        }
                    }
                    _ => break,
                }
            }

            // Whitespace-separated per-block starting indices; keep every
            // fourth one, seeding `linecount` from the raw (file-unit)
            // first_idx_block exactly like the source driver does.
            let mut indices = vec![0u32];
            let mut linecount = raw_first_idx_block % IDX_BLOCK_MULT;
            loop {
                let save = cur.pos;
                match cur.parse_i64() {
                    Some(v) => {
                        linecount += 1;
                        if linecount >= IDX_BLOCK_MULT {
                            linecount = 0;
                            indices.push(v as u32);
                        }
                    }
                    None => {
                        cur.pos = save;
                        break;
                    }
                }
            }

            let prev_local = last_compressed_local;
            let record_local = records.len();

            if let Some(prev_idx) = prev_local {
                let prev = &mut records[prev_idx];
                prev.next_local = Some(record_local);
                if startbyte % SUBINDEX_BLOCKSIZE == 0 {
                    prev.last_subidx_block = if first_subidx_block > 0 {
                        first_subidx_block - 1
                    } else {
                        (NUM_SUBINDICES - 1) as u8
                    };
                } else {
                    prev.last_subidx_block = first_subidx_block;
                }
            }

            records.push(ParsedSubDb {
                bm: bm as u8,
                bk: bk as u8,
                wm: wm as u8,
                wk: wk as u8,
                subslicenum,
                color,
                single_value: None,
                has_partials,
                first_idx_block,
                startbyte,
                first_subidx_block,
                last_subidx_block: (NUM_SUBINDICES - 1) as u8,
                indices,
                prev_local,
                next_local: None,
            });
            last_compressed_local = Some(record_local);
        } else {
            cur.pos += 1;
            let single_value = match marker {
                b'.' => Value::Unknown,
                b'+' => Value::Win,
                b'=' => Value::Draw,
                b'-' => Value::Loss,
                _ => return Err(parse_error(path, "unrecognized single-value marker")),
            };

            records.push(ParsedSubDb {
                bm: bm as u8,
                bk: bk as u8,
                wm: wm as u8,
                wk: wk as u8,
                subslicenum,
                color,
                single_value: Some(single_value),
                has_partials: false,
                first_idx_block: 0,
                startbyte: 0,
                first_subidx_block: 0,
                last_subidx_block: 0,
                indices: Vec::new(),
                prev_local: None,
                next_local: None,
            });
        }
    }

    Ok(ParsedIdxFile {
        records,
        last_compressed_local,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_single_value_record() {
        let text = "BASE2,0,1,0,0,b:+\n";
        let parsed = parse_idx_file(text, Path::new("test.idx")).unwrap();
        assert_eq!(parsed.records.len(), 1);
        assert_eq!(parsed.records[0].single_value, Some(Value::Win));
        assert_eq!(parsed.records[0].color, Color::Black);
    }

    #[test]
    fn parses_compressed_record_with_indices() {
        // raw first_idx_block = 4 -> cache block 1, startbyte offset 0.
        let text = "BASE2,0,1,0,0,w:4/0\n10 20 30 40 50 60 70 80\n";
        let parsed = parse_idx_file(text, Path::new("test.idx")).unwrap();
        assert_eq!(parsed.records.len(), 1);
        let r = &parsed.records[0];
        assert!(r.single_value.is_none());
        assert_eq!(r.first_idx_block, 1);
        assert_eq!(r.startbyte, 0);
        // linecount seeded from raw_first_idx_block % 4 == 0, so every 4th
        // value starting at the 4th is kept: 40, 80.
        assert_eq!(r.indices, vec![0, 40, 80]);
    }

    #[test]
    fn haspartials_comment_is_recognized() {
        let text = "BASE1,0,1,0,0,b:0/0\n#haspartials\n100 200 300 400\n";
        let parsed = parse_idx_file(text, Path::new("test.idx")).unwrap();
        assert!(parsed.records[0].has_partials);
    }

    #[test]
    fn links_consecutive_compressed_records() {
        let text = "BASE1,0,1,0,0,b:0/0\n4 8 12 16\nBASE1,0,1,0,1,b:4/0\n4 8 12 16\n";
        let parsed = parse_idx_file(text, Path::new("test.idx")).unwrap();
        assert_eq!(parsed.records.len(), 2);
        assert_eq!(parsed.records[0].next_local, Some(1));
        assert_eq!(parsed.records[1].prev_local, Some(0));
        // First record's startbyte(0) % 64 == 0 and second's
        // first_subidx_block == 0, so prev gets last_subidx_block = 63.
        assert_eq!(parsed.records[0].last_subidx_block, 63);
    }

    #[test]
    fn rejects_malformed_base_line() {
        let text = "BASE1,0,1,0,b:+\n";
        assert!(parse_idx_file(text, Path::new("test.idx")).is_err());
    }
}
