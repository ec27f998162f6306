// Copyright (c) 2026-present, egdb-core contributors
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! Driver configuration: the `name=value;...` open-options string (§6)
//! plus a couple of programmatic-only knobs.

use crate::constants::MAX_PIECES_TOTAL;
use crate::error::{Error, Result};
use std::path::PathBuf;

/// Open-time configuration for a [`crate::driver::Driver`].
#[derive(Clone, Debug)]
pub struct Options {
    /// Cap on total pieces considered (§6 `maxpieces`).
    pub max_pieces: u8,

    /// Cap per side on kings for 8-piece slices; `None` means no limit
    /// (§6 `maxkings_1side_8pcs`, negative/unset in the original string
    /// format).
    pub max_kings_1side_8pcs: Option<u8>,

    /// Budget, in megabytes, for cache + autoload RAM (§4.6 step 3).
    pub cache_mb: u32,

    /// Optional sidecar file of stored per-subdb CRC32 digests, consulted
    /// by `verify()` instead of merely reporting recomputed digests (see
    /// `DESIGN.md` for why the base `.idx` schema carries none today).
    pub crc_sidecar: Option<PathBuf>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            max_pieces: MAX_PIECES_TOTAL,
            max_kings_1side_8pcs: None,
            cache_mb: 256,
            crc_sidecar: None,
        }
    }
}

impl Options {
    #[must_use]
    pub fn max_pieces(mut self, n: u8) -> Self {
        self.max_pieces = n;
        self
    }

    #[must_use]
    pub fn max_kings_1side_8pcs(mut self, k: Option<u8>) -> Self {
        self.max_kings_1side_8pcs = k;
        self
    }

    #[must_use]
    pub fn cache_mb(mut self, mb: u32) -> Self {
        self.cache_mb = mb;
        self
    }

    #[must_use]
    pub fn crc_sidecar(mut self, path: impl Into<PathBuf>) -> Self {
        self.crc_sidecar = Some(path.into());
        self
    }

    /// Parses a `name=value;name=value` options string (§6).
    pub fn parse(s: &str) -> Result<Self> {
        let mut options = Self::default();
        for pair in s.split(';').map(str::trim).filter(|s| !s.is_empty()) {
            let (name, value) = pair
                .split_once('=')
                .ok_or_else(|| Error::InvalidOption(pair.to_string()))?;
            match name.trim() {
                "maxpieces" => {
                    let n: u8 = value
                        .trim()
                        .parse()
                        .map_err(|_| Error::InvalidOption(pair.to_string()))?;
                    options.max_pieces = n;
                }
                "maxkings_1side_8pcs" => {
                    let k: i32 = value
                        .trim()
                        .parse()
                        .map_err(|_| Error::InvalidOption(pair.to_string()))?;
                    options.max_kings_1side_8pcs = if k < 0 { None } else { Some(k as u8) };
                }
                other => return Err(Error::InvalidOption(format!("unknown option {other:?}"))),
            }
        }
        Ok(options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_both_known_options() {
        let options = Options::parse("maxpieces=8;maxkings_1side_8pcs=3").unwrap();
        assert_eq!(options.max_pieces, 8);
        assert_eq!(options.max_kings_1side_8pcs, Some(3));
    }

    #[test]
    fn negative_kings_means_unlimited() {
        let options = Options::parse("maxkings_1side_8pcs=-1").unwrap();
        assert_eq!(options.max_kings_1side_8pcs, None);
    }

    #[test]
    fn empty_string_is_defaults() {
        let options = Options::parse("").unwrap();
        assert_eq!(options.max_pieces, MAX_PIECES_TOTAL);
    }

    #[test]
    fn rejects_unknown_option() {
        assert!(Options::parse("bogus=1").is_err());
    }

    #[test]
    fn rejects_malformed_pair() {
        assert!(Options::parse("maxpieces").is_err());
    }
}
