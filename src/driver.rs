// Copyright (c) 2026-present, egdb-core contributors
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! The public entry point: [`Driver`] ties the file registry, subdb
//! arena, slice catalog and cache engine built by [`crate::init::open`]
//! to the request-path [`crate::lookup::LookupContext`] and the
//! maintenance-path [`crate::verify`] pass.

use crate::cache::CacheEngine;
use crate::catalog::SliceCatalog;
use crate::error::Result;
use crate::file_registry::FileRegistry;
use crate::init;
use crate::message::{silent, MessageCallback};
use crate::oracle::IndexOracle;
use crate::options::Options;
use crate::position::{Color, Position};
use crate::stats::{Stats, StatsSnapshot};
use crate::subdb::SubDbArena;
use crate::value::LookupResult;
use crate::verify::VerifyReport;
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::AtomicBool;

/// An open endgame database.
///
/// Built once via [`Driver::open`] and then shared across threads for
/// lookups: every piece of mutable state a lookup can touch (the cache
/// ring, the stats counters) is internally synchronized, so `Driver`
/// itself only needs `&self` and is `Send + Sync`.
pub struct Driver {
    files: FileRegistry,
    subdbs: SubDbArena,
    catalog: SliceCatalog,
    cache: CacheEngine,
    stats: Stats,
    options: Options,
    oracle: Box<dyn IndexOracle>,
    message: MessageCallback,
}

impl Driver {
    /// Opens the database rooted at `dir` (§4.6): enumerates candidate
    /// `.idx`/`.cpr` pairs, decides which files to autoload, and preloads
    /// the shared cache ring before returning.
    pub fn open(dir: &Path, options: Options, oracle: Box<dyn IndexOracle>) -> Result<Self> {
        Self::open_with_message(dir, options, oracle, silent())
    }

    /// As [`Driver::open`], routing every diagnostic string through
    /// `message` in addition to the `log` crate (§6).
    pub fn open_with_message(
        dir: &Path,
        options: Options,
        oracle: Box<dyn IndexOracle>,
        message: MessageCallback,
    ) -> Result<Self> {
        log::info!("opening endgame database at {}", dir.display());
        let opened = init::open(dir, &options, &message)?;
        log::info!(
            "database open: {} file(s), {} subdb(s), {} cache buffer(s)",
            opened.files.len(),
            opened.subdbs.len(),
            opened.cache.capacity()
        );

        Ok(Self {
            files: opened.files,
            subdbs: opened.subdbs,
            catalog: opened.catalog,
            cache: opened.cache,
            stats: Stats::default(),
            options,
            oracle,
            message,
        })
    }

    /// Looks up the value of `position` from `color`'s point of view
    /// (§4.5). Blocks on a cache miss.
    #[must_use]
    pub fn lookup(&self, position: &Position, color: Color) -> LookupResult {
        self.run_lookup(position, color, false)
            .unwrap_or_else(|e| {
                log::error!("lookup failed: {e}");
                (self.message)(&format!("lookup failed: {e}"));
                LookupResult::Value(crate::value::Value::Unknown)
            })
    }

    /// As [`Driver::lookup`], but returns [`LookupResult::NotInCache`]
    /// instead of blocking on a miss against an on-disk (non-autoloaded)
    /// file (§4.5 "Conditional lookup").
    #[must_use]
    pub fn lookup_conditional(&self, position: &Position, color: Color) -> LookupResult {
        self.run_lookup(position, color, true)
            .unwrap_or_else(|e| {
                log::error!("conditional lookup failed: {e}");
                (self.message)(&format!("conditional lookup failed: {e}"));
                LookupResult::Value(crate::value::Value::Unknown)
            })
    }

    fn run_lookup(&self, position: &Position, color: Color, conditional: bool) -> Result<LookupResult> {
        let ctx = crate::lookup::LookupContext {
            files: &self.files,
            subdbs: &self.subdbs,
            catalog: &self.catalog,
            cache: &self.cache,
            oracle: self.oracle.as_ref(),
            stats: &self.stats,
            message: &self.message,
            options: &self.options,
        };
        ctx.lookup(position, color, conditional)
    }

    /// A point-in-time snapshot of this driver's lookup counters (§8).
    #[must_use]
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Resets the lookup counters to zero.
    pub fn reset_stats(&self) {
        self.stats.reset();
    }

    /// Recomputes a CRC32 over every subdb of every open file, polling
    /// `abort` between reads (§7). When [`Options::crc_sidecar`] names a
    /// digest file, each report's `matched` field reflects the comparison;
    /// otherwise it is left `None` and the digests are only reported.
    pub fn verify(&self, abort: &AtomicBool) -> Result<Vec<VerifyReport>> {
        let sidecar = self.load_crc_sidecar()?;
        crate::verify::verify_all(&self.files, &self.subdbs, sidecar.as_ref(), abort)
    }

    /// As [`Driver::verify`], but restricted to one open file by name.
    pub fn verify_file(&self, name: &str, abort: &AtomicBool) -> Result<Vec<VerifyReport>> {
        let sidecar = self.load_crc_sidecar()?;
        let file_id = self
            .files
            .iter()
            .find(|(_, f)| f.name == name)
            .map(|(id, _)| id);
        let Some(file_id) = file_id else {
            return Ok(Vec::new());
        };
        crate::verify::verify_file(&self.files, &self.subdbs, file_id, sidecar.as_ref(), abort)
    }

    fn load_crc_sidecar(&self) -> Result<Option<HashMap<String, u32>>> {
        match &self.options.crc_sidecar {
            Some(path) => Ok(Some(crate::verify::load_crc_sidecar(path)?)),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::DefaultIndexOracle;
    use std::io::Write;

    fn write_file(path: &Path, contents: &str) {
        let mut f = std::fs::File::create(path).unwrap();
        f.write_all(contents.as_bytes()).unwrap();
    }

    #[test]
    fn opens_single_value_only_database_and_looks_up_terminal_positions() {
        let dir = tempfile::tempdir().unwrap();
        write_file(&dir.path().join("db2.idx"), "BASE2,0,0,0,0,b:+\nBASE2,0,0,0,0,w:-\n");

        let driver = Driver::open(
            dir.path(),
            Options::default().max_pieces(2),
            Box::new(DefaultIndexOracle),
        )
        .unwrap();

        // A position with no white pieces is a terminal win for black,
        // resolved before the catalog is ever consulted.
        let pos = Position::new(0b1, 0, 0);
        let result = driver.lookup(&pos, Color::Black);
        assert_eq!(result, LookupResult::Value(crate::value::Value::Win));

        let snapshot = driver.stats();
        assert_eq!(snapshot.db_requests, 1);
        assert_eq!(snapshot.db_returns, 1);
    }

    #[test]
    fn missing_database_directory_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = Driver::open(dir.path(), Options::default(), Box::new(DefaultIndexOracle));
        assert!(result.is_err());
    }
}
