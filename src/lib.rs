// Copyright (c) 2026-present, egdb-core contributors
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! A read-only query engine for precomputed draughts (international
//! checkers) endgame databases.
//!
//! ##### About
//!
//! An endgame database maps every position with a small enough number of
//! pieces on the board to its game-theoretic value (win, loss, or draw)
//! for the side to move. Such a database, once generated, is enormous and
//! static: this crate only knows how to *read* one — generation is out of
//! scope (see `SPEC_FULL.md`'s Non-goals).
//!
//! A database directory holds one `.idx`/`.cpr` pair per piece-count
//! slice (or, for the smallest slices, one pair covering every
//! composition of that piece count). The `.idx` sidecar is a small ASCII
//! index describing where each sub-database's compressed bytes live in
//! the matching `.cpr` file; [`Driver::open`] parses every `.idx` file it
//! finds under a directory, decides which `.cpr` files are small enough
//! to pin entirely in RAM, and preloads a shared LRU cache of fixed-size
//! blocks for the rest.
//!
//! Position-to-slice-index translation — the combinatorial-indexing
//! arithmetic specific to one database generator's numbering scheme — is
//! deliberately not this crate's job: bring your own [`IndexOracle`].
//!
//! # Example usage
//!
//! ```no_run
//! use egdb_core::{Color, Driver, DefaultIndexOracle, Options, Position};
//!
//! # fn main() -> egdb_core::Result<()> {
//! let driver = Driver::open(
//!     std::path::Path::new("/path/to/database"),
//!     Options::default().cache_mb(512),
//!     Box::new(DefaultIndexOracle),
//! )?;
//!
//! let position = Position::new(/* black */ 0, /* white */ 0, /* king */ 0);
//! let result = driver.lookup(&position, Color::Black);
//! # let _ = result;
//! # Ok(())
//! # }
//! ```

mod cache;
mod catalog;
mod codec;
mod constants;
mod driver;
mod error;
mod file_registry;
mod idx_parser;
mod init;
mod lookup;
mod message;
mod options;
mod oracle;
mod position;
mod stats;
mod subdb;
mod value;
mod verify;

pub use constants::{MAX_PIECES_ONE_SIDE, MAX_PIECES_TOTAL, MIN_AUTOLOAD_PIECES};
pub use driver::Driver;
pub use error::{Error, Result};
pub use message::{silent, MessageCallback};
pub use options::Options;
pub use oracle::{DefaultIndexOracle, IndexOracle};
pub use position::{Color, PieceCount, Position};
pub use stats::{Stats, StatsSnapshot};
pub use value::{LookupResult, Value};
pub use verify::{load_crc_sidecar, VerifyReport};
