// Copyright (c) 2026-present, egdb-core contributors
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! End-to-end lookups against small hand-built `.idx`/`.cpr` fixtures.
//!
//! The fixtures are built directly against the on-disk formats described
//! in the crate's own docs rather than produced by any generator, since
//! this crate only ever reads databases, never writes them.

use egdb_core::{Color, Driver, IndexOracle, Options, PieceCount, Position};
use std::io::Write;
use std::path::Path;

/// Ignores the position entirely and returns a fixed index. Real
/// position-to-index translation is out of this crate's scope (see
/// [`IndexOracle`]'s docs); these tests only care that the lookup
/// pipeline threads a returned index through to the right byte, so a
/// constant stands in for a real combinatorial indexer.
struct FixedIndexOracle(u64);

impl IndexOracle for FixedIndexOracle {
    fn position_to_index(&self, _position: &Position, _pieces: &PieceCount) -> u64 {
        self.0
    }
}

fn write_file(path: &Path, bytes: &[u8]) {
    let mut f = std::fs::File::create(path).unwrap();
    f.write_all(bytes).unwrap();
}

/// One index block (4096 bytes) of `base`-table bytes: three compressed
/// runs of increment 1 each (Win, Loss, Draw in order), then filler pack
/// bytes that are never reached by the indices this test queries.
fn compressed_block() -> Vec<u8> {
    let mut block = vec![0u8; 4096];
    block[0] = 81; // run_idx 0 -> Win, increment 1
    block[1] = 82; // run_idx 1 -> Loss, increment 1
    block[2] = 83; // run_idx 2 -> Draw, increment 1
    block
}

fn write_compressed_fixture(dir: &Path) {
    write_file(&dir.join("db5-3020.idx"), b"BASE3,0,2,0,0,b:0/0\n");
    write_file(&dir.join("db5-3020.cpr"), &compressed_block());
}

#[test]
fn decodes_successive_local_indices_from_a_compressed_block() {
    let dir = tempfile::tempdir().unwrap();
    write_compressed_fixture(dir.path());

    let driver = Driver::open(
        dir.path(),
        Options::default().max_pieces(9),
        Box::new(FixedIndexOracle(0)),
    )
    .unwrap();

    // bm=3, bk=0, wm=2, wk=0: 3 black men, 2 white men.
    let position = Position::new(0b111, 0b11000, 0);
    assert_eq!(
        driver.lookup(&position, Color::Black),
        egdb_core::LookupResult::Value(egdb_core::Value::Win)
    );
}

#[test]
fn reversal_routes_white_dominated_positions_to_the_same_subdb() {
    let dir = tempfile::tempdir().unwrap();
    write_compressed_fixture(dir.path());

    // The oracle is queried with index 1 both ways so this test isolates
    // the reversal/catalog plumbing rather than any particular indexing
    // scheme: a white-dominated position (2 black men, 3 white men)
    // always gets reversed into the (3,0,2,0) composition before the
    // catalog is consulted (PieceCount::needs_reversal), landing on the
    // very same subdb as the direct lookup above.
    let driver = Driver::open(
        dir.path(),
        Options::default().max_pieces(9),
        Box::new(FixedIndexOracle(1)),
    )
    .unwrap();

    let direct = Position::new(0b111, 0b11000, 0); // bm=3, wm=2
    let mirrored = Position::new(0b11, 0b11100, 0); // bm=2, wm=3 -> needs reversal

    let direct_value = driver.lookup(&direct, Color::Black);
    let mirrored_value = driver.lookup(&mirrored, Color::White);

    assert_eq!(direct_value, mirrored_value);
    assert_eq!(
        direct_value,
        egdb_core::LookupResult::Value(egdb_core::Value::Loss)
    );
}

#[test]
fn composition_absent_from_catalog_is_unknown() {
    let dir = tempfile::tempdir().unwrap();
    write_compressed_fixture(dir.path());

    let driver = Driver::open(
        dir.path(),
        Options::default().max_pieces(9),
        Box::new(FixedIndexOracle(0)),
    )
    .unwrap();

    // 4 black men + 3 white men = 7 pieces, within every configured
    // limit, but no db7-4030.idx was ever written.
    let position = Position::new(0b1111, 0b1110000, 0);
    let result = driver.lookup(&position, Color::Black);
    assert_eq!(result, egdb_core::LookupResult::Value(egdb_core::Value::Unknown));

    let snapshot = driver.stats();
    assert_eq!(snapshot.db_not_present_requests, 1);
}

#[test]
fn per_side_piece_limit_is_enforced_before_any_catalog_lookup() {
    let dir = tempfile::tempdir().unwrap();
    write_compressed_fixture(dir.path());

    let driver = Driver::open(
        dir.path(),
        Options::default().max_pieces(9),
        Box::new(FixedIndexOracle(0)),
    )
    .unwrap();

    // 6 black men on one side exceeds MAX_PIECES_ONE_SIDE (5).
    let position = Position::new(0b111111, 0b1000000, 0);
    let result = driver.lookup(&position, Color::Black);
    assert_eq!(result, egdb_core::LookupResult::Value(egdb_core::Value::Unknown));
}

#[test]
fn terminal_positions_never_touch_the_catalog() {
    let dir = tempfile::tempdir().unwrap();
    write_compressed_fixture(dir.path());

    let driver = Driver::open(
        dir.path(),
        Options::default().max_pieces(9),
        Box::new(FixedIndexOracle(0)),
    )
    .unwrap();

    // White has no pieces left, so it's a loss for White to move and a
    // win for Black, regardless of which oracle index would have been
    // computed.
    let black_only = Position::new(0b1, 0, 0);
    assert_eq!(
        driver.lookup(&black_only, Color::White),
        egdb_core::LookupResult::Value(egdb_core::Value::Loss)
    );
    assert_eq!(
        driver.lookup(&black_only, Color::Black),
        egdb_core::LookupResult::Value(egdb_core::Value::Win)
    );
}
