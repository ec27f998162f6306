// Copyright (c) 2026-present, egdb-core contributors
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! Initialization & autoload planner (§4.6): enumerates candidate files,
//! parses their `.idx` sidecars, decides which files to pin in RAM, and
//! preloads the shared cache ring before the driver accepts its first
//! lookup.

use crate::cache::CacheEngine;
use crate::catalog::SliceCatalog;
use crate::constants::{
    CACHE_BLOCKSIZE, IDX_BLOCKSIZE, MAX_PIECES_ONE_SIDE, MAX_PIECES_TOTAL, MIN_AUTOLOAD_PIECES,
    MIN_CACHE_BUF_BYTES, NUM_SUBINDICES, SUBINDEX_BLOCKSIZE,
};
use crate::error::{Error, Result};
use crate::file_registry::{self, FileId, FileRegistry};
use crate::idx_parser::{self, ParsedIdxFile};
use crate::message::MessageCallback;
use crate::options::Options;
use crate::subdb::{compute_autoload_subindices, SubDb, SubDbArena, SubDbId};
use rustc_hash::FxHashMap;
use std::path::{Path, PathBuf};

const ONE_MB: u64 = 1_048_576;

/// One candidate database file, before we know whether it exists.
struct Candidate {
    pieces: u8,
    /// `None` for the `db<N>` files (`N <= MIN_AUTOLOAD_PIECES`) that
    /// cover every composition of that piece count in one file.
    composition: Option<(u8, u8, u8, u8)>,
    king_count: u8,
}

/// Enumerates every candidate `(bm, bk, wm, wk)` composition the driver
/// will look for on disk (§4.6 step 1), skipping white-dominated
/// compositions (the catalog only ever stores the non-white-dominated
/// half of piece-tuple space, per §3's normalization invariant) and
/// anything beyond the configured limits.
fn enumerate_candidates(options: &Options) -> Vec<Candidate> {
    let max_pieces = options.max_pieces.min(MAX_PIECES_TOTAL);
    let mut out = Vec::new();

    for pieces in 2..=max_pieces {
        if pieces <= MIN_AUTOLOAD_PIECES {
            out.push(Candidate {
                pieces,
                composition: None,
                king_count: 0,
            });
            continue;
        }

        for nb in 1..pieces {
            if nb > MAX_PIECES_ONE_SIDE {
                continue;
            }
            let nw = pieces - nb;
            if nw > nb {
                continue;
            }
            for nbk in 0..=nb {
                let nbm = nb - nbk;
                for nwk in 0..=nw {
                    let nwm = nw - nwk;
                    if nbm + nbk == nwm + nwk && nwk > nbk {
                        continue;
                    }
                    if pieces == 8 {
                        if let Some(limit) = options.max_kings_1side_8pcs {
                            if nbk > limit || nwk > limit {
                                continue;
                            }
                        }
                    }
                    out.push(Candidate {
                        pieces,
                        composition: Some((nbm, nbk, nwm, nwk)),
                        king_count: nbk + nwk,
                    });
                }
            }
        }
    }

    out
}

/// Budget, in MB, of autoload RAM given how much is left after the cache
/// ring's own needs and how big the whole candidate database is (§4.6
/// step 3). Mirrors the source driver's ratio heuristic exactly,
/// including its early-exit when the database nearly fits the budget
/// outright.
fn autoload_budget_mb(cache_mb_avail: i64, total_dbsize_mb: i64) -> i64 {
    const MIN_RATIO: f64 = 0.18;
    const MAX_RATIO: f64 = 0.35;

    if total_dbsize_mb - cache_mb_avail < 20 {
        return 1 + total_dbsize_mb;
    }

    let cache_mb_avail = cache_mb_avail.max(15);
    if cache_mb_avail > 1000 {
        (cache_mb_avail as f64 * MAX_RATIO) as i64
    } else {
        let avail = cache_mb_avail as f64;
        (avail * (MIN_RATIO + avail * (MAX_RATIO - MIN_RATIO) / 1000.0)) as i64
    }
}

/// One parsed, on-disk candidate: the `.idx` existed and parsed cleanly.
struct ParsedFile {
    candidate: Candidate,
    name: String,
    cpr_path: PathBuf,
    needs_cpr: bool,
    cpr_len: u64,
    parsed: ParsedIdxFile,
}

fn read_idx(dir: &Path, candidate: Candidate) -> Result<Option<ParsedFile>> {
    let name = match candidate.composition {
        None => format!("db{}", candidate.pieces),
        Some((bm, bk, wm, wk)) => format!("db{}-{bm}{bk}{wm}{wk}", candidate.pieces),
    };
    let prefix = dir.join(&name);
    let idx_path = prefix.with_extension("idx");
    if !idx_path.try_exists()? {
        return Ok(None);
    }

    let contents = std::fs::read_to_string(&idx_path)?;
    let mut parsed = idx_parser::parse_idx_file(&contents, &idx_path)?;
    let needs_cpr = parsed.records.iter().any(|r| !r.is_single_value());
    let cpr_path = prefix.with_extension("cpr");

    let cpr_len = if needs_cpr {
        let meta = std::fs::metadata(&cpr_path).map_err(|_| Error::MissingCprFile(cpr_path.clone()))?;
        meta.len()
    } else {
        0
    };

    // Backfill the last compressed subdb's `last_subidx_block` from the
    // `.cpr` file's byte length (§4.6 step 2): the parser has no way to
    // know where the file actually ends, so it leaves the default in
    // place until the sidecar's length is known here.
    if let Some(last) = parsed.last_compressed_local {
        let record = &mut parsed.records[last];
        record.last_subidx_block =
            (((cpr_len - 1) % u64::from(IDX_BLOCKSIZE)) / u64::from(SUBINDEX_BLOCKSIZE)) as u8;
    }

    Ok(Some(ParsedFile {
        candidate,
        name,
        cpr_path,
        needs_cpr,
        cpr_len,
        parsed,
    }))
}

/// Everything [`crate::driver::Driver::open`] needs, assembled from the
/// on-disk `.idx`/`.cpr` corpus.
pub(crate) struct OpenedDatabase {
    pub files: FileRegistry,
    pub subdbs: SubDbArena,
    pub catalog: SliceCatalog,
    pub cache: CacheEngine,
}

pub(crate) fn open(dir: &Path, options: &Options, message: &MessageCallback) -> Result<OpenedDatabase> {
    let candidates = enumerate_candidates(options);

    let mut parsed_files = Vec::new();
    for candidate in candidates {
        if let Some(pf) = read_idx(dir, candidate)? {
            parsed_files.push(pf);
        }
    }

    if parsed_files.is_empty() {
        return Err(Error::NoDatabaseFound(dir.to_path_buf()));
    }

    let total_dbsize_mb: i64 = parsed_files
        .iter()
        .filter(|f| f.needs_cpr)
        .map(|f| f.cpr_len as i64 / ONE_MB as i64)
        .sum();
    let cache_mb_avail = i64::from(options.cache_mb);
    let max_autoload_mb = autoload_budget_mb(cache_mb_avail, total_dbsize_mb);

    message(&format!(
        "found {} database file(s), {total_dbsize_mb}mb total, autoload budget {max_autoload_mb}mb",
        parsed_files.len()
    ));

    // Order the files eligible for *discretionary* autoload by increasing
    // (king count, piece count) and accept them in order until the budget
    // is spent; files with <= MIN_AUTOLOAD_PIECES pieces are always
    // autoloaded regardless of budget (§4.6 step 3).
    let mut order: Vec<usize> = (0..parsed_files.len()).collect();
    order.sort_by_key(|&i| {
        (
            parsed_files[i].candidate.king_count,
            parsed_files[i].candidate.pieces,
        )
    });

    let mut autoload = vec![false; parsed_files.len()];
    let mut running_blocks: i64 = 0;
    for &i in &order {
        let pf = &parsed_files[i];
        if !pf.needs_cpr {
            continue;
        }
        if pf.candidate.pieces <= MIN_AUTOLOAD_PIECES {
            autoload[i] = true;
            continue;
        }
        running_blocks += pf.cpr_len as i64 / i64::from(CACHE_BLOCKSIZE) + 1;
        let running_mb = running_blocks * i64::from(CACHE_BLOCKSIZE) / ONE_MB as i64;
        if running_mb <= max_autoload_mb {
            autoload[i] = true;
        }
    }

    let mut files = FileRegistry::default();
    let mut subdbs = SubDbArena::default();
    let mut catalog = SliceCatalog::default();
    let mut on_disk_cache_blocks: Vec<u32> = Vec::new();
    let mut on_disk_subdbs: FxHashMap<FileId, Vec<SubDbId>> = FxHashMap::default();
    let mut file_ids: Vec<Option<FileId>> = vec![None; parsed_files.len()];

    for (i, pf) in parsed_files.into_iter().enumerate() {
        let num_idx_blocks = file_registry::num_idx_blocks_from_file_size(pf.cpr_len);

        let file_id = if !pf.needs_cpr {
            files.push(file_registry::open_none(pf.name.clone()))
        } else if autoload[i] {
            log::debug!("autoloading {} ({num_idx_blocks} index blocks)", pf.name);
            message(&format!("autoload {}", pf.name));
            files.push(file_registry::open_pinned(&pf.cpr_path, pf.name.clone(), num_idx_blocks)?)
        } else {
            log::debug!("leaving {} on disk ({num_idx_blocks} index blocks)", pf.name);
            message(&format!("preload {}", pf.name));
            let descriptor = file_registry::open_on_disk(&pf.cpr_path, pf.name.clone(), num_idx_blocks)?;
            on_disk_cache_blocks.push(descriptor.num_cache_blocks);
            files.push(descriptor)
        };
        file_ids[i] = Some(file_id);

        push_records(&mut subdbs, &mut catalog, &mut on_disk_subdbs, file_id, pf.parsed);

        if autoload[i] {
            if let Some(image) = files.get(file_id).pinned_image().cloned() {
                for id in on_disk_subdbs.remove(&file_id).unwrap_or_default() {
                    let computed = compute_autoload_subindices(subdbs.get(id), &image);
                    subdbs.get_mut(id).autoload_subindices = computed;
                }
            }
        }
    }

    // Same (king count, piece count) order used for the autoload decision
    // (§4.6 step 7: "walking files in autoload order").
    let autoload_order_ids: Vec<FileId> = order
        .iter()
        .filter(|&&i| !autoload[i])
        .filter_map(|&i| file_ids[i])
        .collect();

    let per_file_cache_blocks: Vec<u32> = files
        .iter()
        .map(|(_, f)| if f.is_pinned() { 0 } else { f.num_cache_blocks })
        .collect();

    let needed: u32 = on_disk_cache_blocks.iter().sum();
    let ccb_overhead = (NUM_SUBINDICES as usize * std::mem::size_of::<u32>() + 32) as u64;
    let bytes_per_ccb = u64::from(CACHE_BLOCKSIZE) + ccb_overhead;
    let budget_bytes = u64::from(options.cache_mb) * ONE_MB;

    let ring_size: u32 = if needed == 0 {
        0
    } else if budget_bytes < MIN_CACHE_BUF_BYTES {
        ((MIN_CACHE_BUF_BYTES / u64::from(CACHE_BLOCKSIZE)) as u32).min(needed)
    } else {
        ((budget_bytes / bytes_per_ccb) as u32).min(needed)
    };

    message(&format!("allocating {ring_size} cache buffers of size {CACHE_BLOCKSIZE}"));
    let cache = CacheEngine::new(ring_size, &per_file_cache_blocks, CACHE_BLOCKSIZE as usize);

    preload(&cache, &files, &subdbs, &on_disk_subdbs, &autoload_order_ids);

    Ok(OpenedDatabase {
        files,
        subdbs,
        catalog,
        cache,
    })
}

fn push_records(
    subdbs: &mut SubDbArena,
    catalog: &mut SliceCatalog,
    on_disk_subdbs: &mut FxHashMap<FileId, Vec<SubDbId>>,
    file_id: FileId,
    parsed: ParsedIdxFile,
) {
    let mut global_ids = Vec::with_capacity(parsed.records.len());

    for record in &parsed.records {
        let subdb = if let Some(value) = record.single_value {
            SubDb {
                file: file_id,
                single_value: Some(value),
                has_partials: false,
                first_idx_block: 0,
                num_idx_blocks: 0,
                startbyte: 0,
                first_subidx_block: 0,
                last_subidx_block: 0,
                indices: Vec::new(),
                autoload_subindices: Vec::new(),
                prev: None,
                next: None,
            }
        } else {
            SubDb {
                file: file_id,
                single_value: None,
                has_partials: record.has_partials,
                first_idx_block: record.first_idx_block,
                num_idx_blocks: record.indices.len() as u32,
                startbyte: record.startbyte,
                first_subidx_block: record.first_subidx_block,
                last_subidx_block: record.last_subidx_block,
                indices: record.indices.clone(),
                autoload_subindices: Vec::new(),
                prev: None,
                next: None,
            }
        };
        let id = subdbs.push(subdb);
        global_ids.push(id);
    }

    for (i, record) in parsed.records.iter().enumerate() {
        if let Some(p) = record.prev_local {
            subdbs.get_mut(global_ids[i]).prev = Some(global_ids[p]);
        }
        if let Some(n) = record.next_local {
            subdbs.get_mut(global_ids[i]).next = Some(global_ids[n]);
        }
    }

    for (i, record) in parsed.records.into_iter().enumerate() {
        let color = record.color;
        catalog.set_subdb(record.bm, record.bk, record.wm, record.wk, color, record.subslicenum, global_ids[i]);
        if record.single_value.is_none() {
            on_disk_subdbs.entry(file_id).or_default().push(global_ids[i]);
        }
    }
}

/// Fills the ring sequentially from the non-pinned files, in the same
/// order autoload decisions were made, resolving a seed subdb for each
/// block by scanning that file's not-single-value subdb list (§4.6 step
/// 7's `find_first_subdb`).
fn preload(
    cache: &CacheEngine,
    files: &FileRegistry,
    subdbs: &SubDbArena,
    on_disk_subdbs: &FxHashMap<FileId, Vec<SubDbId>>,
    order: &[FileId],
) {
    for &file_id in order {
        let Some(subdb_ids) = on_disk_subdbs.get(&file_id) else {
            continue;
        };
        let file = files.get(file_id);
        for block_num in 0..file.num_cache_blocks {
            let Some(&seed) = subdb_ids.iter().find(|&&id| {
                let s = subdbs.get(id);
                block_num >= s.first_idx_block && block_num <= s.last_block()
            }) else {
                continue;
            };
            match cache.preload(file_id, file, block_num, subdbs, seed) {
                Ok(true) => {}
                Ok(false) => return,
                Err(_) => return,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn autoload_budget_autoloads_everything_when_close_to_total() {
        assert_eq!(autoload_budget_mb(100, 110), 111);
    }

    #[test]
    fn autoload_budget_floors_small_availability() {
        // cache_mb_avail clamped to 15, ratio = MIN_RATIO = .18 -> 2mb.
        assert_eq!(autoload_budget_mb(5, 10_000), (15.0 * 0.18) as i64);
    }

    #[test]
    fn autoload_budget_caps_large_availability() {
        assert_eq!(autoload_budget_mb(5000, 100_000), (5000.0 * 0.35) as i64);
    }

    #[test]
    fn enumerate_candidates_skips_white_dominated() {
        let options = Options::default().max_pieces(6);
        let candidates = enumerate_candidates(&options);
        for c in &candidates {
            if let Some((bm, bk, wm, wk)) = c.composition {
                assert!(wm + wk <= bm + bk);
                if wm + wk == bm + bk {
                    assert!(wk <= bk);
                }
            }
        }
    }

    #[test]
    fn enumerate_candidates_respects_maxpieces() {
        let options = Options::default().max_pieces(4);
        let candidates = enumerate_candidates(&options);
        assert!(candidates.iter().all(|c| c.pieces <= 4));
        assert!(candidates.iter().all(|c| c.composition.is_none()));
    }

    #[test]
    fn read_idx_backfills_last_subidx_block_from_cpr_length() {
        let dir = tempfile::tempdir().unwrap();
        let idx_path = dir.path().join("db5-3020.idx");
        let cpr_path = dir.path().join("db5-3020.cpr");
        std::fs::write(&idx_path, b"BASE3,0,2,0,0,b:0/0\n").unwrap();

        // A `.cpr` whose last (only) index block is partially filled: 100
        // bytes in, so `((100-1) % 4096) / 64 == 1`, not the unbackfilled
        // default of 63.
        std::fs::write(&cpr_path, vec![0u8; 100]).unwrap();

        let candidate = Candidate {
            pieces: 5,
            composition: Some((3, 0, 2, 0)),
            king_count: 0,
        };
        let parsed = read_idx(dir.path(), candidate).unwrap().unwrap();
        assert_eq!(parsed.parsed.records[0].last_subidx_block, 1);
    }

    #[test]
    fn read_idx_backfill_handles_an_exactly_full_last_block() {
        let dir = tempfile::tempdir().unwrap();
        let idx_path = dir.path().join("db5-3020.idx");
        let cpr_path = dir.path().join("db5-3020.cpr");
        std::fs::write(&idx_path, b"BASE3,0,2,0,0,b:0/0\n").unwrap();
        std::fs::write(&cpr_path, vec![0u8; crate::constants::IDX_BLOCKSIZE as usize]).unwrap();

        let candidate = Candidate {
            pieces: 5,
            composition: Some((3, 0, 2, 0)),
            king_count: 0,
        };
        let parsed = read_idx(dir.path(), candidate).unwrap().unwrap();
        assert_eq!(parsed.parsed.records[0].last_subidx_block, 63);
    }
}
