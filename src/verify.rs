// Copyright (c) 2026-present, egdb-core contributors
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! Verification pass (§7 "CRC failure (verify only)"): walks every subdb
//! in one file, or every file, recomputing a CRC32 over its raw bytes and
//! polling an external abort flag between reads.
//!
//! The `.idx` schema defined in §6 carries no stored reference checksum,
//! so by default this recomputes and reports a digest per subdb rather
//! than asserting it against a known-good value (see `DESIGN.md`). When
//! `Options::crc_sidecar` names a file of `name -> u32` digests, those are
//! compared instead and a mismatch is reported as a real failure.

use crate::constants::IDX_BLOCKSIZE;
use crate::file_registry::{FileId, FileRegistry};
use crate::subdb::{SubDb, SubDbArena, SubDbId};
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

/// One subdb's verification outcome. Subdbs have no piece tuple of their
/// own (§3: that's the catalog's key, not the descriptor's), so a span is
/// identified by its owning file plus its on-disk byte range.
#[derive(Debug, Clone)]
pub struct VerifyReport {
    pub file_name: String,
    pub first_idx_block: u32,
    pub num_idx_blocks: u32,
    pub crc32: u32,
    /// `Some(false)` when a sidecar digest was available and didn't
    /// match; `Some(true)` when it matched; `None` when there was no
    /// sidecar to compare against.
    pub matched: Option<bool>,
}

/// Loads a `key=crc32` sidecar file (one entry per line), the optional
/// reference digests consulted by [`verify_file`]/[`verify_all`]. Keys
/// are `{file_name}:{first_idx_block}`, matching [`sidecar_key`].
pub fn load_crc_sidecar(path: &Path) -> crate::error::Result<HashMap<String, u32>> {
    let contents = std::fs::read_to_string(path)?;
    let mut out = HashMap::new();
    for line in contents.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some((key, value)) = line.rsplit_once('=') {
            if let Ok(crc) = value.trim().parse::<u32>() {
                out.insert(key.trim().to_string(), crc);
            }
        }
    }
    Ok(out)
}

#[must_use]
fn sidecar_key(file_name: &str, first_idx_block: u32) -> String {
    format!("{file_name}:{first_idx_block}")
}

/// Reads the raw bytes spanned by `subdb` directly off disk, bypassing
/// the LRU cache entirely: verification is a maintenance pass and has no
/// business disturbing cache residency.
fn read_subdb_bytes(files: &FileRegistry, subdb: &SubDb) -> crate::error::Result<Vec<u8>> {
    let file = files.get(subdb.file);
    let total_len = (subdb.num_idx_blocks * IDX_BLOCKSIZE) as usize;
    let mut out = Vec::with_capacity(total_len);

    if let Some(image) = file.pinned_image() {
        let base = ((subdb.first_idx_block * IDX_BLOCKSIZE) as usize).min(image.len());
        let end = (base + total_len).min(image.len());
        out.extend_from_slice(&image[base..end]);
        return Ok(out);
    }

    for i in 0..subdb.num_idx_blocks {
        let block = file.read_cache_block(subdb.first_idx_block + i)?;
        out.extend_from_slice(&block);
    }
    out.truncate(total_len);
    Ok(out)
}

/// Iterates every not-single-value subdb belonging to `file_id`. There is
/// no reverse index from subdb to catalog entry, so this walks the arena
/// linearly; verification is an offline pass, not a hot path.
fn subdbs_in_file(subdbs: &SubDbArena, file_id: FileId) -> impl Iterator<Item = &SubDb> {
    (0..subdbs.len()).filter_map(move |i| {
        let subdb = subdbs.get(SubDbId(i as u32));
        (subdb.file == file_id && subdb.single_value.is_none()).then_some(subdb)
    })
}

/// Verifies every not-single-value subdb belonging to `file_id`, polling
/// `abort` between reads (§5 "Cancellation / timeouts").
pub fn verify_file(
    files: &FileRegistry,
    subdbs: &SubDbArena,
    file_id: FileId,
    sidecar: Option<&HashMap<String, u32>>,
    abort: &AtomicBool,
) -> crate::error::Result<Vec<VerifyReport>> {
    let name = files.get(file_id).name.clone();
    let mut out = Vec::new();

    for subdb in subdbs_in_file(subdbs, file_id) {
        if abort.load(Ordering::Relaxed) {
            break;
        }
        let bytes = read_subdb_bytes(files, subdb)?;
        let crc32 = crc32fast::hash(&bytes);
        let matched = sidecar.map(|s| {
            s.get(&sidecar_key(&name, subdb.first_idx_block))
                .is_some_and(|&expected| expected == crc32)
        });
        out.push(VerifyReport {
            file_name: name.clone(),
            first_idx_block: subdb.first_idx_block,
            num_idx_blocks: subdb.num_idx_blocks,
            crc32,
            matched,
        });
    }

    Ok(out)
}

/// Verifies every file in the registry, stopping early if `abort` is set.
pub fn verify_all(
    files: &FileRegistry,
    subdbs: &SubDbArena,
    sidecar: Option<&HashMap<String, u32>>,
    abort: &AtomicBool,
) -> crate::error::Result<Vec<VerifyReport>> {
    let mut out = Vec::new();
    for (file_id, _) in files.iter() {
        if abort.load(Ordering::Relaxed) {
            break;
        }
        out.extend(verify_file(files, subdbs, file_id, sidecar, abort)?);
    }
    Ok(out)
}
