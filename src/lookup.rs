// Copyright (c) 2026-present, egdb-core contributors
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! The lookup pipeline (§4.5): the one request-path operation everything
//! else in this crate exists to serve.

use crate::cache::{Access, CacheEngine};
use crate::catalog::SliceCatalog;
use crate::codec::Table;
use crate::constants::{IDX_BLOCKS_PER_CACHE_BLOCK, MAX_SUBSLICE_INDICES, NUM_SUBINDICES, SUBINDEX_BLOCKSIZE};
use crate::error::Result;
use crate::file_registry::FileRegistry;
use crate::message::MessageCallback;
use crate::oracle::IndexOracle;
use crate::options::Options;
use crate::position::{Color, PieceCount, Position};
use crate::stats::Stats;
use crate::subdb::{SubDb, SubDbArena};
use crate::value::{LookupResult, Value};

/// Everything a lookup needs, borrowed from the driver for the duration
/// of one call.
pub(crate) struct LookupContext<'a> {
    pub files: &'a FileRegistry,
    pub subdbs: &'a SubDbArena,
    pub catalog: &'a SliceCatalog,
    pub cache: &'a CacheEngine,
    pub oracle: &'a dyn IndexOracle,
    pub stats: &'a Stats,
    pub message: &'a MessageCallback,
    pub options: &'a Options,
}

impl<'a> LookupContext<'a> {
    pub(crate) fn lookup(&self, position: &Position, color: Color, conditional: bool) -> Result<LookupResult> {
        Stats::inc(&self.stats.db_requests);

        let mut pc = PieceCount::from_position(position);
        if pc.black_total() == 0 {
            Stats::inc(&self.stats.db_returns);
            return Ok(LookupResult::Value(match color {
                Color::Black => Value::Loss,
                Color::White => Value::Win,
            }));
        }
        if pc.white_total() == 0 {
            Stats::inc(&self.stats.db_returns);
            return Ok(LookupResult::Value(match color {
                Color::White => Value::Loss,
                Color::Black => Value::Win,
            }));
        }

        if pc.exceeds_database_limits() || pc.total() > self.options.max_pieces {
            Stats::inc(&self.stats.db_not_present_requests);
            return Ok(LookupResult::Value(Value::Unknown));
        }
        if pc.total() == 8 {
            if let Some(limit) = self.options.max_kings_1side_8pcs {
                if pc.bk > limit || pc.wk > limit {
                    Stats::inc(&self.stats.db_not_present_requests);
                    return Ok(LookupResult::Value(Value::Unknown));
                }
            }
        }

        let mut position = *position;
        let mut color = color;
        if pc.needs_reversal(color) {
            position = position.reversed();
            pc = pc.swapped();
            color = color.other();
        }

        let index64 = self.oracle.position_to_index(&position, &pc);
        let subslicenum = index64 / MAX_SUBSLICE_INDICES;
        let local_index = (index64 % MAX_SUBSLICE_INDICES) as u32;

        let Some(subdb_id) = self
            .catalog
            .get_subdb(pc.bm, pc.bk, pc.wm, pc.wk, color, subslicenum)
        else {
            Stats::inc(&self.stats.db_not_present_requests);
            return Ok(LookupResult::Value(Value::Unknown));
        };
        let subdb = self.subdbs.get(subdb_id);

        if let Some(v) = subdb.single_value {
            Stats::inc(&self.stats.db_returns);
            return Ok(LookupResult::Value(v));
        }

        let table = subdb.table();
        let file = self.files.get(subdb.file);

        let (slab, i, accumulated) = if file.is_pinned() {
            Stats::inc(&self.stats.autoload_hits);
            let image = file
                .pinned_image()
                .expect("is_pinned() implies pinned_image()");

            let first = u32::from(subdb.first_subidx_block);
            let last = subdb.num_idx_blocks * NUM_SUBINDICES - (NUM_SUBINDICES - 1 - u32::from(subdb.last_subidx_block));
            let slot = SubDb::find_block(first, last, &subdb.autoload_subindices, local_index);

            let i = if slot == first {
                subdb.startbyte - slot * SUBINDEX_BLOCKSIZE
            } else {
                0
            };
            let accumulated = subdb.autoload_subindices[slot as usize];

            let base = (subdb.first_idx_block * crate::constants::IDX_BLOCKSIZE + slot * SUBINDEX_BLOCKSIZE) as usize;
            let end = (base + SUBINDEX_BLOCKSIZE as usize).min(image.len());
            (image[base..end].to_vec(), i, accumulated)
        } else {
            let idx_blocknum = SubDb::find_block(0, subdb.num_idx_blocks, &subdb.indices, local_index);
            let block_num = (subdb.first_idx_block + idx_blocknum) / IDX_BLOCKS_PER_CACHE_BLOCK;

            let snapshot = match self
                .cache
                .access(subdb.file, file, block_num, self.subdbs, subdb_id, conditional)?
            {
                Access::NotInCache => return Ok(LookupResult::NotInCache),
                Access::Snapshot(s) => s,
            };
            if snapshot.loaded {
                Stats::inc(&self.stats.lru_cache_loads);
            } else {
                Stats::inc(&self.stats.lru_cache_hits);
            }

            let is_last_block = idx_blocknum == subdb.num_idx_blocks - 1;
            let (slot, accumulated, i) = if idx_blocknum == 0 {
                let first = u32::from(subdb.first_subidx_block);
                let upper_end = if is_last_block {
                    u32::from(subdb.last_subidx_block) + 1
                } else {
                    NUM_SUBINDICES
                };
                let next_slot = first + 1;
                let trivial = next_slot >= upper_end
                    || first == NUM_SUBINDICES - 1
                    || snapshot.subindices[next_slot as usize] > local_index;
                if trivial {
                    (first, 0u32, subdb.startbyte - first * SUBINDEX_BLOCKSIZE)
                } else {
                    let slot = SubDb::find_block(next_slot, upper_end, &snapshot.subindices, local_index);
                    (slot, snapshot.subindices[slot as usize], 0u32)
                }
            } else {
                let upper_end = if is_last_block {
                    u32::from(subdb.last_subidx_block) + 1
                } else {
                    NUM_SUBINDICES
                };
                let slot = SubDb::find_block(0, upper_end, &snapshot.subindices, local_index);
                (slot, snapshot.subindices[slot as usize], 0u32)
            };

            let base = (slot * SUBINDEX_BLOCKSIZE) as usize;
            let end = (base + SUBINDEX_BLOCKSIZE as usize).min(snapshot.data.len());
            (snapshot.data[base..end].to_vec(), i, accumulated)
        };

        match scan_and_decode(table, subdb.has_partials, &slab, i, accumulated, local_index) {
            Some(value) => {
                log::trace!(
                    "decoded local_index {local_index} in subdb ({},{},{},{}) subslice {subslicenum} -> {value:?}",
                    pc.bm,
                    pc.bk,
                    pc.wm,
                    pc.wk
                );
                Stats::inc(&self.stats.db_returns);
                Ok(LookupResult::Value(value))
            }
            None => {
                log::warn!(
                    "byte-scan index left [0, {SUBINDEX_BLOCKSIZE}) while decoding subdb ({},{},{},{}) subslice {subslicenum}",
                    pc.bm,
                    pc.bk,
                    pc.wm,
                    pc.wk
                );
                (self.message)("corrupt index data encountered during lookup");
                Ok(LookupResult::Value(Value::Unknown))
            }
        }
    }
}

/// Walks `slab` from `i`, accumulating `accumulated`, until the byte
/// whose run covers `local_index` is found, then decodes it (§4.5 steps
/// 8-9). Returns `None` if `i` ever leaves `[0, SUBINDEX_BLOCKSIZE)`
/// without finding it — on-disk corruption (§7).
fn scan_and_decode(
    table: &Table,
    has_partials: bool,
    slab: &[u8],
    mut i: u32,
    mut accumulated: u32,
    local_index: u32,
) -> Option<Value> {
    loop {
        if i >= SUBINDEX_BLOCKSIZE {
            return None;
        }
        let byte = *slab.get(i as usize)?;
        let entry = table.entry(byte);
        if accumulated + entry.increment > local_index {
            return Some(if table.is_pack_byte(byte) {
                let k = local_index - accumulated;
                if has_partials {
                    crate::codec::decode_partials_pack(byte, k)
                } else {
                    crate::codec::decode_base_pack(byte, k)
                }
            } else {
                entry.value
            });
        }
        accumulated += entry.increment;
        i += 1;
    }
}
