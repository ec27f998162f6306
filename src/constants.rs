// Copyright (c) 2026-present, egdb-core contributors
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! Fixed on-disk constants. These describe the physical layout of `.idx`
//! and `.cpr` files and must never change without breaking every database
//! ever produced for this format.

/// Unit of `first_idx_block` as stored in `.idx` text records.
pub const FILE_IDX_BLOCKSIZE: u32 = 1024;

/// `.idx` block numbers are in units of `FILE_IDX_BLOCKSIZE`; multiply by
/// this to get `IDX_BLOCKSIZE` units.
pub const IDX_BLOCK_MULT: u32 = 4;

/// Size, in bytes, of one index block in the `.cpr` byte stream.
pub const IDX_BLOCKSIZE: u32 = FILE_IDX_BLOCKSIZE * IDX_BLOCK_MULT;

/// How many index blocks make up one cache (load) block.
pub const IDX_BLOCKS_PER_CACHE_BLOCK: u32 = 1;

/// Size, in bytes, of one cache block (the driver's disk read unit).
pub const CACHE_BLOCKSIZE: u32 = IDX_BLOCKSIZE * IDX_BLOCKS_PER_CACHE_BLOCK;

/// Number of sub-index slots per cache block.
pub const NUM_SUBINDICES: u32 = 64;

/// Size, in bytes, of one sub-index slot.
pub const SUBINDEX_BLOCKSIZE: u32 = IDX_BLOCKSIZE / NUM_SUBINDICES;

/// Number of positions in one subslice.
pub const MAX_SUBSLICE_INDICES: u64 = 1 << 30;

/// Maximum pieces per side.
pub const MAX_PIECES_ONE_SIDE: u8 = 5;

/// Maximum total pieces across both sides.
pub const MAX_PIECES_TOTAL: u8 = 9;

/// Files with at most this many total pieces are always autoloaded.
pub const MIN_AUTOLOAD_PIECES: u8 = 4;

/// Cache ring is never allocated smaller than this many bytes.
pub const MIN_CACHE_BUF_BYTES: u64 = 10 * 1_048_576;

/// Sentinel marking a free / unoccupied cache slot, or an absent block-map
/// entry.
pub const ABSENT: u32 = u32::MAX;
