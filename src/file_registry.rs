// Copyright (c) 2026-present, egdb-core contributors
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! Per-file descriptors: path, open handle, block count, and either a
//! pinned in-memory image or a block map into the shared cache ring.

use crate::constants::{CACHE_BLOCKSIZE, IDX_BLOCKS_PER_CACHE_BLOCK, IDX_BLOCKSIZE};
use crate::error::Result;
use std::fs::File;
use std::os::unix::fs::FileExt;
use std::path::PathBuf;
use std::sync::Arc;

/// Arena index of a file descriptor. Stable for the lifetime of the
/// driver.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FileId(pub u32);

/// In-memory storage strategy for one `.cpr` file.
pub enum FileStorage {
    /// The whole file is resident; lookups against it never touch the
    /// cache ring or the global lock.
    Pinned(Arc<[u8]>),
    /// An open handle; blocks are paged through the shared cache ring.
    /// Reads use positioned I/O (`pread`) so no `&mut File` or seek state
    /// is required, keeping the handle shareable without its own lock.
    OnDisk(File),
    /// No `.cpr` file exists for this prefix because every subdb in its
    /// `.idx` is single-valued (§7: a `.cpr` is only required for a
    /// ≥5-piece slice, i.e. one that actually has compressed bytes).
    /// `read_cache_block`/`pinned_image` are never called for a subdb
    /// whose `single_value` is set, so this variant is never addressed.
    None,
}

/// Static, immutable-after-init metadata for one database file.
pub struct FileDescriptor {
    pub name: String,
    pub num_idx_blocks: u32,
    pub num_cache_blocks: u32,
    pub storage: FileStorage,
}

impl FileDescriptor {
    #[must_use]
    pub fn is_pinned(&self) -> bool {
        matches!(self.storage, FileStorage::Pinned(_))
    }

    #[must_use]
    pub fn pinned_image(&self) -> Option<&Arc<[u8]>> {
        match &self.storage {
            FileStorage::Pinned(image) => Some(image),
            FileStorage::OnDisk(_) | FileStorage::None => None,
        }
    }

    /// Reads one fixed-size cache block from disk. Only valid for
    /// [`FileStorage::OnDisk`]. The on-disk file length need not be an
    /// exact multiple of `CACHE_BLOCKSIZE`; the final block is read in
    /// full and any bytes past EOF are left zeroed (never addressed, per
    /// the subdb metadata's invariants).
    pub fn read_cache_block(&self, block_num: u32) -> Result<Box<[u8]>> {
        let FileStorage::OnDisk(file) = &self.storage else {
            unreachable!("read_cache_block called on a file with no on-disk blocks");
        };

        let mut buf = vec![0u8; CACHE_BLOCKSIZE as usize];
        let offset = u64::from(block_num) * u64::from(CACHE_BLOCKSIZE);

        let mut filled = 0usize;
        loop {
            match file.read_at(&mut buf[filled..], offset + filled as u64) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
            if filled == buf.len() {
                break;
            }
        }

        Ok(buf.into_boxed_slice())
    }
}

fn num_cache_blocks_for(num_idx_blocks: u32) -> u32 {
    num_idx_blocks.div_ceil(IDX_BLOCKS_PER_CACHE_BLOCK)
}

/// Opens a `.cpr` file and builds its [`FileDescriptor`], given the
/// already-known number of index blocks (derived from `.idx` parsing and
/// backfilled from the file's byte length, §4.6 step 2).
pub fn open_on_disk(path: &std::path::Path, name: String, num_idx_blocks: u32) -> Result<FileDescriptor> {
    let file = File::open(path)?;
    Ok(FileDescriptor {
        name,
        num_idx_blocks,
        num_cache_blocks: num_cache_blocks_for(num_idx_blocks),
        storage: FileStorage::OnDisk(file),
    })
}

/// Reads a whole `.cpr` file into memory for pinning (§4.6 step 4).
pub fn open_pinned(path: &std::path::Path, name: String, num_idx_blocks: u32) -> Result<FileDescriptor> {
    let bytes = std::fs::read(path)?;
    Ok(FileDescriptor {
        name,
        num_idx_blocks,
        num_cache_blocks: num_cache_blocks_for(num_idx_blocks),
        storage: FileStorage::Pinned(Arc::from(bytes.into_boxed_slice())),
    })
}

/// Builds a [`FileDescriptor`] for a prefix whose `.idx` holds only
/// single-valued subdbs, so no `.cpr` sidecar exists or is needed.
#[must_use]
pub fn open_none(name: String) -> FileDescriptor {
    FileDescriptor {
        name,
        num_idx_blocks: 0,
        num_cache_blocks: 0,
        storage: FileStorage::None,
    }
}

/// Derives `num_idx_blocks` from a file's byte length (§4.6 step 2).
#[must_use]
pub fn num_idx_blocks_from_file_size(file_size: u64) -> u32 {
    file_size.div_ceil(u64::from(IDX_BLOCKSIZE)) as u32
}

/// The registry of all known database files, immutable after `open()`.
#[derive(Default)]
pub struct FileRegistry {
    files: Vec<FileDescriptor>,
}

impl FileRegistry {
    #[must_use]
    pub fn push(&mut self, descriptor: FileDescriptor) -> FileId {
        let id = FileId(self.files.len() as u32);
        self.files.push(descriptor);
        id
    }

    #[must_use]
    pub fn get(&self, id: FileId) -> &FileDescriptor {
        &self.files[id.0 as usize]
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (FileId, &FileDescriptor)> {
        self.files
            .iter()
            .enumerate()
            .map(|(i, f)| (FileId(i as u32), f))
    }
}

/// Also exposes the directory path helper used by the initializer to
/// build candidate file names (§4.6 step 1).
#[must_use]
pub fn candidate_prefix(dir: &std::path::Path, pieces: u8, composition: Option<(u8, u8, u8, u8)>) -> PathBuf {
    let name = match composition {
        None => format!("db{pieces}"),
        Some((bm, bk, wm, wk)) => format!("db{pieces}-{bm}{bk}{wm}{wk}"),
    };
    dir.join(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn candidate_prefix_small_vs_large() {
        let dir = std::path::Path::new("/dbs");
        assert_eq!(candidate_prefix(dir, 3, None), dir.join("db3"));
        assert_eq!(
            candidate_prefix(dir, 8, Some((3, 1, 3, 1))),
            dir.join("db8-3131")
        );
    }

    #[test]
    fn num_idx_blocks_rounds_up() {
        assert_eq!(num_idx_blocks_from_file_size(0), 0);
        assert_eq!(num_idx_blocks_from_file_size(1), 1);
        assert_eq!(num_idx_blocks_from_file_size(u64::from(IDX_BLOCKSIZE)), 1);
        assert_eq!(
            num_idx_blocks_from_file_size(u64::from(IDX_BLOCKSIZE) + 1),
            2
        );
    }
}
