// Copyright (c) 2026-present, egdb-core contributors
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! Lookup statistics counters, named directly after the scenarios in
//! §8 so a test can assert on them by name.

use std::sync::atomic::{AtomicU64, Ordering};

/// Running counters for a driver's lookups. Cheap to update (relaxed
/// atomics; these are diagnostics, not synchronization).
#[derive(Default)]
pub struct Stats {
    pub db_requests: AtomicU64,
    pub db_returns: AtomicU64,
    pub db_not_present_requests: AtomicU64,
    pub lru_cache_hits: AtomicU64,
    pub lru_cache_loads: AtomicU64,
    pub autoload_hits: AtomicU64,
}

/// A point-in-time copy of [`Stats`], for assertions and reporting.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub db_requests: u64,
    pub db_returns: u64,
    pub db_not_present_requests: u64,
    pub lru_cache_hits: u64,
    pub lru_cache_loads: u64,
    pub autoload_hits: u64,
}

impl Stats {
    pub(crate) fn inc(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    #[must_use]
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            db_requests: self.db_requests.load(Ordering::Relaxed),
            db_returns: self.db_returns.load(Ordering::Relaxed),
            db_not_present_requests: self.db_not_present_requests.load(Ordering::Relaxed),
            lru_cache_hits: self.lru_cache_hits.load(Ordering::Relaxed),
            lru_cache_loads: self.lru_cache_loads.load(Ordering::Relaxed),
            autoload_hits: self.autoload_hits.load(Ordering::Relaxed),
        }
    }

    pub fn reset(&self) {
        self.db_requests.store(0, Ordering::Relaxed);
        self.db_returns.store(0, Ordering::Relaxed);
        self.db_not_present_requests.store(0, Ordering::Relaxed);
        self.lru_cache_hits.store(0, Ordering::Relaxed);
        self.lru_cache_loads.store(0, Ordering::Relaxed);
        self.autoload_hits.store(0, Ordering::Relaxed);
    }
}
