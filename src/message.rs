// Copyright (c) 2026-present, egdb-core contributors
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! The embedder-facing diagnostic channel (§6 "All diagnostic output goes
//! through a user-supplied message callback").

use std::sync::Arc;

/// A callback invoked for status and error messages. Kept alongside this
/// crate's `log` facade usage rather than instead of it: `log` is this
/// crate's own debugging convention, the callback is the contract the
/// embedding application actually depends on.
pub type MessageCallback = Arc<dyn Fn(&str) + Send + Sync>;

/// A callback that discards every message, for callers who only want the
/// `log` crate output.
#[must_use]
pub fn silent() -> MessageCallback {
    Arc::new(|_msg: &str| {})
}
