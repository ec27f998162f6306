// Copyright (c) 2026-present, egdb-core contributors
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use std::path::PathBuf;

/// Represents errors that can occur while opening or configuring a database
/// driver.
///
/// Corruption or I/O trouble discovered *during* a lookup is never
/// represented by this type — per the lookup contract, those resolve to
/// [`crate::Value::Unknown`] through the return value instead (see
/// `lookup`'s module docs).
#[derive(Debug)]
pub enum Error {
    /// The configured directory does not contain any recognized database
    /// files.
    NoDatabaseFound(PathBuf),

    /// An `.idx` file could not be parsed.
    IdxParse {
        /// Path of the offending file.
        path: PathBuf,
        /// 1-based line number.
        line: usize,
        /// Human-readable description.
        message: String,
    },

    /// A `.cpr` file was missing for a slice that requires one.
    MissingCprFile(PathBuf),

    /// An option string could not be parsed.
    InvalidOption(String),

    /// Memory allocation failed while sizing the cache or autoload buffers.
    Alloc(String),

    /// I/O error while opening or reading a database file.
    Io(std::io::Error),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoDatabaseFound(path) => {
                write!(f, "no endgame database files found in {}", path.display())
            }
            Self::IdxParse {
                path,
                line,
                message,
            } => write!(
                f,
                "failed to parse {} line {}: {}",
                path.display(),
                line,
                message
            ),
            Self::MissingCprFile(path) => write!(f, "missing .cpr file: {}", path.display()),
            Self::InvalidOption(opt) => write!(f, "invalid option string: {opt}"),
            Self::Alloc(what) => write!(f, "allocation failed: {what}"),
            Self::Io(e) => write!(f, "I/O error: {e}"),
        }
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

/// Driver result type.
pub type Result<T> = std::result::Result<T, Error>;
