//! Core error type (C10).
//!
//! Four kinds, all fatal: there is no retry and no partial recovery (spec
//! §7). After any of these, the `RoadGraph` instance must be discarded.

use std::path::PathBuf;

use thiserror::Error;

/// Errors produced by `netgraph-store`.
#[derive(Debug, Error)]
pub enum GraphError {
    /// Edge pointer overflowed `i32`. Fatal; no further edges can be inserted.
    #[error("edge pointer space exhausted at {pointer}")]
    CapacityExhausted { pointer: i64 },

    /// Adjacency walk exceeded the 1000-hop safety cap, or compaction found
    /// an edge referencing an already-deleted node after the unlink phase.
    #[error("graph corruption detected: {detail}")]
    Corruption { detail: String },

    /// A file read/write failed during `save`/`load_existing`.
    #[error("storage I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// `settings` was shorter than 3 fields, or `node_count != len(lats)` on load.
    #[error("on-disk format mismatch: {detail}")]
    FormatMismatch { detail: String },
}

pub type GraphResult<T> = Result<T, GraphError>;
