//! Error types for the BoT mesh pipeline.
//!
//! Fatal conditions are returned via [`BotError`]; non-fatal conditions
//! (`Degenerate`, `OddHits`) are never returned as an `Err` — they exist so
//! warning call sites have a typed payload to log, absorbed at the point
//! that detects them rather than propagated.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum BotError {
    #[error("prep called on a mesh with zero faces or zero vertices")]
    Empty,

    #[error("face {face} references vertex {vertex}, but mesh has only {num_vertices} vertices")]
    InvalidIndex {
        face: usize,
        vertex: usize,
        num_vertices: usize,
    },

    #[error("BVH traversal stack exceeded capacity {capacity} (malformed tree)")]
    StackOverflow { capacity: usize },

    #[error("inconsistent plate-mode mesh: {0}")]
    Inconsistent(String),

    #[error("degenerate face {face}: edge or area below tolerance")]
    Degenerate { face: usize },

    #[error("solid-oriented mesh produced {count} hits after repair; last hit discarded")]
    OddHits { count: usize },
}

pub type BotResult<T> = Result<T, BotError>;
