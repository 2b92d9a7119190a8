// Copyright 2024 The Regents of the University of California
// Copyright 2024-2025 Cornell University
// released under BSD 3-Clause License
// author: Kevin Laeufer <laeufer@cornell.edu>

mod directory;
mod dump;
pub mod ghw;
mod hierarchy;
mod history;
mod loader;
pub mod sort;
pub mod splay;
mod tree;

/// Cargo.toml version of this library.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Copy, Clone)]
pub struct LoadOptions {
    /// Inserted between the components of a hierarchical signal name.
    pub hierarchy_separator: char,
    /// Name of the hierarchy root. GHW files do not record a name for the top level.
    pub top_name: &'static str,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            hierarchy_separator: '.',
            top_name: "top",
        }
    }
}

/// Inconsistencies between the hierarchy, the types and the value stream of a trace.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CorruptionKind {
    #[error("signal {0} ran out of basic signal ids")]
    SignalIdsExhausted(String),
    #[error("signal {name} refers to id {id}, but only {num_signals} signals exist")]
    SignalIdOutOfRange {
        name: String,
        id: u32,
        num_signals: usize,
    },
    #[error("signal {0} lists more basic signal ids than its type needs")]
    UnusedSignalIds(String),
    #[error("signal {name} has type {tpe} which cannot be decomposed")]
    UnhandledType { name: String, tpe: String },
    #[error("array {name} is indexed by {tpe}, only integer and enumeration indices are supported")]
    UnhandledIndexType { name: String, tpe: String },
    #[error("array {0} has a range that does not match its index type")]
    RangeKindMismatch(String),
    #[error("value {value} is out of range for signal {signal}")]
    ValueOutOfRange { signal: usize, value: i64 },
    #[error("changed signal {0} does not exist")]
    ChangedSignalOutOfRange(usize),
}

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("failed to open {0:?}")]
    Open(std::path::PathBuf, #[source] std::io::Error),
    #[error("not a GHW file")]
    NotGhw(#[source] ghw::GhwParseError),
    #[error("failed to read the GHW base tables")]
    BaseTables(#[source] ghw::GhwParseError),
    #[error("the GHW file does not contain a hierarchy")]
    NoHierarchy,
    #[error("failed to read the GHW value stream")]
    Stream(#[source] ghw::GhwParseError),
    #[error("a loader can only be used once")]
    AlreadyUsed,
    #[error("the trace has more {0} than fit into 32-bit references")]
    CapacityExceeded(&'static str),
    #[error("failed to load GHW file due to invalid data ({location}): {kind}")]
    Corrupt {
        kind: CorruptionKind,
        location: &'static std::panic::Location<'static>,
    },
}

impl LoadError {
    /// Records the source location of the check that detected the corruption.
    #[track_caller]
    pub fn corrupt(kind: CorruptionKind) -> Self {
        LoadError::Corrupt {
            kind,
            location: std::panic::Location::caller(),
        }
    }
}

pub type Result<T> = std::result::Result<T, LoadError>;

pub use directory::{BitRange, Fac, FacRef, Node, NodeRef, ValueKind};
pub use dump::{DumpFile, GlitchStats, TimeDimension, TimeRange};
pub use history::{Bit, HistEnt, HistFlags, HistRef, HistValue};
pub use loader::GhwLoader;
pub use tree::{DepthFirst, Tree, TreeKind, TreeNode, TreeNodeRef};
