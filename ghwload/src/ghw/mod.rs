// Copyright 2024 The Regents of the University of California
// Copyright 2024-2025 Cornell University
// released under BSD 3-Clause License
// author: Kevin Laeufer <laeufer@cornell.edu>

mod common;
mod hierarchy;
mod replay;
mod signals;
mod types;

pub use common::{GhwHierarchyKind, GhwParseError, GhwRtik, GhwSignalId, GhwWellKnownType, Result};
pub use hierarchy::{
    walk_scalars, GhwHierarchy, GhwHierarchyBuilder, HierEntry, HierItem, HierRef, ScopeKind,
    SignalKind,
};
pub use replay::{CycleStep, ReplayEvent, ReplaySource};
pub use signals::GhwReader;
pub use types::{
    format_g, EnumType, GhwType, GhwValue, PhysicalUnit, Range, RangeDir, RecordField, ScalarKind,
    TypeId, TypeTable,
};

use std::io::BufRead;

/// Checks header to see if we are dealing with a GHW file. The input is not consumed.
pub fn is_ghw(input: &mut impl BufRead) -> bool {
    match input.fill_buf() {
        Ok(buf) => hierarchy::read_ghw_header(&mut &buf[..]).is_ok(),
        Err(_) => false,
    }
}

/// Tables that describe a trace before its first value section.
#[derive(Debug, Clone)]
pub struct BaseTables {
    pub types: TypeTable,
    /// `None` if the file does not declare a hierarchy
    pub hierarchy: Option<GhwHierarchy>,
}

/// Decoder state of one basic signal.
#[derive(Debug, Clone, Copy)]
pub struct RawSignal {
    /// base scalar type, `None` for signals that no hierarchy entry refers to
    pub tpe: Option<TypeId>,
    pub value: GhwValue,
}

/// Result of reading the next section of the value stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    /// all signal values were updated
    Snapshot,
    /// the first step of a cycle, the changed signals are listed
    Cycle,
    Other,
    Eof,
}

/// Sequential access to the base tables and value stream of a GHW trace.
///
/// `read_base` has to be called once before any other method. A cycle is consumed by calling
/// `read_cycle_next` followed by `read_cycle_cont` until `read_cycle_next` returns `false`,
/// and is then closed with `read_cycle_end`.
pub trait GhwSource {
    fn read_base(&mut self) -> Result<BaseTables>;
    /// One entry per basic signal, indexed by [`GhwSignalId::index`].
    fn signals(&self) -> &[RawSignal];
    /// Time of the last snapshot or cycle step in femto seconds.
    fn snap_time(&self) -> i64;
    fn read_section(&mut self, changed: &mut Vec<GhwSignalId>) -> Result<Section>;
    /// Advances to the next step of the current cycle. Returns `false` at the end of the cycle.
    fn read_cycle_next(&mut self) -> Result<bool>;
    fn read_cycle_cont(&mut self, changed: &mut Vec<GhwSignalId>) -> Result<()>;
    fn read_cycle_end(&mut self) -> Result<()>;
}
