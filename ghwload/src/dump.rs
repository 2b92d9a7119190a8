// Copyright 2024 The Regents of the University of California
// Copyright 2024-2025 Cornell University
// released under BSD 3-Clause License
// author: Kevin Laeufer <laeufer@cornell.edu>

use crate::directory::{Fac, FacRef, Node, NodeRef};
use crate::history::{HistEnt, HistoryArena, END_OF_TIME, PRE_START_TIME};
use crate::tree::Tree;
use std::io::Write;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde1", derive(serde::Serialize, serde::Deserialize))]
pub struct TimeRange {
    pub start: i64,
    pub end: i64,
}

/// Unit of all time stamps. GHDL only records femto seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde1", derive(serde::Serialize, serde::Deserialize))]
pub enum TimeDimension {
    FemtoSeconds,
}

impl TimeDimension {
    pub fn to_exponent(&self) -> i8 {
        match self {
            TimeDimension::FemtoSeconds => -15,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde1", derive(serde::Serialize, serde::Deserialize))]
pub struct GlitchStats {
    /// value changes that replaced an earlier change at the same non-zero time
    pub glitches: u64,
    /// history entries affected by at least one glitch
    pub regions: u64,
}

/// A fully loaded trace.
#[derive(Debug, Clone)]
pub struct DumpFile {
    tree: Tree,
    facs: Vec<Fac>,
    nodes: Vec<Node>,
    history: HistoryArena,
    time_range: TimeRange,
    glitch_stats: GlitchStats,
}

impl DumpFile {
    pub(crate) fn new(
        tree: Tree,
        facs: Vec<Fac>,
        nodes: Vec<Node>,
        history: HistoryArena,
        time_range: TimeRange,
        glitch_stats: GlitchStats,
    ) -> Self {
        Self {
            tree,
            facs,
            nodes,
            history,
            time_range,
            glitch_stats,
        }
    }

    pub fn tree(&self) -> &Tree {
        &self.tree
    }

    /// All signals sorted by name.
    pub fn facs(&self) -> &[Fac] {
        &self.facs
    }

    pub fn fac(&self, r: FacRef) -> &Fac {
        &self.facs[r.index()]
    }

    /// Finds a signal by its full name.
    pub fn lookup(&self, name: &str) -> Option<FacRef> {
        self.facs
            .binary_search_by(|f| f.name.as_str().cmp(name))
            .ok()
            .and_then(FacRef::from_index)
    }

    /// Iterates over all members of the vector that `fac` belongs to, starting at the root.
    /// Entries that are not part of a vector only yield themselves.
    pub fn vector_members(&self, fac: FacRef) -> impl Iterator<Item = FacRef> + '_ {
        let first = self.fac(fac).vector_root.unwrap_or(fac);
        std::iter::successors(Some(first), move |f| self.fac(*f).vector_chain)
    }

    pub fn node(&self, r: NodeRef) -> &Node {
        &self.nodes[r.index()]
    }

    /// All history entries of a node, including the sentinels.
    pub fn history(&self, node: NodeRef) -> impl Iterator<Item = &HistEnt> + '_ {
        self.history.iter(self.node(node).head)
    }

    /// Lists the rendered values of signal `name` between `start` and `end`. The first element is
    /// the value in force at `start`. At most `max` values are returned.
    pub fn changes(&self, name: &str, start: i64, end: i64, max: usize) -> Option<Vec<(i64, String)>> {
        let fac = self.lookup(name)?;
        let mut out: Vec<(i64, String)> = Vec::new();
        let mut in_force: Option<&HistEnt> = None;
        for entry in self.history(self.fac(fac).node) {
            if entry.time == PRE_START_TIME || entry.time == END_OF_TIME {
                continue;
            }
            if entry.time <= start {
                in_force = Some(entry);
                continue;
            }
            if entry.time > end {
                break;
            }
            if let Some(e) = in_force.take() {
                out.push((e.time, e.value.render()));
            }
            out.push((entry.time, entry.value.render()));
        }
        if let Some(e) = in_force {
            out.push((e.time, e.value.render()));
        }
        out.truncate(max);
        Some(out)
    }

    pub fn time_range(&self) -> TimeRange {
        self.time_range
    }

    pub fn time_dimension(&self) -> TimeDimension {
        TimeDimension::FemtoSeconds
    }

    pub fn glitch_stats(&self) -> GlitchStats {
        self.glitch_stats
    }

    /// Prints every directory entry with its full history.
    pub fn write_debug(&self, out: &mut impl Write) -> std::io::Result<()> {
        for (i, fac) in self.facs.iter().enumerate() {
            writeln!(out, "{i}: {}", fac.name)?;
            let node = self.node(fac.node);
            if let Some(ext) = node.ext {
                writeln!(out, "  ext: {} - {}", ext.msi, ext.lsi)?;
            }
            for entry in self.history.iter(node.head) {
                writeln!(
                    out,
                    "  time:{} flags:{:02x} value:{}",
                    entry.time,
                    entry.flags.bits(),
                    entry.value.render()
                )?;
            }
        }
        Ok(())
    }
}
