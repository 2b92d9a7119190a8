// Copyright 2024 The Regents of the University of California
// Copyright 2024-2025 Cornell University
// released under BSD 3-Clause License
// author: Kevin Laeufer <laeufer@cornell.edu>

use crate::directory::{assign_names, classify, split_aliases, Node};
use crate::dump::{DumpFile, GlitchStats, TimeRange};
use crate::ghw::{GhwReader, GhwSource, Section};
use crate::hierarchy::{build_tree, BuiltTree};
use crate::history::HistoryBuilder;
use crate::sort::{rechain, sort_and_remap};
use crate::{CorruptionKind, LoadError, LoadOptions, Result};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Loads a single GHW trace. A loader can only be used once.
#[derive(Debug)]
pub struct GhwLoader {
    options: LoadOptions,
    used: bool,
}

impl Default for GhwLoader {
    fn default() -> Self {
        Self::new(LoadOptions::default())
    }
}

impl GhwLoader {
    pub fn new(options: LoadOptions) -> Self {
        Self {
            options,
            used: false,
        }
    }

    pub fn load(&mut self, path: impl AsRef<Path>) -> Result<DumpFile> {
        self.claim()?;
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| LoadError::Open(path.to_path_buf(), e))?;
        let source = GhwReader::new(BufReader::new(file)).map_err(LoadError::NotGhw)?;
        self.run(source)
    }

    /// Loads a trace from any source, e.g., a [`crate::ghw::ReplaySource`].
    pub fn load_from(&mut self, source: impl GhwSource) -> Result<DumpFile> {
        self.claim()?;
        self.run(source)
    }

    fn claim(&mut self) -> Result<()> {
        if self.used {
            return Err(LoadError::AlreadyUsed);
        }
        self.used = true;
        Ok(())
    }

    fn run(&self, mut source: impl GhwSource) -> Result<DumpFile> {
        let base = source.read_base().map_err(LoadError::BaseTables)?;
        let Some(hierarchy) = base.hierarchy else {
            return Err(LoadError::NoHierarchy);
        };
        let types = base.types;
        let num_signals = source.signals().len();

        let BuiltTree {
            mut tree,
            num_leaves,
        } = build_tree(&hierarchy, &types, num_signals)?;
        drop(hierarchy);

        let mut nodes: Vec<Node> = source
            .signals()
            .iter()
            .map(|s| {
                let (kind, ext) = classify(&types, s.tpe);
                Node::new(kind, ext)
            })
            .collect();
        log::debug!("{num_signals} basic signals, {num_leaves} tree leaves");

        // replay the value stream
        let mut history = HistoryBuilder::new(&types, num_signals);
        let mut max_time = 0i64;
        let mut changed = Vec::new();
        loop {
            match source.read_section(&mut changed).map_err(LoadError::Stream)? {
                Section::Eof => break,
                Section::Other => {}
                Section::Snapshot => {
                    let time = source.snap_time();
                    max_time = max_time.max(time);
                    for (index, signal) in source.signals().iter().enumerate() {
                        history.add_history(&mut nodes[index], index, signal, time)?;
                    }
                }
                Section::Cycle => {
                    loop {
                        let time = source.snap_time();
                        if time < i64::MAX {
                            max_time = max_time.max(time);
                            for id in changed.iter() {
                                let index = id.index();
                                let Some(signal) = source.signals().get(index) else {
                                    return Err(LoadError::corrupt(
                                        CorruptionKind::ChangedSignalOutOfRange(index),
                                    ));
                                };
                                history.add_history(&mut nodes[index], index, signal, time)?;
                            }
                        }
                        if !source.read_cycle_next().map_err(LoadError::Stream)? {
                            break;
                        }
                        source
                            .read_cycle_cont(&mut changed)
                            .map_err(LoadError::Stream)?;
                    }
                    source.read_cycle_end().map_err(LoadError::Stream)?;
                }
            }
        }
        history.add_tail()?;
        let (arena, glitches, regions) = history.finish();

        let mut facs = assign_names(&mut tree, &mut nodes, num_leaves, &self.options)?;
        split_aliases(&mut facs, &mut nodes);
        let root = tree.root();
        tree.get_mut(root).name = self.options.top_name.to_string();
        let mut facs = sort_and_remap(&mut tree, facs);
        rechain(&mut facs, &nodes);

        log::info!("[0] start time, [{max_time}] end time");
        if glitches > 0 {
            log::warn!(
                "encountered {glitches} glitch{} across {regions} glitch region{}",
                if glitches == 1 { "" } else { "es" },
                if regions == 1 { "" } else { "s" },
            );
        }

        Ok(DumpFile::new(
            tree,
            facs,
            nodes,
            arena,
            TimeRange {
                start: 0,
                end: max_time,
            },
            GlitchStats { glitches, regions },
        ))
    }
}
