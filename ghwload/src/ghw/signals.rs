// Copyright 2024 The Regents of the University of California
// Copyright 2024-2025 Cornell University
// released under BSD 3-Clause License
// author: Kevin Laeufer <laeufer@cornell.edu>

use crate::ghw::common::*;
use crate::ghw::hierarchy::{read_ghw_header, read_hierarchy_section};
use crate::ghw::types::{
    read_string_section, read_type_section, read_well_known_types_section, GhwValue, ScalarKind,
    TypeTable,
};
use crate::ghw::{BaseTables, GhwSource, RawSignal, Section};
use std::io::BufRead;
use std::sync::Arc;

/// Decodes an uncompressed GHW file in a single forward pass.
pub struct GhwReader<R: BufRead> {
    input: R,
    header: HeaderData,
    signals: Vec<RawSignal>,
    /// scalar kind of every signal, `None` if the hierarchy never assigned a type
    kinds: Vec<Option<ScalarKind>>,
    snap_time: i64,
}

impl<R: BufRead> GhwReader<R> {
    /// Reads and checks the file header.
    pub fn new(mut input: R) -> Result<Self> {
        let header = read_ghw_header(&mut input)?;
        Ok(Self {
            input,
            header,
            signals: vec![],
            kinds: vec![],
            snap_time: 0,
        })
    }

    pub fn header(&self) -> &HeaderData {
        &self.header
    }

    fn read_value(&mut self, index: usize) -> Result<()> {
        if let Some(kind) = self.kinds[index] {
            self.signals[index].value = GhwValue::read(kind, &mut self.input)?;
        }
        Ok(())
    }

    fn read_snapshot(&mut self) -> Result<()> {
        let mut h = [0u8; 12];
        self.input.read_exact(&mut h)?;
        expect_zero_prefix("snapshot", &h)?;

        // time in femto seconds
        self.snap_time = self.header.read_i64(&mut &h[4..12])?;

        for index in 0..self.signals.len() {
            self.read_value(index)?;
        }

        expect_mark(&mut self.input, "snapshot", mark::ESN)
    }

    fn read_directory(&mut self) -> Result<()> {
        let mut h = [0u8; 8];
        self.input.read_exact(&mut h)?;
        // note: the directory section does not contain the normal 4 zeros
        let num_entries = self.header.read_u32(&mut &h[4..8])?;
        for _ in 0..num_entries {
            // four byte section id followed by a four byte position
            let mut entry = [0u8; 8];
            self.input.read_exact(&mut entry)?;
        }
        expect_mark(&mut self.input, "directory", mark::EOD)
    }

    /// Returns `true` if the input is exhausted at a section boundary.
    fn at_eof(&mut self) -> Result<bool> {
        Ok(self.input.fill_buf()?.is_empty())
    }
}

impl<R: BufRead> GhwSource for GhwReader<R> {
    fn read_base(&mut self) -> Result<BaseTables> {
        let header = self.header;
        let mut strings: Vec<Arc<str>> = vec![];
        let mut types = TypeTable::default();
        let mut hierarchy = None;

        loop {
            let tag: [u8; 4] = read_array(&mut self.input)?;

            match &tag {
                mark::STR => {
                    strings = read_string_section(&header, &mut self.input)?;
                }
                mark::TYP => {
                    types = read_type_section(&header, &strings, &mut self.input)?;
                }
                mark::WKT => {
                    read_well_known_types_section(&mut self.input, &mut types)?;
                }
                mark::HIE => {
                    let (hier, signal_types) =
                        read_hierarchy_section(&header, &strings, &types, &mut self.input)?;
                    self.kinds = signal_types
                        .iter()
                        .map(|t| t.and_then(|t| types.get(t).scalar_kind()))
                        .collect();
                    self.signals = signal_types
                        .into_iter()
                        .zip(self.kinds.iter())
                        .map(|(tpe, kind)| RawSignal {
                            tpe,
                            value: GhwValue::zero(kind.unwrap_or(ScalarKind::B2)),
                        })
                        .collect();
                    hierarchy = Some(hier);
                }
                mark::EOH => {
                    break; // done
                }
                other => {
                    return Err(GhwParseError::UnexpectedSection(
                        String::from_utf8_lossy(other).to_string(),
                    ))
                }
            }
        }

        Ok(BaseTables { types, hierarchy })
    }

    fn signals(&self) -> &[RawSignal] {
        &self.signals
    }

    fn snap_time(&self) -> i64 {
        self.snap_time
    }

    fn read_section(&mut self, changed: &mut Vec<GhwSignalId>) -> Result<Section> {
        changed.clear();
        if self.at_eof()? {
            return Ok(Section::Eof);
        }
        let tag: [u8; 4] = read_array(&mut self.input)?;

        match &tag {
            mark::SNP => {
                self.read_snapshot()?;
                Ok(Section::Snapshot)
            }
            mark::CYC => {
                let mut h = [0u8; 8];
                self.input.read_exact(&mut h)?;
                // note: cycle sections do not have the four zero bytes!
                self.snap_time = self.header.read_i64(&mut &h[..])?;
                self.read_cycle_cont(changed)?;
                Ok(Section::Cycle)
            }
            mark::DIR => {
                self.read_directory()?;
                Ok(Section::Other)
            }
            mark::TAI => {
                let mut tailer_body = [0u8; TAILER_LEN - mark::TAI.len()];
                self.input.read_exact(&mut tailer_body)?;
                Ok(Section::Other)
            }
            other => Err(GhwParseError::UnexpectedSection(
                String::from_utf8_lossy(other).to_string(),
            )),
        }
    }

    fn read_cycle_next(&mut self) -> Result<bool> {
        let time_delta = leb128::read::signed(&mut self.input)?;
        if time_delta < 0 {
            Ok(false) // end of cycle
        } else {
            self.snap_time = self.snap_time.saturating_add(time_delta);
            Ok(true)
        }
    }

    fn read_cycle_cont(&mut self, changed: &mut Vec<GhwSignalId>) -> Result<()> {
        changed.clear();
        // position one past the last signal that was read, deltas skip untyped signals
        let mut pos = 0usize;
        loop {
            let mut delta = leb128::read::unsigned(&mut self.input)?;
            if delta == 0 {
                break;
            }
            while delta > 0 {
                pos += 1;
                match self.kinds.get(pos - 1) {
                    Some(Some(_)) => delta -= 1,
                    Some(None) => {}
                    None => {
                        return Err(GhwParseError::InvalidSignalId(
                            pos as u64,
                            self.signals.len(),
                        ))
                    }
                }
            }
            self.read_value(pos - 1)?;
            if let Some(id) = GhwSignalId::from_index(pos - 1) {
                changed.push(id);
            }
        }
        Ok(())
    }

    fn read_cycle_end(&mut self) -> Result<()> {
        expect_mark(&mut self.input, "cycle", mark::ECY)
    }
}
