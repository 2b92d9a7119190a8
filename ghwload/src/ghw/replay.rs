// Copyright 2024 The Regents of the University of California
// Copyright 2024-2025 Cornell University
// released under BSD 3-Clause License
// author: Kevin Laeufer <laeufer@cornell.edu>

use crate::ghw::common::*;
use crate::ghw::hierarchy::{signal_types_from_hierarchy, GhwHierarchy};
use crate::ghw::types::{GhwValue, ScalarKind, TypeTable};
use crate::ghw::{BaseTables, GhwSource, RawSignal, Section};

/// One delta step of a cycle: all changes happen at `time`.
#[derive(Debug, Clone)]
pub struct CycleStep {
    pub time: i64,
    pub changes: Vec<(GhwSignalId, GhwValue)>,
}

#[derive(Debug, Clone)]
pub enum ReplayEvent {
    /// Updates the listed signals and then reports a snapshot of all signals.
    Snapshot {
        time: i64,
        values: Vec<(GhwSignalId, GhwValue)>,
    },
    Cycle(Vec<CycleStep>),
    /// A section without signal data, like a directory.
    Other,
}

/// A [`GhwSource`] that replays an event list held in memory.
pub struct ReplaySource {
    base: Option<BaseTables>,
    kinds: Vec<Option<ScalarKind>>,
    signals: Vec<RawSignal>,
    events: std::vec::IntoIter<ReplayEvent>,
    cycle: Option<(Vec<CycleStep>, usize)>,
    snap_time: i64,
}

impl ReplaySource {
    /// `num_signals` is the number of basic signals, every id referenced by the hierarchy must
    /// be in `1..=num_signals`.
    pub fn new(
        types: TypeTable,
        hierarchy: Option<GhwHierarchy>,
        num_signals: usize,
        events: Vec<ReplayEvent>,
    ) -> Result<Self> {
        let signal_types = match &hierarchy {
            Some(h) => signal_types_from_hierarchy(&types, h, num_signals)?,
            None => vec![None; num_signals],
        };
        let kinds: Vec<Option<ScalarKind>> = signal_types
            .iter()
            .map(|t| t.and_then(|t| types.get(t).scalar_kind()))
            .collect();
        let signals = signal_types
            .into_iter()
            .zip(kinds.iter())
            .map(|(tpe, kind)| RawSignal {
                tpe,
                value: GhwValue::zero(kind.unwrap_or(ScalarKind::B2)),
            })
            .collect();
        Ok(Self {
            base: Some(BaseTables { types, hierarchy }),
            kinds,
            signals,
            events: events.into_iter(),
            cycle: None,
            snap_time: 0,
        })
    }

    fn apply(
        &mut self,
        values: &[(GhwSignalId, GhwValue)],
        changed: &mut Vec<GhwSignalId>,
    ) -> Result<()> {
        for (id, value) in values.iter() {
            let Some(Some(kind)) = self.kinds.get(id.index()) else {
                return Err(GhwParseError::InvalidSignalId(
                    id.raw() as u64,
                    self.signals.len(),
                ));
            };
            if std::mem::discriminant(&GhwValue::zero(*kind)) != std::mem::discriminant(value) {
                return Err(GhwParseError::UnexpectedType(
                    format!("{value:?}"),
                    "as value of a signal with a different kind",
                ));
            }
            self.signals[id.index()].value = *value;
            changed.push(*id);
        }
        Ok(())
    }
}

impl GhwSource for ReplaySource {
    fn read_base(&mut self) -> Result<BaseTables> {
        self.base.take().ok_or_else(|| {
            GhwParseError::FailedToParseSection("header", "base tables were already read".into())
        })
    }

    fn signals(&self) -> &[RawSignal] {
        &self.signals
    }

    fn snap_time(&self) -> i64 {
        self.snap_time
    }

    fn read_section(&mut self, changed: &mut Vec<GhwSignalId>) -> Result<Section> {
        changed.clear();
        self.cycle = None;
        match self.events.next() {
            None => Ok(Section::Eof),
            Some(ReplayEvent::Other) => Ok(Section::Other),
            Some(ReplayEvent::Snapshot { time, values }) => {
                self.snap_time = time;
                self.apply(&values, changed)?;
                changed.clear();
                Ok(Section::Snapshot)
            }
            Some(ReplayEvent::Cycle(steps)) => {
                let Some(first) = steps.first() else {
                    return Err(GhwParseError::FailedToParseSection(
                        "cycle",
                        "a cycle needs at least one step".into(),
                    ));
                };
                self.snap_time = first.time;
                self.cycle = Some((steps, 0));
                self.read_cycle_cont(changed)?;
                Ok(Section::Cycle)
            }
        }
    }

    fn read_cycle_next(&mut self) -> Result<bool> {
        let Some((steps, step)) = self.cycle.as_mut() else {
            return Ok(false);
        };
        let next = *step + 1;
        match steps.get(next) {
            None => Ok(false),
            Some(s) if s.time < self.snap_time => Err(GhwParseError::FailedToParseSection(
                "cycle",
                format!("time {} goes back before {}", s.time, self.snap_time),
            )),
            Some(s) => {
                self.snap_time = s.time;
                *step = next;
                Ok(true)
            }
        }
    }

    fn read_cycle_cont(&mut self, changed: &mut Vec<GhwSignalId>) -> Result<()> {
        changed.clear();
        let changes = match &self.cycle {
            Some((steps, step)) => steps[*step].changes.clone(),
            None => return Ok(()),
        };
        self.apply(&changes, changed)
    }

    fn read_cycle_end(&mut self) -> Result<()> {
        self.cycle = None;
        Ok(())
    }
}
