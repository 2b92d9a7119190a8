// Copyright 2024 The Regents of the University of California
// Copyright 2024-2025 Cornell University
// released under BSD 3-Clause License
// author: Kevin Laeufer <laeufer@cornell.edu>

use crate::directory::Node;
use crate::ghw::{GhwType, GhwValue, GhwWellKnownType, RawSignal, TypeTable};
use crate::{CorruptionKind, LoadError, Result};
use bitflags::bitflags;
use rustc_hash::FxHashMap;
use std::num::NonZeroU32;
use std::sync::Arc;

/// Time of the sentinel that starts every history.
pub const PRE_START_TIME: i64 = -1;
/// Time of the two sentinels that end every history.
pub const END_OF_TIME: i64 = i64::MAX;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    #[cfg_attr(feature = "serde1", derive(serde::Serialize, serde::Deserialize))]
    #[repr(transparent)]
    pub struct HistFlags: u8 {
        const REAL = 0b0000_0001;
        const STRING = 0b0000_0010;
        /// the value was overwritten by a later change at the same time
        const GLITCH = 0b0000_0100;
    }
}

/// A single bit in one of the nine states of `std_ulogic`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Bit {
    Zero,
    One,
    X,
    Z,
    U,
    W,
    L,
    H,
    Dash,
}

impl Bit {
    /// `std_ulogic` values in declaration order.
    pub const STD_ULOGIC: [Bit; 9] = [
        Bit::U,
        Bit::X,
        Bit::Zero,
        Bit::One,
        Bit::Z,
        Bit::W,
        Bit::L,
        Bit::H,
        Bit::Dash,
    ];

    pub fn to_char(self) -> char {
        match self {
            Bit::Zero => '0',
            Bit::One => '1',
            Bit::X => 'x',
            Bit::Z => 'z',
            Bit::U => 'u',
            Bit::W => 'w',
            Bit::L => 'l',
            Bit::H => 'h',
            Bit::Dash => '-',
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum HistValue {
    /// value of the pre-start sentinel
    Empty,
    Bit(Bit),
    /// most significant bit first
    Vector(Box<[Bit]>),
    /// enumeration literal, shared with the type table
    Literal(Arc<str>),
    Real(f64),
}

impl HistValue {
    pub fn render(&self) -> String {
        match self {
            HistValue::Empty => String::new(),
            HistValue::Bit(b) => b.to_char().to_string(),
            HistValue::Vector(bits) => bits.iter().map(|b| b.to_char()).collect(),
            HistValue::Literal(l) => l.to_string(),
            HistValue::Real(r) => crate::ghw::format_g(*r),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HistRef(NonZeroU32);

impl HistRef {
    #[inline]
    fn from_index(index: usize) -> Option<Self> {
        let raw = u32::try_from(index).ok()?.checked_add(1)?;
        NonZeroU32::new(raw).map(Self)
    }

    #[inline]
    pub fn index(&self) -> usize {
        (self.0.get() - 1) as usize
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HistEnt {
    pub time: i64,
    pub flags: HistFlags,
    pub value: HistValue,
    pub next: Option<HistRef>,
}

/// Holds the history entries of all signals. Entries are never removed individually.
#[derive(Debug, Clone, Default)]
pub struct HistoryArena {
    entries: Vec<HistEnt>,
}

impl HistoryArena {
    /// References are 32 bits wide, which limits a trace to `u32::MAX - 1` entries.
    fn push(&mut self, entry: HistEnt) -> Result<HistRef> {
        let r = HistRef::from_index(self.entries.len())
            .ok_or(LoadError::CapacityExceeded("history entries"))?;
        self.entries.push(entry);
        Ok(r)
    }

    #[inline]
    pub fn get(&self, r: HistRef) -> &HistEnt {
        &self.entries[r.index()]
    }

    #[inline]
    fn get_mut(&mut self, r: HistRef) -> &mut HistEnt {
        &mut self.entries[r.index()]
    }

    /// Follows the list that starts at `head`.
    pub fn iter(&self, head: Option<HistRef>) -> impl Iterator<Item = &HistEnt> + '_ {
        std::iter::successors(head.map(|h| self.get(h)), move |e| e.next.map(|n| self.get(n)))
    }
}

/// Appends value changes to the per-signal histories while the value stream is replayed.
pub(crate) struct HistoryBuilder<'a> {
    types: &'a TypeTable,
    arena: HistoryArena,
    /// last entry of every basic signal
    curr: Vec<Option<HistRef>>,
    /// decimal renderings of `e32` values
    literals: FxHashMap<i32, Arc<str>>,
    glitches: u64,
    glitch_regions: u64,
}

impl<'a> HistoryBuilder<'a> {
    pub fn new(types: &'a TypeTable, num_signals: usize) -> Self {
        Self {
            types,
            arena: HistoryArena::default(),
            curr: vec![None; num_signals],
            literals: FxHashMap::default(),
            glitches: 0,
            glitch_regions: 0,
        }
    }

    fn literal(&mut self, value: i32) -> Arc<str> {
        self.literals
            .entry(value)
            .or_insert_with(|| Arc::from(value.to_string()))
            .clone()
    }

    /// Converts the current value of a signal, `None` if its type cannot be shown.
    fn convert(
        &mut self,
        index: usize,
        signal: &RawSignal,
    ) -> Result<Option<(HistFlags, HistValue)>> {
        let types = self.types;
        let Some(tpe) = signal.tpe else {
            return Ok(None);
        };
        let out_of_range = |value: u8| {
            LoadError::corrupt(CorruptionKind::ValueOutOfRange {
                signal: index,
                value: value as i64,
            })
        };
        let literal_flags = HistFlags::STRING | HistFlags::REAL;
        let converted = match (types.get(tpe), signal.value) {
            (GhwType::Enum(e), GhwValue::B2(v)) if e.wkt == GhwWellKnownType::Bit => {
                let bit = if v == 0 { Bit::Zero } else { Bit::One };
                (HistFlags::empty(), HistValue::Bit(bit))
            }
            (GhwType::Enum(e), GhwValue::E8(v)) if e.wkt == GhwWellKnownType::StdULogic => {
                let bit = Bit::STD_ULOGIC
                    .get(v as usize)
                    .ok_or_else(|| out_of_range(v))?;
                (HistFlags::empty(), HistValue::Bit(*bit))
            }
            (GhwType::Enum(e), GhwValue::B2(v) | GhwValue::E8(v)) => {
                let lit = e.literals.get(v as usize).ok_or_else(|| out_of_range(v))?;
                (literal_flags, HistValue::Literal(lit.clone()))
            }
            (GhwType::Enum(_), GhwValue::E32(v)) => {
                (literal_flags, HistValue::Literal(self.literal(v)))
            }
            (GhwType::Scalar { .. }, GhwValue::I32(v)) => {
                (HistFlags::empty(), HistValue::Vector(to_bits(v as i64, 32)))
            }
            (GhwType::Scalar { .. }, GhwValue::I64(v)) => {
                (HistFlags::empty(), HistValue::Vector(to_bits(v, 64)))
            }
            (GhwType::Scalar { .. }, GhwValue::F64(v)) => (HistFlags::REAL, HistValue::Real(v)),
            (other, value) => {
                log::warn!(
                    "unhandled kind {:?} with value {value:?} for signal {index}",
                    other.rtik()
                );
                return Ok(None);
            }
        };
        Ok(Some(converted))
    }

    /// Records the current value of basic signal `index` at time `time`.
    pub fn add_history(
        &mut self,
        node: &mut Node,
        index: usize,
        signal: &RawSignal,
        time: i64,
    ) -> Result<()> {
        let Some((flags, value)) = self.convert(index, signal)? else {
            return Ok(());
        };

        let curr = match self.curr[index] {
            Some(curr) => curr,
            None => {
                let head = self.arena.push(HistEnt {
                    time: PRE_START_TIME,
                    flags,
                    value: HistValue::Empty,
                    next: None,
                })?;
                node.head = Some(head);
                head
            }
        };

        let entry = self.arena.get_mut(curr);
        if entry.time == time {
            // a glitch, the value is replaced in place
            if time != 0 {
                self.glitches += 1;
                if !entry.flags.contains(HistFlags::GLITCH) {
                    entry.flags |= HistFlags::GLITCH;
                    self.glitch_regions += 1;
                }
            }
            entry.value = value;
            self.curr[index] = Some(curr);
            return Ok(());
        }
        if matches!(value, HistValue::Bit(_)) && entry.value == value {
            // same value at a later time
            self.curr[index] = Some(curr);
            return Ok(());
        }

        let new = self.arena.push(HistEnt {
            time,
            flags,
            value,
            next: None,
        })?;
        self.arena.get_mut(curr).next = Some(new);
        self.curr[index] = Some(new);
        Ok(())
    }

    /// Appends two copies of the last entry at the end of time to every non-empty history.
    pub fn add_tail(&mut self) -> Result<()> {
        for _ in 0..2 {
            for curr in self.curr.iter_mut() {
                let Some(last) = *curr else {
                    continue;
                };
                let mut copy = self.arena.get(last).clone();
                copy.time = END_OF_TIME;
                copy.next = None;
                let new = self.arena.push(copy)?;
                self.arena.get_mut(last).next = Some(new);
                *curr = Some(new);
            }
        }
        Ok(())
    }

    /// Returns the arena together with the number of glitches and glitch regions.
    pub fn finish(self) -> (HistoryArena, u64, u64) {
        (self.arena, self.glitches, self.glitch_regions)
    }
}

/// Two's complement representation, most significant bit first.
fn to_bits(value: i64, width: u32) -> Box<[Bit]> {
    (0..width)
        .rev()
        .map(|i| if (value >> i) & 1 == 1 { Bit::One } else { Bit::Zero })
        .collect()
}
