// Copyright 2024 The Regents of the University of California
// Copyright 2024-2025 Cornell University
// released under BSD 3-Clause License
// author: Kevin Laeufer <laeufer@cornell.edu>

use crate::ghw::common::*;
use crate::ghw::types::{read_string_id, GhwType, GhwValue, TypeId, TypeTable};
use num_enum::TryFromPrimitive;
use std::io::BufRead;
use std::num::NonZeroU32;
use std::sync::Arc;

/// Reads the 16 byte file header. Compressed files are recognized by their magic, but cannot
/// be decoded.
pub fn read_ghw_header(input: &mut impl BufRead) -> Result<HeaderData> {
    let mut raw = [0u8; 16];
    input.read_exact(&mut raw[..2])?;
    if let Some(format) = compression_format(&raw[..2]) {
        return Err(GhwParseError::UnsupportedCompression(format.to_string()));
    }
    input.read_exact(&mut raw[2..])?;
    let (magic, fields) = raw.split_at(FILE_MAGIC.len());
    if magic != FILE_MAGIC {
        return Err(GhwParseError::UnexpectedHeaderMagic(
            String::from_utf8_lossy(magic).into_owned(),
        ));
    }

    // header size, zero, version, byte order, word size, word offset, zero
    let &[size, zero0, version, order, word_len, word_offset, zero1] = fields else {
        return Err(GhwParseError::UnexpectedHeader(format!("{fields:?}")));
    };
    let header = HeaderData {
        version,
        big_endian: order == 2,
        word_len,
        word_offset,
    };
    let valid = size == 16 && zero0 == 0 && zero1 == 0 && version <= 1 && matches!(order, 1 | 2);
    if valid {
        Ok(header)
    } else {
        Err(GhwParseError::UnexpectedHeader(format!("{header:?}")))
    }
}

/// Points to an entry of a [`GhwHierarchy`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HierRef(NonZeroU32);

impl HierRef {
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

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScopeKind {
    Design,
    Block,
    GenerateIf,
    GenerateFor { iter_type: TypeId, iter_value: GhwValue },
    Instance,
    Package,
    Generic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalKind {
    Signal,
    PortIn,
    PortOut,
    PortInOut,
    Buffer,
    Linkage,
}

#[derive(Debug, Clone)]
pub enum HierEntry {
    Scope {
        kind: ScopeKind,
        name: Arc<str>,
    },
    Process {
        name: Arc<str>,
    },
    /// A declared signal or port. `sigs` lists the raw ids of its basic signals in
    /// declaration order, as recorded in the file.
    Signal {
        kind: SignalKind,
        name: Arc<str>,
        tpe: TypeId,
        sigs: Vec<u32>,
    },
}

#[derive(Debug, Clone)]
pub struct HierItem {
    pub entry: HierEntry,
    pub child: Option<HierRef>,
    pub next: Option<HierRef>,
}

/// The design hierarchy as declared in a GHW file. The root is an unnamed design scope.
#[derive(Debug, Clone)]
pub struct GhwHierarchy {
    items: Vec<HierItem>,
}

impl GhwHierarchy {
    pub fn root(&self) -> HierRef {
        HierRef(NonZeroU32::MIN)
    }

    #[inline]
    pub fn get(&self, r: HierRef) -> &HierItem {
        &self.items[r.index()]
    }

    pub fn children(&self, r: HierRef) -> impl Iterator<Item = HierRef> + '_ {
        std::iter::successors(self.get(r).child, move |c| self.get(*c).next)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

struct ScopeStackEntry {
    scope: HierRef,
    last_child: Option<HierRef>,
}

/// Builds a [`GhwHierarchy`] in file order. Scopes stay open until `pop_scope` is called.
pub struct GhwHierarchyBuilder {
    items: Vec<HierItem>,
    scope_stack: Vec<ScopeStackEntry>,
}

impl Default for GhwHierarchyBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl GhwHierarchyBuilder {
    pub fn new() -> Self {
        let root = HierItem {
            entry: HierEntry::Scope {
                kind: ScopeKind::Design,
                name: "".into(),
            },
            child: None,
            next: None,
        };
        Self {
            items: vec![root],
            scope_stack: vec![ScopeStackEntry {
                scope: HierRef(NonZeroU32::MIN),
                last_child: None,
            }],
        }
    }

    fn add_item(&mut self, entry: HierEntry) -> HierRef {
        // at most `u32::MAX - 1` entries, GHW files count them in 32 bits
        let id = HierRef::from_index(self.items.len());
        debug_assert!(id.is_some(), "more than u32::MAX - 1 hierarchy entries");
        let id = id.unwrap_or(HierRef(NonZeroU32::MAX));
        self.items.push(HierItem {
            entry,
            child: None,
            next: None,
        });
        // the root entry never leaves the stack, so there always is a parent
        if let Some(parent) = self.scope_stack.last_mut() {
            match parent.last_child {
                None => self.items[parent.scope.index()].child = Some(id),
                Some(prev) => self.items[prev.index()].next = Some(id),
            }
            parent.last_child = Some(id);
        }
        id
    }

    pub fn add_scope(&mut self, kind: ScopeKind, name: Arc<str>) -> HierRef {
        let id = self.add_item(HierEntry::Scope { kind, name });
        self.scope_stack.push(ScopeStackEntry {
            scope: id,
            last_child: None,
        });
        id
    }

    pub fn pop_scope(&mut self) -> Result<()> {
        if self.scope_stack.len() <= 1 {
            return Err(GhwParseError::FailedToParseSection(
                "hierarchy",
                "end of scope without an open scope".to_string(),
            ));
        }
        self.scope_stack.pop();
        Ok(())
    }

    pub fn add_process(&mut self, name: Arc<str>) -> HierRef {
        self.add_item(HierEntry::Process { name })
    }

    pub fn add_signal(
        &mut self,
        kind: SignalKind,
        name: Arc<str>,
        tpe: TypeId,
        sigs: Vec<u32>,
    ) -> HierRef {
        self.add_item(HierEntry::Signal {
            kind,
            name,
            tpe,
            sigs,
        })
    }

    pub fn finish(mut self) -> GhwHierarchy {
        self.items.shrink_to_fit();
        GhwHierarchy { items: self.items }
    }
}

/// Calls `on_scalar` with the base scalar type of every basic signal that makes up a value
/// of type `tpe`, in the order GHDL numbers them.
pub fn walk_scalars(
    types: &TypeTable,
    tpe: TypeId,
    on_scalar: &mut impl FnMut(TypeId) -> Result<()>,
) -> Result<()> {
    let base = types.base_scalar(tpe);
    let Some(resolved) = types.try_get(base) else {
        return Err(GhwParseError::InvalidTypeId(base.index() as u64 + 1));
    };
    match resolved {
        GhwType::Enum(_) | GhwType::Scalar { .. } => on_scalar(base),
        GhwType::SubtypeArray {
            ranges, element, ..
        } => {
            let mut count = 1u64;
            for range in ranges.iter() {
                count = count.saturating_mul(range.len().unwrap_or(0));
            }
            for _ in 0..count {
                walk_scalars(types, *element, on_scalar)?;
            }
            Ok(())
        }
        GhwType::Record { fields, .. } | GhwType::SubtypeRecord { fields, .. } => {
            for field in fields.iter() {
                walk_scalars(types, field.tpe, on_scalar)?;
            }
            Ok(())
        }
        other => Err(GhwParseError::UnexpectedType(
            format!("{:?}", other.rtik()),
            "as signal type",
        )),
    }
}

/// Parses the hierarchy section. Returns the hierarchy and the base type of every basic signal,
/// indexed by `GhwSignalId`.
pub(crate) fn read_hierarchy_section(
    header: &HeaderData,
    strings: &[Arc<str>],
    types: &TypeTable,
    input: &mut impl BufRead,
) -> Result<(GhwHierarchy, Vec<Option<TypeId>>)> {
    let mut hdr = [0u8; 16];
    input.read_exact(&mut hdr)?;
    expect_zero_prefix("hierarchy", &hdr)?;

    // it appears that this number is actually not always 100% accurate
    let _expected_num_scopes = header.read_u32(&mut &hdr[4..8])?;
    // declared signals, may be composite
    let expected_num_declared_vars = header.read_u32(&mut &hdr[8..12])?;
    let num_signals = header.read_u32(&mut &hdr[12..16])? as usize;

    let mut signal_types: Vec<Option<TypeId>> = vec![None; num_signals];
    let mut num_declared_vars = 0;
    let mut h = GhwHierarchyBuilder::new();

    loop {
        let kind = GhwHierarchyKind::try_from_primitive(read_u8(input)?)?;

        match kind {
            GhwHierarchyKind::End => break, // done
            GhwHierarchyKind::EndOfScope => h.pop_scope()?,
            GhwHierarchyKind::Design => {
                return Err(GhwParseError::FailedToParseSection(
                    "hierarchy",
                    "unexpected nested design entry".to_string(),
                ))
            }
            GhwHierarchyKind::Process => {
                let name = read_string_id(strings, input)?;
                h.add_process(name);
            }
            GhwHierarchyKind::GenerateFor => {
                let name = read_string_id(strings, input)?;
                let iter_type = read_type_id(types, input)?;
                let Some(kind) = types.get(types.base_scalar(iter_type)).scalar_kind() else {
                    return Err(GhwParseError::UnexpectedType(
                        types.get(iter_type).name().to_string(),
                        "as generate iterator",
                    ));
                };
                let iter_value = GhwValue::read(kind, input)?;
                h.add_scope(
                    ScopeKind::GenerateFor {
                        iter_type,
                        iter_value,
                    },
                    name,
                );
            }
            GhwHierarchyKind::Block
            | GhwHierarchyKind::GenerateIf
            | GhwHierarchyKind::Instance
            | GhwHierarchyKind::Generic
            | GhwHierarchyKind::Package => {
                let name = read_string_id(strings, input)?;
                h.add_scope(convert_scope_kind(kind), name);
            }
            GhwHierarchyKind::Signal
            | GhwHierarchyKind::PortIn
            | GhwHierarchyKind::PortOut
            | GhwHierarchyKind::PortInOut
            | GhwHierarchyKind::Buffer
            | GhwHierarchyKind::Linkage => {
                let name = read_string_id(strings, input)?;
                let tpe = read_type_id(types, input)?;
                let sigs = read_signal_ids(types, tpe, &mut signal_types, input)?;
                h.add_signal(convert_signal_kind(kind), name, tpe, sigs);
                num_declared_vars += 1;
                if num_declared_vars > expected_num_declared_vars {
                    return Err(GhwParseError::FailedToParseSection(
                        "hierarchy",
                        format!(
                            "more declared variables than expected {expected_num_declared_vars}"
                        ),
                    ));
                }
            }
        }
    }

    Ok((h.finish(), signal_types))
}

fn read_type_id(types: &TypeTable, input: &mut impl BufRead) -> Result<TypeId> {
    let value = leb128::read::unsigned(input)?;
    usize::try_from(value)
        .ok()
        .and_then(|raw| TypeId::from_index(raw.checked_sub(1)?))
        .filter(|id| id.index() < types.len())
        .ok_or(GhwParseError::InvalidTypeId(value))
}

/// Reads the basic signal ids of one declared signal and records their base types.
fn read_signal_ids(
    types: &TypeTable,
    tpe: TypeId,
    signal_types: &mut [Option<TypeId>],
    input: &mut impl BufRead,
) -> Result<Vec<u32>> {
    let num_scalars = types
        .num_scalars(tpe)
        .ok_or_else(|| GhwParseError::UnboundedType(types.get(tpe).name().to_string()))?;
    let mut sigs = Vec::with_capacity(num_scalars as usize);
    let num_signals = signal_types.len();
    walk_scalars(types, tpe, &mut |scalar| {
        let raw = leb128::read::unsigned(input)?;
        let id = GhwSignalId::from_raw(raw as u32)
            .filter(|id| raw <= u32::MAX as u64 && id.index() < num_signals)
            .ok_or(GhwParseError::InvalidSignalId(raw, num_signals))?;
        let slot = &mut signal_types[id.index()];
        if slot.is_none() {
            *slot = Some(scalar);
        }
        sigs.push(id.raw());
        Ok(())
    })?;
    Ok(sigs)
}

fn convert_scope_kind(kind: GhwHierarchyKind) -> ScopeKind {
    match kind {
        GhwHierarchyKind::Block => ScopeKind::Block,
        GhwHierarchyKind::GenerateIf => ScopeKind::GenerateIf,
        GhwHierarchyKind::Instance => ScopeKind::Instance,
        GhwHierarchyKind::Package => ScopeKind::Package,
        GhwHierarchyKind::Generic => ScopeKind::Generic,
        _ => ScopeKind::Design,
    }
}

fn convert_signal_kind(kind: GhwHierarchyKind) -> SignalKind {
    match kind {
        GhwHierarchyKind::PortIn => SignalKind::PortIn,
        GhwHierarchyKind::PortOut => SignalKind::PortOut,
        GhwHierarchyKind::PortInOut => SignalKind::PortInOut,
        GhwHierarchyKind::Buffer => SignalKind::Buffer,
        GhwHierarchyKind::Linkage => SignalKind::Linkage,
        _ => SignalKind::Signal,
    }
}

/// Assigns the base type of every basic signal referenced by `hierarchy`.
/// Raw ids that are zero or larger than `num_signals` are rejected.
pub fn signal_types_from_hierarchy(
    types: &TypeTable,
    hierarchy: &GhwHierarchy,
    num_signals: usize,
) -> Result<Vec<Option<TypeId>>> {
    let mut signal_types = vec![None; num_signals];
    for item in hierarchy.items.iter() {
        if let HierEntry::Signal { tpe, sigs, .. } = &item.entry {
            let mut ids = sigs.iter();
            walk_scalars(types, *tpe, &mut |scalar| {
                let raw = ids.next().copied().unwrap_or(0);
                let id = GhwSignalId::from_raw(raw)
                    .filter(|id| id.index() < num_signals)
                    .ok_or(GhwParseError::InvalidSignalId(raw as u64, num_signals))?;
                let slot = &mut signal_types[id.index()];
                if slot.is_none() {
                    *slot = Some(scalar);
                }
                Ok(())
            })?;
        }
    }
    Ok(signal_types)
}
