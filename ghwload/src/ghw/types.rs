// Copyright 2024 The Regents of the University of California
// Copyright 2024-2025 Cornell University
// released under BSD 3-Clause License
// author: Kevin Laeufer <laeufer@cornell.edu>

use crate::ghw::common::*;
use num_enum::TryFromPrimitive;
use std::io::BufRead;
use std::num::NonZeroU32;
use std::sync::Arc;

/// Points into a [`TypeTable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde1", derive(serde::Serialize, serde::Deserialize))]
pub struct TypeId(NonZeroU32);

impl TypeId {
    #[inline]
    pub fn from_index(index: usize) -> Option<Self> {
        let raw = u32::try_from(index).ok()?.checked_add(1)?;
        NonZeroU32::new(raw).map(Self)
    }

    #[inline]
    pub fn index(&self) -> usize {
        (self.0.get() - 1) as usize
    }
}

/// The scalar kinds that a basic signal can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarKind {
    B2,
    E8,
    E32,
    I32,
    I64,
    F64,
    P32,
    P64,
}

impl ScalarKind {
    pub fn from_rtik(rtik: GhwRtik) -> Option<Self> {
        match rtik {
            GhwRtik::TypeB2 => Some(ScalarKind::B2),
            GhwRtik::TypeE8 => Some(ScalarKind::E8),
            GhwRtik::TypeE32 => Some(ScalarKind::E32),
            GhwRtik::TypeI32 => Some(ScalarKind::I32),
            GhwRtik::TypeI64 => Some(ScalarKind::I64),
            GhwRtik::TypeF64 => Some(ScalarKind::F64),
            GhwRtik::TypeP32 => Some(ScalarKind::P32),
            GhwRtik::TypeP64 => Some(ScalarKind::P64),
            _ => None,
        }
    }

    pub fn rtik(self) -> GhwRtik {
        match self {
            ScalarKind::B2 => GhwRtik::TypeB2,
            ScalarKind::E8 => GhwRtik::TypeE8,
            ScalarKind::E32 => GhwRtik::TypeE32,
            ScalarKind::I32 => GhwRtik::TypeI32,
            ScalarKind::I64 => GhwRtik::TypeI64,
            ScalarKind::F64 => GhwRtik::TypeF64,
            ScalarKind::P32 => GhwRtik::TypeP32,
            ScalarKind::P64 => GhwRtik::TypeP64,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeDir {
    To,
    Downto,
}

/// Index or value range of a scalar type. Integer-like ranges remember the kind they were
/// declared with, since array indices must agree with their index type.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Range {
    Int {
        kind: ScalarKind,
        dir: RangeDir,
        left: i64,
        right: i64,
    },
    Float {
        dir: RangeDir,
        left: f64,
        right: f64,
    },
}

impl Range {
    pub fn int(kind: ScalarKind, dir: RangeDir, left: i64, right: i64) -> Self {
        Range::Int {
            kind,
            dir,
            left,
            right,
        }
    }

    pub fn kind(&self) -> ScalarKind {
        match self {
            Range::Int { kind, .. } => *kind,
            Range::Float { .. } => ScalarKind::F64,
        }
    }

    /// Number of values in an integer range, zero for null ranges.
    /// Floating point ranges have no length.
    pub fn len(&self) -> Option<u64> {
        match *self {
            Range::Int {
                dir, left, right, ..
            } => {
                let (left, right) = (left as i128, right as i128);
                let len = match dir {
                    RangeDir::To => right - left + 1,
                    RangeDir::Downto => left - right + 1,
                };
                Some(len.clamp(0, u64::MAX as i128) as u64)
            }
            Range::Float { .. } => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == Some(0)
    }

    /// Iterates over all index values from left to right.
    pub fn indices(&self) -> RangeIndices {
        match *self {
            Range::Int {
                dir, left, right, ..
            } if !self.is_empty() => RangeIndices {
                next: Some(left),
                right,
                dir,
            },
            _ => RangeIndices {
                next: None,
                right: 0,
                dir: RangeDir::To,
            },
        }
    }
}

pub struct RangeIndices {
    next: Option<i64>,
    right: i64,
    dir: RangeDir,
}

impl Iterator for RangeIndices {
    type Item = i64;

    fn next(&mut self) -> Option<Self::Item> {
        let value = self.next?;
        self.next = if value == self.right {
            None
        } else {
            match self.dir {
                RangeDir::To => value.checked_add(1),
                RangeDir::Downto => value.checked_sub(1),
            }
        };
        Some(value)
    }
}

#[derive(Debug, Clone)]
pub struct EnumType {
    pub name: Arc<str>,
    /// one of `B2`, `E8` or `E32`
    pub kind: ScalarKind,
    pub literals: Vec<Arc<str>>,
    pub wkt: GhwWellKnownType,
}

#[derive(Debug, Clone)]
pub struct PhysicalUnit {
    pub name: Arc<str>,
    pub value: i64,
}

#[derive(Debug, Clone)]
pub struct RecordField {
    pub name: Arc<str>,
    pub tpe: TypeId,
}

/// Type descriptors as declared in the GHW type table.
#[derive(Debug, Clone)]
pub enum GhwType {
    Enum(EnumType),
    /// `i32`, `i64`, `f64`, `p32` or `p64`. Only physical types carry units.
    Scalar {
        name: Arc<str>,
        kind: ScalarKind,
        units: Vec<PhysicalUnit>,
    },
    SubtypeScalar {
        name: Arc<str>,
        base: TypeId,
        range: Range,
    },
    /// An array type, the dimensions are bounded by a `SubtypeArray`.
    Array {
        name: Arc<str>,
        element: TypeId,
        dims: Vec<TypeId>,
    },
    SubtypeArray {
        name: Arc<str>,
        base: TypeId,
        ranges: Vec<Range>,
        element: TypeId,
    },
    SubtypeUnboundedArray {
        name: Arc<str>,
        base: TypeId,
    },
    Record {
        name: Arc<str>,
        fields: Vec<RecordField>,
    },
    /// A record whose unbounded fields have been constrained.
    SubtypeRecord {
        name: Arc<str>,
        base: TypeId,
        fields: Vec<RecordField>,
    },
    SubtypeUnboundedRecord {
        name: Arc<str>,
        base: TypeId,
    },
}

impl GhwType {
    pub fn rtik(&self) -> GhwRtik {
        match self {
            GhwType::Enum(e) => e.kind.rtik(),
            GhwType::Scalar { kind, .. } => kind.rtik(),
            GhwType::SubtypeScalar { .. } => GhwRtik::SubtypeScalar,
            GhwType::Array { .. } => GhwRtik::TypeArray,
            GhwType::SubtypeArray { .. } => GhwRtik::SubtypeArray,
            GhwType::SubtypeUnboundedArray { .. } => GhwRtik::SubtypeUnboundedArray,
            GhwType::Record { .. } => GhwRtik::TypeRecord,
            GhwType::SubtypeRecord { .. } => GhwRtik::SubtypeRecord,
            GhwType::SubtypeUnboundedRecord { .. } => GhwRtik::SubtypeUnboundedRecord,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            GhwType::Enum(e) => &e.name,
            GhwType::Scalar { name, .. }
            | GhwType::SubtypeScalar { name, .. }
            | GhwType::Array { name, .. }
            | GhwType::SubtypeArray { name, .. }
            | GhwType::SubtypeUnboundedArray { name, .. }
            | GhwType::Record { name, .. }
            | GhwType::SubtypeRecord { name, .. }
            | GhwType::SubtypeUnboundedRecord { name, .. } => name,
        }
    }

    /// Scalar kind of a base type, `None` for subtypes and composites.
    pub fn scalar_kind(&self) -> Option<ScalarKind> {
        match self {
            GhwType::Enum(e) => Some(e.kind),
            GhwType::Scalar { kind, .. } => Some(*kind),
            _ => None,
        }
    }
}

/// All types of a GHW file, indexed by [`TypeId`].
#[derive(Debug, Clone, Default)]
pub struct TypeTable {
    types: Vec<GhwType>,
}

impl TypeTable {
    pub fn push(&mut self, tpe: GhwType) -> TypeId {
        // at most `u32::MAX - 1` types, GHW files count them in 32 bits
        let id = TypeId::from_index(self.types.len());
        debug_assert!(id.is_some(), "more than u32::MAX - 1 types");
        let id = id.unwrap_or(TypeId(NonZeroU32::MAX));
        self.types.push(tpe);
        id
    }

    #[inline]
    pub fn get(&self, id: TypeId) -> &GhwType {
        &self.types[id.index()]
    }

    pub fn try_get(&self, id: TypeId) -> Option<&GhwType> {
        self.types.get(id.index())
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    pub fn add_enum(
        &mut self,
        name: &str,
        kind: ScalarKind,
        literals: &[&str],
        wkt: GhwWellKnownType,
    ) -> TypeId {
        self.push(GhwType::Enum(EnumType {
            name: name.into(),
            kind,
            literals: literals.iter().map(|&l| Arc::from(l)).collect(),
            wkt,
        }))
    }

    /// Adds the `bit` type with its well-known type marker.
    pub fn add_bit(&mut self) -> TypeId {
        self.add_enum("bit", ScalarKind::B2, &["'0'", "'1'"], GhwWellKnownType::Bit)
    }

    /// Adds the `std_ulogic` type with its well-known type marker.
    pub fn add_std_ulogic(&mut self) -> TypeId {
        let lits = ["'U'", "'X'", "'0'", "'1'", "'Z'", "'W'", "'L'", "'H'", "'-'"];
        self.add_enum("std_ulogic", ScalarKind::E8, &lits, GhwWellKnownType::StdULogic)
    }

    pub fn add_scalar(&mut self, name: &str, kind: ScalarKind) -> TypeId {
        self.push(GhwType::Scalar {
            name: name.into(),
            kind,
            units: vec![],
        })
    }

    pub fn add_array(&mut self, name: &str, element: TypeId, dims: Vec<TypeId>) -> TypeId {
        self.push(GhwType::Array {
            name: name.into(),
            element,
            dims,
        })
    }

    /// Adds a bounded version of `base`. The element type is taken from the base array.
    pub fn add_subtype_array(&mut self, name: &str, base: TypeId, ranges: Vec<Range>) -> TypeId {
        let element = match self.array_base(base) {
            Some(GhwType::Array { element, .. }) => *element,
            _ => base,
        };
        self.push(GhwType::SubtypeArray {
            name: name.into(),
            base,
            ranges,
            element,
        })
    }

    pub fn add_record(&mut self, name: &str, fields: &[(&str, TypeId)]) -> TypeId {
        self.push(GhwType::Record {
            name: name.into(),
            fields: fields
                .iter()
                .map(|&(name, tpe)| RecordField {
                    name: name.into(),
                    tpe,
                })
                .collect(),
        })
    }

    /// Strips scalar subtypes until a base type is reached.
    pub fn base_scalar(&self, id: TypeId) -> TypeId {
        let mut id = id;
        while let Some(GhwType::SubtypeScalar { base, .. }) = self.try_get(id) {
            id = *base;
        }
        id
    }

    /// Resolves array subtypes to the array type that declares element and index types.
    pub fn array_base(&self, id: TypeId) -> Option<&GhwType> {
        let mut id = id;
        loop {
            match self.try_get(id)? {
                GhwType::SubtypeArray { base, .. } | GhwType::SubtypeUnboundedArray { base, .. } => {
                    id = *base
                }
                other @ GhwType::Array { .. } => return Some(other),
                _ => return None,
            }
        }
    }

    /// Number of basic signals needed to represent one value of this type,
    /// `None` for unbounded types.
    pub fn num_scalars(&self, id: TypeId) -> Option<u64> {
        count_scalars(&|id| self.try_get(id), id)
    }

    /// Renders a value the way GHDL tools display generate-for iteration values.
    pub fn format_value(&self, id: TypeId, value: &GhwValue) -> String {
        let literal = |index: i64| match self.get(self.base_scalar(id)) {
            GhwType::Enum(e) => usize::try_from(index)
                .ok()
                .and_then(|i| e.literals.get(i))
                .map(|l| l.to_string()),
            _ => None,
        };
        match *value {
            GhwValue::B2(v) | GhwValue::E8(v) => {
                literal(v as i64).unwrap_or_else(|| format!("?{v}"))
            }
            GhwValue::E32(v) | GhwValue::I32(v) => format!("{v}"),
            GhwValue::I64(v) => format!("{v}"),
            GhwValue::F64(v) => format_g(v),
        }
    }
}

fn count_scalars<'a>(get: &impl Fn(TypeId) -> Option<&'a GhwType>, id: TypeId) -> Option<u64> {
    match get(id)? {
        GhwType::Enum(_) | GhwType::Scalar { .. } | GhwType::SubtypeScalar { .. } => Some(1),
        GhwType::SubtypeArray {
            ranges, element, ..
        } => {
            let mut count = count_scalars(get, *element)?;
            for range in ranges.iter() {
                count = count.checked_mul(range.len()?)?;
            }
            Some(count)
        }
        GhwType::Record { fields, .. } | GhwType::SubtypeRecord { fields, .. } => fields
            .iter()
            .try_fold(0u64, |acc, f| acc.checked_add(count_scalars(get, f.tpe)?)),
        GhwType::Array { .. }
        | GhwType::SubtypeUnboundedArray { .. }
        | GhwType::SubtypeUnboundedRecord { .. } => None,
    }
}

/// Current value of a basic signal. Physical values use the integer variants of the same width.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GhwValue {
    B2(u8),
    E8(u8),
    E32(i32),
    I32(i32),
    I64(i64),
    F64(f64),
}

impl GhwValue {
    pub fn zero(kind: ScalarKind) -> Self {
        match kind {
            ScalarKind::B2 => GhwValue::B2(0),
            ScalarKind::E8 => GhwValue::E8(0),
            ScalarKind::E32 => GhwValue::E32(0),
            ScalarKind::I32 | ScalarKind::P32 => GhwValue::I32(0),
            ScalarKind::I64 | ScalarKind::P64 => GhwValue::I64(0),
            ScalarKind::F64 => GhwValue::F64(0.0),
        }
    }

    /// Reads a value of the given kind from a snapshot, cycle or generate-for entry.
    pub fn read(kind: ScalarKind, input: &mut impl BufRead) -> Result<Self> {
        let value = match kind {
            ScalarKind::B2 => GhwValue::B2(read_u8(input)?),
            ScalarKind::E8 => GhwValue::E8(read_u8(input)?),
            ScalarKind::E32 => GhwValue::E32(read_sleb128_i32(input)?),
            ScalarKind::I32 | ScalarKind::P32 => GhwValue::I32(read_sleb128_i32(input)?),
            ScalarKind::I64 | ScalarKind::P64 => GhwValue::I64(leb128::read::signed(input)?),
            ScalarKind::F64 => GhwValue::F64(read_f64_le(input)?),
        };
        Ok(value)
    }
}

/// Formats a float like C's `%g` conversion with the default precision of six digits.
pub fn format_g(value: f64) -> String {
    const PRECISION: i32 = 6;
    if value.is_nan() {
        return "nan".to_string();
    }
    if value.is_infinite() {
        return if value < 0.0 { "-inf" } else { "inf" }.to_string();
    }
    if value == 0.0 {
        return if value.is_sign_negative() { "-0" } else { "0" }.to_string();
    }
    // rounding to the requested precision may bump the exponent, so we take it from the
    // rounded scientific representation
    let sci = format!("{:.*e}", (PRECISION - 1) as usize, value);
    let (mantissa, exp) = sci.split_once('e').unwrap_or((&sci, "0"));
    let exp: i32 = exp.parse().unwrap_or(0);
    if exp < -4 || exp >= PRECISION {
        let sign = if exp < 0 { '-' } else { '+' };
        format!(
            "{}e{sign}{:02}",
            strip_trailing_zeros(mantissa),
            exp.abs()
        )
    } else {
        let decimals = (PRECISION - 1 - exp) as usize;
        strip_trailing_zeros(&format!("{value:.decimals$}")).to_string()
    }
}

fn strip_trailing_zeros(s: &str) -> &str {
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.')
    } else {
        s
    }
}

pub(crate) fn read_string_id(strings: &[Arc<str>], input: &mut impl BufRead) -> Result<Arc<str>> {
    let value = leb128::read::unsigned(input)?;
    strings
        .get(value as usize)
        .cloned()
        .ok_or(GhwParseError::InvalidStringId(value))
}

/// Control bytes end a string and encode, five bits at a time, how many of its leading bytes
/// the next string reuses.
#[inline]
fn is_prefix_byte(byte: u8) -> bool {
    byte < 0x20 || (0x80..0xa0).contains(&byte)
}

pub(crate) fn read_string_section(
    header: &HeaderData,
    input: &mut impl BufRead,
) -> Result<Vec<Arc<str>>> {
    let h: [u8; 12] = read_array(input)?;
    expect_zero_prefix("string", &h)?;
    let count = header.read_u32(&mut &h[4..8])? as usize;
    // h[8..12] holds the total size of all strings, which the table does not need

    // string id 0 is reserved for anonymous entries
    let mut strings: Vec<Arc<str>> = Vec::with_capacity(count + 1);
    strings.push("<anon>".into());

    let mut current: Vec<u8> = Vec::with_capacity(64);
    while strings.len() <= count {
        let mut byte = read_u8(input)?;
        while !is_prefix_byte(byte) {
            current.push(byte);
            byte = read_u8(input)?;
        }
        strings.push(String::from_utf8_lossy(&current).into());

        let mut keep = usize::from(byte & 0x1f);
        let mut bits = 5;
        while byte & 0x80 != 0 {
            byte = read_u8(input)?;
            keep |= usize::from(byte & 0x1f) << bits;
            bits += 5;
        }
        current.truncate(keep);
    }

    expect_mark(input, "string", mark::EOS)?;
    Ok(strings)
}

/// Range bounds use the encoding of the index type, the top bit of the kind byte selects `downto`.
fn read_range(input: &mut impl BufRead) -> Result<Range> {
    let tag = read_u8(input)?;
    let dir = match tag & 0x80 {
        0 => RangeDir::To,
        _ => RangeDir::Downto,
    };
    let rtik = GhwRtik::try_from_primitive(tag & 0x7f)?;
    let Some(kind) = ScalarKind::from_rtik(rtik) else {
        return Err(GhwParseError::UnexpectedType(format!("{rtik:?}"), "as range bound"));
    };
    let range = match kind {
        ScalarKind::B2 | ScalarKind::E8 => {
            let [left, right]: [u8; 2] = read_array(input)?;
            Range::int(kind, dir, left.into(), right.into())
        }
        ScalarKind::E32 | ScalarKind::I32 | ScalarKind::P32 => {
            let left = read_sleb128_i32(input)?;
            Range::int(kind, dir, left.into(), read_sleb128_i32(input)?.into())
        }
        ScalarKind::I64 | ScalarKind::P64 => {
            let left = leb128::read::signed(input)?;
            Range::int(kind, dir, left, leb128::read::signed(input)?)
        }
        ScalarKind::F64 => {
            let left = read_f64_le(input)?;
            Range::Float {
                dir,
                left,
                right: read_f64_le(input)?,
            }
        }
    };
    Ok(range)
}

/// Collects the type table. Types declared in the file keep their position, anonymous types
/// created while reading the bounds of a subtype are appended after them.
struct TypeTableBuilder {
    declared: Vec<GhwType>,
    declared_num: usize,
    anonymous: Vec<GhwType>,
}

impl TypeTableBuilder {
    fn get(&self, id: TypeId) -> Option<&GhwType> {
        let index = id.index();
        if index < self.declared_num {
            self.declared.get(index)
        } else {
            self.anonymous.get(index - self.declared_num)
        }
    }

    fn add_anonymous(&mut self, tpe: GhwType) -> Result<TypeId> {
        let index = self.declared_num + self.anonymous.len();
        self.anonymous.push(tpe);
        TypeId::from_index(index).ok_or(GhwParseError::InvalidTypeId(index as u64))
    }

    fn read_type_id(&self, input: &mut impl BufRead) -> Result<TypeId> {
        let value = leb128::read::unsigned(input)?;
        // type ids are one based and may only refer to types that were already declared
        match u32::try_from(value).ok().and_then(NonZeroU32::new) {
            Some(raw) if raw.get() as usize <= self.declared.len() => Ok(TypeId(raw)),
            _ => Err(GhwParseError::InvalidTypeId(value)),
        }
    }

    fn finish(self) -> TypeTable {
        let mut types = self.declared;
        types.extend(self.anonymous);
        TypeTable { types }
    }

    fn num_scalars(&self, id: TypeId) -> Option<u64> {
        count_scalars(&|id| self.get(id), id)
    }

    fn array_element_and_dims(&self, base: TypeId) -> Result<(TypeId, usize)> {
        let mut id = base;
        loop {
            match self.get(id) {
                Some(GhwType::SubtypeArray { base, .. })
                | Some(GhwType::SubtypeUnboundedArray { base, .. }) => id = *base,
                Some(GhwType::Array { element, dims, .. }) => return Ok((*element, dims.len())),
                other => {
                    return Err(GhwParseError::UnexpectedType(
                        format!("{other:?}"),
                        "expected an array",
                    ))
                }
            }
        }
    }

    /// Reads the ranges of an array subtype and, if the element type is unbounded, the bounds
    /// of the element type.
    fn read_array_subtype(
        &mut self,
        input: &mut impl BufRead,
        name: Arc<str>,
        base: TypeId,
    ) -> Result<GhwType> {
        let (element, num_dims) = self.array_element_and_dims(base)?;
        let mut ranges = Vec::with_capacity(num_dims);
        for _ in 0..num_dims {
            ranges.push(read_range(input)?);
        }
        let element = if self.num_scalars(element).is_some() {
            element
        } else {
            let bounded = self.read_type_bounds(input, element)?;
            self.add_anonymous(bounded)?
        };
        Ok(GhwType::SubtypeArray {
            name,
            base,
            ranges,
            element,
        })
    }

    fn read_record_subtype(
        &mut self,
        input: &mut impl BufRead,
        name: Arc<str>,
        base: TypeId,
    ) -> Result<GhwType> {
        let base_fields = match self.get(base) {
            Some(GhwType::Record { fields, .. }) => fields.clone(),
            Some(GhwType::SubtypeUnboundedRecord { base, .. }) => match self.get(*base) {
                Some(GhwType::Record { fields, .. }) => fields.clone(),
                other => {
                    return Err(GhwParseError::UnexpectedType(
                        format!("{other:?}"),
                        "expected a record",
                    ))
                }
            },
            other => {
                return Err(GhwParseError::UnexpectedType(
                    format!("{other:?}"),
                    "expected a record",
                ))
            }
        };
        let mut fields = Vec::with_capacity(base_fields.len());
        for field in base_fields.into_iter() {
            if self.num_scalars(field.tpe).is_some() {
                fields.push(field);
            } else {
                let bounded = self.read_type_bounds(input, field.tpe)?;
                let tpe = self.add_anonymous(bounded)?;
                fields.push(RecordField {
                    name: field.name,
                    tpe,
                });
            }
        }
        Ok(GhwType::SubtypeRecord { name, base, fields })
    }

    fn read_type_bounds(&mut self, input: &mut impl BufRead, base: TypeId) -> Result<GhwType> {
        let anon: Arc<str> = "<anon>".into();
        match self.get(base) {
            Some(GhwType::Array { .. }) | Some(GhwType::SubtypeUnboundedArray { .. }) => {
                self.read_array_subtype(input, anon, base)
            }
            Some(GhwType::Record { .. }) | Some(GhwType::SubtypeUnboundedRecord { .. }) => {
                self.read_record_subtype(input, anon, base)
            }
            other => Err(GhwParseError::UnexpectedType(
                format!("{other:?}"),
                "cannot read bounds",
            )),
        }
    }
}

pub(crate) fn read_type_section(
    header: &HeaderData,
    strings: &[Arc<str>],
    input: &mut impl BufRead,
) -> Result<TypeTable> {
    let mut h = [0u8; 8];
    input.read_exact(&mut h)?;
    expect_zero_prefix("type", &h)?;

    let type_num = header.read_u32(&mut &h[4..8])? as usize;
    let mut tb = TypeTableBuilder {
        declared: Vec::with_capacity(type_num),
        declared_num: type_num,
        anonymous: vec![],
    };

    for _ in 0..type_num {
        let t = read_u8(input)?;
        let kind = GhwRtik::try_from_primitive(t)?;
        let name = read_string_id(strings, input)?;
        let tpe = match kind {
            GhwRtik::TypeB2 | GhwRtik::TypeE8 | GhwRtik::TypeE32 => {
                let num_literals = leb128::read::unsigned(input)?;
                let mut literals = Vec::with_capacity(num_literals as usize);
                for _ in 0..num_literals {
                    literals.push(read_string_id(strings, input)?);
                }
                GhwType::Enum(EnumType {
                    name,
                    kind: ScalarKind::from_rtik(kind).unwrap_or(ScalarKind::E8),
                    literals,
                    wkt: GhwWellKnownType::Unknown,
                })
            }
            GhwRtik::TypeI32 | GhwRtik::TypeI64 | GhwRtik::TypeF64 => GhwType::Scalar {
                name,
                kind: ScalarKind::from_rtik(kind).unwrap_or(ScalarKind::I32),
                units: vec![],
            },
            GhwRtik::TypeP32 | GhwRtik::TypeP64 => {
                let units = match header.version {
                    0 => vec![],
                    _ => {
                        let num_units = leb128::read::unsigned(input)?;
                        let mut units = Vec::with_capacity(num_units as usize);
                        for _ in 0..num_units {
                            let name = read_string_id(strings, input)?;
                            let value = leb128::read::signed(input)?;
                            units.push(PhysicalUnit { name, value });
                        }
                        units
                    }
                };
                GhwType::Scalar {
                    name,
                    kind: ScalarKind::from_rtik(kind).unwrap_or(ScalarKind::P64),
                    units,
                }
            }
            GhwRtik::SubtypeScalar => {
                let base = tb.read_type_id(input)?;
                let range = read_range(input)?;
                GhwType::SubtypeScalar { name, base, range }
            }
            GhwRtik::TypeArray => {
                let element = tb.read_type_id(input)?;
                let num_dims = leb128::read::unsigned(input)?;
                let mut dims = Vec::with_capacity(num_dims as usize);
                for _ in 0..num_dims {
                    dims.push(tb.read_type_id(input)?);
                }
                GhwType::Array {
                    name,
                    element,
                    dims,
                }
            }
            GhwRtik::SubtypeArray | GhwRtik::SubtypeArrayPtr => {
                let base = tb.read_type_id(input)?;
                tb.read_array_subtype(input, name, base)?
            }
            GhwRtik::SubtypeUnboundedArray => {
                let base = tb.read_type_id(input)?;
                GhwType::SubtypeUnboundedArray { name, base }
            }
            GhwRtik::TypeRecord => {
                let num_fields = leb128::read::unsigned(input)?;
                let mut fields = Vec::with_capacity(num_fields as usize);
                for _ in 0..num_fields {
                    let name = read_string_id(strings, input)?;
                    let tpe = tb.read_type_id(input)?;
                    fields.push(RecordField { name, tpe });
                }
                GhwType::Record { name, fields }
            }
            GhwRtik::SubtypeRecord => {
                let base = tb.read_type_id(input)?;
                tb.read_record_subtype(input, name, base)?
            }
            GhwRtik::SubtypeUnboundedRecord => {
                let base = tb.read_type_id(input)?;
                GhwType::SubtypeUnboundedRecord { name, base }
            }
            other => {
                return Err(GhwParseError::UnexpectedType(
                    format!("{other:?}"),
                    "in type table",
                ))
            }
        };
        tb.declared.push(tpe);
    }

    // the type section should end in zero
    if read_u8(input)? != 0 {
        Err(GhwParseError::FailedToParseSection(
            "type",
            "last byte should be 0".to_string(),
        ))
    } else {
        Ok(tb.finish())
    }
}

pub(crate) fn read_well_known_types_section(
    input: &mut impl BufRead,
    types: &mut TypeTable,
) -> Result<()> {
    let mut h = [0u8; 4];
    input.read_exact(&mut h)?;
    expect_zero_prefix("well known types (WKT)", &h)?;

    let mut t = read_u8(input)?;
    while t > 0 {
        let wkt = GhwWellKnownType::try_from_primitive(t)?;
        let value = leb128::read::unsigned(input)?;
        let id = u32::try_from(value)
            .ok()
            .and_then(NonZeroU32::new)
            .map(TypeId)
            .filter(|id| id.index() < types.len())
            .ok_or(GhwParseError::InvalidTypeId(value))?;
        // only enumerations can be well known
        if let GhwType::Enum(e) = &mut types.types[id.index()] {
            if matches!(e.kind, ScalarKind::B2 | ScalarKind::E8) {
                e.wkt = wkt;
            }
        }
        t = read_u8(input)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn little_endian() -> HeaderData {
        HeaderData {
            version: 1,
            big_endian: false,
            word_len: 4,
            word_offset: 1,
        }
    }

    #[test]
    fn test_range_length_and_indices() {
        let up = Range::int(ScalarKind::I32, RangeDir::To, 0, 3);
        assert_eq!(up.len(), Some(4));
        assert_eq!(up.indices().collect::<Vec<_>>(), [0, 1, 2, 3]);

        let down = Range::int(ScalarKind::I32, RangeDir::Downto, 7, 4);
        assert_eq!(down.len(), Some(4));
        assert_eq!(down.indices().collect::<Vec<_>>(), [7, 6, 5, 4]);

        let null = Range::int(ScalarKind::I32, RangeDir::To, 4, 3);
        assert!(null.is_empty());
        assert_eq!(null.indices().count(), 0);

        let float = Range::Float {
            dir: RangeDir::To,
            left: 0.0,
            right: 1.0,
        };
        assert_eq!(float.len(), None);
    }

    #[test]
    fn test_format_g() {
        assert_eq!(format_g(0.0), "0");
        assert_eq!(format_g(1.5), "1.5");
        assert_eq!(format_g(100.0), "100");
        assert_eq!(format_g(0.0001), "0.0001");
        assert_eq!(format_g(0.00001), "1e-05");
        assert_eq!(format_g(123456.0), "123456");
        assert_eq!(format_g(1234567.0), "1.23457e+06");
        assert_eq!(format_g(-2.5e10), "-2.5e+10");
        assert_eq!(format_g(1.0 / 3.0), "0.333333");
    }

    #[test]
    fn test_read_string_section() {
        // "clk", "clk_en" (shares 3 chars with "clk"), "data"
        let mut bytes = vec![0u8, 0, 0, 0];
        bytes.extend_from_slice(&3u32.to_le_bytes());
        bytes.extend_from_slice(&13u32.to_le_bytes());
        bytes.extend_from_slice(b"clk");
        bytes.push(3); // next string reuses 3 characters
        bytes.extend_from_slice(b"_en");
        bytes.push(0);
        bytes.extend_from_slice(b"data");
        bytes.push(0);
        bytes.extend_from_slice(mark::EOS);

        let strings = read_string_section(&little_endian(), &mut &bytes[..]).unwrap();
        let strings: Vec<&str> = strings.iter().map(|s| s.as_ref()).collect();
        assert_eq!(strings, ["<anon>", "clk", "clk_en", "data"]);
    }

    #[test]
    fn test_num_scalars() {
        let mut types = TypeTable::default();
        let bit = types.add_bit();
        let int = types.add_scalar("integer", ScalarKind::I32);
        let arr = types.add_array("bit_vector", bit, vec![int]);
        let bv = types.add_subtype_array(
            "bv4",
            arr,
            vec![Range::int(ScalarKind::I32, RangeDir::Downto, 3, 0)],
        );
        let rec = types.add_record("pair", &[("a", bv), ("b", int)]);
        assert_eq!(types.num_scalars(bit), Some(1));
        assert_eq!(types.num_scalars(arr), None);
        assert_eq!(types.num_scalars(bv), Some(4));
        assert_eq!(types.num_scalars(rec), Some(5));
    }

    #[test]
    fn test_format_generate_value() {
        let mut types = TypeTable::default();
        let bool_tpe = types.add_enum(
            "boolean",
            ScalarKind::B2,
            &["false", "true"],
            GhwWellKnownType::Boolean,
        );
        let int = types.add_scalar("integer", ScalarKind::I32);
        assert_eq!(types.format_value(bool_tpe, &GhwValue::B2(1)), "true");
        assert_eq!(types.format_value(bool_tpe, &GhwValue::B2(5)), "?5");
        assert_eq!(types.format_value(int, &GhwValue::I32(-3)), "-3");
    }
}
