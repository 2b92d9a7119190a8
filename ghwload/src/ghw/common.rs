// Copyright 2024 The Regents of the University of California
// Copyright 2024-2025 Cornell University
// released under BSD 3-Clause License
// author: Kevin Laeufer <laeufer@cornell.edu>

use num_enum::TryFromPrimitive;
use std::io::BufRead;
use std::num::NonZeroU32;
use thiserror::Error;

/// Everything that can go wrong while decoding the bytes of a GHW file.
#[derive(Debug, Error)]
pub enum GhwParseError {
    #[error("[ghw] {0} compressed files are not supported, please decompress first")]
    UnsupportedCompression(String),
    #[error("[ghw] not a GHW file, the file starts with {0:?}")]
    UnexpectedHeaderMagic(String),
    #[error("[ghw] invalid file header: {0}")]
    UnexpectedHeader(String),
    #[error("[ghw] unexpected section: {0}")]
    UnexpectedSection(String),
    #[error("[ghw] unexpected type {0} {1}")]
    UnexpectedType(String, &'static str),
    #[error("[ghw] malformed {0} section: {1}")]
    FailedToParseSection(&'static str, String),
    #[error("[ghw] {0} is negative, a count or size was expected")]
    ExpectedPositiveInteger(i64),
    #[error("[ghw] type id {0} does not refer to a declared type")]
    InvalidTypeId(u64),
    #[error("[ghw] string id {0} is not in the string table")]
    InvalidStringId(u64),
    #[error("[ghw] signal id {0} is out of range, the file declares {1} signals")]
    InvalidSignalId(u64, usize),
    #[error("[ghw] type {0} has no fixed number of scalar elements")]
    UnboundedType(String),
    #[error("[ghw] unknown type kind")]
    FailedToParseGhdlRtik(#[from] num_enum::TryFromPrimitiveError<GhwRtik>),
    #[error("[ghw] unknown well known type")]
    FailedToParseWellKnownType(#[from] num_enum::TryFromPrimitiveError<GhwWellKnownType>),
    #[error("[ghw] unknown hierarchy entry kind")]
    FailedToParseHierarchyKind(#[from] num_enum::TryFromPrimitiveError<GhwHierarchyKind>),
    #[error("[ghw] invalid leb128 number")]
    Leb128(#[from] leb128::read::Error),
    #[error("[ghw] failed to read input")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, GhwParseError>;

/// Four byte marks that start and end the sections of a GHW file.
pub mod mark {
    pub const STR: &[u8; 4] = b"STR\x00";
    pub const EOS: &[u8; 4] = b"EOS\x00";
    pub const HIE: &[u8; 4] = b"HIE\x00";
    pub const TYP: &[u8; 4] = b"TYP\x00";
    pub const WKT: &[u8; 4] = b"WKT\x00";
    pub const EOH: &[u8; 4] = b"EOH\x00";
    pub const DIR: &[u8; 4] = b"DIR\x00";
    pub const EOD: &[u8; 4] = b"EOD\x00";
    pub const TAI: &[u8; 4] = b"TAI\x00";
    pub const SNP: &[u8; 4] = b"SNP\x00";
    pub const ESN: &[u8; 4] = b"ESN\x00";
    pub const CYC: &[u8; 4] = b"CYC\x00";
    pub const ECY: &[u8; 4] = b"ECY\x00";
}

/// Tailer mark plus an eight byte position.
pub const TAILER_LEN: usize = 12;

/// Start of every uncompressed file.
pub const FILE_MAGIC: &[u8] = b"GHDLwave\n";

/// Names the compression format that starts with `magic`, if any.
pub fn compression_format(magic: &[u8]) -> Option<&'static str> {
    match magic {
        [0x1f, 0x8b, ..] => Some("gzip"),
        [b'B', b'Z', ..] => Some("bzip2"),
        _ => None,
    }
}

/// Most section headers start with four zero bytes.
pub fn expect_zero_prefix(section: &'static str, header: &[u8]) -> Result<()> {
    match header.get(..4) {
        Some([0, 0, 0, 0]) => Ok(()),
        other => Err(GhwParseError::FailedToParseSection(
            section,
            format!("header has to start with four zero bytes, found {other:02x?}"),
        )),
    }
}

/// Consumes the mark that closes a section.
pub fn expect_mark(input: &mut impl BufRead, section: &'static str, expected: &[u8; 4]) -> Result<()> {
    let found: [u8; 4] = read_array(input)?;
    if &found == expected {
        return Ok(());
    }
    Err(GhwParseError::UnexpectedSection(format!(
        "{section} section closed by {:?} instead of {:?}",
        String::from_utf8_lossy(&found),
        String::from_utf8_lossy(expected)
    )))
}

#[inline]
pub fn read_array<const N: usize>(input: &mut impl BufRead) -> Result<[u8; N]> {
    let mut buf = [0u8; N];
    input.read_exact(&mut buf)?;
    Ok(buf)
}

#[inline]
pub fn read_u8(input: &mut impl BufRead) -> Result<u8> {
    let [byte] = read_array(input)?;
    Ok(byte)
}

/// Reals are always stored little endian, independent of the header.
#[inline]
pub fn read_f64_le(input: &mut impl BufRead) -> Result<f64> {
    read_array(input).map(f64::from_le_bytes)
}

/// Reads a 32-bit signed leb128 value. GHDL writes these for `i32`, `p32` and `e32` values.
#[inline]
pub fn read_sleb128_i32(input: &mut impl BufRead) -> Result<i32> {
    let value = leb128::read::signed(input)?;
    i32::try_from(value).map_err(|_| {
        GhwParseError::FailedToParseSection("value", format!("{value} does not fit into 32 bits"))
    })
}

/// Fields of the file header that influence decoding.
#[derive(Debug, Clone, Copy)]
pub struct HeaderData {
    pub version: u8,
    /// fixed size words in section headers are big endian
    pub big_endian: bool,
    #[allow(dead_code)]
    pub word_len: u8,
    #[allow(dead_code)]
    pub word_offset: u8,
}

impl HeaderData {
    #[inline]
    pub fn read_i32(&self, input: &mut impl BufRead) -> Result<i32> {
        let bytes = read_array(input)?;
        Ok(match self.big_endian {
            true => i32::from_be_bytes(bytes),
            false => i32::from_le_bytes(bytes),
        })
    }

    /// Counts and sizes are stored as signed words, negative values are rejected.
    #[inline]
    pub fn read_u32(&self, input: &mut impl BufRead) -> Result<u32> {
        let value = self.read_i32(input)?;
        u32::try_from(value).map_err(|_| GhwParseError::ExpectedPositiveInteger(value as i64))
    }

    #[inline]
    pub fn read_i64(&self, input: &mut impl BufRead) -> Result<i64> {
        let bytes = read_array(input)?;
        Ok(match self.big_endian {
            true => i64::from_be_bytes(bytes),
            false => i64::from_le_bytes(bytes),
        })
    }
}

/// Identifies one basic (scalar) signal of a GHW file. GHDL numbers its signals starting at one,
/// zero is reserved to terminate signal lists.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde1", derive(serde::Serialize, serde::Deserialize))]
pub struct GhwSignalId(NonZeroU32);

impl GhwSignalId {
    #[inline]
    pub fn index(&self) -> usize {
        (self.0.get() - 1) as usize
    }

    #[inline]
    pub fn from_index(index: usize) -> Option<Self> {
        let raw = u32::try_from(index).ok()?.checked_add(1)?;
        NonZeroU32::new(raw).map(Self)
    }

    /// Converts a raw id as found in the file. Returns `None` for the zero terminator.
    #[inline]
    pub fn from_raw(raw: u32) -> Option<Self> {
        NonZeroU32::new(raw).map(Self)
    }

    #[inline]
    pub fn raw(&self) -> u32 {
        self.0.get()
    }
}

#[repr(u8)]
#[derive(Debug, PartialEq, Eq, Copy, Clone, TryFromPrimitive)]
pub enum GhwWellKnownType {
    Unknown = 0,
    Boolean = 1,
    Bit = 2,
    StdULogic = 3,
}

/// Kind codes used by GHDL in the type table and in range descriptors.
#[repr(u8)]
#[derive(Debug, PartialEq, Eq, Copy, Clone, TryFromPrimitive)]
pub enum GhwRtik {
    Error = 0,
    EndOfScope = 15,
    Signal = 16,
    PortIn = 17,
    PortOut = 18,
    PortInOut = 19,
    PortBuffer = 20,
    PortLinkage = 21,
    TypeB2 = 22,
    TypeE8 = 23,
    TypeE32 = 24,
    TypeI32 = 25,
    TypeI64 = 26,
    TypeF64 = 27,
    TypeP32 = 28,
    TypeP64 = 29,
    TypeAccess = 30,
    TypeArray = 31,
    TypeRecord = 32,
    TypeFile = 33,
    SubtypeScalar = 34,
    SubtypeArray = 35,
    /// Older GHDL versions emit this for arrays allocated through a pointer.
    /// The encoding is identical to `SubtypeArray`.
    SubtypeArrayPtr = 36,
    SubtypeUnboundedArray = 37,
    SubtypeRecord = 38,
    SubtypeUnboundedRecord = 39,
}

#[repr(u8)]
#[derive(Debug, PartialEq, Eq, Copy, Clone, TryFromPrimitive)]
pub enum GhwHierarchyKind {
    /// indicates the end of the hierarchy
    End = 0,
    Design = 1,
    Block = 3,
    GenerateIf = 4,
    GenerateFor = 5,
    Instance = 6,
    Package = 7,
    Process = 13,
    Generic = 14,
    EndOfScope = 15,
    Signal = 16,
    PortIn = 17,
    PortOut = 18,
    PortInOut = 19,
    Buffer = 20,
    Linkage = 21,
}
