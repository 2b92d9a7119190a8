// Copyright 2025 Cornell University
// released under BSD 3-Clause License
// author: Kevin Laeufer <laeufer@cornell.edu>
//
// Writes small uncompressed GHW files in memory.
#![allow(dead_code)]

use ghwload::ghw::{GhwHierarchyKind, GhwRtik, GhwValue, GhwWellKnownType};
use std::io::Cursor;

pub struct GhwWriter {
    out: Vec<u8>,
    strings: Vec<String>,
    num_types: u64,
    /// raw id of the signal that was written last in the current cycle step
    last_id: u32,
}

pub enum RangeSpec {
    To(i32, i32),
    Downto(i32, i32),
    /// enumeration range with the kind of the index type
    Enum(GhwRtik, u8, u8),
}

impl GhwWriter {
    /// Writes the file header and the string table.
    pub fn new(strings: &[&str]) -> Self {
        let mut w = Self {
            out: Vec::new(),
            strings: strings.iter().map(|s| s.to_string()).collect(),
            num_types: 0,
            last_id: 0,
        };
        w.out.extend_from_slice(b"GHDLwave\n");
        // header length, zero, version, little endian, word length, word offset, zero
        w.out.extend_from_slice(&[16, 0, 1, 1, 4, 1, 0]);

        w.out.extend_from_slice(b"STR\x00");
        w.out.extend_from_slice(&[0, 0, 0, 0]);
        w.i32(strings.len() as i32);
        let size: usize = strings.iter().map(|s| s.len()).sum();
        w.i32(size as i32);
        for s in strings {
            w.out.extend_from_slice(s.as_bytes());
            // no prefix is shared with the next string
            w.out.push(0);
        }
        w.out.extend_from_slice(b"EOS\x00");
        w
    }

    fn sid(&self, s: &str) -> u64 {
        let pos = self.strings.iter().position(|x| x == s);
        pos.unwrap_or_else(|| panic!("string {s} missing from the string table")) as u64 + 1
    }

    fn uleb(&mut self, value: u64) {
        leb128::write::unsigned(&mut self.out, value).unwrap();
    }

    fn sleb(&mut self, value: i64) {
        leb128::write::signed(&mut self.out, value).unwrap();
    }

    fn i32(&mut self, value: i32) {
        self.out.extend_from_slice(&value.to_le_bytes());
    }

    fn i64(&mut self, value: i64) {
        self.out.extend_from_slice(&value.to_le_bytes());
    }

    fn value(&mut self, value: GhwValue) {
        match value {
            GhwValue::B2(v) | GhwValue::E8(v) => self.out.push(v),
            GhwValue::E32(v) | GhwValue::I32(v) => self.sleb(v as i64),
            GhwValue::I64(v) => self.sleb(v),
            GhwValue::F64(v) => self.out.extend_from_slice(&v.to_le_bytes()),
        }
    }

    pub fn begin_types(&mut self, num_types: u32) {
        self.out.extend_from_slice(b"TYP\x00");
        self.out.extend_from_slice(&[0, 0, 0, 0]);
        self.i32(num_types as i32);
    }

    fn type_start(&mut self, rtik: GhwRtik, name: &str) -> u64 {
        self.out.push(rtik as u8);
        let name = self.sid(name);
        self.uleb(name);
        self.num_types += 1;
        self.num_types
    }

    /// Returns the type id.
    pub fn enum_type(&mut self, rtik: GhwRtik, name: &str, literals: &[&str]) -> u64 {
        let id = self.type_start(rtik, name);
        self.uleb(literals.len() as u64);
        for lit in literals {
            let lit = self.sid(lit);
            self.uleb(lit);
        }
        id
    }

    pub fn scalar_type(&mut self, rtik: GhwRtik, name: &str) -> u64 {
        let id = self.type_start(rtik, name);
        if matches!(rtik, GhwRtik::TypeP32 | GhwRtik::TypeP64) {
            // no units
            self.uleb(0);
        }
        id
    }

    pub fn array_type(&mut self, name: &str, element: u64, dims: &[u64]) -> u64 {
        let id = self.type_start(GhwRtik::TypeArray, name);
        self.uleb(element);
        self.uleb(dims.len() as u64);
        for dim in dims {
            self.uleb(*dim);
        }
        id
    }

    pub fn subtype_array(&mut self, name: &str, base: u64, ranges: &[RangeSpec]) -> u64 {
        let id = self.type_start(GhwRtik::SubtypeArray, name);
        self.uleb(base);
        for range in ranges {
            match *range {
                RangeSpec::To(l, r) => {
                    self.out.push(GhwRtik::TypeI32 as u8);
                    self.sleb(l as i64);
                    self.sleb(r as i64);
                }
                RangeSpec::Downto(l, r) => {
                    self.out.push(GhwRtik::TypeI32 as u8 | 0x80);
                    self.sleb(l as i64);
                    self.sleb(r as i64);
                }
                RangeSpec::Enum(rtik, l, r) => {
                    self.out.push(rtik as u8);
                    self.out.extend_from_slice(&[l, r]);
                }
            }
        }
        id
    }

    pub fn record_type(&mut self, name: &str, fields: &[(&str, u64)]) -> u64 {
        let id = self.type_start(GhwRtik::TypeRecord, name);
        self.uleb(fields.len() as u64);
        for (field, tpe) in fields {
            let field = self.sid(field);
            self.uleb(field);
            self.uleb(*tpe);
        }
        id
    }

    pub fn end_types(&mut self) {
        self.out.push(0);
    }

    pub fn well_known_types(&mut self, wkts: &[(GhwWellKnownType, u64)]) {
        self.out.extend_from_slice(b"WKT\x00");
        self.out.extend_from_slice(&[0, 0, 0, 0]);
        for (wkt, tpe) in wkts {
            self.out.push(*wkt as u8);
            self.uleb(*tpe);
        }
        self.out.push(0);
    }

    pub fn begin_hierarchy(&mut self, num_scopes: u32, num_declared: u32, num_signals: u32) {
        self.out.extend_from_slice(b"HIE\x00");
        self.out.extend_from_slice(&[0, 0, 0, 0]);
        self.i32(num_scopes as i32);
        self.i32(num_declared as i32);
        self.i32(num_signals as i32);
    }

    pub fn scope(&mut self, kind: GhwHierarchyKind, name: &str) {
        self.out.push(kind as u8);
        let name = self.sid(name);
        self.uleb(name);
    }

    pub fn generate_for(&mut self, name: &str, iter_type: u64, value: GhwValue) {
        self.scope(GhwHierarchyKind::GenerateFor, name);
        self.uleb(iter_type);
        self.value(value);
    }

    pub fn end_scope(&mut self) {
        self.out.push(GhwHierarchyKind::EndOfScope as u8);
    }

    pub fn process(&mut self, name: &str) {
        self.scope(GhwHierarchyKind::Process, name);
    }

    pub fn signal(&mut self, kind: GhwHierarchyKind, name: &str, tpe: u64, ids: &[u32]) {
        self.scope(kind, name);
        self.uleb(tpe);
        for id in ids {
            self.uleb(*id as u64);
        }
    }

    /// Terminates the hierarchy and the header.
    pub fn end_hierarchy(&mut self) {
        self.out.push(GhwHierarchyKind::End as u8);
        self.out.extend_from_slice(b"EOH\x00");
    }

    /// Ends the header of a file without hierarchy.
    pub fn end_header(&mut self) {
        self.out.extend_from_slice(b"EOH\x00");
    }

    /// One value per signal in id order.
    pub fn snapshot(&mut self, time: i64, values: &[GhwValue]) {
        self.out.extend_from_slice(b"SNP\x00");
        self.out.extend_from_slice(&[0, 0, 0, 0]);
        self.i64(time);
        for v in values {
            self.value(*v);
        }
        self.out.extend_from_slice(b"ESN\x00");
    }

    /// Every step lists its changes with ascending raw ids. All signals need a type.
    pub fn cycle(&mut self, steps: &[(i64, &[(u32, GhwValue)])]) {
        self.out.extend_from_slice(b"CYC\x00");
        let mut prev_time = None;
        for (time, changes) in steps {
            match prev_time {
                None => self.i64(*time),
                Some(prev) => self.sleb(*time - prev),
            }
            prev_time = Some(*time);
            self.last_id = 0;
            for (id, value) in changes.iter() {
                let delta = *id - self.last_id;
                self.uleb(delta as u64);
                self.value(*value);
                self.last_id = *id;
            }
            self.uleb(0);
        }
        self.sleb(-1);
        self.out.extend_from_slice(b"ECY\x00");
    }

    pub fn directory(&mut self, entries: u32) {
        self.out.extend_from_slice(b"DIR\x00");
        self.out.extend_from_slice(&[0, 0, 0, 0]);
        self.i32(entries as i32);
        for _ in 0..entries {
            self.out.extend_from_slice(b"SNP\x00");
            self.i32(0);
        }
        self.out.extend_from_slice(b"EOD\x00");
    }

    pub fn tailer(&mut self) {
        self.out.extend_from_slice(b"TAI\x00");
        self.out.extend_from_slice(&[0u8; 8]);
    }

    pub fn finish(self) -> Vec<u8> {
        self.out
    }

    pub fn into_cursor(self) -> Cursor<Vec<u8>> {
        Cursor::new(self.out)
    }
}

/// Design with a two bit port `a` and an integer port `b` at the top level. Signal 1 is `a[0]`,
/// signal 2 is `a[1]` and signal 3 is `b`.
pub fn small_design() -> GhwWriter {
    let mut w = GhwWriter::new(&[
        "bit", "'0'", "'1'", "integer", "bit_vector", "word", "a", "b",
    ]);
    w.begin_types(4);
    let bit = w.enum_type(GhwRtik::TypeB2, "bit", &["'0'", "'1'"]);
    let int = w.scalar_type(GhwRtik::TypeI32, "integer");
    let bv = w.array_type("bit_vector", bit, &[int]);
    let word = w.subtype_array("word", bv, &[RangeSpec::To(0, 1)]);
    w.end_types();
    w.well_known_types(&[(GhwWellKnownType::Bit, bit)]);
    w.begin_hierarchy(0, 2, 3);
    w.signal(GhwHierarchyKind::PortIn, "a", word, &[1, 2]);
    w.signal(GhwHierarchyKind::PortOut, "b", int, &[3]);
    w.end_hierarchy();
    w
}
