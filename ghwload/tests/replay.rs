// Copyright 2024-2025 Cornell University
// released under BSD 3-Clause License
// author: Kevin Laeufer <laeufer@cornell.edu>
//
// drives the loader with in-memory event lists

mod utils;

use ghwload::ghw::*;
use ghwload::{CorruptionKind, GhwLoader, LoadError, LoadOptions};
use utils::small_design;

struct Design {
    types: TypeTable,
    hierarchy: GhwHierarchy,
}

/// Same design as `small_design` from the test utilities.
fn small_design_in_memory() -> Design {
    let mut types = TypeTable::default();
    let bit = types.add_bit();
    let int = types.add_scalar("integer", ScalarKind::I32);
    let bv = types.add_array("bit_vector", bit, vec![int]);
    let word = types.add_subtype_array(
        "word",
        bv,
        vec![Range::int(ScalarKind::I32, RangeDir::To, 0, 1)],
    );
    let mut h = GhwHierarchyBuilder::new();
    h.add_signal(SignalKind::PortIn, "a".into(), word, vec![1, 2]);
    h.add_signal(SignalKind::PortOut, "b".into(), int, vec![3]);
    Design {
        types,
        hierarchy: h.finish(),
    }
}

fn id(raw: u32) -> GhwSignalId {
    GhwSignalId::from_raw(raw).unwrap()
}

fn debug_dump(dump: &ghwload::DumpFile) -> String {
    let mut out = vec![];
    dump.write_debug(&mut out).unwrap();
    String::from_utf8(out).unwrap()
}

#[test]
fn test_replay_matches_file() {
    let mut w = small_design();
    w.snapshot(0, &[GhwValue::B2(0), GhwValue::B2(1), GhwValue::I32(2)]);
    w.cycle(&[
        (5, &[(1, GhwValue::B2(1))]),
        (5, &[(1, GhwValue::B2(0)), (3, GhwValue::I32(-4))]),
        (9, &[(2, GhwValue::B2(0))]),
    ]);
    w.tailer();
    let reader = GhwReader::new(std::io::Cursor::new(w.finish())).unwrap();
    let from_file = GhwLoader::default().load_from(reader).unwrap();

    let design = small_design_in_memory();
    let events = vec![
        ReplayEvent::Snapshot {
            time: 0,
            values: vec![(id(2), GhwValue::B2(1)), (id(3), GhwValue::I32(2))],
        },
        ReplayEvent::Cycle(vec![
            CycleStep {
                time: 5,
                changes: vec![(id(1), GhwValue::B2(1))],
            },
            CycleStep {
                time: 5,
                changes: vec![(id(1), GhwValue::B2(0)), (id(3), GhwValue::I32(-4))],
            },
            CycleStep {
                time: 9,
                changes: vec![(id(2), GhwValue::B2(0))],
            },
        ]),
        ReplayEvent::Other,
    ];
    let source = ReplaySource::new(design.types, Some(design.hierarchy), 3, events).unwrap();
    let from_memory = GhwLoader::default().load_from(source).unwrap();

    assert_eq!(debug_dump(&from_file), debug_dump(&from_memory));
    assert_eq!(from_file.glitch_stats(), from_memory.glitch_stats());
    assert_eq!(from_memory.glitch_stats().glitches, 1);
    assert_eq!(from_memory.time_range().end, 9);
}

#[test]
fn test_custom_names() {
    let design = small_design_in_memory();
    let events = vec![ReplayEvent::Snapshot {
        time: 0,
        values: vec![],
    }];
    let source = ReplaySource::new(design.types, Some(design.hierarchy), 3, events).unwrap();
    let options = LoadOptions {
        hierarchy_separator: '/',
        top_name: "tb",
    };
    let dump = GhwLoader::new(options).load_from(source).unwrap();
    let names: Vec<&str> = dump.facs().iter().map(|f| f.name.as_str()).collect();
    assert_eq!(names, ["tb/a[0]", "tb/a[1]", "tb/b"]);
    assert_eq!(dump.tree().get(dump.tree().root()).name, "tb");
}

#[test]
fn test_unused_signal_ids() {
    let mut types = TypeTable::default();
    let bit = types.add_bit();
    let mut h = GhwHierarchyBuilder::new();
    h.add_signal(SignalKind::Signal, "a".into(), bit, vec![1, 2]);
    let source = ReplaySource::new(types, Some(h.finish()), 2, vec![]).unwrap();
    let err = GhwLoader::default().load_from(source).unwrap_err();
    match err {
        LoadError::Corrupt { kind, location } => {
            assert_eq!(kind, CorruptionKind::UnusedSignalIds("a".to_string()));
            assert!(location.file().ends_with("hierarchy.rs"));
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[test]
fn test_real_index_is_rejected() {
    let mut types = TypeTable::default();
    let bit = types.add_bit();
    let real = types.add_scalar("real", ScalarKind::F64);
    let arr = types.add_array("by_real", bit, vec![real]);
    let sub = types.add_subtype_array(
        "sub",
        arr,
        vec![Range::Float {
            dir: RangeDir::To,
            left: 0.0,
            right: 1.0,
        }],
    );
    let mut h = GhwHierarchyBuilder::new();
    h.add_signal(SignalKind::Signal, "a".into(), sub, vec![]);
    let source = ReplaySource::new(types, Some(h.finish()), 1, vec![]).unwrap();
    let err = GhwLoader::default().load_from(source).unwrap_err();
    assert!(matches!(
        err,
        LoadError::Corrupt {
            kind: CorruptionKind::UnhandledIndexType { .. },
            ..
        }
    ));
}

#[test]
fn test_replay_rejects_bad_events() {
    let design = small_design_in_memory();
    // `b` is an integer
    let events = vec![ReplayEvent::Snapshot {
        time: 0,
        values: vec![(id(3), GhwValue::B2(1))],
    }];
    let source = ReplaySource::new(design.types, Some(design.hierarchy), 3, events).unwrap();
    assert!(matches!(
        GhwLoader::default().load_from(source),
        Err(LoadError::Stream(GhwParseError::UnexpectedType(..)))
    ));

    let design = small_design_in_memory();
    let events = vec![ReplayEvent::Cycle(vec![
        CycleStep {
            time: 10,
            changes: vec![],
        },
        CycleStep {
            time: 5,
            changes: vec![],
        },
    ])];
    let source = ReplaySource::new(design.types, Some(design.hierarchy), 3, events).unwrap();
    assert!(matches!(
        GhwLoader::default().load_from(source),
        Err(LoadError::Stream(_))
    ));
}

#[test]
fn test_replay_without_hierarchy() {
    let design = small_design_in_memory();
    let source = ReplaySource::new(design.types, None, 0, vec![]).unwrap();
    assert!(matches!(
        GhwLoader::default().load_from(source),
        Err(LoadError::NoHierarchy)
    ));
}

#[test]
fn test_deep_hierarchy_loads() {
    const DEPTH: usize = 200_000;
    let mut types = TypeTable::default();
    let bit = types.add_bit();
    let mut h = GhwHierarchyBuilder::new();
    for _ in 0..DEPTH {
        h.add_scope(ScopeKind::Block, "blk".into());
    }
    h.add_signal(SignalKind::Signal, "q".into(), bit, vec![1]);
    let events = vec![ReplayEvent::Snapshot {
        time: 0,
        values: vec![(id(1), GhwValue::B2(1))],
    }];
    let source = ReplaySource::new(types, Some(h.finish()), 1, events).unwrap();
    let dump = GhwLoader::default().load_from(source).unwrap();

    assert_eq!(dump.facs().len(), 1);
    let name = &dump.facs()[0].name;
    // "top", then ".blk" per scope and ".q"
    assert_eq!(name.len(), 3 + 4 * DEPTH + 2);
    assert!(name.starts_with("top.blk.blk") && name.ends_with(".blk.q"));
    assert_eq!(dump.lookup(name).map(|f| f.index()), Some(0));
}
