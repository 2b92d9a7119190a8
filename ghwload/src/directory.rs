// Copyright 2024 The Regents of the University of California
// Copyright 2024-2025 Cornell University
// released under BSD 3-Clause License
// author: Kevin Laeufer <laeufer@cornell.edu>

use crate::ghw::{GhwType, GhwWellKnownType, ScalarKind, TypeId, TypeTable};
use crate::history::HistRef;
use crate::tree::{Tree, TreeNodeRef};
use crate::{CorruptionKind, LoadError, LoadOptions, Result};
use std::num::NonZeroU32;

/// Uniquely identifies a [`Node`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde1", derive(serde::Serialize, serde::Deserialize))]
pub struct NodeRef(NonZeroU32);

impl NodeRef {
    #[inline]
    pub fn from_index(index: usize) -> Option<Self> {
        let raw = u32::try_from(index).ok()?.checked_add(1)?;
        NonZeroU32::new(raw).map(NodeRef)
    }

    #[inline]
    pub fn index(&self) -> usize {
        (self.0.get() - 1) as usize
    }
}

/// Uniquely identifies a [`Fac`] in the sorted signal directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde1", derive(serde::Serialize, serde::Deserialize))]
pub struct FacRef(NonZeroU32);

impl FacRef {
    #[inline]
    pub fn from_index(index: usize) -> Option<Self> {
        let raw = u32::try_from(index).ok()?.checked_add(1)?;
        NonZeroU32::new(raw).map(FacRef)
    }

    #[inline]
    pub fn index(&self) -> usize {
        (self.0.get() - 1) as usize
    }
}

/// How the values of a signal are represented in its history.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde1", derive(serde::Serialize, serde::Deserialize))]
pub enum ValueKind {
    /// `bit` or `std_ulogic`
    Bit,
    /// integer or physical value shown as a bit vector
    Integer,
    Real,
    /// enumeration shown by the name of its literals
    Enum,
    /// the type could not be classified, the signal carries no values
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde1", derive(serde::Serialize, serde::Deserialize))]
pub struct BitRange {
    pub msi: u32,
    pub lsi: u32,
}

impl BitRange {
    pub fn width(&self) -> u32 {
        self.msi.abs_diff(self.lsi) + 1
    }
}

/// Owns the value history of one basic signal.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    /// Full name of the first directory entry that referred to this node.
    pub name: Option<String>,
    pub kind: ValueKind,
    /// `None` for single bit signals.
    pub ext: Option<BitRange>,
    /// First history entry. This is the pre-start sentinel for every signal that had a value.
    pub head: Option<HistRef>,
}

impl Node {
    pub(crate) fn new(kind: ValueKind, ext: Option<BitRange>) -> Self {
        Self {
            name: None,
            kind,
            ext,
            head: None,
        }
    }
}

/// An entry of the signal directory.
#[derive(Debug, Clone, PartialEq)]
pub struct Fac {
    pub name: String,
    pub node: NodeRef,
    /// first member of the bit-blasted vector this entry belongs to
    pub vector_root: Option<FacRef>,
    /// next member of the same vector
    pub vector_chain: Option<FacRef>,
}

/// Determines how the values of a signal with base type `tpe` are shown.
pub(crate) fn classify(types: &TypeTable, tpe: Option<TypeId>) -> (ValueKind, Option<BitRange>) {
    let Some(tpe) = tpe else {
        return (ValueKind::Unknown, None);
    };
    const INT32: Option<BitRange> = Some(BitRange { msi: 31, lsi: 0 });
    const INT64: Option<BitRange> = Some(BitRange { msi: 63, lsi: 0 });
    const ZERO: Option<BitRange> = Some(BitRange { msi: 0, lsi: 0 });
    match types.get(tpe) {
        GhwType::Enum(e) => match (e.kind, e.wkt) {
            (ScalarKind::B2, GhwWellKnownType::Bit) => (ValueKind::Bit, None),
            (ScalarKind::E8, GhwWellKnownType::StdULogic) => (ValueKind::Bit, None),
            (ScalarKind::E32, _) => (ValueKind::Enum, ZERO),
            _ => (ValueKind::Enum, INT32),
        },
        GhwType::Scalar { kind, .. } => match kind {
            ScalarKind::I32 | ScalarKind::P32 => (ValueKind::Integer, INT32),
            ScalarKind::I64 | ScalarKind::P64 => (ValueKind::Integer, INT64),
            ScalarKind::F64 => (ValueKind::Real, ZERO),
            other => {
                log::warn!("unhandled kind {other:?} for type {}", types.get(tpe).name());
                (ValueKind::Unknown, None)
            }
        },
        other => {
            log::warn!("unhandled kind {:?} for type {}", other.rtik(), other.name());
            (ValueKind::Unknown, None)
        }
    }
}

/// Walks the tree depth first and creates one directory entry per leaf, in visiting order.
/// Every leaf's `which` is rewritten from the basic signal index to the entry's position.
pub(crate) fn assign_names(
    tree: &mut Tree,
    nodes: &mut [Node],
    num_leaves: usize,
    options: &LoadOptions,
) -> Result<Vec<Fac>> {
    let mut facs = Vec::with_capacity(num_leaves);
    let mut path = String::with_capacity(1024);
    path.push_str(options.top_name);
    let separator = options.hierarchy_separator;

    // each entry remembers the path length that its node has to start from
    let mut todo: Vec<(TreeNodeRef, usize)> = vec![(tree.root(), path.len())];
    while let Some((node_ref, base_len)) = todo.pop() {
        path.truncate(base_len);
        let node = tree.get_mut(node_ref);
        if !node.name.is_empty() {
            if !node.name.starts_with('[') {
                path.push(separator);
            }
            path.push_str(&node.name);
        }

        if let Some(index) = node.which {
            let num_nodes = nodes.len();
            let (Some(target), Some(node_ref)) =
                (nodes.get_mut(index as usize), NodeRef::from_index(index as usize))
            else {
                return Err(LoadError::corrupt(CorruptionKind::SignalIdOutOfRange {
                    name: path.clone(),
                    id: index.saturating_add(1),
                    num_signals: num_nodes,
                }));
            };
            if target.name.is_none() {
                target.name = Some(path.clone());
            }
            node.which = Some(facs.len() as u32);
            facs.push(Fac {
                name: path.clone(),
                node: node_ref,
                vector_root: None,
                vector_chain: None,
            });
        }

        // siblings continue from our own start, children from our full path
        if let Some(next) = node.next {
            todo.push((next, base_len));
        }
        if let Some(child) = node.child {
            todo.push((child, path.len()));
        }
    }
    Ok(facs)
}

/// Gives every entry whose name differs from the name of its node a node of its own.
/// The copy shares the history of the original.
pub(crate) fn split_aliases(facs: &mut [Fac], nodes: &mut Vec<Node>) {
    for fac in facs.iter_mut() {
        let original = &nodes[fac.node.index()];
        if original.name.as_deref() != Some(fac.name.as_str()) {
            let mut copy = original.clone();
            copy.name = Some(fac.name.clone());
            nodes.push(copy);
            if let Some(r) = NodeRef::from_index(nodes.len() - 1) {
                fac.node = r;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::{TreeKind, TreeNode};

    #[test]
    fn test_refs_are_32_bit() {
        let last = u32::MAX as usize - 1;
        assert_eq!(NodeRef::from_index(last).map(|r| r.index()), Some(last));
        assert!(NodeRef::from_index(last + 1).is_none());
        assert!(FacRef::from_index(last + 1).is_none());
        assert!(FacRef::from_index(usize::MAX).is_none());
    }

    #[test]
    fn test_classify() {
        let mut types = TypeTable::default();
        let bit = types.add_bit();
        let logic = types.add_std_ulogic();
        let boolean = types.add_enum(
            "boolean",
            ScalarKind::B2,
            &["false", "true"],
            GhwWellKnownType::Boolean,
        );
        let state = types.add_enum(
            "state",
            ScalarKind::E8,
            &["idle", "busy"],
            GhwWellKnownType::Unknown,
        );
        let int = types.add_scalar("integer", ScalarKind::I32);
        let time = types.add_scalar("time", ScalarKind::P64);
        let real = types.add_scalar("real", ScalarKind::F64);

        assert_eq!(classify(&types, Some(bit)), (ValueKind::Bit, None));
        assert_eq!(classify(&types, Some(logic)), (ValueKind::Bit, None));
        let int32 = Some(BitRange { msi: 31, lsi: 0 });
        assert_eq!(classify(&types, Some(boolean)), (ValueKind::Enum, int32));
        assert_eq!(classify(&types, Some(state)), (ValueKind::Enum, int32));
        assert_eq!(classify(&types, Some(int)), (ValueKind::Integer, int32));
        assert_eq!(
            classify(&types, Some(time)),
            (ValueKind::Integer, Some(BitRange { msi: 63, lsi: 0 }))
        );
        assert_eq!(
            classify(&types, Some(real)),
            (ValueKind::Real, Some(BitRange { msi: 0, lsi: 0 }))
        );
        assert_eq!(classify(&types, None), (ValueKind::Unknown, None));
    }

    /// (root)
    ///  └ dut
    ///     ├ clk  -> signal 1
    ///     ├ bus
    ///     │  ├ [0] -> signal 0
    ///     │  └ [1] -> signal 1 (alias of clk)
    ///     └ en   -> signal 2
    fn aliased_tree() -> Tree {
        let mut tree = Tree::new(TreeNode::new("", TreeKind::Design));
        let leaf = |tree: &mut Tree, name: &str, which: u32| {
            let mut n = TreeNode::new(name, TreeKind::Element);
            n.which = Some(which);
            tree.add(n)
        };
        let dut = tree.add(TreeNode::new("dut", TreeKind::Instance));
        let clk = leaf(&mut tree, "clk", 1);
        let bus = tree.add(TreeNode::new("bus", TreeKind::Signal));
        let b0 = leaf(&mut tree, "[0]", 0);
        let b1 = leaf(&mut tree, "[1]", 1);
        let en = leaf(&mut tree, "en", 2);
        tree.get_mut(bus).child = tree.link_run(&[b0, b1]);
        tree.get_mut(dut).child = tree.link_run(&[clk, bus, en]);
        let root = tree.root();
        tree.get_mut(root).child = Some(dut);
        tree
    }

    #[test]
    fn test_assign_names_and_aliases() {
        let mut tree = aliased_tree();
        let mut nodes = vec![Node::new(ValueKind::Bit, None); 3];
        let mut facs = assign_names(&mut tree, &mut nodes, 4, &LoadOptions::default()).unwrap();
        let names: Vec<&str> = facs.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(
            names,
            ["top.dut.clk", "top.dut.bus[0]", "top.dut.bus[1]", "top.dut.en"]
        );
        // the first visit names the node
        assert_eq!(nodes[1].name.as_deref(), Some("top.dut.clk"));
        assert_eq!(facs[2].node, facs[0].node);

        // `which` now refers to the directory position
        let mut whiches = vec![];
        tree.for_each_leaf_bottom_up(|_, n| whiches.push(n.which.unwrap()));
        whiches.sort();
        assert_eq!(whiches, [0, 1, 2, 3]);

        split_aliases(&mut facs, &mut nodes);
        assert_eq!(nodes.len(), 4);
        assert_ne!(facs[2].node, facs[0].node);
        assert_eq!(nodes[facs[2].node.index()].name.as_deref(), Some("top.dut.bus[1]"));
        for fac in facs.iter() {
            assert_eq!(nodes[fac.node.index()].name.as_deref(), Some(fac.name.as_str()));
        }
    }

    #[test]
    fn test_custom_separator() {
        let mut tree = aliased_tree();
        let mut nodes = vec![Node::new(ValueKind::Bit, None); 3];
        let options = LoadOptions {
            hierarchy_separator: '/',
            top_name: "tb",
        };
        let facs = assign_names(&mut tree, &mut nodes, 4, &options).unwrap();
        assert_eq!(facs[1].name, "tb/dut/bus[0]");
    }
}
