// Copyright 2024 The Regents of the University of California
// Copyright 2024-2025 Cornell University
// released under BSD 3-Clause License
// author: Kevin Laeufer <laeufer@cornell.edu>
//
// Converts the GHW hierarchy into a display tree. Composite signals are decomposed into one
// leaf per basic signal.

use crate::ghw::{GhwHierarchy, GhwType, HierEntry, HierRef, ScalarKind, ScopeKind, SignalKind};
use crate::ghw::{TypeId, TypeTable};
use crate::tree::{Tree, TreeKind, TreeNode, TreeNodeRef};
use crate::{CorruptionKind, LoadError, Result};

pub(crate) struct BuiltTree {
    pub tree: Tree,
    /// number of nodes with a defined `which`
    pub num_leaves: usize,
}

/// Builds the display tree. Every leaf's `which` is the index of the basic signal it shows.
pub(crate) fn build_tree(
    hierarchy: &GhwHierarchy,
    types: &TypeTable,
    num_signals: usize,
) -> Result<BuiltTree> {
    struct Frame {
        node: TreeNodeRef,
        entries: Vec<HierRef>,
        pos: usize,
        children: Vec<TreeNodeRef>,
    }

    let mut tree = Tree::new(TreeNode::new("", TreeKind::Design));
    let mut num_leaves = 0;
    let mut stack = vec![Frame {
        node: tree.root(),
        entries: hierarchy.children(hierarchy.root()).collect(),
        pos: 0,
        children: vec![],
    }];

    while let Some(frame) = stack.last_mut() {
        let Some(&entry) = frame.entries.get(frame.pos) else {
            // all children are done
            if let Some(done) = stack.pop() {
                let first = tree.link_run(&done.children);
                tree.get_mut(done.node).child = first;
            }
            continue;
        };
        frame.pos += 1;

        match &hierarchy.get(entry).entry {
            HierEntry::Process { .. } => {}
            HierEntry::Scope { kind, name } => {
                let (kind, name) = match kind {
                    ScopeKind::GenerateFor {
                        iter_type,
                        iter_value,
                    } => {
                        let value = types.format_value(*iter_type, iter_value);
                        (TreeKind::GenerateFor, format!("{name}[{value}]"))
                    }
                    other => (convert_scope_kind(other), name.to_string()),
                };
                let node = tree.add(TreeNode::new(name, kind));
                frame.children.push(node);
                stack.push(Frame {
                    node,
                    entries: hierarchy.children(entry).collect(),
                    pos: 0,
                    children: vec![],
                });
            }
            HierEntry::Signal {
                kind,
                name,
                tpe,
                sigs,
            } => {
                let mut decomposer = Decomposer {
                    types,
                    tree: &mut tree,
                    num_signals,
                    signal: name,
                    ids: sigs.iter(),
                    num_leaves: 0,
                };
                let node = decomposer.build_type(*tpe, name.to_string())?;
                if decomposer.ids.next().is_some() {
                    return Err(LoadError::corrupt(CorruptionKind::UnusedSignalIds(
                        name.to_string(),
                    )));
                }
                num_leaves += decomposer.num_leaves;
                tree.get_mut(node).kind = convert_signal_kind(*kind);
                frame.children.push(node);
            }
        }
    }

    Ok(BuiltTree { tree, num_leaves })
}

struct Decomposer<'a> {
    types: &'a TypeTable,
    tree: &'a mut Tree,
    num_signals: usize,
    /// declared name of the signal, for error messages
    signal: &'a str,
    ids: std::slice::Iter<'a, u32>,
    num_leaves: usize,
}

impl Decomposer<'_> {
    fn build_type(&mut self, tpe: TypeId, name: String) -> Result<TreeNodeRef> {
        let types = self.types;
        match types.get(tpe) {
            GhwType::SubtypeScalar { base, .. } => self.build_type(*base, name),
            GhwType::Enum(_) | GhwType::Scalar { .. } => self.build_leaf(name),
            GhwType::SubtypeArray {
                ranges, element, ..
            } => {
                let container = self.tree.add(TreeNode::new(name, TreeKind::Element));
                let mut elements = vec![];
                self.build_array(tpe, ranges, *element, 0, "", &mut elements)?;
                let first = self.tree.link_run(&elements);
                self.tree.get_mut(container).child = first;
                Ok(container)
            }
            GhwType::Record { fields, .. } | GhwType::SubtypeRecord { fields, .. } => {
                let container = self.tree.add(TreeNode::new(name, TreeKind::Element));
                let mut children = Vec::with_capacity(fields.len());
                for field in fields.iter() {
                    children.push(self.build_type(field.tpe, field.name.to_string())?);
                }
                let first = self.tree.link_run(&children);
                self.tree.get_mut(container).child = first;
                Ok(container)
            }
            other => Err(LoadError::corrupt(CorruptionKind::UnhandledType {
                name: self.signal.to_string(),
                tpe: format!("{} ({:?})", other.name(), other.rtik()),
            })),
        }
    }

    fn build_leaf(&mut self, name: String) -> Result<TreeNodeRef> {
        let id = match self.ids.next() {
            None | Some(0) => {
                return Err(LoadError::corrupt(CorruptionKind::SignalIdsExhausted(
                    self.signal.to_string(),
                )))
            }
            Some(&id) => id,
        };
        if id as usize > self.num_signals {
            return Err(LoadError::corrupt(CorruptionKind::SignalIdOutOfRange {
                name: self.signal.to_string(),
                id,
                num_signals: self.num_signals,
            }));
        }
        let mut leaf = TreeNode::new(name, TreeKind::Element);
        leaf.which = Some(id - 1);
        self.num_leaves += 1;
        Ok(self.tree.add(leaf))
    }

    /// Appends one element node per index combination of the dimensions `dim..` to `out`.
    /// Names are built as `[i]`, `[i,j]` and so on.
    fn build_array(
        &mut self,
        arr: TypeId,
        ranges: &[crate::ghw::Range],
        element: TypeId,
        dim: usize,
        prefix: &str,
        out: &mut Vec<TreeNodeRef>,
    ) -> Result<()> {
        let types = self.types;
        let dims = match types.array_base(arr) {
            Some(GhwType::Array { dims, .. }) => dims,
            _ => {
                return Err(LoadError::corrupt(CorruptionKind::UnhandledType {
                    name: self.signal.to_string(),
                    tpe: types.get(arr).name().to_string(),
                }))
            }
        };

        if dim == dims.len() {
            let node = self.build_type(element, format!("{prefix}]"))?;
            out.push(node);
            return Ok(());
        }

        let index_type = types.get(types.base_scalar(dims[dim]));
        let index_kind = match index_type.scalar_kind() {
            Some(kind @ (ScalarKind::I32 | ScalarKind::E8 | ScalarKind::B2)) => kind,
            _ => {
                return Err(LoadError::corrupt(CorruptionKind::UnhandledIndexType {
                    name: self.signal.to_string(),
                    tpe: index_type.name().to_string(),
                }))
            }
        };
        let range = match ranges.get(dim) {
            Some(r) if r.kind() == index_kind => r,
            _ => {
                return Err(LoadError::corrupt(CorruptionKind::RangeKindMismatch(
                    self.signal.to_string(),
                )))
            }
        };

        let open = if dim == 0 { '[' } else { ',' };
        for index in range.indices() {
            let name = format!("{prefix}{open}{index}");
            self.build_array(arr, ranges, element, dim + 1, &name, out)?;
        }
        Ok(())
    }
}

fn convert_scope_kind(kind: &ScopeKind) -> TreeKind {
    match kind {
        ScopeKind::Design => TreeKind::Design,
        ScopeKind::Block => TreeKind::Block,
        ScopeKind::GenerateIf => TreeKind::GenerateIf,
        ScopeKind::GenerateFor { .. } => TreeKind::GenerateFor,
        ScopeKind::Instance => TreeKind::Instance,
        ScopeKind::Package => TreeKind::Package,
        ScopeKind::Generic => TreeKind::Generic,
    }
}

fn convert_signal_kind(kind: SignalKind) -> TreeKind {
    match kind {
        SignalKind::Signal => TreeKind::Signal,
        SignalKind::PortIn => TreeKind::PortIn,
        SignalKind::PortOut => TreeKind::PortOut,
        SignalKind::PortInOut => TreeKind::PortInOut,
        SignalKind::Buffer => TreeKind::Buffer,
        SignalKind::Linkage => TreeKind::Linkage,
    }
}
