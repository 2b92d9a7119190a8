// Copyright 2024 The Regents of the University of California
// Copyright 2024-2025 Cornell University
// released under BSD 3-Clause License
// author: Kevin Laeufer <laeufer@cornell.edu>

use std::num::NonZeroU32;

/// Uniquely identifies a node of a [`Tree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde1", derive(serde::Serialize, serde::Deserialize))]
pub struct TreeNodeRef(NonZeroU32);

impl TreeNodeRef {
    #[inline]
    pub fn from_index(index: usize) -> Option<Self> {
        let raw = u32::try_from(index).ok()?.checked_add(1)?;
        NonZeroU32::new(raw).map(TreeNodeRef)
    }

    #[inline]
    pub fn index(&self) -> usize {
        (self.0.get() - 1) as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde1", derive(serde::Serialize, serde::Deserialize))]
pub enum TreeKind {
    Design,
    Block,
    Instance,
    GenerateFor,
    GenerateIf,
    Package,
    Generic,
    Signal,
    PortIn,
    PortOut,
    PortInOut,
    Buffer,
    Linkage,
    /// array element or record field
    Element,
}

impl TreeKind {
    pub fn is_scope(&self) -> bool {
        matches!(
            self,
            TreeKind::Design
                | TreeKind::Block
                | TreeKind::Instance
                | TreeKind::GenerateFor
                | TreeKind::GenerateIf
                | TreeKind::Package
                | TreeKind::Generic
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeNode {
    pub name: String,
    pub kind: TreeKind,
    pub child: Option<TreeNodeRef>,
    pub next: Option<TreeNodeRef>,
    /// Position in the signal directory, `None` for scopes and composite signals.
    pub which: Option<u32>,
}

impl TreeNode {
    pub fn new(name: impl Into<String>, kind: TreeKind) -> Self {
        Self {
            name: name.into(),
            kind,
            child: None,
            next: None,
            which: None,
        }
    }
}

/// The design hierarchy. Nodes live in one arena, children are kept as a singly linked
/// sibling run that starts at `child`.
#[derive(Debug, Clone)]
pub struct Tree {
    nodes: Vec<TreeNode>,
    root: TreeNodeRef,
}

impl Tree {
    /// Creates a tree that only contains its root.
    pub fn new(root: TreeNode) -> Self {
        Self {
            nodes: vec![root],
            root: TreeNodeRef(NonZeroU32::MIN),
        }
    }

    #[inline]
    pub fn root(&self) -> TreeNodeRef {
        self.root
    }

    #[inline]
    pub fn get(&self, r: TreeNodeRef) -> &TreeNode {
        &self.nodes[r.index()]
    }

    #[inline]
    pub fn get_mut(&mut self, r: TreeNodeRef) -> &mut TreeNode {
        &mut self.nodes[r.index()]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Adds a detached node. Use `child` and `next` to link it.
    /// A tree holds at most `u32::MAX - 1` nodes. Leaves are bounded by the 32-bit signal count
    /// of the file and inner nodes by its hierarchy entries, so real designs stay far below that.
    pub fn add(&mut self, node: TreeNode) -> TreeNodeRef {
        let r = TreeNodeRef::from_index(self.nodes.len());
        debug_assert!(r.is_some(), "more than u32::MAX - 1 tree nodes");
        self.nodes.push(node);
        r.unwrap_or(TreeNodeRef(NonZeroU32::MAX))
    }

    /// Iterates over a sibling run starting at `first`.
    pub fn run(&self, first: Option<TreeNodeRef>) -> impl Iterator<Item = TreeNodeRef> + '_ {
        std::iter::successors(first, move |r| self.get(*r).next)
    }

    pub fn children(&self, parent: TreeNodeRef) -> impl Iterator<Item = TreeNodeRef> + '_ {
        self.run(self.get(parent).child)
    }

    /// Links `nodes` into one sibling run and returns its first element.
    pub fn link_run(&mut self, nodes: &[TreeNodeRef]) -> Option<TreeNodeRef> {
        for pair in nodes.windows(2) {
            self.get_mut(pair[0]).next = Some(pair[1]);
        }
        if let Some(last) = nodes.last() {
            self.get_mut(*last).next = None;
        }
        nodes.first().copied()
    }

    /// Depth first pre-order iteration over all nodes, together with their depth.
    pub fn iter_depth_first(&self) -> DepthFirst<'_> {
        DepthFirst {
            tree: self,
            stack: vec![(self.root, 0)],
        }
    }

    /// Calls `visit` on every node with a defined `which`. Each sibling run is handled
    /// bottom up: the subtrees below the run are visited first, in order, followed by the
    /// members of the run itself in reverse order.
    pub fn for_each_leaf_bottom_up(&mut self, mut visit: impl FnMut(TreeNodeRef, &mut TreeNode)) {
        struct Frame {
            run: Vec<TreeNodeRef>,
            pos: usize,
        }
        let mut stack = vec![Frame {
            run: self.run(Some(self.root)).collect(),
            pos: 0,
        }];
        while let Some(frame) = stack.last_mut() {
            if let Some(&node) = frame.run.get(frame.pos) {
                frame.pos += 1;
                if let Some(child) = self.get(node).child {
                    let run = self.run(Some(child)).collect();
                    stack.push(Frame { run, pos: 0 });
                }
            } else if let Some(done) = stack.pop() {
                for &node in done.run.iter().rev() {
                    let n = self.get_mut(node);
                    if n.which.is_some() {
                        visit(node, n);
                    }
                }
            }
        }
    }
}

pub struct DepthFirst<'a> {
    tree: &'a Tree,
    stack: Vec<(TreeNodeRef, usize)>,
}

impl Iterator for DepthFirst<'_> {
    type Item = (TreeNodeRef, usize);

    fn next(&mut self) -> Option<Self::Item> {
        let (node, depth) = self.stack.pop()?;
        let n = self.tree.get(node);
        if let Some(next) = n.next {
            self.stack.push((next, depth));
        }
        if let Some(child) = n.child {
            self.stack.push((child, depth + 1));
        }
        Some((node, depth))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(tree: &mut Tree, name: &str, which: u32) -> TreeNodeRef {
        let mut n = TreeNode::new(name, TreeKind::Signal);
        n.which = Some(which);
        tree.add(n)
    }

    /// top
    ///  ├ a (0)
    ///  ├ s
    ///  │ ├ x (1)
    ///  │ └ y (2)
    ///  └ b (3)
    fn small_tree() -> Tree {
        let mut tree = Tree::new(TreeNode::new("", TreeKind::Design));
        let a = leaf(&mut tree, "a", 0);
        let s = tree.add(TreeNode::new("s", TreeKind::Signal));
        let x = leaf(&mut tree, "x", 1);
        let y = leaf(&mut tree, "y", 2);
        let b = leaf(&mut tree, "b", 3);
        tree.get_mut(s).child = tree.link_run(&[x, y]);
        let root = tree.root();
        tree.get_mut(root).child = tree.link_run(&[a, s, b]);
        tree
    }

    #[test]
    fn test_depth_first_order() {
        let tree = small_tree();
        let names: Vec<(String, usize)> = tree
            .iter_depth_first()
            .map(|(r, d)| (tree.get(r).name.clone(), d))
            .collect();
        let expected = [("", 0), ("a", 1), ("s", 1), ("x", 2), ("y", 2), ("b", 1)];
        let expected: Vec<(String, usize)> =
            expected.iter().map(|(n, d)| (n.to_string(), *d)).collect();
        assert_eq!(names, expected);
    }

    #[test]
    fn test_bottom_up_leaf_order() {
        let mut tree = small_tree();
        let mut order = vec![];
        tree.for_each_leaf_bottom_up(|_, n| order.push(n.which.unwrap()));
        // the run below `s` comes first (reversed), then the top level run (reversed)
        assert_eq!(order, [2, 1, 3, 0]);
    }

    #[test]
    fn test_deep_tree_does_not_overflow() {
        let mut tree = Tree::new(TreeNode::new("", TreeKind::Design));
        let mut parent = tree.root();
        for i in 0..200_000 {
            let child = tree.add(TreeNode::new(format!("b{i}"), TreeKind::Block));
            tree.get_mut(parent).child = Some(child);
            parent = child;
        }
        let l = leaf(&mut tree, "x", 0);
        tree.get_mut(parent).child = Some(l);
        let mut count = 0;
        tree.for_each_leaf_bottom_up(|_, _| count += 1);
        assert_eq!(count, 1);
        assert_eq!(tree.iter_depth_first().count(), 200_002);
    }
}
