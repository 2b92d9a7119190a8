// Copyright 2024 The Regents of the University of California
// Copyright 2024-2025 Cornell University
// released under BSD 3-Clause License
// author: Kevin Laeufer <laeufer@cornell.edu>

//! A top-down splay tree that keeps its nodes in an arena. Recently accessed keys move to the
//! root, which makes lookups in the same order as the insertions cheap.

use std::cmp::Ordering;

#[derive(Debug, Clone)]
struct SplayNode<K, V> {
    key: K,
    value: V,
    left: Option<usize>,
    right: Option<usize>,
}

/// Maps keys to values. Dropping the index frees all nodes at once, independent of the
/// shape of the tree.
#[derive(Debug, Clone)]
pub struct SplayIndex<K, V> {
    nodes: Vec<SplayNode<K, V>>,
    root: Option<usize>,
}

impl<K, V> Default for SplayIndex<K, V> {
    fn default() -> Self {
        Self {
            nodes: vec![],
            root: None,
        }
    }
}

impl<K: Ord, V: Copy> SplayIndex<K, V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            nodes: Vec::with_capacity(capacity),
            root: None,
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Inserts `key` unless it is already present. Returns `false` for duplicates,
    /// the value stored first is kept.
    pub fn insert(&mut self, key: K, value: V) -> bool {
        let Some(root) = self.root else {
            self.root = Some(self.push(key, value, None, None));
            return true;
        };
        let t = self.splay(&key, root);
        match key.cmp(&self.nodes[t].key) {
            Ordering::Less => {
                let left = self.nodes[t].left.take();
                self.root = Some(self.push(key, value, left, Some(t)));
                true
            }
            Ordering::Greater => {
                let right = self.nodes[t].right.take();
                self.root = Some(self.push(key, value, Some(t), right));
                true
            }
            Ordering::Equal => {
                self.root = Some(t);
                false
            }
        }
    }

    /// Looks up `key` and moves it to the root.
    pub fn get(&mut self, key: &K) -> Option<V> {
        let root = self.splay(key, self.root?);
        self.root = Some(root);
        let node = &self.nodes[root];
        (node.key == *key).then_some(node.value)
    }

    fn push(&mut self, key: K, value: V, left: Option<usize>, right: Option<usize>) -> usize {
        self.nodes.push(SplayNode {
            key,
            value,
            left,
            right,
        });
        self.nodes.len() - 1
    }

    /// Splays the subtree rooted at `t` so that the node closest to `key` becomes its root.
    /// `key` does not need to be present.
    fn splay(&mut self, key: &K, mut t: usize) -> usize {
        // the left tree collects nodes smaller than `key`, the right tree larger ones
        let mut left_root: Option<usize> = None;
        let mut left_max: Option<usize> = None;
        let mut right_root: Option<usize> = None;
        let mut right_min: Option<usize> = None;

        loop {
            match key.cmp(&self.nodes[t].key) {
                Ordering::Less => {
                    let Some(mut next) = self.nodes[t].left else {
                        break;
                    };
                    if *key < self.nodes[next].key {
                        // rotate right
                        self.nodes[t].left = self.nodes[next].right;
                        self.nodes[next].right = Some(t);
                        t = next;
                        match self.nodes[t].left {
                            Some(l) => next = l,
                            None => break,
                        }
                    }
                    // link right
                    match right_min {
                        Some(r) => self.nodes[r].left = Some(t),
                        None => right_root = Some(t),
                    }
                    right_min = Some(t);
                    t = next;
                }
                Ordering::Greater => {
                    let Some(mut next) = self.nodes[t].right else {
                        break;
                    };
                    if *key > self.nodes[next].key {
                        // rotate left
                        self.nodes[t].right = self.nodes[next].left;
                        self.nodes[next].left = Some(t);
                        t = next;
                        match self.nodes[t].right {
                            Some(r) => next = r,
                            None => break,
                        }
                    }
                    // link left
                    match left_max {
                        Some(l) => self.nodes[l].right = Some(t),
                        None => left_root = Some(t),
                    }
                    left_max = Some(t);
                    t = next;
                }
                Ordering::Equal => break,
            }
        }

        // assemble
        let (t_left, t_right) = (self.nodes[t].left, self.nodes[t].right);
        match left_max {
            Some(l) => self.nodes[l].right = t_left,
            None => left_root = t_left,
        }
        match right_min {
            Some(r) => self.nodes[r].left = t_right,
            None => right_root = t_right,
        }
        self.nodes[t].left = left_root;
        self.nodes[t].right = right_root;
        t
    }

    /// Height of the tree, mainly useful to check the balancing behavior.
    pub fn height(&self) -> usize {
        let mut height = 0;
        let mut todo: Vec<(usize, usize)> = self.root.map(|r| (r, 1)).into_iter().collect();
        while let Some((node, depth)) = todo.pop() {
            height = height.max(depth);
            let n = &self.nodes[node];
            todo.extend(n.left.map(|l| (l, depth + 1)));
            todo.extend(n.right.map(|r| (r, depth + 1)));
        }
        height
    }

    /// Keys in ascending order.
    pub fn keys(&self) -> Vec<&K> {
        let mut out = Vec::with_capacity(self.nodes.len());
        let mut todo = vec![];
        let mut current = self.root;
        loop {
            while let Some(c) = current {
                todo.push(c);
                current = self.nodes[c].left;
            }
            let Some(c) = todo.pop() else {
                break;
            };
            out.push(&self.nodes[c].key);
            current = self.nodes[c].right;
        }
        out
    }
}
