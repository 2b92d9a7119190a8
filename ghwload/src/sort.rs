// Copyright 2024 The Regents of the University of California
// Copyright 2024-2025 Cornell University
// released under BSD 3-Clause License
// author: Kevin Laeufer <laeufer@cornell.edu>

//! Sorting of the signal directory.

use crate::directory::{Fac, FacRef, Node};
use crate::splay::SplayIndex;
use crate::tree::{Tree, TreeNodeRef};

/// Sorts `facs` by name and updates every `which` in `tree` to the new positions.
///
/// Two splay indices carry the correspondence across the sort: the first one maps each tree
/// leaf to the directory entry it refers to, the second one maps each entry to its position
/// after sorting. Both are filled and queried in the bottom-up leaf order of the tree.
pub fn sort_and_remap(tree: &mut Tree, facs: Vec<Fac>) -> Vec<Fac> {
    let mut by_leaf: SplayIndex<TreeNodeRef, u32> = SplayIndex::with_capacity(facs.len());
    tree.for_each_leaf_bottom_up(|leaf, node| {
        if let Some(which) = node.which {
            by_leaf.insert(leaf, which);
        }
    });

    // `order[new]` is the position of an entry before sorting
    let mut order: Vec<u32> = (0..facs.len() as u32).collect();
    order.sort_by(|a, b| facs[*a as usize].name.cmp(&facs[*b as usize].name));

    let mut by_fac: SplayIndex<u32, u32> = SplayIndex::with_capacity(facs.len());
    for (new, old) in order.iter().enumerate() {
        by_fac.insert(*old, new as u32);
    }

    tree.for_each_leaf_bottom_up(|leaf, node| {
        let new = by_leaf.get(&leaf).and_then(|old| by_fac.get(&old));
        if new.is_some() {
            node.which = new;
        }
    });

    let mut slots: Vec<Option<Fac>> = facs.into_iter().map(Some).collect();
    order
        .iter()
        .filter_map(|old| slots[*old as usize].take())
        .collect()
}

/// Returns the position of the `[` that starts a trailing `[<digits or ->]` suffix.
pub fn strand_point(name: &str) -> Option<usize> {
    let bytes = name.as_bytes();
    let (&last, rest) = bytes.split_last()?;
    if last != b']' {
        return None;
    }
    for i in (1..rest.len()).rev() {
        match rest[i] {
            b'0'..=b'9' | b'-' => continue,
            b'[' => return Some(i),
            _ => return None,
        }
    }
    None
}

/// Links runs of adjacent single bit entries that only differ in their index suffix,
/// like `bus[0]`, `bus[1]` and `bus[2]`.
pub fn rechain(facs: &mut [Fac], nodes: &[Node]) {
    let mut root: Option<FacRef> = None;
    for i in 1..facs.len() {
        let (prev, fac) = (&facs[i - 1], &facs[i]);
        let has_ext = |f: &Fac| nodes[f.node.index()].ext.is_some();
        if has_ext(prev) || has_ext(fac) {
            root = None;
            continue;
        }
        let same_vector = match (strand_point(&prev.name), strand_point(&fac.name)) {
            (Some(p1), Some(p2)) => {
                p1 == p2 && prev.name.as_bytes()[..p1] == fac.name.as_bytes()[..p1]
            }
            _ => false,
        };
        let (prev_ref, fac_ref) = (FacRef::from_index(i - 1), FacRef::from_index(i));
        match root {
            None if same_vector => {
                root = prev_ref;
                facs[i - 1].vector_root = prev_ref;
                facs[i - 1].vector_chain = fac_ref;
                facs[i].vector_root = prev_ref;
            }
            None => {}
            Some(r) if same_vector => {
                facs[i - 1].vector_chain = fac_ref;
                facs[i].vector_root = Some(r);
            }
            Some(_) => root = None,
        }
    }
}
