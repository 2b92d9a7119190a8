// Copyright 2024 The Regents of the University of California
// Copyright 2024-2025 Cornell University
// released under BSD 3-Clause License
// author: Kevin Laeufer <laeufer@cornell.edu>

use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use ghwload::sort::{rechain, sort_and_remap};
use ghwload::splay::SplayIndex;
use ghwload::{Fac, Node, NodeRef, Tree, TreeKind, TreeNode, ValueKind};

/// A flat design with `n` bit-blasted buses of eight bits, declared in reverse name order.
fn design(n: usize) -> (Tree, Vec<Fac>) {
    let mut tree = Tree::new(TreeNode::new("", TreeKind::Design));
    let mut buses = vec![];
    let mut facs = vec![];
    for bus in (0..n).rev() {
        let mut bits = vec![];
        for bit in 0..8 {
            let mut leaf = TreeNode::new(format!("[{bit}]"), TreeKind::Element);
            leaf.which = Some(facs.len() as u32);
            bits.push(tree.add(leaf));
            facs.push(Fac {
                name: format!("top.bus{bus}[{bit}]"),
                node: NodeRef::from_index(0).unwrap(),
                vector_root: None,
                vector_chain: None,
            });
        }
        let node = tree.add(TreeNode::new(format!("bus{bus}"), TreeKind::Signal));
        tree.get_mut(node).child = tree.link_run(&bits);
        buses.push(node);
    }
    let root = tree.root();
    tree.get_mut(root).child = tree.link_run(&buses);
    (tree, facs)
}

fn criterion_benchmark(c: &mut Criterion) {
    c.bench_function("sort_and_remap 10k buses", |b| {
        b.iter_batched(
            || design(10_000),
            |(mut tree, facs)| sort_and_remap(&mut tree, facs),
            BatchSize::LargeInput,
        )
    });

    let nodes = vec![Node {
        name: None,
        kind: ValueKind::Bit,
        ext: None,
        head: None,
    }];
    c.bench_function("rechain 10k buses", |b| {
        b.iter_batched(
            || {
                let (mut tree, facs) = design(10_000);
                sort_and_remap(&mut tree, facs)
            },
            |mut facs| rechain(&mut facs, &nodes),
            BatchSize::LargeInput,
        )
    });

    c.bench_function("splay sequential lookups", |b| {
        let mut index = SplayIndex::with_capacity(100_000);
        for key in 0u32..100_000 {
            index.insert(key, key);
        }
        b.iter(|| (0u32..100_000).filter_map(|k| index.get(&k)).count())
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
