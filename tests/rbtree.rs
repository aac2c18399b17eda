use std::cmp::Ordering;

use common::{init_logger, AggCat, AggSum};
use dynconn::rbtree::{Rbt, SearchDirection, NIL};
use rand::prelude::*;

mod common;

type Idx = usize;

fn inorder<A>(t: &Rbt<A>, root: Idx) -> Vec<A::Item>
where
    A: dynconn::rbtree::Augment,
    A::Item: Clone,
{
    let mut out = Vec::new();
    if root == NIL {
        return out;
    }
    let mut u = t.first(root);
    while u != NIL {
        out.push(t.item(u).clone());
        u = t.next(u);
    }
    out
}

fn audit(t: &Rbt<AggSum>, root: Idx) {
    t.validate(root);
    t.validate_aggs(root);
}

/// Append values as a sequence, returning the root and the node of each
/// value in order.
fn sequence(t: &mut Rbt<AggSum>, values: &[i64]) -> (Idx, Vec<Idx>) {
    let mut root = NIL;
    let mut nodes = Vec::new();
    for &v in values {
        let u = t.create(v);
        nodes.push(u);
        root = t.join(root, u, NIL);
    }
    (root, nodes)
}

#[test]
fn insert_ordered() {
    init_logger();
    let mut t = Rbt::<AggSum>::new(());
    let mut values: Vec<i64> = (0..200).collect();
    values.shuffle(&mut StdRng::seed_from_u64(7));
    let mut root = NIL;
    for &v in &values {
        let u = t.create(v);
        root = t.insert_by(root, u, |a, b| a < b);
    }
    assert_eq!(inorder(&t, root), (0..200).collect::<Vec<_>>());
    assert_eq!(t.agg(root).0, (0..200).sum::<i64>());
    assert_eq!(t.size(root), 200);
    audit(&t, root);
    t.validate_order(root, |a, b| a < b);
    for k in 0..200 {
        let u = t.find_kth(root, k);
        assert_eq!(*t.item(u), k as i64);
        assert_eq!(t.rank(u), k);
    }
    assert_eq!(t.find_kth(root, 200), NIL);
}

#[test]
fn remove_keeps_structure() {
    init_logger();
    let mut t = Rbt::<AggSum>::new(());
    let (mut root, nodes) = sequence(&mut t, &(0..100).collect::<Vec<_>>());
    let mut alive: Vec<i64> = (0..100).collect();
    let mut order: Vec<Idx> = nodes.clone();
    let mut rng = StdRng::seed_from_u64(90125);
    while !alive.is_empty() {
        let at = rng.gen_range(0..alive.len());
        let u = order.remove(at);
        alive.remove(at);
        root = t.remove(u);
        t.release(u);
        assert_eq!(inorder(&t, root), alive);
        audit(&t, root);
    }
    assert_eq!(root, NIL);
    assert!(t.is_empty());
}

#[test]
fn remove_preserves_external_nodes() {
    // Unlinking a node with two children moves its successor by pointer
    // surgery; every other node keeps its slot and its item.
    let mut t = Rbt::<AggSum>::new(());
    let (root, nodes) = sequence(&mut t, &(0..20).collect::<Vec<_>>());
    let victim = nodes[10];
    t.remove(victim);
    t.release(victim);
    for (i, &u) in nodes.iter().enumerate() {
        if u == victim {
            continue;
        }
        assert_eq!(*t.item(u), i as i64);
    }
    let _ = root;
}

#[test]
fn join_and_split_sequences() {
    init_logger();
    let mut t = Rbt::<AggSum>::new(());
    let (root, nodes) = sequence(&mut t, &(0..10).collect::<Vec<_>>());
    assert_eq!(inorder(&t, root), (0..10).collect::<Vec<_>>());

    let (l, r) = t.split_before(nodes[4]);
    assert_eq!(inorder(&t, l), (0..4).collect::<Vec<_>>());
    assert_eq!(inorder(&t, r), (4..10).collect::<Vec<_>>());
    assert_eq!(t.agg(l).0, 6);
    assert_eq!(t.agg(r).0, 39);
    audit(&t, l);
    audit(&t, r);

    let root = t.join2(l, r);
    assert_eq!(inorder(&t, root), (0..10).collect::<Vec<_>>());
    audit(&t, root);

    let (l, r) = t.split_after(nodes[6]);
    assert_eq!(inorder(&t, l), (0..7).collect::<Vec<_>>());
    assert_eq!(inorder(&t, r), (7..10).collect::<Vec<_>>());

    // Swap the halves through a pivot.
    let pivot = t.create(-1);
    let root = t.join(r, pivot, l);
    assert_eq!(
        inorder(&t, root),
        vec![7, 8, 9, -1, 0, 1, 2, 3, 4, 5, 6],
    );
    audit(&t, root);
}

#[test]
fn split_boundaries() {
    let mut t = Rbt::<AggSum>::new(());
    let (_, nodes) = sequence(&mut t, &(0..7).collect::<Vec<_>>());
    let (l, r) = t.split_before(nodes[0]);
    assert_eq!(l, NIL);
    assert_eq!(inorder(&t, r), (0..7).collect::<Vec<_>>());
    let (l, r) = t.split_after(nodes[6]);
    assert_eq!(r, NIL);
    assert_eq!(inorder(&t, l), (0..7).collect::<Vec<_>>());
    let (l, r) = t.split_after(nodes[0]);
    assert_eq!(inorder(&t, l), vec![0]);
    assert_eq!(inorder(&t, r), (1..7).collect::<Vec<_>>());
}

#[test]
fn concatenation_is_ordered() {
    // Uneven heights in both directions so the spine descent runs on
    // either side of the pivot.
    let mut t = Rbt::<AggSum>::new(());
    let (big, _) = sequence(&mut t, &(0..300).collect::<Vec<_>>());
    let (small, _) = sequence(&mut t, &(1000..1003).collect::<Vec<_>>());
    let pivot = t.create(500);
    let root = t.join(big, pivot, small);
    let mut expect: Vec<i64> = (0..300).collect();
    expect.push(500);
    expect.extend(1000..1003);
    assert_eq!(inorder(&t, root), expect);
    audit(&t, root);

    let (tiny, _) = sequence(&mut t, &[-5]);
    let pivot = t.create(-3);
    let root = t.join(tiny, pivot, root);
    assert_eq!(t.first(root), t.find_kth(root, 0));
    assert_eq!(*t.item(t.first(root)), -5);
    audit(&t, root);
}

#[test]
fn rank_compare_and_lca() {
    let mut t = Rbt::<AggSum>::new(());
    let (root, nodes) = sequence(&mut t, &(0..64).collect::<Vec<_>>());
    let mut rng = StdRng::seed_from_u64(33);
    for _ in 0..500 {
        let (a, b) = (rng.gen_range(0..64), rng.gen_range(0..64));
        let (u, v) = (nodes[a], nodes[b]);
        assert_eq!(t.rank_cmp(u, v), a.cmp(&b), "a {a} b {b}");
        let lca = t.lca(u, v);
        let mut anc = std::collections::BTreeSet::new();
        let mut w = u;
        while w != NIL {
            anc.insert(w);
            w = t.parent(w);
        }
        let mut w = v;
        while !anc.contains(&w) {
            w = t.parent(w);
        }
        assert_eq!(lca, w);
    }
    let _ = root;
}

#[test]
fn guided_search() {
    let mut t = Rbt::<AggSum>::new(());
    let (root, nodes) = sequence(&mut t, &[0, 0, 1, 0, 3, 0, 2, 0, 1, 1000]);
    let first_reaching = |mut k: i64| {
        t.find_element(root, move |s| {
            if s.left.0 >= k {
                SearchDirection::Left
            } else if s.left.0 + *s.item >= k {
                SearchDirection::Found
            } else {
                k -= s.left.0 + *s.item;
                SearchDirection::Right
            }
        })
    };
    assert_eq!(first_reaching(1), nodes[2]);
    assert_eq!(first_reaching(2), nodes[4]);
    assert_eq!(first_reaching(4), nodes[4]);
    assert_eq!(first_reaching(5), nodes[6]);
    assert_eq!(first_reaching(7), nodes[8]);
    assert_eq!(first_reaching(8), nodes[9]);
    assert_eq!(first_reaching(255), nodes[9]);
    assert_eq!(first_reaching(100_000), NIL);
}

#[test]
fn mutate_refreshes_summaries() {
    let mut t = Rbt::<AggSum>::new(());
    let (root, nodes) = sequence(&mut t, &[1, 2, 4]);
    assert_eq!(t.agg(root).0, 7);
    t.mutate_item(nodes[1], |v| *v = 10);
    assert_eq!(t.agg(root).0, 15);
    t.mutate_item(nodes[0], |v| *v = 100);
    assert_eq!(t.agg(root).0, 114);
    assert_eq!(inorder(&t, root), vec![100, 10, 4]);
    audit(&t, root);
}

#[test]
fn noncommutative_folds_stay_in_order() {
    let mut t = Rbt::<AggCat>::new(());
    let mut root = NIL;
    let mut nodes = Vec::new();
    for v in 1..=7 {
        let u = t.create(v);
        nodes.push(u);
        root = t.join(root, u, NIL);
    }
    assert_eq!(t.agg(root).value, 1234567);
    let (l, r) = t.split_before(nodes[3]);
    assert_eq!(t.agg(l).value, 123);
    assert_eq!(t.agg(r).value, 4567);
    let root = t.join2(r, l);
    assert_eq!(t.agg(root).value, 4567123);
    t.validate(root);
    t.validate_aggs(root);
}

/// Random joins and splits cross-checked against a list-of-lists oracle.
fn random_sequences(q: usize, n: usize, seed: u64) {
    init_logger();
    let mut rng = StdRng::seed_from_u64(seed);
    let mut t = Rbt::<AggSum>::new(());
    // Each oracle list holds (node, value) in order.
    let mut lists: Vec<Vec<(Idx, i64)>> = Vec::new();
    for i in 0..n {
        let v = rng.gen_range(-1000..1000);
        let u = t.create(v);
        assert_eq!(u, i + 1, "arena slots are dense");
        lists.push(vec![(u, v)]);
    }
    for q in 0..q {
        log::trace!("op {q}");
        match rng.gen_range(0..100) {
            0..50 if lists.len() > 1 => {
                let a = rng.gen_range(0..lists.len());
                let mut b = rng.gen_range(0..lists.len() - 1);
                if b >= a {
                    b += 1;
                }
                let (ra, rb) = (t.root(lists[a][0].0), t.root(lists[b][0].0));
                t.join2(ra, rb);
                let mut moved = std::mem::take(&mut lists[b]);
                lists[a].append(&mut moved);
                lists.swap_remove(b);
            }
            _ => {
                let a = rng.gen_range(0..lists.len());
                if lists[a].len() < 2 {
                    continue;
                }
                let at = rng.gen_range(1..lists[a].len());
                t.split_before(lists[a][at].0);
                let tail = lists[a].split_off(at);
                lists.push(tail);
            }
        }
        if q % 16 == 0 {
            for list in &lists {
                let root = t.root(list[0].0);
                assert_eq!(t.size(root), list.len());
                assert_eq!(
                    inorder(&t, root),
                    list.iter().map(|&(_, v)| v).collect::<Vec<_>>()
                );
                assert_eq!(t.agg(root).0, list.iter().map(|&(_, v)| v).sum::<i64>());
                audit(&t, root);
            }
        }
    }
}

#[test]
fn random_sequences_small() {
    random_sequences(2000, 30, 414);
}

#[test]
fn random_sequences_large() {
    random_sequences(1500, 400, 8675309);
}

#[test]
#[ignore]
fn random_sequences_stress() {
    init_logger();
    loop {
        let seed = thread_rng().gen();
        log::info!("seed = {seed}");
        random_sequences(20_000, 150, seed);
    }
}
