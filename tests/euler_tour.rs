use common::init_logger;
use dynconn::euler_tour::{TourForest, Visit};

mod common;

/// Render a tour as "v0 e0 v1 e0" for order assertions.
fn tour(f: &TourForest<i64>, etv: usize) -> String {
    f.tour_items(f.tour_root(etv))
        .iter()
        .map(|v| match v {
            Visit::Vertex { etv, .. } => format!("v{etv}"),
            Visit::Edge { tree } => format!("e{tree}"),
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn build(n: usize) -> TourForest<i64> {
    let mut f = TourForest::new(Some(Box::new(|a: &i64, b: &i64| a + b)));
    for i in 0..n {
        assert_eq!(f.create_vertex(0), i);
    }
    f
}

fn assert_groups(f: &TourForest<i64>, groups: &[&[usize]]) {
    for g1 in groups {
        for &u in g1.iter() {
            for g2 in groups {
                for &v in g2.iter() {
                    assert_eq!(f.connected(u, v), g1 == g2, "u {u} v {v}");
                }
            }
        }
    }
}

#[test]
fn path_tour_order() {
    init_logger();
    let mut f = build(5);
    for i in 0..4 {
        assert!(!f.connected(i, i + 1));
        assert_eq!(f.link(i, i + 1), i);
        assert!(f.connected(i, i + 1));
    }
    assert_eq!(tour(&f, 0), "v0 e0 v1 e1 v2 e2 v3 e3 v4 e3 e2 e1 e0");
    assert_eq!(f.vertices_in(f.tour_root(0)), 5);
    assert_groups(&f, &[&[0, 1, 2, 3, 4]]);
}

#[test]
fn star_tour_order() {
    let mut f = build(4);
    f.link(0, 1);
    f.link(0, 2);
    f.link(0, 3);
    assert_eq!(tour(&f, 0), "v0 e2 v3 e2 e1 v2 e1 e0 v1 e0");
    assert_groups(&f, &[&[0, 1, 2, 3]]);
}

#[test]
fn cut_splits_the_tour() {
    init_logger();
    let mut f = build(5);
    let mut edges = Vec::new();
    for i in 0..4 {
        edges.push(f.link(i, i + 1));
    }
    f.cut(edges[1]);
    assert_eq!(tour(&f, 0), "v0 e0 v1 e0");
    assert_eq!(tour(&f, 2), "v2 e2 v3 e3 v4 e3 e2");
    assert_groups(&f, &[&[0, 1], &[2, 3, 4]]);
    assert_eq!(f.vertices_in(f.tour_root(0)), 2);
    assert_eq!(f.vertices_in(f.tour_root(4)), 3);

    // Relinking across the gap reconnects everything.
    f.link(4, 0);
    assert_groups(&f, &[&[0, 1, 2, 3, 4]]);
    assert_eq!(f.vertices_in(f.tour_root(1)), 5);
}

#[test]
fn reroot_rotates_in_place() {
    let mut f = build(5);
    for (u, v) in [(0, 4), (0, 1), (1, 2), (2, 3)] {
        f.link(u, v);
    }
    let before = tour(&f, 0);
    f.reroot(3);
    let after = tour(&f, 0);
    assert!(after.starts_with("v3"));
    // A rotation: same elements, same circular order.
    let doubled = format!("{before} {before}");
    assert!(doubled.contains(&after), "{after} is not a rotation of {before}");
    assert_groups(&f, &[&[0, 1, 2, 3, 4]]);
    f.reroot(3);
    assert_eq!(tour(&f, 0), after);
}

#[test]
fn cut_middle_edge_of_a_star() {
    let mut f = build(4);
    let e01 = f.link(0, 1);
    f.link(0, 2);
    f.link(0, 3);
    f.cut(e01);
    assert_groups(&f, &[&[0, 2, 3], &[1]]);
    assert_eq!(tour(&f, 1), "v1");
}

#[test]
fn component_folds() {
    let mut f = build(6);
    for i in 0..6 {
        assert_eq!(f.set_aug(i, Some(1 << i)), None);
    }
    f.link(0, 1);
    f.link(1, 2);
    f.link(3, 4);
    assert_eq!(f.component_aug(f.tour_root(0)), Some(&0b111));
    assert_eq!(f.component_aug(f.tour_root(3)), Some(&0b11000));
    assert_eq!(f.component_aug(f.tour_root(5)), Some(&0b100000));

    // Clearing a value removes it from the fold but keeps the others.
    assert_eq!(f.set_aug(1, None), Some(2));
    assert_eq!(f.component_aug(f.tour_root(0)), Some(&0b101));
    assert_eq!(f.set_aug(0, None), Some(1));
    assert_eq!(f.set_aug(2, None), Some(4));
    assert_eq!(f.component_aug(f.tour_root(0)), None);
    assert_eq!(f.aug_of(4), Some(&16));
}

#[test]
fn folds_follow_cuts() {
    let mut f = build(5);
    let mut edges = Vec::new();
    for i in 0..4 {
        edges.push(f.link(i, i + 1));
        f.set_aug(i, Some(10 + i as i64));
    }
    f.set_aug(4, Some(14));
    assert_eq!(f.component_aug(f.tour_root(2)), Some(&60));
    f.cut(edges[2]);
    assert_eq!(f.component_aug(f.tour_root(0)), Some(&33));
    assert_eq!(f.component_aug(f.tour_root(4)), Some(&27));
}

#[test]
fn spare_levels_are_reclaimed() {
    let mut f = build(1);
    let lower = f.ensure_lower(0);
    assert_eq!(f.ensure_lower(0), lower);
    assert!(f.try_release(f.tour_root(lower)));
    // The top vertex itself is never reclaimed this way.
    assert!(!f.try_release(f.tour_root(0)));
    // A linked lower level is not a bare singleton, so it stays.
    f.create_vertex(0);
    let l0 = f.ensure_lower(0);
    let l1 = f.ensure_lower(1);
    f.link(l0, l1);
    assert!(!f.try_release(f.tour_root(l0)));
}
