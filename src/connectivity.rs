//! The layered decremental-connectivity engine of Holm, de Lichtenberg
//! and Thorup.
//!
//! Levels are numbered by depth from the top: depth 0 is where every
//! vertex lives and where connectivity queries run; deeper levels hold
//! progressively smaller forests, with the forest at depth `d + 1` always
//! contained in the forest at depth `d`. An edge is owned by exactly one
//! depth (the depth of its endpoint vertices), and a tree edge also has a
//! [`TreeEdge`] entry at every shallower depth, chained through `higher`.
//!
//! A tree at depth `d` may span at most `2^(max_depth - d)` vertices,
//! where `max_depth` tracks `⌈log₂ V⌉` for the largest vertex count since
//! the last rebuild. Growing the graph only bumps the bound; every
//! existing vertex is already at the top, which is what makes the level
//! count lazy. When enough vertices disappear the shallow levels collapse
//! into the top and the deeper ones shift up.
//!
//! Deleting a tree edge cuts its whole chain and then hunts for a
//! replacement from the edge's own depth toward the top, amortizing the
//! O(log² n) bound by pushing every inspected edge one level deeper.

use std::fmt::Debug;

use crate::euler_tour::{Combine, GraphEdge, TourForest, Visit, EMPTY};
use crate::rbtree::Idx;

/// A rebuild runs once the vertex count falls this many powers of two
/// below the tracked maximum.
const REBUILD_SLACK: usize = 2;

fn ceil_log2(v: usize) -> usize {
    v.next_power_of_two().trailing_zeros() as usize
}

pub struct HdtForest<T: Clone + Debug> {
    pub(crate) tours: TourForest<T>,
    /// Allowed maximum depth: `⌈log₂ max-V-since-rebuild⌉`.
    max_log_v: usize,
    vertex_count: usize,
    components: usize,
}

impl<T: Clone + Debug> HdtForest<T> {
    pub fn new(combine: Option<Combine<T>>) -> Self {
        Self {
            tours: TourForest::new(combine),
            max_log_v: 0,
            vertex_count: 0,
            components: 0,
        }
    }

    pub fn has_combine(&self) -> bool {
        self.tours.has_combine()
    }

    pub fn components(&self) -> usize {
        self.components
    }

    pub fn vertex_count(&self) -> usize {
        self.vertex_count
    }

    pub fn edge_count(&self) -> usize {
        self.tours.graph_edges.len()
    }

    pub fn clear(&mut self) {
        self.tours.clear();
        self.max_log_v = 0;
        self.vertex_count = 0;
        self.components = 0;
    }

    /// Register a new vertex at the top level.
    pub fn create_vertex(&mut self) -> usize {
        let etv = self.tours.create_vertex(0);
        self.vertex_count += 1;
        self.components += 1;
        self.max_log_v = self.max_log_v.max(ceil_log2(self.vertex_count));
        etv
    }

    /// Remove a vertex that has no edges left. Frees its whole level
    /// chain (every level is a bare singleton by then) and may trigger a
    /// rebuild of the level structure.
    pub fn drop_vertex(&mut self, etv: usize) {
        let mut v = etv;
        while v != EMPTY {
            let lower = self.tours.verts[v].lower;
            self.tours.free_vertex(v);
            v = lower;
        }
        self.vertex_count -= 1;
        self.components -= 1;
        self.maybe_rebuild();
    }

    pub fn connected(&self, a: usize, b: usize) -> bool {
        self.tours.connected(a, b)
    }

    pub fn component_root(&self, etv: usize) -> Idx {
        self.tours.tour_root(etv)
    }

    pub fn component_size(&self, etv: usize) -> usize {
        self.tours.vertices_in(self.tours.tour_root(etv))
    }

    pub fn component_aug(&self, etv: usize) -> Option<&T> {
        self.tours.component_aug(self.tours.tour_root(etv))
    }

    pub fn set_aug(&mut self, etv: usize, value: Option<T>) -> Option<T> {
        self.tours.set_aug(etv, value)
    }

    pub fn aug_of(&self, etv: usize) -> Option<&T> {
        self.tours.aug_of(etv)
    }

    /// Insert the edge between two top-level vertices. It becomes a tree
    /// edge exactly when its endpoints were disconnected.
    pub fn add_edge(&mut self, a: usize, b: usize) -> usize {
        debug_assert_ne!(a, b);
        let e = self.tours.graph_edges.insert(GraphEdge {
            v: [a, b],
            tree: EMPTY,
            next: [EMPTY; 2],
            prev: [EMPTY; 2],
        });
        if self.tours.connected(a, b) {
            self.tours.attach_graph(e);
        } else {
            let te = self.tours.link(a, b);
            self.tours.graph_edges[e].tree = te;
            self.tours.attach_forest(e);
            self.components -= 1;
        }
        e
    }

    /// Delete an edge. A non-tree edge just leaves its lists; a tree edge
    /// is cut out of every level it spans, followed by the replacement
    /// search.
    pub fn remove_edge(&mut self, e: usize) {
        if self.tours.graph_edges[e].tree == EMPTY {
            self.tours.detach_graph(e);
            self.tours.graph_edges.remove(e);
            return;
        }
        self.tours.detach_forest(e);
        let ge = self.tours.graph_edges.remove(e);
        let own = self.tours.verts[ge.v[0]].depth;
        // Cut the chain bottom-up, keeping both sides of every level.
        let mut cuts = Vec::with_capacity(own + 1);
        let mut te = ge.tree;
        while te != EMPTY {
            let higher = self.tours.tree_edges[te].higher;
            cuts.push(self.tours.cut(te));
            te = higher;
        }
        debug_assert_eq!(cuts.len(), own + 1);
        for (i, (r1, r2)) in cuts.into_iter().enumerate() {
            let depth = own - i;
            if self.replace_at(depth, r1, r2) {
                return;
            }
        }
        self.components += 1;
    }

    /// Replacement search at one depth. `r1`/`r2` root the two tours the
    /// cut produced there. Returns whether a replacement edge was found
    /// (it is then already linked at every depth up to the top).
    fn replace_at(&mut self, depth: usize, r1: Idx, r2: Idx) -> bool {
        let (small, big) = if self.tours.rbt.size(r1) <= self.tours.rbt.size(r2) {
            (r1, r2)
        } else {
            (r2, r1)
        };
        // Sink the smaller side's own tree edges one level; its span then
        // exists one level deeper, which is what lets internal non-tree
        // edges sink without re-linking.
        while let Some(etv) = self.tours.forest_vertex(small) {
            let e = self.tours.verts[etv].forest_head;
            self.push_tree_edge(e);
        }
        while let Some(etv) = self.tours.graph_vertex(small) {
            let e = self.tours.verts[etv].graph_head;
            let [a, b] = self.tours.graph_edges[e].v;
            if self.tours.tour_root(a) != self.tours.tour_root(b) {
                log::trace!("replacement edge {e} found at depth {depth}");
                self.promote(e, depth);
                return true;
            }
            self.push_graph_edge(e);
        }
        self.tours.try_release(small);
        self.tours.try_release(big);
        false
    }

    /// Sink a tree edge one level: link the endpoints' lower vertices and
    /// grow the level chain at the bottom. The shallower entries stay, so
    /// the forest nesting is preserved.
    fn push_tree_edge(&mut self, e: usize) {
        self.tours.detach_forest(e);
        let [a, b] = self.tours.graph_edges[e].v;
        let la = self.tours.ensure_lower(a);
        let lb = self.tours.ensure_lower(b);
        debug_assert!(self.tours.verts[la].depth <= self.max_log_v);
        let te = self.tours.link(la, lb);
        let old = self.tours.graph_edges[e].tree;
        self.tours.tree_edges[te].higher = old;
        self.tours.graph_edges[e].tree = te;
        self.tours.graph_edges[e].v = [la, lb];
        self.tours.attach_forest(e);
    }

    /// Sink a non-tree edge one level. Never links: the endpoints are
    /// already connected below via the tree edges sunk before it.
    fn push_graph_edge(&mut self, e: usize) {
        self.tours.detach_graph(e);
        let [a, b] = self.tours.graph_edges[e].v;
        let la = self.tours.ensure_lower(a);
        let lb = self.tours.ensure_lower(b);
        debug_assert!(self.tours.verts[la].depth <= self.max_log_v);
        debug_assert!(self.tours.connected(la, lb));
        self.tours.graph_edges[e].v = [la, lb];
        self.tours.attach_graph(e);
    }

    /// Turn a non-tree edge into the tree edge reconnecting the two sides
    /// of a cut: linked at its own depth and every shallower one, chained
    /// bottom-up.
    fn promote(&mut self, e: usize, depth: usize) {
        self.tours.detach_graph(e);
        let [mut ua, mut ub] = self.tours.graph_edges[e].v;
        let mut below = EMPTY;
        for d in (0..=depth).rev() {
            let te = self.tours.link(ua, ub);
            if below == EMPTY {
                self.tours.graph_edges[e].tree = te;
            } else {
                self.tours.tree_edges[below].higher = te;
            }
            below = te;
            if d > 0 {
                ua = self.tours.verts[ua].higher;
                ub = self.tours.verts[ub].higher;
            }
        }
        self.tours.attach_forest(e);
    }

    fn top_of(&self, etv: usize) -> usize {
        let mut v = etv;
        while self.tours.verts[v].higher != EMPTY {
            v = self.tours.verts[v].higher;
        }
        v
    }

    fn maybe_rebuild(&mut self) {
        if self.vertex_count == 0 {
            self.max_log_v = 0;
            return;
        }
        let target = ceil_log2(self.vertex_count);
        if self.max_log_v > target && (self.vertex_count << REBUILD_SLACK) <= 1 << self.max_log_v {
            let k = self.max_log_v - target;
            self.rebuild(k);
            self.max_log_v = target;
        }
    }

    /// Fold depths `1..=k` into the top. The top tours are left exactly as
    /// they are, since they already span every component; the collapsed
    /// levels' tours are simply discarded, their edges retargeted at the
    /// top vertices and the level chains of deeper tree edges spliced.
    fn rebuild(&mut self, k: usize) {
        debug_assert!(k > 0);
        log::debug!(
            "rebuild: folding {k} levels into the top (V = {})",
            self.vertex_count
        );
        let edges: Vec<usize> = self.tours.graph_edges.indices().collect();
        for e in edges {
            let [a, b] = self.tours.graph_edges[e].v;
            let own = self.tours.verts[a].depth;
            if self.tours.graph_edges[e].tree == EMPTY {
                if (1..=k).contains(&own) {
                    self.tours.detach_quiet(e, false);
                    self.tours.graph_edges[e].v = [self.top_of(a), self.top_of(b)];
                    self.tours.attach_quiet(e, false);
                }
                continue;
            }
            // Walk the chain bottom-up. Entries at collapsed depths die
            // with their tours; the survivor just below the collapse zone
            // (if any) is re-chained onto the top entry.
            let mut top_entry = EMPTY;
            let mut below_zone = EMPTY;
            let mut te = self.tours.graph_edges[e].tree;
            for d in (0..=own).rev() {
                let higher = self.tours.tree_edges[te].higher;
                if d == 0 {
                    top_entry = te;
                } else if d <= k {
                    let dead = self.tours.tree_edges.remove(te);
                    self.tours.rbt.release_raw(dead.visit1);
                    self.tours.rbt.release_raw(dead.visit2);
                } else if d == k + 1 {
                    below_zone = te;
                }
                te = higher;
            }
            debug_assert_eq!(te, EMPTY);
            if below_zone != EMPTY {
                self.tours.tree_edges[below_zone].higher = top_entry;
            } else if own >= 1 {
                // The whole owned span collapsed: the edge now lives at
                // the top.
                self.tours.graph_edges[e].tree = top_entry;
                self.tours.detach_quiet(e, true);
                self.tours.graph_edges[e].v = [self.top_of(a), self.top_of(b)];
                self.tours.attach_quiet(e, true);
            }
        }
        // Vertices: survivors right below the zone reattach to their
        // tops, collapsed ones die, deeper ones shift up.
        let verts: Vec<usize> = self.tours.verts.indices().collect();
        let mut joins = Vec::new();
        for &v in &verts {
            if self.tours.verts[v].depth == k + 1 {
                joins.push((self.top_of(v), v));
            }
        }
        for &v in &verts {
            if self.tours.verts[v].depth == 0 {
                self.tours.verts[v].lower = EMPTY;
            }
        }
        for (top, survivor) in joins {
            self.tours.verts[top].lower = survivor;
            self.tours.verts[survivor].higher = top;
        }
        for &v in &verts {
            let d = self.tours.verts[v].depth;
            if (1..=k).contains(&d) {
                let dead = self.tours.verts.remove(v);
                self.tours.rbt.release_raw(dead.visit);
            } else if d > k {
                self.tours.verts[v].depth = d - k;
            }
        }
        let tops: Vec<usize> = self
            .tours
            .verts
            .indices()
            .filter(|&v| self.tours.verts[v].depth == 0)
            .collect();
        for v in tops {
            self.tours.refresh(v);
        }
    }

    /// Lossless maintenance: sink tree edges as deep as the level
    /// capacities allow, then move every non-tree edge to the deepest
    /// level where its endpoints still share a tour.
    pub fn optimize(&mut self) {
        let edges: Vec<usize> = self.tours.graph_edges.indices().collect();
        for &e in &edges {
            if self.tours.graph_edges[e].tree == EMPTY {
                continue;
            }
            loop {
                let [a, b] = self.tours.graph_edges[e].v;
                let d = self.tours.verts[a].depth;
                if d >= self.max_log_v {
                    break;
                }
                let cap = 1usize << (self.max_log_v - d - 1);
                let count = |t: &TourForest<T>, x: usize| {
                    let lower = t.verts[x].lower;
                    if lower == EMPTY {
                        1
                    } else {
                        t.vertices_in(t.tour_root(lower))
                    }
                };
                if count(&self.tours, a) + count(&self.tours, b) > cap {
                    break;
                }
                self.push_tree_edge(e);
            }
        }
        for &e in &edges {
            if self.tours.graph_edges[e].tree != EMPTY {
                continue;
            }
            let [a, b] = self.tours.graph_edges[e].v;
            let mut chain = vec![(a, b)];
            let (mut x, mut y) = (a, b);
            loop {
                let (lx, ly) = (self.tours.verts[x].lower, self.tours.verts[y].lower);
                if lx == EMPTY || ly == EMPTY {
                    break;
                }
                chain.push((lx, ly));
                (x, y) = (lx, ly);
            }
            // Connectivity is monotone along the chain: connected at some
            // depth implies connected at every shallower one.
            let (mut lo, mut hi) = (0usize, chain.len() - 1);
            while lo < hi {
                let mid = (lo + hi + 1) / 2;
                if self.tours.connected(chain[mid].0, chain[mid].1) {
                    lo = mid;
                } else {
                    hi = mid - 1;
                }
            }
            if lo > 0 {
                self.tours.detach_graph(e);
                self.tours.graph_edges[e].v = [chain[lo].0, chain[lo].1];
                self.tours.attach_graph(e);
            }
        }
        log::debug!("optimize: done over {} edges", self.tours.graph_edges.len());
    }

    /// Full structural audit, meant for debug builds and tests.
    pub fn check_invariants(&self)
    where
        T: PartialEq,
    {
        use std::collections::BTreeSet;
        let mut roots = BTreeSet::new();
        let mut tops = BTreeSet::new();
        for v in self.tours.verts.indices() {
            let rec = &self.tours.verts[v];
            if rec.higher == EMPTY {
                assert_eq!(rec.depth, 0, "vertex {v} has no higher link below the top");
                tops.insert(self.tours.tour_root(v));
            } else {
                assert_eq!(self.tours.verts[rec.higher].lower, v);
                assert_eq!(self.tours.verts[rec.higher].depth + 1, rec.depth);
            }
            if rec.lower != EMPTY {
                assert_eq!(self.tours.verts[rec.lower].higher, v);
            }
            assert!(rec.depth <= self.max_log_v, "vertex {v} below the bottom");
            match self.tours.rbt.item(rec.visit) {
                Visit::Vertex {
                    etv,
                    has_graph,
                    has_forest,
                    aug,
                } => {
                    assert_eq!(*etv, v, "tour element of {v} points elsewhere");
                    assert_eq!(*has_graph, rec.graph_head != EMPTY);
                    assert_eq!(*has_forest, rec.forest_head != EMPTY);
                    if rec.depth != 0 {
                        assert!(aug.is_none(), "augmentation below the top on {v}");
                    }
                }
                Visit::Edge { .. } => panic!("vertex {v} points at an edge element"),
            }
            for (head, forest) in [(rec.graph_head, false), (rec.forest_head, true)] {
                let mut e = head;
                let mut prev = EMPTY;
                while e != EMPTY {
                    let ge = &self.tours.graph_edges[e];
                    let s = (ge.v[1] == v) as usize;
                    assert_eq!(ge.v[s], v, "edge {e} listed on a non-endpoint");
                    assert_eq!(ge.prev[s], prev, "broken list around edge {e}");
                    assert_eq!(ge.tree != EMPTY, forest, "edge {e} in the wrong list");
                    assert_eq!(
                        self.tours.verts[ge.v[0]].depth,
                        self.tours.verts[ge.v[1]].depth
                    );
                    if !forest {
                        assert!(
                            self.tours.connected(ge.v[0], ge.v[1]),
                            "non-tree edge {e} spans two tours"
                        );
                    }
                    prev = e;
                    e = ge.next[s];
                }
            }
            roots.insert(self.tours.tour_root(v));
        }
        for root in roots {
            self.tours.rbt.validate(root);
            self.tours.rbt.validate_aggs(root);
            assert_eq!(self.tours.rbt.size(root) % 3, 1, "tour size is not 3n - 2");
        }
        for e in self.tours.graph_edges.indices() {
            let ge = &self.tours.graph_edges[e];
            if ge.tree == EMPTY {
                continue;
            }
            let own = self.tours.verts[ge.v[0]].depth;
            let mut n = 0;
            let mut te = ge.tree;
            while te != EMPTY {
                n += 1;
                te = self.tours.tree_edges[te].higher;
            }
            assert_eq!(n, own + 1, "edge {e} does not span every level to the top");
        }
        assert_eq!(tops.len(), self.components, "component counter out of sync");
    }
}

impl<T: Clone + Debug> Debug for HdtForest<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HdtForest")
            .field("vertices", &self.vertex_count)
            .field("edges", &self.tours.graph_edges.len())
            .field("components", &self.components)
            .field("max_log_v", &self.max_log_v)
            .field("tours", &self.tours)
            .finish()
    }
}
