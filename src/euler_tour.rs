//! Euler-tour forests.
//!
//! Every spanning tree of one level is kept as a balanced tree whose
//! in-order sequence is the Euler tour of that tree. The tour alphabet has
//! one element per vertex plus two elements per tree edge (one for each
//! traversal direction), so a tour of `n` vertices holds `n + 2(n - 1)`
//! nodes and the vertex count of a tour of size `s` is `(s + 2) / 3`.
//!
//! All levels share one [`Rbt`] arena; tours are disjoint trees inside it.
//! The per-level state of a vertex is its [`EulerVertex`]: the unique tour
//! element, the links to the same vertex one level up and down, and the
//! heads of the two intrusive adjacency lists (non-tree edges and tree
//! edges owned at this level). List membership is mirrored into the tour
//! element as `has_graph`/`has_forest` and folded up, which is what lets
//! the level search find an incident edge anywhere in a tour in O(log n).

use std::fmt::{Debug, Formatter};

use derivative::Derivative;

use crate::rbtree::{Augment, Idx, Rbt, SearchDirection, NIL};

/// Null value for arena links (vertices, graph edges, tree edges).
pub const EMPTY: usize = usize::MAX;

fn slot_fmt(u: &usize, f: &mut Formatter) -> std::fmt::Result {
    if *u == EMPTY {
        write!(f, "∅")
    } else {
        write!(f, "{u}")
    }
}

fn slot2_fmt([u, v]: &[usize; 2], f: &mut Formatter) -> std::fmt::Result {
    write!(f, "[")?;
    slot_fmt(u, f)?;
    write!(f, ", ")?;
    slot_fmt(v, f)?;
    write!(f, "]")
}

/// Reusable-slot arena for the per-level records.
pub(crate) struct Arena<R> {
    slots: Vec<Option<R>>,
    free: Vec<usize>,
}

impl<R> Arena<R> {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
        }
    }

    pub fn insert(&mut self, record: R) -> usize {
        match self.free.pop() {
            Some(i) => {
                self.slots[i] = Some(record);
                i
            }
            None => {
                self.slots.push(Some(record));
                self.slots.len() - 1
            }
        }
    }

    pub fn remove(&mut self, i: usize) -> R {
        let r = self.slots[i].take().expect("double free in arena");
        self.free.push(i);
        r
    }

    pub fn len(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    pub fn clear(&mut self) {
        self.slots.clear();
        self.free.clear();
    }

    pub fn indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.as_ref().map(|_| i))
    }
}

impl<R> std::ops::Index<usize> for Arena<R> {
    type Output = R;
    fn index(&self, i: usize) -> &R {
        self.slots[i].as_ref().expect("dangling arena index")
    }
}

impl<R> std::ops::IndexMut<usize> for Arena<R> {
    fn index_mut(&mut self, i: usize) -> &mut R {
        self.slots[i].as_mut().expect("dangling arena index")
    }
}

impl<R: Debug> Debug for Arena<R> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        f.debug_map()
            .entries(self.indices().map(|i| (i, &self[i])))
            .finish()
    }
}

/// One tour element.
#[derive(Clone)]
pub enum Visit<T> {
    /// The unique element of a vertex at this level. The flags cache
    /// whether the vertex's adjacency lists are non-empty; `aug` is the
    /// user value (top level only).
    Vertex {
        etv: usize,
        has_graph: bool,
        has_forest: bool,
        aug: Option<T>,
    },
    /// One half of a tree-edge traversal.
    Edge { tree: usize },
}

impl<T> Default for Visit<T> {
    fn default() -> Self {
        Visit::Edge { tree: EMPTY }
    }
}

impl<T: Debug> Debug for Visit<T> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self {
            Visit::Vertex {
                etv,
                has_graph,
                has_forest,
                aug,
            } => {
                write!(f, "v{etv}")?;
                if *has_graph {
                    write!(f, "+g")?;
                }
                if *has_forest {
                    write!(f, "+f")?;
                }
                if let Some(a) = aug {
                    write!(f, "={a:?}")?;
                }
                Ok(())
            }
            Visit::Edge { tree } => write!(f, "e{tree}"),
        }
    }
}

/// The user combine closure. Applied in in-order; associativity is
/// assumed, commutativity is not.
pub type Combine<T> = Box<dyn Fn(&T, &T) -> T>;

/// Context threaded through every aggregate merge, standing in for the
/// per-node combine pointer of a subclassed tree.
pub struct TourCtx<T> {
    pub(crate) combine: Option<Combine<T>>,
}

/// Subtree summary of a tour: incident-edge flags plus the in-order fold
/// of the user values stored on vertex elements. Absent values are the
/// identity of the fold.
#[derive(Clone, Debug, PartialEq)]
pub struct TourAgg<T> {
    pub has_graph: bool,
    pub has_forest: bool,
    pub aug: Option<T>,
}

impl<T: Clone + Debug> Augment for TourAgg<T> {
    type Item = Visit<T>;
    type Ctx = TourCtx<T>;

    fn identity() -> Self {
        Self {
            has_graph: false,
            has_forest: false,
            aug: None,
        }
    }

    fn from_item(item: &Visit<T>) -> Self {
        match item {
            Visit::Vertex {
                has_graph,
                has_forest,
                aug,
                ..
            } => Self {
                has_graph: *has_graph,
                has_forest: *has_forest,
                aug: aug.clone(),
            },
            Visit::Edge { .. } => Self::identity(),
        }
    }

    fn merge(self, ctx: &TourCtx<T>, right: Self) -> Self {
        let aug = match (self.aug, right.aug) {
            (Some(a), Some(b)) => {
                let combine = ctx
                    .combine
                    .as_ref()
                    .expect("stored augmentations require a combine function");
                Some(combine(&a, &b))
            }
            (a, b) => a.or(b),
        };
        Self {
            has_graph: self.has_graph || right.has_graph,
            has_forest: self.has_forest || right.has_forest,
            aug,
        }
    }

    fn changed_from(&self, prev: &Self) -> bool {
        // Fold values are not comparable in general; treat any summary
        // that carries one as changed.
        self.has_graph != prev.has_graph
            || self.has_forest != prev.has_forest
            || self.aug.is_some()
            || prev.aug.is_some()
    }
}

/// Per-level representative of a vertex.
#[derive(Derivative)]
#[derivative(Debug)]
pub struct EulerVertex {
    pub(crate) depth: usize,
    #[derivative(Debug(format_with = "slot_fmt"))]
    pub(crate) higher: usize,
    #[derivative(Debug(format_with = "slot_fmt"))]
    pub(crate) lower: usize,
    pub(crate) visit: Idx,
    #[derivative(Debug(format_with = "slot_fmt"))]
    pub(crate) graph_head: usize,
    #[derivative(Debug(format_with = "slot_fmt"))]
    pub(crate) forest_head: usize,
}

/// One undirected edge, whichever levels it spans. The endpoint vertices
/// are always at the edge's own level; the edge sits in exactly one
/// adjacency list per endpoint: the forest lists when `tree` is set, the
/// graph lists otherwise.
#[derive(Derivative)]
#[derivative(Debug)]
pub struct GraphEdge {
    pub(crate) v: [usize; 2],
    #[derivative(Debug(format_with = "slot_fmt"))]
    pub(crate) tree: usize,
    #[derivative(Debug(format_with = "slot2_fmt"))]
    pub(crate) next: [usize; 2],
    #[derivative(Debug(format_with = "slot2_fmt"))]
    pub(crate) prev: [usize; 2],
}

/// Per-level record of a forest edge: its two tour elements and the same
/// edge one level up. The chain ends at the top; the deepest entry is the
/// one the [`GraphEdge`] points at.
#[derive(Derivative)]
#[derivative(Debug)]
pub struct TreeEdge {
    pub(crate) visit1: Idx,
    pub(crate) visit2: Idx,
    #[derivative(Debug(format_with = "slot_fmt"))]
    pub(crate) higher: usize,
}

pub struct TourForest<T: Clone + Debug> {
    pub(crate) rbt: Rbt<TourAgg<T>>,
    pub(crate) verts: Arena<EulerVertex>,
    pub(crate) tree_edges: Arena<TreeEdge>,
    pub(crate) graph_edges: Arena<GraphEdge>,
}

impl<T: Clone + Debug> TourForest<T> {
    pub fn new(combine: Option<Combine<T>>) -> Self {
        Self {
            rbt: Rbt::new(TourCtx { combine }),
            verts: Arena::new(),
            tree_edges: Arena::new(),
            graph_edges: Arena::new(),
        }
    }

    pub fn has_combine(&self) -> bool {
        self.rbt.ctx().combine.is_some()
    }

    pub fn clear(&mut self) {
        self.rbt.clear();
        self.verts.clear();
        self.tree_edges.clear();
        self.graph_edges.clear();
    }

    pub fn create_vertex(&mut self, depth: usize) -> usize {
        let etv = self.verts.insert(EulerVertex {
            depth,
            higher: EMPTY,
            lower: EMPTY,
            visit: NIL,
            graph_head: EMPTY,
            forest_head: EMPTY,
        });
        let visit = self.rbt.create(Visit::Vertex {
            etv,
            has_graph: false,
            has_forest: false,
            aug: None,
        });
        self.verts[etv].visit = visit;
        etv
    }

    /// Free a vertex whose tour is a bare singleton with no adjacency.
    pub fn free_vertex(&mut self, etv: usize) {
        let v = self.verts.remove(etv);
        debug_assert_eq!(v.graph_head, EMPTY);
        debug_assert_eq!(v.forest_head, EMPTY);
        debug_assert_eq!(self.rbt.size(v.visit), 1);
        self.rbt.release(v.visit);
    }

    /// Allocate the same vertex one level deeper if it is not there yet.
    pub fn ensure_lower(&mut self, etv: usize) -> usize {
        if self.verts[etv].lower != EMPTY {
            return self.verts[etv].lower;
        }
        let depth = self.verts[etv].depth + 1;
        let lower = self.create_vertex(depth);
        self.verts[lower].higher = etv;
        self.verts[etv].lower = lower;
        lower
    }

    pub fn tour_root(&self, etv: usize) -> Idx {
        self.rbt.root(self.verts[etv].visit)
    }

    pub fn connected(&self, a: usize, b: usize) -> bool {
        a == b || self.tour_root(a) == self.tour_root(b)
    }

    /// Vertices represented by the tour rooted at `root`.
    pub fn vertices_in(&self, root: Idx) -> usize {
        (self.rbt.size(root) + 2) / 3
    }

    fn side(&self, e: usize, etv: usize) -> usize {
        let s = (self.graph_edges[e].v[1] == etv) as usize;
        debug_assert_eq!(self.graph_edges[e].v[s], etv);
        s
    }

    fn head_of(&self, etv: usize, forest: bool) -> usize {
        if forest {
            self.verts[etv].forest_head
        } else {
            self.verts[etv].graph_head
        }
    }

    fn set_head(&mut self, etv: usize, forest: bool, e: usize) {
        if forest {
            self.verts[etv].forest_head = e;
        } else {
            self.verts[etv].graph_head = e;
        }
    }

    /// Re-cache the list flags on a vertex's tour element and fold them up.
    pub(crate) fn refresh(&mut self, etv: usize) {
        let v = &self.verts[etv];
        let (visit, hg, hf) = (v.visit, v.graph_head != EMPTY, v.forest_head != EMPTY);
        self.rbt.mutate_item(visit, |item| match item {
            Visit::Vertex {
                has_graph,
                has_forest,
                ..
            } => {
                *has_graph = hg;
                *has_forest = hf;
            }
            Visit::Edge { .. } => panic!("vertex {etv} points at an edge element"),
        });
    }

    fn link_into(&mut self, e: usize, forest: bool, quiet: bool) {
        for s in [0, 1] {
            let etv = self.graph_edges[e].v[s];
            let head = self.head_of(etv, forest);
            self.graph_edges[e].next[s] = head;
            self.graph_edges[e].prev[s] = EMPTY;
            if head != EMPTY {
                let hs = self.side(head, etv);
                self.graph_edges[head].prev[hs] = e;
            }
            self.set_head(etv, forest, e);
        }
        if !quiet {
            let [a, b] = self.graph_edges[e].v;
            self.refresh(a);
            self.refresh(b);
        }
    }

    fn unlink_from(&mut self, e: usize, forest: bool, quiet: bool) {
        for s in [0, 1] {
            let etv = self.graph_edges[e].v[s];
            let prev = self.graph_edges[e].prev[s];
            let next = self.graph_edges[e].next[s];
            if prev == EMPTY {
                debug_assert_eq!(self.head_of(etv, forest), e);
                self.set_head(etv, forest, next);
            } else {
                let ps = self.side(prev, etv);
                self.graph_edges[prev].next[ps] = next;
            }
            if next != EMPTY {
                let ns = self.side(next, etv);
                self.graph_edges[next].prev[ns] = prev;
            }
            self.graph_edges[e].prev[s] = EMPTY;
            self.graph_edges[e].next[s] = EMPTY;
        }
        if !quiet {
            let [a, b] = self.graph_edges[e].v;
            self.refresh(a);
            self.refresh(b);
        }
    }

    pub fn attach_graph(&mut self, e: usize) {
        debug_assert_eq!(self.graph_edges[e].tree, EMPTY);
        self.link_into(e, false, false);
    }

    pub fn detach_graph(&mut self, e: usize) {
        self.unlink_from(e, false, false);
    }

    pub fn attach_forest(&mut self, e: usize) {
        debug_assert_ne!(self.graph_edges[e].tree, EMPTY);
        self.link_into(e, true, false);
    }

    pub fn detach_forest(&mut self, e: usize) {
        self.unlink_from(e, true, false);
    }

    pub(crate) fn attach_quiet(&mut self, e: usize, forest: bool) {
        self.link_into(e, forest, true);
    }

    pub(crate) fn detach_quiet(&mut self, e: usize, forest: bool) {
        self.unlink_from(e, forest, true);
    }

    /// Rotate the tour of `etv`'s tree so it starts at `etv`'s element.
    pub fn reroot(&mut self, etv: usize) {
        let visit = self.verts[etv].visit;
        let (before, from) = self.rbt.split_before(visit);
        if before == NIL {
            return;
        }
        self.rbt.join2(from, before);
    }

    /// Add a forest edge between two vertices of distinct tours at the
    /// same level. Returns the new [`TreeEdge`].
    pub fn link(&mut self, a: usize, b: usize) -> usize {
        debug_assert_eq!(self.verts[a].depth, self.verts[b].depth);
        debug_assert!(!self.connected(a, b), "link inside one tree");
        let te = self.tree_edges.insert(TreeEdge {
            visit1: NIL,
            visit2: NIL,
            higher: EMPTY,
        });
        let e_ab = self.rbt.create(Visit::Edge { tree: te });
        let e_ba = self.rbt.create(Visit::Edge { tree: te });
        self.tree_edges[te].visit1 = e_ab;
        self.tree_edges[te].visit2 = e_ba;
        self.reroot(b);
        let tb = self.rbt.root(self.verts[b].visit);
        let (l, r) = self.rbt.split_after(self.verts[a].visit);
        let t = self.rbt.join(l, e_ab, tb);
        self.rbt.join(t, e_ba, r);
        log::trace!("link v{a} v{b} at depth {} -> t{te}", self.verts[a].depth);
        te
    }

    /// Remove a forest edge, splitting its tour in two. Returns the roots
    /// of the tours containing the two former endpoints.
    pub fn cut(&mut self, te: usize) -> (Idx, Idx) {
        let TreeEdge { visit1, visit2, .. } = self.tree_edges.remove(te);
        let (p, q) = if self.rbt.rank_cmp(visit1, visit2) == std::cmp::Ordering::Less {
            (visit1, visit2)
        } else {
            (visit2, visit1)
        };
        // The two traversal elements split the circular tour into the
        // subtree arc strictly between them and the outer arc.
        let (before, _) = self.rbt.split_before(p);
        let (inner, after) = self.rbt.split_after(q);
        debug_assert_ne!(inner, NIL);
        self.rbt.remove_no_root(p);
        let inner = self.rbt.remove(q);
        debug_assert_ne!(inner, NIL);
        self.rbt.release(p);
        self.rbt.release(q);
        let outer = self.rbt.join2(before, after);
        debug_assert_ne!(outer, NIL);
        log::trace!("cut t{te}");
        (outer, inner)
    }

    /// Some vertex of the tour with a non-empty non-tree adjacency list.
    pub fn graph_vertex(&self, root: Idx) -> Option<usize> {
        self.flagged_vertex(root, false)
    }

    /// Some vertex of the tour with a non-empty forest adjacency list.
    pub fn forest_vertex(&self, root: Idx) -> Option<usize> {
        self.flagged_vertex(root, true)
    }

    fn flagged_vertex(&self, root: Idx, forest: bool) -> Option<usize> {
        let flag_of = |agg: &TourAgg<T>| {
            if forest {
                agg.has_forest
            } else {
                agg.has_graph
            }
        };
        let found = self.rbt.find_element(root, |d| {
            let own = match d.item {
                Visit::Vertex {
                    has_graph,
                    has_forest,
                    ..
                } => {
                    if forest {
                        *has_forest
                    } else {
                        *has_graph
                    }
                }
                Visit::Edge { .. } => false,
            };
            if own {
                SearchDirection::Found
            } else if flag_of(d.left) {
                SearchDirection::Left
            } else if flag_of(d.right) {
                SearchDirection::Right
            } else {
                SearchDirection::NotFound
            }
        });
        if found == NIL {
            return None;
        }
        match self.rbt.item(found) {
            Visit::Vertex { etv, .. } => Some(*etv),
            Visit::Edge { .. } => panic!("flag search landed on an edge element"),
        }
    }

    /// Store (or clear) the user value on a vertex. Returns the previous
    /// value; the fold refreshes on the way up.
    pub fn set_aug(&mut self, etv: usize, value: Option<T>) -> Option<T> {
        let visit = self.verts[etv].visit;
        let mut prev = None;
        self.rbt.mutate_item(visit, |item| match item {
            Visit::Vertex { aug, .. } => prev = std::mem::replace(aug, value),
            Visit::Edge { .. } => panic!("vertex {etv} points at an edge element"),
        });
        prev
    }

    pub fn aug_of(&self, etv: usize) -> Option<&T> {
        match self.rbt.item(self.verts[etv].visit) {
            Visit::Vertex { aug, .. } => aug.as_ref(),
            Visit::Edge { .. } => panic!("vertex {etv} points at an edge element"),
        }
    }

    /// Fold of the user values over the whole tour.
    pub fn component_aug(&self, root: Idx) -> Option<&T> {
        self.rbt.agg(root).aug.as_ref()
    }

    /// Reclaim a non-top vertex whose tour shrank to a bare singleton.
    /// Severing the chain with live structure below would orphan it, so
    /// the vertex must also have no `lower` and no incident edges here.
    pub fn try_release(&mut self, root: Idx) -> bool {
        if self.rbt.size(root) != 1 {
            return false;
        }
        let etv = match self.rbt.item(root) {
            Visit::Vertex { etv, .. } => *etv,
            Visit::Edge { .. } => panic!("singleton tour holds an edge element"),
        };
        let v = &self.verts[etv];
        if v.depth == 0 || v.lower != EMPTY || v.graph_head != EMPTY || v.forest_head != EMPTY {
            return false;
        }
        let higher = v.higher;
        self.verts[higher].lower = EMPTY;
        self.free_vertex(etv);
        log::trace!("released spare level vertex {etv}");
        true
    }

    /// In-order elements of a tour, for tests and debugging.
    pub fn tour_items(&self, root: Idx) -> Vec<Visit<T>> {
        let mut items = Vec::with_capacity(self.rbt.size(root));
        if root == NIL {
            return items;
        }
        let mut u = self.rbt.first(root);
        while u != NIL {
            items.push(self.rbt.item(u).clone());
            u = self.rbt.next(u);
        }
        items
    }
}

impl<T: Clone + Debug> Debug for TourForest<T> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        f.debug_struct("TourForest")
            .field("vertices", &self.verts)
            .field("tree_edges", &self.tree_edges)
            .field("graph_edges", &self.graph_edges)
            .finish()
    }
}
