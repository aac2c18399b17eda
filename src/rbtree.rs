//! Augmented order-statistic red-black trees over an index arena.
//!
//! All trees of one forest share a single arena. Slot 0 is the sentinel
//! leaf: black, size zero, aggregation identity. Real nodes point at it
//! instead of using options, so structural code never branches on `None`.
//! The sentinel's parent field is scratch space for the deletion fixup and
//! is reset before the operation returns; nothing else about the sentinel
//! may be read for correctness.
//!
//! Trees are identified by their root index; there is no root registry.
//! A node whose parent is [`NIL`] is a root (or detached). Freed slots are
//! recycled through a free list.

use std::cmp::Ordering;
use std::fmt::{Debug, Formatter};

use debug_tree::TreeBuilder;
use derivative::Derivative;

pub type Idx = usize;

/// The sentinel leaf. Also the "no tree" value.
pub const NIL: Idx = 0;

const LEFT: usize = 0;
const RIGHT: usize = 1;

/// Subtree summaries recomputed bottom-up.
///
/// `merge` is applied in in-order (`left ⊕ node ⊕ right`) and must be
/// associative; commutativity is not assumed. `Ctx` carries whatever the
/// merge needs at runtime (the user combine closure for tours, `()` for
/// plain aggregates) and is owned by the tree.
pub trait Augment: Debug + Clone + Sized {
    type Item: Debug + Default;
    type Ctx;

    fn identity() -> Self;
    fn from_item(item: &Self::Item) -> Self;
    fn merge(self, ctx: &Self::Ctx, right: Self) -> Self;
    /// Whether a refresh must continue past this node. May report a change
    /// that did not happen, never the reverse.
    fn changed_from(&self, prev: &Self) -> bool;
}

fn idx_fmt(u: &Idx, f: &mut Formatter) -> std::fmt::Result {
    if *u == NIL {
        write!(f, "∅")
    } else {
        write!(f, "{u}")
    }
}

fn idx2_fmt([u, v]: &[Idx; 2], f: &mut Formatter) -> std::fmt::Result {
    write!(f, "[")?;
    idx_fmt(u, f)?;
    write!(f, ", ")?;
    idx_fmt(v, f)?;
    write!(f, "]")
}

#[derive(Derivative)]
#[derivative(Debug)]
struct Node<A: Augment> {
    #[derivative(Debug(format_with = "idx_fmt"))]
    parent: Idx,
    #[derivative(Debug(format_with = "idx2_fmt"))]
    child: [Idx; 2],
    red: bool,
    #[derivative(Debug = "ignore")]
    size: usize,
    item: A::Item,
    #[derivative(Debug = "ignore")]
    agg: A,
}

pub struct Rbt<A: Augment> {
    nodes: Vec<Node<A>>,
    free: Vec<Idx>,
    ctx: A::Ctx,
}

#[derive(Debug)]
pub enum SearchDirection {
    Found,
    NotFound,
    Left,
    Right,
}

/// What a [`Rbt::find_element`] strategy sees at each node.
#[derive(Debug)]
pub struct SearchData<'a, A: Augment> {
    pub item: &'a A::Item,
    pub left: &'a A,
    pub right: &'a A,
}

impl<A: Augment> Rbt<A> {
    pub fn new(ctx: A::Ctx) -> Self {
        Self::with_capacity(ctx, 0)
    }

    pub fn with_capacity(ctx: A::Ctx, capacity: usize) -> Self {
        let mut nodes = Vec::with_capacity(capacity + 1);
        nodes.push(Node {
            parent: NIL,
            child: [NIL, NIL],
            red: false,
            size: 0,
            item: A::Item::default(),
            agg: A::identity(),
        });
        Self {
            nodes,
            free: Vec::new(),
            ctx,
        }
    }

    pub fn ctx(&self) -> &A::Ctx {
        &self.ctx
    }

    /// Nodes currently allocated (excluding the sentinel and free slots).
    pub fn len(&self) -> usize {
        self.nodes.len() - 1 - self.free.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every tree but keep the backing allocation.
    pub fn clear(&mut self) {
        self.nodes.truncate(1);
        self.free.clear();
    }

    /// Allocate a detached node. It is black, so on its own it already
    /// forms a valid single-node tree; insertion paths recolor it.
    pub fn create(&mut self, item: A::Item) -> Idx {
        let agg = A::from_item(&item);
        let node = Node {
            parent: NIL,
            child: [NIL, NIL],
            red: false,
            size: 1,
            item,
            agg,
        };
        match self.free.pop() {
            Some(u) => {
                self.nodes[u] = node;
                u
            }
            None => {
                self.nodes.push(node);
                self.nodes.len() - 1
            }
        }
    }

    /// Return a detached node's slot to the free list.
    pub fn release(&mut self, u: Idx) {
        debug_assert_ne!(u, NIL);
        debug_assert_eq!(self.nodes[u].parent, NIL);
        debug_assert_eq!(self.nodes[u].child, [NIL, NIL]);
        self.free.push(u);
    }

    /// Release a node without detaching it first. Only valid while the
    /// whole tree containing it is being discarded; the remaining nodes of
    /// that tree must never be walked again.
    pub fn release_raw(&mut self, u: Idx) {
        debug_assert_ne!(u, NIL);
        self.nodes[u].parent = NIL;
        self.nodes[u].child = [NIL, NIL];
        self.free.push(u);
    }

    pub fn item(&self, u: Idx) -> &A::Item {
        debug_assert_ne!(u, NIL);
        &self.nodes[u].item
    }

    pub fn agg(&self, u: Idx) -> &A {
        &self.nodes[u].agg
    }

    pub fn size(&self, u: Idx) -> usize {
        self.nodes[u].size
    }

    pub fn parent(&self, u: Idx) -> Idx {
        self.nodes[u].parent
    }

    pub fn is_root(&self, u: Idx) -> bool {
        u != NIL && self.nodes[u].parent == NIL
    }

    pub fn root(&self, mut u: Idx) -> Idx {
        debug_assert_ne!(u, NIL);
        while self.nodes[u].parent != NIL {
            u = self.nodes[u].parent;
        }
        u
    }

    /// Edit a node's intrinsic value, then refresh its ancestors.
    pub fn mutate_item(&mut self, u: Idx, f: impl FnOnce(&mut A::Item)) {
        debug_assert_ne!(u, NIL);
        f(&mut self.nodes[u].item);
        self.update_up(u);
    }

    fn recalc(&mut self, u: Idx) -> bool {
        debug_assert_ne!(u, NIL);
        let [l, r] = self.nodes[u].child;
        let size = self.nodes[l].size + self.nodes[r].size + 1;
        let agg = {
            let ctx = &self.ctx;
            self.nodes[l]
                .agg
                .clone()
                .merge(ctx, A::from_item(&self.nodes[u].item))
                .merge(ctx, self.nodes[r].agg.clone())
        };
        let changed = size != self.nodes[u].size || agg.changed_from(&self.nodes[u].agg);
        self.nodes[u].size = size;
        self.nodes[u].agg = agg;
        changed
    }

    /// Refresh summaries from `u` toward the root, stopping as soon as a
    /// node reports no change.
    pub fn update_up(&mut self, mut u: Idx) {
        while u != NIL && self.recalc(u) {
            u = self.nodes[u].parent;
        }
    }

    fn update_to_root(&mut self, mut u: Idx) {
        while u != NIL {
            self.recalc(u);
            u = self.nodes[u].parent;
        }
    }

    fn edge(&self, mut u: Idx, dir: usize) -> Idx {
        debug_assert_ne!(u, NIL);
        while self.nodes[u].child[dir] != NIL {
            u = self.nodes[u].child[dir];
        }
        u
    }

    /// In-order minimum of the tree containing `u`.
    pub fn first(&self, u: Idx) -> Idx {
        self.edge(self.root(u), LEFT)
    }

    /// In-order maximum of the tree containing `u`.
    pub fn last(&self, u: Idx) -> Idx {
        self.edge(self.root(u), RIGHT)
    }

    fn neighbor(&self, mut u: Idx, dir: usize) -> Idx {
        debug_assert_ne!(u, NIL);
        let c = self.nodes[u].child[dir];
        if c != NIL {
            return self.edge(c, dir ^ 1);
        }
        let mut p = self.nodes[u].parent;
        while p != NIL && self.nodes[p].child[dir] == u {
            u = p;
            p = self.nodes[p].parent;
        }
        p
    }

    /// In-order successor, [`NIL`] past the end.
    pub fn next(&self, u: Idx) -> Idx {
        self.neighbor(u, RIGHT)
    }

    /// In-order predecessor, [`NIL`] before the start.
    pub fn prev(&self, u: Idx) -> Idx {
        self.neighbor(u, LEFT)
    }

    /// K-th node (0-indexed) of the tree containing `u`.
    pub fn find_kth(&self, u: Idx, mut k: usize) -> Idx {
        let mut u = self.root(u);
        while u != NIL {
            let [l, r] = self.nodes[u].child;
            let sl = self.nodes[l].size;
            match k.cmp(&sl) {
                Ordering::Less => u = l,
                Ordering::Equal => return u,
                Ordering::Greater => {
                    k -= sl + 1;
                    u = r;
                }
            }
        }
        NIL
    }

    /// In-order position of `u` within its tree.
    pub fn rank(&self, mut u: Idx) -> usize {
        debug_assert_ne!(u, NIL);
        let mut k = self.nodes[self.nodes[u].child[LEFT]].size;
        let mut p = self.nodes[u].parent;
        while p != NIL {
            if self.nodes[p].child[RIGHT] == u {
                k += self.nodes[self.nodes[p].child[LEFT]].size + 1;
            }
            u = p;
            p = self.nodes[p].parent;
        }
        k
    }

    fn depth(&self, mut u: Idx) -> usize {
        let mut d = 0;
        while self.nodes[u].parent != NIL {
            u = self.nodes[u].parent;
            d += 1;
        }
        d
    }

    /// Walk both nodes to their meeting point. Returns the LCA plus the
    /// child direction each argument came from (2 when it is the LCA).
    fn meet(&self, u: Idx, v: Idx) -> (Idx, usize, usize) {
        debug_assert_ne!(u, NIL);
        debug_assert_ne!(v, NIL);
        let (mut a, mut b) = (u, v);
        let mut da = self.depth(a);
        let mut db = self.depth(b);
        let (mut a_dir, mut b_dir) = (2, 2);
        while da > db {
            let p = self.nodes[a].parent;
            a_dir = (self.nodes[p].child[RIGHT] == a) as usize;
            a = p;
            da -= 1;
        }
        while db > da {
            let p = self.nodes[b].parent;
            b_dir = (self.nodes[p].child[RIGHT] == b) as usize;
            b = p;
            db -= 1;
        }
        while a != b {
            let pa = self.nodes[a].parent;
            let pb = self.nodes[b].parent;
            a_dir = (self.nodes[pa].child[RIGHT] == a) as usize;
            b_dir = (self.nodes[pb].child[RIGHT] == b) as usize;
            a = pa;
            b = pb;
        }
        (a, a_dir, b_dir)
    }

    /// Lowest common ancestor of two nodes of the same tree.
    pub fn lca(&self, u: Idx, v: Idx) -> Idx {
        self.meet(u, v).0
    }

    /// Sign of the in-order positions of two nodes of the same tree.
    pub fn rank_cmp(&self, u: Idx, v: Idx) -> Ordering {
        if u == v {
            return Ordering::Equal;
        }
        let (_, a_dir, b_dir) = self.meet(u, v);
        match (a_dir, b_dir) {
            // u is the ancestor: v sits in one of its subtrees.
            (2, d) => {
                if d == LEFT {
                    Ordering::Greater
                } else {
                    Ordering::Less
                }
            }
            (d, 2) => {
                if d == LEFT {
                    Ordering::Less
                } else {
                    Ordering::Greater
                }
            }
            (a, b) => a.cmp(&b),
        }
    }

    /// Guided descent from the root of `u`'s tree. The strategy sees the
    /// node's item and both child summaries and steers the walk.
    pub fn find_element(
        &self,
        u: Idx,
        mut strategy: impl FnMut(SearchData<'_, A>) -> SearchDirection,
    ) -> Idx {
        if u == NIL {
            return NIL;
        }
        let mut u = self.root(u);
        while u != NIL {
            let [l, r] = self.nodes[u].child;
            match strategy(SearchData {
                item: &self.nodes[u].item,
                left: &self.nodes[l].agg,
                right: &self.nodes[r].agg,
            }) {
                SearchDirection::Found => return u,
                SearchDirection::NotFound => return NIL,
                SearchDirection::Left => u = l,
                SearchDirection::Right => u = r,
            }
        }
        NIL
    }

    /// Rotate `u` down in direction `dir`; its `dir ^ 1` child rises.
    /// Only the two rotated nodes need refreshing.
    fn rotate(&mut self, u: Idx, dir: usize) {
        let v = self.nodes[u].child[dir ^ 1];
        debug_assert_ne!(v, NIL);
        let w = self.nodes[v].child[dir];
        self.nodes[u].child[dir ^ 1] = w;
        if w != NIL {
            self.nodes[w].parent = u;
        }
        let p = self.nodes[u].parent;
        self.nodes[v].parent = p;
        if p != NIL {
            let pdir = (self.nodes[p].child[RIGHT] == u) as usize;
            self.nodes[p].child[pdir] = v;
        }
        self.nodes[v].child[dir] = u;
        self.nodes[u].parent = v;
        self.recalc(u);
        self.recalc(v);
    }

    fn insert_fixup(&mut self, mut z: Idx) {
        loop {
            let p = self.nodes[z].parent;
            if !self.nodes[p].red {
                break;
            }
            // A red parent is never the root, so the grandparent is real.
            let g = self.nodes[p].parent;
            let dir = (self.nodes[g].child[RIGHT] == p) as usize;
            let uncle = self.nodes[g].child[dir ^ 1];
            if self.nodes[uncle].red {
                self.nodes[p].red = false;
                self.nodes[uncle].red = false;
                self.nodes[g].red = true;
                z = g;
            } else {
                if self.nodes[p].child[dir ^ 1] == z {
                    z = p;
                    self.rotate(z, dir);
                }
                let p = self.nodes[z].parent;
                let g = self.nodes[p].parent;
                self.nodes[p].red = false;
                self.nodes[g].red = true;
                self.rotate(g, dir ^ 1);
            }
        }
        let r = self.root(z);
        self.nodes[r].red = false;
    }

    /// Insert a detached node into the tree rooted at `root` (may be
    /// [`NIL`]) by a strict ordering on items. Returns the new root.
    pub fn insert_by(
        &mut self,
        root: Idx,
        u: Idx,
        mut less: impl FnMut(&A::Item, &A::Item) -> bool,
    ) -> Idx {
        debug_assert!(self.nodes[u].parent == NIL && self.nodes[u].child == [NIL, NIL]);
        if root == NIL {
            self.nodes[u].red = false;
            self.recalc(u);
            return u;
        }
        debug_assert!(self.is_root(root));
        let mut p = root;
        loop {
            let dir = if less(&self.nodes[u].item, &self.nodes[p].item) {
                LEFT
            } else {
                RIGHT
            };
            let c = self.nodes[p].child[dir];
            if c == NIL {
                self.nodes[p].child[dir] = u;
                self.nodes[u].parent = p;
                break;
            }
            p = c;
        }
        self.nodes[u].red = true;
        self.recalc(u);
        self.update_to_root(p);
        self.insert_fixup(u);
        self.root(u)
    }

    fn transplant(&mut self, u: Idx, v: Idx) {
        let p = self.nodes[u].parent;
        // The sentinel's parent is scratch for the deletion fixup.
        self.nodes[v].parent = p;
        if p != NIL {
            let dir = (self.nodes[p].child[RIGHT] == u) as usize;
            self.nodes[p].child[dir] = v;
        }
    }

    /// Unlink `z` from its tree. `z` is left detached, its slot still
    /// allocated; external references to every other node stay valid
    /// because the successor is moved by pointer surgery, not by copying
    /// items between slots. Returns the new root ([`NIL`] when the tree
    /// became empty).
    pub fn remove(&mut self, z: Idx) -> Idx {
        let anchor = self.remove_inner(z);
        if anchor == NIL {
            NIL
        } else {
            self.root(anchor)
        }
    }

    /// [`Rbt::remove`] without the final walk to the root, for callers
    /// that do not need it.
    pub fn remove_no_root(&mut self, z: Idx) {
        self.remove_inner(z);
    }

    /// Returns a node of the remaining tree, [`NIL`] when it is empty.
    fn remove_inner(&mut self, z: Idx) -> Idx {
        debug_assert_ne!(z, NIL);
        let [zl, zr] = self.nodes[z].child;
        let mut y_red = self.nodes[z].red;
        let x;
        // Deepest position whose subtree summaries changed.
        let fix;
        if zl == NIL {
            x = zr;
            self.transplant(z, x);
            fix = self.nodes[x].parent;
        } else if zr == NIL {
            x = zl;
            self.transplant(z, x);
            fix = self.nodes[x].parent;
        } else {
            let y = self.edge(zr, LEFT);
            y_red = self.nodes[y].red;
            x = self.nodes[y].child[RIGHT];
            if self.nodes[y].parent == z {
                self.nodes[x].parent = y;
                fix = y;
            } else {
                fix = self.nodes[y].parent;
                self.transplant(y, x);
                self.nodes[y].child[RIGHT] = zr;
                self.nodes[zr].parent = y;
            }
            self.transplant(z, y);
            self.nodes[y].child[LEFT] = zl;
            self.nodes[zl].parent = y;
            self.nodes[y].red = self.nodes[z].red;
        }
        self.nodes[z].parent = NIL;
        self.nodes[z].child = [NIL, NIL];
        self.update_to_root(fix);
        if !y_red {
            self.remove_fixup(x);
        }
        self.nodes[NIL].parent = NIL;
        if fix != NIL {
            fix
        } else {
            x
        }
    }

    fn remove_fixup(&mut self, mut x: Idx) {
        while self.nodes[x].parent != NIL && !self.nodes[x].red {
            let p = self.nodes[x].parent;
            let dir = (self.nodes[p].child[RIGHT] == x) as usize;
            let mut w = self.nodes[p].child[dir ^ 1];
            if self.nodes[w].red {
                self.nodes[w].red = false;
                self.nodes[p].red = true;
                self.rotate(p, dir);
                w = self.nodes[p].child[dir ^ 1];
            }
            let near = self.nodes[w].child[dir];
            let far = self.nodes[w].child[dir ^ 1];
            if !self.nodes[near].red && !self.nodes[far].red {
                self.nodes[w].red = true;
                x = p;
            } else {
                if !self.nodes[far].red {
                    self.nodes[near].red = false;
                    self.nodes[w].red = true;
                    self.rotate(w, dir ^ 1);
                    w = self.nodes[p].child[dir ^ 1];
                }
                let far = self.nodes[w].child[dir ^ 1];
                self.nodes[w].red = self.nodes[p].red;
                self.nodes[p].red = false;
                self.nodes[far].red = false;
                self.rotate(p, dir);
                x = self.root(p);
                break;
            }
        }
        self.nodes[x].red = false;
    }

    /// Black nodes on the leftmost path, the sentinel excluded.
    fn black_height(&self, mut u: Idx) -> usize {
        let mut h = 0;
        while u != NIL {
            if !self.nodes[u].red {
                h += 1;
            }
            u = self.nodes[u].child[LEFT];
        }
        h
    }

    /// Join `left ⋅ pivot ⋅ right` into one tree; `pivot` is a detached
    /// node, `left`/`right` are roots or [`NIL`]. The pivot is spliced red
    /// at the boundary spine of the taller tree at the shorter tree's
    /// black height, then the insertion fixup restores the invariants.
    /// Returns the new root.
    pub fn join(&mut self, left: Idx, pivot: Idx, right: Idx) -> Idx {
        debug_assert_ne!(pivot, NIL);
        debug_assert!(self.nodes[pivot].parent == NIL && self.nodes[pivot].child == [NIL, NIL]);
        // Detached subtree roots may be red; blacken them so the splice
        // below only ever creates one red-red violation, at the pivot.
        if left != NIL {
            debug_assert!(self.is_root(left));
            self.nodes[left].red = false;
        }
        if right != NIL {
            debug_assert!(self.is_root(right));
            self.nodes[right].red = false;
        }
        if left == NIL && right == NIL {
            self.nodes[pivot].red = false;
            self.recalc(pivot);
            return pivot;
        }
        if left == NIL {
            let f = self.edge(right, LEFT);
            self.nodes[f].child[LEFT] = pivot;
            self.nodes[pivot].parent = f;
            self.nodes[pivot].red = true;
            self.recalc(pivot);
            self.update_to_root(f);
            self.insert_fixup(pivot);
            return self.root(pivot);
        }
        if right == NIL {
            let f = self.edge(left, RIGHT);
            self.nodes[f].child[RIGHT] = pivot;
            self.nodes[pivot].parent = f;
            self.nodes[pivot].red = true;
            self.recalc(pivot);
            self.update_to_root(f);
            self.insert_fixup(pivot);
            return self.root(pivot);
        }
        let hl = self.black_height(left);
        let hr = self.black_height(right);
        let (spine_root, spine_dir, target) = if hl >= hr {
            (left, RIGHT, hr)
        } else {
            (right, LEFT, hl)
        };
        let mut x = spine_root;
        let mut h = self.black_height(spine_root);
        while h > target || self.nodes[x].red {
            if !self.nodes[x].red {
                h -= 1;
            }
            x = self.nodes[x].child[spine_dir];
        }
        let p = self.nodes[x].parent;
        let (cl, cr) = if spine_dir == RIGHT {
            (x, right)
        } else {
            (left, x)
        };
        self.nodes[pivot].child = [cl, cr];
        self.nodes[cl].parent = pivot;
        self.nodes[cr].parent = pivot;
        self.nodes[pivot].parent = p;
        self.nodes[pivot].red = true;
        if p != NIL {
            self.nodes[p].child[spine_dir] = pivot;
        }
        self.recalc(pivot);
        self.update_to_root(p);
        self.insert_fixup(pivot);
        self.root(pivot)
    }

    /// Join two trees without a pivot: the last node of `left` is unlinked
    /// and re-threaded as the pivot.
    pub fn join2(&mut self, left: Idx, right: Idx) -> Idx {
        if left == NIL {
            return right;
        }
        if right == NIL {
            return left;
        }
        let m = self.edge(left, RIGHT);
        let l = self.remove(m);
        self.join(l, m, right)
    }

    fn take_child(&mut self, u: Idx, dir: usize) -> Idx {
        let c = self.nodes[u].child[dir];
        self.nodes[u].child[dir] = NIL;
        if c != NIL {
            self.nodes[c].parent = NIL;
        }
        c
    }

    fn split_at(&mut self, at: Idx, at_to_left: bool) -> (Idx, Idx) {
        debug_assert_ne!(at, NIL);
        let mut l = self.take_child(at, LEFT);
        let mut r = self.take_child(at, RIGHT);
        let mut p = self.nodes[at].parent;
        self.nodes[at].parent = NIL;
        // Which side of its parent the node just processed hung from.
        let mut from_dir = LEFT;
        if p != NIL {
            from_dir = (self.nodes[p].child[RIGHT] == at) as usize;
            self.nodes[p].child[from_dir] = NIL;
        }
        if at_to_left {
            l = self.join(l, at, NIL);
        } else {
            r = self.join(NIL, at, r);
        }
        // Climb the path, folding each detached ancestor and its outer
        // subtree onto the accumulator of its side. The ancestor itself is
        // the concat pivot: the most recent place the descent from the
        // root would have turned the other way.
        while p != NIL {
            let gp = self.nodes[p].parent;
            self.nodes[p].parent = NIL;
            let next_dir = if gp != NIL {
                let dir = (self.nodes[gp].child[RIGHT] == p) as usize;
                self.nodes[gp].child[dir] = NIL;
                dir
            } else {
                LEFT
            };
            if from_dir == RIGHT {
                // `at` lay in p's right subtree: p and its left subtree
                // precede everything gathered so far on the left side.
                let pl = self.take_child(p, LEFT);
                l = self.join(pl, p, l);
            } else {
                let pr = self.take_child(p, RIGHT);
                r = self.join(r, p, pr);
            }
            p = gp;
            from_dir = next_dir;
        }
        (l, r)
    }

    /// Split the tree containing `at` into the nodes strictly before `at`
    /// and the nodes from `at` onward.
    pub fn split_before(&mut self, at: Idx) -> (Idx, Idx) {
        self.split_at(at, false)
    }

    /// Split the tree containing `at` into the nodes up to and including
    /// `at` and the nodes after it.
    pub fn split_after(&mut self, at: Idx) -> (Idx, Idx) {
        self.split_at(at, true)
    }

    /// Structural audit: colors, black heights, parent links, sizes.
    /// Intended for debug builds and tests; panics on the first violation.
    pub fn validate(&self, root: Idx) {
        if root == NIL {
            return;
        }
        assert!(self.is_root(root), "validate: {root} is not a root");
        assert!(!self.nodes[root].red, "root {root} is red");
        self.validate_rec(root);
    }

    fn validate_rec(&self, u: Idx) -> usize {
        if u == NIL {
            return 0;
        }
        let [l, r] = self.nodes[u].child;
        if self.nodes[u].red {
            assert!(
                !self.nodes[l].red && !self.nodes[r].red,
                "red node {u} has a red child"
            );
        }
        for c in [l, r] {
            if c != NIL {
                assert_eq!(self.nodes[c].parent, u, "parent link of {c} disagrees");
            }
        }
        assert_eq!(
            self.nodes[u].size,
            self.nodes[l].size + self.nodes[r].size + 1,
            "size of {u} is stale"
        );
        let hl = self.validate_rec(l);
        let hr = self.validate_rec(r);
        assert_eq!(hl, hr, "black height mismatch under {u}");
        hl + (!self.nodes[u].red) as usize
    }

    /// Recompute every summary in the subtree and compare with the stored
    /// ones. Separate from [`Rbt::validate`] because it needs equality on
    /// the aggregate.
    pub fn validate_aggs(&self, u: Idx)
    where
        A: PartialEq,
    {
        if u == NIL {
            return;
        }
        let [l, r] = self.nodes[u].child;
        self.validate_aggs(l);
        self.validate_aggs(r);
        let agg = self.nodes[l]
            .agg
            .clone()
            .merge(&self.ctx, A::from_item(&self.nodes[u].item))
            .merge(&self.ctx, self.nodes[r].agg.clone());
        assert!(agg == self.nodes[u].agg, "aggregate of {u} is stale");
    }

    /// Check that `less` holds along the in-order sequence of the subtree.
    pub fn validate_order(&self, root: Idx, mut less: impl FnMut(&A::Item, &A::Item) -> bool) {
        if root == NIL {
            return;
        }
        let mut u = self.edge(root, LEFT);
        let mut v = self.next(u);
        while v != NIL {
            assert!(
                less(&self.nodes[u].item, &self.nodes[v].item),
                "order violated between {u} and {v}"
            );
            u = v;
            v = self.next(v);
        }
    }

    fn tree_dbg(&self, u: Idx, tree: &mut TreeBuilder) {
        let _b = tree.add_branch(&format!("{u}: {:?}", self.nodes[u]));
        let [l, r] = self.nodes[u].child;
        if [l, r] == [NIL, NIL] {
            return;
        }
        for c in [l, r] {
            if c != NIL {
                self.tree_dbg(c, tree);
            } else {
                tree.add_leaf("∅");
            }
        }
    }
}

impl<A: Augment> Debug for Rbt<A> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        let free: std::collections::BTreeSet<Idx> = self.free.iter().copied().collect();
        let mut builder = TreeBuilder::new();
        let _b = builder.add_branch("Rbt");
        for u in 1..self.nodes.len() {
            if self.nodes[u].parent == NIL && !free.contains(&u) {
                self.tree_dbg(u, &mut builder);
            }
        }
        writeln!(f, "{}", builder.string())
    }
}
