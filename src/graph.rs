//! Public graph façade: vertex handles, the per-graph vertex map and the
//! operation surface over the level engine.

use std::collections::{HashMap, HashSet};
use std::fmt::{Debug, Formatter};
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use rand::Rng;

use crate::connectivity::HdtForest;
use crate::error::{GraphError, Result, MAX_VERTICES};
use crate::euler_tour::Combine;

/// An opaque vertex handle.
///
/// Equality is identity: two handles are the same vertex only when they
/// are clones of one another. The only intrinsic property is a uniformly
/// random fingerprint used as the hash, which is what the expected bounds
/// on the vertex map rest on. A handle may be used in any number of
/// graphs at once and holds no reference back to any of them.
#[derive(Clone)]
pub struct Vertex(Arc<VertexCore>);

struct VertexCore {
    fingerprint: u32,
}

impl Vertex {
    pub fn new() -> Self {
        Self::with_rng(&mut rand::thread_rng())
    }

    /// Fingerprint from a caller-supplied generator, for reproducible
    /// tests. Handles stay distinct even when fingerprints collide.
    pub fn with_rng(rng: &mut impl Rng) -> Self {
        Vertex(Arc::new(VertexCore {
            fingerprint: rng.gen(),
        }))
    }

    pub fn fingerprint(&self) -> u32 {
        self.0.fingerprint
    }
}

impl Default for Vertex {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for Vertex {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for Vertex {}

impl Hash for Vertex {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u32(self.0.fingerprint);
    }
}

impl Debug for Vertex {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Vertex({:08x})", self.0.fingerprint)
    }
}

/// A connected component as seen from one vertex: some member handle, the
/// fold of the stored augmentations and the vertex count.
#[derive(Clone, Debug, PartialEq)]
pub struct ComponentInfo<T> {
    pub vertex: Vertex,
    pub augmentation: Option<T>,
    pub size: usize,
}

struct VertexInfo {
    etv: usize,
    edges: HashMap<Vertex, usize>,
}

const SHRINK_FLOOR: usize = 8;

/// Hash maps never shrink on their own; rebuild the backing storage once
/// it is mostly holes so the space bound survives deletions.
fn shrink_map<K: Eq + Hash, V>(map: &mut HashMap<K, V>) {
    if map.capacity() > SHRINK_FLOOR && map.len() * 4 <= map.capacity() {
        map.shrink_to_fit();
    }
}

/// A fully-dynamic undirected graph answering connectivity queries.
///
/// Edge insertions and deletions cost O(log² n) amortized; connectivity
/// and component queries cost O(log n). Vertices come into existence when
/// first touched by an edge or an augmentation and disappear when both
/// are gone.
pub struct ConnGraph<T: Clone + Debug = ()> {
    forest: HdtForest<T>,
    verts: HashMap<Vertex, VertexInfo>,
    registry: bool,
}

impl ConnGraph<()> {
    /// A plain graph without vertex augmentation.
    pub fn new() -> Self {
        Self::build(None)
    }
}

impl Default for ConnGraph<()> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + Debug> ConnGraph<T> {
    /// A graph whose components fold the stored vertex values with
    /// `combine`. The fold is applied in in-order, so `combine` must be
    /// associative; it need not be commutative. Vertices without a stored
    /// value are skipped.
    pub fn with_augmentation(combine: impl Fn(&T, &T) -> T + 'static) -> Self {
        Self::build(Some(Box::new(combine)))
    }

    fn build(combine: Option<Combine<T>>) -> Self {
        Self {
            forest: HdtForest::new(combine),
            verts: HashMap::new(),
            registry: false,
        }
    }

    /// Enable [`ConnGraph::get_number_of_components`] and
    /// [`ConnGraph::get_all_components`].
    pub fn with_component_registry(mut self) -> Self {
        self.registry = true;
        self
    }

    fn check_augmented(&self) -> Result<()> {
        if self.forest.has_combine() {
            Ok(())
        } else {
            Err(GraphError::AugmentationDisabled)
        }
    }

    fn check_registry(&self) -> Result<()> {
        if self.registry {
            Ok(())
        } else {
            Err(GraphError::RegistryDisabled)
        }
    }

    fn ensure_vertex(&mut self, u: &Vertex) -> usize {
        if let Some(info) = self.verts.get(u) {
            return info.etv;
        }
        let etv = self.forest.create_vertex();
        self.verts.insert(
            u.clone(),
            VertexInfo {
                etv,
                edges: HashMap::new(),
            },
        );
        etv
    }

    /// Add the edge `{u, v}`. Returns whether it was absent; adding an
    /// existing edge is a no-op.
    pub fn add_edge(&mut self, u: &Vertex, v: &Vertex) -> Result<bool> {
        if u == v {
            return Err(GraphError::SelfLoop);
        }
        let new =
            (!self.verts.contains_key(u)) as usize + (!self.verts.contains_key(v)) as usize;
        if self.verts.len() + new > MAX_VERTICES {
            return Err(GraphError::TooManyVertices);
        }
        if let Some(info) = self.verts.get(u) {
            if info.edges.contains_key(v) {
                return Ok(false);
            }
        }
        let ue = self.ensure_vertex(u);
        let ve = self.ensure_vertex(v);
        let e = self.forest.add_edge(ue, ve);
        self.map_edge(u, v, e);
        self.map_edge(v, u, e);
        log::trace!("add_edge {u:?} {v:?} -> {e}");
        Ok(true)
    }

    /// Remove the edge `{u, v}`. Returns whether it was present.
    pub fn remove_edge(&mut self, u: &Vertex, v: &Vertex) -> Result<bool> {
        if u == v {
            return Err(GraphError::SelfLoop);
        }
        let Some(&e) = self.verts.get(u).and_then(|info| info.edges.get(v)) else {
            return Ok(false);
        };
        self.unmap_edge(u, v);
        self.unmap_edge(v, u);
        self.forest.remove_edge(e);
        self.drop_if_unused(u);
        self.drop_if_unused(v);
        log::trace!("remove_edge {u:?} {v:?}");
        Ok(true)
    }

    fn map_edge(&mut self, a: &Vertex, b: &Vertex, e: usize) {
        let info = self.verts.get_mut(a).expect("endpoint was just ensured");
        info.edges.insert(b.clone(), e);
    }

    fn unmap_edge(&mut self, a: &Vertex, b: &Vertex) {
        let info = self.verts.get_mut(a).expect("endpoint of a mapped edge");
        info.edges.remove(b);
        shrink_map(&mut info.edges);
    }

    fn drop_if_unused(&mut self, u: &Vertex) {
        let Some(info) = self.verts.get(u) else {
            return;
        };
        if !info.edges.is_empty() || self.forest.aug_of(info.etv).is_some() {
            return;
        }
        let etv = info.etv;
        self.verts.remove(u);
        self.forest.drop_vertex(etv);
        shrink_map(&mut self.verts);
    }

    /// Whether some path connects `u` and `v`. Reflexive.
    pub fn is_connected(&self, u: &Vertex, v: &Vertex) -> bool {
        if u == v {
            return true;
        }
        match (self.verts.get(u), self.verts.get(v)) {
            (Some(a), Some(b)) => self.forest.connected(a.etv, b.etv),
            _ => false,
        }
    }

    /// The direct neighbours of `u`; empty when `u` is unknown.
    pub fn adjacent_vertices(&self, u: &Vertex) -> Vec<Vertex> {
        self.verts
            .get(u)
            .map(|info| info.edges.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Store a value on `u`, creating the vertex if needed. Returns the
    /// value previously stored, if any.
    pub fn set_vertex_augmentation(&mut self, u: &Vertex, value: T) -> Result<Option<T>> {
        self.check_augmented()?;
        if !self.verts.contains_key(u) && self.verts.len() >= MAX_VERTICES {
            return Err(GraphError::TooManyVertices);
        }
        let etv = self.ensure_vertex(u);
        Ok(self.forest.set_aug(etv, Some(value)))
    }

    /// Clear the value stored on `u`, possibly dropping the vertex.
    pub fn remove_vertex_augmentation(&mut self, u: &Vertex) -> Result<Option<T>> {
        self.check_augmented()?;
        let Some(info) = self.verts.get(u) else {
            return Ok(None);
        };
        let prev = self.forest.set_aug(info.etv, None);
        self.drop_if_unused(u);
        Ok(prev)
    }

    pub fn get_vertex_augmentation(&self, u: &Vertex) -> Result<Option<T>> {
        self.check_augmented()?;
        Ok(self
            .verts
            .get(u)
            .and_then(|info| self.forest.aug_of(info.etv).cloned()))
    }

    pub fn vertex_has_augmentation(&self, u: &Vertex) -> Result<bool> {
        self.check_augmented()?;
        Ok(self
            .verts
            .get(u)
            .is_some_and(|info| self.forest.aug_of(info.etv).is_some()))
    }

    /// Whether any vertex of `u`'s component stores a value.
    pub fn component_has_augmentation(&self, u: &Vertex) -> bool {
        self.verts
            .get(u)
            .is_some_and(|info| self.forest.component_aug(info.etv).is_some())
    }

    /// The component of `u`: the queried handle, the fold of the stored
    /// values and the vertex count. An unknown handle is its own
    /// singleton component.
    pub fn get_component_info(&self, u: &Vertex) -> ComponentInfo<T> {
        match self.verts.get(u) {
            Some(info) => ComponentInfo {
                vertex: u.clone(),
                augmentation: self.forest.component_aug(info.etv).cloned(),
                size: self.forest.component_size(info.etv),
            },
            None => ComponentInfo {
                vertex: u.clone(),
                augmentation: None,
                size: 1,
            },
        }
    }

    /// Number of components of the known vertex set.
    pub fn get_number_of_components(&self) -> Result<usize> {
        self.check_registry()?;
        Ok(self.forest.components())
    }

    /// One [`ComponentInfo`] per component, with an arbitrary member as
    /// the representative.
    pub fn get_all_components(&self) -> Result<Vec<ComponentInfo<T>>> {
        self.check_registry()?;
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for (vertex, info) in &self.verts {
            let root = self.forest.component_root(info.etv);
            if seen.insert(root) {
                out.push(ComponentInfo {
                    vertex: vertex.clone(),
                    augmentation: self.forest.component_aug(info.etv).cloned(),
                    size: self.forest.component_size(info.etv),
                });
            }
        }
        Ok(out)
    }

    pub fn clear(&mut self) {
        self.forest.clear();
        self.verts = HashMap::new();
    }

    /// Reorganize the level structure without changing any answer: tree
    /// edges sink as deep as the capacities allow and non-tree edges move
    /// to the deepest level where their endpoints still share a tree.
    pub fn optimize(&mut self) {
        self.forest.optimize();
    }

    pub fn len_vertices(&self) -> usize {
        self.verts.len()
    }

    pub fn len_edges(&self) -> usize {
        self.forest.edge_count()
    }

    /// Cross-check the vertex map against the engine and audit every
    /// structural invariant. For debug builds and tests.
    pub fn check_invariants(&self)
    where
        T: PartialEq,
    {
        self.forest.check_invariants();
        let mut listed = 0;
        for (u, info) in &self.verts {
            for (v, &e) in &info.edges {
                let other = self.verts.get(v).expect("neighbour is a known vertex");
                assert_eq!(other.edges.get(u), Some(&e), "asymmetric adjacency");
                assert!(self.forest.connected(info.etv, other.etv));
            }
            listed += info.edges.len();
            if info.edges.is_empty() {
                assert!(
                    self.forest.aug_of(info.etv).is_some(),
                    "edgeless unaugmented vertex was kept"
                );
            }
        }
        assert_eq!(listed, 2 * self.forest.edge_count());
    }
}

impl<T: Clone + Debug> Debug for ConnGraph<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnGraph")
            .field("vertices", &self.verts.len())
            .field("edges", &self.forest.edge_count())
            .field("components", &self.forest.components())
            .finish()
    }
}
