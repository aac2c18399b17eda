//! Fully-dynamic undirected graph connectivity.
//!
//! This crate maintains a graph under arbitrary interleavings of edge
//! insertions and deletions and answers, at any moment, whether two
//! vertices are connected, using the algorithm of Holm, de Lichtenberg and
//! Thorup over Euler-tour forests. Insertions and deletions take
//! O(log² n) amortized time, connectivity and component queries O(log n).
//! Each vertex may additionally carry a user value; the fold of those
//! values over any connected component is maintained and queried in
//! O(log n).
//!
//! ## Usage
//!
//! Create a [`ConnGraph`] and address vertices through [`Vertex`]
//! handles:
//!
//! ```
//! use dynconn::{ConnGraph, Vertex};
//!
//! let mut g = ConnGraph::new();
//! let (a, b, c) = (Vertex::new(), Vertex::new(), Vertex::new());
//! g.add_edge(&a, &b).unwrap();
//! g.add_edge(&b, &c).unwrap();
//! assert!(g.is_connected(&a, &c));
//! g.remove_edge(&a, &b).unwrap();
//! assert!(!g.is_connected(&a, &c));
//! assert!(g.is_connected(&b, &c));
//! ```
//!
//! Component folds use a caller-supplied combine function:
//!
//! ```
//! use dynconn::{ConnGraph, Vertex};
//!
//! let mut g = ConnGraph::with_augmentation(|a: &i64, b: &i64| a + b);
//! let (a, b) = (Vertex::new(), Vertex::new());
//! g.set_vertex_augmentation(&a, 2).unwrap();
//! g.set_vertex_augmentation(&b, 3).unwrap();
//! g.add_edge(&a, &b).unwrap();
//! assert_eq!(g.get_component_info(&a).augmentation, Some(5));
//! ```
//!
//! ## Implementation
//!
//! The structure is a stack of three layers, each usable on its own:
//!
//! - [`rbtree`]: augmented red-black trees over an index arena, with
//!   join/split by black height and an early-exit upward refresh.
//! - [`euler_tour`]: Euler tours of the spanning forests kept as balanced
//!   trees, with per-vertex adjacency lists mirrored into the tours.
//! - [`connectivity`]: the level hierarchy, where each deleted tree edge hunts
//!   for a replacement while pushing inspected edges one level deeper,
//!   which is where the amortized bound comes from.
//!
//! ## Testing
//!
//! Run `cargo test`; add `-- --ignored` for the endless randomized stress
//! test, and `cargo bench` for the criterion benchmarks.

pub mod connectivity;
pub mod error;
pub mod euler_tour;
pub mod graph;
pub mod rbtree;

pub use error::{GraphError, Result, MAX_VERTICES};
pub use graph::{ComponentInfo, ConnGraph, Vertex};
