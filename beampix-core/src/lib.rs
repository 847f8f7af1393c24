//! beampix-core: Data model and clustering for beam-telescope pixel data.
//!
//! This crate provides the run/plane/hit/cluster types shared by the
//! conversion pipeline and the adjacency-agglomeration clusterer that
//! groups per-event pixel hits.
//!

pub mod cluster;
pub mod clustering;
pub mod error;
pub mod hit;
pub mod plane;

pub use cluster::Cluster;
pub use clustering::clusterise;
pub use error::{Error, Result};
pub use hit::{Hit, ADJACENCY_TOLERANCE};
pub use plane::{Plane, PlaneRole};
