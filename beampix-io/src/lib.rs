//! beampix-io: HDF5 artifact I/O for beampix.
//!
//! Readers for the intermediate trees the external toolchain produces (the
//! event tree from the raw converter, the matched tree from track matching)
//! and the writer that assembles the final structured store.
//!

mod error;
mod hdf5;
pub mod matched;
pub mod store;
pub mod tree;

pub use error::{Error, Result};
pub use matched::{InterceptTable, MatchedReader, PlaneHits, TrackTable};
pub use store::{StoreBuilder, StoreSummary};
pub use tree::EventTreeReader;
