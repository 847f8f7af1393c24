//! # beampix-pipeline
//!
//! The resumable conversion chain that turns a raw beam-telescope run into
//! an analysis-ready HDF5 store. Artifacts on disk act as checkpoints: each
//! stage produces one file, a present file means a completed stage, and a
//! crashed stage leaves nothing behind. The external EUDAQ converter and the
//! tracking toolkit do the heavy lifting; this crate sequences them and
//! assembles the final store in-process.

pub mod config;
pub mod converter;
mod error;
pub mod external;
pub mod pipeline;
pub mod runlog;
pub mod stages;

pub use config::Config;
pub use converter::{Converter, RunPaths, StageStatus};
pub use error::{Error, Result};
pub use pipeline::{Pipeline, RunOptions, RunSummary};
pub use runlog::{DutRecord, Run};
pub use stages::{Stage, StageAction};
