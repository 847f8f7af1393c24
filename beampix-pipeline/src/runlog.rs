//! Run metadata from the beamline run log.
//!
//! Each data-taking campaign keeps an optional `runlog.json` in the data
//! directory, keyed by run number, listing the devices under test that were
//! installed behind the telescope for that run. The log is advisory: when it
//! is absent the run is converted with telescope and reference planes only.

use crate::Result;
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

/// One device under test installed for a run.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DutRecord {
    /// Device name as recorded at the beamline.
    pub name: String,
    /// Slot position behind the telescope, downstream counted from zero.
    pub position: usize,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct RunEntry {
    #[serde(default)]
    duts: Vec<DutRecord>,
}

/// A single data-taking run and its data directory.
#[derive(Debug, Clone)]
pub struct Run {
    number: u32,
    data_dir: PathBuf,
    duts: Vec<DutRecord>,
}

impl Run {
    /// Creates a run handle, reading its DUT records from `runlog.json` in
    /// the data directory when present.
    pub fn new(number: u32, data_dir: impl Into<PathBuf>) -> Result<Self> {
        let data_dir = data_dir.into();
        let duts = read_runlog(&data_dir, number)?;
        Ok(Self {
            number,
            data_dir,
            duts,
        })
    }

    /// Run number.
    #[must_use]
    pub fn number(&self) -> u32 {
        self.number
    }

    /// Data directory holding raw files, artifacts and the final store.
    #[must_use]
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Devices under test recorded for this run, in slot order.
    #[must_use]
    pub fn duts(&self) -> &[DutRecord] {
        &self.duts
    }
}

fn read_runlog(data_dir: &Path, number: u32) -> Result<Vec<DutRecord>> {
    let path = data_dir.join("runlog.json");
    if !path.exists() {
        warn!(path = %path.display(), "no run log found, assuming no DUTs");
        return Ok(Vec::new());
    }
    let text = fs::read_to_string(&path)?;
    let log: HashMap<String, RunEntry> = serde_json::from_str(&text)?;
    let mut duts = log
        .get(&number.to_string())
        .map(|entry| entry.duts.clone())
        .unwrap_or_default();
    duts.sort_by_key(|dut| dut.position);
    Ok(duts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_missing_runlog_yields_no_duts() {
        let dir = TempDir::new().unwrap();
        let run = Run::new(17, dir.path()).unwrap();
        assert_eq!(run.number(), 17);
        assert!(run.duts().is_empty());
    }

    #[test]
    fn test_duts_read_in_slot_order() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("runlog.json"),
            r#"{
                "102": {
                    "duts": [
                        {"name": "CMS-04", "position": 1},
                        {"name": "FE-I4", "position": 0}
                    ]
                }
            }"#,
        )
        .unwrap();
        let run = Run::new(102, dir.path()).unwrap();
        assert_eq!(run.duts().len(), 2);
        assert_eq!(run.duts()[0].name, "FE-I4");
        assert_eq!(run.duts()[1].name, "CMS-04");
    }

    #[test]
    fn test_run_absent_from_log_yields_no_duts() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("runlog.json"),
            r#"{"102": {"duts": [{"name": "FE-I4", "position": 0}]}}"#,
        )
        .unwrap();
        let run = Run::new(103, dir.path()).unwrap();
        assert!(run.duts().is_empty());
    }

    #[test]
    fn test_malformed_runlog_is_an_error() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("runlog.json"), "not json").unwrap();
        assert!(matches!(
            Run::new(1, dir.path()),
            Err(crate::Error::RunLog(_))
        ));
    }
}
