//! Event-tree reader.
//!
//! The raw converter writes one HDF5 event tree per run. Store assembly
//! consumes two things from it: the free-running event timestamps and the
//! per-event trigger metadata of the planes past the telescope.

use crate::hdf5::{read_vec, read_vec_opt};
use crate::Result;
use hdf5::File;
use std::path::Path;

/// Read access to one event tree.
pub struct EventTreeReader {
    file: File,
}

impl EventTreeReader {
    /// Opens an event tree.
    ///
    /// # Errors
    /// Returns an error when the file cannot be opened as HDF5.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self {
            file: File::open(path)?,
        })
    }

    /// Free-running event timestamps in ns, when the tree carries them.
    ///
    /// # Errors
    /// Returns an error when the dataset exists but cannot be read.
    pub fn timestamps(&self) -> Result<Option<Vec<u64>>> {
        let Ok(group) = self.file.group("Event") else {
            return Ok(None);
        };
        read_vec_opt::<u64>(&group, "TimeStamp")
    }

    /// Per-event trigger datasets of one plane, `Trigger` prefix stripped,
    /// in name order.
    ///
    /// A plane without a `Hits` group, or without trigger datasets, yields
    /// an empty list.
    ///
    /// # Errors
    /// Returns an error when a trigger dataset cannot be read.
    pub fn trigger_columns(&self, plane: usize) -> Result<Vec<(String, Vec<u8>)>> {
        let Ok(group) = self.file.group(&format!("Plane{plane}")) else {
            return Ok(Vec::new());
        };
        let Ok(hits) = group.group("Hits") else {
            return Ok(Vec::new());
        };

        let mut names: Vec<String> = hits
            .member_names()?
            .into_iter()
            .filter(|name| name.starts_with("Trigger"))
            .collect();
        names.sort_unstable();

        let mut columns = Vec::with_capacity(names.len());
        for name in names {
            let data = read_vec::<u8>(&hits, &name)?;
            let column = match name.strip_prefix("Trigger") {
                Some(rest) if !rest.is_empty() => rest.to_string(),
                _ => name,
            };
            columns.push((column, data));
        }
        Ok(columns)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hdf5::write_vec;
    use tempfile::NamedTempFile;

    #[test]
    fn test_timestamps_absent() {
        let tmp = NamedTempFile::new().unwrap();
        File::create(tmp.path()).unwrap();

        let reader = EventTreeReader::open(tmp.path()).unwrap();
        assert!(reader.timestamps().unwrap().is_none());
    }

    #[test]
    fn test_timestamps_present() {
        let tmp = NamedTempFile::new().unwrap();
        let file = File::create(tmp.path()).unwrap();
        let event = file.create_group("Event").unwrap();
        write_vec::<u64>(&event, "TimeStamp", &[100, 200, 350]).unwrap();
        drop(file);

        let reader = EventTreeReader::open(tmp.path()).unwrap();
        assert_eq!(reader.timestamps().unwrap(), Some(vec![100, 200, 350]));
    }

    #[test]
    fn test_trigger_columns_stripped_and_sorted() {
        let tmp = NamedTempFile::new().unwrap();
        let file = File::create(tmp.path()).unwrap();
        let hits = file.create_group("Plane6").unwrap().create_group("Hits").unwrap();
        write_vec::<u8>(&hits, "TriggerPhase", &[3, 1]).unwrap();
        write_vec::<u8>(&hits, "TriggerCount", &[0, 1]).unwrap();
        write_vec::<u16>(&hits, "PixX", &[5]).unwrap();
        drop(file);

        let reader = EventTreeReader::open(tmp.path()).unwrap();
        let columns = reader.trigger_columns(6).unwrap();
        assert_eq!(columns.len(), 2);
        assert_eq!(columns[0].0, "Count");
        assert_eq!(columns[0].1, vec![0, 1]);
        assert_eq!(columns[1].0, "Phase");
        assert_eq!(columns[1].1, vec![3, 1]);
    }

    #[test]
    fn test_trigger_columns_missing_plane() {
        let tmp = NamedTempFile::new().unwrap();
        File::create(tmp.path()).unwrap();

        let reader = EventTreeReader::open(tmp.path()).unwrap();
        assert!(reader.trigger_columns(3).unwrap().is_empty());
    }
}
