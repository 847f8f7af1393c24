//! Matched-tree reader.
//!
//! The match stage writes one HDF5 file per run holding a global track table
//! and two groups per plane: flat hit arrays with per-event counts, and the
//! fitted tracks' intercepts with that plane in local pixel units.

use crate::hdf5::read_vec;
use crate::{Error, Result};
use hdf5::{File, Group};
use std::path::Path;

/// Global track table of a matched tree. One entry per track.
#[derive(Debug, Clone, Default)]
pub struct TrackTable {
    /// Event frame index of the owning event.
    pub event_index: Vec<u32>,
    /// Track count of the owning event, repeated per track.
    pub n_in_event: Vec<u8>,
    /// Clusters along the track.
    pub size: Vec<f32>,
    pub chi2: Vec<f32>,
    pub dof: Vec<u8>,
    pub slope_x: Vec<f32>,
    pub slope_y: Vec<f32>,
}

impl TrackTable {
    /// Number of tracks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.event_index.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.event_index.is_empty()
    }
}

/// Flat per-plane hit arrays; event boundaries come from `n_hits`.
#[derive(Debug, Clone, Default)]
pub struct PlaneHits {
    /// Hits per event.
    pub n_hits: Vec<u16>,
    /// Hit columns, all events concatenated.
    pub cols: Vec<u16>,
    /// Hit rows, all events concatenated.
    pub rows: Vec<u16>,
    /// Hit charge values, all events concatenated.
    pub values: Vec<f32>,
}

impl PlaneHits {
    /// Number of events covered by the per-event counts.
    #[must_use]
    pub fn n_events(&self) -> usize {
        self.n_hits.len()
    }
}

/// Intercepts of the fitted tracks with one plane. One entry per track.
#[derive(Debug, Clone, Default)]
pub struct InterceptTable {
    /// Intercept column, local pixel units.
    pub cols: Vec<f32>,
    /// Intercept row, local pixel units.
    pub rows: Vec<f32>,
    /// Column fit uncertainty, local pixel units.
    pub std_cols: Vec<f32>,
    /// Row fit uncertainty, local pixel units.
    pub std_rows: Vec<f32>,
}

impl InterceptTable {
    /// Number of tracks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cols.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cols.is_empty()
    }
}

/// Read access to one matched tree.
pub struct MatchedReader {
    file: File,
    n_planes: usize,
}

impl MatchedReader {
    /// Opens a matched tree and counts its `Plane{i}` groups.
    ///
    /// # Errors
    /// Returns an error when the file cannot be opened as HDF5.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        let mut n_planes = 0;
        while file.group(&format!("Plane{n_planes}")).is_ok() {
            n_planes += 1;
        }
        Ok(Self { file, n_planes })
    }

    /// Number of `Plane{i}` groups in the file.
    #[must_use]
    pub fn n_planes(&self) -> usize {
        self.n_planes
    }

    /// Reads the global track table.
    ///
    /// # Errors
    /// `InvalidFormat` when the table's columns differ in length.
    pub fn tracks(&self) -> Result<TrackTable> {
        let group = self.file.group("Tracks")?;
        let table = TrackTable {
            event_index: read_vec::<u32>(&group, "EvtFrame")?,
            n_in_event: read_vec::<u8>(&group, "EvtNTracks")?,
            size: read_vec::<f32>(&group, "Size")?,
            chi2: read_vec::<f32>(&group, "Chi2")?,
            dof: read_vec::<u8>(&group, "Dof")?,
            slope_x: read_vec::<f32>(&group, "SlopeX")?,
            slope_y: read_vec::<f32>(&group, "SlopeY")?,
        };
        let n = table.len();
        let lengths = [
            table.n_in_event.len(),
            table.size.len(),
            table.chi2.len(),
            table.dof.len(),
            table.slope_x.len(),
            table.slope_y.len(),
        ];
        if lengths.iter().any(|&len| len != n) {
            return Err(Error::InvalidFormat(
                "track table columns differ in length".to_string(),
            ));
        }
        Ok(table)
    }

    /// Reads one plane's flat hit arrays.
    ///
    /// # Errors
    /// `InvalidFormat` when the flat arrays do not match the per-event
    /// counts.
    pub fn plane_hits(&self, plane: usize) -> Result<PlaneHits> {
        let group = self.plane_group(plane)?.group("Hits")?;
        let hits = PlaneHits {
            n_hits: read_vec::<u16>(&group, "NHits")?,
            cols: read_vec::<u16>(&group, "PixX")?,
            rows: read_vec::<u16>(&group, "PixY")?,
            values: read_vec::<f32>(&group, "Value")?,
        };
        let total: usize = hits.n_hits.iter().map(|&n| usize::from(n)).sum();
        if hits.cols.len() != total || hits.rows.len() != total || hits.values.len() != total {
            return Err(Error::InvalidFormat(format!(
                "plane {plane} hit arrays do not match the per-event counts"
            )));
        }
        Ok(hits)
    }

    /// Reads one plane's track intercepts.
    ///
    /// # Errors
    /// `InvalidFormat` when the intercept columns differ in length.
    pub fn intercepts(&self, plane: usize) -> Result<InterceptTable> {
        let group = self.plane_group(plane)?.group("Intercepts")?;
        let table = InterceptTable {
            cols: read_vec::<f32>(&group, "Col")?,
            rows: read_vec::<f32>(&group, "Row")?,
            std_cols: read_vec::<f32>(&group, "StdCol")?,
            std_rows: read_vec::<f32>(&group, "StdRow")?,
        };
        let n = table.len();
        if table.rows.len() != n || table.std_cols.len() != n || table.std_rows.len() != n {
            return Err(Error::InvalidFormat(format!(
                "plane {plane} intercept columns differ in length"
            )));
        }
        Ok(table)
    }

    fn plane_group(&self, plane: usize) -> Result<Group> {
        if plane >= self.n_planes {
            return Err(Error::InvalidFormat(format!(
                "matched tree has no Plane{plane} group"
            )));
        }
        Ok(self.file.group(&format!("Plane{plane}"))?)
    }
}
