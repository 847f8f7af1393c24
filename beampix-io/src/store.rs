//! Structured store assembly.
//!
//! Reads the matched tree and the event tree, derives per-plane clusters,
//! and writes the analysis-ready HDF5 store in one pass. The output file is
//! owned exclusively for the duration of the build; a partial store never
//! survives a failed build.

use crate::hdf5::{set_units, write_pairs, write_vec};
use crate::matched::{InterceptTable, MatchedReader, PlaneHits};
use crate::tree::EventTreeReader;
use crate::{Error, Result};
use beampix_core::{clusterise, Cluster, Hit, Plane};
use beampix_geo::{to_global, AlignmentTransform, PixelMask};
use hdf5::{File, Group};
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use tracing::{info, warn};

/// Counters reported after a successful build.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreSummary {
    /// Events covered by the matched tree.
    pub events: usize,
    /// Tracks in the global table.
    pub tracks: usize,
    /// Clusters written per plane, indexed like the plane list.
    pub clusters: Vec<usize>,
}

/// Assembles the output store from the matched tree.
pub struct StoreBuilder {
    /// Matched tree input.
    pub matched_path: PathBuf,
    /// Event tree input (timestamps, trigger metadata).
    pub tree_path: PathBuf,
    /// Output store; overwritten when present.
    pub out_path: PathBuf,
    /// All planes in index order.
    pub planes: Vec<Plane>,
    /// Per-plane transforms from the alignment step in use.
    pub transforms: BTreeMap<usize, AlignmentTransform>,
    /// Name of the alignment step the transforms came from.
    pub alignment_step: String,
    /// Masked pixels, removed from hits before clustering.
    pub mask: PixelMask,
    /// Planes at or past this index carry trigger metadata.
    pub telescope_planes: usize,
}

impl StoreBuilder {
    /// Builds the store.
    ///
    /// # Errors
    /// Propagates read/write faults; the partial output file is removed
    /// before the error returns.
    pub fn build(&self) -> Result<StoreSummary> {
        match self.write_store() {
            Ok(summary) => {
                info!(
                    path = %self.out_path.display(),
                    events = summary.events,
                    tracks = summary.tracks,
                    "store written"
                );
                Ok(summary)
            }
            Err(err) => {
                if self.out_path.exists() {
                    warn!(path = %self.out_path.display(), "removing partial store");
                    let _ = fs::remove_file(&self.out_path);
                }
                Err(err)
            }
        }
    }

    fn write_store(&self) -> Result<StoreSummary> {
        let matched = MatchedReader::open(&self.matched_path)?;
        let tree = EventTreeReader::open(&self.tree_path)?;
        if self.planes.len() > matched.n_planes() {
            return Err(Error::InvalidFormat(format!(
                "matched tree has {} planes, configuration expects {}",
                matched.n_planes(),
                self.planes.len()
            )));
        }

        let out = File::create(&self.out_path)?;

        if let Some(stamps) = tree.timestamps()? {
            write_event_times(&out, &stamps)?;
        }

        let tracks = matched.tracks()?;
        let tracks_group = out.create_group("Tracks")?;
        write_vec(&tracks_group, "EventIndex", &tracks.event_index)?;
        write_vec(&tracks_group, "NTracksInEvent", &tracks.n_in_event)?;
        write_vec(&tracks_group, "Size", &tracks.size)?;
        write_vec(&tracks_group, "Chi2", &tracks.chi2)?;
        write_vec(&tracks_group, "Dof", &tracks.dof)?;
        write_vec(&tracks_group, "SlopeX", &tracks.slope_x)?;
        write_vec(&tracks_group, "SlopeY", &tracks.slope_y)?;

        let mut events: Option<usize> = None;
        let mut clusters = Vec::with_capacity(self.planes.len());
        for plane in &self.planes {
            let transform = self.transform_for(plane.index())?;
            let (plane_events, plane_clusters) =
                self.write_plane(&out, &matched, &tree, plane, transform, tracks.len())?;
            match events {
                None => events = Some(plane_events),
                Some(n) if n != plane_events => {
                    return Err(Error::InvalidFormat(format!(
                        "plane {} covers {plane_events} events, previous planes {n}",
                        plane.index()
                    )));
                }
                Some(_) => {}
            }
            clusters.push(plane_clusters);
        }

        Ok(StoreSummary {
            events: events.unwrap_or_default(),
            tracks: tracks.len(),
            clusters,
        })
    }

    fn write_plane(
        &self,
        out: &File,
        matched: &MatchedReader,
        tree: &EventTreeReader,
        plane: &Plane,
        transform: &AlignmentTransform,
        n_tracks: usize,
    ) -> Result<(usize, usize)> {
        let index = plane.index();
        let group = out.create_group(&format!("Plane{index}"))?;

        write_pairs(&group, "Mask", &self.mask.pixels(index))?;

        let hits = matched.plane_hits(index)?;
        let events = split_events(&hits, plane, &self.mask);
        let clustered: Vec<Vec<Cluster>> = events.par_iter().map(|event| clusterise(event)).collect();
        let n_clusters = write_clusters(&group, &clustered, plane, transform)?;

        let intercepts = matched.intercepts(index)?;
        if intercepts.len() != n_tracks {
            return Err(Error::InvalidFormat(format!(
                "plane {index} has {} intercepts for {n_tracks} tracks",
                intercepts.len()
            )));
        }
        write_plane_tracks(&group, &intercepts, plane, transform)?;

        if index >= self.telescope_planes {
            let columns = tree.trigger_columns(index)?;
            if !columns.is_empty() {
                let trigger = group.create_group("Trigger")?;
                for (name, data) in &columns {
                    write_vec(&trigger, name, data)?;
                }
            }
        }

        Ok((events.len(), n_clusters))
    }

    fn transform_for(&self, plane: usize) -> Result<&AlignmentTransform> {
        self.transforms.get(&plane).ok_or_else(|| {
            Error::Geo(beampix_geo::Error::MissingSensor {
                step: self.alignment_step.clone(),
                sensor: plane,
            })
        })
    }
}

/// Splits flat hit arrays into per-event hit lists, dropping masked pixels.
fn split_events(hits: &PlaneHits, plane: &Plane, mask: &PixelMask) -> Vec<Vec<Hit>> {
    let index = plane.index();
    let mut events = Vec::with_capacity(hits.n_events());
    let mut offset = 0;
    for (event, &count) in hits.n_hits.iter().enumerate() {
        let count = usize::from(count);
        let mut kept = Vec::with_capacity(count);
        for k in offset..offset + count {
            let (col, row) = (hits.cols[k], hits.rows[k]);
            if mask.is_masked(index, col, row) {
                continue;
            }
            kept.push(Hit::new(col, row, f64::from(hits.values[k]), index, event));
        }
        events.push(kept);
        offset += count;
    }
    events
}

#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
fn write_event_times(out: &File, stamps: &[u64]) -> Result<()> {
    let t0 = stamps.first().copied().unwrap_or_default();
    let time: Vec<f32> = stamps
        .iter()
        .map(|&t| (t.saturating_sub(t0) as f64 / 1e9) as f32)
        .collect();
    let event = out.create_group("Event")?;
    let dataset = write_vec(&event, "Time", &time)?;
    set_units(&dataset, "s")?;
    Ok(())
}

#[allow(clippy::cast_possible_truncation)]
fn write_clusters(
    group: &Group,
    clustered: &[Vec<Cluster>],
    plane: &Plane,
    transform: &AlignmentTransform,
) -> Result<usize> {
    let total: usize = clustered.iter().map(Vec::len).sum();
    let mut n_clusters = Vec::with_capacity(clustered.len());
    let mut global_u = Vec::with_capacity(total);
    let mut global_v = Vec::with_capacity(total);
    let mut local_x = Vec::with_capacity(total);
    let mut local_y = Vec::with_capacity(total);
    let mut charge: Vec<i32> = Vec::with_capacity(total);
    let mut size: Vec<u16> = Vec::with_capacity(total);

    for clusters in clustered {
        let count = u16::try_from(clusters.len()).map_err(|_| {
            Error::InvalidFormat("more than 65535 clusters in one event".to_string())
        })?;
        n_clusters.push(count);
        for cluster in clusters {
            let (col, row) = cluster.centroid();
            let (u, v) = to_global(col, row, plane, transform);
            global_u.push(u as f32);
            global_v.push(v as f32);
            local_x.push(col as f32);
            local_y.push(row as f32);
            charge.push(cluster.charge().round() as i32);
            let members = u16::try_from(cluster.size()).map_err(|_| {
                Error::InvalidFormat("more than 65535 hits in one cluster".to_string())
            })?;
            size.push(members);
        }
    }

    let clusters_group = group.create_group("Clusters")?;
    write_vec(&clusters_group, "NClusters", &n_clusters)?;
    let u_dataset = write_vec(&clusters_group, "U", &global_u)?;
    set_units(&u_dataset, "mm")?;
    let v_dataset = write_vec(&clusters_group, "V", &global_v)?;
    set_units(&v_dataset, "mm")?;
    write_vec(&clusters_group, "X", &local_x)?;
    write_vec(&clusters_group, "Y", &local_y)?;
    write_vec(&clusters_group, "Charge", &charge)?;
    write_vec(&clusters_group, "Size", &size)?;
    Ok(total)
}

#[allow(clippy::cast_possible_truncation)]
fn write_plane_tracks(
    group: &Group,
    intercepts: &InterceptTable,
    plane: &Plane,
    transform: &AlignmentTransform,
) -> Result<()> {
    let n = intercepts.len();
    let mut global_u = Vec::with_capacity(n);
    let mut global_v = Vec::with_capacity(n);
    let mut err_u = Vec::with_capacity(n);
    let mut err_v = Vec::with_capacity(n);
    for k in 0..n {
        let col = f64::from(intercepts.cols[k]);
        let row = f64::from(intercepts.rows[k]);
        let (u, v) = to_global(col, row, plane, transform);
        global_u.push(u as f32);
        global_v.push(v as f32);
        err_u.push((f64::from(intercepts.std_cols[k]) * plane.pitch_x()) as f32);
        err_v.push((f64::from(intercepts.std_rows[k]) * plane.pitch_y()) as f32);
    }

    let tracks = group.create_group("Tracks")?;
    let u_dataset = write_vec(&tracks, "U", &global_u)?;
    set_units(&u_dataset, "mm")?;
    let v_dataset = write_vec(&tracks, "V", &global_v)?;
    set_units(&v_dataset, "mm")?;
    write_vec(&tracks, "X", &intercepts.cols)?;
    write_vec(&tracks, "Y", &intercepts.rows)?;
    let eu_dataset = write_vec(&tracks, "eU", &err_u)?;
    set_units(&eu_dataset, "mm")?;
    let ev_dataset = write_vec(&tracks, "eV", &err_v)?;
    set_units(&ev_dataset, "mm")?;
    Ok(())
}
