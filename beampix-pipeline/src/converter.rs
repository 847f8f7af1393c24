//! Run-level assembly of the conversion chain.
//!
//! [`Converter`] ties one run's artifact paths, the configured sensor
//! geometry, and the external tool locations into the six-stage pipeline:
//! raw2tree, noisescan, align, track, match, store.

use crate::config::{align_steps, noisescan_sections, Config};
use crate::external::check_major_version;
use crate::pipeline::{Pipeline, RunOptions, RunSummary};
use crate::runlog::Run;
use crate::stages::{Align, BuildStore, MatchTracks, NoiseScan, RawToTree, Stage, Track};
use crate::{Error, Result};
use beampix_core::{Plane, PlaneRole};
use beampix_geo::AlignmentStore;
use std::path::{Path, PathBuf};

/// Canonical artifact paths of one run inside its data directory.
#[derive(Debug, Clone)]
pub struct RunPaths {
    data_dir: PathBuf,
    number: u32,
}

impl RunPaths {
    /// Creates the path set for a run.
    pub fn new(data_dir: impl Into<PathBuf>, number: u32) -> Self {
        Self {
            data_dir: data_dir.into(),
            number,
        }
    }

    /// Raw beamline file.
    #[must_use]
    pub fn raw(&self) -> PathBuf {
        self.data_dir
            .join("raw")
            .join(format!("run{:06}.raw", self.number))
    }

    /// Event tree produced by the raw converter.
    #[must_use]
    pub fn event_tree(&self) -> PathBuf {
        self.data_dir
            .join("data")
            .join(format!("run{:06}.h5", self.number))
    }

    /// Tracking-toolkit workspace.
    #[must_use]
    pub fn proteus_dir(&self) -> PathBuf {
        self.data_dir.join("proteus")
    }

    /// Tool configuration with the align steps and noise-scan sections.
    #[must_use]
    pub fn analysis(&self) -> PathBuf {
        self.proteus_dir().join("analysis.toml")
    }

    /// Merged noisy-pixel mask.
    #[must_use]
    pub fn mask(&self) -> PathBuf {
        self.proteus_dir().join("mask").join("all-mask.toml")
    }

    /// Output prefix of the track stage.
    #[must_use]
    pub fn track_prefix(&self) -> PathBuf {
        self.proteus_dir()
            .join("root")
            .join(format!("track-{:04}", self.number))
    }

    /// Track data file.
    #[must_use]
    pub fn track_data(&self) -> PathBuf {
        with_suffix(&self.track_prefix(), "-data.h5")
    }

    /// Track histogram file.
    #[must_use]
    pub fn track_hists(&self) -> PathBuf {
        with_suffix(&self.track_prefix(), "-hists.h5")
    }

    /// Output prefix of the match stage.
    #[must_use]
    pub fn match_prefix(&self) -> PathBuf {
        self.proteus_dir()
            .join("root")
            .join(format!("match-{:04}", self.number))
    }

    /// Matched tree file.
    #[must_use]
    pub fn match_trees(&self) -> PathBuf {
        with_suffix(&self.match_prefix(), "-trees.h5")
    }

    /// Match histogram file.
    #[must_use]
    pub fn match_hists(&self) -> PathBuf {
        with_suffix(&self.match_prefix(), "-hists.h5")
    }

    /// Final structured store.
    #[must_use]
    pub fn store(&self) -> PathBuf {
        self.data_dir
            .join("data")
            .join(format!("run{:04}.hdf5", self.number))
    }
}

fn with_suffix(prefix: &Path, suffix: &str) -> PathBuf {
    let mut name = prefix.as_os_str().to_os_string();
    name.push(suffix);
    PathBuf::from(name)
}

/// Artifact presence of one stage, as reported by [`Converter::status`].
#[derive(Debug, Clone)]
pub struct StageStatus {
    /// Stage name.
    pub name: String,
    /// Artifact the stage produces.
    pub artifact: PathBuf,
    /// Whether the artifact exists.
    pub complete: bool,
}

/// Owns one run's stage sequence and the tool version precheck.
pub struct Converter {
    pipeline: Pipeline,
    paths: RunPaths,
    config: Config,
}

impl Converter {
    /// Builds the full stage sequence for a run.
    ///
    /// # Errors
    /// Fails when the tool configuration cannot be read, declares no
    /// alignment steps, or the configured sensor geometry is invalid.
    pub fn new(config: &Config, run: &Run) -> Result<Self> {
        let paths = RunPaths::new(run.data_dir(), run.number());
        let steps = align_steps(&paths.analysis())?;
        let sections = noisescan_sections(&paths.analysis())?;
        let align_store = AlignmentStore::new(paths.proteus_dir(), steps);
        let final_step = align_store
            .final_step()
            .ok_or(Error::Geo(beampix_geo::Error::NoAlignmentSteps))?;
        let final_geo = align_store.geo_path(final_step);
        let planes = build_planes(config, run.duts().len())?;
        let software = &config.software;

        let stages = vec![
            Stage::new(
                "raw2tree",
                paths.event_tree(),
                Box::new(RawToTree {
                    program: software.converter_bin(),
                    input: paths.raw(),
                    output: paths.event_tree(),
                    calibration: config.converter.calibration.clone(),
                    max_events: config.converter.max_events,
                }),
            )
            .with_input(paths.raw())
            .with_aux(Vec::new()),
            Stage::new(
                "noisescan",
                paths.mask(),
                Box::new(NoiseScan {
                    program: software.proteus_bin("pt-noisescan"),
                    proteus_dir: paths.proteus_dir(),
                    input: paths.event_tree(),
                    sections,
                    max_events: None,
                    skip_events: None,
                }),
            )
            .with_input(paths.event_tree()),
            Stage::new(
                "align",
                final_geo.clone(),
                Box::new(Align {
                    program: software.proteus_bin("pt-align"),
                    proteus_dir: paths.proteus_dir(),
                    input: paths.event_tree(),
                    store: align_store.clone(),
                    max_events: config.align.max_events,
                    skip_events: config.align.skip_events,
                }),
            )
            .with_input(paths.event_tree()),
            Stage::new(
                "track",
                paths.track_data(),
                Box::new(Track {
                    program: software.proteus_bin("pt-track"),
                    proteus_dir: paths.proteus_dir(),
                    input: paths.event_tree(),
                    output_prefix: paths.track_prefix(),
                    geometry: final_geo.clone(),
                    max_events: None,
                    skip_events: None,
                }),
            )
            .with_input(paths.event_tree())
            .with_aux(vec![paths.track_hists()]),
            Stage::new(
                "match",
                paths.match_trees(),
                Box::new(MatchTracks {
                    program: software.proteus_bin("pt-match"),
                    proteus_dir: paths.proteus_dir(),
                    input: paths.track_data(),
                    output_prefix: paths.match_prefix(),
                    geometry: final_geo,
                }),
            )
            .with_input(paths.track_data())
            .with_aux(vec![paths.match_hists()]),
            Stage::new(
                "store",
                paths.store(),
                Box::new(BuildStore {
                    matched_path: paths.match_trees(),
                    tree_path: paths.event_tree(),
                    out_path: paths.store(),
                    planes,
                    store: align_store,
                    mask_path: paths.mask(),
                    telescope_planes: config.telescope.planes,
                }),
            )
            .with_input(paths.match_trees()),
        ];

        Ok(Self {
            pipeline: Pipeline::new(stages),
            paths,
            config: config.clone(),
        })
    }

    /// Artifact paths of this run.
    #[must_use]
    pub fn paths(&self) -> &RunPaths {
        &self.paths
    }

    /// Runs the conversion chain, checking the tracking-tool version first
    /// when one is required by the configuration.
    ///
    /// # Errors
    /// `ToolVersionMismatch` from the precheck, otherwise whatever the
    /// pipeline run reports.
    pub fn convert(&self, options: &RunOptions) -> Result<RunSummary> {
        self.precheck_tools()?;
        self.pipeline.run(options)
    }

    /// Re-runs alignment and every stage after it, re-creating the event
    /// tree and noise mask first if an earlier cleanup removed them.
    ///
    /// # Errors
    /// Same as [`Converter::convert`].
    pub fn realign(&self) -> Result<RunSummary> {
        self.precheck_tools()?;
        let mut summary = RunSummary::default();
        for stage in ["raw2tree", "noisescan"] {
            let run = self.pipeline.run(&RunOptions {
                force: false,
                subset: Some(vec![stage.to_string()]),
                cleanup_aux: false,
            })?;
            summary.merge(run);
        }
        let chain = self.pipeline.run(&RunOptions {
            force: true,
            subset: Some(vec![
                "align".to_string(),
                "track".to_string(),
                "match".to_string(),
                "store".to_string(),
            ]),
            cleanup_aux: false,
        })?;
        summary.merge(chain);
        Ok(summary)
    }

    fn precheck_tools(&self) -> Result<()> {
        if let Some(required) = self.config.software.proteus_version {
            let program = self.config.software.proteus_bin("pt-track");
            check_major_version("pt-track", &program, required)?;
        }
        Ok(())
    }

    /// Artifact presence per stage, in pipeline order.
    #[must_use]
    pub fn status(&self) -> Vec<StageStatus> {
        self.pipeline
            .stages()
            .iter()
            .map(|stage| StageStatus {
                name: stage.name().to_string(),
                artifact: stage.output().to_path_buf(),
                complete: stage.is_complete(),
            })
            .collect()
    }
}

/// Builds the plane list: telescope planes first, then reference planes,
/// then one DUT plane per run-log record.
fn build_planes(config: &Config, n_duts: usize) -> Result<Vec<Plane>> {
    let telescope = &config.telescope;
    let reference = &config.reference;
    let dut = &config.dut;
    let mut planes = Vec::with_capacity(telescope.planes + reference.planes + n_duts);
    for index in 0..telescope.planes {
        planes.push(Plane::new(
            index,
            PlaneRole::Telescope,
            telescope.cols,
            telescope.rows,
            (telescope.pitch[0], telescope.pitch[1]),
        )?);
    }
    for offset in 0..reference.planes {
        planes.push(Plane::new(
            telescope.planes + offset,
            PlaneRole::Reference,
            reference.cols,
            reference.rows,
            (reference.pitch[0], reference.pitch[1]),
        )?);
    }
    for offset in 0..n_duts {
        planes.push(Plane::new(
            telescope.planes + reference.planes + offset,
            PlaneRole::Dut,
            dut.cols,
            dut.rows,
            (dut.pitch[0], dut.pitch[1]),
        )?);
    }
    Ok(planes)
}
