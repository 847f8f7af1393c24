//! Pipeline stages.
//!
//! A [`Stage`] couples a name and an artifact contract (optional input,
//! produced output) with the [`StageAction`] that produces the artifact.
//! The concrete actions in this module wrap the external conversion and
//! tracking tools plus the in-process store assembly; the sequencing and
//! skip/cleanup logic lives in [`crate::pipeline`].

use crate::external::ToolCommand;
use crate::{Error, Result};
use beampix_core::Plane;
use beampix_geo::{AlignmentStore, MaskFile, PixelMask};
use beampix_io::StoreBuilder;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Work a stage performs when its artifact is missing.
pub trait StageAction {
    /// Runs the action to completion, producing the stage artifact.
    fn execute(&self, force: bool) -> Result<()>;
}

/// One step of the conversion chain.
pub struct Stage {
    name: String,
    input: Option<PathBuf>,
    output: PathBuf,
    aux: bool,
    extra: Vec<PathBuf>,
    action: Box<dyn StageAction>,
}

impl Stage {
    /// Creates a stage producing `output` via `action`.
    pub fn new(
        name: impl Into<String>,
        output: impl Into<PathBuf>,
        action: Box<dyn StageAction>,
    ) -> Self {
        Self {
            name: name.into(),
            input: None,
            output: output.into(),
            aux: false,
            extra: Vec::new(),
            action,
        }
    }

    /// Declares an input artifact that must exist before the action runs.
    #[must_use]
    pub fn with_input(mut self, input: impl Into<PathBuf>) -> Self {
        self.input = Some(input.into());
        self
    }

    /// Marks the output as an intermediate, optionally with companion files,
    /// all removed by the aux cleanup after a fully converted run.
    #[must_use]
    pub fn with_aux(mut self, extra: Vec<PathBuf>) -> Self {
        self.aux = true;
        self.extra = extra;
        self
    }

    /// Stage name, as used in subset selections.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Input artifact required before the action runs, if any.
    #[must_use]
    pub fn input(&self) -> Option<&Path> {
        self.input.as_deref()
    }

    /// Artifact this stage produces.
    #[must_use]
    pub fn output(&self) -> &Path {
        &self.output
    }

    /// Whether the artifact is an intermediate eligible for cleanup.
    #[must_use]
    pub fn is_aux(&self) -> bool {
        self.aux
    }

    /// Artifact presence doubles as the completion marker.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.output.exists()
    }

    /// Files removed by the aux cleanup: the output plus its companions.
    #[must_use]
    pub fn cleanup_paths(&self) -> Vec<&Path> {
        let mut paths = vec![self.output.as_path()];
        paths.extend(self.extra.iter().map(PathBuf::as_path));
        paths
    }

    pub(crate) fn execute(&self, force: bool) -> Result<()> {
        self.action.execute(force)
    }
}

/// Raw binary data to event tree via the EUDAQ converter.
pub struct RawToTree {
    /// Converter binary.
    pub program: PathBuf,
    /// Raw input file.
    pub input: PathBuf,
    /// Event tree output.
    pub output: PathBuf,
    /// Optional per-pixel calibration file.
    pub calibration: Option<PathBuf>,
    /// Optional event limit.
    pub max_events: Option<u64>,
}

impl StageAction for RawToTree {
    fn execute(&self, _force: bool) -> Result<()> {
        if let Some(parent) = self.output.parent() {
            fs::create_dir_all(parent)?;
        }
        ToolCommand::new(&self.program)
            .arg("-i")
            .arg(&self.input)
            .arg("-o")
            .arg(&self.output)
            .opt("-c", self.calibration.as_ref())
            .opt("-m", self.max_events.map(|n| n.to_string()))
            .run("raw2tree")
    }
}

/// Noise scan over the configured sections.
///
/// The tool names its outputs after the section prefix, so the per-section
/// masks are merged into the stage artifact `mask/all-mask.toml` unless the
/// single section `all` already produces it directly.
pub struct NoiseScan {
    /// `pt-noisescan` binary.
    pub program: PathBuf,
    /// Tool workspace holding `analysis.toml` and the `mask/` directory.
    pub proteus_dir: PathBuf,
    /// Event tree input.
    pub input: PathBuf,
    /// Section names, in execution order.
    pub sections: Vec<String>,
    /// Optional event limit.
    pub max_events: Option<u64>,
    /// Number of leading events to skip.
    pub skip_events: Option<u64>,
}

impl NoiseScan {
    fn mask_dir(&self) -> PathBuf {
        self.proteus_dir.join("mask")
    }

    fn section_mask(&self, section: &str) -> PathBuf {
        self.mask_dir().join(format!("{section}-mask.toml"))
    }
}

impl StageAction for NoiseScan {
    fn execute(&self, _force: bool) -> Result<()> {
        let mask_dir = self.mask_dir();
        fs::create_dir_all(&mask_dir)?;
        // The tool wants a mask file per section on startup.
        for section in &self.sections {
            let path = self.section_mask(section);
            if !path.exists() {
                debug!(section, "creating empty mask placeholder");
                MaskFile::empty().save(&path)?;
            }
        }
        for section in &self.sections {
            ToolCommand::new(&self.program)
                .working_dir(&self.proteus_dir)
                .arg(&self.input)
                .arg(mask_dir.join(section))
                .arg("-c")
                .arg("analysis.toml")
                .arg("-u")
                .arg(section)
                .opt("-n", self.max_events.map(|n| n.to_string()))
                .opt("-s", self.skip_events.map(|n| n.to_string()))
                .run("noisescan")?;
        }
        if self.sections.len() > 1 || self.sections.first().map(String::as_str) != Some("all") {
            let mut files = Vec::with_capacity(self.sections.len());
            for section in &self.sections {
                files.push(MaskFile::load(&self.section_mask(section))?);
            }
            MaskFile::merged(&files).save(&mask_dir.join("all-mask.toml"))?;
        }
        Ok(())
    }
}

/// Chained alignment steps, each refining its predecessor's geometry.
pub struct Align {
    /// `pt-align` binary.
    pub program: PathBuf,
    /// Tool workspace holding `analysis.toml` and the `alignment/` directory.
    pub proteus_dir: PathBuf,
    /// Event tree input.
    pub input: PathBuf,
    /// Step names and geometry paths.
    pub store: AlignmentStore,
    /// Optional event limit per step.
    pub max_events: Option<u64>,
    /// Number of leading events to skip.
    pub skip_events: Option<u64>,
}

impl StageAction for Align {
    fn execute(&self, force: bool) -> Result<()> {
        let alignment_dir = self.proteus_dir.join("alignment");
        fs::create_dir_all(&alignment_dir)?;
        let mut previous: Option<PathBuf> = None;
        for step in self.store.steps() {
            let geo = self.store.geo_path(step);
            if geo.exists() && !force {
                debug!(step, "alignment step artifact present, skipping");
                previous = Some(geo);
                continue;
            }
            let mut command = ToolCommand::new(&self.program)
                .working_dir(&self.proteus_dir)
                .arg(&self.input)
                .arg(alignment_dir.join(step))
                .arg("-c")
                .arg("analysis.toml")
                .arg("-u")
                .arg(step);
            if let Some(previous) = &previous {
                command = command.arg("-g").arg(previous);
            }
            command
                .opt("-n", self.max_events.map(|n| n.to_string()))
                .opt("-s", self.skip_events.map(|n| n.to_string()))
                .run("align")?;
            previous = Some(geo);
        }
        Ok(())
    }
}

/// Track finding over the final aligned geometry.
pub struct Track {
    /// `pt-track` binary.
    pub program: PathBuf,
    /// Tool workspace.
    pub proteus_dir: PathBuf,
    /// Event tree input.
    pub input: PathBuf,
    /// Output prefix; the tool appends `-data` and `-hists`.
    pub output_prefix: PathBuf,
    /// Final alignment geometry.
    pub geometry: PathBuf,
    /// Optional event limit.
    pub max_events: Option<u64>,
    /// Number of leading events to skip.
    pub skip_events: Option<u64>,
}

impl StageAction for Track {
    fn execute(&self, _force: bool) -> Result<()> {
        if let Some(parent) = self.output_prefix.parent() {
            fs::create_dir_all(parent)?;
        }
        ToolCommand::new(&self.program)
            .working_dir(&self.proteus_dir)
            .arg(&self.input)
            .arg(&self.output_prefix)
            .arg("-c")
            .arg("analysis.toml")
            .arg("-g")
            .arg(&self.geometry)
            .opt("-n", self.max_events.map(|n| n.to_string()))
            .opt("-s", self.skip_events.map(|n| n.to_string()))
            .run("track")
    }
}

/// Track-cluster matching, producing the matched tree.
pub struct MatchTracks {
    /// `pt-match` binary.
    pub program: PathBuf,
    /// Tool workspace.
    pub proteus_dir: PathBuf,
    /// Track data input from the track stage.
    pub input: PathBuf,
    /// Output prefix; the tool appends `-trees` and `-hists`.
    pub output_prefix: PathBuf,
    /// Final alignment geometry.
    pub geometry: PathBuf,
}

impl StageAction for MatchTracks {
    fn execute(&self, _force: bool) -> Result<()> {
        ToolCommand::new(&self.program)
            .working_dir(&self.proteus_dir)
            .arg(&self.input)
            .arg(&self.output_prefix)
            .arg("-c")
            .arg("analysis.toml")
            .arg("-g")
            .arg(&self.geometry)
            .run("match")
    }
}

/// Final store assembly from the matched tree.
///
/// The alignment transforms and the pixel mask are loaded at execution time
/// so that the stage can be constructed before the upstream artifacts exist.
pub struct BuildStore {
    /// Matched tree input.
    pub matched_path: PathBuf,
    /// Event tree input.
    pub tree_path: PathBuf,
    /// Output store.
    pub out_path: PathBuf,
    /// All planes in index order.
    pub planes: Vec<Plane>,
    /// Alignment steps and geometry paths.
    pub store: AlignmentStore,
    /// Stage artifact of the noise scan.
    pub mask_path: PathBuf,
    /// Planes at or past this index carry trigger metadata.
    pub telescope_planes: usize,
}

impl StageAction for BuildStore {
    fn execute(&self, _force: bool) -> Result<()> {
        if let Some(parent) = self.out_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let alignment_step = self
            .store
            .final_step()
            .ok_or(Error::Geo(beampix_geo::Error::NoAlignmentSteps))?
            .to_string();
        let transforms = self.store.load_final()?;
        let mask = PixelMask::from_file(&MaskFile::load(&self.mask_path)?);
        let builder = StoreBuilder {
            matched_path: self.matched_path.clone(),
            tree_path: self.tree_path.clone(),
            out_path: self.out_path.clone(),
            planes: self.planes.clone(),
            transforms,
            alignment_step,
            mask,
            telescope_planes: self.telescope_planes,
        };
        builder.build()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_stage_artifact_contract() {
        struct Noop;
        impl StageAction for Noop {
            fn execute(&self, _force: bool) -> Result<()> {
                Ok(())
            }
        }

        let dir = TempDir::new().unwrap();
        let output = dir.path().join("out.h5");
        let stage = Stage::new("track", &output, Box::new(Noop))
            .with_input(dir.path().join("in.h5"))
            .with_aux(vec![dir.path().join("out-hists.h5")]);

        assert_eq!(stage.name(), "track");
        assert!(!stage.is_complete());
        assert!(stage.is_aux());
        assert_eq!(stage.cleanup_paths().len(), 2);
        fs::write(&output, b"artifact").unwrap();
        assert!(stage.is_complete());
    }

    #[test]
    fn test_noisescan_merges_section_masks() {
        // Point the scan at `true` so the tool runs are no-ops and the
        // pre-created placeholder masks double as the section outputs.
        let dir = TempDir::new().unwrap();
        let scan = NoiseScan {
            program: PathBuf::from("true"),
            proteus_dir: dir.path().to_path_buf(),
            input: dir.path().join("run.h5"),
            sections: vec!["tel".to_string(), "dut".to_string()],
            max_events: None,
            skip_events: None,
        };
        scan.execute(false).unwrap();

        assert!(dir.path().join("mask/tel-mask.toml").exists());
        assert!(dir.path().join("mask/dut-mask.toml").exists());
        let merged = MaskFile::load(&dir.path().join("mask/all-mask.toml")).unwrap();
        assert_eq!(merged.sensors.len(), 1);
        assert!(merged.sensors[0].masked_pixels.is_empty());
    }

    #[test]
    fn test_align_chains_geometry_flags() {
        // Each step's command is appended to a log by a stub tool, so the
        // chaining of -g across steps is visible.
        let dir = TempDir::new().unwrap();
        let log = dir.path().join("calls.log");
        let stub = dir.path().join("pt-align");
        fs::write(&stub, format!("#!/bin/sh\necho \"$@\" >> {}\n", log.display())).unwrap();
        let mut perms = fs::metadata(&stub).unwrap().permissions();
        use std::os::unix::fs::PermissionsExt;
        perms.set_mode(0o755);
        fs::set_permissions(&stub, perms).unwrap();

        let store = AlignmentStore::new(
            dir.path(),
            vec!["coarse".to_string(), "fine".to_string()],
        );
        let align = Align {
            program: stub,
            proteus_dir: dir.path().to_path_buf(),
            input: dir.path().join("run.h5"),
            store,
            max_events: Some(1000),
            skip_events: None,
        };
        align.execute(false).unwrap();

        let calls = fs::read_to_string(&log).unwrap();
        let lines: Vec<&str> = calls.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("-u coarse"));
        assert!(!lines[0].contains("-g"));
        assert!(lines[1].contains("-u fine"));
        assert!(lines[1].contains("coarse-geo.toml"));
        assert!(lines[1].contains("-n 1000"));
    }

    #[test]
    fn test_align_skips_steps_with_existing_geometry() {
        let dir = TempDir::new().unwrap();
        let log = dir.path().join("calls.log");
        let stub = dir.path().join("pt-align");
        fs::write(&stub, format!("#!/bin/sh\necho \"$@\" >> {}\n", log.display())).unwrap();
        let mut perms = fs::metadata(&stub).unwrap().permissions();
        use std::os::unix::fs::PermissionsExt;
        perms.set_mode(0o755);
        fs::set_permissions(&stub, perms).unwrap();

        let store = AlignmentStore::new(
            dir.path(),
            vec!["coarse".to_string(), "fine".to_string()],
        );
        fs::create_dir_all(dir.path().join("alignment")).unwrap();
        fs::write(store.geo_path("coarse"), "[[sensors]]\n").unwrap();

        let align = Align {
            program: stub,
            proteus_dir: dir.path().to_path_buf(),
            input: dir.path().join("run.h5"),
            store,
            max_events: None,
            skip_events: None,
        };
        align.execute(false).unwrap();

        let calls = fs::read_to_string(&log).unwrap();
        let lines: Vec<&str> = calls.lines().collect();
        // Only the fine step ran, still chained onto the existing coarse
        // geometry.
        assert_eq!(lines.len(), 1);
        assert!(lines[0].contains("-u fine"));
        assert!(lines[0].contains("coarse-geo.toml"));
    }
}
