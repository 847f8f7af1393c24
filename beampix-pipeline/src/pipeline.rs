//! Resumable stage sequencing.
//!
//! The pipeline walks an ordered stage list and uses artifact presence as
//! the completion marker: a stage whose output exists is skipped, a stage
//! whose output is missing runs, and a stage that fails has its partial
//! output removed before the error propagates. Running the pipeline twice
//! is therefore a no-op the second time, and a crashed run resumes from the
//! first missing artifact.

use crate::stages::Stage;
use crate::{Error, Result};
use std::fs;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Options for one pipeline run.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Re-run stages whose artifacts already exist.
    pub force: bool,
    /// Run only the named stages, keeping declared order.
    pub subset: Option<Vec<String>>,
    /// Delete intermediate tool artifacts once every stage is complete.
    pub cleanup_aux: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            force: false,
            subset: None,
            cleanup_aux: true,
        }
    }
}

/// Record of what one pipeline run did.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    /// Stage names executed, in order.
    pub executed: Vec<String>,
    /// Stage names skipped because their artifact already existed.
    pub skipped: Vec<String>,
    /// Wall-clock duration per executed stage.
    pub durations: Vec<(String, Duration)>,
    /// Total wall-clock duration of the run.
    pub elapsed: Duration,
}

impl RunSummary {
    /// Folds another run's record into this one.
    pub fn merge(&mut self, other: RunSummary) {
        self.executed.extend(other.executed);
        self.skipped.extend(other.skipped);
        self.durations.extend(other.durations);
        self.elapsed += other.elapsed;
    }
}

/// Ordered, artifact-checkpointed stage sequence.
pub struct Pipeline {
    stages: Vec<Stage>,
}

impl Pipeline {
    /// Creates a pipeline over the given stages, executed in order.
    #[must_use]
    pub fn new(stages: Vec<Stage>) -> Self {
        Self { stages }
    }

    /// The stage sequence.
    #[must_use]
    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    /// Runs the stage sequence.
    ///
    /// When the final selected stage's artifact already exists and `force`
    /// is not set, the whole run is a no-op. Intermediate artifacts may
    /// have been cleaned up after an earlier full conversion, so checking
    /// only the final artifact keeps repeated runs idempotent.
    ///
    /// # Errors
    /// [`Error::UnknownStage`] for an unmatched subset name,
    /// [`Error::MissingArtifact`] when a stage's input does not exist, and
    /// the failing stage's own error otherwise. A failed stage's partial
    /// output is removed before the error returns.
    pub fn run(&self, options: &RunOptions) -> Result<RunSummary> {
        let started = Instant::now();
        let selected = self.select(options.subset.as_deref())?;
        let mut summary = RunSummary::default();

        if let Some(&last) = selected.last() {
            let stage = &self.stages[last];
            if !options.force && stage.is_complete() {
                info!(
                    artifact = %stage.output().display(),
                    "final artifact present, nothing to do"
                );
                summary.skipped = selected
                    .iter()
                    .map(|&index| self.stages[index].name().to_string())
                    .collect();
                summary.elapsed = started.elapsed();
                return Ok(summary);
            }
        }

        for &index in &selected {
            let stage = &self.stages[index];
            if !options.force && stage.is_complete() {
                info!(stage = stage.name(), "artifact present, skipping");
                summary.skipped.push(stage.name().to_string());
                continue;
            }
            if let Some(input) = stage.input() {
                if !input.exists() {
                    return Err(Error::MissingArtifact {
                        stage: stage.name().to_string(),
                        path: input.to_path_buf(),
                    });
                }
            }
            info!(stage = stage.name(), "running");
            let stage_started = Instant::now();
            if let Err(err) = stage.execute(options.force) {
                if stage.output().exists() {
                    warn!(
                        stage = stage.name(),
                        artifact = %stage.output().display(),
                        "removing partial artifact"
                    );
                    let _ = fs::remove_file(stage.output());
                }
                return Err(err);
            }
            let elapsed = stage_started.elapsed();
            info!(stage = stage.name(), elapsed = ?elapsed, "stage done");
            summary.executed.push(stage.name().to_string());
            summary.durations.push((stage.name().to_string(), elapsed));
        }

        if options.cleanup_aux
            && options.subset.is_none()
            && self.stages.iter().all(Stage::is_complete)
        {
            self.cleanup_aux();
        }
        summary.elapsed = started.elapsed();
        Ok(summary)
    }

    /// Deletes the intermediate artifacts of every aux stage.
    fn cleanup_aux(&self) {
        for stage in &self.stages {
            if !stage.is_aux() {
                continue;
            }
            for path in stage.cleanup_paths() {
                if path.exists() {
                    info!(path = %path.display(), "removing intermediate artifact");
                    let _ = fs::remove_file(path);
                }
            }
        }
    }

    fn select(&self, subset: Option<&[String]>) -> Result<Vec<usize>> {
        let Some(names) = subset else {
            return Ok((0..self.stages.len()).collect());
        };
        for name in names {
            if !self.stages.iter().any(|stage| stage.name() == name) {
                return Err(Error::UnknownStage { name: name.clone() });
            }
        }
        Ok(self
            .stages
            .iter()
            .enumerate()
            .filter(|(_, stage)| names.iter().any(|name| name == stage.name()))
            .map(|(index, _)| index)
            .collect())
    }
}
