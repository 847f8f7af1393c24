//! Per-step alignment geometry files and the store that reads them.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Rigid transform of one sensor plane into the global telescope frame.
///
/// `offset` carries the translation (z is geometry bookkeeping, x/y feed the
/// planar map); `unit_u`/`unit_v` are the local axes expressed in the global
/// frame. Produced by the external alignment tool, read-only here.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AlignmentTransform {
    /// Translation of the sensor origin, mm.
    pub offset: [f64; 3],
    /// Global direction of the local column axis.
    pub unit_u: [f64; 3],
    /// Global direction of the local row axis.
    pub unit_v: [f64; 3],
}

impl AlignmentTransform {
    /// Identity transform at the global origin.
    pub fn identity() -> Self {
        Self {
            offset: [0.0; 3],
            unit_u: [1.0, 0.0, 0.0],
            unit_v: [0.0, 1.0, 0.0],
        }
    }

    /// Position of the plane along the beam axis, mm.
    #[inline]
    pub fn z(&self) -> f64 {
        self.offset[2]
    }
}

/// One `[[sensors]]` entry of a geometry file.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SensorAlignment {
    /// Plane index the entry belongs to.
    pub id: usize,
    #[serde(flatten)]
    pub transform: AlignmentTransform,
}

/// A geometry file: the raw `geometry.toml` or a `<step>-geo.toml` written
/// by an alignment step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeometryFile {
    pub sensors: Vec<SensorAlignment>,
}

impl GeometryFile {
    /// Parses a geometry file from disk.
    ///
    /// # Errors
    /// Returns an error when the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Ok(toml::from_str(&text)?)
    }

    /// Writes the geometry file to disk.
    ///
    /// # Errors
    /// Returns an error when serialization or the write fails.
    pub fn save(&self, path: &Path) -> Result<()> {
        let text = toml::to_string(self)?;
        fs::write(path, text)?;
        Ok(())
    }

    /// Per-plane transforms, keyed by sensor id.
    pub fn transforms(&self) -> BTreeMap<usize, AlignmentTransform> {
        self.sensors
            .iter()
            .map(|sensor| (sensor.id, sensor.transform))
            .collect()
    }

    /// z position per sensor, in file order.
    pub fn z_positions(&self) -> Vec<f64> {
        self.sensors
            .iter()
            .map(|sensor| sensor.transform.z())
            .collect()
    }
}

/// Read-only access to the alignment stage's output artifacts.
///
/// Alignment steps are keyed by name so historical steps stay inspectable
/// after later steps refine them.
#[derive(Debug, Clone)]
pub struct AlignmentStore {
    proteus_dir: PathBuf,
    steps: Vec<String>,
}

impl AlignmentStore {
    /// Creates a store over the alignment working directory with the ordered
    /// list of step names.
    pub fn new(proteus_dir: impl Into<PathBuf>, steps: Vec<String>) -> Self {
        Self {
            proteus_dir: proteus_dir.into(),
            steps,
        }
    }

    /// Ordered alignment step names.
    #[inline]
    pub fn steps(&self) -> &[String] {
        &self.steps
    }

    /// Name of the last (most refined) alignment step.
    #[inline]
    pub fn final_step(&self) -> Option<&str> {
        self.steps.last().map(String::as_str)
    }

    /// Path of a step's geometry file: `alignment/<step>-geo.toml`.
    pub fn geo_path(&self, step: &str) -> PathBuf {
        self.proteus_dir
            .join("alignment")
            .join(format!("{step}-geo.toml"))
    }

    /// Path of the pre-alignment geometry file.
    pub fn geometry_path(&self) -> PathBuf {
        self.proteus_dir.join("geometry.toml")
    }

    /// Loads the per-plane transforms a named step produced.
    ///
    /// # Errors
    /// `MissingAlignment` when the step's file does not exist; parse errors
    /// otherwise.
    pub fn load(&self, step: &str) -> Result<BTreeMap<usize, AlignmentTransform>> {
        let path = self.geo_path(step);
        if !path.exists() {
            return Err(Error::MissingAlignment {
                step: step.to_string(),
                path,
            });
        }
        Ok(GeometryFile::load(&path)?.transforms())
    }

    /// Loads the final step's transforms.
    ///
    /// # Errors
    /// `NoAlignmentSteps` when the step list is empty, otherwise as
    /// [`load`](Self::load).
    pub fn load_final(&self) -> Result<BTreeMap<usize, AlignmentTransform>> {
        let step = self.final_step().ok_or(Error::NoAlignmentSteps)?;
        self.load(step)
    }

    /// z position per plane, in file order.
    ///
    /// `raw` reads the pre-alignment geometry, otherwise the final step's
    /// output.
    ///
    /// # Errors
    /// `MissingGeometry`/`MissingAlignment` when the backing file is absent.
    pub fn z_positions(&self, raw: bool) -> Result<Vec<f64>> {
        let path = if raw {
            let path = self.geometry_path();
            if !path.exists() {
                return Err(Error::MissingGeometry { path });
            }
            path
        } else {
            let step = self.final_step().ok_or(Error::NoAlignmentSteps)?;
            let path = self.geo_path(step);
            if !path.exists() {
                return Err(Error::MissingAlignment {
                    step: step.to_string(),
                    path,
                });
            }
            path
        };
        Ok(GeometryFile::load(&path)?.z_positions())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use tempfile::TempDir;

    const GEO: &str = r#"
[[sensors]]
id = 0
offset = [0.1, -0.2, 0.0]
unit_u = [1.0, 0.0, 0.0]
unit_v = [0.0, 1.0, 0.0]

[[sensors]]
id = 1
offset = [0.0, 0.0, 21.5]
unit_u = [0.9998, 0.0175, 0.0]
unit_v = [-0.0175, 0.9998, 0.0]
"#;

    fn write_store(dir: &TempDir) -> AlignmentStore {
        let proteus = dir.path().join("proteus");
        fs::create_dir_all(proteus.join("alignment")).unwrap();
        fs::write(proteus.join("geometry.toml"), GEO).unwrap();
        fs::write(proteus.join("alignment").join("coarse-geo.toml"), GEO).unwrap();
        AlignmentStore::new(proteus, vec!["coarse".into(), "fine".into()])
    }

    #[test]
    fn test_load_step_transforms() {
        let dir = TempDir::new().unwrap();
        let store = write_store(&dir);
        let transforms = store.load("coarse").unwrap();
        assert_eq!(transforms.len(), 2);
        assert_relative_eq!(transforms[&0].offset[0], 0.1);
        assert_relative_eq!(transforms[&1].unit_v[0], -0.0175);
    }

    #[test]
    fn test_missing_step_is_typed() {
        let dir = TempDir::new().unwrap();
        let store = write_store(&dir);
        let err = store.load("fine").unwrap_err();
        assert!(matches!(err, Error::MissingAlignment { .. }));
    }

    #[test]
    fn test_z_positions_raw() {
        let dir = TempDir::new().unwrap();
        let store = write_store(&dir);
        let z = store.z_positions(true).unwrap();
        assert_eq!(z.len(), 2);
        assert_relative_eq!(z[1], 21.5);
    }

    #[test]
    fn test_geometry_roundtrip() {
        let geo: GeometryFile = toml::from_str(GEO).unwrap();
        let text = toml::to_string(&geo).unwrap();
        let reparsed: GeometryFile = toml::from_str(&text).unwrap();
        assert_eq!(geo, reparsed);
    }

    #[test]
    fn test_no_steps() {
        let dir = TempDir::new().unwrap();
        let store = AlignmentStore::new(dir.path(), Vec::new());
        assert!(matches!(
            store.load_final().unwrap_err(),
            Error::NoAlignmentSteps
        ));
    }
}
