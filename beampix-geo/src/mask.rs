//! Noisy-pixel mask files produced by the noise-scan stage.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fs;
use std::path::Path;

/// One `[[sensors]]` entry of a mask file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensorMask {
    /// Plane index the entry belongs to.
    pub id: usize,
    /// Masked `[col, row]` pixel addresses.
    pub masked_pixels: Vec<[u16; 2]>,
}

/// A noisy-pixel mask file: the merged `all-mask.toml` or one section's scan
/// output.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaskFile {
    pub sensors: Vec<SensorMask>,
}

impl MaskFile {
    /// Placeholder with a single maskless sensor entry.
    ///
    /// The noise-scan tool refuses to start without a mask file present, so
    /// one is seeded before the first scan runs.
    pub fn empty() -> Self {
        Self {
            sensors: vec![SensorMask {
                id: 0,
                masked_pixels: Vec::new(),
            }],
        }
    }

    /// Parses a mask file from disk.
    ///
    /// # Errors
    /// `MissingMask` when the file does not exist; parse errors otherwise.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::MissingMask {
                path: path.to_path_buf(),
            });
        }
        let text = fs::read_to_string(path)?;
        Ok(toml::from_str(&text)?)
    }

    /// Writes the mask file to disk.
    ///
    /// # Errors
    /// Returns an error when serialization or the write fails.
    pub fn save(&self, path: &Path) -> Result<()> {
        let text = toml::to_string(self)?;
        fs::write(path, text)?;
        Ok(())
    }

    /// Union of several mask files, keyed by sensor id.
    ///
    /// Duplicate pixels collapse and each sensor's pixel list comes out
    /// sorted, so merging the same section outputs twice is a no-op.
    pub fn merged<'a>(files: impl IntoIterator<Item = &'a MaskFile>) -> MaskFile {
        let mut by_sensor: BTreeMap<usize, BTreeSet<[u16; 2]>> = BTreeMap::new();
        for file in files {
            for sensor in &file.sensors {
                by_sensor
                    .entry(sensor.id)
                    .or_default()
                    .extend(sensor.masked_pixels.iter().copied());
            }
        }
        MaskFile {
            sensors: by_sensor
                .into_iter()
                .map(|(id, pixels)| SensorMask {
                    id,
                    masked_pixels: pixels.into_iter().collect(),
                })
                .collect(),
        }
    }
}

/// Constant-time masked-pixel lookup per plane.
#[derive(Debug, Clone, Default)]
pub struct PixelMask {
    planes: BTreeMap<usize, HashSet<(u16, u16)>>,
}

impl PixelMask {
    /// Builds the lookup from a parsed mask file.
    pub fn from_file(file: &MaskFile) -> Self {
        let mut planes: BTreeMap<usize, HashSet<(u16, u16)>> = BTreeMap::new();
        for sensor in &file.sensors {
            planes
                .entry(sensor.id)
                .or_default()
                .extend(sensor.masked_pixels.iter().map(|p| (p[0], p[1])));
        }
        Self { planes }
    }

    /// Whether a pixel is masked on the given plane.
    #[inline]
    pub fn is_masked(&self, plane: usize, col: u16, row: u16) -> bool {
        self.planes
            .get(&plane)
            .is_some_and(|pixels| pixels.contains(&(col, row)))
    }

    /// Masked pixels of a plane, sorted by (col, row).
    pub fn pixels(&self, plane: usize) -> Vec<[u16; 2]> {
        let mut out: Vec<[u16; 2]> = self
            .planes
            .get(&plane)
            .map(|pixels| pixels.iter().map(|&(c, r)| [c, r]).collect())
            .unwrap_or_default();
        out.sort_unstable();
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_empty_placeholder_shape() {
        let text = toml::to_string(&MaskFile::empty()).unwrap();
        assert!(text.contains("[[sensors]]"));
        assert!(text.contains("masked_pixels = []"));
        let reparsed: MaskFile = toml::from_str(&text).unwrap();
        assert_eq!(reparsed, MaskFile::empty());
    }

    #[test]
    fn test_missing_mask_is_typed() {
        let dir = TempDir::new().unwrap();
        let err = MaskFile::load(&dir.path().join("all-mask.toml")).unwrap_err();
        assert!(matches!(err, Error::MissingMask { .. }));
    }

    #[test]
    fn test_save_load_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("all-mask.toml");
        let mask = MaskFile {
            sensors: vec![SensorMask {
                id: 3,
                masked_pixels: vec![[10, 20], [11, 20]],
            }],
        };
        mask.save(&path).unwrap();
        assert_eq!(MaskFile::load(&path).unwrap(), mask);
    }

    #[test]
    fn test_merge_unions_and_sorts() {
        let a = MaskFile {
            sensors: vec![SensorMask {
                id: 0,
                masked_pixels: vec![[5, 5], [1, 2]],
            }],
        };
        let b = MaskFile {
            sensors: vec![
                SensorMask {
                    id: 0,
                    masked_pixels: vec![[5, 5], [0, 9]],
                },
                SensorMask {
                    id: 2,
                    masked_pixels: vec![[7, 7]],
                },
            ],
        };
        let merged = MaskFile::merged([&a, &b]);
        assert_eq!(merged.sensors.len(), 2);
        assert_eq!(merged.sensors[0].id, 0);
        assert_eq!(merged.sensors[0].masked_pixels, vec![[0, 9], [1, 2], [5, 5]]);
        assert_eq!(merged.sensors[1].masked_pixels, vec![[7, 7]]);
    }

    #[test]
    fn test_merge_is_idempotent() {
        let a = MaskFile {
            sensors: vec![SensorMask {
                id: 1,
                masked_pixels: vec![[4, 4], [2, 3]],
            }],
        };
        let once = MaskFile::merged([&a]);
        let twice = MaskFile::merged([&once, &once]);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_pixel_mask_lookup() {
        let file = MaskFile {
            sensors: vec![SensorMask {
                id: 1,
                masked_pixels: vec![[30, 40], [0, 0]],
            }],
        };
        let mask = PixelMask::from_file(&file);
        assert!(mask.is_masked(1, 30, 40));
        assert!(!mask.is_masked(1, 30, 41));
        assert!(!mask.is_masked(0, 30, 40));
        assert_eq!(mask.pixels(1), vec![[0, 0], [30, 40]]);
        assert!(mask.pixels(5).is_empty());
    }
}
