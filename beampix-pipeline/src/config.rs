//! Beamline configuration.
//!
//! A conversion campaign is described by a single TOML file with sections
//! for the external software installations, the telescope and DUT sensor
//! geometries, and per-tool event limits. Every field has a default so a
//! partial (or absent) file is enough to get started.

use crate::Result;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Top-level conversion configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// External software locations.
    pub software: Software,
    /// Beam-telescope sensor geometry.
    pub telescope: Telescope,
    /// Reference-plane sensor geometry.
    pub reference: Reference,
    /// Device-under-test sensor geometry.
    pub dut: DutGeometry,
    /// Alignment event limits.
    pub align: AlignSettings,
    /// Raw-conversion settings.
    pub converter: ConverterSettings,
}

impl Config {
    /// Loads the configuration from a TOML file.
    ///
    /// # Errors
    /// Returns an error when the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Ok(toml::from_str(&text)?)
    }
}

/// Locations of the external conversion and tracking software.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Software {
    /// EUDAQ installation directory; the raw converter lives under `bin/`.
    pub eudaq: PathBuf,
    /// Tracking-toolkit installation directory; tools live under `bin/`.
    pub proteus: PathBuf,
    /// Required major version of the tracking toolkit, checked when set.
    pub proteus_version: Option<u32>,
}

impl Default for Software {
    fn default() -> Self {
        Self {
            eudaq: PathBuf::from("eudaq"),
            proteus: PathBuf::from("proteus"),
            proteus_version: None,
        }
    }
}

impl Software {
    /// Path of the raw-data converter binary.
    #[must_use]
    pub fn converter_bin(&self) -> PathBuf {
        self.eudaq.join("bin").join("euCliConverter")
    }

    /// Path of a tracking-toolkit binary.
    #[must_use]
    pub fn proteus_bin(&self, tool: &str) -> PathBuf {
        self.proteus.join("bin").join(tool)
    }
}

/// Beam-telescope sensor geometry.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Telescope {
    /// Number of telescope planes.
    pub planes: usize,
    /// Pixel pitch in mm, column then row.
    pub pitch: [f64; 2],
    /// Columns per sensor.
    pub cols: u32,
    /// Rows per sensor.
    pub rows: u32,
}

impl Default for Telescope {
    fn default() -> Self {
        Self {
            planes: 6,
            pitch: [0.0184, 0.0184],
            cols: 1152,
            rows: 576,
        }
    }
}

/// Reference-plane sensor geometry.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Reference {
    /// Number of reference planes.
    pub planes: usize,
    /// Pixel pitch in mm, column then row.
    pub pitch: [f64; 2],
    /// Columns per sensor.
    pub cols: u32,
    /// Rows per sensor.
    pub rows: u32,
}

impl Default for Reference {
    fn default() -> Self {
        Self {
            planes: 1,
            pitch: [0.0184, 0.0184],
            cols: 1152,
            rows: 576,
        }
    }
}

/// Device-under-test sensor geometry.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DutGeometry {
    /// Pixel pitch in mm, column then row.
    pub pitch: [f64; 2],
    /// Columns per sensor.
    pub cols: u32,
    /// Rows per sensor.
    pub rows: u32,
}

impl Default for DutGeometry {
    fn default() -> Self {
        Self {
            pitch: [0.15, 0.10],
            cols: 52,
            rows: 80,
        }
    }
}

/// Event limits for the alignment tool.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AlignSettings {
    /// Maximum number of events per alignment step.
    pub max_events: Option<u64>,
    /// Number of leading events to skip.
    pub skip_events: Option<u64>,
}

/// Settings for the raw-data converter.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ConverterSettings {
    /// Maximum number of events to convert.
    pub max_events: Option<u64>,
    /// Optional per-pixel calibration file passed to the converter.
    pub calibration: Option<PathBuf>,
}

/// Ordered alignment step names from the `[align.<step>]` tables of a tool
/// configuration file. Table order in the file is the execution order.
///
/// # Errors
/// Returns an error when the file cannot be read or parsed.
pub fn align_steps(analysis: &Path) -> Result<Vec<String>> {
    section_names(analysis, "align")
}

/// Ordered noise-scan section names from the `[noisescan.<section>]` tables
/// of a tool configuration file, or `["all"]` when none are configured.
///
/// # Errors
/// Returns an error when the file cannot be read or parsed.
pub fn noisescan_sections(analysis: &Path) -> Result<Vec<String>> {
    let sections = section_names(analysis, "noisescan")?;
    if sections.is_empty() {
        return Ok(vec!["all".to_string()]);
    }
    Ok(sections)
}

fn section_names(path: &Path, table: &str) -> Result<Vec<String>> {
    let text = fs::read_to_string(path)?;
    let value: toml::Value = toml::from_str(&text)?;
    Ok(value
        .get(table)
        .and_then(toml::Value::as_table)
        .map(|entries| entries.keys().cloned().collect())
        .unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_cover_missing_sections() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.telescope.planes, 6);
        assert_eq!(config.telescope.cols, 1152);
        assert_eq!(config.reference.planes, 1);
        assert_eq!(config.dut.pitch, [0.15, 0.10]);
        assert_eq!(config.dut.cols, 52);
        assert!(config.software.proteus_version.is_none());
        assert!(config.converter.max_events.is_none());
    }

    #[test]
    fn test_partial_file_overrides_defaults() {
        let text = r#"
            [software]
            proteus = "/opt/proteus"
            proteus_version = 2

            [dut]
            pitch = [0.05, 0.05]

            [converter]
            max_events = 100000
        "#;
        let config: Config = toml::from_str(text).unwrap();
        assert_eq!(config.software.proteus, PathBuf::from("/opt/proteus"));
        assert_eq!(config.software.proteus_version, Some(2));
        assert_eq!(
            config.software.proteus_bin("pt-track"),
            PathBuf::from("/opt/proteus/bin/pt-track")
        );
        assert_eq!(config.dut.pitch, [0.05, 0.05]);
        assert_eq!(config.dut.cols, 52);
        assert_eq!(config.converter.max_events, Some(100_000));
        assert_eq!(config.telescope.planes, 6);
    }

    #[test]
    fn test_align_steps_keep_file_order() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("analysis.toml");
        fs::write(
            &path,
            "[align.coarse]\nnum_steps = 10\n\n[align.fine]\nnum_steps = 20\n\n[track]\nsearch_sigma_max = 10\n",
        )
        .unwrap();
        assert_eq!(align_steps(&path).unwrap(), vec!["coarse", "fine"]);
    }

    #[test]
    fn test_noisescan_sections_default_to_all() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("analysis.toml");
        fs::write(&path, "[align.coarse]\n").unwrap();
        assert_eq!(noisescan_sections(&path).unwrap(), vec!["all"]);
    }

    #[test]
    fn test_noisescan_sections_keep_file_order() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("analysis.toml");
        fs::write(
            &path,
            "[noisescan.tel]\nsigma_above_avg_max = 5.0\n\n[noisescan.dut]\nsigma_above_avg_max = 8.0\n",
        )
        .unwrap();
        assert_eq!(noisescan_sections(&path).unwrap(), vec!["tel", "dut"]);
    }

    #[test]
    fn test_config_load_reports_missing_file() {
        let dir = TempDir::new().unwrap();
        let result = Config::load(&dir.path().join("beampix.toml"));
        assert!(matches!(result, Err(crate::Error::Io(_))));
    }
}
