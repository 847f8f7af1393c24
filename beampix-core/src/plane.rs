//! Sensor plane geometry.

use crate::error::{Error, Result};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Role of a sensor plane along the beam axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum PlaneRole {
    /// Telescope tracking plane.
    Telescope,
    /// Timing/trigger reference plane.
    Reference,
    /// Device under test.
    Dut,
}

/// One physical sensor layer: pixel geometry, role and index.
///
/// Created once from run metadata and configuration, read-only thereafter.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Plane {
    index: usize,
    role: PlaneRole,
    cols: u32,
    rows: u32,
    pitch_x: f64,
    pitch_y: f64,
}

impl Plane {
    /// Creates a plane, validating its pixel geometry.
    ///
    /// # Errors
    /// Returns an error for a non-positive or non-finite pitch, or an empty
    /// pixel matrix. The coordinate transform divides by the pitch, so a
    /// zero pitch is rejected here instead of surfacing as NaN later.
    pub fn new(
        index: usize,
        role: PlaneRole,
        cols: u32,
        rows: u32,
        pitch: (f64, f64),
    ) -> Result<Self> {
        let (pitch_x, pitch_y) = pitch;
        if !(pitch_x.is_finite() && pitch_x > 0.0) {
            return Err(Error::InvalidPitch {
                axis: 'x',
                value: pitch_x,
            });
        }
        if !(pitch_y.is_finite() && pitch_y > 0.0) {
            return Err(Error::InvalidPitch {
                axis: 'y',
                value: pitch_y,
            });
        }
        if cols == 0 || rows == 0 {
            return Err(Error::InvalidMatrix { cols, rows });
        }
        Ok(Self {
            index,
            role,
            cols,
            rows,
            pitch_x,
            pitch_y,
        })
    }

    /// Plane index along the beam axis.
    #[inline]
    pub fn index(&self) -> usize {
        self.index
    }

    /// Role of this plane.
    #[inline]
    pub fn role(&self) -> PlaneRole {
        self.role
    }

    /// Number of pixel columns.
    #[inline]
    pub fn cols(&self) -> u32 {
        self.cols
    }

    /// Number of pixel rows.
    #[inline]
    pub fn rows(&self) -> u32 {
        self.rows
    }

    /// Pixel pitch along x in mm.
    #[inline]
    pub fn pitch_x(&self) -> f64 {
        self.pitch_x
    }

    /// Pixel pitch along y in mm.
    #[inline]
    pub fn pitch_y(&self) -> f64 {
        self.pitch_y
    }

    /// Whether this plane is part of the tracking telescope.
    #[inline]
    pub fn is_telescope(&self) -> bool {
        self.role == PlaneRole::Telescope
    }
}
