//! Local pixel coordinates to the global telescope frame and back.

use crate::alignment::AlignmentTransform;
use crate::error::{Error, Result};
use beampix_core::Plane;

/// Smallest planar rotation determinant treated as invertible.
const DET_EPSILON: f64 = 1e-12;

/// Maps local (column, row) pixel coordinates to global (u, v) in mm.
///
/// Scale by the pixel pitch, rotate through the projected unit vectors,
/// translate by the alignment offset. The order is fixed; the three
/// operations do not commute.
pub fn to_global(col: f64, row: f64, plane: &Plane, t: &AlignmentTransform) -> (f64, f64) {
    let x = col * plane.pitch_x();
    let y = row * plane.pitch_y();
    let u = t.unit_u[0] * x + t.unit_v[0] * y + t.offset[0];
    let v = t.unit_u[1] * x + t.unit_v[1] * y + t.offset[1];
    (u, v)
}

/// Inverse of [`to_global`]: untranslate, unrotate, unscale.
///
/// # Errors
/// `DegenerateTransform` when the planar projection of the rotation is not
/// invertible.
pub fn to_local(u: f64, v: f64, plane: &Plane, t: &AlignmentTransform) -> Result<(f64, f64)> {
    let det = t.unit_u[0] * t.unit_v[1] - t.unit_v[0] * t.unit_u[1];
    if det.abs() < DET_EPSILON {
        return Err(Error::DegenerateTransform { det });
    }
    let du = u - t.offset[0];
    let dv = v - t.offset[1];
    let x = (t.unit_v[1] * du - t.unit_v[0] * dv) / det;
    let y = (t.unit_u[0] * dv - t.unit_u[1] * du) / det;
    Ok((x / plane.pitch_x(), y / plane.pitch_y()))
}
