//! Hit type for pixel detector data.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Adjacency reach in pixel units.
///
/// Direct and diagonal neighbors on the unit grid count as adjacent; the
/// margin above 1.0 guards against floating round-off when positions pass
/// through metric conversions. Fixed constant, not a tunable.
pub const ADJACENCY_TOLERANCE: f64 = 1.1;

/// One pixel activation in one event.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Hit {
    /// Local column on the sensor.
    pub col: u16,
    /// Local row on the sensor.
    pub row: u16,
    /// Charge (raw ADC or calibrated value).
    pub value: f64,
    /// Owning plane index.
    pub plane: usize,
    /// Owning event index.
    pub event: usize,
}

impl Hit {
    /// Creates a new hit.
    #[inline]
    pub fn new(col: u16, row: u16, value: f64, plane: usize, event: usize) -> Self {
        Self {
            col,
            row,
            value,
            plane,
            event,
        }
    }

    /// Computes the squared Euclidean distance to another hit in pixel units.
    #[inline]
    pub fn distance_squared(&self, other: &Self) -> u32 {
        let dc = (i32::from(self.col) - i32::from(other.col)).unsigned_abs();
        let dr = (i32::from(self.row) - i32::from(other.row)).unsigned_abs();
        dc * dc + dr * dr
    }

    /// Checks if this hit is adjacent to another (8-connectivity).
    #[inline]
    pub fn adjacent_to(&self, other: &Self) -> bool {
        let dc = (f64::from(self.col) - f64::from(other.col)).abs();
        let dr = (f64::from(self.row) - f64::from(other.row)).abs();
        dc <= ADJACENCY_TOLERANCE && dr <= ADJACENCY_TOLERANCE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distance_squared() {
        let h1 = Hit::new(0, 0, 1.0, 0, 0);
        let h2 = Hit::new(3, 4, 1.0, 0, 0);
        assert_eq!(h1.distance_squared(&h2), 25);
    }

    #[test]
    fn test_adjacency() {
        let center = Hit::new(5, 5, 1.0, 0, 0);

        // Direct and diagonal neighbors
        assert!(center.adjacent_to(&Hit::new(4, 5, 1.0, 0, 0)));
        assert!(center.adjacent_to(&Hit::new(5, 4, 1.0, 0, 0)));
        assert!(center.adjacent_to(&Hit::new(4, 4, 1.0, 0, 0)));
        assert!(center.adjacent_to(&Hit::new(6, 6, 1.0, 0, 0)));

        // Two pixels away on either axis
        assert!(!center.adjacent_to(&Hit::new(7, 5, 1.0, 0, 0)));
        assert!(!center.adjacent_to(&Hit::new(5, 7, 1.0, 0, 0)));
        assert!(!center.adjacent_to(&Hit::new(7, 7, 1.0, 0, 0)));
    }
}
