//! Cluster of adjacent hits within one event and plane.

use crate::hit::Hit;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A maximal set of mutually adjacent hits in one event/plane.
///
/// The cluster exclusively owns its hit list; it is built incrementally by
/// [`clusterise`](crate::clustering::clusterise) and read-only afterwards.
/// Charge, centroid and size are derived from the members on demand.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Cluster {
    hits: Vec<Hit>,
}

impl Cluster {
    /// Creates a cluster seeded with a single hit.
    #[inline]
    pub fn seeded(hit: Hit) -> Self {
        Self { hits: vec![hit] }
    }

    /// Adds a hit to the cluster.
    #[inline]
    pub(crate) fn push(&mut self, hit: Hit) {
        self.hits.push(hit);
    }

    /// Checks whether a hit is adjacent to any member of this cluster.
    pub fn adjacent_to(&self, hit: &Hit) -> bool {
        self.hits.iter().any(|member| member.adjacent_to(hit))
    }

    /// Number of member hits.
    #[inline]
    pub fn size(&self) -> usize {
        self.hits.len()
    }

    /// Member hits in insertion order.
    #[inline]
    pub fn hits(&self) -> &[Hit] {
        &self.hits
    }

    /// Total charge: exact sum of member hit charges.
    pub fn charge(&self) -> f64 {
        self.hits.iter().map(|hit| hit.value).sum()
    }

    /// Charge-weighted mean position in local (column, row) pixel units.
    ///
    /// Falls back to the arithmetic mean of member positions when the total
    /// charge is zero, so the centroid is always finite.
    pub fn centroid(&self) -> (f64, f64) {
        let mut sum_weight = 0.0;
        let mut sum_col = 0.0;
        let mut sum_row = 0.0;
        for hit in &self.hits {
            sum_weight += hit.value;
            sum_col += hit.value * f64::from(hit.col);
            sum_row += hit.value * f64::from(hit.row);
        }

        if sum_weight == 0.0 {
            let n = self.hits.len() as f64;
            let col = self.hits.iter().map(|h| f64::from(h.col)).sum::<f64>() / n;
            let row = self.hits.iter().map(|h| f64::from(h.row)).sum::<f64>() / n;
            (col, row)
        } else {
            (sum_col / sum_weight, sum_row / sum_weight)
        }
    }

    /// Event index of the member hits.
    #[inline]
    pub fn event(&self) -> usize {
        self.hits[0].event
    }

    /// Plane index of the member hits.
    #[inline]
    pub fn plane(&self) -> usize {
        self.hits[0].plane
    }
}
