//! Adjacency agglomeration of per-event pixel hits.

use crate::cluster::Cluster;
use crate::hit::Hit;

/// Groups hits of one event/plane into clusters of adjacent pixels.
///
/// Pure function, deterministic for a fixed input ordering. The first hit
/// seeds the first cluster; each pass over the remaining hits absorbs every
/// hit adjacent to an existing cluster (clusters tested in creation order,
/// first match wins). A pass that absorbs nothing seeds a new cluster from
/// the first remaining hit. Quadratic in the hit count, which is fine at
/// typical per-event occupancies of tens of hits.
///
/// An empty input yields an empty output; it is not an error.
pub fn clusterise(hits: &[Hit]) -> Vec<Cluster> {
    let Some((seed, rest)) = hits.split_first() else {
        return Vec::new();
    };

    let mut clusters = vec![Cluster::seeded(*seed)];
    let mut remaining: Vec<Hit> = rest.to_vec();

    while !remaining.is_empty() {
        let mut absorbed = false;
        let mut i = 0;
        while i < remaining.len() {
            let hit = remaining[i];
            match clusters.iter_mut().find(|c| c.adjacent_to(&hit)) {
                Some(cluster) => {
                    cluster.push(remaining.remove(i));
                    absorbed = true;
                }
                None => i += 1,
            }
        }
        if !absorbed {
            let seed = remaining.remove(0);
            clusters.push(Cluster::seeded(seed));
        }
    }

    clusters
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn hit(col: u16, row: u16, value: f64) -> Hit {
        Hit::new(col, row, value, 0, 0)
    }

    #[test]
    fn test_empty_input() {
        assert!(clusterise(&[]).is_empty());
    }

    #[test]
    fn test_single_hit() {
        let clusters = clusterise(&[hit(7, 9, 42.0)]);
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].size(), 1);
        assert_relative_eq!(clusters[0].charge(), 42.0);
    }

    #[test]
    fn test_diagonal_pair_merges() {
        let clusters = clusterise(&[hit(0, 0, 10.0), hit(1, 1, 5.0)]);
        assert_eq!(clusters.len(), 1);
        assert_relative_eq!(clusters[0].charge(), 15.0);
        let (col, row) = clusters[0].centroid();
        assert_relative_eq!(col, 1.0 / 3.0, max_relative = 1e-12);
        assert_relative_eq!(row, 1.0 / 3.0, max_relative = 1e-12);
    }

    #[test]
    fn test_isolated_hits_stay_singletons() {
        let clusters = clusterise(&[hit(0, 0, 1.0), hit(5, 5, 2.0)]);
        assert_eq!(clusters.len(), 2);
        assert_eq!(clusters[0].size(), 1);
        assert_eq!(clusters[1].size(), 1);
        assert_relative_eq!(clusters[0].charge(), 1.0);
        assert_relative_eq!(clusters[1].charge(), 2.0);
    }

    #[test]
    fn test_transitive_chain_joins_one_cluster() {
        // (2,2) only touches the seed through (1,1), which appears later in
        // the input; a second pass has to pick it up.
        let clusters = clusterise(&[hit(0, 0, 1.0), hit(2, 2, 1.0), hit(1, 1, 1.0)]);
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].size(), 3);
    }

    #[test]
    fn test_long_diagonal_chain() {
        let hits: Vec<Hit> = (0..6).map(|i| hit(i, i, 1.0)).collect();
        let clusters = clusterise(&hits);
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].size(), 6);
    }

    #[test]
    fn test_two_blobs_with_gap() {
        let hits = [
            hit(0, 0, 4.0),
            hit(1, 0, 4.0),
            hit(0, 1, 4.0),
            hit(10, 10, 7.0),
            hit(11, 10, 8.0),
        ];
        let clusters = clusterise(&hits);
        assert_eq!(clusters.len(), 2);
        assert_eq!(clusters[0].size(), 3);
        assert_eq!(clusters[1].size(), 2);
        assert_relative_eq!(clusters[0].charge(), 12.0);
        assert_relative_eq!(clusters[1].charge(), 15.0);
    }

    #[test]
    fn test_determinism_for_fixed_order() {
        let hits = [
            hit(3, 3, 1.0),
            hit(9, 1, 2.0),
            hit(4, 4, 3.0),
            hit(9, 2, 4.0),
            hit(5, 5, 5.0),
        ];
        let first = clusterise(&hits);
        let second = clusterise(&hits);
        assert_eq!(first, second);
    }

    #[test]
    fn test_euclidean_neighbors_share_a_cluster() {
        // Every pair within Euclidean reach 1.1 must land in the same
        // cluster, directly or through intermediates.
        let hits = [
            hit(0, 0, 1.0),
            hit(1, 0, 1.0),
            hit(1, 1, 1.0),
            hit(8, 8, 1.0),
            hit(8, 9, 1.0),
        ];
        let clusters = clusterise(&hits);

        let membership = |needle: &Hit| {
            clusters
                .iter()
                .position(|c| c.hits().contains(needle))
                .unwrap()
        };
        for a in &hits {
            for b in &hits {
                if f64::from(a.distance_squared(b)).sqrt() <= 1.1 {
                    assert_eq!(membership(a), membership(b));
                }
            }
        }
        assert_eq!(clusters.len(), 2);
    }

    #[test]
    fn test_charge_conservation() {
        let hits = [
            hit(0, 0, 1.5),
            hit(0, 1, 2.5),
            hit(20, 20, 4.0),
            hit(21, 21, 8.0),
        ];
        let clusters = clusterise(&hits);
        let total: f64 = clusters.iter().map(Cluster::charge).sum();
        let expected: f64 = hits.iter().map(|h| h.value).sum();
        assert_relative_eq!(total, expected);
    }
}
