//! Broad-phase collision detection over axis-aligned bounding boxes.
//!
//! The broad phase is a conservative filter: every truly overlapping pair
//! must be returned, extra pairs are acceptable, duplicates are not. Two
//! entry points serve the pipeline:
//!
//! - [`potential_overlap_pairs`] for the all-pairs sweep the active-set
//!   builder runs each step, and
//! - [`potential_overlaps`] for a single trial box against the scene, used
//!   by placement queries.
//!
//! Pairs come back in a `BTreeSet` keyed `(i, j)` with `i < j`, which fixes
//! the iteration order of everything built on top of the broad phase and
//! keeps the active set deterministic across runs.
//!
//! The sweep axis is chosen per call as the axis with the larger spread of
//! box centers, which keeps the interval lists short for flat scenes.

use std::collections::BTreeSet;

use shear2d_types::Aabb;

/// All index pairs whose AABBs may overlap, canonically ordered.
#[must_use]
pub fn potential_overlap_pairs(aabbs: &[Aabb]) -> BTreeSet<(usize, usize)> {
    let mut pairs = BTreeSet::new();
    if aabbs.len() < 2 {
        return pairs;
    }

    let sweep_x = sweep_along_x(aabbs);

    // Intervals on the sweep axis, sorted by minimum endpoint
    let mut intervals: Vec<(usize, f64, f64)> = aabbs
        .iter()
        .enumerate()
        .map(|(index, aabb)| {
            if sweep_x {
                (index, aabb.min.x, aabb.max.x)
            } else {
                (index, aabb.min.y, aabb.max.y)
            }
        })
        .collect();
    intervals.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));

    for (sweep_idx, &(index_a, _, max_a)) in intervals.iter().enumerate() {
        for &(index_b, min_b, _) in &intervals[sweep_idx + 1..] {
            // Once an interval starts past this one's end, none after it
            // can overlap either
            if min_b > max_a {
                break;
            }
            if aabbs[index_a].overlaps(&aabbs[index_b]) {
                pairs.insert((index_a.min(index_b), index_a.max(index_b)));
            }
        }
    }

    pairs
}

/// Indices of `aabbs` entries that may overlap the trial box.
///
/// The result is a set of original indices in increasing order, so it is
/// stable under permutation of equal inputs.
#[must_use]
pub fn potential_overlaps(trial: &Aabb, aabbs: &[Aabb]) -> Vec<usize> {
    aabbs
        .iter()
        .enumerate()
        .filter(|(_, aabb)| trial.overlaps(aabb))
        .map(|(index, _)| index)
        .collect()
}

/// Pick the sweep axis with the larger spread of box centers.
fn sweep_along_x(aabbs: &[Aabb]) -> bool {
    let mut min = [f64::INFINITY; 2];
    let mut max = [f64::NEG_INFINITY; 2];
    for aabb in aabbs {
        let center = 0.5 * (aabb.min + aabb.max);
        min[0] = min[0].min(center.x);
        min[1] = min[1].min(center.y);
        max[0] = max[0].max(center.x);
        max[1] = max[1].max(center.y);
    }
    (max[0] - min[0]) >= (max[1] - min[1])
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use nalgebra::Vector2;

    fn disk_aabb(x: f64, y: f64, r: f64) -> Aabb {
        Aabb::from_center(Vector2::new(x, y), Vector2::new(r, r))
    }

    #[test]
    fn test_overlapping_pair_found() {
        let aabbs = vec![disk_aabb(0.0, 0.0, 1.0), disk_aabb(1.5, 0.0, 1.0)];
        let pairs = potential_overlap_pairs(&aabbs);
        assert_eq!(pairs.len(), 1);
        assert!(pairs.contains(&(0, 1)));
    }

    #[test]
    fn test_separated_pair_rejected() {
        let aabbs = vec![disk_aabb(0.0, 0.0, 1.0), disk_aabb(5.0, 0.0, 1.0)];
        assert!(potential_overlap_pairs(&aabbs).is_empty());
    }

    #[test]
    fn test_pairs_are_canonically_ordered() {
        let aabbs = vec![
            disk_aabb(3.0, 0.0, 1.0),
            disk_aabb(0.0, 0.0, 1.0),
            disk_aabb(1.5, 0.0, 1.0),
        ];
        let pairs = potential_overlap_pairs(&aabbs);
        for &(i, j) in &pairs {
            assert!(i < j);
        }
        assert!(pairs.contains(&(0, 2)));
        assert!(pairs.contains(&(1, 2)));
    }

    #[test]
    fn test_no_duplicates_in_cluster() {
        // Four boxes all overlapping each other yield exactly C(4,2) pairs
        let aabbs: Vec<Aabb> = (0..4).map(|i| disk_aabb(0.1 * i as f64, 0.0, 1.0)).collect();
        let pairs = potential_overlap_pairs(&aabbs);
        assert_eq!(pairs.len(), 6);
    }

    #[test]
    fn test_vertical_scene_sweeps_y() {
        // Centers spread along y; the axis choice must not lose pairs
        let aabbs = vec![
            disk_aabb(0.0, 0.0, 1.0),
            disk_aabb(0.0, 1.5, 1.0),
            disk_aabb(0.0, 10.0, 1.0),
        ];
        let pairs = potential_overlap_pairs(&aabbs);
        assert_eq!(pairs.len(), 1);
        assert!(pairs.contains(&(0, 1)));
    }

    #[test]
    fn test_superset_of_true_overlaps() {
        let aabbs: Vec<Aabb> = (0..20)
            .map(|i| disk_aabb((i % 5) as f64 * 1.9, (i / 5) as f64 * 1.9, 1.0))
            .collect();
        let pairs = potential_overlap_pairs(&aabbs);
        for i in 0..aabbs.len() {
            for j in (i + 1)..aabbs.len() {
                if aabbs[i].overlaps(&aabbs[j]) {
                    assert!(pairs.contains(&(i, j)), "missing overlap ({i}, {j})");
                }
            }
        }
    }

    #[test]
    fn test_single_query_returns_sorted_indices() {
        let aabbs = vec![
            disk_aabb(0.0, 0.0, 1.0),
            disk_aabb(9.0, 0.0, 1.0),
            disk_aabb(1.0, 1.0, 1.0),
        ];
        let trial = disk_aabb(0.5, 0.5, 1.0);
        let hits = potential_overlaps(&trial, &aabbs);
        assert_eq!(hits, vec![0, 2]);
    }

    #[test]
    fn test_single_query_stable_under_permutation() {
        let a = disk_aabb(0.0, 0.0, 1.0);
        let b = disk_aabb(1.0, 1.0, 1.0);
        let c = disk_aabb(9.0, 0.0, 1.0);
        let trial = disk_aabb(0.5, 0.5, 1.0);

        let hits_abc = potential_overlaps(&trial, &[a, b, c]);
        let hits_cba = potential_overlaps(&trial, &[c, b, a]);
        // Same boxes match regardless of ordering; indices refer to the
        // respective input slices
        assert_eq!(hits_abc.len(), hits_cba.len());
        assert_eq!(hits_abc, vec![0, 1]);
        assert_eq!(hits_cba, vec![1, 2]);
    }

    #[test]
    fn test_empty_and_singleton_inputs() {
        assert!(potential_overlap_pairs(&[]).is_empty());
        assert!(potential_overlap_pairs(&[disk_aabb(0.0, 0.0, 1.0)]).is_empty());
    }
}
