//! Overlap selection: which overlay polygons belong to which base polygon.

use crate::claims::ClaimSet;
use crate::errors::{MergeError, ValidationError};
use crate::float_types::Real;
use crate::index::SpatialIndex;
use crate::options::MergeOptions;
use crate::parallel::WorkerPool;
use crate::polygon::PolygonCollection;
use crate::traits::PolygonOps;
use geo::{Intersects, Polygon, Within};
use hashbrown::HashSet;
use std::ops::Range;
use tracing::{debug, info};

/// The overlay polygons claimed by one base polygon.
///
/// `overlay_indices[i]` is the overlay collection position of `polygons[i]`.
#[derive(Clone, Debug, PartialEq)]
pub struct OverlapRecord {
    pub base_index: usize,
    pub overlay_indices: Vec<usize>,
    pub polygons: Vec<Polygon<Real>>,
}

impl OverlapRecord {
    pub fn len(&self) -> usize {
        self.polygons.len()
    }

    pub fn is_empty(&self) -> bool {
        self.polygons.is_empty()
    }
}

/// Pairs every base polygon with the overlay polygons that genuinely overlap it.
///
/// An overlay polygon is claimed by at most one base polygon across the whole
/// call. Overlay polygons already lying inside the base polygon are skipped
/// without being claimed, since merging them changes nothing. When two base
/// polygons compete for the same overlay polygon on different workers, which
/// one wins depends on scheduling.
pub fn select_overlap(
    base: &PolygonCollection,
    overlay: &PolygonCollection,
    overlay_index: &SpatialIndex,
    options: &MergeOptions,
) -> Result<Vec<OverlapRecord>, MergeError> {
    select_overlap_in(&WorkerPool::new(options)?, base, overlay, overlay_index)
}

/// [`select_overlap`] on an existing worker pool.
pub fn select_overlap_in(
    pool: &WorkerPool,
    base: &PolygonCollection,
    overlay: &PolygonCollection,
    overlay_index: &SpatialIndex,
) -> Result<Vec<OverlapRecord>, MergeError> {
    let claims = ClaimSet::new();
    let batches = pool.parallel_for(base.len(), |range| {
        select_range(base, overlay, overlay_index, &claims, range)
    })?;

    let records: Vec<OverlapRecord> = batches.into_iter().flatten().collect();
    info!(
        base = base.len(),
        overlay = overlay.len(),
        records = records.len(),
        claimed = claims.len(),
        "overlap selection complete"
    );
    Ok(records)
}

fn select_range(
    base: &PolygonCollection,
    overlay: &PolygonCollection,
    overlay_index: &SpatialIndex,
    claims: &ClaimSet,
    range: Range<usize>,
) -> Result<Vec<OverlapRecord>, MergeError> {
    let mut result = Vec::new();

    for ix in range {
        let water = &base[ix];
        let envelope = water.envelope().ok_or(ValidationError::EmptyRing)?;

        let mut candidates: Vec<usize> = overlay_index.query(&envelope).collect();
        if candidates.is_empty() {
            continue;
        }
        candidates.sort_unstable();

        let mut record = OverlapRecord { base_index: ix, overlay_indices: Vec::new(), polygons: Vec::new() };
        for candidate in candidates {
            if claims.contains(candidate) {
                continue;
            }
            let area = &overlay[candidate];
            if !water.intersects(area) || area.is_within(water) {
                continue;
            }
            if claims.try_claim(candidate) {
                record.overlay_indices.push(candidate);
                record.polygons.push(area.clone());
            }
        }

        if !record.is_empty() {
            debug!(base = ix, matches = record.len(), "overlay polygons claimed");
            result.push(record);
        }
    }
    Ok(result)
}

/// Overlay positions referenced by `records`.
pub fn claimed_indices(records: &[OverlapRecord]) -> HashSet<usize> {
    records
        .iter()
        .flat_map(|record| record.overlay_indices.iter().copied())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::polygon;

    fn square(x: Real, y: Real, size: Real) -> Polygon<Real> {
        polygon![(x: x, y: y), (x: x + size, y: y), (x: x + size, y: y + size), (x: x, y: y + size)]
    }

    fn select(base: Vec<Polygon<Real>>, overlay: Vec<Polygon<Real>>, options: MergeOptions) -> Vec<OverlapRecord> {
        let base = PolygonCollection::from_polygons(base).unwrap();
        let overlay = PolygonCollection::from_polygons(overlay).unwrap();
        let index = SpatialIndex::build(&overlay);
        select_overlap(&base, &overlay, &index, &options).unwrap()
    }

    #[test]
    fn partial_overlap_is_claimed() {
        let records = select(
            vec![square(0.0, 0.0, 10.0)],
            vec![square(5.0, 5.0, 10.0), square(20.0, 20.0, 1.0)],
            MergeOptions::sequential(),
        );
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].base_index, 0);
        assert_eq!(records[0].overlay_indices, vec![0]);
        assert_eq!(records[0].polygons[0], square(5.0, 5.0, 10.0));
    }

    #[test]
    fn contained_overlay_is_skipped() {
        let records = select(
            vec![square(0.0, 0.0, 10.0)],
            vec![square(2.0, 2.0, 1.0)],
            MergeOptions::sequential(),
        );
        assert!(records.is_empty());
    }

    #[test]
    fn envelope_hit_without_intersection_is_skipped() {
        // L-shaped base whose envelope covers the overlay, but not its interior.
        let base = polygon![
            (x: 0.0, y: 0.0), (x: 10.0, y: 0.0), (x: 10.0, y: 1.0),
            (x: 1.0, y: 1.0), (x: 1.0, y: 10.0), (x: 0.0, y: 10.0)
        ];
        let records = select(vec![base], vec![square(5.0, 5.0, 1.0)], MergeOptions::sequential());
        assert!(records.is_empty());
    }

    #[test]
    fn shared_overlay_is_claimed_once() {
        let records = select(
            vec![square(0.0, 0.0, 10.0), square(10.0, 0.0, 10.0)],
            vec![square(8.0, 2.0, 4.0)],
            MergeOptions::sequential(),
        );
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].base_index, 0);
        assert_eq!(claimed_indices(&records).len(), 1);
    }
}
