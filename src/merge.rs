//! Folds selected overlay polygons into their base polygons.

use crate::cascade::cascade_union;
use crate::errors::MergeError;
use crate::float_types::Real;
use crate::options::MergeOptions;
use crate::parallel::WorkerPool;
use crate::polygon::{PolygonCollection, validate};
use crate::select::OverlapRecord;
use crate::traits::PolygonOps;
use geo::{MultiPolygon, Polygon};
use tracing::{debug, info};

/// What the merge changed in the base collection.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MergeOutcome {
    /// Base slots whose polygon was replaced by a union.
    pub replaced: usize,
    /// Polygons appended after the existing entries.
    pub appended: usize,
}

/// Result of merging one record, computed without touching the base collection.
#[derive(Debug)]
struct SlotUpdate {
    base_index: usize,
    replacement: Option<Polygon<Real>>,
    extra: Vec<Polygon<Real>>,
}

/// Merges every record into `base`.
///
/// For each record the matched overlay polygons are cascade-unioned. The first
/// reduced polygon is unioned with the base polygon: the first resulting piece
/// replaces the base slot and any further pieces are appended. The remaining
/// reduced polygons are appended as they are, without touching the base
/// polygon. Appends happen once, after every record has been processed.
///
/// Records must reference distinct, valid base indices. The base spatial index
/// is not rebuilt here.
pub fn merge_overlapping(
    base: &mut PolygonCollection,
    records: &[OverlapRecord],
    options: &MergeOptions,
) -> Result<MergeOutcome, MergeError> {
    merge_overlapping_in(&WorkerPool::new(options)?, base, records)
}

/// [`merge_overlapping`] on an existing worker pool.
pub fn merge_overlapping_in(
    pool: &WorkerPool,
    base: &mut PolygonCollection,
    records: &[OverlapRecord],
) -> Result<MergeOutcome, MergeError> {
    let updates = {
        let snapshot: &PolygonCollection = base;
        pool.parallel_for(records.len(), |range| {
            records[range]
                .iter()
                .filter_map(|record| merge_record(snapshot, record).transpose())
                .collect::<Result<Vec<_>, _>>()
        })?
    };

    let mut outcome = MergeOutcome::default();
    let mut extra_polygons = Vec::new();
    for update in updates.into_iter().flatten() {
        if let Some(polygon) = update.replacement {
            base.replace(update.base_index, polygon)?;
            outcome.replaced += 1;
        }
        extra_polygons.extend(update.extra);
    }
    outcome.appended = extra_polygons.len();
    base.extend(extra_polygons)?;

    info!(
        records = records.len(),
        replaced = outcome.replaced,
        appended = outcome.appended,
        "overlapping polygons merged"
    );
    Ok(outcome)
}

fn merge_record(base: &PolygonCollection, record: &OverlapRecord) -> Result<Option<SlotUpdate>, MergeError> {
    let mut reduced = cascade_union(&record.polygons).into_iter();
    let Some(first) = reduced.next() else {
        return Ok(None);
    };

    let water = MultiPolygon::new(vec![base[record.base_index].clone()]);
    let mut pieces = water.merge(&MultiPolygon::new(vec![first])).into_parts().into_iter();

    let replacement = pieces.next();
    let extra: Vec<Polygon<Real>> = pieces.chain(reduced).collect();
    if let Some(polygon) = &replacement {
        validate(polygon)?;
    }
    for polygon in &extra {
        validate(polygon)?;
    }

    debug!(base = record.base_index, extra = extra.len(), "record merged");
    Ok(Some(SlotUpdate { base_index: record.base_index, replacement, extra }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::polygon;

    fn square(x: Real, y: Real, size: Real) -> Polygon<Real> {
        polygon![(x: x, y: y), (x: x + size, y: y), (x: x + size, y: y + size), (x: x, y: y + size)]
    }

    fn record(base_index: usize, polygons: Vec<Polygon<Real>>) -> OverlapRecord {
        OverlapRecord { base_index, overlay_indices: (0..polygons.len()).collect(), polygons }
    }

    #[test]
    fn overlapping_square_grows_base() {
        let mut base = PolygonCollection::from_polygons(vec![square(0.0, 0.0, 10.0)]).unwrap();
        let outcome = merge_overlapping(
            &mut base,
            &[record(0, vec![square(5.0, 5.0, 10.0)])],
            &MergeOptions::sequential(),
        )
        .unwrap();

        assert_eq!(outcome, MergeOutcome { replaced: 1, appended: 0 });
        assert_eq!(base.len(), 1);
        assert!((base[0].area() - 175.0).abs() < 1e-9);
    }

    #[test]
    fn disjoint_matches_are_appended_unmerged() {
        let mut base = PolygonCollection::from_polygons(vec![square(0.0, 0.0, 10.0)]).unwrap();
        // Both touch the base, but not each other.
        let matches = vec![square(9.0, 0.0, 2.0), square(-1.0, 8.0, 2.0)];
        let outcome = merge_overlapping(&mut base, &[record(0, matches)], &MergeOptions::sequential()).unwrap();

        assert_eq!(outcome.replaced, 1);
        assert_eq!(outcome.appended, 1);
        assert_eq!(base.len(), 2);
        assert!(base[0].area() > 100.0);
    }

    #[test]
    fn empty_records_leave_base_alone() {
        let mut base = PolygonCollection::from_polygons(vec![square(0.0, 0.0, 1.0)]).unwrap();
        let before = base.clone();
        let outcome = merge_overlapping(&mut base, &[], &MergeOptions::default()).unwrap();
        assert_eq!(outcome, MergeOutcome::default());
        assert_eq!(base, before);
    }
}
