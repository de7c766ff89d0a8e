//! End-to-end reconciliation of a base dataset with regional overlays.

use crate::cascade::cascade_union;
use crate::dataset::Dataset;
use crate::errors::{MergeError, ValidationError};
use crate::index::SpatialIndex;
use crate::merge::merge_overlapping_in;
use crate::options::MergeOptions;
use crate::parallel::WorkerPool;
use crate::polygon::PolygonCollection;
use crate::select::{OverlapRecord, claimed_indices, select_overlap_in};
use crate::traits::PolygonOps;
use geo::{Intersects, Within};
use hashbrown::HashSet;
use tracing::{debug, info};

/// Counters describing one overlay merge.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MergeReport {
    /// Base polygons that claimed at least one overlay polygon.
    pub records: usize,
    /// Overlay polygons claimed by some base polygon.
    pub claimed: usize,
    /// Overlay polygons outside every base polygon that reach a claimed one
    /// through overlapping overlays, merged along with it.
    pub chained: usize,
    /// Base slots replaced by a union.
    pub replaced: usize,
    /// Union pieces and unmerged overlay groups appended to the base.
    pub appended: usize,
    /// Overlay polygons outside every base polygon and every chain, unioned
    /// with the ones they overlap and appended as new water.
    pub standalone: usize,
}

/// Merges one overlay dataset into `base`.
///
/// The overlay index must already be built; the base index is built if
/// missing, used to find overlay polygons not covered by any base polygon,
/// and dropped once the base changes. Overlay polygons that are neither
/// claimed nor inside a base polygon are new water bodies: those overlapping
/// a claimed polygon, directly or through other such polygons, join its
/// merge; the rest are unioned per overlapping group and appended.
pub fn merge_overlay(base: &mut Dataset, overlay: &Dataset, options: &MergeOptions) -> Result<MergeReport, MergeError> {
    merge_overlay_in(&WorkerPool::new(options)?, base, overlay)
}

/// [`merge_overlay`] on an existing worker pool.
pub fn merge_overlay_in(pool: &WorkerPool, base: &mut Dataset, overlay: &Dataset) -> Result<MergeReport, MergeError> {
    let (overlay_polygons, overlay_index) = overlay.indexed()?;
    base.ensure_index();

    let (mut records, standalone) = {
        let (base_polygons, base_index) = base.indexed()?;
        let records = select_overlap_in(pool, base_polygons, overlay_polygons, overlay_index)?;
        let claimed = claimed_indices(&records);
        let standalone = standalone_overlays(pool, base_polygons, base_index, overlay_polygons, &claimed)?;
        (records, standalone)
    };

    let claimed: usize = records.iter().map(OverlapRecord::len).sum();
    let mut free: HashSet<usize> = standalone.iter().copied().collect();
    for record in &mut records {
        let reached = reach(record.overlay_indices.clone(), &mut free, overlay_polygons, overlay_index)?;
        for ix in reached {
            record.overlay_indices.push(ix);
            record.polygons.push(overlay_polygons[ix].clone());
        }
    }
    let chained = standalone.len() - free.len();

    let mut new_water = Vec::new();
    for &ix in &standalone {
        if !free.remove(&ix) {
            continue;
        }
        let mut group = vec![ix];
        group.extend(reach(vec![ix], &mut free, overlay_polygons, overlay_index)?);
        if group.len() == 1 {
            new_water.push(overlay_polygons[ix].clone());
        } else {
            debug!(overlay = ix, members = group.len(), "overlapping standalone overlays unioned");
            let members: Vec<_> = group.iter().map(|&member| overlay_polygons[member].clone()).collect();
            new_water.extend(cascade_union(&members));
        }
    }

    let outcome = merge_overlapping_in(pool, base.polygons_mut(), &records)?;
    base.extend(new_water)?;

    let report = MergeReport {
        records: records.len(),
        claimed,
        chained,
        replaced: outcome.replaced,
        appended: outcome.appended,
        standalone: standalone.len() - chained,
    };
    info!(?report, total = base.len(), "overlay merged");
    Ok(report)
}

/// Merges every overlay in turn into the evolving base dataset.
pub fn update_all(
    base: &mut Dataset,
    overlays: &mut [Dataset],
    options: &MergeOptions,
) -> Result<Vec<MergeReport>, MergeError> {
    let pool = WorkerPool::new(options)?;
    let mut reports = Vec::with_capacity(overlays.len());
    for (ix, overlay) in overlays.iter_mut().enumerate() {
        info!(overlay = ix, polygons = overlay.len(), "merging overlay");
        overlay.ensure_index();
        reports.push(merge_overlay_in(&pool, base, overlay)?);
    }
    Ok(reports)
}

/// Unclaimed overlay polygons not lying within any base polygon.
///
/// An unclaimed overlay polygon that intersects a base polygon is always
/// inside it, otherwise the selection would have claimed it.
fn standalone_overlays(
    pool: &WorkerPool,
    base: &PolygonCollection,
    base_index: &SpatialIndex,
    overlay: &PolygonCollection,
    claimed: &HashSet<usize>,
) -> Result<Vec<usize>, MergeError> {
    let batches = pool.parallel_for(overlay.len(), |range| {
        let mut found = Vec::new();
        for ix in range {
            if claimed.contains(&ix) {
                continue;
            }
            let polygon = &overlay[ix];
            let envelope = polygon.envelope().ok_or(ValidationError::EmptyRing)?;
            let covered = base_index
                .query(&envelope)
                .any(|candidate| polygon.is_within(&base[candidate]));
            if !covered {
                found.push(ix);
            }
        }
        Ok(found)
    })?;
    Ok(batches.into_iter().flatten().collect())
}

/// Removes from `free` and returns every overlay polygon connected to
/// `frontier` through a chain of intersecting overlay polygons.
fn reach(
    mut frontier: Vec<usize>,
    free: &mut HashSet<usize>,
    overlay: &PolygonCollection,
    overlay_index: &SpatialIndex,
) -> Result<Vec<usize>, MergeError> {
    let mut reached = Vec::new();
    while let Some(ix) = frontier.pop() {
        if free.is_empty() {
            break;
        }
        let polygon = &overlay[ix];
        let envelope = polygon.envelope().ok_or(ValidationError::EmptyRing)?;
        let mut hits: Vec<usize> = overlay_index.query(&envelope).filter(|hit| free.contains(hit)).collect();
        hits.sort_unstable();
        for hit in hits {
            if polygon.intersects(&overlay[hit]) {
                free.remove(&hit);
                reached.push(hit);
                frontier.push(hit);
            }
        }
    }
    Ok(reached)
}
