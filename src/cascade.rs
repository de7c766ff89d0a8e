//! Smallest-first cascade union.

use crate::float_types::Real;
use crate::traits::PolygonOps;
use geo::{MultiPolygon, Polygon};
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// Heap entry ordered so that the smallest area pops first. Ties are broken
/// by insertion order, which keeps the merge sequence reproducible.
struct Pending {
    area: Real,
    seq: usize,
    geometry: MultiPolygon<Real>,
}

impl Pending {
    fn new(geometry: MultiPolygon<Real>, seq: usize) -> Self {
        Self { area: geometry.area(), seq, geometry }
    }
}

impl PartialEq for Pending {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Pending {}

impl PartialOrd for Pending {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Pending {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap: reverse both keys.
        other
            .area
            .total_cmp(&self.area)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Unions `polygons` into a set of disjoint polygons.
///
/// Each polygon enters a min-heap keyed on area; the two smallest entries are
/// repeatedly replaced by their union until one remains. Keeping the operands
/// small keeps each boolean operation cheap. Disjoint inputs stay separate
/// parts of the result.
///
/// An empty input gives an empty output and a single polygon is returned
/// unchanged without any union call.
pub fn cascade_union(polygons: &[Polygon<Real>]) -> Vec<Polygon<Real>> {
    match polygons {
        [] => return Vec::new(),
        [single] => return vec![single.clone()],
        _ => {},
    }

    let mut queue: BinaryHeap<Pending> = polygons
        .iter()
        .enumerate()
        .map(|(seq, polygon)| Pending::new(MultiPolygon::new(vec![polygon.clone()]), seq))
        .collect();
    let mut seq = polygons.len();

    while queue.len() > 1 {
        let (Some(first), Some(second)) = (queue.pop(), queue.pop()) else {
            break;
        };
        queue.push(Pending::new(first.geometry.merge(&second.geometry), seq));
        seq += 1;
    }

    queue
        .pop()
        .map(|last| last.geometry.into_parts())
        .unwrap_or_default()
}
