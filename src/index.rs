//! Bulk-loaded R*-tree over polygon envelopes.

use crate::aabb::Aabb;
use crate::float_types::Real;
use crate::polygon::PolygonCollection;
use crate::traits::PolygonOps;
use rstar::RTree;
use rstar::primitives::{GeomWithData, Rectangle};

/// Index entry: the polygon envelope tagged with the polygon position.
type Entry = GeomWithData<Rectangle<[Real; 2]>, usize>;

/// Immutable snapshot of the envelopes of one [`PolygonCollection`].
///
/// Queries return collection indices, never references, so the index does not
/// borrow the collection. It must be rebuilt after any change to the
/// collection; [`Dataset`](crate::dataset::Dataset) takes care of that.
#[derive(Debug, Clone)]
pub struct SpatialIndex {
    tree: RTree<Entry>,
}

impl SpatialIndex {
    pub fn build(polygons: &PolygonCollection) -> Self {
        let entries: Vec<Entry> = polygons
            .iter()
            .enumerate()
            .filter_map(|(ix, polygon)| {
                polygon.envelope().map(|bb| {
                    let rect = Rectangle::from_corners([bb.mins.x, bb.mins.y], [bb.maxs.x, bb.maxs.y]);
                    GeomWithData::new(rect, ix)
                })
            })
            .collect();
        Self { tree: RTree::bulk_load(entries) }
    }

    /// Indices of every polygon whose envelope intersects `bbox`.
    ///
    /// Envelope intersection is necessary but not sufficient for polygon
    /// intersection; callers confirm matches with exact predicates. No order
    /// is guaranteed.
    pub fn query(&self, bbox: &Aabb) -> impl Iterator<Item = usize> + '_ {
        self.tree
            .locate_in_envelope_intersecting(&bbox.to_envelope())
            .map(|entry| entry.data)
    }

    pub fn len(&self) -> usize {
        self.tree.size()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{Polygon, polygon};

    fn square(x: Real, y: Real, size: Real) -> Polygon<Real> {
        polygon![
            (x: x, y: y),
            (x: x + size, y: y),
            (x: x + size, y: y + size),
            (x: x, y: y + size)
        ]
    }

    #[test]
    fn query_returns_envelope_hits() {
        let polygons = PolygonCollection::from_polygons(vec![
            square(0.0, 0.0, 1.0),
            square(5.0, 5.0, 1.0),
            square(0.5, 0.5, 1.0),
        ])
        .unwrap();
        let index = SpatialIndex::build(&polygons);
        assert_eq!(index.len(), 3);

        let mut hits: Vec<usize> = index.query(&Aabb::from_bounds(0.0, 0.0, 0.75, 0.75)).collect();
        hits.sort_unstable();
        assert_eq!(hits, vec![0, 2]);

        assert_eq!(index.query(&Aabb::from_bounds(10.0, 10.0, 11.0, 11.0)).count(), 0);
    }

    #[test]
    fn touching_envelope_is_a_candidate() {
        let polygons = PolygonCollection::from_polygons(vec![square(1.0, 0.0, 1.0)]).unwrap();
        let index = SpatialIndex::build(&polygons);
        assert_eq!(index.query(&Aabb::from_bounds(0.0, 0.0, 1.0, 1.0)).count(), 1);
    }

    #[test]
    fn empty_collection_builds_empty_index() {
        let index = SpatialIndex::build(&PolygonCollection::new());
        assert!(index.is_empty());
        assert_eq!(index.query(&Aabb::from_bounds(0.0, 0.0, 1.0, 1.0)).count(), 0);
    }
}
