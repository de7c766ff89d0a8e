//! A polygon collection together with its (optional) spatial index.

use crate::errors::MergeError;
use crate::float_types::Real;
use crate::index::SpatialIndex;
use crate::polygon::PolygonCollection;
use geo::Polygon;

/// One loaded layer: the base water polygons or a regional overlay.
///
/// The index is built on demand and dropped whenever the collection changes
/// structurally, so a stale index is never handed out.
#[derive(Clone, Debug, Default)]
pub struct Dataset {
    polygons: PolygonCollection,
    index: Option<SpatialIndex>,
}

impl Dataset {
    pub fn new(polygons: PolygonCollection) -> Self {
        Self { polygons, index: None }
    }

    pub fn polygons(&self) -> &PolygonCollection {
        &self.polygons
    }

    /// Mutable access for in-place replacement. Drops the index, since any
    /// edit may move a polygon's envelope.
    pub(crate) fn polygons_mut(&mut self) -> &mut PolygonCollection {
        self.index = None;
        &mut self.polygons
    }

    pub fn into_polygons(self) -> PolygonCollection {
        self.polygons
    }

    pub fn len(&self) -> usize {
        self.polygons.len()
    }

    pub fn is_empty(&self) -> bool {
        self.polygons.is_empty()
    }

    /// Bulk-loads the R*-tree over the current polygons, replacing any previous index.
    pub fn build_index(&mut self) -> &SpatialIndex {
        self.index.insert(SpatialIndex::build(&self.polygons))
    }

    /// Builds the index unless one is already present.
    pub fn ensure_index(&mut self) -> &SpatialIndex {
        self.index.get_or_insert_with(|| SpatialIndex::build(&self.polygons))
    }

    pub fn is_index_built(&self) -> bool {
        self.index.is_some()
    }

    pub fn index(&self) -> Result<&SpatialIndex, MergeError> {
        self.index.as_ref().ok_or(MergeError::IndexNotBuilt)
    }

    /// Index and polygons in one borrow, for read-only query phases.
    pub fn indexed(&self) -> Result<(&PolygonCollection, &SpatialIndex), MergeError> {
        Ok((&self.polygons, self.index()?))
    }

    pub fn append(&mut self, polygon: Polygon<Real>) -> Result<usize, MergeError> {
        self.index = None;
        self.polygons.push(polygon)
    }

    pub fn extend<I>(&mut self, polygons: I) -> Result<(), MergeError>
    where
        I: IntoIterator<Item = Polygon<Real>>,
    {
        self.index = None;
        self.polygons.extend(polygons)
    }

    /// Appends every polygon of `other` and rebuilds the index.
    pub fn append_dataset(&mut self, other: &Dataset) -> Result<(), MergeError> {
        self.extend(other.polygons.iter().cloned())?;
        self.build_index();
        Ok(())
    }
}

impl From<PolygonCollection> for Dataset {
    fn from(polygons: PolygonCollection) -> Self {
        Self::new(polygons)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aabb::Aabb;
    use geo::polygon;

    #[test]
    fn query_before_build_fails() {
        let dataset = Dataset::default();
        assert!(matches!(dataset.index(), Err(MergeError::IndexNotBuilt)));
        assert!(dataset.indexed().is_err());
    }

    #[test]
    fn append_invalidates_index() {
        let mut dataset = Dataset::default();
        dataset.build_index();
        assert!(dataset.is_index_built());

        dataset
            .append(polygon![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0), (x: 1.0, y: 1.0)])
            .unwrap();
        assert!(!dataset.is_index_built());
        assert_eq!(dataset.ensure_index().len(), 1);
    }

    #[test]
    fn in_place_edit_drops_index() {
        let square = polygon![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0), (x: 1.0, y: 1.0), (x: 0.0, y: 1.0)];
        let bigger = polygon![(x: 0.0, y: 0.0), (x: 5.0, y: 0.0), (x: 5.0, y: 5.0), (x: 0.0, y: 5.0)];
        let mut dataset = Dataset::new(PolygonCollection::from_polygons(vec![square]).unwrap());
        dataset.build_index();

        dataset.polygons_mut().replace(0, bigger).unwrap();
        assert!(!dataset.is_index_built());
        let hits: Vec<usize> = dataset.ensure_index().query(&Aabb::from_bounds(4.0, 4.0, 6.0, 6.0)).collect();
        assert_eq!(hits, vec![0]);
    }

    #[test]
    fn append_dataset_rebuilds() {
        let square = polygon![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0), (x: 1.0, y: 1.0), (x: 0.0, y: 1.0)];
        let other = Dataset::new(PolygonCollection::from_polygons(vec![square.clone(), square]).unwrap());
        let mut dataset = Dataset::default();
        dataset.append_dataset(&other).unwrap();
        assert_eq!(dataset.len(), 2);
        assert_eq!(dataset.index().unwrap().len(), 2);
    }
}
