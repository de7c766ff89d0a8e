//! Owned, index-addressed polygon storage.
//!
//! A [`PolygonCollection`] is the unit of "a dataset". Polygons never move
//! once inserted, so their position is a stable identity that the spatial
//! index and the claim set can share without borrowing the polygons.

use crate::aabb::Aabb;
use crate::errors::{MergeError, ValidationError};
use crate::float_types::{MIN_RING_COORDS, Real};
use crate::traits::PolygonOps;
use geo::{LineString, Polygon};
use std::ops::Index;

/// Checks that `polygon` may enter a collection.
pub fn validate(polygon: &Polygon<Real>) -> Result<(), ValidationError> {
    if polygon.exterior().0.is_empty() {
        return Err(ValidationError::EmptyRing);
    }
    let rings = std::iter::once(polygon.exterior()).chain(polygon.interiors());
    for (ring, line) in rings.enumerate() {
        check_ring(ring, line)?;
    }
    Ok(())
}

fn check_ring(ring: usize, line: &LineString<Real>) -> Result<(), ValidationError> {
    if line.0.len() < MIN_RING_COORDS {
        return Err(ValidationError::TooFewPoints { ring, count: line.0.len() });
    }
    if let Some(bad) = line.0.iter().find(|c| !c.x.is_finite() || !c.y.is_finite()) {
        return Err(ValidationError::InvalidCoordinate(*bad));
    }
    Ok(())
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct PolygonCollection {
    polygons: Vec<Polygon<Real>>,
}

impl PolygonCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a collection, rejecting the whole batch on the first invalid polygon.
    pub fn from_polygons(polygons: Vec<Polygon<Real>>) -> Result<Self, MergeError> {
        for polygon in &polygons {
            validate(polygon)?;
        }
        Ok(Self { polygons })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.polygons.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.polygons.is_empty()
    }

    #[inline]
    pub fn get(&self, index: usize) -> Option<&Polygon<Real>> {
        self.polygons.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Polygon<Real>> {
        self.polygons.iter()
    }

    pub fn as_slice(&self) -> &[Polygon<Real>] {
        &self.polygons
    }

    pub fn into_polygons(self) -> Vec<Polygon<Real>> {
        self.polygons
    }

    /// Appends a polygon and returns its index.
    pub fn push(&mut self, polygon: Polygon<Real>) -> Result<usize, MergeError> {
        validate(&polygon)?;
        self.polygons.push(polygon);
        Ok(self.polygons.len() - 1)
    }

    /// Appends every polygon, or none of them if one is invalid.
    pub fn extend<I>(&mut self, polygons: I) -> Result<(), MergeError>
    where
        I: IntoIterator<Item = Polygon<Real>>,
    {
        let polygons: Vec<_> = polygons.into_iter().collect();
        for polygon in &polygons {
            validate(polygon)?;
        }
        self.polygons.extend(polygons);
        Ok(())
    }

    /// Replaces the polygon at `index`, returning the previous one.
    ///
    /// # Panics
    /// Panics if `index` is out of bounds.
    pub fn replace(&mut self, index: usize, polygon: Polygon<Real>) -> Result<Polygon<Real>, MergeError> {
        validate(&polygon)?;
        Ok(std::mem::replace(&mut self.polygons[index], polygon))
    }

    pub fn total_area(&self) -> Real {
        self.polygons.iter().map(PolygonOps::area).sum()
    }

    /// Envelope of the whole collection, `None` when empty.
    pub fn bounding_box(&self) -> Option<Aabb> {
        self.polygons
            .iter()
            .filter_map(PolygonOps::envelope)
            .reduce(|acc, bb| acc.union(&bb))
    }
}

impl Index<usize> for PolygonCollection {
    type Output = Polygon<Real>;

    fn index(&self, index: usize) -> &Self::Output {
        &self.polygons[index]
    }
}

impl<'a> IntoIterator for &'a PolygonCollection {
    type Item = &'a Polygon<Real>;
    type IntoIter = std::slice::Iter<'a, Polygon<Real>>;

    fn into_iter(self) -> Self::IntoIter {
        self.polygons.iter()
    }
}
