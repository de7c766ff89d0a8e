use crate::aabb::Aabb;
use crate::float_types::Real;
use geo::{Area, BooleanOps as GeoBool, BoundingRect, MultiPolygon, Polygon};

/// Geometry primitives the merge engine relies on.
///
/// Predicates (`intersects`, `is_within`) are used straight from `geo`; this
/// trait only gathers the operations whose result type matters to the engine.
pub trait PolygonOps: Sized + Clone {
    /// Axis aligned envelope, `None` for an empty geometry.
    fn envelope(&self) -> Option<Aabb>;

    /// Unsigned area, holes subtracted.
    fn area(&self) -> Real;

    /// Geometric union. The result may hold several disjoint parts.
    fn merge(&self, other: &Self) -> MultiPolygon<Real>;

    /// Splits the geometry into its simple polygons.
    fn into_parts(self) -> Vec<Polygon<Real>>;
}

impl PolygonOps for Polygon<Real> {
    fn envelope(&self) -> Option<Aabb> {
        self.bounding_rect().map(Aabb::from)
    }

    fn area(&self) -> Real {
        self.unsigned_area()
    }

    fn merge(&self, other: &Self) -> MultiPolygon<Real> {
        GeoBool::union(self, other)
    }

    fn into_parts(self) -> Vec<Polygon<Real>> {
        vec![self]
    }
}

impl PolygonOps for MultiPolygon<Real> {
    fn envelope(&self) -> Option<Aabb> {
        self.bounding_rect().map(Aabb::from)
    }

    fn area(&self) -> Real {
        self.unsigned_area()
    }

    fn merge(&self, other: &Self) -> MultiPolygon<Real> {
        GeoBool::union(self, other)
    }

    fn into_parts(self) -> Vec<Polygon<Real>> {
        self.0
    }
}
