//! Test support library
//! Provides various helper functions & utilities for tests.
#![allow(dead_code)]

use geo::{LineString, Polygon};
use hydromerge::{Dataset, PolygonCollection, float_types::Real};

/// Quick helper to compare floating-point results with an acceptable tolerance.
pub fn approx_eq(a: Real, b: Real, eps: Real) -> bool {
    (a - b).abs() < eps
}

/// Axis-aligned square with its lower-left corner at `(x, y)`.
pub fn square(x: Real, y: Real, size: Real) -> Polygon<Real> {
    rect(x, y, x + size, y + size)
}

/// Axis-aligned rectangle from its corners.
pub fn rect(x_min: Real, y_min: Real, x_max: Real, y_max: Real) -> Polygon<Real> {
    Polygon::new(
        LineString::from(vec![(x_min, y_min), (x_max, y_min), (x_max, y_max), (x_min, y_max), (x_min, y_min)]),
        vec![],
    )
}

/// Square of side `size` at `(x, y)` with a square hole of side `hole` centred in it.
pub fn square_with_hole(x: Real, y: Real, size: Real, hole: Real) -> Polygon<Real> {
    let inset = (size - hole) / 2.0;
    let (hx, hy) = (x + inset, y + inset);
    Polygon::new(
        LineString::from(vec![(x, y), (x + size, y), (x + size, y + size), (x, y + size), (x, y)]),
        vec![LineString::from(vec![(hx, hy), (hx, hy + hole), (hx + hole, hy + hole), (hx + hole, hy), (hx, hy)])],
    )
}

pub fn collection(polygons: Vec<Polygon<Real>>) -> PolygonCollection {
    PolygonCollection::from_polygons(polygons).expect("test polygons are valid")
}

/// Dataset with its spatial index already built.
pub fn indexed(polygons: Vec<Polygon<Real>>) -> Dataset {
    let mut dataset = Dataset::new(collection(polygons));
    dataset.build_index();
    dataset
}
