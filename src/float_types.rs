//! Scalar type shared by every geometry in the crate.

/// Coordinate scalar. Shapefiles store coordinates as `f64`, so that is what we use.
pub type Real = f64;

/// Number of coordinates a closed ring needs to enclose any area.
pub const MIN_RING_COORDS: usize = 4;
