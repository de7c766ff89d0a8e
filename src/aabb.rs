//! Axis aligned envelope of a polygon.

use crate::float_types::Real;
use geo::{Coord, Rect};
use rstar::AABB;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Aabb {
    pub mins: Coord<Real>,
    pub maxs: Coord<Real>,
}

impl Aabb {
    /// Builds a box from two opposite corners given in any order.
    #[inline]
    pub fn new(a: Coord<Real>, b: Coord<Real>) -> Self {
        Self {
            mins: Coord { x: a.x.min(b.x), y: a.y.min(b.y) },
            maxs: Coord { x: a.x.max(b.x), y: a.y.max(b.y) },
        }
    }

    #[inline]
    pub fn from_bounds(x_min: Real, y_min: Real, x_max: Real, y_max: Real) -> Self {
        Self::new(Coord { x: x_min, y: y_min }, Coord { x: x_max, y: y_max })
    }

    /// Boxes that only share an edge or a corner still intersect.
    #[inline]
    pub fn intersects(&self, other: &Self) -> bool {
        self.maxs.x >= other.mins.x
            && self.mins.x <= other.maxs.x
            && self.maxs.y >= other.mins.y
            && self.mins.y <= other.maxs.y
    }

    #[inline]
    pub fn contains(&self, other: &Self) -> bool {
        self.mins.x <= other.mins.x
            && self.mins.y <= other.mins.y
            && self.maxs.x >= other.maxs.x
            && self.maxs.y >= other.maxs.y
    }

    /// Smallest box covering both `self` and `other`.
    pub fn union(&self, other: &Self) -> Self {
        Self {
            mins: Coord { x: self.mins.x.min(other.mins.x), y: self.mins.y.min(other.mins.y) },
            maxs: Coord { x: self.maxs.x.max(other.maxs.x), y: self.maxs.y.max(other.maxs.y) },
        }
    }

    pub fn width(&self) -> Real {
        self.maxs.x - self.mins.x
    }

    pub fn height(&self) -> Real {
        self.maxs.y - self.mins.y
    }

    pub fn to_rect(&self) -> Rect<Real> {
        Rect::new(self.mins, self.maxs)
    }

    pub fn to_envelope(&self) -> AABB<[Real; 2]> {
        AABB::from_corners([self.mins.x, self.mins.y], [self.maxs.x, self.maxs.y])
    }
}

impl From<Rect<Real>> for Aabb {
    fn from(rect: Rect<Real>) -> Self {
        Self { mins: rect.min(), maxs: rect.max() }
    }
}
