//! Body geometry variants and axis-aligned bounding boxes.
//!
//! Geometry is a closed sum type so that narrow-phase dispatch is an
//! exhaustive `match`. Only disks exist today; the enum is the extension
//! point for further shapes.

use nalgebra::Vector2;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// An axis-aligned bounding box in the plane.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Aabb {
    /// Minimum corner.
    pub min: Vector2<f64>,
    /// Maximum corner.
    pub max: Vector2<f64>,
}

impl Aabb {
    /// Create an AABB from its corners.
    #[must_use]
    pub const fn new(min: Vector2<f64>, max: Vector2<f64>) -> Self {
        Self { min, max }
    }

    /// Create an AABB centered at a point with the given half-extents.
    #[must_use]
    pub fn from_center(center: Vector2<f64>, half_extents: Vector2<f64>) -> Self {
        Self {
            min: center - half_extents,
            max: center + half_extents,
        }
    }

    /// Check if this AABB overlaps another, boundaries included.
    #[must_use]
    pub fn overlaps(&self, other: &Self) -> bool {
        self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.min.y <= other.max.y
            && self.max.y >= other.min.y
    }
}

/// Rigid body geometry.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Geometry {
    /// A disk of radius `r` centered on the body's center of mass.
    Circle {
        /// Disk radius.
        r: f64,
    },
}

impl Geometry {
    /// Create a disk.
    #[must_use]
    pub const fn circle(r: f64) -> Self {
        Self::Circle { r }
    }

    /// Tight world-space AABB for this geometry at the given pose.
    ///
    /// Disks are rotation invariant, so `_theta` does not influence the
    /// bounds; shapes with corners will use it.
    #[must_use]
    pub fn aabb(&self, x: &Vector2<f64>, _theta: f64) -> Aabb {
        match self {
            Self::Circle { r } => Aabb::from_center(*x, Vector2::new(*r, *r)),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;

    #[test]
    fn test_aabb_overlaps() {
        let a = Aabb::from_center(Vector2::zeros(), Vector2::new(1.0, 1.0));
        let b = Aabb::from_center(Vector2::new(1.5, 0.0), Vector2::new(1.0, 1.0));
        let c = Aabb::from_center(Vector2::new(5.0, 0.0), Vector2::new(1.0, 1.0));

        assert!(a.overlaps(&b), "a and b should overlap");
        assert!(b.overlaps(&a), "overlap should be symmetric");
        assert!(!a.overlaps(&c), "a and c should not overlap");
    }

    #[test]
    fn test_aabb_touching_counts_as_overlap() {
        let a = Aabb::from_center(Vector2::zeros(), Vector2::new(1.0, 1.0));
        let b = Aabb::from_center(Vector2::new(2.0, 0.0), Vector2::new(1.0, 1.0));
        assert!(a.overlaps(&b));
    }

    #[test]
    fn test_circle_aabb() {
        let geo = Geometry::circle(2.0);
        let aabb = geo.aabb(&Vector2::new(5.0, 5.0), 1.3);

        assert_eq!(aabb.min, Vector2::new(3.0, 3.0));
        assert_eq!(aabb.max, Vector2::new(7.0, 7.0));
    }
}
