//! Static half-plane walls.

use nalgebra::Vector2;

use crate::error::SimError;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// An oriented plane (a line in 2D) with a point and a unit outward normal.
///
/// The half-space `n . (p - x) >= 0` is free; bodies on the other side are
/// penetrating the wall.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct StaticPlane {
    x: Vector2<f64>,
    n: Vector2<f64>,
}

impl StaticPlane {
    /// Create a plane through `x` with outward normal `n`.
    ///
    /// The normal is normalised on construction.
    ///
    /// # Errors
    ///
    /// Returns an error when `n` has zero (or non-finite) length.
    pub fn new(x: Vector2<f64>, n: Vector2<f64>) -> Result<Self, SimError> {
        let norm = n.norm();
        if !norm.is_finite() || norm == 0.0 {
            return Err(SimError::invalid_config(format!(
                "static plane normal ({}, {}) cannot be normalised",
                n.x, n.y
            )));
        }
        Ok(Self { x, n: n / norm })
    }

    /// A point on the plane.
    #[must_use]
    pub const fn x(&self) -> Vector2<f64> {
        self.x
    }

    /// The unit outward normal.
    #[must_use]
    pub const fn n(&self) -> Vector2<f64> {
        self.n
    }

    /// The unit tangent, the normal rotated a quarter turn clockwise.
    #[must_use]
    pub fn t(&self) -> Vector2<f64> {
        Vector2::new(self.n.y, -self.n.x)
    }

    /// Signed distance from `p` to the plane, positive on the free side.
    #[must_use]
    pub fn signed_distance(&self, p: &Vector2<f64>) -> f64 {
        self.n.dot(&(p - self.x))
    }
}
