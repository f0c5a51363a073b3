//! Planar portals: periodic identification of two half-plane boundaries.
//!
//! A portal pairs two oriented planes. Anything that passes behind one
//! plane re-enters the domain at the corresponding point of the other. A
//! portal whose planes carry nonzero tangent speeds is a Lees-Edwards
//! portal: the identification slides along the planes over time, and
//! bodies seen through the portal pick up a kinematic tangent velocity.
//!
//! Portals own copies of their planes. Scene construction removes those
//! planes from the standalone wall list, so there is no aliasing between
//! walls and portal boundaries.

use nalgebra::Vector2;

use crate::error::SimError;
use crate::geometry::Aabb;
use crate::plane::StaticPlane;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Which of a portal's two planes an AABB straddles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum PortalSide {
    /// Plane A.
    A,
    /// Plane B.
    B,
}

/// A pair of planes identified periodically, with optional Lees-Edwards
/// tangential sliding.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PlanarPortal {
    plane_a: StaticPlane,
    plane_b: StaticPlane,
    v_a: f64,
    v_b: f64,
    #[cfg_attr(feature = "serde", serde(with = "bounds_serde"))]
    bounds_a: (f64, f64),
    #[cfg_attr(feature = "serde", serde(with = "bounds_serde"))]
    bounds_b: (f64, f64),
    delta_a: f64,
    delta_b: f64,
}

/// Translation bounds carry infinities, which JSON cannot encode; an
/// unbounded side round-trips as a null instead.
#[cfg(feature = "serde")]
mod bounds_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(bounds: &(f64, f64), s: S) -> Result<S::Ok, S::Error> {
        let lo = bounds.0.is_finite().then_some(bounds.0);
        let hi = bounds.1.is_finite().then_some(bounds.1);
        (lo, hi).serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<(f64, f64), D::Error> {
        let (lo, hi) = <(Option<f64>, Option<f64>)>::deserialize(d)?;
        Ok((
            lo.unwrap_or(f64::NEG_INFINITY),
            hi.unwrap_or(f64::INFINITY),
        ))
    }
}

impl PlanarPortal {
    /// Create a plain periodic portal with no tangential sliding.
    #[must_use]
    pub fn new(plane_a: StaticPlane, plane_b: StaticPlane) -> Self {
        Self {
            plane_a,
            plane_b,
            v_a: 0.0,
            v_b: 0.0,
            bounds_a: (f64::NEG_INFINITY, f64::INFINITY),
            bounds_b: (f64::NEG_INFINITY, f64::INFINITY),
            delta_a: 0.0,
            delta_b: 0.0,
        }
    }

    /// Create a Lees-Edwards portal with tangent speeds and translation
    /// bounds per plane.
    ///
    /// # Errors
    ///
    /// Bounds must satisfy `lo <= 0 <= hi`, and a bound of negative
    /// infinity on the low side requires positive infinity on the high
    /// side (unbounded sliding is all-or-nothing per plane).
    pub fn new_lees_edwards(
        plane_a: StaticPlane,
        plane_b: StaticPlane,
        v_a: f64,
        v_b: f64,
        bounds_a: (f64, f64),
        bounds_b: (f64, f64),
    ) -> Result<Self, SimError> {
        for (label, (lo, hi)) in [("boundsa", bounds_a), ("boundsb", bounds_b)] {
            if lo.is_nan() || hi.is_nan() || lo > 0.0 || hi < 0.0 {
                return Err(SimError::invalid_config(format!(
                    "{label} must satisfy lo <= 0 <= hi, got ({lo}, {hi})"
                )));
            }
            if lo == f64::NEG_INFINITY && hi != f64::INFINITY {
                return Err(SimError::invalid_config(format!(
                    "{label} with unbounded low side must be unbounded above, got ({lo}, {hi})"
                )));
            }
        }
        if !v_a.is_finite() || !v_b.is_finite() {
            return Err(SimError::invalid_config(
                "portal tangent speeds must be finite",
            ));
        }
        Ok(Self {
            plane_a,
            plane_b,
            v_a,
            v_b,
            bounds_a,
            bounds_b,
            delta_a: 0.0,
            delta_b: 0.0,
        })
    }

    /// Plane A.
    #[must_use]
    pub const fn plane_a(&self) -> &StaticPlane {
        &self.plane_a
    }

    /// Plane B.
    #[must_use]
    pub const fn plane_b(&self) -> &StaticPlane {
        &self.plane_b
    }

    /// Current tangential translation of plane A's identification.
    #[must_use]
    pub const fn delta_a(&self) -> f64 {
        self.delta_a
    }

    /// Current tangential translation of plane B's identification.
    #[must_use]
    pub const fn delta_b(&self) -> f64 {
        self.delta_b
    }

    /// True when either plane carries a nonzero tangent speed.
    #[must_use]
    pub fn is_lees_edwards(&self) -> bool {
        self.v_a != 0.0 || self.v_b != 0.0
    }

    /// Advance the time-dependent translations to simulation time `t`.
    ///
    /// Translation grows linearly at the plane's tangent speed and is
    /// clamped to the plane's bounds; infinite bounds never clamp.
    pub fn update(&mut self, t: f64) {
        self.delta_a = (self.v_a * t).clamp(self.bounds_a.0, self.bounds_a.1);
        self.delta_b = (self.v_b * t).clamp(self.bounds_b.0, self.bounds_b.1);
    }

    fn anchor_a(&self) -> Vector2<f64> {
        self.plane_a.x() + self.delta_a * self.plane_a.t()
    }

    fn anchor_b(&self) -> Vector2<f64> {
        self.plane_b.x() + self.delta_b * self.plane_b.t()
    }

    /// True when `p` is strictly behind either plane of the portal.
    ///
    /// A point can never be behind both planes at once for a valid scene;
    /// the boundary itself does not count as inside.
    #[must_use]
    pub fn point_inside_portal(&self, p: &Vector2<f64>) -> bool {
        let behind_a = self.plane_a.signed_distance(p) < 0.0;
        let behind_b = self.plane_b.signed_distance(p) < 0.0;
        debug_assert!(!(behind_a && behind_b), "point behind both portal planes");
        behind_a || behind_b
    }

    /// Periodic image of `p` through the given plane of the portal.
    ///
    /// Coordinates of `p` relative to the (translated) source plane are
    /// mirrored onto the (translated) target plane.
    #[must_use]
    pub fn teleport_point(&self, p: &Vector2<f64>, side: PortalSide) -> Vector2<f64> {
        match side {
            PortalSide::A => self.teleport_through(p, &self.plane_a, self.anchor_a(), &self.plane_b, self.anchor_b()),
            PortalSide::B => self.teleport_through(p, &self.plane_b, self.anchor_b(), &self.plane_a, self.anchor_a()),
        }
    }

    fn teleport_through(
        &self,
        p: &Vector2<f64>,
        from: &StaticPlane,
        from_anchor: Vector2<f64>,
        to: &StaticPlane,
        to_anchor: Vector2<f64>,
    ) -> Vector2<f64> {
        let rel = p - from_anchor;
        let n_coord = from.n().dot(&rel);
        let t_coord = from.t().dot(&rel);
        to_anchor - n_coord * to.n() - t_coord * to.t()
    }

    /// Wrap a point known to be inside the portal back into the domain.
    #[must_use]
    pub fn teleport_point_inside_portal(&self, p: &Vector2<f64>) -> Vector2<f64> {
        if self.plane_a.signed_distance(p) < 0.0 {
            self.teleport_point(p, PortalSide::A)
        } else {
            debug_assert!(self.plane_b.signed_distance(p) < 0.0);
            self.teleport_point(p, PortalSide::B)
        }
    }

    /// Which plane, if any, the AABB touches or straddles.
    ///
    /// An AABB touches a plane when its support corner against the plane
    /// normal is on or behind the plane. A box cannot touch both planes of
    /// a well-formed portal at once.
    #[must_use]
    pub fn aabb_touches_portal(&self, aabb: &Aabb) -> Option<PortalSide> {
        let touches_a = Self::aabb_behind_plane(aabb, &self.plane_a);
        let touches_b = Self::aabb_behind_plane(aabb, &self.plane_b);
        debug_assert!(!(touches_a && touches_b), "AABB touches both portal planes");
        if touches_a {
            Some(PortalSide::A)
        } else if touches_b {
            Some(PortalSide::B)
        } else {
            None
        }
    }

    fn aabb_behind_plane(aabb: &Aabb, plane: &StaticPlane) -> bool {
        let n = plane.n();
        let support = Vector2::new(
            if n.x >= 0.0 { aabb.min.x } else { aabb.max.x },
            if n.y >= 0.0 { aabb.min.y } else { aabb.max.y },
        );
        plane.signed_distance(&support) <= 0.0
    }

    /// Tangent velocity the portal imposes on the periodic image of an
    /// AABB that spans it.
    ///
    /// The image of a body seen through plane A lives at plane B, whose
    /// identification slides with both tangential translations; the image
    /// therefore moves at `(v_a + v_b)` along the target plane's tangent.
    #[must_use]
    pub fn kinematic_velocity_of_aabb(&self, aabb: &Aabb) -> Vector2<f64> {
        match self.aabb_touches_portal(aabb) {
            Some(PortalSide::A) => (self.v_a + self.v_b) * self.plane_b.t(),
            Some(PortalSide::B) => (self.v_a + self.v_b) * self.plane_a.t(),
            None => {
                debug_assert!(false, "kinematic velocity queried for a non-spanning AABB");
                Vector2::zeros()
            }
        }
    }
}
