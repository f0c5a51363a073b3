//! Contact constraints and the uniform operations solvers rely on.
//!
//! Constraints form a closed sum type; every narrow-phase outcome is one
//! of these variants. Each variant answers the same queries: which bodies
//! it couples, its world-space contact normal, an orthonormal contact
//! basis, its friction stencil, its sparse generalized-friction column,
//! and its relative contact velocity (including any kinematic bias a
//! Lees-Edwards portal imposes).
//!
//! Contact normals and anchors are captured from the configuration at the
//! start of the step, which keeps the impulses they generate angular
//! momentum preserving.
//!
//! Derived `PartialEq` provides the type-aware equality that impulse
//! caching keys on: constraints of different variants are never equal,
//! and constraints of the same variant compare field by field.

use nalgebra::{DVector, Matrix2, Vector2};
use nalgebra_sparse::CooMatrix;
use shear2d_types::StaticPlane;

/// 2D cross product, producing a scalar.
#[inline]
#[must_use]
pub fn cross2(a: &Vector2<f64>, b: &Vector2<f64>) -> f64 {
    a.x * b.y - a.y * b.x
}

/// Quarter-turn counterclockwise rotation.
#[inline]
fn perp(v: &Vector2<f64>) -> Vector2<f64> {
    Vector2::new(-v.y, v.x)
}

#[inline]
fn body_pos(q: &DVector<f64>, body: usize) -> Vector2<f64> {
    Vector2::new(q[3 * body], q[3 * body + 1])
}

/// An active contact constraint.
#[derive(Debug, Clone, PartialEq)]
pub enum Constraint {
    /// A disk against a static wall.
    StaticPlaneCircle {
        /// The disk's body index.
        body: usize,
        /// Index of the wall in the scene's plane list.
        plane_index: usize,
        /// Disk radius.
        r: f64,
        /// The wall.
        plane: StaticPlane,
    },
    /// Two disks in direct contact.
    CircleCircle {
        /// First body index.
        body0: usize,
        /// Second body index.
        body1: usize,
        /// Unit contact normal, pointing from `body1` toward `body0`.
        normal: Vector2<f64>,
        /// Contact anchor on the line between the centers.
        point: Vector2<f64>,
        /// Radius of `body0`.
        r0: f64,
        /// Radius of `body1`.
        r1: f64,
    },
    /// Two disks in contact through one or two portal images.
    TeleportedCircleCircle {
        /// First body index (a real body, not a virtual one).
        body0: usize,
        /// Second body index.
        body1: usize,
        /// Teleported center of `body0` at the start of the step.
        x0: Vector2<f64>,
        /// Teleported center of `body1` at the start of the step.
        x1: Vector2<f64>,
        /// Radius of `body0`.
        r0: f64,
        /// Radius of `body1`.
        r1: f64,
        /// Teleport displacement of `body0`, stationary within the step.
        delta0: Vector2<f64>,
        /// Teleport displacement of `body1`, stationary within the step.
        delta1: Vector2<f64>,
    },
    /// A teleported contact through a Lees-Edwards portal, which adds a
    /// prescribed relative-velocity kick.
    KinematicKickCircleCircle {
        /// First body index.
        body0: usize,
        /// Second body index.
        body1: usize,
        /// Teleported center of `body0` at the start of the step.
        x0: Vector2<f64>,
        /// Teleported center of `body1` at the start of the step.
        x1: Vector2<f64>,
        /// Radius of `body0`.
        r0: f64,
        /// Radius of `body1`.
        r1: f64,
        /// Tangent velocity the portal imposes on the teleported image.
        kick: Vector2<f64>,
    },
}

/// True when two disks at the given centers touch or overlap.
#[must_use]
pub fn circle_circle_active(
    x0: &Vector2<f64>,
    x1: &Vector2<f64>,
    r0: f64,
    r1: f64,
) -> bool {
    (x0 - x1).norm() <= r0 + r1
}

/// True when a disk touches or penetrates a static plane.
#[must_use]
pub fn static_plane_circle_active(x: &Vector2<f64>, r: f64, plane: &StaticPlane) -> bool {
    plane.signed_distance(x) <= r
}

impl Constraint {
    /// Build a disk-disk constraint, capturing normal and anchor at `q0`.
    #[must_use]
    pub fn circle_circle(body0: usize, body1: usize, q0: &DVector<f64>, r0: f64, r1: f64) -> Self {
        let x0 = body_pos(q0, body0);
        let x1 = body_pos(q0, body1);
        let normal = (x0 - x1).normalize();
        let point = x0 + (r0 / (r0 + r1)) * (x1 - x0);
        Self::CircleCircle {
            body0,
            body1,
            normal,
            point,
            r0,
            r1,
        }
    }

    /// The coupled bodies; one-body constraints have no second index.
    #[must_use]
    pub fn body_indices(&self) -> (usize, Option<usize>) {
        match self {
            Self::StaticPlaneCircle { body, .. } => (*body, None),
            Self::CircleCircle { body0, body1, .. }
            | Self::TeleportedCircleCircle { body0, body1, .. }
            | Self::KinematicKickCircleCircle { body0, body1, .. } => (*body0, Some(*body1)),
        }
    }

    /// Unit contact normal in world space.
    #[must_use]
    pub fn world_space_contact_normal(&self, _q: &DVector<f64>) -> Vector2<f64> {
        match self {
            Self::StaticPlaneCircle { plane, .. } => plane.n(),
            Self::CircleCircle { normal, .. } => *normal,
            Self::TeleportedCircleCircle { x0, x1, .. }
            | Self::KinematicKickCircleCircle { x0, x1, .. } => (x0 - x1).normalize(),
        }
    }

    /// Orthonormal contact basis: column 0 the normal, column 1 the normal
    /// rotated a quarter turn counterclockwise. Its determinant is one.
    #[must_use]
    pub fn compute_basis(&self, q: &DVector<f64>, _v: &DVector<f64>) -> Matrix2<f64> {
        let n = self.world_space_contact_normal(q);
        Matrix2::from_columns(&[n, perp(&n)])
    }

    /// Number of generalized DOFs this constraint's friction column
    /// touches: two translations plus the rotation coupled through the
    /// contact arm, per incident body.
    #[must_use]
    pub fn friction_stencil_size(&self) -> usize {
        match self {
            Self::StaticPlaneCircle { .. } => 3,
            _ => 6,
        }
    }

    /// The contact anchor in world space.
    #[must_use]
    pub fn contact_point(&self, q: &DVector<f64>) -> Vector2<f64> {
        match self {
            Self::StaticPlaneCircle { body, r, plane, .. } => {
                body_pos(q, *body) - *r * plane.n()
            }
            Self::CircleCircle { point, .. } => *point,
            Self::TeleportedCircleCircle { x0, x1, r0, r1, .. }
            | Self::KinematicKickCircleCircle { x0, x1, r0, r1, .. } => {
                x0 + (*r0 / (*r0 + *r1)) * (x1 - x0)
            }
        }
    }

    /// Contact arms from each incident body's center to the anchor.
    fn arms(&self, q: &DVector<f64>) -> (Vector2<f64>, Option<Vector2<f64>>) {
        let p = self.contact_point(q);
        match self {
            Self::StaticPlaneCircle { body, .. } => (p - body_pos(q, *body), None),
            Self::CircleCircle { body0, body1, .. } => {
                (p - body_pos(q, *body0), Some(p - body_pos(q, *body1)))
            }
            Self::TeleportedCircleCircle {
                body0,
                body1,
                delta0,
                delta1,
                ..
            } => (
                p - (body_pos(q, *body0) + delta0),
                Some(p - (body_pos(q, *body1) + delta1)),
            ),
            // The kick constraint anchors to the captured image centers
            Self::KinematicKickCircleCircle { x0, x1, .. } => (p - x0, Some(p - x1)),
        }
    }

    /// Write this constraint's generalized friction column for the given
    /// unit tangent sample.
    ///
    /// Entries are `(tangent, cross(arm, tangent))` per body, negated for
    /// the second body.
    pub fn compute_generalized_friction_given_tangent(
        &self,
        q: &DVector<f64>,
        tangent: &Vector2<f64>,
        column: usize,
        d: &mut CooMatrix<f64>,
    ) {
        debug_assert!((tangent.norm() - 1.0).abs() <= 1.0e-6);
        debug_assert!(
            self.world_space_contact_normal(q).dot(tangent).abs() <= 1.0e-6,
            "tangent sample must be orthogonal to the contact normal"
        );

        let (body0, body1) = self.body_indices();
        let (arm0, arm1) = self.arms(q);

        d.push(3 * body0, column, tangent.x);
        d.push(3 * body0 + 1, column, tangent.y);
        d.push(3 * body0 + 2, column, cross2(&arm0, tangent));

        if let (Some(body1), Some(arm1)) = (body1, arm1) {
            d.push(3 * body1, column, -tangent.x);
            d.push(3 * body1 + 1, column, -tangent.y);
            d.push(3 * body1 + 2, column, -cross2(&arm1, tangent));
        }
    }

    /// Prescribed relative-velocity bias, nonzero only for Lees-Edwards
    /// kicked contacts.
    #[must_use]
    pub fn kinematic_relative_velocity(&self) -> Vector2<f64> {
        match self {
            Self::KinematicKickCircleCircle { kick, .. } => *kick,
            _ => Vector2::zeros(),
        }
    }

    /// Relative velocity of the contact points, first body minus second,
    /// minus any kinematic bias.
    #[must_use]
    pub fn compute_relative_velocity(&self, q: &DVector<f64>, v: &DVector<f64>) -> Vector2<f64> {
        let (body0, body1) = self.body_indices();
        let (arm0, arm1) = self.arms(q);

        let u0 = Vector2::new(v[3 * body0], v[3 * body0 + 1]) + v[3 * body0 + 2] * perp(&arm0);
        let mut rel = u0;
        if let (Some(body1), Some(arm1)) = (body1, arm1) {
            let u1 = Vector2::new(v[3 * body1], v[3 * body1 + 1]) + v[3 * body1 + 2] * perp(&arm1);
            rel -= u1;
        }
        rel - self.kinematic_relative_velocity()
    }

    /// Effective mass of the contact along a unit direction.
    #[must_use]
    pub fn effective_mass(
        &self,
        q: &DVector<f64>,
        direction: &Vector2<f64>,
        mass_inv: &DVector<f64>,
    ) -> f64 {
        let (body0, body1) = self.body_indices();
        let (arm0, arm1) = self.arms(q);

        let mut k = mass_inv[3 * body0] + mass_inv[3 * body0 + 2] * cross2(&arm0, direction).powi(2);
        if let (Some(body1), Some(arm1)) = (body1, arm1) {
            k += mass_inv[3 * body1] + mass_inv[3 * body1 + 2] * cross2(&arm1, direction).powi(2);
        }
        k
    }

    /// Apply a world-space impulse at the contact point: positive on the
    /// first body, negative on the second.
    pub fn apply_contact_impulse(
        &self,
        q: &DVector<f64>,
        impulse: &Vector2<f64>,
        mass_inv: &DVector<f64>,
        v: &mut DVector<f64>,
    ) {
        let (body0, body1) = self.body_indices();
        let (arm0, arm1) = self.arms(q);

        v[3 * body0] += mass_inv[3 * body0] * impulse.x;
        v[3 * body0 + 1] += mass_inv[3 * body0 + 1] * impulse.y;
        v[3 * body0 + 2] += mass_inv[3 * body0 + 2] * cross2(&arm0, impulse);

        if let (Some(body1), Some(arm1)) = (body1, arm1) {
            v[3 * body1] -= mass_inv[3 * body1] * impulse.x;
            v[3 * body1 + 1] -= mass_inv[3 * body1 + 1] * impulse.y;
            v[3 * body1 + 2] -= mass_inv[3 * body1 + 2] * cross2(&arm1, impulse);
        }
    }
}
