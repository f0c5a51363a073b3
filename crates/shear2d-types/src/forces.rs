//! Body forces.
//!
//! Forces are a closed sum type evaluated against the full configuration.
//! Each variant can report a scalar potential and accumulate into a
//! generalized force vector; neither operation mutates the force.

use nalgebra::{DVector, Vector2};

use crate::geometry::Geometry;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A body force acting on every simulated disk.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Force {
    /// Uniform gravitational field `g`.
    Gravity {
        /// Field vector, e.g. `(0, -9.81)`.
        g: Vector2<f64>,
    },
    /// Pairwise Hertzian penalty, active while two disks overlap.
    ///
    /// For overlap depth `delta`, the potential is `(2/5) k delta^(5/2)`
    /// and the repulsive force magnitude is `k delta^(3/2)`.
    HertzianPenalty {
        /// Contact stiffness.
        k: f64,
    },
}

impl Force {
    /// Scalar potential of this force at configuration `q`.
    #[must_use]
    pub fn potential(
        &self,
        q: &DVector<f64>,
        mass: &DVector<f64>,
        geometry: &[Geometry],
        geometry_indices: &[usize],
    ) -> f64 {
        let nbodies = q.len() / 3;
        match self {
            Self::Gravity { g } => {
                let mut u = 0.0;
                for body in 0..nbodies {
                    let x = Vector2::new(q[3 * body], q[3 * body + 1]);
                    u -= mass[3 * body] * g.dot(&x);
                }
                u
            }
            Self::HertzianPenalty { k } => {
                let mut u = 0.0;
                for_each_overlap(q, geometry, geometry_indices, |_, _, _, delta| {
                    u += 0.4 * k * delta.powf(2.5);
                });
                u
            }
        }
    }

    /// Accumulate this force's contribution into `f`.
    pub fn accumulate(
        &self,
        q: &DVector<f64>,
        _v: &DVector<f64>,
        mass: &DVector<f64>,
        geometry: &[Geometry],
        geometry_indices: &[usize],
        f: &mut DVector<f64>,
    ) {
        let nbodies = q.len() / 3;
        match self {
            Self::Gravity { g } => {
                for body in 0..nbodies {
                    f[3 * body] += mass[3 * body] * g.x;
                    f[3 * body + 1] += mass[3 * body + 1] * g.y;
                }
            }
            Self::HertzianPenalty { k } => {
                for_each_overlap(q, geometry, geometry_indices, |i, j, n_hat, delta| {
                    let magnitude = k * delta.powf(1.5);
                    f[3 * i] += magnitude * n_hat.x;
                    f[3 * i + 1] += magnitude * n_hat.y;
                    f[3 * j] -= magnitude * n_hat.x;
                    f[3 * j + 1] -= magnitude * n_hat.y;
                });
            }
        }
    }
}

/// Visit every overlapping disk pair with its contact normal and depth.
///
/// The normal points from body `j` toward body `i`. Coincident centers are
/// skipped; the penalty direction is undefined there.
fn for_each_overlap(
    q: &DVector<f64>,
    geometry: &[Geometry],
    geometry_indices: &[usize],
    mut visit: impl FnMut(usize, usize, Vector2<f64>, f64),
) {
    let nbodies = q.len() / 3;
    for i in 0..nbodies {
        let Geometry::Circle { r: ri } = geometry[geometry_indices[i]];
        let xi = Vector2::new(q[3 * i], q[3 * i + 1]);
        for j in (i + 1)..nbodies {
            let Geometry::Circle { r: rj } = geometry[geometry_indices[j]];
            let xj = Vector2::new(q[3 * j], q[3 * j + 1]);
            let diff = xi - xj;
            let dist = diff.norm();
            let delta = ri + rj - dist;
            if delta > 0.0 && dist > 0.0 {
                visit(i, j, diff / dist, delta);
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn two_disk_setup(separation: f64) -> (DVector<f64>, DVector<f64>, Vec<Geometry>, Vec<usize>) {
        let q = DVector::from_vec(vec![0.0, 0.0, 0.0, separation, 0.0, 0.0]);
        let mass = DVector::from_vec(vec![2.0, 2.0, 1.0, 3.0, 3.0, 1.0]);
        let geometry = vec![Geometry::circle(1.0)];
        let indices = vec![0, 0];
        (q, mass, geometry, indices)
    }

    #[test]
    fn test_gravity_force_scales_with_mass() {
        let (q, mass, geometry, indices) = two_disk_setup(5.0);
        let v = DVector::zeros(6);
        let mut f = DVector::zeros(6);

        let gravity = Force::Gravity {
            g: Vector2::new(0.0, -10.0),
        };
        gravity.accumulate(&q, &v, &mass, &geometry, &indices, &mut f);

        assert_relative_eq!(f[1], -20.0);
        assert_relative_eq!(f[4], -30.0);
        assert_relative_eq!(f[2], 0.0);
        assert_relative_eq!(f[5], 0.0);
    }

    #[test]
    fn test_gravity_potential_drops_with_height() {
        let (q, mass, geometry, indices) = two_disk_setup(5.0);
        let gravity = Force::Gravity {
            g: Vector2::new(0.0, -10.0),
        };
        let u0 = gravity.potential(&q, &mass, &geometry, &indices);

        let mut raised = q.clone();
        raised[1] += 1.0;
        let u1 = gravity.potential(&raised, &mass, &geometry, &indices);
        // Raising a 2 kg body by 1 m in 10 m/s^2 gravity adds 20 J
        assert_relative_eq!(u1 - u0, 20.0, epsilon = 1e-12);
    }

    #[test]
    fn test_hertzian_inactive_when_separated() {
        let (q, mass, geometry, indices) = two_disk_setup(3.0);
        let v = DVector::zeros(6);
        let mut f = DVector::zeros(6);

        let penalty = Force::HertzianPenalty { k: 100.0 };
        penalty.accumulate(&q, &v, &mass, &geometry, &indices, &mut f);

        assert_relative_eq!(f.norm(), 0.0);
        assert_relative_eq!(penalty.potential(&q, &mass, &geometry, &indices), 0.0);
    }

    #[test]
    fn test_hertzian_repels_overlapping_disks() {
        // Radii sum to 2, separation 1.5: overlap depth 0.5
        let (q, mass, geometry, indices) = two_disk_setup(1.5);
        let v = DVector::zeros(6);
        let mut f = DVector::zeros(6);

        let penalty = Force::HertzianPenalty { k: 100.0 };
        penalty.accumulate(&q, &v, &mass, &geometry, &indices, &mut f);

        let expected = 100.0 * 0.5f64.powf(1.5);
        assert_relative_eq!(f[0], -expected, epsilon = 1e-12);
        assert_relative_eq!(f[3], expected, epsilon = 1e-12);
        // Equal and opposite: no net force
        assert_relative_eq!(f[0] + f[3], 0.0, epsilon = 1e-12);

        let u = penalty.potential(&q, &mass, &geometry, &indices);
        assert_relative_eq!(u, 0.4 * 100.0 * 0.5f64.powf(2.5), epsilon = 1e-12);
    }
}
