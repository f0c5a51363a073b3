//! Unconstrained maps: integration of the smooth dynamics.
//!
//! An unconstrained map advances `(q0, v0)` to a predictor `(q1, v1)`
//! ignoring every contact constraint; the impact and friction maps
//! project the result afterwards. Both maps here are symplectic, which
//! keeps energy bounded over long runs of smooth motion.

use nalgebra::DVector;
use shear2d_types::IntegratorKind;

/// The view of the system an unconstrained map needs: generalized forces
/// and the inverse mass diagonal.
pub trait FlowableSystem {
    /// Generalized force at `(q, v)` and time `t`.
    fn compute_force(&self, q: &DVector<f64>, v: &DVector<f64>, t: f64) -> DVector<f64>;

    /// Diagonal of the inverse mass operator.
    fn mass_inv_diagonal(&self) -> &DVector<f64>;
}

/// An unconstrained integration map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnconstrainedMap {
    /// First-order symplectic Euler: velocity first, position with the
    /// new velocity.
    SymplecticEuler,
    /// Velocity Verlet: second order, with a force re-evaluation at the
    /// predicted configuration.
    Verlet,
}

impl From<IntegratorKind> for UnconstrainedMap {
    fn from(kind: IntegratorKind) -> Self {
        match kind {
            IntegratorKind::SymplecticEuler => Self::SymplecticEuler,
            IntegratorKind::Verlet => Self::Verlet,
        }
    }
}

impl UnconstrainedMap {
    /// Advance `(q0, v0)` at time `t0` by `dt` into `(q1, v1)`.
    pub fn flow(
        &self,
        system: &dyn FlowableSystem,
        t0: f64,
        dt: f64,
        q0: &DVector<f64>,
        v0: &DVector<f64>,
        q1: &mut DVector<f64>,
        v1: &mut DVector<f64>,
    ) {
        let minv = system.mass_inv_diagonal();
        match self {
            Self::SymplecticEuler => {
                let a0 = minv.component_mul(&system.compute_force(q0, v0, t0));
                *v1 = v0 + dt * a0;
                *q1 = q0 + dt * &*v1;
            }
            Self::Verlet => {
                let a0 = minv.component_mul(&system.compute_force(q0, v0, t0));
                *q1 = q0 + dt * v0 + (0.5 * dt * dt) * &a0;
                let a1 = minv.component_mul(&system.compute_force(q1, v0, t0 + dt));
                *v1 = v0 + (0.5 * dt) * (a0 + a1);
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    /// A single unit-mass body under constant downward gravity.
    struct ConstantGravity;

    impl FlowableSystem for ConstantGravity {
        fn compute_force(&self, _q: &DVector<f64>, _v: &DVector<f64>, _t: f64) -> DVector<f64> {
            DVector::from_vec(vec![0.0, -10.0, 0.0])
        }

        fn mass_inv_diagonal(&self) -> &DVector<f64> {
            static UNIT: std::sync::OnceLock<DVector<f64>> = std::sync::OnceLock::new();
            UNIT.get_or_init(|| DVector::from_element(3, 1.0))
        }
    }

    #[test]
    fn test_symplectic_euler_updates_velocity_first() {
        let q0 = DVector::zeros(3);
        let v0 = DVector::zeros(3);
        let mut q1 = DVector::zeros(3);
        let mut v1 = DVector::zeros(3);

        UnconstrainedMap::SymplecticEuler.flow(&ConstantGravity, 0.0, 1.0, &q0, &v0, &mut q1, &mut v1);

        assert_relative_eq!(v1[1], -10.0, epsilon = 1e-12);
        // Position moves with the updated velocity
        assert_relative_eq!(q1[1], -10.0, epsilon = 1e-12);
    }

    #[test]
    fn test_verlet_is_exact_for_constant_acceleration() {
        let q0 = DVector::zeros(3);
        let v0 = DVector::zeros(3);
        let mut q1 = DVector::zeros(3);
        let mut v1 = DVector::zeros(3);

        UnconstrainedMap::Verlet.flow(&ConstantGravity, 0.0, 1.0, &q0, &v0, &mut q1, &mut v1);

        // x = x0 + v0 t + a t^2 / 2
        assert_relative_eq!(q1[1], -5.0, epsilon = 1e-12);
        assert_relative_eq!(v1[1], -10.0, epsilon = 1e-12);
    }

    #[test]
    fn test_constant_velocity_drift() {
        let q0 = DVector::zeros(3);
        let v0 = DVector::from_vec(vec![2.0, 0.0, 0.5]);
        let mut q1 = DVector::zeros(3);
        let mut v1 = DVector::zeros(3);

        /// Free flight: no forces at all.
        struct FreeFlight;
        impl FlowableSystem for FreeFlight {
            fn compute_force(&self, q: &DVector<f64>, _v: &DVector<f64>, _t: f64) -> DVector<f64> {
                DVector::zeros(q.len())
            }
            fn mass_inv_diagonal(&self) -> &DVector<f64> {
                static UNIT: std::sync::OnceLock<DVector<f64>> = std::sync::OnceLock::new();
                UNIT.get_or_init(|| DVector::from_element(3, 1.0))
            }
        }

        for map in [UnconstrainedMap::SymplecticEuler, UnconstrainedMap::Verlet] {
            map.flow(&FreeFlight, 0.0, 0.5, &q0, &v0, &mut q1, &mut v1);
            assert_relative_eq!(q1[0], 1.0, epsilon = 1e-12);
            assert_relative_eq!(q1[2], 0.25, epsilon = 1e-12);
            assert_relative_eq!(v1[0], 2.0, epsilon = 1e-12);
        }
    }
}
