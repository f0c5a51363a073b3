//! Staggered-projections impact-friction map.
//!
//! Friction and impact are solved as alternating projections: an impact
//! sweep restores the non-penetration cone, then a friction sweep drives
//! the tangential contact velocities toward zero subject to the Coulomb
//! bound `|beta| <= mu * alpha`, and the pair repeats until the velocity
//! stops changing. Friction impulses live in the generalized smooth
//! friction basis, so the tangential solve couples into rotation through
//! each contact's arm.

use nalgebra::{DMatrix, DVector, Vector2};
use nalgebra_sparse::CscMatrix;
use tracing::warn;

use shear2d_types::{StaggeredProjectionsConfig, StaggeringKind};

use crate::assembly;
use crate::constraint::Constraint;
use crate::impact::{ConstraintImpulses, ImpactOperator};
use crate::integrators::UnconstrainedMap;
use crate::sim::Sim;

/// Sweep budget for the inner projected solves of each stagger round.
const INNER_SWEEPS: usize = 100;

/// The staggered-projections impact-friction map.
#[derive(Debug, Clone, Copy)]
pub struct StaggeredProjectionsSolver {
    config: StaggeredProjectionsConfig,
}

impl StaggeredProjectionsSolver {
    /// Create a solver from a validated configuration.
    #[must_use]
    pub fn new(config: StaggeredProjectionsConfig) -> Self {
        debug_assert!(config.validate().is_ok());
        Self { config }
    }

    /// The solver configuration.
    #[must_use]
    pub const fn config(&self) -> &StaggeredProjectionsConfig {
        &self.config
    }

    /// Run one constrained step with impact and friction, writing the
    /// result into `(q1, v1)` and returning the per-constraint impulses.
    #[allow(clippy::too_many_arguments)]
    pub fn flow(
        &self,
        sim: &Sim,
        umap: &UnconstrainedMap,
        t0: f64,
        dt: f64,
        cor: f64,
        mu: f64,
        q0: &DVector<f64>,
        v0: &DVector<f64>,
        q1: &mut DVector<f64>,
        v1: &mut DVector<f64>,
    ) -> ConstraintImpulses {
        umap.flow(sim, t0, dt, q0, v0, q1, v1);

        let active_set = sim.compute_active_set(q0, q1);
        if active_set.is_empty() {
            return ConstraintImpulses::default();
        }

        let mass_inv = sim.state().mass_inv_diagonal();
        let impact_bases = sim.compute_impact_bases(q1, &active_set);
        let contact_bases = sim.compute_contact_bases(q1, v1, &active_set);
        let friction_basis =
            assembly::form_generalized_smooth_friction_basis(q1.len(), q1, &active_set, &contact_bases);
        let column_effective_mass = column_effective_masses(&friction_basis, mass_inv);

        let impact_operator = ImpactOperator::GaussSeidel {
            max_iters: INNER_SWEEPS,
            tol: self.config.tol,
        };

        let mut alpha = vec![0.0; active_set.len()];
        let mut beta = vec![0.0; active_set.len()];
        let mut converged = false;

        for _ in 0..self.config.max_iters {
            let v_before = v1.clone();

            if !self.config.warm_start_alpha {
                alpha.fill(0.0);
            }
            impact_operator.flow(q1, &active_set, &impact_bases, cor, mass_inv, v1, &mut alpha);

            if !self.config.warm_start_beta {
                beta.fill(0.0);
            }
            friction_sweeps(
                q1,
                &active_set,
                &contact_bases,
                &friction_basis,
                &column_effective_mass,
                mu,
                &alpha,
                mass_inv,
                v1,
                &mut beta,
                self.config.tol,
            );

            if (&*v1 - v_before).amax() <= self.config.tol {
                converged = true;
                break;
            }
        }

        if !converged {
            warn!(
                contacts = active_set.len(),
                rounds = self.config.max_iters,
                "staggered projections stopped at the round limit"
            );
        }

        if self.config.staggering == StaggeringKind::Stabilized {
            // One last impact pass scrubs normal drift the friction
            // sweeps may have introduced
            impact_operator.flow(q1, &active_set, &impact_bases, cor, mass_inv, v1, &mut alpha);
        }

        let mut solution = ConstraintImpulses::for_active_set(q1, &active_set);
        solution.alpha = alpha;
        solution.beta = Some(beta);
        solution
    }
}

/// `D_k^T M^{-1} D_k` for every column of the friction basis.
fn column_effective_masses(friction_basis: &CscMatrix<f64>, mass_inv: &DVector<f64>) -> Vec<f64> {
    (0..friction_basis.ncols())
        .map(|k| {
            let column = friction_basis.col(k);
            column
                .row_indices()
                .iter()
                .zip(column.values())
                .map(|(&row, &value)| value * value * mass_inv[row])
                .sum()
        })
        .collect()
}

/// Projected Gauss-Seidel sweeps over the friction impulses.
#[allow(clippy::too_many_arguments)]
fn friction_sweeps(
    q: &DVector<f64>,
    active_set: &[Constraint],
    contact_bases: &DMatrix<f64>,
    friction_basis: &CscMatrix<f64>,
    column_effective_mass: &[f64],
    mu: f64,
    alpha: &[f64],
    mass_inv: &DVector<f64>,
    v: &mut DVector<f64>,
    beta: &mut [f64],
    tol: f64,
) {
    for _ in 0..INNER_SWEEPS {
        let mut largest_change = 0.0f64;

        for (k, constraint) in active_set.iter().enumerate() {
            let column = friction_basis.col(k);
            if column_effective_mass[k] == 0.0 {
                continue;
            }

            // Tangential relative speed in generalized coordinates, plus
            // the kinematic bias a sheared contact carries
            let mut vt: f64 = column
                .row_indices()
                .iter()
                .zip(column.values())
                .map(|(&row, &value)| value * v[row])
                .sum();
            let tangent = Vector2::new(
                contact_bases[(0, 2 * k + 1)],
                contact_bases[(1, 2 * k + 1)],
            );
            vt -= tangent.dot(&constraint.kinematic_relative_velocity());

            let bound = mu * alpha[k];
            let updated = (beta[k] - vt / column_effective_mass[k]).clamp(-bound, bound);
            let change = updated - beta[k];
            largest_change = largest_change.max(change.abs());

            if change != 0.0 {
                for (&row, &value) in column.row_indices().iter().zip(column.values()) {
                    v[row] += mass_inv[row] * value * change;
                }
                beta[k] = updated;
            }
        }

        if largest_change <= tol {
            break;
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use shear2d_types::StaticPlane;

    /// A unit disk resting on the ground, struck tangentially.
    fn sliding_setup() -> (DVector<f64>, Vec<Constraint>) {
        let q = DVector::from_vec(vec![0.0, 1.0, 0.0]);
        let ground = StaticPlane::new(Vector2::zeros(), Vector2::new(0.0, 1.0)).unwrap();
        let set = vec![Constraint::StaticPlaneCircle {
            body: 0,
            plane_index: 0,
            r: 1.0,
            plane: ground,
        }];
        (q, set)
    }

    fn solve(
        q: &DVector<f64>,
        set: &[Constraint],
        v: &mut DVector<f64>,
        mu: f64,
        alpha: &[f64],
    ) -> Vec<f64> {
        let minv = DVector::from_element(q.len(), 1.0);
        let contact_bases = assembly::compute_contact_bases(q, v, set);
        let d = assembly::form_generalized_smooth_friction_basis(q.len(), q, set, &contact_bases);
        let eff = column_effective_masses(&d, &minv);
        let mut beta = vec![0.0; set.len()];
        friction_sweeps(
            q,
            set,
            &contact_bases,
            &d,
            &eff,
            mu,
            alpha,
            &minv,
            v,
            &mut beta,
            1e-12,
        );
        beta
    }

    #[test]
    fn test_friction_rolls_a_sliding_disk() {
        let (q, set) = sliding_setup();
        // Sliding at 2 m/s with a unit of normal impulse available
        let mut v = DVector::from_vec(vec![2.0, 0.0, 0.0]);
        let beta = solve(&q, &set, &mut v, 1.0, &[1.0]);

        // The contact point stops sliding: v_x + omega * 1 = 0
        let rel = set[0].compute_relative_velocity(&q, &v);
        let tangent = Vector2::new(-1.0, 0.0);
        assert_relative_eq!(tangent.dot(&rel), 0.0, epsilon = 1e-9);
        // The disk spins forward while translating
        assert!(v[0] > 0.0 && v[0] < 2.0);
        assert!(v[2] < 0.0, "friction must torque the disk");
        assert!(beta[0].abs() > 0.0);
    }

    #[test]
    fn test_friction_clamped_by_coulomb_bound() {
        let (q, set) = sliding_setup();
        let mut v = DVector::from_vec(vec![2.0, 0.0, 0.0]);
        // Tiny normal impulse: friction saturates at mu * alpha
        let beta = solve(&q, &set, &mut v, 0.5, &[0.01]);
        assert_relative_eq!(beta[0].abs(), 0.005, epsilon = 1e-12);
        // Still sliding
        let rel = set[0].compute_relative_velocity(&q, &v);
        assert!(rel.x.abs() > 1.0);
    }

    #[test]
    fn test_zero_friction_is_inert() {
        let (q, set) = sliding_setup();
        let mut v = DVector::from_vec(vec![2.0, 0.0, 0.0]);
        let beta = solve(&q, &set, &mut v, 0.0, &[1.0]);
        assert_relative_eq!(beta[0], 0.0);
        assert_relative_eq!(v[0], 2.0);
        assert_relative_eq!(v[2], 0.0);
    }
}
