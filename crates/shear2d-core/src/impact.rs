//! Impact response: projection of predictor velocities onto the
//! non-penetration cone of the active set.
//!
//! The operators here run projected sweeps directly over the contact
//! set: each contact's accumulated normal impulse stays non-negative and
//! its post-impact approach speed is driven to the restitution target
//! `-CoR * (pre-impact approach speed)`. Gauss-Seidel applies impulses
//! immediately within a sweep; Jacobi defers them to the end of the
//! sweep, trading convergence speed for order independence.
//!
//! The impact map composes the pieces for a full step: unconstrained
//! predictor, active-set construction over `(q0, q1)`, impact bases,
//! operator solve, and the projected velocity.

use nalgebra::{DMatrix, DVector, Vector2};
use tracing::warn;

use crate::constraint::Constraint;
use crate::integrators::UnconstrainedMap;
use crate::sim::Sim;

/// Per-constraint record of an impact (and optionally friction) solve,
/// kept for force output.
#[derive(Debug, Clone, Default)]
pub struct ConstraintImpulses {
    /// Coupled bodies per constraint; one-body constraints have no
    /// second entry.
    pub bodies: Vec<(usize, Option<usize>)>,
    /// World-space contact normal per constraint.
    pub normals: Vec<Vector2<f64>>,
    /// Accumulated normal impulse per constraint.
    pub alpha: Vec<f64>,
    /// Accumulated friction impulse per constraint, when a friction
    /// solver ran.
    pub beta: Option<Vec<f64>>,
}

impl ConstraintImpulses {
    /// Record bodies and normals for an active set.
    #[must_use]
    pub fn for_active_set(q: &DVector<f64>, active_set: &[Constraint]) -> Self {
        Self {
            bodies: active_set.iter().map(Constraint::body_indices).collect(),
            normals: active_set
                .iter()
                .map(|constraint| constraint.world_space_contact_normal(q))
                .collect(),
            alpha: vec![0.0; active_set.len()],
            beta: None,
        }
    }

    /// Number of recorded constraints.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bodies.len()
    }

    /// True when no constraints were active.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bodies.is_empty()
    }
}

/// An impact operator: a strategy for solving the contact impulse
/// problem over the active set.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ImpactOperator {
    /// Projected Gauss-Seidel: impulses apply immediately within a sweep.
    GaussSeidel {
        /// Maximum sweeps.
        max_iters: usize,
        /// Largest impulse change accepted as converged.
        tol: f64,
    },
    /// Projected Jacobi: impulses apply at the end of each sweep.
    Jacobi {
        /// Maximum sweeps.
        max_iters: usize,
        /// Largest impulse change accepted as converged.
        tol: f64,
    },
}

impl ImpactOperator {
    /// Project `v` onto the non-penetration cone of the active set,
    /// accumulating normal impulses into `alpha`.
    ///
    /// `impact_bases` carries one unit normal per constraint column and
    /// `cor` the coefficient of restitution shared by every contact.
    pub fn flow(
        &self,
        q: &DVector<f64>,
        active_set: &[Constraint],
        impact_bases: &DMatrix<f64>,
        cor: f64,
        mass_inv: &DVector<f64>,
        v: &mut DVector<f64>,
        alpha: &mut [f64],
    ) {
        debug_assert_eq!(impact_bases.ncols(), active_set.len());
        debug_assert_eq!(alpha.len(), active_set.len());
        debug_assert!((0.0..=1.0).contains(&cor));

        let ncons = active_set.len();
        if ncons == 0 {
            return;
        }

        // Restitution targets from the pre-projection approach speeds
        let targets: Vec<f64> = active_set
            .iter()
            .enumerate()
            .map(|(k, constraint)| {
                let normal = normal_column(impact_bases, k);
                let approach = normal.dot(&constraint.compute_relative_velocity(q, v));
                -cor * approach.min(0.0)
            })
            .collect();

        let (max_iters, tol, sequential) = match *self {
            Self::GaussSeidel { max_iters, tol } => (max_iters, tol, true),
            Self::Jacobi { max_iters, tol } => (max_iters, tol, false),
        };

        let mut converged = false;
        for _ in 0..max_iters {
            let mut largest_change = 0.0f64;
            let mut deferred: Vec<(usize, f64)> = Vec::new();

            for (k, constraint) in active_set.iter().enumerate() {
                let normal = normal_column(impact_bases, k);
                let approach = normal.dot(&constraint.compute_relative_velocity(q, v));
                let effective_mass = constraint.effective_mass(q, &normal, mass_inv);
                let raw = (targets[k] - approach) / effective_mass;
                let updated = (alpha[k] + raw).max(0.0);
                let change = updated - alpha[k];
                largest_change = largest_change.max(change.abs());

                if sequential {
                    if change != 0.0 {
                        constraint.apply_contact_impulse(q, &(change * normal), mass_inv, v);
                        alpha[k] = updated;
                    }
                } else {
                    deferred.push((k, change));
                }
            }

            if !sequential {
                for (k, change) in deferred {
                    if change != 0.0 {
                        let normal = normal_column(impact_bases, k);
                        active_set[k].apply_contact_impulse(q, &(change * normal), mass_inv, v);
                        alpha[k] += change;
                        alpha[k] = alpha[k].max(0.0);
                    }
                }
            }

            if largest_change <= tol {
                converged = true;
                break;
            }
        }

        if !converged {
            warn!(
                contacts = ncons,
                "impact operator hit its sweep limit before converging"
            );
        }
    }
}

fn normal_column(impact_bases: &DMatrix<f64>, k: usize) -> Vector2<f64> {
    Vector2::new(impact_bases[(0, k)], impact_bases[(1, k)])
}

/// The impact map: unconstrained predictor followed by impact response.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImpactMap;

impl ImpactMap {
    /// Create an impact map.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Run one constrained step, writing the result into `(q1, v1)` and
    /// returning the per-constraint impulses.
    #[allow(clippy::too_many_arguments)]
    pub fn flow(
        &self,
        sim: &Sim,
        umap: &UnconstrainedMap,
        operator: &ImpactOperator,
        t0: f64,
        dt: f64,
        cor: f64,
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

        let impact_bases = sim.compute_impact_bases(q1, &active_set);
        let mut solution = ConstraintImpulses::for_active_set(q1, &active_set);
        operator.flow(
            q1,
            &active_set,
            &impact_bases,
            cor,
            sim.state().mass_inv_diagonal(),
            v1,
            &mut solution.alpha,
        );
        solution
    }
}
