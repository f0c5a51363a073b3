//! The simulator: state ownership, scalar queries, and the stepping
//! drivers.
//!
//! A step is an atomic transition. Each driver advances portal
//! translations to the end-of-step time, runs its maps to produce
//! `(q1, v1)`, commits the pair into the state, and wraps any body
//! center that crossed into a portal. Nothing observes the state between
//! commit and wrap, and the maps run to completion with read access
//! only.

use nalgebra::{DMatrix, DVector, Vector2};
use shear2d_types::{Geometry, State};

use crate::active_set;
use crate::assembly;
use crate::constraint::{cross2, Constraint};
use crate::friction::StaggeredProjectionsSolver;
use crate::impact::{ConstraintImpulses, ImpactMap, ImpactOperator};
use crate::integrators::{FlowableSystem, UnconstrainedMap};
use crate::scripting::{NullCallback, ScriptingCallback};

/// A rigid-disk simulation.
pub struct Sim {
    state: State,
    scripting: Box<dyn ScriptingCallback>,
}

impl Sim {
    /// Create a simulator around an initial state, with the null
    /// scripting callback.
    #[must_use]
    pub fn new(state: State) -> Self {
        Self {
            state,
            scripting: Box::new(NullCallback),
        }
    }

    /// Read access to the state.
    #[must_use]
    pub const fn state(&self) -> &State {
        &self.state
    }

    /// Replace the scripting callback.
    pub fn set_scripting_callback(&mut self, callback: Box<dyn ScriptingCallback>) {
        self.scripting = callback;
    }

    // ---------------------------------------------------------------
    // Scalar queries
    // ---------------------------------------------------------------

    /// Kinetic energy `v^T M v / 2`.
    #[must_use]
    pub fn compute_kinetic_energy(&self) -> f64 {
        let v = self.state.v();
        0.5 * v.dot(&self.state.mass_diagonal().component_mul(v))
    }

    /// Potential energy summed over the body forces.
    #[must_use]
    pub fn compute_potential_energy(&self) -> f64 {
        self.state
            .forces()
            .iter()
            .map(|force| {
                force.potential(
                    self.state.q(),
                    self.state.mass_diagonal(),
                    self.state.geometry(),
                    self.state.geometry_indices(),
                )
            })
            .sum()
    }

    /// Total energy.
    #[must_use]
    pub fn compute_total_energy(&self) -> f64 {
        self.compute_kinetic_energy() + self.compute_potential_energy()
    }

    /// Total linear momentum.
    #[must_use]
    pub fn compute_total_momentum(&self) -> Vector2<f64> {
        let mut p = Vector2::zeros();
        for body in 0..self.state.num_bodies() {
            p += self.state.mass(body) * self.state.body_velocity(body);
        }
        p
    }

    /// Total angular momentum about the origin: the center-of-mass
    /// contribution plus each body's spin.
    #[must_use]
    pub fn compute_total_angular_momentum(&self) -> f64 {
        let mut l = 0.0;
        for body in 0..self.state.num_bodies() {
            l += self.state.mass(body)
                * cross2(&self.state.body_position(body), &self.state.body_velocity(body));
            l += self.state.inertia(body) * self.state.body_omega(body);
        }
        l
    }

    // ---------------------------------------------------------------
    // Collision surface
    // ---------------------------------------------------------------

    /// Build the active constraint set for a step from `q0` to `q1`.
    #[must_use]
    pub fn compute_active_set(&self, q0: &DVector<f64>, q1: &DVector<f64>) -> Vec<Constraint> {
        active_set::compute_active_set(&self.state, q0, q1)
    }

    /// Whether a trial body overlaps any simulated body at `q`, portal
    /// images included.
    #[must_use]
    pub fn body_collides_with_another(
        &self,
        x: &Vector2<f64>,
        theta: f64,
        geo: &Geometry,
        q: &DVector<f64>,
    ) -> bool {
        active_set::body_collides_with_another(&self.state, x, theta, geo, q)
    }

    /// Impact bases for an active set.
    #[must_use]
    pub fn compute_impact_bases(
        &self,
        q: &DVector<f64>,
        active_set: &[Constraint],
    ) -> DMatrix<f64> {
        assembly::compute_impact_bases(q, active_set)
    }

    /// Contact bases for an active set.
    #[must_use]
    pub fn compute_contact_bases(
        &self,
        q: &DVector<f64>,
        v: &DVector<f64>,
        active_set: &[Constraint],
    ) -> DMatrix<f64> {
        assembly::compute_contact_bases(q, v, active_set)
    }

    // ---------------------------------------------------------------
    // Stepping drivers
    // ---------------------------------------------------------------

    /// Advance one step of the smooth dynamics alone.
    pub fn flow_unconstrained(&mut self, iteration: u64, dt: f64, umap: &UnconstrainedMap) {
        let t_end = iteration as f64 * dt;
        self.update_portals(t_end);
        self.scripting.start_of_step(iteration, dt);

        let mut q1 = DVector::zeros(self.state.q().len());
        let mut v1 = DVector::zeros(self.state.v().len());
        umap.flow(
            &*self,
            t_end - dt,
            dt,
            self.state.q(),
            self.state.v(),
            &mut q1,
            &mut v1,
        );

        self.commit(&mut q1, &mut v1);
        self.scripting.end_of_step(iteration, dt);
    }

    /// Advance one step with impact response.
    pub fn flow_impact(
        &mut self,
        iteration: u64,
        dt: f64,
        umap: &UnconstrainedMap,
        operator: &ImpactOperator,
        cor: f64,
        imap: &ImpactMap,
    ) -> ConstraintImpulses {
        let t_end = iteration as f64 * dt;
        self.update_portals(t_end);
        self.scripting.start_of_step(iteration, dt);

        let mut q1 = DVector::zeros(self.state.q().len());
        let mut v1 = DVector::zeros(self.state.v().len());
        let impulses = imap.flow(
            &*self,
            umap,
            operator,
            t_end - dt,
            dt,
            cor,
            self.state.q(),
            self.state.v(),
            &mut q1,
            &mut v1,
        );

        self.commit(&mut q1, &mut v1);
        self.scripting.end_of_step(iteration, dt);
        impulses
    }

    /// Advance one step with impact and friction response.
    #[allow(clippy::too_many_arguments)]
    pub fn flow_impact_friction(
        &mut self,
        iteration: u64,
        dt: f64,
        umap: &UnconstrainedMap,
        cor: f64,
        mu: f64,
        solver: &StaggeredProjectionsSolver,
    ) -> ConstraintImpulses {
        let t_end = iteration as f64 * dt;
        self.update_portals(t_end);
        self.scripting.start_of_step(iteration, dt);

        let mut q1 = DVector::zeros(self.state.q().len());
        let mut v1 = DVector::zeros(self.state.v().len());
        let impulses = solver.flow(
            &*self,
            umap,
            t_end - dt,
            dt,
            cor,
            mu,
            self.state.q(),
            self.state.v(),
            &mut q1,
            &mut v1,
        );

        self.commit(&mut q1, &mut v1);
        self.scripting.end_of_step(iteration, dt);
        impulses
    }

    /// Advance portal translations to the given simulation time.
    fn update_portals(&mut self, t: f64) {
        for portal in self.state.portals_mut() {
            portal.update(t);
        }
    }

    /// Commit a step result and wrap positions through portals.
    fn commit(&mut self, q1: &mut DVector<f64>, v1: &mut DVector<f64>) {
        self.state.swap_configuration(q1, v1);
        self.state.enforce_periodic_boundary_conditions();
    }
}

impl FlowableSystem for Sim {
    /// Generalized force: zero, then every body force accumulated.
    fn compute_force(&self, q: &DVector<f64>, v: &DVector<f64>, _t: f64) -> DVector<f64> {
        debug_assert_eq!(q.len(), self.state.q().len());
        let mut f = DVector::zeros(q.len());
        for force in self.state.forces() {
            force.accumulate(
                q,
                v,
                self.state.mass_diagonal(),
                self.state.geometry(),
                self.state.geometry_indices(),
                &mut f,
            );
        }
        f
    }

    fn mass_inv_diagonal(&self) -> &DVector<f64> {
        self.state.mass_inv_diagonal()
    }
}
