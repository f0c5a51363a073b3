//! Canonical simulation state.
//!
//! The state owns the flat configuration and velocity vectors, the diagonal
//! mass operator and its inverse, the geometry table, body forces, static
//! walls, and portals. Everything is read-only to the rest of the system
//! except for the two mutations the stepping drivers are allowed to make:
//! swapping in a freshly integrated `(q, v)` pair and advancing portal
//! translations at the start of a step. The post-step wrap of positions
//! through portals also lives here, next to the data it touches.

use nalgebra::{DVector, Vector2};

use crate::error::SimError;
use crate::forces::Force;
use crate::geometry::Geometry;
use crate::plane::StaticPlane;
use crate::portal::PlanarPortal;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Complete state of a rigid-disk simulation.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct State {
    q: DVector<f64>,
    v: DVector<f64>,
    mass: DVector<f64>,
    mass_inv: DVector<f64>,
    geometry: Vec<Geometry>,
    geometry_indices: Vec<usize>,
    forces: Vec<Force>,
    planes: Vec<StaticPlane>,
    portals: Vec<PlanarPortal>,
}

impl State {
    /// Assemble a state from its parts.
    ///
    /// `q`, `v`, and `mass` are flat vectors of per-body triples
    /// `(x, y, theta)`, `(vx, vy, omega)`, and `(m, m, I)`.
    ///
    /// # Errors
    ///
    /// Returns an error when the vector lengths disagree or are not a
    /// multiple of three, when any mass or inertia entry is not strictly
    /// positive, or when a geometry index is out of range.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        q: DVector<f64>,
        v: DVector<f64>,
        mass: DVector<f64>,
        geometry: Vec<Geometry>,
        geometry_indices: Vec<usize>,
        forces: Vec<Force>,
        planes: Vec<StaticPlane>,
        portals: Vec<PlanarPortal>,
    ) -> Result<Self, SimError> {
        if q.len() % 3 != 0 || v.len() != q.len() || mass.len() != q.len() {
            return Err(SimError::invalid_config(format!(
                "state vectors must share a length divisible by 3, got q={}, v={}, m={}",
                q.len(),
                v.len(),
                mass.len()
            )));
        }
        let nbodies = q.len() / 3;
        if geometry_indices.len() != nbodies {
            return Err(SimError::invalid_config(format!(
                "expected {nbodies} geometry indices, got {}",
                geometry_indices.len()
            )));
        }
        for &index in &geometry_indices {
            if index >= geometry.len() {
                return Err(SimError::InvalidGeometryIndex {
                    index,
                    len: geometry.len(),
                });
            }
        }
        for body in 0..nbodies {
            for offset in 0..3 {
                let value = mass[3 * body + offset];
                if !(value.is_finite() && value > 0.0) {
                    return Err(SimError::InvalidMass { body, value });
                }
            }
        }
        let mass_inv = mass.map(|m| 1.0 / m);
        Ok(Self {
            q,
            v,
            mass,
            mass_inv,
            geometry,
            geometry_indices,
            forces,
            planes,
            portals,
        })
    }

    /// Number of simulated bodies.
    #[must_use]
    pub fn num_bodies(&self) -> usize {
        self.q.len() / 3
    }

    /// The configuration vector.
    #[must_use]
    pub const fn q(&self) -> &DVector<f64> {
        &self.q
    }

    /// The velocity vector.
    #[must_use]
    pub const fn v(&self) -> &DVector<f64> {
        &self.v
    }

    /// Diagonal of the mass operator.
    #[must_use]
    pub const fn mass_diagonal(&self) -> &DVector<f64> {
        &self.mass
    }

    /// Diagonal of the inverse mass operator.
    #[must_use]
    pub const fn mass_inv_diagonal(&self) -> &DVector<f64> {
        &self.mass_inv
    }

    /// Mass of body `i`.
    #[must_use]
    pub fn mass(&self, i: usize) -> f64 {
        self.mass[3 * i]
    }

    /// Rotational inertia of body `i`.
    #[must_use]
    pub fn inertia(&self, i: usize) -> f64 {
        self.mass[3 * i + 2]
    }

    /// Center of mass of body `i`.
    #[must_use]
    pub fn body_position(&self, i: usize) -> Vector2<f64> {
        Vector2::new(self.q[3 * i], self.q[3 * i + 1])
    }

    /// Orientation of body `i`.
    #[must_use]
    pub fn body_theta(&self, i: usize) -> f64 {
        self.q[3 * i + 2]
    }

    /// Linear velocity of body `i`.
    #[must_use]
    pub fn body_velocity(&self, i: usize) -> Vector2<f64> {
        Vector2::new(self.v[3 * i], self.v[3 * i + 1])
    }

    /// Angular velocity of body `i`.
    #[must_use]
    pub fn body_omega(&self, i: usize) -> f64 {
        self.v[3 * i + 2]
    }

    /// The geometry table.
    #[must_use]
    pub fn geometry(&self) -> &[Geometry] {
        &self.geometry
    }

    /// Per-body indices into the geometry table.
    #[must_use]
    pub fn geometry_indices(&self) -> &[usize] {
        &self.geometry_indices
    }

    /// Geometry of body `i`.
    #[must_use]
    pub fn body_geometry(&self, i: usize) -> &Geometry {
        &self.geometry[self.geometry_indices[i]]
    }

    /// The body forces.
    #[must_use]
    pub fn forces(&self) -> &[Force] {
        &self.forces
    }

    /// The static walls (planes not consumed by portals).
    #[must_use]
    pub fn planes(&self) -> &[StaticPlane] {
        &self.planes
    }

    /// The portals.
    #[must_use]
    pub fn portals(&self) -> &[PlanarPortal] {
        &self.portals
    }

    /// Mutable access to the portals, for start-of-step translation updates.
    pub fn portals_mut(&mut self) -> &mut [PlanarPortal] {
        &mut self.portals
    }

    /// Swap a freshly integrated configuration and velocity into the state.
    ///
    /// The previous vectors land in the arguments, which keeps the step
    /// allocation-free.
    pub fn swap_configuration(&mut self, q: &mut DVector<f64>, v: &mut DVector<f64>) {
        debug_assert_eq!(q.len(), self.q.len());
        debug_assert_eq!(v.len(), self.v.len());
        std::mem::swap(&mut self.q, q);
        std::mem::swap(&mut self.v, v);
    }

    /// Wrap every body center that crossed into a portal back into the
    /// domain.
    ///
    /// Idempotent: a second application leaves `q` unchanged.
    pub fn enforce_periodic_boundary_conditions(&mut self) {
        let nbodies = self.q.len() / 3;
        for portal in &self.portals {
            for body in 0..nbodies {
                let x = Vector2::new(self.q[3 * body], self.q[3 * body + 1]);
                if portal.point_inside_portal(&x) {
                    let wrapped = portal.teleport_point_inside_portal(&x);
                    self.q[3 * body] = wrapped.x;
                    self.q[3 * body + 1] = wrapped.y;
                }
            }
        }
    }
}
