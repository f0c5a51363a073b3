//! Core data types for the shear2d rigid-disk simulator.
//!
//! This crate holds the pure data the simulation pipeline operates on:
//!
//! - [`State`] - configuration `q`, velocity `v`, the diagonal mass
//!   operator, geometry, body forces, walls, and portals
//! - [`Geometry`] - the closed set of body shapes (disks today)
//! - [`StaticPlane`] / [`PlanarPortal`] - boundary geometry, including
//!   Lees-Edwards shearing portals
//! - [`Force`] - body forces (uniform gravity, Hertzian penalty)
//! - [`Timestep`] - the exact rational timestep
//! - configuration structs for integrators and solvers
//!
//! No stepping, collision detection, or solving happens here; that lives
//! in `shear2d-core`. Keeping the data layer free of behavior lets scene
//! loading, persistence, and the pipeline share one vocabulary.
//!
//! # Coordinate conventions
//!
//! The simulation plane is spanned by `x` (right) and `y` (up). Each body
//! carries three generalized coordinates `(x, y, theta)` with `theta`
//! counterclockwise; the flat vectors `q` and `v` concatenate the per-body
//! triples in body order.

#![deny(clippy::unwrap_used, clippy::expect_used)]
#![warn(missing_docs)]
#![allow(
    clippy::missing_const_for_fn,     // Many methods can't be const due to nalgebra
    clippy::suboptimal_flops,          // mul_add style changes aren't always clearer
    clippy::missing_errors_doc         // Error docs added where non-obvious
)]

mod config;
mod error;
mod forces;
mod geometry;
mod plane;
mod portal;
mod state;
mod timestep;

pub use config::{
    ImpactOperatorConfig, ImpactOperatorKind, IntegratorConfig, IntegratorKind, SobogusConfig,
    StaggeredProjectionsConfig, StaggeringKind,
};
pub use error::SimError;
pub use forces::Force;
pub use geometry::{Aabb, Geometry};
pub use plane::StaticPlane;
pub use portal::{PlanarPortal, PortalSide};
pub use state::State;
pub use timestep::Timestep;

// Re-export math types for convenience
pub use nalgebra::{DVector, Matrix2, Vector2};

/// Result type for simulator operations.
pub type Result<T> = std::result::Result<T, SimError>;
