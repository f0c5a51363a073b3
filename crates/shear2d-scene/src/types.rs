//! Intermediate representation of a parsed scene file.
//!
//! The parser fills these structures without judging them; the loader
//! validates and assembles them into a simulator.

use nalgebra::Vector2;
use shear2d_types::{
    Force, Geometry, ImpactOperatorConfig, IntegratorConfig, SobogusConfig,
    StaggeredProjectionsConfig, StaticPlane,
};

/// A parsed scene, prior to validation.
#[derive(Debug, Clone, Default)]
pub struct SceneDescription {
    /// Simulation end time, if declared.
    pub end_time: Option<f64>,
    /// Named scripting callback, if declared.
    pub scripting_callback: Option<String>,
    /// Declared body forces, in order.
    pub forces: Vec<Force>,
    /// The integrator block.
    pub integrator: Option<IntegratorConfig>,
    /// The impact-only solver block, if present.
    pub impact_operator: Option<ImpactOperatorConfig>,
    /// The staggered-projections solver block, if present.
    pub staggered_solver: Option<StaggeredProjectionsConfig>,
    /// The So-bogus solver block, if present.
    pub sobogus_solver: Option<SobogusConfig>,
    /// Declared planes, in order; portals consume entries from this list.
    pub planes: Vec<StaticPlane>,
    /// Declared portals.
    pub portals: Vec<PortalSpec>,
    /// The geometry table, in declaration order.
    pub geometry: Vec<Geometry>,
    /// Declared bodies, in order.
    pub bodies: Vec<BodySpec>,
}

/// A portal declaration referencing planes by index.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PortalSpec {
    /// Index of plane A in the declared plane list.
    pub plane_a: usize,
    /// Index of plane B in the declared plane list.
    pub plane_b: usize,
    /// Lees-Edwards sliding parameters; `None` for a plain portal.
    pub lees_edwards: Option<LeesEdwardsSpec>,
}

/// Sliding parameters of a Lees-Edwards portal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LeesEdwardsSpec {
    /// Tangent speed of plane A.
    pub v_a: f64,
    /// Tangent speed of plane B.
    pub v_b: f64,
    /// Translation bounds of plane A.
    pub bounds_a: (f64, f64),
    /// Translation bounds of plane B.
    pub bounds_b: (f64, f64),
}

/// A body declaration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BodySpec {
    /// Center of mass.
    pub x: Vector2<f64>,
    /// Orientation.
    pub theta: f64,
    /// Linear velocity.
    pub v: Vector2<f64>,
    /// Angular velocity.
    pub omega: f64,
    /// Mass.
    pub m: f64,
    /// Rotational inertia.
    pub inertia: f64,
    /// Index into the geometry table.
    pub geo: usize,
}
