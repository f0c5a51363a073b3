//! Scene validation and simulator assembly.
//!
//! The loader turns a parsed [`SceneDescription`] into a ready
//! [`Sim`] plus the [`SimSetup`] describing which maps the driver
//! should compose. Every cross-element rule is enforced here, at load
//! time, so a simulation never starts from an inconsistent scene.

use std::collections::BTreeSet;
use std::path::Path;

use nalgebra::DVector;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use shear2d_core::Sim;
use shear2d_types::{
    ImpactOperatorConfig, IntegratorConfig, PlanarPortal, SimError, StaggeredProjectionsConfig,
    State, StaticPlane,
};

use crate::error::{Result, SceneError};
use crate::parser::parse_scene_str;
use crate::types::SceneDescription;

/// Which maps the driver should compose, plus the shared scalars.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimSetup {
    /// Integrator selection and exact timestep.
    pub integrator: IntegratorConfig,
    /// Simulation end time; positive infinity when the scene does not
    /// declare one.
    #[serde(with = "end_time_serde")]
    pub end_time: f64,
    /// Impact-only response, when configured.
    pub impact_operator: Option<ImpactOperatorConfig>,
    /// Impact-friction response, when configured.
    pub staggered_solver: Option<StaggeredProjectionsConfig>,
}

/// An indefinite end time is infinite, which JSON cannot encode; it
/// round-trips as a null.
mod end_time_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(end_time: &f64, s: S) -> Result<S::Ok, S::Error> {
        end_time.is_finite().then_some(*end_time).serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
        Ok(Option::<f64>::deserialize(d)?.unwrap_or(f64::INFINITY))
    }
}

/// A loaded scene: the simulator and its driver setup.
pub struct LoadedScene {
    /// The assembled simulator.
    pub sim: Sim,
    /// The driver setup.
    pub setup: SimSetup,
}

/// Load a scene from an XML string.
///
/// # Errors
///
/// Returns an error when parsing fails or any cross-element rule is
/// violated: missing integrator, conflicting or external solvers,
/// portal plane misuse, unknown scripting callback, or invalid body
/// data.
pub fn load_scene_str(xml: &str) -> Result<LoadedScene> {
    build_scene(parse_scene_str(xml)?)
}

/// Load a scene from a file on disk.
///
/// # Errors
///
/// As [`load_scene_str`], plus I/O failures reading the file.
pub fn load_scene_file(path: impl AsRef<Path>) -> Result<LoadedScene> {
    let xml = std::fs::read_to_string(path.as_ref())?;
    let loaded = load_scene_str(&xml)?;
    info!(
        scene = %path.as_ref().display(),
        bodies = loaded.sim.state().num_bodies(),
        "loaded scene"
    );
    Ok(loaded)
}

/// Validate a parsed description and assemble the simulator.
pub fn build_scene(description: SceneDescription) -> Result<LoadedScene> {
    let integrator = description
        .integrator
        .ok_or(SceneError::MissingElement {
            element: "integrator",
        })?;

    let solver_blocks = usize::from(description.impact_operator.is_some())
        + usize::from(description.staggered_solver.is_some())
        + usize::from(description.sobogus_solver.is_some());
    if solver_blocks > 1 {
        return Err(SceneError::ConflictingSolvers);
    }

    if let Some(sobogus) = &description.sobogus_solver {
        sobogus.validate()?;
        return Err(SimError::unsupported_solver("sobogus").into());
    }
    if let Some(operator) = &description.impact_operator {
        operator.validate()?;
        if !operator.kind.is_builtin() {
            return Err(SimError::unsupported_solver(operator.kind.name()).into());
        }
    }
    if let Some(solver) = &description.staggered_solver {
        solver.validate()?;
    }

    match description.scripting_callback.as_deref() {
        None | Some("") => {}
        Some(other) => return Err(SceneError::UnknownCallback(other.to_string())),
    }

    let (portals, walls) = build_portals(&description)?;
    let state = build_state(&description, walls, portals)?;
    let sim = Sim::new(state);

    let initial_collisions = sim.compute_active_set(sim.state().q(), sim.state().q());
    if !initial_collisions.is_empty() {
        warn!(
            count = initial_collisions.len(),
            "scene starts with active collisions"
        );
    }

    Ok(LoadedScene {
        sim,
        setup: SimSetup {
            integrator,
            end_time: description.end_time.unwrap_or(f64::INFINITY),
            impact_operator: description.impact_operator,
            staggered_solver: description.staggered_solver,
        },
    })
}

/// Build portals from their specs and return them with the leftover
/// walls.
///
/// Each portal copies its two planes by value, and every plane claimed
/// by a portal is removed from the standalone wall list. Plane indices
/// must be in range and distinct across all portal planes.
fn build_portals(
    description: &SceneDescription,
) -> Result<(Vec<PlanarPortal>, Vec<StaticPlane>)> {
    let planes = &description.planes;
    let mut claimed: BTreeSet<usize> = BTreeSet::new();
    let mut portals = Vec::with_capacity(description.portals.len());

    for spec in &description.portals {
        for index in [spec.plane_a, spec.plane_b] {
            if index >= planes.len() {
                return Err(SceneError::InvalidPlaneIndex {
                    index,
                    len: planes.len(),
                });
            }
        }
        if spec.plane_a == spec.plane_b {
            return Err(SceneError::PortalPlaneReuse {
                index: spec.plane_a,
            });
        }
        for index in [spec.plane_a, spec.plane_b] {
            if !claimed.insert(index) {
                return Err(SceneError::PortalPlaneReuse { index });
            }
        }

        let plane_a = planes[spec.plane_a];
        let plane_b = planes[spec.plane_b];
        let portal = match spec.lees_edwards {
            None => PlanarPortal::new(plane_a, plane_b),
            Some(le) => PlanarPortal::new_lees_edwards(
                plane_a,
                plane_b,
                le.v_a,
                le.v_b,
                le.bounds_a,
                le.bounds_b,
            )?,
        };
        portals.push(portal);
    }

    let walls = planes
        .iter()
        .enumerate()
        .filter(|(index, _)| !claimed.contains(index))
        .map(|(_, plane)| *plane)
        .collect();

    Ok((portals, walls))
}

/// Assemble the flat state vectors from the body list.
fn build_state(
    description: &SceneDescription,
    walls: Vec<StaticPlane>,
    portals: Vec<PlanarPortal>,
) -> Result<State> {
    let nbodies = description.bodies.len();
    let mut q = DVector::zeros(3 * nbodies);
    let mut v = DVector::zeros(3 * nbodies);
    let mut mass = DVector::zeros(3 * nbodies);
    let mut geometry_indices = Vec::with_capacity(nbodies);

    for (body, spec) in description.bodies.iter().enumerate() {
        q[3 * body] = spec.x.x;
        q[3 * body + 1] = spec.x.y;
        q[3 * body + 2] = spec.theta;
        v[3 * body] = spec.v.x;
        v[3 * body + 1] = spec.v.y;
        v[3 * body + 2] = spec.omega;
        mass[3 * body] = spec.m;
        mass[3 * body + 1] = spec.m;
        mass[3 * body + 2] = spec.inertia;
        geometry_indices.push(spec.geo);
    }

    Ok(State::new(
        q,
        v,
        mass,
        description.geometry.clone(),
        geometry_indices,
        description.forces.clone(),
        walls,
        portals,
    )?)
}
