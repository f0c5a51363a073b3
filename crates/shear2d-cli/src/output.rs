//! Output artifacts: configuration saves, constraint force data, and
//! resumable snapshots.

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use shear2d_core::ConstraintImpulses;
use shear2d_scene::SimSetup;
use shear2d_types::State;

/// A per-save configuration artifact.
#[derive(Serialize)]
struct ConfigArtifact<'a> {
    timestep: f64,
    iteration: u64,
    time: f64,
    q: &'a [f64],
    v: &'a [f64],
    m: &'a [f64],
    geometry: &'a [shear2d_types::Geometry],
    geometry_indices: &'a [usize],
    static_planes: &'a [shear2d_types::StaticPlane],
    planar_portals: &'a [shear2d_types::PlanarPortal],
}

/// A per-save constraint force artifact.
#[derive(Serialize)]
struct ForceArtifact<'a> {
    timestep: f64,
    iteration: u64,
    time: f64,
    bodies: &'a [(usize, Option<usize>)],
    normals: Vec<[f64; 2]>,
    normal_impulses: &'a [f64],
    #[serde(skip_serializing_if = "Option::is_none")]
    friction_impulses: Option<&'a [f64]>,
}

/// Everything needed to resume a run bit-for-bit.
#[derive(Serialize, Deserialize)]
pub struct Snapshot {
    /// The full simulator state.
    pub state: State,
    /// Driver setup from the original scene.
    pub setup: SimSetup,
    /// Iterations completed so far.
    pub iteration: u64,
    /// Whether constraint forces are being saved.
    pub output_forces: bool,
    /// Timesteps between saves.
    pub steps_per_save: u64,
    /// Saves completed so far.
    pub frame: u64,
    /// Zero-padding width of save numbers.
    pub save_width: usize,
}

fn write_json(path: &Path, value: &impl Serialize) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("failed to create output file {}", path.display()))?;
    serde_json::to_writer(BufWriter::new(file), value)
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}

/// Write `config_<frame>.json` into the output directory.
pub fn save_configuration(
    dir: &Path,
    frame: u64,
    save_width: usize,
    dt: f64,
    iteration: u64,
    state: &State,
) -> Result<PathBuf> {
    let path = dir.join(format!("config_{frame:0save_width$}.json"));
    write_json(
        &path,
        &ConfigArtifact {
            timestep: dt,
            iteration,
            time: iteration as f64 * dt,
            q: state.q().as_slice(),
            v: state.v().as_slice(),
            m: state.mass_diagonal().as_slice(),
            geometry: state.geometry(),
            geometry_indices: state.geometry_indices(),
            static_planes: state.planes(),
            planar_portals: state.portals(),
        },
    )?;
    Ok(path)
}

/// Write `forces_<frame>.json` into the output directory.
pub fn save_forces(
    dir: &Path,
    frame: u64,
    save_width: usize,
    dt: f64,
    iteration: u64,
    impulses: &ConstraintImpulses,
) -> Result<PathBuf> {
    let path = dir.join(format!("forces_{frame:0save_width$}.json"));
    write_json(
        &path,
        &ForceArtifact {
            timestep: dt,
            iteration,
            time: iteration as f64 * dt,
            bodies: &impulses.bodies,
            normals: impulses.normals.iter().map(|n| [n.x, n.y]).collect(),
            normal_impulses: &impulses.alpha,
            friction_impulses: impulses.beta.as_deref(),
        },
    )?;
    Ok(path)
}

/// Write a resumable snapshot.
pub fn save_snapshot(path: &Path, snapshot: &Snapshot) -> Result<()> {
    write_json(path, snapshot)
}

/// Read a resumable snapshot.
pub fn load_snapshot(path: &Path) -> Result<Snapshot> {
    let file = File::open(path)
        .with_context(|| format!("failed to open snapshot {}", path.display()))?;
    serde_json::from_reader(std::io::BufReader::new(file))
        .with_context(|| format!("failed to parse snapshot {}", path.display()))
}
