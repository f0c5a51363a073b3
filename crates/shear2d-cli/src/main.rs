//! Command-line driver for the shear2d rigid-disk simulator.
//!
//! Loads an XML scene (or resumes a snapshot), steps the simulation to
//! its end time, and writes configuration and constraint-force data at
//! a fixed cadence.

use std::path::PathBuf;

use anyhow::{anyhow, bail, Context, Result};
use clap::Parser;
use tracing::info;

use shear2d_core::{
    ConstraintImpulses, ImpactMap, ImpactOperator, Sim, StaggeredProjectionsSolver,
    UnconstrainedMap,
};
use shear2d_scene::SimSetup;
use shear2d_types::{ImpactOperatorKind, Timestep};

mod output;

use output::Snapshot;

#[derive(Parser)]
#[command(name = "shear2d")]
#[command(about = "2D rigid-disk simulation with portals and shearing boundaries")]
#[command(version)]
struct Cli {
    /// XML scene file to simulate.
    scene: Option<PathBuf>,

    /// Save constraint impulses alongside configuration output.
    #[arg(short = 'i', long)]
    impulses: bool,

    /// Resume the simulation from a serialized snapshot.
    #[arg(short = 'r', long, value_name = "FILE")]
    resume: Option<PathBuf>,

    /// Override the end time specified in the scene file.
    #[arg(short = 'e', long, value_name = "T")]
    end: Option<f64>,

    /// Save simulation state to the given directory.
    #[arg(short = 'o', long = "output_dir", value_name = "DIR")]
    output_dir: Option<PathBuf>,

    /// Rate at which to save simulation data, in Hz.
    #[arg(short = 'f', long, value_name = "HZ")]
    frequency: Option<u64>,

    /// Save resumable snapshots: 0 overwrites one snapshot, 1 keeps a
    /// numbered snapshot per save.
    #[arg(short = 's', long = "serialize_snapshots", value_name = "0|1")]
    serialize_snapshots: Option<u8>,
}

/// The constraint response configured by the scene.
enum Response {
    Unconstrained,
    Impact {
        operator: ImpactOperator,
        cor: f64,
        map: ImpactMap,
    },
    ImpactFriction {
        solver: StaggeredProjectionsSolver,
        cor: f64,
        mu: f64,
    },
}

impl Response {
    fn from_setup(setup: &SimSetup) -> Result<Self> {
        if let Some(config) = setup.impact_operator {
            let operator = match config.kind {
                ImpactOperatorKind::GaussSeidel => ImpactOperator::GaussSeidel {
                    max_iters: config.max_iters,
                    tol: config.tol,
                },
                ImpactOperatorKind::Jacobi => ImpactOperator::Jacobi {
                    max_iters: config.max_iters,
                    tol: config.tol,
                },
                other => bail!("impact operator '{}' is not available", other.name()),
            };
            return Ok(Self::Impact {
                operator,
                cor: config.cor,
                map: ImpactMap::new(),
            });
        }
        if let Some(config) = setup.staggered_solver {
            return Ok(Self::ImpactFriction {
                solver: StaggeredProjectionsSolver::new(config),
                cor: config.cor,
                mu: config.mu,
            });
        }
        Ok(Self::Unconstrained)
    }
}

struct Driver {
    sim: Sim,
    setup: SimSetup,
    umap: UnconstrainedMap,
    response: Response,
    dt: Timestep,
    iteration: u64,
    output_dir: Option<PathBuf>,
    output_forces: bool,
    steps_per_save: u64,
    frame: u64,
    save_width: usize,
    snapshots: Option<SnapshotMode>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum SnapshotMode {
    Overwrite,
    Numbered,
}

impl Driver {
    fn run(&mut self) -> Result<()> {
        self.export_configuration()?;

        while self.dt.times(self.iteration) < self.setup.end_time {
            self.step()?;
        }

        info!(
            time = self.dt.times(self.iteration),
            iterations = self.iteration,
            "simulation complete"
        );
        Ok(())
    }

    fn step(&mut self) -> Result<()> {
        let next_iteration = self.iteration + 1;
        let capture_forces = self.output_forces && self.iteration % self.steps_per_save == 0;
        let dt = self.dt.scalar();

        let impulses: Option<ConstraintImpulses> = match &self.response {
            Response::Unconstrained => {
                self.sim.flow_unconstrained(next_iteration, dt, &self.umap);
                None
            }
            Response::Impact { operator, cor, map } => Some(self.sim.flow_impact(
                next_iteration,
                dt,
                &self.umap,
                operator,
                *cor,
                map,
            )),
            Response::ImpactFriction { solver, cor, mu } => Some(self.sim.flow_impact_friction(
                next_iteration,
                dt,
                &self.umap,
                *cor,
                *mu,
                solver,
            )),
        };

        if capture_forces {
            let impulses = impulses.unwrap_or_default();
            let dir = self
                .output_dir
                .as_ref()
                .ok_or_else(|| anyhow!("impulse output requires an output directory"))?;
            // The forces pair with the configuration saved just before
            // this step
            let frame = self.frame.saturating_sub(1);
            let path = output::save_forces(
                dir,
                frame,
                self.save_width,
                dt,
                self.iteration,
                &impulses,
            )?;
            info!(file = %path.display(), "saved constraint forces");
        }

        self.iteration = next_iteration;
        self.export_configuration()
    }

    fn export_configuration(&mut self) -> Result<()> {
        if self.iteration % self.steps_per_save != 0 {
            return Ok(());
        }

        if let Some(dir) = &self.output_dir {
            let path = output::save_configuration(
                dir,
                self.frame,
                self.save_width,
                self.dt.scalar(),
                self.iteration,
                self.sim.state(),
            )?;
            info!(
                time = self.dt.times(self.iteration),
                file = %path.display(),
                "saved configuration"
            );
        }

        if let Some(mode) = self.snapshots {
            let name = match mode {
                SnapshotMode::Overwrite => "serial.json".to_string(),
                SnapshotMode::Numbered => {
                    format!("serial_{frame:0width$}.json", frame = self.frame, width = self.save_width)
                }
            };
            let path = self
                .output_dir
                .clone()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(name);
            output::save_snapshot(
                &path,
                &Snapshot {
                    state: self.sim.state().clone(),
                    setup: self.setup,
                    iteration: self.iteration,
                    output_forces: self.output_forces,
                    steps_per_save: self.steps_per_save,
                    frame: self.frame,
                    save_width: self.save_width,
                },
            )?;
            info!(file = %path.display(), "saved snapshot");
        }

        self.frame += 1;
        Ok(())
    }
}

/// Zero-padding width for save numbers over the whole run.
fn save_number_width(end_time: f64, dt: &Timestep, steps_per_save: u64) -> usize {
    if !end_time.is_finite() {
        return 4;
    }
    let total_saves = 1.0 + (end_time / dt.scalar()).ceil() / steps_per_save as f64;
    let mut width = 0;
    let mut remaining = total_saves.max(1.0) as u64;
    while remaining > 0 {
        width += 1;
        remaining /= 10;
    }
    width
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    if cli.impulses && cli.output_dir.is_none() {
        bail!("impulse output requires an output directory");
    }

    let snapshots = match cli.serialize_snapshots {
        None => None,
        Some(0) => Some(SnapshotMode::Overwrite),
        Some(1) => Some(SnapshotMode::Numbered),
        Some(other) => bail!("-s/--serialize_snapshots must be 0 or 1, got {other}"),
    };

    let mut driver = if let Some(snapshot_path) = &cli.resume {
        let snapshot = output::load_snapshot(snapshot_path)?;
        info!(
            file = %snapshot_path.display(),
            iteration = snapshot.iteration,
            "resuming serialized simulation"
        );
        let mut setup = snapshot.setup;
        if let Some(end) = cli.end {
            setup.end_time = end;
        }
        let dt = setup.integrator.dt;
        let response = Response::from_setup(&setup)?;
        Driver {
            sim: Sim::new(snapshot.state),
            umap: UnconstrainedMap::from(setup.integrator.kind),
            response,
            dt,
            setup,
            iteration: snapshot.iteration,
            output_dir: cli.output_dir.clone(),
            output_forces: snapshot.output_forces || cli.impulses,
            steps_per_save: snapshot.steps_per_save,
            frame: snapshot.frame,
            save_width: snapshot.save_width,
            snapshots,
        }
    } else {
        let scene_path = cli
            .scene
            .as_ref()
            .ok_or_else(|| anyhow!("a scene file is required unless resuming"))?;
        let loaded = shear2d_scene::load_scene_file(scene_path)
            .with_context(|| format!("failed to load scene {}", scene_path.display()))?;

        let mut setup = loaded.setup;
        if let Some(end) = cli.end {
            if end <= 0.0 {
                bail!("-e/--end must be a positive scalar");
            }
            setup.end_time = end;
        }

        let dt = setup.integrator.dt;
        let steps_per_save = match cli.frequency {
            None | Some(0) => 1,
            Some(hz) => dt.steps_per_output(hz).ok_or_else(|| {
                anyhow!(
                    "timestep {dt} and output frequency {hz} Hz do not yield an \
                     integer number of timesteps per save"
                )
            })?,
        };

        info!(bodies = loaded.sim.state().num_bodies(), %dt, "scene ready");

        let response = Response::from_setup(&setup)?;
        Driver {
            sim: loaded.sim,
            umap: UnconstrainedMap::from(setup.integrator.kind),
            response,
            dt,
            save_width: save_number_width(setup.end_time, &dt, steps_per_save),
            setup,
            iteration: 0,
            output_dir: cli.output_dir.clone(),
            output_forces: cli.impulses,
            steps_per_save,
            frame: 0,
            snapshots,
        }
    };

    if let Some(dir) = &driver.output_dir {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create output directory {}", dir.display()))?;
    }
    if !driver.setup.end_time.is_finite() {
        info!("no end time specified, simulation will run indefinitely");
    }

    driver.run()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_save_number_width() {
        let dt: Timestep = "1/60".parse().unwrap();
        // 60 steps saved every step: 61 saves, two digits
        assert_eq!(save_number_width(1.0, &dt, 1), 2);
        // Indefinite runs use a fixed width
        assert_eq!(save_number_width(f64::INFINITY, &dt, 1), 4);
    }

    #[test]
    fn test_cli_parses_original_flag_set() {
        let cli = Cli::parse_from([
            "shear2d",
            "scene.xml",
            "-i",
            "-e",
            "2.5",
            "-o",
            "out",
            "-f",
            "30",
            "-s",
            "1",
        ]);
        assert_eq!(cli.scene.unwrap(), PathBuf::from("scene.xml"));
        assert!(cli.impulses);
        assert_eq!(cli.end, Some(2.5));
        assert_eq!(cli.frequency, Some(30));
        assert_eq!(cli.serialize_snapshots, Some(1));
    }

    #[test]
    fn test_response_composition_is_exclusive() {
        let setup: SimSetup = serde_json::from_str(
            r#"{
                "integrator": {"kind": "Verlet", "dt": {"num": 1, "den": 60}},
                "end_time": 1.0,
                "impact_operator": null,
                "staggered_solver": null
            }"#,
        )
        .unwrap();
        assert!(matches!(
            Response::from_setup(&setup),
            Ok(Response::Unconstrained)
        ));
    }
}
