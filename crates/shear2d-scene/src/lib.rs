//! Declarative XML scenes for the shear2d rigid-disk simulator.
//!
//! A scene file describes everything a run needs: bodies and their
//! geometry, body forces, walls, portals (plain or Lees-Edwards), the
//! integrator with its exact rational timestep, and at most one of the
//! constraint-response solver blocks. Parsing and validation both happen
//! at load time; a simulation never starts from a scene that violates a
//! constraint.
//!
//! ```
//! let loaded = shear2d_scene::load_scene_str(
//!     r#"<shear2d_scene>
//!          <gravity f="0 -9.81"/>
//!          <integrator type="verlet" dt="1/60"/>
//!          <circle r="0.5"/>
//!          <body x="0 5" m="1" I="1"/>
//!        </shear2d_scene>"#,
//! ).unwrap();
//! assert_eq!(loaded.sim.state().num_bodies(), 1);
//! ```

#![deny(clippy::unwrap_used, clippy::expect_used)]
#![warn(missing_docs)]
#![allow(clippy::missing_errors_doc)]

mod error;
mod loader;
mod parser;
mod types;

pub use error::{Result, SceneError};
pub use loader::{build_scene, load_scene_file, load_scene_str, LoadedScene, SimSetup};
pub use parser::parse_scene_str;
pub use types::{BodySpec, LeesEdwardsSpec, PortalSpec, SceneDescription};
