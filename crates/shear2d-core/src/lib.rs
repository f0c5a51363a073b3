//! Collision pipeline and time stepping for the shear2d rigid-disk
//! simulator.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                          Sim                                 │
//! │  flow drivers: portal update → maps → commit → wrap         │
//! │  queries: energy, momentum, forces, collision tests         │
//! └───────────────┬───────────────────────────┬─────────────────┘
//!                 │                           │
//!                 ▼                           ▼
//! ┌───────────────────────────┐  ┌─────────────────────────────┐
//! │      Active set           │  │           Maps               │
//! │  broad phase + teleport   │  │  unconstrained / impact /    │
//! │  indexing + narrow phase  │  │  staggered impact-friction   │
//! └───────────────┬───────────┘  └─────────────────────────────┘
//!                 │
//!                 ▼
//! ┌───────────────────────────┐
//! │       Constraints         │
//! │  normals, bases, friction │
//! │  stencils, equality       │
//! └───────────────────────────┘
//! ```
//!
//! Per step: portal translations advance to the end-of-step time, the
//! configured map produces `(q1, v1)` from `(q0, v0)`, the result is
//! committed, and body centers that crossed a portal are wrapped back
//! into the domain. Collision queries run at `q1` while constraint
//! anchors are captured at `q0`, which preserves angular momentum across
//! impulsive response.

#![deny(clippy::unwrap_used, clippy::expect_used)]
#![warn(missing_docs)]
#![allow(
    clippy::missing_const_for_fn,     // Many methods can't be const due to nalgebra
    clippy::suboptimal_flops,          // mul_add style changes aren't always clearer
    clippy::cast_precision_loss,       // iteration counts to f64 are fine here
    clippy::missing_errors_doc
)]

pub mod active_set;
pub mod assembly;
pub mod broad_phase;
mod constraint;
mod friction;
mod impact;
mod integrators;
mod scripting;
mod sim;
mod teleport;

pub use constraint::{circle_circle_active, cross2, static_plane_circle_active, Constraint};
pub use friction::StaggeredProjectionsSolver;
pub use impact::{ConstraintImpulses, ImpactMap, ImpactOperator};
pub use integrators::{FlowableSystem, UnconstrainedMap};
pub use scripting::{NullCallback, ScriptingCallback};
pub use sim::Sim;
pub use teleport::{TeleportedBody, TeleportedCollision};

// Re-export the data layer for downstream convenience
pub use shear2d_types as types;
