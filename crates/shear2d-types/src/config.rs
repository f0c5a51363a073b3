//! Scene-level configuration for integrators and constraint solvers.
//!
//! These are descriptions, not implementations: the scene loader validates
//! them and the core crate turns them into the concrete maps. Range checks
//! live here so every entry point shares them.

use crate::error::SimError;
use crate::timestep::Timestep;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Unconstrained integration method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum IntegratorKind {
    /// First-order symplectic Euler.
    SymplecticEuler,
    /// Second-order velocity Verlet.
    Verlet,
}

impl IntegratorKind {
    /// Parse a scene-file integrator name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "symplectic_euler" => Some(Self::SymplecticEuler),
            "verlet" => Some(Self::Verlet),
            _ => None,
        }
    }
}

/// Integrator selection plus the exact timestep.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct IntegratorConfig {
    /// The integration method.
    pub kind: IntegratorKind,
    /// The fixed timestep.
    pub dt: Timestep,
}

/// Impact operator selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ImpactOperatorKind {
    /// Projected Gauss-Seidel sweeps.
    GaussSeidel,
    /// Projected Jacobi sweeps.
    Jacobi,
    /// LCP formulation, solved by an external backend.
    Lcp,
    /// Generalized reflections, solved by an external backend.
    Gr,
    /// Generalized relaxed reflections, solved by an external backend.
    Grr,
}

impl ImpactOperatorKind {
    /// Parse a scene-file operator name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "gauss_seidel" => Some(Self::GaussSeidel),
            "jacobi" => Some(Self::Jacobi),
            "lcp" => Some(Self::Lcp),
            "gr" => Some(Self::Gr),
            "grr" => Some(Self::Grr),
            _ => None,
        }
    }

    /// The scene-file name of this operator.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::GaussSeidel => "gauss_seidel",
            Self::Jacobi => "jacobi",
            Self::Lcp => "lcp",
            Self::Gr => "gr",
            Self::Grr => "grr",
        }
    }

    /// True when the operator ships with this workspace rather than an
    /// external numerical backend.
    #[must_use]
    pub const fn is_builtin(&self) -> bool {
        matches!(self, Self::GaussSeidel | Self::Jacobi)
    }
}

/// Impact-only response configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ImpactOperatorConfig {
    /// The operator.
    pub kind: ImpactOperatorKind,
    /// Coefficient of restitution.
    pub cor: f64,
    /// Maximum solver sweeps.
    pub max_iters: usize,
    /// Convergence tolerance on impulse change.
    pub tol: f64,
}

impl ImpactOperatorConfig {
    /// Validate the scalar ranges.
    ///
    /// # Errors
    ///
    /// Returns an error when any value is outside its admissible range.
    pub fn validate(&self) -> Result<(), SimError> {
        validate_cor(self.cor)?;
        validate_iteration_limits(self.max_iters, self.tol)
    }
}

/// Staggering strategy for the impact-friction map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum StaggeringKind {
    /// Alternate impact and friction solves until the velocity settles.
    Geometric,
    /// As geometric, with a final impact pass to scrub residual normal
    /// velocity.
    Stabilized,
}

impl StaggeringKind {
    /// Parse a scene-file staggering name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "geometric" => Some(Self::Geometric),
            "stabilized" => Some(Self::Stabilized),
            _ => None,
        }
    }
}

/// Staggered-projections impact-friction configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct StaggeredProjectionsConfig {
    /// Coefficient of friction.
    pub mu: f64,
    /// Coefficient of restitution.
    pub cor: f64,
    /// Maximum stagger rounds.
    pub max_iters: usize,
    /// Convergence tolerance on the velocity between rounds.
    pub tol: f64,
    /// Staggering strategy.
    pub staggering: StaggeringKind,
    /// Keep normal impulses across stagger rounds.
    pub warm_start_alpha: bool,
    /// Keep friction impulses across stagger rounds.
    pub warm_start_beta: bool,
}

impl StaggeredProjectionsConfig {
    /// Validate the scalar ranges.
    ///
    /// # Errors
    ///
    /// Returns an error when any value is outside its admissible range.
    pub fn validate(&self) -> Result<(), SimError> {
        validate_mu(self.mu)?;
        validate_cor(self.cor)?;
        validate_iteration_limits(self.max_iters, self.tol)
    }
}

/// Configuration of the So-bogus friction backend.
///
/// The grammar accepts it so scenes remain portable, but the backend
/// itself is external; loading a scene that selects it reports
/// [`SimError::UnsupportedSolver`].
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SobogusConfig {
    /// Coefficient of friction.
    pub mu: f64,
    /// Coefficient of restitution.
    pub cor: f64,
    /// Maximum iterations.
    pub max_iters: usize,
    /// Convergence evaluation cadence, in `[1, max_iters]`.
    pub eval_every: usize,
    /// Convergence tolerance.
    pub tol: f64,
    /// Staggering strategy.
    pub staggering: StaggeringKind,
}

impl SobogusConfig {
    /// Validate the scalar ranges.
    ///
    /// # Errors
    ///
    /// Returns an error when any value is outside its admissible range.
    pub fn validate(&self) -> Result<(), SimError> {
        validate_mu(self.mu)?;
        validate_cor(self.cor)?;
        validate_iteration_limits(self.max_iters, self.tol)?;
        if self.eval_every == 0 || self.eval_every > self.max_iters {
            return Err(SimError::invalid_config(format!(
                "eval_every must lie in [1, {}], got {}",
                self.max_iters, self.eval_every
            )));
        }
        Ok(())
    }
}

fn validate_cor(cor: f64) -> Result<(), SimError> {
    if !(0.0..=1.0).contains(&cor) {
        return Err(SimError::invalid_config(format!(
            "coefficient of restitution must lie in [0, 1], got {cor}"
        )));
    }
    Ok(())
}

fn validate_mu(mu: f64) -> Result<(), SimError> {
    if !(mu.is_finite() && mu >= 0.0) {
        return Err(SimError::invalid_config(format!(
            "coefficient of friction must be non-negative, got {mu}"
        )));
    }
    Ok(())
}

fn validate_iteration_limits(max_iters: usize, tol: f64) -> Result<(), SimError> {
    if max_iters == 0 {
        return Err(SimError::invalid_config("max_iters must be at least 1"));
    }
    if !(tol.is_finite() && tol >= 0.0) {
        return Err(SimError::invalid_config(format!(
            "tol must be non-negative, got {tol}"
        )));
    }
    Ok(())
}
