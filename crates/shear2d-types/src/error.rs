//! Error types for simulator construction and configuration.

use thiserror::Error;

/// Errors that can occur while building or configuring a simulation.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SimError {
    /// Timestep string could not be parsed as a positive rational.
    #[error("invalid timestep '{0}' (must be a positive rational or decimal)")]
    InvalidTimestep(String),

    /// A body index was out of range.
    #[error("invalid body index: {0}")]
    InvalidBodyIndex(usize),

    /// A geometry index was out of range.
    #[error("invalid geometry index {index} (table has {len} entries)")]
    InvalidGeometryIndex {
        /// The offending index.
        index: usize,
        /// Number of entries in the geometry table.
        len: usize,
    },

    /// A mass or inertia entry was not strictly positive.
    #[error("invalid mass entry for body {body}: {value} (must be positive)")]
    InvalidMass {
        /// The body with the bad entry.
        body: usize,
        /// The offending value.
        value: f64,
    },

    /// Invalid configuration.
    #[error("invalid configuration: {reason}")]
    InvalidConfig {
        /// Description of the configuration error.
        reason: String,
    },

    /// A named solver exists in the grammar but is provided by an external
    /// numerical backend, not by this crate.
    #[error("solver '{name}' is provided by an external backend and is not available here")]
    UnsupportedSolver {
        /// Name of the requested solver.
        name: String,
    },
}

impl SimError {
    /// Create an invalid configuration error.
    #[must_use]
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }

    /// Create an unsupported solver error.
    #[must_use]
    pub fn unsupported_solver(name: impl Into<String>) -> Self {
        Self::UnsupportedSolver { name: name.into() }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SimError::InvalidTimestep("0/0".to_string());
        assert!(err.to_string().contains("0/0"));

        let err = SimError::InvalidMass {
            body: 3,
            value: -1.0,
        };
        assert!(err.to_string().contains("body 3"));

        let err = SimError::unsupported_solver("lcp");
        assert!(err.to_string().contains("lcp"));
    }
}
