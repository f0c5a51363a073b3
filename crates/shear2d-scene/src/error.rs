//! Error types for scene parsing and loading.

use thiserror::Error;

/// Errors that can occur while parsing or loading a scene file.
#[derive(Debug, Error)]
pub enum SceneError {
    /// XML parsing error.
    #[error("XML parse error: {0}")]
    XmlParse(String),

    /// Missing required element.
    #[error("missing required element: {element}")]
    MissingElement {
        /// The missing element name.
        element: &'static str,
    },

    /// Missing required attribute.
    #[error("missing required attribute: {attribute} on {element}")]
    MissingAttribute {
        /// The missing attribute name.
        attribute: &'static str,
        /// The element that should have the attribute.
        element: &'static str,
    },

    /// Invalid attribute value.
    #[error("invalid value for {attribute} on {element}: {message}")]
    InvalidAttribute {
        /// The attribute with the invalid value.
        attribute: &'static str,
        /// The element containing the attribute.
        element: &'static str,
        /// Description of why the value is invalid.
        message: String,
    },

    /// A plane index referenced by a portal is out of range.
    #[error("portal references plane {index}, but only {len} planes exist")]
    InvalidPlaneIndex {
        /// The offending index.
        index: usize,
        /// Number of declared planes.
        len: usize,
    },

    /// A plane is claimed by more than one portal, or by both sides of
    /// the same portal.
    #[error("plane {index} is used by more than one portal plane")]
    PortalPlaneReuse {
        /// The offending plane index.
        index: usize,
    },

    /// More than one of the mutually exclusive solver blocks is present.
    #[error("impact_operator, staggered_projections_friction_solver, and sobogus_friction_solver are mutually exclusive")]
    ConflictingSolvers,

    /// A scripting callback other than the null default was requested.
    #[error("unknown scripting callback: {0}")]
    UnknownCallback(String),

    /// Simulator-level validation failure.
    #[error(transparent)]
    Sim(#[from] shear2d_types::SimError),

    /// File I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SceneError {
    /// Create a missing attribute error.
    #[must_use]
    pub fn missing_attribute(attribute: &'static str, element: &'static str) -> Self {
        Self::MissingAttribute { attribute, element }
    }

    /// Create an invalid attribute error.
    #[must_use]
    pub fn invalid_attribute(
        attribute: &'static str,
        element: &'static str,
        message: impl Into<String>,
    ) -> Self {
        Self::InvalidAttribute {
            attribute,
            element,
            message: message.into(),
        }
    }
}

/// Result type for scene operations.
pub type Result<T> = std::result::Result<T, SceneError>;
