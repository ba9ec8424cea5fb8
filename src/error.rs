//! Error module for the Rusty Synapse library.
use std::error::Error;
use std::fmt;

/// Error types for the library.
///
/// Configuration errors (malformed rise curves, duplicate names, ...) are fatal: drivers are expected to
/// report them and terminate. The remaining variants flag caller bugs detected at runtime.
#[derive(Debug, PartialEq, Clone)]
pub enum SimError {
    /// Error for a malformed NMDA rise-curve file.
    RiseCurve(String),
    /// Error for a name registered twice in a catalog.
    DuplicateName { kind: &'static str, name: String },
    /// Error for a registration attempted after the setup phase is over.
    CatalogSealed(String),
    /// Error for a name or id that is not registered in a catalog.
    UnknownName { kind: &'static str, name: String },
    /// Error for invalid parameters, e.g., a rise duration longer than the kinetics table.
    InvalidParameter(String),
    /// Error for an inconsistent simulation configuration.
    Config(String),
    /// Error for a buffer that would hold no element.
    ZeroLengthBuffer(String),
    /// Error for a filter without coefficients.
    EmptyFilter,
    /// Error for out of bounds access, e.g., neuron not found.
    OutOfBounds(String),
    /// Error for I/O operations.
    IOError(String),
}

impl fmt::Display for SimError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SimError::RiseCurve(e) => write!(f, "Invalid rise curve: {}", e),
            SimError::DuplicateName { kind, name } => {
                write!(f, "{} {} already exists", kind, name)
            }
            SimError::CatalogSealed(e) => write!(f, "Catalog is sealed: {}", e),
            SimError::UnknownName { kind, name } => write!(f, "Unknown {}: {}", kind, name),
            SimError::InvalidParameter(e) => write!(f, "Invalid parameters: {}", e),
            SimError::Config(e) => write!(f, "Invalid configuration: {}", e),
            SimError::ZeroLengthBuffer(e) => write!(f, "{}", e),
            SimError::EmptyFilter => write!(f, "Attempted to create empty filter"),
            SimError::OutOfBounds(e) => write!(f, "Index out of bounds: {}", e),
            SimError::IOError(e) => write!(f, "I/O error: {}", e),
        }
    }
}

impl Error for SimError {}

impl From<std::io::Error> for SimError {
    fn from(e: std::io::Error) -> Self {
        SimError::IOError(e.to_string())
    }
}

impl From<serde_json::Error> for SimError {
    fn from(e: serde_json::Error) -> Self {
        SimError::IOError(e.to_string())
    }
}
