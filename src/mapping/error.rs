//! Error definitions for the mapping module

use thiserror::Error;

/// Errors raised while building a binding table from settings
///
/// Never escapes the settings loader: every variant is logged and the
/// affected entry falls back to its default.
#[derive(Debug, Error, PartialEq)]
pub enum MappingError {
    /// Key in the mapping sections does not name a logical control
    #[error("Unknown control: {0}")]
    UnknownControl(String),

    /// Binding value could not be interpreted
    #[error("Invalid binding for {control}: {value}")]
    InvalidBinding { control: String, value: String },

    /// Damping coefficient outside (0, 2]
    #[error("Damping for {control} out of range: {value}")]
    DampingOutOfRange { control: String, value: f64 },
}
