//! Operator configuration errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("operator configuration is not valid KDL: {0}")]
    Parse(#[from] kdl::KdlError),

    #[error("operator configuration is missing {0}")]
    MissingField(String),

    #[error("invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },

    /// Two catalogs declare the same version.
    #[error("{0} declared more than once")]
    Duplicate(String),

    #[error("cannot read operator configuration: {0}")]
    Io(#[from] std::io::Error),
}

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;
