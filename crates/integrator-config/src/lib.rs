//! KDL configuration parsing for the integration operator.
//!
//! This crate handles parsing of:
//! - Operator settings (watched namespace, resync interval, runtime constraint)
//! - The runtime catalogs offered to kits and integrations

pub mod error;
pub mod operator;

pub use error::{ConfigError, ConfigResult};
pub use operator::{OperatorConfig, load_operator_config, parse_operator_config};
