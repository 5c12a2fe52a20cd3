//! Core domain types and boundaries for the integration operator.
//!
//! This crate contains:
//! - The `IntegrationKit` and `Integration` custom resources
//! - Content digests used for change detection
//! - Runtime catalogs and version resolution
//! - Persistence and build pipeline boundaries
//! - Cancellation helpers shared by actions and traits

pub mod build;
pub mod cancel;
pub mod catalog;
pub mod digest;
pub mod error;
pub mod integration;
pub mod key;
pub mod kit;
pub mod store;

pub use error::{Error, Result};
pub use key::ObjectKey;
