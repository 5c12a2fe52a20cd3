//! Trait composition engine for the integration operator.
//!
//! Traits are small, independently configurable policy units. For each
//! reconciliation pass the [`TraitCatalog`] instantiates the active traits
//! from the merged kit/integration configuration, orders them by their
//! declared dependencies and lets each one contribute resources and
//! environment variables to a shared [`Environment`].

pub mod annotations;
pub mod catalog;
pub mod environment;
pub mod envvar;
pub mod metadata;
pub mod properties;
pub mod resources;
pub mod traits;

pub use catalog::{TraitCatalog, TraitDescriptor};
pub use environment::{ControllerStrategy, Environment};
pub use metadata::{InlineSourceResolver, ResolvedSource, SourceMetadata, SourceResolver};
pub use resources::{KnativeService, Resource, ResourceSet};
pub use traits::Trait;

/// Label linking generated resources to their integration.
pub const INTEGRATION_LABEL: &str = "camel.apache.org/integration";
