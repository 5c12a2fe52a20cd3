//! Kubernetes backends for the integration operator.
//!
//! Provides:
//! - `KubeKitStore`: kit persistence on the status subresource
//! - `KubeBuildPipeline`: builds tracked as `Build` custom resources
//! - `KubeSourceResolver`: sources stored in cluster ConfigMaps
//! - Server-side apply of generated resources
//! - `kube::runtime` controllers for kits and integrations

pub mod apply;
pub mod build;
pub mod error;
pub mod integration_controller;
pub mod kit_controller;
pub mod sources;
pub mod store;

pub use apply::{FIELD_MANAGER, apply_resources};
pub use build::KubeBuildPipeline;
pub use error::map_kube_error;
pub use sources::KubeSourceResolver;
pub use store::KubeKitStore;
