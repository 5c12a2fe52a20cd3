//! Built-in traits.

mod deployer;
mod deployment;
mod environment;
mod knative_service;

pub use deployer::DeployerTrait;
pub use deployment::DeploymentTrait;
pub use environment::EnvironmentTrait;
pub use knative_service::KnativeServiceTrait;

use crate::environment::Environment;
use async_trait::async_trait;
use integrator_core::Result;

/// A configurable policy unit contributing to the resources of a pass.
#[async_trait]
pub trait Trait: Send + Sync {
    fn id(&self) -> &'static str;

    /// Decide whether the trait applies to this pass. May read external
    /// state but must leave `env.resources` untouched.
    async fn configure(&mut self, env: &Environment) -> Result<bool>;

    /// Contribute resources and variables. Called at most once per pass,
    /// only after `configure` returned `true`.
    fn apply(&mut self, env: &mut Environment) -> Result<()>;
}
