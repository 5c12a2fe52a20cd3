use super::Trait;
use crate::environment::{ControllerStrategy, Environment};
use crate::properties::TraitProperties;
use async_trait::async_trait;
use integrator_core::Result;
use integrator_core::integration::IntegrationPhase;
use integrator_core::kit::KitPhase;
use tracing::debug;

/// Resolves the controller strategy once for the rest of the pass.
#[derive(Debug, Default)]
pub struct DeployerTrait {
    enabled: Option<bool>,
    strategy: Option<ControllerStrategy>,
}

impl DeployerTrait {
    pub const ID: &'static str = "deployer";

    pub fn from_properties(props: &TraitProperties<'_>) -> Result<Self> {
        Ok(Self {
            enabled: props.enabled()?,
            strategy: None,
        })
    }
}

#[async_trait]
impl Trait for DeployerTrait {
    fn id(&self) -> &'static str {
        Self::ID
    }

    async fn configure(&mut self, env: &Environment) -> Result<bool> {
        if self.enabled == Some(false) {
            return Ok(false);
        }
        if !env.in_phase(KitPhase::Ready, IntegrationPhase::Deploying) {
            return Ok(false);
        }
        self.strategy = Some(env.determine_controller_strategy().await?);
        Ok(true)
    }

    fn apply(&mut self, env: &mut Environment) -> Result<()> {
        if let Some(strategy) = self.strategy {
            debug!(integration = %env.name(), %strategy, "Controller strategy resolved");
            env.strategy = Some(strategy);
        }
        Ok(())
    }
}
