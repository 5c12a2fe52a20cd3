use super::Trait;
use crate::environment::Environment;
use crate::envvar;
use crate::properties::TraitProperties;
use async_trait::async_trait;
use integrator_core::Result;
use integrator_core::integration::IntegrationPhase;
use integrator_core::kit::KitPhase;

/// Exposes pod metadata and runtime identity to the container.
#[derive(Debug, Default)]
pub struct EnvironmentTrait {
    enabled: Option<bool>,
    container_meta: Option<bool>,
}

impl EnvironmentTrait {
    pub const ID: &'static str = "environment";

    pub fn from_properties(props: &TraitProperties<'_>) -> Result<Self> {
        Ok(Self {
            enabled: props.enabled()?,
            container_meta: props.bool("container-meta")?,
        })
    }
}

#[async_trait]
impl Trait for EnvironmentTrait {
    fn id(&self) -> &'static str {
        Self::ID
    }

    async fn configure(&mut self, env: &Environment) -> Result<bool> {
        if self.enabled == Some(false) {
            return Ok(false);
        }
        Ok(env.in_phase(KitPhase::Ready, IntegrationPhase::Deploying))
    }

    fn apply(&mut self, env: &mut Environment) -> Result<()> {
        let name = env.name();
        envvar::set_val(&mut env.env_vars, "INTEGRATOR_VERSION", env!("CARGO_PKG_VERSION"));
        envvar::set_val(&mut env.env_vars, "CAMEL_K_INTEGRATION", name);
        if let Some(catalog) = &env.catalog {
            envvar::set_val(
                &mut env.env_vars,
                "CAMEL_K_RUNTIME_VERSION",
                catalog.version.clone(),
            );
        }

        if self.container_meta.unwrap_or(true) {
            envvar::set_var(
                &mut env.env_vars,
                envvar::field_ref("NAMESPACE", "metadata.namespace"),
            );
            envvar::set_var(
                &mut env.env_vars,
                envvar::field_ref("POD_NAME", "metadata.name"),
            );
        }
        Ok(())
    }
}
