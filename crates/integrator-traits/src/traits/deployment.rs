use super::Trait;
use crate::annotations::filter_transferable;
use crate::environment::{ControllerStrategy, Environment};
use crate::envvar;
use crate::properties::TraitProperties;
use async_trait::async_trait;
use integrator_core::Result;
use integrator_core::integration::IntegrationPhase;
use integrator_core::kit::KitPhase;
use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use k8s_openapi::api::core::v1::{Container, PodSpec, PodTemplateSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;
use kube::ResourceExt;
use kube::api::ObjectMeta;

/// Runs the integration as a plain `apps/v1` Deployment.
#[derive(Debug, Default)]
pub struct DeploymentTrait {
    enabled: Option<bool>,
}

impl DeploymentTrait {
    pub const ID: &'static str = "deployment";

    pub fn from_properties(props: &TraitProperties<'_>) -> Result<Self> {
        Ok(Self {
            enabled: props.enabled()?,
        })
    }

    fn deployment_for(&self, env: &Environment) -> Deployment {
        let labels = env.labels();
        let annotations = filter_transferable(env.integration.annotations());

        let mut vars = env.runtime_env();
        for var in &env.env_vars {
            envvar::set_var(&mut vars, var.clone());
        }

        let mut volumes = Vec::new();
        let mut mounts = Vec::new();
        env.configure_volumes_and_mounts(&mut volumes, &mut mounts);

        let container = Container {
            name: "integration".to_string(),
            image: Some(env.integration.image().to_string()),
            env: Some(vars),
            volume_mounts: Some(mounts),
            ..Default::default()
        };

        Deployment {
            metadata: ObjectMeta {
                name: Some(env.name()),
                namespace: Some(env.namespace()),
                labels: Some(labels.clone()),
                annotations: Some(annotations.clone()),
                ..Default::default()
            },
            spec: Some(DeploymentSpec {
                replicas: env.integration.spec.replicas,
                selector: LabelSelector {
                    match_labels: Some(labels.clone()),
                    ..Default::default()
                },
                template: PodTemplateSpec {
                    metadata: Some(ObjectMeta {
                        labels: Some(labels),
                        annotations: Some(annotations),
                        ..Default::default()
                    }),
                    spec: Some(PodSpec {
                        containers: vec![container],
                        service_account_name: env.integration.spec.service_account_name.clone(),
                        volumes: Some(volumes),
                        ..Default::default()
                    }),
                },
                ..Default::default()
            }),
            ..Default::default()
        }
    }
}

#[async_trait]
impl Trait for DeploymentTrait {
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
        Ok(env.determine_controller_strategy().await? == ControllerStrategy::Deployment)
    }

    fn apply(&mut self, env: &mut Environment) -> Result<()> {
        let deployment = self.deployment_for(env);
        let maps = env.compute_config_maps();
        env.resources.add(deployment);
        env.resources.add_all(maps);
        Ok(())
    }
}
