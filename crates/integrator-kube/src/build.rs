//! Build pipeline driven through `Build` custom resources.
//!
//! One `Build` object exists per kit digest. The image builder that watches
//! those objects lives outside the operator; this module only creates them
//! and reads back their status.

use crate::error::map_kube_error;
use async_trait::async_trait;
use integrator_core::build::{BuildOutcome, BuildOutput, BuildPipeline, build_name};
use integrator_core::kit::{Artifact, IntegrationKit};
use integrator_core::{Error, ObjectKey, Result};
use kube::api::{Api, ApiResource, DynamicObject, GroupVersionKind, PostParams};
use kube::{Client, Resource, ResourceExt};
use serde::Deserialize;
use std::collections::BTreeMap;
use tracing::{debug, info};

const KIT_LABEL: &str = "camel.apache.org/kit";
const DIGEST_ANNOTATION: &str = "camel.apache.org/kit-digest";

/// Status block written by the image builder.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BuildStatus {
    #[serde(default)]
    phase: String,
    #[serde(default)]
    image: String,
    #[serde(default)]
    public_image: String,
    #[serde(default)]
    base_image: String,
    #[serde(default)]
    artifacts: Vec<Artifact>,
    #[serde(default)]
    runtime_version: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

pub struct KubeBuildPipeline {
    client: Client,
    resource: ApiResource,
}

impl KubeBuildPipeline {
    pub fn new(client: Client) -> Self {
        let gvk = GroupVersionKind::gvk("camel.apache.org", "v1alpha1", "Build");
        Self {
            client,
            resource: ApiResource::from_gvk_with_plural(&gvk, "builds"),
        }
    }

    fn api(&self, namespace: &str) -> Api<DynamicObject> {
        Api::namespaced_with(self.client.clone(), namespace, &self.resource)
    }

    fn build_for(&self, kit: &IntegrationKit) -> Result<DynamicObject> {
        let key = ObjectKey::of(kit);
        let mut build = DynamicObject::new(&build_name(kit), &self.resource)
            .within(&key.namespace)
            .data(serde_json::json!({
                "spec": {
                    "kit": key.name,
                    "digest": kit.digest(),
                    "image": kit.spec.image,
                    "dependencies": kit.spec.dependencies,
                    "repositories": kit.spec.repositories,
                    "configuration": serde_json::to_value(&kit.spec.configuration)?,
                }
            }));

        build.metadata.labels = Some(BTreeMap::from([(KIT_LABEL.to_string(), key.name.clone())]));
        build.metadata.annotations = Some(BTreeMap::from([(
            DIGEST_ANNOTATION.to_string(),
            kit.digest().to_string(),
        )]));
        if let Some(owner) = kit.controller_owner_ref(&()) {
            build.metadata.owner_references = Some(vec![owner]);
        }
        Ok(build)
    }
}

#[async_trait]
impl BuildPipeline for KubeBuildPipeline {
    fn name(&self) -> &'static str {
        "kubernetes"
    }

    async fn submit(&self, kit: &IntegrationKit) -> Result<()> {
        let key = ObjectKey::of(kit);
        let name = build_name(kit);
        let api = self.api(&key.namespace);

        if api.get_opt(&name).await.map_err(map_kube_error)?.is_some() {
            debug!(kit = %key, build = %name, "Build already submitted");
            return Ok(());
        }

        match api.create(&PostParams::default(), &self.build_for(kit)?).await {
            Ok(_) => {
                info!(kit = %key, build = %name, "Build created");
                Ok(())
            }
            // Lost a race with a replayed submission of the same digest.
            Err(e) => match map_kube_error(e) {
                Error::Conflict(_) => Ok(()),
                other => Err(other),
            },
        }
    }

    async fn observe(&self, kit: &IntegrationKit) -> Result<BuildOutcome> {
        let key = ObjectKey::of(kit);
        let name = build_name(kit);
        let Some(build) = self
            .api(&key.namespace)
            .get_opt(&name)
            .await
            .map_err(map_kube_error)?
        else {
            debug!(kit = %key, build = %name, "Build not found yet");
            return Ok(BuildOutcome::Pending);
        };

        let status = match build.data.get("status") {
            Some(value) => serde_json::from_value(value.clone())?,
            None => BuildStatus::default(),
        };
        debug!(kit = %key, build = %build.name_any(), phase = %status.phase, "Observed build");
        Ok(outcome_from_status(status))
    }
}

fn outcome_from_status(status: BuildStatus) -> BuildOutcome {
    match status.phase.as_str() {
        "Running" => BuildOutcome::Running,
        "Succeeded" => BuildOutcome::Succeeded(BuildOutput {
            image: status.image,
            public_image: status.public_image,
            base_image: status.base_image,
            artifacts: status.artifacts,
            runtime_version: status.runtime_version,
        }),
        "Failed" | "Error" | "Interrupted" => BuildOutcome::Failed {
            reason: status
                .error
                .unwrap_or_else(|| format!("build ended in phase {}", status.phase)),
        },
        _ => BuildOutcome::Pending,
    }
}
