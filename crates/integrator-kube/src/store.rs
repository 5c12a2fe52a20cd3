//! Kit persistence on the cluster.

use crate::error::map_kube_error;
use async_trait::async_trait;
use integrator_core::kit::IntegrationKit;
use integrator_core::store::KitStore;
use integrator_core::{ObjectKey, Result};
use kube::api::{Api, Patch, PatchParams};
use kube::{Client, ResourceExt};
use tracing::debug;

/// [`KitStore`] backed by the `IntegrationKit` custom resource.
#[derive(Clone)]
pub struct KubeKitStore {
    client: Client,
}

impl KubeKitStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn api(&self, namespace: &str) -> Api<IntegrationKit> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

#[async_trait]
impl KitStore for KubeKitStore {
    async fn get(&self, key: &ObjectKey) -> Result<Option<IntegrationKit>> {
        self.api(&key.namespace)
            .get_opt(&key.name)
            .await
            .map_err(map_kube_error)
    }

    async fn update_status(&self, kit: &IntegrationKit) -> Result<IntegrationKit> {
        let key = ObjectKey::of(kit);
        debug!(kit = %key, phase = %kit.phase(), "Updating IntegrationKit status");

        // The resourceVersion turns the merge patch into a conditional write.
        let patch = serde_json::json!({
            "metadata": { "resourceVersion": kit.resource_version() },
            "status": kit.status,
        });

        self.api(&key.namespace)
            .patch_status(&key.name, &PatchParams::default(), &Patch::Merge(&patch))
            .await
            .map_err(map_kube_error)
    }
}
