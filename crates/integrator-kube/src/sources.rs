//! Source resolution against cluster ConfigMaps.

use crate::error::map_kube_error;
use async_trait::async_trait;
use integrator_core::integration::Integration;
use integrator_core::{Error, Result};
use integrator_traits::metadata::{resolve_local, source_language};
use integrator_traits::{ResolvedSource, ResourceSet, SourceResolver};
use k8s_openapi::api::core::v1::ConfigMap;
use kube::api::Api;
use kube::{Client, ResourceExt};

/// Resolves inline sources and ConfigMaps of the current pass first, then
/// falls back to ConfigMaps in the integration's namespace.
#[derive(Clone)]
pub struct KubeSourceResolver {
    client: Client,
}

impl KubeSourceResolver {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl SourceResolver for KubeSourceResolver {
    async fn resolve(
        &self,
        integration: &Integration,
        resources: &ResourceSet,
    ) -> Result<Vec<ResolvedSource>> {
        let namespace = integration
            .namespace()
            .unwrap_or_else(|| "default".to_string());
        let config_maps: Api<ConfigMap> = Api::namespaced(self.client.clone(), &namespace);

        let mut resolved = Vec::with_capacity(integration.spec.sources.len());
        for source in &integration.spec.sources {
            if let Some(local) = resolve_local(source, resources) {
                resolved.push(local);
                continue;
            }

            let missing = || {
                Error::NotFound(format!(
                    "content of source {} of integration {namespace}/{}",
                    source.name,
                    integration.name_any()
                ))
            };
            let cm_name = source.content_ref.as_deref().ok_or_else(missing)?;
            let cm = config_maps
                .get_opt(cm_name)
                .await
                .map_err(map_kube_error)?
                .ok_or_else(missing)?;
            let content = cm
                .data
                .and_then(|mut data| data.remove(source.content_key()))
                .ok_or_else(missing)?;

            resolved.push(ResolvedSource {
                name: source.name.clone(),
                language: source_language(source).map(str::to_string),
                content,
            });
        }
        Ok(resolved)
    }
}
