//! Server-side apply of generated resources.

use crate::error::map_kube_error;
use integrator_core::Result;
use integrator_traits::{KnativeService, Resource, ResourceSet};
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::ConfigMap;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use kube::api::{Api, Patch, PatchParams};
use kube::{Client, ResourceExt};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fmt::Debug;
use tracing::debug;

pub const FIELD_MANAGER: &str = "integrator-operator";

/// Apply every resource of a finished trait pass, owned by `owner`.
pub async fn apply_resources(
    client: &Client,
    namespace: &str,
    owner: Option<&OwnerReference>,
    resources: ResourceSet,
) -> Result<usize> {
    let mut applied = 0;
    for resource in resources.into_vec() {
        match resource {
            Resource::ConfigMap(r) => apply_one::<ConfigMap>(client, namespace, owner, r).await?,
            Resource::Deployment(r) => apply_one::<Deployment>(client, namespace, owner, r).await?,
            Resource::KnativeService(r) => {
                apply_one::<KnativeService>(client, namespace, owner, r).await?
            }
        }
        applied += 1;
    }
    Ok(applied)
}

async fn apply_one<K>(
    client: &Client,
    namespace: &str,
    owner: Option<&OwnerReference>,
    mut resource: K,
) -> Result<()>
where
    K: kube::Resource<Scope = k8s_openapi::NamespaceResourceScope>
        + Clone
        + Debug
        + Serialize
        + DeserializeOwned,
    K::DynamicType: Default,
{
    if let Some(owner) = owner {
        resource.owner_references_mut().push(owner.clone());
    }
    // Server-side apply rejects managedFields and a stale resourceVersion.
    resource.meta_mut().managed_fields = None;
    resource.meta_mut().resource_version = None;

    let name = resource.name_any();
    let api: Api<K> = Api::namespaced(client.clone(), namespace);
    let kind = K::kind(&K::DynamicType::default()).to_string();
    debug!(%kind, %name, %namespace, "Applying resource");

    api.patch(&name, &PatchParams::apply(FIELD_MANAGER).force(), &Patch::Apply(&resource))
        .await
        .map_err(map_kube_error)?;
    Ok(())
}
