//! Resources produced by a trait pass.

use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{ConfigMap, PodTemplateSpec};
use kube::CustomResource;
use kube::ResourceExt;
use serde::{Deserialize, Serialize};

/// Knative serving `Service`, reduced to the revision template.
#[derive(CustomResource, Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[kube(
    group = "serving.knative.dev",
    version = "v1",
    kind = "Service",
    root = "KnativeService",
    namespaced,
    schema = "disabled",
    derive = "PartialEq"
)]
pub struct KnativeServiceSpec {
    pub template: PodTemplateSpec,
}

/// One generated resource.
#[derive(Debug, Clone, PartialEq)]
pub enum Resource {
    ConfigMap(ConfigMap),
    Deployment(Deployment),
    KnativeService(KnativeService),
}

impl Resource {
    pub fn kind(&self) -> &'static str {
        match self {
            Resource::ConfigMap(_) => "ConfigMap",
            Resource::Deployment(_) => "Deployment",
            Resource::KnativeService(_) => "Service",
        }
    }

    pub fn name(&self) -> String {
        match self {
            Resource::ConfigMap(r) => r.name_any(),
            Resource::Deployment(r) => r.name_any(),
            Resource::KnativeService(r) => r.name_any(),
        }
    }
}

impl From<ConfigMap> for Resource {
    fn from(r: ConfigMap) -> Self {
        Resource::ConfigMap(r)
    }
}

impl From<Deployment> for Resource {
    fn from(r: Deployment) -> Self {
        Resource::Deployment(r)
    }
}

impl From<KnativeService> for Resource {
    fn from(r: KnativeService) -> Self {
        Resource::KnativeService(r)
    }
}

/// Append-only resource list for one pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResourceSet {
    items: Vec<Resource>,
}

impl ResourceSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, resource: impl Into<Resource>) {
        self.items.push(resource.into());
    }

    pub fn add_all<R: Into<Resource>>(&mut self, resources: impl IntoIterator<Item = R>) {
        self.items.extend(resources.into_iter().map(Into::into));
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Resource> {
        self.items.iter()
    }

    /// First deployment matching `predicate`.
    pub fn get_deployment(&self, predicate: impl Fn(&Deployment) -> bool) -> Option<&Deployment> {
        self.items.iter().find_map(|r| match r {
            Resource::Deployment(d) if predicate(d) => Some(d),
            _ => None,
        })
    }

    pub fn get_config_map(&self, name: &str) -> Option<&ConfigMap> {
        self.items.iter().find_map(|r| match r {
            Resource::ConfigMap(c) if c.metadata.name.as_deref() == Some(name) => Some(c),
            _ => None,
        })
    }

    pub fn knative_services(&self) -> impl Iterator<Item = &KnativeService> {
        self.items.iter().filter_map(|r| match r {
            Resource::KnativeService(s) => Some(s),
            _ => None,
        })
    }

    pub fn deployments(&self) -> impl Iterator<Item = &Deployment> {
        self.items.iter().filter_map(|r| match r {
            Resource::Deployment(d) => Some(d),
            _ => None,
        })
    }

    pub fn into_vec(self) -> Vec<Resource> {
        self.items
    }
}
