//! The `IntegrationKit` resource: a runtime image build derived from an
//! integration.
//!
//! The kit spec carries everything that affects the produced image; its
//! digest (see [`crate::digest`]) decides when the image must be rebuilt.

use chrono::{DateTime, Utc};
use kube::CustomResource;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Desired state of an integration kit.
#[derive(CustomResource, Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[kube(
    group = "camel.apache.org",
    version = "v1alpha1",
    kind = "IntegrationKit",
    namespaced,
    status = "IntegrationKitStatus",
    shortname = "ik",
    schema = "disabled",
    derive = "PartialEq",
    derive = "Default"
)]
#[serde(rename_all = "camelCase")]
pub struct IntegrationKitSpec {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub image: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<TraitProfile>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub traits: BTreeMap<String, TraitSpec>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub configuration: Vec<ConfigurationSpec>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub repositories: Vec<String>,
}

/// Observed state of an integration kit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntegrationKitStatus {
    #[serde(default)]
    pub phase: KitPhase,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub base_image: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub image: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub public_image: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub digest: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub artifacts: Vec<Artifact>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<Failure>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub runtime_version: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub platform_version: String,
}

impl IntegrationKitStatus {
    /// `Error` and a recorded failure always go together.
    pub fn is_consistent(&self) -> bool {
        (self.phase == KitPhase::Error) == self.failure.is_some()
    }
}

/// Phase of the kit build state machine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KitPhase {
    /// Freshly created, never reconciled.
    #[default]
    #[serde(rename = "")]
    None,
    #[serde(rename = "Build Submitted")]
    BuildSubmitted,
    #[serde(rename = "Build Running")]
    BuildRunning,
    Ready,
    Error,
}

impl KitPhase {
    /// Ready and Error only leave through a digest change.
    pub fn is_terminal(&self) -> bool {
        matches!(self, KitPhase::Ready | KitPhase::Error)
    }
}

impl std::fmt::Display for KitPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KitPhase::None => write!(f, ""),
            KitPhase::BuildSubmitted => write!(f, "Build Submitted"),
            KitPhase::BuildRunning => write!(f, "Build Running"),
            KitPhase::Ready => write!(f, "Ready"),
            KitPhase::Error => write!(f, "Error"),
        }
    }
}

/// Trait profile the workload targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TraitProfile {
    Kubernetes,
    Knative,
    OpenShift,
}

impl std::fmt::Display for TraitProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TraitProfile::Kubernetes => write!(f, "Kubernetes"),
            TraitProfile::Knative => write!(f, "Knative"),
            TraitProfile::OpenShift => write!(f, "OpenShift"),
        }
    }
}

impl std::str::FromStr for TraitProfile {
    type Err = crate::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "kubernetes" => Ok(TraitProfile::Kubernetes),
            "knative" => Ok(TraitProfile::Knative),
            "openshift" => Ok(TraitProfile::OpenShift),
            _ => Err(crate::Error::InvalidInput(format!("unknown profile: {s}"))),
        }
    }
}

/// Property bag configuring one trait.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TraitSpec {
    #[serde(default)]
    pub configuration: BTreeMap<String, String>,
}

impl TraitSpec {
    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        Self {
            configuration: pairs
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }
}

/// A typed configuration entry, e.g. `env` / `FOO=bar` or `property` / `a=b`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigurationSpec {
    #[serde(rename = "type")]
    pub type_: String,
    pub value: String,
}

impl ConfigurationSpec {
    pub fn new(type_: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            type_: type_.into(),
            value: value.into(),
        }
    }
}

/// A library produced or used by the build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    pub id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub location: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub target: String,
}

/// Why the last build failed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Failure {
    pub reason: String,
    pub time: DateTime<Utc>,
    #[serde(default)]
    pub recovery: FailureRecovery,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailureRecovery {
    pub attempt: u32,
    pub attempt_max: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attempt_time: Option<DateTime<Utc>>,
}

impl IntegrationKit {
    pub fn phase(&self) -> KitPhase {
        self.status.as_ref().map(|s| s.phase).unwrap_or_default()
    }

    pub fn digest(&self) -> &str {
        self.status.as_ref().map(|s| s.digest.as_str()).unwrap_or("")
    }

    /// Mutable status, created on first access.
    pub fn status_mut(&mut self) -> &mut IntegrationKitStatus {
        self.status.get_or_insert_with(Default::default)
    }
}
