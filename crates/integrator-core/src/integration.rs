//! The `Integration` resource: the workload deployed from a ready kit.

use crate::kit::{ConfigurationSpec, TraitProfile, TraitSpec};
use kube::CustomResource;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Desired state of an integration.
#[derive(CustomResource, Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[kube(
    group = "camel.apache.org",
    version = "v1alpha1",
    kind = "Integration",
    namespaced,
    status = "IntegrationStatus",
    shortname = "it",
    schema = "disabled",
    derive = "PartialEq",
    derive = "Default"
)]
#[serde(rename_all = "camelCase")]
pub struct IntegrationSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replicas: Option<i32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<SourceSpec>,
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
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_account_name: Option<String>,
}

/// A route source, either inline or stored in a ConfigMap.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceSpec {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Name of a ConfigMap holding the content.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_ref: Option<String>,
    /// Key inside `content_ref`; defaults to `content`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

impl SourceSpec {
    pub fn inline(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content: Some(content.into()),
            ..Default::default()
        }
    }

    pub fn content_key(&self) -> &str {
        self.content_key.as_deref().unwrap_or("content")
    }
}

/// Observed state of an integration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntegrationStatus {
    #[serde(default)]
    pub phase: IntegrationPhase,
    /// Integration digest of `spec` as last deployed.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub digest: String,
    /// Digest of the kit spec last applied for this integration.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub kit_digest: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub image: String,
    /// Name of the kit, in the same namespace, the integration runs on.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub kit: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub runtime_version: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IntegrationPhase {
    #[default]
    #[serde(rename = "")]
    None,
    Initialization,
    #[serde(rename = "Building Kit")]
    BuildingKit,
    Deploying,
    Running,
    Error,
}

impl std::fmt::Display for IntegrationPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IntegrationPhase::None => write!(f, ""),
            IntegrationPhase::Initialization => write!(f, "Initialization"),
            IntegrationPhase::BuildingKit => write!(f, "Building Kit"),
            IntegrationPhase::Deploying => write!(f, "Deploying"),
            IntegrationPhase::Running => write!(f, "Running"),
            IntegrationPhase::Error => write!(f, "Error"),
        }
    }
}

impl Integration {
    pub fn phase(&self) -> IntegrationPhase {
        self.status.as_ref().map(|s| s.phase).unwrap_or_default()
    }

    pub fn image(&self) -> &str {
        self.status.as_ref().map(|s| s.image.as_str()).unwrap_or("")
    }

    pub fn digest(&self) -> &str {
        self.status.as_ref().map(|s| s.digest.as_str()).unwrap_or("")
    }

    pub fn kit_digest(&self) -> &str {
        self.status.as_ref().map(|s| s.kit_digest.as_str()).unwrap_or("")
    }

    pub fn status_mut(&mut self) -> &mut IntegrationStatus {
        self.status.get_or_insert_with(Default::default)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integration_phase_wire_names() {
        let phase: IntegrationPhase = serde_json::from_str("\"Building Kit\"").unwrap();
        assert_eq!(phase, IntegrationPhase::BuildingKit);
        assert_eq!(phase.to_string(), "Building Kit");
    }

    #[test]
    fn test_status_digests_round_trip() {
        let json = r#"{"phase":"Running","digest":"v1","kitDigest":"v2"}"#;
        let status: IntegrationStatus = serde_json::from_str(json).unwrap();
        assert_eq!(status.digest, "v1");
        assert_eq!(status.kit_digest, "v2");

        let it = Integration::new("hello", IntegrationSpec::default());
        assert_eq!(it.digest(), "");
        assert_eq!(it.kit_digest(), "");
    }

    #[test]
    fn test_source_content_key_default() {
        let source = SourceSpec::inline("routes.groovy", "from('timer:tick')");
        assert_eq!(source.content_key(), "content");
    }
}
