//! Operator configuration parsing.

use crate::{ConfigError, ConfigResult};
use integrator_core::catalog::{CatalogEntry, SchemeCapability};
use integrator_core::kit::TraitProfile;
use kdl::{KdlDocument, KdlNode};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

const DEFAULT_RESYNC_SECONDS: u64 = 300;
const DEFAULT_BASE_IMAGE: &str = "adoptopenjdk/openjdk8:slim";

/// Operator-wide settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperatorConfig {
    /// Namespace to watch; all namespaces when unset.
    pub namespace: Option<String>,
    /// Period after which every resource is reconciled again.
    pub resync_interval: Duration,
    /// Runtime version or range new kits are resolved against.
    pub runtime_version: Option<String>,
    /// Profile used when neither the kit nor the integration declares one.
    pub profile: Option<TraitProfile>,
    /// Image kits derived from integrations are built on.
    pub base_image: String,
    /// Runtime catalogs available to the operator.
    pub catalogs: Vec<CatalogEntry>,
}

impl Default for OperatorConfig {
    fn default() -> Self {
        Self {
            namespace: None,
            resync_interval: Duration::from_secs(DEFAULT_RESYNC_SECONDS),
            runtime_version: None,
            profile: None,
            base_image: DEFAULT_BASE_IMAGE.to_string(),
            catalogs: Vec::new(),
        }
    }
}

/// Read and parse an operator configuration file.
pub fn load_operator_config(path: impl AsRef<Path>) -> ConfigResult<OperatorConfig> {
    let content = std::fs::read_to_string(path)?;
    parse_operator_config(&content)
}

/// Parse operator configuration from KDL text.
pub fn parse_operator_config(kdl: &str) -> ConfigResult<OperatorConfig> {
    let doc: KdlDocument = kdl.parse()?;
    let mut config = OperatorConfig::default();

    for node in doc.nodes() {
        match node.name().value() {
            "operator" => parse_operator_settings(node, &mut config)?,
            "catalog" => {
                let catalog = parse_catalog(node)?;
                if config.catalogs.iter().any(|c| c.version == catalog.version) {
                    return Err(ConfigError::Duplicate(format!(
                        "catalog '{}'",
                        catalog.version
                    )));
                }
                config.catalogs.push(catalog);
            }
            _ => {} // Ignore unknown nodes
        }
    }

    Ok(config)
}

fn parse_operator_settings(node: &KdlNode, config: &mut OperatorConfig) -> ConfigResult<()> {
    let Some(children) = node.children() else {
        return Ok(());
    };

    for child in children.nodes() {
        match child.name().value() {
            "namespace" => {
                config.namespace = Some(
                    get_first_string_arg(child)
                        .ok_or_else(|| ConfigError::MissingField("operator namespace".to_string()))?,
                );
            }
            "resync-seconds" => {
                let seconds = get_first_integer_arg(child).ok_or_else(|| {
                    ConfigError::MissingField("operator resync-seconds".to_string())
                })?;
                if seconds <= 0 || seconds > u32::MAX as i128 {
                    return Err(ConfigError::InvalidValue {
                        field: "resync-seconds".to_string(),
                        message: format!("must be a positive number of seconds, got {seconds}"),
                    });
                }
                config.resync_interval = Duration::from_secs(seconds as u64);
            }
            "base-image" => {
                config.base_image = get_first_string_arg(child)
                    .ok_or_else(|| ConfigError::MissingField("operator base-image".to_string()))?;
            }
            "runtime-version" => {
                config.runtime_version = get_first_string_arg(child);
            }
            "profile" => {
                let value = get_first_string_arg(child)
                    .ok_or_else(|| ConfigError::MissingField("operator profile".to_string()))?;
                let profile = value
                    .parse::<TraitProfile>()
                    .map_err(|e| ConfigError::InvalidValue {
                        field: "profile".to_string(),
                        message: e.to_string(),
                    })?;
                config.profile = Some(profile);
            }
            _ => {}
        }
    }

    Ok(())
}

fn parse_catalog(node: &KdlNode) -> ConfigResult<CatalogEntry> {
    let version = get_first_string_arg(node)
        .ok_or_else(|| ConfigError::MissingField("catalog version".to_string()))?;

    let mut catalog = CatalogEntry::new(version);

    if let Some(children) = node.children() {
        for child in children.nodes() {
            if child.name().value() != "scheme" {
                continue;
            }
            let scheme = get_first_string_arg(child).ok_or_else(|| {
                ConfigError::MissingField(format!("scheme name in catalog '{}'", catalog.version))
            })?;
            let capability = SchemeCapability {
                http: get_bool_prop(child, "http").unwrap_or(false),
                passive: get_bool_prop(child, "passive").unwrap_or(false),
            };
            catalog.schemes.insert(scheme, capability);
        }
    }

    Ok(catalog)
}

// Helper functions for extracting values from KDL nodes

fn get_first_string_arg(node: &KdlNode) -> Option<String> {
    node.entries()
        .iter()
        .find(|e| e.name().is_none())
        .and_then(|e| e.value().as_string())
        .map(|s| s.to_string())
}

fn get_first_integer_arg(node: &KdlNode) -> Option<i128> {
    node.entries()
        .iter()
        .find(|e| e.name().is_none())
        .and_then(|e| e.value().as_integer())
}

fn get_bool_prop(node: &KdlNode, name: &str) -> Option<bool> {
    node.get(name).and_then(|v| v.as_bool())
}
