//! Describe commands.

use anyhow::{Context, Result};
use integrator_core::kit::{IntegrationKit, TraitSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::Client;
use kube::api::Api;
use std::collections::BTreeMap;

const LABEL_WIDTH: usize = 20;
const INDENT: &str = "  ";

pub async fn kit(name: &str, namespace: Option<String>) -> Result<()> {
    let client = Client::try_default()
        .await
        .context("Failed to create Kubernetes client")?;
    let namespace = namespace.unwrap_or_else(|| client.default_namespace().to_string());
    let kits: Api<IntegrationKit> = Api::namespaced(client, &namespace);

    match kits
        .get_opt(name)
        .await
        .with_context(|| format!("Failed to fetch IntegrationKit {namespace}/{name}"))?
    {
        Some(kit) => print!("{}", describe_kit(&kit)),
        None => println!("IntegrationKit '{name}' does not exist."),
    }
    Ok(())
}

/// Indented `Label: value` lines with values aligned per level.
#[derive(Default)]
struct Describer {
    out: String,
}

impl Describer {
    fn field(&mut self, level: usize, label: &str, value: impl std::fmt::Display) {
        let label = format!("{label}:");
        let width = LABEL_WIDTH.saturating_sub(level * INDENT.len());
        self.out.push_str(&format!(
            "{}{label:<width$}{value}\n",
            INDENT.repeat(level)
        ));
    }

    fn heading(&mut self, level: usize, label: &str) {
        self.out.push_str(&format!("{}{label}:\n", INDENT.repeat(level)));
    }

    fn item(&mut self, level: usize, value: impl std::fmt::Display) {
        self.out.push_str(&format!("{}{value}\n", INDENT.repeat(level)));
    }

    fn map(&mut self, label: &str, entries: Option<&BTreeMap<String, String>>) {
        let Some(entries) = entries.filter(|e| !e.is_empty()) else {
            return;
        };
        self.heading(0, label);
        for (key, value) in entries {
            self.item(1, format!("{key}={value}"));
        }
    }

    fn object_meta(&mut self, meta: &ObjectMeta) {
        self.field(0, "Name", meta.name.as_deref().unwrap_or(""));
        self.field(0, "Namespace", meta.namespace.as_deref().unwrap_or(""));
        self.map("Labels", meta.labels.as_ref());
        self.map("Annotations", meta.annotations.as_ref());
        if let Some(created) = &meta.creation_timestamp {
            self.field(0, "Creation Timestamp", created.0.to_rfc2822());
        }
    }

    fn traits(&mut self, traits: &BTreeMap<String, TraitSpec>) {
        if traits.is_empty() {
            return;
        }
        self.heading(0, "Traits");
        for (id, spec) in traits {
            self.heading(1, id);
            if spec.configuration.is_empty() {
                continue;
            }
            self.heading(2, "Configuration");
            for (key, value) in &spec.configuration {
                self.field(3, key, value);
            }
        }
    }
}

/// Render a kit: identity, phase, runtime version, image, then the
/// non-empty spec lists and trait configuration.
pub fn describe_kit(kit: &IntegrationKit) -> String {
    let mut d = Describer::default();
    let status = kit.status.clone().unwrap_or_default();

    d.object_meta(&kit.metadata);
    d.field(0, "Phase", status.phase);
    d.field(0, "Runtime Version", &status.runtime_version);
    d.field(0, "Image", &status.image);

    if !status.artifacts.is_empty() {
        d.heading(0, "Artifacts");
        for artifact in &status.artifacts {
            d.item(1, &artifact.id);
        }
    }

    if !kit.spec.configuration.is_empty() {
        d.heading(0, "Configuration");
        for entry in &kit.spec.configuration {
            d.field(1, "Type", &entry.type_);
            d.field(1, "Value", &entry.value);
        }
    }

    if !kit.spec.dependencies.is_empty() {
        d.heading(0, "Dependencies");
        for dependency in &kit.spec.dependencies {
            d.item(1, dependency);
        }
    }

    if !kit.spec.repositories.is_empty() {
        d.heading(0, "Repositories");
        for repository in &kit.spec.repositories {
            d.item(1, repository);
        }
    }

    d.traits(&kit.spec.traits);
    d.out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use integrator_core::kit::{
        Artifact, ConfigurationSpec, IntegrationKitSpec, IntegrationKitStatus, KitPhase,
    };
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;

    fn position(out: &str, needle: &str) -> usize {
        out.find(needle)
            .unwrap_or_else(|| panic!("{needle:?} missing from:\n{out}"))
    }

    fn ready_kit() -> IntegrationKit {
        let mut kit = IntegrationKit::new(
            "kit-1",
            IntegrationKitSpec {
                image: "adoptopenjdk/openjdk8:slim".to_string(),
                dependencies: vec!["camel:http".to_string()],
                configuration: vec![ConfigurationSpec::new("env", "A=B")],
                repositories: vec!["https://repo.example.com/maven".to_string()],
                traits: BTreeMap::from([(
                    "knative-service".to_string(),
                    TraitSpec::from_pairs([("min-scale", "2")]),
                )]),
                ..Default::default()
            },
        );
        kit.metadata = ObjectMeta {
            name: Some("kit-1".to_string()),
            namespace: Some("camel".to_string()),
            labels: Some(BTreeMap::from([(
                "camel.apache.org/integration".to_string(),
                "hello".to_string(),
            )])),
            creation_timestamp: Some(Time(Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap())),
            ..Default::default()
        };
        kit.status = Some(IntegrationKitStatus {
            phase: KitPhase::Ready,
            image: "registry/kit-1:1".to_string(),
            runtime_version: "1.0.0".to_string(),
            artifacts: vec![Artifact {
                id: "org.apache.camel:camel-core".to_string(),
                location: String::new(),
                target: "dependencies/camel-core.jar".to_string(),
            }],
            ..Default::default()
        });
        kit
    }

    #[test]
    fn test_describe_kit_order() {
        let out = describe_kit(&ready_kit());

        let order = [
            "Name:",
            "Namespace:",
            "Labels:",
            "Creation Timestamp:",
            "Phase:",
            "Runtime Version:",
            "Image:",
            "Artifacts:",
            "Configuration:\n",
            "Dependencies:",
            "Repositories:",
            "Traits:",
        ];
        let positions: Vec<usize> = order.iter().map(|n| position(&out, n)).collect();
        assert!(
            positions.windows(2).all(|w| w[0] < w[1]),
            "unexpected order:\n{out}"
        );

        assert!(out.contains("  camel.apache.org/integration=hello\n"));
        assert!(out.contains("  org.apache.camel:camel-core\n"));
        assert!(out.contains("  knative-service:\n"));
        assert!(out.contains("min-scale:"));
        assert!(out.contains("May 2024 12:00:00 +0000"));
    }

    #[test]
    fn test_describe_kit_skips_empty_sections() {
        let mut kit = IntegrationKit::new("kit-2", IntegrationKitSpec::default());
        kit.metadata.namespace = Some("camel".to_string());
        let out = describe_kit(&kit);

        assert!(out.starts_with("Name:"));
        for absent in [
            "Labels:",
            "Annotations:",
            "Artifacts:",
            "Configuration:",
            "Dependencies:",
            "Repositories:",
            "Traits:",
        ] {
            assert!(!out.contains(absent), "{absent} rendered for empty kit:\n{out}");
        }
        assert!(out.contains("Phase:"));
        assert!(out.contains("Image:"));
    }

    #[test]
    fn test_values_align_per_level() {
        let out = describe_kit(&ready_kit());
        let phase = out.lines().find(|l| l.starts_with("Phase:")).unwrap();
        let image = out.lines().find(|l| l.starts_with("Image:")).unwrap();
        assert_eq!(phase.find("Ready"), image.find("registry/"));
    }
}
