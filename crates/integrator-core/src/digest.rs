//! Content digests for change detection.
//!
//! The kit digest covers exactly the build-relevant parts of a kit spec:
//! image, dependencies, configuration, traits and repositories. The
//! integration digest covers the whole integration spec, sources and
//! replicas included, and changes whenever the deployed workload must.
//! Declared sequences keep their order; trait maps are hashed in key order.
//! Every field is tagged and length-prefixed so adjacent values cannot run
//! together.

use crate::integration::IntegrationSpec;
use crate::kit::{ConfigurationSpec, IntegrationKit, IntegrationKitSpec, TraitSpec};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

const TAG_IMAGE: u8 = 1;
const TAG_DEPENDENCY: u8 = 2;
const TAG_CONFIGURATION: u8 = 3;
const TAG_TRAIT: u8 = 4;
const TAG_TRAIT_PROPERTY: u8 = 5;
const TAG_REPOSITORY: u8 = 6;
const TAG_REPLICAS: u8 = 7;
const TAG_SOURCE: u8 = 8;
const TAG_PROFILE: u8 = 9;
const TAG_SERVICE_ACCOUNT: u8 = 10;

/// Digest of a kit, independent of its status, metadata and identity.
pub fn compute_for_kit(kit: &IntegrationKit) -> String {
    compute_for_spec(&kit.spec)
}

pub fn compute_for_spec(spec: &IntegrationKitSpec) -> String {
    let mut hasher = Sha256::new();

    write_field(&mut hasher, TAG_IMAGE, &[&spec.image]);
    write_build_fields(
        &mut hasher,
        &spec.dependencies,
        &spec.configuration,
        &spec.traits,
        &spec.repositories,
    );

    format!("v{}", hex::encode(hasher.finalize()))
}

/// Digest of an integration spec. Stored in the integration status and
/// exposed to the running workload.
pub fn compute_for_integration(spec: &IntegrationSpec) -> String {
    let mut hasher = Sha256::new();

    if let Some(replicas) = spec.replicas {
        write_field(&mut hasher, TAG_REPLICAS, &[&replicas.to_string()]);
    }
    for source in &spec.sources {
        write_field(
            &mut hasher,
            TAG_SOURCE,
            &[
                &source.name,
                source.content.as_deref().unwrap_or(""),
                source.content_ref.as_deref().unwrap_or(""),
                source.content_key.as_deref().unwrap_or(""),
                source.language.as_deref().unwrap_or(""),
            ],
        );
    }
    if let Some(profile) = spec.profile {
        write_field(&mut hasher, TAG_PROFILE, &[&profile.to_string()]);
    }
    write_build_fields(
        &mut hasher,
        &spec.dependencies,
        &spec.configuration,
        &spec.traits,
        &spec.repositories,
    );
    if let Some(account) = &spec.service_account_name {
        write_field(&mut hasher, TAG_SERVICE_ACCOUNT, &[account]);
    }

    format!("v{}", hex::encode(hasher.finalize()))
}

fn write_build_fields(
    hasher: &mut Sha256,
    dependencies: &[String],
    configuration: &[ConfigurationSpec],
    traits: &BTreeMap<String, TraitSpec>,
    repositories: &[String],
) {
    for dependency in dependencies {
        write_field(hasher, TAG_DEPENDENCY, &[dependency]);
    }
    for entry in configuration {
        write_field(hasher, TAG_CONFIGURATION, &[&entry.type_, &entry.value]);
    }
    // BTreeMap iteration is already sorted by key.
    for (name, trait_spec) in traits {
        write_field(hasher, TAG_TRAIT, &[name]);
        for (key, value) in &trait_spec.configuration {
            write_field(hasher, TAG_TRAIT_PROPERTY, &[key, value]);
        }
    }
    for repository in repositories {
        write_field(hasher, TAG_REPOSITORY, &[repository]);
    }
}

fn write_field(hasher: &mut Sha256, tag: u8, parts: &[&str]) {
    hasher.update([tag]);
    for part in parts {
        hasher.update((part.len() as u64).to_le_bytes());
        hasher.update(part.as_bytes());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::integration::SourceSpec;
    use crate::kit::{IntegrationKitStatus, KitPhase, TraitProfile};

    fn spec() -> IntegrationKitSpec {
        let mut traits = BTreeMap::new();
        traits.insert(
            "knative-service".to_string(),
            TraitSpec::from_pairs([("min-scale", "1"), ("autoscaling-class", "kpa")]),
        );
        traits.insert(
            "environment".to_string(),
            TraitSpec::from_pairs([("container-meta", "true")]),
        );
        IntegrationKitSpec {
            image: "quay.io/runtime:1.0".to_string(),
            dependencies: vec!["camel:http".to_string(), "camel:log".to_string()],
            profile: None,
            traits,
            configuration: vec![ConfigurationSpec::new("env", "A=B")],
            repositories: vec!["https://repo.example.com/maven".to_string()],
        }
    }

    #[test]
    fn test_digest_is_deterministic() {
        let a = compute_for_spec(&spec());
        let b = compute_for_spec(&spec());
        assert_eq!(a, b);
        assert!(a.starts_with('v'));
        assert_eq!(a.len(), 1 + 64);
    }

    #[test]
    fn test_digest_ignores_map_insertion_order() {
        let mut reordered = spec();
        reordered.traits = BTreeMap::new();
        reordered.traits.insert(
            "environment".to_string(),
            TraitSpec::from_pairs([("container-meta", "true")]),
        );
        reordered.traits.insert(
            "knative-service".to_string(),
            TraitSpec::from_pairs([("autoscaling-class", "kpa"), ("min-scale", "1")]),
        );
        assert_eq!(compute_for_spec(&spec()), compute_for_spec(&reordered));
    }

    #[test]
    fn test_digest_changes_with_every_covered_field() {
        let base = compute_for_spec(&spec());

        let mutations: Vec<Box<dyn Fn(&mut IntegrationKitSpec)>> = vec![
            Box::new(|s| s.image.push_str("-next")),
            Box::new(|s| s.dependencies[1] = "camel:kafka".to_string()),
            Box::new(|s| s.dependencies.reverse()),
            Box::new(|s| s.configuration[0].value = "A=C".to_string()),
            Box::new(|s| s.configuration[0].type_ = "property".to_string()),
            Box::new(|s| {
                s.traits
                    .get_mut("knative-service")
                    .unwrap()
                    .configuration
                    .insert("min-scale".to_string(), "2".to_string());
            }),
            Box::new(|s| s.repositories.push("https://other.example.com".to_string())),
        ];

        for (i, mutate) in mutations.iter().enumerate() {
            let mut changed = spec();
            mutate(&mut changed);
            assert_ne!(base, compute_for_spec(&changed), "mutation {i} kept digest");
        }
    }

    #[test]
    fn test_digest_has_no_concatenation_ambiguity() {
        let mut a = spec();
        a.dependencies = vec!["ab".to_string(), "c".to_string()];
        let mut b = spec();
        b.dependencies = vec!["a".to_string(), "bc".to_string()];
        assert_ne!(compute_for_spec(&a), compute_for_spec(&b));
    }

    #[test]
    fn test_digest_ignores_status_and_identity() {
        let mut one = IntegrationKit::new("kit-a", spec());
        let mut two = IntegrationKit::new("kit-b", spec());
        one.status = Some(IntegrationKitStatus {
            phase: KitPhase::Ready,
            digest: "vold".to_string(),
            ..Default::default()
        });
        two.metadata.namespace = Some("elsewhere".to_string());
        two.spec.profile = Some(TraitProfile::Knative);
        assert_eq!(compute_for_kit(&one), compute_for_kit(&two));
    }

    fn integration_spec() -> IntegrationSpec {
        let kit = spec();
        IntegrationSpec {
            replicas: Some(2),
            sources: vec![SourceSpec::inline("routes.groovy", "from('timer:tick').to('log:info')")],
            dependencies: kit.dependencies,
            traits: kit.traits,
            configuration: kit.configuration,
            repositories: kit.repositories,
            ..Default::default()
        }
    }

    #[test]
    fn test_integration_digest_covers_deployment_fields() {
        let base = compute_for_integration(&integration_spec());
        assert_eq!(base, compute_for_integration(&integration_spec()));

        let mutations: Vec<Box<dyn Fn(&mut IntegrationSpec)>> = vec![
            Box::new(|s| s.sources[0].content = Some("from('timer:tock')".to_string())),
            Box::new(|s| s.sources[0].name = "routes.js".to_string()),
            Box::new(|s| s.sources[0].language = Some("groovy".to_string())),
            Box::new(|s| s.sources.push(SourceSpec::inline("more.groovy", ""))),
            Box::new(|s| s.replicas = Some(5)),
            Box::new(|s| s.replicas = None),
            Box::new(|s| s.profile = Some(TraitProfile::Knative)),
            Box::new(|s| s.service_account_name = Some("runner".to_string())),
            Box::new(|s| s.dependencies.push("camel:jms".to_string())),
            Box::new(|s| s.configuration[0].value = "A=C".to_string()),
            Box::new(|s| s.repositories.clear()),
        ];

        for (i, mutate) in mutations.iter().enumerate() {
            let mut changed = integration_spec();
            mutate(&mut changed);
            assert_ne!(base, compute_for_integration(&changed), "mutation {i} kept digest");
        }
    }

    #[test]
    fn test_integration_and_kit_digests_differ() {
        let kit = spec();
        let it = IntegrationSpec {
            dependencies: kit.dependencies.clone(),
            traits: kit.traits.clone(),
            configuration: kit.configuration.clone(),
            repositories: kit.repositories.clone(),
            ..Default::default()
        };
        assert_ne!(compute_for_integration(&it), compute_for_spec(&kit));
    }
}
