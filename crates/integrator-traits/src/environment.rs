//! Per-pass context shared by all traits.

use crate::INTEGRATION_LABEL;
use crate::envvar;
use crate::metadata::{self, InlineSourceResolver, SourceMetadata, SourceResolver};
use crate::properties::TraitProperties;
use crate::resources::ResourceSet;
use integrator_core::Result;
use integrator_core::cancel::{CancellationToken, cancellable};
use integrator_core::catalog::CatalogEntry;
use integrator_core::integration::{Integration, IntegrationPhase};
use integrator_core::kit::{ConfigurationSpec, IntegrationKit, KitPhase, TraitProfile, TraitSpec};
use k8s_openapi::api::core::v1::{
    ConfigMap, ConfigMapVolumeSource, EnvVar, KeyToPath, SecretVolumeSource, Volume, VolumeMount,
};
use kube::ResourceExt;
use kube::api::ObjectMeta;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

pub const PROPERTIES_MOUNT_PATH: &str = "/etc/camel/conf";
pub const SOURCES_MOUNT_PATH: &str = "/etc/camel/sources";
pub const CONF_D_MOUNT_PATH: &str = "/etc/camel/conf.d";
pub const JAVA_MAIN_CLASS: &str = "org.apache.camel.k.jvm.Application";

const PROPERTIES_VOLUME: &str = "integration-properties";
const PROPERTIES_KEY: &str = "application.properties";

/// Workload controller backing an integration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerStrategy {
    Deployment,
    KnativeService,
}

impl std::fmt::Display for ControllerStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ControllerStrategy::Deployment => write!(f, "deployment"),
            ControllerStrategy::KnativeService => write!(f, "knative-service"),
        }
    }
}

/// Mutable context for one trait pass. Rebuilt for every reconciliation and
/// discarded when the pass fails.
pub struct Environment {
    pub integration: Integration,
    pub kit: Option<IntegrationKit>,
    pub catalog: Option<CatalogEntry>,
    /// Profile used when neither the integration nor its kit sets one.
    pub default_profile: Option<TraitProfile>,
    /// Set by the `deployer` trait.
    pub strategy: Option<ControllerStrategy>,
    pub resources: ResourceSet,
    /// Variables contributed by traits, in declaration order.
    pub env_vars: Vec<EnvVar>,
    pub executed_traits: Vec<String>,
    pub sources: Arc<dyn SourceResolver>,
    pub cancel: CancellationToken,
}

impl Environment {
    pub fn new(integration: Integration) -> Self {
        Self {
            integration,
            kit: None,
            catalog: None,
            default_profile: None,
            strategy: None,
            resources: ResourceSet::new(),
            env_vars: Vec::new(),
            executed_traits: Vec::new(),
            sources: Arc::new(InlineSourceResolver),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_kit(mut self, kit: IntegrationKit) -> Self {
        self.kit = Some(kit);
        self
    }

    pub fn with_catalog(mut self, catalog: Option<CatalogEntry>) -> Self {
        self.catalog = catalog;
        self
    }

    pub fn with_default_profile(mut self, profile: Option<TraitProfile>) -> Self {
        self.default_profile = profile;
        self
    }

    pub fn with_source_resolver(mut self, sources: Arc<dyn SourceResolver>) -> Self {
        self.sources = sources;
        self
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn name(&self) -> String {
        self.integration.name_any()
    }

    pub fn namespace(&self) -> String {
        self.integration
            .namespace()
            .unwrap_or_else(|| "default".to_string())
    }

    /// Labels identifying resources of this integration.
    pub fn labels(&self) -> BTreeMap<String, String> {
        BTreeMap::from([(INTEGRATION_LABEL.to_string(), self.name())])
    }

    /// Effective profile: integration, then kit, then operator default.
    pub fn profile(&self) -> TraitProfile {
        self.integration
            .spec
            .profile
            .or_else(|| self.kit.as_ref().and_then(|k| k.spec.profile))
            .or(self.default_profile)
            .unwrap_or(TraitProfile::Kubernetes)
    }

    /// Kit and integration are both in the given phases.
    pub fn in_phase(&self, kit_phase: KitPhase, integration_phase: IntegrationPhase) -> bool {
        self.kit.as_ref().is_some_and(|k| k.phase() == kit_phase)
            && self.integration.phase() == integration_phase
    }

    /// Trait configuration of the kit overlaid by the integration's.
    pub fn merged_traits(&self) -> BTreeMap<String, TraitSpec> {
        let mut merged = self
            .kit
            .as_ref()
            .map(|k| k.spec.traits.clone())
            .unwrap_or_default();
        for (id, spec) in &self.integration.spec.traits {
            merged
                .entry(id.clone())
                .or_default()
                .configuration
                .extend(spec.configuration.clone());
        }
        merged
    }

    pub fn trait_config(&self, id: &str) -> BTreeMap<String, String> {
        self.merged_traits()
            .remove(id)
            .map(|t| t.configuration)
            .unwrap_or_default()
    }

    /// Decide which controller runs the integration.
    ///
    /// Explicit trait settings win over the profile; under the Knative
    /// profile a serverless service is used only for passive HTTP routes.
    pub async fn determine_controller_strategy(&self) -> Result<ControllerStrategy> {
        if let Some(strategy) = self.strategy {
            return Ok(strategy);
        }

        let deployment = self.trait_config("deployment");
        if TraitProperties::new("deployment", &deployment).enabled()? == Some(true) {
            return Ok(ControllerStrategy::Deployment);
        }

        let knative = self.trait_config("knative-service");
        match TraitProperties::new("knative-service", &knative).enabled()? {
            Some(true) => return Ok(ControllerStrategy::KnativeService),
            Some(false) => return Ok(ControllerStrategy::Deployment),
            None => {}
        }

        if self.profile() != TraitProfile::Knative {
            return Ok(ControllerStrategy::Deployment);
        }

        let meta = self.source_metadata().await?;
        if meta.requires_http_service && meta.passive_endpoints {
            Ok(ControllerStrategy::KnativeService)
        } else {
            Ok(ControllerStrategy::Deployment)
        }
    }

    pub async fn source_metadata(&self) -> Result<SourceMetadata> {
        let sources = cancellable(
            &self.cancel,
            self.sources.resolve(&self.integration, &self.resources),
        )
        .await?;
        Ok(metadata::extract_all(self.catalog.as_ref(), &sources))
    }

    /// `KEY=VALUE` configuration entries of one type, kit first so that the
    /// integration overrides it.
    pub fn collect_configuration_pairs(&self, type_: &str) -> BTreeMap<String, String> {
        let mut pairs = BTreeMap::new();
        for entry in self.configuration_entries(type_) {
            if let Some((k, v)) = entry.value.split_once('=') {
                let (k, v) = (k.trim(), v.trim());
                if !k.is_empty() && !v.is_empty() {
                    pairs.insert(k.to_string(), v.to_string());
                }
            }
        }
        pairs
    }

    fn configuration_entries<'a>(
        &'a self,
        type_: &'a str,
    ) -> impl Iterator<Item = &'a ConfigurationSpec> + 'a {
        let kit = self
            .kit
            .iter()
            .flat_map(|k| k.spec.configuration.iter());
        kit.chain(self.integration.spec.configuration.iter())
            .filter(move |c| c.type_ == type_)
    }

    /// ConfigMaps holding the integration's properties and inline sources.
    pub fn compute_config_maps(&self) -> Vec<ConfigMap> {
        let name = self.name();
        let namespace = self.namespace();

        let properties: String = self
            .collect_configuration_pairs("property")
            .iter()
            .map(|(k, v)| format!("{k}={v}\n"))
            .collect();

        let mut maps = vec![ConfigMap {
            metadata: ObjectMeta {
                name: Some(format!("{name}-properties")),
                namespace: Some(namespace.clone()),
                labels: Some(self.labels()),
                ..Default::default()
            },
            data: Some(BTreeMap::from([(PROPERTIES_KEY.to_string(), properties)])),
            ..Default::default()
        }];

        for (i, source) in self.integration.spec.sources.iter().enumerate() {
            let Some(content) = &source.content else {
                continue;
            };
            if source.content_ref.is_some() {
                continue;
            }

            let mut annotations =
                BTreeMap::from([("camel.apache.org/source.name".to_string(), source.name.clone())]);
            if let Some(lang) = metadata::source_language(source) {
                annotations.insert(
                    "camel.apache.org/source.language".to_string(),
                    lang.to_string(),
                );
            }

            maps.push(ConfigMap {
                metadata: ObjectMeta {
                    name: Some(format!("{name}-source-{i:03}")),
                    namespace: Some(namespace.clone()),
                    labels: Some(self.labels()),
                    annotations: Some(annotations),
                    ..Default::default()
                },
                data: Some(BTreeMap::from([(
                    "content".to_string(),
                    content.clone(),
                )])),
                ..Default::default()
            });
        }

        maps
    }

    /// Runtime locations of the mounted sources.
    pub fn compute_sources_uri(&self) -> Vec<String> {
        self.integration
            .spec
            .sources
            .iter()
            .enumerate()
            .map(|(i, source)| {
                let file = source.name.trim_start_matches('/');
                let uri = format!("file:{SOURCES_MOUNT_PATH}/i-source-{i:03}/{file}");
                match metadata::source_language(source) {
                    Some(lang) => format!("{uri}?language={lang}"),
                    None => uri,
                }
            })
            .collect()
    }

    /// Volumes and mounts for properties, sources and the ConfigMaps and
    /// Secrets listed in the configuration.
    pub fn configure_volumes_and_mounts(
        &self,
        volumes: &mut Vec<Volume>,
        mounts: &mut Vec<VolumeMount>,
    ) {
        let name = self.name();

        volumes.push(Volume {
            name: PROPERTIES_VOLUME.to_string(),
            config_map: Some(ConfigMapVolumeSource {
                name: format!("{name}-properties"),
                items: Some(vec![KeyToPath {
                    key: PROPERTIES_KEY.to_string(),
                    path: PROPERTIES_KEY.to_string(),
                    ..Default::default()
                }]),
                ..Default::default()
            }),
            ..Default::default()
        });
        mounts.push(VolumeMount {
            name: PROPERTIES_VOLUME.to_string(),
            mount_path: PROPERTIES_MOUNT_PATH.to_string(),
            ..Default::default()
        });

        for (i, source) in self.integration.spec.sources.iter().enumerate() {
            let ref_name = format!("i-source-{i:03}");
            let cm_name = source
                .content_ref
                .clone()
                .unwrap_or_else(|| format!("{name}-source-{i:03}"));
            let key = if source.content_ref.is_some() {
                source.content_key()
            } else {
                "content"
            };

            volumes.push(Volume {
                name: ref_name.clone(),
                config_map: Some(ConfigMapVolumeSource {
                    name: cm_name,
                    items: Some(vec![KeyToPath {
                        key: key.to_string(),
                        path: source.name.trim_start_matches('/').to_string(),
                        ..Default::default()
                    }]),
                    ..Default::default()
                }),
                ..Default::default()
            });
            mounts.push(VolumeMount {
                name: ref_name.clone(),
                mount_path: format!("{SOURCES_MOUNT_PATH}/{ref_name}"),
                ..Default::default()
            });
        }

        let mut seen = BTreeSet::new();
        for entry in self.configuration_entries("configmap") {
            if !seen.insert(("configmap", entry.value.as_str())) {
                continue;
            }
            let ref_name = sanitize_name(&entry.value);
            volumes.push(Volume {
                name: ref_name.clone(),
                config_map: Some(ConfigMapVolumeSource {
                    name: entry.value.clone(),
                    ..Default::default()
                }),
                ..Default::default()
            });
            mounts.push(VolumeMount {
                name: ref_name,
                mount_path: format!("{CONF_D_MOUNT_PATH}/_configmaps/{}", entry.value),
                ..Default::default()
            });
        }

        for entry in self.configuration_entries("secret") {
            if !seen.insert(("secret", entry.value.as_str())) {
                continue;
            }
            let ref_name = sanitize_name(&entry.value);
            volumes.push(Volume {
                name: ref_name.clone(),
                secret: Some(SecretVolumeSource {
                    secret_name: Some(entry.value.clone()),
                    ..Default::default()
                }),
                ..Default::default()
            });
            mounts.push(VolumeMount {
                name: ref_name,
                mount_path: format!("{CONF_D_MOUNT_PATH}/_secrets/{}", entry.value),
                ..Default::default()
            });
        }
    }

    /// Container variables every workload gets: `env` configuration pairs
    /// followed by the runtime settings.
    pub fn runtime_env(&self) -> Vec<EnvVar> {
        let mut vars = Vec::new();
        for (key, value) in self.collect_configuration_pairs("env") {
            envvar::set_val(&mut vars, key, value);
        }

        envvar::set_val(&mut vars, "JAVA_MAIN_CLASS", JAVA_MAIN_CLASS);
        // Changes whenever the build inputs change, even if nothing else in
        // the pod template does.
        envvar::set_val(&mut vars, "CAMEL_K_DIGEST", self.integration.digest());
        envvar::set_val(
            &mut vars,
            "CAMEL_K_ROUTES",
            self.compute_sources_uri().join(","),
        );
        envvar::set_val(
            &mut vars,
            "CAMEL_K_CONF",
            format!("{PROPERTIES_MOUNT_PATH}/{PROPERTIES_KEY}"),
        );
        envvar::set_val(&mut vars, "CAMEL_K_CONF_D", CONF_D_MOUNT_PATH);
        vars
    }
}

/// Lowercase DNS-label form of a resource name.
fn sanitize_name(name: &str) -> String {
    let sanitized: String = name
        .to_ascii_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect();
    sanitized.trim_matches('-').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use integrator_core::catalog::SchemeCapability;
    use integrator_core::integration::{IntegrationSpec, SourceSpec};
    use integrator_core::kit::IntegrationKitSpec;

    fn integration() -> Integration {
        let mut it = Integration::new(
            "hello",
            IntegrationSpec {
                sources: vec![
                    SourceSpec::inline("routes.groovy", r#"from("http:0.0.0.0:8080/hi")"#),
                    SourceSpec {
                        name: "/more.xml".to_string(),
                        content_ref: Some("shared-routes".to_string()),
                        content_key: Some("routes.xml".to_string()),
                        ..Default::default()
                    },
                ],
                configuration: vec![
                    ConfigurationSpec::new("env", "LOG_LEVEL=debug"),
                    ConfigurationSpec::new("property", "camel.context.name=hello"),
                    ConfigurationSpec::new("configmap", "extra-conf"),
                    ConfigurationSpec::new("secret", "db-credentials"),
                ],
                ..Default::default()
            },
        );
        it.metadata.namespace = Some("camel".to_string());
        it
    }

    fn kit() -> IntegrationKit {
        IntegrationKit::new(
            "kit-1",
            IntegrationKitSpec {
                configuration: vec![
                    ConfigurationSpec::new("env", "LOG_LEVEL=info"),
                    ConfigurationSpec::new("env", "TZ=UTC"),
                    ConfigurationSpec::new("env", "BROKEN"),
                    ConfigurationSpec::new("configmap", "extra-conf"),
                ],
                traits: BTreeMap::from([(
                    "knative-service".to_string(),
                    TraitSpec::from_pairs([("min-scale", "1"), ("max-scale", "5")]),
                )]),
                ..Default::default()
            },
        )
    }

    #[test]
    fn test_configuration_pairs_integration_wins() {
        let env = Environment::new(integration()).with_kit(kit());
        let pairs = env.collect_configuration_pairs("env");
        assert_eq!(pairs.get("LOG_LEVEL").map(String::as_str), Some("debug"));
        assert_eq!(pairs.get("TZ").map(String::as_str), Some("UTC"));
        assert!(!pairs.contains_key("BROKEN"));
    }

    #[test]
    fn test_merged_traits_overlay_properties() {
        let mut it = integration();
        it.spec.traits.insert(
            "knative-service".to_string(),
            TraitSpec::from_pairs([("min-scale", "3")]),
        );
        let env = Environment::new(it).with_kit(kit());

        let config = env.trait_config("knative-service");
        assert_eq!(config.get("min-scale").map(String::as_str), Some("3"));
        assert_eq!(config.get("max-scale").map(String::as_str), Some("5"));
        assert!(env.trait_config("deployment").is_empty());
    }

    #[test]
    fn test_config_maps_cover_properties_and_inline_sources() {
        let env = Environment::new(integration());
        let maps = env.compute_config_maps();
        let names: Vec<_> = maps.iter().map(|m| m.name_any()).collect();
        assert_eq!(names, vec!["hello-properties", "hello-source-000"]);

        let props = maps[0].data.as_ref().unwrap();
        assert_eq!(props[PROPERTIES_KEY], "camel.context.name=hello\n");
        let annotations = maps[1].annotations();
        assert_eq!(annotations["camel.apache.org/source.language"], "groovy");
    }

    #[test]
    fn test_sources_uri() {
        let env = Environment::new(integration());
        assert_eq!(
            env.compute_sources_uri(),
            vec![
                "file:/etc/camel/sources/i-source-000/routes.groovy?language=groovy",
                "file:/etc/camel/sources/i-source-001/more.xml?language=xml",
            ]
        );
    }

    #[test]
    fn test_volumes_and_mounts() {
        let env = Environment::new(integration()).with_kit(kit());
        let mut volumes = Vec::new();
        let mut mounts = Vec::new();
        env.configure_volumes_and_mounts(&mut volumes, &mut mounts);

        let paths: Vec<_> = mounts.iter().map(|m| m.mount_path.as_str()).collect();
        assert_eq!(
            paths,
            vec![
                "/etc/camel/conf",
                "/etc/camel/sources/i-source-000",
                "/etc/camel/sources/i-source-001",
                "/etc/camel/conf.d/_configmaps/extra-conf",
                "/etc/camel/conf.d/_secrets/db-credentials",
            ]
        );

        let shared = volumes[2].config_map.as_ref().unwrap();
        assert_eq!(shared.name, "shared-routes");
        let item = &shared.items.as_ref().unwrap()[0];
        assert_eq!(item.key, "routes.xml");
        assert_eq!(item.path, "more.xml");
    }

    #[test]
    fn test_runtime_env() {
        let mut it = integration();
        it.status_mut().digest = "v123".to_string();
        let env = Environment::new(it);
        let vars = env.runtime_env();

        let value = |name: &str| {
            envvar::get(&vars, name)
                .and_then(|v| v.value.clone())
                .unwrap_or_default()
        };
        assert_eq!(vars[0].name, "LOG_LEVEL");
        assert_eq!(value("JAVA_MAIN_CLASS"), JAVA_MAIN_CLASS);
        assert_eq!(value("CAMEL_K_DIGEST"), "v123");
        assert_eq!(value("CAMEL_K_CONF"), "/etc/camel/conf/application.properties");
        assert!(value("CAMEL_K_ROUTES").contains("i-source-000/routes.groovy"));
    }

    #[test]
    fn test_digest_var_set_even_when_empty() {
        let env = Environment::new(integration());
        let vars = env.runtime_env();
        let digest = envvar::get(&vars, "CAMEL_K_DIGEST").unwrap();
        assert_eq!(digest.value.as_deref(), Some(""));
    }

    #[test]
    fn test_in_phase_requires_kit() {
        let mut it = integration();
        it.status_mut().phase = IntegrationPhase::Deploying;
        let env = Environment::new(it);
        assert!(!env.in_phase(KitPhase::Ready, IntegrationPhase::Deploying));

        let mut kit = kit();
        kit.status_mut().phase = KitPhase::Ready;
        let env = env.with_kit(kit);
        assert!(env.in_phase(KitPhase::Ready, IntegrationPhase::Deploying));
    }

    fn knative_catalog() -> CatalogEntry {
        CatalogEntry::new("1.0.0")
            .with_scheme(
                "http",
                SchemeCapability {
                    http: true,
                    passive: true,
                },
            )
            .with_scheme("timer", SchemeCapability::default())
    }

    #[tokio::test]
    async fn test_strategy_defaults_to_deployment_outside_knative() {
        let env = Environment::new(integration()).with_catalog(Some(knative_catalog()));
        assert_eq!(
            env.determine_controller_strategy().await.unwrap(),
            ControllerStrategy::Deployment
        );
    }

    #[tokio::test]
    async fn test_strategy_knative_for_passive_http_routes() {
        let mut it = integration();
        it.spec.sources.truncate(1);
        let env = Environment::new(it)
            .with_catalog(Some(knative_catalog()))
            .with_default_profile(Some(TraitProfile::Knative));
        assert_eq!(
            env.determine_controller_strategy().await.unwrap(),
            ControllerStrategy::KnativeService
        );
    }

    #[tokio::test]
    async fn test_strategy_deployment_for_active_routes() {
        let mut it = integration();
        it.spec.sources = vec![SourceSpec::inline("t.groovy", r#"from("timer:tick")"#)];
        let env = Environment::new(it)
            .with_catalog(Some(knative_catalog()))
            .with_default_profile(Some(TraitProfile::Knative));
        assert_eq!(
            env.determine_controller_strategy().await.unwrap(),
            ControllerStrategy::Deployment
        );
    }

    #[tokio::test]
    async fn test_strategy_explicit_traits_win() {
        let mut it = integration();
        it.spec.traits.insert(
            "knative-service".to_string(),
            TraitSpec::from_pairs([("enabled", "true")]),
        );
        let env = Environment::new(it.clone());
        assert_eq!(
            env.determine_controller_strategy().await.unwrap(),
            ControllerStrategy::KnativeService
        );

        it.spec.traits.insert(
            "deployment".to_string(),
            TraitSpec::from_pairs([("enabled", "true")]),
        );
        let env = Environment::new(it);
        assert_eq!(
            env.determine_controller_strategy().await.unwrap(),
            ControllerStrategy::Deployment
        );
    }

    #[tokio::test]
    async fn test_strategy_cached() {
        let mut env = Environment::new(integration());
        env.strategy = Some(ControllerStrategy::KnativeService);
        assert_eq!(
            env.determine_controller_strategy().await.unwrap(),
            ControllerStrategy::KnativeService
        );
    }

    #[test]
    fn test_sanitize_name() {
        assert_eq!(sanitize_name("My.Config_Map"), "my-config-map");
    }
}
