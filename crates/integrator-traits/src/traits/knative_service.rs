use super::Trait;
use crate::INTEGRATION_LABEL;
use crate::annotations::filter_transferable;
use crate::environment::{ControllerStrategy, Environment};
use crate::envvar;
use crate::properties::TraitProperties;
use crate::resources::{KnativeService, KnativeServiceSpec};
use async_trait::async_trait;
use integrator_core::Result;
use integrator_core::integration::IntegrationPhase;
use integrator_core::kit::KitPhase;
use k8s_openapi::api::core::v1::{Container, EnvVar, PodSpec, PodTemplateSpec};
use kube::ResourceExt;
use kube::api::ObjectMeta;
use tracing::{debug, info};

const CLASS_ANNOTATION: &str = "autoscaling.knative.dev/class";
const METRIC_ANNOTATION: &str = "autoscaling.knative.dev/metric";
const TARGET_ANNOTATION: &str = "autoscaling.knative.dev/target";
const MIN_SCALE_ANNOTATION: &str = "autoscaling.knative.dev/minScale";
const MAX_SCALE_ANNOTATION: &str = "autoscaling.knative.dev/maxScale";
const RESOLVE_NAMES_ANNOTATION: &str = "alpha.image.policy.openshift.io/resolve-names";

/// Runs the integration as a Knative serving service.
#[derive(Debug, Default)]
pub struct KnativeServiceTrait {
    enabled: Option<bool>,
    class: Option<String>,
    metric: Option<String>,
    target: Option<i32>,
    min_scale: Option<i32>,
    max_scale: Option<i32>,
    auto: Option<bool>,
}

impl KnativeServiceTrait {
    pub const ID: &'static str = "knative-service";

    pub fn from_properties(props: &TraitProperties<'_>) -> Result<Self> {
        Ok(Self {
            enabled: props.enabled()?,
            class: props.string("autoscaling-class"),
            metric: props.string("autoscaling-metric"),
            target: props.int("autoscaling-target")?,
            min_scale: props.int("min-scale")?,
            max_scale: props.int("max-scale")?,
            auto: props.bool("auto")?,
        })
    }

    fn service_for(&self, env: &Environment) -> KnativeService {
        let name = env.name();
        let labels = env.labels();
        let transferable = filter_transferable(env.integration.annotations());

        let mut annotations = transferable.clone();
        annotations.insert(RESOLVE_NAMES_ANNOTATION.to_string(), "*".to_string());
        if let Some(class) = &self.class {
            annotations.insert(CLASS_ANNOTATION.to_string(), class.clone());
        }
        if let Some(metric) = &self.metric {
            annotations.insert(METRIC_ANNOTATION.to_string(), metric.clone());
        }
        if let Some(target) = self.target {
            annotations.insert(TARGET_ANNOTATION.to_string(), target.to_string());
        }
        if let Some(min) = self.min_scale.filter(|v| *v > 0) {
            annotations.insert(MIN_SCALE_ANNOTATION.to_string(), min.to_string());
        }
        if let Some(max) = self.max_scale.filter(|v| *v > 0) {
            annotations.insert(MAX_SCALE_ANNOTATION.to_string(), max.to_string());
        }

        let mut vars = env.runtime_env();
        for var in allowed_env_vars(env) {
            envvar::set_var(&mut vars, var);
        }

        let mut volumes = Vec::new();
        let mut mounts = Vec::new();
        env.configure_volumes_and_mounts(&mut volumes, &mut mounts);

        let mut service = KnativeService::new(
            &name,
            KnativeServiceSpec {
                template: PodTemplateSpec {
                    metadata: Some(ObjectMeta {
                        labels: Some(labels.clone()),
                        annotations: Some(annotations),
                        ..Default::default()
                    }),
                    spec: Some(PodSpec {
                        containers: vec![Container {
                            name: "integration".to_string(),
                            image: Some(env.integration.image().to_string()),
                            env: Some(vars),
                            volume_mounts: Some(mounts),
                            ..Default::default()
                        }],
                        service_account_name: env.integration.spec.service_account_name.clone(),
                        volumes: Some(volumes),
                        ..Default::default()
                    }),
                },
            },
        );
        service.metadata.namespace = Some(env.namespace());
        service.metadata.labels = Some(labels);
        service.metadata.annotations = Some(transferable);
        service
    }
}

/// Trait variables a serverless container can carry. Pod field references
/// are not available there, except the namespace which is known upfront.
fn allowed_env_vars(env: &Environment) -> Vec<EnvVar> {
    let namespace = env.namespace();
    let mut allowed = Vec::with_capacity(env.env_vars.len());

    for var in &env.env_vars {
        let Some(source) = &var.value_from else {
            allowed.push(var.clone());
            continue;
        };

        if let Some(field) = &source.field_ref {
            if field.field_path == "metadata.namespace" {
                allowed.push(EnvVar {
                    name: var.name.clone(),
                    value: Some(namespace.clone()),
                    ..Default::default()
                });
            } else {
                info!(
                    variable = %var.name,
                    "Environment variable uses fieldRef and cannot be set on a Knative service"
                );
            }
        } else if source.resource_field_ref.is_some() {
            info!(
                variable = %var.name,
                "Environment variable uses resourceFieldRef and cannot be set on a Knative service"
            );
        } else {
            allowed.push(var.clone());
        }
    }

    allowed
}

#[async_trait]
impl Trait for KnativeServiceTrait {
    fn id(&self) -> &'static str {
        Self::ID
    }

    async fn configure(&mut self, env: &Environment) -> Result<bool> {
        if self.enabled == Some(false) {
            return Ok(false);
        }
        if !env.in_phase(KitPhase::Ready, IntegrationPhase::Deploying) {
            return Ok(false);
        }
        if env.determine_controller_strategy().await? != ControllerStrategy::KnativeService {
            return Ok(false);
        }

        let name = env.name();
        let competing = env.resources.get_deployment(|d| {
            d.labels().get(INTEGRATION_LABEL).map(String::as_str) == Some(name.as_str())
        });
        if competing.is_some() {
            debug!(integration = %name, "A Deployment already runs the integration");
            return Ok(false);
        }

        // Not every service may scale down to zero.
        if self.auto.unwrap_or(true) && self.min_scale.is_none() {
            let meta = env.source_metadata().await?;
            if !meta.requires_http_service || !meta.passive_endpoints {
                self.min_scale = Some(1);
            }
        }

        Ok(true)
    }

    fn apply(&mut self, env: &mut Environment) -> Result<()> {
        let service = self.service_for(env);
        let maps = env.compute_config_maps();
        env.resources.add(service);
        env.resources.add_all(maps);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use integrator_core::catalog::{CatalogEntry, SchemeCapability};
    use integrator_core::integration::{Integration, IntegrationSpec, SourceSpec};
    use integrator_core::kit::{IntegrationKit, IntegrationKitSpec};
    use k8s_openapi::api::core::v1::{
        ConfigMapKeySelector, EnvVarSource, ObjectFieldSelector, ResourceFieldSelector,
        SecretKeySelector,
    };
    use std::collections::BTreeMap;

    fn env(route: &str) -> Environment {
        let mut it = Integration::new(
            "hello",
            IntegrationSpec {
                sources: vec![SourceSpec::inline("routes.groovy", route)],
                ..Default::default()
            },
        );
        it.metadata.namespace = Some("camel".to_string());
        let status = it.status_mut();
        status.phase = IntegrationPhase::Deploying;
        status.image = "registry/kit-1:1".to_string();

        let mut kit = IntegrationKit::new("kit-1", IntegrationKitSpec::default());
        kit.status_mut().phase = KitPhase::Ready;

        let catalog = CatalogEntry::new("1.0.0")
            .with_scheme(
                "http",
                SchemeCapability {
                    http: true,
                    passive: true,
                },
            )
            .with_scheme("timer", SchemeCapability::default());

        let mut env = Environment::new(it).with_kit(kit).with_catalog(Some(catalog));
        env.strategy = Some(ControllerStrategy::KnativeService);
        env
    }

    fn knative(pairs: &[(&str, &str)]) -> KnativeServiceTrait {
        let values: BTreeMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        KnativeServiceTrait::from_properties(&TraitProperties::new(KnativeServiceTrait::ID, &values))
            .unwrap()
    }

    fn template_annotations(service: &KnativeService) -> BTreeMap<String, String> {
        service
            .spec
            .template
            .metadata
            .as_ref()
            .and_then(|m| m.annotations.clone())
            .unwrap_or_default()
    }

    fn from_source(name: &str, source: EnvVarSource) -> EnvVar {
        EnvVar {
            name: name.to_string(),
            value_from: Some(source),
            ..Default::default()
        }
    }

    #[test]
    fn test_env_var_filter() {
        let mut env = env(r#"from("http:0.0.0.0:8080/hello")"#);
        let config_map = from_source(
            "LEVEL",
            EnvVarSource {
                config_map_key_ref: Some(ConfigMapKeySelector {
                    key: "level".to_string(),
                    ..Default::default()
                }),
                ..Default::default()
            },
        );
        let secret = from_source(
            "PASSWORD",
            EnvVarSource {
                secret_key_ref: Some(SecretKeySelector {
                    key: "password".to_string(),
                    ..Default::default()
                }),
                ..Default::default()
            },
        );
        env.env_vars = vec![
            EnvVar {
                name: "PLAIN".to_string(),
                value: Some("1".to_string()),
                ..Default::default()
            },
            from_source(
                "MEMORY",
                EnvVarSource {
                    resource_field_ref: Some(ResourceFieldSelector {
                        resource: "limits.memory".to_string(),
                        ..Default::default()
                    }),
                    ..Default::default()
                },
            ),
            from_source(
                "NS",
                EnvVarSource {
                    field_ref: Some(ObjectFieldSelector {
                        field_path: "metadata.namespace".to_string(),
                        ..Default::default()
                    }),
                    ..Default::default()
                },
            ),
            from_source(
                "POD",
                EnvVarSource {
                    field_ref: Some(ObjectFieldSelector {
                        field_path: "metadata.name".to_string(),
                        ..Default::default()
                    }),
                    ..Default::default()
                },
            ),
            config_map.clone(),
            secret.clone(),
        ];

        let allowed = allowed_env_vars(&env);

        let names: Vec<&str> = allowed.iter().map(|v| v.name.as_str()).collect();
        assert_eq!(names, vec!["PLAIN", "NS", "LEVEL", "PASSWORD"]);

        let namespace = envvar::get(&allowed, "NS").unwrap();
        assert_eq!(namespace.value.as_deref(), Some("camel"));
        assert!(namespace.value_from.is_none());

        assert_eq!(envvar::get(&allowed, "LEVEL"), Some(&config_map));
        assert_eq!(envvar::get(&allowed, "PASSWORD"), Some(&secret));
    }

    #[test]
    fn test_non_positive_scale_bounds_are_omitted() {
        let env = env(r#"from("http:0.0.0.0:8080/hello")"#);
        let service = knative(&[("min-scale", "0"), ("max-scale", "-1")]).service_for(&env);

        let annotations = template_annotations(&service);
        assert!(!annotations.contains_key(MIN_SCALE_ANNOTATION));
        assert!(!annotations.contains_key(MAX_SCALE_ANNOTATION));
    }

    #[test]
    fn test_autoscaling_class_and_metric() {
        let env = env(r#"from("http:0.0.0.0:8080/hello")"#);
        let service = knative(&[
            ("autoscaling-class", "hpa.autoscaling.knative.dev"),
            ("autoscaling-metric", "cpu"),
        ])
        .service_for(&env);

        let annotations = template_annotations(&service);
        assert_eq!(annotations[CLASS_ANNOTATION], "hpa.autoscaling.knative.dev");
        assert_eq!(annotations[METRIC_ANNOTATION], "cpu");
        assert!(!annotations.contains_key(TARGET_ANNOTATION));
    }

    #[tokio::test]
    async fn test_active_routes_get_min_scale_floor() {
        let mut env = env(r#"from("timer:tick")"#);
        let mut knative = knative(&[]);
        assert!(knative.configure(&env).await.unwrap());
        knative.apply(&mut env).unwrap();

        let service = env.resources.knative_services().next().unwrap();
        assert_eq!(template_annotations(service)[MIN_SCALE_ANNOTATION], "1");
    }

    #[tokio::test]
    async fn test_auto_false_skips_min_scale_floor() {
        let mut env = env(r#"from("timer:tick")"#);
        let mut knative = knative(&[("auto", "false")]);
        assert!(knative.configure(&env).await.unwrap());
        knative.apply(&mut env).unwrap();

        let service = env.resources.knative_services().next().unwrap();
        assert!(!template_annotations(service).contains_key(MIN_SCALE_ANNOTATION));
    }

    #[tokio::test]
    async fn test_explicit_zero_min_scale_is_kept() {
        let env = env(r#"from("timer:tick")"#);
        let mut knative = knative(&[("min-scale", "0")]);
        assert!(knative.configure(&env).await.unwrap());
        assert_eq!(knative.min_scale, Some(0));
        assert!(!template_annotations(&knative.service_for(&env)).contains_key(MIN_SCALE_ANNOTATION));
    }
}
