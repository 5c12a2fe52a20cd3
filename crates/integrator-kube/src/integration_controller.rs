//! Integration controller.
//!
//! Each integration gets one kit, `<integration>-kit`, derived from its spec.
//! The controller waits for that kit to become ready, runs the trait pass
//! against it and applies the resulting resources.
//!
//! Two digests drive change detection. `status.kitDigest` records the kit
//! spec last applied; a different derived kit means a rebuild. `status.digest`
//! covers the whole integration spec; a change to it alone, such as an edited
//! source or a new replica count, only needs a new trait pass.

use crate::apply::{FIELD_MANAGER, apply_resources};
use crate::error::map_kube_error;
use crate::sources::KubeSourceResolver;
use futures::StreamExt;
use integrator_core::cancel::{CancellationToken, cancellable};
use integrator_core::catalog::{CatalogEntry, find_exact_match};
use integrator_core::digest::{compute_for_integration, compute_for_spec};
use integrator_core::integration::{Integration, IntegrationPhase, IntegrationStatus};
use integrator_core::kit::{IntegrationKit, IntegrationKitSpec, KitPhase, TraitProfile};
use integrator_core::{Error, ObjectKey, Result};
use integrator_traits::{Environment, INTEGRATION_LABEL, TraitCatalog};
use kube::api::{Api, Patch, PatchParams};
use kube::runtime::controller::{Action, Controller};
use kube::runtime::watcher::Config;
use kube::{Client, Resource, ResourceExt};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};

const KIT_POLL_INTERVAL: Duration = Duration::from_secs(10);

pub struct IntegrationContext {
    pub client: Client,
    pub traits: TraitCatalog,
    pub catalogs: Vec<CatalogEntry>,
    pub default_profile: Option<TraitProfile>,
    pub base_image: String,
    pub resync_interval: Duration,
    pub cancel: CancellationToken,
}

/// What one reconciliation does with an integration.
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    /// First sight: enter `Initialization`.
    Initialize,
    /// Create or update the kit and wait for its build.
    EnsureKit,
    /// The kit is still building.
    WaitForKit,
    /// The kit is ready: take over its image and deploy.
    BindKit {
        image: String,
        runtime_version: String,
    },
    /// The kit build failed.
    KitFailed,
    /// Run the trait pass and apply its resources.
    Deploy,
    /// Only deployment fields changed: record the new digest and deploy
    /// again on the current kit.
    Redeploy,
    /// The derived kit changed since it was last applied.
    Reinitialize,
    Idle,
}

pub fn kit_name(integration: &Integration) -> String {
    format!("{}-kit", integration.name_any())
}

/// The kit an integration runs on, built on `base_image`.
pub fn kit_for(integration: &Integration, base_image: &str) -> IntegrationKit {
    let spec = IntegrationKitSpec {
        image: base_image.to_string(),
        dependencies: integration.spec.dependencies.clone(),
        profile: integration.spec.profile,
        traits: integration.spec.traits.clone(),
        configuration: integration.spec.configuration.clone(),
        repositories: integration.spec.repositories.clone(),
    };

    let mut kit = IntegrationKit::new(&kit_name(integration), spec);
    kit.metadata.namespace = integration.namespace();
    kit.metadata.labels = Some(BTreeMap::from([(
        INTEGRATION_LABEL.to_string(),
        integration.name_any(),
    )]));
    if let Some(owner) = integration.controller_owner_ref(&()) {
        kit.metadata.owner_references = Some(vec![owner]);
    }
    kit
}

/// Decide the next step from the integration and the current state of its
/// kit.
pub fn plan(integration: &Integration, kit: Option<&IntegrationKit>, base_image: &str) -> Step {
    let ready_kit = kit.filter(|k| k.phase() == KitPhase::Ready);
    let kit_changed =
        || integration.kit_digest() != compute_for_spec(&kit_for(integration, base_image).spec);
    let spec_changed = || integration.digest() != compute_for_integration(&integration.spec);

    match integration.phase() {
        IntegrationPhase::None => Step::Initialize,
        IntegrationPhase::Initialization => Step::EnsureKit,
        IntegrationPhase::BuildingKit => match kit {
            None => Step::EnsureKit,
            // Edited mid-build: derive and apply again.
            Some(_) if spec_changed() || kit_changed() => Step::Reinitialize,
            // A kit still reporting the previous digest has not seen the
            // applied spec yet.
            Some(k) if k.digest() != integration.kit_digest() => Step::WaitForKit,
            Some(k) if k.phase() == KitPhase::Error => Step::KitFailed,
            Some(k) if k.phase() == KitPhase::Ready => bind(k),
            Some(_) => Step::WaitForKit,
        },
        IntegrationPhase::Deploying => match ready_kit {
            Some(_) => Step::Deploy,
            None => Step::Reinitialize,
        },
        IntegrationPhase::Running | IntegrationPhase::Error => {
            if kit.is_none() || kit_changed() {
                return Step::Reinitialize;
            }
            if spec_changed() {
                return Step::Redeploy;
            }
            match ready_kit {
                Some(k) if !image_of(k).is_empty() && image_of(k) != integration.image() => {
                    bind(k)
                }
                _ => Step::Idle,
            }
        }
    }
}

fn image_of(kit: &IntegrationKit) -> &str {
    kit.status.as_ref().map(|s| s.image.as_str()).unwrap_or("")
}

fn bind(kit: &IntegrationKit) -> Step {
    let status = kit.status.clone().unwrap_or_default();
    Step::BindKit {
        image: status.image,
        runtime_version: status.runtime_version,
    }
}

/// Watch integrations, and the kits they own, until the stream ends.
pub async fn run(client: Client, namespace: Option<String>, ctx: Arc<IntegrationContext>) {
    let (integrations, kits) = match &namespace {
        Some(ns) => (
            Api::<Integration>::namespaced(client.clone(), ns),
            Api::<IntegrationKit>::namespaced(client, ns),
        ),
        None => (Api::<Integration>::all(client.clone()), Api::<IntegrationKit>::all(client)),
    };

    info!(
        namespace = namespace.as_deref().unwrap_or("all"),
        traits = ?ctx.traits.ids(),
        "Starting Integration controller"
    );

    Controller::new(integrations, Config::default())
        .owns(kits, Config::default())
        .run(reconcile, error_policy, ctx)
        .for_each(|result| async move {
            match result {
                Ok((obj, action)) => {
                    debug!(name = obj.name, namespace = obj.namespace, ?action, "Reconciliation completed");
                }
                Err(e) => {
                    error!(error = %e, "Reconciliation failed");
                }
            }
        })
        .await;
}

#[instrument(skip(integration, ctx), fields(integration = %integration.name_any()))]
async fn reconcile(integration: Arc<Integration>, ctx: Arc<IntegrationContext>) -> Result<Action> {
    let key = ObjectKey::of(integration.as_ref());
    let kits: Api<IntegrationKit> = Api::namespaced(ctx.client.clone(), &key.namespace);
    let kit = cancellable(&ctx.cancel, async {
        kits.get_opt(&kit_name(&integration))
            .await
            .map_err(map_kube_error)
    })
    .await?;

    let step = plan(&integration, kit.as_ref(), &ctx.base_image);
    debug!(integration = %key, phase = %integration.phase(), ?step, "Planned step");

    let mut status = integration.status.clone().unwrap_or_default();
    match step {
        Step::Initialize | Step::Reinitialize => {
            status.phase = IntegrationPhase::Initialization;
        }
        Step::EnsureKit => {
            let desired = kit_for(&integration, &ctx.base_image);
            cancellable(&ctx.cancel, async {
                kits.patch(
                    &desired.name_any(),
                    &PatchParams::apply(FIELD_MANAGER).force(),
                    &Patch::Apply(&desired),
                )
                .await
                .map_err(map_kube_error)
            })
            .await?;
            info!(integration = %key, kit = %desired.name_any(), "Kit applied");

            status.kit = desired.name_any();
            status.digest = compute_for_integration(&integration.spec);
            status.kit_digest = compute_for_spec(&desired.spec);
            status.phase = IntegrationPhase::BuildingKit;
        }
        Step::WaitForKit => return Ok(Action::requeue(KIT_POLL_INTERVAL)),
        Step::BindKit {
            image,
            runtime_version,
        } => {
            status.image = image;
            status.runtime_version = runtime_version;
            status.phase = IntegrationPhase::Deploying;
        }
        Step::KitFailed => {
            warn!(integration = %key, kit = %kit_name(&integration), "Kit build failed");
            status.phase = IntegrationPhase::Error;
        }
        Step::Deploy => {
            let Some(kit) = kit else {
                return Err(Error::NotFound(format!("kit {}", kit_name(&integration))));
            };
            let applied = deploy(&ctx, integration.as_ref().clone(), kit).await?;
            info!(integration = %key, resources = applied, "Integration deployed");
            status.phase = IntegrationPhase::Running;
        }
        Step::Redeploy => {
            info!(integration = %key, "Integration spec changed, redeploying");
            status.digest = compute_for_integration(&integration.spec);
            status.phase = IntegrationPhase::Deploying;
        }
        Step::Idle => return Ok(Action::requeue(ctx.resync_interval)),
    }

    update_status(&ctx.client, &integration, status).await?;
    Ok(Action::requeue(ctx.resync_interval))
}

async fn deploy(
    ctx: &IntegrationContext,
    integration: Integration,
    kit: IntegrationKit,
) -> Result<usize> {
    let runtime_version = kit
        .status
        .as_ref()
        .map(|s| s.runtime_version.clone())
        .unwrap_or_default();
    let catalog = find_exact_match(&runtime_version, &ctx.catalogs).cloned();
    if catalog.is_none() {
        debug!(runtime_version = %runtime_version, "No catalog for kit runtime version");
    }

    let owner = integration.controller_owner_ref(&());
    let mut env = Environment::new(integration)
        .with_kit(kit)
        .with_catalog(catalog)
        .with_default_profile(ctx.default_profile)
        .with_source_resolver(Arc::new(KubeSourceResolver::new(ctx.client.clone())))
        .with_cancel(ctx.cancel.clone());

    ctx.traits.apply(&mut env).await?;

    let namespace = env.namespace();
    let resources = std::mem::take(&mut env.resources);
    apply_resources(&ctx.client, &namespace, owner.as_ref(), resources).await
}

async fn update_status(
    client: &Client,
    integration: &Integration,
    status: IntegrationStatus,
) -> Result<()> {
    let key = ObjectKey::of(integration);
    debug!(integration = %key, phase = %status.phase, "Updating Integration status");

    let patch = serde_json::json!({
        "metadata": { "resourceVersion": integration.resource_version() },
        "status": status,
    });
    let api: Api<Integration> = Api::namespaced(client.clone(), &key.namespace);
    api.patch_status(&key.name, &PatchParams::default(), &Patch::Merge(&patch))
        .await
        .map_err(map_kube_error)?;
    Ok(())
}

fn error_policy(integration: Arc<Integration>, error: &Error, _ctx: Arc<IntegrationContext>) -> Action {
    let delay = error.requeue_delay();
    warn!(
        integration = %ObjectKey::of(integration.as_ref()),
        error = %error,
        delay_secs = delay.as_secs(),
        "Integration reconciliation failed, will retry"
    );
    Action::requeue(delay)
}
