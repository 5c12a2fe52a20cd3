//! Operator command.

use anyhow::{Context, Result};
use integrator_config::{OperatorConfig, load_operator_config};
use integrator_controller::{ActionList, ReconcileLoop, RuntimeSelection};
use integrator_core::cancel::CancellationToken;
use integrator_kube::integration_controller::{self, IntegrationContext};
use integrator_kube::kit_controller::{self, KitContext};
use integrator_kube::{KubeBuildPipeline, KubeKitStore};
use integrator_traits::TraitCatalog;
use kube::Client;
use std::sync::Arc;
use tracing::{info, warn};

pub async fn run(config_path: Option<&str>, namespace: Option<String>) -> Result<()> {
    let config = match config_path {
        Some(path) => load_operator_config(path)
            .with_context(|| format!("Failed to load operator configuration from {path}"))?,
        None => OperatorConfig::default(),
    };
    let namespace = namespace.or_else(|| config.namespace.clone());

    info!(
        namespace = namespace.as_deref().unwrap_or("all"),
        catalogs = config.catalogs.len(),
        runtime_version = config.runtime_version.as_deref().unwrap_or("unset"),
        resync_secs = config.resync_interval.as_secs(),
        "Starting integration operator"
    );

    let client = Client::try_default()
        .await
        .context("Failed to create Kubernetes client")?;
    let cancel = CancellationToken::new();

    let runtime = RuntimeSelection::new(config.runtime_version.clone(), config.catalogs.clone());
    let actions = ActionList::standard(Arc::new(KubeBuildPipeline::new(client.clone())), runtime);
    let kit_ctx = Arc::new(KitContext {
        reconciler: ReconcileLoop::new(Arc::new(KubeKitStore::new(client.clone())), actions),
        resync_interval: config.resync_interval,
        cancel: cancel.clone(),
    });

    let integration_ctx = Arc::new(IntegrationContext {
        client: client.clone(),
        traits: TraitCatalog::new(),
        catalogs: config.catalogs,
        default_profile: config.profile,
        base_image: config.base_image,
        resync_interval: config.resync_interval,
        cancel: cancel.clone(),
    });

    let kits = kit_controller::run(client.clone(), namespace.clone(), kit_ctx);
    let integrations = integration_controller::run(client, namespace, integration_ctx);

    tokio::select! {
        _ = kits => warn!("IntegrationKit controller stopped"),
        _ = integrations => warn!("Integration controller stopped"),
        result = tokio::signal::ctrl_c() => {
            result.context("Failed to listen for shutdown signal")?;
            info!("Shutdown signal received");
        }
    }

    // Abort outstanding cluster calls of in-flight reconciliations.
    cancel.cancel();
    Ok(())
}
