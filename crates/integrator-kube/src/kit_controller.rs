//! IntegrationKit controller.

use futures::StreamExt;
use integrator_controller::ReconcileLoop;
use integrator_core::cancel::CancellationToken;
use integrator_core::kit::IntegrationKit;
use integrator_core::{Error, ObjectKey};
use kube::api::Api;
use kube::runtime::controller::{Action, Controller};
use kube::runtime::watcher::Config;
use kube::{Client, ResourceExt};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};

pub struct KitContext {
    pub reconciler: ReconcileLoop,
    pub resync_interval: Duration,
    pub cancel: CancellationToken,
}

/// Watch kits and drive them through their build phases until the stream
/// ends.
pub async fn run(client: Client, namespace: Option<String>, ctx: Arc<KitContext>) {
    let kits: Api<IntegrationKit> = match &namespace {
        Some(ns) => Api::namespaced(client, ns),
        None => Api::all(client),
    };

    info!(
        namespace = namespace.as_deref().unwrap_or("all"),
        actions = ?ctx.reconciler.action_names(),
        "Starting IntegrationKit controller"
    );

    Controller::new(kits, Config::default())
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

#[instrument(skip(kit, ctx), fields(kit = %kit.name_any()))]
async fn reconcile(kit: Arc<IntegrationKit>, ctx: Arc<KitContext>) -> Result<Action, Error> {
    let key = ObjectKey::of(kit.as_ref());
    ctx.reconciler.reconcile(&key, &ctx.cancel).await?;
    Ok(Action::requeue(ctx.resync_interval))
}

fn error_policy(kit: Arc<IntegrationKit>, error: &Error, _ctx: Arc<KitContext>) -> Action {
    let delay = error.requeue_delay();
    warn!(
        kit = %ObjectKey::of(kit.as_ref()),
        error = %error,
        delay_secs = delay.as_secs(),
        "IntegrationKit reconciliation failed, will retry"
    );
    Action::requeue(delay)
}
