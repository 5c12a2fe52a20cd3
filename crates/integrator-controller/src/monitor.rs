//! Change detection for built kits.

use crate::action::{Action, ActionContext};
use async_trait::async_trait;
use integrator_core::digest::compute_for_kit;
use integrator_core::kit::{IntegrationKit, KitPhase};
use integrator_core::{ObjectKey, Result};
use tracing::info;

/// Guards `Ready` and `Error` kits. Sends a kit back to the build pipeline
/// when its spec no longer matches the stored digest; any other call is a
/// no-op.
#[derive(Debug, Default)]
pub struct MonitorAction;

impl MonitorAction {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Action for MonitorAction {
    fn name(&self) -> &'static str {
        "monitor"
    }

    fn can_handle(&self, kit: &IntegrationKit) -> bool {
        kit.phase().is_terminal()
    }

    async fn handle(&self, ctx: &ActionContext, kit: &IntegrationKit) -> Result<()> {
        let hash = compute_for_kit(kit);
        if hash == kit.digest() {
            return Ok(());
        }

        let key = ObjectKey::of(kit);
        info!(kit = %key, "IntegrationKit needs a rebuild");

        let mut target = kit.clone();
        let status = target.status_mut();
        status.digest = hash;
        status.phase = KitPhase::BuildSubmitted;
        status.failure = None;

        info!(kit = %key, phase = %status.phase, "IntegrationKit state transition");

        ctx.update_status(&target).await?;
        Ok(())
    }
}
