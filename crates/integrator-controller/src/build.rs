//! Actions bridging kits and the external build pipeline.

use crate::action::{Action, ActionContext};
use async_trait::async_trait;
use chrono::Utc;
use integrator_core::build::{BuildOutcome, BuildPipeline};
use integrator_core::cancel::cancellable;
use integrator_core::kit::{Failure, FailureRecovery, IntegrationKit, KitPhase};
use integrator_core::{ObjectKey, Result};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Triggers the build of a submitted kit.
pub struct BuildSubmitAction {
    pipeline: Arc<dyn BuildPipeline>,
}

impl BuildSubmitAction {
    pub fn new(pipeline: Arc<dyn BuildPipeline>) -> Self {
        Self { pipeline }
    }
}

#[async_trait]
impl Action for BuildSubmitAction {
    fn name(&self) -> &'static str {
        "build-submit"
    }

    fn can_handle(&self, kit: &IntegrationKit) -> bool {
        kit.phase() == KitPhase::BuildSubmitted
    }

    async fn handle(&self, ctx: &ActionContext, kit: &IntegrationKit) -> Result<()> {
        let key = ObjectKey::of(kit);

        cancellable(&ctx.cancel, self.pipeline.submit(kit)).await?;
        info!(kit = %key, pipeline = self.pipeline.name(), digest = kit.digest(), "Build submitted");

        let mut target = kit.clone();
        target.status_mut().phase = KitPhase::BuildRunning;

        info!(kit = %key, phase = %KitPhase::BuildRunning, "IntegrationKit state transition");

        ctx.update_status(&target).await?;
        Ok(())
    }
}

/// Waits for the running build and records its result.
pub struct BuildMonitorAction {
    pipeline: Arc<dyn BuildPipeline>,
}

impl BuildMonitorAction {
    pub fn new(pipeline: Arc<dyn BuildPipeline>) -> Self {
        Self { pipeline }
    }
}

#[async_trait]
impl Action for BuildMonitorAction {
    fn name(&self) -> &'static str {
        "build-monitor"
    }

    fn can_handle(&self, kit: &IntegrationKit) -> bool {
        kit.phase() == KitPhase::BuildRunning
    }

    async fn handle(&self, ctx: &ActionContext, kit: &IntegrationKit) -> Result<()> {
        let key = ObjectKey::of(kit);
        let outcome = cancellable(&ctx.cancel, self.pipeline.observe(kit)).await?;

        let mut target = kit.clone();
        let status = target.status_mut();

        match outcome {
            BuildOutcome::Pending | BuildOutcome::Running => {
                debug!(kit = %key, ?outcome, "Build still in progress");
                return Ok(());
            }
            BuildOutcome::Succeeded(output) => {
                status.image = output.image;
                status.public_image = output.public_image;
                status.base_image = output.base_image;
                status.artifacts = output.artifacts;
                if let Some(version) = output.runtime_version {
                    status.runtime_version = version;
                }
                status.failure = None;
                status.phase = KitPhase::Ready;
                info!(kit = %key, image = %status.image, "Build succeeded");
            }
            BuildOutcome::Failed { reason } => {
                warn!(kit = %key, %reason, "Build failed");
                status.failure = Some(Failure {
                    reason,
                    time: Utc::now(),
                    recovery: FailureRecovery::default(),
                });
                status.phase = KitPhase::Error;
            }
        }

        info!(kit = %key, phase = %status.phase, "IntegrationKit state transition");

        ctx.update_status(&target).await?;
        Ok(())
    }
}
