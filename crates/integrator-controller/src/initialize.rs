//! First action for a new kit.

use crate::action::{Action, ActionContext};
use async_trait::async_trait;
use integrator_core::catalog::{self, CatalogEntry};
use integrator_core::digest::compute_for_kit;
use integrator_core::kit::{IntegrationKit, KitPhase};
use integrator_core::{ObjectKey, Result};
use tracing::{info, warn};

/// Runtime constraint and the catalogs it is resolved against.
#[derive(Debug, Clone, Default)]
pub struct RuntimeSelection {
    pub constraint: Option<String>,
    pub catalogs: Vec<CatalogEntry>,
}

impl RuntimeSelection {
    pub fn new(constraint: Option<String>, catalogs: Vec<CatalogEntry>) -> Self {
        Self {
            constraint,
            catalogs,
        }
    }

    pub fn resolve(&self) -> Option<&CatalogEntry> {
        let constraint = self.constraint.as_deref()?;
        catalog::resolve(constraint, &self.catalogs)
    }
}

/// Stamps a new kit with its digest and runtime version and submits it.
pub struct InitializeAction {
    runtime: RuntimeSelection,
}

impl InitializeAction {
    pub fn new(runtime: RuntimeSelection) -> Self {
        Self { runtime }
    }
}

#[async_trait]
impl Action for InitializeAction {
    fn name(&self) -> &'static str {
        "initialize"
    }

    fn can_handle(&self, kit: &IntegrationKit) -> bool {
        kit.phase() == KitPhase::None
    }

    async fn handle(&self, ctx: &ActionContext, kit: &IntegrationKit) -> Result<()> {
        let key = ObjectKey::of(kit);
        let mut target = kit.clone();
        let status = target.status_mut();

        status.digest = compute_for_kit(kit);
        status.phase = KitPhase::BuildSubmitted;
        status.failure = None;

        if status.runtime_version.is_empty() {
            match self.runtime.resolve() {
                Some(catalog) => status.runtime_version = catalog.version.clone(),
                None => {
                    if let Some(constraint) = &self.runtime.constraint {
                        warn!(kit = %key, %constraint, "No runtime catalog satisfies the configured version");
                    }
                }
            }
        }

        info!(kit = %key, phase = %status.phase, runtime = %status.runtime_version, "IntegrationKit state transition");

        ctx.update_status(&target).await?;
        Ok(())
    }
}
