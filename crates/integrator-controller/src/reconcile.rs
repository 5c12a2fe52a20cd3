//! Reconcile loop for kits.

use crate::action::{ActionContext, ActionList};
use integrator_core::cancel::{CancellationToken, cancellable};
use integrator_core::kit::IntegrationKit;
use integrator_core::store::KitStore;
use integrator_core::{ObjectKey, Result};
use std::sync::Arc;
use tracing::{debug, error};

pub struct ReconcileLoop {
    store: Arc<dyn KitStore>,
    actions: ActionList,
}

impl ReconcileLoop {
    pub fn new(store: Arc<dyn KitStore>, actions: ActionList) -> Self {
        Self { store, actions }
    }

    pub fn action_names(&self) -> Vec<&'static str> {
        self.actions.names()
    }

    /// Fetch the kit behind `key` and run one action on it.
    ///
    /// A kit that no longer exists is not an error. Returns the name of the
    /// action that ran.
    pub async fn reconcile(
        &self,
        key: &ObjectKey,
        cancel: &CancellationToken,
    ) -> Result<Option<&'static str>> {
        let Some(kit) = cancellable(cancel, self.store.get(key)).await? else {
            debug!(kit = %key, "IntegrationKit not found, nothing to do");
            return Ok(None);
        };
        self.handle(&kit, cancel).await
    }

    /// Run the first applicable action on an already fetched kit.
    pub async fn handle(
        &self,
        kit: &IntegrationKit,
        cancel: &CancellationToken,
    ) -> Result<Option<&'static str>> {
        let key = ObjectKey::of(kit);
        let Some(action) = self.actions.select(kit) else {
            debug!(kit = %key, phase = %kit.phase(), "No action applies");
            return Ok(None);
        };

        debug!(kit = %key, action = action.name(), "Invoking action");

        let ctx = ActionContext::new(self.store.clone(), cancel.clone());
        if let Err(e) = action.handle(&ctx, kit).await {
            error!(kit = %key, action = action.name(), error = %e, "Action failed");
            return Err(e);
        }
        Ok(Some(action.name()))
    }
}
