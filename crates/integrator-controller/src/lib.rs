//! Kit reconciliation for the integration operator.
//!
//! Drives `IntegrationKit` resources through their build phases. Each phase
//! is guarded by an [`Action`]; the [`ReconcileLoop`] picks the first action
//! that can handle the kit and runs it.

pub mod action;
pub mod build;
pub mod initialize;
pub mod monitor;
pub mod reconcile;

#[cfg(test)]
pub(crate) mod testing;

pub use action::{Action, ActionContext, ActionList};
pub use build::{BuildMonitorAction, BuildSubmitAction};
pub use initialize::{InitializeAction, RuntimeSelection};
pub use monitor::MonitorAction;
pub use reconcile::ReconcileLoop;
