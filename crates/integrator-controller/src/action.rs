//! The action contract and the ordered action list.

use crate::build::{BuildMonitorAction, BuildSubmitAction};
use crate::initialize::{InitializeAction, RuntimeSelection};
use crate::monitor::MonitorAction;
use async_trait::async_trait;
use integrator_core::Result;
use integrator_core::build::BuildPipeline;
use integrator_core::cancel::{CancellationToken, cancellable};
use integrator_core::kit::IntegrationKit;
use integrator_core::store::KitStore;
use std::sync::Arc;

/// What an action may touch while handling a kit.
#[derive(Clone)]
pub struct ActionContext {
    pub store: Arc<dyn KitStore>,
    pub cancel: CancellationToken,
}

impl ActionContext {
    pub fn new(store: Arc<dyn KitStore>, cancel: CancellationToken) -> Self {
        Self { store, cancel }
    }

    /// Single status write, aborted on cancellation.
    pub async fn update_status(&self, kit: &IntegrationKit) -> Result<IntegrationKit> {
        cancellable(&self.cancel, self.store.update_status(kit)).await
    }
}

/// A phase-scoped handler.
///
/// `handle` must be idempotent: it can be replayed after a partial failure
/// or on a periodic resync with nothing changed. A successful `handle`
/// issues at most one status update, after all of its own steps succeeded.
#[async_trait]
pub trait Action: Send + Sync {
    fn name(&self) -> &'static str;

    fn can_handle(&self, kit: &IntegrationKit) -> bool;

    async fn handle(&self, ctx: &ActionContext, kit: &IntegrationKit) -> Result<()>;
}

/// Actions in selection order.
pub struct ActionList {
    actions: Vec<Box<dyn Action>>,
}

impl ActionList {
    pub fn new(actions: Vec<Box<dyn Action>>) -> Self {
        Self { actions }
    }

    /// The kit lifecycle: initialize, submit, watch the build, then monitor
    /// for spec drift.
    pub fn standard(pipeline: Arc<dyn BuildPipeline>, runtime: RuntimeSelection) -> Self {
        Self::new(vec![
            Box::new(InitializeAction::new(runtime)),
            Box::new(BuildSubmitAction::new(pipeline.clone())),
            Box::new(BuildMonitorAction::new(pipeline)),
            Box::new(MonitorAction::new()),
        ])
    }

    /// First action able to handle `kit`.
    pub fn select(&self, kit: &IntegrationKit) -> Option<&dyn Action> {
        self.actions
            .iter()
            .find(|a| a.can_handle(kit))
            .map(|a| a.as_ref())
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.actions.iter().map(|a| a.name()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ScriptedPipeline, kit_in_phase};
    use integrator_core::kit::KitPhase;

    #[test]
    fn test_standard_order() {
        let list = ActionList::standard(
            Arc::new(ScriptedPipeline::default()),
            RuntimeSelection::default(),
        );
        assert_eq!(
            list.names(),
            vec!["initialize", "build-submit", "build-monitor", "monitor"]
        );
    }

    #[test]
    fn test_exactly_one_action_per_phase() {
        let list = ActionList::standard(
            Arc::new(ScriptedPipeline::default()),
            RuntimeSelection::default(),
        );
        let expected = [
            (KitPhase::None, "initialize"),
            (KitPhase::BuildSubmitted, "build-submit"),
            (KitPhase::BuildRunning, "build-monitor"),
            (KitPhase::Ready, "monitor"),
            (KitPhase::Error, "monitor"),
        ];
        for (phase, name) in expected {
            let kit = kit_in_phase(phase);
            let applicable: Vec<_> = list
                .actions
                .iter()
                .filter(|a| a.can_handle(&kit))
                .map(|a| a.name())
                .collect();
            assert_eq!(applicable, vec![name], "phase {phase:?}");
        }
    }

    #[test]
    fn test_select_none_when_nothing_applies() {
        let list = ActionList::new(vec![Box::new(MonitorAction::new())]);
        assert!(list.select(&kit_in_phase(KitPhase::BuildRunning)).is_none());
    }
}
