//! Fakes shared by the action tests.

use async_trait::async_trait;
use chrono::Utc;
use integrator_core::build::{BuildOutcome, BuildPipeline};
use integrator_core::digest::compute_for_kit;
use integrator_core::kit::{
    ConfigurationSpec, Failure, FailureRecovery, IntegrationKit, IntegrationKitSpec, KitPhase,
};
use integrator_core::{Error, Result};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Build pipeline that reports a fixed outcome.
pub struct ScriptedPipeline {
    outcome: Mutex<BuildOutcome>,
    submissions: AtomicUsize,
    fail_submit: bool,
}

impl Default for ScriptedPipeline {
    fn default() -> Self {
        Self::reporting(BuildOutcome::Running)
    }
}

impl ScriptedPipeline {
    pub fn reporting(outcome: BuildOutcome) -> Self {
        Self {
            outcome: Mutex::new(outcome),
            submissions: AtomicUsize::new(0),
            fail_submit: false,
        }
    }

    pub fn failing_submit() -> Self {
        Self {
            fail_submit: true,
            ..Self::default()
        }
    }

    pub fn set_outcome(&self, outcome: BuildOutcome) {
        *self.outcome.lock().unwrap() = outcome;
    }

    pub fn submissions(&self) -> usize {
        self.submissions.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BuildPipeline for ScriptedPipeline {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn submit(&self, _kit: &IntegrationKit) -> Result<()> {
        if self.fail_submit {
            return Err(Error::Internal("build backend unavailable".to_string()));
        }
        self.submissions.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn observe(&self, _kit: &IntegrationKit) -> Result<BuildOutcome> {
        Ok(self.outcome.lock().unwrap().clone())
    }
}

/// A kit whose stored digest matches its spec.
pub fn kit_in_phase(phase: KitPhase) -> IntegrationKit {
    let mut kit = IntegrationKit::new(
        "kit-1",
        IntegrationKitSpec {
            image: "quay.io/runtime:1.0".to_string(),
            dependencies: vec!["camel:http".to_string()],
            configuration: vec![ConfigurationSpec::new("property", "a=b")],
            ..Default::default()
        },
    );
    kit.metadata.namespace = Some("camel".to_string());

    let digest = compute_for_kit(&kit);
    let status = kit.status_mut();
    status.phase = phase;
    if phase != KitPhase::None {
        status.digest = digest;
    }
    if phase == KitPhase::Error {
        status.failure = Some(Failure {
            reason: "build failed".to_string(),
            time: Utc::now(),
            recovery: FailureRecovery::default(),
        });
    }
    kit
}
