//! Build pipeline boundary.
//!
//! The image build itself happens elsewhere. The operator only triggers it
//! and reads back its completion signal.

use crate::Result;
use crate::kit::{Artifact, IntegrationKit};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// What the pipeline reports for the current build of a kit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BuildOutcome {
    /// Submitted but not started yet.
    Pending,
    Running,
    Succeeded(BuildOutput),
    Failed { reason: String },
}

/// Result of a successful build.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BuildOutput {
    pub image: String,
    pub public_image: String,
    pub base_image: String,
    pub artifacts: Vec<Artifact>,
    pub runtime_version: Option<String>,
}

#[async_trait]
pub trait BuildPipeline: Send + Sync {
    /// Name of this pipeline backend.
    fn name(&self) -> &'static str;

    /// Start a build for the kit's current digest. Submitting the same
    /// digest twice must not start a second build.
    async fn submit(&self, kit: &IntegrationKit) -> Result<()>;

    /// Observe the build for the kit's current digest.
    async fn observe(&self, kit: &IntegrationKit) -> Result<BuildOutcome>;
}

/// Name of the build resource for a kit at its current digest.
pub fn build_name(kit: &IntegrationKit) -> String {
    let name = kit.metadata.name.as_deref().unwrap_or("kit");
    let digest = kit.digest().trim_start_matches('v');
    let suffix: String = digest.chars().take(10).collect();
    if suffix.is_empty() {
        name.to_string()
    } else {
        format!("{name}-{suffix}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kit::IntegrationKitSpec;

    #[test]
    fn test_build_name_tracks_digest() {
        let mut kit = IntegrationKit::new("kit-1", IntegrationKitSpec::default());
        assert_eq!(build_name(&kit), "kit-1");
        kit.status_mut().digest = "v0123456789abcdef".to_string();
        assert_eq!(build_name(&kit), "kit-1-0123456789");
    }
}
