//! Persistence boundary for kits.

use crate::kit::IntegrationKit;
use crate::{Error, ObjectKey, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use tokio::sync::RwLock;

/// Object store holding kits, with optimistic concurrency on status writes.
#[async_trait]
pub trait KitStore: Send + Sync {
    /// Fetch a kit. A missing kit is `Ok(None)`.
    async fn get(&self, key: &ObjectKey) -> Result<Option<IntegrationKit>>;

    /// Write the status subresource of `kit`.
    ///
    /// Fails with [`Error::Conflict`] when the stored object has moved past
    /// the `resourceVersion` carried by `kit`.
    async fn update_status(&self, kit: &IntegrationKit) -> Result<IntegrationKit>;
}

/// In-process store used by tests and local dry runs.
#[derive(Default)]
pub struct MemoryKitStore {
    kits: RwLock<HashMap<ObjectKey, IntegrationKit>>,
    version: AtomicU64,
    status_updates: AtomicUsize,
}

impl MemoryKitStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create or replace a kit as an external writer would, assigning a new
    /// resource version.
    pub async fn put(&self, mut kit: IntegrationKit) -> IntegrationKit {
        kit.metadata.resource_version = Some(self.next_version());
        self.kits
            .write()
            .await
            .insert(ObjectKey::of(&kit), kit.clone());
        kit
    }

    /// Number of successful status writes so far.
    pub fn status_updates(&self) -> usize {
        self.status_updates.load(Ordering::SeqCst)
    }

    fn next_version(&self) -> String {
        (self.version.fetch_add(1, Ordering::SeqCst) + 1).to_string()
    }
}

#[async_trait]
impl KitStore for MemoryKitStore {
    async fn get(&self, key: &ObjectKey) -> Result<Option<IntegrationKit>> {
        Ok(self.kits.read().await.get(key).cloned())
    }

    async fn update_status(&self, kit: &IntegrationKit) -> Result<IntegrationKit> {
        let key = ObjectKey::of(kit);
        let mut kits = self.kits.write().await;
        let stored = kits
            .get_mut(&key)
            .ok_or_else(|| Error::NotFound(format!("IntegrationKit {key}")))?;

        if stored.metadata.resource_version != kit.metadata.resource_version {
            return Err(Error::Conflict(format!(
                "IntegrationKit {key} has been modified (stored version {:?}, write based on {:?})",
                stored.metadata.resource_version, kit.metadata.resource_version
            )));
        }

        stored.status = kit.status.clone();
        stored.metadata.resource_version = Some(self.next_version());
        self.status_updates.fetch_add(1, Ordering::SeqCst);
        Ok(stored.clone())
    }
}
