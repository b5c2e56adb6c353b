//! In-memory cache of safe zones for the classifier.

use std::sync::Arc;

use groundwatch_core::alert::Geofence;
use groundwatch_db::models::safe_zone::SafeZone;
use groundwatch_db::{DetectionStore, StoreError};
use tokio::sync::RwLock;

/// Current set of safe zones, loaded from the store at startup and extended
/// as zones are created. Readers get a cheap `Arc` snapshot.
#[derive(Default)]
pub struct ZoneRegistry {
    zones: RwLock<Arc<Vec<Geofence>>>,
}

impl ZoneRegistry {
    pub fn new(zones: Vec<Geofence>) -> Self {
        Self {
            zones: RwLock::new(Arc::new(zones)),
        }
    }

    /// Build the registry from every zone in the store.
    pub async fn load(store: &dyn DetectionStore) -> Result<Self, StoreError> {
        let zones = store.list_safe_zones().await?;
        tracing::info!(count = zones.len(), "Loaded safe zones");
        Ok(Self::new(zones.iter().map(SafeZone::geofence).collect()))
    }

    pub async fn current(&self) -> Arc<Vec<Geofence>> {
        Arc::clone(&*self.zones.read().await)
    }

    pub async fn add(&self, zone: Geofence) {
        let mut guard = self.zones.write().await;
        let mut next = guard.as_ref().clone();
        next.push(zone);
        *guard = Arc::new(next);
    }

    pub async fn len(&self) -> usize {
        self.zones.read().await.len()
    }
}
