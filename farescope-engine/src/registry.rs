use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::info;

use farescope_core::{AdapterHealth, SearchAdapter};

/// Holds one capability-uniform search adapter per external source plus its
/// last known health snapshot. Lookup only; no retrying happens here.
pub struct AdapterRegistry {
    adapters: RwLock<HashMap<String, Arc<dyn SearchAdapter>>>,
    health: RwLock<HashMap<String, AdapterHealth>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self {
            adapters: RwLock::new(HashMap::new()),
            health: RwLock::new(HashMap::new()),
        }
    }

    pub async fn register(&self, adapter: Arc<dyn SearchAdapter>) {
        let id = adapter.id().to_string();
        info!("Registered search source: {}", id);
        self.adapters.write().await.insert(id, adapter);
    }

    pub async fn deregister(&self, source: &str) -> bool {
        self.health.write().await.remove(source);
        self.adapters.write().await.remove(source).is_some()
    }

    /// Registered source ids, sorted for deterministic dispatch order
    pub async fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.adapters.read().await.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub async fn get(&self, source: &str) -> Option<Arc<dyn SearchAdapter>> {
        self.adapters.read().await.get(source).cloned()
    }

    /// Resolve the requested source set; None means all registered sources.
    /// The resolved set must be non-empty and fully known.
    pub async fn resolve(&self, requested: Option<&[String]>) -> Result<Vec<String>, RegistryError> {
        let known = self.adapters.read().await;
        match requested {
            None => {
                if known.is_empty() {
                    return Err(RegistryError::Empty);
                }
                let mut ids: Vec<String> = known.keys().cloned().collect();
                ids.sort();
                Ok(ids)
            }
            Some(list) => {
                if list.is_empty() {
                    return Err(RegistryError::Empty);
                }
                let mut resolved = Vec::with_capacity(list.len());
                for source in list {
                    if !known.contains_key(source) {
                        return Err(RegistryError::UnknownSource(source.clone()));
                    }
                    if !resolved.contains(source) {
                        resolved.push(source.clone());
                    }
                }
                Ok(resolved)
            }
        }
    }

    /// Probe every adapter and store the fresh snapshots
    pub async fn refresh_health(&self) -> Vec<AdapterHealth> {
        let adapters: Vec<Arc<dyn SearchAdapter>> =
            self.adapters.read().await.values().cloned().collect();

        let mut snapshots = Vec::with_capacity(adapters.len());
        for adapter in adapters {
            snapshots.push(adapter.health_check().await);
        }
        snapshots.sort_by(|a, b| a.source.cmp(&b.source));

        let mut health = self.health.write().await;
        for snapshot in &snapshots {
            health.insert(snapshot.source.clone(), snapshot.clone());
        }
        snapshots
    }

    /// Last known health without probing
    pub async fn health_snapshot(&self) -> Vec<AdapterHealth> {
        let mut snapshots: Vec<AdapterHealth> =
            self.health.read().await.values().cloned().collect();
        snapshots.sort_by(|a, b| a.source.cmp(&b.source));
        snapshots
    }
}

impl Default for AdapterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("No search sources registered")]
    Empty,

    #[error("Unknown search source: {0}")]
    UnknownSource(String),
}
