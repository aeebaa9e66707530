// Netdash is open-source under the Apache License 2.0; see LICENSE for usage and contributions.
// Repository abstractions provide persistence interfaces decoupled from storage backends.

pub mod in_memory;
pub mod sqlite;

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::instance::Instance;
use crate::domain::metric::Metric;

/// Registered instances, listed in insertion order.
#[async_trait]
pub trait InstanceRepository: Send + Sync {
    async fn list(&self) -> Result<Vec<Instance>>;

    async fn get(&self, id: Uuid) -> Result<Option<Instance>>;

    async fn insert(&self, instance: Instance) -> Result<()>;

    /// Returns `false` when no instance has `instance.id`.
    async fn update(&self, instance: Instance) -> Result<bool>;

    async fn delete(&self, id: Uuid) -> Result<bool>;

    async fn health_check(&self) -> Result<()>;
}

#[async_trait]
pub trait MetricRepository: Send + Sync {
    async fn list(&self) -> Result<Vec<Metric>>;

    async fn list_for_instance(&self, instance_id: Uuid) -> Result<Vec<Metric>>;

    async fn get(&self, id: Uuid) -> Result<Option<Metric>>;

    /// Swaps the whole metric list of one instance, leaving every other instance alone.
    /// Returns `false` without writing when the instance is no longer registered.
    async fn replace_for_instance(&self, instance_id: Uuid, metrics: Vec<Metric>)
        -> Result<bool>;

    /// Flips `selected` in one step and returns the updated metric.
    async fn toggle_selected(&self, id: Uuid) -> Result<Option<Metric>>;

    /// Marks exactly the metrics in `ids` as selected, across all instances.
    async fn select_only(&self, ids: &[Uuid]) -> Result<()>;

    async fn delete_for_instance(&self, instance_id: Uuid) -> Result<usize>;
}

pub type InstanceRepositoryHandle = Arc<dyn InstanceRepository>;
pub type MetricRepositoryHandle = Arc<dyn MetricRepository>;

#[derive(Clone)]
pub struct RepositoryBundle {
    pub instances: InstanceRepositoryHandle,
    pub metrics: MetricRepositoryHandle,
    pub backend: &'static str,
}

impl RepositoryBundle {
    pub fn new(
        instances: InstanceRepositoryHandle,
        metrics: MetricRepositoryHandle,
        backend: &'static str,
    ) -> Self {
        Self {
            instances,
            metrics,
            backend,
        }
    }

    pub fn in_memory() -> Self {
        let instances = in_memory::InMemoryInstanceRepository::new();
        let metrics = in_memory::InMemoryMetricRepository::new(&instances);
        Self::new(Arc::new(instances), Arc::new(metrics), "memory")
    }

    pub async fn sqlite(database_url: &str) -> Result<Self> {
        let store = sqlite::SqliteStore::connect(database_url).await?;
        Ok(Self::new(
            Arc::new(store.clone()),
            Arc::new(store),
            "sqlite",
        ))
    }

    /// Opens the configured store; any failure degrades to in-memory storage and is
    /// returned alongside so the UI can show it.
    pub async fn open(database_url: Option<&str>) -> (Self, Option<String>) {
        let Some(url) = database_url else {
            return (Self::in_memory(), None);
        };

        match Self::sqlite(url).await {
            Ok(bundle) => (bundle, None),
            Err(err) => {
                let message = format!("Failed to initialize database: {err:#}");
                tracing::error!(error = %message, "falling back to in-memory storage");
                (Self::in_memory(), Some(message))
            }
        }
    }
}
