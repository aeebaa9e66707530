// Netdash is open-source under the Apache License 2.0; see LICENSE for usage and contributions.
// Simple in-memory repositories used when no database is configured and in tests.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::instance::Instance;
use crate::domain::metric::Metric;

use super::{InstanceRepository, MetricRepository};

#[derive(Default)]
pub struct InMemoryInstanceRepository {
    inner: Arc<RwLock<Vec<Instance>>>,
}

impl InMemoryInstanceRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl InstanceRepository for InMemoryInstanceRepository {
    async fn list(&self) -> Result<Vec<Instance>> {
        Ok(self.inner.read().await.clone())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Instance>> {
        let guard = self.inner.read().await;
        Ok(guard.iter().find(|instance| instance.id == id).cloned())
    }

    async fn insert(&self, instance: Instance) -> Result<()> {
        self.inner.write().await.push(instance);
        Ok(())
    }

    async fn update(&self, instance: Instance) -> Result<bool> {
        let mut guard = self.inner.write().await;
        match guard.iter_mut().find(|existing| existing.id == instance.id) {
            Some(slot) => {
                *slot = instance;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        let mut guard = self.inner.write().await;
        let before = guard.len();
        guard.retain(|instance| instance.id != id);
        Ok(guard.len() != before)
    }

    async fn health_check(&self) -> Result<()> {
        Ok(())
    }
}

/// Metrics tied to the instances of one `InMemoryInstanceRepository`.
pub struct InMemoryMetricRepository {
    instances: Arc<RwLock<Vec<Instance>>>,
    inner: RwLock<Vec<Metric>>,
}

impl InMemoryMetricRepository {
    pub fn new(instances: &InMemoryInstanceRepository) -> Self {
        Self {
            instances: Arc::clone(&instances.inner),
            inner: RwLock::default(),
        }
    }
}

#[async_trait]
impl MetricRepository for InMemoryMetricRepository {
    async fn list(&self) -> Result<Vec<Metric>> {
        Ok(self.inner.read().await.clone())
    }

    async fn list_for_instance(&self, instance_id: Uuid) -> Result<Vec<Metric>> {
        let guard = self.inner.read().await;
        Ok(guard
            .iter()
            .filter(|metric| metric.instance_id == instance_id)
            .cloned()
            .collect())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Metric>> {
        let guard = self.inner.read().await;
        Ok(guard.iter().find(|metric| metric.id == id).cloned())
    }

    async fn replace_for_instance(
        &self,
        instance_id: Uuid,
        metrics: Vec<Metric>,
    ) -> Result<bool> {
        // instances stay read-locked until the metrics are written
        let instances = self.instances.read().await;
        if !instances.iter().any(|instance| instance.id == instance_id) {
            return Ok(false);
        }

        let mut guard = self.inner.write().await;
        guard.retain(|metric| metric.instance_id != instance_id);
        guard.extend(
            metrics
                .into_iter()
                .map(|metric| Metric { instance_id, ..metric }),
        );
        Ok(true)
    }

    async fn toggle_selected(&self, id: Uuid) -> Result<Option<Metric>> {
        let mut guard = self.inner.write().await;
        Ok(guard.iter_mut().find(|metric| metric.id == id).map(|metric| {
            metric.selected = !metric.selected;
            metric.clone()
        }))
    }

    async fn select_only(&self, ids: &[Uuid]) -> Result<()> {
        let mut guard = self.inner.write().await;
        for metric in guard.iter_mut() {
            metric.selected = ids.contains(&metric.id);
        }
        Ok(())
    }

    async fn delete_for_instance(&self, instance_id: Uuid) -> Result<usize> {
        let mut guard = self.inner.write().await;
        let before = guard.len();
        guard.retain(|metric| metric.instance_id != instance_id);
        Ok(before - guard.len())
    }
}
