// Netdash is open-source under the Apache License 2.0; see LICENSE for usage and contributions.
// Metric catalog: per-instance chart lists and the selection that drives the dashboard.

use uuid::Uuid;

use crate::agent::AgentClient;
use crate::domain::instance::Instance;
use crate::domain::metric::{merge_fetched, Metric};
use crate::error::{AppError, AppResult};
use crate::repository::MetricRepositoryHandle;

#[derive(Clone)]
pub struct MetricCatalog {
    repo: MetricRepositoryHandle,
    agent: AgentClient,
}

impl MetricCatalog {
    pub fn new(repo: MetricRepositoryHandle, agent: AgentClient) -> Self {
        Self { repo, agent }
    }

    /// Re-reads the instance's charts and merges them into its stored list.
    pub async fn fetch_list(&self, instance: &Instance) -> AppResult<Vec<Metric>> {
        let catalog = self.agent.charts(&instance.url).await?;
        let existing = self.repo.list_for_instance(instance.id).await?;
        let merged = merge_fetched(&existing, instance.id, catalog.charts.into_keys());

        if !self
            .repo
            .replace_for_instance(instance.id, merged.clone())
            .await?
        {
            return Err(AppError::NotFound(format!("instance {}", instance.id)));
        }
        tracing::info!(
            instance_id = %instance.id,
            metrics = merged.len(),
            "metric catalog refreshed"
        );
        Ok(merged)
    }

    pub async fn all(&self) -> AppResult<Vec<Metric>> {
        Ok(self.repo.list().await?)
    }

    pub async fn for_instance(&self, instance_id: Uuid) -> AppResult<Vec<Metric>> {
        Ok(self.repo.list_for_instance(instance_id).await?)
    }

    pub async fn selected(&self) -> AppResult<Vec<Metric>> {
        let metrics = self.repo.list().await?;
        Ok(metrics.into_iter().filter(|metric| metric.selected).collect())
    }

    pub async fn toggle(&self, metric_id: Uuid) -> AppResult<Metric> {
        self.repo
            .toggle_selected(metric_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("metric {metric_id}")))
    }

    /// Selects exactly `ids` across every instance.
    pub async fn select_many(&self, ids: &[Uuid]) -> AppResult<()> {
        self.repo.select_only(ids).await?;
        Ok(())
    }

    pub async fn filter_by_keyword(
        &self,
        instance_id: Uuid,
        keyword: &str,
    ) -> AppResult<Vec<Metric>> {
        let metrics = self.repo.list_for_instance(instance_id).await?;
        Ok(metrics
            .into_iter()
            .filter(|metric| metric.matches_keyword(keyword))
            .collect())
    }

    pub async fn remove_for_instance(&self, instance_id: Uuid) -> AppResult<usize> {
        Ok(self.repo.delete_for_instance(instance_id).await?)
    }
}
