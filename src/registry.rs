// Netdash is open-source under the Apache License 2.0; see LICENSE for usage and contributions.
// Instance registry: CRUD over registered agents plus the reachability probe.

use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::agent::AgentClient;
use crate::domain::instance::{normalize_url, Instance, InstancePatch};
use crate::error::{AppError, AppResult};
use crate::repository::InstanceRepositoryHandle;

#[derive(Debug, Clone, Serialize)]
pub struct ConnectionTest {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub info: Option<Value>,
}

#[derive(Clone)]
pub struct InstanceRegistry {
    repo: InstanceRepositoryHandle,
    agent: AgentClient,
}

impl InstanceRegistry {
    pub fn new(repo: InstanceRepositoryHandle, agent: AgentClient) -> Self {
        Self { repo, agent }
    }

    pub async fn list(&self) -> AppResult<Vec<Instance>> {
        Ok(self.repo.list().await?)
    }

    pub async fn get(&self, id: Uuid) -> AppResult<Instance> {
        self.repo
            .get(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("instance {id}")))
    }

    /// Rejects a registration with a blank name or url.
    pub fn validate_new(name: &str, url: &str) -> AppResult<()> {
        if name.trim().is_empty() || url.trim().is_empty() {
            return Err(AppError::Validation(
                "Please provide both a name and URL.".into(),
            ));
        }
        Ok(())
    }

    pub async fn add(&self, name: &str, url: &str) -> AppResult<Instance> {
        Self::validate_new(name, url)?;

        let instance = Instance::new(name.trim(), url);
        self.repo.insert(instance.clone()).await?;
        tracing::info!(instance_id = %instance.id, url = %instance.url, "instance added");
        Ok(instance)
    }

    pub async fn remove(&self, id: Uuid) -> AppResult<bool> {
        let removed = self.repo.delete(id).await?;
        if removed {
            tracing::info!(instance_id = %id, "instance removed");
        }
        Ok(removed)
    }

    pub async fn update(&self, id: Uuid, patch: InstancePatch) -> AppResult<Instance> {
        if patch.name.as_deref().is_some_and(|name| name.trim().is_empty())
            || patch.url.as_deref().is_some_and(|url| url.trim().is_empty())
        {
            return Err(AppError::Validation("name and url cannot be empty".into()));
        }

        let mut instance = self.get(id).await?;
        instance.apply(patch);
        if !self.repo.update(instance.clone()).await? {
            return Err(AppError::NotFound(format!("instance {id}")));
        }
        Ok(instance)
    }

    /// Probes `{url}/api/v1/info`. Never touches the registry.
    pub async fn test_connection(&self, url: &str) -> ConnectionTest {
        let url = normalize_url(url);
        match self.agent.info(&url).await {
            Ok(info) => ConnectionTest {
                success: true,
                error: None,
                info: Some(info),
            },
            Err(err) => {
                tracing::warn!(%url, error = %err, "connection test failed");
                ConnectionTest {
                    success: false,
                    error: Some(err.to_string()),
                    info: None,
                }
            }
        }
    }
}
