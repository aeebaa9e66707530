// Netdash is open-source under the Apache License 2.0; see LICENSE for usage and contributions.
// Dashboard state mounts one poller per selected metric and ties the services together.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use uuid::Uuid;

use crate::agent::AgentClient;
use crate::catalog::MetricCatalog;
use crate::error::AppResult;
use crate::poller::{CardState, MetricPoller, PollTarget, PollerSettings, PollerTask};
use crate::registry::InstanceRegistry;
use crate::repository::RepositoryBundle;

/// What the dashboard wants on screen for one selected metric.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CardSpec {
    pub metric_id: Uuid,
    pub metric_name: String,
    pub instance_id: Uuid,
    pub instance_name: String,
    pub instance_url: String,
}

impl CardSpec {
    fn target(&self) -> PollTarget {
        PollTarget {
            metric: self.metric_name.clone(),
            instance_url: self.instance_url.clone(),
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct CardSnapshot {
    pub metric_id: Uuid,
    pub metric_name: String,
    pub instance_id: Uuid,
    pub instance_name: String,
    pub instance_url: String,
    pub refresh_interval_secs: u64,
    #[serde(flatten)]
    pub state: CardState,
    pub y_domain: [f64; 2],
}

struct MountedCard {
    spec: CardSpec,
    interval: Duration,
    task: PollerTask,
}

impl MountedCard {
    fn same_identity(&self, spec: &CardSpec, interval: Duration) -> bool {
        self.interval == interval
            && self.spec.metric_name == spec.metric_name
            && self.spec.instance_url == spec.instance_url
    }
}

struct DashboardInner {
    agent: AgentClient,
    settings: RwLock<PollerSettings>,
    cards: Mutex<HashMap<Uuid, MountedCard>>,
}

#[derive(Clone)]
pub struct DashboardHandle {
    inner: Arc<DashboardInner>,
}

impl DashboardHandle {
    pub fn new(agent: AgentClient, settings: PollerSettings) -> Self {
        Self {
            inner: Arc::new(DashboardInner {
                agent,
                settings: RwLock::new(settings),
                cards: Mutex::new(HashMap::new()),
            }),
        }
    }

    pub fn settings(&self) -> PollerSettings {
        self.inner.settings.read().clone()
    }

    /// Changes the refresh interval; every mounted card restarts with a fresh series.
    pub fn set_interval(&self, interval: Duration) {
        self.inner.settings.write().interval = interval;
        let specs: Vec<CardSpec> = {
            let cards = self.inner.cards.lock();
            cards.values().map(|card| card.spec.clone()).collect()
        };
        self.sync(&specs);
        tracing::info!(interval_secs = interval.as_secs(), "dashboard refresh interval changed");
    }

    /// Reconciles mounted cards with `specs`: unknown cards start, missing ones stop,
    /// cards whose metric, instance url or interval changed restart from scratch.
    pub fn sync(&self, specs: &[CardSpec]) {
        let settings = self.settings();
        let mut cards = self.inner.cards.lock();

        cards.retain(|metric_id, card| {
            let keep = specs.iter().any(|spec| {
                spec.metric_id == *metric_id && card.same_identity(spec, settings.interval)
            });
            if !keep {
                tracing::info!(metric = %card.spec.metric_name, "card unmounted");
            }
            keep
        });

        for spec in specs {
            match cards.get_mut(&spec.metric_id) {
                Some(card) => card.spec = spec.clone(),
                None => {
                    let poller = MetricPoller::new(
                        self.inner.agent.clone(),
                        spec.target(),
                        settings.clone(),
                    );
                    tracing::info!(
                        metric = %spec.metric_name,
                        instance_id = %spec.instance_id,
                        "card mounted"
                    );
                    cards.insert(
                        spec.metric_id,
                        MountedCard {
                            spec: spec.clone(),
                            interval: settings.interval,
                            task: poller.spawn(),
                        },
                    );
                }
            }
        }
    }

    /// Card views in the order of `specs`; specs that are not mounted are skipped.
    pub fn snapshots(&self, specs: &[CardSpec]) -> Vec<CardSnapshot> {
        let cards = self.inner.cards.lock();
        specs
            .iter()
            .filter_map(|spec| cards.get(&spec.metric_id))
            .map(|card| {
                let state = card.task.snapshot();
                let y_domain = state.y_domain();
                CardSnapshot {
                    metric_id: card.spec.metric_id,
                    metric_name: card.spec.metric_name.clone(),
                    instance_id: card.spec.instance_id,
                    instance_name: card.spec.instance_name.clone(),
                    instance_url: card.spec.instance_url.clone(),
                    refresh_interval_secs: card.interval.as_secs(),
                    state,
                    y_domain,
                }
            })
            .collect()
    }

    pub fn mounted(&self) -> usize {
        self.inner.cards.lock().len()
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct RefreshOutcome {
    pub instance_id: Uuid,
    pub instance_name: String,
    pub metrics: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Clone)]
pub struct AppContext {
    pub repos: RepositoryBundle,
    pub registry: InstanceRegistry,
    pub catalog: MetricCatalog,
    pub dashboard: DashboardHandle,
    /// Set when the configured database could not be opened.
    pub storage_error: Option<String>,
}

impl AppContext {
    pub fn new(
        repos: RepositoryBundle,
        agent: AgentClient,
        settings: PollerSettings,
        storage_error: Option<String>,
    ) -> Self {
        let registry = InstanceRegistry::new(repos.instances.clone(), agent.clone());
        let catalog = MetricCatalog::new(repos.metrics.clone(), agent.clone());
        let dashboard = DashboardHandle::new(agent, settings);
        Self {
            repos,
            registry,
            catalog,
            dashboard,
            storage_error,
        }
    }

    /// Selected metrics joined with their instances, in catalog order.
    pub async fn card_specs(&self) -> AppResult<Vec<CardSpec>> {
        let instances = self.registry.list().await?;
        let selected = self.catalog.selected().await?;

        Ok(selected
            .into_iter()
            .filter_map(|metric| {
                let instance = instances.iter().find(|i| i.id == metric.instance_id)?;
                Some(CardSpec {
                    metric_id: metric.id,
                    metric_name: metric.name,
                    instance_id: instance.id,
                    instance_name: instance.name.clone(),
                    instance_url: instance.url.clone(),
                })
            })
            .collect())
    }

    pub async fn refresh_dashboard(&self) -> AppResult<Vec<CardSpec>> {
        let specs = self.card_specs().await?;
        self.dashboard.sync(&specs);
        Ok(specs)
    }

    /// Deletes an instance together with its metrics and unmounts their cards.
    pub async fn remove_instance(&self, id: Uuid) -> AppResult<bool> {
        // instance first: later catalog writes for it are refused
        let removed = self.registry.remove(id).await?;
        let removed_metrics = self.catalog.remove_for_instance(id).await?;
        if removed {
            tracing::info!(instance_id = %id, removed_metrics, "instance metrics removed");
        }
        self.refresh_dashboard().await?;
        Ok(removed)
    }

    /// Re-fetches every instance's catalog; one failing agent does not stop the rest.
    pub async fn refresh_all_catalogs(&self) -> AppResult<Vec<RefreshOutcome>> {
        let instances = self.registry.list().await?;
        let mut outcomes = Vec::with_capacity(instances.len());

        for instance in instances {
            let outcome = match self.catalog.fetch_list(&instance).await {
                Ok(metrics) => RefreshOutcome {
                    instance_id: instance.id,
                    instance_name: instance.name.clone(),
                    metrics: metrics.len(),
                    error: None,
                },
                Err(err) => {
                    tracing::warn!(instance_id = %instance.id, error = %err, "catalog refresh failed");
                    RefreshOutcome {
                        instance_id: instance.id,
                        instance_name: instance.name.clone(),
                        metrics: 0,
                        error: Some(err.to_string()),
                    }
                }
            };
            outcomes.push(outcome);
        }

        self.refresh_dashboard().await?;
        Ok(outcomes)
    }
}
