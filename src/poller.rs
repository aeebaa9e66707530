// Netdash is open-source under the Apache License 2.0; see LICENSE for usage and contributions.
// Live series for one (metric, instance) pair, extended by incremental time-window polls.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::agent::{AgentClient, AgentError, DataQuery, DataRow};
use crate::domain::sample::{y_domain, SamplePoint};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PollerSettings {
    pub interval: Duration,
    /// Evenly spaced samples requested per poll.
    pub points: u32,
    /// Window length used before the first sample arrives.
    pub bootstrap_window_secs: i64,
    /// Row column charted; 0 is the timestamp, 1.. are dimensions.
    pub dimension_index: usize,
}

impl Default for PollerSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(10),
            points: 30,
            bootstrap_window_secs: 300,
            dimension_index: 2,
        }
    }
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct CardState {
    pub series: Vec<SamplePoint>,
    /// Unix seconds of the newest row received.
    pub last_sample_time: Option<i64>,
    pub units: String,
    pub last_updated: Option<DateTime<Utc>>,
    pub is_loading: bool,
    pub error: Option<String>,
}

impl CardState {
    pub fn query_for(&self, chart: &str, now_secs: i64, settings: &PollerSettings) -> DataQuery {
        let after = self
            .last_sample_time
            .unwrap_or(now_secs - settings.bootstrap_window_secs);
        DataQuery {
            chart: chart.to_string(),
            after,
            before: now_secs,
            points: settings.points,
        }
    }

    /// Appends every row as a sample and advances the cursor; returns how many were added.
    pub fn apply_rows(
        &mut self,
        rows: &[DataRow],
        dimension_index: usize,
        now: DateTime<Utc>,
    ) -> usize {
        self.series.extend(rows.iter().map(|row| SamplePoint {
            time: row.timestamp.saturating_mul(1000),
            value: row.value_at(dimension_index),
        }));
        if let Some(last) = rows.last() {
            self.last_sample_time = Some(last.timestamp);
        }
        self.error = None;
        self.last_updated = Some(now);
        rows.len()
    }

    /// Records a failed poll without touching the series or the cursor.
    pub fn apply_failure(&mut self, message: String) {
        self.error = Some(message);
    }

    pub fn y_domain(&self) -> [f64; 2] {
        y_domain(&self.series)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct PollTarget {
    pub metric: String,
    pub instance_url: String,
}

pub struct MetricPoller {
    agent: AgentClient,
    target: PollTarget,
    settings: PollerSettings,
    state: Arc<RwLock<CardState>>,
}

impl MetricPoller {
    pub fn new(agent: AgentClient, target: PollTarget, settings: PollerSettings) -> Self {
        Self {
            agent,
            target,
            settings,
            state: Arc::new(RwLock::new(CardState::default())),
        }
    }

    pub fn snapshot(&self) -> CardState {
        self.state.read().clone()
    }

    /// Looks up the chart's units once; failures only log.
    pub async fn fetch_units(&self) {
        match self.agent.charts(&self.target.instance_url).await {
            Ok(catalog) => {
                if let Some(units) = catalog.units_for(&self.target.metric) {
                    self.state.write().units = units.to_string();
                }
            }
            Err(err) => {
                tracing::warn!(
                    metric = %self.target.metric,
                    url = %self.target.instance_url,
                    error = %err,
                    "failed to fetch chart units"
                );
            }
        }
    }

    pub async fn poll(&self) -> Result<usize, AgentError> {
        let query = {
            let mut guard = self.state.write();
            guard.is_loading = true;
            guard.query_for(&self.target.metric, Utc::now().timestamp(), &self.settings)
        };

        let result = self.agent.data(&self.target.instance_url, &query).await;

        let mut guard = self.state.write();
        guard.is_loading = false;
        match result {
            Ok(rows) => Ok(guard.apply_rows(&rows, self.settings.dimension_index, Utc::now())),
            Err(err) => {
                guard.apply_failure(err.to_string());
                Err(err)
            }
        }
    }

    async fn poll_and_log(&self) {
        match self.poll().await {
            Ok(added) => {
                tracing::debug!(metric = %self.target.metric, added, "poll succeeded");
            }
            Err(err) => {
                tracing::warn!(
                    metric = %self.target.metric,
                    url = %self.target.instance_url,
                    error = %err,
                    "poll failed"
                );
            }
        }
    }

    /// Starts the poll loop: once immediately, then every `interval` until the task is dropped.
    pub fn spawn(self) -> PollerTask {
        let state = Arc::clone(&self.state);
        let handle = tokio::spawn(self.run());
        PollerTask { state, handle }
    }

    async fn run(self) {
        let mut ticker = tokio::time::interval(self.settings.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        ticker.tick().await;
        tokio::join!(self.fetch_units(), self.poll_and_log());

        loop {
            ticker.tick().await;
            self.poll_and_log().await;
        }
    }
}

/// Running poll loop; dropping it aborts the loop and any request still in flight.
pub struct PollerTask {
    state: Arc<RwLock<CardState>>,
    handle: JoinHandle<()>,
}

impl PollerTask {
    pub fn snapshot(&self) -> CardState {
        self.state.read().clone()
    }

    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }
}

impl Drop for PollerTask {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
