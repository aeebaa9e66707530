// Netdash is open-source under the Apache License 2.0; see LICENSE for usage and contributions.
// This binary loads configuration and storage, then serves the dashboard over HTTP.

use anyhow::Result;
use netdash::agent::AgentClient;
use netdash::config::AppConfig;
use netdash::repository::RepositoryBundle;
use netdash::state::AppContext;
use netdash::{server, telemetry};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    telemetry::init();

    let cfg = AppConfig::from_env()?;

    tracing::info!(service = %cfg.service_name, version = %cfg.version, "starting netdash");

    let (repos, storage_error) = RepositoryBundle::open(cfg.database_url.as_deref()).await;
    tracing::info!(backend = repos.backend, "storage ready");

    let agent = AgentClient::new(cfg.agent_timeout)?;
    let ctx = AppContext::new(repos, agent, cfg.poller.clone(), storage_error);

    server::run(cfg, ctx).await
}
