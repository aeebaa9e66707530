// Netdash is open-source under the Apache License 2.0; see LICENSE for usage and contributions.
// This module wires the HTTP server that exposes the dashboard API and static bundle.

mod http;

use anyhow::Result;

use crate::config::AppConfig;
use crate::state::AppContext;

pub use http::router;

pub async fn run(cfg: AppConfig, ctx: AppContext) -> Result<()> {
    // mount cards for metrics selected in a previous run
    if let Err(err) = ctx.refresh_dashboard().await {
        tracing::warn!(error = %err, "failed to restore dashboard cards");
    }

    http::serve(cfg, ctx).await
}
