// Netdash is open-source under the Apache License 2.0; see LICENSE for usage and contributions.
// Axum HTTP endpoints for the dashboard and settings pages, plus probes and the static bundle.

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::config::AppConfig;
use crate::domain::instance::{Instance, InstancePatch};
use crate::domain::metric::Metric;
use crate::error::{AppError, AppResult};
use crate::registry::{ConnectionTest, InstanceRegistry};
use crate::state::{AppContext, CardSnapshot, RefreshOutcome};

#[derive(Serialize)]
struct HealthResponse {
    service: String,
    version: String,
    status: String,
}

#[derive(Serialize)]
struct ReadyResponse {
    service: String,
    version: String,
    ready: bool,
    storage_ok: bool,
}

#[derive(Clone)]
struct HttpState {
    cfg: AppConfig,
    ctx: AppContext,
}

pub fn router(cfg: AppConfig, ctx: AppContext) -> Router {
    let dashboard_dir = cfg.dashboard_dir.clone();
    let state = HttpState { cfg, ctx };

    let api_router = Router::new()
        .route("/status", get(api_status))
        .route("/instances", get(api_list_instances).post(api_create_instance))
        .route("/instances/test", post(api_test_connection))
        .route(
            "/instances/:id",
            get(api_get_instance)
                .patch(api_update_instance)
                .delete(api_delete_instance),
        )
        .route("/instances/:id/refresh", post(api_refresh_instance))
        .route("/instances/:id/metrics", get(api_instance_metrics))
        .route("/metrics/:id/toggle", post(api_toggle_metric))
        .route("/metrics/select", post(api_select_metrics))
        .route("/dashboard", get(api_dashboard))
        .route("/dashboard/refresh", post(api_dashboard_refresh))
        .route("/dashboard/interval", put(api_dashboard_interval));

    // client-side routes such as /settings resolve to index.html
    let spa_service = ServeDir::new(&dashboard_dir)
        .not_found_service(ServeFile::new(dashboard_dir.join("index.html")));

    Router::new()
        .route("/health", get(health_handler))
        .route("/ready", get(ready_handler))
        .nest("/api", api_router)
        .fallback_service(spa_service)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn serve(cfg: AppConfig, ctx: AppContext) -> Result<()> {
    let addr: SocketAddr = cfg.http_addr;
    let app = router(cfg, ctx);

    let listener = TcpListener::bind(addr)
        .await
        .context("failed to bind HTTP listener")?;

    tracing::info!(%addr, "http server listening");

    axum::serve(listener, app)
        .await
        .context("http server error")
}

async fn health_handler(State(state): State<HttpState>) -> Json<HealthResponse> {
    let cfg = state.cfg;
    Json(HealthResponse {
        service: cfg.service_name,
        version: cfg.version,
        status: "ok".to_string(),
    })
}

async fn ready_handler(State(state): State<HttpState>) -> Json<ReadyResponse> {
    let HttpState { cfg, ctx } = state;
    let storage_ok = match ctx.repos.instances.health_check().await {
        Ok(_) => true,
        Err(err) => {
            tracing::error!(?err, "repository health check failed");
            false
        }
    };
    Json(ReadyResponse {
        service: cfg.service_name,
        version: cfg.version,
        ready: storage_ok,
        storage_ok,
    })
}

#[derive(Debug, Serialize)]
struct StatusResponse {
    storage_backend: &'static str,
    storage_error: Option<String>,
    refresh_interval_secs: u64,
    mounted_cards: usize,
}

#[derive(Debug, Deserialize)]
struct CreateInstanceRequest {
    name: String,
    url: String,
}

#[derive(Debug, Serialize)]
struct CreateInstanceResponse {
    instance: Instance,
    metrics: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    catalog_error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TestConnectionRequest {
    url: String,
}

#[derive(Debug, Deserialize)]
struct MetricFilter {
    #[serde(default)]
    q: Option<String>,
}

#[derive(Debug, Serialize)]
struct InstanceMetricsResponse {
    instance_id: Uuid,
    total: usize,
    selected: usize,
    metrics: Vec<Metric>,
}

#[derive(Debug, Deserialize)]
struct SelectMetricsRequest {
    ids: Vec<Uuid>,
}

#[derive(Debug, Deserialize)]
struct IntervalRequest {
    seconds: u64,
}

#[derive(Debug, Serialize)]
struct DashboardResponse {
    refresh_interval_secs: u64,
    storage_error: Option<String>,
    cards: Vec<CardSnapshot>,
}

#[derive(Debug, Serialize)]
struct ApiMessage {
    message: String,
}

async fn api_status(State(state): State<HttpState>) -> Json<StatusResponse> {
    let ctx = state.ctx;
    Json(StatusResponse {
        storage_backend: ctx.repos.backend,
        storage_error: ctx.storage_error.clone(),
        refresh_interval_secs: ctx.dashboard.settings().interval.as_secs(),
        mounted_cards: ctx.dashboard.mounted(),
    })
}

async fn api_list_instances(State(state): State<HttpState>) -> AppResult<Json<Vec<Instance>>> {
    Ok(Json(state.ctx.registry.list().await?))
}

async fn api_get_instance(
    State(state): State<HttpState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Instance>> {
    Ok(Json(state.ctx.registry.get(id).await?))
}

/// Probes the agent first; only reachable agents are registered, and their
/// catalog is fetched right away.
async fn api_create_instance(
    State(state): State<HttpState>,
    Json(req): Json<CreateInstanceRequest>,
) -> AppResult<(StatusCode, Json<CreateInstanceResponse>)> {
    InstanceRegistry::validate_new(&req.name, &req.url)?;

    let ctx = state.ctx;
    let probe = ctx.registry.test_connection(&req.url).await;
    if !probe.success {
        return Err(AppError::Unreachable(
            probe.error.unwrap_or_else(|| "unknown error".into()),
        ));
    }

    let instance = ctx.registry.add(&req.name, &req.url).await?;
    let (metrics, catalog_error) = match ctx.catalog.fetch_list(&instance).await {
        Ok(metrics) => (metrics.len(), None),
        Err(err) => {
            tracing::warn!(instance_id = %instance.id, error = %err, "initial catalog fetch failed");
            (0, Some(err.to_string()))
        }
    };

    Ok((
        StatusCode::CREATED,
        Json(CreateInstanceResponse {
            instance,
            metrics,
            catalog_error,
        }),
    ))
}

async fn api_test_connection(
    State(state): State<HttpState>,
    Json(req): Json<TestConnectionRequest>,
) -> Json<ConnectionTest> {
    Json(state.ctx.registry.test_connection(&req.url).await)
}

async fn api_update_instance(
    State(state): State<HttpState>,
    Path(id): Path<Uuid>,
    Json(patch): Json<InstancePatch>,
) -> AppResult<Json<Instance>> {
    let instance = state.ctx.registry.update(id, patch).await?;
    state.ctx.refresh_dashboard().await?;
    Ok(Json(instance))
}

async fn api_delete_instance(
    State(state): State<HttpState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiMessage>> {
    if !state.ctx.remove_instance(id).await? {
        return Err(AppError::NotFound(format!("instance {id}")));
    }
    Ok(Json(ApiMessage {
        message: "Instance removed successfully".into(),
    }))
}

async fn api_refresh_instance(
    State(state): State<HttpState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Vec<Metric>>> {
    let ctx = state.ctx;
    let instance = ctx.registry.get(id).await?;
    let metrics = ctx.catalog.fetch_list(&instance).await?;
    ctx.refresh_dashboard().await?;
    Ok(Json(metrics))
}

async fn api_instance_metrics(
    State(state): State<HttpState>,
    Path(id): Path<Uuid>,
    Query(filter): Query<MetricFilter>,
) -> AppResult<Json<InstanceMetricsResponse>> {
    let ctx = state.ctx;
    let instance = ctx.registry.get(id).await?;
    let all = ctx.catalog.for_instance(instance.id).await?;
    let keyword = filter.q.unwrap_or_default();
    let metrics = ctx.catalog.filter_by_keyword(instance.id, &keyword).await?;

    Ok(Json(InstanceMetricsResponse {
        instance_id: instance.id,
        total: all.len(),
        selected: all.iter().filter(|metric| metric.selected).count(),
        metrics,
    }))
}

async fn api_toggle_metric(
    State(state): State<HttpState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Metric>> {
    let metric = state.ctx.catalog.toggle(id).await?;
    state.ctx.refresh_dashboard().await?;
    Ok(Json(metric))
}

async fn api_select_metrics(
    State(state): State<HttpState>,
    Json(req): Json<SelectMetricsRequest>,
) -> AppResult<Json<Vec<Metric>>> {
    let ctx = state.ctx;
    ctx.catalog.select_many(&req.ids).await?;
    ctx.refresh_dashboard().await?;
    Ok(Json(ctx.catalog.selected().await?))
}

async fn api_dashboard(State(state): State<HttpState>) -> AppResult<Json<DashboardResponse>> {
    let ctx = state.ctx;
    let specs = ctx.refresh_dashboard().await?;
    Ok(Json(DashboardResponse {
        refresh_interval_secs: ctx.dashboard.settings().interval.as_secs(),
        storage_error: ctx.storage_error.clone(),
        cards: ctx.dashboard.snapshots(&specs),
    }))
}

async fn api_dashboard_refresh(
    State(state): State<HttpState>,
) -> AppResult<Json<Vec<RefreshOutcome>>> {
    Ok(Json(state.ctx.refresh_all_catalogs().await?))
}

async fn api_dashboard_interval(
    State(state): State<HttpState>,
    Json(req): Json<IntervalRequest>,
) -> AppResult<Json<ApiMessage>> {
    if req.seconds == 0 {
        return Err(AppError::Validation(
            "refresh interval must be at least one second".into(),
        ));
    }
    state
        .ctx
        .dashboard
        .set_interval(Duration::from_secs(req.seconds));
    Ok(Json(ApiMessage {
        message: format!("refresh interval set to {}s", req.seconds),
    }))
}
