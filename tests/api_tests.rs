// Netdash is open-source under the Apache License 2.0; see LICENSE for usage and contributions.
// Integration tests: settings and dashboard flows through the HTTP router.

mod common;

use std::time::Duration;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use netdash::config::AppConfig;
use netdash::poller::PollerSettings;
use netdash::repository::RepositoryBundle;
use netdash::server;
use netdash::state::AppContext;
use serde_json::{json, Value};
use tower::ServiceExt;

use common::{agent_client, FakeAgent};

struct TestApp {
    cfg: AppConfig,
    ctx: AppContext,
}

impl TestApp {
    fn new() -> Self {
        let poller = PollerSettings {
            interval: Duration::from_millis(50),
            ..PollerSettings::default()
        };
        let cfg = AppConfig {
            http_addr: "127.0.0.1:0".parse().unwrap(),
            service_name: "netdash-test".into(),
            version: "0.1.0-test".into(),
            database_url: None,
            dashboard_dir: "dashboard/dist".into(),
            agent_timeout: Duration::from_secs(2),
            poller: poller.clone(),
        };
        let ctx = AppContext::new(RepositoryBundle::in_memory(), agent_client(), poller, None);
        Self { cfg, ctx }
    }

    fn router(&self) -> Router {
        server::router(self.cfg.clone(), self.ctx.clone())
    }

    async fn call(&self, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string())),
            None => builder.body(Body::empty()),
        }
        .unwrap();

        let response = self.router().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, value)
    }
}

async fn seeded_agent() -> FakeAgent {
    let agent = FakeAgent::start().await;
    agent.set_charts(&[("system.cpu", "percentage"), ("system.ram", "MiB")]);
    agent.push_rows(json!([[1000, 5, 7], [1005, 6, 8]]));
    agent
}

#[tokio::test]
async fn adding_instance_fetches_its_catalog() {
    let agent = seeded_agent().await;
    let app = TestApp::new();

    let (status, body) = app
        .call(
            "POST",
            "/api/instances",
            Some(json!({"name": "edge", "url": format!("{}/", agent.url)})),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["instance"]["url"], agent.url.as_str());
    assert_eq!(body["metrics"], 2);

    let id = body["instance"]["id"].as_str().unwrap().to_string();
    let (status, listing) = app
        .call("GET", &format!("/api/instances/{id}/metrics?q=RAM"), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listing["total"], 2);
    assert_eq!(listing["selected"], 0);
    assert_eq!(listing["metrics"].as_array().unwrap().len(), 1);
    assert_eq!(listing["metrics"][0]["name"], "system.ram");
}

#[tokio::test]
async fn selecting_a_metric_mounts_a_live_card() {
    let agent = seeded_agent().await;
    let app = TestApp::new();

    let (_, created) = app
        .call(
            "POST",
            "/api/instances",
            Some(json!({"name": "edge", "url": agent.url})),
        )
        .await;
    let id = created["instance"]["id"].as_str().unwrap().to_string();
    let (_, listing) = app
        .call("GET", &format!("/api/instances/{id}/metrics?q=ram"), None)
        .await;
    let metric_id = listing["metrics"][0]["id"].as_str().unwrap().to_string();

    let (status, toggled) = app
        .call("POST", &format!("/api/metrics/{metric_id}/toggle"), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(toggled["selected"], true);
    assert_eq!(app.ctx.dashboard.mounted(), 1);

    let mut card = Value::Null;
    for _ in 0..100 {
        let (_, dashboard) = app.call("GET", "/api/dashboard", None).await;
        card = dashboard["cards"][0].clone();
        if card["series"].as_array().is_some_and(|s| !s.is_empty()) && card["units"] == "MiB" {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    assert_eq!(card["metric_name"], "system.ram");
    assert_eq!(card["instance_name"], "edge");
    assert_eq!(card["units"], "MiB");
    assert_eq!(card["series"][0]["time"], 1_000_000);
    assert_eq!(card["series"][0]["value"], 7.0);
    assert_eq!(card["last_sample_time"], 1005);
    assert_eq!(card["error"], Value::Null);
    assert_eq!(card["y_domain"], json!([6.0, 9.0]));
}

#[tokio::test]
async fn deleting_instance_unmounts_its_cards() {
    let agent = seeded_agent().await;
    let app = TestApp::new();

    let (_, created) = app
        .call(
            "POST",
            "/api/instances",
            Some(json!({"name": "edge", "url": agent.url})),
        )
        .await;
    let id = created["instance"]["id"].as_str().unwrap().to_string();
    let metrics = app.ctx.catalog.all().await.unwrap();
    let ids: Vec<String> = metrics.iter().map(|m| m.id.to_string()).collect();

    let (status, selected) = app
        .call("POST", "/api/metrics/select", Some(json!({ "ids": ids })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(selected.as_array().unwrap().len(), 2);
    assert_eq!(app.ctx.dashboard.mounted(), 2);

    let (status, _) = app.call("DELETE", &format!("/api/instances/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(app.ctx.dashboard.mounted(), 0);
    assert!(app.ctx.catalog.all().await.unwrap().is_empty());

    let (status, _) = app.call("DELETE", &format!("/api/instances/{id}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn changing_interval_restarts_cards_with_fresh_state() {
    let agent = seeded_agent().await;
    let app = TestApp::new();

    let (_, created) = app
        .call(
            "POST",
            "/api/instances",
            Some(json!({"name": "edge", "url": agent.url})),
        )
        .await;
    assert_eq!(created["metrics"], 2);
    let first = app.ctx.catalog.all().await.unwrap()[0].id;
    app.ctx.catalog.toggle(first).await.unwrap();
    app.ctx.refresh_dashboard().await.unwrap();

    assert!(common::wait_until(|| agent.data_queries().len() >= 2).await);

    let (status, _) = app
        .call("PUT", "/api/dashboard/interval", Some(json!({"seconds": 60})))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (_, dashboard) = app.call("GET", "/api/dashboard", None).await;
    assert_eq!(dashboard["refresh_interval_secs"], 60);
    assert_eq!(dashboard["cards"][0]["refresh_interval_secs"], 60);

    // the restarted card bootstraps again instead of continuing from the old cursor
    assert!(common::wait_until(|| {
        agent
            .data_queries()
            .last()
            .map(|q| q["after"] != "1005")
            .unwrap_or(false)
    })
    .await);
}

#[tokio::test]
async fn dashboard_refresh_reports_per_instance_outcome() {
    let good = seeded_agent().await;
    let app = TestApp::new();

    app.call(
        "POST",
        "/api/instances",
        Some(json!({"name": "good", "url": good.url})),
    )
    .await;
    let flaky = app.ctx.registry.add("flaky", &common::dead_url()).await.unwrap();

    let (status, outcomes) = app.call("POST", "/api/dashboard/refresh", None).await;
    assert_eq!(status, StatusCode::OK);
    let outcomes = outcomes.as_array().unwrap();
    assert_eq!(outcomes.len(), 2);
    assert_eq!(outcomes[0]["metrics"], 2);
    assert!(outcomes[0].get("error").is_none());
    assert_eq!(outcomes[1]["instance_id"], flaky.id.to_string());
    assert!(outcomes[1]["error"].as_str().is_some());
}

#[tokio::test]
async fn test_connection_endpoint_does_not_register() {
    let agent = seeded_agent().await;
    let app = TestApp::new();

    let (status, body) = app
        .call("POST", "/api/instances/test", Some(json!({"url": agent.url})))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);

    let (_, instances) = app.call("GET", "/api/instances", None).await;
    assert_eq!(instances, json!([]));
}

#[tokio::test]
async fn rename_keeps_card_running() {
    let agent = seeded_agent().await;
    let app = TestApp::new();

    let (_, created) = app
        .call(
            "POST",
            "/api/instances",
            Some(json!({"name": "edge", "url": agent.url})),
        )
        .await;
    let id = created["instance"]["id"].as_str().unwrap().to_string();
    let metric = app.ctx.catalog.all().await.unwrap()[0].id;
    app.ctx.catalog.toggle(metric).await.unwrap();
    app.ctx.refresh_dashboard().await.unwrap();
    assert!(common::wait_until(|| agent.data_queries().len() >= 2).await);

    let (status, updated) = app
        .call(
            "PATCH",
            &format!("/api/instances/{id}"),
            Some(json!({"name": "edge-renamed"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["name"], "edge-renamed");

    let (_, dashboard) = app.call("GET", "/api/dashboard", None).await;
    let card = &dashboard["cards"][0];
    assert_eq!(card["instance_name"], "edge-renamed");
    assert_eq!(card["last_sample_time"], 1005);
}
