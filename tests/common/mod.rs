// Netdash is open-source under the Apache License 2.0; see LICENSE for usage and contributions.
// In-process fake monitoring agent shared by the integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use netdash::agent::AgentClient;
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::net::TcpListener;

/// Canned reply for one endpoint.
#[derive(Clone, Debug)]
pub enum Reply {
    Json(Value),
    Status(StatusCode),
}

impl Reply {
    fn render(self) -> Response {
        match self {
            Reply::Json(body) => Json(body).into_response(),
            Reply::Status(status) => status.into_response(),
        }
    }
}

#[derive(Default)]
pub struct AgentState {
    pub info: Mutex<Option<Reply>>,
    pub charts: Mutex<Option<Reply>>,
    /// Replies consumed in order; the last one repeats.
    pub data: Mutex<Vec<Reply>>,
    pub data_queries: Mutex<Vec<HashMap<String, String>>>,
    pub chart_requests: Mutex<usize>,
}

pub struct FakeAgent {
    pub url: String,
    pub state: Arc<AgentState>,
}

impl FakeAgent {
    pub async fn start() -> Self {
        let state = Arc::new(AgentState::default());
        *state.info.lock() = Some(Reply::Json(json!({"version": "v1.44.0", "uid": "fake"})));

        let app = Router::new()
            .route("/api/v1/info", get(info))
            .route("/api/v1/charts", get(charts))
            .route("/api/v1/data", get(data))
            .with_state(Arc::clone(&state));

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind fake agent");
        let addr: SocketAddr = listener.local_addr().expect("local addr");

        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("fake agent serves");
        });

        Self {
            url: format!("http://{addr}"),
            state,
        }
    }

    pub fn set_charts(&self, names: &[(&str, &str)]) {
        let charts: serde_json::Map<String, Value> = names
            .iter()
            .map(|(name, units)| {
                (
                    name.to_string(),
                    json!({"id": name, "units": units, "family": "test"}),
                )
            })
            .collect();
        *self.state.charts.lock() = Some(Reply::Json(json!({ "charts": charts })));
    }

    pub fn set_charts_reply(&self, reply: Reply) {
        *self.state.charts.lock() = Some(reply);
    }

    pub fn set_info_reply(&self, reply: Reply) {
        *self.state.info.lock() = Some(reply);
    }

    pub fn push_data(&self, reply: Reply) {
        self.state.data.lock().push(reply);
    }

    pub fn push_rows(&self, rows: Value) {
        self.push_data(Reply::Json(json!({
            "labels": ["time", "a", "b"],
            "data": rows
        })));
    }

    pub fn data_queries(&self) -> Vec<HashMap<String, String>> {
        self.state.data_queries.lock().clone()
    }

    pub fn chart_requests(&self) -> usize {
        *self.state.chart_requests.lock()
    }
}

async fn info(State(state): State<Arc<AgentState>>) -> Response {
    reply_or_missing(state.info.lock().clone())
}

async fn charts(State(state): State<Arc<AgentState>>) -> Response {
    *state.chart_requests.lock() += 1;
    reply_or_missing(state.charts.lock().clone())
}

async fn data(
    State(state): State<Arc<AgentState>>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    state.data_queries.lock().push(params);
    let reply = {
        let mut queue = state.data.lock();
        if queue.len() > 1 {
            Some(queue.remove(0))
        } else {
            queue.first().cloned()
        }
    };
    reply_or_missing(reply)
}

fn reply_or_missing(reply: Option<Reply>) -> Response {
    reply
        .unwrap_or(Reply::Status(StatusCode::NOT_FOUND))
        .render()
}

pub fn agent_client() -> AgentClient {
    AgentClient::new(Duration::from_secs(2)).expect("agent client builds")
}

/// Polls `check` until it holds or the deadline passes.
pub async fn wait_until<F>(mut check: F) -> bool
where
    F: FnMut() -> bool,
{
    for _ in 0..100 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    check()
}

/// An address nothing listens on.
pub fn dead_url() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind temp port");
    let port = listener.local_addr().expect("local addr").port();
    drop(listener);
    format!("http://127.0.0.1:{port}")
}
