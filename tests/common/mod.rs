//! Fake onboarding service for integration tests

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use uuid::Uuid;

use onboard::types::{CreateSessionRequest, Session};

/// Everything the fake server has seen and stored
#[derive(Default)]
pub struct FakeState {
    /// Newest first
    pub sessions: Vec<Session>,
    pub api_keys: Vec<Option<String>>,
    pub list_queries: Vec<HashMap<String, String>>,
    pub score: Option<u8>,
}

pub struct FakeServer {
    pub addr: String,
    pub state: Arc<Mutex<FakeState>>,
}

impl FakeServer {
    /// Base URL of the well-behaved API
    pub fn base_url(&self) -> String {
        format!("{}/v1", self.addr)
    }

    /// Base URL whose list endpoint answers 500 with a plain-text body
    pub fn broken_url(&self) -> String {
        format!("{}/broken", self.addr)
    }

    /// Base URL whose list endpoint never answers in time
    pub fn slow_url(&self) -> String {
        format!("{}/slow", self.addr)
    }

    pub async fn list_calls(&self) -> usize {
        self.state.lock().await.list_queries.len()
    }
}

type Shared = Arc<Mutex<FakeState>>;

fn record_key(state: &mut FakeState, headers: &HeaderMap) {
    state.api_keys.push(
        headers
            .get("x-api-key")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
    );
}

fn not_found(id: Uuid) -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::NOT_FOUND,
        Json(json!({"error": {"code": "SESSION_NOT_FOUND", "message": format!("Session {} not found", id)}})),
    )
}

async fn create_session(
    State(state): State<Shared>,
    headers: HeaderMap,
    Json(request): Json<CreateSessionRequest>,
) -> impl IntoResponse {
    let mut state = state.lock().await;
    record_key(&mut state, &headers);

    let age = request.raw_input.personal_info.age;
    if !(18..=100).contains(&age) {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": {"code": "VALIDATION_ERROR", "message": "age out of range"}})),
        );
    }

    let session = Session {
        id: Uuid::new_v4(),
        user_id: request.user_id,
        created_at: Utc::now(),
        raw_input: serde_json::to_value(&request.raw_input).unwrap(),
        parsed_data: json!({}),
        score: state.score,
        score_explanation: state.score.map(|s| format!("Scored {} by the fake server", s)),
        source_ip: Some("127.0.0.1".to_string()),
        user_agent: headers
            .get("user-agent")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
    };
    state.sessions.insert(0, session.clone());
    (StatusCode::CREATED, Json(serde_json::to_value(session).unwrap()))
}

async fn list_sessions(
    State(state): State<Shared>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    let mut state = state.lock().await;
    record_key(&mut state, &headers);
    state.list_queries.push(query.clone());

    let page: u32 = query.get("page").and_then(|p| p.parse().ok()).unwrap_or(1);
    let limit: u32 = query.get("limit").and_then(|l| l.parse().ok()).unwrap_or(10);
    let cutoff: Option<DateTime<Utc>> = query
        .get("datetime")
        .and_then(|d| DateTime::parse_from_rfc3339(d).ok())
        .map(|d| d.with_timezone(&Utc));

    let matching: Vec<_> = state
        .sessions
        .iter()
        // The cutoff arrives truncated to milliseconds
        .filter(|s| cutoff.map_or(true, |c| s.created_at < c + chrono::Duration::milliseconds(1)))
        .map(Session::summary)
        .collect();
    let total = matching.len() as u64;
    let total_pages = total.div_ceil(u64::from(limit));
    let data: Vec<_> = matching
        .into_iter()
        .skip(((page - 1) * limit) as usize)
        .take(limit as usize)
        .collect();

    Json(json!({
        "data": data,
        "pagination": {
            "page": page,
            "limit": limit,
            "total": total,
            "totalPages": total_pages,
            "hasNext": u64::from(page) < total_pages,
            "hasPrev": page > 1
        },
        "meta": {"order": "desc", "source": "fake"}
    }))
}

async fn get_session(State(state): State<Shared>, Path(id): Path<Uuid>) -> impl IntoResponse {
    let state = state.lock().await;
    match state.sessions.iter().find(|s| s.id == id) {
        Some(session) => (StatusCode::OK, Json(serde_json::to_value(session).unwrap())),
        None => not_found(id),
    }
}

async fn delete_session(State(state): State<Shared>, Path(id): Path<Uuid>) -> impl IntoResponse {
    let mut state = state.lock().await;
    let before = state.sessions.len();
    state.sessions.retain(|s| s.id != id);
    if state.sessions.len() == before {
        return not_found(id).into_response();
    }
    StatusCode::NO_CONTENT.into_response()
}

async fn broken_list() -> impl IntoResponse {
    (StatusCode::INTERNAL_SERVER_ERROR, "upstream exploded")
}

async fn slow_list() -> impl IntoResponse {
    tokio::time::sleep(Duration::from_secs(5)).await;
    Json(json!({}))
}

/// Start the fake service on an ephemeral port
pub async fn spawn_fake_server() -> FakeServer {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let state: Shared = Arc::new(Mutex::new(FakeState {
        score: Some(81),
        ..Default::default()
    }));

    let app = Router::new()
        .route("/v1/onboarding", post(create_session))
        .route("/v1/onboarding/sessions", get(list_sessions))
        .route("/v1/onboarding/:id", get(get_session).delete(delete_session))
        .route("/broken/onboarding/sessions", get(broken_list))
        .route("/slow/onboarding/sessions", get(slow_list))
        .with_state(Arc::clone(&state));

    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    FakeServer {
        addr: format!("http://{addr}"),
        state,
    }
}
