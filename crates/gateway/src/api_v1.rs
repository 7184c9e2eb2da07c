//! HTTP API v1 — sessions, topics and turns.
//!
//! Endpoints:
//!
//! - `GET  /v1/topics`                              — Selectable topics
//! - `POST /v1/sessions`                            — Create a session
//! - `GET  /v1/sessions/{id}`                       — Active topic and its turns
//! - `PUT  /v1/sessions/{id}/topic`                 — Switch the active topic
//! - `POST /v1/sessions/{id}/messages`              — Ask a question (one turn)
//! - `GET  /v1/sessions/{id}/topics/{topic}/turns`  — One topic's full log
//! - `GET  /v1/sessions/{id}/history`               — Previews of past questions

use axum::{
    Router,
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::{get, post, put},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{error, info};

use knowdesk_assistant::{SessionHandle, SessionState, TurnPipeline, TurnRecord};
use knowdesk_core::{SessionError, Topic, Turn};

// ── State ─────────────────────────────────────────────────────────────────

/// A registered session and when it was created.
struct SessionEntry {
    handle: SessionHandle,
    created_at: DateTime<Utc>,
}

/// Shared state for the v1 API.
pub struct ApiV1State {
    pub pipeline: Arc<TurnPipeline>,
    sessions: RwLock<HashMap<String, SessionEntry>>,
    max_sessions: usize,
    preview_chars: usize,
}

impl ApiV1State {
    pub fn new(pipeline: Arc<TurnPipeline>, max_sessions: usize, preview_chars: usize) -> Self {
        Self {
            pipeline,
            sessions: RwLock::new(HashMap::new()),
            max_sessions: max_sessions.max(1),
            preview_chars,
        }
    }

    /// Register a fresh session, evicting the oldest one at capacity.
    pub async fn create_session(&self) -> SessionHandle {
        let handle = SessionHandle::new(SessionState::new());
        let mut sessions = self.sessions.write().await;

        if sessions.len() >= self.max_sessions {
            if let Some(oldest_key) = sessions
                .iter()
                .min_by_key(|(_, s)| s.created_at)
                .map(|(k, _)| k.clone())
            {
                sessions.remove(&oldest_key);
                info!(session = %oldest_key, "Evicted oldest session");
            }
        }

        sessions.insert(
            handle.id().to_string(),
            SessionEntry {
                handle: handle.clone(),
                created_at: Utc::now(),
            },
        );
        handle
    }

    pub async fn session(&self, id: &str) -> Option<SessionHandle> {
        self.sessions.read().await.get(id).map(|s| s.handle.clone())
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }
}

pub type SharedApiState = Arc<ApiV1State>;

// ── Router ────────────────────────────────────────────────────────────────

/// Build the v1 API router. Nest this under "/v1" in the main router.
pub fn v1_router(state: SharedApiState) -> Router {
    Router::new()
        .route("/topics", get(list_topics_handler))
        .route("/sessions", post(create_session_handler))
        .route("/sessions/{id}", get(get_session_handler))
        .route("/sessions/{id}/topic", put(set_topic_handler))
        .route("/sessions/{id}/messages", post(submit_message_handler))
        .route("/sessions/{id}/topics/{topic}/turns", get(list_turns_handler))
        .route("/sessions/{id}/history", get(history_handler))
        .with_state(state)
}

// ── Request / Response types ──────────────────────────────────────────────

#[derive(Serialize, Deserialize)]
pub(crate) struct ErrorResponse {
    pub(crate) error: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
}

fn session_error(err: SessionError) -> ApiError {
    let status = match err {
        SessionError::NotFound(_) => StatusCode::NOT_FOUND,
        SessionError::TurnInProgress => StatusCode::CONFLICT,
        SessionError::EmptyQuestion => StatusCode::BAD_REQUEST,
    };
    api_error(status, err.to_string())
}

fn parse_topic(raw: &str) -> Result<Topic, ApiError> {
    raw.parse::<Topic>()
        .map_err(|e| api_error(StatusCode::BAD_REQUEST, e.to_string()))
}

#[derive(Serialize, Deserialize)]
struct TopicDto {
    id: Topic,
    name: String,
}

#[derive(Serialize, Deserialize)]
struct SessionCreatedResponse {
    session_id: String,
    active_topic: Topic,
}

#[derive(Serialize, Deserialize)]
struct SessionDetailResponse {
    session_id: String,
    active_topic: Topic,
    busy: bool,
    turns: Vec<Turn>,
}

#[derive(Deserialize)]
struct SetTopicRequest {
    topic: String,
}

#[derive(Serialize, Deserialize)]
struct SetTopicResponse {
    session_id: String,
    active_topic: Topic,
}

#[derive(Deserialize)]
struct SubmitMessageRequest {
    #[serde(default)]
    message: String,
}

#[derive(Serialize, Deserialize)]
struct TurnListResponse {
    topic: Topic,
    turns: Vec<Turn>,
}

#[derive(Serialize, Deserialize)]
struct HistoryResponse {
    history: BTreeMap<Topic, Vec<String>>,
}

// ── Handlers ──────────────────────────────────────────────────────────────

async fn find_session(state: &ApiV1State, id: &str) -> Result<SessionHandle, ApiError> {
    state
        .session(id)
        .await
        .ok_or_else(|| session_error(SessionError::NotFound(id.to_string())))
}

async fn list_topics_handler() -> Json<Vec<TopicDto>> {
    Json(
        Topic::ALL
            .into_iter()
            .map(|t| TopicDto {
                id: t,
                name: t.display_name().to_string(),
            })
            .collect(),
    )
}

async fn create_session_handler(
    State(state): State<SharedApiState>,
) -> (StatusCode, Json<SessionCreatedResponse>) {
    let handle = state.create_session().await;
    let active_topic = handle.lock().await.active_topic();
    info!(session = %handle.id(), "Session created");

    (
        StatusCode::CREATED,
        Json(SessionCreatedResponse {
            session_id: handle.id().to_string(),
            active_topic,
        }),
    )
}

async fn get_session_handler(
    State(state): State<SharedApiState>,
    Path(id): Path<String>,
) -> Result<Json<SessionDetailResponse>, ApiError> {
    let handle = find_session(&state, &id).await?;
    let session = handle.lock().await;
    let topic = session.active_topic();

    Ok(Json(SessionDetailResponse {
        session_id: id,
        active_topic: topic,
        busy: session.is_busy(),
        turns: session.log().read_all(topic).to_vec(),
    }))
}

async fn set_topic_handler(
    State(state): State<SharedApiState>,
    Path(id): Path<String>,
    Json(payload): Json<SetTopicRequest>,
) -> Result<Json<SetTopicResponse>, ApiError> {
    let topic = parse_topic(&payload.topic)?;
    let handle = find_session(&state, &id).await?;
    handle.lock().await.set_active_topic(topic);
    info!(session = %id, topic = %topic, "Active topic changed");

    Ok(Json(SetTopicResponse {
        session_id: id,
        active_topic: topic,
    }))
}

async fn submit_message_handler(
    State(state): State<SharedApiState>,
    Path(id): Path<String>,
    Json(payload): Json<SubmitMessageRequest>,
) -> Result<Json<TurnRecord>, ApiError> {
    let handle = find_session(&state, &id).await?;
    let pipeline = state.pipeline.clone();

    // Detached so a dropped connection cannot leave the session busy.
    let task = tokio::spawn(async move { pipeline.submit(&handle, &payload.message).await });

    match task.await {
        Ok(result) => result.map(Json).map_err(session_error),
        Err(e) => {
            error!(session = %id, error = %e, "Turn task failed");
            Err(api_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "The question could not be processed",
            ))
        }
    }
}

async fn list_turns_handler(
    State(state): State<SharedApiState>,
    Path((id, topic)): Path<(String, String)>,
) -> Result<Json<TurnListResponse>, ApiError> {
    let topic = parse_topic(&topic)?;
    let handle = find_session(&state, &id).await?;
    let session = handle.lock().await;

    Ok(Json(TurnListResponse {
        topic,
        turns: session.log().read_all(topic).to_vec(),
    }))
}

async fn history_handler(
    State(state): State<SharedApiState>,
    Path(id): Path<String>,
) -> Result<Json<HistoryResponse>, ApiError> {
    let handle = find_session(&state, &id).await?;
    let session = handle.lock().await;

    Ok(Json(HistoryResponse {
        history: session.log().history_summary(state.preview_chars),
    }))
}
