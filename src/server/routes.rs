//! HTTP route handlers for the chat widgets API.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use crate::chat::{ChatError, ChatMessage, DeletionToken, SessionId, SessionTemplate};
use crate::classifier::ClassifiedResponse;
use crate::widgets::{Widget, WidgetFlags};

use super::state::AppState;

type ApiResult<T> = Result<T, (StatusCode, String)>;

/// Create the API router with all routes.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/sessions", get(list_sessions).post(create_session))
        .route("/api/sessions/restore", post(restore_session))
        .route("/api/sessions/{id}", delete(delete_session))
        .route("/api/sessions/{id}/messages", get(list_messages))
        .route("/api/sessions/{id}/chat", post(chat))
        .route("/api/sessions/{id}/abort", post(abort))
        .route("/api/sessions/{id}/clear-context", post(clear_context))
        .route("/api/sessions/{id}/reset", post(reset_session))
        .route("/api/stop-streaming", post(stop_streaming))
        .route("/api/classify", post(classify))
        .with_state(state)
}

/// Map a chat error onto an HTTP status.
fn chat_error(err: ChatError) -> (StatusCode, String) {
    let status = match &err {
        ChatError::SessionNotFound(_) | ChatError::MessageNotFound(_) => StatusCode::NOT_FOUND,
        ChatError::InvalidIndex { .. } | ChatError::EmptyInput | ChatError::InvalidConfig(_) => {
            StatusCode::BAD_REQUEST
        }
        ChatError::AlreadyGenerating(_) => StatusCode::CONFLICT,
        ChatError::NothingToRestore(_) => StatusCode::GONE,
        ChatError::Llm(_) | ChatError::Widget(_) | ChatError::Pattern(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    (status, err.to_string())
}

/// Health check endpoint.
async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "chat-widgets",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Session list entry.
#[derive(Debug, Serialize)]
pub struct SessionSummary {
    /// Session id.
    pub id: SessionId,
    /// Title.
    pub topic: String,
    /// Number of stored messages.
    pub message_count: usize,
    /// Last update, epoch milliseconds.
    pub last_update: i64,
    /// Whether a reply is being generated.
    pub is_generating: bool,
}

/// Session list response.
#[derive(Debug, Serialize)]
pub struct SessionsResponse {
    /// Index of the selected session.
    pub current: usize,
    /// Sessions in display order.
    pub sessions: Vec<SessionSummary>,
}

async fn list_sessions(State(state): State<Arc<AppState>>) -> Json<SessionsResponse> {
    let current = state.store.current_index().await;
    let sessions = state
        .store
        .sessions()
        .await
        .into_iter()
        .map(|s| SessionSummary {
            id: s.id,
            message_count: s.messages.len(),
            topic: s.topic,
            last_update: s.last_update,
            is_generating: s.is_generating,
        })
        .collect();
    Json(SessionsResponse { current, sessions })
}

/// New session request.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct NewSessionRequest {
    /// Optional template; its name becomes the topic.
    pub template: Option<SessionTemplate>,
}

/// New session response.
#[derive(Debug, Serialize)]
pub struct NewSessionResponse {
    /// Id of the created session.
    pub id: SessionId,
}

async fn create_session(
    State(state): State<Arc<AppState>>,
    Json(request): Json<NewSessionRequest>,
) -> (StatusCode, Json<NewSessionResponse>) {
    let id = state.store.new_session(request.template).await;
    (StatusCode::CREATED, Json(NewSessionResponse { id }))
}

/// Deletion response carrying the undo token.
#[derive(Debug, Serialize, Deserialize)]
pub struct DeletionResponse {
    /// Token accepted by the restore endpoint within the undo window.
    pub token: DeletionToken,
}

async fn delete_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<SessionId>,
) -> ApiResult<Json<DeletionResponse>> {
    let token = state.store.delete_session(id).await.map_err(chat_error)?;
    Ok(Json(DeletionResponse { token }))
}

async fn restore_session(
    State(state): State<Arc<AppState>>,
    Json(request): Json<DeletionResponse>,
) -> ApiResult<StatusCode> {
    state
        .store
        .restore_deleted(request.token)
        .await
        .map_err(chat_error)?;
    Ok(StatusCode::NO_CONTENT)
}

/// A message as shown to clients.
#[derive(Debug, Serialize)]
pub struct MessageView {
    /// Stored message.
    #[serde(flatten)]
    pub message: ChatMessage,
    /// Legacy per-kind flags.
    pub flags: WidgetFlags,
    /// Widget markup as an embeddable `data:` URL.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub widget_url: Option<String>,
}

impl From<ChatMessage> for MessageView {
    fn from(message: ChatMessage) -> Self {
        Self {
            flags: message.flags(),
            widget_url: message.widget.as_ref().and_then(Widget::data_url),
            message,
        }
    }
}

async fn list_messages(
    State(state): State<Arc<AppState>>,
    Path(id): Path<SessionId>,
) -> ApiResult<Json<Vec<MessageView>>> {
    let session = state.store.session(id).await.map_err(chat_error)?;
    Ok(Json(
        session.messages.into_iter().map(MessageView::from).collect(),
    ))
}

/// Chat request.
#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    /// The user's message.
    pub message: String,
}

async fn chat(
    State(state): State<Arc<AppState>>,
    Path(id): Path<SessionId>,
    Json(request): Json<ChatRequest>,
) -> ApiResult<Json<MessageView>> {
    let outcome = state
        .store
        .on_user_input(id, &request.message)
        .await
        .map_err(chat_error)?;
    Ok(Json(outcome.message.into()))
}

async fn abort(
    State(state): State<Arc<AppState>>,
    Path(id): Path<SessionId>,
) -> Json<serde_json::Value> {
    let aborted = state.store.abort(id);
    Json(serde_json::json!({ "aborted": aborted }))
}

async fn clear_context(
    State(state): State<Arc<AppState>>,
    Path(id): Path<SessionId>,
) -> ApiResult<StatusCode> {
    state.store.clear_context(id).await.map_err(chat_error)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn reset_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<SessionId>,
) -> ApiResult<StatusCode> {
    state.store.reset_session(id).await.map_err(chat_error)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn stop_streaming(State(state): State<Arc<AppState>>) -> StatusCode {
    state.store.abort_all();
    state.store.stop_streaming().await;
    state.store.reset_generating_status().await;
    StatusCode::NO_CONTENT
}

/// Classification request.
#[derive(Debug, Deserialize)]
pub struct ClassifyRequest {
    /// Raw model reply.
    pub reply: String,
}

/// Classification response.
#[derive(Debug, Serialize)]
pub struct ClassifyResponse {
    /// Classified reply.
    #[serde(flatten)]
    pub classified: ClassifiedResponse,
    /// Legacy per-kind flags.
    pub flags: WidgetFlags,
    /// Widget markup as an embeddable `data:` URL.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub widget_url: Option<String>,
}

async fn classify(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ClassifyRequest>,
) -> Json<ClassifyResponse> {
    let classified = state.store.classifier().classify(&request.reply).await;
    Json(ClassifyResponse {
        flags: classified.flags(),
        widget_url: classified.widget.as_ref().and_then(Widget::data_url),
        classified,
    })
}
