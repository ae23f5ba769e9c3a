// HTTP boundary
//
// POST /api/chat  -> text/event-stream of protocol events
// GET  /healthz   -> 200 OK
//
// Errors before the first event are JSON responses; later ones abort the
// event stream, and an absent `[DONE]` is the client's failure signal.

use crate::adapter::{self, AdapterOptions};
use crate::conversation::{self, ChatBody};
use crate::error::ChatError;
use crate::provider::Provider;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::sse::Sse;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use std::sync::Arc;
use tokio_stream::StreamExt;

/// Resolves the provider for one request.
///
/// Called per request so credentials are read at call time; a missing
/// credential fails here, before any provider call.
pub trait ProviderSource: Send + Sync {
    fn provider(&self) -> Result<Arc<dyn Provider>, ChatError>;
}

#[derive(Clone)]
pub struct AppState {
    pub providers: Arc<dyn ProviderSource>,
    pub options: AdapterOptions,
}

pub async fn healthz() -> StatusCode {
    StatusCode::OK
}

pub async fn chat_handler(
    State(state): State<AppState>,
    body: Result<Json<ChatBody>, JsonRejection>,
) -> Response {
    match start_chat(&state, body).await {
        Ok(resp) => resp,
        Err(e) => {
            tracing::error!(error = %e, "chat request failed");
            e.into_response()
        }
    }
}

async fn start_chat(
    state: &AppState,
    body: Result<Json<ChatBody>, JsonRejection>,
) -> Result<Response, ChatError> {
    let Json(body) = body.map_err(|e| ChatError::InvalidRequest(e.body_text()))?;
    tracing::info!(
        thread_id = body.thread_id.as_deref().unwrap_or("-"),
        messages = body.messages.len(),
        "chat request"
    );

    let provider = state.providers.provider()?;
    let messages = conversation::project(&body.messages);
    let events = adapter::respond(provider.as_ref(), messages, &state.options).await?;

    let frames = events.map(|item| {
        item.and_then(|event| event.to_sse()).inspect_err(|e| {
            tracing::error!(error = %e, "aborting event stream");
        })
    });
    Ok(Sse::new(frames).into_response())
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/chat", post(chat_handler))
        .route("/healthz", get(healthz))
        .with_state(state)
}
