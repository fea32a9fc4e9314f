//! Request handlers: the proxying chat endpoint and the health probe.

use crate::error::ApiError;
use crate::state::AppState;
use axum::body::Body;
use axum::extract::State;
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::Json;
use bytes::Bytes;
use localrouter_core::{ChatRequest, ChatStreamChunk, Provider};
use std::convert::Infallible;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info};

/// Capacity of the provider-to-client chunk channel. Small on purpose: the
/// producer should feel backpressure from a slow client instead of buffering
/// the whole completion.
const STREAM_CHANNEL_CAPACITY: usize = 16;

/// `GET /health`
pub async fn health() -> &'static str {
    "OK"
}

/// `POST /v1/chat/completions`
///
/// Decodes the body (400), selects a provider (500), overwrites the model
/// with the routed target, and proxies either the sync response or the SSE
/// stream (upstream failures map to 502).
pub async fn chat_completions(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Response, ApiError> {
    let mut req: ChatRequest =
        serde_json::from_slice(&body).map_err(|_| ApiError::bad_request())?;

    let strategy = state.strategy.get();
    let (provider, target_model) = state
        .engine
        .select_provider(&req, &strategy)
        .await
        .map_err(|e| {
            error!(error = %e, "routing failed");
            ApiError::routing()
        })?;

    req.model = target_model;
    info!(
        provider = provider.name(),
        model = %req.model,
        stream = req.stream,
        "provider selected"
    );

    if req.stream {
        handle_stream(provider, req).await
    } else {
        handle_sync(provider, req).await
    }
}

async fn handle_sync(
    provider: Arc<dyn Provider>,
    req: ChatRequest,
) -> Result<Response, ApiError> {
    let response = provider.chat_completion(req).await.map_err(|e| {
        error!(provider = provider.name(), error = %e, "upstream error");
        ApiError::bad_gateway()
    })?;
    Ok(Json(response).into_response())
}

async fn handle_stream(
    provider: Arc<dyn Provider>,
    req: ChatRequest,
) -> Result<Response, ApiError> {
    let (tx, mut rx) = mpsc::channel::<ChatStreamChunk>(STREAM_CHANNEL_CAPACITY);

    provider.chat_completion_stream(req, tx).await.map_err(|e| {
        error!(provider = provider.name(), error = %e, "upstream stream init error");
        ApiError::bad_gateway()
    })?;

    // Client disconnect drops this body stream, which drops `rx`; the
    // provider's producer task then fails its next send and exits.
    let frames = async_stream::stream! {
        while let Some(chunk) = rx.recv().await {
            match serde_json::to_vec(&chunk) {
                Ok(json) => {
                    let mut frame = Vec::with_capacity(json.len() + 8);
                    frame.extend_from_slice(b"data: ");
                    frame.extend_from_slice(&json);
                    frame.extend_from_slice(b"\n\n");
                    yield Ok::<_, Infallible>(Bytes::from(frame));
                }
                Err(e) => {
                    error!(error = %e, "failed to encode stream chunk");
                }
            }
        }
        // Channel closed by the producer: the stream is complete.
        yield Ok(Bytes::from_static(b"data: [DONE]\n\n"));
    };

    Response::builder()
        .header(header::CONTENT_TYPE, "text/event-stream")
        .header(header::CACHE_CONTROL, "no-cache")
        .header(header::CONNECTION, "keep-alive")
        .body(Body::from_stream(frames))
        .map_err(|e| {
            error!(error = %e, "failed to build stream response");
            ApiError::internal()
        })
}
