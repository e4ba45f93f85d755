//! Reply drafting, summaries and rewrites.

use std::sync::Arc;

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use crate::api::error::{ApiResult, ValidJson};
use crate::api::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/reply", post(reply))
        .route("/gemini/summarize", post(summarize))
        .route("/gemini/actions", post(actions))
        .route("/gemini/rewrite", post(rewrite))
}

#[derive(Debug, Deserialize)]
struct PromptRequest {
    prompt: String,
}

#[derive(Debug, Deserialize)]
struct RewriteRequest {
    text: String,
    tone: String,
}

#[derive(Debug, Serialize)]
struct ReplyResponse {
    reply: String,
}

async fn reply(
    State(state): State<Arc<AppState>>,
    ValidJson(request): ValidJson<PromptRequest>,
) -> ApiResult<Json<ReplyResponse>> {
    let reply = state.assistant.reply(&request.prompt).await?;
    Ok(Json(ReplyResponse { reply }))
}

async fn summarize(
    State(state): State<Arc<AppState>>,
    ValidJson(request): ValidJson<PromptRequest>,
) -> ApiResult<Json<ReplyResponse>> {
    let reply = state.assistant.summarize(&request.prompt).await?;
    Ok(Json(ReplyResponse { reply }))
}

async fn actions(
    State(state): State<Arc<AppState>>,
    ValidJson(request): ValidJson<PromptRequest>,
) -> ApiResult<Json<ReplyResponse>> {
    let reply = state.assistant.extract_actions(&request.prompt).await?;
    Ok(Json(ReplyResponse { reply }))
}

async fn rewrite(
    State(state): State<Arc<AppState>>,
    ValidJson(request): ValidJson<RewriteRequest>,
) -> ApiResult<Json<ReplyResponse>> {
    let reply = state.assistant.rewrite(&request.text, &request.tone).await?;
    Ok(Json(ReplyResponse { reply }))
}
