//! Conversation threads.

use std::sync::Arc;

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::api::error::{ApiError, ApiResult, ValidPath, ValidQuery};
use crate::api::AppState;
use crate::domain::{AccountId, ThreadId};
use crate::storage::queries::threads::ThreadFilter;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_threads))
        .route("/:thread_id", get(get_thread))
        .route("/:thread_id/emails", get(thread_emails))
        .route("/:thread_id/archive", post(archive_thread))
        .route("/:thread_id/unarchive", post(unarchive_thread))
        .route("/:thread_id/refresh", post(refresh_thread))
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct ListParams {
    account_id: Option<i64>,
    unread_only: bool,
    archived_only: bool,
    limit: u32,
    offset: u32,
}

impl Default for ListParams {
    fn default() -> Self {
        let filter = ThreadFilter::default();
        Self {
            account_id: None,
            unread_only: false,
            archived_only: false,
            limit: filter.limit,
            offset: 0,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct EmailsParams {
    limit: u32,
}

impl Default for EmailsParams {
    fn default() -> Self {
        Self { limit: 100 }
    }
}

async fn list_threads(
    State(state): State<Arc<AppState>>,
    ValidQuery(params): ValidQuery<ListParams>,
) -> ApiResult<Json<Value>> {
    let filter = ThreadFilter {
        account_id: params.account_id.map(AccountId),
        unread_only: params.unread_only,
        archived_only: params.archived_only,
        limit: params.limit,
        offset: params.offset,
    };
    let threads = state.threads.list(&filter).await?;
    Ok(Json(json!({ "count": threads.len(), "threads": threads })))
}

async fn get_thread(
    State(state): State<Arc<AppState>>,
    ValidPath(thread_id): ValidPath<String>,
) -> ApiResult<Json<Value>> {
    let thread = state.threads.get(&ThreadId(thread_id)).await?;
    Ok(Json(json!({ "thread": thread })))
}

async fn thread_emails(
    State(state): State<Arc<AppState>>,
    ValidPath(thread_id): ValidPath<String>,
    ValidQuery(params): ValidQuery<EmailsParams>,
) -> ApiResult<Json<Value>> {
    let emails = state
        .threads
        .get_thread_emails(&ThreadId(thread_id), params.limit)
        .await?;
    if emails.is_empty() {
        return Err(ApiError::NotFound("Thread not found or empty".to_string()));
    }
    Ok(Json(json!({ "count": emails.len(), "emails": emails })))
}

async fn archive_thread(
    State(state): State<Arc<AppState>>,
    ValidPath(thread_id): ValidPath<String>,
) -> ApiResult<Json<Value>> {
    state.threads.archive(&ThreadId(thread_id)).await?;
    Ok(Json(json!({ "archived": true })))
}

async fn unarchive_thread(
    State(state): State<Arc<AppState>>,
    ValidPath(thread_id): ValidPath<String>,
) -> ApiResult<Json<Value>> {
    state.threads.unarchive(&ThreadId(thread_id)).await?;
    Ok(Json(json!({ "unarchived": true })))
}

async fn refresh_thread(
    State(state): State<Arc<AppState>>,
    ValidPath(thread_id): ValidPath<String>,
) -> ApiResult<Json<Value>> {
    let thread = state
        .threads
        .update_thread_stats(&ThreadId(thread_id))
        .await?;
    Ok(Json(json!({ "thread": thread })))
}
