//! Fetching, listing, searching and bulk-editing stored emails.

use std::sync::Arc;

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer};
use serde_json::{json, Value};

use crate::api::error::{ApiError, ApiResult, ValidJson, ValidQuery};
use crate::api::AppState;
use crate::domain::{AccountId, EmailRecordId};
use crate::providers::email::MailSource;
use crate::services::{parse_status, DEFAULT_PAGE_SIZE};
use crate::storage::queries::emails::EmailSearch;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/fetch", get(fetch))
        .route("/list", get(list))
        .route("/delete", post(delete))
        .route("/move", post(move_to_label))
        .route("/search", get(search))
        .route("/bulk/archive", post(bulk_archive))
        .route("/bulk/delete", post(bulk_delete))
        .route("/bulk/mark-read", post(bulk_mark_read))
        .route("/bulk/mark-unread", post(bulk_mark_unread))
        .route("/bulk/star", post(bulk_star))
        .route("/bulk/unstar", post(bulk_unstar))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FetchParams {
    use_sample: bool,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct ListParams {
    status: Option<String>,
    category: Option<String>,
    limit: u32,
    offset: u32,
}

impl Default for ListParams {
    fn default() -> Self {
        Self {
            status: None,
            category: None,
            limit: DEFAULT_PAGE_SIZE,
            offset: 0,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct SearchParams {
    #[serde(alias = "q")]
    query: Option<String>,
    from_email: Option<String>,
    subject: Option<String>,
    category: Option<String>,
    status: Option<String>,
    is_read: Option<bool>,
    is_starred: Option<bool>,
    account_id: Option<i64>,
    #[serde(deserialize_with = "flexible_datetime")]
    date_from: Option<DateTime<Utc>>,
    #[serde(deserialize_with = "flexible_datetime")]
    date_to: Option<DateTime<Utc>>,
    limit: u32,
    offset: u32,
}

impl Default for SearchParams {
    fn default() -> Self {
        Self {
            query: None,
            from_email: None,
            subject: None,
            category: None,
            status: None,
            is_read: None,
            is_starred: None,
            account_id: None,
            date_from: None,
            date_to: None,
            limit: DEFAULT_PAGE_SIZE,
            offset: 0,
        }
    }
}

#[derive(Debug, Deserialize)]
struct DeleteRequest {
    gmail_ids: Vec<String>,
    #[serde(default)]
    skip_remote: bool,
}

#[derive(Debug, Deserialize)]
struct MoveRequest {
    gmail_ids: Vec<String>,
    #[serde(default)]
    label_id: String,
    #[serde(default)]
    skip_remote: bool,
}

#[derive(Debug, Deserialize)]
struct BulkRequest {
    email_ids: Vec<i64>,
}

impl BulkRequest {
    fn ids(&self) -> Vec<EmailRecordId> {
        self.email_ids.iter().copied().map(EmailRecordId).collect()
    }
}

/// Accepts RFC 3339, a naive ISO datetime (taken as UTC) or a bare date.
fn flexible_datetime<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let Some(raw) = Option::<String>::deserialize(deserializer)? else {
        return Ok(None);
    };
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    parse_datetime(raw)
        .map(Some)
        .ok_or_else(|| serde::de::Error::custom(format!("invalid datetime: {raw}")))
}

fn parse_datetime(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

async fn fetch(
    State(state): State<Arc<AppState>>,
    ValidQuery(params): ValidQuery<FetchParams>,
) -> ApiResult<Json<Value>> {
    let max_results = state.settings.gmail.max_results;
    let records = if params.use_sample {
        state.ingest.ingest(&state.samples, None, max_results).await?
    } else {
        let source = connect(&state, "Failed to fetch from Gmail").await?;
        state.ingest.ingest(source.as_ref(), None, max_results).await?
    };

    state.metrics.record_fetch(params.use_sample, records.len());
    Ok(Json(json!({ "emails": records })))
}

async fn list(
    State(state): State<Arc<AppState>>,
    ValidQuery(params): ValidQuery<ListParams>,
) -> ApiResult<Json<Value>> {
    let status = parse_status(params.status.as_deref())?;
    let emails = state
        .emails
        .list(status, params.category, params.limit, params.offset)
        .await?;
    Ok(Json(json!({ "emails": emails })))
}

async fn delete(
    State(state): State<Arc<AppState>>,
    ValidJson(payload): ValidJson<DeleteRequest>,
) -> ApiResult<Json<Value>> {
    let deleted = state.emails.delete_by_gmail_ids(&payload.gmail_ids).await?;

    let remote = !payload.skip_remote;
    if remote {
        let source = connect(&state, "Failed to delete in Gmail").await?;
        state
            .emails
            .trash_remote(source.as_ref(), &payload.gmail_ids)
            .await;
    }

    state.metrics.record_delete(remote, deleted);
    Ok(Json(json!({ "deleted": deleted })))
}

async fn move_to_label(
    State(state): State<Arc<AppState>>,
    ValidJson(payload): ValidJson<MoveRequest>,
) -> ApiResult<Json<Value>> {
    if payload.label_id.trim().is_empty() {
        return Err(ApiError::BadRequest("label_id is required".to_string()));
    }

    let remote = !payload.skip_remote;
    if remote {
        let source = connect(&state, "Failed to move in Gmail").await?;
        state
            .emails
            .label_remote(source.as_ref(), &payload.gmail_ids, &payload.label_id)
            .await?;
    }

    let moved = payload.gmail_ids.len();
    state.metrics.record_move(remote, moved);
    Ok(Json(json!({ "moved": moved })))
}

async fn search(
    State(state): State<Arc<AppState>>,
    ValidQuery(params): ValidQuery<SearchParams>,
) -> ApiResult<Json<Value>> {
    let search = EmailSearch {
        status: parse_status(params.status.as_deref())?,
        query: params.query,
        from_email: params.from_email,
        subject: params.subject,
        category: params.category,
        is_read: params.is_read,
        is_starred: params.is_starred,
        account_id: params.account_id.map(AccountId),
        date_from: params.date_from,
        date_to: params.date_to,
        limit: params.limit,
        offset: params.offset,
    };
    let (emails, count) = state.emails.search(search).await?;
    Ok(Json(json!({ "emails": emails, "count": count })))
}

async fn bulk_archive(
    State(state): State<Arc<AppState>>,
    ValidJson(payload): ValidJson<BulkRequest>,
) -> ApiResult<Json<Value>> {
    let count = state.emails.bulk_archive(&payload.ids()).await?;
    Ok(Json(json!({ "archived": count })))
}

async fn bulk_delete(
    State(state): State<Arc<AppState>>,
    ValidJson(payload): ValidJson<BulkRequest>,
) -> ApiResult<Json<Value>> {
    let count = state.emails.bulk_delete(&payload.ids()).await?;
    Ok(Json(json!({ "deleted": count })))
}

async fn bulk_mark_read(
    State(state): State<Arc<AppState>>,
    ValidJson(payload): ValidJson<BulkRequest>,
) -> ApiResult<Json<Value>> {
    let count = state.emails.bulk_mark_read(&payload.ids(), true).await?;
    Ok(Json(json!({ "marked_read": count })))
}

async fn bulk_mark_unread(
    State(state): State<Arc<AppState>>,
    ValidJson(payload): ValidJson<BulkRequest>,
) -> ApiResult<Json<Value>> {
    let count = state.emails.bulk_mark_read(&payload.ids(), false).await?;
    Ok(Json(json!({ "marked_unread": count })))
}

async fn bulk_star(
    State(state): State<Arc<AppState>>,
    ValidJson(payload): ValidJson<BulkRequest>,
) -> ApiResult<Json<Value>> {
    let count = state.emails.bulk_star(&payload.ids(), true).await?;
    Ok(Json(json!({ "starred": count })))
}

async fn bulk_unstar(
    State(state): State<Arc<AppState>>,
    ValidJson(payload): ValidJson<BulkRequest>,
) -> ApiResult<Json<Value>> {
    let count = state.emails.bulk_star(&payload.ids(), false).await?;
    Ok(Json(json!({ "unstarred": count })))
}

async fn connect(state: &AppState, context: &str) -> ApiResult<Arc<dyn MailSource>> {
    state
        .mailbox
        .connect()
        .await
        .map_err(|e| ApiError::Upstream(format!("{context}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn datetime_formats() {
        let expected = DateTime::parse_from_rfc3339("2024-03-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(parse_datetime("2024-03-01"), Some(expected));
        assert_eq!(parse_datetime("2024-03-01T00:00:00"), Some(expected));
        assert_eq!(parse_datetime("2024-03-01T02:00:00+02:00"), Some(expected));
        assert_eq!(parse_datetime("March 1st"), None);
    }

    #[test]
    fn search_params_accept_q_alias() {
        let params: SearchParams =
            parse_query("q=invoice&date_from=2024-01-01&limit=5");
        assert_eq!(params.query.as_deref(), Some("invoice"));
        assert!(params.date_from.is_some());
        assert_eq!(params.limit, 5);
        assert_eq!(params.offset, 0);
    }

    fn parse_query(query: &str) -> SearchParams {
        let uri: axum::http::Uri = format!("/search?{query}").parse().unwrap();
        axum::extract::Query::<SearchParams>::try_from_uri(&uri)
            .unwrap()
            .0
    }
}
