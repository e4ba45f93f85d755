//! Ad-hoc classification of a single email.

use std::sync::Arc;

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::api::error::{ApiError, ApiResult, ValidJson};
use crate::api::AppState;
use crate::domain::{truncate_chars, AccountId, NewEmail, SNIPPET_MAX_CHARS};
use crate::services::ensure_max_len;

const MAX_SUBJECT_CHARS: usize = 500;
const MAX_BODY_CHARS: usize = 12_000;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/email", post(categorize_email))
}

#[derive(Debug, Deserialize)]
struct EmailPayload {
    subject: String,
    body: String,
    #[serde(default)]
    gmail_id: Option<String>,
    #[serde(default)]
    from_email: Option<String>,
    #[serde(default)]
    account_id: Option<i64>,
}

async fn categorize_email(
    State(state): State<Arc<AppState>>,
    ValidJson(payload): ValidJson<EmailPayload>,
) -> ApiResult<Json<Value>> {
    ensure_max_len("subject", &payload.subject, MAX_SUBJECT_CHARS)?;
    ensure_max_len("body", &payload.body, MAX_BODY_CHARS)?;

    let message = NewEmail {
        gmail_id: payload.gmail_id,
        subject: Some(payload.subject),
        snippet: Some(truncate_chars(&payload.body, SNIPPET_MAX_CHARS)),
        body_text: Some(payload.body),
        from_email: payload.from_email,
        ..Default::default()
    };

    let record = state
        .ingest
        .ingest_messages(vec![message], payload.account_id.map(AccountId))
        .await?
        .pop()
        .ok_or_else(|| ApiError::Internal("categorized email was not stored".to_string()))?;

    Ok(Json(json!({
        "category": record.category,
        "sentiment": record.sentiment,
        "urgency": record.urgency,
        "email": record,
    })))
}
