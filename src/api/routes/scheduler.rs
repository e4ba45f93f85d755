//! Scheduler control.

use std::sync::Arc;

use axum::extract::State;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::api::error::{ApiResult, ValidJson, ValidPath};
use crate::api::AppState;
use crate::domain::AccountId;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/start", post(start_all))
        .route("/account", post(add_schedule))
        .route("/account/:account_id", delete(remove_schedule))
        .route("/jobs", get(list_jobs))
}

#[derive(Debug, Deserialize)]
struct ScheduleUpdate {
    account_id: i64,
    interval_minutes: u32,
}

async fn start_all(State(state): State<Arc<AppState>>) -> ApiResult<Json<Value>> {
    let jobs = state.scheduler.start_all().await?;
    Ok(Json(json!({
        "message": "Schedules started",
        "active_jobs": jobs.len(),
        "jobs": jobs,
    })))
}

async fn add_schedule(
    State(state): State<Arc<AppState>>,
    ValidJson(payload): ValidJson<ScheduleUpdate>,
) -> ApiResult<Json<Value>> {
    let (account, job) = state
        .scheduler
        .add_account(AccountId(payload.account_id), payload.interval_minutes)
        .await?;
    Ok(Json(json!({
        "message": format!("Schedule added for account {}", account.email),
        "interval_minutes": job.interval_minutes,
    })))
}

async fn remove_schedule(
    State(state): State<Arc<AppState>>,
    ValidPath(account_id): ValidPath<i64>,
) -> ApiResult<Json<Value>> {
    state.scheduler.remove_account(AccountId(account_id)).await;
    Ok(Json(json!({
        "message": format!("Schedule removed for account {account_id}"),
    })))
}

async fn list_jobs(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({ "jobs": state.scheduler.jobs().await }))
}
