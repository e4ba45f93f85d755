//! Account registration and settings.

use std::sync::Arc;

use axum::extract::State;
use axum::routing::{get, patch};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::api::error::{ApiResult, ValidJson, ValidPath, ValidQuery};
use crate::api::AppState;
use crate::domain::{AccountId, AccountSettingsUpdate, NewAccount, TokenUpdate};

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_accounts).post(create_account))
        .route(
            "/:account_id",
            get(get_account).patch(update_account).delete(delete_account),
        )
        .route("/:account_id/tokens", patch(update_tokens))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ListParams {
    active_only: bool,
}

async fn create_account(
    State(state): State<Arc<AppState>>,
    ValidJson(payload): ValidJson<NewAccount>,
) -> ApiResult<Json<Value>> {
    let account = state.accounts.create(&payload).await?;
    Ok(Json(json!({ "account": account })))
}

async fn list_accounts(
    State(state): State<Arc<AppState>>,
    ValidQuery(params): ValidQuery<ListParams>,
) -> ApiResult<Json<Value>> {
    let accounts = state.accounts.list(params.active_only).await?;
    Ok(Json(json!({ "accounts": accounts })))
}

async fn get_account(
    State(state): State<Arc<AppState>>,
    ValidPath(id): ValidPath<i64>,
) -> ApiResult<Json<Value>> {
    let account = state.accounts.get(AccountId(id)).await?;
    Ok(Json(json!({ "account": account })))
}

async fn update_account(
    State(state): State<Arc<AppState>>,
    ValidPath(id): ValidPath<i64>,
    ValidJson(payload): ValidJson<AccountSettingsUpdate>,
) -> ApiResult<Json<Value>> {
    let account = state.accounts.update_settings(AccountId(id), &payload).await?;
    Ok(Json(json!({ "account": account })))
}

async fn update_tokens(
    State(state): State<Arc<AppState>>,
    ValidPath(id): ValidPath<i64>,
    ValidJson(payload): ValidJson<TokenUpdate>,
) -> ApiResult<Json<Value>> {
    let account = state.accounts.update_tokens(AccountId(id), &payload).await?;
    Ok(Json(json!({ "account": account })))
}

async fn delete_account(
    State(state): State<Arc<AppState>>,
    ValidPath(id): ValidPath<i64>,
) -> ApiResult<Json<Value>> {
    let account_id = AccountId(id);
    state.accounts.delete(account_id).await?;
    state.scheduler.remove_account(account_id).await;
    Ok(Json(json!({ "deleted": true })))
}
