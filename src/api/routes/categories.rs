//! Category CRUD.

use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::api::error::{ApiResult, ValidJson, ValidPath, ValidQuery};
use crate::api::AppState;
use crate::domain::{AccountId, CategoryId, CategoryUpdate, NewCategory};

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_categories).post(create_category))
        .route(
            "/:category_id",
            get(get_category)
                .patch(update_category)
                .delete(delete_category),
        )
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct ListParams {
    account_id: Option<i64>,
    include_global: bool,
}

impl Default for ListParams {
    fn default() -> Self {
        Self {
            account_id: None,
            include_global: true,
        }
    }
}

async fn create_category(
    State(state): State<Arc<AppState>>,
    ValidJson(payload): ValidJson<NewCategory>,
) -> ApiResult<Json<Value>> {
    let category = state.categories.create(&payload).await?;
    Ok(Json(json!({ "category": category })))
}

async fn list_categories(
    State(state): State<Arc<AppState>>,
    ValidQuery(params): ValidQuery<ListParams>,
) -> ApiResult<Json<Value>> {
    let categories = state
        .categories
        .list(params.account_id.map(AccountId), params.include_global)
        .await?;
    Ok(Json(json!({ "categories": categories })))
}

async fn get_category(
    State(state): State<Arc<AppState>>,
    ValidPath(id): ValidPath<i64>,
) -> ApiResult<Json<Value>> {
    let category = state.categories.get(CategoryId(id)).await?;
    Ok(Json(json!({ "category": category })))
}

async fn update_category(
    State(state): State<Arc<AppState>>,
    ValidPath(id): ValidPath<i64>,
    ValidJson(payload): ValidJson<CategoryUpdate>,
) -> ApiResult<Json<Value>> {
    let category = state.categories.update(CategoryId(id), &payload).await?;
    Ok(Json(json!({ "category": category })))
}

async fn delete_category(
    State(state): State<Arc<AppState>>,
    ValidPath(id): ValidPath<i64>,
) -> ApiResult<Json<Value>> {
    state.categories.delete(CategoryId(id)).await?;
    Ok(Json(json!({ "deleted": true })))
}
