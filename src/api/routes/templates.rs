//! Reply templates and rendering.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::api::error::{ApiResult, ValidJson, ValidPath, ValidQuery};
use crate::api::AppState;
use crate::domain::{AccountId, NewTemplate, RenderedTemplate, TemplateId, TemplateUpdate};

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_templates).post(create_template))
        .route("/render", post(render_by_body))
        .route(
            "/:template_id",
            get(get_template)
                .patch(update_template)
                .delete(delete_template),
        )
        .route("/:template_id/render", post(render_template))
        .route("/:template_id/variables", get(template_variables))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ListParams {
    category: Option<String>,
    account_id: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RenderRequest {
    variables: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct RenderByIdRequest {
    template_id: i64,
    #[serde(default)]
    variables: HashMap<String, String>,
}

async fn create_template(
    State(state): State<Arc<AppState>>,
    ValidJson(payload): ValidJson<NewTemplate>,
) -> ApiResult<Json<Value>> {
    let template = state.templates.create(&payload).await?;
    Ok(Json(json!({ "template": template })))
}

async fn list_templates(
    State(state): State<Arc<AppState>>,
    ValidQuery(params): ValidQuery<ListParams>,
) -> ApiResult<Json<Value>> {
    let templates = state
        .templates
        .list(params.category, params.account_id.map(AccountId))
        .await?;
    Ok(Json(json!({ "templates": templates })))
}

async fn get_template(
    State(state): State<Arc<AppState>>,
    ValidPath(id): ValidPath<i64>,
) -> ApiResult<Json<Value>> {
    let template = state.templates.get(TemplateId(id)).await?;
    Ok(Json(json!({ "template": template })))
}

async fn update_template(
    State(state): State<Arc<AppState>>,
    ValidPath(id): ValidPath<i64>,
    ValidJson(payload): ValidJson<TemplateUpdate>,
) -> ApiResult<Json<Value>> {
    let template = state.templates.update(TemplateId(id), &payload).await?;
    Ok(Json(json!({ "template": template })))
}

async fn delete_template(
    State(state): State<Arc<AppState>>,
    ValidPath(id): ValidPath<i64>,
) -> ApiResult<Json<Value>> {
    state.templates.delete(TemplateId(id)).await?;
    Ok(Json(json!({ "deleted": true })))
}

async fn render_template(
    State(state): State<Arc<AppState>>,
    ValidPath(id): ValidPath<i64>,
    ValidJson(payload): ValidJson<RenderRequest>,
) -> ApiResult<Json<RenderedTemplate>> {
    let rendered = state
        .templates
        .render(TemplateId(id), &payload.variables)
        .await?;
    Ok(Json(rendered))
}

async fn render_by_body(
    State(state): State<Arc<AppState>>,
    ValidJson(payload): ValidJson<RenderByIdRequest>,
) -> ApiResult<Json<RenderedTemplate>> {
    let rendered = state
        .templates
        .render(TemplateId(payload.template_id), &payload.variables)
        .await?;
    Ok(Json(rendered))
}

async fn template_variables(
    State(state): State<Arc<AppState>>,
    ValidPath(id): ValidPath<i64>,
) -> ApiResult<Json<Value>> {
    let variables = state.templates.variables(TemplateId(id)).await?;
    Ok(Json(json!({ "variables": variables })))
}
