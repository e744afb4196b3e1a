use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::AppError;
use crate::use_cases::{DocumentQuery, GenerationRequest};
use crate::AppState;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StatusChange {
    pub status: String,
}

pub async fn generate_document(
    State(state): State<AppState>,
    Path(tenant_id): Path<Uuid>,
    Json(request): Json<GenerationRequest>,
) -> Result<impl IntoResponse, AppError> {
    let generated = state.generator.generate(tenant_id, request).await?;

    Ok((StatusCode::CREATED, Json(generated)))
}

pub async fn list_documents(
    State(state): State<AppState>,
    Path(tenant_id): Path<Uuid>,
    Query(query): Query<DocumentQuery>,
) -> Result<impl IntoResponse, AppError> {
    let documents = state.lister.execute(tenant_id, query).await?;

    Ok(Json(documents))
}

pub async fn update_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(change): Json<StatusChange>,
) -> Result<impl IntoResponse, AppError> {
    let document = state.status_updater.execute(&id, &change.status).await?;

    Ok(Json(document))
}
