use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::adapters::StaticIdentity;
use crate::error::AppError;
use crate::ports::DateRange;
use crate::use_cases::{ConversionErrorKind, ConversionOptions, ConversionOutcome};
use crate::validation::parse_date;
use crate::AppState;

pub const ACTOR_HEADER: &str = "x-actor-id";

#[derive(Debug, Deserialize)]
pub struct StatsQuery {
    pub from: Option<String>,
    pub to: Option<String>,
}

fn actor_id(headers: &HeaderMap) -> Result<Option<Uuid>, AppError> {
    let Some(value) = headers.get(ACTOR_HEADER) else {
        return Ok(None);
    };

    let raw = value
        .to_str()
        .map_err(|_| AppError::BadRequest(format!("{} must be valid ASCII", ACTOR_HEADER)))?;
    Uuid::parse_str(raw.trim())
        .map(Some)
        .map_err(|_| AppError::BadRequest(format!("{} must be a UUID", ACTOR_HEADER)))
}

fn outcome_status(outcome: &ConversionOutcome) -> StatusCode {
    match outcome {
        ConversionOutcome::Converted(_) => StatusCode::CREATED,
        ConversionOutcome::Failed(failure) => match failure.kind {
            ConversionErrorKind::Validation => StatusCode::BAD_REQUEST,
            ConversionErrorKind::NotFound => StatusCode::NOT_FOUND,
            ConversionErrorKind::Integrity => StatusCode::CONFLICT,
            ConversionErrorKind::BusinessRule => StatusCode::UNPROCESSABLE_ENTITY,
            ConversionErrorKind::Persistence => StatusCode::INTERNAL_SERVER_ERROR,
        },
    }
}

/// An empty body means default options.
pub async fn convert_document(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    let options: ConversionOptions = if body.iter().all(u8::is_ascii_whitespace) {
        ConversionOptions::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| AppError::BadRequest(format!("Invalid conversion options: {}", e)))?
    };

    let converter = state
        .converter
        .for_actor(Arc::new(StaticIdentity(actor_id(&headers)?)));
    let outcome = converter.convert(&id, options).await;

    Ok((outcome_status(&outcome), Json(outcome)))
}

pub async fn list_conversions(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let conversions = state.history.history(id).await?;

    Ok(Json(conversions))
}

pub async fn verify_conversion(
    State(state): State<AppState>,
    Path((id, derived_id)): Path<(Uuid, Uuid)>,
) -> Result<impl IntoResponse, AppError> {
    let report = state.verifier.verify(id, derived_id).await;

    Ok(Json(report))
}

/// `from` and `to` are inclusive calendar dates. Without `from` the range
/// starts at the epoch; without `to` it ends now.
pub async fn conversion_stats(
    State(state): State<AppState>,
    Path(tenant_id): Path<Uuid>,
    Query(query): Query<StatsQuery>,
) -> Result<impl IntoResponse, AppError> {
    let range = DateRange::from_days(
        query.from.as_deref().map(|raw| parse_date("from", raw)).transpose()?,
        query.to.as_deref().map(|raw| parse_date("to", raw)).transpose()?,
    );

    if range.is_empty() {
        return Err(AppError::Validation("from must not be after to".to_string()));
    }

    let stats = state.history.stats(tenant_id, range).await?;

    Ok(Json(stats))
}
