use axum::{
    Json,
    body::{Body, Bytes},
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode, header},
    response::IntoResponse,
};
use chrono::Utc;
use http_body_util::{BodyExt, LengthLimitError, Limited};
use std::collections::HashMap;

use super::{
    models::{HealthResponse, ResultEntry, ResultsQuery, ResultsResponse, UploadAccepted, UploadQuery},
    state::AppState,
};
use crate::api::error::ApiError;
use crate::humanize::time_since;

/// Upper bound for `?limit=` on the results endpoint
const MAX_RESULTS_LIMIT: usize = 1000;

/// Image upload endpoint (POST /upload?camera=<id>)
///
/// The body is the raw image (optionally gzip-encoded). The image is
/// normalized, stored and queued; the response is sent before any inference
/// runs.
///
/// ## Responses:
/// - 202 Accepted with the assigned image id/name
/// - 400 for undecodable images or invalid camera ids
/// - 413 when the body exceeds `server.api.max_upload_bytes`
/// - 415 for non-image content types
/// - 503 when every worker queue is full
pub async fn upload_image(
    State(state): State<AppState>,
    Query(query): Query<UploadQuery>,
    headers: HeaderMap,
    body: Body,
) -> Result<impl IntoResponse, ApiError> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .map(|v| {
            v.to_str()
                .map_err(|_| ApiError::InvalidPayload("Content-Type is not valid ASCII".into()))
        })
        .transpose()?;
    super::utils::check_upload_content_type(content_type)?;

    let max_size = state.config.server.api.max_upload_bytes.as_usize();
    let data = read_body(body, max_size).await?;

    let accepted = state.intake.accept(data, query.camera.as_deref()).await?;

    let response = UploadAccepted {
        image_id: accepted.image_id,
        image_name: accepted.image_name,
        camera: accepted.camera,
        status: "queued".to_string(),
    };

    Ok((StatusCode::ACCEPTED, Json(response)))
}

/// Reads request body, enforcing the size limit while streaming
///
/// Decompression is handled by RequestDecompressionLayer, so the limit applies
/// to the decompressed size.
async fn read_body(body: Body, max_size: usize) -> Result<Bytes, ApiError> {
    let data = Limited::new(body, max_size)
        .collect()
        .await
        .map_err(|err| {
            if err.downcast_ref::<LengthLimitError>().is_some() {
                ApiError::PayloadTooLarge(max_size)
            } else {
                ApiError::InvalidPayload(format!("failed to read body: {err}"))
            }
        })?
        .to_bytes();

    super::utils::validate_body_size(&data, max_size)?;

    Ok(data)
}

/// Recent results endpoint (GET /api/results?limit=<n>)
///
/// Newest first, joined with catalog data. Labels missing from the catalog
/// are shown as plant/disease "Unknown".
pub async fn recent_results(
    State(state): State<AppState>,
    Query(query): Query<ResultsQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let limit = query
        .limit
        .unwrap_or(state.config.server.recent_limit)
        .min(MAX_RESULTS_LIMIT);

    let records = state.ledger.recent(limit).await?;
    let now = Utc::now();

    let results = records
        .into_iter()
        .map(|record| {
            let lookup = state.catalog.lookup(&record.label);
            let entry = lookup.entry();

            ResultEntry {
                timestamp: record.timestamp,
                time_since: time_since(record.timestamp, now),
                image_url: format!("/images/{}", record.image_name),
                inference: record.label.clone(),
                confidence: record.confidence,
                camera: record.camera,
                image_name: record.image_name,
                plant_name: entry.plant_name.clone(),
                disease: entry.disease.clone(),
                description: entry.description.clone(),
                cure: entry.cure.clone(),
            }
        })
        .collect();

    Ok((StatusCode::OK, Json(ResultsResponse { results })))
}

/// Stored image endpoint (GET /images/{name})
pub async fn get_image(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    super::validation::validate_image_name(&name)
        .map_err(|_| ApiError::NotFound(format!("image {name}")))?;

    let data = state.storage.download(&name).await?;

    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, mime::IMAGE_JPEG.to_string())],
        data,
    ))
}

fn status_of(healthy: bool) -> String {
    let status = if healthy { "healthy" } else { "unhealthy" };
    status.to_string()
}

/// Health check endpoint (GET /health)
///
/// Returns 503 Service Unavailable if any component is unhealthy.
/// Returns 200 OK otherwise.
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let mut components = HashMap::new();

    components.insert("api".to_string(), status_of(true));
    components.insert("workers".to_string(), status_of(state.broker.health_check()));
    components.insert("ledger".to_string(), status_of(state.ledger.path().exists()));
    components.insert("storage".to_string(), status_of(true));
    components.insert("catalog".to_string(), status_of(!state.catalog.is_empty()));

    let all_healthy = components.values().all(|status| status == "healthy");
    let overall_status = if all_healthy { "healthy" } else { "unhealthy" };

    let status_code = if all_healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let response = HealthResponse {
        status: overall_status.to_string(),
        components,
        alert_sink: state.alert_sink,
        version: env!("CARGO_PKG_VERSION").to_string(),
        metrics: state.metrics.snapshot(),
    };

    (status_code, Json(response))
}
