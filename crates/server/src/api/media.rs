//! Media operation handlers.

use axum::{
    extract::{Multipart, Query, State},
    response::Response,
    Json,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use reframe_core::{MediaMetadata, Operation, PipelineError};

use super::delivery::stream_delivery;
use super::error::ApiError;
use super::upload::{receive, UploadForm};
use crate::state::AppState;

/// Parses an optional seconds value from a form or query string.
fn parse_time(raw: Option<&str>) -> Result<Option<f64>, PipelineError> {
    match raw.map(str::trim).filter(|v| !v.is_empty()) {
        None => Ok(None),
        Some(v) => v
            .parse::<f64>()
            .map(Some)
            .map_err(|_| PipelineError::validation(format!("Invalid time value: '{}'", v))),
    }
}

fn is_truthy(raw: Option<&str>) -> bool {
    matches!(
        raw.map(|v| v.trim().to_ascii_lowercase()).as_deref(),
        Some("1" | "true" | "yes" | "on")
    )
}

/// POST /info
pub async fn info(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Json<MediaMetadata>, ApiError> {
    let UploadForm { job, .. } = receive(&state, Operation::Info, multipart).await?;
    let metadata = state.orchestrator().info(job).await?;
    Ok(Json(metadata))
}

#[derive(Debug, Default, Deserialize)]
pub struct ProbeQuery {
    pub url: Option<String>,
    pub thumbnail: Option<String>,
    pub format: Option<String>,
    pub time: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ThumbnailPayload {
    pub format: String,
    pub content_type: &'static str,
    /// Base64 (standard alphabet) image bytes.
    pub data: String,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum ProbeResponse {
    Metadata(MediaMetadata),
    WithThumbnail {
        metadata: MediaMetadata,
        thumbnail: ThumbnailPayload,
    },
}

/// GET /probe?url=...[&thumbnail=true&format=...&time=...]
pub async fn probe(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ProbeQuery>,
) -> Result<Json<ProbeResponse>, ApiError> {
    let url = query.url.as_deref().unwrap_or("");

    if !is_truthy(query.thumbnail.as_deref()) {
        let metadata = state.orchestrator().probe(url).await?;
        return Ok(Json(ProbeResponse::Metadata(metadata)));
    }

    let time = parse_time(query.time.as_deref())?;
    let result = state
        .orchestrator()
        .probe_with_thumbnail(url, query.format.as_deref(), time)
        .await?;

    Ok(Json(ProbeResponse::WithThumbnail {
        metadata: result.metadata,
        thumbnail: ThumbnailPayload {
            format: result.thumbnail.format.extension().to_string(),
            content_type: result.thumbnail.content_type,
            data: STANDARD.encode(&result.thumbnail.bytes),
        },
    }))
}

/// POST /convert (multipart: file, format)
pub async fn convert(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Response, ApiError> {
    let form = receive(&state, Operation::Convert, multipart).await?;
    let format = form.field("format").map(str::to_string);
    let delivery = state
        .orchestrator()
        .convert(form.job, format.as_deref())
        .await?;
    stream_delivery(delivery).await
}

/// POST /screenshot (multipart: file, format, time)
pub async fn screenshot(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Response, ApiError> {
    let form = receive(&state, Operation::Screenshot, multipart).await?;
    let format = form.field("format").map(str::to_string);
    let time = match parse_time(form.field("time")) {
        Ok(time) => time,
        Err(e) => return Err(state.orchestrator().abandon(form.job, e).await.into()),
    };
    let delivery = state
        .orchestrator()
        .screenshot(form.job, format.as_deref(), time)
        .await?;
    stream_delivery(delivery).await
}

/// POST /remove-letterbox (multipart: file, format)
pub async fn remove_letterbox(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Response, ApiError> {
    let form = receive(&state, Operation::RemoveLetterbox, multipart).await?;
    let format = form.field("format").map(str::to_string);
    let delivery = state
        .orchestrator()
        .remove_letterbox(form.job, format.as_deref())
        .await?;
    stream_delivery(delivery).await
}
