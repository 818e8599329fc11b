//! Streaming of produced files back to the caller.

use axum::{
    body::{Body, Bytes},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use futures::stream;
use tokio::io::AsyncReadExt;

use reframe_core::{Delivery, PipelineError};

use super::error::ApiError;

const CHUNK_SIZE: usize = 64 * 1024;

/// Responds with the delivered file.
///
/// The body stream owns the artifact; the file is deleted when the stream
/// ends or when the body is dropped because the client went away.
pub async fn stream_delivery(delivery: Delivery) -> Result<Response, ApiError> {
    let Delivery {
        artifact,
        file_name,
        content_type,
    } = delivery;

    let file = tokio::fs::File::open(artifact.path())
        .await
        .map_err(|e| PipelineError::resource(format!("Failed to open output: {}", e)))?;
    let size = artifact
        .size()
        .await
        .map_err(|e| PipelineError::resource(format!("Failed to stat output: {}", e)))?;
    let job_id = artifact.job_id().to_string();

    let body = Body::from_stream(stream::try_unfold(
        (file, artifact),
        |(mut file, artifact)| async move {
            let mut buf = vec![0u8; CHUNK_SIZE];
            let n = file.read(&mut buf).await?;
            if n == 0 {
                return Ok::<_, std::io::Error>(None);
            }
            buf.truncate(n);
            Ok(Some((Bytes::from(buf), (file, artifact))))
        },
    ));

    let mut response = (StatusCode::OK, body).into_response();
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(size));
    if let Ok(value) = HeaderValue::from_str(&format!("attachment; filename=\"{}\"", file_name)) {
        headers.insert(header::CONTENT_DISPOSITION, value);
    }
    if let Ok(value) = HeaderValue::from_str(&job_id) {
        headers.insert("x-job-id", value);
    }
    Ok(response)
}
