//! Multipart upload decoding.
//!
//! The `file` field is streamed straight to the path the job registered
//! for it; every other field is collected as text. A second file, or a
//! file under any other field name, is rejected before it is read.

use axum::extract::Multipart;
use std::collections::HashMap;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use reframe_core::{Job, Operation, PipelineError};

use super::error::ApiError;
use crate::metrics::UPLOAD_BYTES_TOTAL;
use crate::state::AppState;

/// A job with its upload on disk plus the form's text fields.
pub struct UploadForm {
    pub job: Job,
    pub fields: HashMap<String, String>,
}

impl UploadForm {
    /// A non-empty text field.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }
}

/// Opens a job for `operation` and stores the uploaded file for it.
///
/// On failure the job is closed (removing any partial upload) before the
/// error is returned.
pub async fn receive(
    state: &AppState,
    operation: Operation,
    mut multipart: Multipart,
) -> Result<UploadForm, ApiError> {
    let mut job = state.orchestrator().begin(operation);
    let mut fields = HashMap::new();

    match read_fields(&mut job, &mut multipart, &mut fields).await {
        Ok(()) => Ok(UploadForm { job, fields }),
        Err(e) => Err(state.orchestrator().abandon(job, e).await.into()),
    }
}

async fn read_fields(
    job: &mut Job,
    multipart: &mut Multipart,
    fields: &mut HashMap<String, String>,
) -> Result<(), PipelineError> {
    let mut file_seen = false;

    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|e| PipelineError::validation(format!("Invalid multipart body: {}", e)))?
    {
        let name = field.name().unwrap_or("").to_string();
        if name == "file" {
            if file_seen {
                return Err(PipelineError::validation(
                    "Only one file may be uploaded per request",
                ));
            }
            file_seen = true;
            let original_name = field.file_name().unwrap_or("upload").to_string();
            let path = job.stage_input(&original_name);

            let mut out = tokio::fs::File::create(&path).await.map_err(|e| {
                PipelineError::resource(format!("Failed to store upload: {}", e))
            })?;
            let mut written: u64 = 0;
            while let Some(chunk) = field.chunk().await.map_err(|e| {
                PipelineError::validation(format!("Failed to read file: {}", e))
            })? {
                out.write_all(&chunk).await.map_err(|e| {
                    PipelineError::resource(format!("Failed to store upload: {}", e))
                })?;
                written += chunk.len() as u64;
            }
            out.flush()
                .await
                .map_err(|e| PipelineError::resource(format!("Failed to store upload: {}", e)))?;

            UPLOAD_BYTES_TOTAL.inc_by(written);
            debug!(job_id = job.id(), bytes = written, "Stored upload {}", original_name);
        } else if field.file_name().is_some() {
            return Err(PipelineError::validation(format!(
                "Unexpected file in field '{}'",
                name
            )));
        } else {
            let text = field.text().await.map_err(|e| {
                PipelineError::validation(format!("Failed to read field '{}': {}", name, e))
            })?;
            fields.insert(name, text);
        }
    }

    Ok(())
}
