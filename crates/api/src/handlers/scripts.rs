//! Handlers for processor listing and execution.

use axum::extract::multipart::{MultipartError, MultipartRejection};
use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::Json;
use docrelay_core::error::CoreError;
use docrelay_core::staging::StagingStore;
use serde::Serialize;

use crate::error::{AppError, AppResult};
use crate::state::AppState;

/// `GET /api/scripts` response.
#[derive(Debug, Serialize)]
pub struct ScriptsResponse {
    pub scripts: Vec<String>,
}

/// `POST /api/execute` success response.
#[derive(Debug, Serialize)]
pub struct ExecuteResponse {
    /// Server-relative path of the artifact, e.g. `/uploads/<name>`.
    pub output: String,
}

/// File part of an execute request, fully buffered.
struct FileUpload {
    name: String,
    content_type: Option<String>,
    bytes: Vec<u8>,
}

#[derive(Default)]
struct ExecuteForm {
    file: Option<FileUpload>,
    script: Option<String>,
}

/// GET /api/scripts
pub async fn list_scripts(State(state): State<AppState>) -> AppResult<Json<ScriptsResponse>> {
    let scripts = state.registry.list().await?;
    Ok(Json(ScriptsResponse { scripts }))
}

/// POST /api/execute
///
/// Accepts a multipart form with a `file` and a `script` field. Validation
/// and script resolution happen before anything is written, so rejected
/// requests leave the staging directory untouched. The staged input is not
/// deleted afterwards; the reaper takes care of it.
pub async fn execute_script(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> AppResult<Json<ExecuteResponse>> {
    let mut multipart = multipart.map_err(|e| AppError::BadRequest(e.body_text()))?;
    let form = read_execute_form(&mut multipart, state.config.max_upload_bytes).await?;

    let (Some(file), Some(script)) = (form.file, form.script) else {
        return Err(AppError::BadRequest("File and script are required".into()));
    };

    let processor = state.registry.resolve(&script).await.map_err(|e| match e {
        CoreError::NotFound { .. } => AppError::BadRequest(format!("Script '{script}' not found")),
        other => AppError::Core(other),
    })?;

    let staged = state
        .staging
        .store(&file.bytes, &file.name, file.content_type.as_deref())
        .await?;

    let result = state.engine.run(&staged.path, &processor).await?;
    let artifact = result.into_artifact()?;

    let name = artifact
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| AppError::InternalError("Artifact path has no file name".into()))?;

    tracing::info!(script = %processor.id, artifact = %name, "Execution succeeded");
    Ok(Json(ExecuteResponse {
        output: StagingStore::public_path(&name),
    }))
}

/// Buffer the `file` and `script` fields, enforcing the upload cap while
/// the file streams in. Unknown fields are ignored.
async fn read_execute_form(
    multipart: &mut Multipart,
    max_upload_bytes: usize,
) -> AppResult<ExecuteForm> {
    let mut form = ExecuteForm::default();

    while let Some(mut field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "file" => {
                let file_name = field.file_name().unwrap_or("").to_string();
                let content_type = field.content_type().map(str::to_owned);

                let mut bytes = Vec::new();
                while let Some(chunk) = field.chunk().await.map_err(multipart_error)? {
                    if bytes.len() + chunk.len() > max_upload_bytes {
                        return Err(too_large(max_upload_bytes));
                    }
                    bytes.extend_from_slice(&chunk);
                }

                // Browsers send an empty filename when no file was picked.
                if !file_name.trim().is_empty() {
                    form.file = Some(FileUpload {
                        name: file_name,
                        content_type,
                        bytes,
                    });
                }
            }
            "script" => {
                let text = field.text().await.map_err(multipart_error)?;
                let text = text.trim();
                if !text.is_empty() {
                    form.script = Some(text.to_string());
                }
            }
            _ => {}
        }
    }

    Ok(form)
}

fn multipart_error(err: MultipartError) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge(err.body_text())
    } else {
        AppError::BadRequest(err.body_text())
    }
}

fn too_large(limit: usize) -> AppError {
    AppError::PayloadTooLarge(format!(
        "File exceeds the maximum upload size of {limit} bytes"
    ))
}
