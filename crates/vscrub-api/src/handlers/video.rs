//! Video processing handlers.

use std::path::{Path, PathBuf};

use axum::body::Body;
use axum::extract::{Multipart, Path as UrlPath, State};
use axum::http::{header, HeaderMap, HeaderValue};
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use serde::Serialize;
use tokio::io::AsyncWriteExt;
use tokio_util::io::ReaderStream;
use tracing::{info, warn};
use uuid::Uuid;

use vscrub_models::{evaluate, utc_day_key, Job, JobState, Operation};

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::metrics;
use crate::state::AppState;

/// Upload extensions accepted by the processing endpoint.
pub const ALLOWED_EXTENSIONS: &[&str] = &["mp4", "avi", "mov", "mkv", "webm", "flv"];

#[derive(Serialize)]
pub struct ProcessResponse {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_ids: Option<Vec<String>>,
}

struct UploadedFile {
    path: PathBuf,
    name: String,
    size: u64,
}

/// Remove whatever made it to disk when a request is rejected.
async fn discard(files: &[UploadedFile]) {
    for file in files {
        let _ = tokio::fs::remove_file(&file.path).await;
    }
}

fn sanitize_filename(name: &str) -> String {
    let base = Path::new(name)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("upload.mp4");
    base.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

fn has_allowed_extension(name: &str) -> bool {
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| ALLOWED_EXTENSIONS.contains(&e.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Stream one multipart file field to disk.
async fn spool_field(
    field: &mut axum::extract::multipart::Field<'_>,
    dir: &Path,
) -> ApiResult<UploadedFile> {
    let name = sanitize_filename(field.file_name().unwrap_or("upload.mp4"));
    if !has_allowed_extension(&name) {
        return Err(ApiError::validation(format!(
            "unsupported file type; allowed: {}",
            ALLOWED_EXTENSIONS.join(", ")
        )));
    }

    let path = dir.join(format!("{}.upload", Uuid::new_v4()));
    let mut out = tokio::fs::File::create(&path)
        .await
        .map_err(|e| ApiError::internal(e.to_string()))?;

    let mut size: u64 = 0;
    while let Some(chunk) = field
        .chunk()
        .await
        .map_err(|e| ApiError::validation(format!("malformed upload: {e}")))?
    {
        size += chunk.len() as u64;
        out.write_all(&chunk)
            .await
            .map_err(|e| ApiError::internal(e.to_string()))?;
    }
    out.flush()
        .await
        .map_err(|e| ApiError::internal(e.to_string()))?;

    Ok(UploadedFile { path, name, size })
}

/// `POST /api/video/process`
///
/// Multipart form: a `type` field naming the operation, and one `video`
/// file per job (several for a batch). The policy gate runs before the
/// request is accepted; the engine runs out of band and the response
/// returns immediately with the task id(s).
pub async fn process(
    State(state): State<AppState>,
    auth: AuthUser,
    mut multipart: Multipart,
) -> ApiResult<Json<ProcessResponse>> {
    let mut operation: Option<Operation> = None;
    let mut files: Vec<UploadedFile> = Vec::new();

    // Any rejection from here on must discard what was already spooled
    loop {
        let mut field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                discard(&files).await;
                return Err(ApiError::validation(format!("malformed upload: {e}")));
            }
        };
        match field.name() {
            Some("type") => {
                let value = match field.text().await {
                    Ok(value) => value,
                    Err(e) => {
                        discard(&files).await;
                        return Err(ApiError::validation(format!("malformed upload: {e}")));
                    }
                };
                match Operation::parse(&value) {
                    Some(op) => operation = Some(op),
                    None => {
                        discard(&files).await;
                        return Err(ApiError::validation(format!(
                            "unknown operation: {value}"
                        )));
                    }
                }
            }
            Some("video") => {
                match spool_field(&mut field, &state.config.work_dir).await {
                    Ok(file) => files.push(file),
                    Err(e) => {
                        discard(&files).await;
                        return Err(e);
                    }
                }
            }
            _ => {}
        }
    }

    let Some(operation) = operation else {
        discard(&files).await;
        return Err(ApiError::validation("missing operation type"));
    };
    if files.is_empty() {
        return Err(ApiError::validation("no video file provided"));
    }

    let user = state.current_user(&auth.user_id).await?;
    let today = utc_day_key(Utc::now());
    let batch_size = files.len();

    for file in &files {
        if let Err(denial) = evaluate(&user, operation, file.size, batch_size, &today) {
            warn!(user_id = %auth.user_id, code = denial.code(), "upload rejected");
            metrics::record_upload_rejected(denial.code());
            discard(&files).await;
            return Err(denial.into());
        }
    }

    // Count usage only after every file in the request is accepted
    let count = files.len() as u32;
    state
        .users
        .update(&auth.user_id, |u| {
            for _ in 0..count {
                u.record_usage(&today);
            }
        })
        .await?;

    let mut task_ids = Vec::with_capacity(files.len());
    for file in files {
        let output = state
            .config
            .work_dir
            .join(format!("{}.out.mp4", Uuid::new_v4()));
        let job = Job::new(&auth.user_id, operation, file.path, file.name, output);
        let job = state.tracker.submit(job, state.engine.as_ref()).await;
        metrics::record_upload_accepted(operation.as_str());
        task_ids.push(job.id.as_str().to_string());
    }

    info!(user_id = %auth.user_id, count = task_ids.len(), %operation, "processing accepted");

    Ok(Json(if task_ids.len() == 1 {
        ProcessResponse {
            status: "processing",
            task_id: task_ids.pop(),
            task_ids: None,
        }
    } else {
        ProcessResponse {
            status: "processing",
            task_id: None,
            task_ids: Some(task_ids),
        }
    }))
}

/// `GET /api/video/status/:task_id`
pub async fn status(
    State(state): State<AppState>,
    auth: AuthUser,
    UrlPath(task_id): UrlPath<String>,
) -> ApiResult<Json<Job>> {
    let job = state.tracker.get(&task_id, &auth.user_id).await?;
    Ok(Json(job))
}

/// `GET /api/video/download/:task_id`
///
/// Streams the finished output with an attachment disposition. Only the
/// owner of a completed job can download.
pub async fn download(
    State(state): State<AppState>,
    auth: AuthUser,
    UrlPath(task_id): UrlPath<String>,
) -> ApiResult<impl IntoResponse> {
    let job = state.tracker.get(&task_id, &auth.user_id).await?;

    if job.state != JobState::Completed {
        return Err(ApiError::Conflict(format!(
            "job is {}, not completed",
            job.state
        )));
    }

    let file = tokio::fs::File::open(&job.output_path)
        .await
        .map_err(|_| ApiError::not_found("output no longer available"))?;
    let stream = ReaderStream::new(file);

    let filename = format!("scrubbed-{}", sanitize_filename(&job.input_name));
    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("video/mp4"),
    );
    if let Ok(value) = HeaderValue::from_str(&format!("attachment; filename=\"{filename}\"")) {
        headers.insert(header::CONTENT_DISPOSITION, value);
    }

    Ok((headers, Body::from_stream(stream)))
}

/// `GET /api/video/history`
pub async fn history(
    State(state): State<AppState>,
    auth: AuthUser,
) -> ApiResult<Json<Vec<Job>>> {
    Ok(Json(state.tracker.jobs_for_user(&auth.user_id).await))
}

/// `DELETE /api/video/cancel/:task_id`
pub async fn cancel(
    State(state): State<AppState>,
    auth: AuthUser,
    UrlPath(task_id): UrlPath<String>,
) -> ApiResult<Json<Job>> {
    let job = state.tracker.cancel(&task_id, &auth.user_id).await?;
    Ok(Json(job))
}

#[derive(Serialize)]
pub struct FormatsResponse {
    pub extensions: &'static [&'static str],
    pub operations: Vec<&'static str>,
}

/// `GET /api/video/formats` (public)
pub async fn formats() -> Json<FormatsResponse> {
    Json(FormatsResponse {
        extensions: ALLOWED_EXTENSIONS,
        operations: vec![
            Operation::RemoveWatermark.as_str(),
            Operation::RemoveSubtitle.as_str(),
            Operation::Batch.as_str(),
            Operation::Custom.as_str(),
        ],
    })
}
