//! Interactive front-end: one page to upload a track, one endpoint to
//! split it, one to download each resulting stem.

use axum::{
    extract::{DefaultBodyLimit, Multipart, Path as UrlPath, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use serde_json::json;
use std::collections::VecDeque;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::{error, info};
use uuid::Uuid;

use crate::error::{Result, StemError};
use crate::model::{load_model, Separator};
use crate::pipeline::{split_upload, StemArtifact};
use crate::types::StemConfig;

const INDEX_HTML: &str = include_str!("index.html");

/// How the `serve` command configures the shell.
#[derive(Clone, Debug)]
pub struct ServeOptions {
    pub addr: String,
    pub model: String,
    pub manifest_url_override: Option<String>,
    pub max_upload_bytes: usize,
    pub retain_jobs: usize,
}

impl Default for ServeOptions {
    fn default() -> Self {
        Self {
            addr: "127.0.0.1:8585".to_string(),
            model: String::new(),
            manifest_url_override: None,
            max_upload_bytes: 64 * 1024 * 1024,
            retain_jobs: 8,
        }
    }
}

struct Job {
    stems: Vec<StemArtifact>,
}

/// Finished jobs, newest last, capped so repeated splits cannot grow
/// memory without bound. Evicted jobs 404 on download.
struct JobStore {
    capacity: usize,
    jobs: VecDeque<(Uuid, Job)>,
}

impl JobStore {
    fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            jobs: VecDeque::new(),
        }
    }

    fn insert(&mut self, id: Uuid, job: Job) {
        while self.jobs.len() >= self.capacity {
            self.jobs.pop_front();
        }
        self.jobs.push_back((id, job));
    }

    fn stem(&self, id: Uuid, file_name: &str) -> Option<&StemArtifact> {
        self.jobs
            .iter()
            .find(|(jid, _)| *jid == id)
            .and_then(|(_, job)| job.stems.iter().find(|s| s.file_name == file_name))
    }
}

#[derive(Clone)]
pub struct AppState {
    separator: Arc<dyn Separator>,
    jobs: Arc<Mutex<JobStore>>,
}

impl AppState {
    pub fn new(separator: Arc<dyn Separator>, retain_jobs: usize) -> Self {
        Self {
            separator,
            jobs: Arc::new(Mutex::new(JobStore::new(retain_jobs))),
        }
    }
}

pub fn router(state: AppState, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/healthz", get(healthz))
        .route("/split", post(split))
        .route("/stems/:job_id/:file_name", get(download))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .with_state(state)
}

/// Load the model, then serve the shell until the process exits.
pub async fn serve(opts: ServeOptions) -> Result<()> {
    let model = opts.model.clone();
    let manifest_override = opts.manifest_url_override.clone();
    let separator = tokio::task::spawn_blocking(move || {
        load_model(&model, manifest_override.as_deref())
    })
    .await
    .map_err(|e| StemError::model_load(format!("model loader task: {e}")))??;

    let state = AppState::new(Arc::new(separator), opts.retain_jobs);
    let app = router(state, opts.max_upload_bytes);

    let listener = tokio::net::TcpListener::bind(&opts.addr).await?;
    info!(addr = %opts.addr, "stem-studio listening");
    axum::serve(listener, app).await?;
    Ok(())
}

// Handler-facing error: an HTTP status plus a JSON body.
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

impl From<StemError> for ApiError {
    fn from(e: StemError) -> Self {
        let status = match &e {
            StemError::Decode { .. } => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            StemError::Configuration { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            StemError::ModelLoad { .. } | StemError::Inference { .. } | StemError::Io(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!(error = %e, "split action failed");
        }
        ApiError::new(status, e.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(json!({ "ok": false, "error": self.message })),
        )
            .into_response()
    }
}

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn healthz(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "ok": true,
        "model": state.separator.name(),
        "sources": state.separator.source_names(),
        "sample_rate": state.separator.sample_rate(),
    }))
}

#[derive(Serialize)]
struct StemEntry {
    name: String,
    file: String,
    url: String,
    bytes: usize,
}

#[derive(Serialize)]
struct SplitResponse {
    ok: bool,
    job_id: String,
    config: String,
    stems: Vec<StemEntry>,
}

async fn split(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> std::result::Result<Json<SplitResponse>, ApiError> {
    let mut config: Option<StemConfig> = None;
    let mut upload: Option<(String, Vec<u8>)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::new(StatusCode::BAD_REQUEST, e.to_string()))?
    {
        match field.name() {
            Some("config") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| ApiError::new(StatusCode::BAD_REQUEST, e.to_string()))?;
                config = Some(text.parse().map_err(|e: String| {
                    ApiError::new(StatusCode::UNPROCESSABLE_ENTITY, e)
                })?);
            }
            Some("file") => {
                let file_name = field.file_name().unwrap_or("upload").to_string();
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::new(StatusCode::BAD_REQUEST, e.to_string()))?;
                upload = Some((file_name, data.to_vec()));
            }
            _ => {}
        }
    }

    let config = config.ok_or_else(|| {
        ApiError::new(StatusCode::UNPROCESSABLE_ENTITY, "missing `config` field")
    })?;
    let (file_name, payload) = upload.ok_or_else(|| {
        ApiError::new(StatusCode::UNPROCESSABLE_ENTITY, "missing `file` field")
    })?;
    let extension = Path::new(&file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .ok_or_else(|| {
            ApiError::new(
                StatusCode::UNSUPPORTED_MEDIA_TYPE,
                format!("`{file_name}` has no file extension"),
            )
        })?;

    info!(file = %file_name, config = %config, bytes = payload.len(), "split requested");

    let separator = state.separator.clone();
    let stems = tokio::task::spawn_blocking(move || {
        split_upload(separator.as_ref(), &payload, &extension, config)
    })
    .await
    .map_err(|e| {
        ApiError::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("split task: {e}"),
        )
    })??;

    let job_id = Uuid::new_v4();
    let entries = stems
        .iter()
        .map(|s| StemEntry {
            name: s.name.clone(),
            file: s.file_name.clone(),
            url: format!("/stems/{job_id}/{}", s.file_name),
            bytes: s.data.len(),
        })
        .collect();

    state
        .jobs
        .lock()
        .map_err(|_| ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "job store poisoned"))?
        .insert(job_id, Job { stems });

    Ok(Json(SplitResponse {
        ok: true,
        job_id: job_id.to_string(),
        config: config.to_string(),
        stems: entries,
    }))
}

async fn download(
    State(state): State<AppState>,
    UrlPath((job_id, file_name)): UrlPath<(String, String)>,
) -> std::result::Result<Response, ApiError> {
    let id: Uuid = job_id
        .parse()
        .map_err(|_| ApiError::new(StatusCode::NOT_FOUND, "unknown job"))?;

    let jobs = state
        .jobs
        .lock()
        .map_err(|_| ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "job store poisoned"))?;
    let stem = jobs
        .stem(id, &file_name)
        .ok_or_else(|| ApiError::new(StatusCode::NOT_FOUND, "stem not available"))?;

    let headers = [
        (header::CONTENT_TYPE, "audio/wav".to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", stem.file_name),
        ),
    ];
    Ok((headers, stem.data.clone()).into_response())
}
