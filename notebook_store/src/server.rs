use axum::{
    extract::{DefaultBodyLimit, Json, Multipart, Path, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde_json::json;
use std::{future::Future, path::PathBuf, sync::Arc};
use tokio::net::TcpListener;
use tower_http::{services::ServeDir, trace::TraceLayer};
use tracing::*;

use crate::uploads::sanitize_filename;
use crate::{Notebook, NotebookStore, StoreError};

const UPLOAD_FIELD: &str = "file";
const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<NotebookStore>,
    /// Holds `index.html`, `document.html` and the assets served under `/static`.
    pub frontend_dir: PathBuf,
    /// Largest accepted upload request body, multipart framing included.
    pub max_upload_bytes: usize,
}

impl IntoResponse for StoreError {
    fn into_response(self) -> Response {
        let status = match &self {
            StoreError::NotebookNotFound | StoreError::PageNotFound(_) => StatusCode::NOT_FOUND,
            StoreError::InvalidUpload(_) => StatusCode::BAD_REQUEST,
            StoreError::Io(_) | StoreError::Json(_) => {
                error!("Notebook store failure: {}", self);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        (status, Json(json!({ "detail": self.to_string() }))).into_response()
    }
}

pub fn router(state: AppState) -> Router {
    let uploads_root = state.store.uploads().root().to_path_buf();
    let static_dir = state.frontend_dir.clone();
    let upload_limit = DefaultBodyLimit::max(state.max_upload_bytes);

    Router::new()
        .route("/", get(serve_index))
        .route("/document/:notebook_id", get(serve_document))
        .route("/api/notebooks", get(list_notebooks).post(create_notebook))
        .route(
            "/api/notebooks/:notebook_id",
            get(get_notebook).delete(delete_notebook),
        )
        .route(
            "/api/notebooks/:notebook_id/sources",
            post(upload_source).layer(upload_limit),
        )
        .nest_service("/uploads", ServeDir::new(uploads_root))
        .nest_service("/static", ServeDir::new(static_dir))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn serve(
    listener: TcpListener,
    state: AppState,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    info!("Notebook store listening on {}", listener.local_addr()?);
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await
}

async fn read_page(
    state: &AppState,
    file: &str,
    missing: String,
) -> Result<Html<String>, StoreError> {
    match tokio::fs::read_to_string(state.frontend_dir.join(file)).await {
        Ok(content) => Ok(Html(content)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(StoreError::PageNotFound(missing))
        }
        Err(e) => Err(e.into()),
    }
}

async fn serve_index(State(state): State<AppState>) -> Result<Html<String>, StoreError> {
    let index_path = state.frontend_dir.join("index.html");
    read_page(
        &state,
        "index.html",
        format!("Index page not found at {}", index_path.display()),
    )
    .await
}

// The id only selects the route; the page fetches the notebook itself.
async fn serve_document(
    State(state): State<AppState>,
    Path(_notebook_id): Path<i64>,
) -> Result<Html<String>, StoreError> {
    read_page(&state, "document.html", "document.html not found".to_string()).await
}

async fn create_notebook(
    State(state): State<AppState>,
    Json(notebook): Json<Notebook>,
) -> Result<(StatusCode, Json<Notebook>), StoreError> {
    let created = state.store.create(notebook).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn list_notebooks(State(state): State<AppState>) -> Result<Json<Vec<Notebook>>, StoreError> {
    Ok(Json(state.store.list().await?))
}

async fn get_notebook(
    State(state): State<AppState>,
    Path(notebook_id): Path<i64>,
) -> Result<Json<Notebook>, StoreError> {
    Ok(Json(state.store.get(notebook_id).await?))
}

async fn delete_notebook(
    State(state): State<AppState>,
    Path(notebook_id): Path<i64>,
) -> Result<StatusCode, StoreError> {
    state.store.delete(notebook_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn upload_source(
    State(state): State<AppState>,
    Path(notebook_id): Path<i64>,
    mut multipart: Multipart,
) -> Result<Json<serde_json::Value>, StoreError> {
    // unknown notebook wins over a bad filename or body
    state.store.get(notebook_id).await?;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| StoreError::InvalidUpload(e.body_text()))?
    {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }
        let filename = sanitize_filename(field.file_name().unwrap_or(""))?;
        let content_type = field
            .content_type()
            .unwrap_or(DEFAULT_CONTENT_TYPE)
            .to_string();

        // received without holding the store lock
        let staged = state.store.uploads().receive(field).await?;
        let source = state
            .store
            .attach_upload(notebook_id, &filename, &content_type, staged)
            .await?;
        return Ok(Json(json!({
            "message": "File uploaded successfully",
            "source": source,
        })));
    }
    Err(StoreError::InvalidUpload(format!(
        "Missing multipart field '{}'",
        UPLOAD_FIELD
    )))
}
