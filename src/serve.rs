//! Local endpoint the in-browser editors post to.
//!
//! Two writes replace whole files: `POST /save-captions` and
//! `POST /save-tags`. `GET /health` answers `{"ok":true}`. Everything else
//! gets a JSON error with a 4xx status; failures are reported per request
//! and never stop the listener.
//!
//! | Request                  | Response                              |
//! |--------------------------|---------------------------------------|
//! | `OPTIONS *`              | 204                                   |
//! | `POST` to unknown path   | 404 `Unknown endpoint`                |
//! | any other verb           | 405 `Method not allowed`              |
//! | body over the limit      | 413                                   |
//! | body not a JSON object   | 400 `Invalid JSON payload`            |
//! | write failure            | 500                                   |

use crate::config::SiteConfig;
use axum::Router;
use axum::body::Bytes;
use axum::extract::rejection::BytesRejection;
use axum::extract::{DefaultBodyLimit, State};
use axum::http::{Method, StatusCode, header};
use axum::middleware::map_response;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Json;
use serde_json::{Value, json};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

#[derive(Error, Debug)]
pub enum ServeError {
    #[error("cannot listen on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
    #[error("server error: {0}")]
    Io(#[from] std::io::Error),
}

/// Per-request failures, each mapped to a status and a JSON body.
#[derive(Error, Debug)]
enum SaveError {
    #[error(transparent)]
    Body(#[from] BytesRejection),
    #[error("Invalid JSON payload")]
    InvalidJson,
    #[error("could not write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl IntoResponse for SaveError {
    fn into_response(self) -> Response {
        let status = match &self {
            SaveError::Body(rejection) => rejection.status(),
            SaveError::InvalidJson => StatusCode::BAD_REQUEST,
            SaveError::Write { .. } => {
                error!(error = %self, "save failed");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        error_response(status, &self.to_string())
    }
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}

/// Files the endpoint may replace. Nothing else is writable.
#[derive(Debug, Clone)]
struct Targets {
    captions: PathBuf,
    tags: PathBuf,
}

#[derive(Clone)]
struct AppState {
    targets: Arc<Targets>,
}

/// Build the router for a project rooted at `root`.
pub fn router(root: &Path, config: &SiteConfig) -> Router {
    let state = AppState {
        targets: Arc::new(Targets {
            captions: root.join(&config.paths.captions),
            tags: root.join(&config.paths.global_tags),
        }),
    };

    Router::new()
        .route("/health", get(health).fallback(fallback))
        .route("/save-captions", post(save_captions).fallback(fallback))
        .route("/save-tags", post(save_tags).fallback(fallback))
        .fallback(fallback)
        .with_state(state)
        .layer(DefaultBodyLimit::max(config.server.max_body_bytes))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
                .allow_headers([header::CONTENT_TYPE]),
        )
        .layer(map_response(preflight_no_content))
}

/// `CorsLayer` answers every `OPTIONS` itself with 200; report it as 204.
async fn preflight_no_content(method: Method, mut response: Response) -> Response {
    if method == Method::OPTIONS && response.status() == StatusCode::OK {
        *response.status_mut() = StatusCode::NO_CONTENT;
    }
    response
}

/// Serve on localhost until the process is stopped.
pub async fn serve(root: &Path, config: &SiteConfig) -> Result<(), ServeError> {
    let addr = SocketAddr::from(([127, 0, 0, 1], config.server.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|source| ServeError::Bind { addr, source })?;
    info!(
        "listening on http://{addr} (captions → {}, tags → {})",
        config.paths.captions.display(),
        config.paths.global_tags.display()
    );
    axum::serve(listener, router(root, config)).await?;
    Ok(())
}

async fn health() -> Json<Value> {
    Json(json!({ "ok": true }))
}

async fn fallback(method: Method) -> Response {
    match method {
        Method::OPTIONS => StatusCode::NO_CONTENT.into_response(),
        Method::POST => error_response(StatusCode::NOT_FOUND, "Unknown endpoint"),
        _ => error_response(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed"),
    }
}

async fn save_captions(
    State(state): State<AppState>,
    body: Result<Bytes, BytesRejection>,
) -> Result<Json<Value>, SaveError> {
    save(&state.targets.captions, body?).await
}

async fn save_tags(
    State(state): State<AppState>,
    body: Result<Bytes, BytesRejection>,
) -> Result<Json<Value>, SaveError> {
    save(&state.targets.tags, body?).await
}

/// Replace `path` with the pretty-printed payload.
async fn save(path: &Path, body: Bytes) -> Result<Json<Value>, SaveError> {
    let payload: Value = serde_json::from_slice(&body).map_err(|_| SaveError::InvalidJson)?;
    if !payload.is_object() {
        return Err(SaveError::InvalidJson);
    }

    let write_err = |source| SaveError::Write {
        path: path.to_path_buf(),
        source,
    };
    let mut contents = serde_json::to_string_pretty(&payload)
        .map_err(|e| write_err(std::io::Error::other(e)))?;
    contents.push('\n');
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
    }
    tokio::fs::write(path, contents).await.map_err(write_err)?;
    info!(path = %path.display(), "saved");
    Ok(Json(json!({ "ok": true })))
}
