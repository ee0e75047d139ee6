//! HTTP front end: `GET /health` and `POST /ocr` with a multipart `file`.

use std::{net::SocketAddr, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use formscan::{config::ServerSection, FormError, FormExtraction, FormReader};
use log::{error, info, warn};
use serde::Serialize;

/// Multipart framing on top of the file itself.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

#[derive(Debug, Clone, Copy)]
pub struct ServerConfig {
    /// The socket address of the HTTP API.
    pub addr: SocketAddr,
    /// Upper bound on the time spent reading one form.
    pub request_timeout: Duration,
}

impl ServerConfig {
    pub fn from_section(section: &ServerSection) -> Result<ServerConfig> {
        Ok(ServerConfig {
            addr: section
                .address
                .parse()
                .with_context(|| format!("invalid server address {:?}", section.address))?,
            request_timeout: section.request_timeout,
        })
    }
}

struct AppState {
    reader: Arc<FormReader>,
    request_timeout: Duration,
}

pub async fn serve(config: ServerConfig, reader: FormReader) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    info!("listening on http://{}", config.addr);
    axum::serve(listener, router(reader, config.request_timeout)).await?;
    Ok(())
}

pub fn router(reader: FormReader, request_timeout: Duration) -> Router {
    let body_limit = usize::try_from(reader.config().upload.max_bytes)
        .unwrap_or(usize::MAX)
        .saturating_add(MULTIPART_OVERHEAD);
    let state = Arc::new(AppState {
        reader: Arc::new(reader),
        request_timeout,
    });
    Router::new()
        .route("/health", get(health))
        .route("/ocr", post(ocr))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}

#[derive(Serialize)]
struct Health {
    status: &'static str,
}

async fn health() -> Json<Health> {
    Json(Health { status: "ok" })
}

#[derive(Serialize)]
struct Reply {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<FormExtraction>,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
}

fn success(data: FormExtraction) -> Response {
    (
        StatusCode::OK,
        Json(Reply {
            success: true,
            data: Some(data),
            message: None,
        }),
    )
        .into_response()
}

fn failure(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(Reply {
            success: false,
            data: None,
            message: Some(message.into()),
        }),
    )
        .into_response()
}

async fn ocr(State(state): State<Arc<AppState>>, multipart: Multipart) -> Response {
    let (file_name, bytes) = match upload(multipart).await {
        Ok(Some(upload)) => upload,
        Ok(None) => return failure(StatusCode::UNPROCESSABLE_ENTITY, "missing multipart field `file`"),
        Err(e) => return failure(StatusCode::BAD_REQUEST, e.to_string()),
    };
    if let Err(e) = state.reader.validate_upload(&file_name, bytes.len() as u64) {
        warn!("rejected upload {:?}: {}", file_name, e);
        return failure(StatusCode::UNPROCESSABLE_ENTITY, e.to_string());
    }
    info!("reading {:?} ({} bytes)", file_name, bytes.len());

    let reader = state.reader.clone();
    let task = tokio::task::spawn_blocking(move || reader.read_bytes(&file_name, &bytes));
    match tokio::time::timeout(state.request_timeout, task).await {
        Ok(Ok(Ok(extraction))) => success(extraction),
        Ok(Ok(Err(FormError::Validation(message)))) => {
            failure(StatusCode::UNPROCESSABLE_ENTITY, message)
        }
        Ok(Ok(Err(e))) => {
            error!("form read failed: {}", e);
            failure(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
        Ok(Err(e)) => {
            error!("form reader panicked: {}", e);
            failure(StatusCode::INTERNAL_SERVER_ERROR, "form reader crashed")
        }
        Err(_) => {
            warn!("form read exceeded {:?}", state.request_timeout);
            failure(StatusCode::GATEWAY_TIMEOUT, "form processing timed out")
        }
    }
}

/// The first field named `file`, with its client-side file name.
async fn upload(mut multipart: Multipart) -> Result<Option<(String, Bytes)>, axum::extract::multipart::MultipartError> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field.file_name().unwrap_or_default().to_owned();
        let bytes = field.bytes().await?;
        return Ok(Some((file_name, bytes)));
    }
    Ok(None)
}
