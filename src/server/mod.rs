//! HTTP paste service
//!
//! One route serves the usage page and accepts new pastes at `/`; every
//! other path is treated as a paste id.

pub mod form;
pub mod usage;

use axum::{
    extract::{DefaultBodyLimit, Request, State},
    http::{header, HeaderMap, Method, StatusCode, Uri},
    response::{Html, IntoResponse, Response},
    routing::any,
    Router,
};
use std::sync::Arc;

use crate::store::{PasteStore, StoreError, StoreResult, MAX_PASTE_SIZE};

/// Default cap on request bodies. Leaves room for form encoding overhead on
/// top of `MAX_PASTE_SIZE`.
pub const DEFAULT_BODY_LIMIT: usize = 4 * MAX_PASTE_SIZE;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    store: Arc<dyn PasteStore>,
}

impl AppState {
    pub fn new(store: Arc<dyn PasteStore>) -> Self {
        Self { store }
    }
}

/// Build the router with the default body limit
pub fn router(store: Arc<dyn PasteStore>) -> Router {
    router_with_limit(store, DEFAULT_BODY_LIMIT)
}

/// Build the router, rejecting request bodies over `body_limit` bytes
pub fn router_with_limit(store: Arc<dyn PasteStore>, body_limit: usize) -> Router {
    Router::new()
        .route("/", any(index))
        .route("/{*id}", any(fetch_paste))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(AppState::new(store))
}

/// `POST /` stores a paste, anything else at `/` gets the usage page
async fn index(State(state): State<AppState>, request: Request) -> Response {
    let base = base_url(request.headers(), request.uri());

    if request.method() != Method::POST {
        return Html(usage::render(&base)).into_response();
    }

    let result = match form::paste_field(request).await {
        Ok(payload) => {
            let size = payload.len();
            let store = Arc::clone(&state.store);
            run_blocking(move || store.put(&payload))
                .await
                .map(|id| (id, size))
        }
        Err(e) => Err(e),
    };

    match result {
        Ok((id, size)) => {
            log::info!("Stored paste {} ({} bytes)", id, size);
            format!("{}/{}\n", base, id).into_response()
        }
        Err(e) => error_response(e),
    }
}

/// Any request to `/{id}` looks the paste up
async fn fetch_paste(State(state): State<AppState>, uri: Uri) -> Response {
    let id = uri.path().trim_start_matches('/').to_string();
    log::debug!("Fetching paste {}", id);

    let store = Arc::clone(&state.store);
    match run_blocking(move || store.get(&id)).await {
        Ok(payload) => paste_response(payload),
        Err(e) => error_response(e),
    }
}

fn paste_response(payload: Vec<u8>) -> Response {
    let content_type = if std::str::from_utf8(&payload).is_ok() {
        "text/plain; charset=utf-8"
    } else {
        "application/octet-stream"
    };
    ([(header::CONTENT_TYPE, content_type)], payload).into_response()
}

/// Map a store error to exactly one status code
fn error_response(err: StoreError) -> Response {
    let status = match &err {
        StoreError::PasteTooLarge => {
            log::warn!("Rejected paste: {}", err);
            StatusCode::NOT_ACCEPTABLE
        }
        StoreError::NotFound => StatusCode::NOT_FOUND,
        StoreError::StorageUnavailable(_) | StoreError::Locked { .. } | StoreError::Other(_) => {
            log::error!("Store error: {}", err);
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    (status, err.to_string()).into_response()
}

/// Run a store call on the blocking pool
async fn run_blocking<T, F>(f: F) -> StoreResult<T>
where
    F: FnOnce() -> StoreResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| StoreError::Other(format!("store task failed: {}", e)))?
}

/// `<scheme>://<host>` of the incoming request
pub fn base_url(headers: &HeaderMap, uri: &Uri) -> String {
    let host = headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .filter(|h| !h.is_empty())
        .map(str::to_string)
        .or_else(|| uri.authority().map(|a| a.to_string()))
        .unwrap_or_else(|| "localhost".to_string());
    let scheme = uri.scheme_str().unwrap_or("http");
    format!("{}://{}", scheme, host)
}
