//! HTTP glue between axum and the protocol core.
//!
//! A single fallback handler receives every method (axum's routing
//! macros don't cover PROPFIND/LOCK/UNLOCK), translates the request into
//! a `DavRequest`, and converts the dispatcher's verdict back into an
//! HTTP response. Plain GET for known resources is handed to the static
//! file service.

use std::path::PathBuf;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use segdav_core::{DavError, DavRequest, DavResponse, Depth, Dispatch, Dispatcher, StoreError};
use tower::ServiceExt;
use tower_http::services::ServeDir;
use tracing::warn;

/// Upload bodies are buffered in full before the store write; segments
/// are small, but manifests can be replaced often, so leave headroom.
const BODY_LIMIT: usize = 512 * 1024 * 1024;

/// Application state shared across requests.
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<Dispatcher>,
    pub static_root: Arc<PathBuf>,
}

/// Fallback handler bound to every method and path.
pub async fn dav_handler(State(state): State<AppState>, req: Request) -> Response {
    let method = req.method().as_str().to_string();
    let path = req.uri().path().to_string();
    let depth = Depth::from_header(
        req.headers()
            .get("depth")
            .and_then(|value| value.to_str().ok()),
    );
    let lock_token = req
        .headers()
        .get("lock-token")
        .and_then(|value| value.to_str().ok())
        .map(|value| DavRequest::parse_lock_token(value).to_string());

    let body = match axum::body::to_bytes(req.into_body(), BODY_LIMIT).await {
        Ok(body) => body,
        Err(e) => {
            warn!("Failed to buffer request body: {}", e);
            return (StatusCode::PAYLOAD_TOO_LARGE, "Payload Too Large").into_response();
        }
    };

    let request = DavRequest {
        method: &method,
        path: &path,
        depth,
        lock_token: lock_token.as_deref(),
        body: &body,
    };

    match state.dispatcher.handle(request).await {
        Ok(Dispatch::Respond(descriptor)) => into_http(descriptor),
        Ok(Dispatch::Delegate) => serve_static(&state, &path).await,
        Err(e) => error_response(&e),
    }
}

fn into_http(descriptor: DavResponse) -> Response {
    let status =
        StatusCode::from_u16(descriptor.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let mut response = (status, descriptor.body.unwrap_or_default()).into_response();
    for (name, value) in descriptor.headers {
        let Ok(name) = HeaderName::from_bytes(name.as_bytes()) else {
            continue;
        };
        let Ok(value) = HeaderValue::from_str(&value) else {
            continue;
        };
        response.headers_mut().insert(name, value);
    }
    response
}

fn error_response(err: &DavError) -> Response {
    let status = match err {
        DavError::NotFound(_) => StatusCode::NOT_FOUND,
        DavError::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
        DavError::Locked(_) => StatusCode::LOCKED,
        DavError::Store(StoreError::Remote(_)) => StatusCode::BAD_GATEWAY,
        DavError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    // Error bodies stay plain text; only successful PROPFIND/LOCK carry XML.
    (status, err.to_string()).into_response()
}

/// Serve a delegated GET from the static root.
async fn serve_static(state: &AppState, path: &str) -> Response {
    let request = match Request::builder().uri(path).body(Body::empty()) {
        Ok(request) => request,
        Err(e) => {
            warn!("Failed to rebuild request for static serving: {}", e);
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    match ServeDir::new(state.static_root.as_path()).oneshot(request).await {
        Ok(response) => response.into_response(),
        Err(e) => {
            warn!("Static file service failed for {}: {}", path, e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
