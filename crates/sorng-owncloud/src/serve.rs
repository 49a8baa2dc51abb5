// ──────────────────────────────────────────────────────────────────────────────
// sorng-owncloud · serve
// ──────────────────────────────────────────────────────────────────────────────
// File-serving adapter for the host web layer:
//  • `GET {url_base}/*id` streams a stored file back
//  • Request guard through an `AuthVerifier`
//
// 404 "File not found!" when the file is missing or its content cannot be
// obtained, 500 with the error message on any other failure.
// ──────────────────────────────────────────────────────────────────────────────

use crate::paths::{encode_component, trim_slashes};
use crate::storage::ResourceStorage;
use crate::types::{FetchOptions, FileContents};
use async_trait::async_trait;
use axum::{
    body::Body,
    extract::{Path, Query, Request, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use log::{debug, warn};
use serde::Deserialize;
use std::sync::Arc;

const NOT_FOUND: &str = "File not found!";

/// Decides whether an inbound request may read stored files.
#[async_trait]
pub trait AuthVerifier: Send + Sync {
    async fn verify(&self, headers: &HeaderMap) -> bool;
}

#[derive(Clone)]
struct ServeState {
    storage: Arc<dyn ResourceStorage>,
    verifier: Arc<dyn AuthVerifier>,
}

#[derive(Debug, Default, Deserialize)]
struct ServeQuery {
    dwnld: Option<String>,
}

impl ServeQuery {
    fn is_download(&self) -> bool {
        self.dwnld.as_deref().is_some_and(|v| !v.is_empty())
    }
}

/// Router serving `{url_base}/*id` from `storage`.
pub fn router(storage: Arc<dyn ResourceStorage>, url_base: &str, verifier: Arc<dyn AuthVerifier>) -> Router {
    let state = ServeState { storage, verifier };
    let base = trim_slashes(url_base);
    let route = if base.is_empty() {
        "/*id".to_string()
    } else {
        format!("/{}/*id", base)
    };
    Router::new()
        .route(&route, get(serve_file))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth))
        .with_state(state)
}

async fn require_auth(State(state): State<ServeState>, req: Request, next: Next) -> Response {
    if state.verifier.verify(req.headers()).await {
        next.run(req).await
    } else {
        debug!("rejected unauthenticated request for {}", req.uri().path());
        StatusCode::UNAUTHORIZED.into_response()
    }
}

async fn serve_file(
    State(state): State<ServeState>,
    Path(id): Path<String>,
    Query(query): Query<ServeQuery>,
) -> Response {
    let files = match state.storage.fetch(&[id.clone()], FetchOptions::default()).await {
        Ok(files) => files,
        Err(e) => {
            warn!("serving {} failed: {}", id, e);
            return (StatusCode::INTERNAL_SERVER_ERROR, e.message).into_response();
        }
    };
    let Some(file) = files.into_iter().next() else {
        return (StatusCode::NOT_FOUND, NOT_FOUND).into_response();
    };
    match file.get_contents().await {
        Ok(contents) => respond_file(contents, query.is_download()),
        Err(e) => {
            debug!("content of {} unavailable: {}", id, e);
            (StatusCode::NOT_FOUND, NOT_FOUND).into_response()
        }
    }
}

fn respond_file(contents: FileContents, download: bool) -> Response {
    let FileContents {
        name,
        options,
        content,
    } = contents;
    let meta = content.metadata().clone();

    let mut headers = HeaderMap::new();
    let encoded = encode_component(&name);
    let disposition = format!(
        "{}; filename=\"{}\";filename*=UTF-8''{}",
        if download { "attachment" } else { "inline" },
        encoded,
        encoded
    );
    if let Ok(v) = HeaderValue::from_str(&disposition) {
        headers.insert(header::CONTENT_DISPOSITION, v);
    }

    let content_type = options
        .mimetype
        .or(meta.content_type)
        .unwrap_or_else(|| "application/octet-stream".to_string());
    if let Ok(v) = HeaderValue::from_str(&content_type) {
        headers.insert(header::CONTENT_TYPE, v);
    }
    if let Some(len) = options.size.or(meta.content_length) {
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from(len));
    }
    if let Some(enc) = options.encoding.or(meta.content_encoding) {
        if let Ok(v) = HeaderValue::from_str(&enc) {
            headers.insert(header::CONTENT_ENCODING, v);
        }
    }

    (StatusCode::OK, headers, Body::from_stream(content.into_stream())).into_response()
}
