//! In-process fake ownCloud server for integration tests.
//!
//! Implements just enough of WebDAV (PROPFIND, MKCOL, PUT, GET, DELETE, MOVE)
//! and of the OCS Share API to drive the storage end to end.

#![allow(dead_code)]

use axum::{
    body::{to_bytes, Body},
    extract::{Request, State},
    http::{header, HeaderMap, Method, StatusCode},
    response::{IntoResponse, Response},
    Router,
};
use percent_encoding::percent_decode_str;
use serde_json::{json, Value};
use sorng_owncloud::paths::escape;
use sorng_owncloud::{OwnCloudConfig, OwnCloudStorage, ShareUser, UserCapabilities};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex};

pub const LOGIN: &str = "alice";
const DAV_PREFIX: &str = "/remote.php/dav/files/alice/";
const SHARES_PATH: &str = "/ocs/v2.php/apps/files_sharing/api/v1/shares";

#[derive(Debug, Clone, PartialEq)]
pub struct FakeShare {
    pub id: u32,
    pub share_type: i32,
    pub path: String,
    pub share_with: Option<String>,
    pub permissions: u32,
    pub token: Option<String>,
    pub password: Option<String>,
    pub expiration: Option<String>,
}

#[derive(Debug, Default)]
pub struct FakeState {
    pub files: BTreeMap<String, Vec<u8>>,
    pub dirs: BTreeSet<String>,
    pub shares: Vec<FakeShare>,
    next_share_id: u32,
    pub mkcol_calls: usize,
    pub propfind_calls: usize,
    pub share_creates: usize,
    pub share_updates: Vec<(u32, String, String)>,
    pub fail_propfind: bool,
    pub reject_put: bool,
    /// Create shares with the server defaults, ignoring `permissions`.
    pub ignore_create_permissions: bool,
    /// Ids that MKCOL reports as existing without creating them.
    pub mkcol_conflicts: BTreeSet<String>,
    /// Ids that a file occupies by the time MKCOL arrives.
    pub mkcol_file_conflicts: BTreeSet<String>,
}

pub type Shared = Arc<Mutex<FakeState>>;

pub struct FakeServer {
    pub base_url: String,
    pub state: Shared,
}

impl FakeServer {
    pub async fn start() -> Self {
        let state: Shared = Arc::default();
        let app = Router::new().fallback(handle).with_state(state.clone());
        let base_url = spawn(app).await;
        Self { base_url, state }
    }

    pub fn config(&self) -> OwnCloudConfig {
        let mut cfg = OwnCloudConfig::new(&self.base_url, LOGIN, "secret");
        cfg.users = vec![
            ShareUser {
                name: "bob".into(),
                permissions: UserCapabilities {
                    update: true,
                    delete: true,
                    ..Default::default()
                },
            },
            ShareUser {
                name: "eve".into(),
                permissions: UserCapabilities::default(),
            },
        ];
        cfg
    }

    pub fn storage(&self) -> OwnCloudStorage {
        OwnCloudStorage::new(self.config()).unwrap()
    }

    pub fn state(&self) -> std::sync::MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }
}

/// Serve `app` on an ephemeral local port and return its base URL.
pub async fn spawn(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

fn decode(s: &str) -> String {
    percent_decode_str(s).decode_utf8_lossy().into_owned()
}

fn parent_of(id: &str) -> &str {
    id.rsplit_once('/').map(|(p, _)| p).unwrap_or("")
}

fn base_of(id: &str) -> &str {
    id.rsplit('/').next().unwrap_or(id)
}

fn form(bytes: &[u8]) -> BTreeMap<String, String> {
    url::form_urlencoded::parse(bytes).into_owned().collect()
}

async fn handle(State(state): State<Shared>, req: Request) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let query = form(req.uri().query().unwrap_or("").as_bytes());
    let headers = req.headers().clone();
    let body = to_bytes(req.into_body(), usize::MAX).await.unwrap_or_default();

    if let Some(rest) = path.strip_prefix(DAV_PREFIX) {
        let id = decode(rest).trim_matches('/').to_string();
        return dav(&state, &method, &id, &headers, &body);
    }
    if path == SHARES_PATH || path.starts_with(&format!("{}/", SHARES_PATH)) {
        let share_id = path
            .strip_prefix(SHARES_PATH)
            .map(|s| s.trim_matches('/'))
            .filter(|s| !s.is_empty())
            .and_then(|s| s.parse::<u32>().ok());
        let host = headers
            .get(header::HOST)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("localhost")
            .to_string();
        return ocs(&state, &method, share_id, &query, &form(&body), &host);
    }
    StatusCode::NOT_FOUND.into_response()
}

// ── WebDAV ───────────────────────────────────────────────────────────────────

fn dav(state: &Shared, method: &Method, id: &str, headers: &HeaderMap, body: &[u8]) -> Response {
    let mut st = state.lock().unwrap();

    match method.as_str() {
        "PROPFIND" => {
            st.propfind_calls += 1;
            if st.fail_propfind {
                return (StatusCode::INTERNAL_SERVER_ERROR, "boom").into_response();
            }
            let depth = headers.get("Depth").and_then(|v| v.to_str().ok()).unwrap_or("1");
            let mut entries = Vec::new();
            if dir_exists(&st, id) {
                entries.push(dir_entry(id));
                if depth == "1" {
                    let prefix = if id.is_empty() { String::new() } else { format!("{}/", id) };
                    for d in st.dirs.iter().filter(|d| is_child(d, &prefix)) {
                        entries.push(dir_entry(d));
                    }
                    for (f, data) in st.files.iter().filter(|(f, _)| is_child(f, &prefix)) {
                        entries.push(file_entry(f, data.len()));
                    }
                }
            } else if let Some(data) = st.files.get(id) {
                entries.push(file_entry(id, data.len()));
            } else {
                return (StatusCode::NOT_FOUND, "not found").into_response();
            }
            let xml = format!(
                r#"<?xml version="1.0"?><d:multistatus xmlns:d="DAV:" xmlns:oc="http://owncloud.org/ns">{}</d:multistatus>"#,
                entries.concat()
            );
            (StatusCode::MULTI_STATUS, [(header::CONTENT_TYPE, "application/xml")], xml).into_response()
        }
        "MKCOL" => {
            st.mkcol_calls += 1;
            if st.mkcol_conflicts.remove(id) {
                st.dirs.insert(id.to_string());
                return StatusCode::METHOD_NOT_ALLOWED.into_response();
            }
            if st.mkcol_file_conflicts.remove(id) {
                st.files.insert(id.to_string(), b"occupied".to_vec());
                return StatusCode::METHOD_NOT_ALLOWED.into_response();
            }
            if dir_exists(&st, id) || st.files.contains_key(id) {
                return StatusCode::METHOD_NOT_ALLOWED.into_response();
            }
            if !dir_exists(&st, parent_of(id)) {
                return (StatusCode::CONFLICT, "parent missing").into_response();
            }
            st.dirs.insert(id.to_string());
            StatusCode::CREATED.into_response()
        }
        "PUT" => {
            if st.reject_put {
                return (StatusCode::INSUFFICIENT_STORAGE, "quota exceeded").into_response();
            }
            if !dir_exists(&st, parent_of(id)) {
                return (StatusCode::CONFLICT, "parent missing").into_response();
            }
            let existed = st.files.insert(id.to_string(), body.to_vec()).is_some();
            if existed {
                StatusCode::NO_CONTENT.into_response()
            } else {
                StatusCode::CREATED.into_response()
            }
        }
        "GET" => match st.files.get(id) {
            Some(data) => (
                StatusCode::OK,
                [(header::CONTENT_TYPE, "text/plain")],
                Body::from(data.clone()),
            )
                .into_response(),
            None => (StatusCode::NOT_FOUND, "not found").into_response(),
        },
        "DELETE" => {
            if st.files.remove(id).is_some() {
                return StatusCode::NO_CONTENT.into_response();
            }
            if !id.is_empty() && st.dirs.remove(id) {
                let prefix = format!("{}/", id);
                st.dirs.retain(|d| !d.starts_with(&prefix));
                st.files.retain(|f, _| !f.starts_with(&prefix));
                return StatusCode::NO_CONTENT.into_response();
            }
            (StatusCode::NOT_FOUND, "not found").into_response()
        }
        "MOVE" => {
            let Some(dest) = headers
                .get("Destination")
                .and_then(|v| v.to_str().ok())
                .and_then(|d| d.find(DAV_PREFIX).map(|pos| decode(&d[pos + DAV_PREFIX.len()..])))
            else {
                return StatusCode::BAD_REQUEST.into_response();
            };
            let dest = dest.trim_matches('/').to_string();
            if !dir_exists(&st, parent_of(&dest)) {
                return (StatusCode::CONFLICT, "parent missing").into_response();
            }
            match st.files.remove(id) {
                Some(data) => {
                    st.files.insert(dest, data);
                    StatusCode::CREATED.into_response()
                }
                None => (StatusCode::NOT_FOUND, "not found").into_response(),
            }
        }
        _ => StatusCode::METHOD_NOT_ALLOWED.into_response(),
    }
}

fn dir_exists(st: &FakeState, dir: &str) -> bool {
    dir.is_empty() || st.dirs.contains(dir)
}

fn is_child(path: &str, prefix: &str) -> bool {
    path.strip_prefix(prefix)
        .map(|rest| !rest.is_empty() && !rest.contains('/'))
        .unwrap_or(false)
}

fn dir_entry(id: &str) -> String {
    let href = if id.is_empty() {
        DAV_PREFIX.to_string()
    } else {
        format!("{}{}/", DAV_PREFIX, escape(id))
    };
    format!(
        "<d:response><d:href>{}</d:href><d:propstat><d:prop>\
         <d:resourcetype><d:collection/></d:resourcetype>\
         </d:prop><d:status>HTTP/1.1 200 OK</d:status></d:propstat></d:response>",
        href
    )
}

fn file_entry(id: &str, len: usize) -> String {
    format!(
        "<d:response><d:href>{}{}</d:href><d:propstat><d:prop>\
         <d:getcontentlength>{}</d:getcontentlength>\
         <d:getcontenttype>text/plain</d:getcontenttype>\
         <d:getetag>\"{}\"</d:getetag><d:resourcetype/>\
         </d:prop><d:status>HTTP/1.1 200 OK</d:status></d:propstat></d:response>",
        DAV_PREFIX,
        escape(id),
        len,
        base_of(id)
    )
}

// ── OCS Share API ────────────────────────────────────────────────────────────

fn ocs_reply(status: StatusCode, data: Value) -> Response {
    let ok = status.is_success();
    let body = json!({
        "ocs": {
            "meta": {
                "status": if ok { "ok" } else { "failure" },
                "statuscode": status.as_u16(),
                "message": if ok { "OK" } else { "Wrong path, file/folder doesn't exist" },
            },
            "data": data,
        }
    });
    (status, [(header::CONTENT_TYPE, "application/json")], body.to_string()).into_response()
}

fn share_json(s: &FakeShare, host: &str) -> Value {
    let mut v = json!({
        "id": s.id.to_string(),
        "share_type": s.share_type,
        "permissions": s.permissions,
        "path": s.path,
        "item_type": "folder",
        "share_with": s.share_with,
        "token": s.token,
        "expiration": s.expiration,
    });
    if let Some(ref token) = s.token {
        v["url"] = json!(format!("http://{}/index.php/s/{}", host, token));
    }
    v
}

fn ocs(
    state: &Shared,
    method: &Method,
    share_id: Option<u32>,
    query: &BTreeMap<String, String>,
    form: &BTreeMap<String, String>,
    host: &str,
) -> Response {
    let mut st = state.lock().unwrap();
    match (method.as_str(), share_id) {
        ("GET", None) => {
            let shares: Vec<Value> = match query.get("path") {
                Some(path) => {
                    let id = path.trim_matches('/');
                    if !st.dirs.contains(id) && !st.files.contains_key(id) {
                        return ocs_reply(StatusCode::NOT_FOUND, json!([]));
                    }
                    st.shares
                        .iter()
                        .filter(|s| &s.path == path)
                        .map(|s| share_json(s, host))
                        .collect()
                }
                None => st.shares.iter().map(|s| share_json(s, host)).collect(),
            };
            ocs_reply(StatusCode::OK, Value::Array(shares))
        }
        ("POST", None) => {
            st.share_creates += 1;
            st.next_share_id += 1;
            let id = st.next_share_id;
            let share_type: i32 = form.get("shareType").and_then(|v| v.parse().ok()).unwrap_or(3);
            let default_permissions = if share_type == 3 { 1 } else { 31 };
            let requested = form
                .get("permissions")
                .and_then(|v| v.parse().ok())
                .filter(|_| !st.ignore_create_permissions);
            let share = FakeShare {
                id,
                share_type,
                path: form.get("path").cloned().unwrap_or_default(),
                share_with: form.get("shareWith").cloned(),
                permissions: requested.unwrap_or(default_permissions),
                token: (share_type == 3).then(|| format!("tok{}", id)),
                password: form.get("password").cloned(),
                expiration: form.get("expireDate").map(|d| format!("{} 00:00:00", d)),
            };
            let data = share_json(&share, host);
            st.shares.push(share);
            ocs_reply(StatusCode::OK, data)
        }
        ("PUT", Some(id)) => {
            let Some((key, value)) = form.iter().next().map(|(k, v)| (k.clone(), v.clone())) else {
                return ocs_reply(StatusCode::BAD_REQUEST, json!([]));
            };
            st.share_updates.push((id, key.clone(), value.clone()));
            let Some(share) = st.shares.iter_mut().find(|s| s.id == id) else {
                return ocs_reply(StatusCode::NOT_FOUND, json!([]));
            };
            match key.as_str() {
                "permissions" => share.permissions = value.parse().unwrap_or(share.permissions),
                "password" => share.password = (!value.is_empty()).then_some(value),
                "expireDate" => share.expiration = (!value.is_empty()).then(|| format!("{} 00:00:00", value)),
                _ => {}
            }
            let data = share_json(share, host);
            ocs_reply(StatusCode::OK, data)
        }
        ("DELETE", Some(id)) => {
            let before = st.shares.len();
            st.shares.retain(|s| s.id != id);
            if st.shares.len() == before {
                ocs_reply(StatusCode::NOT_FOUND, json!([]))
            } else {
                ocs_reply(StatusCode::OK, json!([]))
            }
        }
        _ => ocs_reply(StatusCode::METHOD_NOT_ALLOWED, json!([])),
    }
}
