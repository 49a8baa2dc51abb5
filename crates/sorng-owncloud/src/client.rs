// ──────────────────────────────────────────────────────────────────────────────
// sorng-owncloud · client
// ──────────────────────────────────────────────────────────────────────────────
// Low-level HTTP client for an ownCloud account covering:
//  • WebDAV requests (PROPFIND, MKCOL, PUT, GET, DELETE, MOVE)
//  • OCS REST JSON requests (GET, POST, PUT, DELETE)
//
// Status interpretation is left to the callers; every call is sent exactly
// once.
// ──────────────────────────────────────────────────────────────────────────────

use crate::error::{OwnCloudError, OwnCloudResult};
use crate::paths::PathResolver;
use crate::types::*;
use log::debug;
use reqwest::{header, Body, Client, Method, RequestBuilder, Response, StatusCode};
use std::fmt;
use std::time::Duration;

/// Status and body of a WebDAV call.
#[derive(Debug, Clone)]
pub struct DavReply {
    pub status: StatusCode,
    pub body: String,
}

impl DavReply {
    pub fn code(&self) -> u16 {
        self.status.as_u16()
    }

    pub fn into_error(self, method: &str) -> OwnCloudError {
        OwnCloudError::protocol(method, self.status.as_u16(), self.body)
    }
}

/// Low-level ownCloud HTTP client.
#[derive(Clone)]
pub struct OwnCloudClient {
    http: Client,
    paths: PathResolver,
    username: String,
    password: String,
}

impl OwnCloudClient {
    // ── Constructors ─────────────────────────────────────────────────────

    pub fn new(config: &OwnCloudConfig) -> OwnCloudResult<Self> {
        config.validate()?;
        let mut builder = Client::builder();
        if let Some(secs) = config.connect_timeout_secs {
            builder = builder.connect_timeout(Duration::from_secs(secs));
        }
        if let Some(secs) = config.request_timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let http = builder
            .build()
            .map_err(|e| OwnCloudError::configuration(format!("build HTTP client: {}", e)))?;
        Ok(Self {
            http,
            paths: PathResolver::new(&config.url, &config.login)?,
            username: config.login.clone(),
            password: config.password.clone(),
        })
    }

    pub fn paths(&self) -> &PathResolver {
        &self.paths
    }

    pub fn base_url(&self) -> &str {
        self.paths.base_url()
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn masked_password(&self) -> String {
        match self.password.get(..4) {
            Some(head) if self.password.len() > 4 => format!("{}****", head),
            _ => "****".to_string(),
        }
    }

    /// OCS URL for an endpoint path, e.g. `ocs/v2.php/apps/files_sharing/api/v1/shares`.
    pub fn ocs_url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url(), path.trim_start_matches('/'))
    }

    // ── Auth header injection ────────────────────────────────────────────

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        debug!("{} {}", method, url);
        self.http
            .request(method, url)
            .basic_auth(&self.username, Some(&self.password))
    }

    // ── WebDAV methods ───────────────────────────────────────────────────

    /// PROPFIND with the given depth. The raw reply is returned whatever the
    /// status.
    pub async fn propfind(&self, id: &str, depth: PropfindDepth) -> OwnCloudResult<DavReply> {
        let url = self.paths.dav_url(id);
        let req = self
            .request(dav_method(b"PROPFIND")?, &url)
            .header("Depth", depth.as_str())
            .header(header::CONTENT_TYPE, "application/xml; charset=utf-8")
            .body(propfind_body());
        read_reply(req.send().await?).await
    }

    /// MKCOL (create one collection).
    pub async fn mkcol(&self, id: &str) -> OwnCloudResult<DavReply> {
        let url = self.paths.dav_collection_url(id);
        read_reply(self.request(dav_method(b"MKCOL")?, &url).send().await?).await
    }

    /// PUT a body, streamed as it is produced.
    pub async fn put(&self, id: &str, body: Body) -> OwnCloudResult<DavReply> {
        let url = self.paths.dav_url(id);
        let req = self
            .request(Method::PUT, &url)
            .header(header::CONTENT_TYPE, "application/octet-stream")
            .body(body);
        read_reply(req.send().await?).await
    }

    /// GET. The response is handed back unread so the body can be streamed.
    pub async fn get(&self, id: &str) -> OwnCloudResult<Response> {
        let url = self.paths.dav_url(id);
        Ok(self.request(Method::GET, &url).send().await?)
    }

    pub async fn delete(&self, id: &str) -> OwnCloudResult<DavReply> {
        let url = self.paths.dav_url(id);
        read_reply(self.request(Method::DELETE, &url).send().await?).await
    }

    /// MOVE `from` to `to`; `Destination` carries the fully qualified URL.
    pub async fn move_resource(&self, from: &str, to: &str) -> OwnCloudResult<DavReply> {
        let src_url = self.paths.dav_url(from);
        let dst_url = self.paths.dav_url(to);
        let req = self
            .request(dav_method(b"MOVE")?, &src_url)
            .header("Destination", dst_url)
            .header("Overwrite", "T");
        read_reply(req.send().await?).await
    }

    // ── OCS JSON helpers ─────────────────────────────────────────────────

    /// OCS GET returning JSON deserialized to T.
    pub async fn ocs_get<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> OwnCloudResult<OcsResponse<T>> {
        let url = self.ocs_url(path);
        let req = self.ocs_request(Method::GET, &url).query(query);
        parse_ocs_json("OCS GET", req.send().await?).await
    }

    /// OCS POST with form-encoded body.
    pub async fn ocs_post<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        form: &[(String, String)],
    ) -> OwnCloudResult<OcsResponse<T>> {
        let url = self.ocs_url(path);
        let req = self.ocs_request(Method::POST, &url).form(form);
        parse_ocs_json("OCS POST", req.send().await?).await
    }

    /// OCS PUT with form-encoded body.
    pub async fn ocs_put<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        form: &[(String, String)],
    ) -> OwnCloudResult<OcsResponse<T>> {
        let url = self.ocs_url(path);
        let req = self.ocs_request(Method::PUT, &url).form(form);
        parse_ocs_json("OCS PUT", req.send().await?).await
    }

    /// OCS DELETE.
    pub async fn ocs_delete<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
    ) -> OwnCloudResult<OcsResponse<T>> {
        let url = self.ocs_url(path);
        let req = self.ocs_request(Method::DELETE, &url);
        parse_ocs_json("OCS DELETE", req.send().await?).await
    }

    fn ocs_request(&self, method: Method, url: &str) -> RequestBuilder {
        self.request(method, url)
            .header("OCS-APIRequest", "true")
            .header(header::ACCEPT, "application/json")
            .query(&[("format", "json")])
    }
}

impl fmt::Debug for OwnCloudClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OwnCloudClient")
            .field("base_url", &self.base_url())
            .field("username", &self.username)
            .field("password", &self.masked_password())
            .finish()
    }
}

// ── Free-standing helpers ────────────────────────────────────────────────────

fn dav_method(name: &'static [u8]) -> OwnCloudResult<Method> {
    Method::from_bytes(name).map_err(|e| {
        OwnCloudError::configuration(format!(
            "invalid HTTP method {}: {}",
            String::from_utf8_lossy(name),
            e
        ))
    })
}

async fn read_reply(resp: Response) -> OwnCloudResult<DavReply> {
    let status = resp.status();
    let body = resp.text().await?;
    Ok(DavReply { status, body })
}

/// Build the PROPFIND XML body requesting the properties the storage uses.
pub fn propfind_body() -> String {
    r#"<?xml version="1.0" encoding="UTF-8"?>
<d:propfind xmlns:d="DAV:" xmlns:oc="http://owncloud.org/ns">
  <d:prop>
    <d:getcontenttype/>
    <d:getcontentlength/>
    <d:getetag/>
    <d:getlastmodified/>
    <d:resourcetype/>
    <oc:fileid/>
    <oc:permissions/>
    <oc:size/>
  </d:prop>
</d:propfind>"#
        .to_string()
}

/// Parse an OCS JSON response; non-success statuses become protocol errors.
async fn parse_ocs_json<T: serde::de::DeserializeOwned>(
    method: &str,
    resp: Response,
) -> OwnCloudResult<OcsResponse<T>> {
    let status = resp.status();
    let text = resp.text().await?;

    if status.is_success() {
        Ok(serde_json::from_str::<OcsResponse<T>>(&text)?)
    } else {
        Err(OwnCloudError::protocol(method, status.as_u16(), text))
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    fn client(password: &str) -> OwnCloudClient {
        OwnCloudClient::new(&OwnCloudConfig::new("https://oc.test/", "alice", password)).unwrap()
    }

    #[test]
    fn rejects_missing_credentials() {
        let err = OwnCloudClient::new(&OwnCloudConfig::new("https://oc.test", "alice", "")).unwrap_err();
        assert_eq!(err.kind, crate::error::OwnCloudErrorKind::Configuration);
    }

    #[test]
    fn base_url_strips_trailing_slash() {
        assert_eq!(client("pw").base_url(), "https://oc.test");
    }

    #[test]
    fn ocs_url_building() {
        assert_eq!(
            client("pw").ocs_url("/ocs/v2.php/apps/files_sharing/api/v1/shares"),
            "https://oc.test/ocs/v2.php/apps/files_sharing/api/v1/shares"
        );
    }

    #[test]
    fn masked_password_short() {
        assert_eq!(client("ab").masked_password(), "****");
    }

    #[test]
    fn masked_password_long() {
        assert_eq!(client("secret-password").masked_password(), "secr****");
    }

    #[test]
    fn debug_hides_password() {
        let dbg = format!("{:?}", client("secret-password"));
        assert!(!dbg.contains("secret-password"));
        assert!(dbg.contains("alice"));
    }

    #[test]
    fn propfind_body_is_valid_xml() {
        let body = propfind_body();
        assert!(body.starts_with("<?xml"));
        assert!(body.contains("<d:resourcetype/>"));
    }

    #[test]
    fn extension_methods_are_valid() {
        assert_eq!(dav_method(b"PROPFIND").unwrap().as_str(), "PROPFIND");
        assert_eq!(dav_method(b"MKCOL").unwrap().as_str(), "MKCOL");
        assert_eq!(dav_method(b"MOVE").unwrap().as_str(), "MOVE");
    }

    #[test]
    fn invalid_method_is_an_error_not_a_get() {
        let err = dav_method(b"BAD METHOD").unwrap_err();
        assert_eq!(err.kind, crate::error::OwnCloudErrorKind::Configuration);
    }

    #[test]
    fn reply_into_error_keeps_status_and_body() {
        let reply = DavReply {
            status: StatusCode::CONFLICT,
            body: "parent missing".into(),
        };
        assert_eq!(reply.code(), 409);
        let err = reply.into_error("MKCOL");
        assert_eq!(err.status, Some(409));
        assert_eq!(err.body.as_deref(), Some("parent missing"));
    }
}
