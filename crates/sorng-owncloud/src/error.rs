//! ownCloud storage error type.
//!
//! Every public operation of this crate returns `OwnCloudResult<T>`.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Categorised ownCloud error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OwnCloudError {
    pub kind: OwnCloudErrorKind,
    pub message: String,
    /// HTTP status that triggered the error, if any.
    pub status: Option<u16>,
    /// Response body returned alongside an unexpected status.
    pub body: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum OwnCloudErrorKind {
    /// Missing or malformed url / login / password.
    Configuration,
    /// An id could not be resolved to a server path or share.
    InvalidPath,
    /// The server answered with an unexpected HTTP status.
    Protocol,
    /// Body missing, or the multistatus XML could not be read.
    EmptyResponse,
    /// No usable upload payload could be extracted.
    Payload,
    /// No share matched the given path or token.
    ShareNotFound,
    /// Transport failure before a response was observed.
    Network,
    /// Local file I/O failure (uploads from a path).
    Io,
    /// OCS JSON could not be decoded.
    Parse,
}

pub type OwnCloudResult<T> = Result<T, OwnCloudError>;

// ── Construction helpers ─────────────────────────────────────────────

impl OwnCloudError {
    pub fn new(kind: OwnCloudErrorKind, msg: impl Into<String>) -> Self {
        Self {
            kind,
            message: msg.into(),
            status: None,
            body: None,
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::new(OwnCloudErrorKind::Configuration, msg)
    }

    pub fn invalid_path(msg: impl Into<String>) -> Self {
        Self::new(OwnCloudErrorKind::InvalidPath, msg)
    }

    /// Unexpected status for a WebDAV / OCS call. The body is kept verbatim
    /// and only truncated in the message.
    pub fn protocol(method: &str, status: u16, body: impl Into<String>) -> Self {
        let body = body.into();
        let excerpt: String = body.chars().take(500).collect();
        Self::new(
            OwnCloudErrorKind::Protocol,
            format!("{} → status code {}. {}", method, status, excerpt),
        )
        .with_status(status)
        .with_body(body)
    }

    pub fn empty_response(msg: impl Into<String>) -> Self {
        Self::new(OwnCloudErrorKind::EmptyResponse, msg)
    }

    pub fn payload(msg: impl Into<String>) -> Self {
        Self::new(OwnCloudErrorKind::Payload, msg)
    }

    pub fn share_not_found(what: &str) -> Self {
        Self::new(
            OwnCloudErrorKind::ShareNotFound,
            format!("share not found: {}", what),
        )
    }

    pub fn network(msg: impl Into<String>) -> Self {
        Self::new(OwnCloudErrorKind::Network, msg)
    }

    pub fn io(msg: impl Into<String>) -> Self {
        Self::new(OwnCloudErrorKind::Io, msg)
    }

    pub fn parse(msg: impl Into<String>) -> Self {
        Self::new(OwnCloudErrorKind::Parse, msg)
    }

    pub fn is_not_found(&self) -> bool {
        self.status == Some(404) || self.kind == OwnCloudErrorKind::ShareNotFound
    }
}

impl fmt::Display for OwnCloudError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(status) = self.status {
            write!(f, "[ownCloud {:?} {}] {}", self.kind, status, self.message)
        } else {
            write!(f, "[ownCloud {:?}] {}", self.kind, self.message)
        }
    }
}

impl std::error::Error for OwnCloudError {}

impl From<reqwest::Error> for OwnCloudError {
    fn from(e: reqwest::Error) -> Self {
        let err = Self::network(e.to_string());
        match e.status() {
            Some(status) => err.with_status(status.as_u16()),
            None => err,
        }
    }
}

impl From<std::io::Error> for OwnCloudError {
    fn from(e: std::io::Error) -> Self {
        Self::io(e.to_string())
    }
}

impl From<quick_xml::Error> for OwnCloudError {
    fn from(e: quick_xml::Error) -> Self {
        Self::empty_response(format!("malformed multistatus body: {}", e))
    }
}

impl From<serde_json::Error> for OwnCloudError {
    fn from(e: serde_json::Error) -> Self {
        Self::parse(format!("OCS JSON parse error: {}", e))
    }
}

impl From<OwnCloudError> for String {
    fn from(e: OwnCloudError) -> String {
        e.message
    }
}
