// ──────────────────────────────────────────────────────────────────────────────
// sorng-owncloud · stream
// ──────────────────────────────────────────────────────────────────────────────
// Deferred file content.
//
// Retrieval happens in two phases: `StreamProxy::open` sends the GET and
// checks the status, exposing the response headers as `ContentMetadata`;
// the body is only pulled once the caller turns the `OpenedContent` into a
// stream (or collects it). Dropping an `OpenedContent` aborts the transfer.
// ──────────────────────────────────────────────────────────────────────────────

use crate::client::OwnCloudClient;
use crate::error::{OwnCloudError, OwnCloudResult};
use bytes::Bytes;
use futures::{Stream, StreamExt, TryStreamExt};
use reqwest::{header, Response, StatusCode};
use serde::Serialize;
use std::fmt;
use std::pin::Pin;

/// Byte stream used for both uploads and downloads.
pub type ByteStream = Pin<Box<dyn Stream<Item = OwnCloudResult<Bytes>> + Send>>;

/// Headers of a successful GET, available before any body byte is read.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ContentMetadata {
    pub status: u16,
    pub content_type: Option<String>,
    pub content_length: Option<u64>,
    pub content_encoding: Option<String>,
}

impl ContentMetadata {
    fn from_response(resp: &Response) -> Self {
        let text = |name: header::HeaderName| {
            resp.headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        Self {
            status: resp.status().as_u16(),
            content_type: text(header::CONTENT_TYPE),
            content_length: resp.content_length(),
            content_encoding: text(header::CONTENT_ENCODING),
        }
    }
}

/// An opened remote file whose body has not been consumed yet.
pub struct OpenedContent {
    metadata: ContentMetadata,
    response: Response,
}

impl OpenedContent {
    pub fn metadata(&self) -> &ContentMetadata {
        &self.metadata
    }

    /// Start the transfer. Bytes flow as fast as the consumer polls.
    pub fn into_stream(self) -> ByteStream {
        self.response
            .bytes_stream()
            .map_err(OwnCloudError::from)
            .boxed()
    }

    /// Collect the whole body.
    pub async fn into_bytes(self) -> OwnCloudResult<Bytes> {
        Ok(self.response.bytes().await?)
    }
}

impl fmt::Debug for OpenedContent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenedContent")
            .field("metadata", &self.metadata)
            .finish_non_exhaustive()
    }
}

/// Content source of one stored file; cloning shares the same source.
#[derive(Debug, Clone)]
pub struct StreamProxy {
    client: OwnCloudClient,
    id: String,
}

impl StreamProxy {
    pub fn new(client: OwnCloudClient, id: impl Into<String>) -> Self {
        Self {
            client,
            id: id.into(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Send the GET and wait for the headers only. Anything but 200, or a
    /// transport failure before headers arrive, is an error.
    pub async fn open(&self) -> OwnCloudResult<OpenedContent> {
        let response = self.client.get(&self.id).await?;
        let status = response.status();
        if status != StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            return Err(OwnCloudError::protocol(
                "GET (failed to obtain file from remote storage)",
                status.as_u16(),
                body,
            ));
        }
        Ok(OpenedContent {
            metadata: ContentMetadata::from_response(&response),
            response,
        })
    }
}
