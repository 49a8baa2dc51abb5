// ──────────────────────────────────────────────────────────────────────────────
// sorng-owncloud · dav
// ──────────────────────────────────────────────────────────────────────────────
// WebDAV storage operations:
//  • Existence checks and recursive directory creation (mkdirp)
//  • Directory listing with browsing links
//  • Upload (accept), batch fetch, remove
//  • Attach / detach a file to a directory (MOVE / DELETE)
//
// Reads (check_dir, request_properties, get_dir) report a failed HTTP status
// as a negative result. Mutations reject on any status they do not expect.
// ──────────────────────────────────────────────────────────────────────────────

use crate::client::OwnCloudClient;
use crate::error::{OwnCloudError, OwnCloudResult};
use crate::multistatus::{parse_multistatus, DavEntry};
use crate::paths::{self, url_resolve};
use crate::stream::StreamProxy;
use crate::types::*;
use bytes::Bytes;
use log::{debug, info, warn};
use reqwest::{Body, StatusCode};
use tokio_util::io::ReaderStream;

/// Children of a directory, split by resource kind.
#[derive(Debug, Clone, Default)]
pub struct Listing {
    pub files: Vec<DavEntry>,
    pub dirs: Vec<DavEntry>,
}

/// WebDAV side of the storage.
#[derive(Debug, Clone)]
pub struct WebDav {
    client: OwnCloudClient,
    url_base: String,
}

impl WebDav {
    pub fn new(client: OwnCloudClient, url_base: &str) -> Self {
        Self {
            client,
            url_base: url_base.to_string(),
        }
    }

    pub fn client(&self) -> &OwnCloudClient {
        &self.client
    }

    pub fn parse_dir_id(&self, id_or_url: &str) -> OwnCloudResult<String> {
        self.client.paths().parse_dir_id(id_or_url)
    }

    /// Public link of a stored file under the serving base path.
    pub fn public_link(&self, id: &str) -> String {
        url_resolve(&[&self.url_base, id])
    }

    fn stored_file(&self, id: &str, options: FileOptions) -> StoredFile {
        StoredFile::new(
            id,
            self.public_link(id),
            options,
            StreamProxy::new(self.client.clone(), id),
        )
    }

    // ── Directories ──────────────────────────────────────────────────────

    /// Depth-0 PROPFIND. True iff the multistatus carries at least one
    /// `response`; a failed status or an absent body means "does not exist".
    pub async fn check_dir(&self, dir: &str) -> OwnCloudResult<bool> {
        let dir = self.parse_dir_id(dir)?;
        let reply = self.client.propfind(&dir, PropfindDepth::Zero).await?;
        if reply.status != StatusCode::MULTI_STATUS || reply.body.trim().is_empty() {
            debug!("check_dir {} → {}", dir, reply.status);
            return Ok(false);
        }
        Ok(!parse_multistatus(&reply.body)?.is_empty())
    }

    /// Make sure every segment of `path` exists, parents first.
    ///
    /// A path that already exists costs one PROPFIND and nothing else. A
    /// collection that appears between the check and the MKCOL (405) counts
    /// as created; a file in its place is an error.
    pub async fn mkdirp(&self, path: &str) -> OwnCloudResult<()> {
        let dir = self.parse_dir_id(path)?;
        if self.check_dir(&dir).await? {
            return Ok(());
        }

        let parts = paths::segments(&dir);
        let last = parts.len().saturating_sub(1);
        for i in 0..parts.len() {
            let prefix = parts[..=i].join("/");
            if i < last && self.check_dir(&prefix).await? {
                continue;
            }
            let reply = self.client.mkcol(&prefix).await?;
            match reply.status {
                StatusCode::CREATED => info!("created directory {}", prefix),
                StatusCode::METHOD_NOT_ALLOWED => {
                    if !self.is_collection(&prefix).await? {
                        return Err(reply.into_error("MKCOL"));
                    }
                    debug!("directory {} already exists", prefix);
                }
                _ => return Err(reply.into_error("MKCOL")),
            }
        }
        Ok(())
    }

    async fn is_collection(&self, dir: &str) -> OwnCloudResult<bool> {
        let reply = self.client.propfind(dir, PropfindDepth::Zero).await?;
        if reply.status != StatusCode::MULTI_STATUS {
            return Ok(false);
        }
        Ok(parse_multistatus(&reply.body)?
            .first()
            .is_some_and(DavEntry::is_dir))
    }

    /// Depth-1 PROPFIND split into files and directories. `None` when the
    /// server does not answer 207.
    pub async fn request_properties(&self, id: &str) -> OwnCloudResult<Option<Listing>> {
        let id = self.parse_dir_id(id)?;
        let Some(entries) = self.list_entries(&id).await? else {
            return Ok(None);
        };
        let (dirs, files): (Vec<DavEntry>, Vec<DavEntry>) = entries.into_iter().partition(DavEntry::is_dir);
        Ok(Some(Listing { files, dirs }))
    }

    /// List a directory with browsing links. `None` when the server does not
    /// answer 207.
    pub async fn get_dir(&self, id: &str) -> OwnCloudResult<Option<Directory>> {
        let id = self.parse_dir_id(id)?;
        let Some(entries) = self.list_entries(&id).await? else {
            return Ok(None);
        };

        let resolver = self.client.paths();
        let mut dir = Directory {
            id: id.clone(),
            name: paths::base_name(&id).to_string(),
            link: resolver.index_link(&id),
            files: Vec::new(),
            dirs: Vec::new(),
        };

        for (i, entry) in entries.into_iter().enumerate() {
            if i == 0 {
                dir.link = resolver.href_to_index_link(&entry.href);
                continue;
            }
            let Some(child_id) = resolver.href_to_id(&entry.href) else {
                warn!("skipping {} outside of the files root", entry.href);
                continue;
            };
            if entry.is_dir() {
                dir.dirs.push(DirRef {
                    link: resolver.href_to_index_link(&entry.href),
                    id: child_id,
                });
            } else {
                let mut options = FileOptions::named(paths::base_name(&child_id));
                options.merge_properties(&entry.properties);
                dir.files.push(self.stored_file(&child_id, options));
            }
        }
        Ok(Some(dir))
    }

    /// Create `name` under `parent`. A multi-segment name goes through mkdirp
    /// over the composed path; a single segment is one MKCOL expecting 201.
    pub async fn create_dir(
        &self,
        name: &str,
        parent: Option<&str>,
        fetch: bool,
    ) -> OwnCloudResult<Option<Directory>> {
        let name = self.parse_dir_id(name)?;
        let parent = parent
            .filter(|p| !p.is_empty())
            .map(|p| self.parse_dir_id(p))
            .transpose()?;
        let id = url_resolve(&[parent.as_deref().unwrap_or(""), &name]);

        if paths::segments(&name).len() > 1 {
            self.mkdirp(&id).await?;
        } else {
            let reply = self.client.mkcol(&id).await?;
            if reply.status != StatusCode::CREATED {
                return Err(reply.into_error("MKCOL"));
            }
            info!("created directory {}", id);
        }

        if fetch {
            self.get_dir(&id).await
        } else {
            Ok(None)
        }
    }

    // ── Files ────────────────────────────────────────────────────────────

    /// Upload into `directory` (created if needed). Succeeds on 201 / 204.
    pub async fn accept(
        &self,
        data: UploadSource,
        directory: Option<&str>,
        options: AcceptOptions,
    ) -> OwnCloudResult<StoredFile> {
        let directory = directory
            .filter(|d| !d.is_empty())
            .map(|d| self.parse_dir_id(d))
            .transpose()?;

        let (payload, carried_name) = extract_payload(data)?;
        let file_name = options
            .name
            .filter(|n| !n.is_empty())
            .or(carried_name)
            .unwrap_or_else(|| uuid::Uuid::new_v4().simple().to_string());
        if file_name.contains('/') || file_name == "." || file_name == ".." {
            return Err(OwnCloudError::invalid_path(format!(
                "invalid file name: {}",
                file_name
            )));
        }

        if let Some(ref dir) = directory {
            self.mkdirp(dir).await?;
        }

        let id = url_resolve(&[directory.as_deref().unwrap_or(""), &file_name]);
        let body = payload.into_body().await?;
        let reply = self.client.put(&id, body).await?;
        match reply.status {
            StatusCode::CREATED | StatusCode::NO_CONTENT => {
                info!("stored {}", id);
                Ok(self.stored_file(&id, FileOptions::named(file_name)))
            }
            _ => Err(reply.into_error("PUT")),
        }
    }

    /// DELETE. A 404 counts as already removed.
    pub async fn remove(&self, id: &str) -> OwnCloudResult<String> {
        let id = self.parse_dir_id(id)?;
        let reply = self.client.delete(&id).await?;
        match reply.status {
            StatusCode::NO_CONTENT | StatusCode::NOT_FOUND => Ok(id),
            _ => Err(reply.into_error("DELETE")),
        }
    }

    /// Build stored files for `ids`, in order. With `fetch_info` each file is
    /// enriched with its PROPFIND properties.
    pub async fn fetch(&self, ids: &[String], options: FetchOptions) -> OwnCloudResult<Vec<StoredFile>> {
        let mut result = Vec::with_capacity(ids.len());
        for raw in ids {
            let id = paths::decode(&self.parse_dir_id(raw)?);
            let mut info = FileOptions::named(paths::base_name(&id));
            if options.fetch_info {
                if let Some(listing) = self.request_properties(&id).await? {
                    if let Some(first) = listing.files.first() {
                        info.merge_properties(&first.properties);
                    }
                }
            }
            result.push(self.stored_file(&id, info));
        }
        Ok(result)
    }

    /// Move a file into `dir_id`, keeping its name. Returns the new id.
    pub async fn put_file(&self, dir_id: &str, file_id: &str) -> OwnCloudResult<String> {
        let dir = self.parse_dir_id(dir_id)?;
        let file = self.parse_dir_id(file_id)?;
        let target = url_resolve(&[&dir, paths::base_name(&file)]);
        let reply = self.client.move_resource(&file, &target).await?;
        if reply.status != StatusCode::CREATED {
            return Err(reply.into_error("MOVE"));
        }
        Ok(target)
    }

    /// Remove a file from `dir_id`.
    pub async fn eject_file(&self, dir_id: &str, file_id: &str) -> OwnCloudResult<String> {
        let dir = self.parse_dir_id(dir_id)?;
        self.remove(&url_resolve(&[&dir, paths::base_name(file_id)])).await
    }

    async fn list_entries(&self, id: &str) -> OwnCloudResult<Option<Vec<DavEntry>>> {
        let reply = self.client.propfind(id, PropfindDepth::One).await?;
        if reply.status != StatusCode::MULTI_STATUS {
            warn!("PROPFIND {} → {}", id, reply.status);
            return Ok(None);
        }
        parse_multistatus(&reply.body).map(Some)
    }
}

// ── Upload payloads ──────────────────────────────────────────────────────────

enum Payload {
    Bytes(Bytes),
    Path(std::path::PathBuf),
    Stream(crate::stream::ByteStream),
}

impl Payload {
    async fn into_body(self) -> OwnCloudResult<Body> {
        Ok(match self {
            Self::Bytes(b) => Body::from(b),
            Self::Path(p) => {
                let file = tokio::fs::File::open(&p).await.map_err(|e| {
                    OwnCloudError::io(format!("open {}: {}", p.display(), e))
                })?;
                Body::wrap_stream(ReaderStream::new(file))
            }
            Self::Stream(s) => Body::wrap_stream(s),
        })
    }
}

/// Pick the payload (buffer, then path, then stream) and any name it carries.
fn extract_payload(data: UploadSource) -> OwnCloudResult<(Payload, Option<String>)> {
    match data {
        UploadSource::Bytes(b) => Ok((Payload::Bytes(b), None)),
        UploadSource::Stream(s) => Ok((Payload::Stream(s), None)),
        UploadSource::Path(p) => Ok((Payload::Path(p), None)),
        UploadSource::Descriptor(d) => {
            let name = d
                .original_name
                .filter(|n| !n.is_empty())
                .or(d.name.filter(|n| !n.is_empty()));
            let payload = if let Some(b) = d.buffer {
                Payload::Bytes(b)
            } else if let Some(p) = d.path {
                Payload::Path(p)
            } else if let Some(s) = d.stream {
                Payload::Stream(s)
            } else {
                return Err(OwnCloudError::payload("data of inappropriate type received"));
            };
            Ok((payload, name))
        }
    }
}
