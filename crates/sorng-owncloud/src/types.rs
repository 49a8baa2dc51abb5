// ──────────────────────────────────────────────────────────────────────────────
// sorng-owncloud · types
// ──────────────────────────────────────────────────────────────────────────────
// Type catalogue for the ownCloud storage crate covering:
//  • Connection configuration & share roster
//  • Stored file / directory value objects
//  • Upload payloads and fetch options
//  • OCS envelope and share types
//  • Permission bitmask & access levels
// ──────────────────────────────────────────────────────────────────────────────

use crate::error::{OwnCloudError, OwnCloudResult};
use crate::stream::{ByteStream, OpenedContent, StreamProxy};
use bytes::Bytes;
use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

// ── Configuration ────────────────────────────────────────────────────────────

/// Connection settings for one ownCloud account.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct OwnCloudConfig {
    /// Base URL of the ownCloud instance, e.g. `https://cloud.example.com`.
    #[serde(default)]
    pub url: String,
    /// Login used for basic auth and for the WebDAV files root.
    #[serde(default)]
    pub login: String,
    #[serde(default)]
    pub password: String,
    /// Public base path under which stored files are served, e.g. `/files`.
    #[serde(default, alias = "urlBase")]
    pub url_base: Option<String>,
    /// Known users that may receive targeted shares.
    #[serde(default)]
    pub users: Vec<ShareUser>,
    #[serde(default)]
    pub connect_timeout_secs: Option<u64>,
    /// Whole-request timeout. Applies to streamed downloads as well.
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
}

impl OwnCloudConfig {
    pub fn new(url: &str, login: &str, password: &str) -> Self {
        Self {
            url: url.to_string(),
            login: login.to_string(),
            password: password.to_string(),
            ..Self::default()
        }
    }

    pub fn from_json(json: &str) -> OwnCloudResult<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| OwnCloudError::configuration(format!("invalid config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> OwnCloudResult<()> {
        if self.url.trim().is_empty() || self.login.is_empty() || self.password.is_empty() {
            return Err(OwnCloudError::configuration(
                "ownCloud connection parameters (url, login, password) are not specified",
            ));
        }
        let parsed = url::Url::parse(&self.url)
            .map_err(|e| OwnCloudError::configuration(format!("invalid url {}: {}", self.url, e)))?;
        if parsed.host_str().is_none() {
            return Err(OwnCloudError::configuration(format!(
                "url {} has no host",
                self.url
            )));
        }
        Ok(())
    }

    /// Public base path, or `""` when files are not served.
    pub fn url_base(&self) -> &str {
        self.url_base.as_deref().unwrap_or("")
    }

    pub fn find_user(&self, name: &str) -> Option<&ShareUser> {
        self.users.iter().find(|u| u.name == name)
    }
}

impl fmt::Debug for OwnCloudConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OwnCloudConfig")
            .field("url", &self.url)
            .field("login", &self.login)
            .field("password", &"****")
            .field("url_base", &self.url_base)
            .field("users", &self.users)
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}

/// Roster entry for per-user shares.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ShareUser {
    pub name: String,
    #[serde(default)]
    pub permissions: UserCapabilities,
}

/// What a targeted share recipient may do besides reading.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserCapabilities {
    #[serde(default)]
    pub update: bool,
    #[serde(default)]
    pub create: bool,
    #[serde(default)]
    pub delete: bool,
    #[serde(default)]
    pub share: bool,
}

// ── Stored files ─────────────────────────────────────────────────────────────

/// Free-form file metadata carried by a [`StoredFile`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FileOptions {
    pub name: Option<String>,
    pub mimetype: Option<String>,
    pub size: Option<u64>,
    pub encoding: Option<String>,
    /// Remaining WebDAV properties keyed by local element name.
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
}

impl FileOptions {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    /// Merge PROPFIND properties, lifting the well-known ones into fields.
    pub fn merge_properties(&mut self, props: &BTreeMap<String, String>) {
        for (key, value) in props {
            match key.as_str() {
                "getcontenttype" => self.mimetype = Some(value.clone()),
                "getcontentlength" => self.size = value.trim().parse().ok(),
                _ => {
                    self.properties.insert(key.clone(), value.clone());
                }
            }
        }
    }
}

/// A file held by the remote storage. Content is fetched only on demand.
#[derive(Debug, Clone)]
pub struct StoredFile {
    id: String,
    link: String,
    name: String,
    options: FileOptions,
    source: StreamProxy,
}

impl StoredFile {
    pub fn new(id: impl Into<String>, link: impl Into<String>, options: FileOptions, source: StreamProxy) -> Self {
        let id = id.into();
        let name = options.name.clone().unwrap_or_else(|| id.clone());
        Self {
            id,
            link: link.into(),
            name,
            options,
            source,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn link(&self) -> &str {
        &self.link
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn options(&self) -> &FileOptions {
        &self.options
    }

    /// Open the remote content. Fails instead of handing out a stream when
    /// the server does not answer 200.
    pub async fn get_contents(&self) -> OwnCloudResult<FileContents> {
        let content = self.source.open().await?;
        Ok(FileContents {
            name: self.name.clone(),
            options: self.options.clone(),
            content,
        })
    }
}

/// Result of [`StoredFile::get_contents`].
pub struct FileContents {
    pub name: String,
    pub options: FileOptions,
    pub content: OpenedContent,
}

impl fmt::Debug for FileContents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileContents")
            .field("name", &self.name)
            .field("options", &self.options)
            .field("metadata", self.content.metadata())
            .finish()
    }
}

// ── Directories ──────────────────────────────────────────────────────────────

/// Child directory reference; children are never loaded recursively.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirRef {
    pub id: String,
    pub link: String,
}

/// Point-in-time listing of a remote directory.
#[derive(Debug, Clone)]
pub struct Directory {
    pub id: String,
    pub name: String,
    pub link: String,
    pub files: Vec<StoredFile>,
    pub dirs: Vec<DirRef>,
}

// ── Uploads / fetch ──────────────────────────────────────────────────────────

/// Data handed to `accept`.
pub enum UploadSource {
    Bytes(Bytes),
    Stream(ByteStream),
    Path(PathBuf),
    Descriptor(UploadDescriptor),
}

impl fmt::Debug for UploadSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bytes(b) => write!(f, "Bytes({} bytes)", b.len()),
            Self::Stream(_) => write!(f, "Stream"),
            Self::Path(p) => write!(f, "Path({})", p.display()),
            Self::Descriptor(d) => write!(f, "{:?}", d),
        }
    }
}

impl From<Vec<u8>> for UploadSource {
    fn from(v: Vec<u8>) -> Self {
        Self::Bytes(Bytes::from(v))
    }
}

impl From<Bytes> for UploadSource {
    fn from(b: Bytes) -> Self {
        Self::Bytes(b)
    }
}

impl From<&'static str> for UploadSource {
    fn from(s: &'static str) -> Self {
        Self::Bytes(Bytes::from_static(s.as_bytes()))
    }
}

impl From<UploadDescriptor> for UploadSource {
    fn from(d: UploadDescriptor) -> Self {
        Self::Descriptor(d)
    }
}

/// Upload descriptor as produced by multipart handlers. The payload is taken
/// from `buffer`, then `path`, then `stream`.
#[derive(Default)]
pub struct UploadDescriptor {
    pub buffer: Option<Bytes>,
    pub path: Option<PathBuf>,
    pub stream: Option<ByteStream>,
    pub original_name: Option<String>,
    pub name: Option<String>,
}

impl fmt::Debug for UploadDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadDescriptor")
            .field("buffer", &self.buffer.as_ref().map(Bytes::len))
            .field("path", &self.path)
            .field("stream", &self.stream.is_some())
            .field("original_name", &self.original_name)
            .field("name", &self.name)
            .finish()
    }
}

#[derive(Debug, Clone, Default)]
pub struct AcceptOptions {
    /// Target file name; wins over any name carried by the payload.
    pub name: Option<String>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FetchOptions {
    /// Enrich each file with its PROPFIND properties.
    pub fetch_info: bool,
}

/// Depth header value for PROPFIND requests.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub enum PropfindDepth {
    Zero,
    One,
}

impl PropfindDepth {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Zero => "0",
            Self::One => "1",
        }
    }
}

// ── Generic OCS envelope ─────────────────────────────────────────────────────

/// Standard OCS response wrapper.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OcsResponse<T> {
    pub ocs: OcsEnvelope<T>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OcsEnvelope<T> {
    pub meta: OcsMeta,
    pub data: T,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OcsMeta {
    pub status: String,
    pub statuscode: u32,
    pub message: Option<String>,
}

// ── Sharing (OCS Share API) ──────────────────────────────────────────────────

/// Share types used by the storage.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ShareType {
    User = 0,
    Group = 1,
    PublicLink = 3,
}

impl ShareType {
    pub fn from_i32(v: i32) -> Option<Self> {
        match v {
            0 => Some(Self::User),
            1 => Some(Self::Group),
            3 => Some(Self::PublicLink),
            _ => None,
        }
    }

    pub fn as_i32(&self) -> i32 {
        *self as i32
    }
}

/// OCS share permissions bitmap.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct SharePermissions(pub u32);

impl SharePermissions {
    pub const READ: u32 = 1;
    pub const UPDATE: u32 = 2;
    pub const CREATE: u32 = 4;
    pub const DELETE: u32 = 8;
    pub const SHARE: u32 = 16;
    pub const ALL: u32 = 31;

    /// Read is always granted; each capability adds its flag.
    pub fn from_capabilities(caps: &UserCapabilities) -> Self {
        let mut bits = Self::READ;
        if caps.update {
            bits |= Self::UPDATE;
        }
        if caps.create {
            bits |= Self::CREATE;
        }
        if caps.delete {
            bits |= Self::DELETE;
        }
        if caps.share {
            bits |= Self::SHARE;
        }
        Self(bits)
    }

    pub fn bits(&self) -> u32 {
        self.0
    }

    pub fn can_read(&self) -> bool {
        self.0 & Self::READ != 0
    }
    pub fn can_update(&self) -> bool {
        self.0 & Self::UPDATE != 0
    }
    pub fn can_create(&self) -> bool {
        self.0 & Self::CREATE != 0
    }
    pub fn can_delete(&self) -> bool {
        self.0 & Self::DELETE != 0
    }
    pub fn can_share(&self) -> bool {
        self.0 & Self::SHARE != 0
    }
}

/// Coarse access level requested for a share.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AccessLevel {
    Read,
    ReadWrite,
    Full,
}

impl AccessLevel {
    pub fn permissions(&self) -> SharePermissions {
        match self {
            Self::Read => SharePermissions(SharePermissions::READ),
            Self::ReadWrite => SharePermissions(
                SharePermissions::READ
                    | SharePermissions::UPDATE
                    | SharePermissions::CREATE
                    | SharePermissions::DELETE,
            ),
            Self::Full => SharePermissions(SharePermissions::ALL),
        }
    }
}

/// Either set a share attribute or explicitly clear it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Change<T> {
    Set(T),
    Clear,
}

/// Options accepted by `share`.
#[derive(Debug, Clone, Default)]
pub struct ShareOptions {
    /// Roster user names; empty means the public link share.
    pub share_with: Vec<String>,
    /// Explicit bitmask; wins over the access level and user capabilities.
    pub permissions: Option<u32>,
    pub password: Option<Change<String>>,
    pub expiration: Option<Change<NaiveDate>>,
}

/// Share record as returned by the OCS API.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ShareInfo {
    #[serde(deserialize_with = "de_string")]
    pub id: String,
    #[serde(default, deserialize_with = "de_i32")]
    pub share_type: i32,
    #[serde(default, deserialize_with = "de_u32")]
    pub permissions: u32,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub share_with: Option<String>,
    #[serde(default)]
    pub expiration: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub item_type: Option<String>,
}

impl ShareInfo {
    pub fn kind(&self) -> Option<ShareType> {
        ShareType::from_i32(self.share_type)
    }

    pub fn permissions(&self) -> SharePermissions {
        SharePermissions(self.permissions)
    }
}

/// A share handed back to callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Share {
    /// Access URL: the server's share link, or the WebDAV URL of the target.
    pub url: String,
    pub info: ShareInfo,
}

/// What `share` produced.
#[derive(Debug, Clone, PartialEq)]
pub enum ShareOutcome {
    None,
    Single(Share),
    Many(Vec<Share>),
}

impl ShareOutcome {
    pub fn from_shares(mut shares: Vec<Share>) -> Self {
        match shares.len() {
            0 => Self::None,
            1 => Self::Single(shares.remove(0)),
            _ => Self::Many(shares),
        }
    }

    pub fn into_vec(self) -> Vec<Share> {
        match self {
            Self::None => Vec::new(),
            Self::Single(s) => vec![s],
            Self::Many(v) => v,
        }
    }
}

// ── Lenient OCS scalars ──────────────────────────────────────────────────────
// Servers disagree on whether ids, types and permissions are numbers or
// strings.

#[derive(Deserialize)]
#[serde(untagged)]
enum Scalar {
    Num(i64),
    Str(String),
}

fn de_string<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    Ok(match Scalar::deserialize(d)? {
        Scalar::Num(n) => n.to_string(),
        Scalar::Str(s) => s,
    })
}

fn de_i64<'de, D: Deserializer<'de>>(d: D) -> Result<i64, D::Error> {
    match Option::<Scalar>::deserialize(d)? {
        None => Ok(0),
        Some(Scalar::Num(n)) => Ok(n),
        Some(Scalar::Str(s)) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}

fn de_i32<'de, D: Deserializer<'de>>(d: D) -> Result<i32, D::Error> {
    de_i64(d).and_then(|v| i32::try_from(v).map_err(serde::de::Error::custom))
}

fn de_u32<'de, D: Deserializer<'de>>(d: D) -> Result<u32, D::Error> {
    de_i64(d).and_then(|v| u32::try_from(v).map_err(serde::de::Error::custom))
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════
