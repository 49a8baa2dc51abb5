// ──────────────────────────────────────────────────────────────────────────────
// sorng-owncloud · paths
// ──────────────────────────────────────────────────────────────────────────────
// Storage id / URL helpers:
//  • Segment-wise escaping for WebDAV URLs
//  • Slash trimming and URL concatenation
//  • Directory-id extraction from bare ids, WebDAV URLs and browsing URLs
//  • Share-token extraction from public share links
// ──────────────────────────────────────────────────────────────────────────────

use crate::error::{OwnCloudError, OwnCloudResult};
use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use url::Url;

/// Everything `encodeURIComponent` escapes, plus `(` and `)`, which some
/// proxies in front of ownCloud mangle when left raw.
const SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'');

/// Exactly what `encodeURIComponent` escapes.
const COMPONENT: &AsciiSet = &SEGMENT.remove(b'(').remove(b')');

/// Browsing UI prefix; the directory is carried in the `dir` query parameter.
pub const INDEX_PREFIX: &str = "index.php/apps/files/?dir=/";

/// Percent-encode every segment of `id` while keeping `/` separators.
pub fn escape(id: &str) -> String {
    id.split('/')
        .map(|seg| utf8_percent_encode(seg, SEGMENT).to_string())
        .collect::<Vec<_>>()
        .join("/")
}

/// Percent-encode a single component, e.g. a file name in a header.
pub fn encode_component(s: &str) -> String {
    utf8_percent_encode(s, COMPONENT).to_string()
}

/// Percent-decode an href or id. Invalid UTF-8 is replaced, not rejected.
pub fn decode(s: &str) -> String {
    percent_decode_str(s).decode_utf8_lossy().into_owned()
}

pub fn trim_slashes(s: &str) -> &str {
    s.trim_matches('/')
}

/// Join fragments with exactly one `/` between them and one trailing `/`.
/// A single fragment is returned untouched.
pub fn url_concat(parts: &[&str]) -> String {
    match parts {
        [] => String::new(),
        [single] => (*single).to_string(),
        _ => parts
            .iter()
            .map(|p| format!("{}/", trim_slashes(p)))
            .collect(),
    }
}

/// Join fragments with single slashes and no trailing slash. Empty fragments
/// are skipped; a leading `/` or scheme on the first fragment is kept.
pub fn url_resolve(parts: &[&str]) -> String {
    let mut out = String::new();
    for part in parts {
        let piece = if out.is_empty() {
            part.trim_end_matches('/')
        } else {
            trim_slashes(part)
        };
        if piece.is_empty() {
            continue;
        }
        if !out.is_empty() {
            out.push('/');
        }
        out.push_str(piece);
    }
    out
}

/// Last path segment of an id.
pub fn base_name(id: &str) -> &str {
    let trimmed = id.trim_end_matches('/');
    trimmed.rsplit('/').next().unwrap_or(trimmed)
}

/// Non-empty segments of an id.
pub fn segments(id: &str) -> Vec<&str> {
    id.split('/').filter(|s| !s.is_empty()).collect()
}

/// Resolves storage ids against one ownCloud account.
#[derive(Debug, Clone)]
pub struct PathResolver {
    server: Url,
    base_url: String,
    login: String,
}

impl PathResolver {
    pub fn new(base_url: &str, login: &str) -> OwnCloudResult<Self> {
        let server = Url::parse(base_url)
            .map_err(|e| OwnCloudError::configuration(format!("invalid url {}: {}", base_url, e)))?;
        Ok(Self {
            server,
            base_url: base_url.trim_end_matches('/').to_string(),
            login: login.to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// WebDAV files root relative to the server, e.g. `remote.php/dav/files/alice/`.
    pub fn dav_prefix(&self) -> String {
        format!("remote.php/dav/files/{}/", encode_component(&self.login))
    }

    /// Decoded form of `dav_prefix`, for matching decoded hrefs.
    fn files_root(&self) -> String {
        format!("remote.php/dav/files/{}/", self.login)
    }

    /// Absolute WebDAV URL of a resource.
    pub fn dav_url(&self, id: &str) -> String {
        format!(
            "{}/{}{}",
            self.base_url,
            self.dav_prefix(),
            escape(trim_slashes(id))
        )
    }

    /// Absolute WebDAV URL of a collection (always slash-terminated).
    pub fn dav_collection_url(&self, id: &str) -> String {
        let url = self.dav_url(id);
        if url.ends_with('/') {
            url
        } else {
            url + "/"
        }
    }

    /// Browsing-UI link of a directory.
    pub fn index_link(&self, id: &str) -> String {
        format!("{}/{}{}", self.base_url, INDEX_PREFIX, escape(trim_slashes(id)))
    }

    /// Rewrite a WebDAV href (absolute path or URL) into a browsing-UI link.
    /// Hrefs outside the files root only get the prefix swapped.
    pub fn href_to_index_link(&self, href: &str) -> String {
        if let Some(id) = self.href_to_id(href) {
            return self.index_link(&id);
        }
        let rewritten = href.replacen(&self.dav_prefix(), INDEX_PREFIX, 1);
        if rewritten.starts_with("http://") || rewritten.starts_with("https://") {
            rewritten
        } else {
            url_resolve(&[self.origin().as_str(), &rewritten])
        }
    }

    /// Storage-relative id of a WebDAV href, if it lies under the files root.
    pub fn href_to_id(&self, href: &str) -> Option<String> {
        let decoded = decode(href);
        let prefix = self.files_root();
        decoded
            .find(&prefix)
            .map(|pos| trim_slashes(&decoded[pos + prefix.len()..]).to_string())
    }

    /// Accept a bare storage id, a WebDAV URL or a browsing URL with a `dir`
    /// parameter on this server, and return the normalized id.
    pub fn parse_dir_id(&self, id_or_url: &str) -> OwnCloudResult<String> {
        let resolved = match Url::parse(id_or_url) {
            Ok(parsed) if parsed.host_str().is_some() => {
                if self.same_host(&parsed) {
                    self.id_from_server_url(&parsed)
                } else {
                    None
                }
            }
            _ => Some(id_or_url.to_string()),
        };

        resolved
            .map(|id| trim_slashes(&id).to_string())
            .filter(|id| !id.is_empty())
            .ok_or_else(|| {
                OwnCloudError::invalid_path(format!(
                    "invalid path to directory specified: {}",
                    id_or_url
                ))
            })
    }

    /// Share token from a public link (`…/s/<token>`) or a bare token.
    pub fn parse_token(&self, link_or_token: &str) -> Option<String> {
        if let Ok(parsed) = Url::parse(link_or_token) {
            let segs: Vec<&str> = parsed.path_segments()?.filter(|s| !s.is_empty()).collect();
            return segs
                .windows(2)
                .find(|w| w[0] == "s")
                .map(|w| w[1].to_string());
        }
        let token = link_or_token.trim();
        let looks_like_token = !token.is_empty()
            && token.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        looks_like_token.then(|| token.to_string())
    }

    fn origin(&self) -> String {
        self.server.origin().ascii_serialization()
    }

    fn same_host(&self, other: &Url) -> bool {
        other.host_str() == self.server.host_str()
            && other.port_or_known_default() == self.server.port_or_known_default()
    }

    fn id_from_server_url(&self, parsed: &Url) -> Option<String> {
        if let Some((_, dir)) = parsed.query_pairs().find(|(k, _)| k == "dir") {
            return Some(dir.trim_start_matches('/').to_string());
        }
        let path = decode(parsed.path());
        let prefix = format!("/{}", self.files_root());
        path.find(&prefix)
            .map(|pos| path[pos + prefix.len()..].to_string())
    }
}
