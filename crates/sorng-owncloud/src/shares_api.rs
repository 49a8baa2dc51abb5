// ──────────────────────────────────────────────────────────────────────────────
// sorng-owncloud · shares_api
// ──────────────────────────────────────────────────────────────────────────────
// OCS Share API calls:
//  • Create share (public link or user)
//  • List shares (all, or for a path)
//  • Update one share attribute
//  • Delete share
//  • Token lookup
// ──────────────────────────────────────────────────────────────────────────────

use crate::client::OwnCloudClient;
use crate::error::{OwnCloudError, OwnCloudResult};
use crate::paths::trim_slashes;
use crate::types::*;
use chrono::NaiveDate;
use log::debug;
use serde::Deserialize;

const SHARES_API: &str = "ocs/v2.php/apps/files_sharing/api/v1/shares";

/// Calendar format expected by `expireDate`.
pub const EXPIRATION_FORMAT: &str = "%Y-%m-%d";

/// Arguments for creating a new share.
#[derive(Debug, Clone, PartialEq)]
pub struct CreateShareArgs {
    /// Storage id of the shared resource.
    pub path: String,
    pub share_type: ShareType,
    /// Recipient for user shares.
    pub share_with: Option<String>,
    pub password: Option<String>,
    pub expire_date: Option<NaiveDate>,
    pub permissions: Option<u32>,
}

impl CreateShareArgs {
    fn to_form(&self) -> Vec<(String, String)> {
        let mut form: Vec<(String, String)> = vec![
            ("path".into(), format!("/{}", trim_slashes(&self.path))),
            ("shareType".into(), self.share_type.as_i32().to_string()),
            ("publicUpload".into(), "false".into()),
        ];
        if let Some(ref sw) = self.share_with {
            form.push(("shareWith".into(), sw.clone()));
        }
        if let Some(ref pw) = self.password {
            form.push(("password".into(), pw.clone()));
        }
        if let Some(exp) = self.expire_date {
            form.push(("expireDate".into(), format_expiration(exp)));
        }
        if let Some(p) = self.permissions {
            form.push(("permissions".into(), p.to_string()));
        }
        form
    }
}

/// Convenience: create a public link share.
pub fn build_public_link_share(
    path: &str,
    password: Option<&str>,
    expire_date: Option<NaiveDate>,
) -> CreateShareArgs {
    CreateShareArgs {
        path: path.to_string(),
        share_type: ShareType::PublicLink,
        share_with: None,
        password: password.map(str::to_string),
        expire_date,
        permissions: None,
    }
}

/// Convenience: create a user share.
pub fn build_user_share(
    path: &str,
    share_with: &str,
    permissions: Option<u32>,
    expire_date: Option<NaiveDate>,
) -> CreateShareArgs {
    CreateShareArgs {
        path: path.to_string(),
        share_type: ShareType::User,
        share_with: Some(share_with.to_string()),
        password: None,
        expire_date,
        permissions,
    }
}

/// One attribute change; the API accepts a single attribute per update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShareUpdate {
    Permissions(u32),
    /// `None` removes the password.
    Password(Option<String>),
    /// `None` removes the expiration.
    ExpireDate(Option<NaiveDate>),
}

impl ShareUpdate {
    fn to_form(&self) -> Vec<(String, String)> {
        let pair = match self {
            Self::Permissions(p) => ("permissions", p.to_string()),
            Self::Password(pw) => ("password", pw.clone().unwrap_or_default()),
            Self::ExpireDate(d) => ("expireDate", d.map(format_expiration).unwrap_or_default()),
        };
        vec![(pair.0.to_string(), pair.1)]
    }
}

pub fn format_expiration(date: NaiveDate) -> String {
    date.format(EXPIRATION_FORMAT).to_string()
}

/// Single share or list, depending on the server version.
#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    Many(Vec<ShareInfo>),
    One(ShareInfo),
}

impl OneOrMany {
    fn into_first(self) -> Option<ShareInfo> {
        match self {
            Self::Many(v) => v.into_iter().next(),
            Self::One(s) => Some(s),
        }
    }
}

/// Thin OCS Shares API caller.
#[derive(Debug, Clone)]
pub struct SharesClient {
    client: OwnCloudClient,
}

impl SharesClient {
    pub fn new(client: OwnCloudClient) -> Self {
        Self { client }
    }

    pub async fn create(&self, args: &CreateShareArgs) -> OwnCloudResult<ShareInfo> {
        debug!("create {:?} share for {}", args.share_type, args.path);
        let resp: OcsResponse<OneOrMany> = self.client.ocs_post(SHARES_API, &args.to_form()).await?;
        resp.ocs
            .data
            .into_first()
            .ok_or_else(|| OwnCloudError::empty_response("share creation returned no share"))
    }

    /// All shares of the account.
    pub async fn list(&self) -> OwnCloudResult<Vec<ShareInfo>> {
        let resp: OcsResponse<Vec<ShareInfo>> = self.client.ocs_get(SHARES_API, &[]).await?;
        Ok(resp.ocs.data)
    }

    /// Shares of one storage id.
    pub async fn list_for_path(&self, path: &str) -> OwnCloudResult<Vec<ShareInfo>> {
        let path = format!("/{}", trim_slashes(path));
        let resp: OcsResponse<Vec<ShareInfo>> =
            self.client.ocs_get(SHARES_API, &[("path", path.as_str())]).await?;
        Ok(resp.ocs.data)
    }

    pub async fn update(&self, share_id: &str, change: &ShareUpdate) -> OwnCloudResult<ShareInfo> {
        debug!("update share {}: {:?}", share_id, change);
        let url = format!("{}/{}", SHARES_API, share_id);
        let resp: OcsResponse<OneOrMany> = self.client.ocs_put(&url, &change.to_form()).await?;
        resp.ocs
            .data
            .into_first()
            .ok_or_else(|| OwnCloudError::empty_response(format!("update of share {} returned no share", share_id)))
    }

    pub async fn delete(&self, share_id: &str) -> OwnCloudResult<()> {
        let url = format!("{}/{}", SHARES_API, share_id);
        let _: OcsResponse<serde_json::Value> = self.client.ocs_delete(&url).await?;
        Ok(())
    }

    /// Scan every share for a token match.
    pub async fn find_by_token(&self, token: &str) -> OwnCloudResult<ShareInfo> {
        self.list()
            .await?
            .into_iter()
            .find(|s| s.token.as_deref() == Some(token))
            .ok_or_else(|| OwnCloudError::share_not_found(token))
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════
