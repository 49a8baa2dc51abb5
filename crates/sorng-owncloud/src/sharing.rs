// ──────────────────────────────────────────────────────────────────────────────
// sorng-owncloud · sharing
// ──────────────────────────────────────────────────────────────────────────────
// Share management on top of the OCS Share API:
//  • Public link find-or-create per directory
//  • Per-user shares resolved against the configured roster
//  • Access level, password and expiration reconciliation
//  • Lookup by path or by token (delete / set access / current)
//
// A directory carries at most one public share and at most one user share per
// recipient, so existing shares are always looked up before creating.
// ──────────────────────────────────────────────────────────────────────────────

use crate::client::OwnCloudClient;
use crate::error::{OwnCloudError, OwnCloudErrorKind, OwnCloudResult};
use crate::paths::{trim_slashes, PathResolver};
use crate::shares_api::{build_public_link_share, build_user_share, ShareUpdate, SharesClient};
use crate::types::*;
use log::{debug, info, warn};

/// Domain-level share operations for one account.
#[derive(Debug, Clone)]
pub struct ShareManager {
    api: SharesClient,
    paths: PathResolver,
    users: Vec<ShareUser>,
}

impl ShareManager {
    pub fn new(client: OwnCloudClient, users: Vec<ShareUser>) -> Self {
        Self {
            paths: client.paths().clone(),
            api: SharesClient::new(client),
            users,
        }
    }

    // ── share ────────────────────────────────────────────────────────────

    /// Share a directory, publicly or with the roster users named in
    /// `options.share_with`. Recipients are processed one after another; the
    /// first failure aborts the rest.
    pub async fn share(
        &self,
        id: &str,
        access: Option<AccessLevel>,
        options: ShareOptions,
    ) -> OwnCloudResult<ShareOutcome> {
        let dir = self.paths.parse_dir_id(id)?;
        let existing = self.api.list_for_path(&dir).await?;
        let mut result = Vec::new();

        if options.share_with.is_empty() {
            let permissions = options.permissions.or_else(|| access.map(|a| a.permissions().bits()));
            let info = match find_public(&existing) {
                Some(current) => self.update_share(current, permissions, &options).await?,
                None => self.create_share(&dir, None, permissions, &options).await?,
            };
            result.push(self.to_share(&dir, info));
        } else {
            for name in &options.share_with {
                let Some(user) = self.users.iter().find(|u| &u.name == name) else {
                    warn!("share recipient {} is not a configured user, skipped", name);
                    continue;
                };
                let permissions = options
                    .permissions
                    .unwrap_or_else(|| SharePermissions::from_capabilities(&user.permissions).bits());
                let info = match find_user_share(&existing, name) {
                    Some(current) => self.update_share(current, Some(permissions), &options).await?,
                    None => self.create_share(&dir, Some(name), Some(permissions), &options).await?,
                };
                result.push(self.to_share(&dir, info));
            }
        }

        Ok(ShareOutcome::from_shares(result))
    }

    /// Create a share. User shares carry their permissions in the create
    /// call; a permissions update follows whenever the server granted
    /// something other than what was requested. Passwords only apply to
    /// public links.
    async fn create_share(
        &self,
        dir: &str,
        share_with: Option<&str>,
        permissions: Option<u32>,
        options: &ShareOptions,
    ) -> OwnCloudResult<ShareInfo> {
        let expire_date = match options.expiration {
            Some(Change::Set(date)) => Some(date),
            _ => None,
        };
        let args = match share_with {
            Some(user) => build_user_share(dir, user, permissions, expire_date),
            None => {
                let password = match &options.password {
                    Some(Change::Set(pw)) if !pw.is_empty() => Some(pw.as_str()),
                    _ => None,
                };
                build_public_link_share(dir, password, expire_date)
            }
        };
        let mut created = self.api.create(&args).await?;
        info!("created share {} for {}", created.id, dir);

        match permissions {
            Some(bits) if bits != created.permissions => {
                let updated = self.api.update(&created.id, &ShareUpdate::Permissions(bits)).await?;
                created.permissions = updated.permissions;
                Ok(created)
            }
            _ => Ok(created),
        }
    }

    /// Apply every requested change to an existing share, one attribute per
    /// call. Password changes are ignored for anything but public links.
    /// Returns the latest server view of the share.
    async fn update_share(
        &self,
        current: &ShareInfo,
        permissions: Option<u32>,
        options: &ShareOptions,
    ) -> OwnCloudResult<ShareInfo> {
        let mut changes = Vec::new();
        if let Some(bits) = permissions {
            changes.push(ShareUpdate::Permissions(bits));
        }
        match &options.password {
            _ if current.kind() != Some(ShareType::PublicLink) => {}
            Some(Change::Set(pw)) => changes.push(ShareUpdate::Password(Some(pw.clone()))),
            Some(Change::Clear) => changes.push(ShareUpdate::Password(None)),
            None => {}
        }
        match options.expiration {
            Some(Change::Set(date)) => changes.push(ShareUpdate::ExpireDate(Some(date))),
            Some(Change::Clear) => changes.push(ShareUpdate::ExpireDate(None)),
            None => {}
        }

        let mut latest = current.clone();
        for change in &changes {
            latest = self.api.update(&current.id, change).await?;
        }
        debug!("share {} reconciled with {} update(s)", current.id, changes.len());
        Ok(latest)
    }

    fn to_share(&self, dir: &str, info: ShareInfo) -> Share {
        let url = info
            .url
            .clone()
            .filter(|u| !u.is_empty())
            .unwrap_or_else(|| self.paths.dav_url(dir));
        Share { url, info }
    }

    // ── lookup-based operations ──────────────────────────────────────────

    /// Resolve shares from a directory id / URL, a share link or a token.
    pub async fn request_share(&self, id_or_token: &str) -> OwnCloudResult<Vec<ShareInfo>> {
        if let Ok(path) = self.paths.parse_dir_id(id_or_token) {
            match self.api.list_for_path(&path).await {
                Ok(found) if !found.is_empty() => return Ok(found),
                Ok(_) => debug!("no shares for path {}", path),
                Err(e) if e.kind == OwnCloudErrorKind::Network => return Err(e),
                Err(e) => debug!("share lookup by path {} failed: {}", path, e),
            }
        }
        match self.paths.parse_token(id_or_token) {
            Some(token) => Ok(vec![self.api.find_by_token(&token).await?]),
            None => Err(OwnCloudError::share_not_found(id_or_token)),
        }
    }

    /// Revoke every share resolved from `id_or_token`.
    pub async fn delete_share(&self, id_or_token: &str) -> OwnCloudResult<bool> {
        for share in self.request_share(id_or_token).await? {
            self.api.delete(&share.id).await?;
            info!("deleted share {}", share.id);
        }
        Ok(true)
    }

    pub async fn set_share_access(
        &self,
        id_or_token: &str,
        access: AccessLevel,
    ) -> OwnCloudResult<Vec<ShareInfo>> {
        let change = ShareUpdate::Permissions(access.permissions().bits());
        let mut updated = Vec::new();
        for share in self.request_share(id_or_token).await? {
            updated.push(self.api.update(&share.id, &change).await?);
        }
        Ok(updated)
    }

    /// First share resolved from `id_or_token`.
    pub async fn current_share(&self, id_or_token: &str) -> OwnCloudResult<Share> {
        let info = self
            .request_share(id_or_token)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| OwnCloudError::share_not_found(id_or_token))?;
        let dir = match info.path.as_deref() {
            Some(p) if !trim_slashes(p).is_empty() => trim_slashes(p).to_string(),
            _ => self.paths.parse_dir_id(id_or_token).unwrap_or_default(),
        };
        Ok(self.to_share(&dir, info))
    }
}

fn find_public(shares: &[ShareInfo]) -> Option<&ShareInfo> {
    shares.iter().find(|s| s.kind() == Some(ShareType::PublicLink))
}

fn find_user_share<'a>(shares: &'a [ShareInfo], user: &str) -> Option<&'a ShareInfo> {
    shares
        .iter()
        .find(|s| s.kind() == Some(ShareType::User) && s.share_with.as_deref() == Some(user))
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════
