// ──────────────────────────────────────────────────────────────────────────────
// sorng-owncloud · storage
// ──────────────────────────────────────────────────────────────────────────────
// Resource-storage contract and its ownCloud implementation:
//  • `ResourceStorage` trait consumed by the host
//  • `OwnCloudStorage` composing the WebDAV side and the share manager
//  • `init` wiring of the file-serving router
// ──────────────────────────────────────────────────────────────────────────────

use crate::client::OwnCloudClient;
use crate::dav::WebDav;
use crate::error::OwnCloudResult;
use crate::serve::{self, AuthVerifier};
use crate::sharing::ShareManager;
use crate::types::*;
use async_trait::async_trait;
use axum::Router;
use log::info;
use std::sync::Arc;

/// Generic storage operations the host application works against.
#[async_trait]
pub trait ResourceStorage: Send + Sync {
    /// Upload `data` into `directory`, creating the directory when missing.
    async fn accept(
        &self,
        data: UploadSource,
        directory: Option<&str>,
        options: AcceptOptions,
    ) -> OwnCloudResult<StoredFile>;

    async fn fetch(&self, ids: &[String], options: FetchOptions) -> OwnCloudResult<Vec<StoredFile>>;

    /// Returns the removed id.
    async fn remove(&self, id: &str) -> OwnCloudResult<String>;

    /// `None` when the directory cannot be listed.
    async fn get_dir(&self, id: &str) -> OwnCloudResult<Option<Directory>>;

    async fn create_dir(
        &self,
        name: &str,
        parent: Option<&str>,
        fetch: bool,
    ) -> OwnCloudResult<Option<Directory>>;

    async fn remove_dir(&self, id: &str) -> OwnCloudResult<String>;

    async fn put_file(&self, dir_id: &str, file_id: &str) -> OwnCloudResult<String>;

    async fn eject_file(&self, dir_id: &str, file_id: &str) -> OwnCloudResult<String>;

    async fn share(
        &self,
        id: &str,
        access: Option<AccessLevel>,
        options: ShareOptions,
    ) -> OwnCloudResult<ShareOutcome>;

    async fn delete_share(&self, id: &str) -> OwnCloudResult<bool>;

    async fn set_share_access(&self, id: &str, access: AccessLevel) -> OwnCloudResult<Vec<ShareInfo>>;

    async fn current_share(&self, id: &str) -> OwnCloudResult<Share>;

    /// Whether per-file options can be persisted alongside the content.
    fn file_options_support(&self) -> bool {
        false
    }
}

/// ownCloud-backed [`ResourceStorage`].
#[derive(Debug, Clone)]
pub struct OwnCloudStorage {
    config: OwnCloudConfig,
    dav: WebDav,
    shares: ShareManager,
}

impl OwnCloudStorage {
    /// Fails with a configuration error when url, login or password is
    /// missing.
    pub fn new(config: OwnCloudConfig) -> OwnCloudResult<Self> {
        let client = OwnCloudClient::new(&config)?;
        info!(
            "ownCloud storage for {}@{}",
            client.username(),
            client.base_url()
        );
        Ok(Self {
            dav: WebDav::new(client.clone(), config.url_base()),
            shares: ShareManager::new(client, config.users.clone()),
            config,
        })
    }

    pub fn config(&self) -> &OwnCloudConfig {
        &self.config
    }

    pub fn dav(&self) -> &WebDav {
        &self.dav
    }

    pub fn shares(&self) -> &ShareManager {
        &self.shares
    }

    /// Router serving stored files under the public base path. `None` unless
    /// both a base path and a verifier are configured.
    pub fn init(self: Arc<Self>, verifier: Option<Arc<dyn AuthVerifier>>) -> Option<Router> {
        let base = self.config.url_base().to_string();
        match verifier {
            Some(verifier) if !base.is_empty() => {
                info!("serving stored files under {}", base);
                Some(serve::router(self, &base, verifier))
            }
            _ => None,
        }
    }
}

#[async_trait]
impl ResourceStorage for OwnCloudStorage {
    async fn accept(
        &self,
        data: UploadSource,
        directory: Option<&str>,
        options: AcceptOptions,
    ) -> OwnCloudResult<StoredFile> {
        self.dav.accept(data, directory, options).await
    }

    async fn fetch(&self, ids: &[String], options: FetchOptions) -> OwnCloudResult<Vec<StoredFile>> {
        self.dav.fetch(ids, options).await
    }

    async fn remove(&self, id: &str) -> OwnCloudResult<String> {
        self.dav.remove(id).await
    }

    async fn get_dir(&self, id: &str) -> OwnCloudResult<Option<Directory>> {
        self.dav.get_dir(id).await
    }

    async fn create_dir(
        &self,
        name: &str,
        parent: Option<&str>,
        fetch: bool,
    ) -> OwnCloudResult<Option<Directory>> {
        self.dav.create_dir(name, parent, fetch).await
    }

    async fn remove_dir(&self, id: &str) -> OwnCloudResult<String> {
        self.dav.remove(id).await
    }

    async fn put_file(&self, dir_id: &str, file_id: &str) -> OwnCloudResult<String> {
        self.dav.put_file(dir_id, file_id).await
    }

    async fn eject_file(&self, dir_id: &str, file_id: &str) -> OwnCloudResult<String> {
        self.dav.eject_file(dir_id, file_id).await
    }

    async fn share(
        &self,
        id: &str,
        access: Option<AccessLevel>,
        options: ShareOptions,
    ) -> OwnCloudResult<ShareOutcome> {
        self.shares.share(id, access, options).await
    }

    async fn delete_share(&self, id: &str) -> OwnCloudResult<bool> {
        self.shares.delete_share(id).await
    }

    async fn set_share_access(&self, id: &str, access: AccessLevel) -> OwnCloudResult<Vec<ShareInfo>> {
        self.shares.set_share_access(id, access).await
    }

    async fn current_share(&self, id: &str) -> OwnCloudResult<Share> {
        self.shares.current_share(id).await
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════
