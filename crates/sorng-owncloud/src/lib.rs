//! # SortOfRemote NG – ownCloud Storage
//!
//! ownCloud-backed resource storage providing:
//!
//! - **Files**: Upload (buffer, stream, path, upload descriptor), batch fetch, remove (WebDAV)
//! - **Folders**: Existence check, mkdirp, listing with browsing links, create / remove
//! - **Attach / detach**: Move a file into a folder, eject it again
//! - **Streaming**: Two-phase content retrieval: headers first, body on demand
//! - **Sharing**: OCS Share API: one public link per folder, per-user shares from a roster
//! - **Serving**: axum router streaming stored files under a public base path

pub mod error;
pub mod types;
pub mod paths;
pub mod multistatus;
pub mod client;
pub mod stream;
pub mod dav;
pub mod shares_api;
pub mod sharing;
pub mod storage;
pub mod serve;

pub use error::{OwnCloudError, OwnCloudErrorKind, OwnCloudResult};
pub use serve::AuthVerifier;
pub use storage::{OwnCloudStorage, ResourceStorage};
pub use types::*;
