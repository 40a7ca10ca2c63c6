use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{FileType, PermissionLevel};

/// An application whose releases carry bundles.
///
/// The internal id never crosses the API boundary; DTOs carry the codec token
/// instead. Keys are the app's signing key pair, stored as provided.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct App {
    pub id: i64,
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub public_key: String,
    #[serde(skip)]
    pub private_key: String,
    pub private: bool,
    pub created_at: DateTime<Utc>,
}

/// An app joined with the requesting user's permission level.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppWithPermission {
    #[serde(flatten)]
    pub app: App,
    pub permission: PermissionLevel,
}

/// Fields for creating an app. Visibility always starts private.
#[derive(Debug, Clone)]
pub struct NewApp {
    pub name: String,
    pub public_key: String,
    pub private_key: String,
}

/// Fields overwritten by an app update.
#[derive(Debug, Clone)]
pub struct AppUpdate {
    pub name: String,
    pub public_key: String,
    pub private_key: String,
    pub private: bool,
}

/// A single (app, user) permission row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PermissionRecord {
    pub id: i64,
    pub app_id: i64,
    pub user_id: i64,
    pub level: PermissionLevel,
}

/// A bundle's persisted metadata.
///
/// Many bundles may share a hash; the backing file at the content-addressed
/// path is stored once per distinct hash.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bundle {
    pub id: i64,
    pub release_id: i64,
    pub hash: String,
    pub name: String,
    pub file_type: FileType,
    pub created_at: DateTime<Utc>,
}

/// Metadata for a bundle about to be committed.
#[derive(Debug, Clone)]
pub struct NewBundle {
    pub release_id: i64,
    pub hash: String,
    pub name: String,
    pub file_type: FileType,
}

/// A staged upload awaiting commit. Not persisted; lives for one request.
#[derive(Debug, Clone)]
pub struct StagedFile {
    pub name: String,
    pub hash: String,
    pub temp_path: PathBuf,
}
