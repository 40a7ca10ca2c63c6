use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::codec::IdCodec;
use crate::types::{AppWithPermission, Bundle, FileType, PermissionLevel};

#[derive(Debug, Deserialize)]
pub struct CreateAppRequest {
    pub name: String,
    #[serde(default)]
    pub public_key: String,
    #[serde(default)]
    pub private_key: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateAppRequest {
    pub name: String,
    #[serde(default)]
    pub public_key: String,
    #[serde(default)]
    pub private_key: String,
    pub private: bool,
}

/// App as serialized to clients: the id is the codec token, the private key
/// never leaves the server.
#[derive(Debug, Serialize)]
pub struct AppResponse {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub public_key: String,
    pub private: bool,
    pub permission: PermissionLevel,
    pub created_at: DateTime<Utc>,
}

impl AppResponse {
    #[must_use]
    pub fn from_app(codec: &IdCodec, app: AppWithPermission) -> Self {
        Self {
            id: codec.encode(app.app.id),
            name: app.app.name,
            public_key: app.app.public_key,
            private: app.app.private,
            permission: app.permission,
            created_at: app.app.created_at,
        }
    }
}

/// Bundle as serialized to clients. The release id is implied by the request
/// path and not repeated here.
#[derive(Debug, Serialize)]
pub struct BundleResponse {
    pub id: String,
    pub hash: String,
    pub name: String,
    #[serde(rename = "type")]
    pub file_type: FileType,
    pub created_at: DateTime<Utc>,
}

impl BundleResponse {
    #[must_use]
    pub fn from_bundle(codec: &IdCodec, bundle: Bundle) -> Self {
        Self {
            id: codec.encode(bundle.id),
            hash: bundle.hash,
            name: bundle.name,
            file_type: bundle.file_type,
            created_at: bundle.created_at,
        }
    }
}
