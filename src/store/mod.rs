mod schema;
mod sqlite;

pub use sqlite::SqliteStore;

use crate::error::Result;
use crate::types::*;

/// Store defines the database interface.
///
/// Everything is typed; no caller assembles SQL. Operations that must be
/// atomic (app creation, app removal, bundle batch insert) run inside a
/// single transaction within the implementation.
pub trait Store: Send + Sync {
    fn initialize(&self) -> Result<()>;

    // App lifecycle
    /// Creates an app and its owner permission row in one atomic unit.
    /// Fails with `Error::Validation` when exactly one key of the pair is
    /// empty; on any failure no app row is observable afterwards.
    fn create_app(&self, user_id: i64, new: &NewApp) -> Result<App>;
    fn find_app(&self, app_id: i64, user_id: i64) -> Result<Option<AppWithPermission>>;
    fn list_apps(&self, user_id: i64) -> Result<Vec<AppWithPermission>>;
    /// Overwrites name/keys/visibility. Requires an ADMIN or OWNER row for
    /// the pair; a missing app and an insufficient level are both
    /// `Error::NotFound`.
    fn update_app(&self, app_id: i64, user_id: i64, update: &AppUpdate) -> Result<()>;
    /// Deletes the app after re-checking the pair inside the same
    /// transaction as the delete.
    fn remove_app(&self, app_id: i64, user_id: i64) -> Result<()>;

    // Permission operations
    fn find_permission(&self, app_id: i64, user_id: i64) -> Result<Option<PermissionRecord>>;
    fn insert_permission(&self, app_id: i64, user_id: i64, level: PermissionLevel) -> Result<()>;
    /// True iff a permission row exists for the pair with a level in
    /// `levels`. A missing app and a missing grant are indistinguishable.
    fn has_permission(&self, app_id: i64, user_id: i64, levels: &[PermissionLevel])
    -> Result<bool>;

    // Bundle operations
    /// Inserts the whole batch in one transaction; either every record is
    /// committed or none are.
    fn insert_bundles(&self, bundles: &[NewBundle]) -> Result<Vec<Bundle>>;
    fn list_bundles(&self, release_id: i64) -> Result<Vec<Bundle>>;
    fn get_bundle(&self, bundle_id: i64, release_id: i64) -> Result<Option<Bundle>>;
    fn remove_bundle(&self, bundle_id: i64, release_id: i64) -> Result<()>;
}
