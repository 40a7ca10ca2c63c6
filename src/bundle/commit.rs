use std::path::PathBuf;
use std::sync::Arc;

use tokio::fs;

use crate::error::Result;
use crate::store::Store;
use crate::types::{Bundle, FileType, NewBundle, StagedFile};

/// Turns staged files into committed bundle metadata plus permanently stored
/// content-addressed files.
///
/// The metadata batch commits first, in one transaction; only then are temp
/// files promoted into the permanent store. Callers are expected to have
/// passed an ADMIN/OWNER permission check before invoking this.
pub struct CommitPipeline {
    store: Arc<dyn Store>,
    bundle_dir: PathBuf,
}

impl CommitPipeline {
    pub fn new(store: Arc<dyn Store>, bundle_dir: impl Into<PathBuf>) -> Self {
        Self {
            store,
            bundle_dir: bundle_dir.into(),
        }
    }

    /// Permanent path for a content hash.
    #[must_use]
    pub fn target_path(&self, hash: &str) -> PathBuf {
        self.bundle_dir.join(hash)
    }

    /// Commits a batch of staged files for one release.
    ///
    /// On metadata failure every temp file is deleted and the permanent store
    /// is left untouched. On success each temp file is renamed to its hash
    /// path; a target that already exists means identical content and is
    /// treated as satisfied.
    pub async fn commit(&self, release_id: i64, staged: Vec<StagedFile>) -> Result<Vec<Bundle>> {
        fs::create_dir_all(&self.bundle_dir).await?;

        let records: Vec<NewBundle> = staged
            .iter()
            .map(|file| NewBundle {
                release_id,
                hash: file.hash.clone(),
                name: file.name.clone(),
                file_type: FileType::from_filename(&file.name),
            })
            .collect();

        let bundles = match self.store.insert_bundles(&records) {
            Ok(bundles) => bundles,
            Err(e) => {
                discard_all(&staged).await;
                return Err(e);
            }
        };

        for file in &staged {
            self.materialize(file).await;
        }

        Ok(bundles)
    }

    async fn materialize(&self, file: &StagedFile) {
        let target = self.target_path(&file.hash);

        // Hash equality implies content equality, so an existing target is
        // already satisfied; the rename below also overwrites safely if the
        // file appears between this check and the rename.
        match fs::try_exists(&target).await {
            Ok(true) => {
                if let Err(e) = fs::remove_file(&file.temp_path).await {
                    tracing::warn!(
                        "failed to remove staged duplicate {}: {e}",
                        file.temp_path.display()
                    );
                }
                return;
            }
            Ok(false) => {}
            Err(e) => {
                tracing::warn!("failed to probe bundle target {}: {e}", target.display());
            }
        }

        if let Err(e) = fs::rename(&file.temp_path, &target).await {
            // The metadata row is already committed; this bundle now has no
            // backing file until an operator reconciles it.
            tracing::error!(
                hash = %file.hash,
                "bundle file was not materialized after metadata commit: {e}"
            );
        }
    }
}

/// Deletes every temp file in a staged batch. Used when the batch is
/// abandoned before or during the metadata commit.
pub async fn discard_all(staged: &[StagedFile]) {
    for file in staged {
        match fs::remove_file(&file.temp_path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(
                    "failed to remove staged file {}: {e}",
                    file.temp_path.display()
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundle::StagingArea;
    use crate::error::Error;
    use crate::store::SqliteStore;
    use crate::types::{AppUpdate, AppWithPermission, NewApp, PermissionLevel, PermissionRecord};
    use tempfile::TempDir;

    struct Fixture {
        _temp_dir: TempDir,
        staging: StagingArea,
        pipeline: CommitPipeline,
        store: Arc<SqliteStore>,
        bundle_dir: PathBuf,
    }

    fn fixture() -> Fixture {
        let temp_dir = TempDir::new().unwrap();
        let store = Arc::new(SqliteStore::new(temp_dir.path().join("armory.db")).unwrap());
        store.initialize().unwrap();

        let staging = StagingArea::new(temp_dir.path().join("tmp"));
        let bundle_dir = temp_dir.path().join("bundles");
        let pipeline = CommitPipeline::new(store.clone(), &bundle_dir);

        Fixture {
            _temp_dir: temp_dir,
            staging,
            pipeline,
            store,
            bundle_dir,
        }
    }

    #[tokio::test]
    async fn test_commit_materializes_files() {
        let f = fixture();

        let a = f.staging.stage(&b"alpha"[..], "a.apk").await.unwrap();
        let b = f.staging.stage(&b"beta"[..], "b.bin").await.unwrap();
        let (hash_a, hash_b) = (a.hash.clone(), b.hash.clone());
        let temp_a = a.temp_path.clone();

        let bundles = f.pipeline.commit(7, vec![a, b]).await.unwrap();
        assert_eq!(bundles.len(), 2);
        assert_eq!(bundles[0].file_type, FileType::Android);
        assert_eq!(bundles[1].file_type, FileType::Other);

        // Every committed hash has a backing file; temp files are gone.
        assert_eq!(
            std::fs::read(f.bundle_dir.join(&hash_a)).unwrap(),
            b"alpha"
        );
        assert_eq!(std::fs::read(f.bundle_dir.join(&hash_b)).unwrap(), b"beta");
        assert!(!temp_a.exists());

        assert_eq!(f.store.list_bundles(7).unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_identical_content_shares_one_file() {
        let f = fixture();

        let a = f.staging.stage(&b"same"[..], "a.bin").await.unwrap();
        let b = f.staging.stage(&b"same"[..], "b.bin").await.unwrap();
        assert_eq!(a.hash, b.hash);
        let hash = a.hash.clone();

        let bundles = f.pipeline.commit(7, vec![a, b]).await.unwrap();
        assert_eq!(bundles.len(), 2);
        assert_eq!(bundles[0].hash, bundles[1].hash);

        assert!(f.bundle_dir.join(&hash).exists());
        assert_eq!(std::fs::read_dir(&f.bundle_dir).unwrap().count(), 1);
    }

    struct FailingStore(Arc<SqliteStore>);

    impl Store for FailingStore {
        fn initialize(&self) -> crate::error::Result<()> {
            self.0.initialize()
        }
        fn create_app(&self, user_id: i64, new: &NewApp) -> crate::error::Result<crate::types::App> {
            self.0.create_app(user_id, new)
        }
        fn find_app(
            &self,
            app_id: i64,
            user_id: i64,
        ) -> crate::error::Result<Option<AppWithPermission>> {
            self.0.find_app(app_id, user_id)
        }
        fn list_apps(&self, user_id: i64) -> crate::error::Result<Vec<AppWithPermission>> {
            self.0.list_apps(user_id)
        }
        fn update_app(
            &self,
            app_id: i64,
            user_id: i64,
            update: &AppUpdate,
        ) -> crate::error::Result<()> {
            self.0.update_app(app_id, user_id, update)
        }
        fn remove_app(&self, app_id: i64, user_id: i64) -> crate::error::Result<()> {
            self.0.remove_app(app_id, user_id)
        }
        fn find_permission(
            &self,
            app_id: i64,
            user_id: i64,
        ) -> crate::error::Result<Option<PermissionRecord>> {
            self.0.find_permission(app_id, user_id)
        }
        fn insert_permission(
            &self,
            app_id: i64,
            user_id: i64,
            level: PermissionLevel,
        ) -> crate::error::Result<()> {
            self.0.insert_permission(app_id, user_id, level)
        }
        fn has_permission(
            &self,
            app_id: i64,
            user_id: i64,
            levels: &[PermissionLevel],
        ) -> crate::error::Result<bool> {
            self.0.has_permission(app_id, user_id, levels)
        }
        fn insert_bundles(&self, _bundles: &[NewBundle]) -> crate::error::Result<Vec<Bundle>> {
            Err(Error::Transaction(rusqlite::Error::InvalidQuery))
        }
        fn list_bundles(&self, release_id: i64) -> crate::error::Result<Vec<Bundle>> {
            self.0.list_bundles(release_id)
        }
        fn get_bundle(
            &self,
            bundle_id: i64,
            release_id: i64,
        ) -> crate::error::Result<Option<Bundle>> {
            self.0.get_bundle(bundle_id, release_id)
        }
        fn remove_bundle(&self, bundle_id: i64, release_id: i64) -> crate::error::Result<()> {
            self.0.remove_bundle(bundle_id, release_id)
        }
    }

    #[tokio::test]
    async fn test_metadata_failure_cleans_temp_files() {
        let f = fixture();
        let failing = CommitPipeline::new(Arc::new(FailingStore(f.store.clone())), &f.bundle_dir);

        let a = f.staging.stage(&b"alpha"[..], "a.bin").await.unwrap();
        let b = f.staging.stage(&b"beta"[..], "b.bin").await.unwrap();
        let (temp_a, temp_b) = (a.temp_path.clone(), b.temp_path.clone());
        let hash_a = a.hash.clone();

        let result = failing.commit(7, vec![a, b]).await;
        assert!(matches!(result, Err(Error::Transaction(_))));

        // Temp files are gone, the permanent store untouched, no metadata.
        assert!(!temp_a.exists());
        assert!(!temp_b.exists());
        assert!(!f.bundle_dir.join(&hash_a).exists());
        assert!(f.store.list_bundles(7).unwrap().is_empty());
    }
}
