use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};

use super::Store;
use super::schema::SCHEMA;
use crate::error::{Error, Result};
use crate::types::*;

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let conn = Connection::open(db_path)?;

        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.pragma_update(None, "journal_mode", "WAL")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Returns a guard to the underlying database connection.
    /// This allows consuming applications to execute custom SQL.
    pub fn connection(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn()
    }
}

fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            // Handle SQLite's default datetime format: "YYYY-MM-DD HH:MM:SS"
            chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .unwrap_or_else(|e| {
            tracing::error!("Invalid datetime in database: '{}' - {}", s, e);
            Utc::now()
        })
}

fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

fn parse_level(value: i64) -> rusqlite::Result<PermissionLevel> {
    PermissionLevel::from_i64(value).ok_or(rusqlite::Error::IntegralValueOutOfRange(0, value))
}

fn row_to_app(row: &rusqlite::Row<'_>) -> rusqlite::Result<App> {
    Ok(App {
        id: row.get(0)?,
        name: row.get(1)?,
        public_key: row.get(2)?,
        private_key: row.get(3)?,
        private: row.get(4)?,
        created_at: parse_datetime(&row.get::<_, String>(5)?),
    })
}

fn row_to_bundle(row: &rusqlite::Row<'_>) -> rusqlite::Result<Bundle> {
    Ok(Bundle {
        id: row.get(0)?,
        release_id: row.get(1)?,
        hash: row.get(2)?,
        name: row.get(3)?,
        file_type: FileType::from_i64(row.get(4)?),
        created_at: parse_datetime(&row.get::<_, String>(5)?),
    })
}

const APP_COLUMNS: &str = "apps.id, apps.name, apps.public_key, apps.private_key, apps.private, apps.created_at";
const BUNDLE_COLUMNS: &str = "id, release_id, hash, name, type, created_at";

impl Store for SqliteStore {
    fn initialize(&self) -> Result<()> {
        self.conn().execute_batch(SCHEMA)?;
        Ok(())
    }

    // App lifecycle

    fn create_app(&self, user_id: i64, new: &NewApp) -> Result<App> {
        // Both keys or neither; half a signing pair is useless.
        if new.public_key.is_empty() != new.private_key.is_empty() {
            return Err(Error::Validation(
                "public and private keys must be provided together".into(),
            ));
        }

        let mut conn = self.conn();
        let tx = conn.transaction()?;
        let created_at = Utc::now();

        tx.execute(
            "INSERT INTO apps (name, public_key, private_key, private, created_at)
             VALUES (?1, ?2, ?3, 1, ?4)",
            params![
                new.name,
                new.public_key,
                new.private_key,
                format_datetime(&created_at),
            ],
        )?;
        let app_id = tx.last_insert_rowid();

        tx.execute(
            "INSERT INTO app_user_permissions (app_id, user_id, permission)
             VALUES (?1, ?2, ?3)",
            params![app_id, user_id, i64::from(PermissionLevel::Owner)],
        )?;

        tx.commit()?;

        Ok(App {
            id: app_id,
            name: new.name.clone(),
            public_key: new.public_key.clone(),
            private_key: new.private_key.clone(),
            private: true,
            created_at,
        })
    }

    fn find_app(&self, app_id: i64, user_id: i64) -> Result<Option<AppWithPermission>> {
        let conn = self.conn();
        conn.query_row(
            &format!(
                "SELECT {APP_COLUMNS}, app_user_permissions.permission
                 FROM apps
                 JOIN app_user_permissions ON apps.id = app_user_permissions.app_id
                 WHERE apps.id = ?1 AND app_user_permissions.user_id = ?2"
            ),
            params![app_id, user_id],
            |row| {
                Ok(AppWithPermission {
                    app: row_to_app(row)?,
                    permission: parse_level(row.get(6)?)?,
                })
            },
        )
        .optional()
        .map_err(Error::from)
    }

    fn list_apps(&self, user_id: i64) -> Result<Vec<AppWithPermission>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {APP_COLUMNS}, app_user_permissions.permission
             FROM apps
             JOIN app_user_permissions ON apps.id = app_user_permissions.app_id
             WHERE app_user_permissions.user_id = ?1
             ORDER BY apps.id"
        ))?;

        let rows = stmt.query_map(params![user_id], |row| {
            Ok(AppWithPermission {
                app: row_to_app(row)?,
                permission: parse_level(row.get(6)?)?,
            })
        })?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn update_app(&self, app_id: i64, user_id: i64, update: &AppUpdate) -> Result<()> {
        let rows = self.conn().execute(
            "UPDATE apps SET name = ?1, public_key = ?2, private_key = ?3, private = ?4
             WHERE id = ?5 AND EXISTS (
                 SELECT 1 FROM app_user_permissions
                 WHERE app_id = ?5 AND user_id = ?6 AND permission != ?7
             )",
            params![
                update.name,
                update.public_key,
                update.private_key,
                update.private,
                app_id,
                user_id,
                i64::from(PermissionLevel::Member),
            ],
        )?;

        // A missing app and an insufficient level look the same to the caller.
        if rows == 0 {
            return Err(Error::NotFound);
        }
        Ok(())
    }

    fn remove_app(&self, app_id: i64, user_id: i64) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        let allowed: Option<i64> = tx
            .query_row(
                "SELECT apps.id
                 FROM apps
                 JOIN app_user_permissions ON apps.id = app_user_permissions.app_id
                 WHERE apps.id = ?1 AND app_user_permissions.user_id = ?2
                   AND app_user_permissions.permission != ?3",
                params![app_id, user_id, i64::from(PermissionLevel::Member)],
                |row| row.get(0),
            )
            .optional()?;

        if allowed.is_none() {
            return Err(Error::NotFound);
        }

        tx.execute("DELETE FROM apps WHERE id = ?1", params![app_id])?;
        tx.commit()?;
        Ok(())
    }

    // Permission operations

    fn find_permission(&self, app_id: i64, user_id: i64) -> Result<Option<PermissionRecord>> {
        let conn = self.conn();
        conn.query_row(
            "SELECT id, app_id, user_id, permission FROM app_user_permissions
             WHERE app_id = ?1 AND user_id = ?2",
            params![app_id, user_id],
            |row| {
                Ok(PermissionRecord {
                    id: row.get(0)?,
                    app_id: row.get(1)?,
                    user_id: row.get(2)?,
                    level: parse_level(row.get(3)?)?,
                })
            },
        )
        .optional()
        .map_err(Error::from)
    }

    fn insert_permission(&self, app_id: i64, user_id: i64, level: PermissionLevel) -> Result<()> {
        self.conn().execute(
            "INSERT INTO app_user_permissions (app_id, user_id, permission)
             VALUES (?1, ?2, ?3)",
            params![app_id, user_id, i64::from(level)],
        )?;
        Ok(())
    }

    fn has_permission(
        &self,
        app_id: i64,
        user_id: i64,
        levels: &[PermissionLevel],
    ) -> Result<bool> {
        let record = self.find_permission(app_id, user_id)?;
        Ok(record.is_some_and(|r| levels.contains(&r.level)))
    }

    // Bundle operations

    fn insert_bundles(&self, bundles: &[NewBundle]) -> Result<Vec<Bundle>> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        let created_at = Utc::now();
        let mut committed = Vec::with_capacity(bundles.len());

        for bundle in bundles {
            tx.execute(
                "INSERT INTO bundles (release_id, hash, name, type, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    bundle.release_id,
                    bundle.hash,
                    bundle.name,
                    i64::from(bundle.file_type),
                    format_datetime(&created_at),
                ],
            )?;
            committed.push(Bundle {
                id: tx.last_insert_rowid(),
                release_id: bundle.release_id,
                hash: bundle.hash.clone(),
                name: bundle.name.clone(),
                file_type: bundle.file_type,
                created_at,
            });
        }

        tx.commit()?;
        Ok(committed)
    }

    fn list_bundles(&self, release_id: i64) -> Result<Vec<Bundle>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {BUNDLE_COLUMNS} FROM bundles WHERE release_id = ?1 ORDER BY id"
        ))?;

        let rows = stmt.query_map(params![release_id], row_to_bundle)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn get_bundle(&self, bundle_id: i64, release_id: i64) -> Result<Option<Bundle>> {
        let conn = self.conn();
        conn.query_row(
            &format!(
                "SELECT {BUNDLE_COLUMNS} FROM bundles WHERE id = ?1 AND release_id = ?2"
            ),
            params![bundle_id, release_id],
            row_to_bundle,
        )
        .optional()
        .map_err(Error::from)
    }

    fn remove_bundle(&self, bundle_id: i64, release_id: i64) -> Result<()> {
        let rows = self.conn().execute(
            "DELETE FROM bundles WHERE id = ?1 AND release_id = ?2",
            params![bundle_id, release_id],
        )?;

        if rows == 0 {
            return Err(Error::NotFound);
        }
        Ok(())
    }
}
