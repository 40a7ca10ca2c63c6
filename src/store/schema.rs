pub const SCHEMA: &str = r#"
-- Applications; visibility defaults to private
CREATE TABLE IF NOT EXISTS apps (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    public_key TEXT NOT NULL DEFAULT '',
    private_key TEXT NOT NULL DEFAULT '',
    private INTEGER NOT NULL DEFAULT 1,
    created_at TEXT DEFAULT (datetime('now'))
);

-- Exactly one permission level per (app, user) pair.
-- Every committed app has at least one OWNER row: the app insert and its
-- owner permission insert share one transaction.
CREATE TABLE IF NOT EXISTS app_user_permissions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    app_id INTEGER NOT NULL REFERENCES apps(id) ON DELETE CASCADE,
    user_id INTEGER NOT NULL CHECK (user_id > 0),
    permission INTEGER NOT NULL CHECK (permission IN (1, 2, 3)),

    UNIQUE(app_id, user_id)
);

-- Bundle metadata. release_id is a foreign key owned outside this core.
-- hash is not unique: identical content under different names or releases
-- shares one backing file.
CREATE TABLE IF NOT EXISTS bundles (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    release_id INTEGER NOT NULL,
    hash TEXT NOT NULL,
    name TEXT NOT NULL,
    type INTEGER NOT NULL DEFAULT 0,
    created_at TEXT DEFAULT (datetime('now'))
);

-- Create indexes
CREATE INDEX IF NOT EXISTS idx_permissions_user ON app_user_permissions(user_id);
CREATE INDEX IF NOT EXISTS idx_permissions_app ON app_user_permissions(app_id);
CREATE INDEX IF NOT EXISTS idx_bundles_release ON bundles(release_id);
CREATE INDEX IF NOT EXISTS idx_bundles_hash ON bundles(hash);
"#;
