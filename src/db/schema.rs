//! Database schema and migrations.

pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS parks (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    slug TEXT NOT NULL UNIQUE,
    name TEXT NOT NULL,
    province TEXT NOT NULL,
    doc TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

-- Subdocument id counter. Photos, videos, campgrounds, and campsites get
-- their ids from here when the parent park document is saved.
CREATE TABLE IF NOT EXISTS media_seq (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    next_id INTEGER NOT NULL
);
INSERT OR IGNORE INTO media_seq (id, next_id) VALUES (1, 1);

CREATE TABLE IF NOT EXISTS uploads (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    media_type TEXT NOT NULL,
    media_id INTEGER NOT NULL,
    host_object_id TEXT,
    youtube_url TEXT,
    park_id INTEGER NOT NULL,
    park_name TEXT NOT NULL,
    campground_id INTEGER,
    campground_name TEXT,
    campsite_id INTEGER,
    campsite_name TEXT,
    user_id INTEGER NOT NULL,
    approved INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_uploads_media ON uploads(media_type, media_id);
CREATE INDEX IF NOT EXISTS idx_uploads_user ON uploads(user_id);

CREATE TABLE IF NOT EXISTS user_uploads (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL,
    media_type TEXT NOT NULL,
    media_id INTEGER NOT NULL,
    hosted_url TEXT,
    youtube_url TEXT,
    host_object_id TEXT,
    park_id INTEGER NOT NULL,
    park_slug TEXT NOT NULL,
    park_name TEXT NOT NULL,
    campground_id INTEGER,
    campground_slug TEXT,
    campground_name TEXT,
    campsite_id INTEGER,
    campsite_slug TEXT,
    campsite_name TEXT,
    caption TEXT NOT NULL DEFAULT '',
    date_taken TEXT NOT NULL,
    uploaded_at TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'active'
);

CREATE INDEX IF NOT EXISTS idx_user_uploads_user ON user_uploads(user_id);
CREATE INDEX IF NOT EXISTS idx_user_uploads_media ON user_uploads(media_id);
"#;

/// Applied on every open; each statement must be safe to re-run.
pub const MIGRATIONS: &[&str] = &[];
