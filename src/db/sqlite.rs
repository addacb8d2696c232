//! SQLite backend: park documents as JSON rows plus the two audit tables.

use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};

use super::schema::{MIGRATIONS, SCHEMA};
use super::{
    MediaType, ParkStore, SearchSource, UploadLog, UploadRecord, UploadStatus, UserHistory,
    UserUploadEntry,
};
use crate::park::{MediaId, Park, UserId};
use crate::search::{EntryKind, SearchEntry};

pub struct SqliteDb {
    conn: Mutex<Connection>,
}

impl SqliteDb {
    pub fn open(path: &PathBuf) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.initialize()?;
        Ok(db)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.initialize()?;
        Ok(db)
    }

    fn initialize(&self) -> Result<()> {
        let conn = self.lock()?;
        conn.execute_batch(SCHEMA)?;
        for migration in MIGRATIONS {
            let _ = conn.execute(migration, []);
        }
        Ok(())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("database lock poisoned"))
    }

    /// Insert a new park document. Assigns the park id and ids for any
    /// subdocuments it already carries.
    pub fn insert_park(&self, park: &mut Park) -> Result<()> {
        {
            let conn = self.lock()?;
            conn.execute(
                "INSERT INTO parks (slug, name, province, doc, updated_at) VALUES (?, ?, ?, ?, ?)",
                params![
                    park.slug,
                    park.name,
                    park.province,
                    "{}",
                    park.updated_at.to_rfc3339()
                ],
            )?;
            park.id = conn.last_insert_rowid();
        }
        self.save_park_inner(park)
    }

    fn save_park_inner(&self, park: &mut Park) -> Result<()> {
        self.assign_subdocument_ids(park)?;
        let doc = serde_json::to_string(park)?;
        let conn = self.lock()?;
        let changed = conn.execute(
            "UPDATE parks SET doc = ?, name = ?, province = ?, slug = ?, updated_at = ? WHERE id = ?",
            params![
                doc,
                park.name,
                park.province,
                park.slug,
                park.updated_at.to_rfc3339(),
                park.id
            ],
        )?;
        if changed == 0 {
            anyhow::bail!("park {} not found for save", park.id);
        }
        Ok(())
    }

    /// Give every subdocument without an id a fresh one from the counter.
    fn assign_subdocument_ids(&self, park: &mut Park) -> Result<()> {
        let mut slots: Vec<&mut Option<MediaId>> = Vec::new();

        for cg in &mut park.campgrounds {
            slots.push(&mut cg.id);
            for p in &mut cg.photos {
                slots.push(&mut p.id);
            }
            for cs in &mut cg.campsites {
                slots.push(&mut cs.id);
                for p in &mut cs.photos {
                    slots.push(&mut p.id);
                }
                for v in &mut cs.videos {
                    slots.push(&mut v.id);
                }
            }
        }
        for cs in &mut park.campsites {
            slots.push(&mut cs.id);
            for p in &mut cs.photos {
                slots.push(&mut p.id);
            }
            for v in &mut cs.videos {
                slots.push(&mut v.id);
            }
        }
        for p in &mut park.photos {
            slots.push(&mut p.id);
        }
        for v in &mut park.videos {
            slots.push(&mut v.id);
        }

        slots.retain(|slot| slot.is_none());
        if slots.is_empty() {
            return Ok(());
        }

        let start = self.reserve_ids(slots.len() as i64)?;
        for (offset, slot) in slots.into_iter().enumerate() {
            *slot = Some(start + offset as i64);
        }
        Ok(())
    }

    fn reserve_ids(&self, count: i64) -> Result<i64> {
        let conn = self.lock()?;
        conn.execute(
            "UPDATE media_seq SET next_id = next_id + ? WHERE id = 1",
            [count],
        )?;
        let end: i64 = conn.query_row("SELECT next_id FROM media_seq WHERE id = 1", [], |row| {
            row.get(0)
        })?;
        Ok(end - count)
    }
}

fn parse_ts(s: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(s)
        .with_context(|| format!("bad timestamp in database: {s}"))?
        .with_timezone(&Utc))
}

fn parse_media_type(s: &str) -> Result<MediaType> {
    MediaType::parse(s).ok_or_else(|| anyhow!("bad media type in database: {s}"))
}

impl SearchSource for SqliteDb {
    /// One entry per park plus one per campground, derived from the park
    /// documents. Campground entries inherit the park's province and carry
    /// the park name as their parent.
    fn fetch_search_entries(&self) -> Result<Vec<SearchEntry>> {
        let docs: Vec<String> = {
            let conn = self.lock()?;
            let mut stmt = conn.prepare("SELECT doc FROM parks ORDER BY id")?;
            let rows = stmt
                .query_map([], |row| row.get::<_, String>(0))?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            rows
        };

        let mut entries = Vec::new();
        for doc in docs {
            let park: Park = serde_json::from_str(&doc).context("bad park document")?;
            entries.push(SearchEntry {
                id: park.id,
                name: park.name.clone(),
                province: park.province.clone(),
                kind: EntryKind::Park,
                parent_park: None,
                keywords: park.keywords.clone(),
                slug: park.slug.clone(),
                name_norm: String::new(),
                province_norm: String::new(),
                keywords_norm: Vec::new(),
            });
            for cg in &park.campgrounds {
                entries.push(SearchEntry {
                    id: cg.id.unwrap_or_default(),
                    name: cg.name.clone(),
                    province: park.province.clone(),
                    kind: EntryKind::Campground,
                    parent_park: Some(park.name.clone()),
                    keywords: Vec::new(),
                    slug: cg.slug.clone(),
                    name_norm: String::new(),
                    province_norm: String::new(),
                    keywords_norm: Vec::new(),
                });
            }
        }
        Ok(entries)
    }
}

impl ParkStore for SqliteDb {
    fn find_park(&self, slug: &str) -> Result<Option<Park>> {
        let doc: Option<String> = {
            let conn = self.lock()?;
            let result = conn.query_row("SELECT doc FROM parks WHERE slug = ?", [slug], |row| {
                row.get(0)
            });
            match result {
                Ok(doc) => Some(doc),
                Err(rusqlite::Error::QueryReturnedNoRows) => None,
                Err(e) => return Err(e.into()),
            }
        };
        match doc {
            Some(doc) => Ok(Some(
                serde_json::from_str(&doc).context("bad park document")?,
            )),
            None => Ok(None),
        }
    }

    fn save_park(&self, park: &mut Park) -> Result<()> {
        self.save_park_inner(park)
    }

    fn touch_park(&self, park_id: i64, at: DateTime<Utc>) -> Result<()> {
        let doc: String = {
            let conn = self.lock()?;
            conn.query_row("SELECT doc FROM parks WHERE id = ?", [park_id], |row| {
                row.get(0)
            })?
        };
        let mut park: Park = serde_json::from_str(&doc).context("bad park document")?;
        park.updated_at = at;
        let doc = serde_json::to_string(&park)?;
        let conn = self.lock()?;
        conn.execute(
            "UPDATE parks SET doc = ?, updated_at = ? WHERE id = ?",
            params![doc, at.to_rfc3339(), park_id],
        )?;
        Ok(())
    }
}

impl UploadLog for SqliteDb {
    fn create(&self, record: &UploadRecord) -> Result<i64> {
        let conn = self.lock()?;
        conn.execute(
            r#"
            INSERT INTO uploads (
                media_type, media_id, host_object_id, youtube_url,
                park_id, park_name, campground_id, campground_name,
                campsite_id, campsite_name, user_id, approved, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
            params![
                record.media_type.as_str(),
                record.media_id,
                record.host_object_id,
                record.youtube_url,
                record.park_id,
                record.park_name,
                record.campground_id,
                record.campground_name,
                record.campsite_id,
                record.campsite_name,
                record.user_id,
                record.approved,
                record.created_at.to_rfc3339(),
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    fn delete(&self, id: i64) -> Result<()> {
        let conn = self.lock()?;
        conn.execute("DELETE FROM uploads WHERE id = ?", [id])?;
        Ok(())
    }

    fn delete_for_media(&self, media_type: MediaType, media_id: MediaId) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "DELETE FROM uploads WHERE media_type = ? AND media_id = ?",
            params![media_type.as_str(), media_id],
        )?;
        Ok(())
    }

    fn list_for_user(&self, user_id: UserId) -> Result<Vec<UploadRecord>> {
        struct Row {
            id: i64,
            media_type: String,
            media_id: i64,
            host_object_id: Option<String>,
            youtube_url: Option<String>,
            park_id: i64,
            park_name: String,
            campground_id: Option<i64>,
            campground_name: Option<String>,
            campsite_id: Option<i64>,
            campsite_name: Option<String>,
            user_id: i64,
            approved: bool,
            created_at: String,
        }

        let rows: Vec<Row> = {
            let conn = self.lock()?;
            let mut stmt = conn.prepare(
                r#"
                SELECT id, media_type, media_id, host_object_id, youtube_url,
                       park_id, park_name, campground_id, campground_name,
                       campsite_id, campsite_name, user_id, approved, created_at
                FROM uploads WHERE user_id = ? ORDER BY id
                "#,
            )?;
            let mapped = stmt.query_map([user_id], |row| {
                Ok(Row {
                    id: row.get(0)?,
                    media_type: row.get(1)?,
                    media_id: row.get(2)?,
                    host_object_id: row.get(3)?,
                    youtube_url: row.get(4)?,
                    park_id: row.get(5)?,
                    park_name: row.get(6)?,
                    campground_id: row.get(7)?,
                    campground_name: row.get(8)?,
                    campsite_id: row.get(9)?,
                    campsite_name: row.get(10)?,
                    user_id: row.get(11)?,
                    approved: row.get(12)?,
                    created_at: row.get(13)?,
                })
            })?;
            mapped.collect::<rusqlite::Result<Vec<_>>>()?
        };

        rows.into_iter()
            .map(|r| {
                Ok(UploadRecord {
                    id: Some(r.id),
                    media_type: parse_media_type(&r.media_type)?,
                    media_id: r.media_id,
                    host_object_id: r.host_object_id,
                    youtube_url: r.youtube_url,
                    park_id: r.park_id,
                    park_name: r.park_name,
                    campground_id: r.campground_id,
                    campground_name: r.campground_name,
                    campsite_id: r.campsite_id,
                    campsite_name: r.campsite_name,
                    user_id: r.user_id,
                    approved: r.approved,
                    created_at: parse_ts(&r.created_at)?,
                })
            })
            .collect()
    }
}

impl UserHistory for SqliteDb {
    fn push(&self, user_id: UserId, entry: &UserUploadEntry) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            r#"
            INSERT INTO user_uploads (
                user_id, media_type, media_id, hosted_url, youtube_url, host_object_id,
                park_id, park_slug, park_name,
                campground_id, campground_slug, campground_name,
                campsite_id, campsite_slug, campsite_name,
                caption, date_taken, uploaded_at, status
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
            params![
                user_id,
                entry.media_type.as_str(),
                entry.media_id,
                entry.hosted_url,
                entry.youtube_url,
                entry.host_object_id,
                entry.park_id,
                entry.park_slug,
                entry.park_name,
                entry.campground_id,
                entry.campground_slug,
                entry.campground_name,
                entry.campsite_id,
                entry.campsite_slug,
                entry.campsite_name,
                entry.caption,
                entry.date_taken.to_rfc3339(),
                entry.uploaded_at.to_rfc3339(),
                entry.status.as_str(),
            ],
        )?;
        Ok(())
    }

    fn mark_removed(&self, user_id: UserId, media_id: MediaId) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "UPDATE user_uploads SET status = 'removed' WHERE user_id = ? AND media_id = ?",
            params![user_id, media_id],
        )?;
        Ok(())
    }

    fn list(&self, user_id: UserId) -> Result<Vec<UserUploadEntry>> {
        struct Row {
            media_type: String,
            media_id: i64,
            hosted_url: Option<String>,
            youtube_url: Option<String>,
            host_object_id: Option<String>,
            park_id: i64,
            park_slug: String,
            park_name: String,
            campground_id: Option<i64>,
            campground_slug: Option<String>,
            campground_name: Option<String>,
            campsite_id: Option<i64>,
            campsite_slug: Option<String>,
            campsite_name: Option<String>,
            caption: String,
            date_taken: String,
            uploaded_at: String,
            status: String,
        }

        let rows: Vec<Row> = {
            let conn = self.lock()?;
            let mut stmt = conn.prepare(
                r#"
                SELECT media_type, media_id, hosted_url, youtube_url, host_object_id,
                       park_id, park_slug, park_name,
                       campground_id, campground_slug, campground_name,
                       campsite_id, campsite_slug, campsite_name,
                       caption, date_taken, uploaded_at, status
                FROM user_uploads WHERE user_id = ? ORDER BY id
                "#,
            )?;
            let mapped = stmt.query_map([user_id], |row| {
                Ok(Row {
                    media_type: row.get(0)?,
                    media_id: row.get(1)?,
                    hosted_url: row.get(2)?,
                    youtube_url: row.get(3)?,
                    host_object_id: row.get(4)?,
                    park_id: row.get(5)?,
                    park_slug: row.get(6)?,
                    park_name: row.get(7)?,
                    campground_id: row.get(8)?,
                    campground_slug: row.get(9)?,
                    campground_name: row.get(10)?,
                    campsite_id: row.get(11)?,
                    campsite_slug: row.get(12)?,
                    campsite_name: row.get(13)?,
                    caption: row.get(14)?,
                    date_taken: row.get(15)?,
                    uploaded_at: row.get(16)?,
                    status: row.get(17)?,
                })
            })?;
            mapped.collect::<rusqlite::Result<Vec<_>>>()?
        };

        rows.into_iter()
            .map(|r| {
                Ok(UserUploadEntry {
                    media_type: parse_media_type(&r.media_type)?,
                    media_id: r.media_id,
                    hosted_url: r.hosted_url,
                    youtube_url: r.youtube_url,
                    host_object_id: r.host_object_id,
                    park_id: r.park_id,
                    park_slug: r.park_slug,
                    park_name: r.park_name,
                    campground_id: r.campground_id,
                    campground_slug: r.campground_slug,
                    campground_name: r.campground_name,
                    campsite_id: r.campsite_id,
                    campsite_slug: r.campsite_slug,
                    campsite_name: r.campsite_name,
                    caption: r.caption,
                    date_taken: parse_ts(&r.date_taken)?,
                    uploaded_at: parse_ts(&r.uploaded_at)?,
                    status: match r.status.as_str() {
                        "removed" => UploadStatus::Removed,
                        _ => UploadStatus::Active,
                    },
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::park::test_fixtures::{campsite, park, photo, sample_time, video};
    use crate::park::Campground;

    fn db() -> SqliteDb {
        SqliteDb::open_in_memory().unwrap()
    }

    #[test]
    fn test_insert_and_find_park() {
        let db = db();
        let mut p = park(0, "Banff National Park", "Alberta");
        db.insert_park(&mut p).unwrap();
        assert!(p.id > 0);

        let found = db.find_park("banff-national-park").unwrap().unwrap();
        assert_eq!(found.name, "Banff National Park");
        assert_eq!(found.id, p.id);
        assert!(db.find_park("nope").unwrap().is_none());
    }

    #[test]
    fn test_save_assigns_subdocument_ids() {
        let db = db();
        let mut p = park(0, "Jasper National Park", "Alberta");
        p.campsites.push(campsite("12"));
        p.photos.push(photo(1, "https://img.example/a.jpg"));
        db.insert_park(&mut p).unwrap();

        assert!(p.campsites[0].id.is_some());
        assert!(p.photos[0].id.is_some());
        assert_ne!(p.campsites[0].id, p.photos[0].id);

        // A later save only assigns ids to new subdocuments.
        let first_photo_id = p.photos[0].id;
        p.videos.push(video(1, "https://youtu.be/dQw4w9WgXcQ"));
        db.save_park(&mut p).unwrap();
        assert_eq!(p.photos[0].id, first_photo_id);
        assert!(p.videos[0].id.is_some());
    }

    #[test]
    fn test_touch_park_bumps_updated_at() {
        let db = db();
        let mut p = park(0, "Banff National Park", "Alberta");
        db.insert_park(&mut p).unwrap();

        let later = sample_time() + chrono::Duration::hours(5);
        db.touch_park(p.id, later).unwrap();
        let found = db.find_park("banff-national-park").unwrap().unwrap();
        assert_eq!(found.updated_at, later);
    }

    #[test]
    fn test_fetch_search_entries_includes_campgrounds() {
        let db = db();
        let mut p = park(0, "Jasper National Park", "Alberta");
        p.keywords = vec!["rockies".to_string()];
        p.campgrounds.push(Campground {
            id: None,
            name: "Whistlers".to_string(),
            slug: "whistlers".to_string(),
            sites_ranges: None,
            photos: Vec::new(),
            campsites: Vec::new(),
        });
        db.insert_park(&mut p).unwrap();

        let entries = db.fetch_search_entries().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].kind, EntryKind::Park);
        assert_eq!(entries[0].keywords, vec!["rockies".to_string()]);
        assert_eq!(entries[1].kind, EntryKind::Campground);
        assert_eq!(entries[1].parent_park.as_deref(), Some("Jasper National Park"));
        assert_eq!(entries[1].province, "Alberta");
        // Raw entries: normalization happens at cache-build time.
        assert!(entries[0].name_norm.is_empty());
    }

    #[test]
    fn test_upload_log_roundtrip() {
        let db = db();
        let record = UploadRecord {
            id: None,
            media_type: MediaType::Photo,
            media_id: 42,
            host_object_id: Some("camp-parks/abc".to_string()),
            youtube_url: None,
            park_id: 1,
            park_name: "Banff National Park".to_string(),
            campground_id: None,
            campground_name: None,
            campsite_id: Some(7),
            campsite_name: Some("12A".to_string()),
            user_id: 99,
            approved: false,
            created_at: sample_time(),
        };
        let id = db.create(&record).unwrap();
        assert!(id > 0);

        let listed = db.list_for_user(99).unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].media_id, 42);
        assert_eq!(listed[0].host_object_id.as_deref(), Some("camp-parks/abc"));
        assert_eq!(listed[0].created_at, sample_time());

        db.delete_for_media(MediaType::Photo, 42).unwrap();
        assert!(db.list_for_user(99).unwrap().is_empty());
    }

    #[test]
    fn test_user_history_mark_removed_is_soft() {
        let db = db();
        let entry = UserUploadEntry {
            media_type: MediaType::Video,
            media_id: 5,
            hosted_url: None,
            youtube_url: Some("https://youtu.be/dQw4w9WgXcQ".to_string()),
            host_object_id: None,
            park_id: 1,
            park_slug: "banff-national-park".to_string(),
            park_name: "Banff National Park".to_string(),
            campground_id: None,
            campground_slug: None,
            campground_name: None,
            campsite_id: None,
            campsite_slug: None,
            campsite_name: None,
            caption: "evening".to_string(),
            date_taken: sample_time(),
            uploaded_at: sample_time(),
            status: UploadStatus::Active,
        };
        db.push(3, &entry).unwrap();
        db.mark_removed(3, 5).unwrap();

        let listed = db.list(3).unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].status, UploadStatus::Removed);
        assert_eq!(listed[0].youtube_url.as_deref(), Some("https://youtu.be/dQw4w9WgXcQ"));
    }
}
