//! Storage seams and audit record types.
//!
//! Three small traits keep the search cache and the media workflow
//! independent of the concrete store, so tests can run against in-memory
//! fakes. `sqlite::SqliteDb` implements all of them over one database file,
//! storing park documents as JSON and the two audit structures relationally.

mod schema;
pub mod sqlite;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::park::{MediaId, Park, UserId};
use crate::search::SearchEntry;

pub use sqlite::SqliteDb;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Photo,
    Video,
}

impl MediaType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaType::Photo => "photo",
            MediaType::Video => "video",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "photo" => Some(MediaType::Photo),
            "video" => Some(MediaType::Video),
            _ => None,
        }
    }
}

/// Denormalized audit row: one per active photo/video, independent of the
/// park document the media lives in. An orphaned row (or a missing one)
/// means a partial-failure path was not fully compensated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadRecord {
    pub id: Option<i64>,
    pub media_type: MediaType,
    /// Id of the photo/video inside its parent document.
    pub media_id: MediaId,
    pub host_object_id: Option<String>,
    pub youtube_url: Option<String>,
    pub park_id: i64,
    pub park_name: String,
    pub campground_id: Option<MediaId>,
    pub campground_name: Option<String>,
    pub campsite_id: Option<MediaId>,
    pub campsite_name: Option<String>,
    pub user_id: UserId,
    pub approved: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadStatus {
    Active,
    Removed,
}

impl UploadStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UploadStatus::Active => "active",
            UploadStatus::Removed => "removed",
        }
    }
}

/// Entry in a user's own upload history. Soft-deleted (`status: removed`)
/// rather than dropped, so the history survives media deletion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserUploadEntry {
    pub media_type: MediaType,
    pub media_id: MediaId,
    pub hosted_url: Option<String>,
    pub youtube_url: Option<String>,
    pub host_object_id: Option<String>,
    pub park_id: i64,
    pub park_slug: String,
    pub park_name: String,
    pub campground_id: Option<MediaId>,
    pub campground_slug: Option<String>,
    pub campground_name: Option<String>,
    pub campsite_id: Option<MediaId>,
    pub campsite_slug: Option<String>,
    pub campsite_name: Option<String>,
    pub caption: String,
    pub date_taken: DateTime<Utc>,
    pub uploaded_at: DateTime<Utc>,
    pub status: UploadStatus,
}

/// Read-only fetch-all used by the search cache rebuild.
pub trait SearchSource: Send + Sync {
    fn fetch_search_entries(&self) -> Result<Vec<SearchEntry>>;
}

/// Authoritative park document store.
pub trait ParkStore: Send + Sync {
    fn find_park(&self, slug: &str) -> Result<Option<Park>>;

    /// Persist the whole document. Media, campgrounds, and campsites that
    /// carry no id yet get one assigned here (document-store semantics: ids
    /// exist only after the parent is saved).
    fn save_park(&self, park: &mut Park) -> Result<()>;

    /// Bump the park's last-modified timestamp.
    fn touch_park(&self, park_id: i64, at: DateTime<Utc>) -> Result<()>;
}

/// The uploads audit collection.
pub trait UploadLog: Send + Sync {
    fn create(&self, record: &UploadRecord) -> Result<i64>;
    fn delete(&self, id: i64) -> Result<()>;
    fn delete_for_media(&self, media_type: MediaType, media_id: MediaId) -> Result<()>;
    fn list_for_user(&self, user_id: UserId) -> Result<Vec<UploadRecord>>;
}

/// Per-user upload history embedded in the user entity.
pub trait UserHistory: Send + Sync {
    fn push(&self, user_id: UserId, entry: &UserUploadEntry) -> Result<()>;
    fn mark_removed(&self, user_id: UserId, media_id: MediaId) -> Result<()>;
    fn list(&self, user_id: UserId) -> Result<Vec<UserUploadEntry>>;
}
