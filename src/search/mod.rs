//! Search cache and ranking engine.
//!
//! A denormalized snapshot of searchable parks and campgrounds is held in
//! memory and on disk, refreshed every 24 hours, and scored against free-text
//! queries with simple weighted substring matching.

pub mod cache;
pub mod query;
pub mod score;

use serde::{Deserialize, Serialize};

pub use cache::SearchCache;
pub use query::{browse_all, search_api, search_page, HighlightedEntry, PageOutcome, RankedEntry};
pub use score::normalize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Park,
    Campground,
}

/// One searchable row: a park or a campground. The `*_norm` fields are
/// computed once when the snapshot is built so queries do not re-normalize
/// every stored string per term.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchEntry {
    pub id: i64,
    pub name: String,
    pub province: String,
    pub kind: EntryKind,
    /// Set only for campground entries: the park it belongs to.
    #[serde(default)]
    pub parent_park: Option<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
    pub slug: String,

    #[serde(default)]
    pub name_norm: String,
    #[serde(default)]
    pub province_norm: String,
    #[serde(default)]
    pub keywords_norm: Vec<String>,
}

#[cfg(test)]
pub(crate) mod test_entries {
    use super::*;
    use crate::search::score::enrich;

    pub fn entry(name: &str, province: &str, kind: EntryKind) -> SearchEntry {
        let mut e = SearchEntry {
            id: 0,
            name: name.to_string(),
            province: province.to_string(),
            kind,
            parent_park: None,
            keywords: Vec::new(),
            slug: crate::park::to_slug(name),
            name_norm: String::new(),
            province_norm: String::new(),
            keywords_norm: Vec::new(),
        };
        enrich(&mut e);
        e
    }

    pub fn park_entry(name: &str, province: &str) -> SearchEntry {
        entry(name, province, EntryKind::Park)
    }

    pub fn campground_entry(name: &str, province: &str, parent: &str) -> SearchEntry {
        let mut e = entry(name, province, EntryKind::Campground);
        e.parent_park = Some(parent.to_string());
        e
    }
}
