//! Park document model: parks, campgrounds, campsites, and their attached
//! photos/videos, plus target resolution for the media workflow.
//!
//! A park either has campgrounds (each with campsites) or standalone
//! campsites directly. Media attaches to the park itself or to a campsite.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

pub type UserId = i64;
pub type MediaId = i64;

pub const MAX_CAPTION_CHARS: usize = 50;

/// Photo attached to a park or campsite. `id` is assigned by the store when
/// the parent document is saved, so a freshly built photo carries `None`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Photo {
    #[serde(default)]
    pub id: Option<MediaId>,
    pub user_id: UserId,
    pub url: String,
    #[serde(default)]
    pub caption: String,
    pub uploaded_at: DateTime<Utc>,
    #[serde(default = "default_true")]
    pub approved: bool,
    #[serde(default)]
    pub social_media_approved: bool,
    pub date_taken: DateTime<Utc>,
    #[serde(default)]
    pub show_username: bool,
    #[serde(default)]
    pub username: Option<String>,
}

/// Video attached to a park or campsite. `url` is an external YouTube link;
/// there is no hosted object behind it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Video {
    #[serde(default)]
    pub id: Option<MediaId>,
    pub user_id: UserId,
    pub url: String,
    #[serde(default)]
    pub caption: String,
    pub uploaded_at: DateTime<Utc>,
    #[serde(default = "default_true")]
    pub approved: bool,
    pub date_taken: DateTime<Utc>,
    #[serde(default)]
    pub show_username: bool,
    #[serde(default)]
    pub username: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Campsite {
    #[serde(default)]
    pub id: Option<MediaId>,
    pub site_number: String,
    pub slug: String,
    #[serde(default)]
    pub photos: Vec<Photo>,
    #[serde(default)]
    pub videos: Vec<Video>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Campground {
    #[serde(default)]
    pub id: Option<MediaId>,
    pub name: String,
    pub slug: String,
    #[serde(default)]
    pub sites_ranges: Option<String>,
    #[serde(default)]
    pub photos: Vec<Photo>,
    #[serde(default)]
    pub campsites: Vec<Campsite>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Park {
    pub id: i64,
    pub name: String,
    pub slug: String,
    pub province: String,
    /// Search keywords (park type, alternate names, nearby towns).
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub sites_ranges: Option<String>,
    #[serde(default)]
    pub photos: Vec<Photo>,
    #[serde(default)]
    pub videos: Vec<Video>,
    #[serde(default)]
    pub campgrounds: Vec<Campground>,
    #[serde(default)]
    pub campsites: Vec<Campsite>,
    pub updated_at: DateTime<Utc>,
}

fn default_true() -> bool {
    true
}

/// URL slug: accents stripped, lowercased, spaces/underscores hyphenated,
/// everything else dropped.
pub fn to_slug(name: &str) -> String {
    let stripped: String = name
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .collect::<String>()
        .to_lowercase();

    let mut slug = String::with_capacity(stripped.len());
    let mut last_hyphen = true; // suppress leading hyphens
    for c in stripped.trim().chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c);
            last_hyphen = false;
        } else if (c.is_whitespace() || c == '_' || c == '-') && !last_hyphen {
            slug.push('-');
            last_hyphen = true;
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    slug
}

/// Where a media submission lands: the park itself or one of its campsites.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetKind {
    Park,
    Campsite,
}

/// A resolved submission target. Carries the quota limits for its level and
/// enough identity to build audit records, but borrows nothing from the park
/// so the caller can keep mutating the document.
#[derive(Debug, Clone)]
pub struct Target {
    pub kind: TargetKind,
    pub campsite_slug: Option<String>,
    pub campsite_id: Option<MediaId>,
    pub site_number: Option<String>,
    pub photo_limit: usize,
    pub video_limit: usize,
}

pub const PARK_PHOTO_LIMIT: usize = 2;
pub const CAMPSITE_PHOTO_LIMIT: usize = 5;
pub const VIDEO_LIMIT: usize = 2;

impl Target {
    /// "park" or "campsite", for user-facing quota messages.
    pub fn scope(&self) -> &'static str {
        match self.kind {
            TargetKind::Park => "park",
            TargetKind::Campsite => "campsite",
        }
    }

    pub fn photos<'a>(&self, park: &'a Park) -> &'a [Photo] {
        match self.kind {
            TargetKind::Park => &park.photos,
            TargetKind::Campsite => self
                .campsite(park)
                .map(|cs| cs.photos.as_slice())
                .unwrap_or(&[]),
        }
    }

    pub fn photos_mut<'a>(&self, park: &'a mut Park) -> Option<&'a mut Vec<Photo>> {
        match self.kind {
            TargetKind::Park => Some(&mut park.photos),
            TargetKind::Campsite => self.campsite_mut(park).map(|cs| &mut cs.photos),
        }
    }

    pub fn videos<'a>(&self, park: &'a Park) -> &'a [Video] {
        match self.kind {
            TargetKind::Park => &park.videos,
            TargetKind::Campsite => self
                .campsite(park)
                .map(|cs| cs.videos.as_slice())
                .unwrap_or(&[]),
        }
    }

    pub fn videos_mut<'a>(&self, park: &'a mut Park) -> Option<&'a mut Vec<Video>> {
        match self.kind {
            TargetKind::Park => Some(&mut park.videos),
            TargetKind::Campsite => self.campsite_mut(park).map(|cs| &mut cs.videos),
        }
    }

    fn campsite<'a>(&self, park: &'a Park) -> Option<&'a Campsite> {
        let slug = self.campsite_slug.as_deref()?;
        find_campsite(park, slug)
    }

    fn campsite_mut<'a>(&self, park: &'a mut Park) -> Option<&'a mut Campsite> {
        let slug = self.campsite_slug.as_deref()?;
        find_campsite_mut(park, slug)
    }
}

/// Resolve the submission target once per request. `None` means the campsite
/// slug was given but no such campsite exists in this park.
pub fn resolve_target(park: &Park, campsite_slug: Option<&str>) -> Option<Target> {
    match campsite_slug {
        None => Some(Target {
            kind: TargetKind::Park,
            campsite_slug: None,
            campsite_id: None,
            site_number: None,
            photo_limit: PARK_PHOTO_LIMIT,
            video_limit: VIDEO_LIMIT,
        }),
        Some(slug) => {
            let cs = find_campsite(park, slug)?;
            Some(Target {
                kind: TargetKind::Campsite,
                campsite_slug: Some(slug.to_string()),
                campsite_id: cs.id,
                site_number: Some(cs.site_number.clone()),
                photo_limit: CAMPSITE_PHOTO_LIMIT,
                video_limit: VIDEO_LIMIT,
            })
        }
    }
}

/// Campsites inside campgrounds are checked first, then the park-level
/// standalone ones.
pub fn find_campsite<'a>(park: &'a Park, campsite_slug: &str) -> Option<&'a Campsite> {
    for cg in &park.campgrounds {
        if let Some(found) = cg.campsites.iter().find(|cs| cs.slug == campsite_slug) {
            return Some(found);
        }
    }
    park.campsites.iter().find(|cs| cs.slug == campsite_slug)
}

pub fn find_campsite_mut<'a>(park: &'a mut Park, campsite_slug: &str) -> Option<&'a mut Campsite> {
    // Split borrows: campgrounds first, then the standalone list.
    if park
        .campgrounds
        .iter()
        .any(|cg| cg.campsites.iter().any(|cs| cs.slug == campsite_slug))
    {
        return park
            .campgrounds
            .iter_mut()
            .flat_map(|cg| cg.campsites.iter_mut())
            .find(|cs| cs.slug == campsite_slug);
    }
    park.campsites
        .iter_mut()
        .find(|cs| cs.slug == campsite_slug)
}

/// Per-campsite media counts for the park detail view, sorted by site number
/// (natural order, so "site 10" lands after "site 9").
#[derive(Debug, Clone, Serialize)]
pub struct CampsiteMediaSummary {
    pub site_number: String,
    pub slug: String,
    pub photo_count: usize,
    pub video_count: usize,
    pub has_media: bool,
}

pub fn campsite_media_summaries(park: &Park) -> Vec<CampsiteMediaSummary> {
    let mut summaries: Vec<CampsiteMediaSummary> = park
        .campgrounds
        .iter()
        .flat_map(|cg| cg.campsites.iter())
        .chain(park.campsites.iter())
        .map(|cs| CampsiteMediaSummary {
            site_number: cs.site_number.clone(),
            slug: cs.slug.clone(),
            photo_count: cs.photos.len(),
            video_count: cs.videos.len(),
            has_media: !cs.photos.is_empty() || !cs.videos.is_empty(),
        })
        .collect();
    summaries.sort_by(|a, b| natural_cmp(&a.site_number, &b.site_number));
    summaries
}

/// Case-insensitive comparison that orders embedded numbers numerically.
pub fn natural_cmp(a: &str, b: &str) -> std::cmp::Ordering {
    let mut ai = a.chars().peekable();
    let mut bi = b.chars().peekable();

    loop {
        match (ai.peek().copied(), bi.peek().copied()) {
            (None, None) => return std::cmp::Ordering::Equal,
            (None, Some(_)) => return std::cmp::Ordering::Less,
            (Some(_), None) => return std::cmp::Ordering::Greater,
            (Some(ca), Some(cb)) => {
                if ca.is_ascii_digit() && cb.is_ascii_digit() {
                    let na = take_number(&mut ai);
                    let nb = take_number(&mut bi);
                    match na.cmp(&nb) {
                        std::cmp::Ordering::Equal => {}
                        other => return other,
                    }
                } else {
                    let la = ca.to_lowercase().next().unwrap_or(ca);
                    let lb = cb.to_lowercase().next().unwrap_or(cb);
                    match la.cmp(&lb) {
                        std::cmp::Ordering::Equal => {
                            ai.next();
                            bi.next();
                        }
                        other => return other,
                    }
                }
            }
        }
    }
}

fn take_number(it: &mut std::iter::Peekable<std::str::Chars>) -> u64 {
    let mut n: u64 = 0;
    while let Some(c) = it.peek() {
        if let Some(d) = c.to_digit(10) {
            n = n.saturating_mul(10).saturating_add(d as u64);
            it.next();
        } else {
            break;
        }
    }
    n
}

#[cfg(test)]
pub(crate) mod test_fixtures {
    use super::*;
    use chrono::TimeZone;

    pub fn sample_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
    }

    pub fn photo(user_id: UserId, url: &str) -> Photo {
        Photo {
            id: None,
            user_id,
            url: url.to_string(),
            caption: String::new(),
            uploaded_at: sample_time(),
            approved: true,
            social_media_approved: false,
            date_taken: sample_time(),
            show_username: false,
            username: None,
        }
    }

    pub fn video(user_id: UserId, url: &str) -> Video {
        Video {
            id: None,
            user_id,
            url: url.to_string(),
            caption: String::new(),
            uploaded_at: sample_time(),
            approved: true,
            date_taken: sample_time(),
            show_username: false,
            username: None,
        }
    }

    pub fn campsite(site_number: &str) -> Campsite {
        Campsite {
            id: None,
            site_number: site_number.to_string(),
            slug: to_slug(site_number),
            photos: Vec::new(),
            videos: Vec::new(),
            is_active: true,
        }
    }

    pub fn park(id: i64, name: &str, province: &str) -> Park {
        Park {
            id,
            name: name.to_string(),
            slug: to_slug(name),
            province: province.to_string(),
            keywords: Vec::new(),
            sites_ranges: None,
            photos: Vec::new(),
            videos: Vec::new(),
            campgrounds: Vec::new(),
            campsites: Vec::new(),
            updated_at: sample_time(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_fixtures::*;
    use super::*;

    #[test]
    fn test_to_slug() {
        assert_eq!(to_slug("Banff National Park"), "banff-national-park");
        assert_eq!(to_slug("Forillon — Québec"), "forillon-quebec");
        assert_eq!(to_slug("  Site_12 (loop B)  "), "site-12-loop-b");
        assert_eq!(to_slug("---"), "");
    }

    #[test]
    fn test_resolve_target_park_level() {
        let park = park(1, "Banff National Park", "Alberta");
        let target = resolve_target(&park, None).unwrap();
        assert_eq!(target.kind, TargetKind::Park);
        assert_eq!(target.photo_limit, PARK_PHOTO_LIMIT);
        assert_eq!(target.video_limit, VIDEO_LIMIT);
        assert_eq!(target.scope(), "park");
    }

    #[test]
    fn test_resolve_target_prefers_campground_campsites() {
        let mut p = park(1, "Jasper National Park", "Alberta");
        let mut cg = Campground {
            id: Some(7),
            name: "Whistlers".to_string(),
            slug: "whistlers".to_string(),
            sites_ranges: None,
            photos: Vec::new(),
            campsites: vec![campsite("12A")],
        };
        cg.campsites[0].id = Some(42);
        p.campgrounds.push(cg);
        // Standalone campsite with a colliding slug should not shadow the
        // campground one.
        let mut standalone = campsite("12A");
        standalone.id = Some(99);
        p.campsites.push(standalone);

        let target = resolve_target(&p, Some("12a")).unwrap();
        assert_eq!(target.kind, TargetKind::Campsite);
        assert_eq!(target.campsite_id, Some(42));
        assert_eq!(target.photo_limit, CAMPSITE_PHOTO_LIMIT);
        assert_eq!(target.scope(), "campsite");
    }

    #[test]
    fn test_resolve_target_unknown_campsite() {
        let p = park(1, "Jasper National Park", "Alberta");
        assert!(resolve_target(&p, Some("nope")).is_none());
    }

    #[test]
    fn test_target_media_access() {
        let mut p = park(1, "Jasper National Park", "Alberta");
        p.campsites.push(campsite("3"));
        let target = resolve_target(&p, Some("3")).unwrap();

        target
            .photos_mut(&mut p)
            .unwrap()
            .push(photo(10, "https://img.example/a.jpg"));
        assert_eq!(target.photos(&p).len(), 1);
        assert!(p.photos.is_empty());
    }

    #[test]
    fn test_campsite_media_summaries_natural_order() {
        let mut p = park(1, "Jasper National Park", "Alberta");
        p.campsites.push(campsite("site 10"));
        p.campsites.push(campsite("site 9"));
        p.campsites[0].photos.push(photo(1, "https://img.example/x.jpg"));

        let summaries = campsite_media_summaries(&p);
        assert_eq!(summaries[0].site_number, "site 9");
        assert_eq!(summaries[1].site_number, "site 10");
        assert!(summaries[1].has_media);
        assert!(!summaries[0].has_media);
    }

    #[test]
    fn test_natural_cmp() {
        use std::cmp::Ordering;
        assert_eq!(natural_cmp("A2", "a10"), Ordering::Less);
        assert_eq!(natural_cmp("B1", "a2"), Ordering::Greater);
        assert_eq!(natural_cmp("12", "12"), Ordering::Equal);
    }
}
