//! The contribution workflow: photo batches, videos, and deletions against a
//! park or campsite target, spanning the document store, the external media
//! host, and the two audit structures.
//!
//! No lock is held across the multi-store write sequence. Instead each
//! successful step pushes an undo action onto a compensation list; on
//! failure the list runs in reverse, each undo's own failure logged and
//! swallowed. The caller always gets a definitive error even when cleanup
//! itself partially failed.

use std::sync::Arc;

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use tracing::warn;

use super::host::{extract_object_id, MediaHost, UploadParams};
use super::validate;
use crate::clock::Clock;
use crate::db::{
    MediaType, ParkStore, UploadLog, UploadRecord, UploadStatus, UserHistory, UserUploadEntry,
};
use crate::error::MediaError;
use crate::park::{self, MediaId, Park, Photo, Target, UserId, Video};

pub struct PhotoSubmission {
    pub park_slug: String,
    pub campground_slug: Option<String>,
    pub campsite_slug: Option<String>,
    pub user_id: UserId,
    /// Shown next to the media when the user opts in.
    pub display_name: String,
    pub files: Vec<Vec<u8>>,
    pub caption: String,
    pub show_username: bool,
    pub date_taken: DateTime<Utc>,
}

pub struct VideoSubmission {
    pub park_slug: String,
    pub campground_slug: Option<String>,
    pub campsite_slug: Option<String>,
    pub user_id: UserId,
    pub display_name: String,
    pub url: String,
    pub caption: String,
    pub show_username: bool,
    pub date_taken: DateTime<Utc>,
}

pub struct DeleteRequest {
    pub park_slug: String,
    pub campsite_slug: Option<String>,
    pub media_id: MediaId,
    pub requested_by: UserId,
    pub requester_is_admin: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PhotoReceipt {
    pub added: usize,
    /// Files silently dropped because the batch exceeded the user's
    /// remaining quota slots.
    pub skipped: usize,
    pub remaining: usize,
    pub message: String,
}

/// Undo actions, run in reverse order of accumulation.
enum Compensation {
    DeleteUploadRecord(i64),
    DestroyHostedObject(String),
    StripPhotosByUrl {
        park_slug: String,
        campsite_slug: Option<String>,
        object_ids: Vec<String>,
    },
}

pub struct MediaService {
    store: Arc<dyn ParkStore>,
    uploads: Arc<dyn UploadLog>,
    users: Arc<dyn UserHistory>,
    host: Arc<dyn MediaHost>,
    clock: Arc<dyn Clock>,
    upload_params: UploadParams,
}

impl MediaService {
    pub fn new(
        store: Arc<dyn ParkStore>,
        uploads: Arc<dyn UploadLog>,
        users: Arc<dyn UserHistory>,
        host: Arc<dyn MediaHost>,
        clock: Arc<dyn Clock>,
        upload_params: UploadParams,
    ) -> Self {
        Self {
            store,
            uploads,
            users,
            host,
            clock,
            upload_params,
        }
    }

    /// Upload a batch of 1-5 photos. The whole batch is validated before
    /// anything is written anywhere; a batch larger than the user's
    /// remaining quota is truncated, not rejected.
    pub fn upload_photos(&self, submission: PhotoSubmission) -> Result<PhotoReceipt, MediaError> {
        validate::ensure_not_future(self.clock.as_ref(), submission.date_taken)?;
        if submission.files.is_empty() {
            return Err(MediaError::InvalidInput("No files uploaded.".to_string()));
        }
        if submission.files.len() > validate::MAX_BATCH {
            return Err(MediaError::InvalidInput(
                "Too many files uploaded.".to_string(),
            ));
        }
        validate::ensure_caption_length(&submission.caption)?;

        let mut park = self
            .store
            .find_park(&submission.park_slug)?
            .ok_or_else(|| MediaError::NotFound("Park".to_string()))?;
        let target = park::resolve_target(&park, submission.campsite_slug.as_deref())
            .ok_or_else(|| MediaError::NotFound("Campsite".to_string()))?;

        let user_count = target
            .photos(&park)
            .iter()
            .filter(|p| p.user_id == submission.user_id)
            .count();
        let remaining = target.photo_limit.saturating_sub(user_count);
        if remaining == 0 {
            return Err(MediaError::QuotaExceeded {
                uploaded: user_count,
                media: "photos",
                scope: target.scope(),
            });
        }

        validate::validate_batch(&submission.files)?;

        let allowed = &submission.files[..submission.files.len().min(remaining)];
        let skipped = submission.files.len() - allowed.len();

        let mut compensations: Vec<Compensation> = Vec::new();
        let now = self.clock.now();
        let mut new_photos: Vec<Photo> = Vec::new();

        for file in allowed {
            let hosted = match self.host.upload(file, &self.upload_params) {
                Ok(hosted) => hosted,
                Err(err) => {
                    self.run_compensations(compensations);
                    return Err(MediaError::Upstream(err));
                }
            };
            compensations.push(Compensation::DestroyHostedObject(hosted.object_id));
            new_photos.push(Photo {
                id: None,
                user_id: submission.user_id,
                url: hosted.url,
                caption: submission.caption.clone(),
                uploaded_at: now,
                approved: true,
                social_media_approved: false,
                date_taken: submission.date_taken,
                show_username: submission.show_username,
                username: submission
                    .show_username
                    .then(|| submission.display_name.clone()),
            });
        }

        match self.persist_photos(&mut park, &target, &submission, new_photos, &mut compensations)
        {
            Ok(added) => {
                let message = if skipped > 0 {
                    format!(
                        "Only {added} {} uploaded - limit reached.",
                        pluralize(added, "photo")
                    )
                } else {
                    format!("{added} {} uploaded successfully.", pluralize(added, "photo"))
                };
                Ok(PhotoReceipt {
                    added,
                    skipped,
                    remaining: target.photo_limit.saturating_sub(user_count + added),
                    message,
                })
            }
            Err(err) => {
                self.run_compensations(compensations);
                Err(MediaError::Upstream(err))
            }
        }
    }

    /// Everything after the host uploads succeeded: persist the document,
    /// then create the audit records for the subdocuments the save just
    /// assigned ids to (matched back by URL).
    fn persist_photos(
        &self,
        park: &mut Park,
        target: &Target,
        submission: &PhotoSubmission,
        new_photos: Vec<Photo>,
        compensations: &mut Vec<Compensation>,
    ) -> Result<usize> {
        let urls: Vec<String> = new_photos.iter().map(|p| p.url.clone()).collect();
        let object_ids: Vec<String> = urls.iter().filter_map(|u| extract_object_id(u)).collect();

        target
            .photos_mut(park)
            .ok_or_else(|| anyhow!("target disappeared from park document"))?
            .extend(new_photos);
        self.store.save_park(park)?;
        compensations.push(Compensation::StripPhotosByUrl {
            park_slug: park.slug.clone(),
            campsite_slug: target.campsite_slug.clone(),
            object_ids,
        });
        self.store.touch_park(park.id, self.clock.now())?;

        let just_added: Vec<Photo> = target
            .photos(park)
            .iter()
            .filter(|p| urls.contains(&p.url))
            .cloned()
            .collect();

        for photo in &just_added {
            let media_id = photo
                .id
                .ok_or_else(|| anyhow!("photo has no id after save"))?;
            let record = self.upload_record(
                park,
                target,
                submission.campground_slug.as_deref(),
                MediaType::Photo,
                media_id,
                extract_object_id(&photo.url),
                None,
                submission.user_id,
            );
            let record_id = self.uploads.create(&record)?;
            compensations.push(Compensation::DeleteUploadRecord(record_id));
        }

        for photo in &just_added {
            let media_id = photo
                .id
                .ok_or_else(|| anyhow!("photo has no id after save"))?;
            let entry = self.history_entry(
                park,
                target,
                submission.campground_slug.as_deref(),
                MediaType::Photo,
                media_id,
                Some(photo.url.clone()),
                None,
                &photo.caption,
                photo.date_taken,
            );
            self.users.push(submission.user_id, &entry)?;
        }

        Ok(just_added.len())
    }

    /// Add one YouTube video to the target. Quota is 2 per user per target
    /// regardless of level.
    pub fn add_video(&self, submission: VideoSubmission) -> Result<Video, MediaError> {
        let url = submission.url.trim().to_string();
        if url.is_empty() {
            return Err(MediaError::InvalidInput("Missing video URL.".to_string()));
        }
        if !validate::is_youtube_url(&url) {
            return Err(MediaError::InvalidInput(
                "Only valid YouTube links are allowed.".to_string(),
            ));
        }
        validate::ensure_not_future(self.clock.as_ref(), submission.date_taken)?;
        validate::ensure_caption_length(&submission.caption)?;

        let mut park = self
            .store
            .find_park(&submission.park_slug)?
            .ok_or_else(|| MediaError::NotFound("Park".to_string()))?;
        let target = park::resolve_target(&park, submission.campsite_slug.as_deref())
            .ok_or_else(|| MediaError::NotFound("Campsite".to_string()))?;

        let user_count = target
            .videos(&park)
            .iter()
            .filter(|v| v.user_id == submission.user_id)
            .count();
        if user_count >= target.video_limit {
            return Err(MediaError::QuotaExceeded {
                uploaded: user_count,
                media: "videos",
                scope: target.scope(),
            });
        }

        let now = self.clock.now();
        let video = Video {
            id: None,
            user_id: submission.user_id,
            url: url.clone(),
            caption: submission.caption.clone(),
            uploaded_at: now,
            approved: true,
            date_taken: submission.date_taken,
            show_username: submission.show_username,
            username: submission
                .show_username
                .then(|| submission.display_name.clone()),
        };

        target
            .videos_mut(&mut park)
            .ok_or_else(|| MediaError::NotFound("Campsite".to_string()))?
            .push(video);
        self.store.save_park(&mut park)?;
        self.store.touch_park(park.id, now)?;

        let added = target
            .videos(&park)
            .iter()
            .find(|v| v.url == url && v.user_id == submission.user_id)
            .cloned()
            .ok_or_else(|| MediaError::Upstream(anyhow!("video missing after save")))?;
        let media_id = added
            .id
            .ok_or_else(|| MediaError::Upstream(anyhow!("video has no id after save")))?;

        let entry = self.history_entry(
            &park,
            &target,
            submission.campground_slug.as_deref(),
            MediaType::Video,
            media_id,
            None,
            Some(url.clone()),
            &submission.caption,
            submission.date_taken,
        );
        self.users.push(submission.user_id, &entry)?;

        let record = self.upload_record(
            &park,
            &target,
            submission.campground_slug.as_deref(),
            MediaType::Video,
            media_id,
            None,
            Some(url),
            submission.user_id,
        );
        if let Err(err) = self.uploads.create(&record) {
            // Pull the just-pushed video back out before propagating.
            if let Some(videos) = target.videos_mut(&mut park) {
                videos.retain(|v| v.id != Some(media_id));
            }
            if let Err(save_err) = self.store.save_park(&mut park) {
                warn!("failed to roll back video append: {save_err:#}");
            }
            return Err(MediaError::Upstream(err));
        }

        Ok(added)
    }

    /// Delete a photo. The external host is asked first; only a confirmed
    /// host-side deletion (or "already gone") touches local state.
    pub fn delete_photo(&self, request: DeleteRequest) -> Result<(), MediaError> {
        let mut park = self
            .store
            .find_park(&request.park_slug)?
            .ok_or_else(|| MediaError::NotFound("Park".to_string()))?;
        let target = park::resolve_target(&park, request.campsite_slug.as_deref())
            .ok_or_else(|| MediaError::NotFound("Target".to_string()))?;

        let photo = target
            .photos(&park)
            .iter()
            .find(|p| p.id == Some(request.media_id))
            .cloned()
            .ok_or_else(|| MediaError::NotFound("Photo".to_string()))?;

        if photo.user_id != request.requested_by && !request.requester_is_admin {
            return Err(MediaError::Unauthorized);
        }

        let object_id = extract_object_id(&photo.url).ok_or_else(|| {
            MediaError::InvalidInput("Invalid hosted media URL format.".to_string())
        })?;
        // Both outcomes are fine: "not found" means the host is already
        // clean. A transport error aborts before any local mutation.
        self.host.destroy(&object_id)?;

        target
            .photos_mut(&mut park)
            .ok_or_else(|| MediaError::NotFound("Target".to_string()))?
            .retain(|p| p.id != Some(request.media_id));
        self.store.save_park(&mut park)?;

        self.uploads
            .delete_for_media(MediaType::Photo, request.media_id)?;
        // The owner's history entry, even when an admin deletes.
        self.users.mark_removed(photo.user_id, request.media_id)?;
        Ok(())
    }

    /// Delete a video. No external host involved.
    pub fn delete_video(&self, request: DeleteRequest) -> Result<(), MediaError> {
        let mut park = self
            .store
            .find_park(&request.park_slug)?
            .ok_or_else(|| MediaError::NotFound("Park".to_string()))?;
        let target = park::resolve_target(&park, request.campsite_slug.as_deref())
            .ok_or_else(|| MediaError::NotFound("Target".to_string()))?;

        let video = target
            .videos(&park)
            .iter()
            .find(|v| v.id == Some(request.media_id))
            .cloned()
            .ok_or_else(|| MediaError::NotFound("Video".to_string()))?;

        if video.user_id != request.requested_by && !request.requester_is_admin {
            return Err(MediaError::Unauthorized);
        }

        target
            .videos_mut(&mut park)
            .ok_or_else(|| MediaError::NotFound("Target".to_string()))?
            .retain(|v| v.id != Some(request.media_id));
        self.store.save_park(&mut park)?;

        self.uploads
            .delete_for_media(MediaType::Video, request.media_id)?;
        self.users.mark_removed(video.user_id, request.media_id)?;
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn upload_record(
        &self,
        park: &Park,
        target: &Target,
        campground_slug: Option<&str>,
        media_type: MediaType,
        media_id: MediaId,
        host_object_id: Option<String>,
        youtube_url: Option<String>,
        user_id: UserId,
    ) -> UploadRecord {
        let campground = campground_slug
            .and_then(|slug| park.campgrounds.iter().find(|cg| cg.slug == slug));
        UploadRecord {
            id: None,
            media_type,
            media_id,
            host_object_id,
            youtube_url,
            park_id: park.id,
            park_name: park.name.clone(),
            campground_id: campground.and_then(|cg| cg.id),
            campground_name: campground.map(|cg| cg.name.clone()),
            campsite_id: target.campsite_id,
            campsite_name: target.site_number.clone(),
            user_id,
            approved: false,
            created_at: self.clock.now(),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn history_entry(
        &self,
        park: &Park,
        target: &Target,
        campground_slug: Option<&str>,
        media_type: MediaType,
        media_id: MediaId,
        hosted_url: Option<String>,
        youtube_url: Option<String>,
        caption: &str,
        date_taken: DateTime<Utc>,
    ) -> UserUploadEntry {
        let campground = campground_slug
            .and_then(|slug| park.campgrounds.iter().find(|cg| cg.slug == slug));
        let host_object_id = hosted_url.as_deref().and_then(extract_object_id);
        UserUploadEntry {
            media_type,
            media_id,
            hosted_url,
            youtube_url,
            host_object_id,
            park_id: park.id,
            park_slug: park.slug.clone(),
            park_name: park.name.clone(),
            campground_id: campground.and_then(|cg| cg.id),
            campground_slug: campground.map(|cg| cg.slug.clone()),
            campground_name: campground.map(|cg| cg.name.clone()),
            campsite_id: target.campsite_id,
            campsite_slug: target.campsite_slug.clone(),
            campsite_name: target.site_number.clone(),
            caption: caption.to_string(),
            date_taken,
            uploaded_at: self.clock.now(),
            status: UploadStatus::Active,
        }
    }

    /// Run accumulated undo actions in reverse. Each action's own failure
    /// is logged and swallowed; rollback is best-effort.
    fn run_compensations(&self, compensations: Vec<Compensation>) {
        for compensation in compensations.into_iter().rev() {
            let result = match &compensation {
                Compensation::DeleteUploadRecord(id) => self.uploads.delete(*id),
                Compensation::DestroyHostedObject(object_id) => {
                    self.host.destroy(object_id).map(|_| ())
                }
                Compensation::StripPhotosByUrl {
                    park_slug,
                    campsite_slug,
                    object_ids,
                } => self.strip_photos(park_slug, campsite_slug.as_deref(), object_ids),
            };
            if let Err(err) = result {
                warn!("upload compensation step failed: {err:#}");
            }
        }
    }

    fn strip_photos(
        &self,
        park_slug: &str,
        campsite_slug: Option<&str>,
        object_ids: &[String],
    ) -> Result<()> {
        let mut park = self
            .store
            .find_park(park_slug)?
            .ok_or_else(|| anyhow!("park missing during compensation"))?;
        let target = park::resolve_target(&park, campsite_slug)
            .ok_or_else(|| anyhow!("target missing during compensation"))?;
        if let Some(photos) = target.photos_mut(&mut park) {
            photos.retain(|p| {
                !object_ids
                    .iter()
                    .any(|id| p.url.contains(&format!("/{id}")))
            });
        }
        self.store.save_park(&mut park)
    }
}

fn pluralize(n: usize, word: &str) -> String {
    if n == 1 {
        word.to_string()
    } else {
        format!("{word}s")
    }
}
