//! Input validation for media submissions. Everything here runs before any
//! store or host write happens.

use std::io::Cursor;
use std::sync::OnceLock;

use chrono::{DateTime, Duration, Utc};
use image::ImageReader;
use regex::Regex;

use crate::clock::Clock;
use crate::error::MediaError;

pub const MIN_DIMENSION: u32 = 700;
pub const MAX_PHOTO_BYTES: usize = 10 * 1024 * 1024;
pub const MAX_BATCH: usize = 5;
pub const MAX_ASPECT_RATIO: f64 = 3.0;
/// Slack allowed on date-taken values, for clients in later time zones.
pub const FUTURE_SLACK_HOURS: i64 = 1;

/// Check one payload: decodable, at least 700px on both sides, aspect ratio
/// within [1/3, 3], at most 10 MiB.
pub fn validate_image(bytes: &[u8]) -> Result<(), MediaError> {
    let dimensions = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .ok()
        .and_then(|reader| reader.into_dimensions().ok());

    let (w, h) = match dimensions {
        Some(dims) => dims,
        None => {
            return Err(MediaError::InvalidInput(
                "Invalid or unreadable image for at least one image.".to_string(),
            ))
        }
    };

    if w < MIN_DIMENSION || h < MIN_DIMENSION {
        return Err(MediaError::InvalidInput(format!(
            "Images must be at least {MIN_DIMENSION}px in width and height - \
             please only select better images. No images were uploaded."
        )));
    }

    let ratio = w as f64 / h as f64;
    if ratio > MAX_ASPECT_RATIO || ratio < 1.0 / MAX_ASPECT_RATIO {
        return Err(MediaError::InvalidInput(
            "Image aspect ratio is too extreme (panorama or ultra-vertical). \
             Upload a normal photo. No images were uploaded."
                .to_string(),
        ));
    }

    if bytes.len() > MAX_PHOTO_BYTES {
        return Err(MediaError::InvalidInput(
            "Image file size exceeds 10MB.".to_string(),
        ));
    }

    Ok(())
}

/// All-or-nothing gate: every payload must pass before any upload begins.
pub fn validate_batch(files: &[Vec<u8>]) -> Result<(), MediaError> {
    for file in files {
        validate_image(file)?;
    }
    Ok(())
}

/// Date-taken values may not sit more than an hour in the future.
pub fn ensure_not_future(clock: &dyn Clock, date_taken: DateTime<Utc>) -> Result<(), MediaError> {
    if date_taken > clock.now() + Duration::hours(FUTURE_SLACK_HOURS) {
        return Err(MediaError::InvalidInput(
            "Date cannot be in the future.".to_string(),
        ));
    }
    Ok(())
}

pub fn ensure_caption_length(caption: &str) -> Result<(), MediaError> {
    if caption.chars().count() > crate::park::MAX_CAPTION_CHARS {
        return Err(MediaError::InvalidInput(
            "Caption must be 50 characters or fewer.".to_string(),
        ));
    }
    Ok(())
}

/// Accepts the usual YouTube link shapes (watch, embed, short links,
/// shorts) with an 11-character video id.
pub fn is_youtube_url(url: &str) -> bool {
    static YT: OnceLock<Regex> = OnceLock::new();
    let re = YT.get_or_init(|| {
        Regex::new(
            r"^(https?://)?(www\.)?(youtube\.com|youtu\.be)/(watch\?v=|embed/|v/|shorts/)?[A-Za-z0-9_-]{11}",
        )
        .expect("youtube pattern is valid")
    });
    re.is_match(url)
}

#[cfg(test)]
pub(crate) mod test_images {
    use std::io::Cursor;

    /// Solid PNG of the given size, encoded in memory.
    pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = image::RgbaImage::new(width, height);
        let mut buf = Cursor::new(Vec::new());
        image::DynamicImage::ImageRgba8(img)
            .write_to(&mut buf, image::ImageFormat::Png)
            .unwrap();
        buf.into_inner()
    }
}
