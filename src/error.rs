//! Domain error taxonomy for the media workflow.
//!
//! The HTTP layer that sits above this crate translates these into status
//! codes via `status_code()`. Search-cache failures never appear here: the
//! cache fails soft and degrades to an empty snapshot instead.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum MediaError {
    /// Bad input shape: missing fields, future dates, bad image metadata,
    /// malformed URLs. Never retried.
    #[error("{0}")]
    InvalidInput(String),

    /// The user has no remaining upload slots for this target.
    #[error("You have already uploaded {uploaded} {media} for this {scope}.")]
    QuotaExceeded {
        uploaded: usize,
        media: &'static str,
        scope: &'static str,
    },

    /// Unknown park, campsite, or media id.
    #[error("{0} not found")]
    NotFound(String),

    /// Caller is neither the media owner nor an admin.
    #[error("Not authorized")]
    Unauthorized,

    /// Media host or document store failure. Triggers compensating rollback
    /// in the upload path.
    #[error("Upload failed. Please try again.")]
    Upstream(#[source] anyhow::Error),
}

impl MediaError {
    pub fn status_code(&self) -> u16 {
        match self {
            MediaError::InvalidInput(_) => 400,
            MediaError::QuotaExceeded { .. } => 400,
            MediaError::NotFound(_) => 404,
            MediaError::Unauthorized => 403,
            MediaError::Upstream(_) => 500,
        }
    }
}

impl From<anyhow::Error> for MediaError {
    fn from(err: anyhow::Error) -> Self {
        MediaError::Upstream(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(MediaError::InvalidInput("x".into()).status_code(), 400);
        assert_eq!(
            MediaError::QuotaExceeded {
                uploaded: 2,
                media: "photos",
                scope: "park"
            }
            .status_code(),
            400
        );
        assert_eq!(MediaError::NotFound("Park".into()).status_code(), 404);
        assert_eq!(MediaError::Unauthorized.status_code(), 403);
        assert_eq!(
            MediaError::Upstream(anyhow::anyhow!("boom")).status_code(),
            500
        );
    }

    #[test]
    fn test_quota_message_names_scope() {
        let err = MediaError::QuotaExceeded {
            uploaded: 5,
            media: "photos",
            scope: "campsite",
        };
        assert_eq!(
            err.to_string(),
            "You have already uploaded 5 photos for this campsite."
        );
    }
}
