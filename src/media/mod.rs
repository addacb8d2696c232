//! Media contribution workflow: photo/video submission against a park or
//! campsite, quota enforcement, content validation, external hosting, audit
//! records, and compensating rollback on partial failure.

pub mod host;
pub mod service;
pub mod validate;

pub use host::{CloudHost, DestroyOutcome, HostedObject, MediaHost, UploadParams};
pub use service::{DeleteRequest, MediaService, PhotoReceipt, PhotoSubmission, VideoSubmission};
