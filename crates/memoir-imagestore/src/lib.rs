/// Gateway to the external image-hosting service.
///
/// The service stores uploaded images durably and hands back a public URL
/// (the "reference"). References live in the database; the bytes never do.
pub mod http;

pub use http::HttpImageStore;

use async_trait::async_trait;
use thiserror::Error;

/// Server-side transformation hints forwarded with each upload.
#[derive(Debug, Clone, Copy)]
pub struct UploadConstraints {
    pub max_width: u32,
    pub max_height: u32,
    pub quality: &'static str,
}

/// Profile avatars are normalized small.
pub const AVATAR_CONSTRAINTS: UploadConstraints = UploadConstraints {
    max_width: 300,
    max_height: 300,
    quality: "auto",
};

/// Diary entry photos keep more detail.
pub const ENTRY_CONSTRAINTS: UploadConstraints = UploadConstraints {
    max_width: 800,
    max_height: 600,
    quality: "auto:good",
};

#[derive(Debug, Error)]
pub enum ImageStoreError {
    #[error("image store request timed out")]
    Timeout,
    #[error("image store request failed: {0}")]
    Transport(#[source] reqwest::Error),
    #[error("image store rejected the request with status {status}")]
    Rejected { status: u16 },
    #[error("malformed image store response: {0}")]
    MalformedResponse(#[source] reqwest::Error),
    #[error("invalid image reference: {0}")]
    InvalidReference(String),
}

/// What happened to a reference on delete. Callers that clean up
/// best-effort log hard errors and move on; callers that require the
/// delete propagate them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    AlreadyAbsent,
}

#[async_trait]
pub trait ImageStore: Send + Sync {
    /// Upload a base64 image payload; returns the durable reference.
    async fn upload(
        &self,
        payload: &str,
        constraints: UploadConstraints,
    ) -> Result<String, ImageStoreError>;

    /// Delete a previously uploaded reference. Unknown references are
    /// reported as [`DeleteOutcome::AlreadyAbsent`], not as errors.
    async fn delete(&self, reference: &str) -> Result<DeleteOutcome, ImageStoreError>;
}
