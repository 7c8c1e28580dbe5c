use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::debug;

use crate::{DeleteOutcome, ImageStore, ImageStoreError, UploadConstraints};

#[derive(Debug, Deserialize)]
struct UploadResponse {
    url: String,
}

/// reqwest-backed [`ImageStore`] talking to the hosting service's REST API.
///
/// Every call carries the client-level timeout; a stalled upstream surfaces
/// as [`ImageStoreError::Timeout`] instead of hanging the request.
pub struct HttpImageStore {
    client: Client,
    base_url: String,
    api_key: String,
}

impl HttpImageStore {
    pub fn new(base_url: &str, api_key: &str, timeout: Duration) -> Result<Self, ImageStoreError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(ImageStoreError::Transport)?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }
}

#[async_trait]
impl ImageStore for HttpImageStore {
    async fn upload(
        &self,
        payload: &str,
        constraints: UploadConstraints,
    ) -> Result<String, ImageStoreError> {
        let resp = self
            .client
            .post(format!("{}/v1/images", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&serde_json::json!({
                "data": payload,
                "max_width": constraints.max_width,
                "max_height": constraints.max_height,
                "quality": constraints.quality,
            }))
            .send()
            .await
            .map_err(classify)?;

        if !resp.status().is_success() {
            return Err(ImageStoreError::Rejected {
                status: resp.status().as_u16(),
            });
        }

        let body: UploadResponse = resp.json().await.map_err(ImageStoreError::MalformedResponse)?;
        debug!("Uploaded image: {}", body.url);
        Ok(body.url)
    }

    async fn delete(&self, reference: &str) -> Result<DeleteOutcome, ImageStoreError> {
        let id = public_id(reference)?;

        let resp = self
            .client
            .delete(format!("{}/v1/images/{}", self.base_url, id))
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(classify)?;

        match resp.status() {
            StatusCode::NOT_FOUND => Ok(DeleteOutcome::AlreadyAbsent),
            s if s.is_success() => Ok(DeleteOutcome::Deleted),
            s => Err(ImageStoreError::Rejected { status: s.as_u16() }),
        }
    }
}

fn classify(err: reqwest::Error) -> ImageStoreError {
    if err.is_timeout() {
        ImageStoreError::Timeout
    } else {
        ImageStoreError::Transport(err)
    }
}

/// The store addresses images by the last path segment of the reference,
/// minus any file extension.
fn public_id(reference: &str) -> Result<&str, ImageStoreError> {
    let last = reference.rsplit('/').next().unwrap_or(reference);
    let id = last.split('.').next().unwrap_or(last);

    if id.is_empty() {
        return Err(ImageStoreError::InvalidReference(reference.to_string()));
    }
    Ok(id)
}

#[cfg(test)]
mod tests {
    use super::public_id;

    #[test]
    fn public_id_strips_path_and_extension() {
        assert_eq!(
            public_id("https://img.example/folder/abc123.jpg").unwrap(),
            "abc123"
        );
        assert_eq!(public_id("https://img.example/abc123").unwrap(), "abc123");
        assert_eq!(public_id("abc123.png").unwrap(), "abc123");
    }

    #[test]
    fn public_id_rejects_empty() {
        assert!(public_id("").is_err());
        assert!(public_id("https://img.example/folder/").is_err());
    }
}
