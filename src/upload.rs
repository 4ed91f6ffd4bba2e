use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// External media store. Takes a base64 data URI, returns a durable URL.
/// The core treats this as an opaque network call with no retry logic.
#[async_trait]
pub trait MediaUploader: Send + Sync {
    async fn upload(&self, data_uri: &str) -> Result<String, AppError>;
}

#[derive(Debug, Serialize)]
struct UploadRequest<'a> {
    file: &'a str,
    folder: &'a str,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    secure_url: String,
}

/// HTTP implementation posting the payload to the configured media
/// service endpoint.
pub struct HttpMediaUploader {
    client: reqwest::Client,
    endpoint: String,
    folder: String,
}

impl HttpMediaUploader {
    pub fn new(endpoint: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint,
            folder: "campaigns".to_string(),
        }
    }
}

#[async_trait]
impl MediaUploader for HttpMediaUploader {
    async fn upload(&self, data_uri: &str) -> Result<String, AppError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&UploadRequest {
                file: data_uri,
                folder: &self.folder,
            })
            .send()
            .await
            .map_err(|err| AppError::Upload(err.to_string()))?;

        if !response.status().is_success() {
            tracing::error!("media service rejected upload: {}", response.status());
            return Err(AppError::Upload(format!(
                "media service returned {}",
                response.status()
            )));
        }

        let body: UploadResponse = response
            .json()
            .await
            .map_err(|err| AppError::Upload(err.to_string()))?;

        Ok(body.secure_url)
    }
}

/// Wraps raw base64 image bytes into the data URI the media service expects.
pub fn to_data_uri(base64: &str) -> String {
    format!("data:image/jpeg;base64,{base64}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_uri_carries_the_jpeg_prefix() {
        assert_eq!(
            to_data_uri("aGVsbG8="),
            "data:image/jpeg;base64,aGVsbG8="
        );
    }

    #[test]
    fn upload_response_parses_secure_url() {
        let body: UploadResponse =
            serde_json::from_str(r#"{"secure_url":"https://cdn.example/x.jpg","bytes":123}"#)
                .unwrap();
        assert_eq!(body.secure_url, "https://cdn.example/x.jpg");
    }
}
