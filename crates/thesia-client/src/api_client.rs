use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Serialize;
use serde_json::Value;

use thesia_core::errors::ApiError;
use thesia_core::models::{
    ArchitectureRequest, ChapterReviewRequest, FullChapterRequest, ProfileRequest,
    ResourceRequest, StructureRequest, TextRequest, VersionsRequest, ViabilityRequest,
};
use thesia_core::{AiBackend, ThesiaConfig};

/// HTTP client for the ThesIA AI backend
pub struct ThesisApiClient {
    base_url: String,
    client: reqwest::Client,
    timeout: Duration,
}

impl ThesisApiClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
            // Generation endpoints wait on the upstream model.
            timeout: Duration::from_secs(120),
        }
    }

    pub fn from_config(config: &ThesiaConfig) -> Self {
        Self::new(config.api_base_url.clone())
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn post_json<T: Serialize + ?Sized>(&self, path: &str, body: &T) -> Result<Value, ApiError> {
        log::debug!("POST {}", path);
        let response = self
            .client
            .post(self.url(path))
            .header("Content-Type", "application/json")
            .timeout(self.timeout)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                log::error!("Request to {} failed: {}", path, e);
                ApiError::from(e)
            })?;

        read_response(path, response).await
    }

    async fn post_file(&self, path: &str, file_name: &str, bytes: Vec<u8>) -> Result<Value, ApiError> {
        log::debug!("POST {} ({}, {} bytes)", path, file_name, bytes.len());
        let part = Part::bytes(bytes)
            .file_name(file_name.to_string())
            .mime_str("application/pdf")
            .map_err(|e| ApiError::InvalidRequest(e.to_string()))?;
        let form = Form::new().part("file", part);

        let response = self
            .client
            .post(self.url(path))
            .timeout(self.timeout)
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                log::error!("Upload to {} failed: {}", path, e);
                ApiError::from(e)
            })?;

        read_response(path, response).await
    }
}

async fn read_response(path: &str, response: reqwest::Response) -> Result<Value, ApiError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        let err = ApiError::from_response(status.as_u16(), &body);
        log::error!("{} returned {}: {}", path, status, err);
        return Err(err);
    }

    let body: Value = response.json().await?;
    if let Some(err) = ApiError::from_success_body(&body) {
        log::error!("{} reported a failure: {}", path, err);
        return Err(err);
    }

    Ok(body)
}

#[async_trait]
impl AiBackend for ThesisApiClient {
    async fn health_check(&self) -> Result<(), ApiError> {
        let response = self
            .client
            .get(self.url("/health"))
            .timeout(self.timeout)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::from_response(status.as_u16(), &body));
        }

        Ok(())
    }

    async fn validate_profile(&self, request: &ProfileRequest) -> Result<Value, ApiError> {
        self.post_json("/profile/validate", request).await
    }

    async fn evaluate_viability(&self, request: &ViabilityRequest) -> Result<Value, ApiError> {
        self.post_json("/thesis/evaluate-viability", request).await
    }

    async fn analyze_regulations(&self, file_name: &str, bytes: Vec<u8>) -> Result<Value, ApiError> {
        self.post_file("/analyze/regulations", file_name, bytes).await
    }

    async fn extract_text(&self, file_name: &str, bytes: Vec<u8>) -> Result<Value, ApiError> {
        self.post_file("/analyze/extract-text", file_name, bytes).await
    }

    async fn generate_structure(&self, request: &StructureRequest) -> Result<Value, ApiError> {
        self.post_json("/thesis/generate-structure", request).await
    }

    async fn review_chapter_one(&self, request: &ChapterReviewRequest) -> Result<Value, ApiError> {
        self.post_json("/thesis/review-chapter-one", request).await
    }

    async fn expand_text(&self, text: &str) -> Result<Value, ApiError> {
        let request = TextRequest {
            text: text.to_string(),
        };
        self.post_json("/thesis/expand-text", &request).await
    }

    async fn analyze_writing(&self, text: &str) -> Result<Value, ApiError> {
        let request = TextRequest {
            text: text.to_string(),
        };
        self.post_json("/writing/analyze", &request).await
    }

    async fn generate_versions(
        &self,
        context_info: &str,
        style_request: &str,
    ) -> Result<Value, ApiError> {
        let request = VersionsRequest {
            context_info: context_info.to_string(),
            style_request: style_request.to_string(),
        };
        self.post_json("/writing/generate-versions", &request).await
    }

    async fn generate_full_chapter(&self, request: &FullChapterRequest) -> Result<Value, ApiError> {
        self.post_json("/writing/generate-full-chapter", request).await
    }

    async fn generate_architecture(&self, request: &ArchitectureRequest) -> Result<Value, ApiError> {
        self.post_json("/tech/generate-architecture", request).await
    }

    async fn estimate_resources(&self, request: &ResourceRequest) -> Result<Value, ApiError> {
        self.post_json("/tech/estimate-resources", request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_is_normalized() {
        let client = ThesisApiClient::new("http://localhost:8000/");
        assert_eq!(client.base_url(), "http://localhost:8000");
        assert_eq!(client.url("/health"), "http://localhost:8000/health");
    }
}
