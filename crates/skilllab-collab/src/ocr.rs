//! OCR collaborator client (spec.md §6: `POST /v1/ocr/process_pdf`,
//! `POST /v1/ocr/process_image`, `GET /health`).

use crate::retry::with_backoff;
use crate::types::{HealthResponse, OcrResponse};
use async_trait::async_trait;
use skilllab_config::OcrConfig;
use skilllab_errors::{Result, SkillLabError};
use std::time::Duration;

#[async_trait]
pub trait OcrCollaborator: Send + Sync {
    async fn process_pdf(&self, pdf_bytes: Vec<u8>, filename: &str) -> Result<OcrResponse>;
    async fn health(&self) -> Result<bool>;
}

pub struct HttpOcrClient {
    client: reqwest::Client,
    base_url: String,
    language: String,
    dpi: u32,
    min_confidence: f64,
    timeout: Duration,
    max_retries: u32,
}

impl HttpOcrClient {
    #[must_use]
    pub fn new(config: &OcrConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: config.service_url.clone(),
            language: config.language.clone(),
            dpi: config.dpi,
            min_confidence: config.min_confidence,
            timeout: Duration::from_millis(config.timeout_ms),
            max_retries: config.max_retries,
        }
    }
}

#[async_trait]
impl OcrCollaborator for HttpOcrClient {
    async fn process_pdf(&self, pdf_bytes: Vec<u8>, filename: &str) -> Result<OcrResponse> {
        let url = format!("{}/v1/ocr/process_pdf", self.base_url);
        let filename = filename.to_string();
        let result = with_backoff(self.max_retries, Duration::from_secs(60), || {
            let client = self.client.clone();
            let url = url.clone();
            let bytes = pdf_bytes.clone();
            let filename = filename.clone();
            let timeout = self.timeout;
            let language = self.language.clone();
            let dpi = self.dpi;
            let min_confidence = self.min_confidence;
            async move {
                let part = reqwest::multipart::Part::bytes(bytes)
                    .file_name(filename)
                    .mime_str("application/pdf")
                    .map_err(|e| SkillLabError::ServiceUnavailable {
                        service: "ocr".into(),
                        detail: e.to_string(),
                    })?;
                let form = reqwest::multipart::Form::new()
                    .text("language", language)
                    .text("dpi", dpi.to_string())
                    .text("min_confidence", min_confidence.to_string())
                    .part("file", part);

                let response = client
                    .post(&url)
                    .timeout(timeout)
                    .multipart(form)
                    .send()
                    .await
                    .map_err(|e| SkillLabError::ServiceUnavailable {
                        service: "ocr".into(),
                        detail: e.to_string(),
                    })?;

                if !response.status().is_success() {
                    return Err(SkillLabError::ServiceUnavailable {
                        service: "ocr".into(),
                        detail: format!("unexpected status {}", response.status()),
                    });
                }

                response
                    .json::<OcrResponse>()
                    .await
                    .map_err(SkillLabError::from)
            }
        })
        .await;

        result
    }

    async fn health(&self) -> Result<bool> {
        let url = format!("{}/health", self.base_url);
        let response = self
            .client
            .get(&url)
            .timeout(Duration::from_secs(5))
            .send()
            .await;
        match response {
            Ok(resp) if resp.status().is_success() => {
                let body: HealthResponse = resp.json().await.unwrap_or(HealthResponse {
                    status: "unknown".into(),
                });
                Ok(body.status == "healthy")
            }
            _ => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mean_confidence_of_empty_response_is_none() {
        use crate::types::OcrResponse;
        let resp = OcrResponse {
            file_id: "x".into(),
            page_count: 0,
            image_paths: vec![],
            page_results: vec![],
            combined_text: String::new(),
            processing_time: 0.0,
        };
        assert!(resp.mean_element_confidence().is_none());
    }
}
