//! Wire types for the OCR and Structure collaborators (spec.md §6).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoundingBox(pub [[f64; 2]; 4]);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextElement {
    pub text: String,
    pub bbox: BoundingBox,
    pub confidence: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageResult {
    pub text_elements: Vec<TextElement>,
    pub full_text: String,
    pub text_count: u32,
}

/// Response from `POST /v1/ocr/process_pdf` (spec.md §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OcrResponse {
    pub file_id: String,
    pub page_count: u32,
    pub image_paths: Vec<String>,
    pub page_results: Vec<PageResult>,
    pub combined_text: String,
    pub processing_time: f64,
}

impl OcrResponse {
    /// Mean confidence across every text element on every page, in [0,1].
    /// Returns `None` for a response with no text elements at all.
    #[must_use]
    pub fn mean_element_confidence(&self) -> Option<f64> {
        let mut total = 0.0;
        let mut count = 0usize;
        for page in &self.page_results {
            for element in &page.text_elements {
                total += element.confidence;
                count += 1;
            }
        }
        if count == 0 {
            None
        } else {
            Some(total / count as f64)
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
}

/// Request body for the Structure collaborator's `generate` call.
#[derive(Debug, Clone, Serialize)]
pub struct GenerateRequest {
    pub prompt: String,
    pub temperature: f64,
    pub max_tokens: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GenerateResponse {
    pub response: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModelInfo {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModelsResponse {
    pub models: Vec<ModelInfo>,
}
