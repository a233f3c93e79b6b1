//! HTTP clients for the OCR and Structure external collaborators named in
//! spec.md §6. Neither collaborator's own implementation is in scope; these
//! are narrow client adapters plus the retry/backoff policy of spec.md §5/§7.

pub mod ocr;
pub mod retry;
pub mod structure;
pub mod types;

pub use ocr::{HttpOcrClient, OcrCollaborator};
pub use structure::{HttpStructureClient, StructureCollaborator, extract_first_json_object};
