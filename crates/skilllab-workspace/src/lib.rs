//! Output-root filesystem layout (spec.md §6 Filesystem layout, §5 Shared
//! resources).
//!
//! Each subsystem directory is owned by exactly one writer; this type is the
//! single place that knows the directory names so step implementations
//! never hardcode a path fragment.

use camino::{Utf8Path, Utf8PathBuf};
use skilllab_errors::{Result, SkillLabError};

#[derive(Debug, Clone)]
pub struct Workspace {
    root: Utf8PathBuf,
}

impl Workspace {
    /// Creates all subsystem directories under `root` if absent.
    pub fn ensure(root: impl Into<Utf8PathBuf>) -> Result<Self> {
        let root = root.into();
        let ws = Self { root };
        for dir in [
            ws.images_dir(),
            ws.ocr_results_dir(),
            ws.json_results_dir(),
            ws.validated_json_dir(),
            ws.donut_dataset_dir(),
        ] {
            std::fs::create_dir_all(&dir).map_err(|e| SkillLabError::IoFailure {
                path: dir.clone().into_std_path_buf(),
                source: e,
            })?;
        }
        Ok(ws)
    }

    #[must_use]
    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    #[must_use]
    pub fn images_dir(&self) -> Utf8PathBuf {
        self.root.join("images")
    }

    #[must_use]
    pub fn ocr_results_dir(&self) -> Utf8PathBuf {
        self.root.join("ocr_results")
    }

    #[must_use]
    pub fn json_results_dir(&self) -> Utf8PathBuf {
        self.root.join("json_results")
    }

    #[must_use]
    pub fn validated_json_dir(&self) -> Utf8PathBuf {
        self.root.join("validated_json")
    }

    #[must_use]
    pub fn donut_dataset_dir(&self) -> Utf8PathBuf {
        self.root.join("donut_dataset")
    }

    #[must_use]
    pub fn donut_split_dir(&self, split: &str) -> Utf8PathBuf {
        self.donut_dataset_dir().join(split)
    }

    #[must_use]
    pub fn donut_index_file(&self, split: &str) -> Utf8PathBuf {
        self.donut_dataset_dir().join(format!("{split}_index.txt"))
    }

    #[must_use]
    pub fn image_path(&self, doc_id: &str, page: u32) -> Utf8PathBuf {
        self.images_dir().join(format!("{doc_id}_page_{page}.png"))
    }

    #[must_use]
    pub fn ocr_result_path(&self, doc_id: &str) -> Utf8PathBuf {
        self.ocr_results_dir().join(format!("{doc_id}_ocr.json"))
    }

    #[must_use]
    pub fn structured_path(&self, doc_id: &str) -> Utf8PathBuf {
        self.json_results_dir()
            .join(format!("{doc_id}_structured.json"))
    }

    #[must_use]
    pub fn validated_path(&self, doc_id: &str) -> Utf8PathBuf {
        self.validated_json_dir()
            .join(format!("{doc_id}_validated.json"))
    }

    /// Normalizes a container-absolute path returned by the OCR collaborator
    /// into a path relative to the workspace root, stripping a leading
    /// `/app/` prefix (spec.md §6 OCR collaborator).
    #[must_use]
    pub fn normalize_service_path(path: &str) -> String {
        path.strip_prefix("/app/").unwrap_or(path).to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ensure_creates_all_subsystem_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
        let ws = Workspace::ensure(root).unwrap();
        assert!(ws.images_dir().exists());
        assert!(ws.validated_json_dir().exists());
        assert!(ws.donut_dataset_dir().exists());
    }

    #[test]
    fn normalizes_app_prefixed_paths() {
        assert_eq!(
            Workspace::normalize_service_path("/app/images/alice_page_0.png"),
            "images/alice_page_0.png"
        );
        assert_eq!(
            Workspace::normalize_service_path("images/alice_page_0.png"),
            "images/alice_page_0.png"
        );
    }
}
