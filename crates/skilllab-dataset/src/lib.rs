//! Dataset Builder (spec.md §4.8, C9): builds a Donut-style training
//! dataset from validated records and their page images.
//!
//! Grounded on `training/dataset_builder.py`'s `DonutDatasetBuilder`: same
//! flattening shape, same `<s_docvqa><s_<task>>...<s_answer>...</s_answer></s>`
//! wrapper, same train/validation split-then-copy-then-index structure,
//! reworked into deterministic, seeded Rust using `image` for JPEG
//! re-encoding and `rand`'s seedable PRNG in place of Python's global
//! `random.shuffle`.

use image::ImageReader;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::Serialize;
use skilllab_errors::{Result, SkillLabError};
use skilllab_types::{ResumeRecord, ValidatedRecord};
use skilllab_workspace::Workspace;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

#[derive(Debug, Clone, Default)]
pub struct DatasetStats {
    pub total_files: u32,
    pub valid_samples: u32,
    pub train_samples: u32,
    pub val_samples: u32,
    pub multi_page_samples: u32,
    pub single_page_samples: u32,
}

#[derive(Serialize)]
struct DonutMetadata {
    gt_parse: String,
    image_path: String,
    task_prompt: String,
}

/// Flattens a record into the fixed textual representation Donut trains
/// against (spec.md §4.8 step 2).
#[must_use]
pub fn format_record_for_donut(record: &ResumeRecord) -> String {
    let mut lines = Vec::new();

    if let Some(name) = &record.name {
        lines.push(format!("Name: {name}"));
    }
    if let Some(email) = &record.email {
        lines.push(format!("Email: {email}"));
    }
    if let Some(phone) = &record.phone {
        lines.push(format!("Phone: {phone}"));
    }
    if let Some(position) = &record.current_position {
        lines.push(format!("Current_Position: {position}"));
    }
    if !record.skills.is_empty() {
        lines.push(format!("Skills: {}", record.skills.join(", ")));
    }
    if !record.experience.is_empty() {
        lines.push("Experience:".to_string());
        for entry in &record.experience {
            lines.push(format!("  - {}, {}, {}", entry.company, entry.title, entry.years));
        }
    }

    lines.join("\n")
}

fn task_prompt(task_name: &str) -> String {
    format!("<s_docvqa><s_{task_name}>")
}

fn wrap_answer(flattened: &str) -> String {
    format!("<s_answer>{flattened}</s_answer></s>")
}

struct Sample {
    doc_id: String,
    formatted: String,
    image_paths: Vec<PathBuf>,
}

fn load_sample(validated_file: &Path, workspace_root: &Path) -> Option<Sample> {
    let text = std::fs::read_to_string(validated_file).ok()?;
    let record: ValidatedRecord = serde_json::from_str(&text).ok()?;
    if !record.validation.is_valid {
        return None;
    }
    if record.image_paths.is_empty() {
        warn!(file = %validated_file.display(), "validated record has no image paths, skipping");
        return None;
    }

    let doc_id = validated_file
        .file_stem()?
        .to_str()?
        .strip_suffix("_validated")?
        .to_string();

    let image_paths = record
        .image_paths
        .iter()
        .map(|p| workspace_root.join(Workspace::normalize_service_path(p)))
        .collect();

    Some(Sample {
        doc_id,
        formatted: format_record_for_donut(&record.record),
        image_paths,
    })
}

/// Copies and re-encodes `sample`'s page images as JPEGs into `output_dir`,
/// naming them `<doc_id>.jpg` for a single page or `<doc_id>_<i>.jpg` for
/// multiple (spec.md §4.8 step 4).
fn copy_and_convert_images(sample: &Sample, output_dir: &Path, jpeg_quality: u8) -> Vec<PathBuf> {
    let multi_page = sample.image_paths.len() > 1;
    let mut converted = Vec::new();
    for (i, source) in sample.image_paths.iter().enumerate() {
        if !source.exists() {
            warn!(path = %source.display(), "referenced image not found, skipping page");
            continue;
        }
        let filename = if multi_page {
            format!("{}_{i}.jpg", sample.doc_id)
        } else {
            format!("{}.jpg", sample.doc_id)
        };
        let target = output_dir.join(&filename);
        match convert_to_jpeg(source, &target, jpeg_quality) {
            Ok(()) => converted.push(target),
            Err(err) => warn!(path = %source.display(), %err, "failed to convert image"),
        }
    }
    converted
}

fn convert_to_jpeg(source: &Path, target: &Path, quality: u8) -> Result<()> {
    let image = ImageReader::open(source)
        .map_err(|e| SkillLabError::IoFailure {
            path: source.to_path_buf(),
            source: e,
        })?
        .decode()
        .map_err(|e| SkillLabError::SchemaFailure {
            detail: format!("could not decode image {}: {e}", source.display()),
        })?;
    let rgb = image.to_rgb8();
    let mut file = std::fs::File::create(target).map_err(|e| SkillLabError::IoFailure {
        path: target.to_path_buf(),
        source: e,
    })?;
    let mut encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut file, quality);
    encoder
        .encode(rgb.as_raw(), rgb.width(), rgb.height(), image::ExtendedColorType::Rgb8)
        .map_err(|e| SkillLabError::SchemaFailure {
            detail: format!("could not encode jpeg for {}: {e}", target.display()),
        })?;
    Ok(())
}

/// Writes `<doc_id>.json` sidecar metadata for one training/validation
/// sample, training using only the first page's image (spec.md §4.8 step 5,
/// documented limitation carried over from the original).
fn save_sidecar(doc_id: &str, first_image: &Path, formatted: &str, task_name: &str, output_dir: &Path) -> Result<PathBuf> {
    let metadata = DonutMetadata {
        gt_parse: wrap_answer(formatted),
        image_path: first_image
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default(),
        task_prompt: task_prompt(task_name),
    };
    let path = output_dir.join(format!("{doc_id}.json"));
    let body = serde_json::to_string_pretty(&metadata)?;
    std::fs::write(&path, body).map_err(|e| SkillLabError::IoFailure {
        path: path.clone(),
        source: e,
    })?;
    Ok(path)
}

/// Appends one filename to `split`'s index file, skipping it if already
/// present (spec.md §4.8 recycle-to-training: "index append MUST be
/// idempotent").
fn append_to_index(index_path: &Path, filename: &str) -> Result<()> {
    let existing = std::fs::read_to_string(index_path).unwrap_or_default();
    if existing.lines().any(|line| line == filename) {
        return Ok(());
    }
    let mut content = existing;
    if !content.is_empty() && !content.ends_with('\n') {
        content.push('\n');
    }
    content.push_str(filename);
    content.push('\n');
    std::fs::write(index_path, content).map_err(|e| SkillLabError::IoFailure {
        path: index_path.to_path_buf(),
        source: e,
    })
}

fn rewrite_index(index_path: &Path, filenames: &[String]) -> Result<()> {
    let body = filenames
        .iter()
        .map(|f| format!("{f}\n"))
        .collect::<String>();
    std::fs::write(index_path, body).map_err(|e| SkillLabError::IoFailure {
        path: index_path.to_path_buf(),
        source: e,
    })
}

/// Builds the full dataset from `workspace`'s `validated_json/` area
/// (spec.md §4.8 steps 1-6).
pub fn build_dataset(
    workspace: &Workspace,
    train_val_split: f64,
    task_name: &str,
    jpeg_quality: u8,
    shuffle_seed: u64,
) -> Result<DatasetStats> {
    let mut stats = DatasetStats::default();

    let validated_dir = workspace.validated_json_dir();
    if !validated_dir.exists() {
        return Ok(stats);
    }

    let mut files: Vec<PathBuf> = std::fs::read_dir(&validated_dir)
        .map_err(|e| SkillLabError::IoFailure {
            path: validated_dir.clone().into_std_path_buf(),
            source: e,
        })?
        .filter_map(std::result::Result::ok)
        .map(|e| e.path())
        .filter(|p| p.extension().and_then(|e| e.to_str()) == Some("json"))
        .collect();
    files.sort();
    stats.total_files = files.len() as u32;

    let mut samples: Vec<Sample> = files
        .drain(..)
        .filter_map(|f| load_sample(&f, workspace.root().as_std_path()))
        .collect();
    stats.valid_samples = samples.len() as u32;

    let mut rng = StdRng::seed_from_u64(shuffle_seed);
    samples.shuffle(&mut rng);

    let split_idx = (samples.len() as f64 * train_val_split) as usize;
    let val_samples = samples.split_off(split_idx);
    let train_samples = samples;

    stats.train_samples = train_samples.len() as u32;
    stats.val_samples = val_samples.len() as u32;

    let train_filenames = process_split(
        &train_samples,
        workspace.donut_split_dir("train").as_std_path(),
        task_name,
        jpeg_quality,
        &mut stats,
    )?;
    let val_filenames = process_split(
        &val_samples,
        workspace.donut_split_dir("validation").as_std_path(),
        task_name,
        jpeg_quality,
        &mut stats,
    )?;

    rewrite_index(workspace.donut_index_file("train").as_std_path(), &train_filenames)?;
    rewrite_index(
        workspace.donut_index_file("validation").as_std_path(),
        &val_filenames,
    )?;

    info!(
        train = stats.train_samples,
        validation = stats.val_samples,
        "dataset build complete"
    );
    Ok(stats)
}

/// Writes each sample's images and sidecar, returning the sidecar filenames
/// in the order the samples were given (spec.md §4.8 step 6: the index file
/// lists samples in insertion order, not sorted by name).
fn process_split(
    samples: &[Sample],
    output_dir: &Path,
    task_name: &str,
    jpeg_quality: u8,
    stats: &mut DatasetStats,
) -> Result<Vec<String>> {
    std::fs::create_dir_all(output_dir).map_err(|e| SkillLabError::IoFailure {
        path: output_dir.to_path_buf(),
        source: e,
    })?;
    let mut filenames = Vec::with_capacity(samples.len());
    for sample in samples {
        if sample.image_paths.len() > 1 {
            stats.multi_page_samples += 1;
        } else {
            stats.single_page_samples += 1;
        }

        let converted = copy_and_convert_images(sample, output_dir, jpeg_quality);
        let Some(first) = converted.first() else {
            warn!(doc_id = %sample.doc_id, "no images converted, skipping sample");
            continue;
        };
        let sidecar = save_sidecar(&sample.doc_id, first, &sample.formatted, task_name, output_dir)?;
        if let Some(name) = sidecar.file_name() {
            filenames.push(name.to_string_lossy().to_string());
        }
    }
    Ok(filenames)
}

/// Recycles a single approved document straight into `train/` without
/// rebuilding the whole dataset (spec.md §4.9 recycle-to-training).
pub fn recycle_approved_document(
    workspace: &Workspace,
    doc_id: &str,
    record: &ResumeRecord,
    image_paths: &[String],
    task_name: &str,
    jpeg_quality: u8,
) -> Result<()> {
    let sample = Sample {
        doc_id: doc_id.to_string(),
        formatted: format_record_for_donut(record),
        image_paths: image_paths
            .iter()
            .map(|p| workspace.root().as_std_path().join(Workspace::normalize_service_path(p)))
            .collect(),
    };
    let train_dir = workspace.donut_split_dir("train");
    std::fs::create_dir_all(train_dir.as_std_path()).map_err(|e| SkillLabError::IoFailure {
        path: train_dir.clone().into_std_path_buf(),
        source: e,
    })?;
    let converted = copy_and_convert_images(&sample, train_dir.as_std_path(), jpeg_quality);
    let Some(first) = converted.first() else {
        return Err(SkillLabError::SchemaFailure {
            detail: format!("no images available to recycle document '{doc_id}'"),
        });
    };
    save_sidecar(doc_id, first, &sample.formatted, task_name, train_dir.as_std_path())?;
    append_to_index(
        workspace.donut_index_file("train").as_std_path(),
        &format!("{doc_id}.json"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino::Utf8PathBuf;
    use skilllab_types::{ExperienceEntry, ValidationBlock};

    fn make_png(path: &Path) {
        let img = image::RgbImage::new(4, 4);
        img.save(path).unwrap();
    }

    fn write_validated(dir: &Path, doc_id: &str, is_valid: bool, image_rel: &str) {
        let record = ValidatedRecord {
            record: ResumeRecord {
                name: Some("Alice".into()),
                email: Some("alice@example.com".into()),
                phone: Some("555-0100".into()),
                current_position: Some("Engineer".into()),
                skills: vec!["Rust".into()],
                experience: vec![ExperienceEntry {
                    company: "Acme".into(),
                    title: "SE".into(),
                    years: "2020-2024".into(),
                }],
            },
            validation: ValidationBlock {
                is_valid,
                coverage: 0.95,
                correction_attempts: 0,
                structure_valid: true,
            },
            image_paths: vec![image_rel.to_string()],
        };
        std::fs::write(
            dir.join(format!("{doc_id}_validated.json")),
            serde_json::to_string(&record).unwrap(),
        )
        .unwrap();
    }

    #[test]
    fn flattens_record_in_declared_field_order() {
        let record = ResumeRecord {
            name: Some("Alice".into()),
            email: Some("alice@x.com".into()),
            phone: None,
            current_position: None,
            skills: vec!["Rust".into(), "Go".into()],
            experience: vec![ExperienceEntry {
                company: "Acme".into(),
                title: "SE".into(),
                years: "2020".into(),
            }],
        };
        let text = format_record_for_donut(&record);
        let name_idx = text.find("Name: Alice").unwrap();
        let email_idx = text.find("Email:").unwrap();
        let skills_idx = text.find("Skills:").unwrap();
        let experience_idx = text.find("Experience:").unwrap();
        assert!(name_idx < email_idx && email_idx < skills_idx && skills_idx < experience_idx);
        assert!(text.contains("- Acme, SE, 2020"));
    }

    #[test]
    fn builds_dataset_with_images_and_index() {
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
        let workspace = Workspace::ensure(root).unwrap();

        make_png(workspace.image_path("alice", 0).as_std_path());
        write_validated(workspace.validated_json_dir().as_std_path(), "alice", true, "images/alice_page_0.png");

        let stats = build_dataset(&workspace, 1.0, "resume_extraction", 90, 42).unwrap();
        assert_eq!(stats.valid_samples, 1);
        assert_eq!(stats.train_samples, 1);

        let train_dir = workspace.donut_split_dir("train");
        assert!(train_dir.join("alice.jpg").exists());
        assert!(train_dir.join("alice.json").exists());
        let index = std::fs::read_to_string(workspace.donut_index_file("train")).unwrap();
        assert!(index.contains("alice.json"));
    }

    #[test]
    fn index_lists_samples_in_processing_order_not_sorted() {
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
        let workspace = Workspace::ensure(root).unwrap();

        // Deliberately out of alphabetical order, to prove the index mirrors
        // this order rather than sorting by filename.
        let doc_ids = ["zeta", "alpha", "mid"];
        let mut samples = Vec::new();
        for doc_id in doc_ids {
            make_png(workspace.image_path(doc_id, 0).as_std_path());
            let image_path = workspace.root().as_std_path().join(format!("images/{doc_id}_page_0.png"));
            samples.push(Sample {
                doc_id: doc_id.to_string(),
                formatted: "Name: Alice".into(),
                image_paths: vec![image_path],
            });
        }

        let mut stats = DatasetStats::default();
        let train_dir = workspace.donut_split_dir("train");
        let filenames = process_split(&samples, train_dir.as_std_path(), "resume_extraction", 90, &mut stats).unwrap();

        assert_eq!(filenames, vec!["zeta.json", "alpha.json", "mid.json"]);
    }

    #[test]
    fn skips_invalid_samples() {
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
        let workspace = Workspace::ensure(root).unwrap();

        make_png(workspace.image_path("bob", 0).as_std_path());
        write_validated(workspace.validated_json_dir().as_std_path(), "bob", false, "images/bob_page_0.png");

        let stats = build_dataset(&workspace, 0.8, "resume_extraction", 90, 42).unwrap();
        assert_eq!(stats.total_files, 1);
        assert_eq!(stats.valid_samples, 0);
    }

    #[test]
    fn recycle_append_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
        let workspace = Workspace::ensure(root).unwrap();
        make_png(workspace.image_path("carl", 0).as_std_path());

        let record = ResumeRecord {
            name: Some("Carl".into()),
            ..Default::default()
        };
        recycle_approved_document(&workspace, "carl", &record, &["images/carl_page_0.png".into()], "resume_extraction", 90).unwrap();
        recycle_approved_document(&workspace, "carl", &record, &["images/carl_page_0.png".into()], "resume_extraction", 90).unwrap();

        let index = std::fs::read_to_string(workspace.donut_index_file("train")).unwrap();
        assert_eq!(index.lines().filter(|l| *l == "carl.json").count(), 1);
    }
}
