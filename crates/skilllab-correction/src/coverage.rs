//! Coverage scoring and structural validation (spec.md §4.5).

use once_cell::sync::Lazy;
use regex::Regex;
use skilllab_types::ResumeRecord;
use std::collections::HashSet;

static NON_WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\w\s]").unwrap());

/// A post-normalization token with length > 2 that is not purely numeric
/// (spec.md GLOSSARY "Significant word").
fn significant_words(text: &str) -> HashSet<String> {
    let lowered = text.to_lowercase();
    let normalized = NON_WORD.replace_all(&lowered, " ");
    normalized
        .split_whitespace()
        .filter(|w| w.chars().count() > 2 && !w.chars().all(|c| c.is_ascii_digit()))
        .map(str::to_string)
        .collect()
}

/// Fraction of significant words from `source_text` that also appear in the
/// flattened JSON text of `record` (spec.md §4.5 `coverage_score`).
#[must_use]
pub fn coverage_score(record: &serde_json::Value, source_text: &str) -> f64 {
    let source_words = significant_words(source_text);
    if source_words.is_empty() {
        return 0.0;
    }
    let record_text = record.to_string();
    let record_words = significant_words(&record_text);
    let common = source_words.intersection(&record_words).count();
    common as f64 / source_words.len() as f64
}

/// Structural shape check (spec.md §4.5 `structure_valid`): all of
/// {Name, Email, Phone, Current_Position, Skills, Experience} present as
/// keys; Skills a list; Experience a list of objects each having
/// {company, title, years}.
#[must_use]
pub fn structure_valid(value: &serde_json::Value) -> bool {
    let Some(obj) = value.as_object() else {
        return false;
    };
    for key in ["Name", "Email", "Phone", "Current_Position", "Skills", "Experience"] {
        if !obj.contains_key(key) {
            return false;
        }
    }
    let Some(skills) = obj.get("Skills").and_then(|v| v.as_array()) else {
        return false;
    };
    let _ = skills;
    let Some(experience) = obj.get("Experience").and_then(|v| v.as_array()) else {
        return false;
    };
    experience.iter().all(|entry| {
        entry
            .as_object()
            .is_some_and(|e| ["company", "title", "years"].iter().all(|f| e.contains_key(*f)))
    })
}

/// `structure_valid` against the already-deserialized [`ResumeRecord`] shape;
/// deserialization itself enforces presence/list-ness of every field except
/// the per-entry shape of `Experience`, which serde already rejects at parse
/// time, so this is always true for a value that deserialized successfully.
#[must_use]
pub fn resume_record_structure_valid(_record: &ResumeRecord) -> bool {
    true
}
