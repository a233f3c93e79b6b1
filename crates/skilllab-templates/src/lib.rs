//! Prompt templates for the Structure collaborator (spec.md §6, §4.5).
//!
//! `structure_prompt` pins the target schema for the initial structuring
//! call; `correction_prompt` is the regenerate prompt used by the
//! auto-correction loop (C6) in `skilllab-correction`. Both follow the
//! wording of the original implementation closely enough that the
//! collaborator model sees a stable, already-tuned instruction shape.

const SCHEMA_BLOCK: &str = r#"{
  "Name": string or null,
  "Email": string or null,
  "Phone": string or null,
  "Current_Position": string or null,
  "Skills": [list of skills as strings],
  "Experience": [
    {
      "company": string,
      "title": string,
      "years": string
    }
  ]
}"#;

/// Initial structuring prompt: pins the schema and instructs null-filling
/// for missing single values and empty lists for Skills/Experience
/// (spec.md §6).
#[must_use]
pub fn structure_prompt(resume_text: &str) -> String {
    format!(
        "You are a specialized model focusing on resume data extraction.\n\
         Extract structured information from the following resume text.\n\n\
         Resume text:\n{resume_text}\n\n\
         Guidelines:\n\
         1. Focus only on factual information present in the text\n\
         2. Do NOT hallucinate data - use null for missing single-value fields\n\
         3. Skills and Experience MUST be empty lists, never null, when absent\n\
         4. Extract as many relevant skills as possible from the text\n\
         5. Ensure Experience entries have company, title, and years fields\n\n\
         The output must be in valid JSON format with this structure:\n\
         {SCHEMA_BLOCK}\n\n\
         Only return the JSON and nothing else."
    )
}

/// Regenerate prompt used by the auto-correction loop (spec.md §4.5).
/// `current_json` is the flattened current candidate; `issues` is the
/// ordered problem list produced by `enumerate_problems`.
#[must_use]
pub fn correction_prompt(resume_text: &str, current_json: &str, issues: &[String]) -> String {
    let issue_lines = issues
        .iter()
        .map(|issue| format!("- {issue}"))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "You are a specialized model focusing on resume data correction.\n\
         The following JSON was extracted from a resume, but has some issues:\n\n\
         {current_json}\n\n\
         Issues identified:\n\
         {issue_lines}\n\n\
         Original resume text:\n\
         {resume_text}\n\n\
         Please provide a corrected version of the JSON with these guidelines:\n\
         1. Focus only on factual information present in the text\n\
         2. Do NOT hallucinate data - use null for missing fields (except Skills and \
            Experience which should be empty lists if missing)\n\
         3. Extract as many relevant skills as possible from the text\n\
         4. Ensure Experience entries have company, title, and years fields\n\
         5. Fix any formatting or structural issues\n\n\
         The output must be in valid JSON format with this structure:\n\
         {SCHEMA_BLOCK}\n\n\
         Only return the corrected JSON and nothing else."
    )
}
