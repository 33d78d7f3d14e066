//! Schema checks for parsed candidate entries.
//!
//! Validation is a pure function over one entry plus the running
//! duplicate-key set; every failing check is collected so a load report can
//! show the whole problem at once. Violations are never fatal to a load.

use crate::parser::RawEntry;
use crate::report::ValidationIssue;
use crate::types::{EntryKey, Technology, ENTRY_ID_RE};
use std::collections::HashSet;

/// Validate one candidate entry against the schema and the keys already
/// accepted this load cycle. Returns the entry's key on success.
pub fn validate_entry(
    raw: &RawEntry,
    seen: &HashSet<EntryKey>,
) -> Result<EntryKey, ValidationIssue> {
    let mut problems = Vec::new();

    let technology = match ENTRY_ID_RE.captures(&raw.id) {
        Some(captures) => {
            let code = captures.get(1).map_or("", |m| m.as_str());
            match Technology::from_code(code) {
                Some(tech) => Some(tech),
                None => {
                    problems.push(format!("unknown technology code `{code}`"));
                    None
                }
            }
        }
        None => {
            problems.push(format!(
                "id `{}` does not match the `HC-<TECH>-NNN` convention",
                raw.id
            ));
            // Best effort so an id typo still reports tech problems too.
            match raw.id.split('-').nth(1) {
                Some(code) if Technology::from_code(code).is_none() => {
                    problems.push(format!("unknown technology code `{code}`"));
                }
                _ => {}
            }
            None
        }
    };

    if raw.symptom_text.trim().is_empty() {
        problems.push("empty `Symptom` section".to_string());
    }
    if raw.likely_causes.is_empty() {
        problems.push("empty `Likely Causes` section".to_string());
    }
    if raw.diagnosis_commands.is_empty() {
        problems.push("empty `Fast Diagnosis` section".to_string());
    }
    if raw.fix_steps.is_empty() {
        problems.push("empty `Fix Steps` section".to_string());
    }
    if raw.prevention_notes.is_empty() {
        problems.push("empty `Prevention` section".to_string());
    }

    let key = technology.map(|tech| EntryKey::new(tech, raw.id.clone()));
    if let Some(key) = &key {
        if seen.contains(key) {
            problems.push(format!("duplicate id `{}`", raw.id));
        }
    }

    match (key, problems.is_empty()) {
        (Some(key), true) => Ok(key),
        (_, _) => Err(ValidationIssue {
            source: raw.source.clone(),
            line: raw.line,
            id: raw.id.clone(),
            problems,
        }),
    }
}
