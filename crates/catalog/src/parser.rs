//! Parser for catalog source documents.
//!
//! Documents contain repeated blocks of the shape
//! `## HC-<TECH>-NNN: <Title>` followed by the labeled sections
//! `**Symptom:**` (with a fenced code block), `**Likely Causes:**`,
//! `**Fast Diagnosis:**`, `**Fix Steps:**`, `**Prevention:**` and an
//! optional `**Cross-References:**`. Prose and unknown sections between or
//! after blocks are tolerated. A malformed block is recorded as a
//! `ParseIssue` and skipped; sibling blocks in the same document still load.

use crate::report::ParseIssue;
use crate::types::{CrossRef, CrossRefKind};
use once_cell::sync::Lazy;
use regex::Regex;

static HEADING_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^##\s+(HC-[^:\s]+)\s*:\s*(.*)$").expect("heading regex"));

static SECTION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\*\*([A-Za-z][A-Za-z -]*):\*\*\s*(.*)$").expect("section regex"));

/// One candidate entry as written in a source document, before validation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawEntry {
    /// Source document name.
    pub source: String,
    /// 1-based line of the entry heading.
    pub line: usize,
    pub id: String,
    pub title: String,
    /// Full symptom section text.
    pub symptom_text: String,
    /// Text inside the symptom fenced code block; falls back to the whole
    /// section when the document carries no fence.
    pub symptom_excerpt: String,
    pub likely_causes: Vec<String>,
    pub diagnosis_commands: Vec<String>,
    pub fix_steps: Vec<String>,
    pub prevention_notes: Vec<String>,
    pub cross_refs: Vec<CrossRef>,
}

#[derive(Debug, Default)]
pub struct ParsedDocument {
    pub entries: Vec<RawEntry>,
    pub issues: Vec<ParseIssue>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    None,
    Symptom,
    Causes,
    Diagnosis,
    Fix,
    Prevention,
    CrossRefs,
    /// A labeled section this parser does not know; content is skipped so it
    /// never bleeds into the previous known section.
    Unknown,
}

fn section_for_label(label: &str) -> Section {
    match label.to_ascii_lowercase().as_str() {
        "symptom" => Section::Symptom,
        "likely causes" => Section::Causes,
        "fast diagnosis" => Section::Diagnosis,
        "fix steps" => Section::Fix,
        "prevention" => Section::Prevention,
        "cross-references" => Section::CrossRefs,
        _ => Section::Unknown,
    }
}

/// Strip a leading `- `, `* ` or `1. `/`1) ` list marker.
fn strip_item_prefix(line: &str) -> &str {
    let trimmed = line.trim();
    if let Some(rest) = trimmed.strip_prefix("- ") {
        return rest.trim();
    }
    if let Some(rest) = trimmed.strip_prefix("* ") {
        return rest.trim();
    }
    let digits = trimmed.chars().take_while(char::is_ascii_digit).count();
    if digits > 0 {
        let tail = &trimmed[digits..];
        if let Some(rest) = tail.strip_prefix(". ") {
            return rest.trim();
        }
        if let Some(rest) = tail.strip_prefix(") ") {
            return rest.trim();
        }
    }
    trimmed
}

/// Parse one whole source document.
#[must_use]
pub fn parse_document(source: &str, text: &str) -> ParsedDocument {
    let mut document = ParsedDocument::default();
    let lines: Vec<&str> = text.lines().collect();

    // Collect (heading line index, id, title) for every entry heading; any
    // other `## ` heading terminates the preceding block.
    let mut block: Option<(usize, String, String)> = None;
    let mut block_start = 0usize;

    let flush = |document: &mut ParsedDocument,
                 block: &mut Option<(usize, String, String)>,
                 start: usize,
                 end: usize| {
        if let Some((heading_idx, id, title)) = block.take() {
            parse_block(
                source,
                heading_idx + 1,
                id,
                title,
                &lines[start..end],
                start,
                document,
            );
        }
    };

    for (idx, line) in lines.iter().enumerate() {
        if let Some(captures) = HEADING_RE.captures(line) {
            flush(&mut document, &mut block, block_start, idx);
            let id = captures[1].to_string();
            let title = captures[2].trim().to_string();
            block = Some((idx, id, title));
            block_start = idx + 1;
        } else if line.starts_with("## ") {
            // Unrelated prose heading; ends the current entry block.
            flush(&mut document, &mut block, block_start, idx);
        }
    }
    flush(&mut document, &mut block, block_start, lines.len());

    log::debug!(
        "Parsed {}: {} entries, {} issues",
        source,
        document.entries.len(),
        document.issues.len()
    );
    document
}

#[allow(clippy::too_many_lines)]
fn parse_block(
    source: &str,
    heading_line: usize,
    id: String,
    title: String,
    body: &[&str],
    body_offset: usize,
    document: &mut ParsedDocument,
) {
    if title.is_empty() {
        document.issues.push(ParseIssue {
            source: source.to_string(),
            line: heading_line,
            message: format!("entry `{id}` heading has no title"),
        });
        return;
    }

    let mut entry = RawEntry {
        source: source.to_string(),
        line: heading_line,
        id,
        title,
        ..RawEntry::default()
    };

    let mut section = Section::None;
    let mut symptom_lines: Vec<String> = Vec::new();

    for (idx, raw_line) in body.iter().enumerate() {
        let line_no = body_offset + idx + 1;

        if let Some(captures) = SECTION_RE.captures(raw_line) {
            section = section_for_label(&captures[1]);
            let trailing = captures[2].trim();
            if !trailing.is_empty() {
                consume_line(
                    source,
                    line_no,
                    section,
                    trailing,
                    &mut entry,
                    &mut symptom_lines,
                    &mut document.issues,
                );
            }
            continue;
        }

        consume_line(
            source,
            line_no,
            section,
            raw_line,
            &mut entry,
            &mut symptom_lines,
            &mut document.issues,
        );
    }

    entry.symptom_text = symptom_lines.join("\n").trim().to_string();
    match extract_fenced(&symptom_lines) {
        Ok(Some(excerpt)) => entry.symptom_excerpt = excerpt,
        Ok(None) => entry.symptom_excerpt = entry.symptom_text.clone(),
        Err(()) => {
            document.issues.push(ParseIssue {
                source: source.to_string(),
                line: heading_line,
                message: format!("entry `{}` has an unterminated code fence", entry.id),
            });
            return;
        }
    }

    document.entries.push(entry);
}

fn consume_line(
    source: &str,
    line_no: usize,
    section: Section,
    line: &str,
    entry: &mut RawEntry,
    symptom_lines: &mut Vec<String>,
    issues: &mut Vec<ParseIssue>,
) {
    match section {
        Section::Symptom => symptom_lines.push(line.to_string()),
        Section::Causes | Section::Diagnosis | Section::Fix | Section::Prevention => {
            // Fence markers around command lists are formatting, not content.
            if line.trim_start().starts_with("```") {
                return;
            }
            let item = strip_item_prefix(line);
            if item.is_empty() {
                return;
            }
            let target = match section {
                Section::Causes => &mut entry.likely_causes,
                Section::Diagnosis => &mut entry.diagnosis_commands,
                Section::Fix => &mut entry.fix_steps,
                Section::Prevention => &mut entry.prevention_notes,
                _ => unreachable!(),
            };
            target.push(item.to_string());
        }
        Section::CrossRefs => {
            let item = strip_item_prefix(line).trim_matches('`').trim();
            if item.is_empty() {
                return;
            }
            match parse_cross_ref(item) {
                Some(cross_ref) => entry.cross_refs.push(cross_ref),
                None => issues.push(ParseIssue {
                    source: source.to_string(),
                    line: line_no,
                    message: format!(
                        "entry `{}` has an unrecognized cross-reference `{item}`",
                        entry.id
                    ),
                }),
            }
        }
        Section::None | Section::Unknown => {}
    }
}

fn parse_cross_ref(item: &str) -> Option<CrossRef> {
    let (label, rest) = item.split_once(':')?;
    let kind = CrossRefKind::from_label(label.trim())?;
    if rest.trim().is_empty() {
        return None;
    }
    // The whole `kind:name` string is the manifest identifier.
    Some(CrossRef::new(kind, item))
}

/// Text inside the first fenced code block, `Ok(None)` when there is no
/// fence, `Err(())` when a fence opens and never closes.
fn extract_fenced(lines: &[String]) -> Result<Option<String>, ()> {
    let mut inside = false;
    let mut content: Vec<&str> = Vec::new();

    for line in lines {
        if line.trim_start().starts_with("```") {
            if inside {
                return Ok(Some(content.join("\n")));
            }
            inside = true;
            continue;
        }
        if inside {
            content.push(line);
        }
    }

    if inside {
        Err(())
    } else {
        Ok(None)
    }
}
