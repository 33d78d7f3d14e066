use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A malformed block inside an otherwise parseable document. The entry is
/// skipped; siblings in the same document still load.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
pub struct ParseIssue {
    /// Source document name.
    pub source: String,
    /// 1-based line the problem was detected at.
    pub line: usize,
    pub message: String,
}

/// A structurally parseable entry that failed schema checks.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
pub struct ValidationIssue {
    pub source: String,
    pub line: usize,
    /// Entry id as written, even when malformed.
    pub id: String,
    /// Every failing check, not just the first.
    pub problems: Vec<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Timeout,
    Io,
}

/// A document that contributed nothing to the load.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
pub struct DocumentFailure {
    pub source: String,
    pub kind: FailureKind,
    pub message: String,
}

/// Outcome of one `load`/`reload` cycle.
///
/// Loads never abort on bad data; callers inspect the report to decide
/// whether a degraded catalog is acceptable.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
pub struct LoadReport {
    /// Number of source documents attempted.
    pub documents: usize,

    /// Entries that passed validation and made it into the snapshot.
    pub entries_loaded: usize,

    /// Entries rejected by validation.
    pub entries_rejected: usize,

    pub parse_issues: Vec<ParseIssue>,
    pub validation_issues: Vec<ValidationIssue>,
    pub document_failures: Vec<DocumentFailure>,

    /// Time taken in milliseconds.
    pub time_ms: u64,
}

impl LoadReport {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_parse_issue(&mut self, issue: ParseIssue) {
        self.parse_issues.push(issue);
    }

    pub fn add_validation_issue(&mut self, issue: ValidationIssue) {
        self.entries_rejected += 1;
        self.validation_issues.push(issue);
    }

    pub fn add_document_failure(&mut self, failure: DocumentFailure) {
        self.document_failures.push(failure);
    }

    /// True when anything at all went wrong during the load.
    #[must_use]
    pub fn has_problems(&self) -> bool {
        !self.parse_issues.is_empty()
            || !self.validation_issues.is_empty()
            || !self.document_failures.is_empty()
    }
}
