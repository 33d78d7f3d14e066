use once_cell::sync::Lazy;
use regex::Regex;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Entry ids follow the documented `HC-<TECH>-NNN` convention.
pub static ENTRY_ID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^HC-([A-Z0-9]+)-\d{3}$").expect("entry id regex"));

/// Technology stacks the catalog knows about.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Technology {
    Cmake,
    Cpp,
    Docker,
    Git,
    Kubernetes,
    Linux,
    Node,
    Python,
    Rust,
}

impl Technology {
    pub const ALL: &'static [Technology] = &[
        Technology::Cmake,
        Technology::Cpp,
        Technology::Docker,
        Technology::Git,
        Technology::Kubernetes,
        Technology::Linux,
        Technology::Node,
        Technology::Python,
        Technology::Rust,
    ];

    /// Uppercase wire code used in entry ids and issue keys.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Technology::Cmake => "CMAKE",
            Technology::Cpp => "CPP",
            Technology::Docker => "DOCKER",
            Technology::Git => "GIT",
            Technology::Kubernetes => "K8S",
            Technology::Linux => "LINUX",
            Technology::Node => "NODE",
            Technology::Python => "PYTHON",
            Technology::Rust => "RUST",
        }
    }

    #[must_use]
    pub fn from_code(code: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|tech| tech.code() == code)
    }
}

impl fmt::Display for Technology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl std::str::FromStr for Technology {
    type Err = UnknownTechnology;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::from_code(s).ok_or_else(|| UnknownTechnology {
            code: s.to_string(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown technology code `{code}`")]
pub struct UnknownTechnology {
    pub code: String,
}

/// Unique address of one entry in a snapshot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash, JsonSchema)]
pub struct EntryKey {
    pub technology: Technology,
    pub id: String,
}

impl EntryKey {
    #[must_use]
    pub fn new(technology: Technology, id: impl Into<String>) -> Self {
        Self {
            technology,
            id: id.into(),
        }
    }

    /// Parse a well-formed entry id into a key. Returns `None` when the id
    /// does not match `HC-<TECH>-NNN` or names an unknown technology.
    #[must_use]
    pub fn parse(id: &str) -> Option<Self> {
        let captures = ENTRY_ID_RE.captures(id)?;
        let technology = Technology::from_code(captures.get(1)?.as_str())?;
        Some(Self::new(technology, id))
    }
}

impl fmt::Display for EntryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum CrossRefKind {
    RecoveryPlaybook,
    Diagnostics,
    Prompt,
}

impl CrossRefKind {
    /// Label used in source documents and manifest identifiers.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            CrossRefKind::RecoveryPlaybook => "recovery",
            CrossRefKind::Diagnostics => "diagnostics",
            CrossRefKind::Prompt => "prompt",
        }
    }

    #[must_use]
    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "recovery" => Some(CrossRefKind::RecoveryPlaybook),
            "diagnostics" => Some(CrossRefKind::Diagnostics),
            "prompt" => Some(CrossRefKind::Prompt),
            _ => None,
        }
    }
}

/// A declared link from an entry to an external artifact, resolved against a
/// manifest at query time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
pub struct CrossRef {
    pub kind: CrossRefKind,
    /// Manifest identifier, e.g. `recovery:cmake`.
    pub target: String,
}

impl CrossRef {
    #[must_use]
    pub fn new(kind: CrossRefKind, target: impl Into<String>) -> Self {
        Self {
            kind,
            target: target.into(),
        }
    }
}

/// Matchable fingerprints derived from an entry's symptom text at load time.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
pub struct Signature {
    /// Symptom code-block excerpt, trimmed and whitespace-collapsed.
    pub primary: String,
    /// Lowercased form of `primary` used for containment matching.
    pub primary_match: String,
    /// Normalized token set used for fuzzy matching.
    pub tokens: BTreeSet<String>,
}

/// One documented symptom/cause/diagnosis/fix/prevention tuple.
///
/// Entries are created once per load cycle and never mutated; a reload
/// replaces the whole snapshot they live in.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
pub struct HardCaseEntry {
    pub id: String,
    pub technology: Technology,
    pub title: String,
    /// Raw symptom section text as written in the source document.
    pub symptom_text: String,
    pub signature: Signature,
    pub likely_causes: Vec<String>,
    pub diagnosis_commands: Vec<String>,
    pub fix_steps: Vec<String>,
    pub prevention_notes: Vec<String>,
    pub cross_refs: Vec<CrossRef>,
}

impl HardCaseEntry {
    #[must_use]
    pub fn key(&self) -> EntryKey {
        EntryKey::new(self.technology, self.id.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn technology_code_round_trips() {
        for tech in Technology::ALL {
            assert_eq!(Technology::from_code(tech.code()), Some(*tech));
            assert_eq!(tech.code().parse::<Technology>().ok(), Some(*tech));
        }
    }

    #[test]
    fn rejects_unknown_technology_code() {
        let err = "FORTRAN".parse::<Technology>().unwrap_err();
        assert_eq!(err.code, "FORTRAN");
    }

    #[test]
    fn parses_well_formed_entry_id() {
        let key = EntryKey::parse("HC-CMAKE-001").expect("key");
        assert_eq!(key.technology, Technology::Cmake);
        assert_eq!(key.id, "HC-CMAKE-001");
    }

    #[test]
    fn rejects_malformed_entry_ids() {
        assert_eq!(EntryKey::parse("HC-CMAKE-1"), None);
        assert_eq!(EntryKey::parse("HC-cmake-001"), None);
        assert_eq!(EntryKey::parse("HC-FORTRAN-001"), None);
        assert_eq!(EntryKey::parse("CMAKE-001"), None);
    }

    #[test]
    fn cross_ref_labels_round_trip() {
        for kind in [
            CrossRefKind::RecoveryPlaybook,
            CrossRefKind::Diagnostics,
            CrossRefKind::Prompt,
        ] {
            assert_eq!(CrossRefKind::from_label(kind.label()), Some(kind));
        }
        assert_eq!(CrossRefKind::from_label("runbook"), None);
    }
}
