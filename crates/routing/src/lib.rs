//! Routing: resolves an entry's declared cross-references against a manifest
//! of known artifacts.
//!
//! The manifest is owned and maintained outside this core (a packaging or
//! deployment step) and consumed read-only; resolution performs no I/O.
//! References absent from the manifest are data, not errors: they accumulate
//! in [`ResolvedLinks::missing`] while the other references still resolve.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use triage_catalog::{CrossRef, CrossRefKind, HardCaseEntry};

/// Mapping from cross-reference identifiers (e.g. `recovery:cmake`) to
/// concrete resource locations.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
#[serde(transparent)]
pub struct ArtifactManifest {
    artifacts: BTreeMap<String, String>,
}

impl ArtifactManifest {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Deployments ship the manifest as a flat JSON object.
    pub fn from_json_str(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    pub fn insert(&mut self, identifier: impl Into<String>, location: impl Into<String>) {
        self.artifacts.insert(identifier.into(), location.into());
    }

    #[must_use]
    pub fn get(&self, identifier: &str) -> Option<&str> {
        self.artifacts.get(identifier).map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.artifacts.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty()
    }
}

/// Resolution outcome for one entry. Ephemeral, produced per request.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
pub struct ResolvedLinks {
    pub playbook: Option<String>,
    pub diagnostics: Option<String>,
    pub prompt: Option<String>,
    /// Declared references with no manifest entry.
    pub missing: Vec<CrossRef>,
}

impl ResolvedLinks {
    /// True when every declared reference resolved.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }
}

/// Resolve each declared cross-reference of `entry` against `manifest`.
///
/// Pure and read-only; a missing reference never aborts resolution of the
/// others. When an entry declares the same kind twice, the first declaration
/// wins the typed slot.
#[must_use]
pub fn resolve(entry: &HardCaseEntry, manifest: &ArtifactManifest) -> ResolvedLinks {
    let mut links = ResolvedLinks::default();

    for cross_ref in &entry.cross_refs {
        let Some(location) = manifest.get(&cross_ref.target) else {
            links.missing.push(cross_ref.clone());
            continue;
        };

        let slot = match cross_ref.kind {
            CrossRefKind::RecoveryPlaybook => &mut links.playbook,
            CrossRefKind::Diagnostics => &mut links.diagnostics,
            CrossRefKind::Prompt => &mut links.prompt,
        };
        if slot.is_none() {
            *slot = Some(location.to_string());
        }
    }

    links
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use triage_catalog::{Signature, Technology};

    fn entry_with_refs(cross_refs: Vec<CrossRef>) -> HardCaseEntry {
        HardCaseEntry {
            id: "HC-CMAKE-001".to_string(),
            technology: Technology::Cmake,
            title: "Generator mismatch".to_string(),
            symptom_text: "CMake Error: generator mismatch".to_string(),
            signature: Signature::default(),
            likely_causes: vec!["stale cache".to_string()],
            diagnosis_commands: vec!["grep CMAKE_GENERATOR CMakeCache.txt".to_string()],
            fix_steps: vec!["wipe the build dir".to_string()],
            prevention_notes: vec!["pin the generator".to_string()],
            cross_refs,
        }
    }

    fn manifest() -> ArtifactManifest {
        let mut manifest = ArtifactManifest::new();
        manifest.insert("recovery:cmake", "playbooks/cmake.md");
        manifest.insert("diagnostics:cmake", "bundles/cmake.sh");
        manifest.insert("prompt:cpp_hard_cases", "prompts/cpp_hard_cases.txt");
        manifest
    }

    #[test]
    fn resolves_every_declared_reference() {
        let entry = entry_with_refs(vec![
            CrossRef::new(CrossRefKind::RecoveryPlaybook, "recovery:cmake"),
            CrossRef::new(CrossRefKind::Diagnostics, "diagnostics:cmake"),
            CrossRef::new(CrossRefKind::Prompt, "prompt:cpp_hard_cases"),
        ]);

        let links = resolve(&entry, &manifest());
        assert_eq!(links.playbook.as_deref(), Some("playbooks/cmake.md"));
        assert_eq!(links.diagnostics.as_deref(), Some("bundles/cmake.sh"));
        assert_eq!(links.prompt.as_deref(), Some("prompts/cpp_hard_cases.txt"));
        assert!(links.is_complete());
    }

    #[test]
    fn missing_reference_is_reported_and_others_still_resolve() {
        let entry = entry_with_refs(vec![
            CrossRef::new(CrossRefKind::RecoveryPlaybook, "recovery:fortran"),
            CrossRef::new(CrossRefKind::Diagnostics, "diagnostics:cmake"),
        ]);

        let links = resolve(&entry, &manifest());
        assert_eq!(links.playbook, None);
        assert_eq!(links.diagnostics.as_deref(), Some("bundles/cmake.sh"));
        assert_eq!(
            links.missing,
            vec![CrossRef::new(
                CrossRefKind::RecoveryPlaybook,
                "recovery:fortran"
            )]
        );
        assert!(!links.is_complete());
    }

    #[test]
    fn entry_without_references_resolves_to_nothing() {
        let links = resolve(&entry_with_refs(Vec::new()), &manifest());
        assert_eq!(links, ResolvedLinks::default());
        assert!(links.is_complete());
    }

    #[test]
    fn first_declaration_of_a_kind_wins() {
        let mut manifest = manifest();
        manifest.insert("recovery:cmake_legacy", "playbooks/cmake_legacy.md");
        let entry = entry_with_refs(vec![
            CrossRef::new(CrossRefKind::RecoveryPlaybook, "recovery:cmake"),
            CrossRef::new(CrossRefKind::RecoveryPlaybook, "recovery:cmake_legacy"),
        ]);

        let links = resolve(&entry, &manifest);
        assert_eq!(links.playbook.as_deref(), Some("playbooks/cmake.md"));
        assert!(links.is_complete());
    }

    #[test]
    fn manifest_round_trips_through_json() {
        let manifest = manifest();
        let json = serde_json::to_string(&manifest).expect("serialize");
        let back = ArtifactManifest::from_json_str(&json).expect("parse");
        assert_eq!(back, manifest);
        assert_eq!(back.get("recovery:cmake"), Some("playbooks/cmake.md"));
    }
}
