use crate::score;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use triage_catalog::{signature, CaseIndex, HardCaseEntry, Technology};

/// Which fingerprint produced a match.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MatchedSignature {
    /// The entry's primary signature and the query contained one another.
    Exact { substring: String },
    /// Token overlap between the query and the entry's token signature.
    Tokens { shared: Vec<String> },
}

/// One ranked hit. Ephemeral; owned by the caller.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct QueryResult {
    pub entry: Arc<HardCaseEntry>,
    pub confidence: f64,
    pub matched: MatchedSignature,
}

/// Tunable thresholds for the two match passes.
#[derive(Debug, Clone)]
pub struct MatchOptions {
    /// Jaccard similarity below this is noise, not a match.
    pub min_similarity: f64,
    /// Containment in the exact pass requires the contained side to be at
    /// least this long, so one-word queries cannot "exactly" match every
    /// signature containing that word. Full equality is always accepted.
    pub min_exact_len: usize,
    /// Upper bound of the fuzzy confidence band; kept below the exact band.
    pub fuzzy_ceiling: f64,
}

impl Default for MatchOptions {
    fn default() -> Self {
        Self {
            min_similarity: 0.15,
            min_exact_len: 12,
            fuzzy_ceiling: 0.85,
        }
    }
}

/// Scores and ranks catalog entries against an incoming query string.
///
/// A pure read over `(snapshot, query)`: no shared mutable state, safe for
/// unbounded concurrent calls, including while the store swaps snapshots.
#[derive(Debug, Clone, Default)]
pub struct MatchEngine {
    options: MatchOptions,
}

struct Candidate {
    idx: usize,
    confidence: f64,
    matched: MatchedSignature,
}

impl MatchEngine {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_options(options: MatchOptions) -> Self {
        Self { options }
    }

    /// Rank entries against `query` and return the top `top_k`.
    ///
    /// An empty vec means no sufficiently confident match; an unmatched
    /// query is never an error.
    #[must_use]
    pub fn match_query(
        &self,
        index: &CaseIndex,
        query: &str,
        top_k: usize,
        tech_hint: Option<Technology>,
    ) -> Vec<QueryResult> {
        if top_k == 0 {
            return Vec::new();
        }

        let needle = signature::normalize_exact(query);
        let query_tokens = signature::token_set(query);

        let mut candidates: Vec<Candidate> = Vec::new();
        let mut matched_exact: HashSet<usize> = HashSet::new();

        if !needle.is_empty() {
            self.exact_pass(index, &needle, &mut candidates, &mut matched_exact);
            log::debug!("Exact pass: {} hits", candidates.len());
        }

        if !query_tokens.is_empty() {
            let before = candidates.len();
            self.fuzzy_pass(index, &query_tokens, &matched_exact, &mut candidates);
            log::debug!("Fuzzy pass: {} hits", candidates.len() - before);
        }

        candidates.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| Self::tie_break(index, a.idx, b.idx, tech_hint))
        });
        candidates.truncate(top_k);

        candidates
            .into_iter()
            .map(|candidate| QueryResult {
                entry: Arc::clone(&index.entries()[candidate.idx]),
                confidence: candidate.confidence,
                matched: candidate.matched,
            })
            .collect()
    }

    /// High-confidence containment between the normalized query and each
    /// entry's primary signature.
    fn exact_pass(
        &self,
        index: &CaseIndex,
        needle: &str,
        candidates: &mut Vec<Candidate>,
        matched_exact: &mut HashSet<usize>,
    ) {
        for (idx, entry) in index.entries().iter().enumerate() {
            let sig = entry.signature.primary_match.as_str();
            if sig.is_empty() {
                continue;
            }

            let (contained_len, longer_len) = if sig.len() <= needle.len() {
                if !needle.contains(sig) {
                    continue;
                }
                (sig.len(), needle.len())
            } else {
                // Short queries may instead be contained in the signature.
                if !sig.contains(needle) {
                    continue;
                }
                (needle.len(), sig.len())
            };

            if contained_len < longer_len && contained_len < self.options.min_exact_len {
                continue;
            }

            matched_exact.insert(idx);
            candidates.push(Candidate {
                idx,
                confidence: score::exact_confidence(contained_len, longer_len),
                matched: MatchedSignature::Exact {
                    substring: entry.signature.primary.clone(),
                },
            });
        }
    }

    /// Token-overlap scoring for entries the exact pass did not claim,
    /// gathered through the snapshot's inverted index.
    fn fuzzy_pass(
        &self,
        index: &CaseIndex,
        query_tokens: &BTreeSet<String>,
        matched_exact: &HashSet<usize>,
        candidates: &mut Vec<Candidate>,
    ) {
        let mut pool: BTreeSet<usize> = BTreeSet::new();
        for token in query_tokens {
            for &idx in index.candidates(token) {
                if !matched_exact.contains(&idx) {
                    pool.insert(idx);
                }
            }
        }

        for idx in pool {
            let Some(entry) = index.entry_at(idx) else {
                continue;
            };
            let similarity = score::jaccard(query_tokens, &entry.signature.tokens);
            if similarity < self.options.min_similarity {
                continue;
            }
            let shared: Vec<String> = query_tokens
                .intersection(&entry.signature.tokens)
                .cloned()
                .collect();
            candidates.push(Candidate {
                idx,
                confidence: score::fuzzy_confidence(
                    similarity,
                    self.options.min_similarity,
                    self.options.fuzzy_ceiling,
                ),
                matched: MatchedSignature::Tokens { shared },
            });
        }
    }

    /// Order on equal confidence: technology hint, then longer (more
    /// specific) primary signature, then lexicographic id.
    fn tie_break(
        index: &CaseIndex,
        a_idx: usize,
        b_idx: usize,
        tech_hint: Option<Technology>,
    ) -> std::cmp::Ordering {
        let a = &index.entries()[a_idx];
        let b = &index.entries()[b_idx];
        let a_hint = tech_hint.is_some_and(|hint| a.technology == hint);
        let b_hint = tech_hint.is_some_and(|hint| b.technology == hint);
        b_hint
            .cmp(&a_hint)
            .then_with(|| b.signature.primary.len().cmp(&a.signature.primary.len()))
            .then_with(|| a.id.cmp(&b.id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use triage_catalog::{CaseStore, Source};

    const GENERATOR_SYMPTOM: &str =
        "The build directory was generated with \"Unix Makefiles\" but the current generator is \"Ninja\"";

    fn entry_doc(id: &str, title: &str, symptom: &str) -> String {
        format!(
            "## {id}: {title}\n\n**Symptom:**\n```\n{symptom}\n```\n\n**Likely Causes:**\n- a cause\n\n**Fast Diagnosis:**\n- a command\n\n**Fix Steps:**\n- a step\n\n**Prevention:**\n- a note\n"
        )
    }

    async fn fixture_index() -> Arc<CaseIndex> {
        let store = CaseStore::new();
        let sources = vec![
            Source::inline(
                "cmake.md",
                entry_doc(
                    "HC-CMAKE-001",
                    "Generator mismatch after switching to Ninja",
                    GENERATOR_SYMPTOM,
                ),
            ),
            Source::inline(
                "docker.md",
                entry_doc(
                    "HC-DOCKER-001",
                    "Daemon refuses writes when the disk fills",
                    "write /var/lib/docker: no space left on device",
                ),
            ),
            Source::inline(
                "node.md",
                entry_doc(
                    "HC-NODE-001",
                    "Heap exhaustion in long-running builds",
                    "FATAL ERROR: Reached heap limit Allocation failed - JavaScript heap out of memory",
                ),
            ),
        ];
        store.load(&sources).await.expect("load fixture");
        store.snapshot().expect("snapshot")
    }

    #[tokio::test]
    async fn exact_symptom_query_is_a_full_confidence_hit() {
        let index = fixture_index().await;
        let engine = MatchEngine::new();

        let results = engine.match_query(&index, GENERATOR_SYMPTOM, 1, None);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].entry.id, "HC-CMAKE-001");
        assert!(results[0].confidence >= 0.9);
        assert!((results[0].confidence - 1.0).abs() < 1e-9);
        assert!(matches!(
            results[0].matched,
            MatchedSignature::Exact { .. }
        ));
    }

    #[tokio::test]
    async fn longer_log_lines_containing_the_signature_still_hit_exact() {
        let index = fixture_index().await;
        let engine = MatchEngine::new();

        let query = format!("[12:03:44] error: {GENERATOR_SYMPTOM} (rerun cmake)");
        let results = engine.match_query(&index, &query, 3, None);
        assert_eq!(results[0].entry.id, "HC-CMAKE-001");
        assert!(results[0].confidence >= 0.9);
        assert!(results[0].confidence < 1.0);
    }

    #[tokio::test]
    async fn paraphrase_hits_through_the_fuzzy_pass() {
        let index = fixture_index().await;
        let engine = MatchEngine::new();

        let results = engine.match_query(&index, "ninja vs makefiles generator mismatch", 3, None);
        assert!(!results.is_empty());
        assert_eq!(results[0].entry.id, "HC-CMAKE-001");
        assert!(results[0].confidence >= 0.15);
        assert!(results[0].confidence < 0.9);
        assert!(matches!(
            results[0].matched,
            MatchedSignature::Tokens { .. }
        ));
    }

    #[tokio::test]
    async fn unrelated_queries_return_an_empty_vec() {
        let index = fixture_index().await;
        let engine = MatchEngine::new();

        let results = engine.match_query(&index, "kernel panic vfs unable to mount root", 5, None);
        assert_eq!(results, Vec::new());
    }

    #[tokio::test]
    async fn empty_and_zero_k_queries_are_not_errors() {
        let index = fixture_index().await;
        let engine = MatchEngine::new();

        assert!(engine.match_query(&index, "", 5, None).is_empty());
        assert!(engine.match_query(&index, "   \t  ", 5, None).is_empty());
        assert!(engine
            .match_query(&index, GENERATOR_SYMPTOM, 0, None)
            .is_empty());
    }

    #[tokio::test]
    async fn results_are_deterministic() {
        let index = fixture_index().await;
        let engine = MatchEngine::new();

        let query = "no space left on device while writing layers";
        let first = engine.match_query(&index, query, 5, Some(Technology::Docker));
        let second = engine.match_query(&index, query, 5, Some(Technology::Docker));
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn top_k_truncates_the_ranking() {
        let store = CaseStore::new();
        let sources = vec![Source::inline(
            "git.md",
            format!(
                "{}\n{}",
                entry_doc("HC-GIT-001", "Detached HEAD", "fatal: detached HEAD state"),
                entry_doc(
                    "HC-GIT-002",
                    "Detached HEAD in rebase",
                    "fatal: detached HEAD during rebase"
                )
            ),
        )];
        store.load(&sources).await.expect("load");
        let index = store.snapshot().expect("snapshot");
        let engine = MatchEngine::new();

        // One shared token, too short for the exact pass: both entries hit.
        let all = engine.match_query(&index, "detached", 5, None);
        let top = engine.match_query(&index, "detached", 1, None);
        assert!(all.len() > 1);
        assert_eq!(top.len(), 1);
        assert_eq!(top[0], all[0]);
    }

    #[tokio::test]
    async fn technology_hint_breaks_confidence_ties() {
        let store = CaseStore::new();
        // Two entries with identical symptom text in different stacks.
        let symptom = "process was killed after running out of memory";
        let sources = vec![
            Source::inline(
                "linux.md",
                entry_doc("HC-LINUX-001", "OOM killer strikes", symptom),
            ),
            Source::inline(
                "docker.md",
                entry_doc("HC-DOCKER-002", "Container OOM kill", symptom),
            ),
        ];
        store.load(&sources).await.expect("load");
        let index = store.snapshot().expect("snapshot");
        let engine = MatchEngine::new();

        let hinted = engine.match_query(&index, symptom, 2, Some(Technology::Docker));
        assert_eq!(hinted[0].entry.id, "HC-DOCKER-002");

        // Without a hint the lexicographically smaller id wins the tie.
        let unhinted = engine.match_query(&index, symptom, 2, None);
        assert_eq!(unhinted[0].entry.id, "HC-DOCKER-002");
        assert_eq!(unhinted[1].entry.id, "HC-LINUX-001");
    }
}
