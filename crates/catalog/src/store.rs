//! Case store: the load pipeline and the immutable snapshot it publishes.
//!
//! Documents are parsed in a bounded worker pool; a single writer then merges
//! validated entries into a fresh [`CaseIndex`] and publishes it with an
//! atomic pointer swap. Readers hold whichever `Arc` snapshot they grabbed at
//! call entry, so queries never observe a partially merged index and keep
//! working during a reload.

use crate::error::{CatalogError, Result};
use crate::parser::{self, RawEntry};
use crate::report::{DocumentFailure, FailureKind, LoadReport, ParseIssue};
use crate::signature;
use crate::sources::{Source, SourceKind};
use crate::types::{EntryKey, HardCaseEntry, Signature, Technology};
use crate::validator;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

/// Lifecycle of a [`CaseStore`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum StoreState {
    Unloaded,
    Loading,
    Ready,
}

/// Tunables for one load cycle.
#[derive(Debug, Clone)]
pub struct LoadOptions {
    /// Upper bound on concurrently processed documents; `0` picks a small
    /// adaptive cap from available parallelism.
    pub max_concurrency: usize,
    /// Budget for reading and parsing a single document. A document that
    /// blows the budget fails alone; the rest of the load continues.
    pub document_timeout: Duration,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            max_concurrency: 0,
            document_timeout: Duration::from_secs(10),
        }
    }
}

impl LoadOptions {
    fn effective_concurrency(&self) -> usize {
        if self.max_concurrency > 0 {
            return self.max_concurrency;
        }
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
            .clamp(2, 8)
    }
}

/// Immutable, point-in-time view of the full catalog.
///
/// Owned by the store, shared with readers via `Arc`; never mutated after
/// publication.
#[derive(Debug, Default)]
pub struct CaseIndex {
    entries: Vec<Arc<HardCaseEntry>>,
    by_key: HashMap<EntryKey, usize>,
    token_index: HashMap<String, Vec<usize>>,
}

impl CaseIndex {
    fn insert(&mut self, entry: HardCaseEntry) {
        let idx = self.entries.len();
        for token in &entry.signature.tokens {
            self.token_index.entry(token.clone()).or_default().push(idx);
        }
        self.by_key.insert(entry.key(), idx);
        self.entries.push(Arc::new(entry));
    }

    /// Direct lookup by `(technology, id)`.
    #[must_use]
    pub fn get(&self, key: &EntryKey) -> Option<&Arc<HardCaseEntry>> {
        self.by_key.get(key).map(|&idx| &self.entries[idx])
    }

    /// All entries in load order.
    #[must_use]
    pub fn entries(&self) -> &[Arc<HardCaseEntry>] {
        &self.entries
    }

    /// Indices of entries whose token signature contains `token`.
    #[must_use]
    pub fn candidates(&self, token: &str) -> &[usize] {
        self.token_index.get(token).map_or(&[], Vec::as_slice)
    }

    #[must_use]
    pub fn entry_at(&self, idx: usize) -> Option<&Arc<HardCaseEntry>> {
        self.entries.get(idx)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

struct StoreInner {
    state: StoreState,
    snapshot: Option<Arc<CaseIndex>>,
}

/// Parses source documents into structured entries and serves an immutable,
/// queryable snapshot.
pub struct CaseStore {
    options: LoadOptions,
    inner: RwLock<StoreInner>,
}

impl Default for CaseStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CaseStore {
    #[must_use]
    pub fn new() -> Self {
        Self::with_options(LoadOptions::default())
    }

    #[must_use]
    pub fn with_options(options: LoadOptions) -> Self {
        Self {
            options,
            inner: RwLock::new(StoreInner {
                state: StoreState::Unloaded,
                snapshot: None,
            }),
        }
    }

    #[must_use]
    pub fn state(&self) -> StoreState {
        self.inner.read().expect("case store lock poisoned").state
    }

    /// The currently published snapshot.
    ///
    /// Stays available during a reload (readers keep the previous snapshot
    /// until the swap); errs only before the first successful load.
    pub fn snapshot(&self) -> Result<Arc<CaseIndex>> {
        self.inner
            .read()
            .expect("case store lock poisoned")
            .snapshot
            .clone()
            .ok_or(CatalogError::NotReady)
    }

    /// Parse and validate all sources and publish a fresh snapshot.
    ///
    /// Parse and validation problems are collected into the returned report,
    /// never thrown; callers decide whether a degraded catalog is acceptable.
    /// A load that yields zero usable entries does not publish: a previously
    /// published snapshot keeps serving and the error carries the report.
    pub async fn load(&self, sources: &[Source]) -> Result<LoadReport> {
        let start = Instant::now();
        {
            let mut inner = self.inner.write().expect("case store lock poisoned");
            inner.state = StoreState::Loading;
        }

        let mut report = LoadReport::new();
        report.documents = sources.len();

        let parsed = self.process_sources_parallel(sources, &mut report).await;

        // Single-writer merge; entries arrive already fingerprinted.
        let mut index = CaseIndex::default();
        let mut seen: HashSet<EntryKey> = HashSet::new();
        for (raw, signature) in parsed {
            match validator::validate_entry(&raw, &seen) {
                Ok(key) => {
                    let technology = key.technology;
                    seen.insert(key);
                    index.insert(build_entry(raw, signature, technology));
                    report.entries_loaded += 1;
                }
                Err(issue) => report.add_validation_issue(issue),
            }
        }

        #[allow(clippy::cast_possible_truncation)]
        {
            report.time_ms = start.elapsed().as_millis() as u64;
        }

        let mut inner = self.inner.write().expect("case store lock poisoned");
        if index.is_empty() {
            // Never leave the store serving nothing because of one bad load.
            inner.state = if inner.snapshot.is_some() {
                StoreState::Ready
            } else {
                StoreState::Unloaded
            };
            return Err(CatalogError::LoadExhausted {
                report: Box::new(report),
            });
        }

        log::info!(
            "Catalog loaded: {} entries from {} documents ({} rejected, {} failed documents)",
            report.entries_loaded,
            report.documents,
            report.entries_rejected,
            report.document_failures.len()
        );
        inner.snapshot = Some(Arc::new(index));
        inner.state = StoreState::Ready;
        Ok(report)
    }

    /// Repeat [`CaseStore::load`] against fresh sources and atomically swap
    /// the snapshot on success.
    pub async fn reload(&self, sources: &[Source]) -> Result<LoadReport> {
        self.load(sources).await
    }

    async fn process_sources_parallel(
        &self,
        sources: &[Source],
        report: &mut LoadReport,
    ) -> Vec<(RawEntry, Signature)> {
        let max_concurrent = self.options.effective_concurrency();
        let timeout = self.options.document_timeout;
        let mut collected = Vec::new();

        for batch in sources.chunks(max_concurrent) {
            let mut tasks = Vec::with_capacity(batch.len());
            for source in batch {
                let source = source.clone();
                tasks.push((
                    source.name().to_string(),
                    tokio::spawn(process_source(source, timeout)),
                ));
            }

            for (name, task) in tasks {
                match task.await {
                    Ok(Ok(outcome)) => {
                        report.parse_issues.extend(outcome.issues);
                        collected.extend(outcome.entries);
                    }
                    Ok(Err(failure)) => {
                        log::warn!("Failed to load {}: {}", failure.source, failure.message);
                        report.add_document_failure(failure);
                    }
                    Err(e) => report.add_document_failure(DocumentFailure {
                        source: name,
                        kind: FailureKind::Io,
                        message: format!("task panicked: {e}"),
                    }),
                }
            }
        }

        collected
    }
}

struct DocOutcome {
    entries: Vec<(RawEntry, Signature)>,
    issues: Vec<ParseIssue>,
}

/// Read and parse one document, fingerprinting each entry, under a budget.
async fn process_source(
    source: Source,
    timeout: Duration,
) -> std::result::Result<DocOutcome, DocumentFailure> {
    let name = source.name().to_string();

    let work = async {
        let text = match source.kind() {
            SourceKind::Path(path) => {
                tokio::fs::read_to_string(path)
                    .await
                    .map_err(|e| DocumentFailure {
                        source: name.clone(),
                        kind: FailureKind::Io,
                        message: e.to_string(),
                    })?
            }
            SourceKind::Text(text) => text.clone(),
        };

        let parsed = parser::parse_document(&name, &text);
        let entries = parsed
            .entries
            .into_iter()
            .map(|raw| {
                let fingerprint = signature::extract(&raw.title, &raw.symptom_excerpt);
                (raw, fingerprint)
            })
            .collect();

        Ok(DocOutcome {
            entries,
            issues: parsed.issues,
        })
    };

    match tokio::time::timeout(timeout, work).await {
        Ok(outcome) => outcome,
        Err(_) => Err(DocumentFailure {
            source: source.name().to_string(),
            kind: FailureKind::Timeout,
            message: format!("document load exceeded {}ms", timeout.as_millis()),
        }),
    }
}

fn build_entry(raw: RawEntry, signature: Signature, technology: Technology) -> HardCaseEntry {
    HardCaseEntry {
        id: raw.id,
        technology,
        title: raw.title,
        symptom_text: raw.symptom_text,
        signature,
        likely_causes: raw.likely_causes,
        diagnosis_commands: raw.diagnosis_commands,
        fix_steps: raw.fix_steps,
        prevention_notes: raw.prevention_notes,
        cross_refs: raw.cross_refs,
    }
}
