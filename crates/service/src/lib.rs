//! The programmatic query API boundary.
//!
//! [`TriageService`] ties the catalog store, match engine, issue-key service
//! and routing resolver behind the three calls external callers use:
//! `match_query`, `resolve` and `generate`, plus `load`/`reload` for catalog
//! lifecycle. No CLI surface lives here.

use std::sync::Arc;
use thiserror::Error;
use triage_catalog::{
    CaseStore, CatalogError, EntryKey, LoadOptions, LoadReport, Source, StoreState, Technology,
};
use triage_issue_key::{IssueKey, IssueKeyError, IssueKeyService};
use triage_match::{MatchEngine, MatchOptions, QueryResult};
use triage_routing::{ArtifactManifest, ResolvedLinks};

pub type Result<T> = std::result::Result<T, ServiceError>;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Key(#[from] IssueKeyError),

    #[error("`{id}` is not a valid entry id")]
    InvalidEntryId { id: String },

    #[error("no catalog entry with id `{id}`")]
    UnknownEntry { id: String },
}

/// One handle over the whole engine.
///
/// `match_query` and `resolve` are pure reads against the store's current
/// snapshot and may run concurrently with a `reload`; `generate` serializes
/// internally on the issue-key collision table.
pub struct TriageService {
    store: Arc<CaseStore>,
    engine: MatchEngine,
    keys: IssueKeyService,
    manifest: ArtifactManifest,
}

impl TriageService {
    #[must_use]
    pub fn new(manifest: ArtifactManifest) -> Self {
        Self::with_options(LoadOptions::default(), MatchOptions::default(), manifest)
    }

    #[must_use]
    pub fn with_options(
        load_options: LoadOptions,
        match_options: MatchOptions,
        manifest: ArtifactManifest,
    ) -> Self {
        Self {
            store: Arc::new(CaseStore::with_options(load_options)),
            engine: MatchEngine::with_options(match_options),
            keys: IssueKeyService::new(),
            manifest,
        }
    }

    /// Shared handle to the underlying store (state inspection, background
    /// reload tasks).
    #[must_use]
    pub fn store(&self) -> Arc<CaseStore> {
        Arc::clone(&self.store)
    }

    #[must_use]
    pub fn manifest(&self) -> &ArtifactManifest {
        &self.manifest
    }

    #[must_use]
    pub fn state(&self) -> StoreState {
        self.store.state()
    }

    /// Load the catalog. The report carries every parse/validation problem;
    /// inspect it to detect a degraded catalog.
    pub async fn load(&self, sources: &[Source]) -> Result<LoadReport> {
        Ok(self.store.load(sources).await?)
    }

    /// Rebuild the snapshot from fresh sources; on failure the previous
    /// snapshot keeps serving.
    pub async fn reload(&self, sources: &[Source]) -> Result<LoadReport> {
        Ok(self.store.reload(sources).await?)
    }

    /// Rank catalog entries against `query`. An unmatched query is an empty
    /// vec, never an error; only a store with no published snapshot errs.
    pub fn match_query(
        &self,
        query: &str,
        top_k: usize,
        tech_hint: Option<Technology>,
    ) -> Result<Vec<QueryResult>> {
        let snapshot = self.store.snapshot()?;
        Ok(self.engine.match_query(&snapshot, query, top_k, tech_hint))
    }

    /// Resolve the cross-references of the entry with `entry_id` against the
    /// injected artifact manifest.
    pub fn resolve(&self, entry_id: &str) -> Result<ResolvedLinks> {
        let key = EntryKey::parse(entry_id).ok_or_else(|| ServiceError::InvalidEntryId {
            id: entry_id.to_string(),
        })?;
        let snapshot = self.store.snapshot()?;
        let entry = snapshot.get(&key).ok_or_else(|| ServiceError::UnknownEntry {
            id: entry_id.to_string(),
        })?;
        Ok(triage_routing::resolve(entry, &self.manifest))
    }

    /// Mint an issue key for an incident in `technology`.
    pub fn generate(&self, technology: Technology, incident_context: &str) -> Result<IssueKey> {
        Ok(self.keys.generate(technology.code(), incident_context)?)
    }
}
