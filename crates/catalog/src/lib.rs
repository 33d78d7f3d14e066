//! # Triage Catalog
//!
//! Parses per-technology "hard case" documents into an immutable, queryable
//! snapshot.
//!
//! ## Architecture
//!
//! ```text
//! Source documents (markdown)
//!     │
//!     ├──> Parser (structural blocks → RawEntry, per document, worker pool)
//!     │
//!     ├──> SignatureExtractor (primary + token fingerprints, per entry)
//!     │
//!     ├──> Validator (schema + duplicate checks → load report)
//!     │
//!     └──> CaseStore merge (single writer)
//!          └─> Arc<CaseIndex> snapshot, swapped atomically on reload
//! ```
//!
//! Loads never abort on bad data: malformed blocks and invalid entries are
//! collected into a [`LoadReport`] while their siblings keep loading.

mod error;
mod parser;
mod report;
pub mod signature;
mod sources;
mod store;
mod types;
mod validator;

pub use error::{CatalogError, Result};
pub use parser::{parse_document, ParsedDocument, RawEntry};
pub use validator::validate_entry;
pub use report::{DocumentFailure, FailureKind, LoadReport, ParseIssue, ValidationIssue};
pub use sources::{discover, Source, SourceKind};
pub use store::{CaseIndex, CaseStore, LoadOptions, StoreState};
pub use types::{
    CrossRef, CrossRefKind, EntryKey, HardCaseEntry, Signature, Technology, UnknownTechnology,
};
