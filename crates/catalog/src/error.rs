use crate::report::LoadReport;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, CatalogError>;

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("catalog is not loaded yet")]
    NotReady,

    #[error("load produced zero usable entries ({} documents, {} failures)", report.documents, report.document_failures.len())]
    LoadExhausted { report: Box<LoadReport> },
}
