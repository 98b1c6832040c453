//! Persistence collaborator.
//!
//! Records are keyed by DOI, and verdicts additionally by item ID. The only
//! mutation is upsert: a verdict replaces any verdict for the same
//! (doi, item_id) and a summary replaces the whole prior summary for its DOI.

use async_trait::async_trait;
use thiserror::Error;

use repcheck_core::{AnalysisSummary, ChecklistItem, ComplianceVerdict, Manuscript};

mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Stored document is corrupt: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Record rejected: {0}")]
    Invalid(String),
}

#[async_trait]
pub trait ComplianceStore: Send + Sync {
    async fn upsert_verdict(&self, verdict: &ComplianceVerdict) -> Result<(), StoreError>;

    /// All verdicts for a DOI, in item ordinal order.
    async fn get_verdicts(&self, doi: &str) -> Result<Vec<ComplianceVerdict>, StoreError>;

    async fn upsert_summary(&self, summary: &AnalysisSummary) -> Result<(), StoreError>;

    async fn get_summary(&self, doi: &str) -> Result<Option<AnalysisSummary>, StoreError>;

    async fn upsert_manuscript(&self, manuscript: &Manuscript) -> Result<(), StoreError>;

    async fn get_manuscript(&self, doi: &str) -> Result<Option<Manuscript>, StoreError>;

    /// The checklist the store was set up with, in ordinal order.
    async fn get_checklist_items(&self) -> Result<Vec<ChecklistItem>, StoreError>;
}

fn require_doi(doi: &str) -> Result<(), StoreError> {
    if doi.trim().is_empty() {
        return Err(StoreError::Invalid("doi must not be empty".to_string()));
    }
    Ok(())
}
