//! Directory-backed store: one JSON document per DOI.
//!
//! Each document is rewritten whole through a temporary file and a rename,
//! so a crash mid-write leaves the previous version intact.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::sync::Mutex;

use repcheck_core::{compare_item_ids, AnalysisSummary, Checklist, ChecklistItem, ComplianceVerdict, Manuscript};

use super::{require_doi, ComplianceStore, StoreError};

/// Longest file stem written, leaving room for `.json.tmp` under the
/// common 255-byte name limit.
const MAX_STEM_BYTES: usize = 200;

/// Hex digits of the DOI digest appended to a shortened stem.
const DIGEST_HEX_CHARS: usize = 16;

#[derive(Debug, Default, Serialize, Deserialize)]
struct ManuscriptDocument {
    doi: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    manuscript: Option<Manuscript>,

    #[serde(default)]
    verdicts: Vec<ComplianceVerdict>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    summary: Option<AnalysisSummary>,
}

#[derive(Debug)]
pub struct FileStore {
    root: PathBuf,
    checklist: Vec<ChecklistItem>,
    write_lock: Mutex<()>,
}

impl FileStore {
    /// Open (creating if needed) a store directory.
    pub async fn open(root: impl Into<PathBuf>, checklist: Checklist) -> Result<Self, StoreError> {
        let root = root.into();
        tokio::fs::create_dir_all(&root).await?;
        Ok(Self {
            root,
            checklist: checklist.into_items(),
            write_lock: Mutex::new(()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn document_path(&self, doi: &str) -> PathBuf {
        self.root.join(format!("{}.json", encode_doi(doi)))
    }

    async fn load(&self, doi: &str) -> Result<ManuscriptDocument, StoreError> {
        let path = self.document_path(doi);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(ManuscriptDocument {
                doi: doi.to_string(),
                ..Default::default()
            }),
            Err(e) => Err(e.into()),
        }
    }

    async fn save(&self, document: &ManuscriptDocument) -> Result<(), StoreError> {
        let path = self.document_path(&document.doi);
        let tmp = path.with_extension("json.tmp");
        let bytes = serde_json::to_vec_pretty(document)?;
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, &path).await?;
        tracing::debug!(doi = %document.doi, path = %path.display(), "Wrote manuscript document");
        Ok(())
    }

    /// Load, modify and save one document under the write lock.
    async fn update<F>(&self, doi: &str, apply: F) -> Result<(), StoreError>
    where
        F: FnOnce(&mut ManuscriptDocument) + Send,
    {
        require_doi(doi)?;
        let _guard = self.write_lock.lock().await;
        let mut document = self.load(doi).await?;
        apply(&mut document);
        self.save(&document).await
    }
}

/// Map a DOI to a file stem.
///
/// Alphanumerics, `.`, `-` and `_` pass through; every other byte becomes
/// `%XX`. An encoding longer than [`MAX_STEM_BYTES`] is cut and suffixed
/// with `~` and a SHA-256 prefix of the DOI. `~` is always escaped in the
/// plain encoding, so shortened stems never collide with full ones.
fn encode_doi(doi: &str) -> String {
    let mut out = String::with_capacity(doi.len());
    for byte in doi.bytes() {
        if byte.is_ascii_alphanumeric() || matches!(byte, b'.' | b'-' | b'_') {
            out.push(byte as char);
        } else {
            out.push_str(&format!("%{byte:02X}"));
        }
    }

    if out.len() > MAX_STEM_BYTES {
        let digest = format!("{:x}", Sha256::digest(doi.as_bytes()));
        // The encoding is pure ASCII, so any cut is a char boundary.
        out.truncate(MAX_STEM_BYTES - DIGEST_HEX_CHARS - 1);
        out.push('~');
        out.push_str(&digest[..DIGEST_HEX_CHARS]);
    }
    out
}

#[async_trait]
impl ComplianceStore for FileStore {
    async fn upsert_verdict(&self, verdict: &ComplianceVerdict) -> Result<(), StoreError> {
        self.update(&verdict.doi, |doc| {
            doc.verdicts.retain(|v| v.item_id != verdict.item_id);
            doc.verdicts.push(verdict.clone());
            doc.verdicts.sort_by(|a, b| compare_item_ids(&a.item_id, &b.item_id));
        })
        .await
    }

    async fn get_verdicts(&self, doi: &str) -> Result<Vec<ComplianceVerdict>, StoreError> {
        let mut verdicts = self.load(doi).await?.verdicts;
        verdicts.sort_by(|a, b| compare_item_ids(&a.item_id, &b.item_id));
        Ok(verdicts)
    }

    async fn upsert_summary(&self, summary: &AnalysisSummary) -> Result<(), StoreError> {
        self.update(&summary.doi, |doc| doc.summary = Some(summary.clone()))
            .await
    }

    async fn get_summary(&self, doi: &str) -> Result<Option<AnalysisSummary>, StoreError> {
        Ok(self.load(doi).await?.summary)
    }

    async fn upsert_manuscript(&self, manuscript: &Manuscript) -> Result<(), StoreError> {
        self.update(&manuscript.doi, |doc| doc.manuscript = Some(manuscript.clone()))
            .await
    }

    async fn get_manuscript(&self, doi: &str) -> Result<Option<Manuscript>, StoreError> {
        Ok(self.load(doi).await?.manuscript)
    }

    async fn get_checklist_items(&self) -> Result<Vec<ChecklistItem>, StoreError> {
        Ok(self.checklist.clone())
    }
}
