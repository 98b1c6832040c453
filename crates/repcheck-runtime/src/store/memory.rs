//! In-process store.

use std::collections::BTreeMap;

use async_trait::async_trait;
use parking_lot::RwLock;

use repcheck_core::{compare_item_ids, AnalysisSummary, Checklist, ChecklistItem, ComplianceVerdict, Manuscript};

use super::{require_doi, ComplianceStore, StoreError};

#[derive(Debug, Default)]
pub struct MemoryStore {
    checklist: Vec<ChecklistItem>,
    verdicts: RwLock<BTreeMap<String, BTreeMap<String, ComplianceVerdict>>>,
    summaries: RwLock<BTreeMap<String, AnalysisSummary>>,
    manuscripts: RwLock<BTreeMap<String, Manuscript>>,
}

impl MemoryStore {
    pub fn new(checklist: Checklist) -> Self {
        Self {
            checklist: checklist.into_items(),
            ..Default::default()
        }
    }
}

#[async_trait]
impl ComplianceStore for MemoryStore {
    async fn upsert_verdict(&self, verdict: &ComplianceVerdict) -> Result<(), StoreError> {
        require_doi(&verdict.doi)?;
        self.verdicts
            .write()
            .entry(verdict.doi.clone())
            .or_default()
            .insert(verdict.item_id.clone(), verdict.clone());
        Ok(())
    }

    async fn get_verdicts(&self, doi: &str) -> Result<Vec<ComplianceVerdict>, StoreError> {
        let mut verdicts: Vec<ComplianceVerdict> = self
            .verdicts
            .read()
            .get(doi)
            .map(|by_item| by_item.values().cloned().collect())
            .unwrap_or_default();
        verdicts.sort_by(|a, b| compare_item_ids(&a.item_id, &b.item_id));
        Ok(verdicts)
    }

    async fn upsert_summary(&self, summary: &AnalysisSummary) -> Result<(), StoreError> {
        require_doi(&summary.doi)?;
        self.summaries
            .write()
            .insert(summary.doi.clone(), summary.clone());
        Ok(())
    }

    async fn get_summary(&self, doi: &str) -> Result<Option<AnalysisSummary>, StoreError> {
        Ok(self.summaries.read().get(doi).cloned())
    }

    async fn upsert_manuscript(&self, manuscript: &Manuscript) -> Result<(), StoreError> {
        require_doi(&manuscript.doi)?;
        self.manuscripts
            .write()
            .insert(manuscript.doi.clone(), manuscript.clone());
        Ok(())
    }

    async fn get_manuscript(&self, doi: &str) -> Result<Option<Manuscript>, StoreError> {
        Ok(self.manuscripts.read().get(doi).cloned())
    }

    async fn get_checklist_items(&self) -> Result<Vec<ChecklistItem>, StoreError> {
        Ok(self.checklist.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use repcheck_core::Compliance;

    fn verdict(item_id: &str, compliance: Compliance) -> ComplianceVerdict {
        ComplianceVerdict {
            doi: "10.1/abc".to_string(),
            item_id: item_id.to_string(),
            question: "q".to_string(),
            compliance,
            explanation: "e".to_string(),
            quote: String::new(),
            section: String::new(),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_upsert_replaces_same_item() {
        let store = MemoryStore::default();
        store.upsert_verdict(&verdict("1.1", Compliance::No)).await.unwrap();
        store.upsert_verdict(&verdict("1.1", Compliance::Yes)).await.unwrap();

        let verdicts = store.get_verdicts("10.1/abc").await.unwrap();
        assert_eq!(verdicts.len(), 1);
        assert_eq!(verdicts[0].compliance, Compliance::Yes);
    }

    #[tokio::test]
    async fn test_verdicts_in_ordinal_order() {
        let store = MemoryStore::default();
        for id in ["2.1", "1.10", "1.9"] {
            store.upsert_verdict(&verdict(id, Compliance::Yes)).await.unwrap();
        }
        let ids: Vec<String> = store
            .get_verdicts("10.1/abc")
            .await
            .unwrap()
            .into_iter()
            .map(|v| v.item_id)
            .collect();
        assert_eq!(ids, vec!["1.9", "1.10", "2.1"]);
        assert!(store.get_verdicts("10.1/other").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_empty_doi_rejected() {
        let store = MemoryStore::default();
        let mut v = verdict("1", Compliance::Yes);
        v.doi = " ".to_string();
        assert!(matches!(store.upsert_verdict(&v).await, Err(StoreError::Invalid(_))));
    }

    #[tokio::test]
    async fn test_checklist_items_returned() {
        let checklist = Checklist::from_items(vec![
            ChecklistItem::new("2", "B", "q2"),
            ChecklistItem::new("1", "A", "q1"),
        ])
        .unwrap();
        let store = MemoryStore::new(checklist);
        let items = store.get_checklist_items().await.unwrap();
        assert_eq!(items[0].item_id, "1");
    }
}
