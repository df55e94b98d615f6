//! In-memory IncidentStore for tests and fixtures; no database required.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use anyhow::Result;
use async_trait::async_trait;
use uuid::Uuid;

use skywatch_common::{IncidentRecord, Source};

use crate::traits::IncidentStore;

/// In-memory incident store. All mutation happens under one lock, so a merge
/// is observed whole or not at all, matching the transactional postgres store.
pub struct MemoryIncidentStore {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    incidents: HashMap<Uuid, IncidentRecord>,
    sources: HashMap<Uuid, Source>,
}

impl MemoryIncidentStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
        }
    }

    pub fn seed_incident(&self, record: IncidentRecord) {
        let mut inner = self.inner.lock().unwrap();
        inner.incidents.insert(record.id, record);
    }

    pub fn seed_source(&self, source: Source) {
        let mut inner = self.inner.lock().unwrap();
        inner.sources.insert(source.id, source);
    }

    /// Read one incident back (for test assertions).
    pub fn incident(&self, id: Uuid) -> Option<IncidentRecord> {
        self.inner.lock().unwrap().incidents.get(&id).cloned()
    }

    pub fn incident_count(&self) -> usize {
        self.inner.lock().unwrap().incidents.len()
    }

    pub fn source_count(&self) -> usize {
        self.inner.lock().unwrap().sources.len()
    }
}

impl Default for MemoryIncidentStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl IncidentStore for MemoryIncidentStore {
    async fn load_incidents(&self) -> Result<Vec<IncidentRecord>> {
        let inner = self.inner.lock().unwrap();
        let mut records: Vec<IncidentRecord> = inner.incidents.values().cloned().collect();
        records.sort_by_key(|r| r.id);
        Ok(records)
    }

    async fn load_sources(&self) -> Result<Vec<Source>> {
        let inner = self.inner.lock().unwrap();
        let mut sources: Vec<Source> = inner.sources.values().cloned().collect();
        sources.sort_by(|a, b| (&a.domain, a.id).cmp(&(&b.domain, b.id)));
        Ok(sources)
    }

    async fn upsert_source(&self, source: &Source) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.sources.insert(source.id, source.clone());
        Ok(())
    }

    async fn apply_merge(&self, canonical: &IncidentRecord, absorbed_id: Uuid) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();

        // Same uniqueness rule the postgres schema enforces on
        // (incident_id, url): first citation with a given URL wins.
        let mut stored = canonical.clone();
        let mut seen_urls = HashSet::new();
        stored.sources.retain(|c| seen_urls.insert(c.url.clone()));

        inner.incidents.insert(stored.id, stored);
        inner.incidents.remove(&absorbed_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use skywatch_common::{AssetType, GeoPoint, SourceCitation};

    fn record(title: &str) -> IncidentRecord {
        IncidentRecord {
            id: Uuid::new_v4(),
            title: title.to_string(),
            narrative: String::new(),
            asset_type: AssetType::Airport,
            location: Some(GeoPoint {
                lat: 55.618,
                lng: 12.656,
            }),
            occurred_at: Some(Utc::now()),
            first_seen_at: Utc::now(),
            last_seen_at: Utc::now(),
            evidence_score: 2,
            sources: vec![],
        }
    }

    fn citation(url: &str) -> SourceCitation {
        SourceCitation {
            id: Uuid::new_v4(),
            source_id: Uuid::new_v4(),
            url: url.to_string(),
            title: None,
            quote: None,
            published_at: None,
        }
    }

    #[tokio::test]
    async fn apply_merge_replaces_canonical_and_removes_absorbed() {
        let store = MemoryIncidentStore::new();
        let mut canonical = record("canonical");
        let absorbed = record("absorbed");
        store.seed_incident(canonical.clone());
        store.seed_incident(absorbed.clone());

        canonical.evidence_score = 3;
        canonical.sources.push(citation("https://a.example/1"));
        store.apply_merge(&canonical, absorbed.id).await.unwrap();

        assert_eq!(store.incident_count(), 1);
        assert!(store.incident(absorbed.id).is_none());
        let stored = store.incident(canonical.id).unwrap();
        assert_eq!(stored.evidence_score, 3);
        assert_eq!(stored.sources.len(), 1);
    }

    #[tokio::test]
    async fn apply_merge_dedups_citation_urls() {
        let store = MemoryIncidentStore::new();
        let mut canonical = record("canonical");
        let absorbed = record("absorbed");
        store.seed_incident(canonical.clone());
        store.seed_incident(absorbed.clone());

        let first = citation("https://a.example/1");
        let first_id = first.id;
        canonical.sources.push(first);
        canonical.sources.push(citation("https://a.example/1"));
        canonical.sources.push(citation("https://b.example/1"));
        store.apply_merge(&canonical, absorbed.id).await.unwrap();

        let stored = store.incident(canonical.id).unwrap();
        assert_eq!(stored.sources.len(), 2);
        assert_eq!(stored.sources[0].id, first_id, "first citation wins");
    }

    #[tokio::test]
    async fn apply_merge_twice_is_idempotent() {
        let store = MemoryIncidentStore::new();
        let canonical = record("canonical");
        let absorbed = record("absorbed");
        store.seed_incident(canonical.clone());
        store.seed_incident(absorbed.clone());

        store.apply_merge(&canonical, absorbed.id).await.unwrap();
        store.apply_merge(&canonical, absorbed.id).await.unwrap();

        assert_eq!(store.incident_count(), 1);
        assert_eq!(store.incident(canonical.id).unwrap(), canonical);
    }

    #[tokio::test]
    async fn load_incidents_returns_stable_order() {
        let store = MemoryIncidentStore::new();
        for i in 0..5 {
            store.seed_incident(record(&format!("r{i}")));
        }
        let a = store.load_incidents().await.unwrap();
        let b = store.load_incidents().await.unwrap();
        assert_eq!(a, b);
        assert!(a.windows(2).all(|w| w[0].id < w[1].id));
    }
}
