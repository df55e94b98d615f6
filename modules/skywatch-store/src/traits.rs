//! Core persistence trait for the dedup engine.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use uuid::Uuid;

use skywatch_common::{IncidentRecord, Source};

/// Everything the dedup engine needs from persistence.
///
/// Implemented by PgIncidentStore (postgres) and MemoryIncidentStore (tests).
/// Also implemented for `Arc<S>` so tests can keep a handle for assertions.
#[async_trait]
pub trait IncidentStore: Send + Sync {
    /// Load the full active incident set, citations attached, in stable order.
    async fn load_incidents(&self) -> Result<Vec<IncidentRecord>>;

    /// Load all known sources.
    async fn load_sources(&self) -> Result<Vec<Source>>;

    /// Insert or update a source by id.
    async fn upsert_source(&self, source: &Source) -> Result<()>;

    /// Apply one merge as a single atomic write: persist the post-merge
    /// canonical record (including its full citation list) and delete the
    /// absorbed record. A reader must never observe one half without the
    /// other.
    async fn apply_merge(&self, canonical: &IncidentRecord, absorbed_id: Uuid) -> Result<()>;
}

#[async_trait]
impl<S: IncidentStore + ?Sized> IncidentStore for Arc<S> {
    async fn load_incidents(&self) -> Result<Vec<IncidentRecord>> {
        (**self).load_incidents().await
    }

    async fn load_sources(&self) -> Result<Vec<Source>> {
        (**self).load_sources().await
    }

    async fn upsert_source(&self, source: &Source) -> Result<()> {
        (**self).upsert_source(source).await
    }

    async fn apply_merge(&self, canonical: &IncidentRecord, absorbed_id: Uuid) -> Result<()> {
        (**self).apply_merge(canonical, absorbed_id).await
    }
}
