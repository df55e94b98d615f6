//! Postgres-backed IncidentStore.
//!
//! Every merge is applied inside one transaction: the canonical upsert, the
//! absorbed delete, and the citation rewrite commit together or not at all.
//! The UNIQUE (incident_id, url) constraint on incident_sources backstops
//! citation idempotence against concurrent writers.

use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::{debug, info};
use uuid::Uuid;

use skywatch_common::{AssetType, GeoPoint, IncidentRecord, Source, SourceCitation, SourceType};

use crate::traits::IncidentStore;

// ---------------------------------------------------------------------------
// Schema
// ---------------------------------------------------------------------------

/// Create the tables if they don't exist. Called once at startup.
pub async fn migrate(pool: &PgPool) -> Result<()> {
    info!("Running schema migrations...");

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS sources (
            id           UUID         PRIMARY KEY,
            domain       TEXT         NOT NULL,
            source_type  TEXT         NOT NULL,
            trust_weight SMALLINT     NOT NULL DEFAULT 1,
            UNIQUE (domain, source_type)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS incidents (
            id             UUID         PRIMARY KEY,
            title          TEXT         NOT NULL DEFAULT '',
            narrative      TEXT         NOT NULL DEFAULT '',
            asset_type     TEXT         NOT NULL DEFAULT 'other',
            lat            DOUBLE PRECISION,
            lng            DOUBLE PRECISION,
            occurred_at    TIMESTAMPTZ,
            first_seen_at  TIMESTAMPTZ  NOT NULL DEFAULT now(),
            last_seen_at   TIMESTAMPTZ  NOT NULL DEFAULT now(),
            evidence_score SMALLINT     NOT NULL DEFAULT 1
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS incident_sources (
            id           UUID         PRIMARY KEY,
            incident_id  UUID         NOT NULL REFERENCES incidents(id) ON DELETE CASCADE,
            source_id    UUID         NOT NULL REFERENCES sources(id),
            url          TEXT         NOT NULL,
            title        TEXT,
            quote        TEXT,
            published_at TIMESTAMPTZ,
            position     INTEGER      NOT NULL DEFAULT 0,
            UNIQUE (incident_id, url)
        )
        "#,
    )
    .execute(pool)
    .await?;

    info!("Schema ready");
    Ok(())
}

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

#[derive(Debug, sqlx::FromRow)]
struct IncidentRow {
    id: Uuid,
    title: String,
    narrative: String,
    asset_type: String,
    lat: Option<f64>,
    lng: Option<f64>,
    occurred_at: Option<DateTime<Utc>>,
    first_seen_at: DateTime<Utc>,
    last_seen_at: DateTime<Utc>,
    evidence_score: i16,
}

impl IncidentRow {
    /// Citations are stitched in by the caller.
    fn into_record(self) -> IncidentRecord {
        let location = match (self.lat, self.lng) {
            (Some(lat), Some(lng)) => Some(GeoPoint { lat, lng }),
            _ => None,
        };
        IncidentRecord {
            id: self.id,
            title: self.title,
            narrative: self.narrative,
            asset_type: AssetType::from_str_loose(&self.asset_type),
            location,
            occurred_at: self.occurred_at,
            first_seen_at: self.first_seen_at,
            last_seen_at: self.last_seen_at,
            evidence_score: self.evidence_score.clamp(1, 4) as u8,
            sources: Vec::new(),
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct CitationRow {
    id: Uuid,
    incident_id: Uuid,
    source_id: Uuid,
    url: String,
    title: Option<String>,
    quote: Option<String>,
    published_at: Option<DateTime<Utc>>,
}

impl CitationRow {
    fn into_citation(self) -> SourceCitation {
        SourceCitation {
            id: self.id,
            source_id: self.source_id,
            url: self.url,
            title: self.title,
            quote: self.quote,
            published_at: self.published_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct SourceRow {
    id: Uuid,
    domain: String,
    source_type: String,
    trust_weight: i16,
}

impl SourceRow {
    fn into_source(self) -> Source {
        Source {
            id: self.id,
            domain: self.domain,
            source_type: SourceType::from_str_loose(&self.source_type),
            trust_weight: self.trust_weight.clamp(1, 4) as u8,
        }
    }
}

// ---------------------------------------------------------------------------
// PgIncidentStore
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct PgIncidentStore {
    pool: PgPool,
}

impl PgIncidentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl IncidentStore for PgIncidentStore {
    async fn load_incidents(&self) -> Result<Vec<IncidentRecord>> {
        let rows = sqlx::query_as::<_, IncidentRow>(
            r#"
            SELECT id, title, narrative, asset_type, lat, lng, occurred_at,
                   first_seen_at, last_seen_at, evidence_score
            FROM incidents
            ORDER BY id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let citation_rows = sqlx::query_as::<_, CitationRow>(
            r#"
            SELECT id, incident_id, source_id, url, title, quote, published_at
            FROM incident_sources
            ORDER BY incident_id, position, id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut by_incident: HashMap<Uuid, Vec<SourceCitation>> = HashMap::new();
        for row in citation_rows {
            by_incident
                .entry(row.incident_id)
                .or_default()
                .push(row.into_citation());
        }

        let records: Vec<IncidentRecord> = rows
            .into_iter()
            .map(|row| {
                let mut record = row.into_record();
                record.sources = by_incident.remove(&record.id).unwrap_or_default();
                record
            })
            .collect();

        debug!(records = records.len(), "Loaded active incident set");
        Ok(records)
    }

    async fn load_sources(&self) -> Result<Vec<Source>> {
        let rows = sqlx::query_as::<_, SourceRow>(
            r#"
            SELECT id, domain, source_type, trust_weight
            FROM sources
            ORDER BY domain, id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(SourceRow::into_source).collect())
    }

    async fn upsert_source(&self, source: &Source) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO sources (id, domain, source_type, trust_weight)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (id) DO UPDATE SET
                domain = EXCLUDED.domain,
                source_type = EXCLUDED.source_type,
                trust_weight = EXCLUDED.trust_weight
            "#,
        )
        .bind(source.id)
        .bind(&source.domain)
        .bind(source.source_type.to_string())
        .bind(source.trust_weight as i16)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn apply_merge(&self, canonical: &IncidentRecord, absorbed_id: Uuid) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO incidents (id, title, narrative, asset_type, lat, lng, occurred_at,
                                   first_seen_at, last_seen_at, evidence_score)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (id) DO UPDATE SET
                title = EXCLUDED.title,
                narrative = EXCLUDED.narrative,
                asset_type = EXCLUDED.asset_type,
                lat = EXCLUDED.lat,
                lng = EXCLUDED.lng,
                occurred_at = EXCLUDED.occurred_at,
                first_seen_at = EXCLUDED.first_seen_at,
                last_seen_at = EXCLUDED.last_seen_at,
                evidence_score = EXCLUDED.evidence_score
            "#,
        )
        .bind(canonical.id)
        .bind(&canonical.title)
        .bind(&canonical.narrative)
        .bind(canonical.asset_type.to_string())
        .bind(canonical.location.map(|p| p.lat))
        .bind(canonical.location.map(|p| p.lng))
        .bind(canonical.occurred_at)
        .bind(canonical.first_seen_at)
        .bind(canonical.last_seen_at)
        .bind(canonical.evidence_score as i16)
        .execute(&mut *tx)
        .await?;

        // Rewrite the canonical citation list wholesale so re-homed citations
        // keep their ids and the stored order matches the record.
        sqlx::query("DELETE FROM incident_sources WHERE incident_id = $1")
            .bind(canonical.id)
            .execute(&mut *tx)
            .await?;

        // Absorbed row goes before the citation insert: the cascade clears its
        // citation rows so the re-homed ones can't collide on id.
        sqlx::query("DELETE FROM incidents WHERE id = $1")
            .bind(absorbed_id)
            .execute(&mut *tx)
            .await?;

        for (position, citation) in canonical.sources.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO incident_sources (id, incident_id, source_id, url, title, quote,
                                              published_at, position)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                ON CONFLICT (incident_id, url) DO NOTHING
                "#,
            )
            .bind(citation.id)
            .bind(canonical.id)
            .bind(citation.source_id)
            .bind(&citation.url)
            .bind(citation.title.as_deref())
            .bind(citation.quote.as_deref())
            .bind(citation.published_at)
            .bind(position as i32)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }
}
