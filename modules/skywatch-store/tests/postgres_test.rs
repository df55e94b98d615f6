//! Integration tests for PgIncidentStore.
//! Requires a Postgres instance. Set DATABASE_TEST_URL or these tests are skipped.

use chrono::{TimeZone, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use skywatch_common::{AssetType, GeoPoint, IncidentRecord, Source, SourceCitation, SourceType};
use skywatch_store::{migrate, IncidentStore, PgIncidentStore};

/// Get a test database pool, or skip if no test DB is available.
async fn test_pool() -> Option<PgPool> {
    let url = std::env::var("DATABASE_TEST_URL").ok()?;
    let pool = PgPool::connect(&url).await.ok()?;

    migrate(&pool).await.ok()?;

    // Clean slate for each test
    sqlx::query("TRUNCATE incident_sources, incidents, sources CASCADE")
        .execute(&pool)
        .await
        .ok()?;

    Some(pool)
}

fn source(domain: &str, source_type: SourceType, trust_weight: u8) -> Source {
    Source {
        id: Uuid::new_v4(),
        domain: domain.to_string(),
        source_type,
        trust_weight,
    }
}

fn citation(source: &Source, url: &str) -> SourceCitation {
    SourceCitation {
        id: Uuid::new_v4(),
        source_id: source.id,
        url: url.to_string(),
        title: Some("Drone sighting".to_string()),
        quote: None,
        published_at: Some(Utc.with_ymd_and_hms(2026, 3, 1, 8, 0, 0).unwrap()),
    }
}

fn incident(title: &str) -> IncidentRecord {
    let seen = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap();
    IncidentRecord {
        id: Uuid::new_v4(),
        title: title.to_string(),
        narrative: "Unidentified drone reported by tower staff.".to_string(),
        asset_type: AssetType::Airport,
        location: Some(GeoPoint {
            lat: 55.618,
            lng: 12.656,
        }),
        occurred_at: Some(Utc.with_ymd_and_hms(2026, 3, 1, 6, 30, 0).unwrap()),
        first_seen_at: seen,
        last_seen_at: seen,
        evidence_score: 2,
        sources: vec![],
    }
}

/// Insert a record through the merge path (absorbing a nonexistent id is a
/// plain upsert).
async fn seed(store: &PgIncidentStore, record: &IncidentRecord) {
    store.apply_merge(record, Uuid::new_v4()).await.unwrap();
}

// =========================================================================
// Round-trip
// =========================================================================

#[tokio::test]
async fn roundtrip_preserves_fields_and_citation_order() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let store = PgIncidentStore::new(pool);

    let police = source("politi.dk", SourceType::Police, 3);
    let media = source("dr.dk", SourceType::Media, 2);
    store.upsert_source(&police).await.unwrap();
    store.upsert_source(&media).await.unwrap();

    let mut record = incident("Drone closed runway 22L");
    record.sources = vec![
        citation(&police, "https://politi.dk/presse/1"),
        citation(&media, "https://dr.dk/nyheder/1"),
    ];
    seed(&store, &record).await;

    let loaded = store.load_incidents().await.unwrap();
    assert_eq!(loaded.len(), 1);
    let got = &loaded[0];
    assert_eq!(got.id, record.id);
    assert_eq!(got.title, record.title);
    assert_eq!(got.asset_type, AssetType::Airport);
    assert_eq!(got.location, record.location);
    assert_eq!(got.occurred_at, record.occurred_at);
    assert_eq!(got.evidence_score, 2);
    // Stored order is the in-record order (position column).
    assert_eq!(got.sources.len(), 2);
    assert_eq!(got.sources[0].url, "https://politi.dk/presse/1");
    assert_eq!(got.sources[1].url, "https://dr.dk/nyheder/1");
}

#[tokio::test]
async fn null_location_and_occurred_at_load_as_none() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let store = PgIncidentStore::new(pool);

    let mut record = incident("Report without coordinates");
    record.location = None;
    record.occurred_at = None;
    seed(&store, &record).await;

    let loaded = store.load_incidents().await.unwrap();
    assert_eq!(loaded.len(), 1);
    assert!(loaded[0].location.is_none());
    assert!(loaded[0].occurred_at.is_none());
}

#[tokio::test]
async fn unknown_asset_type_degrades_to_other() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let store = PgIncidentStore::new(pool.clone());

    let record = incident("Legacy row");
    seed(&store, &record).await;

    sqlx::query("UPDATE incidents SET asset_type = 'zeppelin_mast' WHERE id = $1")
        .bind(record.id)
        .execute(&pool)
        .await
        .unwrap();

    let loaded = store.load_incidents().await.unwrap();
    assert_eq!(loaded[0].asset_type, AssetType::Other);
}

#[tokio::test]
async fn out_of_range_trust_weight_clamps_on_read() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let store = PgIncidentStore::new(pool.clone());

    let src = source("legacy.example", SourceType::Media, 2);
    store.upsert_source(&src).await.unwrap();

    sqlx::query("UPDATE sources SET trust_weight = 9 WHERE id = $1")
        .bind(src.id)
        .execute(&pool)
        .await
        .unwrap();

    let sources = store.load_sources().await.unwrap();
    assert_eq!(sources[0].trust_weight, 4);
}

// =========================================================================
// Merge application
// =========================================================================

#[tokio::test]
async fn apply_merge_is_atomic_and_rehomes_citations() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let store = PgIncidentStore::new(pool);

    let police = source("politi.dk", SourceType::Police, 3);
    let media = source("tv2.dk", SourceType::Media, 2);
    store.upsert_source(&police).await.unwrap();
    store.upsert_source(&media).await.unwrap();

    let mut canonical = incident("First report");
    canonical.sources = vec![citation(&police, "https://politi.dk/presse/9")];
    let mut absorbed = incident("Second report");
    let moved = citation(&media, "https://tv2.dk/artikel/9");
    absorbed.sources = vec![moved.clone()];
    seed(&store, &canonical).await;
    seed(&store, &absorbed).await;

    // The engine hands over the post-merge canonical with both citations.
    canonical.sources.push(moved.clone());
    canonical.evidence_score = 3;
    store.apply_merge(&canonical, absorbed.id).await.unwrap();

    let loaded = store.load_incidents().await.unwrap();
    assert_eq!(loaded.len(), 1);
    let got = &loaded[0];
    assert_eq!(got.id, canonical.id);
    assert_eq!(got.evidence_score, 3);
    assert_eq!(got.sources.len(), 2);
    // The moved citation keeps its row id under the new parent.
    assert!(got.sources.iter().any(|c| c.id == moved.id));
}

#[tokio::test]
async fn citation_urls_are_unique_per_incident() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let store = PgIncidentStore::new(pool);

    let media = source("dr.dk", SourceType::Media, 2);
    store.upsert_source(&media).await.unwrap();

    let mut record = incident("Duplicate URL rows");
    let first = citation(&media, "https://dr.dk/nyheder/7");
    record.sources = vec![first.clone(), citation(&media, "https://dr.dk/nyheder/7")];
    seed(&store, &record).await;

    let loaded = store.load_incidents().await.unwrap();
    assert_eq!(loaded[0].sources.len(), 1);
    assert_eq!(loaded[0].sources[0].id, first.id, "first insert wins");
}

#[tokio::test]
async fn upsert_source_roundtrips_and_updates() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let store = PgIncidentStore::new(pool);

    let mut src = source("naviair.dk", SourceType::Aviation, 3);
    store.upsert_source(&src).await.unwrap();
    src.trust_weight = 4;
    store.upsert_source(&src).await.unwrap();

    let sources = store.load_sources().await.unwrap();
    assert_eq!(sources.len(), 1);
    assert_eq!(sources[0].source_type, SourceType::Aviation);
    assert_eq!(sources[0].trust_weight, 4);
}
