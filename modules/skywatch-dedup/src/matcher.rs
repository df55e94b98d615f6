//! Proximity matching over the active incident set.
//!
//! Pure functions: screening splits records into matchable candidates and
//! malformed reports, and the pair scan returns the first merge-eligible
//! pair under a deterministic order. All store I/O lives in the engine.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use skywatch_common::{haversine_meters, AssetType, GeoPoint, IncidentRecord};

use crate::config::RadiusTable;
use crate::geokey::{GeoKey, SAME_CELL_MAX_METERS};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// A record eligible for matching: location and occurred_at both present.
#[derive(Debug, Clone)]
pub struct MatchCandidate {
    pub id: Uuid,
    pub asset_type: AssetType,
    pub location: GeoPoint,
    pub occurred_at: DateTime<Utc>,
    pub geo_key: GeoKey,
}

/// Why a record was excluded from matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MalformedReason {
    MissingLocation,
    MissingOccurredAt,
}

impl std::fmt::Display for MalformedReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MalformedReason::MissingLocation => write!(f, "missing_location"),
            MalformedReason::MissingOccurredAt => write!(f, "missing_occurred_at"),
        }
    }
}

/// A record excluded from matching. It stays in the store untouched and is
/// reported once per run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MalformedRecord {
    pub id: Uuid,
    pub reason: MalformedReason,
}

/// The first merge-eligible pair found by a scan, in scan order.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchedPair {
    pub first: Uuid,
    pub second: Uuid,
    pub distance_meters: f64,
}

// ---------------------------------------------------------------------------
// Pure decision functions
// ---------------------------------------------------------------------------

/// Split the active set into matchable candidates and malformed reports.
pub fn screen_records(records: &[IncidentRecord]) -> (Vec<MatchCandidate>, Vec<MalformedRecord>) {
    let mut candidates = Vec::with_capacity(records.len());
    let mut malformed = Vec::new();

    for record in records {
        let Some(location) = record.location else {
            malformed.push(MalformedRecord {
                id: record.id,
                reason: MalformedReason::MissingLocation,
            });
            continue;
        };
        let Some(occurred_at) = record.occurred_at else {
            malformed.push(MalformedRecord {
                id: record.id,
                reason: MalformedReason::MissingOccurredAt,
            });
            continue;
        };
        candidates.push(MatchCandidate {
            id: record.id,
            asset_type: record.asset_type,
            location,
            occurred_at,
            geo_key: GeoKey::new(location.lat, location.lng, record.asset_type),
        });
    }

    (candidates, malformed)
}

/// Find the next duplicate pair.
///
/// Candidates are scanned sorted by (occurred_at, id), pairs visited (i, j)
/// with i < j, and the first hit wins, so the merge sequence is reproducible
/// for a given record set no matter how storage ordered it. Pairs in `skip`
/// (keyed by scan orientation) are stepped over so one bad pair can't wedge
/// a run.
pub fn find_next_merge_pair(
    candidates: &[MatchCandidate],
    radii: &RadiusTable,
    skip: &HashSet<(Uuid, Uuid)>,
) -> Option<MatchedPair> {
    let mut ordered: Vec<&MatchCandidate> = candidates.iter().collect();
    ordered.sort_by(|a, b| (a.occurred_at, a.id).cmp(&(b.occurred_at, b.id)));

    for i in 0..ordered.len() {
        for j in (i + 1)..ordered.len() {
            let (a, b) = (ordered[i], ordered[j]);
            if a.asset_type != b.asset_type {
                continue;
            }
            if skip.contains(&(a.id, b.id)) {
                continue;
            }
            let radius = radii.meters_for(a.asset_type);
            if let Some(distance_meters) = eligible_distance(a, b, radius) {
                return Some(MatchedPair {
                    first: a.id,
                    second: b.id,
                    distance_meters,
                });
            }
        }
    }

    None
}

/// Distance between the pair if it is merge-eligible (boundary inclusive).
/// A shared key cell is accepted outright when the radius covers the cell
/// diagonal; the distance is still computed for the merge log.
fn eligible_distance(a: &MatchCandidate, b: &MatchCandidate, radius: f64) -> Option<f64> {
    if radius >= SAME_CELL_MAX_METERS && a.geo_key == b.geo_key {
        return Some(distance_between(a, b));
    }
    let distance = distance_between(a, b);
    (distance <= radius).then_some(distance)
}

fn distance_between(a: &MatchCandidate, b: &MatchCandidate) -> f64 {
    haversine_meters(
        a.location.lat,
        a.location.lng,
        b.location.lat,
        b.location.lng,
    )
}

// ===========================================================================
// Unit tests
// ===========================================================================
