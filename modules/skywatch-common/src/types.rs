use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// --- Geo Types ---

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

/// Haversine great-circle distance between two lat/lng points in meters.
pub fn haversine_meters(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    const EARTH_RADIUS_METERS: f64 = 6_371_000.0;
    let d_lat = (lat2 - lat1).to_radians();
    let d_lng = (lng2 - lng1).to_radians();
    let lat1_r = lat1.to_radians();
    let lat2_r = lat2.to_radians();

    let a = (d_lat / 2.0).sin().powi(2) + lat1_r.cos() * lat2_r.cos() * (d_lng / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().asin();
    EARTH_RADIUS_METERS * c
}

// --- Enums ---

/// The kind of facility a drone sighting was reported near. Merge radii are
/// looked up per asset type, so two records can only ever merge within a type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetType {
    Airport,
    Military,
    Harbor,
    Powerplant,
    Bridge,
    Other,
}

impl std::fmt::Display for AssetType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AssetType::Airport => write!(f, "airport"),
            AssetType::Military => write!(f, "military"),
            AssetType::Harbor => write!(f, "harbor"),
            AssetType::Powerplant => write!(f, "powerplant"),
            AssetType::Bridge => write!(f, "bridge"),
            AssetType::Other => write!(f, "other"),
        }
    }
}

impl AssetType {
    /// Lenient parse for values coming from storage or upstream feeds.
    /// Unknown labels degrade to `Other` rather than failing the whole load.
    pub fn from_str_loose(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "airport" => Self::Airport,
            "military" => Self::Military,
            "harbor" | "harbour" | "port" => Self::Harbor,
            "powerplant" | "power_plant" => Self::Powerplant,
            "bridge" => Self::Bridge,
            _ => Self::Other,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    Police,
    Military,
    Aviation,
    Notam,
    Media,
    Social,
    Other,
}

impl std::fmt::Display for SourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceType::Police => write!(f, "police"),
            SourceType::Military => write!(f, "military"),
            SourceType::Aviation => write!(f, "aviation"),
            SourceType::Notam => write!(f, "notam"),
            SourceType::Media => write!(f, "media"),
            SourceType::Social => write!(f, "social"),
            SourceType::Other => write!(f, "other"),
        }
    }
}

impl SourceType {
    pub fn from_str_loose(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "police" => Self::Police,
            "military" => Self::Military,
            "aviation" | "aviation_authority" => Self::Aviation,
            "notam" => Self::Notam,
            "media" | "news" => Self::Media,
            "social" | "social_media" => Self::Social,
            _ => Self::Other,
        }
    }

    /// Official channels carry authority on their own: a single citation from
    /// one of these outweighs any number of media or social reports.
    pub fn is_official(&self) -> bool {
        matches!(
            self,
            Self::Police | Self::Military | Self::Aviation | Self::Notam
        )
    }
}

// --- Sources ---

/// A publishing outlet (newspaper, police department, NOTAM feed, ...).
/// Identity for reuse is `(domain, source_type)`; citations reference the id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    pub id: Uuid,
    pub domain: String,
    pub source_type: SourceType,
    /// Relative credibility, 1 (lowest) to 4; used only for citation ordering.
    pub trust_weight: u8,
}

/// One report URL attached to an incident. The same outlet (`source_id`) can
/// appear on many citations; distinctness for evidence scoring is counted per
/// outlet, not per citation row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceCitation {
    pub id: Uuid,
    pub source_id: Uuid,
    pub url: String,
    pub title: Option<String>,
    pub quote: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
}

/// In-memory lookup over all known sources, keyed by id with a secondary
/// `(domain, source_type)` identity for reuse instead of duplicate inserts.
#[derive(Debug, Clone, Default)]
pub struct SourceDirectory {
    by_id: HashMap<Uuid, Source>,
}

impl SourceDirectory {
    pub fn new(sources: Vec<Source>) -> Self {
        let by_id = sources.into_iter().map(|s| (s.id, s)).collect();
        Self { by_id }
    }

    pub fn get(&self, id: Uuid) -> Option<&Source> {
        self.by_id.get(&id)
    }

    /// Trust weight for ordering. Unknown source ids fall back to the floor
    /// weight so a dangling citation sorts last instead of breaking the run.
    pub fn trust_weight(&self, id: Uuid) -> u8 {
        self.by_id.get(&id).map(|s| s.trust_weight).unwrap_or(1)
    }

    pub fn is_official(&self, id: Uuid) -> bool {
        self.by_id
            .get(&id)
            .map(|s| s.source_type.is_official())
            .unwrap_or(false)
    }

    pub fn find_by_identity(&self, domain: &str, source_type: SourceType) -> Option<&Source> {
        self.by_id
            .values()
            .find(|s| s.domain == domain && s.source_type == source_type)
    }

    pub fn insert(&mut self, source: Source) {
        self.by_id.insert(source.id, source);
    }

    /// Look up a source by identity, creating it when absent. Returns the id
    /// and a copy of the source if it was newly created (so the caller can
    /// persist it).
    pub fn ensure(
        &mut self,
        domain: &str,
        source_type: SourceType,
        trust_weight: u8,
    ) -> (Uuid, Option<Source>) {
        if let Some(existing) = self.find_by_identity(domain, source_type) {
            return (existing.id, None);
        }
        let source = Source {
            id: Uuid::new_v4(),
            domain: domain.to_string(),
            source_type,
            trust_weight,
        };
        self.by_id.insert(source.id, source.clone());
        (source.id, Some(source))
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Source> {
        self.by_id.values()
    }
}

// --- Incident Records ---

/// A deduplicated drone-incident report. `location` and `occurred_at` are
/// optional because upstream feeds deliver malformed rows; records missing
/// either are carried through runs untouched but never matched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncidentRecord {
    pub id: Uuid,
    pub title: String,
    pub narrative: String,
    pub asset_type: AssetType,
    pub location: Option<GeoPoint>,
    /// When the sighting happened (as opposed to when it was reported).
    pub occurred_at: Option<DateTime<Utc>>,
    pub first_seen_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
    /// 1 = unverified, 2 = single-source, 3 = multi-source, 4 = official.
    pub evidence_score: u8,
    /// Citations ordered by trust weight desc, then published_at desc.
    pub sources: Vec<SourceCitation>,
}

impl IncidentRecord {
    pub fn has_citation_url(&self, url: &str) -> bool {
        self.sources.iter().any(|c| c.url == url)
    }

    /// Distinct outlets cited on this record.
    pub fn distinct_source_count(&self) -> usize {
        let mut ids: Vec<Uuid> = self.sources.iter().map(|c| c.source_id).collect();
        ids.sort_unstable();
        ids.dedup();
        ids.len()
    }
}
