//! Engine configuration: per-asset merge radii and run bounds.

use skywatch_common::AssetType;

/// Merge radius per asset type, in meters. Two same-type records are
/// duplicates when their great-circle distance is at most this (boundary
/// inclusive). Radii reflect facility footprints: an airport perimeter is
/// kilometers across, a bridge is not.
#[derive(Debug, Clone, PartialEq)]
pub struct RadiusTable {
    pub airport: f64,
    pub military: f64,
    pub harbor: f64,
    pub powerplant: f64,
    pub bridge: f64,
    pub other: f64,
}

impl Default for RadiusTable {
    fn default() -> Self {
        Self {
            airport: 3000.0,
            military: 3000.0,
            harbor: 1500.0,
            powerplant: 1000.0,
            bridge: 500.0,
            other: 500.0,
        }
    }
}

impl RadiusTable {
    pub fn meters_for(&self, asset_type: AssetType) -> f64 {
        match asset_type {
            AssetType::Airport => self.airport,
            AssetType::Military => self.military,
            AssetType::Harbor => self.harbor,
            AssetType::Powerplant => self.powerplant,
            AssetType::Bridge => self.bridge,
            AssetType::Other => self.other,
        }
    }
}

/// Everything the dedup engine needs to know about a run.
#[derive(Debug, Clone)]
pub struct DedupConfig {
    pub radii: RadiusTable,
    /// Merge bound per run. Hitting it ends the run with a warning; the next
    /// run resumes from persisted state.
    pub max_iterations: usize,
    /// Domain of the synthesized source used for provenance citations.
    pub provenance_domain: String,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            radii: RadiusTable::default(),
            max_iterations: 10,
            provenance_domain: "skywatch.internal".to_string(),
        }
    }
}

impl DedupConfig {
    pub fn from_config(config: &skywatch_common::Config) -> Self {
        Self {
            radii: RadiusTable::default(),
            max_iterations: config.max_merge_iterations,
            provenance_domain: config.provenance_domain.clone(),
        }
    }
}
