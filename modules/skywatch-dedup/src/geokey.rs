//! Coarse spatial bucketing for the proximity scan.

use skywatch_common::AssetType;

/// Upper bound on the separation of two points whose coordinates round into
/// the same key cell. A 0.001-degree cell is ~111m tall and at most ~111m
/// wide (narrower away from the equator), so the diagonal stays under 160m.
pub const SAME_CELL_MAX_METERS: f64 = 160.0;

/// Spatial fingerprint: lat/lng rounded to three decimals plus the asset
/// type. Equal keys mean "same ~100m cell, same facility kind" and can be
/// accepted without a distance check whenever the merge radius is at least
/// [`SAME_CELL_MAX_METERS`]. Differing keys prove nothing (near neighbors
/// straddle cell borders), so a key mismatch never rejects a pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GeoKey(String);

impl GeoKey {
    pub fn new(lat: f64, lng: f64, asset_type: AssetType) -> Self {
        let lat_r = round3(lat);
        let lng_r = round3(lng);
        GeoKey(format!("{lat_r:.3}:{lng_r:.3}:{asset_type}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for GeoKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

fn round3(v: f64) -> f64 {
    let r = (v * 1000.0).round() / 1000.0;
    // -0.0 formats with a sign; collapse it so -0.0004 and 0.0004 share a key.
    if r == 0.0 {
        0.0
    } else {
        r
    }
}
