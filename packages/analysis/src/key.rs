//! Request hashing for the result cache.

use serde::Serialize;
use sha2::{Digest, Sha256};
use zone_resource_analysis_models::{AnalysisOptions, AnalysisRequest};
use zone_resource_zone_models::{Building, LatLng, ZoneEvent};

/// Bumped whenever the pipeline changes what a request produces.
const KEY_VERSION: u32 = 1;

#[derive(Serialize)]
struct KeyMaterial<'a> {
    version: u32,
    geometry: &'a [LatLng],
    holes: &'a [Vec<LatLng>],
    buildings: Option<&'a [Building]>,
    baseline_population: Option<f64>,
    events: &'a [ZoneEvent],
    options: &'a AnalysisOptions,
}

/// Lowercase hex SHA-256 of the request's canonical JSON.
///
/// Every field that can change the result takes part, so two requests
/// share a key only if they would produce the same analysis.
///
/// # Errors
///
/// * If the request cannot be serialized
pub fn cache_key(request: &AnalysisRequest) -> Result<String, serde_json::Error> {
    let material = KeyMaterial {
        version: KEY_VERSION,
        geometry: &request.geometry,
        holes: &request.holes,
        buildings: request.buildings.as_deref(),
        baseline_population: request.baseline_population,
        events: &request.events,
        options: &request.options,
    };
    let canonical = serde_json::to_vec(&material)?;
    Ok(hex::encode(Sha256::digest(&canonical)))
}
