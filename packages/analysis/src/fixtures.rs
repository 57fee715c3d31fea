//! Shared test inputs: a 1 km² zone in Lusaka with 200 mixed-settlement
//! residential buildings of 100 m² each.

use chrono::{DateTime, TimeZone, Utc};
use zone_resource_analysis_models::AnalysisRequest;
use zone_resource_zone::distance::EARTH_RADIUS_M;
use zone_resource_zone::geometry;
use zone_resource_zone_models::{Building, BuildingType, LatLng, SettlementType, ZoneGeometry};

pub fn reference_ring() -> Vec<LatLng> {
    let lat: f64 = -15.4167;
    let lng = 28.2833;
    let dlat = 1000.0 / EARTH_RADIUS_M.to_radians();
    let dlng = dlat / lat.to_radians().cos();
    vec![
        LatLng::new(lat, lng),
        LatLng::new(lat, lng + dlng),
        LatLng::new(lat + dlat, lng + dlng),
        LatLng::new(lat + dlat, lng),
    ]
}

pub fn reference_zone() -> ZoneGeometry {
    geometry::from_ring(&reference_ring()).unwrap()
}

pub fn reference_buildings() -> Vec<Building> {
    (0..200)
        .map(|i| Building {
            id: format!("b{i}"),
            area_m2: 100.0,
            height_m: None,
            building_type: BuildingType::Residential,
            settlement_type: SettlementType::Mixed,
        })
        .collect()
}

pub fn reference_request() -> AnalysisRequest {
    AnalysisRequest {
        geometry: reference_ring(),
        buildings: Some(reference_buildings()),
        ..AnalysisRequest::default()
    }
}

pub fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 6, 0, 0).unwrap()
}
