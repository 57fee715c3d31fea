//! Great-circle distances and the haversine fallback route estimate.

use zone_resource_zone_models::{LatLng, RouteEstimate, RouteSource};

use crate::ProviderError;
use crate::providers::DistanceProvider;

/// Mean Earth radius in meters.
pub const EARTH_RADIUS_M: f64 = 6_371_008.8;

/// Road distance is rarely a straight line; this inflates haversine
/// distance to approximate the road network.
pub const DEFAULT_ROAD_INFLATION: f64 = 1.3;

/// Great-circle distance between two points in meters.
#[must_use]
pub fn haversine_m(a: LatLng, b: LatLng) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let dlat = (b.lat - a.lat).to_radians();
    let dlng = (b.lng - a.lng).to_radians();

    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlng / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * h.sqrt().min(1.0).asin()
}

/// Great-circle distance between two points in kilometers.
#[must_use]
pub fn haversine_km(a: LatLng, b: LatLng) -> f64 {
    haversine_m(a, b) / 1000.0
}

/// Estimates road distance as haversine distance times an inflation
/// factor, with travel time from a constant average speed.
///
/// Used whenever no routing service is configured or the configured one
/// fails.
#[derive(Debug, Clone, Copy)]
pub struct HaversineDistance {
    /// Multiplier applied to straight-line distance.
    pub road_inflation: f64,
    /// Average truck speed in km/h.
    pub average_speed_kmh: f64,
}

impl Default for HaversineDistance {
    fn default() -> Self {
        Self {
            road_inflation: DEFAULT_ROAD_INFLATION,
            average_speed_kmh: 30.0,
        }
    }
}

impl HaversineDistance {
    /// Computes the estimate without going through the trait.
    #[must_use]
    pub fn estimate(&self, origin: LatLng, destination: LatLng) -> RouteEstimate {
        let distance_km = haversine_km(origin, destination) * self.road_inflation;
        let round_trip_minutes = if self.average_speed_kmh > 0.0 {
            distance_km * 2.0 / self.average_speed_kmh * 60.0
        } else {
            0.0
        };

        RouteEstimate {
            distance_km,
            round_trip_minutes,
            source: RouteSource::HaversineFallback,
        }
    }
}

impl DistanceProvider for HaversineDistance {
    fn name(&self) -> &'static str {
        "haversine"
    }

    fn route(&self, origin: LatLng, destination: LatLng) -> Result<RouteEstimate, ProviderError> {
        Ok(self.estimate(origin, destination))
    }
}
