//! Traits for the external services an analysis may consult.
//!
//! Building-footprint detection and routing live outside this engine.
//! Implementations are injected into the orchestrator; every failure
//! they report is recovered with a documented fallback.

use zone_resource_zone_models::{Building, LatLng, RouteEstimate, ZoneGeometry};

use crate::ProviderError;

/// Detects building footprints inside a zone.
pub trait BuildingSource: Send + Sync {
    /// Short provider name used in logs and `data_sources`.
    fn name(&self) -> &'static str;

    /// Returns every building whose footprint lies inside `zone`.
    /// An empty list is a valid answer.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError`] if the detector cannot be queried.
    fn buildings(&self, zone: &ZoneGeometry) -> Result<Vec<Building>, ProviderError>;
}

/// Estimates driving distance between two points.
pub trait DistanceProvider: Send + Sync {
    /// Short provider name used in logs and `data_sources`.
    fn name(&self) -> &'static str;

    /// Returns the one-way road distance and round-trip time.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError`] if the routing service cannot answer.
    fn route(&self, origin: LatLng, destination: LatLng) -> Result<RouteEstimate, ProviderError>;
}

/// A [`BuildingSource`] serving a fixed inventory, for callers that
/// already hold detector output.
#[derive(Debug, Clone, Default)]
pub struct StaticBuildings {
    buildings: Vec<Building>,
}

impl StaticBuildings {
    #[must_use]
    pub const fn new(buildings: Vec<Building>) -> Self {
        Self { buildings }
    }
}

impl BuildingSource for StaticBuildings {
    fn name(&self) -> &'static str {
        "static_inventory"
    }

    fn buildings(&self, _zone: &ZoneGeometry) -> Result<Vec<Building>, ProviderError> {
        Ok(self.buildings.clone())
    }
}
