//! Runs the analysis stages in dependency order behind the result cache.

use std::sync::Arc;

use zone_resource_analysis_models::{
    AnalysisRequest, AnalysisResult, AnalysisStage, AnalysisWarning, CollectionRequirements,
};
use zone_resource_calibration::{CalibrationTable, default_region, region};
use zone_resource_collection_models::WasteProfile;
use zone_resource_population::{DasymetricMapper, PopulationEstimator, classify};
use zone_resource_population_models::{
    DasymetricMethod, DasymetricResult, EnsembleEstimate, PopulationEstimate,
};
use zone_resource_validation::{ValidationEngine, ValidationInputs, ValidationReport};
use zone_resource_zone::geometry;
use zone_resource_zone::providers::{BuildingSource, DistanceProvider};
use zone_resource_zone_models::{
    Building, RouteEstimate, SettlementType, ZoneGeometry, net_presence,
};

use crate::cache::{AnalysisCache, CacheStatus};
use crate::{AnalysisError, key, stages};

/// Entry point for zone analyses.
///
/// Owns the result cache and the optional external providers. Without a
/// building source, requests must carry their own inventory or fall back
/// to area-proportional estimates; without a routing service, distances
/// are straight-line estimates with road inflation.
#[derive(Default)]
pub struct AnalysisOrchestrator {
    cache: AnalysisCache,
    building_source: Option<Arc<dyn BuildingSource>>,
    distance_provider: Option<Arc<dyn DistanceProvider>>,
}

impl std::fmt::Debug for AnalysisOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnalysisOrchestrator")
            .field("cache", &self.cache)
            .field("building_source", &self.building_source.as_ref().map(|s| s.name()))
            .field(
                "distance_provider",
                &self.distance_provider.as_ref().map(|p| p.name()),
            )
            .finish()
    }
}

/// Mutable state threaded through one pipeline run.
struct Run {
    warnings: Vec<AnalysisWarning>,
    data_sources: Vec<String>,
}

impl Run {
    fn warn(&mut self, warning: AnalysisWarning) {
        log::warn!("{warning}");
        self.warnings.push(warning);
    }

    fn source(&mut self, source: impl Into<String>) {
        let source = source.into();
        if !self.data_sources.contains(&source) {
            self.data_sources.push(source);
        }
    }

    /// Unwraps a stage result, recording the warning on failure.
    fn recover<T>(&mut self, result: Result<T, AnalysisWarning>) -> Option<T> {
        result.map_err(|warning| self.warn(warning)).ok()
    }
}

impl AnalysisOrchestrator {
    /// An orchestrator with a 24-hour wall-clock cache and no providers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_cache(mut self, cache: AnalysisCache) -> Self {
        self.cache = cache;
        self
    }

    #[must_use]
    pub fn with_building_source(mut self, source: Arc<dyn BuildingSource>) -> Self {
        self.building_source = Some(source);
        self
    }

    #[must_use]
    pub fn with_distance_provider(mut self, provider: Arc<dyn DistanceProvider>) -> Self {
        self.distance_provider = Some(provider);
        self
    }

    #[must_use]
    pub const fn cache(&self) -> &AnalysisCache {
        &self.cache
    }

    /// Analyzes one zone, serving identical requests from the cache until
    /// the entry expires.
    ///
    /// Stage failures never abort the analysis; they become warnings on
    /// the result and the stage's fallback is used instead.
    ///
    /// # Errors
    ///
    /// * If the zone geometry is unusable
    /// * If the default calibration region cannot be loaded
    pub fn analyze(&self, request: &AnalysisRequest) -> Result<Arc<AnalysisResult>, AnalysisError> {
        let zone = geometry::from_rings(&request.geometry, &request.holes)?;
        let cache_key = key::cache_key(request)?;

        let (calibration, calibration_warning) = match region(&request.options.region) {
            Ok(table) => (table, None),
            Err(e) => {
                let fallback = default_region()?;
                let warning = AnalysisWarning::DataGap {
                    stage: AnalysisStage::Population,
                    message: format!("{e}; using {} calibration", fallback.id),
                };
                (fallback, Some(warning))
            }
        };

        let (result, status) = self.cache.get_or_insert_with(&cache_key, || {
            self.run(request, zone, &calibration, calibration_warning, &cache_key)
        });

        if status == CacheStatus::Hit {
            log::debug!("Served analysis {cache_key} from cache");
        }

        Ok(result)
    }

    /// Parses a `GeoJSON` zone and analyzes it. Interior rings of the
    /// polygon stay excluded from the zone area.
    ///
    /// # Errors
    ///
    /// * If the `GeoJSON` does not contain a usable polygon
    /// * See [`Self::analyze`]
    pub fn analyze_geojson(
        &self,
        geojson: &str,
        mut request: AnalysisRequest,
    ) -> Result<Arc<AnalysisResult>, AnalysisError> {
        let zone = geometry::parse_geojson(geojson)?;
        request.geometry = zone.ring;
        request.holes = zone.holes;
        self.analyze(&request)
    }

    fn run(
        &self,
        request: &AnalysisRequest,
        zone: ZoneGeometry,
        calibration: &CalibrationTable,
        calibration_warning: Option<AnalysisWarning>,
        cache_key: &str,
    ) -> AnalysisResult {
        let options = &request.options;
        let kind = options.kind;
        let mut run = Run {
            warnings: Vec::new(),
            data_sources: vec![format!("calibration:{}", calibration.id)],
        };
        if let Some(warning) = calibration_warning {
            run.warn(warning);
        }

        log::debug!("Running {kind} analysis {cache_key}");

        // Buildings
        let buildings = run
            .recover(stages::collect_buildings(
                request.buildings.as_deref(),
                self.building_source.as_deref(),
                &zone,
            ))
            .map_or_else(Vec::new, |inventory| {
                run.source(format!("buildings:{}", inventory.source));
                inventory.buildings
            });
        let buildings_confidence = stages::buildings_confidence(buildings.len());

        // Settlement
        let settlement = classify(&buildings, None);
        let zone_settlement = settlement.settlement_type;

        // Population and dasymetric refinement
        let (population, ensemble, dasymetric) = if kind.includes(AnalysisStage::Population) {
            population_stages(&mut run, request, &zone, calibration, &buildings, zone_settlement)
        } else {
            (None, None, None)
        };
        let household_estimate = population
            .as_ref()
            .map(|p| stages::households(p.total_population, zone_settlement, calibration));

        // Waste
        let waste = if kind.includes(AnalysisStage::Waste) {
            let rate = run
                .recover(stages::waste_rate_override(options.waste_rate_kg_per_person_day))
                .flatten()
                .unwrap_or_else(|| stages::settlement_waste_rate(zone_settlement, calibration));
            run.recover(stages::waste_profile(
                population.as_ref().map(|p| p.total_population),
                rate,
            ))
        } else {
            None
        };

        // Collection
        let collection_requirements = match (&waste, household_estimate) {
            (Some(waste), Some(households)) if kind.includes(AnalysisStage::Collection) => {
                self.collection(&mut run, request, &zone, calibration, waste, households, zone_settlement)
            }
            _ => None,
        };

        // Movement events
        let presence = (!request.events.is_empty()).then(|| {
            run.source("movement_events");
            net_presence(&request.events)
        });

        // Validation
        let validation = validate(
            &zone,
            &buildings,
            population.as_ref(),
            household_estimate,
            waste.as_ref(),
            presence,
        );
        for message in &validation.warnings {
            run.warnings.push(AnalysisWarning::ValidationFailure {
                message: message.clone(),
            });
        }

        let confidence_level = overall_confidence(
            buildings_confidence,
            settlement.confidence,
            population.as_ref(),
            &validation,
        );

        log::info!(
            "Analyzed zone {cache_key}: {} buildings, population {}, confidence {confidence_level:.2}, {} warnings",
            buildings.len(),
            population
                .as_ref()
                .map_or_else(|| "n/a".to_string(), |p| format!("{:.0}", p.total_population)),
            run.warnings.len()
        );

        AnalysisResult {
            kind,
            region: calibration.id.clone(),
            population_estimate: population.as_ref().map(|p| p.total_population),
            population,
            household_estimate,
            building_count: buildings.len(),
            buildings_confidence,
            waste_generation_kg_per_day: waste.as_ref().map(|w| w.daily_kg),
            waste,
            collection_requirements,
            confidence_level,
            data_sources: run.data_sources,
            warnings: run.warnings.iter().map(ToString::to_string).collect(),
            validation,
            settlement: Some(settlement),
            ensemble,
            dasymetric,
            cache_key: cache_key.to_string(),
            created_at: self.cache.now(),
            zone,
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn collection(
        &self,
        run: &mut Run,
        request: &AnalysisRequest,
        zone: &ZoneGeometry,
        calibration: &CalibrationTable,
        waste: &WasteProfile,
        households: f64,
        zone_settlement: SettlementType,
    ) -> Option<CollectionRequirements> {
        let route = self.route(run, zone, calibration);
        let requirements = run.recover(stages::plan_collection(
            calibration,
            waste,
            route,
            request.options.preferred_frequency,
            zone_settlement,
            households,
        ))?;

        if let Some(reason) = requirements.fleet.fallback {
            run.warn(AnalysisWarning::InfeasibleOptimization {
                message: format!("{reason}: {}", requirements.fleet.justification),
            });
        }

        Some(requirements)
    }

    /// Route to the disposal site, falling back to a straight-line
    /// estimate when no routing service is configured or it fails.
    fn route(
        &self,
        run: &mut Run,
        zone: &ZoneGeometry,
        calibration: &CalibrationTable,
    ) -> RouteEstimate {
        let destination = calibration.logistics.disposal_site.location();

        if let Some(provider) = &self.distance_provider {
            if let Some(route) = run.recover(stages::route(provider.as_ref(), zone.centroid, destination)) {
                run.source(format!("routing:{}", provider.name()));
                return route;
            }
        }

        run.source("routing:haversine");
        stages::haversine_route(zone.centroid, destination, calibration)
    }
}

/// Ensemble (or area fallback), then the optional dasymetric blend.
fn population_stages(
    run: &mut Run,
    request: &AnalysisRequest,
    zone: &ZoneGeometry,
    calibration: &CalibrationTable,
    buildings: &[Building],
    zone_settlement: SettlementType,
) -> (
    Option<PopulationEstimate>,
    Option<EnsembleEstimate>,
    Option<DasymetricResult>,
) {
    let options = &request.options;
    let estimator = match options.ensemble_weights {
        Some(weights) => PopulationEstimator::new(calibration).with_weights(weights),
        None => PopulationEstimator::new(calibration),
    };

    let ensemble = run.recover(stages::estimate_population(
        &estimator,
        buildings,
        zone_settlement,
        zone.area_m2,
    ));
    let mut population = match &ensemble {
        Some(ensemble) => {
            run.source("building_ensemble");
            Some(ensemble.estimate.clone())
        }
        None => run
            .recover(stages::fallback_population(&estimator, zone.area_m2))
            .inspect(|_| run.source("area_fallback")),
    };

    let dasymetric = run.recover(stages::refine_with_baseline(
        &DasymetricMapper::new(calibration),
        request.baseline_population,
        buildings,
        zone_settlement,
        zone.area_m2,
    ));

    if let Some(dasymetric) = &dasymetric {
        run.source("baseline_population");
        if dasymetric.method == DasymetricMethod::NoDataAvailable {
            run.warn(AnalysisWarning::DataGap {
                stage: AnalysisStage::Dasymetric,
                message: "no building data to redistribute the baseline; not blended"
                    .to_string(),
            });
        } else if let Some(ensemble) = &ensemble {
            let weight = stages::blend_weight(options, calibration);
            if let Some(blended) =
                run.recover(stages::blend(&ensemble.estimate, dasymetric, weight, zone.area_m2))
            {
                log::debug!(
                    "Blended ensemble {:.0} with dasymetric {:.0} at weight {weight}",
                    ensemble.estimate.total_population,
                    dasymetric.refined_population
                );
                population = Some(blended);
            }
        }
    }

    (population, ensemble, dasymetric)
}

#[allow(clippy::cast_precision_loss)]
fn validate(
    zone: &ZoneGeometry,
    buildings: &[Building],
    population: Option<&PopulationEstimate>,
    household_estimate: Option<f64>,
    waste: Option<&WasteProfile>,
    net_presence: Option<i64>,
) -> ValidationReport {
    let mean_building_area_m2 = (!buildings.is_empty())
        .then(|| buildings.iter().map(|b| b.area_m2).sum::<f64>() / buildings.len() as f64);

    ValidationEngine::new().validate(&ValidationInputs {
        population: population.map(|p| p.total_population),
        zone_area_km2: Some(zone.area_km2()),
        building_count: (!buildings.is_empty()).then_some(buildings.len()),
        mean_building_area_m2,
        household_count: household_estimate,
        waste_kg_per_day: waste.map(|w| w.daily_kg),
        net_presence,
    })
}

/// Mean of the stage confidences, discounted by up to half for a poor
/// validation score.
fn overall_confidence(
    buildings_confidence: f64,
    settlement_confidence: f64,
    population: Option<&PopulationEstimate>,
    validation: &ValidationReport,
) -> f64 {
    let mut parts = vec![buildings_confidence, settlement_confidence];
    if let Some(population) = population {
        parts.push(population.confidence_level);
    }
    #[allow(clippy::cast_precision_loss)]
    let mean = parts.iter().sum::<f64>() / parts.len() as f64;
    (mean * 0.5f64.mul_add(validation.score, 0.5)).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    use chrono::TimeDelta;
    use zone_resource_analysis_models::{AnalysisKind, AnalysisOptions};
    use zone_resource_calibration::MethodWeights;
    use zone_resource_collection_models::FleetFallback;
    use zone_resource_population_models::EstimationMethod;
    use zone_resource_zone::ProviderError;
    use zone_resource_zone::providers::StaticBuildings;
    use zone_resource_zone_models::{LatLng, RouteSource, SettlementType, ZoneEvent};

    use super::*;
    use crate::cache::{DEFAULT_TTL_HOURS, ManualClock};
    use crate::fixtures::{reference_buildings, reference_request, reference_ring, start_time};

    /// Counts calls and reports a fixed road distance.
    #[derive(Default)]
    struct CountingRouter {
        calls: AtomicUsize,
    }

    impl DistanceProvider for CountingRouter {
        fn name(&self) -> &'static str {
            "counting"
        }

        fn route(
            &self,
            _origin: LatLng,
            _destination: LatLng,
        ) -> Result<RouteEstimate, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            thread::sleep(std::time::Duration::from_millis(20));
            Ok(RouteEstimate {
                distance_km: 12.0,
                round_trip_minutes: 48.0,
                source: RouteSource::RoutingService,
            })
        }
    }

    struct FailingBuildings;

    impl BuildingSource for FailingBuildings {
        fn name(&self) -> &'static str {
            "detector"
        }

        fn buildings(&self, _zone: &ZoneGeometry) -> Result<Vec<Building>, ProviderError> {
            Err(ProviderError::Unavailable {
                provider: "detector".to_string(),
                message: "timeout".to_string(),
            })
        }
    }

    fn orchestrator_at_start() -> (Arc<ManualClock>, AnalysisOrchestrator) {
        let clock = Arc::new(ManualClock::new(start_time()));
        let orchestrator = AnalysisOrchestrator::new().with_cache(AnalysisCache::new(
            clock.clone(),
            TimeDelta::hours(DEFAULT_TTL_HOURS),
        ));
        (clock, orchestrator)
    }

    #[test]
    fn reference_zone_end_to_end() {
        let result = AnalysisOrchestrator::new()
            .analyze(&reference_request())
            .unwrap();

        assert!((result.zone.area_m2 - 1_000_000.0).abs() < 5_000.0);
        assert_eq!(result.building_count, 200);
        assert_eq!(
            result.settlement.as_ref().unwrap().settlement_type,
            SettlementType::Mixed
        );

        let ensemble = result.ensemble.as_ref().unwrap();
        let area_based = ensemble
            .members
            .iter()
            .find(|m| m.method == EstimationMethod::AreaBased)
            .unwrap();
        assert!((area_based.total_population - 1400.0).abs() < 1e-6);

        let population = result.population_estimate.unwrap();
        let (lo, hi) = ensemble.member_range().unwrap();
        assert!(population >= lo && population <= hi);

        let daily = result.waste_generation_kg_per_day.unwrap();
        assert!((daily - population * 0.5).abs() < 1e-9);

        let collection = result.collection_requirements.as_ref().unwrap();
        let fleet = &collection.fleet;
        assert!((1..=7).contains(&fleet.collection_frequency_per_week));
        assert!([5.0, 10.0, 15.0, 20.0, 25.0].contains(&fleet.truck_capacity_tonnes));
        assert!(fleet.coverage_percent >= 100.0);
        assert_eq!(collection.route.source, RouteSource::HaversineFallback);

        assert!((result.household_estimate.unwrap() - population / 4.5).abs() < 1e-9);
        assert!(result.validation.score > 0.99, "{:?}", result.validation);
        assert!(result.confidence_level > 0.0 && result.confidence_level <= 1.0);
        assert!(result.data_sources.contains(&"buildings:request".to_string()));
        assert!(result.data_sources.contains(&"routing:haversine".to_string()));
        // Only the missing baseline is worth a warning.
        assert_eq!(result.warnings.len(), 1, "{:?}", result.warnings);
        assert!(result.warnings[0].contains("baseline"));
    }

    #[test]
    fn result_round_trips_through_json() {
        let request = AnalysisRequest {
            baseline_population: Some(2000.0),
            events: serde_json::from_str::<Vec<ZoneEvent>>(
                r#"[{"event_type": 1, "timestamp": "2026-03-01T08:00:00Z"},
                    {"event_type": "exit", "timestamp": "2026-03-01T08:05:00Z"},
                    {"event_type": 1, "timestamp": "2026-03-01T08:10:00Z"}]"#,
            )
            .unwrap(),
            ..reference_request()
        };
        let result = AnalysisOrchestrator::new().analyze(&request).unwrap();

        let value = result.to_value().unwrap();
        assert!(value["population_estimate"].is_number());
        assert!(value["collection_requirements"]["fleet"]["cost_breakdown"].is_object());
        assert!(value["validation"]["score"].is_number());

        let restored = AnalysisResult::from_value(value).unwrap();
        assert_eq!(restored, *result);

        let text = serde_json::to_string(&*result).unwrap();
        let reparsed: AnalysisResult = serde_json::from_str(&text).unwrap();
        assert_eq!(reparsed, *result);
    }

    #[test]
    fn zone_without_buildings_uses_area_fallback() {
        let request = AnalysisRequest {
            geometry: reference_ring(),
            ..AnalysisRequest::default()
        };
        let result = AnalysisOrchestrator::new().analyze(&request).unwrap();

        let population = result.population.as_ref().unwrap();
        assert_eq!(population.method, EstimationMethod::AreaFallback);
        assert!((population.total_population - 2500.0 * result.zone.area_km2()).abs() < 1e-6);
        assert!(result.confidence_level <= 0.4, "{}", result.confidence_level);
        assert!(result.data_sources.contains(&"area_fallback".to_string()));
        assert!(
            result
                .warnings
                .iter()
                .any(|w| w.contains("no building inventory"))
        );
        assert!(result.collection_requirements.is_some());
    }

    #[test]
    fn failing_providers_degrade_to_fallbacks() {
        struct DownRouter;
        impl DistanceProvider for DownRouter {
            fn name(&self) -> &'static str {
                "osrm"
            }
            fn route(&self, _: LatLng, _: LatLng) -> Result<RouteEstimate, ProviderError> {
                Err(ProviderError::InvalidResponse {
                    provider: "osrm".to_string(),
                    message: "no route".to_string(),
                })
            }
        }

        let orchestrator = AnalysisOrchestrator::new()
            .with_building_source(Arc::new(FailingBuildings))
            .with_distance_provider(Arc::new(DownRouter));
        let request = AnalysisRequest {
            geometry: reference_ring(),
            ..AnalysisRequest::default()
        };
        let result = orchestrator.analyze(&request).unwrap();

        assert_eq!(result.building_count, 0);
        assert!(result.warnings.iter().any(|w| w.contains("timeout")));
        assert!(result.warnings.iter().any(|w| w.contains("no route")));
        let collection = result.collection_requirements.as_ref().unwrap();
        assert_eq!(collection.route.source, RouteSource::HaversineFallback);
        assert!(result.data_sources.contains(&"routing:haversine".to_string()));
    }

    #[test]
    fn building_source_and_router_are_used_when_available() {
        let router = Arc::new(CountingRouter::default());
        let orchestrator = AnalysisOrchestrator::new()
            .with_building_source(Arc::new(StaticBuildings::new(reference_buildings())))
            .with_distance_provider(router.clone());
        let request = AnalysisRequest {
            geometry: reference_ring(),
            ..AnalysisRequest::default()
        };
        let result = orchestrator.analyze(&request).unwrap();

        assert_eq!(result.building_count, 200);
        assert!(
            result
                .data_sources
                .contains(&"buildings:static_inventory".to_string())
        );
        assert!(result.data_sources.contains(&"routing:counting".to_string()));
        let route = result.collection_requirements.as_ref().unwrap().route;
        assert!((route.round_trip_km() - 24.0).abs() < 1e-9);
        assert_eq!(router.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn invalid_geometry_is_fatal() {
        let request = AnalysisRequest {
            geometry: vec![LatLng::new(-15.4, 28.3), LatLng::new(-15.5, 28.3)],
            ..AnalysisRequest::default()
        };
        assert!(matches!(
            AnalysisOrchestrator::new().analyze(&request),
            Err(AnalysisError::Zone(_))
        ));
    }

    #[test]
    fn unknown_region_falls_back_to_default() {
        let mut request = reference_request();
        request.options.region = "atlantis".to_string();
        let result = AnalysisOrchestrator::new().analyze(&request).unwrap();
        assert_eq!(result.region, "lusaka");
        assert!(result.warnings.iter().any(|w| w.contains("atlantis")));
    }

    #[test]
    fn kinds_stop_at_their_last_stage() {
        let orchestrator = AnalysisOrchestrator::new();
        let run = |kind| {
            let mut request = reference_request();
            request.options.kind = kind;
            orchestrator.analyze(&request).unwrap()
        };

        let buildings = run(AnalysisKind::Buildings);
        assert_eq!(buildings.building_count, 200);
        assert!(buildings.population_estimate.is_none());
        assert!(buildings.waste.is_none());

        let population = run(AnalysisKind::Population);
        assert!(population.population_estimate.is_some());
        assert!(population.waste.is_none());

        let waste = run(AnalysisKind::Waste);
        assert!(waste.waste.is_some());
        assert!(waste.collection_requirements.is_none());

        let comprehensive = run(AnalysisKind::Comprehensive);
        assert!(comprehensive.collection_requirements.is_some());
    }

    #[test]
    fn baseline_is_blended_with_ensemble() {
        let request = AnalysisRequest {
            baseline_population: Some(2000.0),
            ..reference_request()
        };
        let result = AnalysisOrchestrator::new().analyze(&request).unwrap();

        let ensemble = result.ensemble.as_ref().unwrap().estimate.total_population;
        let dasymetric = result.dasymetric.as_ref().unwrap();
        assert_eq!(dasymetric.method, DasymetricMethod::BuildingWeighted);
        let expected = 0.5 * ensemble + 0.5 * dasymetric.refined_population;
        assert!((result.population_estimate.unwrap() - expected).abs() < 1e-9);
        assert!(result.data_sources.contains(&"baseline_population".to_string()));
    }

    #[test]
    fn options_tune_the_pipeline() {
        let request = AnalysisRequest {
            options: AnalysisOptions {
                ensemble_weights: Some(MethodWeights {
                    area_based: 1.0,
                    floor_based: 0.0,
                    settlement_based: 0.0,
                }),
                waste_rate_kg_per_person_day: Some(0.8),
                preferred_frequency: Some(2),
                ..AnalysisOptions::default()
            },
            ..reference_request()
        };
        let result = AnalysisOrchestrator::new().analyze(&request).unwrap();

        assert!((result.population_estimate.unwrap() - 1400.0).abs() < 1e-6);
        assert!((result.waste_generation_kg_per_day.unwrap() - 1120.0).abs() < 1e-9);
        let fleet = &result.collection_requirements.as_ref().unwrap().fleet;
        assert_eq!(fleet.collection_frequency_per_week, 2);
        assert!(fleet.preferred_frequency_applied);
    }

    #[test]
    fn tiny_zone_reports_infeasible_optimization() {
        let request = AnalysisRequest {
            buildings: Some(reference_buildings().into_iter().take(10).collect()),
            ..reference_request()
        };
        let result = AnalysisOrchestrator::new().analyze(&request).unwrap();

        let fleet = &result.collection_requirements.as_ref().unwrap().fleet;
        assert_eq!(fleet.fallback, Some(FleetFallback::LoadBelowMinimum));
        assert!(
            result
                .warnings
                .iter()
                .any(|w| w.starts_with("Infeasible collection optimization"))
        );
        assert!(result.validation.score < 1.0);
    }

    #[test]
    fn movement_events_feed_validation() {
        let entries: Vec<ZoneEvent> = (0..3000)
            .map(|i| ZoneEvent {
                kind: zone_resource_zone_models::EventKind::Entry,
                timestamp: start_time() + TimeDelta::seconds(i),
            })
            .collect();
        let request = AnalysisRequest {
            events: entries,
            ..reference_request()
        };
        let result = AnalysisOrchestrator::new().analyze(&request).unwrap();

        assert!(result.data_sources.contains(&"movement_events".to_string()));
        assert!(
            result
                .warnings
                .iter()
                .any(|w| w.contains("net presence of 3000"))
        );
    }

    #[test]
    fn repeated_requests_hit_cache_until_expiry() {
        let (clock, orchestrator) = orchestrator_at_start();
        let request = reference_request();

        let first = orchestrator.analyze(&request).unwrap();
        let second = orchestrator.analyze(&request).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.created_at, start_time());

        clock.advance(TimeDelta::hours(DEFAULT_TTL_HOURS));
        let third = orchestrator.analyze(&request).unwrap();
        assert!(!Arc::ptr_eq(&first, &third));
        assert_eq!(third.created_at, start_time() + TimeDelta::hours(DEFAULT_TTL_HOURS));
        assert_eq!(third.population_estimate, first.population_estimate);
    }

    #[test]
    fn concurrent_identical_requests_run_pipeline_once() {
        let router = Arc::new(CountingRouter::default());
        let orchestrator = AnalysisOrchestrator::new().with_distance_provider(router.clone());
        let request = reference_request();

        let results: Vec<Arc<AnalysisResult>> = thread::scope(|scope| {
            let handles: Vec<_> = (0..6)
                .map(|_| scope.spawn(|| orchestrator.analyze(&request).unwrap()))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert_eq!(router.calls.load(Ordering::SeqCst), 1);
        assert!(results.iter().all(|r| Arc::ptr_eq(r, &results[0])));
    }

    #[test]
    fn geojson_entry_point_matches_ring_entry_point() {
        let ring = reference_ring();
        let coordinates: Vec<[f64; 2]> = ring
            .iter()
            .chain(std::iter::once(&ring[0]))
            .map(|p| [p.lng, p.lat])
            .collect();
        let geojson = serde_json::json!({
            "type": "Feature",
            "properties": {},
            "geometry": {"type": "Polygon", "coordinates": [coordinates]}
        })
        .to_string();

        let orchestrator = AnalysisOrchestrator::new();
        let result = orchestrator
            .analyze_geojson(
                &geojson,
                AnalysisRequest {
                    buildings: Some(reference_buildings()),
                    ..AnalysisRequest::default()
                },
            )
            .unwrap();
        assert!((result.zone.area_m2 - 1_000_000.0).abs() < 5_000.0);
        assert_eq!(result.building_count, 200);

        assert!(matches!(
            orchestrator.analyze_geojson("{}", AnalysisRequest::default()),
            Err(AnalysisError::Zone(_))
        ));
    }

    #[test]
    fn geojson_holes_stay_out_of_the_zone() {
        let geojson = r#"{
            "type": "Polygon",
            "coordinates": [
                [[28.28, -15.42], [28.29, -15.42], [28.29, -15.41], [28.28, -15.41], [28.28, -15.42]],
                [[28.282, -15.418], [28.288, -15.418], [28.288, -15.412], [28.282, -15.412], [28.282, -15.418]]
            ]
        }"#;
        let measured = geometry::parse_geojson(geojson).unwrap();
        let solid = geometry::from_ring(&measured.ring).unwrap();

        let result = AnalysisOrchestrator::new()
            .analyze_geojson(geojson, AnalysisRequest::default())
            .unwrap();

        assert_eq!(result.zone.holes.len(), 1);
        assert!((result.zone.area_m2 - measured.area_m2).abs() < 1e-6);
        assert!(result.zone.area_m2 < 0.65 * solid.area_m2);

        let population = result.population.as_ref().unwrap();
        assert_eq!(population.method, EstimationMethod::AreaFallback);
        assert!((population.total_population - 2500.0 * measured.area_km2()).abs() < 1e-6);
    }
}
