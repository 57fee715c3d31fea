//! Pipeline stages.
//!
//! Each stage returns `Err(AnalysisWarning)` when it cannot produce its
//! normal output. The orchestrator records the warning and substitutes
//! the fallback named in the warning, so every degraded path shows up in
//! a signature here rather than in a catch-all.

use std::collections::BTreeMap;

use zone_resource_analysis_models::{
    AnalysisOptions, AnalysisStage, AnalysisWarning, CollectionRequirements,
};
use zone_resource_calibration::CalibrationTable;
use zone_resource_collection::cost::round_currency;
use zone_resource_collection::{CollectionInputs, CollectionOptimizer};
use zone_resource_collection_models::WasteProfile;
use zone_resource_population::{DasymetricMapper, PopulationEstimator};
use zone_resource_population_models::{
    ConfidenceInterval, DasymetricResult, EnsembleEstimate, EstimationMethod, PopulationEstimate,
};
use zone_resource_zone::distance::HaversineDistance;
use zone_resource_zone::providers::{BuildingSource, DistanceProvider};
use zone_resource_zone_models::{
    Building, LatLng, RouteEstimate, SettlementType, ZoneGeometry,
};

/// Upper bound on the inventory confidence.
const MAX_BUILDINGS_CONFIDENCE: f64 = 0.9;
/// Inventory confidence for a single building.
const BASE_BUILDINGS_CONFIDENCE: f64 = 0.4;
/// Confidence gained per tenfold increase in building count.
const BUILDINGS_CONFIDENCE_PER_DECADE: f64 = 0.1;

/// A building inventory and where it came from.
#[derive(Debug, Clone)]
pub struct Inventory {
    pub buildings: Vec<Building>,
    pub source: String,
}

/// Takes the request's inventory, or asks the building source for one.
///
/// # Errors
///
/// * If neither is available, the source fails, or the inventory is empty
pub fn collect_buildings(
    supplied: Option<&[Building]>,
    source: Option<&dyn BuildingSource>,
    zone: &ZoneGeometry,
) -> Result<Inventory, AnalysisWarning> {
    let gap = |message: String| AnalysisWarning::DataGap {
        stage: AnalysisStage::Buildings,
        message,
    };

    let (buildings, source) = match (supplied, source) {
        (Some(buildings), _) => (buildings.to_vec(), "request".to_string()),
        (None, Some(source)) => {
            let buildings = source
                .buildings(zone)
                .map_err(|e| gap(format!("{e}; estimating from zone area")))?;
            (buildings, source.name().to_string())
        }
        (None, None) => {
            return Err(gap(
                "no building inventory supplied; estimating from zone area".to_string(),
            ));
        }
    };

    if buildings.is_empty() {
        return Err(gap(format!(
            "{source} found no buildings; estimating from zone area"
        )));
    }

    Ok(Inventory { buildings, source })
}

/// Confidence in an inventory of `count` buildings: 0.4 for one, plus
/// 0.1 per tenfold increase, capped at 0.9. Zero without buildings.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn buildings_confidence(count: usize) -> f64 {
    if count == 0 {
        return 0.0;
    }
    BUILDINGS_CONFIDENCE_PER_DECADE
        .mul_add((count as f64).log10(), BASE_BUILDINGS_CONFIDENCE)
        .min(MAX_BUILDINGS_CONFIDENCE)
}

/// Runs the ensemble over the inventory.
///
/// # Errors
///
/// * If no estimation method produced a usable total
pub fn estimate_population(
    estimator: &PopulationEstimator<'_>,
    buildings: &[Building],
    zone_settlement: SettlementType,
    zone_area_m2: f64,
) -> Result<EnsembleEstimate, AnalysisWarning> {
    estimator
        .estimate(buildings, zone_settlement, Some(zone_area_m2))
        .map_err(|e| AnalysisWarning::DataGap {
            stage: AnalysisStage::Population,
            message: format!("{e}; using area-proportional fallback"),
        })
}

/// Area-proportional estimate for zones without usable buildings.
///
/// # Errors
///
/// * If the zone area cannot support an estimate
pub fn fallback_population(
    estimator: &PopulationEstimator<'_>,
    zone_area_m2: f64,
) -> Result<PopulationEstimate, AnalysisWarning> {
    estimator
        .fallback(zone_area_m2)
        .map_err(|e| AnalysisWarning::StageFailed {
            stage: AnalysisStage::Population,
            reason: e.to_string(),
        })
}

/// Redistributes the externally supplied baseline over the inventory.
///
/// # Errors
///
/// * If no baseline was supplied or it cannot be redistributed
pub fn refine_with_baseline(
    mapper: &DasymetricMapper<'_>,
    baseline_population: Option<f64>,
    buildings: &[Building],
    zone_settlement: SettlementType,
    zone_area_m2: f64,
) -> Result<DasymetricResult, AnalysisWarning> {
    let baseline = baseline_population.ok_or_else(|| AnalysisWarning::DataGap {
        stage: AnalysisStage::Dasymetric,
        message: "no baseline population supplied; using the ensemble alone".to_string(),
    })?;

    mapper
        .redistribute(baseline, buildings, zone_settlement, zone_area_m2)
        .map_err(|e| AnalysisWarning::StageFailed {
            stage: AnalysisStage::Dasymetric,
            reason: e.to_string(),
        })
}

/// `(1 - weight) × ensemble + weight × dasymetric`, keeping the
/// ensemble's relative uncertainty and confidence.
///
/// # Errors
///
/// * If the blended total is not positive
pub fn blend(
    ensemble: &PopulationEstimate,
    dasymetric: &DasymetricResult,
    weight: f64,
    zone_area_m2: f64,
) -> Result<PopulationEstimate, AnalysisWarning> {
    let from_ensemble = ensemble.total_population * (1.0 - weight);
    let from_dasymetric = dasymetric.refined_population * weight;
    let total = from_ensemble + from_dasymetric;

    if !total.is_finite() || total <= 0.0 {
        return Err(AnalysisWarning::StageFailed {
            stage: AnalysisStage::Dasymetric,
            reason: format!("blended population {total} is not positive; using the ensemble alone"),
        });
    }

    let standard_deviation = ensemble.coefficient_of_variation * total;

    Ok(PopulationEstimate {
        method: EstimationMethod::Ensemble,
        total_population: total,
        breakdown: BTreeMap::from([
            ("dasymetric".to_string(), from_dasymetric),
            (EstimationMethod::Ensemble.to_string(), from_ensemble),
        ]),
        standard_deviation,
        coefficient_of_variation: ensemble.coefficient_of_variation,
        confidence_interval_95: ConfidenceInterval::from_sigma(total, standard_deviation),
        confidence_level: ensemble.confidence_level,
        density_per_km2: Some(total / (zone_area_m2 / 1_000_000.0)),
    })
}

/// The dasymetric blend weight: a valid override, else the region's.
#[must_use]
pub fn blend_weight(options: &AnalysisOptions, calibration: &CalibrationTable) -> f64 {
    match options.dasymetric_blend_weight {
        Some(weight) if (0.0..=1.0).contains(&weight) => weight,
        Some(weight) => {
            log::warn!("Ignoring dasymetric blend weight {weight}; must be within [0, 1]");
            calibration.dasymetric.blend_weight
        }
        None => calibration.dasymetric.blend_weight,
    }
}

/// Households at the settlement's household size.
#[must_use]
pub fn households(
    population: f64,
    zone_settlement: SettlementType,
    calibration: &CalibrationTable,
) -> f64 {
    population / calibration.settlement.get(zone_settlement).household_size
}

/// Waste rate for the zone's settlement type.
#[must_use]
pub fn settlement_waste_rate(zone_settlement: SettlementType, calibration: &CalibrationTable) -> f64 {
    calibration
        .settlement
        .get(zone_settlement)
        .waste_kg_per_person_day
}

/// The caller's waste rate override, if it is usable.
///
/// # Errors
///
/// * If the override is negative or not finite
pub fn waste_rate_override(requested: Option<f64>) -> Result<Option<f64>, AnalysisWarning> {
    match requested {
        Some(rate) if !rate.is_finite() || rate < 0.0 => Err(AnalysisWarning::DataGap {
            stage: AnalysisStage::Waste,
            message: format!("waste rate override {rate} is unusable; using the settlement rate"),
        }),
        other => Ok(other),
    }
}

/// Waste generated by `population`.
///
/// # Errors
///
/// * If the population stage produced nothing
pub fn waste_profile(population: Option<f64>, rate: f64) -> Result<WasteProfile, AnalysisWarning> {
    population
        .map(|population| WasteProfile::new(population, rate))
        .ok_or_else(|| AnalysisWarning::StageFailed {
            stage: AnalysisStage::Waste,
            reason: "no population estimate to derive waste from".to_string(),
        })
}

/// Route from the zone centroid to the disposal site via `provider`.
///
/// # Errors
///
/// * If the provider fails; callers fall back to [`haversine_route`]
pub fn route(
    provider: &dyn DistanceProvider,
    origin: LatLng,
    destination: LatLng,
) -> Result<RouteEstimate, AnalysisWarning> {
    provider
        .route(origin, destination)
        .map_err(|e| AnalysisWarning::DataGap {
            stage: AnalysisStage::Collection,
            message: format!("{e}; using straight-line distance with road inflation"),
        })
}

/// Straight-line route estimate with the region's road inflation and
/// truck speed.
#[must_use]
pub fn haversine_route(
    origin: LatLng,
    destination: LatLng,
    calibration: &CalibrationTable,
) -> RouteEstimate {
    HaversineDistance {
        road_inflation: calibration.logistics.road_inflation,
        average_speed_kmh: calibration.logistics.average_truck_speed_kmh,
    }
    .estimate(origin, destination)
}

/// Fleet, schedule and revenue for servicing the zone.
///
/// # Errors
///
/// * If the optimizer rejects its inputs
pub fn plan_collection(
    calibration: &CalibrationTable,
    waste: &WasteProfile,
    route: RouteEstimate,
    preferred_frequency: Option<u8>,
    zone_settlement: SettlementType,
    households: f64,
) -> Result<CollectionRequirements, AnalysisWarning> {
    let fleet = CollectionOptimizer::new(calibration)
        .optimize(CollectionInputs {
            population: waste.population,
            waste_rate_kg_per_person_day: Some(waste.rate_kg_per_person_day),
            round_trip_km: route.round_trip_km(),
            preferred_frequency,
        })
        .map_err(|e| AnalysisWarning::StageFailed {
            stage: AnalysisStage::Collection,
            reason: e.to_string(),
        })?;

    let monthly_fee_per_household = calibration
        .settlement
        .get(zone_settlement)
        .monthly_fee_per_household;
    let estimated_monthly_revenue = round_currency(households * monthly_fee_per_household);
    let monthly_net = round_currency(estimated_monthly_revenue - fleet.monthly_total_cost);

    Ok(CollectionRequirements {
        route,
        fleet,
        households,
        monthly_fee_per_household,
        estimated_monthly_revenue,
        monthly_net,
        currency: calibration.currency.clone(),
    })
}
