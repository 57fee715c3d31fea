//! The three building-driven estimation methods and the area fallback.
//!
//! Each method is a pure function of the inventory and the calibration
//! table. Buildings tagged with an unknown settlement type take the
//! zone's classification.

use std::collections::BTreeMap;

use zone_resource_calibration::CalibrationTable;
use zone_resource_population_models::{ConfidenceInterval, EstimationMethod, PopulationEstimate};
use zone_resource_zone_models::{Building, SettlementType};

use crate::{PopulationError, ensure_positive};

/// Confidence reported for the area fallback.
pub const FALLBACK_CONFIDENCE: f64 = 0.3;
/// Relative one-sigma uncertainty of the area fallback.
const FALLBACK_RELATIVE_UNCERTAINTY: f64 = 0.5;

/// `Σ area × people_per_m2[settlement][type] × multiplier × age_factor`.
///
/// # Errors
///
/// Returns [`PopulationError::NoBuildings`] for an empty inventory and
/// [`PopulationError::InvalidEstimate`] if the total is not positive.
pub fn area_based(
    buildings: &[Building],
    zone_settlement: SettlementType,
    zone_area_m2: Option<f64>,
    calibration: &CalibrationTable,
) -> Result<PopulationEstimate, PopulationError> {
    let method = EstimationMethod::AreaBased;
    require_buildings(buildings, method)?;

    let age_factor = calibration.population.age_factor;
    let mut breakdown = BTreeMap::new();

    for building in buildings {
        let params = calibration
            .settlement
            .get(building.settlement_type.or_zone(zone_settlement));
        let people = usable(building.area_m2)
            * params.people_per_m2.get(building.building_type)
            * params.multiplier
            * age_factor;
        *breakdown
            .entry(building.building_type.to_string())
            .or_insert(0.0) += people;
    }

    single_method(
        method,
        breakdown,
        calibration.population.relative_uncertainty.area_based,
        zone_area_m2,
    )
}

/// `Σ floors × people_per_floor[settlement][type] × multiplier`.
///
/// # Errors
///
/// Returns [`PopulationError::NoBuildings`] for an empty inventory and
/// [`PopulationError::InvalidEstimate`] if the total is not positive.
pub fn floor_based(
    buildings: &[Building],
    zone_settlement: SettlementType,
    zone_area_m2: Option<f64>,
    calibration: &CalibrationTable,
) -> Result<PopulationEstimate, PopulationError> {
    let method = EstimationMethod::FloorBased;
    require_buildings(buildings, method)?;

    let mut breakdown = BTreeMap::new();

    for building in buildings {
        // A footprint with no area holds nobody, however tall it is.
        if usable(building.area_m2) <= 0.0 {
            continue;
        }
        let params = calibration
            .settlement
            .get(building.settlement_type.or_zone(zone_settlement));
        let people = building.floors()
            * params.people_per_floor.get(building.building_type)
            * params.multiplier;
        *breakdown
            .entry(building.building_type.to_string())
            .or_insert(0.0) += people;
    }

    single_method(
        method,
        breakdown,
        calibration.population.relative_uncertainty.floor_based,
        zone_area_m2,
    )
}

/// Built area aggregated per settlement type times that settlement's
/// averaged density.
///
/// # Errors
///
/// Returns [`PopulationError::NoBuildings`] for an empty inventory and
/// [`PopulationError::InvalidEstimate`] if the total is not positive.
pub fn settlement_based(
    buildings: &[Building],
    zone_settlement: SettlementType,
    zone_area_m2: Option<f64>,
    calibration: &CalibrationTable,
) -> Result<PopulationEstimate, PopulationError> {
    let method = EstimationMethod::SettlementBased;
    require_buildings(buildings, method)?;

    let mut built_area: BTreeMap<SettlementType, f64> = BTreeMap::new();
    for building in buildings {
        *built_area
            .entry(building.settlement_type.or_zone(zone_settlement))
            .or_insert(0.0) += usable(building.area_m2);
    }

    let breakdown = built_area
        .into_iter()
        .map(|(settlement, area)| {
            let density = calibration.settlement.get(settlement).density_per_m2;
            (settlement.to_string(), area * density)
        })
        .collect();

    single_method(
        method,
        breakdown,
        calibration.population.relative_uncertainty.settlement_based,
        zone_area_m2,
    )
}

/// `area_m2 × fallback_density / 1,000,000`, used when no building
/// method can run.
///
/// # Errors
///
/// Returns [`PopulationError::InvalidArea`] if the area is not positive.
pub fn area_fallback(
    zone_area_m2: f64,
    calibration: &CalibrationTable,
) -> Result<PopulationEstimate, PopulationError> {
    if !zone_area_m2.is_finite() || zone_area_m2 <= 0.0 {
        return Err(PopulationError::InvalidArea {
            area_m2: zone_area_m2,
        });
    }

    let density = calibration.population.fallback_density_per_km2;
    let total = zone_area_m2 * density / 1_000_000.0;
    let sigma = total * FALLBACK_RELATIVE_UNCERTAINTY;

    log::debug!("Area fallback: {zone_area_m2:.0} m² at {density}/km² = {total:.0}");

    Ok(PopulationEstimate {
        method: EstimationMethod::AreaFallback,
        total_population: total,
        breakdown: BTreeMap::from([("zone_area".to_string(), total)]),
        standard_deviation: sigma,
        coefficient_of_variation: FALLBACK_RELATIVE_UNCERTAINTY,
        confidence_interval_95: ConfidenceInterval::from_sigma(total, sigma),
        confidence_level: FALLBACK_CONFIDENCE,
        density_per_km2: Some(density),
    })
}

fn single_method(
    method: EstimationMethod,
    breakdown: BTreeMap<String, f64>,
    relative_uncertainty: f64,
    zone_area_m2: Option<f64>,
) -> Result<PopulationEstimate, PopulationError> {
    let total = ensure_positive(method, breakdown.values().sum())?;
    let sigma = total * relative_uncertainty;

    Ok(PopulationEstimate {
        method,
        total_population: total,
        breakdown,
        standard_deviation: sigma,
        coefficient_of_variation: relative_uncertainty,
        confidence_interval_95: ConfidenceInterval::from_sigma(total, sigma),
        confidence_level: (1.0 - relative_uncertainty).clamp(0.0, 1.0),
        density_per_km2: density_per_km2(total, zone_area_m2),
    })
}

pub(crate) fn density_per_km2(total: f64, zone_area_m2: Option<f64>) -> Option<f64> {
    zone_area_m2
        .filter(|area| area.is_finite() && *area > 0.0)
        .map(|area| total / (area / 1_000_000.0))
}

const fn require_buildings(
    buildings: &[Building],
    method: EstimationMethod,
) -> Result<(), PopulationError> {
    if buildings.is_empty() {
        Err(PopulationError::NoBuildings { method })
    } else {
        Ok(())
    }
}

/// Treats non-finite or negative footprints as empty.
fn usable(area_m2: f64) -> f64 {
    if area_m2.is_finite() && area_m2 > 0.0 {
        area_m2
    } else {
        0.0
    }
}
