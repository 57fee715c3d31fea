//! Weighted ensemble of the building-driven estimation methods.
//!
//! The ensemble total is the weighted mean of whichever methods produced
//! a usable estimate, so it always lies between the smallest and largest
//! member. Its uncertainty is the spread of the member totals.

use std::collections::BTreeMap;

use zone_resource_calibration::{CalibrationTable, MethodWeights};
use zone_resource_population_models::{
    ConfidenceInterval, EnsembleEstimate, EstimationMethod, PopulationEstimate,
};
use zone_resource_zone_models::{Building, SettlementType};

use crate::PopulationError;
use crate::methods::{self, density_per_km2};

const MAX_ENSEMBLE_CONFIDENCE: f64 = 0.95;
const MIN_ENSEMBLE_CONFIDENCE: f64 = 0.1;
/// Confidence penalty applied when a method had to be excluded.
const PARTIAL_ENSEMBLE_PENALTY: f64 = 0.8;

/// Population estimator bound to one calibration table.
#[derive(Debug, Clone)]
pub struct PopulationEstimator<'a> {
    calibration: &'a CalibrationTable,
    weights: MethodWeights,
}

impl<'a> PopulationEstimator<'a> {
    /// Creates an estimator using the table's default ensemble weights.
    #[must_use]
    pub const fn new(calibration: &'a CalibrationTable) -> Self {
        Self {
            calibration,
            weights: calibration.population.ensemble_weights,
        }
    }

    /// Overrides the ensemble weights. Negative or non-finite weights are
    /// treated as zero; an all-zero set falls back to the table defaults.
    #[must_use]
    pub fn with_weights(mut self, weights: MethodWeights) -> Self {
        let clean = |w: f64| if w.is_finite() && w > 0.0 { w } else { 0.0 };
        let cleaned = MethodWeights {
            area_based: clean(weights.area_based),
            floor_based: clean(weights.floor_based),
            settlement_based: clean(weights.settlement_based),
        };
        if cleaned.total() > 0.0 {
            self.weights = cleaned;
        } else {
            log::warn!("Ignoring all-zero ensemble weights; using calibration defaults");
        }
        self
    }

    /// The weights in effect.
    #[must_use]
    pub const fn weights(&self) -> MethodWeights {
        self.weights
    }

    /// Runs all three methods and combines them.
    ///
    /// Methods that fail are excluded and the remaining weights are
    /// renormalized.
    ///
    /// # Errors
    ///
    /// Returns the last method's [`PopulationError`] if no method produced
    /// a usable estimate. Callers substitute [`Self::fallback`].
    pub fn estimate(
        &self,
        buildings: &[Building],
        zone_settlement: SettlementType,
        zone_area_m2: Option<f64>,
    ) -> Result<EnsembleEstimate, PopulationError> {
        let runs = [
            (
                self.weights.area_based,
                methods::area_based(buildings, zone_settlement, zone_area_m2, self.calibration),
            ),
            (
                self.weights.floor_based,
                methods::floor_based(buildings, zone_settlement, zone_area_m2, self.calibration),
            ),
            (
                self.weights.settlement_based,
                methods::settlement_based(
                    buildings,
                    zone_settlement,
                    zone_area_m2,
                    self.calibration,
                ),
            ),
        ];

        let mut members = Vec::new();
        let mut member_weights = Vec::new();
        let mut excluded_methods = Vec::new();
        let mut last_error = None;

        for (weight, run) in runs {
            match run {
                Ok(estimate) if weight > 0.0 => {
                    member_weights.push(weight);
                    members.push(estimate);
                }
                Ok(estimate) => {
                    log::debug!("{} has zero weight; excluded", estimate.method);
                    excluded_methods.push(estimate.method);
                }
                Err(e) => {
                    log::debug!("Ensemble member failed: {e}");
                    excluded_methods.push(method_of(&e));
                    last_error = Some(e);
                }
            }
        }

        if members.is_empty() {
            return Err(last_error.unwrap_or(PopulationError::NoBuildings {
                method: EstimationMethod::Ensemble,
            }));
        }

        let estimate = combine(&members, &member_weights, zone_area_m2, !excluded_methods.is_empty());

        log::debug!(
            "Ensemble of {} methods: {:.0} ± {:.0}",
            members.len(),
            estimate.total_population,
            estimate.standard_deviation
        );

        Ok(EnsembleEstimate {
            estimate,
            members,
            excluded_methods,
        })
    }

    /// Area-proportional estimate for zones without usable buildings.
    ///
    /// # Errors
    ///
    /// Returns [`PopulationError::InvalidArea`] if the area is not positive.
    pub fn fallback(&self, zone_area_m2: f64) -> Result<PopulationEstimate, PopulationError> {
        methods::area_fallback(zone_area_m2, self.calibration)
    }
}

/// Weighted mean of the member totals with spread-derived uncertainty.
///
/// A single member keeps its own uncertainty, since there is no spread
/// to measure.
#[allow(clippy::cast_precision_loss)]
fn combine(
    members: &[PopulationEstimate],
    weights: &[f64],
    zone_area_m2: Option<f64>,
    partial: bool,
) -> PopulationEstimate {
    let weight_total: f64 = weights.iter().sum();

    let mut breakdown = BTreeMap::new();
    let mut total = 0.0;
    for (member, weight) in members.iter().zip(weights) {
        let contribution = member.total_population * weight / weight_total;
        breakdown.insert(member.method.to_string(), contribution);
        total += contribution;
    }

    let standard_deviation = if members.len() > 1 {
        let n = members.len() as f64;
        let mean = members.iter().map(|m| m.total_population).sum::<f64>() / n;
        let variance = members
            .iter()
            .map(|m| (m.total_population - mean).powi(2))
            .sum::<f64>()
            / n;
        variance.sqrt()
    } else {
        members[0].standard_deviation
    };

    let coefficient_of_variation = if total > 0.0 {
        standard_deviation / total
    } else {
        0.0
    };

    let mut confidence_level =
        (1.0 - coefficient_of_variation).clamp(MIN_ENSEMBLE_CONFIDENCE, MAX_ENSEMBLE_CONFIDENCE);
    if partial {
        confidence_level *= PARTIAL_ENSEMBLE_PENALTY;
    }

    PopulationEstimate {
        method: EstimationMethod::Ensemble,
        total_population: total,
        breakdown,
        standard_deviation,
        coefficient_of_variation,
        confidence_interval_95: ConfidenceInterval::from_sigma(total, standard_deviation),
        confidence_level,
        density_per_km2: density_per_km2(total, zone_area_m2),
    }
}

const fn method_of(error: &PopulationError) -> EstimationMethod {
    match error {
        PopulationError::InvalidEstimate { method, .. } | PopulationError::NoBuildings { method } => {
            *method
        }
        PopulationError::InvalidBaseline { .. } | PopulationError::InvalidArea { .. } => {
            EstimationMethod::Ensemble
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zone_resource_calibration::default_region;
    use zone_resource_zone_models::BuildingType;

    fn inventory() -> Vec<Building> {
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

    #[test]
    fn reference_scenario_lies_between_members() {
        let table = default_region().unwrap();
        let estimator = PopulationEstimator::new(&table);
        let result = estimator
            .estimate(&inventory(), SettlementType::Mixed, Some(1_000_000.0))
            .unwrap();

        let totals: BTreeMap<EstimationMethod, f64> = result
            .members
            .iter()
            .map(|m| (m.method, m.total_population))
            .collect();
        assert!((totals[&EstimationMethod::AreaBased] - 1400.0).abs() < 1e-6);
        assert!((totals[&EstimationMethod::FloorBased] - 1200.0).abs() < 1e-6);
        assert!((totals[&EstimationMethod::SettlementBased] - 1600.0).abs() < 1e-6);

        let total = result.estimate.total_population;
        assert!((total - 1400.0).abs() < 1e-6, "ensemble was {total}");
        assert!(total >= totals[&EstimationMethod::FloorBased]);
        assert!(total <= totals[&EstimationMethod::SettlementBased]);
        assert!(result.excluded_methods.is_empty());
    }

    #[test]
    fn spread_gives_interval() {
        let table = default_region().unwrap();
        let result = PopulationEstimator::new(&table)
            .estimate(&inventory(), SettlementType::Mixed, None)
            .unwrap()
            .estimate;

        // Population standard deviation of {1400, 1200, 1600}.
        let sigma = (80_000.0_f64 / 3.0).sqrt();
        assert!((result.standard_deviation - sigma).abs() < 1e-6);
        assert!((result.confidence_interval_95.upper - (1400.0 + 1.96 * sigma)).abs() < 1e-6);
        assert!((result.confidence_interval_95.lower - (1400.0 - 1.96 * sigma)).abs() < 1e-6);
        assert!(result.confidence_interval_95.contains(1400.0));
        assert!((result.coefficient_of_variation - sigma / 1400.0).abs() < 1e-9);
    }

    #[test]
    fn ensemble_bounded_for_any_weights() {
        let table = default_region().unwrap();
        let mut buildings = inventory();
        buildings.truncate(37);
        buildings[0].height_m = Some(20.0);
        buildings[1].building_type = BuildingType::Commercial;
        buildings[2].settlement_type = SettlementType::Informal;

        for weights in [
            MethodWeights { area_based: 1.0, floor_based: 0.0, settlement_based: 0.0 },
            MethodWeights { area_based: 0.1, floor_based: 5.0, settlement_based: 0.2 },
            MethodWeights { area_based: 0.4, floor_based: 0.3, settlement_based: 0.3 },
        ] {
            let result = PopulationEstimator::new(&table)
                .with_weights(weights)
                .estimate(&buildings, SettlementType::Mixed, None)
                .unwrap();
            let (lo, hi) = result.member_range().unwrap();
            let total = result.estimate.total_population;
            assert!(total >= lo - 1e-9 && total <= hi + 1e-9, "{total} outside [{lo}, {hi}]");
        }
    }

    #[test]
    fn zero_weight_members_are_excluded() {
        let table = default_region().unwrap();
        let result = PopulationEstimator::new(&table)
            .with_weights(MethodWeights {
                area_based: 1.0,
                floor_based: 0.0,
                settlement_based: 0.0,
            })
            .estimate(&inventory(), SettlementType::Mixed, None)
            .unwrap();
        assert_eq!(result.members.len(), 1);
        assert!((result.estimate.total_population - 1400.0).abs() < 1e-6);
        assert_eq!(result.excluded_methods.len(), 2);
    }

    #[test]
    fn all_zero_weights_keep_defaults() {
        let table = default_region().unwrap();
        let estimator = PopulationEstimator::new(&table).with_weights(MethodWeights {
            area_based: 0.0,
            floor_based: -1.0,
            settlement_based: f64::NAN,
        });
        assert!((estimator.weights().area_based - 0.4).abs() < 1e-12);
    }

    #[test]
    fn empty_inventory_requires_fallback() {
        let table = default_region().unwrap();
        let estimator = PopulationEstimator::new(&table);
        assert!(matches!(
            estimator.estimate(&[], SettlementType::Mixed, Some(1_000_000.0)),
            Err(PopulationError::NoBuildings { .. })
        ));
        let fallback = estimator.fallback(1_000_000.0).unwrap();
        assert!((fallback.total_population - 2500.0).abs() < 1e-9);
    }
}
