//! Dasymetric redistribution of an external baseline population.
//!
//! A gridded baseline spreads people evenly over land. The mapper scales
//! it by the product of three normalized weights (building coverage,
//! settlement mix, building-type mix), clamped to
//! `[MIN_REDISTRIBUTION_FACTOR, MAX_REDISTRIBUTION_FACTOR]`, then
//! apportions the refined total back across settlement and building-type
//! categories.

use std::collections::BTreeMap;

use zone_resource_calibration::CalibrationTable;
use zone_resource_population_models::{DasymetricMethod, DasymetricResult};
use zone_resource_zone_models::{Building, BuildingType, SettlementType};

use crate::PopulationError;
use crate::methods::density_per_km2;

/// Bounds on the multiplier applied to the baseline.
pub const MIN_REDISTRIBUTION_FACTOR: f64 = 0.5;
pub const MAX_REDISTRIBUTION_FACTOR: f64 = 2.0;

/// Relative slack before the density ceiling is considered exceeded, so
/// a result already scaled to the ceiling is left alone.
const CEILING_TOLERANCE: f64 = 1e-9;

/// Redistributes baseline populations using building weights.
#[derive(Debug, Clone)]
pub struct DasymetricMapper<'a> {
    calibration: &'a CalibrationTable,
}

impl<'a> DasymetricMapper<'a> {
    #[must_use]
    pub const fn new(calibration: &'a CalibrationTable) -> Self {
        Self { calibration }
    }

    /// Refines `baseline_population` for a zone of `zone_area_m2`.
    ///
    /// Without usable buildings the baseline is returned unchanged with
    /// [`DasymetricMethod::NoDataAvailable`].
    ///
    /// # Errors
    ///
    /// Returns [`PopulationError::InvalidBaseline`] if the baseline is
    /// negative or not finite.
    pub fn redistribute(
        &self,
        baseline_population: f64,
        buildings: &[Building],
        zone_settlement: SettlementType,
        zone_area_m2: f64,
    ) -> Result<DasymetricResult, PopulationError> {
        if !baseline_population.is_finite() || baseline_population < 0.0 {
            return Err(PopulationError::InvalidBaseline {
                value: baseline_population,
            });
        }

        let mut settlement_area: BTreeMap<SettlementType, f64> = BTreeMap::new();
        let mut type_area: BTreeMap<BuildingType, f64> = BTreeMap::new();
        for building in buildings
            .iter()
            .filter(|b| b.area_m2.is_finite() && b.area_m2 > 0.0)
        {
            *settlement_area
                .entry(building.settlement_type.or_zone(zone_settlement))
                .or_insert(0.0) += building.area_m2;
            *type_area.entry(building.building_type).or_insert(0.0) += building.area_m2;
        }

        let built_area: f64 = type_area.values().sum();
        if built_area <= 0.0 {
            log::debug!("No building data for dasymetric mapping; baseline passed through");
            return Ok(no_data(baseline_population, zone_area_m2));
        }

        let params = &self.calibration.dasymetric;
        let settlement_weights: BTreeMap<SettlementType, f64> = settlement_area
            .keys()
            .map(|s| (*s, self.calibration.settlement.get(*s).dasymetric_weight))
            .collect();
        let type_weights: BTreeMap<BuildingType, f64> = type_area
            .keys()
            .map(|t| (*t, params.building_type_weights.get(*t)))
            .collect();

        let max_settlement_weight = SettlementType::all()
            .iter()
            .map(|s| self.calibration.settlement.get(*s).dasymetric_weight)
            .fold(0.0, f64::max);
        let max_type_weight = params.building_type_weights.max();

        let coverage = if zone_area_m2.is_finite() && zone_area_m2 > 0.0 {
            built_area / zone_area_m2
        } else {
            params.saturation_coverage
        };
        let density_weight = coverage_weight(coverage, params.saturation_coverage);
        let settlement_weight =
            area_weighted_mean(&settlement_area, &settlement_weights, built_area, max_settlement_weight);
        let building_type_weight =
            area_weighted_mean(&type_area, &type_weights, built_area, max_type_weight);
        let combined_weight = density_weight * settlement_weight * building_type_weight;

        let redistribution_factor =
            combined_weight.clamp(MIN_REDISTRIBUTION_FACTOR, MAX_REDISTRIBUTION_FACTOR);

        let refined_population = baseline_population * redistribution_factor;

        log::debug!(
            "Dasymetric: baseline {baseline_population:.0} × {redistribution_factor:.3} \
             (coverage {coverage:.3}, weights {density_weight:.3}/{settlement_weight:.3}/{building_type_weight:.3})"
        );

        let result = DasymetricResult {
            method: DasymetricMethod::BuildingWeighted,
            baseline_population,
            refined_population,
            density_weight,
            settlement_weight,
            building_type_weight,
            combined_weight,
            redistribution_factor,
            by_settlement: apportion(refined_population, &settlement_area, &settlement_weights),
            by_building_type: apportion(refined_population, &type_area, &type_weights),
            density_per_km2: density_per_km2(refined_population, Some(zone_area_m2)),
            spatial_constraint_applied: false,
        };

        Ok(apply_density_ceiling(
            result,
            zone_area_m2 / 1_000_000.0,
            self.calibration.population.density_ceiling_per_km2,
        ))
    }
}

/// Scales every population in `result` down uniformly so its density
/// does not exceed `ceiling_per_km2`.
///
/// Applying this to an already constrained result changes nothing.
#[must_use]
pub fn apply_density_ceiling(
    mut result: DasymetricResult,
    zone_area_km2: f64,
    ceiling_per_km2: f64,
) -> DasymetricResult {
    if !zone_area_km2.is_finite() || zone_area_km2 <= 0.0 {
        return result;
    }

    let limit = ceiling_per_km2 * zone_area_km2;
    if result.refined_population <= limit * (1.0 + CEILING_TOLERANCE) {
        return result;
    }

    let scale = limit / result.refined_population;
    log::warn!(
        "Density {:.0}/km² exceeds ceiling {ceiling_per_km2:.0}/km²; scaling by {scale:.4}",
        result.refined_population / zone_area_km2
    );

    result.refined_population = limit;
    for value in result.by_settlement.values_mut() {
        *value *= scale;
    }
    for value in result.by_building_type.values_mut() {
        *value *= scale;
    }
    result.density_per_km2 = Some(ceiling_per_km2);
    result.spatial_constraint_applied = true;
    result
}

fn no_data(baseline_population: f64, zone_area_m2: f64) -> DasymetricResult {
    DasymetricResult {
        method: DasymetricMethod::NoDataAvailable,
        baseline_population,
        refined_population: baseline_population,
        density_weight: 0.0,
        settlement_weight: 0.0,
        building_type_weight: 0.0,
        combined_weight: 0.0,
        redistribution_factor: 1.0,
        by_settlement: BTreeMap::new(),
        by_building_type: BTreeMap::new(),
        density_per_km2: density_per_km2(baseline_population, Some(zone_area_m2)),
        spatial_constraint_applied: false,
    }
}

fn coverage_weight(coverage: f64, saturation: f64) -> f64 {
    if saturation > 0.0 {
        (coverage / saturation).clamp(0.0, 1.0)
    } else {
        1.0
    }
}

fn normalized(weight: f64, max: f64) -> f64 {
    if max > 0.0 {
        (weight / max).clamp(0.0, 1.0)
    } else {
        0.0
    }
}

/// Area-weighted mean of category weights, each normalized by `max`.
fn area_weighted_mean<K: Ord>(
    areas: &BTreeMap<K, f64>,
    weights: &BTreeMap<K, f64>,
    total_area: f64,
    max: f64,
) -> f64 {
    areas
        .iter()
        .map(|(key, area)| {
            let weight = weights.get(key).copied().unwrap_or(0.0);
            area / total_area * normalized(weight, max)
        })
        .sum()
}

/// Splits `total` across categories in proportion to `area × weight`,
/// falling back to plain area shares if every weight is zero.
fn apportion<K: Ord + Copy>(
    total: f64,
    areas: &BTreeMap<K, f64>,
    weights: &BTreeMap<K, f64>,
) -> BTreeMap<K, f64> {
    let weighted: BTreeMap<K, f64> = areas
        .iter()
        .map(|(key, area)| (*key, area * weights.get(key).copied().unwrap_or(0.0)))
        .collect();
    let weighted_total: f64 = weighted.values().sum();

    let (shares, share_total) = if weighted_total > 0.0 {
        (weighted, weighted_total)
    } else {
        (areas.clone(), areas.values().sum())
    };

    shares
        .into_iter()
        .map(|(key, share)| (key, total * share / share_total))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use zone_resource_calibration::default_region;

    fn buildings(
        count: usize,
        area_m2: f64,
        building_type: BuildingType,
        settlement: SettlementType,
    ) -> Vec<Building> {
        (0..count)
            .map(|i| Building {
                id: format!("b{i}"),
                area_m2,
                height_m: None,
                building_type,
                settlement_type: settlement,
            })
            .collect()
    }

    #[test]
    fn no_buildings_passes_baseline_through() {
        let table = default_region().unwrap();
        let result = DasymetricMapper::new(&table)
            .redistribute(3000.0, &[], SettlementType::Mixed, 1_000_000.0)
            .unwrap();
        assert_eq!(result.method, DasymetricMethod::NoDataAvailable);
        assert!((result.refined_population - 3000.0).abs() < f64::EPSILON);
        assert!(!result.spatial_constraint_applied);
    }

    #[test]
    fn factor_is_combined_weight_clamped() {
        let table = default_region().unwrap();
        // 30% coverage of mixed residential stock: coverage weight
        // 0.3 / 0.6, settlement weight 0.7 / 1.0, building-type weight 1.0.
        let inventory = buildings(3000, 100.0, BuildingType::Residential, SettlementType::Mixed);
        let result = DasymetricMapper::new(&table)
            .redistribute(5000.0, &inventory, SettlementType::Mixed, 1_000_000.0)
            .unwrap();

        assert!((result.density_weight - 0.5).abs() < 1e-9);
        assert!((result.settlement_weight - 0.7).abs() < 1e-9);
        assert!((result.building_type_weight - 1.0).abs() < 1e-9);
        assert!((result.combined_weight - 0.35).abs() < 1e-9);
        assert!(
            (result.redistribution_factor
                - result
                    .combined_weight
                    .clamp(MIN_REDISTRIBUTION_FACTOR, MAX_REDISTRIBUTION_FACTOR))
            .abs()
                < 1e-12
        );
        assert!((result.redistribution_factor - 0.5).abs() < 1e-12);
        assert!((result.refined_population - 2500.0).abs() < 1e-6);
    }

    #[test]
    fn saturated_informal_stock_keeps_unclamped_factor() {
        let table = default_region().unwrap();
        // 72% coverage saturates the coverage weight; informal residential
        // stock has the maximum settlement and type weights.
        let inventory = buildings(7200, 100.0, BuildingType::Residential, SettlementType::Informal);
        let result = DasymetricMapper::new(&table)
            .redistribute(1000.0, &inventory, SettlementType::Informal, 1_000_000.0)
            .unwrap();

        assert!((result.combined_weight - 1.0).abs() < 1e-12);
        assert!((result.redistribution_factor - 1.0).abs() < 1e-12);
        assert!((result.refined_population - 1000.0).abs() < 1e-6);
    }

    #[test]
    fn factor_is_clamped_to_lower_bound() {
        let table = default_region().unwrap();
        let mapper = DasymetricMapper::new(&table);

        let sparse_industrial =
            buildings(5, 100.0, BuildingType::Industrial, SettlementType::Formal);
        let low = mapper
            .redistribute(1000.0, &sparse_industrial, SettlementType::Formal, 1_000_000.0)
            .unwrap();
        assert!(low.combined_weight < MIN_REDISTRIBUTION_FACTOR);
        assert!((low.redistribution_factor - MIN_REDISTRIBUTION_FACTOR).abs() < 1e-12);
        assert!((low.refined_population - 500.0).abs() < 1e-9);
        for weight in [low.density_weight, low.settlement_weight, low.building_type_weight] {
            assert!((0.0..=1.0).contains(&weight));
        }
    }

    #[test]
    fn zone_without_area_uses_saturation_coverage() {
        let table = default_region().unwrap();
        let inventory = buildings(10, 100.0, BuildingType::Residential, SettlementType::Informal);
        let result = DasymetricMapper::new(&table)
            .redistribute(800.0, &inventory, SettlementType::Informal, 0.0)
            .unwrap();
        assert!((result.density_weight - 1.0).abs() < 1e-12);
        assert!((result.refined_population - 800.0).abs() < 1e-9);
        assert!(!result.spatial_constraint_applied);
    }

    #[test]
    fn categories_sum_to_refined_total() {
        let table = default_region().unwrap();
        let mut inventory = buildings(40, 120.0, BuildingType::Residential, SettlementType::Informal);
        inventory.extend(buildings(10, 400.0, BuildingType::Commercial, SettlementType::Formal));
        inventory.extend(buildings(5, 90.0, BuildingType::Mixed, SettlementType::Unknown));

        let result = DasymetricMapper::new(&table)
            .redistribute(2500.0, &inventory, SettlementType::Mixed, 500_000.0)
            .unwrap();

        let by_settlement: f64 = result.by_settlement.values().sum();
        let by_type: f64 = result.by_building_type.values().sum();
        assert!((by_settlement - result.refined_population).abs() < 1e-6);
        assert!((by_type - result.refined_population).abs() < 1e-6);
        assert!(result.by_settlement.contains_key(&SettlementType::Mixed));
        assert!(!result.by_settlement.contains_key(&SettlementType::Unknown));
        assert!(
            result.by_building_type[&BuildingType::Residential]
                > result.by_building_type[&BuildingType::Commercial]
        );
    }

    #[test]
    fn density_ceiling_caps_and_is_idempotent() {
        let table = default_region().unwrap();
        let inventory = buildings(50, 100.0, BuildingType::Residential, SettlementType::Informal);
        // 100,000 people on 0.5 km² is four times the ceiling; the sparse
        // footprint halves it, which still leaves it at twice the ceiling.
        let result = DasymetricMapper::new(&table)
            .redistribute(100_000.0, &inventory, SettlementType::Informal, 500_000.0)
            .unwrap();

        assert!(result.spatial_constraint_applied);
        assert!((result.refined_population - 25_000.0).abs() < 1e-6);
        let by_type: f64 = result.by_building_type.values().sum();
        assert!((by_type - 25_000.0).abs() < 1e-6);

        let again = apply_density_ceiling(result.clone(), 0.5, 50_000.0);
        assert_eq!(again, result);
    }

    #[test]
    fn rejects_negative_baseline() {
        let table = default_region().unwrap();
        assert!(matches!(
            DasymetricMapper::new(&table).redistribute(-1.0, &[], SettlementType::Mixed, 1.0),
            Err(PopulationError::InvalidBaseline { .. })
        ));
    }
}
