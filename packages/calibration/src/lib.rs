#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Regional calibration tables.
//!
//! Every density, waste, and cost constant the analysis engine uses is
//! data, loaded from a TOML table per region. The tables encode local
//! field calibration and are consumed verbatim; see [`registry`] for the
//! regions compiled into the binary.

pub mod registry;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use zone_resource_zone_models::{BuildingType, LatLng, SettlementType};

pub use registry::{all_regions, default_region, region};

/// Errors that can occur while loading a calibration table.
#[derive(Debug, Error)]
pub enum CalibrationError {
    /// No region with this id is registered.
    #[error("Unknown calibration region: {id}")]
    UnknownRegion {
        /// The requested region id.
        id: String,
    },

    /// TOML parsing failed.
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// The table parsed but holds values the models cannot use.
    #[error("Invalid calibration for {region}: {message}")]
    Invalid {
        /// Region id.
        region: String,
        /// Description of what went wrong.
        message: String,
    },
}

/// A complete calibration table for one region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationTable {
    /// Unique region identifier (e.g., `"lusaka"`).
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// ISO currency code for every monetary value in the table.
    pub currency: String,
    /// Population model parameters.
    pub population: PopulationCalibration,
    /// Per-settlement parameters.
    pub settlement: SettlementTable,
    /// Dasymetric redistribution parameters.
    pub dasymetric: DasymetricCalibration,
    /// Collection logistics and cost constants.
    pub logistics: LogisticsCalibration,
}

impl CalibrationTable {
    /// Parses and validates a table from TOML.
    ///
    /// # Errors
    ///
    /// Returns [`CalibrationError`] if the TOML is malformed or a value is
    /// outside what the models accept.
    pub fn from_toml_str(toml_str: &str) -> Result<Self, CalibrationError> {
        let table: Self = toml::de::from_str(toml_str)?;
        table.validate()?;
        Ok(table)
    }

    /// Checks the invariants the models rely on.
    ///
    /// # Errors
    ///
    /// Returns [`CalibrationError::Invalid`] describing the first violation.
    pub fn validate(&self) -> Result<(), CalibrationError> {
        let weights = &self.population.ensemble_weights;
        if [weights.area_based, weights.floor_based, weights.settlement_based]
            .iter()
            .any(|w| !w.is_finite() || *w < 0.0)
            || weights.total() <= 0.0
        {
            return Err(self.invalid("ensemble weights must be non-negative with a positive sum"));
        }

        if self.population.fallback_density_per_km2 <= 0.0 {
            return Err(self.invalid("fallback density must be positive"));
        }
        if self.population.density_ceiling_per_km2 <= 0.0 {
            return Err(self.invalid("density ceiling must be positive"));
        }

        for settlement in SettlementType::all() {
            let params = self.settlement.get(*settlement);
            if params.household_size <= 0.0 {
                return Err(self.invalid(format!("{settlement} household size must be positive")));
            }
            if params.multiplier <= 0.0 || params.density_per_m2 <= 0.0 {
                return Err(self.invalid(format!(
                    "{settlement} multiplier and density must be positive"
                )));
            }
        }

        if !(0.0..=1.0).contains(&self.dasymetric.blend_weight) {
            return Err(self.invalid("dasymetric blend weight must be within [0, 1]"));
        }
        if self.dasymetric.saturation_coverage <= 0.0 {
            return Err(self.invalid("dasymetric saturation coverage must be positive"));
        }

        let logistics = &self.logistics;
        if logistics.truck_capacities_tonnes.is_empty()
            || logistics.truck_capacities_tonnes.iter().any(|c| *c <= 0.0)
        {
            return Err(self.invalid("truck capacities must be a non-empty list of positive values"));
        }
        if logistics.min_waste_per_collection_kg >= logistics.max_waste_per_collection_kg {
            return Err(self.invalid("per-collection waste bounds are inverted"));
        }
        if logistics.fuel_km_per_liter <= 0.0 {
            return Err(self.invalid("fuel efficiency must be positive"));
        }
        if logistics.max_trucks_per_type == 0 {
            return Err(self.invalid("max trucks per type must be at least one"));
        }

        Ok(())
    }

    fn invalid(&self, message: impl Into<String>) -> CalibrationError {
        CalibrationError::Invalid {
            region: self.id.clone(),
            message: message.into(),
        }
    }
}

/// Population model parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PopulationCalibration {
    /// Density assumed when no buildings are known, in people/km².
    pub fallback_density_per_km2: f64,
    /// Highest plausible density, in people/km².
    pub density_ceiling_per_km2: f64,
    /// Building-age adjustment applied by the area-based method.
    pub age_factor: f64,
    /// Default ensemble weights.
    pub ensemble_weights: MethodWeights,
    /// Relative one-sigma uncertainty of each single method.
    pub relative_uncertainty: MethodWeights,
}

/// One value per estimation method.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MethodWeights {
    /// Area-based method.
    pub area_based: f64,
    /// Floor-based method.
    pub floor_based: f64,
    /// Settlement-density method.
    pub settlement_based: f64,
}

impl MethodWeights {
    /// Sum of the three values.
    #[must_use]
    pub fn total(&self) -> f64 {
        self.area_based + self.floor_based + self.settlement_based
    }
}

/// Parameters for each settlement type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettlementTable {
    /// Planned neighbourhoods.
    pub formal: SettlementParameters,
    /// Unplanned compounds.
    pub informal: SettlementParameters,
    /// Mixed building stock.
    pub mixed: SettlementParameters,
    /// Unclassified.
    pub unknown: SettlementParameters,
}

impl SettlementTable {
    /// Returns the parameters for `settlement`.
    #[must_use]
    pub const fn get(&self, settlement: SettlementType) -> &SettlementParameters {
        match settlement {
            SettlementType::Formal => &self.formal,
            SettlementType::Informal => &self.informal,
            SettlementType::Mixed => &self.mixed,
            SettlementType::Unknown => &self.unknown,
        }
    }
}

/// Density, household, waste, and revenue rates for one settlement type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettlementParameters {
    /// Density multiplier applied by the area- and floor-based methods.
    pub multiplier: f64,
    /// Settlement-averaged people per m² of built area.
    pub density_per_m2: f64,
    /// People per household.
    pub household_size: f64,
    /// Waste generated per person per day, in kg.
    pub waste_kg_per_person_day: f64,
    /// Collection fee charged per household per month.
    pub monthly_fee_per_household: f64,
    /// Relative weight used when redistributing a baseline population.
    pub dasymetric_weight: f64,
    /// People per m² of footprint, by building type.
    pub people_per_m2: BuildingTypeRates,
    /// People per floor, by building type.
    pub people_per_floor: BuildingTypeRates,
}

/// One value per building type.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BuildingTypeRates {
    pub residential: f64,
    pub commercial: f64,
    pub mixed: f64,
    pub industrial: f64,
    pub unknown: f64,
}

impl BuildingTypeRates {
    /// Returns the value for `building_type`.
    #[must_use]
    pub const fn get(&self, building_type: BuildingType) -> f64 {
        match building_type {
            BuildingType::Residential => self.residential,
            BuildingType::Commercial => self.commercial,
            BuildingType::Mixed => self.mixed,
            BuildingType::Industrial => self.industrial,
            BuildingType::Unknown => self.unknown,
        }
    }

    /// Largest value across building types.
    #[must_use]
    pub fn max(&self) -> f64 {
        BuildingType::all()
            .iter()
            .map(|t| self.get(*t))
            .fold(0.0, f64::max)
    }
}

/// Dasymetric redistribution parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DasymetricCalibration {
    /// Building coverage ratio treated as fully built up.
    pub saturation_coverage: f64,
    /// Share of the final population taken from the dasymetric estimate
    /// when both it and the ensemble are available.
    pub blend_weight: f64,
    /// Relative weight per building type.
    pub building_type_weights: BuildingTypeRates,
}

/// Collection logistics and cost constants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticsCalibration {
    /// Waste rate used when neither the caller nor the settlement sets one.
    pub default_waste_kg_per_person_day: f64,
    /// Fuel price per liter.
    pub fuel_price_per_liter: f64,
    /// Truck fuel efficiency in km per liter.
    pub fuel_km_per_liter: f64,
    /// Disposal site fee per billable tonne.
    pub disposal_fee_per_tonne: f64,
    /// Crew size paid a fixed monthly wage.
    pub staff_count: u32,
    /// Monthly wage per crew member.
    pub monthly_wage_per_staff: f64,
    /// Average weeks per month.
    pub weeks_per_month: f64,
    /// Administrative overhead as a fraction of operational plus labor cost.
    pub admin_overhead_rate: f64,
    /// Available truck classes, in tonnes of payload.
    pub truck_capacities_tonnes: Vec<f64>,
    /// Smallest load that justifies a collection round.
    pub min_waste_per_collection_kg: f64,
    /// Largest load a single collection round can handle.
    pub max_waste_per_collection_kg: f64,
    /// Most trucks of one class a fleet may use.
    pub max_trucks_per_type: u32,
    /// Straight-line to road distance inflation.
    pub road_inflation: f64,
    /// Average truck speed in km/h.
    pub average_truck_speed_kmh: f64,
    /// Where collected waste is tipped.
    pub disposal_site: DisposalSite,
}

/// A named disposal site.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisposalSite {
    /// Human-readable name.
    pub name: String,
    /// Latitude in degrees.
    pub lat: f64,
    /// Longitude in degrees.
    pub lng: f64,
}

impl DisposalSite {
    #[must_use]
    pub const fn location(&self) -> LatLng {
        LatLng::new(self.lat, self.lng)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_inverted_collection_bounds() {
        let mut table = default_region().unwrap();
        table.logistics.min_waste_per_collection_kg = 40_000.0;
        assert!(matches!(
            table.validate(),
            Err(CalibrationError::Invalid { .. })
        ));
    }

    #[test]
    fn rejects_zero_ensemble_weights() {
        let mut table = default_region().unwrap();
        table.population.ensemble_weights = MethodWeights {
            area_based: 0.0,
            floor_based: 0.0,
            settlement_based: 0.0,
        };
        assert!(table.validate().is_err());
    }

    #[test]
    fn rate_lookup_matches_table() {
        let table = default_region().unwrap();
        let mixed = table.settlement.get(SettlementType::Mixed);
        assert!((mixed.people_per_m2.get(BuildingType::Residential) - 0.07).abs() < 1e-12);
        assert!((mixed.multiplier - 1.0).abs() < 1e-12);
        assert!((table.dasymetric.building_type_weights.max() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn malformed_toml_is_reported() {
        assert!(matches!(
            CalibrationTable::from_toml_str("id = "),
            Err(CalibrationError::Toml(_))
        ));
    }
}
