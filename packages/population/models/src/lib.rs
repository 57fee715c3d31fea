#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Settlement classification, population estimate, and dasymetric types.
//!
//! All of these are values: produced once per analysis and never
//! mutated afterwards.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use zone_resource_zone_models::{BuildingType, SettlementType};

/// Two-sided z-score for a 95% confidence interval.
pub const Z_95: f64 = 1.96;

/// Descriptive label assigned by the settlement classifier.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SettlementLabel {
    /// Mean height above 8 m
    FormalHighDensity,
    /// Mean height above 5 m
    FormalMediumDensity,
    /// Low-rise building stock
    InformalMediumDensity,
    /// Not enough evidence either way
    Mixed,
}

impl SettlementLabel {
    /// The settlement type this label parameterizes.
    #[must_use]
    pub const fn settlement_type(self) -> SettlementType {
        match self {
            Self::FormalHighDensity | Self::FormalMediumDensity => SettlementType::Formal,
            Self::InformalMediumDensity => SettlementType::Informal,
            Self::Mixed => SettlementType::Mixed,
        }
    }
}

/// Statistics the classifier based its decision on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettlementCharacteristics {
    /// Buildings considered.
    pub building_count: usize,
    /// Buildings that reported a height.
    pub buildings_with_height: usize,
    /// Mean height in meters, if any height was known.
    pub mean_height_m: Option<f64>,
    /// Mean footprint area in m², if any building was known.
    pub mean_area_m2: Option<f64>,
    /// Which evidence decided the label.
    pub basis: ClassificationBasis,
}

/// Evidence the classifier used.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ClassificationBasis {
    /// Mean building height.
    Height,
    /// Settlement tags carried by the buildings themselves.
    BuildingTags,
    /// Mean footprint size.
    FootprintSize,
    /// Nothing to go on.
    Default,
}

/// Settlement classification of a zone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettlementClassification {
    /// Settlement type used to parameterize downstream models.
    pub settlement_type: SettlementType,
    /// Descriptive label.
    pub label: SettlementLabel,
    /// Confidence in `[0, 1]`.
    pub confidence: f64,
    /// Supporting statistics.
    pub characteristics: SettlementCharacteristics,
}

/// Population estimation method.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EstimationMethod {
    /// Footprint area times people per m²
    AreaBased,
    /// Floor count times people per floor
    FloorBased,
    /// Built area per settlement times settlement-averaged density
    SettlementBased,
    /// Weighted combination of the building methods
    Ensemble,
    /// Zone area times a calibrated default density
    AreaFallback,
}

/// A symmetric interval clipped at zero.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceInterval {
    /// Lower bound.
    pub lower: f64,
    /// Upper bound.
    pub upper: f64,
}

impl ConfidenceInterval {
    /// The 95% interval `center ± 1.96σ`, with the lower bound clipped at zero.
    #[must_use]
    pub fn from_sigma(center: f64, sigma: f64) -> Self {
        Self {
            lower: Z_95.mul_add(-sigma, center).max(0.0),
            upper: Z_95.mul_add(sigma, center),
        }
    }

    /// Whether `value` lies inside the interval.
    #[must_use]
    pub fn contains(&self, value: f64) -> bool {
        (self.lower..=self.upper).contains(&value)
    }
}

/// Output of one estimation method.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PopulationEstimate {
    /// Method that produced this estimate.
    pub method: EstimationMethod,
    /// Estimated residents.
    pub total_population: f64,
    /// Residents per category. Keys depend on the method: building
    /// types, settlement types, or method names for the ensemble.
    pub breakdown: BTreeMap<String, f64>,
    /// One-sigma uncertainty.
    pub standard_deviation: f64,
    /// `standard_deviation / total_population`.
    pub coefficient_of_variation: f64,
    /// 95% confidence interval.
    pub confidence_interval_95: ConfidenceInterval,
    /// Confidence in `[0, 1]`.
    pub confidence_level: f64,
    /// Residents per km², when the zone area was supplied.
    pub density_per_km2: Option<f64>,
}

/// The ensemble estimate together with the method estimates it combined.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnsembleEstimate {
    /// The combined estimate.
    pub estimate: PopulationEstimate,
    /// The method estimates that contributed.
    pub members: Vec<PopulationEstimate>,
    /// Methods that could not produce a usable estimate.
    pub excluded_methods: Vec<EstimationMethod>,
}

impl EnsembleEstimate {
    /// Smallest and largest member totals.
    #[must_use]
    pub fn member_range(&self) -> Option<(f64, f64)> {
        let mut totals = self.members.iter().map(|m| m.total_population);
        let first = totals.next()?;
        Some(totals.fold((first, first), |(lo, hi), t| (lo.min(t), hi.max(t))))
    }
}

/// How a dasymetric result was produced.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DasymetricMethod {
    /// Baseline redistributed by building weights.
    BuildingWeighted,
    /// No buildings; baseline passed through unchanged.
    NoDataAvailable,
}

/// A baseline population redistributed across building and settlement
/// categories.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DasymetricResult {
    /// How the result was produced.
    pub method: DasymetricMethod,
    /// Externally supplied total.
    pub baseline_population: f64,
    /// Total after redistribution and the density ceiling.
    pub refined_population: f64,
    /// Building coverage weight in `[0, 1]`.
    pub density_weight: f64,
    /// Area-weighted settlement weight in `[0, 1]`.
    pub settlement_weight: f64,
    /// Area-weighted building-type weight in `[0, 1]`.
    pub building_type_weight: f64,
    /// Product of the three weights.
    pub combined_weight: f64,
    /// Multiplier applied to the baseline, within `[0.5, 2.0]`.
    pub redistribution_factor: f64,
    /// Residents per settlement type.
    pub by_settlement: BTreeMap<SettlementType, f64>,
    /// Residents per building type.
    pub by_building_type: BTreeMap<BuildingType, f64>,
    /// Residents per km² of zone area.
    pub density_per_km2: Option<f64>,
    /// Whether the density ceiling scaled the result down.
    pub spatial_constraint_applied: bool,
}
