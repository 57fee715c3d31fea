#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Request and result types for a zone analysis.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use thiserror::Error;
use zone_resource_calibration::MethodWeights;
use zone_resource_calibration::registry::DEFAULT_REGION;
use zone_resource_collection_models::{FleetRecommendation, WasteProfile};
use zone_resource_population_models::{
    DasymetricResult, EnsembleEstimate, PopulationEstimate, SettlementClassification,
};
use zone_resource_validation::ValidationReport;
use zone_resource_zone_models::{Building, LatLng, RouteEstimate, ZoneEvent, ZoneGeometry};

/// How much of the pipeline a request runs.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AnalysisKind {
    /// Building inventory and settlement classification.
    Buildings,
    /// Buildings plus population estimation.
    Population,
    /// Population plus waste generation.
    Waste,
    /// Every stage, including collection logistics.
    #[default]
    Comprehensive,
}

impl AnalysisKind {
    /// Whether this kind runs `stage`.
    #[must_use]
    pub const fn includes(self, stage: AnalysisStage) -> bool {
        match stage {
            AnalysisStage::Buildings | AnalysisStage::Settlement | AnalysisStage::Validation => {
                true
            }
            AnalysisStage::Population | AnalysisStage::Dasymetric => {
                !matches!(self, Self::Buildings)
            }
            AnalysisStage::Waste => matches!(self, Self::Waste | Self::Comprehensive),
            AnalysisStage::Collection => matches!(self, Self::Comprehensive),
        }
    }
}

/// Pipeline stages, in the order they run.
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
pub enum AnalysisStage {
    Buildings,
    Settlement,
    Population,
    Dasymetric,
    Waste,
    Collection,
    Validation,
}

/// A recoverable problem met while running a stage.
///
/// Stages return these as errors; the orchestrator records them on the
/// result and carries on with fallback values.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AnalysisWarning {
    /// Input data was missing and a fallback was used.
    #[error("Data gap in {stage}: {message}")]
    DataGap {
        stage: AnalysisStage,
        message: String,
    },
    /// No collection schedule met every constraint.
    #[error("Infeasible collection optimization: {message}")]
    InfeasibleOptimization { message: String },
    /// A plausibility check failed.
    #[error("Validation failure: {message}")]
    ValidationFailure { message: String },
    /// A stage could not produce any output.
    #[error("{stage} stage failed: {reason}")]
    StageFailed {
        stage: AnalysisStage,
        reason: String,
    },
}

/// Caller-tunable analysis settings. Every field takes part in the
/// cache key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisOptions {
    #[serde(default)]
    pub kind: AnalysisKind,
    /// Calibration region id.
    #[serde(default = "default_region_id")]
    pub region: String,
    /// Overrides the settlement-specific waste rate.
    #[serde(default)]
    pub waste_rate_kg_per_person_day: Option<f64>,
    /// Collections per week the caller would like.
    #[serde(default)]
    pub preferred_frequency: Option<u8>,
    /// Overrides the region's ensemble weights.
    #[serde(default)]
    pub ensemble_weights: Option<MethodWeights>,
    /// Overrides the region's dasymetric blend weight.
    #[serde(default)]
    pub dasymetric_blend_weight: Option<f64>,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self {
            kind: AnalysisKind::default(),
            region: default_region_id(),
            waste_rate_kg_per_person_day: None,
            preferred_frequency: None,
            ensemble_weights: None,
            dasymetric_blend_weight: None,
        }
    }
}

fn default_region_id() -> String {
    DEFAULT_REGION.to_string()
}

/// One zone to analyze.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRequest {
    /// Zone boundary ring. Measured and validated by the orchestrator.
    pub geometry: Vec<LatLng>,
    /// Interior rings excluded from the zone.
    #[serde(default)]
    pub holes: Vec<Vec<LatLng>>,
    /// Building inventory. `None` asks the configured building source.
    #[serde(default)]
    pub buildings: Option<Vec<Building>>,
    /// Externally sourced population total for dasymetric refinement.
    #[serde(default)]
    pub baseline_population: Option<f64>,
    /// Entry and exit events observed at the zone boundary.
    #[serde(default)]
    pub events: Vec<ZoneEvent>,
    #[serde(default)]
    pub options: AnalysisOptions,
}

/// Fleet, route and revenue for servicing a zone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionRequirements {
    /// Route to the disposal site.
    pub route: RouteEstimate,
    pub fleet: FleetRecommendation,
    /// Households paying the collection fee.
    pub households: f64,
    pub monthly_fee_per_household: f64,
    /// `households × monthly_fee_per_household`, rounded to two decimals.
    pub estimated_monthly_revenue: f64,
    /// Revenue minus the fleet's monthly total cost.
    pub monthly_net: f64,
    pub currency: String,
}

/// Everything one analysis produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub kind: AnalysisKind,
    pub region: String,
    pub zone: ZoneGeometry,
    /// Final population total.
    pub population_estimate: Option<f64>,
    /// Final population estimate with its uncertainty.
    pub population: Option<PopulationEstimate>,
    pub household_estimate: Option<f64>,
    pub building_count: usize,
    /// Confidence in the building inventory, growing with its size.
    pub buildings_confidence: f64,
    pub waste_generation_kg_per_day: Option<f64>,
    pub waste: Option<WasteProfile>,
    pub collection_requirements: Option<CollectionRequirements>,
    /// Overall confidence in `[0, 1]`.
    pub confidence_level: f64,
    pub data_sources: Vec<String>,
    pub warnings: Vec<String>,
    pub validation: ValidationReport,
    pub settlement: Option<SettlementClassification>,
    pub ensemble: Option<EnsembleEstimate>,
    pub dasymetric: Option<DasymetricResult>,
    /// Content hash of the request.
    pub cache_key: String,
    pub created_at: DateTime<Utc>,
}

impl AnalysisResult {
    /// The validation quality score.
    #[must_use]
    pub const fn quality_score(&self) -> f64 {
        self.validation.score
    }

    /// Serializes into a JSON value.
    ///
    /// # Errors
    ///
    /// * If the result contains a non-finite float
    pub fn to_value(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::to_value(self)
    }

    /// Rebuilds a result from [`Self::to_value`] output.
    ///
    /// # Errors
    ///
    /// * If the value does not describe an `AnalysisResult`
    pub fn from_value(value: serde_json::Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }
}
