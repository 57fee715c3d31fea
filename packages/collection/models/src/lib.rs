#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Waste generation and collection fleet types.

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display};

/// Days per week, for converting daily waste to weekly.
pub const DAYS_PER_WEEK: f64 = 7.0;

/// Waste generated by a zone.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WasteProfile {
    /// Residents generating the waste.
    pub population: f64,
    /// Kilograms per person per day.
    pub rate_kg_per_person_day: f64,
    /// Kilograms per day.
    pub daily_kg: f64,
    /// Kilograms per week.
    pub weekly_kg: f64,
}

impl WasteProfile {
    /// Derives daily and weekly waste from population and rate.
    #[must_use]
    pub fn new(population: f64, rate_kg_per_person_day: f64) -> Self {
        let daily_kg = population * rate_kg_per_person_day;
        Self {
            population,
            rate_kg_per_person_day,
            daily_kg,
            weekly_kg: daily_kg * DAYS_PER_WEEK,
        }
    }
}

/// Itemized fleet cost. Monetary values are rounded to two decimals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostBreakdown {
    /// Round trips per week across the whole fleet.
    pub trips_per_week: u32,
    /// Round-trip distance to the disposal site in km.
    pub round_trip_km: f64,
    /// Fuel per week.
    pub weekly_fuel_cost: f64,
    /// Whole tonnes billed by the disposal site per week.
    pub billable_tonnes: u64,
    /// Disposal fee per week.
    pub weekly_disposal_fee: f64,
    /// Fuel plus disposal per week.
    pub weekly_operational_cost: f64,
    /// Weekly operational cost over an average month.
    pub monthly_operational_cost: f64,
    /// Fixed crew wages per month.
    pub monthly_labor_cost: f64,
    /// Operational plus labor.
    pub monthly_subtotal: f64,
    /// Administrative overhead on the subtotal.
    pub admin_overhead: f64,
    /// Subtotal plus overhead.
    pub monthly_total_cost: f64,
}

/// One candidate collection frequency considered by the search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrequencyOption {
    /// Collections per week.
    pub frequency_per_week: u8,
    /// Waste picked up per collection in kg.
    pub waste_per_collection_kg: f64,
    /// Whether the per-collection load is within bounds.
    pub feasible: bool,
    /// Cheapest fleet's weekly operational cost, if feasible.
    pub weekly_operational_cost: Option<f64>,
    /// Cheapest fleet's truck capacity in tonnes, if feasible.
    pub truck_capacity_tonnes: Option<f64>,
    /// Cheapest fleet's truck count, if feasible.
    pub truck_count: Option<u32>,
}

/// Why the search could not return an unconstrained optimum.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FleetFallback {
    /// Every frequency put the per-collection load below the minimum.
    LoadBelowMinimum,
    /// Every frequency put the per-collection load above the maximum.
    LoadAboveMaximum,
    /// No truck class covered the load within the per-type truck limit.
    NoFeasibleFleet,
}

/// Recommended collection schedule and fleet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FleetRecommendation {
    /// Truck class label, e.g. `"10t"`.
    pub truck_type: String,
    /// Payload per truck in tonnes.
    pub truck_capacity_tonnes: f64,
    /// Trucks in the fleet.
    pub truck_count: u32,
    /// Collections per week.
    pub collection_frequency_per_week: u8,
    /// Waste per collection in kg.
    pub waste_per_collection_kg: f64,
    /// Waste per week in kg.
    pub weekly_waste_kg: f64,
    /// Capacity provided per week in kg.
    pub total_capacity_kg: f64,
    /// Capacity provided over waste generated, as a percentage.
    pub coverage_percent: f64,
    /// Fuel plus disposal per week.
    pub weekly_operational_cost: f64,
    /// All-in monthly cost.
    pub monthly_total_cost: f64,
    /// Weekly operational cost per tonne of waste.
    pub cost_per_tonne: f64,
    /// Itemized cost.
    pub cost_breakdown: CostBreakdown,
    /// Frequency the cost search preferred.
    pub min_cost_frequency_per_week: Option<u8>,
    /// Weekly operational cost at that frequency.
    pub min_cost_weekly_operational_cost: Option<f64>,
    /// Frequency the caller asked for.
    pub preferred_frequency_per_week: Option<u8>,
    /// Whether the caller's frequency was used.
    pub preferred_frequency_applied: bool,
    /// Every candidate frequency considered.
    pub frequency_options: Vec<FrequencyOption>,
    /// Set when the search had to relax its constraints.
    pub fallback: Option<FleetFallback>,
    /// Human-readable summary of the recommendation.
    pub justification: String,
}
