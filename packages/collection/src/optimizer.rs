//! Frequency and fleet search.

use std::cmp::Ordering;

use zone_resource_calibration::{CalibrationTable, LogisticsCalibration};
use zone_resource_collection_models::{
    FleetFallback, FleetRecommendation, FrequencyOption, WasteProfile,
};

use crate::CollectionError;
use crate::cost::{self, round_currency};

/// Candidate collection frequencies per week.
pub const FREQUENCIES: std::ops::RangeInclusive<u8> = 1..=7;

/// Inputs to one optimization run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CollectionInputs {
    /// Residents served.
    pub population: f64,
    /// Kilograms per person per day. `None` uses the calibrated default.
    pub waste_rate_kg_per_person_day: Option<f64>,
    /// Round-trip distance from the zone to the disposal site in km.
    pub round_trip_km: f64,
    /// Collections per week requested by the caller.
    pub preferred_frequency: Option<u8>,
}

/// Cheapest single-type fleet for one frequency.
#[derive(Debug, Clone, Copy)]
struct Fleet {
    frequency: u8,
    capacity_tonnes: f64,
    truck_count: u32,
    weekly_cost: f64,
    cost_per_tonne: f64,
}

impl Fleet {
    fn total_capacity_kg(&self) -> f64 {
        f64::from(self.truck_count) * self.capacity_tonnes * 1000.0 * f64::from(self.frequency)
    }

    fn trips(&self) -> u32 {
        u32::from(self.frequency) * self.truck_count
    }
}

/// Collection optimizer bound to one calibration table.
#[derive(Debug, Clone)]
pub struct CollectionOptimizer<'a> {
    calibration: &'a CalibrationTable,
}

impl<'a> CollectionOptimizer<'a> {
    #[must_use]
    pub const fn new(calibration: &'a CalibrationTable) -> Self {
        Self { calibration }
    }

    /// Waste generated by `population` at `rate`, or the calibrated
    /// default rate.
    #[must_use]
    pub fn waste_profile(&self, population: f64, rate: Option<f64>) -> WasteProfile {
        WasteProfile::new(
            population,
            rate.unwrap_or(self.calibration.logistics.default_waste_kg_per_person_day),
        )
    }

    /// Finds the cheapest frequency and fleet that carry the zone's
    /// weekly waste.
    ///
    /// A feasible preferred frequency replaces the cheapest one; both
    /// costs are reported. When no frequency keeps the per-collection
    /// load within bounds, the nearest frequency is used anyway and
    /// [`FleetRecommendation::fallback`] says why.
    ///
    /// # Errors
    ///
    /// Returns [`CollectionError::InvalidInput`] for a negative or
    /// non-finite population, waste rate or distance, or when the
    /// calibration lists no truck classes.
    pub fn optimize(&self, inputs: CollectionInputs) -> Result<FleetRecommendation, CollectionError> {
        let logistics = &self.calibration.logistics;
        let profile = self.waste_profile(inputs.population, inputs.waste_rate_kg_per_person_day);

        check_non_negative("population", profile.population)?;
        check_non_negative("waste rate", profile.rate_kg_per_person_day)?;
        check_non_negative("round-trip distance", inputs.round_trip_km)?;
        if logistics.truck_capacities_tonnes.is_empty() {
            return Err(CollectionError::InvalidInput {
                field: "truck capacity count",
                value: 0.0,
            });
        }

        let weekly_kg = profile.weekly_kg;
        let preferred = inputs.preferred_frequency.filter(|f| {
            let valid = FREQUENCIES.contains(f);
            if !valid {
                log::warn!("Ignoring preferred frequency {f}; must be within 1..=7");
            }
            valid
        });

        let mut frequency_options = Vec::with_capacity(FREQUENCIES.len());
        let mut feasible_fleets = Vec::new();

        for frequency in FREQUENCIES {
            let waste_per_collection_kg = weekly_kg / f64::from(frequency);
            let within_bounds = (logistics.min_waste_per_collection_kg
                ..=logistics.max_waste_per_collection_kg)
                .contains(&waste_per_collection_kg);
            let fleet = if within_bounds {
                cheapest_fleet(frequency, weekly_kg, inputs.round_trip_km, logistics)
            } else {
                None
            };

            log::debug!(
                "Frequency {frequency}/week: {waste_per_collection_kg:.0} kg per collection, {}",
                fleet.map_or_else(
                    || "infeasible".to_string(),
                    |f| format!("{} x {}t at {:.2}/week", f.truck_count, f.capacity_tonnes, f.weekly_cost)
                )
            );

            frequency_options.push(FrequencyOption {
                frequency_per_week: frequency,
                waste_per_collection_kg,
                feasible: fleet.is_some(),
                weekly_operational_cost: fleet.map(|f| round_currency(f.weekly_cost)),
                truck_capacity_tonnes: fleet.map(|f| f.capacity_tonnes),
                truck_count: fleet.map(|f| f.truck_count),
            });
            if let Some(fleet) = fleet {
                feasible_fleets.push(fleet);
            }
        }

        let min_cost = feasible_fleets
            .iter()
            .copied()
            .min_by(|a, b| compare_cost(a.weekly_cost, b.weekly_cost).then(a.frequency.cmp(&b.frequency)));

        let (chosen, preferred_applied, fallback) = match min_cost {
            Some(min_cost) => {
                let preferred_fleet = preferred
                    .and_then(|p| feasible_fleets.iter().copied().find(|f| f.frequency == p));
                if let (Some(requested), None) = (preferred, preferred_fleet) {
                    log::warn!(
                        "Preferred frequency {requested} is infeasible for {weekly_kg:.0} kg/week; using {}",
                        min_cost.frequency
                    );
                }
                preferred_fleet.map_or((min_cost, false, None), |fleet| (fleet, true, None))
            }
            None => {
                let (fleet, reason) =
                    relaxed_fleet(weekly_kg, inputs.round_trip_km, preferred, logistics);
                log::warn!(
                    "No feasible collection schedule for {weekly_kg:.0} kg/week ({reason}); \
                     using {} x {}t at {}/week",
                    fleet.truck_count,
                    fleet.capacity_tonnes,
                    fleet.frequency
                );
                (fleet, false, Some(reason))
            }
        };

        Ok(self.recommendation(
            &chosen,
            weekly_kg,
            inputs.round_trip_km,
            min_cost,
            preferred,
            preferred_applied,
            frequency_options,
            fallback,
        ))
    }

    #[allow(clippy::too_many_arguments)]
    fn recommendation(
        &self,
        fleet: &Fleet,
        weekly_kg: f64,
        round_trip_km: f64,
        min_cost: Option<Fleet>,
        preferred: Option<u8>,
        preferred_frequency_applied: bool,
        frequency_options: Vec<FrequencyOption>,
        fallback: Option<FleetFallback>,
    ) -> FleetRecommendation {
        let logistics = &self.calibration.logistics;
        let cost_breakdown = cost::breakdown(weekly_kg, round_trip_km, fleet.trips(), logistics);
        let total_capacity_kg = fleet.total_capacity_kg();
        let coverage_percent = if weekly_kg > 0.0 {
            total_capacity_kg / weekly_kg * 100.0
        } else {
            100.0
        };
        let truck_type = format!("{}t", fleet.capacity_tonnes);

        let mut justification = format!(
            "{} x {truck_type} truck{} collecting {} time{} per week carry {total_capacity_kg:.0} kg \
             against {weekly_kg:.0} kg generated ({coverage_percent:.0}% coverage) for {} {:.2} per month",
            fleet.truck_count,
            if fleet.truck_count == 1 { "" } else { "s" },
            fleet.frequency,
            if fleet.frequency == 1 { "" } else { "s" },
            self.calibration.currency,
            cost_breakdown.monthly_total_cost,
        );
        if preferred_frequency_applied {
            if let Some(min_cost) = min_cost.filter(|m| m.frequency != fleet.frequency) {
                justification.push_str(&format!(
                    "; requested frequency used over the cheapest {}/week at {} {:.2} per week",
                    min_cost.frequency,
                    self.calibration.currency,
                    round_currency(min_cost.weekly_cost)
                ));
            }
        } else if let Some(requested) = preferred.filter(|p| *p != fleet.frequency) {
            justification.push_str(&format!(
                "; requested {requested}/week is outside the per-collection load bounds"
            ));
        }
        if let Some(reason) = fallback {
            justification.push_str(&format!("; constraints relaxed ({reason})"));
        }

        FleetRecommendation {
            truck_type,
            truck_capacity_tonnes: fleet.capacity_tonnes,
            truck_count: fleet.truck_count,
            collection_frequency_per_week: fleet.frequency,
            waste_per_collection_kg: weekly_kg / f64::from(fleet.frequency),
            weekly_waste_kg: weekly_kg,
            total_capacity_kg,
            coverage_percent,
            weekly_operational_cost: cost_breakdown.weekly_operational_cost,
            monthly_total_cost: cost_breakdown.monthly_total_cost,
            cost_per_tonne: round_currency(fleet.cost_per_tonne),
            cost_breakdown,
            min_cost_frequency_per_week: min_cost.map(|m| m.frequency),
            min_cost_weekly_operational_cost: min_cost.map(|m| round_currency(m.weekly_cost)),
            preferred_frequency_per_week: preferred,
            preferred_frequency_applied,
            frequency_options,
            fallback,
            justification,
        }
    }
}

/// Cheapest truck class for one frequency, within the per-type truck
/// limit. Ties on weekly cost go to the lower cost per tonne, then the
/// smaller truck.
fn cheapest_fleet(
    frequency: u8,
    weekly_kg: f64,
    round_trip_km: f64,
    logistics: &LogisticsCalibration,
) -> Option<Fleet> {
    let waste_per_collection_kg = weekly_kg / f64::from(frequency);

    sorted_capacities(logistics)
        .into_iter()
        .filter_map(|capacity_tonnes| {
            let truck_count = trucks_needed(waste_per_collection_kg, capacity_tonnes);
            (truck_count <= logistics.max_trucks_per_type)
                .then(|| build_fleet(frequency, capacity_tonnes, truck_count, weekly_kg, round_trip_km, logistics))
        })
        .min_by(|a, b| {
            compare_cost(a.weekly_cost, b.weekly_cost)
                .then(compare_cost(a.cost_per_tonne, b.cost_per_tonne))
                .then(compare_cost(a.capacity_tonnes, b.capacity_tonnes))
        })
}

/// Fleet for a load no frequency can carry within bounds.
///
/// Below the minimum the preferred frequency, or weekly, is used; above
/// the maximum, daily. If no truck class fits within the per-type limit
/// the largest class is scaled up in count.
fn relaxed_fleet(
    weekly_kg: f64,
    round_trip_km: f64,
    preferred: Option<u8>,
    logistics: &LogisticsCalibration,
) -> (Fleet, FleetFallback) {
    let below_minimum = weekly_kg < logistics.min_waste_per_collection_kg;
    let (frequency, reason) = if below_minimum {
        (preferred.unwrap_or(1), FleetFallback::LoadBelowMinimum)
    } else {
        (*FREQUENCIES.end(), FleetFallback::LoadAboveMaximum)
    };

    if let Some(fleet) = cheapest_fleet(frequency, weekly_kg, round_trip_km, logistics) {
        return (fleet, reason);
    }

    let largest = sorted_capacities(logistics)
        .last()
        .copied()
        .unwrap_or_default();
    let truck_count = trucks_needed(weekly_kg / f64::from(frequency), largest);
    (
        build_fleet(frequency, largest, truck_count, weekly_kg, round_trip_km, logistics),
        FleetFallback::NoFeasibleFleet,
    )
}

fn build_fleet(
    frequency: u8,
    capacity_tonnes: f64,
    truck_count: u32,
    weekly_kg: f64,
    round_trip_km: f64,
    logistics: &LogisticsCalibration,
) -> Fleet {
    let trips = u32::from(frequency) * truck_count;
    let weekly_cost = cost::weekly_operational_cost(weekly_kg, round_trip_km, trips, logistics);
    let weekly_tonnes = weekly_kg / 1000.0;
    Fleet {
        frequency,
        capacity_tonnes,
        truck_count,
        weekly_cost,
        cost_per_tonne: if weekly_tonnes > 0.0 {
            weekly_cost / weekly_tonnes
        } else {
            0.0
        },
    }
}

/// `max(1, ceil(load / capacity))`.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn trucks_needed(waste_per_collection_kg: f64, capacity_tonnes: f64) -> u32 {
    let needed = (waste_per_collection_kg / (capacity_tonnes * 1000.0)).ceil();
    if needed.is_finite() && needed >= 1.0 {
        needed as u32
    } else {
        1
    }
}

fn sorted_capacities(logistics: &LogisticsCalibration) -> Vec<f64> {
    let mut capacities: Vec<f64> = logistics
        .truck_capacities_tonnes
        .iter()
        .copied()
        .filter(|c| c.is_finite() && *c > 0.0)
        .collect();
    capacities.sort_by(f64::total_cmp);
    capacities
}

fn compare_cost(a: f64, b: f64) -> Ordering {
    a.total_cmp(&b)
}

fn check_non_negative(field: &'static str, value: f64) -> Result<(), CollectionError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(CollectionError::InvalidInput { field, value })
    }
}
