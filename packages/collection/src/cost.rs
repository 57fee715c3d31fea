//! Weekly and monthly cost model.
//!
//! Disposal is billed per whole tonne, rounded up: the disposal site
//! bills 3.1 t as 4 t, and so does this model.

use zone_resource_calibration::LogisticsCalibration;
use zone_resource_collection_models::CostBreakdown;

/// Tonnes billed by the disposal site for `weekly_kg` of waste.
///
/// Always the next whole tonne up, never pro-rated.
#[must_use]
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
pub fn billable_tonnes(weekly_kg: f64) -> u64 {
    if !weekly_kg.is_finite() || weekly_kg <= 0.0 {
        return 0;
    }
    let whole = weekly_kg.div_euclid(1000.0);
    let billed = if weekly_kg.rem_euclid(1000.0) > 0.0 {
        whole + 1.0
    } else {
        whole
    };
    billed as u64
}

/// Fuel for `trips` round trips of `round_trip_km` each.
#[must_use]
pub fn weekly_fuel_cost(round_trip_km: f64, trips: u32, logistics: &LogisticsCalibration) -> f64 {
    round_trip_km / logistics.fuel_km_per_liter
        * logistics.fuel_price_per_liter
        * f64::from(trips)
}

/// Disposal fee for a week's waste.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn weekly_disposal_fee(weekly_kg: f64, logistics: &LogisticsCalibration) -> f64 {
    billable_tonnes(weekly_kg) as f64 * logistics.disposal_fee_per_tonne
}

/// Fuel plus disposal for one week, unrounded. Used to rank candidates.
#[must_use]
pub fn weekly_operational_cost(
    weekly_kg: f64,
    round_trip_km: f64,
    trips: u32,
    logistics: &LogisticsCalibration,
) -> f64 {
    weekly_fuel_cost(round_trip_km, trips, logistics) + weekly_disposal_fee(weekly_kg, logistics)
}

/// Full itemized cost for a schedule making `trips` round trips a week.
#[must_use]
pub fn breakdown(
    weekly_kg: f64,
    round_trip_km: f64,
    trips: u32,
    logistics: &LogisticsCalibration,
) -> CostBreakdown {
    let weekly_fuel_cost = weekly_fuel_cost(round_trip_km, trips, logistics);
    let weekly_disposal_fee = weekly_disposal_fee(weekly_kg, logistics);
    let weekly_operational_cost = weekly_fuel_cost + weekly_disposal_fee;

    let monthly_operational_cost = weekly_operational_cost * logistics.weeks_per_month;
    let monthly_labor_cost =
        f64::from(logistics.staff_count) * logistics.monthly_wage_per_staff;
    let monthly_subtotal = monthly_operational_cost + monthly_labor_cost;
    let admin_overhead = monthly_subtotal * logistics.admin_overhead_rate;

    CostBreakdown {
        trips_per_week: trips,
        round_trip_km,
        weekly_fuel_cost: round_currency(weekly_fuel_cost),
        billable_tonnes: billable_tonnes(weekly_kg),
        weekly_disposal_fee: round_currency(weekly_disposal_fee),
        weekly_operational_cost: round_currency(weekly_operational_cost),
        monthly_operational_cost: round_currency(monthly_operational_cost),
        monthly_labor_cost: round_currency(monthly_labor_cost),
        monthly_subtotal: round_currency(monthly_subtotal),
        admin_overhead: round_currency(admin_overhead),
        monthly_total_cost: round_currency(monthly_subtotal + admin_overhead),
    }
}

/// Rounds a monetary amount to two decimals.
#[must_use]
pub fn round_currency(amount: f64) -> f64 {
    (amount * 100.0).round() / 100.0
}
