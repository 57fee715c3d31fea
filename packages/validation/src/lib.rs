#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Plausibility checks for a finished zone analysis.
//!
//! Each check compares one derived ratio against a fixed range. Checks
//! whose inputs are missing are skipped, and the quality score is the
//! weighted mean of the checks that ran. A value inside its range scores
//! 1.0; outside, the score falls with the ratio between the value and the
//! nearest bound, so being twice the maximum scores 0.5.

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// People per km² considered plausible.
pub const DENSITY_RANGE_PER_KM2: (f64, f64) = (100.0, 50_000.0);
/// Kilograms of waste per person per day considered plausible.
pub const WASTE_PER_CAPITA_RANGE_KG: (f64, f64) = (0.1, 2.0);
/// Mean building footprint in m² considered plausible.
pub const BUILDING_SIZE_RANGE_M2: (f64, f64) = (20.0, 10_000.0);
/// People per building considered typical.
pub const PEOPLE_PER_BUILDING_RANGE: (f64, f64) = (2.0, 50.0);
/// People per household considered typical.
pub const PEOPLE_PER_HOUSEHOLD_RANGE: (f64, f64) = (3.0, 8.0);

/// Which plausibility rule a check applies.
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
pub enum CheckKind {
    PopulationDensity,
    WastePerCapita,
    BuildingSize,
    PeoplePerBuilding,
    PeoplePerHousehold,
    /// Observed net presence from movement events against the estimate.
    MovementPresence,
}

impl CheckKind {
    /// Contribution of this check to the weighted score.
    #[must_use]
    pub const fn weight(self) -> f64 {
        match self {
            Self::PopulationDensity => 0.25,
            Self::WastePerCapita | Self::PeoplePerBuilding | Self::PeoplePerHousehold => 0.2,
            Self::BuildingSize => 0.15,
            Self::MovementPresence => 0.1,
        }
    }
}

/// Qualitative reading of the quality score.
#[derive(
    Debug,
    Clone,
    Copy,
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
pub enum QualityLabel {
    Excellent,
    Good,
    Fair,
    Poor,
    VeryPoor,
}

impl QualityLabel {
    /// Label for a score in `[0, 1]`.
    #[must_use]
    pub fn from_score(score: f64) -> Self {
        if score >= 0.9 {
            Self::Excellent
        } else if score >= 0.75 {
            Self::Good
        } else if score >= 0.6 {
            Self::Fair
        } else if score >= 0.4 {
            Self::Poor
        } else {
            Self::VeryPoor
        }
    }
}

/// Outcome of a single check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckResult {
    pub kind: CheckKind,
    /// The ratio that was checked.
    pub value: f64,
    /// Lower bound of the plausible range, if the check has one.
    pub min: Option<f64>,
    /// Upper bound of the plausible range.
    pub max: f64,
    pub passed: bool,
    /// `1.0` when passed, otherwise in `[0, 1)`.
    pub score: f64,
}

/// Scored set of checks with a warning for each failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    /// Weighted mean of the check scores, or `1.0` if nothing was checked.
    pub score: f64,
    pub label: QualityLabel,
    pub checks: Vec<CheckResult>,
    pub warnings: Vec<String>,
}

impl ValidationReport {
    /// Checks that fell outside their range.
    pub fn failures(&self) -> impl Iterator<Item = &CheckResult> {
        self.checks.iter().filter(|c| !c.passed)
    }
}

/// Derived metrics to cross-check. Every field is optional; missing ones
/// skip the checks that need them.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ValidationInputs {
    pub population: Option<f64>,
    pub zone_area_km2: Option<f64>,
    pub building_count: Option<usize>,
    pub mean_building_area_m2: Option<f64>,
    pub household_count: Option<f64>,
    pub waste_kg_per_day: Option<f64>,
    /// Entries minus exits from the zone's movement events.
    pub net_presence: Option<i64>,
}

/// Stateless plausibility checker.
#[derive(Debug, Clone, Copy, Default)]
pub struct ValidationEngine;

impl ValidationEngine {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Runs every check whose inputs are present.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn validate(&self, inputs: &ValidationInputs) -> ValidationReport {
        let population = inputs.population.filter(|p| p.is_finite());
        let mut checks = Vec::new();

        if let (Some(population), Some(area)) = (population, positive(inputs.zone_area_km2)) {
            checks.push(range_check(
                CheckKind::PopulationDensity,
                population / area,
                DENSITY_RANGE_PER_KM2,
            ));
        }

        if let (Some(waste), Some(population)) = (
            inputs.waste_kg_per_day.filter(|w| w.is_finite()),
            positive(population),
        ) {
            checks.push(range_check(
                CheckKind::WastePerCapita,
                waste / population,
                WASTE_PER_CAPITA_RANGE_KG,
            ));
        }

        if let Some(area) = inputs.mean_building_area_m2.filter(|a| a.is_finite()) {
            checks.push(range_check(
                CheckKind::BuildingSize,
                area,
                BUILDING_SIZE_RANGE_M2,
            ));
        }

        if let (Some(population), Some(count)) =
            (population, inputs.building_count.filter(|c| *c > 0))
        {
            checks.push(range_check(
                CheckKind::PeoplePerBuilding,
                population / count as f64,
                PEOPLE_PER_BUILDING_RANGE,
            ));
        }

        if let (Some(population), Some(households)) =
            (population, positive(inputs.household_count))
        {
            checks.push(range_check(
                CheckKind::PeoplePerHousehold,
                population / households,
                PEOPLE_PER_HOUSEHOLD_RANGE,
            ));
        }

        if let (Some(population), Some(present)) = (population, inputs.net_presence) {
            checks.push(presence_check(population, present as f64));
        }

        let weight_total: f64 = checks.iter().map(|c| c.kind.weight()).sum();
        let score = if weight_total > 0.0 {
            checks.iter().map(|c| c.score * c.kind.weight()).sum::<f64>() / weight_total
        } else {
            1.0
        };

        let warnings: Vec<String> = checks.iter().filter(|c| !c.passed).map(warning).collect();
        for warning in &warnings {
            log::warn!("Validation: {warning}");
        }

        let label = QualityLabel::from_score(score);
        log::debug!(
            "Validation score {score:.2} ({label}) over {} checks",
            checks.len()
        );

        ValidationReport {
            score,
            label,
            checks,
            warnings,
        }
    }
}

fn range_check(kind: CheckKind, value: f64, (min, max): (f64, f64)) -> CheckResult {
    let (passed, score) = if value < min {
        (false, (value / min).clamp(0.0, 1.0))
    } else if value > max {
        (false, (max / value).clamp(0.0, 1.0))
    } else {
        (true, 1.0)
    };

    CheckResult {
        kind,
        value,
        min: Some(min),
        max,
        passed,
        score,
    }
}

/// Net presence may be negative when people already inside leave, so only
/// the upper bound applies.
fn presence_check(population: f64, present: f64) -> CheckResult {
    let passed = present <= population;
    let score = if passed {
        1.0
    } else if present > 0.0 {
        (population / present).clamp(0.0, 1.0)
    } else {
        0.0
    };

    CheckResult {
        kind: CheckKind::MovementPresence,
        value: present,
        min: None,
        max: population,
        passed,
        score,
    }
}

fn warning(check: &CheckResult) -> String {
    let min = check.min.unwrap_or_default();
    match check.kind {
        CheckKind::PopulationDensity => format!(
            "population density {:.0}/km² is outside the plausible {:.0}-{:.0}/km²",
            check.value, min, check.max
        ),
        CheckKind::WastePerCapita => format!(
            "waste generation {:.2} kg/person/day is outside the plausible {}-{} kg",
            check.value, min, check.max
        ),
        CheckKind::BuildingSize => format!(
            "mean building size {:.0} m² is outside the plausible {:.0}-{:.0} m²",
            check.value, min, check.max
        ),
        CheckKind::PeoplePerBuilding => format!(
            "{:.1} people per building is outside the typical {:.0}-{:.0}",
            check.value, min, check.max
        ),
        CheckKind::PeoplePerHousehold => format!(
            "{:.1} people per household is outside the typical {:.0}-{:.0}",
            check.value, min, check.max
        ),
        CheckKind::MovementPresence => format!(
            "observed net presence of {:.0} exceeds the estimated population of {:.0}",
            check.value, check.max
        ),
    }
}

fn positive(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite() && *v > 0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reference_zone() -> ValidationInputs {
        ValidationInputs {
            population: Some(1400.0),
            zone_area_km2: Some(1.0),
            building_count: Some(200),
            mean_building_area_m2: Some(100.0),
            household_count: Some(1400.0 / 4.5),
            waste_kg_per_day: Some(700.0),
            net_presence: None,
        }
    }

    #[test]
    fn plausible_zone_is_excellent() {
        let report = ValidationEngine::new().validate(&reference_zone());
        assert_eq!(report.checks.len(), 5);
        assert!(report.warnings.is_empty(), "{:?}", report.warnings);
        assert!((report.score - 1.0).abs() < f64::EPSILON);
        assert_eq!(report.label, QualityLabel::Excellent);
    }

    #[test]
    fn no_inputs_scores_perfect_with_no_checks() {
        let report = ValidationEngine::new().validate(&ValidationInputs::default());
        assert!(report.checks.is_empty());
        assert!((report.score - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn failures_lower_score_and_warn() {
        let inputs = ValidationInputs {
            // 4 kg/person/day is twice the maximum.
            waste_kg_per_day: Some(5600.0),
            ..reference_zone()
        };
        let report = ValidationEngine::new().validate(&inputs);

        let failed: Vec<_> = report.failures().collect();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].kind, CheckKind::WastePerCapita);
        assert!((failed[0].score - 0.5).abs() < 1e-12);
        assert_eq!(report.warnings.len(), 1);
        assert!(report.warnings[0].contains("waste generation"));

        // (0.25 + 0.2 * 0.5 + 0.15 + 0.2 + 0.2) / 1.0
        assert!((report.score - 0.9).abs() < 1e-12, "score {}", report.score);
    }

    #[test]
    fn only_present_checks_are_weighted() {
        let inputs = ValidationInputs {
            population: Some(10.0),
            zone_area_km2: Some(1.0),
            ..ValidationInputs::default()
        };
        let report = ValidationEngine::new().validate(&inputs);
        assert_eq!(report.checks.len(), 1);
        // Density of 10/km² against a minimum of 100 scores 0.1.
        assert!((report.score - 0.1).abs() < 1e-12);
        assert_eq!(report.label, QualityLabel::VeryPoor);
    }

    #[test]
    fn movement_presence_checks_upper_bound_only() {
        let engine = ValidationEngine::new();

        let leaving = engine.validate(&ValidationInputs {
            net_presence: Some(-40),
            ..reference_zone()
        });
        assert!(leaving.warnings.is_empty());
        assert_eq!(leaving.checks.len(), 6);

        let crowded = engine.validate(&ValidationInputs {
            net_presence: Some(2800),
            ..reference_zone()
        });
        let failed: Vec<_> = crowded.failures().collect();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].kind, CheckKind::MovementPresence);
        assert!((failed[0].score - 0.5).abs() < 1e-12);
    }

    #[test]
    fn label_thresholds() {
        assert_eq!(QualityLabel::from_score(0.95), QualityLabel::Excellent);
        assert_eq!(QualityLabel::from_score(0.9), QualityLabel::Excellent);
        assert_eq!(QualityLabel::from_score(0.8), QualityLabel::Good);
        assert_eq!(QualityLabel::from_score(0.6), QualityLabel::Fair);
        assert_eq!(QualityLabel::from_score(0.45), QualityLabel::Poor);
        assert_eq!(QualityLabel::from_score(0.1), QualityLabel::VeryPoor);
        assert_eq!(QualityLabel::VeryPoor.to_string(), "very_poor");
    }

    #[test]
    fn report_serializes_labels_in_snake_case() {
        let report = ValidationEngine::new().validate(&reference_zone());
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["label"], "excellent");
        assert_eq!(json["checks"][0]["kind"], "population_density");
    }
}
