//! Rule-based settlement classification.

use std::collections::BTreeMap;

use zone_resource_population_models::{
    ClassificationBasis, SettlementCharacteristics, SettlementClassification, SettlementLabel,
};
use zone_resource_zone_models::{Building, SettlementType};

/// Mean height above which a zone is formal high density.
const HIGH_DENSITY_HEIGHT_M: f64 = 8.0;
/// Mean height above which a zone is formal medium density.
const MEDIUM_DENSITY_HEIGHT_M: f64 = 5.0;
/// Mean footprint below which untagged, height-less stock reads as informal.
const SMALL_FOOTPRINT_M2: f64 = 60.0;
/// Mean footprint above which untagged, height-less stock reads as formal.
const LARGE_FOOTPRINT_M2: f64 = 150.0;

const DEFAULT_CONFIDENCE: f64 = 0.5;
const MAX_CONFIDENCE: f64 = 0.9;
/// Buildings needed to add 1.0 to the confidence, before the cap.
const CONFIDENCE_SAMPLE_SCALE: f64 = 250.0;

/// Height statistics supplied by a detector that does not report
/// per-building heights.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeightStatistics {
    /// Mean building height in meters.
    pub mean_height_m: f64,
    /// Buildings the mean was computed over.
    pub sample_size: usize,
}

/// Classifies a zone from its building inventory.
///
/// Mean height decides when known: above 8 m is formal high density,
/// above 5 m formal medium density, anything lower informal. Without
/// heights the buildings' own settlement tags decide, then mean footprint
/// size. An empty inventory with no statistics is `mixed` at 0.5
/// confidence. Confidence grows with sample size up to 0.9.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn classify(
    buildings: &[Building],
    height_statistics: Option<HeightStatistics>,
) -> SettlementClassification {
    let heights: Vec<f64> = buildings
        .iter()
        .filter_map(|b| b.height_m)
        .filter(|h| h.is_finite() && *h > 0.0)
        .collect();

    let mean_area_m2 = mean(buildings.iter().map(|b| b.area_m2));

    let (mean_height_m, height_samples) = if heights.is_empty() {
        height_statistics
            .filter(|stats| stats.mean_height_m.is_finite() && stats.sample_size > 0)
            .map_or((None, 0), |stats| {
                (Some(stats.mean_height_m), stats.sample_size)
            })
    } else {
        (mean(heights.iter().copied()), heights.len())
    };

    let (label, basis, samples, confidence_scale) = if let Some(height) = mean_height_m {
        (by_height(height), ClassificationBasis::Height, height_samples, 1.0)
    } else if let Some((tagged, count)) = dominant_tag(buildings) {
        (tagged, ClassificationBasis::BuildingTags, count, 1.0)
    } else if let Some(area) = mean_area_m2 {
        (
            by_footprint(area),
            ClassificationBasis::FootprintSize,
            buildings.len(),
            0.8,
        )
    } else {
        (SettlementLabel::Mixed, ClassificationBasis::Default, 0, 1.0)
    };

    let confidence = if basis == ClassificationBasis::Default {
        DEFAULT_CONFIDENCE
    } else {
        (DEFAULT_CONFIDENCE + samples as f64 / CONFIDENCE_SAMPLE_SCALE).min(MAX_CONFIDENCE)
            * confidence_scale
    };

    log::debug!(
        "Classified zone as {label} from {basis} ({} buildings, confidence {confidence:.2})",
        buildings.len()
    );

    SettlementClassification {
        settlement_type: label.settlement_type(),
        label,
        confidence,
        characteristics: SettlementCharacteristics {
            building_count: buildings.len(),
            buildings_with_height: heights.len(),
            mean_height_m,
            mean_area_m2,
            basis,
        },
    }
}

fn by_height(mean_height_m: f64) -> SettlementLabel {
    if mean_height_m > HIGH_DENSITY_HEIGHT_M {
        SettlementLabel::FormalHighDensity
    } else if mean_height_m > MEDIUM_DENSITY_HEIGHT_M {
        SettlementLabel::FormalMediumDensity
    } else {
        SettlementLabel::InformalMediumDensity
    }
}

fn by_footprint(mean_area_m2: f64) -> SettlementLabel {
    if mean_area_m2 < SMALL_FOOTPRINT_M2 {
        SettlementLabel::InformalMediumDensity
    } else if mean_area_m2 > LARGE_FOOTPRINT_M2 {
        SettlementLabel::FormalMediumDensity
    } else {
        SettlementLabel::Mixed
    }
}

/// The settlement tag carried by a strict majority of tagged buildings,
/// with the number of tagged buildings.
fn dominant_tag(buildings: &[Building]) -> Option<(SettlementLabel, usize)> {
    let mut counts: BTreeMap<SettlementType, usize> = BTreeMap::new();
    for building in buildings {
        if building.settlement_type != SettlementType::Unknown {
            *counts.entry(building.settlement_type).or_default() += 1;
        }
    }

    let tagged: usize = counts.values().sum();
    let (settlement, count) = counts.into_iter().max_by_key(|(_, count)| *count)?;

    if count * 2 <= tagged {
        return Some((SettlementLabel::Mixed, tagged));
    }

    let label = match settlement {
        SettlementType::Formal => SettlementLabel::FormalMediumDensity,
        SettlementType::Informal => SettlementLabel::InformalMediumDensity,
        SettlementType::Mixed | SettlementType::Unknown => SettlementLabel::Mixed,
    };
    Some((label, tagged))
}

#[allow(clippy::cast_precision_loss)]
fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values
        .filter(|v| v.is_finite())
        .fold((0.0, 0_usize), |(sum, count), v| (sum + v, count + 1));
    (count > 0).then(|| sum / count as f64)
}
