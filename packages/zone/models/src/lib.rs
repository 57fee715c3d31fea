#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Zone geometry, building inventory, and settlement types.
//!
//! These are the inputs every analysis consumes: the polygon a user drew,
//! the buildings detected inside it, and the settlement taxonomy used to
//! parameterize density, waste, and revenue rates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use thiserror::Error;

/// Average storey height used to derive floor counts from building height.
pub const METERS_PER_FLOOR: f64 = 3.5;

/// A WGS84 coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    /// Latitude in degrees.
    pub lat: f64,
    /// Longitude in degrees.
    pub lng: f64,
}

impl LatLng {
    #[must_use]
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }
}

/// A zone polygon with its derived measurements.
///
/// Built by `zone_resource_zone::geometry`, which rejects rings that
/// cannot produce a positive area. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneGeometry {
    /// Ordered exterior ring. The closing vertex is not repeated.
    pub ring: Vec<LatLng>,
    /// Interior rings cut out of the zone, in the same open form.
    #[serde(default)]
    pub holes: Vec<Vec<LatLng>>,
    /// Planar area in square meters.
    pub area_m2: f64,
    /// Perimeter in meters.
    pub perimeter_m: f64,
    /// Area-weighted centroid.
    pub centroid: LatLng,
}

impl ZoneGeometry {
    /// Area in square kilometers.
    #[must_use]
    pub fn area_km2(&self) -> f64 {
        self.area_m2 / 1_000_000.0
    }
}

/// Building use category.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
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
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum BuildingType {
    /// Dwellings
    Residential,
    /// Shops, offices, markets
    Commercial,
    /// Ground-floor commerce with dwellings above, or similar
    Mixed,
    /// Warehouses, workshops, factories
    Industrial,
    /// Not classified by the detector
    #[default]
    Unknown,
}

impl BuildingType {
    /// Returns all variants of this enum.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::Residential,
            Self::Commercial,
            Self::Mixed,
            Self::Industrial,
            Self::Unknown,
        ]
    }
}

/// Settlement category of a building or a whole zone.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
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
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum SettlementType {
    /// Planned, serviced neighbourhoods
    Formal,
    /// Unplanned, high-density compounds
    Informal,
    /// A blend of formal and informal building stock
    Mixed,
    /// Not yet classified
    #[default]
    Unknown,
}

impl SettlementType {
    /// Returns all variants of this enum.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[Self::Formal, Self::Informal, Self::Mixed, Self::Unknown]
    }

    /// Returns `self`, or `zone` if this settlement type is unknown.
    #[must_use]
    pub const fn or_zone(self, zone: Self) -> Self {
        match self {
            Self::Unknown => zone,
            other => other,
        }
    }
}

/// A single building footprint inside a zone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Building {
    /// Detector-assigned identifier.
    pub id: String,
    /// Footprint area in square meters.
    pub area_m2: f64,
    /// Height in meters, when the detector provides one.
    #[serde(default)]
    pub height_m: Option<f64>,
    /// Use category.
    #[serde(default)]
    pub building_type: BuildingType,
    /// Settlement category; unknown buildings inherit the zone's class.
    #[serde(default)]
    pub settlement_type: SettlementType,
}

impl Building {
    /// Floor count derived from height, never less than one.
    #[must_use]
    pub fn floors(&self) -> f64 {
        self.height_m
            .map_or(1.0, |height| (height / METERS_PER_FLOOR).max(1.0))
    }
}

/// Driving distance from a zone to its disposal site.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RouteEstimate {
    /// One-way road distance in kilometers.
    pub distance_km: f64,
    /// Time for a truck to drive there and back, in minutes.
    pub round_trip_minutes: f64,
    /// Where the figures came from.
    pub source: RouteSource,
}

impl RouteEstimate {
    /// Round-trip road distance in kilometers.
    #[must_use]
    pub fn round_trip_km(&self) -> f64 {
        self.distance_km * 2.0
    }
}

/// Origin of a [`RouteEstimate`].
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RouteSource {
    /// An external routing service answered.
    RoutingService,
    /// Straight-line distance inflated by a road-network factor.
    HaversineFallback,
}

/// Direction of a movement event crossing the zone boundary.
///
/// Upstream feeds encode this as either a numeric code or a free-form
/// string. The code is resolved once during deserialization so nothing
/// downstream ever inspects the raw value.
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
    AsRefStr,
)]
#[serde(rename_all = "snake_case", try_from = "RawEventCode")]
#[strum(serialize_all = "snake_case")]
pub enum EventKind {
    /// Someone entered the zone
    Entry,
    /// Someone left the zone
    Exit,
}

/// Event code as it appears on the wire.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawEventCode {
    /// Numeric code: `1` is an entry, `0` and `2` are exits.
    Numeric(i64),
    /// Text code such as `"entry"`, `"IN"`, `"exit"`, or `"out"`.
    Text(String),
}

/// Error returned when an event code maps to neither entry nor exit.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid event code '{code}': expected entry or exit")]
pub struct InvalidEventCodeError {
    /// The offending code, rendered as text.
    pub code: String,
}

impl TryFrom<RawEventCode> for EventKind {
    type Error = InvalidEventCodeError;

    fn try_from(raw: RawEventCode) -> Result<Self, Self::Error> {
        match raw {
            RawEventCode::Numeric(1) => Ok(Self::Entry),
            RawEventCode::Numeric(0 | 2) => Ok(Self::Exit),
            RawEventCode::Numeric(code) => Err(InvalidEventCodeError {
                code: code.to_string(),
            }),
            RawEventCode::Text(text) => match text.trim().to_ascii_lowercase().as_str() {
                "entry" | "enter" | "in" | "1" => Ok(Self::Entry),
                "exit" | "leave" | "out" | "0" | "2" => Ok(Self::Exit),
                _ => Err(InvalidEventCodeError { code: text }),
            },
        }
    }
}

/// A boundary crossing recorded by an external counter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneEvent {
    /// Crossing direction.
    #[serde(alias = "event_type")]
    pub kind: EventKind,
    /// When the crossing happened.
    pub timestamp: DateTime<Utc>,
}

/// Net number of people inside the zone according to `events`
/// (entries minus exits).
#[must_use]
pub fn net_presence(events: &[ZoneEvent]) -> i64 {
    events
        .iter()
        .map(|event| match event.kind {
            EventKind::Entry => 1,
            EventKind::Exit => -1,
        })
        .sum()
}
