//! Zone polygon parsing and measurement.
//!
//! Areas are computed on a local equirectangular projection centred on
//! the ring's first vertex. Zones are neighbourhood-sized, so the
//! distortion is well below the uncertainty of any population estimate.

use geo::{Area, Centroid, Coord, LineString, MultiPolygon, Polygon};
use geojson::GeoJson;
use zone_resource_zone_models::{LatLng, ZoneGeometry};

use crate::ZoneError;
use crate::distance::{EARTH_RADIUS_M, haversine_m};

/// Parses a `GeoJSON` document into a measured [`ZoneGeometry`].
///
/// Accepts a bare `Polygon`/`MultiPolygon` geometry, a `Feature`
/// wrapping one, or a `FeatureCollection` whose first polygonal feature
/// is used. A `MultiPolygon` is reduced to its largest member.
///
/// # Errors
///
/// Returns [`ZoneError`] if the document is not valid `GeoJSON` or holds
/// no polygon with a positive area.
pub fn parse_geojson(geojson_str: &str) -> Result<ZoneGeometry, ZoneError> {
    let geojson: GeoJson = geojson_str.parse()?;

    let geometry = match geojson {
        GeoJson::Geometry(geometry) => Some(geometry),
        GeoJson::Feature(feature) => feature.geometry,
        GeoJson::FeatureCollection(collection) => collection
            .features
            .into_iter()
            .filter_map(|feature| feature.geometry)
            .find(|geometry| {
                matches!(
                    geometry.value,
                    geojson::Value::Polygon(_) | geojson::Value::MultiPolygon(_)
                )
            }),
    }
    .ok_or_else(|| invalid("GeoJSON document contains no geometry"))?;

    let geo_geometry: geo::Geometry<f64> = geometry.try_into()?;

    match geo_geometry {
        geo::Geometry::Polygon(polygon) => from_polygon(&polygon),
        geo::Geometry::MultiPolygon(multi) => from_polygon(&largest_polygon(multi)?),
        other => Err(invalid(format!(
            "expected Polygon or MultiPolygon, found {}",
            geometry_name(&other)
        ))),
    }
}

/// Builds a [`ZoneGeometry`] from an ordered ring of coordinates.
///
/// The ring may or may not repeat its first vertex at the end.
///
/// # Errors
///
/// Returns [`ZoneError::InvalidGeometry`] for rings with fewer than three
/// distinct vertices, non-finite or out-of-range coordinates, or zero area.
pub fn from_ring(ring: &[LatLng]) -> Result<ZoneGeometry, ZoneError> {
    from_rings(ring, &[])
}

/// Builds a [`ZoneGeometry`] from an exterior ring and the interior rings
/// cut out of it. Measuring the result of [`parse_geojson`] again through
/// its `ring` and `holes` gives the same area.
///
/// # Errors
///
/// See [`from_ring`]. Holes are validated like the exterior ring.
pub fn from_rings(ring: &[LatLng], holes: &[Vec<LatLng>]) -> Result<ZoneGeometry, ZoneError> {
    from_polygon(&Polygon::new(
        line_string(ring),
        holes.iter().map(|hole| line_string(hole)).collect(),
    ))
}

fn line_string(ring: &[LatLng]) -> LineString<f64> {
    ring.iter()
        .map(|point| Coord {
            x: point.lng,
            y: point.lat,
        })
        .collect::<Vec<_>>()
        .into()
}

/// Measures a `geo` polygon whose coordinates are `(lng, lat)` degrees.
///
/// Interior rings are subtracted from the area but not from the perimeter.
///
/// # Errors
///
/// Returns [`ZoneError::InvalidGeometry`] if the polygon cannot describe a zone.
pub fn from_polygon(polygon: &Polygon<f64>) -> Result<ZoneGeometry, ZoneError> {
    let ring = open_ring(polygon.exterior())?;

    let holes = polygon
        .interiors()
        .iter()
        .map(open_ring)
        .collect::<Result<Vec<_>, _>>()?;

    for point in ring.iter().chain(holes.iter().flatten()) {
        validate_coordinate(*point)?;
    }

    let origin = ring[0];
    let projected = Polygon::new(
        project(polygon.exterior(), origin),
        polygon
            .interiors()
            .iter()
            .map(|interior| project(interior, origin))
            .collect(),
    );

    let area_m2 = projected.unsigned_area();
    if !area_m2.is_finite() || area_m2 <= 0.0 {
        return Err(invalid("polygon has zero area"));
    }

    let perimeter_m = ring
        .iter()
        .zip(ring.iter().cycle().skip(1))
        .map(|(a, b)| haversine_m(*a, *b))
        .sum();

    let centroid = polygon
        .centroid()
        .map_or(origin, |point| LatLng::new(point.y(), point.x()));

    log::debug!(
        "Measured zone: {} vertices, {} holes, {area_m2:.1} m², {perimeter_m:.1} m perimeter",
        ring.len(),
        holes.len()
    );

    Ok(ZoneGeometry {
        ring,
        holes,
        area_m2,
        perimeter_m,
        centroid,
    })
}

/// Returns the ring's vertices without the closing duplicate, rejecting
/// rings that collapse to fewer than three distinct points.
fn open_ring(line: &LineString<f64>) -> Result<Vec<LatLng>, ZoneError> {
    let mut ring: Vec<LatLng> = line
        .coords()
        .map(|coord| LatLng::new(coord.y, coord.x))
        .collect();

    if ring.len() > 1 && ring.first() == ring.last() {
        ring.pop();
    }

    ring.dedup();

    let mut distinct = ring.clone();
    distinct.sort_by(|a, b| a.lat.total_cmp(&b.lat).then(a.lng.total_cmp(&b.lng)));
    distinct.dedup();

    if distinct.len() < 3 {
        return Err(invalid(format!(
            "polygon needs at least 3 distinct vertices, found {}",
            distinct.len()
        )));
    }

    Ok(ring)
}

fn validate_coordinate(point: LatLng) -> Result<(), ZoneError> {
    if !point.lat.is_finite() || !point.lng.is_finite() {
        return Err(invalid("coordinate is not a finite number"));
    }
    if !(-90.0..=90.0).contains(&point.lat) || !(-180.0..=180.0).contains(&point.lng) {
        return Err(invalid(format!(
            "coordinate ({}, {}) is out of range",
            point.lat, point.lng
        )));
    }
    Ok(())
}

/// Projects a `(lng, lat)` ring to meters around `origin`.
fn project(line: &LineString<f64>, origin: LatLng) -> LineString<f64> {
    let meters_per_degree = EARTH_RADIUS_M.to_radians();
    let lng_scale = origin.lat.to_radians().cos() * meters_per_degree;

    line.coords()
        .map(|coord| Coord {
            x: (coord.x - origin.lng) * lng_scale,
            y: (coord.y - origin.lat) * meters_per_degree,
        })
        .collect::<Vec<_>>()
        .into()
}

fn largest_polygon(multi: MultiPolygon<f64>) -> Result<Polygon<f64>, ZoneError> {
    let count = multi.0.len();
    let largest = multi
        .0
        .into_iter()
        .max_by(|a, b| a.unsigned_area().total_cmp(&b.unsigned_area()))
        .ok_or_else(|| invalid("MultiPolygon has no members"))?;

    if count > 1 {
        log::warn!("MultiPolygon zone has {count} parts; measuring the largest only");
    }

    Ok(largest)
}

const fn geometry_name(geometry: &geo::Geometry<f64>) -> &'static str {
    match geometry {
        geo::Geometry::Point(_) => "Point",
        geo::Geometry::Line(_) => "Line",
        geo::Geometry::LineString(_) => "LineString",
        geo::Geometry::Polygon(_) => "Polygon",
        geo::Geometry::MultiPoint(_) => "MultiPoint",
        geo::Geometry::MultiLineString(_) => "MultiLineString",
        geo::Geometry::MultiPolygon(_) => "MultiPolygon",
        geo::Geometry::GeometryCollection(_) => "GeometryCollection",
        geo::Geometry::Rect(_) => "Rect",
        geo::Geometry::Triangle(_) => "Triangle",
    }
}

fn invalid(message: impl Into<String>) -> ZoneError {
    ZoneError::InvalidGeometry {
        message: message.into(),
    }
}
