//! Spatial primitives shared by the query layers.
//!
//! Every distance in this crate is a great-circle (Haversine) distance in
//! meters. Mixing planar and geodesic measures is disallowed, so there is a
//! single distance function rather than a pluggable metric.

use crate::error::{ProximoError, Result};
use geo::{Destination, Distance, Haversine, LineString, Point, Polygon, Rect, coord};

/// Number of segments used when approximating a circle as a polygon.
pub const CIRCLE_STEPS: usize = 64;

/// Great-circle distance between two points, in meters.
pub fn distance_between(a: &Point, b: &Point) -> f64 {
    Haversine.distance(*a, *b)
}

/// Build a circular polygon of `radius_m` meters around `center`.
///
/// Vertices are placed by great-circle destination so the ring holds its
/// metric size at any latitude.
pub fn circle_polygon(center: &Point, radius_m: f64, steps: usize) -> Polygon {
    let steps = steps.max(3);
    let mut coords = Vec::with_capacity(steps + 1);
    for i in 0..steps {
        let bearing = 360.0 * i as f64 / steps as f64;
        let vertex = Haversine.destination(*center, bearing, radius_m);
        coords.push(coord! { x: vertex.x(), y: vertex.y() });
    }
    coords.push(coords[0]);
    Polygon::new(LineString::from(coords), vec![])
}

/// Create a viewport bounding box from min/max coordinates.
pub fn bounding_box(min_lon: f64, min_lat: f64, max_lon: f64, max_lat: f64) -> Result<Rect> {
    if min_lon > max_lon {
        return Err(ProximoError::InvalidInput(format!(
            "min_lon ({min_lon}) must be <= max_lon ({max_lon})"
        )));
    }
    if min_lat > max_lat {
        return Err(ProximoError::InvalidInput(format!(
            "min_lat ({min_lat}) must be <= max_lat ({max_lat})"
        )));
    }

    Ok(Rect::new(
        coord! { x: min_lon, y: min_lat },
        coord! { x: max_lon, y: max_lat },
    ))
}

/// Grow a bounding box by `ratio` of its own size on each side.
///
/// A ratio of 1.0 triples the box's width and height, keeping hexagons
/// alive slightly outside the visible frame during pans.
pub fn pad_rect(rect: &Rect, ratio: f64) -> Rect {
    let dx = rect.width() * ratio;
    let dy = rect.height() * ratio;
    Rect::new(
        coord! { x: rect.min().x - dx, y: rect.min().y - dy },
        coord! { x: rect.max().x + dx, y: rect.max().y + dy },
    )
}

/// Render a distance for display: meters under a kilometer, kilometers
/// with one decimal above.
pub fn humanize_distance(meters: f64) -> String {
    if meters < 1000.0 {
        format!("{} m", meters.round() as i64)
    } else {
        format!("{:.1} km", meters / 1000.0)
    }
}
