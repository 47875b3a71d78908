//! Point-in-polygon service-area and jurisdiction resolution.
//!
//! The service-area dataset is a GeoJSON collection of polygons in which
//! exactly one feature carries the reserved combined-boundary name and the
//! rest carry jurisdiction names. It is loaded once and read-only after.

use crate::error::{ProximoError, Result};
use crate::spatial::distance_between;
use crate::types::FeatureCollection;
use geo::{Closest, ClosestPoint, Geometry, Intersects, MultiPolygon, Point, Polygon};

/// A named sub-region of the service area.
#[derive(Debug, Clone)]
pub struct Jurisdiction {
    name: String,
    boundary: MultiPolygon,
}

impl Jurisdiction {
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// The combined service boundary plus its named jurisdictions, in dataset
/// order.
#[derive(Debug, Clone)]
pub struct ServiceArea {
    combined: MultiPolygon,
    jurisdictions: Vec<Jurisdiction>,
}

impl ServiceArea {
    /// Split a boundary dataset into the combined polygon and named
    /// jurisdictions.
    ///
    /// `name_property` holds the boundary names; the feature whose name
    /// equals `combined_name` becomes the outer boundary. Its absence is a
    /// configuration error ([`ProximoError::ReservedFeatureMissing`]) and
    /// is never retried.
    pub fn from_feature_collection(
        collection: &FeatureCollection,
        name_property: &str,
        combined_name: &str,
    ) -> Result<Self> {
        let mut combined = None;
        let mut jurisdictions = Vec::new();

        for feature in collection.iter() {
            let Some(name) = feature.property_str(name_property) else {
                log::warn!(
                    "service-area feature {:?} lacks a {name_property:?} property, skipping",
                    feature.id
                );
                continue;
            };

            let boundary = polygonal_boundary(feature.id.as_deref(), feature.geometry.as_ref())?;
            if name == combined_name {
                combined = Some(boundary);
            } else {
                jurisdictions.push(Jurisdiction {
                    name: name.to_string(),
                    boundary,
                });
            }
        }

        let combined = combined.ok_or_else(|| {
            ProximoError::ReservedFeatureMissing(format!(
                "no service-area feature with {name_property} = {combined_name:?}"
            ))
        })?;

        Ok(Self {
            combined,
            jurisdictions,
        })
    }

    /// Whether `point` lies within the combined service boundary,
    /// boundary-inclusive.
    pub fn contains(&self, point: &Point) -> bool {
        self.combined.intersects(point)
    }

    /// The jurisdiction containing `point` (first match in dataset order),
    /// or failing containment, the jurisdiction whose boundary edge is
    /// nearest in meters.
    pub fn jurisdiction_of(&self, point: &Point) -> Result<&str> {
        for jurisdiction in &self.jurisdictions {
            if jurisdiction.boundary.intersects(point) {
                return Ok(&jurisdiction.name);
            }
        }

        let mut best: Option<(&str, f64)> = None;
        for jurisdiction in &self.jurisdictions {
            let dist = edge_distance(&jurisdiction.boundary, point)?;
            if best.is_none_or(|(_, best_dist)| dist < best_dist) {
                best = Some((&jurisdiction.name, dist));
            }
        }

        best.map(|(name, _)| name).ok_or_else(|| {
            ProximoError::ReservedFeatureMissing(
                "service-area dataset has no named jurisdictions".to_string(),
            )
        })
    }

    pub fn jurisdictions(&self) -> &[Jurisdiction] {
        &self.jurisdictions
    }
}

fn polygonal_boundary(id: Option<&str>, geometry: Option<&Geometry>) -> Result<MultiPolygon> {
    match geometry {
        Some(Geometry::Polygon(polygon)) => Ok(MultiPolygon::new(vec![polygon.clone()])),
        Some(Geometry::MultiPolygon(multi)) => Ok(multi.clone()),
        Some(_) => Err(ProximoError::MalformedGeometry(format!(
            "service-area feature {id:?} must be a polygon or multipolygon"
        ))),
        None => Err(ProximoError::MalformedGeometry(format!(
            "service-area feature {id:?} has no geometry"
        ))),
    }
}

/// Distance in meters from `point` to the nearest exterior edge of the
/// boundary. The closest edge point is found in coordinate space and the
/// distance to it measured great-circle.
fn edge_distance(boundary: &MultiPolygon, point: &Point) -> Result<f64> {
    let mut best = f64::INFINITY;
    for polygon in &boundary.0 {
        best = best.min(ring_distance(polygon, point));
    }
    if best.is_finite() {
        Ok(best)
    } else {
        Err(ProximoError::MalformedGeometry(
            "jurisdiction boundary has no edges".to_string(),
        ))
    }
}

fn ring_distance(polygon: &Polygon, point: &Point) -> f64 {
    match polygon.exterior().closest_point(point) {
        Closest::Intersection(p) | Closest::SinglePoint(p) => distance_between(point, &p),
        Closest::Indeterminate => f64::INFINITY,
    }
}
