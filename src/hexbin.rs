//! Zoom-adaptive hexagonal binning of point features.
//!
//! The viewport is padded, tiled with flat-top hexagons sized inversely to
//! zoom, and each point is assigned to exactly one cell by axial-coordinate
//! rounding. Cells are ephemeral: every rebin pass recomputes them from
//! scratch, and callers are expected to trigger rebins on zoom changes (not
//! pans) and to debounce repeated invocations themselves.

use crate::error::{ProximoError, Result};
use crate::spatial::{distance_between, pad_rect};
use crate::types::{Feature, FeatureCollection, Properties};
use geo::{Geometry, LineString, Point, Polygon, Rect, coord};
use rustc_hash::FxHashMap;
use serde_json::Value;

/// Ratio of the viewport size added on each side before tiling, so cells
/// exist slightly outside the visible frame and pans don't clip edges.
pub const VIEWPORT_PAD_RATIO: f64 = 1.0;

const SQRT_3: f64 = 1.732_050_807_568_877_2;

/// Hexagon circumradius in meters for a zoom level: `2^(21 - zoom)`.
///
/// Zoom 21 yields 1 m cells, zoom 11 yields 1024 m cells. The exponential
/// falloff is load-bearing; bins shrink as the user zooms in.
pub fn hex_radius_for_zoom(zoom: f64) -> f64 {
    (21.0 - zoom).exp2()
}

/// One aggregated hexagon.
#[derive(Debug, Clone)]
pub struct HexCell {
    pub polygon: Polygon,
    pub radius_m: f64,
    /// Number of contained points.
    pub count: usize,
    /// Identifiers of the contained points that have one.
    pub ids: Vec<String>,
    /// Min-max normalized count within this rebin pass, in `[0, 1]`.
    pub scale: f64,
}

impl HexCell {
    /// Emit the cell for the render layer, with the `radius`, `count`,
    /// `scale`, and `suggestions` properties the layer styles against.
    pub fn to_feature(&self) -> Feature {
        let mut properties = Properties::new();
        properties.insert("radius".to_string(), self.radius_m.into());
        properties.insert("count".to_string(), self.count.into());
        properties.insert("scale".to_string(), self.scale.into());
        properties.insert(
            "suggestions".to_string(),
            Value::Array(self.ids.iter().cloned().map(Value::from).collect()),
        );
        Feature::new(None, Some(Geometry::Polygon(self.polygon.clone())), properties)
    }
}

/// Bin `collection`'s points into hexagons over the padded viewport.
///
/// Cells with no contained points are dropped. Each retained cell's
/// `scale` is `(count − minCount) / (maxCount − minCount)` across the
/// pass; when every retained cell has the same count, `scale` is defined
/// as 1.0 for all of them (the min-max span would otherwise be zero).
pub fn rebin(viewport: Rect, zoom: f64, collection: &FeatureCollection) -> Result<Vec<HexCell>> {
    if !zoom.is_finite() {
        return Err(ProximoError::InvalidInput(format!(
            "zoom level must be finite, got {zoom}"
        )));
    }

    let radius_m = hex_radius_for_zoom(zoom);
    let bounds = pad_rect(&viewport, VIEWPORT_PAD_RATIO);
    let grid = HexGrid::new(&bounds, radius_m)?;

    // Point-driven binning: only cells that contain a point are ever
    // materialized, so the pass is linear in the point count regardless of
    // how fine the grid is.
    let mut bins: FxHashMap<(i64, i64), (usize, Vec<String>)> = FxHashMap::default();
    for feature in collection.iter() {
        let Some(geometry) = &feature.geometry else {
            continue;
        };
        let Geometry::Point(point) = geometry else {
            return Err(ProximoError::MalformedGeometry(format!(
                "hex binning expects point features, feature {:?} is not one",
                feature.id
            )));
        };
        let Some(cell) = grid.cell_for(point) else {
            continue;
        };
        let entry = bins.entry(cell).or_default();
        entry.0 += 1;
        if let Some(id) = &feature.id {
            entry.1.push(id.clone());
        }
    }

    if bins.is_empty() {
        return Ok(Vec::new());
    }

    let min_count = bins.values().map(|(count, _)| *count).min().unwrap_or(0);
    let max_count = bins.values().map(|(count, _)| *count).max().unwrap_or(0);
    let span = (max_count - min_count) as f64;

    let mut binned: Vec<_> = bins.into_iter().collect();
    binned.sort_by_key(|(cell, _)| *cell);

    let cells = binned
        .into_iter()
        .map(|((q, r), (count, ids))| {
            let scale = if max_count == min_count {
                1.0
            } else {
                (count - min_count) as f64 / span
            };
            HexCell {
                polygon: grid.polygon(q, r),
                radius_m,
                count,
                ids,
                scale,
            }
        })
        .collect();
    Ok(cells)
}

/// A flat-top hexagonal tiling of a lon/lat bounding box.
///
/// The metric circumradius is converted to independent degree spans along
/// each axis (via great-circle distances across the box), so cells keep
/// their metric size at the box's latitude while the math stays planar.
struct HexGrid {
    bounds: Rect,
    /// Circumradius in degrees of longitude.
    rx: f64,
    /// Circumradius in degrees of latitude.
    ry: f64,
}

impl HexGrid {
    fn new(bounds: &Rect, radius_m: f64) -> Result<Self> {
        if !radius_m.is_finite() || radius_m <= 0.0 {
            return Err(ProximoError::InvalidInput(format!(
                "hex radius must be positive and finite, got {radius_m}"
            )));
        }

        let mid_y = (bounds.min().y + bounds.max().y) / 2.0;
        let width_m = distance_between(
            &Point::new(bounds.min().x, mid_y),
            &Point::new(bounds.max().x, mid_y),
        );
        let height_m = distance_between(
            &Point::new(bounds.min().x, bounds.min().y),
            &Point::new(bounds.min().x, bounds.max().y),
        );
        if width_m <= 0.0 || height_m <= 0.0 {
            return Err(ProximoError::InvalidInput(
                "viewport has no extent to tile".to_string(),
            ));
        }

        Ok(Self {
            bounds: *bounds,
            rx: radius_m / width_m * bounds.width(),
            ry: radius_m / height_m * bounds.height(),
        })
    }

    /// Axial coordinates of the cell containing `point`, or `None` when
    /// the point lies outside the padded bounds.
    ///
    /// Rounding assigns boundary points deterministically to a single
    /// cell, which is what makes containment boundary-inclusive without
    /// double counting.
    fn cell_for(&self, point: &Point) -> Option<(i64, i64)> {
        let (min, max) = (self.bounds.min(), self.bounds.max());
        if point.x() < min.x || point.x() > max.x || point.y() < min.y || point.y() > max.y {
            return None;
        }

        let u = (point.x() - min.x) / self.rx;
        let v = (point.y() - min.y) / self.ry;
        let q = 2.0 / 3.0 * u;
        let r = -1.0 / 3.0 * u + SQRT_3 / 3.0 * v;
        Some(axial_round(q, r))
    }

    fn center(&self, q: i64, r: i64) -> (f64, f64) {
        let x = self.bounds.min().x + self.rx * 1.5 * q as f64;
        let y = self.bounds.min().y + self.ry * SQRT_3 * (r as f64 + q as f64 / 2.0);
        (x, y)
    }

    fn polygon(&self, q: i64, r: i64) -> Polygon {
        let (cx, cy) = self.center(q, r);
        let mut coords = Vec::with_capacity(7);
        for i in 0..6 {
            let angle = (60.0 * i as f64).to_radians();
            coords.push(coord! {
                x: cx + self.rx * angle.cos(),
                y: cy + self.ry * angle.sin(),
            });
        }
        coords.push(coords[0]);
        Polygon::new(LineString::from(coords), vec![])
    }
}

/// Round fractional axial coordinates to the containing hexagon (cube
/// rounding).
fn axial_round(q: f64, r: f64) -> (i64, i64) {
    let s = -q - r;
    let mut rq = q.round();
    let mut rr = r.round();
    let rs = s.round();

    let dq = (rq - q).abs();
    let dr = (rr - r).abs();
    let ds = (rs - s).abs();

    if dq > dr && dq > ds {
        rq = -rr - rs;
    } else if dr > ds {
        rr = -rq - rs;
    }

    (rq as i64, rr as i64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spatial::bounding_box;
    use geo::polygon;

    fn viewport() -> Rect {
        bounding_box(-71.12, 42.34, -71.04, 42.38).unwrap()
    }

    #[test]
    fn radius_follows_the_zoom_exponential_exactly() {
        assert_eq!(hex_radius_for_zoom(21.0), 1.0);
        assert_eq!(hex_radius_for_zoom(11.0), 1024.0);
        assert_eq!(hex_radius_for_zoom(12.0), 512.0);
        // Fractional zoom levels interpolate on the same curve.
        assert!((hex_radius_for_zoom(20.5) - 2f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn grid_round_trips_cell_centers() {
        let bounds = pad_rect(&viewport(), VIEWPORT_PAD_RATIO);
        let grid = HexGrid::new(&bounds, 500.0).unwrap();

        for q in 0..8 {
            for r in 0..8 {
                let (x, y) = grid.center(q, r);
                let point = Point::new(x, y);
                if point.x() > bounds.max().x || point.y() > bounds.max().y {
                    continue;
                }
                assert_eq!(grid.cell_for(&point), Some((q, r)), "cell ({q}, {r})");
            }
        }
    }

    #[test]
    fn nearby_points_share_a_cell_and_distant_points_do_not() {
        let collection = FeatureCollection::with_features(vec![
            Feature::point_feature("a", -71.0800, 42.3600),
            Feature::point_feature("b", -71.0801, 42.3601),
            Feature::point_feature("c", -71.0500, 42.3750),
        ]);

        // Zoom 12 → 512 m cells: a and b co-bin, c lands elsewhere.
        let cells = rebin(viewport(), 12.0, &collection).unwrap();
        assert_eq!(cells.len(), 2);

        let paired = cells.iter().find(|cell| cell.count == 2).unwrap();
        assert_eq!(paired.ids, vec!["a".to_string(), "b".to_string()]);
        let single = cells.iter().find(|cell| cell.count == 1).unwrap();
        assert_eq!(single.ids, vec!["c".to_string()]);
    }

    #[test]
    fn zero_count_cells_are_never_produced() {
        let collection =
            FeatureCollection::with_features(vec![Feature::point_feature("a", -71.08, 42.36)]);
        let cells = rebin(viewport(), 13.0, &collection).unwrap();
        assert_eq!(cells.len(), 1);
        assert!(cells.iter().all(|cell| cell.count > 0));
    }

    #[test]
    fn equal_counts_normalize_to_one_not_nan() {
        let collection = FeatureCollection::with_features(vec![
            Feature::point_feature("a", -71.0800, 42.3600),
            Feature::point_feature("b", -71.0500, 42.3750),
        ]);

        let cells = rebin(viewport(), 13.0, &collection).unwrap();
        assert!(cells.len() >= 2);
        for cell in &cells {
            assert_eq!(cell.count, 1);
            assert_eq!(cell.scale, 1.0);
            assert!(!cell.scale.is_nan());
        }
    }

    #[test]
    fn scale_spans_zero_to_one_across_distinct_counts() {
        let mut features = vec![
            Feature::point_feature("lone", -71.0500, 42.3750),
            Feature::point_feature("pair1", -71.1000, 42.3500),
            Feature::point_feature("pair2", -71.1001, 42.3501),
        ];
        for i in 0..4 {
            features.push(Feature::point_feature(
                format!("dense{i}"),
                -71.0800 + 0.0001 * i as f64,
                42.3600,
            ));
        }
        let collection = FeatureCollection::with_features(features);

        let cells = rebin(viewport(), 12.0, &collection).unwrap();
        assert_eq!(cells.len(), 3);

        let lone = cells.iter().find(|c| c.count == 1).unwrap();
        let pair = cells.iter().find(|c| c.count == 2).unwrap();
        let dense = cells.iter().find(|c| c.count == 4).unwrap();
        assert_eq!(lone.scale, 0.0);
        assert!((pair.scale - 1.0 / 3.0).abs() < 1e-12);
        assert_eq!(dense.scale, 1.0);
    }

    #[test]
    fn points_outside_the_padded_viewport_are_ignored() {
        let collection = FeatureCollection::with_features(vec![
            Feature::point_feature("inside", -71.0800, 42.3600),
            Feature::point_feature("far", -70.00, 41.00),
        ]);
        let cells = rebin(viewport(), 12.0, &collection).unwrap();
        assert_eq!(cells.iter().map(|c| c.count).sum::<usize>(), 1);
    }

    #[test]
    fn unplaced_features_are_skipped_and_nonpoints_rejected() {
        let unplaced = FeatureCollection::with_features(vec![Feature::new(
            Some("draft".into()),
            None,
            Default::default(),
        )]);
        assert!(rebin(viewport(), 12.0, &unplaced).unwrap().is_empty());

        let polygon = geo::polygon![
            (x: -71.08, y: 42.36),
            (x: -71.07, y: 42.36),
            (x: -71.07, y: 42.37),
            (x: -71.08, y: 42.36),
        ];
        let bad = FeatureCollection::with_features(vec![Feature::new(
            Some("poly".into()),
            Some(Geometry::Polygon(polygon)),
            Default::default(),
        )]);
        assert!(matches!(
            rebin(viewport(), 12.0, &bad),
            Err(ProximoError::MalformedGeometry(_))
        ));
    }

    #[test]
    fn cell_features_expose_render_properties() {
        let collection =
            FeatureCollection::with_features(vec![Feature::point_feature("a", -71.08, 42.36)]);
        let cells = rebin(viewport(), 12.0, &collection).unwrap();
        let feature = cells[0].to_feature();

        assert_eq!(feature.property("radius"), Some(&Value::from(512.0)));
        assert_eq!(feature.property("count"), Some(&Value::from(1)));
        assert_eq!(feature.property("scale"), Some(&Value::from(1.0)));
        assert_eq!(
            feature.property("suggestions"),
            Some(&Value::Array(vec![Value::from("a")]))
        );
    }
}
