//! Radius-based proximity: the nearby filter, suggestion halos, and
//! location summary statistics.

use crate::error::{ProximoError, Result};
use crate::spatial::{CIRCLE_STEPS, circle_polygon, distance_between, humanize_distance};
use crate::types::{Feature, FeatureCollection};
use geo::{Geometry, Point};
use rustc_hash::FxHashMap;
use serde_json::Value;
use std::sync::Arc;

/// Features whose great-circle distance to `point` is at most
/// `2 × radius_m`, boundary-inclusive.
///
/// The doubling is deliberate: the nearby view surfaces context beyond the
/// exact proximity threshold used elsewhere. Do not collapse it into the
/// radius itself.
///
/// Features without geometry have no location to measure and are skipped,
/// matching the halo-building rule for unplaced suggestions; a non-point
/// geometry is a contract violation.
pub fn nearby_features<'a>(
    point: &Point,
    collection: &'a FeatureCollection,
    radius_m: f64,
) -> Result<Vec<&'a Feature>> {
    let mut nearby = Vec::new();
    for feature in collection.iter() {
        let candidate = match &feature.geometry {
            None => continue,
            Some(Geometry::Point(p)) => *p,
            Some(_) => {
                return Err(ProximoError::MalformedGeometry(format!(
                    "nearby filter expects point features, feature {:?} is not one",
                    feature.id
                )));
            }
        };
        if distance_between(point, &candidate) <= radius_m * 2.0 {
            nearby.push(feature);
        }
    }
    Ok(nearby)
}

struct CachedHalo {
    center: Point,
    halo: Arc<Feature>,
}

/// Builds halo circles around suggestions, memoized per suggestion id.
///
/// Halo construction is the slow part of a layer refresh, so repeated
/// renders reuse the cached circle as long as the suggestion's geometry is
/// unchanged. A moved suggestion rebuilds just its own entry; a collection
/// reset should go through [`HaloBuilder::clear`].
pub struct HaloBuilder {
    radius_m: f64,
    cache: FxHashMap<String, CachedHalo>,
}

impl HaloBuilder {
    pub fn new(radius_m: f64) -> Self {
        Self {
            radius_m,
            cache: FxHashMap::default(),
        }
    }

    pub fn radius_m(&self) -> f64 {
        self.radius_m
    }

    /// One circle polygon per placed suggestion, carrying the source
    /// feature's id and properties.
    ///
    /// Suggestions without an id (not yet persisted) or without geometry
    /// (not yet placed) are excluded. Cache hits return the identical
    /// `Arc`, so unchanged halos are pointer-equal across calls.
    pub fn build_halos(&mut self, collection: &FeatureCollection) -> Result<Vec<Arc<Feature>>> {
        let mut halos = Vec::with_capacity(collection.len());
        for feature in collection.iter() {
            let Some(id) = feature.id.as_deref() else {
                continue;
            };
            if feature.geometry.is_none() {
                continue;
            }
            let center = feature.point()?;

            if let Some(cached) = self.cache.get(id)
                && cached.center == center
            {
                halos.push(Arc::clone(&cached.halo));
                continue;
            }

            let ring = circle_polygon(&center, self.radius_m, CIRCLE_STEPS);
            let halo = Arc::new(Feature::new(
                Some(id.to_string()),
                Some(Geometry::Polygon(ring)),
                feature.properties.clone(),
            ));
            self.cache.insert(
                id.to_string(),
                CachedHalo {
                    center,
                    halo: Arc::clone(&halo),
                },
            );
            halos.push(halo);
        }
        Ok(halos)
    }

    /// Drop the cached halo for one suggestion (e.g. on removal).
    pub fn invalidate(&mut self, id: &str) {
        self.cache.remove(id);
    }

    /// Drop every cached halo (collection reset).
    pub fn clear(&mut self) {
        self.cache.clear();
    }

    #[cfg(test)]
    pub(crate) fn cached_entries(&self) -> usize {
        self.cache.len()
    }
}

/// One entry of the reason frequency table.
#[derive(Debug, Clone, PartialEq)]
pub struct ReasonShare {
    pub code: String,
    pub count: usize,
    /// `count / total_suggestions` within the nearby set.
    pub share: f64,
}

/// The closest existing station to a summarized location.
#[derive(Debug, Clone, PartialEq)]
pub struct ClosestStation {
    pub id: Option<String>,
    pub name: Option<String>,
    pub distance_m: f64,
    pub readable_distance: String,
}

impl ClosestStation {
    pub fn from_feature(point: &Point, station: &Feature) -> Result<Self> {
        let distance_m = distance_between(point, &station.point()?);
        Ok(Self {
            id: station.id.clone(),
            name: station.property_str("name").map(str::to_string),
            distance_m,
            readable_distance: humanize_distance(distance_m),
        })
    }
}

/// Summary statistics for a location, computed over the nearby suggestion
/// set.
#[derive(Debug, Clone, PartialEq)]
pub struct LocationSummary {
    pub lng: f64,
    pub lat: f64,
    pub radius_m: f64,
    pub total_suggestions: usize,
    /// Whether any nearby suggestion carries the current user's token.
    pub you_suggested: bool,
    pub others_count: usize,
    /// Reason frequency table, sorted descending by count; equal counts
    /// keep first-seen order.
    pub reasons: Vec<ReasonShare>,
    /// Filled in by the context when a station snapshot is available.
    pub closest_station: Option<ClosestStation>,
}

/// Build the statistics block for a location.
///
/// Suggestions are those within `2 × radius_m` of the point (see
/// [`nearby_features`]). The reasons property may hold a list of codes or
/// a single scalar code; scalars are treated as one-element lists.
pub fn summarize_location(
    point: &Point,
    suggestions: &FeatureCollection,
    radius_m: f64,
    user_token: Option<&str>,
    token_property: &str,
    reasons_property: &str,
) -> Result<LocationSummary> {
    let nearby = nearby_features(point, suggestions, radius_m)?;
    let total = nearby.len();

    let yours = match user_token {
        Some(token) => nearby
            .iter()
            .filter(|s| s.property_str(token_property) == Some(token))
            .count(),
        None => 0,
    };

    let mut counts: FxHashMap<&str, usize> = FxHashMap::default();
    let mut first_seen: Vec<&str> = Vec::new();
    for suggestion in &nearby {
        for code in reason_codes(suggestion.property(reasons_property)) {
            if !counts.contains_key(code) {
                first_seen.push(code);
            }
            *counts.entry(code).or_insert(0) += 1;
        }
    }

    let mut reasons: Vec<ReasonShare> = first_seen
        .into_iter()
        .map(|code| {
            let count = counts[code];
            ReasonShare {
                code: code.to_string(),
                count,
                share: count as f64 / total as f64,
            }
        })
        .collect();
    // Stable sort: ties keep first-seen insertion order.
    reasons.sort_by(|a, b| b.count.cmp(&a.count));

    Ok(LocationSummary {
        lng: point.x(),
        lat: point.y(),
        radius_m,
        total_suggestions: total,
        you_suggested: yours > 0,
        others_count: total - yours,
        reasons,
        closest_station: None,
    })
}

fn reason_codes(value: Option<&Value>) -> Vec<&str> {
    match value {
        Some(Value::Array(items)) => items.iter().filter_map(Value::as_str).collect(),
        Some(Value::String(code)) => vec![code.as_str()],
        _ => Vec::new(),
    }
}
