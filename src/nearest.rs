//! Nearest-station lookup with a rounded-coordinate memo.

use crate::error::Result;
use crate::spatial::distance_between;
use crate::types::{Feature, FeatureCollection};
use geo::Point;
use rustc_hash::FxHashMap;
use std::sync::Arc;

/// Memo key: coordinates rounded to 6 decimal degrees (~0.1 m), so
/// repeated lookups around the same clicked point hit the cache.
pub(crate) fn coord_key(point: &Point) -> String {
    format!("{:.6},{:.6}", point.x(), point.y())
}

/// Finds the closest feature in a reference point set, memoizing by query
/// coordinate.
///
/// The memo's lifetime is tied to the identity of the reference snapshot:
/// passing a different `Arc` clears it wholesale, so a station reload
/// invalidates every cached lookup without any explicit hook.
#[derive(Debug, Default)]
pub struct NearestResolver {
    cache: FxHashMap<String, usize>,
    snapshot: Option<Arc<FeatureCollection>>,
}

impl NearestResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// The feature in `collection` closest to `point` by great-circle
    /// distance, or `None` for an empty collection.
    ///
    /// Ties go to the first occurrence in collection order (a left-fold
    /// minimum). Repeated calls with the same rounded coordinates return
    /// the identical cached feature until the snapshot is replaced.
    ///
    /// A feature without point coordinates is a caller contract violation
    /// and fails with [`crate::ProximoError::MalformedGeometry`].
    pub fn closest_feature<'a>(
        &mut self,
        point: &Point,
        collection: &'a Arc<FeatureCollection>,
    ) -> Result<Option<&'a Feature>> {
        match &self.snapshot {
            Some(previous) if Arc::ptr_eq(previous, collection) => {}
            _ => {
                self.cache.clear();
                self.snapshot = Some(Arc::clone(collection));
            }
        }

        if collection.is_empty() {
            return Ok(None);
        }

        let key = coord_key(point);
        if let Some(&index) = self.cache.get(&key) {
            return Ok(collection.features.get(index));
        }

        let mut best: Option<(usize, f64)> = None;
        for (index, feature) in collection.iter().enumerate() {
            let candidate = feature.point()?;
            let dist = distance_between(point, &candidate);
            if best.is_none_or(|(_, best_dist)| dist < best_dist) {
                best = Some((index, dist));
            }
        }

        let Some((index, _)) = best else {
            return Ok(None);
        };
        self.cache.insert(key, index);
        Ok(collection.features.get(index))
    }

    /// Drop the memo and forget the snapshot it was built against.
    pub fn invalidate(&mut self) {
        self.cache.clear();
        self.snapshot = None;
    }

    #[cfg(test)]
    pub(crate) fn cached_entries(&self) -> usize {
        self.cache.len()
    }
}
