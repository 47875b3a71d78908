//! Per-application context owning dataset state, caches, and the event
//! bus.
//!
//! The original application kept station and service-area state in a
//! module-level namespace observed through a shared emitter. `MapContext`
//! replaces that: one explicit object constructed per application
//! instance, passed by reference to every consumer.

use crate::error::{ProximoError, Result};
use crate::events::{EventBus, EventSink, MapEvent};
use crate::feed::{
    FeedSource, gbfs_to_feature_collection, geojson_to_feature_collection, load_with_retry,
};
use crate::hexbin::{self, HexCell};
use crate::nearest::NearestResolver;
use crate::radius::{ClosestStation, HaloBuilder, LocationSummary, nearby_features,
    summarize_location};
use crate::service_area::ServiceArea;
use crate::spatial::{CIRCLE_STEPS, circle_polygon, distance_between, humanize_distance};
use crate::types::{Config, Feature, FeatureCollection};
use geo::{LineString, Point, Polygon, Rect, line_string};
use std::marker::PhantomData;
use std::sync::Arc;

/// Outcome of a dataset's most recent load cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoadState {
    #[default]
    NotLoaded,
    Loaded,
    Failed,
}

/// The dashed ring and closest-station link rendered around a selected
/// location.
#[derive(Debug, Clone)]
pub struct ProximityContext {
    pub ring: Polygon,
    pub link: Option<StationLink>,
}

/// A line from a selected location to its closest station, annotated for
/// display.
#[derive(Debug, Clone)]
pub struct StationLink {
    pub station_id: Option<String>,
    pub station_name: Option<String>,
    pub distance_m: f64,
    pub readable_distance: String,
    pub path: LineString,
}

/// Owns the station snapshot, service-area state, both memo caches, and
/// the pub/sub bus.
///
/// Single-threaded by design, like the event-loop environment it models:
/// the context cannot be sent between threads, which is what makes the
/// no-locks guarantee sound. Loads run synchronously to a terminal state,
/// so queries observe either a loaded dataset or a terminal failure, never
/// a half-loaded one.
pub struct MapContext {
    config: Config,
    bus: EventBus,
    stations: Option<Arc<FeatureCollection>>,
    service_area: Option<ServiceArea>,
    service_area_state: LoadState,
    nearest: NearestResolver,
    halos: HaloBuilder,
    _not_send_sync: PhantomData<*const ()>,
}

impl MapContext {
    pub fn new(config: Config) -> Result<Self> {
        Self::with_bus(config, EventBus::new())
    }

    /// Construct with a caller-supplied bus, e.g. one that already has
    /// subscribers.
    pub fn with_bus(config: Config, bus: EventBus) -> Result<Self> {
        config.validate()?;
        let halos = HaloBuilder::new(config.proximity_radius_m);
        Ok(Self {
            config,
            bus,
            stations: None,
            service_area: None,
            service_area_state: LoadState::NotLoaded,
            nearest: NearestResolver::new(),
            halos,
            _not_send_sync: PhantomData,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Subscribe to load-cycle events.
    pub fn subscribe(&mut self, subscriber: impl Fn(MapEvent) + 'static) {
        self.bus.subscribe(subscriber);
    }

    /// Current station snapshot, if one has loaded.
    pub fn stations(&self) -> Option<&Arc<FeatureCollection>> {
        self.stations.as_ref()
    }

    pub fn service_area_state(&self) -> LoadState {
        self.service_area_state
    }

    /// Load (or reload) the station set from a GBFS feed.
    ///
    /// Retries transient failures up to the configured budget, then emits
    /// exactly one terminal event for the cycle. On success the snapshot
    /// is replaced atomically; derived caches keyed to the old snapshot
    /// invalidate themselves on next use.
    pub fn load_stations(&mut self, source: &mut dyn FeedSource) -> Result<()> {
        self.load_stations_with(source, gbfs_to_feature_collection)
    }

    /// Load the station set from a pre-formed GeoJSON feed.
    pub fn load_stations_geojson(&mut self, source: &mut dyn FeedSource) -> Result<()> {
        self.load_stations_with(source, geojson_to_feature_collection)
    }

    fn load_stations_with(
        &mut self,
        source: &mut dyn FeedSource,
        parse: fn(&str) -> Result<FeatureCollection>,
    ) -> Result<()> {
        match load_with_retry(source, parse, self.config.fetch_retries) {
            Ok(stations) => {
                log::debug!("loaded {} stations", stations.len());
                self.stations = Some(Arc::new(stations));
                self.bus.publish(MapEvent::StationsLoaded);
                Ok(())
            }
            Err(err) => {
                self.bus.publish(MapEvent::StationsLoadFailed);
                Err(err)
            }
        }
    }

    /// Run a service-area load cycle from a GeoJSON boundary feed.
    ///
    /// Fetch and parse failures are retried; a missing combined-boundary
    /// sentinel is a configuration error and fails the cycle without
    /// retry. Exactly one terminal event fires per call, and the cycle
    /// ends `Loaded` or `Failed`. A later call starts a fresh cycle.
    pub fn load_service_area(&mut self, source: &mut dyn FeedSource) -> Result<()> {
        let collection =
            match load_with_retry(source, geojson_to_feature_collection, self.config.fetch_retries)
            {
                Ok(collection) => collection,
                Err(err) => {
                    self.service_area_state = LoadState::Failed;
                    self.bus.publish(MapEvent::ServiceAreaLoadFailed);
                    return Err(err);
                }
            };

        match ServiceArea::from_feature_collection(
            &collection,
            &self.config.boundary_name_property,
            &self.config.combined_boundary_name,
        ) {
            Ok(area) => {
                log::debug!(
                    "loaded service area with {} jurisdictions",
                    area.jurisdictions().len()
                );
                self.service_area = Some(area);
                self.service_area_state = LoadState::Loaded;
                self.bus.publish(MapEvent::ServiceAreaLoaded);
                Ok(())
            }
            Err(err) => {
                self.service_area = None;
                self.service_area_state = LoadState::Failed;
                self.bus.publish(MapEvent::ServiceAreaLoadFailed);
                Err(err)
            }
        }
    }

    /// The closest station to `point`, memoized by rounded coordinate.
    ///
    /// Behaves like an empty reference set before the first successful
    /// station load: returns `None`, never an error.
    pub fn closest_station(&mut self, point: &Point) -> Result<Option<&Feature>> {
        let Some(stations) = &self.stations else {
            return Ok(None);
        };
        self.nearest.closest_feature(point, stations)
    }

    /// Whether `point` lies within the combined service boundary.
    ///
    /// Absence of the dataset means "cannot validate", not "outside":
    /// [`ProximoError::ServiceAreaUnavailable`] until a load cycle ends in
    /// the loaded state.
    pub fn is_in_service_area(&self, point: &Point) -> Result<bool> {
        let area = self
            .service_area
            .as_ref()
            .ok_or(ProximoError::ServiceAreaUnavailable)?;
        Ok(area.contains(point))
    }

    /// The jurisdiction name for `point` (containing, else nearest by
    /// boundary edge). Same availability contract as
    /// [`MapContext::is_in_service_area`].
    pub fn find_jurisdiction(&self, point: &Point) -> Result<&str> {
        let area = self
            .service_area
            .as_ref()
            .ok_or(ProximoError::ServiceAreaUnavailable)?;
        area.jurisdiction_of(point)
    }

    /// Suggestions within `2 ×` the configured proximity radius of `point`.
    pub fn nearby_suggestions<'a>(
        &self,
        point: &Point,
        suggestions: &'a FeatureCollection,
    ) -> Result<Vec<&'a Feature>> {
        nearby_features(point, suggestions, self.config.proximity_radius_m)
    }

    /// Halo circles for the current suggestion set, served from the per-id
    /// memo where geometries are unchanged.
    pub fn build_halos(&mut self, suggestions: &FeatureCollection) -> Result<Vec<Arc<Feature>>> {
        self.halos.build_halos(suggestions)
    }

    /// Invalidate one suggestion's halo (suggestion removed or replaced).
    pub fn invalidate_halo(&mut self, id: &str) {
        self.halos.invalidate(id);
    }

    /// Invalidate every halo (suggestion collection reset).
    pub fn reset_halos(&mut self) {
        self.halos.clear();
    }

    /// Statistics for a location: the nearby-suggestion breakdown plus the
    /// closest station when a station snapshot is available.
    pub fn location_summary(
        &mut self,
        point: &Point,
        suggestions: &FeatureCollection,
    ) -> Result<LocationSummary> {
        let mut summary = summarize_location(
            point,
            suggestions,
            self.config.proximity_radius_m,
            self.config.user_token.as_deref(),
            &self.config.token_property,
            &self.config.reasons_property,
        )?;

        if let Some(stations) = &self.stations
            && let Some(station) = self.nearest.closest_feature(point, stations)?
        {
            summary.closest_station = Some(ClosestStation::from_feature(point, station)?);
        }

        Ok(summary)
    }

    /// The proximity layer's data for a selected location: a ring of the
    /// configured radius, plus a labeled line to the closest station when
    /// stations are loaded.
    pub fn proximity_context(&mut self, point: &Point) -> Result<ProximityContext> {
        let ring = circle_polygon(point, self.config.proximity_radius_m, CIRCLE_STEPS);

        let link = match self.closest_station(point)? {
            Some(station) => {
                let station_point = station.point()?;
                let distance_m = distance_between(point, &station_point);
                Some(StationLink {
                    station_id: station.id.clone(),
                    station_name: station.property_str("name").map(str::to_string),
                    distance_m,
                    readable_distance: humanize_distance(distance_m),
                    path: line_string![
                        (x: point.x(), y: point.y()),
                        (x: station_point.x(), y: station_point.y()),
                    ],
                })
            }
            None => None,
        };

        Ok(ProximityContext { ring, link })
    }

    /// Hex-bin the suggestion set for the given viewport and zoom.
    ///
    /// Full recomputation every call; callers trigger this on zoom changes
    /// while the aggregate layer is active, not on pans.
    pub fn rebin(
        &self,
        viewport: Rect,
        zoom: f64,
        suggestions: &FeatureCollection,
    ) -> Result<Vec<HexCell>> {
        hexbin::rebin(viewport, zoom, suggestions)
    }
}

impl std::fmt::Debug for MapContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MapContext")
            .field("stations", &self.stations.as_ref().map(|s| s.len()))
            .field("service_area_state", &self.service_area_state)
            .finish_non_exhaustive()
    }
}
