//! Proximity and spatial-aggregation engine for civic point-suggestion
//! maps: nearest-station lookup, service-area and jurisdiction
//! classification, suggestion halos with summary statistics, and
//! zoom-adaptive hex binning.
//!
//! ```rust
//! use proximo::{Config, Feature, FeatureCollection, MapContext, Point};
//!
//! let mut context = MapContext::new(Config::default())?;
//!
//! let mut feed = || Ok(String::from(r#"{"data": {"stations": [
//!     {"station_id": "s1", "name": "Central Square", "lon": -71.1031, "lat": 42.3654}
//! ]}}"#));
//! context.load_stations(&mut feed)?;
//!
//! let click = Point::new(-71.1040, 42.3650);
//! let closest = context.closest_station(&click)?.unwrap();
//! assert_eq!(closest.property_str("name"), Some("Central Square"));
//! # Ok::<(), proximo::ProximoError>(())
//! ```

pub mod context;
pub mod error;
pub mod events;
pub mod feed;
pub mod hexbin;
pub mod nearest;
pub mod radius;
pub mod service_area;
pub mod spatial;
pub mod types;

pub use context::{LoadState, MapContext, ProximityContext, StationLink};
pub use error::{ProximoError, Result};
pub use events::{EventBus, EventSink, MapEvent};
pub use feed::{FeedSource, gbfs_to_feature_collection, geojson_to_feature_collection};
pub use hexbin::{HexCell, VIEWPORT_PAD_RATIO, hex_radius_for_zoom, rebin};
pub use nearest::NearestResolver;
pub use radius::{
    ClosestStation, HaloBuilder, LocationSummary, ReasonShare, nearby_features, summarize_location,
};
pub use service_area::{Jurisdiction, ServiceArea};
pub use spatial::{bounding_box, circle_polygon, distance_between, humanize_distance, pad_rect};
pub use types::{Config, Feature, FeatureCollection, Properties};

pub use geo::{Point, Polygon, Rect};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Common imports
pub mod prelude {
    pub use crate::{Config, MapContext, ProximoError, Result};

    pub use crate::{Feature, FeatureCollection};

    pub use crate::{EventBus, MapEvent};

    pub use crate::spatial::{bounding_box, distance_between};

    pub use geo::{Point, Polygon, Rect};
}
