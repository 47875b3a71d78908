//! Feature and configuration types shared by every query layer.
//!
//! Features are thin wrappers over `geo` geometries plus an opaque property
//! map, mirroring the GeoJSON model the map surface and feeds speak.

use crate::error::{ProximoError, Result};
use geo::{Geometry, Point, point};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Opaque key/value properties carried on a feature.
pub type Properties = Map<String, Value>;

/// A point, polygon, or line geometry with an optional stable identifier
/// and opaque properties.
///
/// Identifiers are unique within a [`FeatureCollection`] and double as cache
/// keys for the halo memo. A `None` geometry marks a feature that has no
/// usable location yet (e.g. a suggestion that has not been placed).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Feature {
    pub id: Option<String>,
    pub geometry: Option<Geometry>,
    pub properties: Properties,
}

impl Feature {
    pub fn new(id: Option<String>, geometry: Option<Geometry>, properties: Properties) -> Self {
        Self {
            id,
            geometry,
            properties,
        }
    }

    /// Convenience constructor for an identified point feature.
    pub fn point_feature(id: impl Into<String>, lon: f64, lat: f64) -> Self {
        Self {
            id: Some(id.into()),
            geometry: Some(Geometry::Point(point!(x: lon, y: lat))),
            properties: Properties::new(),
        }
    }

    /// The feature's point geometry.
    ///
    /// Fails fast with [`ProximoError::MalformedGeometry`] when the geometry
    /// is absent or not a point; silently skipping such features is a bug
    /// except where a query explicitly filters them.
    pub fn point(&self) -> Result<Point> {
        match &self.geometry {
            Some(Geometry::Point(p)) => Ok(*p),
            Some(other) => Err(ProximoError::MalformedGeometry(format!(
                "expected point geometry for feature {:?}, found {}",
                self.id,
                geometry_kind(other)
            ))),
            None => Err(ProximoError::MalformedGeometry(format!(
                "feature {:?} has no geometry",
                self.id
            ))),
        }
    }

    pub fn property(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }

    pub fn property_str(&self, key: &str) -> Option<&str> {
        self.properties.get(key).and_then(Value::as_str)
    }

    /// Attach a property, consuming and returning the feature.
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }
}

fn geometry_kind(geometry: &Geometry) -> &'static str {
    match geometry {
        Geometry::Point(_) => "Point",
        Geometry::Line(_) => "Line",
        Geometry::LineString(_) => "LineString",
        Geometry::Polygon(_) => "Polygon",
        Geometry::MultiPoint(_) => "MultiPoint",
        Geometry::MultiLineString(_) => "MultiLineString",
        Geometry::MultiPolygon(_) => "MultiPolygon",
        Geometry::GeometryCollection(_) => "GeometryCollection",
        Geometry::Rect(_) => "Rect",
        Geometry::Triangle(_) => "Triangle",
    }
}

/// An ordered sequence of features.
///
/// Order carries no meaning beyond stable iteration, which the caches and
/// tie-breaking rules rely on.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FeatureCollection {
    pub features: Vec<Feature>,
}

impl FeatureCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_features(features: Vec<Feature>) -> Self {
        Self { features }
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Feature> {
        self.features.iter()
    }

    pub fn push(&mut self, feature: Feature) {
        self.features.push(feature);
    }

    /// Emit the collection in GeoJSON form for the map surface.
    pub fn to_geojson(&self) -> geojson::FeatureCollection {
        geojson::FeatureCollection {
            bbox: None,
            features: self.features.iter().map(geojson::Feature::from).collect(),
            foreign_members: None,
        }
    }
}

impl FromIterator<Feature> for FeatureCollection {
    fn from_iter<I: IntoIterator<Item = Feature>>(iter: I) -> Self {
        Self {
            features: iter.into_iter().collect(),
        }
    }
}

impl From<&Feature> for geojson::Feature {
    fn from(feature: &Feature) -> Self {
        geojson::Feature {
            bbox: None,
            geometry: feature
                .geometry
                .as_ref()
                .map(|g| geojson::Geometry::new(geojson::Value::from(g))),
            id: feature
                .id
                .clone()
                .map(geojson::feature::Id::String),
            properties: Some(feature.properties.clone()),
            foreign_members: None,
        }
    }
}

impl TryFrom<geojson::Feature> for Feature {
    type Error = ProximoError;

    fn try_from(feature: geojson::Feature) -> Result<Self> {
        let id = feature.id.map(|id| match id {
            geojson::feature::Id::String(s) => s,
            geojson::feature::Id::Number(n) => n.to_string(),
        });
        let geometry = feature
            .geometry
            .map(|g| {
                Geometry::try_from(g).map_err(|err| {
                    ProximoError::MalformedGeometry(format!(
                        "feature {id:?} has an unusable geometry: {err}"
                    ))
                })
            })
            .transpose()?;
        Ok(Self {
            id,
            geometry,
            properties: feature.properties.unwrap_or_default(),
        })
    }
}

/// Engine configuration.
///
/// Designed to be loadable from JSON while keeping complexity minimal;
/// every field has a default so partial documents work.
///
/// # Example
///
/// ```rust
/// use proximo::Config;
///
/// let config: Config = serde_json::from_str(r#"{ "proximity_radius_m": 75.0 }"#).unwrap();
/// assert_eq!(config.proximity_radius_m, 75.0);
/// assert_eq!(config.fetch_retries, 3);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Radius in meters for halo circles and proximity checks.
    #[serde(default = "Config::default_proximity_radius_m")]
    pub proximity_radius_m: f64,

    /// Additional fetch attempts after the first failure (3 → 4 attempts
    /// total).
    #[serde(default = "Config::default_fetch_retries")]
    pub fetch_retries: u32,

    /// `boundary_name` value reserved for the combined service boundary.
    #[serde(default = "Config::default_combined_boundary_name")]
    pub combined_boundary_name: String,

    /// Property holding boundary/jurisdiction names in the service-area
    /// dataset.
    #[serde(default = "Config::default_boundary_name_property")]
    pub boundary_name_property: String,

    /// Multi-valued suggestion property tallied in location summaries.
    #[serde(default = "Config::default_reasons_property")]
    pub reasons_property: String,

    /// Suggestion property carrying the submitter token.
    #[serde(default = "Config::default_token_property")]
    pub token_property: String,

    /// Token identifying the current user's own suggestions.
    #[serde(default)]
    pub user_token: Option<String>,
}

impl Config {
    fn default_proximity_radius_m() -> f64 {
        50.0
    }

    const fn default_fetch_retries() -> u32 {
        3
    }

    fn default_combined_boundary_name() -> String {
        "Combined_Service_Area".to_string()
    }

    fn default_boundary_name_property() -> String {
        "boundary_name".to_string()
    }

    fn default_reasons_property() -> String {
        "good_location_reasons".to_string()
    }

    fn default_token_property() -> String {
        "user_token".to_string()
    }

    pub fn with_proximity_radius(mut self, radius_m: f64) -> Self {
        self.proximity_radius_m = radius_m;
        self
    }

    pub fn with_fetch_retries(mut self, retries: u32) -> Self {
        self.fetch_retries = retries;
        self
    }

    pub fn with_user_token(mut self, token: impl Into<String>) -> Self {
        self.user_token = Some(token.into());
        self
    }

    pub fn with_combined_boundary_name(mut self, name: impl Into<String>) -> Self {
        self.combined_boundary_name = name.into();
        self
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<()> {
        if !self.proximity_radius_m.is_finite() || self.proximity_radius_m <= 0.0 {
            return Err(ProximoError::InvalidInput(
                "proximity radius must be a positive, finite number of meters".to_string(),
            ));
        }
        if self.boundary_name_property.is_empty() {
            return Err(ProximoError::InvalidInput(
                "boundary name property must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            proximity_radius_m: Self::default_proximity_radius_m(),
            fetch_retries: Self::default_fetch_retries(),
            combined_boundary_name: Self::default_combined_boundary_name(),
            boundary_name_property: Self::default_boundary_name_property(),
            reasons_property: Self::default_reasons_property(),
            token_property: Self::default_token_property(),
            user_token: None,
        }
    }
}
