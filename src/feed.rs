//! Dataset feed adapters and the retrying loader.
//!
//! Two feed shapes are supported: a GBFS `station_information` document and
//! a pre-formed GeoJSON feature collection. Fetching is abstracted behind
//! [`FeedSource`] so the network layer stays a collaborator concern; the
//! loader here owns only the retry budget.

use crate::error::{ProximoError, Result};
use crate::types::{Feature, FeatureCollection, Properties};
use geo::{Geometry, point};
use serde::Deserialize;
use serde_json::Value;

/// Supplies raw dataset documents, typically over HTTP.
///
/// Closures returning `Result<String>` implement this, which keeps test
/// sources and ad hoc adapters cheap:
///
/// ```rust
/// use proximo::feed::FeedSource;
///
/// let mut source = || Ok(String::from("{}"));
/// let body = source.fetch().unwrap();
/// assert_eq!(body, "{}");
/// ```
pub trait FeedSource {
    fn fetch(&mut self) -> Result<String>;
}

impl<F> FeedSource for F
where
    F: FnMut() -> Result<String>,
{
    fn fetch(&mut self) -> Result<String> {
        self()
    }
}

/// Fetch and parse a dataset, retrying transient failures.
///
/// `extra_attempts` is the number of retries after the first failure, so a
/// budget of 3 yields 4 attempts total. Retries are immediate; parse
/// failures count as transient just like network failures. The terminal
/// error is returned exactly once, after the budget is exhausted.
pub fn load_with_retry<T>(
    source: &mut dyn FeedSource,
    parse: impl Fn(&str) -> Result<T>,
    extra_attempts: u32,
) -> Result<T> {
    let mut failures = 0;
    loop {
        match source.fetch().and_then(|body| parse(&body)) {
            Ok(value) => return Ok(value),
            Err(err) if failures < extra_attempts => {
                failures += 1;
                log::debug!("dataset load failed, retrying ({failures}/{extra_attempts}): {err}");
            }
            Err(err) => {
                log::warn!("dataset load failed after {} attempts: {err}", failures + 1);
                return Err(err);
            }
        }
    }
}

#[derive(Deserialize)]
struct GbfsDocument {
    data: GbfsData,
}

#[derive(Deserialize)]
struct GbfsData {
    stations: Vec<GbfsStation>,
}

#[derive(Deserialize)]
struct GbfsStation {
    station_id: Value,
    lon: f64,
    lat: f64,
    #[serde(flatten)]
    extra: Properties,
}

/// Convert a GBFS `station_information` document into a feature collection.
///
/// One point feature per station, identified by `station_id` (numeric ids
/// are normalized to strings) and carrying the raw record as properties.
pub fn gbfs_to_feature_collection(body: &str) -> Result<FeatureCollection> {
    let doc: GbfsDocument = serde_json::from_str(body)
        .map_err(|err| ProximoError::FetchFailure(format!("invalid GBFS document: {err}")))?;

    doc.data
        .stations
        .into_iter()
        .map(|station| {
            let id = match &station.station_id {
                Value::String(s) => s.clone(),
                Value::Number(n) => n.to_string(),
                other => {
                    return Err(ProximoError::FetchFailure(format!(
                        "station_id must be a string or number, found {other}"
                    )));
                }
            };

            // Properties are the record spread back out, coordinates included.
            let mut properties = station.extra;
            properties.insert("station_id".to_string(), station.station_id);
            properties.insert("lon".to_string(), station.lon.into());
            properties.insert("lat".to_string(), station.lat.into());

            Ok(Feature::new(
                Some(id),
                Some(Geometry::Point(point!(x: station.lon, y: station.lat))),
                properties,
            ))
        })
        .collect()
}

/// Consume a pre-formed GeoJSON feature collection as-is.
pub fn geojson_to_feature_collection(body: &str) -> Result<FeatureCollection> {
    let gj: geojson::FeatureCollection = body
        .parse()
        .map_err(|err| ProximoError::FetchFailure(format!("invalid GeoJSON document: {err}")))?;

    gj.features.into_iter().map(Feature::try_from).collect()
}
