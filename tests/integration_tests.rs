use proximo::{Config, Feature, FeatureCollection, LoadState, MapContext, Point, bounding_box};
use serde_json::json;

const GBFS_BODY: &str = r#"{
    "data": {
        "stations": [
            {"station_id": "s1", "name": "Central Square", "lon": -71.1031, "lat": 42.3654},
            {"station_id": "s2", "name": "Kendall Square", "lon": -71.0861, "lat": 42.3624},
            {"station_id": "s3", "name": "Harvard Square", "lon": -71.1189, "lat": 42.3736}
        ]
    }
}"#;

fn service_area_body() -> String {
    fn rect_feature(name: &str, west: f64, east: f64) -> serde_json::Value {
        json!({
            "type": "Feature",
            "properties": { "boundary_name": name },
            "geometry": {
                "type": "Polygon",
                "coordinates": [[
                    [west, 42.30], [east, 42.30], [east, 42.40], [west, 42.40], [west, 42.30]
                ]]
            }
        })
    }

    json!({
        "type": "FeatureCollection",
        "features": [
            rect_feature("Combined_Service_Area", -71.20, -71.00),
            rect_feature("Cambridge", -71.20, -71.10),
            rect_feature("Boston", -71.08, -71.00)
        ]
    })
    .to_string()
}

fn suggestion(id: &str, lon: f64, lat: f64, token: &str, reasons: &[&str]) -> Feature {
    Feature::point_feature(id, lon, lat)
        .with_property("user_token", token)
        .with_property("good_location_reasons", json!(reasons))
}

fn loaded_context() -> MapContext {
    let _ = env_logger::builder().is_test(true).try_init();

    let config = Config::default().with_user_token("me");
    let mut context = MapContext::new(config).unwrap();

    let mut stations = || Ok(GBFS_BODY.to_string());
    context.load_stations(&mut stations).unwrap();

    let body = service_area_body();
    let mut boundaries = move || Ok(body.clone());
    context.load_service_area(&mut boundaries).unwrap();

    context
}

#[test]
fn click_pipeline_resolves_station_area_and_summary() {
    let mut context = loaded_context();
    let click = Point::new(-71.1040, 42.3650);

    // Closest station and service-area classification for the click.
    let closest = context.closest_station(&click).unwrap().unwrap();
    assert_eq!(closest.id.as_deref(), Some("s1"));
    assert!(context.is_in_service_area(&click).unwrap());
    assert_eq!(context.find_jurisdiction(&click).unwrap(), "Cambridge");

    // Summary over the nearby suggestions.
    let suggestions = FeatureCollection::with_features(vec![
        suggestion("a", -71.1041, 42.3651, "me", &["bike_lanes"]),
        suggestion("b", -71.1039, 42.3649, "them", &["bike_lanes", "transit"]),
        suggestion("c", -71.0500, 42.3100, "them", &["transit"]),
    ]);
    let summary = context.location_summary(&click, &suggestions).unwrap();

    assert_eq!(summary.total_suggestions, 2);
    assert!(summary.you_suggested);
    assert_eq!(summary.others_count, 1);
    assert_eq!(summary.reasons[0].code, "bike_lanes");
    assert_eq!(summary.reasons[0].count, 2);

    let station = summary.closest_station.unwrap();
    assert_eq!(station.name.as_deref(), Some("Central Square"));
    assert!(station.distance_m < 200.0);
    assert!(station.readable_distance.ends_with(" m"));
}

#[test]
fn proximity_context_links_to_the_closest_station() {
    let mut context = loaded_context();
    let click = Point::new(-71.1040, 42.3650);

    let proximity = context.proximity_context(&click).unwrap();
    assert_eq!(proximity.ring.exterior().0.len(), 65);

    let link = proximity.link.unwrap();
    assert_eq!(link.station_id.as_deref(), Some("s1"));
    assert_eq!(link.station_name.as_deref(), Some("Central Square"));
    assert_eq!(link.path.0.len(), 2);
    assert_eq!(link.path.0[0].x, click.x());
}

#[test]
fn station_reload_replaces_the_snapshot_atomically() {
    let mut context = loaded_context();
    let click = Point::new(-71.1040, 42.3650);

    let before = context.closest_station(&click).unwrap().unwrap();
    assert_eq!(before.id.as_deref(), Some("s1"));

    // The refreshed feed no longer includes s1.
    let mut refreshed = || {
        Ok(String::from(
            r#"{"data": {"stations": [
                {"station_id": "s9", "name": "Inman Square", "lon": -71.1013, "lat": 42.3742}
            ]}}"#,
        ))
    };
    context.load_stations(&mut refreshed).unwrap();

    let after = context.closest_station(&click).unwrap().unwrap();
    assert_eq!(after.id.as_deref(), Some("s9"));
}

#[test]
fn halos_survive_rerenders_and_honor_reset() {
    let mut context = loaded_context();
    let suggestions = FeatureCollection::with_features(vec![
        suggestion("a", -71.1041, 42.3651, "me", &["bike_lanes"]),
        suggestion("b", -71.0900, 42.3600, "them", &["transit"]),
    ]);

    let first = context.build_halos(&suggestions).unwrap();
    let second = context.build_halos(&suggestions).unwrap();
    assert!(std::sync::Arc::ptr_eq(&first[0], &second[0]));

    context.invalidate_halo("a");
    let third = context.build_halos(&suggestions).unwrap();
    assert!(!std::sync::Arc::ptr_eq(&first[0], &third[0]));
    assert!(std::sync::Arc::ptr_eq(&first[1], &third[1]));

    context.reset_halos();
    let fourth = context.build_halos(&suggestions).unwrap();
    assert!(!std::sync::Arc::ptr_eq(&third[1], &fourth[1]));
}

#[test]
fn rebin_through_the_context_aggregates_suggestions() {
    let context = loaded_context();
    let viewport = bounding_box(-71.12, 42.34, -71.04, 42.38).unwrap();
    let suggestions = FeatureCollection::with_features(vec![
        suggestion("a", -71.1041, 42.3651, "me", &["bike_lanes"]),
        suggestion("b", -71.1042, 42.3652, "them", &["transit"]),
        suggestion("c", -71.0500, 42.3750, "them", &["transit"]),
    ]);

    let cells = context.rebin(viewport, 12.0, &suggestions).unwrap();
    assert_eq!(cells.iter().map(|c| c.count).sum::<usize>(), 3);
    assert!(cells.iter().any(|c| c.count == 2));
    assert!(cells.iter().all(|c| (0.0..=1.0).contains(&c.scale)));
}

#[test]
fn jurisdiction_falls_back_to_the_nearest_edge() {
    let context = loaded_context();

    // Inside the combined boundary but between the two jurisdictions,
    // closer to Boston's western edge.
    let gap_point = Point::new(-71.085, 42.35);
    assert!(context.is_in_service_area(&gap_point).unwrap());
    assert_eq!(context.find_jurisdiction(&gap_point).unwrap(), "Boston");
}

#[test]
fn service_area_state_reflects_the_load_cycle() {
    let config = Config::default();
    let mut context = MapContext::new(config).unwrap();
    assert_eq!(context.service_area_state(), LoadState::NotLoaded);

    let body = service_area_body();
    let mut boundaries = move || Ok(body.clone());
    context.load_service_area(&mut boundaries).unwrap();
    assert_eq!(context.service_area_state(), LoadState::Loaded);
}
