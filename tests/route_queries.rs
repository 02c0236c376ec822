use std::io::Write;

use serde_json::Value;
use tempfile::NamedTempFile;

use netpath::batch::{run_batch, write_outcomes, QueryEngine};
use netpath::config::RouteConfig;
use netpath::network;
use netpath::output::GeoJsonWriter;

const NETWORK: &str = r#"{
    "name": "test net",
    "nodes": [
        {"id": 1, "x": 0.0, "y": 0.0, "category": 1},
        {"id": 2, "x": 1.0, "y": 0.0, "category": 2},
        {"id": 3, "x": 2.0, "y": 0.0, "category": 3}
    ],
    "arcs": [
        {"id": 101, "from": 1, "to": 2, "attributes": {"cost": 1.0, "backcost": -1.0}},
        {"id": 102, "from": 2, "to": 3, "attributes": {"cost": 1.0, "backcost": -1.0}}
    ],
    "turns": [
        {"node": 2, "from_arc": 101, "to_arc": 102, "forbidden": true}
    ]
}"#;

fn load_network() -> network::NetworkFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(NETWORK.as_bytes()).unwrap();
    network::load(file.path()).unwrap()
}

fn config() -> RouteConfig {
    RouteConfig {
        forward_cost_column: Some("cost".to_string()),
        backward_cost_column: Some("backcost".to_string()),
        ..RouteConfig::default()
    }
}

fn run(engine: &QueryEngine, input: &str) -> (netpath::BatchSummary, Value) {
    let outcomes = run_batch(engine, input.as_bytes()).unwrap();
    let mut buf = Vec::new();
    let summary = {
        let mut sink = GeoJsonWriter::new(&mut buf);
        write_outcomes(engine, &outcomes, &mut sink).unwrap()
    };
    (summary, serde_json::from_slice(&buf).unwrap())
}

#[test]
fn batch_with_malformed_record_partially_succeeds() {
    let engine = QueryEngine::new(&load_network(), config()).unwrap();
    let input = "2 1 3 10\nnot a record at all\n0.25 0.0 1.75 0.0 11\n";
    let (summary, out) = run(&engine, input);

    assert_eq!(summary.solved, 2);
    assert_eq!(summary.failed, 1);

    let features = out["features"].as_array().unwrap();
    assert_eq!(features.len(), 2);

    // category query: N1 -> N3, cost 2, endpoints exact
    let first = &features[0];
    assert_eq!(first["properties"]["id"], 10);
    assert_eq!(first["properties"]["cost"], 2.0);
    assert_eq!(first["properties"]["start_distance"], 0.0);
    let coords = first["geometry"]["coordinates"].as_array().unwrap();
    assert_eq!(coords.first().unwrap()[0], 0.0);
    assert_eq!(coords.last().unwrap()[0], 2.0);

    // coordinate query: snapped mid-arc, cost 0.75 + 0.75
    let second = &features[1];
    assert_eq!(second["properties"]["id"], 11);
    assert_eq!(second["properties"]["cost"], 1.5);
}

#[test]
fn turntable_blocks_the_only_route() {
    let restricted = QueryEngine::new(
        &load_network(),
        RouteConfig { turntable: true, ..config() },
    )
    .unwrap();
    let (summary, out) = run(&restricted, "2 1 3\n");
    assert_eq!(summary.solved, 0);
    assert_eq!(summary.failed, 1);
    assert!(out["features"].as_array().unwrap().is_empty());

    // the same query passes without the turntable
    let open = QueryEngine::new(&load_network(), config()).unwrap();
    let (summary, _) = run(&open, "2 1 3\n");
    assert_eq!(summary.solved, 1);
}

#[test]
fn segments_mode_emits_grouped_arcs() {
    let engine = QueryEngine::new(
        &load_network(),
        RouteConfig { segments: true, ..config() },
    )
    .unwrap();
    let (summary, out) = run(&engine, "2 1 3 5\n");
    assert_eq!(summary.solved, 1);

    let features = out["features"].as_array().unwrap();
    assert_eq!(features.len(), 2);
    for (i, feature) in features.iter().enumerate() {
        assert_eq!(feature["properties"]["id"], 5);
        assert_eq!(feature["properties"]["sequence"], i as i64);
        assert_eq!(feature["properties"]["direction"], "forward");
        // original untrimmed arc geometry: unit-long segments
        let coords = feature["geometry"]["coordinates"].as_array().unwrap();
        assert_eq!(coords.len(), 2);
    }
}

#[test]
fn snap_threshold_failure_is_reported_not_fatal() {
    let engine = QueryEngine::new(
        &load_network(),
        RouteConfig { max_distance: 0.01, ..config() },
    )
    .unwrap();
    // start point 0.05 off the network with threshold 0.01
    let (summary, _) = run(&engine, "0.5 0.05 1.5 0.0\n2 1 2\n");
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.solved, 1);
}

#[test]
fn geodesic_run_uses_great_circle_lengths() {
    let doc = r#"{
        "latlon": true,
        "nodes": [
            {"id": 1, "x": 0.0, "y": 0.0, "category": 1},
            {"id": 2, "x": 1.0, "y": 0.0, "category": 2}
        ],
        "arcs": [{"id": 5, "from": 1, "to": 2}]
    }"#;
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(doc.as_bytes()).unwrap();
    let net = network::load(file.path()).unwrap();

    let engine = QueryEngine::new(
        &net,
        RouteConfig { geodesic: true, max_distance: 100_000.0, ..RouteConfig::default() },
    )
    .unwrap();
    let (summary, out) = run(&engine, "2 1 2\n");
    assert_eq!(summary.solved, 1);

    // with no cost column, arc cost is the haversine length of one
    // degree of longitude at the equator
    let cost = out["features"][0]["properties"]["cost"].as_f64().unwrap();
    assert!((cost - 111_195.0).abs() < 1_000.0, "got {cost}");
}
