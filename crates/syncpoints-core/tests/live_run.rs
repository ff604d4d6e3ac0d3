//! Integration tests for a generated lattice driven live
//!
//! These tests verify:
//! - A lattice survives the graph document round trip
//! - A live sandpile run with a sampler reaches the expected end state
//! - The exported statistics keep their field names

use std::time::Duration;

use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::sync::mpsc;
use tokio::time::Instant;

use syncpoints_core::{
    spawn_live, spawn_sampler, EngineConfig, GeneratedGraph, GraphDocument, LatticeParams,
    LiveOptions, PolicyKind, StopReason, VertexId,
};

/// 3x3 square grid with sinks on the border, four tokens from the centre
/// heading to the top-middle vertex
fn bordered_grid() -> GeneratedGraph {
    LatticeParams {
        polygon_edges: 4,
        horizontal_tiles: 2,
        vertical_tiles: 2,
        create_border_cascade: true,
        sync_lower: 4,
        sync_upper: 4,
        weight: 1.0,
        center_tokens: 4,
    }
    .generate(&mut StdRng::seed_from_u64(0))
    .expect("lattice")
}

#[test]
fn test_lattice_document_round_trip() {
    let generated = bordered_grid();
    let json = GraphDocument::from_graph(&generated.graph)
        .to_json_pretty()
        .unwrap();
    let graph = GraphDocument::from_json(&json).unwrap().to_graph().unwrap();

    assert_eq!(graph.vertex_count(), 17);
    assert_eq!(graph.edge_count(), generated.graph.edge_count());
    assert_eq!(graph.vertices().filter(|v| v.absorbing).count(), 8);
}

#[tokio::test(start_paused = true)]
async fn test_live_sandpile_with_sampler() {
    let generated = bordered_grid();
    let config = EngineConfig::new().with_sample_interval(Duration::from_millis(100));
    let interval = config.sample_interval;
    let sim = generated.into_simulation(config).unwrap();

    let started = Instant::now();
    let handle = spawn_live(sim, PolicyKind::BoundedIncremental, false, LiveOptions::default())
        .unwrap();
    let (tx, mut rx) = mpsc::unbounded_channel();
    let sampler = spawn_sampler(handle.stats(), interval, Some(tx));

    let outcome = handle.join().await.unwrap();
    tokio::time::sleep(interval * 2).await;
    let samples = sampler.stop().await.unwrap();

    // Two hops of weight 1 at 0.5 s per unit
    assert!(started.elapsed() >= Duration::from_millis(1000));
    assert_eq!(outcome.reason, StopReason::Drained);

    // Vertex 1 fires once: three neighbours and its sink get a token each
    let snapshot = &outcome.snapshot;
    assert_eq!(snapshot.dot_count, 8);
    assert_eq!(snapshot.current_dot_count, 0);
    assert_eq!(snapshot.dead_end_vertices, vec![VertexId(0), VertexId(2), VertexId(4)]);
    assert_eq!(snapshot.vertex_statistics.len(), 9);
    assert_eq!(outcome.simulation.statistics().absorbed_dots(), 1);

    assert_eq!(samples.first().map(|s| s.blue), Some(4));
    assert_eq!(samples.last().map(|s| s.total()), Some(0));
    let mut streamed = 0;
    while rx.try_recv().is_ok() {
        streamed += 1;
    }
    assert_eq!(streamed, samples.len());
}

#[tokio::test(start_paused = true)]
async fn test_exported_statistics_shape() {
    let sim = bordered_grid()
        .into_simulation(EngineConfig::default())
        .unwrap();
    let handle = spawn_live(sim, PolicyKind::ImmediateReset, true, LiveOptions::default().with_speed(5.0))
        .unwrap();
    let outcome = handle.join().await.unwrap();

    let json = serde_json::to_value(&outcome.snapshot).unwrap();
    for key in [
        "DotCount",
        "BlueDotCount",
        "GreenDotCount",
        "CurrentDotCount",
        "DistanceTravelled",
        "ColorMeetings",
        "TimeElapsed",
        "VertexStatistics",
        "DeadEndVertices",
    ] {
        assert!(json.get(key).is_some(), "missing {key}");
    }
    assert!(json.get("PausedTime").is_none());
    assert_eq!(json["VertexStatistics"][0]["VertexId"], 0);
}
