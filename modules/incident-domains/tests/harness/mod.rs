//! Shared fixtures for the clustering integration tests.
//!
//! All coordinates sit in one Seoul district unless stated otherwise. One
//! degree of latitude is ~111.2km, so 0.0001 degrees is ~11m.

#![allow(dead_code)]

use chrono::{DateTime, Duration, TimeZone, Utc};
use incident_common::{ClusteringConfig, ComplaintRecord};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

pub const BASE_LAT: f64 = 37.5;
pub const BASE_LON: f64 = 127.0;

pub fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 5, 20, 12, 0, 0).unwrap()
}

/// Thresholds of the deployed system, without a fixed embedding width.
pub fn test_config() -> ClusteringConfig {
    ClusteringConfig {
        embedding_dim: None,
        ..Default::default()
    }
}

pub fn complaint(
    id: i64,
    hours_ago: i64,
    lat_offset: f64,
    district_id: i64,
    embedding: Vec<f32>,
) -> ComplaintRecord {
    ComplaintRecord {
        id,
        title: format!("complaint {id}"),
        received_at: base_time() - Duration::hours(hours_ago),
        lat: Some(BASE_LAT + lat_offset),
        lon: Some(BASE_LON),
        district_id,
        embedding,
        incident_id: None,
        link_score: None,
    }
}

/// Unit vector at the given cosine to `[1, 0]`.
pub fn at_similarity(cos: f32) -> Vec<f32> {
    vec![cos, (1.0 - cos * cos).sqrt()]
}

/// A (pivot, newest), B (~44m, 1 day, 0.9), C (~133m, 3 days, 0.82),
/// D (~500m, 2 days, identical topic).
pub fn scenario() -> Vec<ComplaintRecord> {
    vec![
        complaint(1, 0, 0.0, 7, vec![1.0, 0.0]),
        complaint(2, 24, 0.0004, 7, at_similarity(0.9)),
        complaint(3, 72, 0.0012, 7, at_similarity(0.82)),
        complaint(4, 48, 0.0045, 7, vec![1.0, 0.0]),
    ]
}

/// Seeded batch spread over a few districts, hotspots and topics so that
/// clusters, near misses and singletons all occur.
pub fn generated_batch(seed: u64, size: usize) -> Vec<ComplaintRecord> {
    let mut rng = StdRng::seed_from_u64(seed);
    let topics: Vec<Vec<f32>> = (0..4)
        .map(|_| (0..8).map(|_| rng.random_range(-1.0f32..1.0)).collect())
        .collect();

    (0..size)
        .map(|i| {
            let topic = &topics[rng.random_range(0..topics.len())];
            let embedding = topic
                .iter()
                .map(|x| x + rng.random_range(-0.15f32..0.15))
                .collect();
            let hotspot = rng.random_range(0..3) as f64 * 0.01;
            let jitter = rng.random_range(0.0..0.003);
            let mut record = complaint(
                i as i64 + 1,
                rng.random_range(0..24 * 20),
                hotspot + jitter,
                rng.random_range(1..=3),
                embedding,
            );
            record.lon = record.lon.map(|lon| lon + rng.random_range(0.0..0.002));
            record
        })
        .collect()
}
