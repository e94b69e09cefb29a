//! Integration tests for PgComplaintStore.
//! Requires a Postgres instance with pgvector. Set DATABASE_TEST_URL or these tests are skipped.

mod harness;

use chrono::Utc;
use incident_common::{
    ComplaintRecord, GeoPoint, IncidentDraft, IncidentError, IncidentFilter, IncidentStatus,
    MemberLink,
};
use incident_domains::{
    run_clustering, ComplaintSource, IncidentSink, PgComplaintStore, RunOptions,
};
use pgvector::Vector;
use sqlx::PgPool;

use harness::{complaint, scenario, test_config};

/// Get a test database pool, or skip if no test DB is available.
async fn test_pool() -> Option<PgPool> {
    let url = std::env::var("DATABASE_TEST_URL").ok()?;
    let pool = PgPool::connect(&url).await.ok()?;

    sqlx::query("CREATE EXTENSION IF NOT EXISTS vector")
        .execute(&pool)
        .await
        .ok()?;

    for ddl in [
        r#"
        CREATE TABLE IF NOT EXISTS incidents (
            id            BIGSERIAL      PRIMARY KEY,
            title         VARCHAR(200),
            status        TEXT           NOT NULL DEFAULT 'OPEN',
            district_id   BIGINT,
            centroid_lat  NUMERIC(10,7),
            centroid_lon  NUMERIC(10,7),
            opened_at     TIMESTAMP,
            closed_at     TIMESTAMP
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS complaints (
            id                   BIGINT          PRIMARY KEY,
            title                TEXT,
            received_at          TIMESTAMP       NOT NULL,
            lat                  NUMERIC(10,7),
            lon                  NUMERIC(10,7),
            district_id          BIGINT          NOT NULL,
            incident_id          BIGINT          REFERENCES incidents(id),
            incident_linked_at   TIMESTAMP,
            incident_link_score  DOUBLE PRECISION
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS complaint_normalizations (
            complaint_id  BIGINT     PRIMARY KEY REFERENCES complaints(id),
            embedding     vector(2)
        )
        "#,
    ] {
        sqlx::query(ddl).execute(&pool).await.ok()?;
    }

    // Clean slate for each test
    sqlx::query("TRUNCATE complaint_normalizations, complaints, incidents RESTART IDENTITY CASCADE")
        .execute(&pool)
        .await
        .ok()?;

    Some(pool)
}

async fn seed(pool: &PgPool, records: &[ComplaintRecord]) {
    for r in records {
        sqlx::query(
            "INSERT INTO complaints (id, title, received_at, lat, lon, district_id) VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(r.id)
        .bind(&r.title)
        .bind(r.received_at)
        .bind(r.lat)
        .bind(r.lon)
        .bind(r.district_id)
        .execute(pool)
        .await
        .unwrap();
        sqlx::query("INSERT INTO complaint_normalizations (complaint_id, embedding) VALUES ($1, $2)")
            .bind(r.id)
            .bind(Vector::from(r.embedding.clone()))
            .execute(pool)
            .await
            .unwrap();
    }
}

// Everything runs in one test: the tables are shared.
#[tokio::test]
async fn clustering_round_trip() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let store = PgComplaintStore::new(pool.clone());

    let mut records = scenario();
    let mut unlocated = complaint(9, 1, 0.0, 7, vec![1.0, 0.0]);
    unlocated.lat = None;
    records.push(unlocated);
    seed(&pool, &records).await;

    // Unlocated complaints never reach the builder.
    let mut ids: Vec<i64> = store.unassigned().await.unwrap().iter().map(|r| r.id).collect();
    ids.sort_unstable();
    assert_eq!(ids, vec![1, 2, 3, 4]);

    let stats = run_clustering(
        &store,
        Some(&store),
        &test_config(),
        RunOptions {
            dry_run: false,
            verify: true,
        },
    )
    .await
    .unwrap();
    assert_eq!(stats.incidents_created, 1);
    assert_eq!(stats.complaints_linked, 3);

    let linked: Vec<(i64, Option<i64>, Option<f64>)> = sqlx::query_as(
        "SELECT id, incident_id, incident_link_score FROM complaints WHERE id IN (1, 2, 3, 4) ORDER BY id",
    )
    .fetch_all(&pool)
    .await
    .unwrap();
    let incident_id = linked[0].1.unwrap();
    assert_eq!(linked[0].2, Some(1.0));
    assert_eq!(linked[1].1, Some(incident_id));
    assert!((linked[1].2.unwrap() - 0.9).abs() < 1e-6);
    assert_eq!(linked[2].1, Some(incident_id));
    assert_eq!(linked[3].1, None);

    // Rerun sees only the leftover record.
    let rerun = run_clustering(&store, Some(&store), &test_config(), RunOptions::default())
        .await
        .unwrap();
    assert_eq!(rerun.records_processed, 1);
    assert_eq!(rerun.incidents_created, 0);

    let summaries = store.list_incidents(&IncidentFilter::default()).await.unwrap();
    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0].id, incident_id);
    assert_eq!(summaries[0].status, IncidentStatus::Open);
    assert_eq!(summaries[0].complaint_count, 3);
    assert_eq!(summaries[0].title, "[complaint 1] related recurring complaint");
    assert!(summaries[0].first_received_at < summaries[0].last_received_at);
    assert!(store
        .list_incidents(&IncidentFilter::major())
        .await
        .unwrap()
        .is_empty());

    // A draft naming an already-linked complaint rolls back entirely.
    let stale = IncidentDraft {
        pivot_id: 4,
        title: "[complaint 4] related recurring complaint".to_string(),
        district_id: 7,
        centroid: GeoPoint::new(37.5, 127.0),
        members: vec![
            MemberLink {
                complaint_id: 4,
                link_score: 1.0,
            },
            MemberLink {
                complaint_id: 2,
                link_score: 0.95,
            },
        ],
    };
    let err = store.persist(&[stale], Utc::now()).await.unwrap_err();
    assert!(matches!(err, IncidentError::Persistence(_)));

    let incident_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM incidents")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(incident_count, 1);
    let four: Option<i64> = sqlx::query_scalar("SELECT incident_id FROM complaints WHERE id = 4")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(four, None);
}
