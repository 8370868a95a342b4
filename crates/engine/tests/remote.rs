//! Remote strategies against the in-memory backend.

mod common;

use std::time::Duration;

use common::land_cover_classes;
use geoclass_cloud::{InMemorySession, JobStatus, Pyramiding, SessionProvider};
use geoclass_core::{Error, Matrix, SourceKind, Stage};
use geoclass_engine::{
    default_destination, describe, enumerate, list_bands, wait_for_job, EngineConfig, Output, ReclassifyExecutor,
    WaitOptions,
};
use serde_json::json;

fn quick() -> WaitOptions {
    WaitOptions {
        poll_interval: Duration::from_millis(1),
        timeout: Some(Duration::from_secs(5)),
    }
}

fn backend() -> InMemorySession {
    let session = InMemorySession::new();
    session.add_image(
        "users/me/landcover",
        vec![("classification", vec![1, 2, 3, 4, 5, 6]), ("quality", vec![0; 6])],
        Some(30.0),
    );
    let rows = ["A", "B", "C", "B"]
        .iter()
        .map(|crop| json!({"crop": crop, "system:index": "0"}).as_object().cloned().unwrap_or_default())
        .collect();
    session.add_table("users/me/parcels", rows);
    session
}

#[test]
fn test_remote_image_flow() {
    let session = backend();
    let source = describe("users/me/landcover", "classification", Some(&session)).unwrap();
    assert_eq!(source.kind, SourceKind::RemoteImage);
    assert_eq!(
        list_bands(source.kind, &source.location, Some(&session)).unwrap(),
        vec!["classification", "quality"]
    );

    let values = enumerate(&source, Some(&session), &EngineConfig::default()).unwrap();
    assert_eq!(values.len(), 6);

    let destination = default_destination(&source, Some(&session)).unwrap();
    assert_eq!(destination, "users/me/landcover_reclass");

    let matrix = Matrix::from_buckets(vec![(10, vec![1i64, 2]), (20, vec![3]), (30, vec![4, 5])], 0);
    let strict = EngineConfig {
        strict: true,
        ..EngineConfig::default()
    };
    let result = ReclassifyExecutor::new(strict)
        .with_session(&session)
        .run(&source, &matrix, &land_cover_classes(), &destination)
        .unwrap();

    // 6 is unmapped and lands on the default
    assert_eq!(result.summary.unmapped_values, 1);
    assert_eq!(result.summary.destination_codes, 4);
    assert_eq!(result.summary.default_count, None);

    let job = match result.output {
        Output::Job(job) => job,
        other => panic!("expected a job, got {other:?}"),
    };
    assert_eq!(job.description, "landcover_reclass");
    assert!(!session.contains(&destination));

    let (_, options) = session.exports().into_iter().next().unwrap();
    assert_eq!(options.max_pixels, Some(1e13));
    assert_eq!(options.pyramiding, Some(Pyramiding::Mode));
    assert_eq!(options.scale, Some(30.0));

    wait_for_job(&session, &job, quick(), |_| {}).unwrap();
    assert_eq!(
        session.image_band(&destination, "remapped").unwrap(),
        vec![10, 10, 20, 30, 30, 0]
    );
    let props = session.image_properties(&destination).unwrap();
    assert_eq!(props["visualization_0_values"], "0,10,20,30");
    assert_eq!(props["visualization_0_bands"], "classification");
    assert_eq!(props["visualization_0_type"], "categorical");

    // a second run picks the next free name
    assert_eq!(
        default_destination(&source, Some(&session)).unwrap(),
        "users/me/landcover_reclass_1"
    );
}

#[test]
fn test_remote_collection_flow() {
    let session = backend();
    let source = describe("users/me/parcels", "crop", Some(&session)).unwrap();
    assert_eq!(source.kind, SourceKind::RemoteFeatureCollection);
    assert_eq!(
        list_bands(source.kind, &source.location, Some(&session)).unwrap(),
        vec!["crop"]
    );

    let matrix = Matrix::from_buckets(vec![(1, vec!["A"]), (2, vec!["B"])], 0);
    let result = ReclassifyExecutor::new(EngineConfig::default())
        .with_session(&session)
        .run(&source, &matrix, &land_cover_classes(), "users/me/parcels_out")
        .unwrap();
    assert_eq!(result.output_column.as_deref(), Some("reclass"));

    let Output::Job(job) = result.output else {
        panic!("remote runs return a job");
    };
    let mut polls = Vec::new();
    wait_for_job(&session, &job, quick(), |s| polls.push(s.clone())).unwrap();
    assert_eq!(polls.last(), Some(&JobStatus::Completed));

    let rows = session.table_rows("users/me/parcels_out").unwrap();
    let codes: Vec<_> = rows.iter().map(|r| r["reclass"].clone()).collect();
    assert_eq!(codes, vec![json!(1), json!(2), json!(0), json!(2)]);
    assert!(rows.iter().all(|r| r.contains_key("crop")));
}

#[test]
fn test_backend_outage_leaves_no_job() {
    let session = backend();
    let source = describe("users/me/landcover", "classification", Some(&session)).unwrap();
    session.set_offline(true);

    let matrix = Matrix::from_buckets(vec![(10, vec![1i64])], 0);
    let err = ReclassifyExecutor::new(EngineConfig::default())
        .with_session(&session)
        .run(&source, &matrix, &land_cover_classes(), "users/me/out")
        .unwrap_err();
    assert_eq!(err.stage, Stage::Transform);
    assert!(matches!(err.error, Error::BackendUnavailable(_)));

    session.set_offline(false);
    assert!(session.exports().is_empty());
    assert!(session.list_assets("users/me").unwrap().iter().all(|id| id != "users/me/out"));
}

#[test]
fn test_failed_export_is_reported_by_wait() {
    let session = backend();
    session.fail_next_export("Computation timed out");
    let source = describe("users/me/parcels", "crop", Some(&session)).unwrap();
    let matrix = Matrix::from_buckets(vec![(1, vec!["A"])], 0);
    let result = ReclassifyExecutor::new(EngineConfig::default())
        .with_session(&session)
        .run(&source, &matrix, &land_cover_classes(), "users/me/parcels_out")
        .unwrap();
    let Output::Job(job) = result.output else {
        panic!("remote runs return a job");
    };
    let err = wait_for_job(&session, &job, quick(), |_| {}).unwrap_err();
    assert!(err.to_string().contains("Computation timed out"));
    assert!(!session.contains("users/me/parcels_out"));
}
