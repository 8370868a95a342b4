//! Integration tests for the remote session implementations.
//!
//! Tests marked `#[ignore]` require network access and a live compute
//! endpoint in `GEOCLASS_ENDPOINT` (with `GEOCLASS_TOKEN` and
//! `GEOCLASS_TEST_ASSET` as needed).
//! Run with: `cargo test -p geoclass-cloud -- --ignored`

use std::time::Duration;

use geoclass_cloud::auth::{self, CloudAuth};
use geoclass_cloud::http::HttpClient;
use geoclass_cloud::{
    unique_asset_id, AssetKind, ExportOptions, InMemorySession, JobStatus, LookupExpression, RestSession,
    SessionOptions, SessionProvider,
};
use geoclass_core::SourceValue;
use serde_json::json;

fn auth_from_env() -> Box<dyn CloudAuth> {
    auth::from_token(std::env::var("GEOCLASS_TOKEN").ok().as_deref())
}

fn parcels() -> InMemorySession {
    let session = InMemorySession::new();
    let rows = [("A", 10.0), ("B", 2.5), ("C", 7.0), ("B", 1.0)]
        .iter()
        .map(|(crop, area)| {
            json!({"crop": crop, "area": area})
                .as_object()
                .cloned()
                .unwrap_or_default()
        })
        .collect();
    session.add_table("users/me/parcels", rows);
    session
}

#[test]
fn test_table_round_trip_through_session_trait() {
    let session = parcels();
    let provider: &dyn SessionProvider = &session;

    assert_eq!(provider.asset_kind("users/me/parcels").unwrap(), AssetKind::Table);

    let values = provider.enumerate_remote("users/me/parcels", "crop").unwrap();
    let values: Vec<SourceValue> = values.into_iter().collect();
    let expected: Vec<SourceValue> = vec!["A".into(), "B".into(), "C".into()];
    assert_eq!(values, expected);

    let expr = LookupExpression {
        output_column: "reclass".into(),
        from: vec!["A".into(), "B".into(), "C".into()],
        to: vec![1, 2, 2],
        default_value: 0,
    };
    let handle = provider.map_remote_collection("users/me/parcels", "crop", &expr).unwrap();

    let destination = unique_asset_id(provider, "users/me", "parcels").unwrap();
    assert_eq!(destination, "users/me/parcels_reclass");
    let job = provider
        .export(&handle, &destination, &ExportOptions::table("parcels_reclass"))
        .unwrap();

    let mut status = provider.job_status(&job).unwrap();
    while !status.is_terminal() {
        status = provider.job_status(&job).unwrap();
    }
    assert_eq!(status, JobStatus::Completed);

    let rows = session.table_rows(&destination).unwrap();
    let distinct: std::collections::BTreeSet<i64> =
        rows.iter().filter_map(|r| r["reclass"].as_i64()).collect();
    assert_eq!(distinct.len(), 2);
    assert_eq!(unique_asset_id(provider, "users/me", "parcels").unwrap(), "users/me/parcels_reclass_1");
}

#[test]
fn test_image_properties_survive_export() {
    let session = InMemorySession::new();
    session.add_image("users/me/lc", vec![("landcover", vec![1, 2, 3])], Some(10.0));

    let remapped = session
        .remap_remote_image("users/me/lc", "landcover", &[1, 2, 3], &[5, 5, 6], 0)
        .unwrap();
    let mut props = serde_json::Map::new();
    props.insert("visualization_0_type".into(), json!("categorical"));
    let styled = session.set_image_properties(&remapped, &props).unwrap();
    assert_eq!(styled.nominal_scale, Some(10.0));

    let job = session
        .export(&styled, "users/me/lc_reclass", &ExportOptions::categorical_image("lc_reclass", Some(10.0)))
        .unwrap();
    session.job_status(&job).unwrap();
    session.job_status(&job).unwrap();

    let stored = session.image_properties("users/me/lc_reclass").unwrap();
    assert_eq!(stored["visualization_0_type"], "categorical");
}

#[tokio::test]
#[ignore]
async fn test_live_asset_lookup_async() {
    let endpoint = std::env::var("GEOCLASS_ENDPOINT").expect("GEOCLASS_ENDPOINT not set");
    let asset = std::env::var("GEOCLASS_TEST_ASSET").expect("GEOCLASS_TEST_ASSET not set");

    let client = HttpClient::new(Duration::from_secs(30), 3).expect("client");
    let auth = auth_from_env();
    let url = format!("{}/assets/{}", endpoint.trim_end_matches('/'), asset);
    let info: serde_json::Value = client.get_json(&url, auth.as_ref()).await.expect("asset lookup");
    println!("asset info: {info}");
    assert!(info.get("type").is_some());
}

#[test]
#[ignore]
fn test_live_enumeration() {
    let endpoint = std::env::var("GEOCLASS_ENDPOINT").expect("GEOCLASS_ENDPOINT not set");
    let asset = std::env::var("GEOCLASS_TEST_ASSET").expect("GEOCLASS_TEST_ASSET not set");

    let session = RestSession::new(endpoint, auth_from_env(), SessionOptions::default()).expect("session");
    let kind = session.asset_kind(&asset).expect("asset kind");
    let bands = session.list_bands(&asset).expect("bands");
    println!("{asset}: {kind} with {bands:?}");
    assert!(!bands.is_empty());

    let values = session.enumerate_remote(&asset, &bands[0]).expect("enumerate");
    println!("{} distinct values", values.len());
}
