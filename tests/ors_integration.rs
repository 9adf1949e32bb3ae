//! `OrsMatrixClient` against a real HTTP server.
//!
//! Runs MockServer in a container and scripts matrix responses through its
//! expectation API. Requires Docker: `cargo test -- --ignored`.

use std::time::Duration;

use serde_json::{json, Value};
use testcontainers::core::{IntoContainerPort, WaitFor};
use testcontainers::runners::SyncRunner;
use testcontainers::{Container, GenericImage, ImageExt, TestcontainersError};

use matrix_batch::config::{Credentials, RunOptions};
use matrix_batch::coordinate::Coord;
use matrix_batch::events::RecordingObserver;
use matrix_batch::matrix::{IndexMode, MatrixRequest};
use matrix_batch::ors::OrsMatrixClient;
use matrix_batch::pipeline::MatrixPipeline;
use matrix_batch::sink::MemorySink;
use matrix_batch::table::{RowTable, TableSchema};
use matrix_batch::traits::MatrixTransport;

const MATRIX_PATH: &str = "/v2/matrix/driving-car";
const API_KEY: &str = "integration-key";

fn mockserver_container() -> Result<(Container<GenericImage>, String), TestcontainersError> {
    let image = GenericImage::new("mockserver/mockserver", "5.15.0")
        .with_exposed_port(1080.tcp())
        .with_wait_for(WaitFor::message_on_stdout("started on port"))
        .with_startup_timeout(Duration::from_secs(60));

    let container = image.start()?;
    let port = container.get_host_port_ipv4(1080.tcp())?;
    let base_url = format!("http://127.0.0.1:{}", port);

    Ok((container, base_url))
}

/// Register a response for authorised POSTs to the matrix path.
fn expect(base_url: &str, status: u16, body: Value, times: Option<u32>) {
    let mut expectation = json!({
        "httpRequest": {
            "method": "POST",
            "path": MATRIX_PATH,
            "headers": { "Authorization": [API_KEY] }
        },
        "httpResponse": {
            "statusCode": status,
            "headers": { "Content-Type": ["application/json"] },
            "body": { "type": "JSON", "json": body }
        }
    });
    if let Some(remaining) = times {
        expectation["times"] = json!({ "remainingTimes": remaining, "unlimited": false });
    }

    reqwest::blocking::Client::new()
        .put(format!("{}/mockserver/expectation", base_url))
        .json(&expectation)
        .send()
        .and_then(|resp| resp.error_for_status())
        .expect("register expectation");
}

#[test]
#[ignore = "requires Docker"]
fn test_client_retries_through_server_errors() {
    let (container, base_url) = mockserver_container().expect("start MockServer container");

    // Expectations match in creation order: one failure, then success.
    expect(&base_url, 503, json!({"error": "busy"}), Some(1));
    expect(&base_url, 200, json!({"distances": [[0.0, 215300.0, null]]}), None);

    let credentials = Credentials::new(API_KEY, format!("{}{}", base_url, MATRIX_PATH));
    let options = RunOptions {
        backoff_unit: Duration::from_millis(10),
        inter_request_delay: Duration::ZERO,
        ..RunOptions::default()
    };
    let client = OrsMatrixClient::new(credentials, options.request_timeout).expect("build client");

    let input = "\
Origin,Long|Lat,Destino,Longitude,Latitude
Ulm,\"9,70093|48,477473\",Heilbronn,9.207916,49.153868
Ulm,\"9,70093|48,477473\",Moscow,37.573242,55.801281
";
    let mut table = RowTable::from_csv_reader(input.as_bytes(), &TableSchema::default())
        .expect("load table");
    let observer = RecordingObserver::new();
    let mut pipeline = MatrixPipeline::new(options, &client, MemorySink::new(), &observer);

    let report = pipeline.run(&mut table).expect("run completes");

    assert_eq!(report.resolved, 1);
    assert_eq!(table.rows()[0].distance_km, Some(215.3));
    assert_eq!(table.rows()[1].distance_km, None);

    drop(container);
}

#[test]
#[ignore = "requires Docker"]
fn test_client_reports_rate_limit_status() {
    let (container, base_url) = mockserver_container().expect("start MockServer container");
    expect(&base_url, 429, json!({"error": "Quota exceeded"}), None);

    let credentials = Credentials::new(API_KEY, format!("{}{}", base_url, MATRIX_PATH));
    let client = OrsMatrixClient::new(credentials, Duration::from_secs(10)).expect("build client");
    let request = MatrixRequest::new(
        Coord::new(9.70093, 48.477473),
        &[Coord::new(9.207916, 49.153868)],
        IndexMode::Implicit,
    );

    let err = client.send(&request).expect_err("429 is an error");

    assert!(err.is_retryable());
    assert!(err.is_rate_limited());
    assert!(err.to_string().contains("Quota exceeded"), "{}", err);

    drop(container);
}
