//! Parse-failure retry and the two response modes.

mod common;

use common::ScriptedTransport;
use serde_json::json;
use storedproc::{Adapter, AdapterConfig, AdapterError};

const DEBUG_PAGE: &str = "<html><pre>NOTE: ok.\n\u{feff}--h54s-data-start--{\"rows\": [{\"name\": \"a%20b\"}], \"logmessage\": \"ran%20fine\"}--h54s-data-end--\n</pre></html>";

fn adapter(config: AdapterConfig) -> (Adapter<ScriptedTransport>, ScriptedTransport) {
    let transport = ScriptedTransport::new();
    (Adapter::new(config, transport.clone()), transport)
}

#[tokio::test]
async fn test_production_gives_up_after_five_retries() {
    let (adapter, transport) = adapter(AdapterConfig::default());
    for _ in 0..6 {
        transport.respond("{truncated");
    }

    let err = adapter.call("/Apps/report").await.unwrap_err();
    assert!(matches!(err, AdapterError::Parse(_)));
    assert_eq!(err.kind(), "parseError");
    // One call plus five retries
    assert_eq!(transport.request_count(), 6);
}

#[tokio::test]
async fn test_production_recovers_on_retry() {
    let (adapter, transport) = adapter(AdapterConfig::default());
    transport
        .respond("<html>")
        .respond("{\"ok\": tr")
        .respond(r#"{"ok": true}"#);

    let value = adapter.call("/Apps/report").await.unwrap();
    assert_eq!(value, json!({"ok": true}));
    assert_eq!(transport.request_count(), 3);
}

#[tokio::test]
async fn test_retry_bound_is_configurable() {
    let (adapter, transport) = adapter(AdapterConfig {
        max_retries: 0,
        ..AdapterConfig::default()
    });
    transport.respond("nope").respond(r#"{"ok": true}"#);

    assert!(adapter.call("/Apps/report").await.is_err());
    assert_eq!(transport.request_count(), 1);
    assert_eq!(transport.remaining(), 1);
}

#[tokio::test]
async fn test_debug_failure_is_not_retried_and_keeps_diagnostics() {
    let (adapter, transport) = adapter(AdapterConfig {
        debug: true,
        ..AdapterConfig::default()
    });
    transport.respond(
        "<html><p>NOTE: starting.</p>\n<p>ERROR: File WORK.SALES.DATA does not exist.</p></html>",
    );

    let err = adapter.call("/Apps/report").await.unwrap_err();
    assert!(matches!(err, AdapterError::Parse(_)));
    assert_eq!(transport.request_count(), 1);
    assert_eq!(transport.requests()[0].value("_debug"), Some("131"));
    assert_eq!(
        adapter.diagnostic_errors(),
        vec!["ERROR: File WORK.SALES.DATA does not exist.".to_string()]
    );
}

#[tokio::test]
async fn test_debug_retry_opt_in() {
    let (adapter, transport) = adapter(AdapterConfig {
        debug: true,
        retry_in_debug: true,
        ..AdapterConfig::default()
    });
    transport.respond("<html>no markers</html>").respond(DEBUG_PAGE);

    let value = adapter.call("/Apps/report").await.unwrap();
    assert_eq!(value["rows"][0]["name"], "a b");
    assert_eq!(transport.request_count(), 2);
}

#[tokio::test]
async fn test_debug_payload_decoded() {
    let (adapter, transport) = adapter(AdapterConfig {
        debug: true,
        ..AdapterConfig::default()
    });
    transport.respond(DEBUG_PAGE);

    let value = adapter.call("/Apps/report").await.unwrap();
    assert_eq!(
        value,
        json!({"rows": [{"name": "a b"}], "logmessage": "ran fine"})
    );
    assert_eq!(adapter.application_logs()[0].message, "ran fine");
    assert!(adapter.diagnostic_errors().is_empty());
}

#[tokio::test]
async fn test_diagnostics_replaced_by_clean_response() {
    let (adapter, transport) = adapter(AdapterConfig::default());
    transport
        .respond("ERROR: Something broke.")
        .respond(r#"{"ok": true}"#);

    adapter.call("/Apps/report").await.unwrap();
    assert!(adapter.diagnostic_errors().is_empty());
}
