#![allow(clippy::unwrap_used)]
// End-to-end tests for the `Nest` facade against a wiremock server.

use std::sync::{Arc, Mutex};

use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use url::Url;
use wiremock::matchers::{body_string, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use nestly_core::{CoreError, Nest, NestConfig, SignalKind};

// ── Helpers ─────────────────────────────────────────────────────────

fn nest_for(server: &MockServer) -> Nest {
    let root = Url::parse(&server.uri()).unwrap();
    let token_url = root.join("/oauth2/access_token").unwrap();
    let config = NestConfig::production()
        .unwrap()
        .with_endpoints(root, token_url);
    Nest::new(config).unwrap()
}

async fn setup() -> (MockServer, Nest) {
    let server = MockServer::start().await;
    let nest = nest_for(&server);
    nest.set_token("c.test-token").unwrap();
    (server, nest)
}

fn sse(events: &[(&str, Value)]) -> String {
    events
        .iter()
        .map(|(kind, data)| format!("event: {kind}\ndata: {data}\n\n"))
        .collect()
}

fn first_put() -> Value {
    json!({
        "path": "/",
        "data": {
            "devices": {
                "thermostats": {
                    "A": { "device_id": "A", "name": "Hallway", "target_temperature_f": 70, "locale": "en-US" },
                    "B": { "device_id": "B", "name": "Den", "target_temperature_f": 68 }
                }
            },
            "structures": {
                "home": { "name": "Home", "away": "home" }
            }
        }
    })
}

fn second_put() -> Value {
    json!({
        "path": "/",
        "data": {
            "devices": {
                "thermostats": {
                    "A": { "device_id": "A", "target_temperature_f": 72 }
                }
            },
            "structures": {
                "home": { "name": "Home", "away": "away" }
            }
        }
    })
}

async fn mount_stream(server: &MockServer, body: String) {
    Mock::given(method("GET"))
        .and(path("/"))
        .and(header("accept", "text/event-stream"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .mount(server)
        .await;
}

fn record_signals(nest: &Nest) -> Arc<Mutex<Vec<String>>> {
    let log = Arc::new(Mutex::new(Vec::new()));
    for kind in [SignalKind::Hydrated, SignalKind::Update, SignalKind::StreamClosed] {
        let log = Arc::clone(&log);
        nest.subscribe(kind, move |signal| {
            log.lock().unwrap().push(signal.kind().to_string());
        });
    }
    log
}

// ── Stream → store ──────────────────────────────────────────────────

#[tokio::test]
async fn test_hydrate_update_then_closed() {
    let (server, nest) = setup().await;
    mount_stream(
        &server,
        sse(&[
            ("put", first_put()),
            ("keep-alive", Value::Null),
            ("put", second_put()),
        ]),
    )
    .await;

    let log = record_signals(&nest);
    nest.start_stream().await.unwrap();

    assert_eq!(
        *log.lock().unwrap(),
        vec!["hydrated", "update", "stream_closed"]
    );

    let store = nest.store();
    assert!(store.is_hydrated());
    assert_eq!(store.device_count(), 1);

    let hallway = store.device_by_id("A").unwrap();
    assert_eq!(hallway.get("target_temperature_f"), Some(&json!(72)));
    assert_eq!(hallway.name(), Some("Hallway"));
    assert_eq!(hallway.device_type(), Some("thermostats"));
    assert!(store.device_by_id("B").is_none());
    assert_eq!(store.structure_by_id("home").unwrap().away(), Some("away"));
    assert!(!nest.is_streaming());
}

#[tokio::test]
async fn test_hydrated_snapshot_is_detached() {
    let (server, nest) = setup().await;
    mount_stream(&server, sse(&[("put", first_put()), ("put", second_put())])).await;

    let hydrated = Arc::new(Mutex::new(None));
    let slot = Arc::clone(&hydrated);
    nest.subscribe(SignalKind::Hydrated, move |signal| {
        *slot.lock().unwrap() = signal.snapshot().cloned();
    });

    nest.start_stream().await.unwrap();

    let snapshot = hydrated.lock().unwrap().clone().unwrap();
    assert_eq!(snapshot.device_count(), 2);
    assert_eq!(
        snapshot.device_by_id("A").unwrap().get("target_temperature_f"),
        Some(&json!(70))
    );
}

#[tokio::test]
async fn test_auth_revoked_clears_token() {
    let (server, nest) = setup().await;
    mount_stream(
        &server,
        sse(&[("put", first_put()), ("auth_revoked", json!("c.test-token"))]),
    )
    .await;

    nest.start_stream().await.unwrap();

    assert!(!nest.has_token());
    assert!(nest.store().is_hydrated());
    let restart = nest.start_stream().await;
    assert!(matches!(restart, Err(CoreError::NoToken)), "got {restart:?}");
}

#[tokio::test]
async fn test_stream_unauthorized() {
    let (server, nest) = setup().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let result = nest.start_stream().await;
    assert!(
        matches!(result, Err(CoreError::AuthenticationFailed { .. })),
        "got {result:?}"
    );
    assert!(!nest.has_token());
    assert!(!nest.store().is_hydrated());
}

// ── Mutations ───────────────────────────────────────────────────────

#[tokio::test]
async fn test_set_device_field_resolves_type() {
    let (server, nest) = setup().await;
    mount_stream(&server, sse(&[("put", first_put())])).await;

    Mock::given(method("PUT"))
        .and(path("/devices/thermostats/B/target_temperature_f"))
        .and(body_string("66"))
        .respond_with(ResponseTemplate::new(200).set_body_string("66"))
        .expect(1)
        .mount(&server)
        .await;

    nest.start_stream().await.unwrap();
    let body = nest
        .set_device_field("B", "target_temperature_f", &json!(66))
        .await
        .unwrap();
    assert_eq!(body, "66");
}

#[tokio::test]
async fn test_set_device_field_unknown_device() {
    let (_server, nest) = setup().await;

    let result = nest
        .set_device_field("ghost", "target_temperature_f", &json!(66))
        .await;
    assert!(
        matches!(result, Err(CoreError::DeviceNotFound { ref identifier }) if identifier == "ghost"),
        "got {result:?}"
    );
}

#[tokio::test]
async fn test_mutation_rejection_is_translated() {
    let (server, nest) = setup().await;
    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": "Cannot change target temperature while in away mode"
        })))
        .mount(&server)
        .await;

    let target = nestly_core::EntityRef::new("thermostats", "A");
    match nest.mutate(&target, "target_temperature_f", &json!(71)).await {
        Err(CoreError::ValidationFailed { message }) => {
            assert_eq!(message, "Cannot change target temperature while in away mode");
        }
        other => panic!("expected ValidationFailed, got {other:?}"),
    }
}

// ── Authorization ───────────────────────────────────────────────────

#[tokio::test]
async fn test_authorize_then_stream_with_new_token() {
    let server = MockServer::start().await;
    let nest = nest_for(&server);

    Mock::given(method("POST"))
        .and(path("/oauth2/access_token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "c.fresh",
            "expires_in": 315_360_000
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/"))
        .and(header("authorization", "Bearer c.fresh"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(sse(&[("put", first_put())]), "text/event-stream"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let secret = secrecy::SecretString::from("product-secret".to_string());
    nest.authorize("PIN123", "client-1", &secret).await.unwrap();
    assert!(nest.has_token());

    nest.start_stream().await.unwrap();
    assert_eq!(nest.store().device_count(), 2);
}
