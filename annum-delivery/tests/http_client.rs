//! End-to-end coverage for [`HttpDeliveryClient`] against a real bound HTTP
//! server, exercising the classifier and intra-call retry over the actual
//! network path rather than through the mock.

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};
use std::time::Duration;

use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use serde::Deserialize;

use annum_delivery::{DeliveryClient, DeliveryConfig, DeliveryError, HttpDeliveryClient};

#[derive(Debug, Deserialize)]
struct SendEmailBody {
    #[allow(dead_code)]
    email: String,
    #[allow(dead_code)]
    message: String,
}

/// Scripted server: returns `responses[n]` on the `n`th call, repeating the
/// last entry once exhausted.
struct ScriptedServer {
    base_url: String,
    call_count: Arc<AtomicUsize>,
}

async fn start_scripted_server(responses: Vec<u16>) -> ScriptedServer {
    let call_count = Arc::new(AtomicUsize::new(0));
    let responses = Arc::new(responses);

    let state = (Arc::clone(&call_count), Arc::clone(&responses));

    async fn handler(
        State((call_count, responses)): State<(Arc<AtomicUsize>, Arc<Vec<u16>>)>,
        Json(_body): Json<SendEmailBody>,
    ) -> StatusCode {
        let n = call_count.fetch_add(1, Ordering::SeqCst);
        let status = responses
            .get(n)
            .copied()
            .unwrap_or_else(|| *responses.last().unwrap_or(&200));
        StatusCode::from_u16(status).unwrap()
    }

    let router = Router::new()
        .route("/send-email", post(handler))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    ScriptedServer {
        base_url: format!("http://{addr}"),
        call_count,
    }
}

fn client_for(base_url: String) -> HttpDeliveryClient {
    HttpDeliveryClient::new(DeliveryConfig {
        email_service_url: base_url,
        timeout: Duration::from_secs(2),
        max_retries: 3,
        retry_base_delay: Duration::from_millis(5),
        circuit_breaker_threshold: 5,
        circuit_breaker_reset: Duration::from_millis(50),
    })
    .unwrap()
}

#[tokio::test]
async fn success_on_first_attempt() {
    let server = start_scripted_server(vec![200]).await;
    let client = client_for(server.base_url);

    let result = client.send("jane@example.com", "hi").await;
    assert!(result.is_ok());
    assert_eq!(server.call_count.load(Ordering::SeqCst), 1);
}

/// Scenario 3: delivery returns 500, 500, 200 across three attempts within
/// one invocation — the call ultimately succeeds.
#[tokio::test]
async fn retries_transient_failures_then_succeeds() {
    let server = start_scripted_server(vec![500, 500, 200]).await;
    let client = client_for(server.base_url);

    let result = client.send("jane@example.com", "hi").await;
    assert!(result.is_ok(), "expected eventual success, got {result:?}");
    assert_eq!(server.call_count.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn terminal_4xx_is_not_retried() {
    let server = start_scripted_server(vec![400, 200]).await;
    let client = client_for(server.base_url);

    let result = client.send("jane@example.com", "hi").await;
    assert!(matches!(result, Err(DeliveryError::Terminal(_))));
    assert_eq!(
        server.call_count.load(Ordering::SeqCst),
        1,
        "a terminal 4xx must not be retried"
    );
}

#[tokio::test]
async fn retryable_statuses_exhaust_the_budget() {
    // max_retries = 3 -> 4 total attempts, all failing.
    let server = start_scripted_server(vec![503, 503, 503, 503]).await;
    let client = client_for(server.base_url);

    let result = client.send("jane@example.com", "hi").await;
    assert!(matches!(result, Err(DeliveryError::Retryable(_))));
    assert_eq!(server.call_count.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn circuit_breaker_opens_after_threshold_and_skips_the_network() {
    let server = start_scripted_server(vec![500]).await;
    let client = HttpDeliveryClient::new(DeliveryConfig {
        email_service_url: server.base_url,
        timeout: Duration::from_secs(2),
        max_retries: 0,
        retry_base_delay: Duration::from_millis(1),
        circuit_breaker_threshold: 3,
        circuit_breaker_reset: Duration::from_secs(60),
    })
    .unwrap();

    for _ in 0..3 {
        let _ = client.send("jane@example.com", "hi").await;
    }
    assert_eq!(server.call_count.load(Ordering::SeqCst), 3);

    let result = client.send("jane@example.com", "hi").await;
    assert!(matches!(result, Err(DeliveryError::CircuitOpen)));
    assert_eq!(
        server.call_count.load(Ordering::SeqCst),
        3,
        "the fourth call must short-circuit without touching the network"
    );
}
