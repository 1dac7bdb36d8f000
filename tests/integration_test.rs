//! Integration tests for hubproxy
//!
//! These tests verify server startup, the health endpoint, user-agent
//! screening, the synthetic landing page and the configured document-root
//! behaviors. Everything runs against loopback; no upstream traffic.

use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use hubproxy::{start_server, Config};
use std::time::Duration;
use tokio::time::sleep;

// Initialize tracing for tests
fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

fn test_config(port: u16) -> Config {
    let mut config = Config::default();
    config.server.bind_address = "127.0.0.1".to_string();
    config.server.port = port;
    config
}

fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap()
}

/// Test server startup and health endpoint
#[tokio::test]
async fn test_server_startup_and_health() {
    init_test_tracing();
    let config = test_config(5091);

    let _server_handle = start_server(config)
        .await
        .expect("Failed to start hubproxy server");
    sleep(Duration::from_secs(1)).await;

    let response = client()
        .get("http://127.0.0.1:5091/health")
        .timeout(Duration::from_secs(5))
        .send()
        .await
        .expect("Failed to send health check request");

    assert_eq!(response.status(), reqwest::StatusCode::OK);
    assert_eq!(response.text().await.unwrap(), "ok");
}

/// Blocked user agents get the camouflage page on any path
#[tokio::test]
async fn test_blocked_user_agent_gets_camouflage_page() {
    init_test_tracing();
    let config = test_config(5092);

    let _server_handle = start_server(config)
        .await
        .expect("Failed to start hubproxy server");
    sleep(Duration::from_secs(1)).await;

    let response = client()
        .get("http://127.0.0.1:5092/v2/library/nginx/manifests/latest")
        .header("User-Agent", "Mozilla/5.0 (compatible; Netcraft Survey)")
        .timeout(Duration::from_secs(5))
        .send()
        .await
        .expect("Failed to send blocked-agent request");

    assert_eq!(response.status(), reqwest::StatusCode::OK);
    let body = response.text().await.unwrap();
    assert!(body.contains("Welcome to nginx!"));
}

/// Browsers hitting the document root get the landing page when no explicit
/// root behavior is configured
#[tokio::test]
async fn test_browser_root_gets_search_page() {
    init_test_tracing();
    let config = test_config(5093);

    let _server_handle = start_server(config)
        .await
        .expect("Failed to start hubproxy server");
    sleep(Duration::from_secs(1)).await;

    let response = client()
        .get("http://127.0.0.1:5093/")
        .header(
            "User-Agent",
            "Mozilla/5.0 (X11; Linux x86_64) Gecko/20100101 Firefox/128.0",
        )
        .timeout(Duration::from_secs(5))
        .send()
        .await
        .expect("Failed to send browser root request");

    assert_eq!(response.status(), reqwest::StatusCode::OK);
    assert!(response
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .map(|v| v.starts_with("text/html"))
        .unwrap_or(false));
    let body = response.text().await.unwrap();
    assert!(body.contains("performSearch"));
}

/// A configured redirect target turns the document root into a 302
#[tokio::test]
async fn test_configured_root_redirect() {
    init_test_tracing();
    let mut config = test_config(5094);
    config.root_redirect_url = Some("https://example.com/landing".to_string());

    let _server_handle = start_server(config)
        .await
        .expect("Failed to start hubproxy server");
    sleep(Duration::from_secs(1)).await;

    let response = client()
        .get("http://127.0.0.1:5094/")
        .header("User-Agent", "Mozilla/5.0 (X11; Linux x86_64)")
        .timeout(Duration::from_secs(5))
        .send()
        .await
        .expect("Failed to send root request");

    assert_eq!(response.status(), reqwest::StatusCode::FOUND);
    assert_eq!(
        response
            .headers()
            .get("location")
            .and_then(|v| v.to_str().ok()),
        Some("https://example.com/landing")
    );
}

/// The `nginx` keyword as root override serves the camouflage page
#[tokio::test]
async fn test_configured_root_override_nginx_keyword() {
    init_test_tracing();
    let mut config = test_config(5095);
    config.root_upstream_url = Some("nginx".to_string());

    let _server_handle = start_server(config)
        .await
        .expect("Failed to start hubproxy server");
    sleep(Duration::from_secs(1)).await;

    let response = client()
        .get("http://127.0.0.1:5095/")
        .header("User-Agent", "Mozilla/5.0 (X11; Linux x86_64)")
        .timeout(Duration::from_secs(5))
        .send()
        .await
        .expect("Failed to send root request");

    assert_eq!(response.status(), reqwest::StatusCode::OK);
    let body = response.text().await.unwrap();
    assert!(body.contains("Welcome to nginx!"));
}

/// A root override URL is relayed with redirects followed, so the browser
/// sees the final page rather than the intermediate 302
#[tokio::test]
async fn test_configured_root_override_follows_redirects() {
    init_test_tracing();

    // Mock override target on loopback: /entry redirects to /landing
    let upstream = Router::new()
        .route(
            "/entry",
            get(|| async {
                (StatusCode::FOUND, [(header::LOCATION, "/landing")], "").into_response()
            }),
        )
        .route("/landing", get(|| async { "landing body" }));
    let listener = tokio::net::TcpListener::bind(("127.0.0.1", 5098))
        .await
        .expect("Failed to bind mock upstream");
    tokio::spawn(async move {
        axum::serve(listener, upstream)
            .await
            .expect("Mock upstream failed");
    });

    let mut config = test_config(5097);
    config.root_upstream_url = Some("http://127.0.0.1:5098/entry".to_string());

    let _server_handle = start_server(config)
        .await
        .expect("Failed to start hubproxy server");
    sleep(Duration::from_secs(1)).await;

    let response = client()
        .get("http://127.0.0.1:5097/")
        .header("User-Agent", "Mozilla/5.0 (X11; Linux x86_64)")
        .timeout(Duration::from_secs(5))
        .send()
        .await
        .expect("Failed to send root request");

    assert_eq!(response.status(), reqwest::StatusCode::OK);
    assert_eq!(response.text().await.unwrap(), "landing body");
}

/// Non-browser requests to non-root paths never get HTML pages; the UA
/// blocklist is the only screen before proxying. Extended blocklist entries
/// added via configuration are honored.
#[tokio::test]
async fn test_extended_blocklist_entry() {
    init_test_tracing();
    let mut config = test_config(5096);
    config.blocked_user_agents.push("badbot".to_string());

    let _server_handle = start_server(config)
        .await
        .expect("Failed to start hubproxy server");
    sleep(Duration::from_secs(1)).await;

    let response = client()
        .get("http://127.0.0.1:5096/v2/")
        .header("User-Agent", "BadBot/2.1")
        .timeout(Duration::from_secs(5))
        .send()
        .await
        .expect("Failed to send blocked-agent request");

    assert_eq!(response.status(), reqwest::StatusCode::OK);
    let body = response.text().await.unwrap();
    assert!(body.contains("Welcome to nginx!"));
}
