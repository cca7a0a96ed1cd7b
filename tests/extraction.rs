use std::time::{Duration, Instant};

use cookierelay::config::{ExtractConfig, StorePaths, StoreVariant};
use cookierelay::crypto;
use cookierelay::delivery::DeliveryClient;
use cookierelay::error::RelayError;
use cookierelay::pipeline::run_extraction;
use cookierelay::store::CookieSet;
use rusqlite::Connection;
use std::path::Path;
use tempfile::tempdir;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const KEY_SECRET: &str = "0123456789abcdef0123456789abcdef";

fn test_paths(root: &Path) -> StorePaths {
    StorePaths {
        chromium_db: root.join("google-chrome/Default/Cookies"),
        gecko_fixed_profile: root.join("firefox/session.default"),
        gecko_profiles_root: root.join("firefox"),
    }
}

fn extract_config(root: &Path, api_url: String) -> ExtractConfig {
    ExtractConfig {
        target_domain: "example.com".to_string(),
        session_id: "sess-1".to_string(),
        api_url,
        secret: "topsecret".to_string(),
        encryption_key: KEY_SECRET.to_string(),
        variant: StoreVariant::Chromium,
        profile: None,
        paths: test_paths(root),
        timeout: Duration::from_secs(30),
        poll_interval: Duration::from_millis(100),
        gateway: "172.17.0.1".to_string(),
    }
}

fn create_chromium_db(db_path: &Path) {
    std::fs::create_dir_all(db_path.parent().expect("parent")).expect("mkdir");
    let conn = Connection::open(db_path).expect("open db");
    conn.execute(
        "CREATE TABLE cookies (
            host_key TEXT, name TEXT, value TEXT, path TEXT,
            expires_utc INTEGER, is_secure INTEGER, is_httponly INTEGER
        )",
        [],
    )
    .expect("create cookies");
    conn.execute(
        "INSERT INTO cookies VALUES ('example.com', 'sid', 'abc', '/', 0, 1, 1)",
        [],
    )
    .expect("insert cookie");
}

#[tokio::test]
async fn extraction_delivers_decryptable_payload() {
    let dir = tempdir().expect("tempdir");
    let paths = test_paths(dir.path());
    create_chromium_db(&paths.chromium_db);

    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/session/sess-1/cookies"))
        .and(header("x-python-script-auth", "topsecret"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let config = extract_config(dir.path(), server.uri());
    run_extraction(&config).await.expect("extraction");

    let requests = server.received_requests().await.expect("requests");
    assert_eq!(requests.len(), 1);
    let body: serde_json::Value = serde_json::from_slice(&requests[0].body).expect("json body");
    let token = body["encryptedCookies"].as_str().expect("token");

    let key = crypto::derive_key(KEY_SECRET);
    let plaintext = crypto::decrypt(token, &key).expect("decrypt");
    let cookies: CookieSet = serde_json::from_slice(&plaintext).expect("cookie set");
    assert_eq!(cookies.len(), 1);
    assert_eq!(cookies[0].name, "sid");
    assert_eq!(cookies[0].domain, "example.com");
    assert!(cookies[0].secure);
    assert!(cookies[0].http_only);
}

#[tokio::test]
async fn extraction_retries_until_timeout_on_rejected_delivery() {
    let dir = tempdir().expect("tempdir");
    let paths = test_paths(dir.path());
    create_chromium_db(&paths.chromium_db);

    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/session/sess-1/cookies"))
        .respond_with(ResponseTemplate::new(500))
        .expect(2..)
        .mount(&server)
        .await;

    let mut config = extract_config(dir.path(), server.uri());
    config.timeout = Duration::from_millis(800);
    config.poll_interval = Duration::from_millis(150);

    let err = run_extraction(&config).await.expect_err("timeout");
    assert!(matches!(err, RelayError::Timeout));
}

#[tokio::test]
async fn extraction_times_out_without_delivering_when_store_is_empty() {
    let dir = tempdir().expect("tempdir");

    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let mut config = extract_config(dir.path(), server.uri());
    config.timeout = Duration::from_millis(500);
    config.poll_interval = Duration::from_millis(100);

    let started = Instant::now();
    let err = run_extraction(&config).await.expect_err("timeout");
    assert!(matches!(err, RelayError::Timeout));
    assert!(started.elapsed() >= Duration::from_millis(500));
}

#[tokio::test]
async fn deliver_succeeds_only_on_http_200() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/session/ok/cookies"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/session/nope/cookies"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    let client = DeliveryClient::new(&server.uri(), "172.17.0.1").expect("client");
    assert!(client.deliver("ok", "s", "token").await);
    assert!(!client.deliver("nope", "s", "token").await);
}

#[tokio::test]
async fn deliver_reports_transport_failure_as_retryable() {
    // nothing listens on the discard port
    let client = DeliveryClient::new("http://127.0.0.1:9", "172.17.0.1").expect("client");
    assert!(!client.deliver("sess", "s", "token").await);
}
