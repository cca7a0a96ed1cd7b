use assert_cmd::cargo::cargo_bin_cmd;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use rusqlite::Connection;
use std::path::Path;
use tempfile::tempdir;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const COOKIES_JSON: &str = r#"[
    {"name": "sid", "value": "abc", "domain": "example.com", "path": "/",
     "expires_utc": 0, "secure": true, "httponly": true},
    {"name": "theme", "value": "dark", "domain": "example.com", "path": "/",
     "expires_utc": 0, "secure": false, "httponly": false}
]"#;

fn count_rows(db_path: &Path, table: &str) -> i64 {
    let conn = Connection::open(db_path).expect("open db");
    conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| {
        row.get(0)
    })
    .expect("count rows")
}

#[test]
fn test_cli_help_succeeds() {
    let output = cargo_bin_cmd!("cookierelay")
        .arg("--help")
        .output()
        .expect("run cookierelay");
    assert!(output.status.success(), "help should exit 0");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Usage"), "help should include usage text");
    assert!(stdout.contains("extract"));
    assert!(stdout.contains("inject"));
}

#[test]
fn test_inject_without_input_exits_one() {
    let output = cargo_bin_cmd!("cookierelay")
        .arg("inject")
        .output()
        .expect("run cookierelay");
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("--cookies-file") || stderr.contains("cookies"));
}

#[test]
fn test_inject_from_base64_is_idempotent() {
    let dir = tempdir().expect("tempdir");
    let profile = dir.path().join("profile");
    let encoded = BASE64.encode(COOKIES_JSON);

    for _ in 0..2 {
        let output = cargo_bin_cmd!("cookierelay")
            .arg("inject")
            .arg("--cookies-json")
            .arg(&encoded)
            .arg("--profile-path")
            .arg(&profile)
            .output()
            .expect("run cookierelay");
        assert!(
            output.status.success(),
            "inject failed: {}",
            String::from_utf8_lossy(&output.stderr)
        );
    }

    let db_path = profile.join("cookies.sqlite");
    assert_eq!(count_rows(&db_path, "moz_cookies"), 2);
}

#[test]
fn test_inject_from_file_into_chromium_store() {
    let dir = tempdir().expect("tempdir");
    let profile = dir.path().join("chromium-profile");
    let cookies_file = dir.path().join("cookies.json");
    std::fs::write(&cookies_file, COOKIES_JSON).expect("write cookies file");

    let output = cargo_bin_cmd!("cookierelay")
        .arg("inject")
        .arg("--cookies-file")
        .arg(&cookies_file)
        .arg("--store")
        .arg("chromium")
        .arg("--profile-path")
        .arg(&profile)
        .output()
        .expect("run cookierelay");
    assert!(
        output.status.success(),
        "inject failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    assert_eq!(count_rows(&profile.join("Cookies"), "cookies"), 2);
}

#[test]
fn test_extract_requires_target_domain() {
    let output = cargo_bin_cmd!("cookierelay")
        .arg("extract")
        .env_remove("PYTHON_SCRIPT_SECRET")
        .env_remove("COOKIE_ENCRYPTION_KEY")
        .output()
        .expect("run cookierelay");
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("--target-domain"));
}

fn can_bind_localhost() -> bool {
    std::net::TcpListener::bind("127.0.0.1:0").is_ok()
}

#[cfg_attr(miri, ignore)]
#[tokio::test(flavor = "multi_thread")]
async fn test_extract_end_to_end() {
    if !can_bind_localhost() {
        return;
    }

    let dir = tempdir().expect("tempdir");
    let db_path = dir.path().join("Cookies");
    let conn = Connection::open(&db_path).expect("open db");
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
    drop(conn);

    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/session/sess-9/cookies"))
        .and(header("x-python-script-auth", "topsecret"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let output = cargo_bin_cmd!("cookierelay")
        .arg("extract")
        .arg("--target-domain")
        .arg("example.com")
        .arg("--session-id")
        .arg("sess-9")
        .arg("--api-url")
        .arg(server.uri())
        .arg("--secret")
        .arg("topsecret")
        .arg("--encryption-key")
        .arg("0123456789abcdef0123456789abcdef")
        .arg("--profile-path")
        .arg(&db_path)
        .arg("--timeout")
        .arg("10")
        .arg("--poll-interval")
        .arg("1")
        .output()
        .expect("run cookierelay");
    assert!(
        output.status.success(),
        "extract failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let requests = server.received_requests().await.expect("requests");
    assert_eq!(requests.len(), 1);
}
