//! Target system addressing and the optional readiness probe

use std::time::{Duration, Instant};

use reqwest::Url;
use tokio::time::sleep;
use tracing::{info, warn};

use crate::error::{VerifyError, VerifyResult};

/// Parse and check the base URL of the target system.
///
/// The path always ends in `/` so plan paths resolve beneath it.
pub fn parse_base_url(raw: &str) -> VerifyResult<Url> {
    let mut url = Url::parse(raw)
        .map_err(|e| VerifyError::Config(format!("base URL {:?}: {}", raw, e)))?;

    match url.scheme() {
        "http" | "https" => {}
        other => {
            return Err(VerifyError::Config(format!(
                "base URL {:?}: unsupported scheme {:?}",
                raw, other
            )))
        }
    }

    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

/// Resolve a plan path against the base URL, keeping the base URL's own path.
///
/// A leading `/` is ignored: `/events` on `http://host/app/` is
/// `http://host/app/events`, and an empty path is the base URL itself.
pub fn resolve(base: &Url, path: &str) -> VerifyResult<String> {
    base.join(path.trim_start_matches('/'))
        .map(String::from)
        .map_err(|e| VerifyError::Config(format!("cannot join {:?} onto {}: {}", path, base, e)))
}

/// Poll `url` over HTTP until the server answers at all.
///
/// Any HTTP status counts as reachable; only transport errors keep waiting.
pub async fn wait_for_target(url: &str, window: Duration) -> VerifyResult<()> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(2))
        .build()?;

    let start = Instant::now();
    let mut attempts = 0;
    let mut last_error = String::from("no attempt made");

    while attempts == 0 || start.elapsed() < window {
        attempts += 1;

        match client.get(url).send().await {
            Ok(resp) => {
                info!("Target answered {} after {} attempt(s)", resp.status(), attempts);
                return Ok(());
            }
            Err(e) => {
                if attempts == 1 {
                    info!("Waiting for target at {}...", url);
                }
                // Connection refused is expected while the target is starting
                if !e.is_connect() {
                    warn!("Readiness probe error: {}", e);
                }
                last_error = e.to_string();
            }
        }

        sleep(Duration::from_millis(100)).await;
    }

    Err(VerifyError::Navigation {
        url: url.to_string(),
        reason: format!(
            "target not reachable after {} attempts in {}ms: {}",
            attempts,
            window.as_millis(),
            last_error
        ),
    })
}
