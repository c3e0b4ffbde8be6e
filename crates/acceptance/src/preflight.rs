//! Reachability check against the application under test

use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{info, warn};

use crate::error::{AcceptanceError, AcceptanceResult};

const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Poll `base_url` until it answers with anything but a server error.
///
/// Redirects count as reachable; the app sends unauthenticated visitors to
/// its login page.
pub async fn wait_for_target(base_url: &str, timeout: Duration) -> AcceptanceResult<()> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(2))
        .redirect(reqwest::redirect::Policy::none())
        .build()?;

    let start = Instant::now();
    let mut attempts = 0;

    loop {
        attempts += 1;

        match client.get(base_url).send().await {
            Ok(resp) if !resp.status().is_server_error() => {
                info!("Target {} is reachable ({})", base_url, resp.status());
                return Ok(());
            }
            Ok(resp) => {
                warn!("Target returned {}", resp.status());
            }
            Err(e) => {
                if attempts == 1 {
                    info!("Waiting for {} to come up...", base_url);
                }
                if !e.is_connect() {
                    warn!("Preflight error: {}", e);
                }
            }
        }

        if start.elapsed() + POLL_INTERVAL >= timeout {
            break;
        }
        sleep(POLL_INTERVAL).await;
    }

    Err(AcceptanceError::TargetUnreachable {
        url: base_url.to_string(),
        attempts,
    })
}
