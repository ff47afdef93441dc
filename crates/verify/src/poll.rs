//! Poll-with-timeout visibility assertion

use std::time::{Duration, Instant};

use tokio::time::sleep;
use tracing::debug;

use crate::error::{VerifyError, VerifyResult};
use crate::page::BrowserPage;

/// How long to keep probing and how often
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub timeout: Duration,
    pub interval: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(5000),
            interval: Duration::from_millis(100),
        }
    }
}

/// Probe until `text` is visible or the policy's timeout elapses.
///
/// Always probes at least once, and probes once more at the deadline, so a
/// zero timeout is a single check.
pub async fn wait_until_visible<P: BrowserPage>(
    page: &mut P,
    text: &str,
    policy: PollPolicy,
) -> VerifyResult<()> {
    let start = Instant::now();
    let mut attempts = 0;

    loop {
        attempts += 1;

        if page.is_text_visible(text).await? {
            debug!(text, attempts, "text visible");
            return Ok(());
        }

        let elapsed = start.elapsed();
        if elapsed >= policy.timeout {
            return Err(VerifyError::Assertion {
                text: text.to_string(),
                timeout: policy.timeout,
                attempts,
            });
        }

        sleep(policy.interval.min(policy.timeout - elapsed)).await;
    }
}
