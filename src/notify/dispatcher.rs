//! Alert delivery with bounded retry and exponential backoff.

use std::time::Duration;

use tracing::{debug, info, warn};

use crate::config::{AlertChannel, ChannelKind};
use crate::error::{DriftError, Result};

use super::payload::{slack_payload, teams_payload};

/// Retries after the first attempt, matching the original delivery policy.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

const WEBHOOK_URL_KEY: &str = "webhook_url";

/// HTTP timeout for a single delivery attempt.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// First backoff interval; doubles on each further retry (1s, 2s, 4s, ...).
const BACKOFF_BASE: Duration = Duration::from_secs(1);

pub struct AlertDispatcher {
    client: reqwest::Client,
    backoff_base: Duration,
}

impl Default for AlertDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl AlertDispatcher {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("failed to build HTTP client");
        Self {
            client,
            backoff_base: BACKOFF_BASE,
        }
    }

    /// Shrink the backoff base so retry tests don't sleep for seconds.
    pub fn with_backoff_base(mut self, base: Duration) -> Self {
        self.backoff_base = base;
        self
    }

    /// Deliver a drift alert through one channel.
    ///
    /// A disabled channel is a no-op success. Unsupported kinds and missing
    /// webhook URLs fail immediately without retry. Delivery failures are
    /// retried up to `max_retries` more times with exponential backoff; the
    /// last error comes back wrapped with the total attempt count.
    pub async fn send(
        &self,
        channel: &AlertChannel,
        project: &str,
        summary: &str,
        plan_output: &str,
        max_retries: u32,
    ) -> Result<()> {
        if !channel.enabled {
            debug!(channel = %channel.name, "Skipping disabled alert channel");
            return Ok(());
        }

        let payload = match channel.kind {
            ChannelKind::Slack => serde_json::to_value(slack_payload(project, summary, plan_output))?,
            ChannelKind::Teams => teams_payload(project, summary, plan_output),
            ChannelKind::Email | ChannelKind::Other => {
                return Err(DriftError::UnsupportedChannel {
                    channel: channel.name.clone(),
                    kind: channel.kind.as_str().to_string(),
                });
            }
        };

        let url = channel
            .config
            .get(WEBHOOK_URL_KEY)
            .filter(|u| !u.is_empty())
            .ok_or_else(|| DriftError::ChannelConfig {
                channel: channel.name.clone(),
                key: WEBHOOK_URL_KEY.to_string(),
            })?;

        let mut last_err = match self.try_send(url, &payload).await {
            Ok(()) => return Ok(()),
            Err(e) => e,
        };

        for attempt in 1..=max_retries {
            let backoff = self.backoff_for(attempt);
            info!(
                channel = %channel.name,
                attempt,
                max_retries,
                backoff_ms = backoff.as_millis() as u64,
                "Retrying alert delivery"
            );
            tokio::time::sleep(backoff).await;

            match self.try_send(url, &payload).await {
                Ok(()) => {
                    info!(channel = %channel.name, attempt = attempt + 1, "Alert delivered after retry");
                    return Ok(());
                }
                Err(e) => {
                    warn!(channel = %channel.name, attempt = attempt + 1, error = %e, "Alert delivery attempt failed");
                    last_err = e;
                }
            }
        }

        Err(DriftError::DeliveryFailed {
            attempts: max_retries + 1,
            source: Box::new(last_err),
        })
    }

    /// Backoff before retry `attempt`. Saturates rather than overflowing,
    /// so absurd retry budgets degrade to a flat maximum wait.
    fn backoff_for(&self, attempt: u32) -> Duration {
        self.backoff_base
            .saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)))
    }

    /// One POST; any 200-class response is success.
    async fn try_send(&self, url: &str, payload: &serde_json::Value) -> Result<()> {
        let response = self.client.post(url).json(payload).send().await?;
        if !response.status().is_success() {
            return Err(DriftError::HttpStatus(response.status().as_u16()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_per_attempt() {
        let dispatcher = AlertDispatcher::new().with_backoff_base(Duration::from_millis(100));
        assert_eq!(dispatcher.backoff_for(1), Duration::from_millis(100));
        assert_eq!(dispatcher.backoff_for(2), Duration::from_millis(200));
        assert_eq!(dispatcher.backoff_for(3), Duration::from_millis(400));
        assert_eq!(dispatcher.backoff_for(4), Duration::from_millis(800));
    }

    #[test]
    fn backoff_saturates_for_huge_retry_budgets() {
        let dispatcher = AlertDispatcher::new().with_backoff_base(Duration::from_secs(1));
        // 2^39 exceeds u32; the multiplier saturates instead of panicking
        assert_eq!(
            dispatcher.backoff_for(40),
            Duration::from_secs(1).saturating_mul(u32::MAX)
        );
        let _ = dispatcher.backoff_for(u32::MAX);
        let _ = dispatcher.backoff_for(0);
    }
}
