//! HTTP webhook delivery.
//!
//! Production implementation of the pipeline's `WebhookNotifier` seam.
//! Webhooks are called with a plain GET request; the receiver learns
//! which SBOM changed from the `name` query parameter the pipeline
//! appends when the webhook opted in.

use std::time::Duration;

use anyhow::Result;
use reqwest::Client;

use sbomwatch_scan_pipeline::{ScanPipelineError, WebhookNotifier};

/// Default per-request timeout.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Webhook notifier backed by a shared `reqwest` client.
#[derive(Debug, Clone)]
pub struct HttpWebhookNotifier {
    client: Client,
}

impl HttpWebhookNotifier {
    /// Build a notifier with the default timeout.
    pub fn new() -> Result<Self> {
        Self::with_timeout(DEFAULT_TIMEOUT)
    }

    /// Build a notifier with a custom per-request timeout.
    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("sbomwatch-daemon/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| anyhow::anyhow!("failed to build http client: {}", e))?;
        Ok(Self { client })
    }
}

impl WebhookNotifier for HttpWebhookNotifier {
    async fn notify(&self, url: &str) -> Result<(), ScanPipelineError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| ScanPipelineError::Notify {
                url: url.to_owned(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ScanPipelineError::Notify {
                url: url.to_owned(),
                reason: format!("unexpected status {status}"),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_with_default_timeout() {
        assert!(HttpWebhookNotifier::new().is_ok());
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_a_notify_error() {
        let notifier = HttpWebhookNotifier::with_timeout(Duration::from_millis(200)).unwrap();
        // Reserved TEST-NET-1 address, nothing listens there
        let err = notifier.notify("http://192.0.2.1:9/hook").await.unwrap_err();
        assert!(matches!(err, ScanPipelineError::Notify { .. }));
    }
}
