//! The External Forwarder (§4.5, component G): posts the original webhook
//! payload to every matching external-plugin endpoint with bounded
//! exponential-backoff retries.
//!
//! Retry policy comes from [`hookrelay_core::RetryPolicy`] (§9 "retry logic
//! in the external forwarder") so the backoff schedule stays declarative and
//! swappable without touching this module's control flow.

use std::collections::HashMap;

use reqwest::Client;

use hookrelay_core::{ExternalPlugin, RetryPolicy};

use crate::metrics;

const USER_AGENT: &str = "hookrelay-external-forwarder/1.0";

/// Outcome of forwarding to a single external plugin, used for logging and
/// the `hookrelay_external_forward_total{outcome}` metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForwardOutcome {
    /// A 2xx response was observed (possibly after retries).
    Success,
    /// A non-2xx response was observed; §4.5/§9(iii): not retried, the
    /// plugin "saw" the event.
    NonSuccessResponse,
    /// Every attempt exhausted the retry budget on transport errors.
    Exhausted,
    /// `dry_run` was set; the POST was logged, not sent.
    DryRun,
}

impl ForwardOutcome {
    fn label(&self) -> &'static str {
        match self {
            ForwardOutcome::Success => "success",
            ForwardOutcome::NonSuccessResponse => "non_success_response",
            ForwardOutcome::Exhausted => "exhausted",
            ForwardOutcome::DryRun => "dry_run",
        }
    }
}

pub struct ExternalForwarder {
    client: Client,
    policy: RetryPolicy,
    dry_run: bool,
}

impl ExternalForwarder {
    pub fn new(client: Client, policy: RetryPolicy, dry_run: bool) -> Self {
        Self { client, policy, dry_run }
    }

    /// Forward `body`/`headers` to a single external plugin endpoint (§4.5).
    ///
    /// Only transport-level errors are retried; an HTTP response outside
    /// `[200, 299]` is terminal and logged with a body excerpt (§4.5, §9
    /// "possibly-buggy source behaviour" (iii), preserved here).
    pub async fn forward(&self, plugin: &ExternalPlugin, event_type: &str, body: &[u8], headers: &HashMap<String, Vec<String>>) -> ForwardOutcome {
        if self.dry_run {
            tracing::info!(
                plugin = %plugin.name,
                endpoint = %plugin.endpoint,
                event_type,
                "dry-run: would forward webhook to external plugin"
            );
            metrics::record_external_forward(ForwardOutcome::DryRun.label());
            return ForwardOutcome::DryRun;
        }

        let mut attempt = 1;
        loop {
            let delay = self.policy.backoff_before(attempt);
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }

            let mut request = self.client.post(&plugin.endpoint).header("User-Agent", USER_AGENT).body(body.to_vec());
            for (name, values) in headers {
                for value in values {
                    request = request.header(name.as_str(), value.as_str());
                }
            }

            match request.send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        metrics::record_external_forward(ForwardOutcome::Success.label());
                        return ForwardOutcome::Success;
                    }
                    let excerpt = response.text().await.unwrap_or_default();
                    let excerpt: String = excerpt.chars().take(200).collect();
                    tracing::error!(
                        plugin = %plugin.name,
                        endpoint = %plugin.endpoint,
                        status = %status,
                        body_excerpt = %excerpt,
                        "external plugin returned a non-success response, not retrying"
                    );
                    metrics::record_external_forward(ForwardOutcome::NonSuccessResponse.label());
                    return ForwardOutcome::NonSuccessResponse;
                }
                Err(err) => {
                    tracing::warn!(
                        plugin = %plugin.name,
                        endpoint = %plugin.endpoint,
                        attempt,
                        error = %err,
                        "transport error forwarding to external plugin"
                    );
                    if attempt >= self.policy.max_attempts {
                        tracing::error!(
                            plugin = %plugin.name,
                            endpoint = %plugin.endpoint,
                            "external plugin forward exhausted retry budget"
                        );
                        metrics::record_external_forward(ForwardOutcome::Exhausted.label());
                        return ForwardOutcome::Exhausted;
                    }
                    attempt += 1;
                }
            }
        }
    }
}
