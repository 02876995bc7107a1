//! Notification collaborator contract
//!
//! Delivery is best-effort: the workflow never waits on or retries a send,
//! and a send failure is logged, never propagated as a workflow failure.

use async_trait::async_trait;

/// Outbound notification sink (email/SMS templating lives behind this seam).
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(
        &self,
        template: &str,
        recipient: &str,
        payload: serde_json::Value,
    ) -> anyhow::Result<()>;
}

/// Default sink that only logs the would-be delivery.
#[derive(Debug, Default, Clone)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(
        &self,
        template: &str,
        recipient: &str,
        payload: serde_json::Value,
    ) -> anyhow::Result<()> {
        tracing::info!(%template, %recipient, %payload, "notification dispatched");
        Ok(())
    }
}

/// Fire-and-forget dispatch; failures are recorded and swallowed.
pub async fn send_best_effort(
    notifier: &dyn Notifier,
    template: &str,
    recipient: &str,
    payload: serde_json::Value,
) {
    if let Err(err) = notifier.send(template, recipient, payload).await {
        tracing::warn!(%template, %recipient, error = %err, "notification delivery failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FailingNotifier;

    #[async_trait]
    impl Notifier for FailingNotifier {
        async fn send(&self, _: &str, _: &str, _: serde_json::Value) -> anyhow::Result<()> {
            anyhow::bail!("smtp unreachable")
        }
    }

    #[tokio::test]
    async fn test_send_best_effort_swallows_failures() {
        // Must not panic or propagate.
        send_best_effort(
            &FailingNotifier,
            "offer_selected",
            "connector-1",
            serde_json::json!({}),
        )
        .await;
    }

    #[tokio::test]
    async fn test_log_notifier_succeeds() {
        let result = LogNotifier
            .send("application_submitted", "c-1", serde_json::json!({"n": 1}))
            .await;
        assert!(result.is_ok());
    }
}
