use crate::client::BeadsClient;
use tokio::time::Duration;

pub const READY_INTERVAL: Duration = Duration::from_millis(500);
pub const READY_ATTEMPTS: u32 = 10;

pub async fn wait_until_ready(client: &BeadsClient) -> bool {
    wait_with(client, READY_INTERVAL, READY_ATTEMPTS).await
}

/// Probes until the backend answers ready. Giving up is not fatal.
pub async fn wait_with(client: &BeadsClient, interval: Duration, attempts: u32) -> bool {
    for attempt in 1..=attempts {
        match client.launch_probe().await {
            Ok(probe) if probe.ready => {
                tracing::info!(attempt, detail = probe.detail.as_deref().unwrap_or_default(), "backend ready");
                return true;
            }
            Ok(probe) => {
                tracing::debug!(attempt, detail = probe.detail.as_deref().unwrap_or_default(), "backend not ready");
            }
            Err(error) => tracing::debug!(attempt, error = %error, "launch probe failed"),
        }
        if attempt < attempts {
            tokio::time::sleep(interval).await;
        }
    }
    tracing::warn!(attempts, "backend did not become ready; continuing");
    false
}

#[cfg(test)]
mod tests {
    use super::wait_with;
    use crate::adapters::{BackendAdapter, BackendRequest};
    use crate::client::BeadsClient;
    use crate::errors::AppResult;
    use crate::runtime::RuntimeKind;
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use tokio::time::Duration;

    struct ReadyAfter {
        probes: AtomicU32,
        ready_at: u32,
    }

    #[async_trait]
    impl BackendAdapter for ReadyAfter {
        fn runtime(&self) -> RuntimeKind {
            RuntimeKind::Native
        }

        async fn execute(&self, _request: BackendRequest) -> AppResult<Value> {
            let probe = self.probes.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(json!({ "ready": probe >= self.ready_at }))
        }
    }

    #[tokio::test]
    async fn stops_probing_once_ready() {
        let adapter = Arc::new(ReadyAfter {
            probes: AtomicU32::new(0),
            ready_at: 3,
        });
        let client = BeadsClient::new(adapter.clone());
        assert!(wait_with(&client, Duration::from_millis(1), 10).await);
        assert_eq!(adapter.probes.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_the_attempt_cap() {
        let adapter = Arc::new(ReadyAfter {
            probes: AtomicU32::new(0),
            ready_at: u32::MAX,
        });
        let client = BeadsClient::new(adapter.clone());
        assert!(!wait_with(&client, Duration::from_millis(1), 10).await);
        assert_eq!(adapter.probes.load(Ordering::SeqCst), 10);
    }
}
