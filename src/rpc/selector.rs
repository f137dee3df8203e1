//! Endpoint selection
//!
//! The candidate list is a preference order, most reliable first: each
//! candidate gets one cheap liveness probe (latest chain head) with a short
//! timeout, the first success wins, and no candidate is retried. This is
//! deliberately not a load-balancing or scoring policy.

use async_trait::async_trait;
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_sdk::commitment_config::CommitmentConfig;
use solana_sdk::hash::Hash;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::errors::RpcError;
use crate::rpc::ChainHead;

/// A connected RPC endpoint
#[derive(Clone)]
pub struct ChainHandle {
    client: Arc<RpcClient>,
    url: String,
}

impl ChainHandle {
    pub fn client(&self) -> &RpcClient {
        &self.client
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub async fn latest_blockhash(&self) -> Result<Hash, RpcError> {
        self.client
            .get_latest_blockhash()
            .await
            .map_err(|e| RpcError::from_client_error(e, &self.url, "get_latest_blockhash"))
    }
}

impl std::fmt::Debug for ChainHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChainHandle").field("url", &self.url).finish()
    }
}

/// Stateless first-success selector over an ordered endpoint list
#[derive(Debug, Clone)]
pub struct EndpointSelector {
    endpoints: Vec<String>,
    probe_timeout: Duration,
    request_timeout: Duration,
}

impl EndpointSelector {
    pub fn new(endpoints: Vec<String>, probe_timeout: Duration, request_timeout: Duration) -> Self {
        Self {
            endpoints,
            probe_timeout,
            request_timeout,
        }
    }

    /// Return a handle to the first candidate that answers the liveness
    /// probe. Nothing is cached across calls.
    pub async fn select(&self) -> Result<ChainHandle, RpcError> {
        let mut last_error = "no candidates configured".to_string();

        for url in &self.endpoints {
            let client = Arc::new(RpcClient::new_with_timeout_and_commitment(
                url.clone(),
                self.request_timeout,
                CommitmentConfig::confirmed(),
            ));

            let probe = tokio::time::timeout(self.probe_timeout, client.get_latest_blockhash());
            match probe.await {
                Ok(Ok(_)) => {
                    debug!(endpoint = %url, "Endpoint passed liveness probe");
                    return Ok(ChainHandle {
                        client,
                        url: url.clone(),
                    });
                }
                Ok(Err(e)) => {
                    warn!(endpoint = %url, error = %e, "Liveness probe failed");
                    last_error = e.to_string();
                }
                Err(_) => {
                    warn!(
                        endpoint = %url,
                        timeout_ms = self.probe_timeout.as_millis() as u64,
                        "Liveness probe timed out"
                    );
                    last_error = format!(
                        "probe timed out after {}ms",
                        self.probe_timeout.as_millis()
                    );
                }
            }
        }

        Err(RpcError::EndpointUnavailable {
            candidates: self.endpoints.len(),
            last_error,
        })
    }
}

#[async_trait]
impl ChainHead for EndpointSelector {
    async fn latest_blockhash(&self) -> Result<Hash, RpcError> {
        let handle = self.select().await?;
        handle.latest_blockhash().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn selector(endpoints: Vec<&str>) -> EndpointSelector {
        EndpointSelector::new(
            endpoints.into_iter().map(String::from).collect(),
            Duration::from_millis(300),
            Duration::from_secs(2),
        )
    }

    #[tokio::test]
    async fn test_empty_candidate_list_is_unavailable() {
        let err = selector(vec![]).select().await.unwrap_err();
        match err {
            RpcError::EndpointUnavailable { candidates, .. } => assert_eq!(candidates, 0),
            other => panic!("expected EndpointUnavailable, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_all_candidates_failing_reports_last_error() {
        // Unroutable addresses: every probe fails fast or times out
        let err = selector(vec!["http://127.0.0.1:1", "http://127.0.0.1:2"])
            .select()
            .await
            .unwrap_err();
        match err {
            RpcError::EndpointUnavailable {
                candidates,
                last_error,
            } => {
                assert_eq!(candidates, 2);
                assert!(!last_error.is_empty());
            }
            other => panic!("expected EndpointUnavailable, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_selection_is_bounded_by_probe_timeout() {
        // A blackhole address must not hang past the probe timeout per
        // candidate
        let started = std::time::Instant::now();
        let _ = selector(vec!["http://10.255.255.1:8899"]).select().await;
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}
