//! Ledger reads used to decide whether supporting accounts must be created

use async_trait::async_trait;
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_sdk::{commitment_config::CommitmentConfig, pubkey::Pubkey};
use std::{collections::HashMap, sync::Arc, time::Duration};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::error::{ClientError, Result};

/// Read access to raw account data.
///
/// An absent account is `Ok(None)`. Network and timeout failures surface as
/// `TransientReadError` and may be retried with the same address.
#[async_trait]
pub trait AccountProber: Send + Sync {
    async fn get_account_data(&self, address: &Pubkey) -> Result<Option<Vec<u8>>>;

    async fn exists(&self, address: &Pubkey) -> Result<bool> {
        Ok(self.get_account_data(address).await?.is_some())
    }
}

/// Prober backed by a Solana RPC node
pub struct RpcAccountProber {
    client: Arc<RpcClient>,
    commitment: CommitmentConfig,
    timeout: Duration,
}

impl RpcAccountProber {
    pub fn new(url: String, commitment: CommitmentConfig, timeout: Duration) -> Self {
        let client = Arc::new(RpcClient::new_with_timeout_and_commitment(
            url, timeout, commitment,
        ));
        Self {
            client,
            commitment,
            timeout,
        }
    }

    pub fn from_client(client: Arc<RpcClient>, timeout: Duration) -> Self {
        let commitment = client.commitment();
        Self {
            client,
            commitment,
            timeout,
        }
    }
}

#[async_trait]
impl AccountProber for RpcAccountProber {
    async fn get_account_data(&self, address: &Pubkey) -> Result<Option<Vec<u8>>> {
        let request = self
            .client
            .get_account_with_commitment(address, self.commitment);

        let response = match tokio::time::timeout(self.timeout, request).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                warn!(%address, error = %e, "Account read failed");
                return Err(ClientError::TransientReadError {
                    address: *address,
                    message: e.to_string(),
                });
            }
            Err(_) => {
                warn!(
                    %address,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "Account read timed out"
                );
                return Err(ClientError::TransientReadError {
                    address: *address,
                    message: format!("timed out after {:?}", self.timeout),
                });
            }
        };

        debug!(
            %address,
            slot = response.context.slot,
            found = response.value.is_some(),
            "Read account"
        );
        Ok(response.value.map(|account| account.data))
    }
}

/// In-memory account store for tests and dry runs
#[derive(Clone, Default)]
pub struct InMemoryLedger {
    accounts: Arc<RwLock<HashMap<Pubkey, Vec<u8>>>>,
    failing: Arc<RwLock<HashMap<Pubkey, String>>>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, address: Pubkey, data: Vec<u8>) {
        self.accounts.write().await.insert(address, data);
    }

    pub async fn remove(&self, address: &Pubkey) -> Option<Vec<u8>> {
        self.accounts.write().await.remove(address)
    }

    /// Make reads of `address` fail as if the node were unreachable
    pub async fn mark_failing(&self, address: Pubkey, message: impl Into<String>) {
        self.failing.write().await.insert(address, message.into());
    }

    pub async fn clear_failures(&self) {
        self.failing.write().await.clear();
    }

    pub async fn len(&self) -> usize {
        self.accounts.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.accounts.read().await.is_empty()
    }
}

#[async_trait]
impl AccountProber for InMemoryLedger {
    async fn get_account_data(&self, address: &Pubkey) -> Result<Option<Vec<u8>>> {
        if let Some(message) = self.failing.read().await.get(address) {
            warn!(%address, "Account read failed");
            return Err(ClientError::TransientReadError {
                address: *address,
                message: message.clone(),
            });
        }
        Ok(self.accounts.read().await.get(address).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_absent_account_is_not_an_error() {
        let ledger = InMemoryLedger::new();
        let address = Pubkey::new_unique();
        assert!(!ledger.exists(&address).await.unwrap());
        assert!(ledger.get_account_data(&address).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_insert_and_remove() {
        let ledger = InMemoryLedger::new();
        let address = Pubkey::new_unique();
        ledger.insert(address, vec![1, 2, 3]).await;

        assert!(ledger.exists(&address).await.unwrap());
        assert_eq!(ledger.len().await, 1);
        assert_eq!(ledger.remove(&address).await, Some(vec![1, 2, 3]));
        assert!(ledger.is_empty().await);
    }

    #[tokio::test]
    async fn test_failures_are_retryable() {
        let ledger = InMemoryLedger::new();
        let address = Pubkey::new_unique();
        ledger.insert(address, vec![0]).await;
        ledger.mark_failing(address, "connection reset").await;

        let err = ledger.exists(&address).await.unwrap_err();
        assert!(err.is_retryable());

        // same address succeeds once the node recovers
        ledger.clear_failures().await;
        assert!(ledger.exists(&address).await.unwrap());
    }

    fn rpc_prober(addr: std::net::SocketAddr) -> RpcAccountProber {
        RpcAccountProber::new(
            format!("http://{}", addr),
            CommitmentConfig::confirmed(),
            Duration::from_millis(50),
        )
    }

    #[tokio::test]
    async fn test_silent_node_times_out() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        // accept and hold connections without ever answering
        let server = tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let address = Pubkey::new_unique();
        let err = rpc_prober(addr).exists(&address).await.unwrap_err();
        assert!(matches!(
            err,
            ClientError::TransientReadError { address: a, .. } if a == address
        ));
        assert!(err.is_retryable());
        server.abort();
    }

    #[tokio::test]
    async fn test_unreachable_node_is_retryable() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let address = Pubkey::new_unique();
        let err = rpc_prober(addr)
            .get_account_data(&address)
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::TransientReadError { .. }));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_shared_through_trait_object() {
        let ledger = InMemoryLedger::new();
        let address = Pubkey::new_unique();
        let prober: Arc<dyn AccountProber> = Arc::new(ledger.clone());

        assert!(!prober.exists(&address).await.unwrap());
        ledger.insert(address, vec![]).await;
        assert!(prober.exists(&address).await.unwrap());
    }
}
