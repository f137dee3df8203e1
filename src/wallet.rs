//! Wallet collaborator
//!
//! The wallet is an external capability set consumed behind a trait:
//! connect/disconnect, event subscriptions, and sign-and-submit. Absence of a
//! provider at runtime means the swap feature is unavailable, never a crash.
//! Connect-state is derived from events through one pure transition function
//! rather than scattered mutation sites.

use anyhow::{Context, Result};
use async_trait::async_trait;
use solana_sdk::{
    pubkey::Pubkey,
    signature::{Keypair, Signature, Signer},
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::info;

use crate::compat;
use crate::errors::WalletError;
use crate::rpc::EndpointSelector;
use crate::types::PreparedTransaction;

/// Provider notifications, reduced into `WalletState`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalletEvent {
    Connected(Pubkey),
    Disconnected,
    /// The provider switched accounts; `None` means the account went away
    AccountChanged(Option<Pubkey>),
}

/// Connect-state as seen by consumers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WalletState {
    pub connected: bool,
    pub address: Option<Pubkey>,
}

/// The single transition function for wallet state. A stale callback and a
/// newer user action cannot race: the latest event always wins wholesale.
pub fn reduce(state: WalletState, event: WalletEvent) -> WalletState {
    match event {
        WalletEvent::Connected(address) => WalletState {
            connected: true,
            address: Some(address),
        },
        WalletEvent::Disconnected => WalletState::default(),
        WalletEvent::AccountChanged(Some(address)) => WalletState {
            connected: true,
            address: Some(address),
        },
        WalletEvent::AccountChanged(None) => WalletState::default(),
    }
}

/// Capability set consumed from the wallet collaborator
#[async_trait]
pub trait WalletProvider: Send + Sync {
    async fn connect(&self) -> Result<Pubkey, WalletError>;

    async fn disconnect(&self);

    /// Currently connected address, if any
    fn address(&self) -> Option<Pubkey>;

    fn subscribe(&self) -> broadcast::Receiver<WalletEvent>;

    /// Sign the prepared transaction and submit it to the chain
    async fn sign_and_send(&self, tx: PreparedTransaction) -> Result<Signature, WalletError>;
}

/// Keypair-file-backed provider
pub struct KeypairWallet {
    keypair: Arc<Keypair>,
    selector: Arc<EndpointSelector>,
    connected: AtomicBool,
    events: broadcast::Sender<WalletEvent>,
}

impl KeypairWallet {
    /// Create a provider from a keypair file (raw 64 bytes or a JSON byte
    /// array)
    pub fn from_file(path: &str, selector: Arc<EndpointSelector>) -> Result<Self> {
        let keypair_bytes = std::fs::read(path)
            .with_context(|| format!("Failed to read keypair file: {}", path))?;

        let keypair = if keypair_bytes.len() == 64 {
            // Raw bytes format - validate before conversion
            if keypair_bytes.iter().all(|&b| b == 0) {
                anyhow::bail!("Invalid keypair: all-zero key rejected");
            }
            Keypair::try_from(keypair_bytes.as_slice()).context("Invalid keypair bytes")?
        } else {
            // JSON format
            let json: Vec<u8> = serde_json::from_slice(&keypair_bytes)
                .context("Failed to parse keypair JSON")?;
            if json.len() != 64 {
                anyhow::bail!("Invalid keypair length: expected 64 bytes, got {}", json.len());
            }
            if json.iter().all(|&b| b == 0) {
                anyhow::bail!("Invalid keypair: all-zero key rejected");
            }
            Keypair::try_from(json.as_slice()).context("Invalid keypair from JSON")?
        };

        Ok(Self::from_keypair(keypair, selector))
    }

    pub fn from_keypair(keypair: Keypair, selector: Arc<EndpointSelector>) -> Self {
        let (events, _) = broadcast::channel(16);
        Self {
            keypair: Arc::new(keypair),
            selector,
            connected: AtomicBool::new(false),
            events,
        }
    }

    pub fn pubkey(&self) -> Pubkey {
        self.keypair.pubkey()
    }
}

#[async_trait]
impl WalletProvider for KeypairWallet {
    async fn connect(&self) -> Result<Pubkey, WalletError> {
        let address = self.keypair.pubkey();
        self.connected.store(true, Ordering::SeqCst);
        let _ = self.events.send(WalletEvent::Connected(address));
        info!(address = %address, "Wallet connected");
        Ok(address)
    }

    async fn disconnect(&self) {
        self.connected.store(false, Ordering::SeqCst);
        let _ = self.events.send(WalletEvent::Disconnected);
        info!("Wallet disconnected");
    }

    fn address(&self) -> Option<Pubkey> {
        self.connected
            .load(Ordering::SeqCst)
            .then(|| self.keypair.pubkey())
    }

    fn subscribe(&self) -> broadcast::Receiver<WalletEvent> {
        self.events.subscribe()
    }

    async fn sign_and_send(&self, mut tx: PreparedTransaction) -> Result<Signature, WalletError> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(WalletError::Unavailable);
        }

        compat::sign_in_place(&mut tx, &self.keypair)?;

        let handle = self
            .selector
            .select()
            .await
            .map_err(|e| WalletError::Rejected {
                reason: e.to_string(),
            })?;

        let result = match &tx {
            PreparedTransaction::Versioned(vtx) => handle.client().send_transaction(vtx).await,
            PreparedTransaction::Legacy(legacy) => handle.client().send_transaction(legacy).await,
        };

        result.map_err(|e| WalletError::Rejected {
            reason: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::time::Duration;

    fn selector() -> Arc<EndpointSelector> {
        Arc::new(EndpointSelector::new(
            vec![],
            Duration::from_millis(100),
            Duration::from_secs(1),
        ))
    }

    #[test]
    fn test_reducer_transitions() {
        let start = WalletState::default();
        let a = Pubkey::new_unique();
        let b = Pubkey::new_unique();

        let connected = reduce(start, WalletEvent::Connected(a));
        assert!(connected.connected);
        assert_eq!(connected.address, Some(a));

        let switched = reduce(connected, WalletEvent::AccountChanged(Some(b)));
        assert!(switched.connected);
        assert_eq!(switched.address, Some(b));

        let dropped = reduce(switched, WalletEvent::AccountChanged(None));
        assert_eq!(dropped, WalletState::default());

        let disconnected = reduce(connected, WalletEvent::Disconnected);
        assert_eq!(disconnected, WalletState::default());
    }

    #[test]
    fn test_keypair_from_json_file() {
        let keypair = Keypair::new();
        let json = serde_json::to_vec(&keypair.to_bytes().to_vec()).unwrap();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&json).unwrap();

        let wallet =
            KeypairWallet::from_file(file.path().to_str().unwrap(), selector()).unwrap();
        assert_eq!(wallet.pubkey(), keypair.pubkey());
    }

    #[test]
    fn test_keypair_from_raw_file() {
        let keypair = Keypair::new();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&keypair.to_bytes()).unwrap();

        let wallet =
            KeypairWallet::from_file(file.path().to_str().unwrap(), selector()).unwrap();
        assert_eq!(wallet.pubkey(), keypair.pubkey());
    }

    #[test]
    fn test_all_zero_keypair_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&[0u8; 64]).unwrap();

        assert!(KeypairWallet::from_file(file.path().to_str().unwrap(), selector()).is_err());
    }

    #[tokio::test]
    async fn test_connect_emits_event_and_exposes_address() {
        let wallet = KeypairWallet::from_keypair(Keypair::new(), selector());
        assert_eq!(wallet.address(), None);

        let mut events = wallet.subscribe();
        let address = wallet.connect().await.unwrap();
        assert_eq!(wallet.address(), Some(address));
        assert_eq!(events.recv().await.unwrap(), WalletEvent::Connected(address));

        wallet.disconnect().await;
        assert_eq!(wallet.address(), None);
        assert_eq!(events.recv().await.unwrap(), WalletEvent::Disconnected);
    }

    #[tokio::test]
    async fn test_sign_and_send_requires_connection() {
        let wallet = KeypairWallet::from_keypair(Keypair::new(), selector());
        let tx = PreparedTransaction::Legacy(solana_sdk::transaction::Transaction::default());
        let err = wallet.sign_and_send(tx).await.unwrap_err();
        assert!(matches!(err, WalletError::Unavailable));
    }
}
