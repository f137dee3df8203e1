//! Chain RPC module
//!
//! Endpoint selection over an ordered candidate list plus balance fetching.

use async_trait::async_trait;
use solana_sdk::hash::Hash;

use crate::errors::RpcError;

// Submodules
pub mod balances;
pub mod selector;

// Re-exports for convenience
pub use balances::{BalanceSource, RpcBalanceFetcher};
pub use selector::{ChainHandle, EndpointSelector};

/// Trait for fetching the current chain-head reference
#[async_trait]
pub trait ChainHead: Send + Sync {
    async fn latest_blockhash(&self) -> Result<Hash, RpcError>;
}
