//! Wallet portfolio valuation and swap execution pipeline
//!
//! This library exposes the orchestration layer between a connected wallet,
//! an unreliable multi-endpoint chain RPC layer, a rate-limited price
//! aggregator, and an advisory service: consistent per-wallet portfolio
//! snapshots with graceful degradation, and a typed swap pipeline that
//! decodes, normalizes, signs, and submits prepared transactions.

pub mod advisor;
pub mod compat;
pub mod config;
pub mod endpoints;
pub mod errors;
pub mod metrics;
pub mod okx;
pub mod oracle;
pub mod registry;
pub mod rpc;
pub mod snapshot;
pub mod swap;
pub mod types;
pub mod wallet;

// Re-export commonly used types
pub use solana_sdk::{pubkey::Pubkey, signature::Signature};
