//! Swap execution state machine

use solana_sdk::{pubkey::Pubkey, signature::Signature};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::errors::{RpcError, SwapError, WalletError};
use crate::metrics::metrics;
use crate::okx::{DexClient, DexError};
use crate::registry;
use crate::rpc::ChainHead;
use crate::swap::decode::{decode_swap_payload, normalize};
use crate::types::{
    AmountSpec, PortfolioSnapshot, SwapStrategy, SwapTransactionRequest,
};
use crate::wallet::WalletProvider;

/// Pipeline phases, in order. Terminal states carry their payload in the
/// `execute` result; the enum is what the logs and metrics speak.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwapPhase {
    Idle,
    QuoteRequested,
    PayloadDecoded,
    BlockhashRefreshed,
    AwaitingSignature,
    Confirmed,
    Failed,
}

impl std::fmt::Display for SwapPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SwapPhase::Idle => "idle",
            SwapPhase::QuoteRequested => "quote_requested",
            SwapPhase::PayloadDecoded => "payload_decoded",
            SwapPhase::BlockhashRefreshed => "blockhash_refreshed",
            SwapPhase::AwaitingSignature => "awaiting_signature",
            SwapPhase::Confirmed => "confirmed",
            SwapPhase::Failed => "failed",
        };
        write!(f, "{}", name)
    }
}

/// One swap attempt orchestrator
pub struct SwapPipeline {
    dex: Arc<DexClient>,
    chain: Arc<dyn ChainHead>,
    wallet: Arc<dyn WalletProvider>,
    slippage_bps: u16,
    blockhash_timeout: Duration,
    submit_timeout: Duration,
}

impl SwapPipeline {
    pub fn new(
        dex: Arc<DexClient>,
        chain: Arc<dyn ChainHead>,
        wallet: Arc<dyn WalletProvider>,
        slippage_bps: u16,
        blockhash_timeout: Duration,
        submit_timeout: Duration,
    ) -> Self {
        Self {
            dex,
            chain,
            wallet,
            slippage_bps,
            blockhash_timeout,
            submit_timeout,
        }
    }

    /// Resolve a strategy to a concrete raw-amount request against the
    /// current snapshot. Pure validation: runs before any network call.
    pub fn resolve_request(
        strategy: &SwapStrategy,
        snapshot: &PortfolioSnapshot,
        wallet: Pubkey,
        slippage_bps: u16,
    ) -> Result<SwapTransactionRequest, SwapError> {
        let from = registry::by_symbol(&strategy.from_symbol).ok_or_else(|| {
            SwapError::UnknownToken {
                symbol: strategy.from_symbol.clone(),
            }
        })?;
        let to = registry::by_symbol(&strategy.to_symbol).ok_or_else(|| {
            SwapError::UnknownToken {
                symbol: strategy.to_symbol.clone(),
            }
        })?;

        let raw_amount = match strategy.amount {
            AmountSpec::Percentage(pct) => {
                if !(pct > 0.0 && pct <= 100.0) {
                    return Err(SwapError::InvalidAmount {
                        raw: format!("{}%", pct),
                    });
                }
                let holding = snapshot.holding_by_mint(&from.mint).ok_or_else(|| {
                    SwapError::MissingBalance {
                        symbol: from.symbol.clone(),
                    }
                })?;
                // Truncate toward zero in the smallest unit
                let raw = (holding.balance.raw_amount as f64 * pct / 100.0).trunc() as u64;
                if raw == 0 {
                    return Err(SwapError::MissingBalance {
                        symbol: from.symbol.clone(),
                    });
                }
                raw
            }
            AmountSpec::Absolute(quantity) => {
                if quantity <= 0.0 {
                    return Err(SwapError::InvalidAmount {
                        raw: quantity.to_string(),
                    });
                }
                let raw = from.to_raw(quantity);
                if raw == 0 {
                    return Err(SwapError::InvalidAmount {
                        raw: quantity.to_string(),
                    });
                }
                raw
            }
        };

        Ok(SwapTransactionRequest {
            from,
            to,
            raw_amount,
            slippage_bps,
            wallet,
        })
    }

    /// Run one attempt end to end. No automatic retry on failure; the user
    /// re-initiates.
    pub async fn execute(
        &self,
        strategy: &SwapStrategy,
        snapshot: &PortfolioSnapshot,
    ) -> Result<Signature, SwapError> {
        metrics().swaps_total.inc();
        let attempt_id = Uuid::new_v4();

        let result = self.run(attempt_id, strategy, snapshot).await;
        match &result {
            Ok(signature) => {
                metrics().swaps_confirmed.inc();
                info!(
                    attempt_id = %attempt_id,
                    phase = %SwapPhase::Confirmed,
                    signature = %signature,
                    "Swap confirmed"
                );
            }
            Err(err) => {
                metrics().swaps_failed.inc();
                warn!(
                    attempt_id = %attempt_id,
                    phase = %SwapPhase::Failed,
                    error = %err,
                    "Swap failed"
                );
            }
        }
        result
    }

    async fn run(
        &self,
        attempt_id: Uuid,
        strategy: &SwapStrategy,
        snapshot: &PortfolioSnapshot,
    ) -> Result<Signature, SwapError> {
        let wallet_address = self.wallet.address().ok_or(SwapError::WalletUnavailable)?;

        let request =
            Self::resolve_request(strategy, snapshot, wallet_address, self.slippage_bps)?;
        debug!(
            attempt_id = %attempt_id,
            phase = %SwapPhase::QuoteRequested,
            from = %request.from.symbol,
            to = %request.to.symbol,
            raw_amount = request.raw_amount,
            "Requesting swap payload"
        );

        let payload = self
            .dex
            .swap(&request)
            .await
            .map_err(map_quote_error)?;
        if let Some(estimated) = payload.estimated_to_amount_raw {
            debug!(
                attempt_id = %attempt_id,
                estimated_out_raw = estimated,
                price_impact_pct = ?payload.price_impact_pct,
                "Router estimate"
            );
        }

        let mut tx = decode_swap_payload(&payload.payload_b64)?;
        debug!(
            attempt_id = %attempt_id,
            phase = %SwapPhase::PayloadDecoded,
            format = ?tx.format(),
            "Payload decoded"
        );

        let blockhash = tokio::time::timeout(self.blockhash_timeout, self.chain.latest_blockhash())
            .await
            .map_err(|_| {
                SwapError::Chain(RpcError::Timeout {
                    endpoint: "-".to_string(),
                    context: "blockhash refresh".to_string(),
                    timeout_ms: self.blockhash_timeout.as_millis() as u64,
                })
            })??;
        normalize(&mut tx, blockhash, &wallet_address);
        debug!(
            attempt_id = %attempt_id,
            phase = %SwapPhase::BlockhashRefreshed,
            "Transaction normalized"
        );

        debug!(attempt_id = %attempt_id, phase = %SwapPhase::AwaitingSignature, "Submitting");
        let submitted = tokio::time::timeout(self.submit_timeout, self.wallet.sign_and_send(tx))
            .await
            .map_err(|_| SwapError::SubmissionTimeout {
                timeout_ms: self.submit_timeout.as_millis() as u64,
            })?;

        submitted.map_err(|err| match err {
            WalletError::Unavailable => SwapError::WalletUnavailable,
            WalletError::Rejected { reason } => SwapError::SubmissionRejected { reason },
            WalletError::Signing { reason } => SwapError::SubmissionRejected { reason },
        })
    }
}

fn map_quote_error(err: DexError) -> SwapError {
    match err {
        DexError::CredentialsMissing => SwapError::Quote {
            code: "-".to_string(),
            message: "aggregator credentials not configured".to_string(),
        },
        DexError::RateLimited { code } => SwapError::Quote {
            code,
            message: "rate limited, try again shortly".to_string(),
        },
        DexError::Api { code, msg } => SwapError::Quote { code, message: msg },
        DexError::Transport(message) | DexError::Malformed(message) => SwapError::Quote {
            code: "-".to_string(),
            message,
        },
    }
}
