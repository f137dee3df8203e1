//! Error taxonomy for the valuation and swap pipeline
//!
//! Balance and pricing failures are converted to degraded data at the lowest
//! component boundary and never reach the caller as raw transport errors.
//! Swap pipeline failures propagate as typed, user-displayable errors and are
//! never retried automatically.

use solana_client::client_error::ClientError;
use thiserror::Error;

/// Errors from the chain RPC layer (endpoint selection, balances, blockhash)
#[derive(Debug, Clone, Error)]
pub enum RpcError {
    /// Every candidate endpoint failed its liveness probe
    #[error("no RPC endpoint available (candidates: {candidates}, last error: {last_error})")]
    EndpointUnavailable {
        candidates: usize,
        last_error: String,
    },

    /// A single RPC call failed; the caller decides how to degrade
    #[error("RPC call failed: {context}: {message} (endpoint: {endpoint})")]
    Call {
        endpoint: String,
        context: String,
        message: String,
    },

    /// Bounded wait elapsed
    #[error("RPC call timed out after {timeout_ms}ms: {context} (endpoint: {endpoint})")]
    Timeout {
        endpoint: String,
        context: String,
        timeout_ms: u64,
    },
}

impl RpcError {
    /// Whether the whole endpoint list was exhausted (vs. a single call failing)
    pub fn is_exhausted(&self) -> bool {
        matches!(self, RpcError::EndpointUnavailable { .. })
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, RpcError::Timeout { .. })
    }

    /// Wrap a `ClientError` with the endpoint and call context it came from
    pub fn from_client_error(err: ClientError, endpoint: &str, context: &str) -> Self {
        RpcError::Call {
            endpoint: endpoint.to_string(),
            context: context.to_string(),
            message: err.to_string(),
        }
    }
}

/// Errors internal to the price oracle. These never escape `price_of`; they
/// select the fallback path and the log line.
#[derive(Debug, Clone, Error)]
pub enum PriceError {
    /// Upstream throttled the request; the caller's pacing loop supplies the
    /// delay before the next token, never an inline retry
    #[error("price service rate limited (code: {code})")]
    RateLimited { code: String },

    /// Any other pricing failure
    #[error("price unavailable for {mint}: {message}")]
    Unavailable { mint: String, message: String },

    /// Credentials not configured; no network call was attempted
    #[error("price service credentials not configured")]
    CredentialsMissing,
}

impl PriceError {
    pub fn is_rate_limit(&self) -> bool {
        matches!(self, PriceError::RateLimited { .. })
    }
}

/// Errors from the swap pipeline; fatal to the attempt, surfaced to the user
#[derive(Debug, Error)]
pub enum SwapError {
    /// Strategy references a symbol outside the registry
    #[error("unknown token: {symbol}")]
    UnknownToken { symbol: String },

    /// Percentage spec references a token absent from the snapshot (or held
    /// at zero balance)
    #[error("no balance for {symbol} in current portfolio")]
    MissingBalance { symbol: String },

    /// Strategy amount could not be interpreted
    #[error("invalid amount spec: {raw}")]
    InvalidAmount { raw: String },

    /// Swap-quote service refused or failed the request
    #[error("swap quote failed: {message} (code: {code})")]
    Quote { code: String, message: String },

    /// Payload interpretable under neither transaction format
    #[error("undecodable transaction payload: {message}")]
    Decode { message: String },

    /// Chain access failed during blockhash refresh
    #[error(transparent)]
    Chain(#[from] RpcError),

    /// Wallet collaborator not available
    #[error("wallet unavailable")]
    WalletUnavailable,

    /// Sign-and-submit did not complete within the bounded wait
    #[error("submission timed out after {timeout_ms}ms")]
    SubmissionTimeout { timeout_ms: u64 },

    /// Wallet or chain rejected the transaction
    #[error("submission rejected: {reason}")]
    SubmissionRejected { reason: String },
}

impl SwapError {
    /// Input-validation failures happen before any network call
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            SwapError::UnknownToken { .. }
                | SwapError::MissingBalance { .. }
                | SwapError::InvalidAmount { .. }
        )
    }

    /// Short message suitable for direct display
    pub fn user_message(&self) -> String {
        match self {
            SwapError::UnknownToken { symbol } => {
                format!("Unsupported token: {}", symbol)
            }
            SwapError::MissingBalance { symbol } => {
                format!("You do not hold any {} to swap", symbol)
            }
            SwapError::InvalidAmount { raw } => {
                format!("Could not interpret swap amount \"{}\"", raw)
            }
            SwapError::SubmissionTimeout { .. } => {
                "The wallet did not confirm the swap in time".to_string()
            }
            SwapError::SubmissionRejected { reason } => {
                format!("Swap rejected: {}", reason)
            }
            SwapError::WalletUnavailable => "Connect a wallet first".to_string(),
            other => format!("Swap failed: {}", other),
        }
    }
}

/// Wallet collaborator errors
#[derive(Debug, Clone, Error)]
pub enum WalletError {
    /// No provider is present at runtime; feature unavailable, not a crash
    #[error("no wallet provider available")]
    Unavailable,

    /// The provider refused to sign or submit
    #[error("wallet rejected the transaction: {reason}")]
    Rejected { reason: String },

    /// The transaction could not be signed (signer not among required keys)
    #[error("cannot sign: {reason}")]
    Signing { reason: String },
}

/// Advisory collaborator errors
#[derive(Debug, Error)]
pub enum AdvisorError {
    #[error("advisory service credentials not configured")]
    CredentialsMissing,

    #[error("advisory request failed: {0}")]
    Http(String),

    #[error("advisory response missing expected fields")]
    Malformed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rpc_error_classification() {
        let exhausted = RpcError::EndpointUnavailable {
            candidates: 3,
            last_error: "connection refused".to_string(),
        };
        assert!(exhausted.is_exhausted());
        assert!(!exhausted.is_timeout());

        let timeout = RpcError::Timeout {
            endpoint: "https://rpc.test".to_string(),
            context: "get_latest_blockhash".to_string(),
            timeout_ms: 5000,
        };
        assert!(timeout.is_timeout());
        assert!(!timeout.is_exhausted());
    }

    #[test]
    fn test_swap_validation_errors() {
        assert!(SwapError::UnknownToken {
            symbol: "DOGE".to_string()
        }
        .is_validation());
        assert!(SwapError::MissingBalance {
            symbol: "wBTC".to_string()
        }
        .is_validation());
        assert!(!SwapError::SubmissionTimeout { timeout_ms: 30000 }.is_validation());
    }

    #[test]
    fn test_user_messages_name_the_token() {
        let err = SwapError::UnknownToken {
            symbol: "PEPE".to_string(),
        };
        assert!(err.user_message().contains("PEPE"));

        let err = SwapError::MissingBalance {
            symbol: "wETH".to_string(),
        };
        assert!(err.user_message().contains("wETH"));
    }

    #[test]
    fn test_price_error_rate_limit_flag() {
        assert!(PriceError::RateLimited {
            code: "50011".to_string()
        }
        .is_rate_limit());
        assert!(!PriceError::CredentialsMissing.is_rate_limit());
    }
}
