//! Signed REST client for the DEX aggregator quote/swap boundary
//!
//! Two logical operations are consumed: `quote` (read-only exchange-rate
//! lookup) and `swap` (same parameters, additionally returns an unsigned
//! transaction payload). Requests are signed with HMAC-SHA256 over
//! `timestamp + method + path + queryString`, Base64-encoded. A non-zero
//! `code` in the response body is an application-level error distinct from
//! transport failure; code 50011 (or HTTP 429) means rate limiting.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use chrono::{SecondsFormat, Utc};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use thiserror::Error;
use tracing::debug;

use crate::config::DexCredentials;
use crate::types::SwapTransactionRequest;

type HmacSha256 = Hmac<Sha256>;

pub const DEFAULT_BASE_URL: &str = "https://web3.okx.com";

/// Aggregator-side chain identifier for Solana mainnet
pub const SOLANA_CHAIN_ID: &str = "501";

const QUOTE_PATH: &str = "/api/v5/dex/aggregator/quote";
const SWAP_PATH: &str = "/api/v5/dex/aggregator/swap";

/// Application-level rate-limit code
const RATE_LIMIT_CODE: &str = "50011";

/// Errors from the aggregator boundary. The oracle converts these to
/// fallback quotes; the swap pipeline surfaces them as typed failures.
#[derive(Debug, Clone, Error)]
pub enum DexError {
    /// No credentials configured; no call was attempted
    #[error("aggregator credentials not configured")]
    CredentialsMissing,

    /// Upstream throttling (HTTP 429 or body code 50011)
    #[error("aggregator rate limited (code: {code})")]
    RateLimited { code: String },

    /// Application-level error reported in the response body
    #[error("aggregator error: {msg} (code: {code})")]
    Api { code: String, msg: String },

    /// Transport-level failure
    #[error("aggregator transport error: {0}")]
    Transport(String),

    /// Response body did not match the expected shape
    #[error("malformed aggregator response: {0}")]
    Malformed(String),
}

impl DexError {
    pub fn is_rate_limit(&self) -> bool {
        matches!(self, DexError::RateLimited { .. })
    }
}

/// Result of a `quote` call, raw units on both legs
#[derive(Debug, Clone, PartialEq)]
pub struct QuoteOutcome {
    pub from_amount_raw: u64,
    pub to_amount_raw: u64,
    pub to_decimals: u8,
}

/// Result of a `swap` call: the unsigned transaction payload plus the
/// router's own estimate
#[derive(Debug, Clone, PartialEq)]
pub struct SwapPayload {
    /// Base64-encoded transaction bytes, format undeclared by upstream
    pub payload_b64: String,
    pub estimated_to_amount_raw: Option<u64>,
    pub price_impact_pct: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct ApiEnvelope<T> {
    code: String,
    #[serde(default)]
    msg: String,
    #[serde(default = "Vec::new")]
    data: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct QuoteData {
    #[serde(rename = "fromTokenAmount")]
    from_token_amount: String,
    #[serde(rename = "toTokenAmount")]
    to_token_amount: String,
    #[serde(rename = "toToken")]
    to_token: QuoteTokenInfo,
}

#[derive(Debug, Deserialize)]
struct QuoteTokenInfo {
    decimal: String,
}

#[derive(Debug, Deserialize)]
struct SwapData {
    tx: Option<TxEnvelope>,
    #[serde(rename = "routerResult", default)]
    router_result: Option<RouterResult>,
    #[serde(rename = "priceImpactPercentage", default)]
    price_impact_percentage: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RouterResult {
    #[serde(rename = "toTokenAmount", default)]
    to_token_amount: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TxEnvelope {
    data: String,
}

/// HTTP client for the aggregator with request signing
#[derive(Debug, Clone)]
pub struct DexClient {
    http: reqwest::Client,
    base_url: String,
    credentials: Option<DexCredentials>,
    chain_id: String,
}

impl DexClient {
    pub fn new(
        base_url: impl Into<String>,
        credentials: Option<DexCredentials>,
        timeout: std::time::Duration,
    ) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.into(),
            credentials,
            chain_id: SOLANA_CHAIN_ID.to_string(),
        })
    }

    pub fn has_credentials(&self) -> bool {
        self.credentials.is_some()
    }

    /// Read-only exchange-rate lookup for a raw token amount
    pub async fn quote(
        &self,
        from_mint: &str,
        to_mint: &str,
        raw_amount: u64,
    ) -> Result<QuoteOutcome, DexError> {
        // chainIndex duplicates chainId for the newer API revision
        let query = format!(
            "?chainIndex={}&chainId={}&fromTokenAddress={}&toTokenAddress={}&amount={}",
            self.chain_id, self.chain_id, from_mint, to_mint, raw_amount
        );
        let data: QuoteData = self.signed_get(QUOTE_PATH, &query).await?;

        let from_amount_raw = parse_raw(&data.from_token_amount, "fromTokenAmount")?;
        let to_amount_raw = parse_raw(&data.to_token_amount, "toTokenAmount")?;
        let to_decimals = data
            .to_token
            .decimal
            .parse::<u8>()
            .map_err(|_| DexError::Malformed(format!("toToken.decimal: {}", data.to_token.decimal)))?;

        Ok(QuoteOutcome {
            from_amount_raw,
            to_amount_raw,
            to_decimals,
        })
    }

    /// Same parameters as `quote` plus slippage and wallet; returns the
    /// prepared (unsigned) transaction payload
    pub async fn swap(&self, request: &SwapTransactionRequest) -> Result<SwapPayload, DexError> {
        let slippage = format_slippage(request.slippage_bps);
        let query = format!(
            "?chainId={}&fromTokenAddress={}&toTokenAddress={}&amount={}&slippage={}&userWalletAddress={}",
            self.chain_id,
            request.from.mint,
            request.to.mint,
            request.raw_amount,
            slippage,
            request.wallet
        );
        let data: SwapData = self.signed_get(SWAP_PATH, &query).await?;

        let payload_b64 = data
            .tx
            .map(|t| t.data)
            .filter(|d| !d.is_empty())
            .ok_or_else(|| DexError::Malformed("missing tx payload".to_string()))?;
        let estimated_to_amount_raw = data
            .router_result
            .and_then(|r| r.to_token_amount)
            .and_then(|v| v.parse::<u64>().ok());
        let price_impact_pct = data
            .price_impact_percentage
            .and_then(|v| v.parse::<f64>().ok());

        Ok(SwapPayload {
            payload_b64,
            estimated_to_amount_raw,
            price_impact_pct,
        })
    }

    async fn signed_get<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        query: &str,
    ) -> Result<T, DexError> {
        let creds = self
            .credentials
            .as_ref()
            .ok_or(DexError::CredentialsMissing)?;

        let timestamp = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
        let signature = sign_request(&creds.secret_key, &timestamp, "GET", path, query);
        let url = format!("{}{}{}", self.base_url, path, query);

        debug!(path = %path, "Signed aggregator request");

        let response = self
            .http
            .get(&url)
            .header("Content-Type", "application/json")
            .header("OK-ACCESS-KEY", &creds.api_key)
            .header("OK-ACCESS-SIGN", &signature)
            .header("OK-ACCESS-TIMESTAMP", &timestamp)
            .header("OK-ACCESS-PASSPHRASE", &creds.passphrase)
            .header("OK-ACCESS-PROJECT", &creds.project_id)
            .send()
            .await
            .map_err(|e| DexError::Transport(e.to_string()))?;

        if response.status().as_u16() == 429 {
            return Err(DexError::RateLimited {
                code: "429".to_string(),
            });
        }
        if !response.status().is_success() {
            return Err(DexError::Transport(format!(
                "HTTP {}",
                response.status().as_u16()
            )));
        }

        let envelope: ApiEnvelope<T> = response
            .json()
            .await
            .map_err(|e| DexError::Malformed(e.to_string()))?;

        if envelope.code != "0" {
            if envelope.code == RATE_LIMIT_CODE {
                return Err(DexError::RateLimited {
                    code: envelope.code,
                });
            }
            return Err(DexError::Api {
                code: envelope.code,
                msg: envelope.msg,
            });
        }

        envelope
            .data
            .into_iter()
            .next()
            .ok_or_else(|| DexError::Malformed("empty data array".to_string()))
    }
}

/// Base64(HMAC-SHA256(timestamp + method + path + queryOrBody))
pub fn sign_request(secret: &str, timestamp: &str, method: &str, path: &str, query: &str) -> String {
    let payload = format!("{}{}{}{}", timestamp, method, path, query);
    // new_from_slice only fails on zero-length keys, which credentials
    // loading already rejects
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .unwrap_or_else(|_| HmacSha256::new_from_slice(b"-").expect("non-empty key"));
    mac.update(payload.as_bytes());
    BASE64.encode(mac.finalize().into_bytes())
}

fn parse_raw(value: &str, field: &str) -> Result<u64, DexError> {
    value
        .parse::<u64>()
        .map_err(|_| DexError::Malformed(format!("{}: {}", field, value)))
}

/// Basis points to the percentage string the API expects (50 -> "0.5")
fn format_slippage(bps: u16) -> String {
    let pct = bps as f64 / 100.0;
    format!("{}", pct)
}
