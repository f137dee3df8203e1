//! Configuration module
//!
//! Structured configuration loaded from a TOML file, with credentials and the
//! quote-asset reference supplied through the environment. Missing
//! credentials are a recoverable condition (the affected feature degrades),
//! never a startup error.

use serde::{Deserialize, Serialize};

use crate::registry;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// RPC endpoints configuration
    #[serde(default)]
    pub rpc: RpcConfig,

    /// Price oracle configuration
    #[serde(default)]
    pub pricing: PricingConfig,

    /// Swap pipeline configuration
    #[serde(default)]
    pub swap: SwapConfig,

    /// Wallet configuration
    #[serde(default)]
    pub wallet: WalletConfig,

    /// Advisory service configuration
    #[serde(default)]
    pub advisor: AdvisorConfig,

    /// Monitoring and metrics
    #[serde(default)]
    pub monitoring: MonitoringConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcConfig {
    /// Candidate endpoints, most reliable first. Tried in order, first
    /// liveness success wins.
    #[serde(default = "default_endpoints")]
    pub endpoints: Vec<String>,

    /// Liveness probe timeout per candidate, in milliseconds
    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,

    /// Timeout for regular RPC calls, in seconds
    #[serde(default = "default_rpc_timeout")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricingConfig {
    /// Fixed delay between per-token quote requests within one snapshot pass,
    /// in milliseconds
    #[serde(default = "default_pace_ms")]
    pub pace_ms: u64,

    /// HTTP timeout for quote requests, in seconds
    #[serde(default = "default_price_http_timeout")]
    pub http_timeout_secs: u64,

    /// Quote asset mint override; falls back to the PILOT_QUOTE_MINT
    /// environment variable, then the registry default
    #[serde(default)]
    pub quote_mint: Option<String>,
}

impl PricingConfig {
    /// Resolve the quote asset: config override, then environment, then the
    /// registry default
    pub fn resolved_quote_mint(&self) -> String {
        if let Some(mint) = &self.quote_mint {
            return mint.clone();
        }
        std::env::var("PILOT_QUOTE_MINT")
            .unwrap_or_else(|_| registry::DEFAULT_QUOTE_MINT.to_string())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwapConfig {
    /// Slippage tolerance in basis points
    #[serde(default = "default_slippage_bps")]
    pub slippage_bps: u16,

    /// Bounded wait on blockhash refresh, in seconds
    #[serde(default = "default_blockhash_timeout")]
    pub blockhash_timeout_secs: u64,

    /// Bounded wait on sign-and-submit, in seconds
    #[serde(default = "default_submit_timeout")]
    pub submit_timeout_secs: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WalletConfig {
    /// Path to a keypair file. Absent means no wallet provider: valuation
    /// still works, swap execution reports the feature unavailable.
    #[serde(default)]
    pub keypair_path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdvisorConfig {
    /// Chat-completions endpoint
    #[serde(default = "default_advisor_url")]
    pub base_url: String,

    /// Model identifier
    #[serde(default = "default_advisor_model")]
    pub model: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringConfig {
    /// Enable Prometheus metrics
    #[serde(default = "default_true")]
    pub enable_metrics: bool,

    /// Metrics port
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,
}

// Default value functions
fn default_endpoints() -> Vec<String> {
    vec!["https://api.mainnet-beta.solana.com".to_string()]
}
fn default_probe_timeout_ms() -> u64 {
    2_000
}
fn default_rpc_timeout() -> u64 {
    30
}
fn default_pace_ms() -> u64 {
    3_000
}
fn default_price_http_timeout() -> u64 {
    10
}
fn default_slippage_bps() -> u16 {
    50
}
fn default_blockhash_timeout() -> u64 {
    10
}
fn default_submit_timeout() -> u64 {
    30
}
fn default_advisor_url() -> String {
    "https://api.perplexity.ai/chat/completions".to_string()
}
fn default_advisor_model() -> String {
    "pplx-70b-online".to_string()
}
fn default_metrics_port() -> u16 {
    9090
}
fn default_true() -> bool {
    true
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            endpoints: default_endpoints(),
            probe_timeout_ms: default_probe_timeout_ms(),
            request_timeout_secs: default_rpc_timeout(),
        }
    }
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            pace_ms: default_pace_ms(),
            http_timeout_secs: default_price_http_timeout(),
            quote_mint: None,
        }
    }
}

impl Default for SwapConfig {
    fn default() -> Self {
        Self {
            slippage_bps: default_slippage_bps(),
            blockhash_timeout_secs: default_blockhash_timeout(),
            submit_timeout_secs: default_submit_timeout(),
        }
    }
}

impl Default for AdvisorConfig {
    fn default() -> Self {
        Self {
            base_url: default_advisor_url(),
            model: default_advisor_model(),
        }
    }
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            enable_metrics: default_true(),
            metrics_port: default_metrics_port(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load configuration after sourcing a .env file, if present
    pub fn from_file_with_env(path: &str) -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_file(path)
    }
}

/// Credentials for the signed quote/swap REST boundary. All four pieces are
/// required; anything missing means the boundary is unreachable and pricing
/// degrades to the static reference table.
#[derive(Debug, Clone)]
pub struct DexCredentials {
    pub api_key: String,
    pub secret_key: String,
    pub passphrase: String,
    pub project_id: String,
}

impl DexCredentials {
    pub fn from_env() -> Option<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary lookup; returns None unless every credential
    /// is present and non-empty
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Option<Self> {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());
        Some(Self {
            api_key: get("OKX_API_KEY")?,
            secret_key: get("OKX_SECRET_KEY")?,
            passphrase: get("OKX_API_PASSPHRASE")?,
            project_id: get("OKX_PROJECT_ID")?,
        })
    }
}

/// Advisory service API key
pub fn advisor_api_key() -> Option<String> {
    std::env::var("PPLX_API_KEY").ok().filter(|v| !v.is_empty())
}
