//! Registry probe tool
//!
//! Checks every registry token against the aggregator quote endpoint using
//! the same pacing as a snapshot pass, and reports which addresses are
//! quotable. Useful after editing the registry: a stale mint shows up as a
//! liquidity error rather than a silent zero price.

use anyhow::Result;
use clap::Parser;
use std::time::Duration;
use tracing::{info, warn};

use pilot::config::DexCredentials;
use pilot::okx::{DexClient, DexError, DEFAULT_BASE_URL};
use pilot::registry;

#[derive(Parser, Debug)]
#[command(author, version, about = "Verify registry token addresses against the aggregator", long_about = None)]
struct Args {
    /// Delay between probes in milliseconds
    #[arg(long, default_value = "3000")]
    pace_ms: u64,

    /// Retries per token when rate limited
    #[arg(long, default_value = "2")]
    max_retries: u32,

    /// Delay before a rate-limit retry in milliseconds
    #[arg(long, default_value = "5000")]
    retry_delay_ms: u64,
}

#[derive(Debug, PartialEq, Eq)]
enum ProbeResult {
    Valid,
    /// Token is fine, request needs (different) authentication
    ValidAuthRequired,
    /// No liquidity: likely a wrong or outdated address
    InvalidLiquidity,
    RateLimited,
    Error(String),
    Skipped,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let Some(credentials) = DexCredentials::from_env() else {
        warn!("Aggregator credentials not configured; nothing to probe");
        return Ok(());
    };
    let client = DexClient::new(DEFAULT_BASE_URL, Some(credentials), Duration::from_secs(10))?;

    let quote_mint = registry::DEFAULT_QUOTE_MINT;
    let tokens = registry::base_tokens();
    info!("Probing {} registry tokens against {}", tokens.len(), quote_mint);

    let mut valid = 0usize;
    let mut invalid = 0usize;
    let mut unknown = 0usize;

    for (i, token) in tokens.iter().enumerate() {
        if i > 0 {
            tokio::time::sleep(Duration::from_millis(args.pace_ms)).await;
        }

        let result = probe(&client, &token.mint, quote_mint, &args).await;
        match &result {
            ProbeResult::Valid => {
                valid += 1;
                info!("{}: ok", token.symbol);
            }
            ProbeResult::ValidAuthRequired => {
                valid += 1;
                info!("{}: ok (authentication required)", token.symbol);
            }
            ProbeResult::Skipped => {
                valid += 1;
                info!("{}: skipped (quote asset)", token.symbol);
            }
            ProbeResult::InvalidLiquidity => {
                invalid += 1;
                warn!("{}: no liquidity, address likely wrong", token.symbol);
            }
            ProbeResult::RateLimited => {
                unknown += 1;
                warn!("{}: still rate limited, re-run later", token.symbol);
            }
            ProbeResult::Error(msg) => {
                invalid += 1;
                warn!("{}: {}", token.symbol, msg);
            }
        }
    }

    info!(
        "Summary: {} valid, {} invalid, {} unverified of {}",
        valid,
        invalid,
        unknown,
        tokens.len()
    );
    Ok(())
}

async fn probe(client: &DexClient, mint: &str, quote_mint: &str, args: &Args) -> ProbeResult {
    // A token cannot be quoted against itself
    if mint == quote_mint {
        return ProbeResult::Skipped;
    }

    let token = registry::by_mint(mint).expect("probing registry tokens only");
    let raw = token.to_raw(registry::probe_ui_amount(mint)).max(1);

    let mut attempt = 0;
    loop {
        match client.quote(mint, quote_mint, raw).await {
            Ok(_) => return ProbeResult::Valid,
            Err(DexError::RateLimited { .. }) if attempt < args.max_retries => {
                attempt += 1;
                tokio::time::sleep(Duration::from_millis(args.retry_delay_ms)).await;
            }
            Err(DexError::RateLimited { .. }) => return ProbeResult::RateLimited,
            // 50116: valid pair, credentials required; 50113: signature
            // mismatch (still proves the pair resolves)
            Err(DexError::Api { code, .. }) if code == "50116" || code == "50113" => {
                return ProbeResult::ValidAuthRequired
            }
            Err(DexError::Api { code, .. }) if code == "82000" => {
                return ProbeResult::InvalidLiquidity
            }
            Err(e) => return ProbeResult::Error(e.to_string()),
        }
    }
}
