//! Portfolio copilot CLI
//!
//! Connects the wallet collaborator, values the portfolio through the
//! snapshot builder, and optionally asks the advisory service for strategy
//! suggestions, executing the chosen one through the swap pipeline.

// Compiler warning configuration
#![deny(unused_imports)]
#![deny(unused_mut)]
#![warn(unused_must_use)]

use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pilot::advisor::{AdvisorClient, AdvisorReply};
use pilot::config::{self, Config, DexCredentials};
use pilot::endpoints;
use pilot::okx::{DexClient, DEFAULT_BASE_URL};
use pilot::oracle::DexPriceOracle;
use pilot::registry;
use pilot::rpc::{ChainHead, EndpointSelector, RpcBalanceFetcher};
use pilot::snapshot::{BuildOutcome, SnapshotBuilder};
use pilot::swap::SwapPipeline;
use pilot::types::{PortfolioSnapshot, PriceSource};
use pilot::wallet::{reduce, KeypairWallet, WalletProvider, WalletState};

/// Command line arguments
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Question for the advisory service
    #[arg(short, long)]
    prompt: Option<String>,

    /// Execute the first suggested strategy through the swap pipeline
    #[arg(long)]
    execute: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(args.verbose);

    info!("🚀 Starting portfolio copilot");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    // Load configuration (missing file means defaults, not a failure)
    dotenvy::dotenv().ok();
    let config = load_config(&args.config);

    // Metrics endpoint
    if config.monitoring.enable_metrics {
        let metrics_port = config.monitoring.metrics_port;
        info!("📊 Starting metrics server on port {}", metrics_port);
        tokio::spawn(async move {
            if let Err(e) = endpoints::endpoint_server(metrics_port).await {
                error!("Metrics server error: {}", e);
            }
        });
    }

    // Chain access
    info!(
        "🌐 RPC candidates configured: {}",
        config.rpc.endpoints.len()
    );
    let selector = Arc::new(EndpointSelector::new(
        config.rpc.endpoints.clone(),
        Duration::from_millis(config.rpc.probe_timeout_ms),
        Duration::from_secs(config.rpc.request_timeout_secs),
    ));
    let balances = Arc::new(RpcBalanceFetcher::new(selector.clone()));

    // Aggregator client; missing credentials degrade pricing to the
    // reference table
    let credentials = DexCredentials::from_env();
    if credentials.is_none() {
        warn!("No aggregator credentials; prices degrade to reference table");
    }
    let dex = Arc::new(DexClient::new(
        DEFAULT_BASE_URL,
        credentials,
        Duration::from_secs(config.pricing.http_timeout_secs),
    )?);

    let quote_mint = config.pricing.resolved_quote_mint();
    let quote_token = registry::by_mint(&quote_mint)
        .unwrap_or_else(|| registry::descriptor_for_unknown(&quote_mint, 6));
    info!("💱 Quote asset: {} ({})", quote_token.symbol, quote_token.mint);
    let oracle = Arc::new(DexPriceOracle::new(dex.clone(), quote_token));

    let builder = Arc::new(SnapshotBuilder::new(
        balances,
        oracle,
        Duration::from_millis(config.pricing.pace_ms),
    ));

    // Wallet collaborator: absence is a degraded mode, not a crash
    let wallet: Option<Arc<KeypairWallet>> = match &config.wallet.keypair_path {
        Some(path) => match KeypairWallet::from_file(path, selector.clone()) {
            Ok(w) => Some(Arc::new(w)),
            Err(e) => {
                warn!("Wallet unavailable ({}); valuation-only mode", e);
                None
            }
        },
        None => {
            info!("No keypair configured; valuation-only mode");
            None
        }
    };

    let mut snapshot: Option<Arc<PortfolioSnapshot>> = None;
    if let Some(wallet) = &wallet {
        let address = wallet
            .connect()
            .await
            .map_err(|e| anyhow::anyhow!("wallet connect failed: {}", e))?;
        info!("💼 Wallet address: {}", address);

        spawn_wallet_watcher(wallet.clone(), builder.clone());

        match builder.build(address).await {
            BuildOutcome::Published(snap) | BuildOutcome::Cached(snap) => {
                print_snapshot(&snap);
                snapshot = Some(snap);
            }
            BuildOutcome::AlreadyInFlight => info!("Snapshot already building"),
            BuildOutcome::Superseded => info!("Snapshot pass superseded"),
        }
    }

    // Advisory round
    if let Some(prompt) = &args.prompt {
        let advisor = AdvisorClient::new(&config.advisor, config::advisor_api_key())?;
        if !advisor.is_available() {
            warn!("Advisory service unavailable (no API key)");
            return Ok(());
        }

        match advisor.suggest(prompt, snapshot.as_deref()).await {
            Ok(AdvisorReply::Text(text)) => info!("🤖 {}", text),
            Ok(AdvisorReply::Strategies(strategies)) => {
                for s in &strategies {
                    info!(
                        "💡 {} | {} -> {} | amount {:?} | est. {} {}",
                        s.title, s.from_symbol, s.to_symbol, s.amount, s.estimated_to_amount,
                        s.to_symbol
                    );
                }
                if args.execute {
                    execute_first(&config, &dex, &selector, &wallet, &snapshot, &strategies).await;
                }
            }
            Err(e) => warn!("Advisory request failed: {}", e),
        }
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "info" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn load_config(path: &str) -> Config {
    if std::path::Path::new(path).exists() {
        match Config::from_file(path) {
            Ok(config) => {
                info!("📋 Loaded configuration from {}", path);
                config
            }
            Err(e) => {
                warn!("Failed to parse {} ({}); using defaults", path, e);
                Config::default()
            }
        }
    } else {
        info!("No config file at {}; using defaults", path);
        Config::default()
    }
}

/// Reduce wallet events into connect-state and keep the snapshot current:
/// an account switch supersedes the running pass, a disconnect tears it down
fn spawn_wallet_watcher(wallet: Arc<KeypairWallet>, builder: Arc<SnapshotBuilder>) {
    let mut events = wallet.subscribe();
    tokio::spawn(async move {
        let mut state = WalletState::default();
        while let Ok(event) = events.recv().await {
            let next = reduce(state, event);
            if next.address != state.address {
                match next.address {
                    Some(address) => {
                        let _ = builder.build(address).await;
                    }
                    None => builder.cancel_all(),
                }
            }
            state = next;
        }
    });
}

fn print_snapshot(snapshot: &PortfolioSnapshot) {
    info!(
        "📈 Portfolio for {} (total ${:.2})",
        snapshot.wallet, snapshot.total_value
    );
    for holding in &snapshot.holdings {
        let marker = match holding.quote.source {
            PriceSource::Live => "",
            PriceSource::Fallback => " (ref)",
        };
        info!(
            "  {:>8}: {:.6} @ ${:.4}{} = ${:.2}",
            holding.balance.token.symbol,
            holding.balance.ui_amount,
            holding.quote.unit_price,
            marker,
            holding.value()
        );
    }
}

async fn execute_first(
    config: &Config,
    dex: &Arc<DexClient>,
    selector: &Arc<EndpointSelector>,
    wallet: &Option<Arc<KeypairWallet>>,
    snapshot: &Option<Arc<PortfolioSnapshot>>,
    strategies: &[pilot::types::SwapStrategy],
) {
    let Some(wallet) = wallet else {
        warn!("Cannot execute: no wallet connected");
        return;
    };
    let Some(snapshot) = snapshot else {
        warn!("Cannot execute: no snapshot available");
        return;
    };
    let Some(strategy) = strategies.first() else {
        return;
    };

    let chain: Arc<dyn ChainHead> = selector.clone();
    let provider: Arc<dyn WalletProvider> = wallet.clone();
    let pipeline = SwapPipeline::new(
        dex.clone(),
        chain,
        provider,
        config.swap.slippage_bps,
        Duration::from_secs(config.swap.blockhash_timeout_secs),
        Duration::from_secs(config.swap.submit_timeout_secs),
    );

    info!("🔄 Executing strategy: {}", strategy.title);
    match pipeline.execute(strategy, snapshot).await {
        Ok(signature) => info!("✅ Swap confirmed: {}", signature),
        Err(e) => error!("{}", e.user_message()),
    }
}
