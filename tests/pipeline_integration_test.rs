//! End-to-end pipeline scenarios
//!
//! Single-flight snapshot builds, cancellation on wallet change, degraded
//! valuation when every endpoint fails, and swap execution from strategy to
//! submitted transaction with mock collaborators at every boundary.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use solana_sdk::hash::Hash;
use solana_sdk::message::Message;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
#[allow(deprecated)]
use solana_sdk::system_instruction;
use solana_sdk::transaction::Transaction;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;

use pilot::compat;
use pilot::config::DexCredentials;
use pilot::errors::{RpcError, SwapError, WalletError};
use pilot::okx::DexClient;
use pilot::oracle::{DexPriceOracle, PriceOracle};
use pilot::registry;
use pilot::rpc::{BalanceSource, ChainHead, EndpointSelector, RpcBalanceFetcher};
use pilot::snapshot::{BuildOutcome, SnapshotBuilder};
use pilot::swap::SwapPipeline;
use pilot::types::{
    AmountSpec, Balance, Holding, PortfolioSnapshot, PreparedTransaction, PriceQuote, PriceSource,
    SwapStrategy, TokenDescriptor, TxFormat, WalletBalances,
};
use pilot::wallet::{WalletEvent, WalletProvider};

/// Balance source that counts calls and can hold each fetch open for a while
struct CountingBalances {
    balances: WalletBalances,
    delay: Duration,
    calls: AtomicUsize,
}

impl CountingBalances {
    fn new(balances: WalletBalances, delay: Duration) -> Self {
        Self {
            balances,
            delay,
            calls: AtomicUsize::new(0),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BalanceSource for CountingBalances {
    async fn fetch(&self, _wallet: &Pubkey) -> Result<WalletBalances, RpcError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        Ok(self.balances.clone())
    }
}

/// Oracle serving the static reference table, counting calls
struct TablePrices {
    calls: AtomicUsize,
}

impl TablePrices {
    fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl PriceOracle for TablePrices {
    async fn price_of(&self, token: &TokenDescriptor) -> PriceQuote {
        self.calls.fetch_add(1, Ordering::SeqCst);
        PriceQuote {
            mint: token.mint.clone(),
            unit_price: registry::fallback_price(&token.mint),
            source: PriceSource::Fallback,
        }
    }
}

/// Chain head returning a fixed hash, counting calls
struct FixedChainHead {
    hash: Hash,
    calls: AtomicUsize,
}

impl FixedChainHead {
    fn new(hash: Hash) -> Self {
        Self {
            hash,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl ChainHead for FixedChainHead {
    async fn latest_blockhash(&self) -> Result<Hash, RpcError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.hash)
    }
}

/// Wallet provider that records the transaction it was asked to submit
struct RecordingWallet {
    address: Pubkey,
    sent: Mutex<Option<PreparedTransaction>>,
    events: broadcast::Sender<WalletEvent>,
}

impl RecordingWallet {
    fn new(address: Pubkey) -> Self {
        let (events, _) = broadcast::channel(16);
        Self {
            address,
            sent: Mutex::new(None),
            events,
        }
    }

    fn sent(&self) -> Option<PreparedTransaction> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl WalletProvider for RecordingWallet {
    async fn connect(&self) -> Result<Pubkey, WalletError> {
        Ok(self.address)
    }

    async fn disconnect(&self) {}

    fn address(&self) -> Option<Pubkey> {
        Some(self.address)
    }

    fn subscribe(&self) -> broadcast::Receiver<WalletEvent> {
        self.events.subscribe()
    }

    async fn sign_and_send(&self, tx: PreparedTransaction) -> Result<Signature, WalletError> {
        *self.sent.lock().unwrap() = Some(tx);
        Ok(Signature::default())
    }
}

fn creds() -> DexCredentials {
    DexCredentials {
        api_key: "key".to_string(),
        secret_key: "secret".to_string(),
        passphrase: "phrase".to_string(),
        project_id: "project".to_string(),
    }
}

fn strategy(from: &str, to: &str, amount: AmountSpec) -> SwapStrategy {
    SwapStrategy {
        id: "s-1".to_string(),
        title: "test strategy".to_string(),
        description: String::new(),
        from_symbol: from.to_string(),
        to_symbol: to.to_string(),
        amount,
        estimated_to_amount: 0.0,
    }
}

fn snapshot_holding(wallet: Pubkey, symbol: &str, ui_amount: f64) -> PortfolioSnapshot {
    let token = registry::by_symbol(symbol).unwrap();
    let raw = token.to_raw(ui_amount);
    PortfolioSnapshot {
        wallet,
        holdings: vec![Holding {
            balance: Balance::new(token.clone(), raw),
            quote: PriceQuote {
                mint: token.mint,
                unit_price: 1.0,
                source: PriceSource::Fallback,
            },
        }],
        total_value: ui_amount,
        timestamp: chrono::Utc::now(),
    }
}

fn legacy_payload_b64(payer: &Pubkey) -> String {
    let recipient = Pubkey::new_unique();
    #[allow(deprecated)]
    let instruction = system_instruction::transfer(payer, &recipient, 1000);
    let message = Message::new(&[instruction], Some(payer));
    let tx = Transaction::new_unsigned(message);
    BASE64.encode(bincode::serialize(&tx).unwrap())
}

#[tokio::test]
async fn concurrent_builds_for_one_wallet_fetch_once() {
    let source = Arc::new(CountingBalances::new(
        WalletBalances::default(),
        Duration::from_millis(100),
    ));
    let prices = Arc::new(TablePrices::new());
    let builder = SnapshotBuilder::new(source.clone(), prices, Duration::ZERO);
    let wallet = Pubkey::new_unique();

    let (first, second) = tokio::join!(builder.build(wallet), builder.build(wallet));

    // One pass ran; the other observed it without re-entering the pipeline
    let published = [&first, &second]
        .iter()
        .filter(|o| matches!(o, BuildOutcome::Published(_)))
        .count();
    let observed = [&first, &second]
        .iter()
        .filter(|o| matches!(o, BuildOutcome::AlreadyInFlight | BuildOutcome::Cached(_)))
        .count();
    assert_eq!(published, 1);
    assert_eq!(observed, 1);
    assert_eq!(source.calls(), 1);

    // A later request for the same wallet is served from cache
    assert!(matches!(builder.build(wallet).await, BuildOutcome::Cached(_)));
    assert_eq!(source.calls(), 1);
}

#[tokio::test]
async fn wallet_change_supersedes_in_flight_pass() {
    let source = Arc::new(CountingBalances::new(
        WalletBalances::default(),
        Duration::from_millis(150),
    ));
    let prices = Arc::new(TablePrices::new());
    let builder = Arc::new(SnapshotBuilder::new(source, prices, Duration::ZERO));
    let mut published = builder.subscribe();

    let wallet_a = Pubkey::new_unique();
    let wallet_b = Pubkey::new_unique();

    let first_pass = {
        let builder = builder.clone();
        tokio::spawn(async move { builder.build(wallet_a).await })
    };
    // Let the first pass reach its balance fetch before switching wallets
    tokio::time::sleep(Duration::from_millis(30)).await;

    let second = builder.build(wallet_b).await;
    let first = first_pass.await.unwrap();

    assert!(matches!(first, BuildOutcome::Superseded));
    let BuildOutcome::Published(snapshot) = second else {
        panic!("expected the new wallet's pass to publish");
    };
    assert_eq!(snapshot.wallet, wallet_b);

    // Exactly one snapshot was ever published, and it is the new wallet's
    assert_eq!(published.recv().await.unwrap().wallet, wallet_b);
    assert!(published.try_recv().is_err());
    assert_eq!(builder.latest().unwrap().wallet, wallet_b);
}

#[tokio::test]
async fn all_endpoints_failing_yield_zero_value_snapshot() {
    // Unroutable candidates: selection fails, balances degrade to zero
    let selector = Arc::new(EndpointSelector::new(
        vec![
            "http://127.0.0.1:1".to_string(),
            "http://127.0.0.1:2".to_string(),
        ],
        Duration::from_millis(300),
        Duration::from_secs(1),
    ));
    let balances = Arc::new(RpcBalanceFetcher::new(selector));

    // No credentials: every price comes from the reference table, no network
    let dex = Arc::new(DexClient::new("http://127.0.0.1:1", None, Duration::from_secs(1)).unwrap());
    let oracle = Arc::new(DexPriceOracle::new(
        dex,
        registry::by_symbol("USDC").unwrap(),
    ));

    let builder = SnapshotBuilder::new(balances, oracle, Duration::ZERO);
    let BuildOutcome::Published(snapshot) = builder.build(Pubkey::new_unique()).await else {
        panic!("expected a published snapshot despite RPC failure");
    };

    assert_eq!(snapshot.total_value, 0.0);
    assert_eq!(snapshot.holdings.len(), registry::base_tokens().len());
    for holding in &snapshot.holdings {
        assert_eq!(holding.balance.raw_amount, 0);
    }
}

#[tokio::test]
async fn unknown_token_fails_before_any_network_call() {
    let mut server = mockito::Server::new_async().await;
    let dex_mock = server
        .mock("GET", mockito::Matcher::Any)
        .expect(0)
        .create_async()
        .await;

    let dex = Arc::new(
        DexClient::new(server.url(), Some(creds()), Duration::from_secs(2)).unwrap(),
    );
    let chain = Arc::new(FixedChainHead::new(Hash::new_unique()));
    let wallet = Arc::new(RecordingWallet::new(Pubkey::new_unique()));
    let pipeline = SwapPipeline::new(
        dex,
        chain.clone(),
        wallet.clone(),
        50,
        Duration::from_secs(5),
        Duration::from_secs(5),
    );

    let snapshot = snapshot_holding(wallet.address, "SOL", 10.0);
    let err = pipeline
        .execute(
            &strategy("DOGE", "USDC", AmountSpec::Absolute(1.0)),
            &snapshot,
        )
        .await
        .unwrap_err();

    assert!(matches!(err, SwapError::UnknownToken { symbol } if symbol == "DOGE"));
    assert_eq!(chain.calls.load(Ordering::SeqCst), 0);
    assert!(wallet.sent().is_none());
    dex_mock.assert_async().await;
}

#[tokio::test]
async fn legacy_payload_swap_is_normalized_and_submitted() {
    let wallet_address = Pubkey::new_unique();
    // The prepared payload arrives with somebody else's fee payer and a stale
    // blockhash; normalization must overwrite both
    let upstream_payer = Pubkey::new_unique();
    let payload = legacy_payload_b64(&upstream_payer);

    let mut server = mockito::Server::new_async().await;
    let swap_mock = server
        .mock(
            "GET",
            mockito::Matcher::Regex(r"^/api/v5/dex/aggregator/swap".to_string()),
        )
        .with_status(200)
        .with_body(format!(
            r#"{{"code":"0","msg":"","data":[{{"tx":{{"data":"{}"}},"routerResult":{{"toTokenAmount":"1490000000"}}}}]}}"#,
            payload
        ))
        .create_async()
        .await;

    let dex = Arc::new(
        DexClient::new(server.url(), Some(creds()), Duration::from_secs(2)).unwrap(),
    );
    let fresh_hash = Hash::new_unique();
    let chain = Arc::new(FixedChainHead::new(fresh_hash));
    let wallet = Arc::new(RecordingWallet::new(wallet_address));
    let pipeline = SwapPipeline::new(
        dex,
        chain,
        wallet.clone(),
        50,
        Duration::from_secs(5),
        Duration::from_secs(5),
    );

    let snapshot = snapshot_holding(wallet_address, "SOL", 10.0);
    let signature = pipeline
        .execute(
            &strategy("SOL", "USDC", AmountSpec::Percentage(50.0)),
            &snapshot,
        )
        .await
        .unwrap();
    assert_eq!(signature, Signature::default());
    swap_mock.assert_async().await;

    let submitted = wallet.sent().expect("transaction reached the wallet");
    assert_eq!(submitted.format(), TxFormat::Legacy);
    assert_eq!(compat::fee_payer(&submitted), Some(wallet_address));
    assert_eq!(compat::recent_blockhash(&submitted), fresh_hash);
}
