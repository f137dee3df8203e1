//! Portfolio snapshot builder
//!
//! Composes endpoint selection, balance fetching, and the price oracle into
//! one consistent valuation pass per wallet. A per-wallet flight registry
//! gives single-flight semantics: while a pass is in flight, or once it has
//! completed, repeated requests for the same wallet do not re-enter the
//! pipeline. A request for a different wallet bumps the monotonic generation
//! counter, which every pending check-in observes; a superseded pass exits
//! without publishing anything. The latest snapshot is replaced atomically,
//! so readers never see a partially built one.

use arc_swap::ArcSwapOption;
use chrono::Utc;
use dashmap::DashMap;
use solana_sdk::pubkey::Pubkey;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::metrics::metrics;
use crate::oracle::PriceOracle;
use crate::registry;
use crate::rpc::BalanceSource;
use crate::types::{Balance, Holding, PortfolioSnapshot, TokenDescriptor, WalletBalances};

/// What a build request observed
#[derive(Debug, Clone)]
pub enum BuildOutcome {
    /// A fresh pass ran to completion and was published
    Published(Arc<PortfolioSnapshot>),
    /// A pass for this wallet already completed in this session
    Cached(Arc<PortfolioSnapshot>),
    /// A pass for this wallet is currently running; nothing was started
    AlreadyInFlight,
    /// The wallet changed mid-pass; nothing was published
    Superseded,
}

enum Flight {
    InFlight { generation: u64 },
    Done(Arc<PortfolioSnapshot>),
}

pub struct SnapshotBuilder {
    balances: Arc<dyn BalanceSource>,
    oracle: Arc<dyn PriceOracle>,
    flights: DashMap<Pubkey, Flight>,
    generation: AtomicU64,
    active: Mutex<Option<Pubkey>>,
    latest: ArcSwapOption<PortfolioSnapshot>,
    publisher: broadcast::Sender<Arc<PortfolioSnapshot>>,
    /// Fixed inter-token delay keeping the oracle under the upstream rate
    /// limit; a bare suspension, not a timeout
    pace: Duration,
}

impl SnapshotBuilder {
    pub fn new(
        balances: Arc<dyn BalanceSource>,
        oracle: Arc<dyn PriceOracle>,
        pace: Duration,
    ) -> Self {
        let (publisher, _) = broadcast::channel(16);
        Self {
            balances,
            oracle,
            flights: DashMap::new(),
            generation: AtomicU64::new(0),
            active: Mutex::new(None),
            latest: ArcSwapOption::from(None),
            publisher,
            pace,
        }
    }

    /// Most recently published snapshot, if any
    pub fn latest(&self) -> Option<Arc<PortfolioSnapshot>> {
        self.latest.load_full()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Arc<PortfolioSnapshot>> {
        self.publisher.subscribe()
    }

    /// Cancel any in-flight pass and forget cached state (consumer teardown)
    pub fn cancel_all(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.flights.clear();
        *self.active.lock().expect("active lock") = None;
    }

    /// Build (or observe) the snapshot for `wallet`
    pub async fn build(&self, wallet: Pubkey) -> BuildOutcome {
        let generation = {
            let mut active = self.active.lock().expect("active lock");
            if *active == Some(wallet) {
                match self.flights.get(&wallet).as_deref() {
                    Some(Flight::Done(snapshot)) => {
                        return BuildOutcome::Cached(snapshot.clone());
                    }
                    Some(Flight::InFlight { .. }) => return BuildOutcome::AlreadyInFlight,
                    None => {}
                }
            } else {
                // Wallet change: supersede any prior pass, forget its state
                *active = Some(wallet);
                self.flights.clear();
            }
            let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
            self.flights
                .insert(wallet, Flight::InFlight { generation });
            generation
        };

        // Clear our in-flight marker on any exit path that did not replace
        // it with a completed snapshot
        let _cleanup = scopeguard::guard((), |_| {
            self.flights.remove_if(&wallet, |_, flight| {
                matches!(flight, Flight::InFlight { generation: g } if *g == generation)
            });
        });

        self.run_pass(wallet, generation).await
    }

    fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }

    async fn run_pass(&self, wallet: Pubkey, generation: u64) -> BuildOutcome {
        let timer = metrics().snapshot_latency.start_timer();

        // Degrade to all-zero balances rather than aborting the pass
        let balances = match self.balances.fetch(&wallet).await {
            Ok(balances) => balances,
            Err(err) => {
                warn!(
                    wallet = %wallet,
                    error = %err,
                    "Balance fetch failed, valuing empty portfolio"
                );
                metrics().snapshots_degraded.inc();
                WalletBalances::default()
            }
        };

        let tokens = assemble_token_set(&balances);

        let mut holdings = Vec::with_capacity(tokens.len());
        for (i, (token, raw_amount)) in tokens.into_iter().enumerate() {
            if i > 0 && !self.pace.is_zero() {
                tokio::time::sleep(self.pace).await;
            }
            if !self.is_current(generation) {
                metrics().snapshots_superseded.inc();
                return BuildOutcome::Superseded;
            }
            let quote = self.oracle.price_of(&token).await;
            holdings.push(Holding {
                balance: Balance::new(token, raw_amount),
                quote,
            });
        }

        if !self.is_current(generation) {
            metrics().snapshots_superseded.inc();
            return BuildOutcome::Superseded;
        }

        let total_value = holdings.iter().map(Holding::value).sum();
        let snapshot = Arc::new(PortfolioSnapshot {
            wallet,
            holdings,
            total_value,
            timestamp: Utc::now(),
        });

        self.flights.insert(wallet, Flight::Done(snapshot.clone()));
        self.latest.store(Some(snapshot.clone()));
        let _ = self.publisher.send(snapshot.clone());

        timer.observe_duration();
        metrics().snapshots_published.inc();
        info!(
            wallet = %wallet,
            holdings = snapshot.holdings.len(),
            total_value = snapshot.total_value,
            "Snapshot published"
        );

        BuildOutcome::Published(snapshot)
    }
}

/// Registry base set (zero-filled from fetched balances) plus discovered
/// nonzero extras, in a stable order: registry order first, then extras by
/// mint. No duplicate mints by construction.
fn assemble_token_set(balances: &WalletBalances) -> Vec<(TokenDescriptor, u64)> {
    let mut tokens: Vec<(TokenDescriptor, u64)> = Vec::new();

    for token in registry::base_tokens() {
        let raw_amount = if token.mint == registry::SOL_MINT {
            balances.native_lamports
        } else {
            balances
                .tokens
                .get(&token.mint)
                .map(|b| b.raw_amount)
                .unwrap_or(0)
        };
        tokens.push((token, raw_amount));
    }

    let mut extras: Vec<_> = balances
        .tokens
        .iter()
        .filter(|(mint, balance)| registry::by_mint(mint).is_none() && balance.raw_amount > 0)
        .collect();
    extras.sort_by(|a, b| a.0.cmp(b.0));
    for (mint, balance) in extras {
        tokens.push((
            registry::descriptor_for_unknown(mint, balance.decimals),
            balance.raw_amount,
        ));
    }

    tokens
}
