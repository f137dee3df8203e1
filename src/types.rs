//! Data model for portfolio valuation and swap execution

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;
use std::collections::HashMap;

/// A fungible asset: registry-defined or discovered on-chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenDescriptor {
    /// Display symbol (derived from the mint for unregistered tokens)
    pub symbol: String,

    /// Chain-level asset identifier
    pub mint: String,

    /// Decimal places of the smallest unit
    pub decimals: u8,
}

impl TokenDescriptor {
    pub fn new(symbol: impl Into<String>, mint: impl Into<String>, decimals: u8) -> Self {
        Self {
            symbol: symbol.into(),
            mint: mint.into(),
            decimals,
        }
    }

    /// Convert a UI quantity to the smallest unit, truncating toward zero
    pub fn to_raw(&self, ui_amount: f64) -> u64 {
        (ui_amount * 10f64.powi(self.decimals as i32)).trunc() as u64
    }

    /// Convert a raw amount to UI units
    pub fn to_ui(&self, raw_amount: u64) -> f64 {
        raw_amount as f64 / 10f64.powi(self.decimals as i32)
    }
}

/// Where a price quote came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PriceSource {
    /// Quoted live against the aggregator
    Live,
    /// Static reference table (degraded)
    Fallback,
}

/// Unit price of a token in quote-asset terms
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceQuote {
    pub mint: String,
    pub unit_price: f64,
    pub source: PriceSource,
}

/// A single token balance, produced fresh per snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Balance {
    pub token: TokenDescriptor,
    pub raw_amount: u64,
    pub ui_amount: f64,
}

impl Balance {
    pub fn new(token: TokenDescriptor, raw_amount: u64) -> Self {
        let ui_amount = token.to_ui(raw_amount);
        Self {
            token,
            raw_amount,
            ui_amount,
        }
    }
}

/// A priced balance inside a snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Holding {
    pub balance: Balance,
    pub quote: PriceQuote,
}

impl Holding {
    /// Position value in quote-asset terms
    pub fn value(&self) -> f64 {
        self.balance.ui_amount * self.quote.unit_price
    }
}

/// One consistent valuation pass over a wallet.
///
/// Holdings always contain exactly the registry's base token set plus any
/// discovered tokens with nonzero balance, without duplicate mints, in a
/// stable order (registry order first, then extras by mint).
#[derive(Debug, Clone)]
pub struct PortfolioSnapshot {
    pub wallet: Pubkey,
    pub holdings: Vec<Holding>,
    pub total_value: f64,
    pub timestamp: DateTime<Utc>,
}

impl PortfolioSnapshot {
    pub fn holding_by_symbol(&self, symbol: &str) -> Option<&Holding> {
        self.holdings
            .iter()
            .find(|h| h.balance.token.symbol == symbol)
    }

    pub fn holding_by_mint(&self, mint: &str) -> Option<&Holding> {
        self.holdings.iter().find(|h| h.balance.token.mint == mint)
    }

    /// Compact JSON view handed to the advisory service as context
    pub fn context_json(&self) -> serde_json::Value {
        let positions: serde_json::Map<String, serde_json::Value> = self
            .holdings
            .iter()
            .map(|h| {
                (
                    h.balance.token.symbol.clone(),
                    serde_json::json!({
                        "amount": h.balance.ui_amount,
                        "value": h.value(),
                    }),
                )
            })
            .collect();
        serde_json::json!({
            "wallet": self.wallet.to_string(),
            "total_value": self.total_value,
            "positions": positions,
        })
    }
}

/// Raw balances as fetched from the chain, before pricing
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WalletBalances {
    /// Native asset balance in lamports
    pub native_lamports: u64,

    /// Mint -> raw balance for every token account owned by the wallet.
    /// Zero-amount accounts are retained so the registry set zero-fills
    /// correctly.
    pub tokens: HashMap<String, DiscoveredBalance>,
}

/// A token-account balance discovered during enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiscoveredBalance {
    pub raw_amount: u64,
    pub decimals: u8,
}

/// How much of the from-token a strategy wants to move
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum AmountSpec {
    /// Percentage of the wallet's current holding of the from-token
    Percentage(f64),
    /// Absolute quantity in UI units
    Absolute(f64),
}

impl AmountSpec {
    /// Parse the advisory service's free-form amount string ("50%" or "1.5")
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if let Some(pct) = trimmed.strip_suffix('%') {
            pct.trim().parse::<f64>().ok().map(AmountSpec::Percentage)
        } else {
            trimmed.parse::<f64>().ok().map(AmountSpec::Absolute)
        }
    }
}

/// A swap suggestion from the advisory service, consumed once
#[derive(Debug, Clone, PartialEq)]
pub struct SwapStrategy {
    pub id: String,
    pub title: String,
    pub description: String,
    pub from_symbol: String,
    pub to_symbol: String,
    pub amount: AmountSpec,
    pub estimated_to_amount: f64,
}

/// Fully resolved swap input, derived from a strategy plus the current
/// snapshot
#[derive(Debug, Clone, PartialEq)]
pub struct SwapTransactionRequest {
    pub from: TokenDescriptor,
    pub to: TokenDescriptor,
    pub raw_amount: u64,
    pub slippage_bps: u16,
    pub wallet: Pubkey,
}

/// The two incompatible wire encodings a prepared transaction can arrive in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxFormat {
    /// Version-prefixed format with address lookup table support
    Versioned,
    /// Original format; the fee payer is the first account key
    Legacy,
}

/// A decoded swap transaction, alive for exactly one attempt: normalized
/// with a fresh blockhash, signed and submitted, then discarded
#[derive(Debug, Clone)]
pub enum PreparedTransaction {
    Versioned(solana_sdk::transaction::VersionedTransaction),
    Legacy(solana_sdk::transaction::Transaction),
}

impl PreparedTransaction {
    pub fn format(&self) -> TxFormat {
        match self {
            PreparedTransaction::Versioned(_) => TxFormat::Versioned,
            PreparedTransaction::Legacy(_) => TxFormat::Legacy,
        }
    }
}
