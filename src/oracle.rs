//! Price oracle
//!
//! Pricing policy over the aggregator client. `price_of` never fails
//! outward: any upstream problem degrades to a quote from the static
//! reference table, so one bad token cannot abort a whole snapshot pass.
//! Callers drive tokens strictly sequentially with a fixed delay between
//! requests; rate-limit responses are classified but never retried inline.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::errors::PriceError;
use crate::metrics::metrics;
use crate::okx::DexClient;
use crate::registry;
use crate::types::{PriceQuote, PriceSource, TokenDescriptor};

/// Seam for snapshot building; the production implementation quotes the
/// aggregator, tests substitute their own
#[async_trait]
pub trait PriceOracle: Send + Sync {
    async fn price_of(&self, token: &TokenDescriptor) -> PriceQuote;
}

/// Oracle backed by the signed aggregator quote endpoint
pub struct DexPriceOracle {
    client: Arc<DexClient>,
    quote_token: TokenDescriptor,
}

impl DexPriceOracle {
    pub fn new(client: Arc<DexClient>, quote_token: TokenDescriptor) -> Self {
        Self {
            client,
            quote_token,
        }
    }

    pub fn quote_token(&self) -> &TokenDescriptor {
        &self.quote_token
    }

    fn fallback(&self, token: &TokenDescriptor, reason: &PriceError) -> PriceQuote {
        let unit_price = registry::fallback_price(&token.mint);
        match reason {
            PriceError::CredentialsMissing => debug!(
                symbol = %token.symbol,
                "No aggregator credentials, using reference price"
            ),
            PriceError::RateLimited { code } => warn!(
                symbol = %token.symbol,
                code = %code,
                "Rate limited, using reference price"
            ),
            PriceError::Unavailable { message, .. } => warn!(
                symbol = %token.symbol,
                error = %message,
                "Price unavailable, using reference price"
            ),
        }
        metrics().price_quotes_fallback.inc();
        PriceQuote {
            mint: token.mint.clone(),
            unit_price,
            source: PriceSource::Fallback,
        }
    }
}

#[async_trait]
impl PriceOracle for DexPriceOracle {
    async fn price_of(&self, token: &TokenDescriptor) -> PriceQuote {
        // The quote asset prices at exactly 1 by definition
        if token.mint == self.quote_token.mint {
            return PriceQuote {
                mint: token.mint.clone(),
                unit_price: 1.0,
                source: PriceSource::Live,
            };
        }

        if !self.client.has_credentials() {
            return self.fallback(token, &PriceError::CredentialsMissing);
        }

        // Fixed small notional, not the user's balance: keeps quotes cheap
        // and comparable across snapshots
        let probe_raw = token.to_raw(registry::probe_ui_amount(&token.mint)).max(1);

        let timer = metrics().quote_latency.start_timer();
        let result = self
            .client
            .quote(&token.mint, &self.quote_token.mint, probe_raw)
            .await;
        timer.observe_duration();

        match result {
            Ok(outcome) => {
                let sent_ui = token.to_ui(outcome.from_amount_raw.max(1));
                let received_ui =
                    outcome.to_amount_raw as f64 / 10f64.powi(outcome.to_decimals as i32);
                let unit_price = received_ui / sent_ui;
                debug!(
                    symbol = %token.symbol,
                    unit_price = unit_price,
                    "Live quote"
                );
                metrics().price_quotes_live.inc();
                PriceQuote {
                    mint: token.mint.clone(),
                    unit_price,
                    source: PriceSource::Live,
                }
            }
            Err(err) if err.is_rate_limit() => self.fallback(
                token,
                &PriceError::RateLimited {
                    code: err.to_string(),
                },
            ),
            Err(err) => self.fallback(
                token,
                &PriceError::Unavailable {
                    mint: token.mint.clone(),
                    message: err.to_string(),
                },
            ),
        }
    }
}
