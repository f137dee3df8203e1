//! Static token registry
//!
//! The base token set every snapshot carries, with the reference prices used
//! when live quoting is unavailable and the small fixed notionals used to
//! probe the aggregator. Tokens discovered on-chain but absent from this
//! table get a symbol derived from their mint.

use crate::types::TokenDescriptor;

/// Native SOL is addressed by the system program id on the aggregator side
pub const SOL_MINT: &str = "11111111111111111111111111111111";

/// SPL wrapped SOL; skipped during token-account enumeration so native SOL is
/// not double counted
pub const WRAPPED_SOL_MINT: &str = "So11111111111111111111111111111111111111112";

/// Default quote asset (USDC: deepest liquidity against the whole table)
pub const DEFAULT_QUOTE_MINT: &str = "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v";

struct RegistryEntry {
    symbol: &'static str,
    mint: &'static str,
    decimals: u8,
    /// Fixed notional for price probes, in UI units
    probe_ui: f64,
    /// Static reference price in quote-asset terms
    fallback_price: f64,
}

const REGISTRY: &[RegistryEntry] = &[
    RegistryEntry {
        symbol: "SOL",
        mint: SOL_MINT,
        decimals: 9,
        probe_ui: 0.1,
        fallback_price: 150.0,
    },
    RegistryEntry {
        symbol: "USDT",
        mint: "Es9vMFrzaCERmJfrF4H2FYD4KCoNkY11McCe8BenwNYB",
        decimals: 6,
        probe_ui: 10.0,
        fallback_price: 1.0,
    },
    RegistryEntry {
        symbol: "USDC",
        mint: DEFAULT_QUOTE_MINT,
        decimals: 6,
        probe_ui: 10.0,
        fallback_price: 1.0,
    },
    RegistryEntry {
        symbol: "wBTC",
        mint: "9n4nbM75f5Ui33ZbPYXn59EwSgE8CGsHtAeTH5YFeJ9E",
        decimals: 6,
        probe_ui: 0.0001,
        fallback_price: 65_000.0,
    },
    RegistryEntry {
        symbol: "wETH",
        mint: "7vfCXTUXx8kP4HT8YhJPgJ7Y4w6vjbQfgFQQs1nCJ3Kn",
        decimals: 8,
        probe_ui: 0.001,
        fallback_price: 3_000.0,
    },
    RegistryEntry {
        symbol: "wBNB",
        mint: "9WzDXwBbmkg8ZTbNMqUxvQRAyrZzDsGYdLVL9zYtAWWM",
        decimals: 8,
        probe_ui: 0.01,
        fallback_price: 600.0,
    },
    RegistryEntry {
        symbol: "JitoSOL",
        mint: "J1toso1uCk3RLmjorhTtrVwY9HJ7X8V9yYac6Y7kGCPn",
        decimals: 9,
        probe_ui: 0.1,
        fallback_price: 165.0,
    },
];

/// Probe notional for tokens outside the registry
const DEFAULT_PROBE_UI: f64 = 0.01;

/// The registry's base token set, in stable snapshot order
pub fn base_tokens() -> Vec<TokenDescriptor> {
    REGISTRY
        .iter()
        .map(|e| TokenDescriptor::new(e.symbol, e.mint, e.decimals))
        .collect()
}

pub fn by_symbol(symbol: &str) -> Option<TokenDescriptor> {
    REGISTRY
        .iter()
        .find(|e| e.symbol == symbol)
        .map(|e| TokenDescriptor::new(e.symbol, e.mint, e.decimals))
}

pub fn by_mint(mint: &str) -> Option<TokenDescriptor> {
    REGISTRY
        .iter()
        .find(|e| e.mint == mint)
        .map(|e| TokenDescriptor::new(e.symbol, e.mint, e.decimals))
}

/// Static reference price for fallback quotes; unknown mints price at zero
pub fn fallback_price(mint: &str) -> f64 {
    REGISTRY
        .iter()
        .find(|e| e.mint == mint)
        .map(|e| e.fallback_price)
        .unwrap_or(0.0)
}

/// Fixed probe notional in UI units for live quoting
pub fn probe_ui_amount(mint: &str) -> f64 {
    REGISTRY
        .iter()
        .find(|e| e.mint == mint)
        .map(|e| e.probe_ui)
        .unwrap_or(DEFAULT_PROBE_UI)
}

/// Descriptor for a token discovered on-chain but not in the registry.
/// The symbol is the leading slice of the mint, mirroring how unknown
/// accounts are labelled upstream.
pub fn descriptor_for_unknown(mint: &str, decimals: u8) -> TokenDescriptor {
    let symbol: String = mint.chars().take(4).collect();
    TokenDescriptor::new(symbol, mint, decimals)
}

pub fn is_wrapped_sol(mint: &str) -> bool {
    mint == WRAPPED_SOL_MINT
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_set_has_no_duplicate_mints() {
        let tokens = base_tokens();
        for (i, a) in tokens.iter().enumerate() {
            for b in tokens.iter().skip(i + 1) {
                assert_ne!(a.mint, b.mint, "duplicate mint in registry");
            }
        }
    }

    #[test]
    fn test_lookup_by_symbol_and_mint_agree() {
        let sol = by_symbol("SOL").unwrap();
        assert_eq!(by_mint(&sol.mint), Some(sol.clone()));
        assert_eq!(sol.decimals, 9);
        assert!(by_symbol("DOGE").is_none());
    }

    #[test]
    fn test_fallback_prices() {
        let usdc = by_symbol("USDC").unwrap();
        assert_eq!(fallback_price(&usdc.mint), 1.0);
        assert_eq!(fallback_price("unknownMint11111111111111111111"), 0.0);
    }

    #[test]
    fn test_probe_amounts_are_token_appropriate() {
        let sol = by_symbol("SOL").unwrap();
        let wbtc = by_symbol("wBTC").unwrap();
        assert_eq!(probe_ui_amount(&sol.mint), 0.1);
        assert_eq!(probe_ui_amount(&wbtc.mint), 0.0001);
        assert_eq!(probe_ui_amount("nope"), DEFAULT_PROBE_UI);
    }

    #[test]
    fn test_unknown_token_symbol_derivation() {
        let t = descriptor_for_unknown("BoNk1234567890abcdef", 5);
        assert_eq!(t.symbol, "BoNk");
        assert_eq!(t.decimals, 5);
    }
}
