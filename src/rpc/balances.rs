//! Balance fetching
//!
//! One call for the native balance, one call enumerating the wallet's token
//! accounts under the SPL token program. Zero-amount accounts are retained so
//! the registry's fixed token set zero-fills correctly; wrapped SOL is
//! skipped so native SOL is not counted twice. Partial failure surfaces as a
//! single `RpcError` and the caller decides whether to degrade.

use async_trait::async_trait;
use solana_account_decoder::UiAccountData;
use solana_client::rpc_request::TokenAccountsFilter;
use solana_sdk::pubkey::Pubkey;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::errors::RpcError;
use crate::registry;
use crate::rpc::selector::EndpointSelector;
use crate::types::{DiscoveredBalance, WalletBalances};

/// Seam for snapshot building; the production implementation talks to the
/// selected RPC endpoint
#[async_trait]
pub trait BalanceSource: Send + Sync {
    async fn fetch(&self, wallet: &Pubkey) -> Result<WalletBalances, RpcError>;
}

/// Balance source backed by the endpoint selector
pub struct RpcBalanceFetcher {
    selector: Arc<EndpointSelector>,
}

impl RpcBalanceFetcher {
    pub fn new(selector: Arc<EndpointSelector>) -> Self {
        Self { selector }
    }
}

#[async_trait]
impl BalanceSource for RpcBalanceFetcher {
    async fn fetch(&self, wallet: &Pubkey) -> Result<WalletBalances, RpcError> {
        let handle = self.selector.select().await?;
        let client = handle.client();

        let native_lamports = client
            .get_balance(wallet)
            .await
            .map_err(|e| RpcError::from_client_error(e, handle.url(), "get_balance"))?;

        let accounts = client
            .get_token_accounts_by_owner(wallet, TokenAccountsFilter::ProgramId(spl_token::id()))
            .await
            .map_err(|e| {
                RpcError::from_client_error(e, handle.url(), "get_token_accounts_by_owner")
            })?;

        let mut tokens: HashMap<String, DiscoveredBalance> = HashMap::new();
        for keyed in &accounts {
            let Some((mint, discovered)) = parse_token_account(&keyed.account.data) else {
                warn!(account = %keyed.pubkey, "Skipping unparseable token account");
                continue;
            };
            if registry::is_wrapped_sol(&mint) {
                continue;
            }
            // A wallet can hold several accounts for one mint
            tokens
                .entry(mint)
                .and_modify(|b| b.raw_amount += discovered.raw_amount)
                .or_insert(discovered);
        }

        debug!(
            wallet = %wallet,
            native_lamports = native_lamports,
            token_accounts = tokens.len(),
            "Fetched balances"
        );

        Ok(WalletBalances {
            native_lamports,
            tokens,
        })
    }
}

/// Extract (mint, balance) from a jsonParsed token account
fn parse_token_account(data: &UiAccountData) -> Option<(String, DiscoveredBalance)> {
    let UiAccountData::Json(parsed) = data else {
        return None;
    };
    let info = parsed.parsed.get("info")?;
    let mint = info.get("mint")?.as_str()?.to_string();
    let token_amount = info.get("tokenAmount")?;
    let raw_amount = token_amount.get("amount")?.as_str()?.parse::<u64>().ok()?;
    let decimals = token_amount.get("decimals")?.as_u64()? as u8;
    Some((mint, DiscoveredBalance { raw_amount, decimals }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use solana_account_decoder::parse_account_data::ParsedAccount;
    use serde_json::json;

    fn token_account(mint: &str, amount: &str, decimals: u64) -> UiAccountData {
        UiAccountData::Json(ParsedAccount {
            program: "spl-token".to_string(),
            parsed: json!({
                "type": "account",
                "info": {
                    "mint": mint,
                    "owner": "ownerownerownerownerownerowner11",
                    "tokenAmount": {
                        "amount": amount,
                        "decimals": decimals,
                        "uiAmountString": "ignored"
                    }
                }
            }),
            space: 165,
        })
    }

    #[test]
    fn test_parse_token_account() {
        let data = token_account("Es9vMFrzaCERmJfrF4H2FYD4KCoNkY11McCe8BenwNYB", "2500000", 6);
        let (mint, balance) = parse_token_account(&data).unwrap();
        assert_eq!(mint, "Es9vMFrzaCERmJfrF4H2FYD4KCoNkY11McCe8BenwNYB");
        assert_eq!(balance.raw_amount, 2_500_000);
        assert_eq!(balance.decimals, 6);
    }

    #[test]
    fn test_zero_amount_accounts_parse_and_are_retained() {
        let data = token_account("9n4nbM75f5Ui33ZbPYXn59EwSgE8CGsHtAeTH5YFeJ9E", "0", 6);
        let (_, balance) = parse_token_account(&data).unwrap();
        assert_eq!(balance.raw_amount, 0);
    }

    #[test]
    fn test_malformed_account_is_skipped() {
        let data = UiAccountData::Json(ParsedAccount {
            program: "spl-token".to_string(),
            parsed: json!({"type": "account", "info": {"mint": 42}}),
            space: 165,
        });
        assert!(parse_token_account(&data).is_none());

        let binary = UiAccountData::LegacyBinary("AAAA".to_string());
        assert!(parse_token_account(&binary).is_none());
    }
}
