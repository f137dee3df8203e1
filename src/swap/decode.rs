//! Payload decoding and normalization
//!
//! The quote service does not declare which of the two wire encodings it
//! used, so decoding is an explicit ordered fallback: versioned first,
//! legacy second, each attempt tagged with the format it produced.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use solana_sdk::{
    hash::Hash,
    message::VersionedMessage,
    pubkey::Pubkey,
    transaction::{Transaction, VersionedTransaction},
};

use crate::compat;
use crate::errors::SwapError;
use crate::types::{PreparedTransaction, TxFormat};

/// Decode a base64 payload into one of the two transaction formats.
///
/// The versioned wire format is identified by the version prefix bit on the
/// message's first byte; a payload without it parses into the legacy layout
/// and is treated as such even when the versioned parser accepts it.
pub fn decode_swap_payload(payload_b64: &str) -> Result<PreparedTransaction, SwapError> {
    let bytes = BASE64
        .decode(payload_b64.trim())
        .map_err(|e| SwapError::Decode {
            message: format!("invalid base64: {}", e),
        })?;

    // Attempt 1: versioned interpretation
    if let Ok(vtx) = bincode::deserialize::<VersionedTransaction>(&bytes) {
        match vtx.message {
            VersionedMessage::V0(_) => return Ok(PreparedTransaction::Versioned(vtx)),
            VersionedMessage::Legacy(message) => {
                // Prefix bit absent: this is the legacy layout
                return Ok(PreparedTransaction::Legacy(Transaction {
                    signatures: vtx.signatures,
                    message,
                }));
            }
        }
    }

    // Attempt 2: legacy interpretation
    bincode::deserialize::<Transaction>(&bytes)
        .map(PreparedTransaction::Legacy)
        .map_err(|e| SwapError::Decode {
            message: format!("neither versioned nor legacy format: {}", e),
        })
}

/// Refresh the embedded chain-head reference and, for the legacy format,
/// point the fee payer at the connected wallet (the versioned format already
/// embeds it)
pub fn normalize(tx: &mut PreparedTransaction, blockhash: Hash, wallet: &Pubkey) {
    compat::set_recent_blockhash(tx, blockhash);
    if tx.format() == TxFormat::Legacy {
        compat::set_fee_payer(tx, wallet);
    }
}
