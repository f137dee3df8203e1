//! Compatibility layer over the two transaction formats
//!
//! A prepared swap payload arrives as either a legacy `Transaction` or a
//! `VersionedTransaction`, and the two expose the same information through
//! different APIs. This module is the single place that knows both layouts:
//! header and account-key access, blockhash and fee-payer normalization, and
//! in-place signing work uniformly over `PreparedTransaction`.

use solana_sdk::{
    hash::Hash,
    message::{MessageHeader, VersionedMessage},
    pubkey::Pubkey,
    signature::{Keypair, Signature, Signer},
};

use crate::errors::WalletError;
use crate::types::PreparedTransaction;

/// Message header, regardless of format
pub fn message_header(tx: &PreparedTransaction) -> &MessageHeader {
    match tx {
        PreparedTransaction::Versioned(vtx) => match &vtx.message {
            VersionedMessage::Legacy(msg) => &msg.header,
            VersionedMessage::V0(msg) => &msg.header,
        },
        PreparedTransaction::Legacy(t) => &t.message.header,
    }
}

/// Account keys embedded directly in the message (lookup-table addresses
/// excluded for the versioned format)
pub fn static_account_keys(tx: &PreparedTransaction) -> &[Pubkey] {
    match tx {
        PreparedTransaction::Versioned(vtx) => match &vtx.message {
            VersionedMessage::Legacy(msg) => &msg.account_keys,
            VersionedMessage::V0(msg) => &msg.account_keys,
        },
        PreparedTransaction::Legacy(t) => &t.message.account_keys,
    }
}

/// Accounts that must sign: always the first
/// `header.num_required_signatures` static keys
pub fn required_signers(tx: &PreparedTransaction) -> &[Pubkey] {
    let num_signers = message_header(tx).num_required_signatures as usize;
    let keys = static_account_keys(tx);
    &keys[..num_signers.min(keys.len())]
}

/// Position of `signer` among the required signers, if present
pub fn signer_position(tx: &PreparedTransaction, signer: &Pubkey) -> Option<usize> {
    required_signers(tx).iter().position(|k| k == signer)
}

/// Embedded chain-head reference
pub fn recent_blockhash(tx: &PreparedTransaction) -> Hash {
    match tx {
        PreparedTransaction::Versioned(vtx) => *vtx.message.recent_blockhash(),
        PreparedTransaction::Legacy(t) => t.message.recent_blockhash,
    }
}

/// Overwrite the embedded chain-head reference so the transaction does not
/// expire between quote time and submission
pub fn set_recent_blockhash(tx: &mut PreparedTransaction, blockhash: Hash) {
    match tx {
        PreparedTransaction::Versioned(vtx) => vtx.message.set_recent_blockhash(blockhash),
        PreparedTransaction::Legacy(t) => t.message.recent_blockhash = blockhash,
    }
}

/// Fee payer of the message (first account key)
pub fn fee_payer(tx: &PreparedTransaction) -> Option<Pubkey> {
    static_account_keys(tx).first().copied()
}

/// Set the fee payer on a legacy-format transaction. The versioned format
/// already embeds its fee payer; this is a no-op for it.
pub fn set_fee_payer(tx: &mut PreparedTransaction, payer: &Pubkey) {
    if let PreparedTransaction::Legacy(t) = tx {
        if t.message.account_keys.is_empty() {
            t.message.account_keys.push(*payer);
            t.message.header.num_required_signatures = 1;
        } else {
            t.message.account_keys[0] = *payer;
        }
    }
}

/// Sign the message with `keypair`, placing the signature at the keypair's
/// required-signer position. Existing signatures over the pre-normalization
/// message are discarded.
pub fn sign_in_place(tx: &mut PreparedTransaction, keypair: &Keypair) -> Result<(), WalletError> {
    let position =
        signer_position(tx, &keypair.pubkey()).ok_or_else(|| WalletError::Signing {
            reason: format!("{} is not a required signer", keypair.pubkey()),
        })?;
    let num_signers = message_header(tx).num_required_signatures as usize;

    let message_bytes = match tx {
        PreparedTransaction::Versioned(vtx) => vtx.message.serialize(),
        PreparedTransaction::Legacy(t) => t.message.serialize(),
    };
    let signature = keypair.sign_message(&message_bytes);

    let signatures = match tx {
        PreparedTransaction::Versioned(vtx) => &mut vtx.signatures,
        PreparedTransaction::Legacy(t) => &mut t.signatures,
    };
    signatures.clear();
    signatures.resize(num_signers, Signature::default());
    signatures[position] = signature;

    Ok(())
}
