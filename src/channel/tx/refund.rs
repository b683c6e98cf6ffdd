//! Refund transaction builder
//!
//! The refund spends the funding output back to the client and matures at
//! the channel expiry. Its input sequence stays below `Sequence::MAX`;
//! consensus would otherwise ignore the lock time entirely and the refund
//! would be spendable at once.

use bitcoin::absolute::LockTime;
use bitcoin::transaction::Version;
use bitcoin::{Amount, OutPoint, ScriptBuf, Transaction, TxIn, TxOut, Witness};

use crate::types::REFUND_INPUT_SEQUENCE;

/// Builds the unsigned refund transaction
///
/// # Arguments
/// * `funding_outpoint` - The multisig output being spent
/// * `refund_script` - Script paying the client
/// * `value` - Refund amount in satoshis (funding value minus the refund fee)
/// * `lock_time` - Channel expiry as a consensus lock time (UNIX seconds)
pub fn build_refund_transaction(
    funding_outpoint: OutPoint,
    refund_script: ScriptBuf,
    value: u64,
    lock_time: u32,
) -> Transaction {
    Transaction {
        version: Version::TWO,
        lock_time: LockTime::from_consensus(lock_time),
        input: vec![TxIn {
            previous_output: funding_outpoint,
            script_sig: ScriptBuf::new(),
            sequence: REFUND_INPUT_SEQUENCE,
            witness: Witness::new(),
        }],
        output: vec![TxOut {
            value: Amount::from_sat(value),
            script_pubkey: refund_script,
        }],
    }
}
