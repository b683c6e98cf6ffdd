//! Payment transaction builder
//!
//! A payment transaction splits the funding output between the client and
//! the server. The client's refund output always sits at index 0, the same
//! index as the funding input: a `SIGHASH_SINGLE | SIGHASH_ANYONECANPAY`
//! signature on that input then pins exactly the client's output, leaving
//! the server free to adjust its own output or attach a fee input without
//! invalidating the signature. Zero-value outputs are omitted.

use bitcoin::absolute::LockTime;
use bitcoin::transaction::Version;
use bitcoin::{Amount, OutPoint, ScriptBuf, Sequence, Transaction, TxIn, TxOut, Witness};

/// Builds the unsigned payment transaction
///
/// # Arguments
/// * `funding_outpoint` - The multisig output being spent
/// * `to_client` - Satoshis refunded to the client (output 0; omitted if 0)
/// * `client_script` - Script paying the client
/// * `to_server` - Satoshis claimed by the server (omitted if 0)
/// * `server_script` - Script paying the server
pub fn build_payment_transaction(
    funding_outpoint: OutPoint,
    to_client: u64,
    client_script: ScriptBuf,
    to_server: u64,
    server_script: ScriptBuf,
) -> Transaction {
    let mut output = Vec::with_capacity(2);
    if to_client > 0 {
        output.push(TxOut {
            value: Amount::from_sat(to_client),
            script_pubkey: client_script,
        });
    }
    if to_server > 0 {
        output.push(TxOut {
            value: Amount::from_sat(to_server),
            script_pubkey: server_script,
        });
    }

    Transaction {
        version: Version::TWO,
        lock_time: LockTime::ZERO,
        input: vec![TxIn {
            previous_output: funding_outpoint,
            script_sig: ScriptBuf::new(),
            sequence: Sequence::MAX,
            witness: Witness::new(),
        }],
        output,
    }
}
