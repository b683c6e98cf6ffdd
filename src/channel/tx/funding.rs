//! Funding transaction builder
//!
//! The funding transaction locks the channel's capital. Output 0 is always
//! the 2-of-2 multisig between client and server, in that order; change
//! back to the client's wallet, if any, follows it.

use bitcoin::absolute::LockTime;
use bitcoin::transaction::Version;
use bitcoin::{Amount, PublicKey, ScriptBuf, Sequence, Transaction, TxIn, TxOut, Witness};

use crate::script::multisig_script;
use crate::wallet::CoinSelection;

/// Builds the unsigned funding transaction
///
/// # Arguments
/// * `coins` - Wallet selection covering `total_value` plus the funding fee
/// * `client_pubkey` - Client's funding key (first in the multisig)
/// * `server_pubkey` - Server's funding key (second in the multisig)
/// * `total_value` - Amount locked into the multisig output, in satoshis
///
/// # Returns
/// A transaction with the multisig output at index 0 and, when the
/// selection over-covers, a change output at index 1. Inputs carry empty
/// unlocking scripts; the wallet signs them separately.
pub fn build_funding_transaction(
    coins: &CoinSelection,
    client_pubkey: &PublicKey,
    server_pubkey: &PublicKey,
    total_value: u64,
) -> Transaction {
    let input = coins
        .utxos
        .iter()
        .map(|utxo| TxIn {
            previous_output: utxo.outpoint,
            script_sig: ScriptBuf::new(),
            sequence: Sequence::MAX,
            witness: Witness::new(),
        })
        .collect();

    let mut output = vec![TxOut {
        value: Amount::from_sat(total_value),
        script_pubkey: multisig_script(client_pubkey, server_pubkey),
    }];
    if coins.change_value > 0 {
        output.push(TxOut {
            value: Amount::from_sat(coins.change_value),
            script_pubkey: coins.change_script.clone(),
        });
    }

    Transaction { version: Version::TWO, lock_time: LockTime::ZERO, input, output }
}

#[cfg(test)]
mod tests {
    use bitcoin::hashes::Hash;
    use bitcoin::{OutPoint, Txid};

    use super::*;
    use crate::channel::test_utils::{client_keys, server_keys};
    use crate::script::{is_multisig_script, p2pkh_script};
    use crate::wallet::Utxo;

    fn selection(value: u64, change: u64) -> CoinSelection {
        let (_, client_pk) = client_keys();
        CoinSelection {
            utxos: vec![Utxo {
                outpoint: OutPoint { txid: Txid::from_byte_array([7u8; 32]), vout: 0 },
                value,
                script_pubkey: p2pkh_script(&client_pk),
            }],
            change_value: change,
            change_script: p2pkh_script(&client_pk),
        }
    }

    #[test]
    fn test_build_funding_transaction() {
        let (_, client_pk) = client_keys();
        let (_, server_pk) = server_keys();
        let coins = selection(1_000_000, 490_000);

        let tx = build_funding_transaction(&coins, &client_pk, &server_pk, 500_000);

        assert_eq!(tx.input.len(), 1);
        assert_eq!(tx.output.len(), 2);
        assert_eq!(tx.output[0].value.to_sat(), 500_000);
        assert!(is_multisig_script(&tx.output[0].script_pubkey));
        assert_eq!(tx.output[1].value.to_sat(), 490_000);
        assert_eq!(tx.output[1].script_pubkey, coins.change_script);
    }

    #[test]
    fn test_build_funding_transaction_without_change() {
        let (_, client_pk) = client_keys();
        let (_, server_pk) = server_keys();
        let coins = selection(510_000, 0);

        let tx = build_funding_transaction(&coins, &client_pk, &server_pk, 500_000);

        assert_eq!(tx.output.len(), 1);
    }
}
