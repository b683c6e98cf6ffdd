//! Wallet collaborator
//!
//! The channel state machines do not manage coins themselves; they lean on
//! a [`Wallet`] for coin selection, change, signing of wallet-owned inputs,
//! pending-transaction bookkeeping, and block delivery. The trait is the
//! seam: anything that can answer these questions can fund and settle
//! channels. An in-memory pay-to-pubkey-hash implementation is provided
//! for tests and examples.

use std::sync::{Arc, Mutex};

use bitcoin::secp256k1::{PublicKey as SecpPublicKey, Secp256k1, SecretKey};
use bitcoin::{OutPoint, PublicKey, ScriptBuf, Transaction, Txid};

use crate::errors::{Result, WalletError};
use crate::script::p2pkh_script;
use crate::sig;

/// An unspent transaction output the wallet can spend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Utxo {
    /// Location of the output
    pub outpoint: OutPoint,
    /// Value in satoshis
    pub value: u64,
    /// Locking script of the output
    pub script_pubkey: ScriptBuf,
}

/// Coins picked by the wallet to cover a requested amount
#[derive(Debug, Clone)]
pub struct CoinSelection {
    /// Outputs to spend
    pub utxos: Vec<Utxo>,
    /// Amount selected beyond the request, owed back to the wallet
    pub change_value: u64,
    /// Script the change should pay to
    pub change_script: ScriptBuf,
}

/// Coin source, key holder, and transaction sink for a channel party
pub trait Wallet: Send {
    /// Picks unspent outputs worth at least `amount` satoshis
    fn select_coins(&self, amount: u64) -> std::result::Result<CoinSelection, WalletError>;

    /// Script fresh change should pay to
    fn change_script(&self) -> ScriptBuf;

    /// Records a transaction the wallet has signed off on but which is not
    /// yet confirmed; its inputs are no longer spendable
    fn commit_pending(&mut self, tx: Transaction);

    /// Transactions committed but not yet seen in a block
    fn pending(&self) -> Vec<Transaction>;

    /// Produces the unlocking script for a wallet-owned input of `tx`
    fn sign_input(&self, tx: &Transaction, input_index: usize, sighash_flag: u8)
        -> Result<ScriptBuf>;

    /// Delivers a confirmed transaction: spends matching outputs, credits
    /// outputs paying the wallet, and clears the pending entry if any
    fn receive_from_block(&mut self, tx: &Transaction);

    /// Confirmed balance in satoshis
    fn balance(&self) -> u64;
}

/// A wallet shared between channels and their storage
pub type SharedWallet = Arc<Mutex<dyn Wallet>>;

/// Wraps a wallet for sharing
pub fn shared<W: Wallet + 'static>(wallet: W) -> SharedWallet {
    Arc::new(Mutex::new(wallet))
}

/// Single-key pay-to-pubkey-hash wallet held entirely in memory
///
/// Tracks confirmed outputs paying its key and the set of pending
/// transactions. No persistence; suitable for tests and demos.
pub struct InMemoryWallet {
    secret: SecretKey,
    public: PublicKey,
    script_pubkey: ScriptBuf,
    utxos: Vec<Utxo>,
    pending: Vec<Transaction>,
}

impl InMemoryWallet {
    /// Creates a wallet controlling the given key
    pub fn new(secret: SecretKey) -> Self {
        let secp = Secp256k1::new();
        let public = PublicKey::new(SecpPublicKey::from_secret_key(&secp, &secret));
        let script_pubkey = p2pkh_script(&public);
        Self { secret, public, script_pubkey, utxos: Vec::new(), pending: Vec::new() }
    }

    /// The wallet's public key
    pub fn public_key(&self) -> PublicKey {
        self.public
    }

    fn utxo_for_input(&self, tx: &Transaction, input_index: usize) -> Option<&Utxo> {
        let input = tx.input.get(input_index)?;
        self.utxos.iter().find(|u| u.outpoint == input.previous_output)
    }

    fn forget_spent(&mut self, tx: &Transaction) {
        let spent: Vec<OutPoint> = tx.input.iter().map(|i| i.previous_output).collect();
        self.utxos.retain(|u| !spent.contains(&u.outpoint));
    }
}

impl Wallet for InMemoryWallet {
    fn select_coins(&self, amount: u64) -> std::result::Result<CoinSelection, WalletError> {
        let mut selected = Vec::new();
        let mut total = 0u64;
        for utxo in &self.utxos {
            if total >= amount {
                break;
            }
            total = total.saturating_add(utxo.value);
            selected.push(utxo.clone());
        }
        if total < amount {
            return Err(WalletError::InsufficientFunds {
                requested: amount,
                available: self.balance(),
            });
        }
        Ok(CoinSelection {
            utxos: selected,
            change_value: total - amount,
            change_script: self.change_script(),
        })
    }

    fn change_script(&self) -> ScriptBuf {
        self.script_pubkey.clone()
    }

    fn commit_pending(&mut self, tx: Transaction) {
        self.forget_spent(&tx);
        self.pending.push(tx);
    }

    fn pending(&self) -> Vec<Transaction> {
        self.pending.clone()
    }

    fn sign_input(
        &self,
        tx: &Transaction,
        input_index: usize,
        sighash_flag: u8,
    ) -> Result<ScriptBuf> {
        let utxo = self
            .utxo_for_input(tx, input_index)
            .ok_or(WalletError::UnknownInput(input_index))?
            .clone();
        let signature =
            sig::sign_input(tx, input_index, &utxo.script_pubkey, sighash_flag, &self.secret)?;
        let sig_push = bitcoin::script::PushBytesBuf::try_from(signature)
            .map_err(|_| WalletError::UnknownInput(input_index))?;
        Ok(bitcoin::script::Builder::new()
            .push_slice(sig_push)
            .push_key(&self.public)
            .into_script())
    }

    fn receive_from_block(&mut self, tx: &Transaction) {
        self.forget_spent(tx);
        let txid: Txid = tx.compute_txid();
        for (vout, output) in tx.output.iter().enumerate() {
            if output.script_pubkey == self.script_pubkey {
                self.utxos.push(Utxo {
                    outpoint: OutPoint { txid, vout: vout as u32 },
                    value: output.value.to_sat(),
                    script_pubkey: output.script_pubkey.clone(),
                });
            }
        }
        self.pending.retain(|p| p.compute_txid() != txid);
    }

    fn balance(&self) -> u64 {
        self.utxos.iter().map(|u| u.value).sum()
    }
}
