//! Client side of the channel
//!
//! The client locks up the channel capital and streams incremental payment
//! signatures to the server. Its lifecycle:
//!
//! - `New`: parameters agreed, nothing built
//! - `Initiated`: funding and refund transactions built, refund unsigned
//! - `ProvideMultisigContractToServer`: refund fully signed, funding
//!   committed to the wallet as pending
//! - `Ready`: contract released to the server; payments may flow
//! - `Closed` / `Expired` / `Error`: terminal
//!
//! The refund-before-funding order is the whole point: the client never
//! reveals the funding transaction until it holds a fully signed refund,
//! so a vanishing server can never hold the capital hostage.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use bitcoin::secp256k1::{PublicKey as SecpPublicKey, Secp256k1, SecretKey};
use bitcoin::{OutPoint, PublicKey, Transaction};
use tracing::{debug, info};

use crate::broadcast::Broadcaster;
use crate::channel::params::ChannelParameters;
use crate::channel::storage::ChannelStorage;
use crate::channel::tx::{
    build_funding_transaction, build_payment_transaction, build_refund_transaction,
};
use crate::errors::{ChannelError, Result, WalletError};
use crate::sig::{self, SigPurpose};
use crate::types::{
    ChannelId, MIN_NONDUST_OUTPUT, REFERENCE_MIN_FEE, SIGHASH_ALL, SIGHASH_ANYONECANPAY,
    SIGHASH_SINGLE,
};
use crate::wallet::{SharedWallet, Wallet};

/// Lifecycle states of the client side
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    /// Channel created, funding not yet built
    New,
    /// Funding and refund transactions built, refund awaiting the server's
    /// signature
    Initiated,
    /// Refund fully signed; the funding transaction may now be released
    ProvideMultisigContractToServer,
    /// Contract released; incremental payments may be signed
    Ready,
    /// The server's close transaction spent the funding output
    Closed,
    /// The refund was broadcast after the channel expired
    Expired,
    /// Unrecoverable protocol failure
    Error,
}

impl fmt::Display for ClientState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ClientState::New => "NEW",
            ClientState::Initiated => "INITIATED",
            ClientState::ProvideMultisigContractToServer => "PROVIDE_MULTISIG_CONTRACT_TO_SERVER",
            ClientState::Ready => "READY",
            ClientState::Closed => "CLOSED",
            ClientState::Expired => "EXPIRED",
            ClientState::Error => "ERROR",
        };
        f.write_str(name)
    }
}

struct ClientInner {
    wallet: SharedWallet,
    secret: SecretKey,
    params: ChannelParameters,
    state: ClientState,
    stored: bool,
    refund_tx_fees: u64,
    funding_tx: Option<Transaction>,
    refund_tx: Option<Transaction>,
    current_payment: u64,
    latest_payment_sig: Option<Vec<u8>>,
}

impl ClientInner {
    fn funding_outpoint(&self) -> Option<OutPoint> {
        self.funding_tx
            .as_ref()
            .map(|tx| OutPoint { txid: tx.compute_txid(), vout: 0 })
    }
}

fn illegal_state(required: &'static str, actual: impl fmt::Display) -> ChannelError {
    ChannelError::IllegalState { required, actual: actual.to_string() }
}

/// Client (payer) side of a micropayment channel
///
/// The handle is cheap to clone; all clones drive the same underlying
/// channel, and every operation holds the channel's mutex for its full
/// duration, so per-channel mutual exclusion is guaranteed.
#[derive(Clone)]
pub struct ClientChannel {
    inner: Arc<Mutex<ClientInner>>,
}

impl ClientChannel {
    /// Creates a client channel in the `New` state
    ///
    /// # Arguments
    /// * `wallet` - The client's wallet (coin source and transaction sink)
    /// * `secret` - The client's funding secret key
    /// * `server_pubkey` - The server's funding key as canonical SEC bytes
    /// * `total_value` - Maximum amount, in satoshis, to lock up
    /// * `expire_time` - Absolute UNIX seconds after which the refund matures
    ///
    /// # Errors
    /// * `ChannelError::Verification` - If `server_pubkey` is not canonical
    /// * `ChannelError::ValueOutOfRange` - If `expire_time` does not fit a
    ///   transaction lock time
    pub fn new(
        wallet: SharedWallet,
        secret: SecretKey,
        server_pubkey: &[u8],
        total_value: u64,
        expire_time: u64,
    ) -> Result<Self> {
        let server_pubkey = sig::parse_canonical_pubkey(server_pubkey)?;
        if expire_time > u64::from(u32::MAX) {
            return Err(ChannelError::ValueOutOfRange(format!(
                "expire time {expire_time} does not fit a transaction lock time"
            )));
        }
        let secp = Secp256k1::new();
        let client_pubkey = PublicKey::new(SecpPublicKey::from_secret_key(&secp, &secret));
        let params = ChannelParameters::new(client_pubkey, server_pubkey, total_value, expire_time);
        Ok(Self {
            inner: Arc::new(Mutex::new(ClientInner {
                wallet,
                secret,
                params,
                state: ClientState::New,
                stored: false,
                refund_tx_fees: 0,
                funding_tx: None,
                refund_tx: None,
                current_payment: 0,
                latest_payment_sig: None,
            })),
        })
    }

    fn lock(&self) -> MutexGuard<'_, ClientInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Current lifecycle state
    pub fn state(&self) -> ClientState {
        self.lock().state
    }

    /// The channel parameters fixed at construction
    pub fn parameters(&self) -> ChannelParameters {
        self.lock().params.clone()
    }

    /// Maximum amount, in satoshis, the channel can carry
    pub fn total_value(&self) -> u64 {
        self.lock().params.total_value
    }

    /// Total fees, in satoshis, spent on the funding and refund pair
    ///
    /// Zero until [`initiate`](Self::initiate) has run.
    pub fn refund_tx_fees(&self) -> u64 {
        self.lock().refund_tx_fees
    }

    /// Amount, in satoshis, paid to the server so far
    pub fn current_payment(&self) -> u64 {
        self.lock().current_payment
    }

    /// The most recent payment signature handed out, if any
    pub fn latest_payment_signature(&self) -> Option<Vec<u8>> {
        self.lock().latest_payment_sig.clone()
    }

    /// Builds the funding and refund transactions
    ///
    /// The funding transaction pays `total_value` into the 2-of-2 multisig
    /// output, with change back to the wallet; its inputs are signed
    /// through the wallet but the transaction is not yet committed or
    /// released. The refund spends the multisig output back to the client,
    /// matures at the channel expiry, and stays unsigned until the server
    /// counter-signs it.
    ///
    /// # Errors
    /// * `ChannelError::IllegalState` - If not in `New`
    /// * `ChannelError::ValueOutOfRange` - If the total value cannot cover a
    ///   spendable refund plus fees, or the wallet cannot afford the funding
    pub fn initiate(&self) -> Result<()> {
        let mut inner = self.lock();
        if inner.state != ClientState::New {
            return Err(illegal_state("NEW", inner.state));
        }
        let total_value = inner.params.total_value;
        if total_value < MIN_NONDUST_OUTPUT + REFERENCE_MIN_FEE {
            return Err(ChannelError::ValueOutOfRange(format!(
                "total value of {total_value} satoshis cannot afford a spendable refund plus the reference fee"
            )));
        }

        let coins = {
            let wallet = inner.wallet.clone();
            let wallet = wallet.lock().unwrap_or_else(|e| e.into_inner());
            wallet
                .select_coins(total_value + REFERENCE_MIN_FEE)
                .map_err(|e| match e {
                    WalletError::InsufficientFunds { requested, available } => {
                        ChannelError::ValueOutOfRange(format!(
                            "wallet cannot afford the {requested} satoshis needed to open the channel ({available} available)"
                        ))
                    }
                    other => ChannelError::Wallet(other),
                })?
        };

        let mut funding = build_funding_transaction(
            &coins,
            &inner.params.client_pubkey,
            &inner.params.server_pubkey,
            total_value,
        );
        {
            let wallet = inner.wallet.clone();
            let wallet = wallet.lock().unwrap_or_else(|e| e.into_inner());
            for index in 0..funding.input.len() {
                let script_sig = wallet.sign_input(&funding, index, SIGHASH_ALL)?;
                funding.input[index].script_sig = script_sig;
            }
        }

        let refund = build_refund_transaction(
            OutPoint { txid: funding.compute_txid(), vout: 0 },
            inner.params.client_script(),
            total_value - REFERENCE_MIN_FEE,
            inner.params.expire_time as u32,
        );

        debug!(
            funding = %funding.compute_txid(),
            refund = %refund.compute_txid(),
            total_value,
            "channel initiated"
        );
        inner.refund_tx_fees = 2 * REFERENCE_MIN_FEE;
        inner.funding_tx = Some(funding);
        inner.refund_tx = Some(refund);
        inner.state = ClientState::Initiated;
        Ok(())
    }

    /// The refund transaction for the server to sign
    ///
    /// # Errors
    /// `ChannelError::IllegalState` if not in `Initiated`.
    pub fn incomplete_refund_transaction(&self) -> Result<Transaction> {
        let inner = self.lock();
        if inner.state != ClientState::Initiated {
            return Err(illegal_state("INITIATED", inner.state));
        }
        inner
            .refund_tx
            .clone()
            .ok_or_else(|| illegal_state("INITIATED", inner.state))
    }

    /// Accepts the server's signature over the refund transaction
    ///
    /// The signature must be canonical, use `SIGHASH_ALL`, and verify
    /// against the multisig script. On success the client counter-signs,
    /// finalizes the refund, and commits the funding transaction to the
    /// wallet as pending; only now is it safe to reveal the funding
    /// transaction to anyone.
    ///
    /// # Errors
    /// * `ChannelError::IllegalState` - If not in `Initiated` (a second call
    ///   fails: the state has already advanced)
    /// * `ChannelError::Verification` - If the signature fails any check
    pub fn provide_refund_signature(&self, server_sig: &[u8]) -> Result<()> {
        let mut inner = self.lock();
        if inner.state != ClientState::Initiated {
            return Err(illegal_state("INITIATED", inner.state));
        }
        let (decoded, flag) = sig::decode_canonical(server_sig)?;
        sig::check_purpose_flag(flag, SigPurpose::Refund)?;

        let funding_script = inner.params.funding_script();
        let mut refund = inner
            .refund_tx
            .clone()
            .ok_or_else(|| illegal_state("INITIATED", inner.state))?;
        sig::verify_input(&decoded, flag, &inner.params.server_pubkey, &refund, 0, &funding_script)?;

        let client_sig = sig::sign_input(&refund, 0, &funding_script, SIGHASH_ALL, &inner.secret)?;
        refund.input[0].script_sig = crate::script::multisig_spend_script(&client_sig, server_sig)?;

        let funding = inner
            .funding_tx
            .clone()
            .ok_or_else(|| illegal_state("INITIATED", inner.state))?;
        {
            let wallet = inner.wallet.clone();
            let mut wallet = wallet.lock().unwrap_or_else(|e| e.into_inner());
            wallet.commit_pending(funding);
        }

        debug!(refund = %refund.compute_txid(), "refund fully signed; funding committed as pending");
        inner.refund_tx = Some(refund);
        inner.state = ClientState::ProvideMultisigContractToServer;
        Ok(())
    }

    /// The funding transaction, for release to the server
    ///
    /// The first call moves the channel to `Ready`.
    ///
    /// # Errors
    /// `ChannelError::IllegalState` before the refund is fully signed.
    pub fn multisig_contract(&self) -> Result<Transaction> {
        let mut inner = self.lock();
        match inner.state {
            ClientState::ProvideMultisigContractToServer => {
                inner.state = ClientState::Ready;
            }
            ClientState::Ready => {}
            other => {
                return Err(illegal_state("PROVIDE_MULTISIG_CONTRACT_TO_SERVER", other));
            }
        }
        inner
            .funding_tx
            .clone()
            .ok_or_else(|| illegal_state("PROVIDE_MULTISIG_CONTRACT_TO_SERVER", inner.state))
    }

    /// Signs a payment transferring `delta` more satoshis to the server
    ///
    /// The sole input is signed with `SIGHASH_SINGLE | SIGHASH_ANYONECANPAY`
    /// so the server can later absorb the close fee or attach an input of
    /// its own without invalidating the signature.
    ///
    /// # Returns
    /// The signature to hand to the server alongside the new refund amount.
    ///
    /// # Errors
    /// * `ChannelError::IllegalState` - If not in `Ready`, or after the
    ///   channel was stored for autobroadcast
    /// * `ChannelError::ValueOutOfRange` - If `delta` is zero, overruns the
    ///   total value, or would leave an unspendable dust refund
    pub fn increment_payment_by(&self, delta: u64) -> Result<Vec<u8>> {
        let mut inner = self.lock();
        if inner.state != ClientState::Ready {
            return Err(illegal_state("READY", inner.state));
        }
        if inner.stored {
            return Err(illegal_state("READY", format!("{} (stored in wallet)", inner.state)));
        }
        if delta == 0 {
            return Err(ChannelError::ValueOutOfRange(
                "payment increment must be greater than zero".to_string(),
            ));
        }
        let total_value = inner.params.total_value;
        let new_payment = inner
            .current_payment
            .checked_add(delta)
            .filter(|&p| p <= total_value)
            .ok_or_else(|| {
                ChannelError::ValueOutOfRange(format!(
                    "payment increment of {delta} satoshis overruns the channel total of {total_value}"
                ))
            })?;
        let refund = total_value - new_payment;
        if refund > 0 && refund < MIN_NONDUST_OUTPUT {
            return Err(ChannelError::ValueOutOfRange(format!(
                "remaining refund of {refund} satoshis would be unspendable dust"
            )));
        }

        let outpoint = inner
            .funding_outpoint()
            .ok_or_else(|| illegal_state("READY", inner.state))?;
        let payment = build_payment_transaction(
            outpoint,
            refund,
            inner.params.client_script(),
            new_payment,
            inner.params.server_script(),
        );
        let signature = sig::sign_input(
            &payment,
            0,
            &inner.params.funding_script(),
            SIGHASH_SINGLE | SIGHASH_ANYONECANPAY,
            &inner.secret,
        )?;

        debug!(new_payment, refund, "payment incremented");
        inner.current_payment = new_payment;
        inner.latest_payment_sig = Some(signature.clone());
        Ok(signature)
    }

    /// The fully signed refund transaction
    ///
    /// # Errors
    /// `ChannelError::IllegalState` before the refund is fully signed.
    pub fn completed_refund_transaction(&self) -> Result<Transaction> {
        let inner = self.lock();
        match inner.state {
            ClientState::ProvideMultisigContractToServer
            | ClientState::Ready
            | ClientState::Expired => {}
            other => {
                return Err(illegal_state("PROVIDE_MULTISIG_CONTRACT_TO_SERVER", other));
            }
        }
        inner
            .refund_tx
            .clone()
            .ok_or_else(|| illegal_state("PROVIDE_MULTISIG_CONTRACT_TO_SERVER", inner.state))
    }

    /// Hands the channel to the storage layer for safe-keeping
    ///
    /// Shortly after the channel expiry
    /// ([`CLIENT_REBROADCAST_DELAY`](crate::types::CLIENT_REBROADCAST_DELAY)
    /// seconds past it) the storage layer broadcasts the funding and then
    /// the refund transaction, recovering the locked funds. Once stored,
    /// further payment increments fail.
    ///
    /// # Errors
    /// `ChannelError::IllegalState` before the refund is fully signed.
    pub fn store_channel_in_wallet(
        &self,
        storage: &mut ChannelStorage,
        id: ChannelId,
    ) -> Result<()> {
        let deadline = {
            let mut inner = self.lock();
            match inner.state {
                ClientState::ProvideMultisigContractToServer | ClientState::Ready => {}
                other => {
                    return Err(illegal_state("READY", other));
                }
            }
            inner.stored = true;
            inner.params.expire_time + crate::types::CLIENT_REBROADCAST_DELAY
        };
        storage.schedule_client(id, self.clone(), deadline);
        Ok(())
    }

    /// Notifies the channel that a confirmed transaction spent the funding
    /// output
    ///
    /// The refund moves the channel to `Expired`; anything else spending
    /// the funding output is the server's close and moves it to `Closed`.
    pub fn transaction_confirmed(&self, tx: &Transaction) {
        let mut inner = self.lock();
        match inner.state {
            ClientState::ProvideMultisigContractToServer
            | ClientState::Ready
            | ClientState::Expired => {}
            _ => return,
        }
        let Some(outpoint) = inner.funding_outpoint() else { return };
        if !tx.input.iter().any(|input| input.previous_output == outpoint) {
            return;
        }
        let refund_txid = inner.refund_tx.as_ref().map(Transaction::compute_txid);
        if Some(tx.compute_txid()) == refund_txid {
            inner.state = ClientState::Expired;
        } else {
            inner.state = ClientState::Closed;
        }
        debug!(state = %inner.state, "funding output spent on-chain");
    }

    /// Broadcasts the funding and refund transactions after expiry
    ///
    /// Called by the storage layer when the client's deadline fires; the
    /// transactions go out in dependency order.
    pub(crate) fn broadcast_fallback(&self, broadcaster: &dyn Broadcaster) {
        let mut inner = self.lock();
        let (Some(funding), Some(refund)) = (inner.funding_tx.clone(), inner.refund_tx.clone())
        else {
            return;
        };
        info!(
            funding = %funding.compute_txid(),
            refund = %refund.compute_txid(),
            "channel expired; broadcasting funding then refund"
        );
        drop(broadcaster.broadcast(funding));
        drop(broadcaster.broadcast(refund));
        inner.state = ClientState::Expired;
    }
}

impl fmt::Debug for ClientChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.lock();
        f.debug_struct("ClientChannel")
            .field("state", &inner.state)
            .field("total_value", &inner.params.total_value)
            .field("current_payment", &inner.current_payment)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::test_utils::{client_keys, server_keys};
    use crate::wallet::{shared, InMemoryWallet};

    fn bare_client(total_value: u64) -> ClientChannel {
        let (client_sk, _) = client_keys();
        let (_, server_pk) = server_keys();
        let wallet = shared(InMemoryWallet::new(client_sk));
        ClientChannel::new(wallet, client_sk, &server_pk.to_bytes(), total_value, 1_800_000_000)
            .expect("valid channel")
    }

    #[test]
    fn test_new_rejects_non_canonical_server_key() {
        let (client_sk, _) = client_keys();
        let wallet = shared(InMemoryWallet::new(client_sk));

        let error = ClientChannel::new(wallet, client_sk, &[0x05; 33], 100_000, 1_800_000_000)
            .expect_err("invalid key bytes");

        assert!(matches!(error, ChannelError::Verification(_)));
        assert!(error.to_string().contains("not canonical"));
    }

    #[test]
    fn test_initiate_rejects_unworkable_total() {
        let client = bare_client(MIN_NONDUST_OUTPUT + REFERENCE_MIN_FEE - 1);

        let error = client.initiate().expect_err("total too small");

        assert!(error.to_string().contains("afford"));
        assert_eq!(client.state(), ClientState::New);
    }

    #[test]
    fn test_operations_out_of_order_do_not_mutate() {
        let client = bare_client(100_000);

        assert!(matches!(
            client.incomplete_refund_transaction(),
            Err(ChannelError::IllegalState { .. })
        ));
        assert!(matches!(
            client.increment_payment_by(1),
            Err(ChannelError::IllegalState { .. })
        ));
        assert_eq!(client.state(), ClientState::New);
    }
}
