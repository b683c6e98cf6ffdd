//! Server side of the channel
//!
//! The server signs the client's refund sight-unseen of the funding
//! transaction, broadcasts the funding contract once it arrives, validates
//! every incremental payment signature, and finally broadcasts the best
//! payment as the close transaction. Its lifecycle:
//!
//! - `WaitingForRefundTransaction`: nothing received yet
//! - `WaitingForMultisigContract`: refund signed and returned
//! - `WaitingForMultisigAcceptance`: contract handed to the broadcaster
//! - `Ready`: contract accepted; payments may flow
//! - `Closing` / `Closed` / `Error`: close broadcast in flight / settled /
//!   failed
//!
//! Broadcast outcomes re-enter the state machine in two ways: state reads
//! absorb any settled broadcast before answering, and the futures returned
//! by [`ServerChannel::provide_multisig_contract`] and
//! [`ServerChannel::close`] apply the transition when awaited. Either path
//! may run first; the transition happens exactly once.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard};
use std::task::{Context, Poll, Waker};

use bitcoin::secp256k1::{PublicKey as SecpPublicKey, Secp256k1, SecretKey};
use bitcoin::{
    Amount, OutPoint, PublicKey, ScriptBuf, Sequence, Transaction, TxIn, TxOut, Txid, Witness,
};
use tokio::sync::oneshot::error::TryRecvError;
use tracing::{debug, info, warn};

use crate::broadcast::{BroadcastReceiver, BroadcastResult, Broadcaster};
use crate::channel::storage::ChannelStorage;
use crate::channel::tx::{build_payment_transaction, estimate_fee};
use crate::errors::{BroadcastError, ChannelError, Result, WalletError};
use crate::script::{self, multisig_script, p2pkh_script};
use crate::sig::{self, SigPurpose};
use crate::types::{
    ChannelId, MIN_NONDUST_OUTPUT, SERVER_CLOSE_DEADLINE, SERVER_MIN_LOCKTIME_MARGIN, SIGHASH_ALL,
};
use crate::wallet::{SharedWallet, Wallet};

/// Lifecycle states of the server side
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    /// Waiting for the client's unsigned refund transaction
    WaitingForRefundTransaction,
    /// Refund signed; waiting for the funding contract
    WaitingForMultisigContract,
    /// Contract handed to the broadcaster; waiting for network acceptance
    WaitingForMultisigAcceptance,
    /// Channel open; payments may flow
    Ready,
    /// Close transaction handed to the broadcaster
    Closing,
    /// Close transaction accepted by the network
    Closed,
    /// A broadcast failed; the channel cannot make progress
    Error,
}

impl fmt::Display for ServerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ServerState::WaitingForRefundTransaction => "WAITING_FOR_REFUND_TRANSACTION",
            ServerState::WaitingForMultisigContract => "WAITING_FOR_MULTISIG_CONTRACT",
            ServerState::WaitingForMultisigAcceptance => "WAITING_FOR_MULTISIG_ACCEPTANCE",
            ServerState::Ready => "READY",
            ServerState::Closing => "CLOSING",
            ServerState::Closed => "CLOSED",
            ServerState::Error => "ERROR",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PendingKind {
    Contract,
    Close,
}

struct PendingBroadcast {
    kind: PendingKind,
    rx: BroadcastReceiver,
}

struct ServerInner {
    broadcaster: Arc<dyn Broadcaster>,
    wallet: SharedWallet,
    secret: SecretKey,
    server_pubkey: PublicKey,
    expire_time: u64,
    state: ServerState,
    client_pubkey: Option<PublicKey>,
    funding_script: Option<ScriptBuf>,
    client_output_script: Option<ScriptBuf>,
    refund_txid: Option<Txid>,
    refund_lock_time: Option<u32>,
    contract: Option<Transaction>,
    funding_outpoint: Option<OutPoint>,
    total_value: u64,
    best_value_to_me: u64,
    latest_refund_amount: u64,
    latest_payment_sig: Option<Vec<u8>>,
    close_tx: Option<Transaction>,
    pending: Option<PendingBroadcast>,
    broadcast_error: Option<BroadcastError>,
    waker: Option<Waker>,
}

fn illegal_state(required: &'static str, actual: impl fmt::Display) -> ChannelError {
    ChannelError::IllegalState { required, actual: actual.to_string() }
}

/// Applies a settled broadcast outcome to the state machine
fn apply_settle(inner: &mut ServerInner, outcome: BroadcastResult) {
    let Some(pending) = inner.pending.take() else { return };
    match outcome {
        Ok(tx) => match pending.kind {
            PendingKind::Contract => {
                debug!(contract = %tx.compute_txid(), "multisig contract accepted by the network");
                inner.state = ServerState::Ready;
            }
            PendingKind::Close => {
                debug!(close = %tx.compute_txid(), "close transaction accepted by the network");
                inner.state = ServerState::Closed;
            }
        },
        Err(error) => {
            warn!(%error, "broadcast failed");
            inner.broadcast_error = Some(error);
            inner.state = ServerState::Error;
        }
    }
    // A state read may absorb the settle before the awaiting future does
    if let Some(waker) = inner.waker.take() {
        waker.wake();
    }
}

/// Absorbs a settled broadcast, if any, without blocking
fn settle_if_ready(inner: &mut ServerInner) {
    let outcome = match inner.pending.as_mut() {
        Some(pending) => match pending.rx.try_recv() {
            Ok(result) => result,
            Err(TryRecvError::Empty) => return,
            Err(TryRecvError::Closed) => Err(BroadcastError::Abandoned),
        },
        None => return,
    };
    apply_settle(inner, outcome);
}

/// Future resolving when a broadcast hand-off settles
///
/// Returned by [`ServerChannel::provide_multisig_contract`] and
/// [`ServerChannel::close`]. Resolves `Ok(())` when the network accepted
/// the transaction and the state machine advanced, or the broadcaster's
/// error, unchanged, when it did not. Awaiting is optional; the state
/// machine also absorbs the outcome on its next state read.
pub struct BroadcastCompletion {
    inner: Arc<Mutex<ServerInner>>,
    kind: PendingKind,
}

impl Future for BroadcastCompletion {
    type Output = std::result::Result<(), BroadcastError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let settled = match inner.pending.as_mut() {
            Some(pending) if pending.kind == self.kind => {
                match Pin::new(&mut pending.rx).poll(cx) {
                    Poll::Pending => {
                        inner.waker = Some(cx.waker().clone());
                        return Poll::Pending;
                    }
                    Poll::Ready(Ok(result)) => Some(result),
                    Poll::Ready(Err(_)) => Some(Err(BroadcastError::Abandoned)),
                }
            }
            _ => None,
        };
        if let Some(outcome) = settled {
            apply_settle(&mut inner, outcome);
        }
        match (self.kind, inner.state) {
            (_, ServerState::Error) => Poll::Ready(Err(inner
                .broadcast_error
                .clone()
                .unwrap_or(BroadcastError::Abandoned))),
            (
                PendingKind::Contract,
                ServerState::Ready | ServerState::Closing | ServerState::Closed,
            )
            | (PendingKind::Close, ServerState::Closed) => Poll::Ready(Ok(())),
            _ => {
                inner.waker = Some(cx.waker().clone());
                Poll::Pending
            }
        }
    }
}

impl fmt::Debug for BroadcastCompletion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BroadcastCompletion").field("kind", &self.kind).finish_non_exhaustive()
    }
}

/// Server (payee) side of a micropayment channel
///
/// The handle is cheap to clone; all clones drive the same underlying
/// channel, and every operation holds the channel's mutex for its full
/// duration, so per-channel mutual exclusion is guaranteed.
#[derive(Clone)]
pub struct ServerChannel {
    inner: Arc<Mutex<ServerInner>>,
}

impl ServerChannel {
    /// Creates a server channel waiting for the client's refund
    ///
    /// # Arguments
    /// * `broadcaster` - Shared network gossip
    /// * `wallet` - The server's wallet, used to top up close fees
    /// * `secret` - The server's funding secret key
    /// * `expire_time` - Minimum refund maturity the server will accept,
    ///   as absolute UNIX seconds
    pub fn new(
        broadcaster: Arc<dyn Broadcaster>,
        wallet: SharedWallet,
        secret: SecretKey,
        expire_time: u64,
    ) -> Self {
        let secp = Secp256k1::new();
        let server_pubkey = PublicKey::new(SecpPublicKey::from_secret_key(&secp, &secret));
        Self {
            inner: Arc::new(Mutex::new(ServerInner {
                broadcaster,
                wallet,
                secret,
                server_pubkey,
                expire_time,
                state: ServerState::WaitingForRefundTransaction,
                client_pubkey: None,
                funding_script: None,
                client_output_script: None,
                refund_txid: None,
                refund_lock_time: None,
                contract: None,
                funding_outpoint: None,
                total_value: 0,
                best_value_to_me: 0,
                latest_refund_amount: 0,
                latest_payment_sig: None,
                close_tx: None,
                pending: None,
                broadcast_error: None,
                waker: None,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ServerInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Current lifecycle state, after absorbing any settled broadcast
    pub fn state(&self) -> ServerState {
        let mut inner = self.lock();
        settle_if_ready(&mut inner);
        inner.state
    }

    /// Highest amount, in satoshis, the client has authorized so far
    pub fn best_value_to_me(&self) -> u64 {
        self.lock().best_value_to_me
    }

    /// Client refund amount of the best accepted payment
    pub fn latest_refund_amount(&self) -> u64 {
        self.lock().latest_refund_amount
    }

    /// The server's funding public key
    pub fn server_pubkey(&self) -> PublicKey {
        self.lock().server_pubkey
    }

    /// The broadcast close transaction, once one was built
    pub fn close_transaction(&self) -> Option<Transaction> {
        self.lock().close_tx.clone()
    }

    /// The funding contract received from the client, once one was provided
    pub fn multisig_contract(&self) -> Option<Transaction> {
        self.lock().contract.clone()
    }

    /// Txid of the refund the server signed, once one was provided
    pub fn refund_txid(&self) -> Option<Txid> {
        self.lock().refund_txid
    }

    /// Lock time of the refund the server signed, once one was provided
    pub fn refund_lock_time(&self) -> Option<u32> {
        self.lock().refund_lock_time
    }

    /// Signs the client's refund transaction
    ///
    /// The refund is validated structurally before anything is signed: it
    /// must have exactly one input and one output, a sequence number that
    /// leaves the lock time in force, a lock time no earlier than the
    /// channel expiry (minus the server's tolerated margin), and a
    /// spendable output. The server signs with `SIGHASH_ALL` and remembers
    /// the refund only by txid, lock time, and its client output script;
    /// it never broadcasts the refund itself.
    ///
    /// # Arguments
    /// * `refund` - The client's unsigned refund transaction
    /// * `client_pubkey` - The client's funding key as canonical SEC bytes
    ///
    /// # Returns
    /// The server's signature bytes for the client to finalize the refund.
    ///
    /// # Errors
    /// * `ChannelError::IllegalState` - If not waiting for a refund (a
    ///   second call fails: the state has advanced)
    /// * `ChannelError::Verification` - If the key or refund is malformed
    pub fn provide_refund_transaction(
        &self,
        refund: &Transaction,
        client_pubkey: &[u8],
    ) -> Result<Vec<u8>> {
        let mut inner = self.lock();
        if inner.state != ServerState::WaitingForRefundTransaction {
            return Err(illegal_state("WAITING_FOR_REFUND_TRANSACTION", inner.state));
        }
        let client_pubkey = sig::parse_canonical_pubkey(client_pubkey)?;

        if refund.input.len() != 1 {
            return Err(ChannelError::Verification(format!(
                "refund transaction must have exactly one input, got {}",
                refund.input.len()
            )));
        }
        if refund.output.len() != 1 {
            return Err(ChannelError::Verification(format!(
                "refund transaction must have exactly one output, got {}",
                refund.output.len()
            )));
        }
        if refund.input[0].sequence == Sequence::MAX {
            return Err(ChannelError::Verification(
                "refund input sequence number disables its lock time".to_string(),
            ));
        }
        let lock_time = refund.lock_time.to_consensus_u32();
        let earliest = inner.expire_time.saturating_sub(SERVER_MIN_LOCKTIME_MARGIN);
        if u64::from(lock_time) < earliest {
            return Err(ChannelError::Verification(format!(
                "refund lock time {lock_time} matures before the channel expiry window {earliest}"
            )));
        }
        let refund_value = refund.output[0].value.to_sat();
        if refund_value < MIN_NONDUST_OUTPUT {
            return Err(ChannelError::Verification(format!(
                "refund output of {refund_value} satoshis is unspendable dust"
            )));
        }

        let funding_script = multisig_script(&client_pubkey, &inner.server_pubkey);
        let signature = sig::sign_input(refund, 0, &funding_script, SIGHASH_ALL, &inner.secret)?;

        debug!(refund = %refund.compute_txid(), lock_time, "refund signed");
        inner.client_pubkey = Some(client_pubkey);
        inner.funding_script = Some(funding_script);
        inner.client_output_script = Some(refund.output[0].script_pubkey.clone());
        inner.refund_txid = Some(refund.compute_txid());
        inner.refund_lock_time = Some(lock_time);
        inner.state = ServerState::WaitingForMultisigContract;
        Ok(signature)
    }

    /// Accepts the client's funding contract and hands it to the network
    ///
    /// Output 0 must be the canonical 2-of-2 multisig over the client and
    /// server keys, in that order, with a non-zero value. On success the
    /// channel waits for network acceptance; the returned future settles
    /// when the broadcaster does.
    ///
    /// # Errors
    /// * `ChannelError::IllegalState` - If not waiting for the contract
    /// * `ChannelError::Verification` - If output 0 is not the expected
    ///   multisig or carries no value
    pub fn provide_multisig_contract(&self, contract: Transaction) -> Result<BroadcastCompletion> {
        let mut inner = self.lock();
        if inner.state != ServerState::WaitingForMultisigContract {
            return Err(illegal_state("WAITING_FOR_MULTISIG_CONTRACT", inner.state));
        }
        if contract.input.is_empty() {
            return Err(ChannelError::Verification(
                "multisig contract has no inputs".to_string(),
            ));
        }
        let output = contract.output.first().ok_or_else(|| {
            ChannelError::Verification("multisig contract has no outputs".to_string())
        })?;
        if !script::is_multisig_script(&output.script_pubkey) {
            return Err(ChannelError::Verification(
                "contract output 0 is not a two-of-two multisig script".to_string(),
            ));
        }
        let expected = inner
            .funding_script
            .clone()
            .ok_or_else(|| illegal_state("WAITING_FOR_MULTISIG_CONTRACT", inner.state))?;
        if output.script_pubkey != expected {
            return Err(ChannelError::Verification(
                "contract multisig keys must be client and server in that order".to_string(),
            ));
        }
        let total_value = output.value.to_sat();
        if total_value == 0 {
            return Err(ChannelError::Verification(
                "contract output 0 has zero value".to_string(),
            ));
        }

        let txid = contract.compute_txid();
        info!(contract = %txid, total_value, "broadcasting multisig contract");
        let rx = inner.broadcaster.broadcast(contract.clone());
        inner.total_value = total_value;
        inner.funding_outpoint = Some(OutPoint { txid, vout: 0 });
        inner.contract = Some(contract);
        inner.pending = Some(PendingBroadcast { kind: PendingKind::Contract, rx });
        inner.state = ServerState::WaitingForMultisigAcceptance;
        Ok(BroadcastCompletion { inner: self.inner.clone(), kind: PendingKind::Contract })
    }

    /// Accepts an incremental payment from the client
    ///
    /// `client_refund_amount` is the amount flowing back to the client; the
    /// server's share is the channel total minus it. Stale or replayed
    /// updates (authorizing no more than already held) are dropped with a
    /// silent `Ok`: they cost the server nothing. The signature must be
    /// canonical, carry exactly `SIGHASH_SINGLE | SIGHASH_ANYONECANPAY`,
    /// and verify against the funding output for the reconstructed payment
    /// transaction.
    ///
    /// # Errors
    /// * `ChannelError::IllegalState` - If the channel is not `Ready`
    /// * `ChannelError::ValueOutOfRange` - If the refund exceeds the channel
    ///   value or would be unspendable dust
    /// * `ChannelError::Verification` - If the signature fails any check
    pub fn increment_payment(&self, client_refund_amount: u64, signature: &[u8]) -> Result<()> {
        let mut inner = self.lock();
        settle_if_ready(&mut inner);
        if inner.state != ServerState::Ready {
            return Err(illegal_state("READY", inner.state));
        }
        let new_value_to_me =
            inner.total_value.checked_sub(client_refund_amount).ok_or_else(|| {
                ChannelError::ValueOutOfRange(format!(
                    "refund of {client_refund_amount} satoshis is more than the channel is worth ({})",
                    inner.total_value
                ))
            })?;
        if new_value_to_me <= inner.best_value_to_me {
            debug!(
                new_value_to_me,
                best_value_to_me = inner.best_value_to_me,
                "stale payment update ignored"
            );
            return Ok(());
        }
        if client_refund_amount > 0 && client_refund_amount < MIN_NONDUST_OUTPUT {
            return Err(ChannelError::ValueOutOfRange(format!(
                "client refund of {client_refund_amount} satoshis would be unspendable dust"
            )));
        }

        let (decoded, flag) = sig::decode_canonical(signature)?;
        sig::check_purpose_flag(flag, SigPurpose::Payment)?;

        let outpoint = inner
            .funding_outpoint
            .ok_or_else(|| illegal_state("READY", inner.state))?;
        let client_script = inner
            .client_output_script
            .clone()
            .ok_or_else(|| illegal_state("READY", inner.state))?;
        let client_pubkey = inner
            .client_pubkey
            .ok_or_else(|| illegal_state("READY", inner.state))?;
        let funding_script = inner
            .funding_script
            .clone()
            .ok_or_else(|| illegal_state("READY", inner.state))?;
        let payment = build_payment_transaction(
            outpoint,
            client_refund_amount,
            client_script,
            new_value_to_me,
            p2pkh_script(&inner.server_pubkey),
        );
        sig::verify_input(&decoded, flag, &client_pubkey, &payment, 0, &funding_script)?;

        debug!(new_value_to_me, client_refund_amount, "payment accepted");
        inner.best_value_to_me = new_value_to_me;
        inner.latest_refund_amount = client_refund_amount;
        inner.latest_payment_sig = Some(signature.to_vec());
        Ok(())
    }

    /// Builds and broadcasts the close transaction claiming the channel
    ///
    /// The close transaction is the best payment transaction with the
    /// minimum relay fee absorbed by the server: deducted from the server's
    /// own output when that leaves it spendable, otherwise topped up with
    /// an input and change pair from the server's wallet (legal because the
    /// client signed with `SIGHASH_ANYONECANPAY`).
    ///
    /// Idempotent once `Closed`; while `Closing` the returned future tracks
    /// the in-flight broadcast; in `Error` it replays the stored broadcast
    /// failure.
    ///
    /// # Errors
    /// * `ChannelError::IllegalState` - If the channel never became `Ready`
    /// * `ChannelError::ValueOutOfRange` - "unable to pay required fee" when
    ///   the wallet cannot cover a needed top-up, or "more in fees than the
    ///   channel was worth" when the fee would consume the entire claim
    pub fn close(&self) -> Result<BroadcastCompletion> {
        let mut inner = self.lock();
        settle_if_ready(&mut inner);
        match inner.state {
            ServerState::Closing | ServerState::Closed | ServerState::Error => {
                return Ok(BroadcastCompletion {
                    inner: self.inner.clone(),
                    kind: PendingKind::Close,
                });
            }
            ServerState::Ready => {}
            other => return Err(illegal_state("READY", other)),
        }

        if inner.best_value_to_me == 0 {
            info!("closing a channel that received no payments");
            inner.state = ServerState::Closed;
            return Ok(BroadcastCompletion { inner: self.inner.clone(), kind: PendingKind::Close });
        }
        let client_sig = inner
            .latest_payment_sig
            .clone()
            .ok_or_else(|| illegal_state("READY", inner.state))?;
        let outpoint = inner
            .funding_outpoint
            .ok_or_else(|| illegal_state("READY", inner.state))?;
        let client_script = inner
            .client_output_script
            .clone()
            .ok_or_else(|| illegal_state("READY", inner.state))?;
        let funding_script = inner
            .funding_script
            .clone()
            .ok_or_else(|| illegal_state("READY", inner.state))?;

        let best = inner.best_value_to_me;
        let refund = inner.latest_refund_amount;
        let mut tx = build_payment_transaction(
            outpoint,
            refund,
            client_script,
            best,
            p2pkh_script(&inner.server_pubkey),
        );
        let fee = estimate_fee(&tx);

        let mut topped_up = false;
        if refund > 0 && best >= fee + MIN_NONDUST_OUTPUT {
            // The server output is not pinned by the client's SIGHASH_SINGLE
            // signature, so the fee can come straight out of it.
            tx.output[1].value = Amount::from_sat(best - fee);
        } else {
            let coins = {
                let wallet = inner.wallet.clone();
                let wallet = wallet.lock().unwrap_or_else(|e| e.into_inner());
                wallet.select_coins(fee).map_err(|e| match e {
                    WalletError::InsufficientFunds { .. } => ChannelError::ValueOutOfRange(
                        format!("unable to pay required fee of {fee} satoshis to close the channel"),
                    ),
                    other => ChannelError::Wallet(other),
                })?
            };
            if best <= fee {
                return Err(ChannelError::ValueOutOfRange(format!(
                    "closing would cost more in fees than the channel was worth: fee {fee}, channel {best}"
                )));
            }
            for utxo in &coins.utxos {
                tx.input.push(TxIn {
                    previous_output: utxo.outpoint,
                    script_sig: ScriptBuf::new(),
                    sequence: Sequence::MAX,
                    witness: Witness::new(),
                });
            }
            if coins.change_value >= MIN_NONDUST_OUTPUT {
                tx.output.push(TxOut {
                    value: Amount::from_sat(coins.change_value),
                    script_pubkey: coins.change_script.clone(),
                });
            }
            topped_up = true;
        }

        let server_sig = sig::sign_input(&tx, 0, &funding_script, SIGHASH_ALL, &inner.secret)?;
        tx.input[0].script_sig = script::multisig_spend_script(&client_sig, &server_sig)?;

        if topped_up {
            let wallet = inner.wallet.clone();
            let mut wallet = wallet.lock().unwrap_or_else(|e| e.into_inner());
            for index in 1..tx.input.len() {
                let script_sig = wallet.sign_input(&tx, index, SIGHASH_ALL)?;
                tx.input[index].script_sig = script_sig;
            }
            // Other channels share this wallet; the selected coins must be
            // marked spent before the transaction leaves the channel.
            wallet.commit_pending(tx.clone());
        }

        info!(close = %tx.compute_txid(), value_to_me = best, fee, "broadcasting close transaction");
        let rx = inner.broadcaster.broadcast(tx.clone());
        inner.close_tx = Some(tx);
        inner.pending = Some(PendingBroadcast { kind: PendingKind::Close, rx });
        inner.state = ServerState::Closing;
        Ok(BroadcastCompletion { inner: self.inner.clone(), kind: PendingKind::Close })
    }

    /// Hands the channel to the storage layer for safe-keeping
    ///
    /// At [`SERVER_CLOSE_DEADLINE`] seconds before the channel expiry the
    /// storage layer drives the normal close path, claiming the best
    /// payment before the client's refund matures.
    ///
    /// # Errors
    /// `ChannelError::IllegalState` if the channel is not `Ready`.
    pub fn store_channel_in_wallet(
        &self,
        storage: &mut ChannelStorage,
        id: ChannelId,
    ) -> Result<()> {
        let deadline = {
            let mut inner = self.lock();
            settle_if_ready(&mut inner);
            if inner.state != ServerState::Ready {
                return Err(illegal_state("READY", inner.state));
            }
            inner.expire_time.saturating_sub(SERVER_CLOSE_DEADLINE)
        };
        storage.schedule_server(id, self.clone(), deadline);
        Ok(())
    }

    /// Claims the channel with the best payment before the refund matures
    ///
    /// Called by the storage layer when the server's deadline fires.
    pub(crate) fn claim_before_expiry(&self) {
        if let Err(error) = self.close() {
            warn!(%error, "scheduled channel claim failed");
        }
    }
}

impl fmt::Debug for ServerChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.lock();
        f.debug_struct("ServerChannel")
            .field("state", &inner.state)
            .field("total_value", &inner.total_value)
            .field("best_value_to_me", &inner.best_value_to_me)
            .finish_non_exhaustive()
    }
}
