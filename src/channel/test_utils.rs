//! Shared test utilities for channel module tests
//!
//! This module provides deterministic keys, a rollable clock, a recording
//! broadcaster, and fake confirmed transactions used across the unit tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use bitcoin::absolute::LockTime;
use bitcoin::hashes::Hash;
use bitcoin::secp256k1::{PublicKey as SecpPublicKey, Secp256k1, SecretKey};
use bitcoin::transaction::Version;
use bitcoin::{Amount, OutPoint, ScriptBuf, Sequence, Transaction, TxIn, TxOut, Txid, Witness};
use tokio::sync::oneshot;

use crate::broadcast::{BroadcastReceiver, BroadcastResult, Broadcaster};
use crate::clock::Clock;

/// Deterministically derive a secret key from a single byte (tests only)
fn deterministic_secret(byte: u8) -> SecretKey {
    SecretKey::from_slice(&[byte; 32]).expect("32-byte array should always be a valid SecretKey")
}

fn keys_from(byte: u8) -> (SecretKey, bitcoin::PublicKey) {
    let secp = Secp256k1::new();
    let secret = deterministic_secret(byte);
    let public = bitcoin::PublicKey::new(SecpPublicKey::from_secret_key(&secp, &secret));
    (secret, public)
}

/// Helper function to generate the client's test keypair
pub fn client_keys() -> (SecretKey, bitcoin::PublicKey) {
    keys_from(1)
}

/// Helper function to generate the server's test keypair
pub fn server_keys() -> (SecretKey, bitcoin::PublicKey) {
    keys_from(2)
}

static FAKE_TX_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Builds a fake confirmed transaction crediting `value` to `script`
///
/// Each call spends a unique dummy outpoint so txids never collide.
pub fn fake_coin_tx(script: &ScriptBuf, value: u64) -> Transaction {
    let nonce = FAKE_TX_COUNTER.fetch_add(1, Ordering::Relaxed);
    let mut txid_bytes = [0xabu8; 32];
    txid_bytes[..8].copy_from_slice(&nonce.to_le_bytes());
    Transaction {
        version: Version::TWO,
        lock_time: LockTime::ZERO,
        input: vec![TxIn {
            previous_output: OutPoint { txid: Txid::from_byte_array(txid_bytes), vout: 0 },
            script_sig: ScriptBuf::new(),
            sequence: Sequence::MAX,
            witness: Witness::new(),
        }],
        output: vec![TxOut { value: Amount::from_sat(value), script_pubkey: script.clone() }],
    }
}

/// Rollable clock for driving deadlines in tests
pub struct MockClock {
    now: AtomicU64,
}

impl MockClock {
    /// Creates a clock frozen at `now` seconds
    pub fn new(now: u64) -> Self {
        Self { now: AtomicU64::new(now) }
    }

    /// Advances the clock by `seconds`
    pub fn roll(&self, seconds: u64) {
        self.now.fetch_add(seconds, Ordering::Relaxed);
    }
}

impl Clock for MockClock {
    fn now(&self) -> u64 {
        self.now.load(Ordering::Relaxed)
    }
}

/// Broadcaster that records every hand-off and lets the test settle it
#[derive(Default)]
pub struct MockBroadcaster {
    queue: Mutex<VecDeque<(Transaction, oneshot::Sender<BroadcastResult>)>>,
}

impl MockBroadcaster {
    /// Takes the oldest pending broadcast and its settle handle
    pub fn take(&self) -> (Transaction, oneshot::Sender<BroadcastResult>) {
        self.queue
            .lock()
            .expect("mock broadcaster lock")
            .pop_front()
            .expect("a broadcast should be pending")
    }

    /// Number of unsettled broadcasts
    pub fn pending(&self) -> usize {
        self.queue.lock().expect("mock broadcaster lock").len()
    }
}

impl Broadcaster for MockBroadcaster {
    fn broadcast(&self, tx: Transaction) -> BroadcastReceiver {
        let (sender, receiver) = oneshot::channel();
        self.queue.lock().expect("mock broadcaster lock").push_back((tx, sender));
        receiver
    }
}
