//! Transaction broadcasting
//!
//! The channel hands finished transactions to a [`Broadcaster`] and
//! observes the outcome through a one-shot settle. The state machines
//! never schedule work of their own; they re-enter only when the settle
//! arrives.

use bitcoin::Transaction;
use tokio::sync::oneshot;

use crate::errors::BroadcastError;

/// Outcome of a broadcast: the accepted transaction, or the network's
/// rejection
pub type BroadcastResult = std::result::Result<Transaction, BroadcastError>;

/// Receiving half of a pending broadcast
pub type BroadcastReceiver = oneshot::Receiver<BroadcastResult>;

/// Gossips transactions to the Bitcoin network
///
/// Implementations are shared across channels and must be internally
/// thread-safe. Dropping the sending half before settling is reported to
/// the channel as [`BroadcastError::Abandoned`].
pub trait Broadcaster: Send + Sync {
    /// Hands a transaction to the network; the receiver settles when the
    /// network accepts or rejects it
    fn broadcast(&self, tx: Transaction) -> BroadcastReceiver;
}
