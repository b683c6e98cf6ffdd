//! Channel storage and timed rebroadcast
//!
//! Channels that must act at a known future time are handed here for
//! safe-keeping. The storage layer keeps a min-heap of deadlines and, when
//! asked to tick, fires every entry whose time has come:
//!
//! - client channels broadcast the funding and refund transactions shortly
//!   after expiry, recovering the locked funds from a vanished server
//! - server channels claim the best payment shortly before expiry, beating
//!   the refund to the chain
//!
//! Durability across process restarts is a separate concern; this layer
//! only owns the deadline bookkeeping and the broadcaster hand-off.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::sync::Arc;

use tracing::debug;

use crate::broadcast::Broadcaster;
use crate::channel::client::ClientChannel;
use crate::channel::server::ServerChannel;
use crate::clock::Clock;
use crate::types::ChannelId;

enum StoredParty {
    Client(ClientChannel),
    Server(ServerChannel),
}

struct StoredChannel {
    deadline: u64,
    id: ChannelId,
    party: StoredParty,
}

impl PartialEq for StoredChannel {
    fn eq(&self, other: &Self) -> bool {
        self.deadline == other.deadline && self.id == other.id
    }
}

impl Eq for StoredChannel {}

impl PartialOrd for StoredChannel {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for StoredChannel {
    fn cmp(&self, other: &Self) -> Ordering {
        self.deadline.cmp(&other.deadline).then_with(|| self.id.cmp(&other.id))
    }
}

/// Holds stored channels and fires their deadline actions
pub struct ChannelStorage {
    broadcaster: Arc<dyn Broadcaster>,
    clock: Arc<dyn Clock>,
    heap: BinaryHeap<Reverse<StoredChannel>>,
}

impl ChannelStorage {
    /// Creates an empty storage layer over the shared broadcaster and clock
    pub fn new(broadcaster: Arc<dyn Broadcaster>, clock: Arc<dyn Clock>) -> Self {
        Self { broadcaster, clock, heap: BinaryHeap::new() }
    }

    pub(crate) fn schedule_client(&mut self, id: ChannelId, channel: ClientChannel, deadline: u64) {
        debug!(deadline, "client channel stored for rebroadcast");
        self.heap
            .push(Reverse(StoredChannel { deadline, id, party: StoredParty::Client(channel) }));
    }

    pub(crate) fn schedule_server(&mut self, id: ChannelId, channel: ServerChannel, deadline: u64) {
        debug!(deadline, "server channel stored for pre-expiry claim");
        self.heap
            .push(Reverse(StoredChannel { deadline, id, party: StoredParty::Server(channel) }));
    }

    /// Number of channels awaiting their deadline
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    /// Whether no channels are stored
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// The earliest stored deadline, if any
    pub fn next_deadline(&self) -> Option<u64> {
        self.heap.peek().map(|Reverse(entry)| entry.deadline)
    }

    /// Fires every stored channel whose deadline has passed
    ///
    /// # Returns
    /// The number of channels fired.
    pub fn tick(&mut self) -> usize {
        let now = self.clock.now();
        let mut fired = 0;
        while self.heap.peek().is_some_and(|Reverse(entry)| entry.deadline <= now) {
            let Some(Reverse(entry)) = self.heap.pop() else { break };
            debug!(deadline = entry.deadline, now, "channel deadline fired");
            match entry.party {
                StoredParty::Client(channel) => {
                    channel.broadcast_fallback(self.broadcaster.as_ref());
                }
                StoredParty::Server(channel) => channel.claim_before_expiry(),
            }
            fired += 1;
        }
        fired
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::test_utils::{client_keys, server_keys, MockBroadcaster, MockClock};
    use crate::wallet::{shared, InMemoryWallet};

    fn bare_client(total_value: u64) -> ClientChannel {
        let (client_sk, _) = client_keys();
        let (_, server_pk) = server_keys();
        let wallet = shared(InMemoryWallet::new(client_sk));
        ClientChannel::new(wallet, client_sk, &server_pk.to_bytes(), total_value, 2_000_000)
            .expect("valid channel")
    }

    #[test]
    fn test_deadlines_fire_in_order() {
        let broadcaster = Arc::new(MockBroadcaster::default());
        let clock = Arc::new(MockClock::new(1_000_000));
        let mut storage = ChannelStorage::new(broadcaster, clock.clone());

        storage.schedule_client([1u8; 32], bare_client(100_000), 1_500_000);
        storage.schedule_client([2u8; 32], bare_client(100_000), 1_200_000);
        assert_eq!(storage.len(), 2);
        assert_eq!(storage.next_deadline(), Some(1_200_000));

        assert_eq!(storage.tick(), 0);

        clock.roll(250_000);
        assert_eq!(storage.tick(), 1);
        assert_eq!(storage.next_deadline(), Some(1_500_000));

        clock.roll(300_000);
        assert_eq!(storage.tick(), 1);
        assert!(storage.is_empty());
    }
}
