//! Channel parameters
//!
//! The immutable facts both parties agree on at channel birth: the two
//! funding keys (public halves), the amount the client locks up, and the
//! absolute time at which the client's refund matures.

use bitcoin::{PublicKey, ScriptBuf};

use crate::script::{multisig_script, p2pkh_script};

/// Immutable parameters fixed when a channel is created
///
/// Each side additionally holds its own secret key; this struct carries
/// only what both sides can see.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelParameters {
    /// Client's funding public key
    pub client_pubkey: PublicKey,
    /// Server's funding public key
    pub server_pubkey: PublicKey,
    /// Maximum amount, in satoshis, the channel can carry
    pub total_value: u64,
    /// UNIX time, in seconds, at which the refund becomes spendable
    pub expire_time: u64,
}

impl ChannelParameters {
    /// Creates channel parameters
    pub fn new(
        client_pubkey: PublicKey,
        server_pubkey: PublicKey,
        total_value: u64,
        expire_time: u64,
    ) -> Self {
        Self { client_pubkey, server_pubkey, total_value, expire_time }
    }

    /// The 2-of-2 multisig script locking the channel funds
    pub fn funding_script(&self) -> ScriptBuf {
        multisig_script(&self.client_pubkey, &self.server_pubkey)
    }

    /// The client's pay-to-pubkey-hash script, where refunds are sent
    pub fn client_script(&self) -> ScriptBuf {
        p2pkh_script(&self.client_pubkey)
    }

    /// The server's pay-to-pubkey-hash script, where payments are sent
    pub fn server_script(&self) -> ScriptBuf {
        p2pkh_script(&self.server_pubkey)
    }
}
