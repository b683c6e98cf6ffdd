//! Channel module for unidirectional micropayment channels
//!
//! This module implements both halves of the channel protocol. The client
//! locks funds into a 2-of-2 multisig output and streams incrementally
//! larger payment signatures; the server validates them, keeps only the
//! best one, and eventually broadcasts it to claim the channel. A
//! pre-signed, time-locked refund protects the client if the server
//! vanishes, and the storage layer enforces each party's deadline.
//!
//! # Structure
//!
//! The module is organized into functional domains:
//! - `params`: the immutable facts agreed at channel birth
//! - `client` / `server`: the two coupled state machines
//! - `tx`: pure Bitcoin transaction builders
//! - `storage`: deadline bookkeeping and timed rebroadcast

pub mod client;
pub mod params;
pub mod server;
pub mod storage;
pub mod tx;

#[cfg(test)]
pub mod test_utils;

pub use client::{ClientChannel, ClientState};
pub use params::ChannelParameters;
pub use server::{BroadcastCompletion, ServerChannel, ServerState};
pub use storage::ChannelStorage;
pub use tx::{
    build_funding_transaction, build_payment_transaction, build_refund_transaction, estimate_fee,
    is_dust,
};
