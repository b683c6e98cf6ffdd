#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! # Microchannel
//!
//! A Rust library for unidirectional Bitcoin micropayment channels.
//!
//! A client locks funds into a 2-of-2 multisig output and holds a fully
//! signed, time-locked refund before the funds ever hit the chain. It then
//! sends the server a monotonically increasing series of off-chain
//! `SIGHASH_SINGLE | SIGHASH_ANYONECANPAY` signatures, each authorizing the
//! server to claim a little more of the locked amount. The server closes
//! the channel by broadcasting the best payment; the client recovers
//! everything else, or the whole amount once the refund matures if the
//! server vanishes.

pub mod broadcast;
pub mod channel;
pub mod clock;
pub mod errors;
pub mod script;
pub mod sig;
pub mod types;
pub mod wallet;

pub use channel::{ChannelParameters, ChannelStorage, ClientChannel, ClientState, ServerChannel, ServerState};
pub use errors::{BroadcastError, ChannelError, Result, WalletError};
