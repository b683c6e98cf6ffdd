//! Error types for the channel library
//!
//! This module defines all error types used throughout the library. Channel
//! operations fail with one of three recoverable kinds: an operation invoked
//! in a state that disallows it, an amount violating a value invariant, or a
//! counterparty-supplied transaction or signature failing validation.
//! Wallet failures pass through transparently.

use thiserror::Error;

/// The main error type for channel operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ChannelError {
    /// Operation invoked in a state that does not allow it, or invoked
    /// twice where once is required
    #[error("operation requires state {required}, but channel is in state {actual}")]
    IllegalState {
        /// State the operation requires
        required: &'static str,
        /// State the channel is actually in
        actual: String,
    },

    /// An amount violates the dust, total-value, or fee invariants
    #[error("value out of range: {0}")]
    ValueOutOfRange(String),

    /// A counterparty-supplied transaction or signature failed a
    /// structural, canonical, or cryptographic check
    #[error("verification failed: {0}")]
    Verification(String),

    /// Wallet-related errors
    #[error(transparent)]
    Wallet(#[from] WalletError),
}

/// Errors that can occur during wallet operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum WalletError {
    /// The wallet cannot cover the requested amount
    #[error("wallet holds {available} satoshis, {requested} requested")]
    InsufficientFunds {
        /// Amount requested from the wallet
        requested: u64,
        /// Amount the wallet can actually provide
        available: u64,
    },

    /// The wallet was asked to sign an input it does not own
    #[error("no wallet output matches input {0} of the transaction")]
    UnknownInput(usize),
}

/// Errors carried by a failed transaction broadcast
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum BroadcastError {
    /// The network rejected the transaction
    #[error("transaction rejected by the network: {0}")]
    Rejected(String),

    /// The broadcaster went away before settling the broadcast
    #[error("broadcast abandoned before settling")]
    Abandoned,
}

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, ChannelError>;
