//! Core type definitions and protocol constants
//!
//! This module defines the shared constants of the channel protocol:
//! reference fees, the dust threshold, sighash flag bytes, and the
//! deadlines used by the storage layer.

use bitcoin::Sequence;

// ============================================================================
// Fundamental Types
// ============================================================================

/// Type alias for 32-byte arrays used as channel identifiers
pub type ChannelId = [u8; 32];

// ============================================================================
// Fees and Dust
// ============================================================================

/// Reference minimum fee for a channel transaction, in satoshis
///
/// Every transaction the channel produces (funding, refund, close) pays at
/// least this much.
pub const REFERENCE_MIN_FEE: u64 = 10_000;

/// Smallest output value, in satoshis, that relay nodes treat as spendable
///
/// No transaction the channel produces may carry an output below this value.
pub const MIN_NONDUST_OUTPUT: u64 = 546;

// ============================================================================
// Sighash Flags
// ============================================================================

/// Sighash flag committing to all inputs and outputs
pub const SIGHASH_ALL: u8 = 0x01;

/// Sighash flag committing to no outputs
pub const SIGHASH_NONE: u8 = 0x02;

/// Sighash flag committing only to the output paired with the signed input
pub const SIGHASH_SINGLE: u8 = 0x03;

/// Sighash modifier committing only to the signed input
pub const SIGHASH_ANYONECANPAY: u8 = 0x80;

// ============================================================================
// Timelocks and Deadlines
// ============================================================================

/// Sequence number of the refund input
///
/// Strictly below `Sequence::MAX`, otherwise consensus ignores the refund's
/// lock time.
pub const REFUND_INPUT_SEQUENCE: Sequence = Sequence(0xFFFF_FFFE);

/// Grace period, in seconds, after channel expiry before the client's
/// storage layer broadcasts the funding and refund transactions
pub const CLIENT_REBROADCAST_DELAY: u64 = 5 * 60;

/// Window, in seconds, before channel expiry at which the server's storage
/// layer claims the channel with the best payment transaction
pub const SERVER_CLOSE_DEADLINE: u64 = 2 * 60 * 60;

/// Slack, in seconds, the server tolerates between a refund's lock time and
/// the channel expiry it negotiated
///
/// A refund maturing no earlier than `expire_time - SERVER_MIN_LOCKTIME_MARGIN`
/// cannot beat the server's own claim window.
pub const SERVER_MIN_LOCKTIME_MARGIN: u64 = SERVER_CLOSE_DEADLINE;
