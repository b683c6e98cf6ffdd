//! Bitcoin transaction builders for the channel
//!
//! This module assembles the transactions that carry the channel's
//! lifecycle on-chain:
//! - `funding`: locks the channel capital in the 2-of-2 multisig output
//! - `refund`: the client's time-locked escape hatch
//! - `payment`: the repeatedly re-signed split of the channel balance, of
//!   which the broadcast close transaction is the final instance
//!
//! The builders are pure: they never sign, select coins, or talk to the
//! network.

pub mod funding;
pub mod payment;
pub mod refund;

use bitcoin::Transaction;

pub use funding::build_funding_transaction;
pub use payment::build_payment_transaction;
pub use refund::build_refund_transaction;

use crate::types::{MIN_NONDUST_OUTPUT, REFERENCE_MIN_FEE};

/// Estimates the fee, in satoshis, a transaction needs to relay
///
/// The reference minimum per started kilobyte, floored at one reference
/// fee. Channel transactions are small, so in practice this returns
/// [`REFERENCE_MIN_FEE`].
pub fn estimate_fee(tx: &Transaction) -> u64 {
    let size = tx.total_size() as u64;
    size.div_ceil(1000).max(1) * REFERENCE_MIN_FEE
}

/// Reports whether an output value is below the dust threshold
pub fn is_dust(amount: u64) -> bool {
    amount < MIN_NONDUST_OUTPUT
}

#[cfg(test)]
mod tests {
    use bitcoin::absolute::LockTime;
    use bitcoin::transaction::Version;
    use bitcoin::{Amount, OutPoint, ScriptBuf, Sequence, TxIn, TxOut, Witness};

    use super::*;
    use crate::types::MIN_NONDUST_OUTPUT;

    #[test]
    fn test_estimate_fee_floors_at_reference_fee() {
        let tiny = Transaction {
            version: Version::TWO,
            lock_time: LockTime::ZERO,
            input: vec![],
            output: vec![],
        };

        assert_eq!(estimate_fee(&tiny), REFERENCE_MIN_FEE);
    }

    #[test]
    fn test_estimate_fee_scales_per_kilobyte() {
        let padding = TxOut {
            value: Amount::from_sat(1_000),
            script_pubkey: ScriptBuf::from_bytes(vec![0x6a; 120]),
        };
        let large = Transaction {
            version: Version::TWO,
            lock_time: LockTime::ZERO,
            input: vec![TxIn {
                previous_output: OutPoint::null(),
                script_sig: ScriptBuf::new(),
                sequence: Sequence::MAX,
                witness: Witness::new(),
            }],
            output: vec![padding; 12],
        };

        assert!(large.total_size() > 1000);
        assert_eq!(estimate_fee(&large), 2 * REFERENCE_MIN_FEE);
    }

    #[test]
    fn test_is_dust() {
        assert!(is_dust(0));
        assert!(is_dust(MIN_NONDUST_OUTPUT - 1));
        assert!(!is_dust(MIN_NONDUST_OUTPUT));
    }
}
