//! Signature encoding and verification rules
//!
//! This module enforces the checks every counterparty-supplied signature
//! must pass before it is trusted:
//! - canonical encoding (strict DER, bounded length, low S value, a known
//!   sighash flag byte)
//! - a purpose-specific sighash whitelist (refunds commit to everything,
//!   payments commit only to the signed input and its paired output)
//! - cryptographic verification against the funding script
//!
//! The DER structure itself is validated by the `secp256k1` parser rather
//! than a hand-written walker; this module only adds the length, flag, and
//! S-range rules relay nodes apply on top of DER.

use bitcoin::hashes::Hash;
use bitcoin::secp256k1::{ecdsa, Message, Secp256k1, SecretKey};
use bitcoin::sighash::SighashCache;
use bitcoin::{PublicKey, Script, Transaction};

use crate::errors::{ChannelError, Result};
use crate::types::{SIGHASH_ALL, SIGHASH_ANYONECANPAY, SIGHASH_NONE, SIGHASH_SINGLE};

/// Shortest possible signature: minimal DER plus the sighash flag byte
const MIN_SIGNATURE_LEN: usize = 9;

/// Longest possible signature: maximal DER plus the sighash flag byte
const MAX_SIGNATURE_LEN: usize = 73;

/// Half the secp256k1 curve order; any S value above this is malleable and
/// rejected by relay nodes
const HALF_CURVE_ORDER: [u8; 32] = [
    0x7f, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff,
    0x5d, 0x57, 0x6e, 0x73, 0x57, 0xa4, 0x50, 0x1d, 0xdf, 0xe9, 0x2f, 0x46, 0x68, 0x1b, 0x20, 0xa0,
];

/// What a signature authorizes, which decides the sighash flags it may carry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SigPurpose {
    /// Server signature on the client's time-locked refund
    Refund,
    /// Client signature on an incremental payment
    Payment,
}

/// Decodes a signature and checks it is canonically encoded
///
/// A canonical signature is strict minimal DER followed by a single sighash
/// flag byte, with the flag's base in the known range and an S value in the
/// lower half of the curve order. Every rejection message carries the
/// phrase "not canonical" so callers can distinguish encoding failures
/// from cryptographic ones.
///
/// # Arguments
/// * `bytes` - DER-encoded signature with trailing sighash flag byte
///
/// # Returns
/// * `Ok((signature, flag))` - The parsed signature and its sighash byte
/// * `Err(ChannelError::Verification)` - If any encoding rule is violated
pub fn decode_canonical(bytes: &[u8]) -> Result<(ecdsa::Signature, u8)> {
    if bytes.len() < MIN_SIGNATURE_LEN || bytes.len() > MAX_SIGNATURE_LEN {
        return Err(ChannelError::Verification(format!(
            "signature is not canonical: {} bytes",
            bytes.len()
        )));
    }

    let flag = bytes[bytes.len() - 1];
    let base = flag & !SIGHASH_ANYONECANPAY;
    if !(SIGHASH_ALL..=SIGHASH_SINGLE).contains(&base) {
        return Err(ChannelError::Verification(format!(
            "signature is not canonical: unknown sighash flag {flag:#04x}"
        )));
    }

    let sig = ecdsa::Signature::from_der(&bytes[..bytes.len() - 1]).map_err(|_| {
        ChannelError::Verification("signature is not canonical: invalid DER encoding".to_string())
    })?;

    let compact = sig.serialize_compact();
    if compact[32..] > HALF_CURVE_ORDER[..] {
        return Err(ChannelError::Verification(
            "signature is not canonical: S value above half the curve order".to_string(),
        ));
    }

    Ok((sig, flag))
}

/// Checks a sighash flag byte against the whitelist for its purpose
///
/// Refund signatures must commit to the whole transaction (`SIGHASH_ALL`),
/// otherwise the counterparty could rewrite the refund's destination.
/// Payment signatures must commit to exactly the signed input and the
/// client's refund output (`SIGHASH_SINGLE | SIGHASH_ANYONECANPAY`), which
/// is what lets the server later attach a fee input of its own. Any flag in
/// the `SIGHASH_NONE` family is rejected by name for both purposes.
pub fn check_purpose_flag(flag: u8, purpose: SigPurpose) -> Result<()> {
    let base = flag & !SIGHASH_ANYONECANPAY;
    if base == SIGHASH_NONE {
        return Err(ChannelError::Verification(format!(
            "signature uses a SIGHASH_NONE flag ({flag:#04x}), which would let its outputs be replaced"
        )));
    }
    match purpose {
        SigPurpose::Refund if flag != SIGHASH_ALL => Err(ChannelError::Verification(format!(
            "refund signature must use SIGHASH_ALL, got {flag:#04x}"
        ))),
        SigPurpose::Payment if flag != SIGHASH_SINGLE | SIGHASH_ANYONECANPAY => {
            Err(ChannelError::Verification(format!(
                "payment signature must use SIGHASH_SINGLE | SIGHASH_ANYONECANPAY, got {flag:#04x}"
            )))
        }
        _ => Ok(()),
    }
}

/// Computes the legacy signature hash for one input of a transaction
///
/// # Arguments
/// * `tx` - Transaction being signed or verified
/// * `input_index` - Index of the input the signature covers
/// * `script_code` - Script of the output being spent
/// * `flag` - Sighash flag byte
pub fn signature_hash(
    tx: &Transaction,
    input_index: usize,
    script_code: &Script,
    flag: u8,
) -> Result<Message> {
    let sighash = SighashCache::new(tx)
        .legacy_signature_hash(input_index, script_code, u32::from(flag))
        .map_err(|e| {
            ChannelError::Verification(format!("cannot compute signature hash: {e}"))
        })?;
    Ok(Message::from_digest(sighash.to_byte_array()))
}

/// Signs one input of a transaction with the legacy sighash algorithm
///
/// # Returns
/// The DER-encoded signature with the sighash flag byte appended, the form
/// that goes into a script.
pub fn sign_input(
    tx: &Transaction,
    input_index: usize,
    script_code: &Script,
    flag: u8,
    secret: &SecretKey,
) -> Result<Vec<u8>> {
    let message = signature_hash(tx, input_index, script_code, flag)?;
    let secp = Secp256k1::new();
    let mut bytes = secp.sign_ecdsa(&message, secret).serialize_der().to_vec();
    bytes.push(flag);
    Ok(bytes)
}

/// Verifies a decoded signature against one input of a transaction
///
/// # Arguments
/// * `sig` - Parsed signature (see [`decode_canonical`])
/// * `flag` - Sighash flag byte the signer used
/// * `pubkey` - Key the signature must verify under
/// * `tx` - Transaction the signature covers
/// * `input_index` - Index of the signed input
/// * `script_code` - Script of the output being spent
///
/// # Errors
/// `ChannelError::Verification` when the signature does not verify. The
/// message deliberately does not contain "not canonical": the encoding was
/// already accepted, only the cryptography failed.
pub fn verify_input(
    sig: &ecdsa::Signature,
    flag: u8,
    pubkey: &PublicKey,
    tx: &Transaction,
    input_index: usize,
    script_code: &Script,
) -> Result<()> {
    let message = signature_hash(tx, input_index, script_code, flag)?;
    let secp = Secp256k1::verification_only();
    secp.verify_ecdsa(&message, sig, &pubkey.inner).map_err(|_| {
        ChannelError::Verification(
            "signature did not verify against the funding script".to_string(),
        )
    })
}

/// Parses public-key bytes, rejecting anything but a canonical encoding
///
/// Accepts the 33-byte compressed and 65-byte uncompressed SEC forms that
/// name a valid curve point; everything else fails with a "not canonical"
/// verification error.
pub fn parse_canonical_pubkey(bytes: &[u8]) -> Result<PublicKey> {
    PublicKey::from_slice(bytes).map_err(|_| {
        ChannelError::Verification("public key encoding is not canonical".to_string())
    })
}

#[cfg(test)]
mod tests {
    use bitcoin::absolute::LockTime;
    use bitcoin::transaction::Version;
    use bitcoin::{Amount, OutPoint, ScriptBuf, TxIn, TxOut, Witness};

    use super::*;
    use crate::channel::test_utils::{client_keys, server_keys};
    use crate::script::multisig_script;
    use crate::types::REFUND_INPUT_SEQUENCE;

    fn dummy_spend() -> (Transaction, ScriptBuf) {
        let (_, client_pk) = client_keys();
        let (_, server_pk) = server_keys();
        let script = multisig_script(&client_pk, &server_pk);
        let tx = Transaction {
            version: Version::TWO,
            lock_time: LockTime::ZERO,
            input: vec![TxIn {
                previous_output: OutPoint::null(),
                script_sig: ScriptBuf::new(),
                sequence: REFUND_INPUT_SEQUENCE,
                witness: Witness::new(),
            }],
            output: vec![TxOut {
                value: Amount::from_sat(50_000),
                script_pubkey: ScriptBuf::new(),
            }],
        };
        (tx, script)
    }

    fn signed_all() -> (Vec<u8>, Transaction, ScriptBuf) {
        let (client_sk, _) = client_keys();
        let (tx, script) = dummy_spend();
        let sig = sign_input(&tx, 0, &script, SIGHASH_ALL, &client_sk).expect("signing succeeds");
        (sig, tx, script)
    }

    #[test]
    fn test_decode_canonical_roundtrip() {
        let (sig, _, _) = signed_all();

        let (_, flag) = decode_canonical(&sig).expect("freshly produced signature is canonical");

        assert_eq!(flag, SIGHASH_ALL);
    }

    #[test]
    fn test_decode_canonical_rejects_bad_lengths() {
        let error = decode_canonical(&[0x30; 5]).expect_err("too short");
        assert!(error.to_string().contains("not canonical"));

        let error = decode_canonical(&[0x30; 80]).expect_err("too long");
        assert!(error.to_string().contains("not canonical"));
    }

    #[test]
    fn test_decode_canonical_rejects_unknown_flag() {
        let (mut sig, _, _) = signed_all();
        let last = sig.len() - 1;
        sig[last] = 0x00;

        let error = decode_canonical(&sig).expect_err("flag outside the known range");

        assert!(error.to_string().contains("not canonical"));
    }

    #[test]
    fn test_decode_canonical_rejects_mangled_der() {
        let (mut sig, _, _) = signed_all();
        sig[3] ^= 0x42;

        let error = decode_canonical(&sig).expect_err("length marker corrupted");

        assert!(error.to_string().contains("not canonical"));
    }

    #[test]
    fn test_decode_canonical_rejects_high_s() {
        let (sig, _, _) = signed_all();
        let (parsed, _) = decode_canonical(&sig).expect("canonical");
        let mut compact = parsed.serialize_compact();

        // Replace S with n - S, the malleated twin of a valid signature
        let order: [u8; 32] = [
            0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff,
            0xff, 0xfe, 0xba, 0xae, 0xdc, 0xe6, 0xaf, 0x48, 0xa0, 0x3b, 0xbf, 0xd2, 0x5e, 0x8c,
            0xd0, 0x36, 0x41, 0x41,
        ];
        let mut borrow = 0i16;
        for i in (0..32).rev() {
            let diff = i16::from(order[i]) - i16::from(compact[32 + i]) - borrow;
            if diff < 0 {
                compact[32 + i] = (diff + 256) as u8;
                borrow = 1;
            } else {
                compact[32 + i] = diff as u8;
                borrow = 0;
            }
        }
        let high_s =
            ecdsa::Signature::from_compact(&compact).expect("n - S is still a valid scalar");
        let mut bytes = high_s.serialize_der().to_vec();
        bytes.push(SIGHASH_ALL);

        let error = decode_canonical(&bytes).expect_err("high S value");

        assert!(error.to_string().contains("not canonical"));
    }

    #[test]
    fn test_check_purpose_flag() {
        check_purpose_flag(SIGHASH_ALL, SigPurpose::Refund).expect("refund accepts SIGHASH_ALL");
        check_purpose_flag(SIGHASH_SINGLE | SIGHASH_ANYONECANPAY, SigPurpose::Payment)
            .expect("payment accepts SIGHASH_SINGLE | SIGHASH_ANYONECANPAY");

        let error = check_purpose_flag(SIGHASH_NONE, SigPurpose::Refund)
            .expect_err("refund rejects SIGHASH_NONE");
        assert!(error.to_string().contains("SIGHASH_NONE"));

        let error = check_purpose_flag(SIGHASH_NONE | SIGHASH_ANYONECANPAY, SigPurpose::Payment)
            .expect_err("payment rejects SIGHASH_NONE | SIGHASH_ANYONECANPAY");
        assert!(error.to_string().contains("SIGHASH_NONE"));

        let error = check_purpose_flag(SIGHASH_SINGLE, SigPurpose::Refund)
            .expect_err("refund rejects SIGHASH_SINGLE");
        assert!(!error.to_string().contains("SIGHASH_NONE"));

        let error = check_purpose_flag(SIGHASH_ALL, SigPurpose::Payment)
            .expect_err("payment rejects plain SIGHASH_ALL");
        assert!(!error.to_string().contains("SIGHASH_NONE"));
    }

    #[test]
    fn test_verify_input() {
        let (client_sk, client_pk) = client_keys();
        let (_, server_pk) = server_keys();
        let (tx, script) = dummy_spend();
        let bytes = sign_input(&tx, 0, &script, SIGHASH_ALL, &client_sk).expect("signing");
        let (sig, flag) = decode_canonical(&bytes).expect("canonical");

        verify_input(&sig, flag, &client_pk, &tx, 0, &script).expect("signature verifies");

        let error = verify_input(&sig, flag, &server_pk, &tx, 0, &script)
            .expect_err("wrong key must fail");
        assert!(!error.to_string().contains("not canonical"));
    }

    #[test]
    fn test_bit_flip_inside_r_is_canonical_but_invalid() {
        let (_, client_pk) = client_keys();
        let (mut sig_bytes, tx, script) = signed_all();
        sig_bytes[10] ^= 0x42;

        let (sig, flag) = decode_canonical(&sig_bytes)
            .expect("flip inside R keeps the encoding canonical");
        let error =
            verify_input(&sig, flag, &client_pk, &tx, 0, &script).expect_err("crypto must fail");

        assert!(!error.to_string().contains("not canonical"));
    }

    #[test]
    fn test_parse_canonical_pubkey() {
        let (_, client_pk) = client_keys();
        let bytes = client_pk.to_bytes();

        let parsed = parse_canonical_pubkey(&bytes).expect("valid key parses");
        assert_eq!(parsed, client_pk);

        let mut padded = bytes.clone();
        padded.push(0x00);
        let error = parse_canonical_pubkey(&padded).expect_err("over-long key");
        assert!(error.to_string().contains("not canonical"));
    }
}
