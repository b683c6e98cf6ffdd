//! Bitcoin script construction and inspection
//!
//! This module builds the scripts the channel uses and classifies the ones
//! it receives: the bare 2-of-2 multisig template locking the channel's
//! capital, the pay-to-pubkey-hash outputs paying each party, and the
//! combined script that spends the multisig output once both signatures
//! exist.

use bitcoin::opcodes::all::{OP_CHECKMULTISIG, OP_PUSHNUM_2};
use bitcoin::opcodes::OP_0;
use bitcoin::script::{Builder, Instruction, PushBytesBuf};
use bitcoin::{PublicKey, Script, ScriptBuf};

use crate::errors::{ChannelError, Result};

/// Builds the 2-of-2 multisig script locking the channel funds
///
/// The client key always comes first: both parties derive the same script
/// independently, and the server rejects any contract that reorders them.
pub fn multisig_script(client: &PublicKey, server: &PublicKey) -> ScriptBuf {
    Builder::new()
        .push_opcode(OP_PUSHNUM_2)
        .push_key(client)
        .push_key(server)
        .push_opcode(OP_PUSHNUM_2)
        .push_opcode(OP_CHECKMULTISIG)
        .into_script()
}

/// Reports whether a script has the shape of a bare 2-of-2 multisig
///
/// Checks the template only (`OP_2 <key> <key> OP_2 OP_CHECKMULTISIG` with
/// key-sized pushes); which keys appear, and in what order, is the
/// caller's concern.
pub fn is_multisig_script(script: &Script) -> bool {
    let mut instructions = Vec::with_capacity(5);
    for instruction in script.instructions() {
        match instruction {
            Ok(i) => instructions.push(i),
            Err(_) => return false,
        }
    }
    match instructions.as_slice() {
        [Instruction::Op(open), Instruction::PushBytes(a), Instruction::PushBytes(b), Instruction::Op(close), Instruction::Op(check)] => {
            *open == OP_PUSHNUM_2
                && *close == OP_PUSHNUM_2
                && *check == OP_CHECKMULTISIG
                && is_pubkey_push(a.as_bytes())
                && is_pubkey_push(b.as_bytes())
        }
        _ => false,
    }
}

fn is_pubkey_push(bytes: &[u8]) -> bool {
    matches!(bytes.len(), 33 | 65)
}

/// Builds the script that spends a 2-of-2 multisig output
///
/// Signatures must appear in the same order as the keys in the locking
/// script: client first, then server. The leading `OP_0` feeds the extra
/// stack item `OP_CHECKMULTISIG` consumes.
pub fn multisig_spend_script(client_sig: &[u8], server_sig: &[u8]) -> Result<ScriptBuf> {
    let client_push = PushBytesBuf::try_from(client_sig.to_vec())
        .map_err(|_| ChannelError::Verification("signature does not fit a script push".into()))?;
    let server_push = PushBytesBuf::try_from(server_sig.to_vec())
        .map_err(|_| ChannelError::Verification("signature does not fit a script push".into()))?;
    Ok(Builder::new()
        .push_opcode(OP_0)
        .push_slice(client_push)
        .push_slice(server_push)
        .into_script())
}

/// Builds the pay-to-pubkey-hash script for a key
pub fn p2pkh_script(key: &PublicKey) -> ScriptBuf {
    ScriptBuf::new_p2pkh(&key.pubkey_hash())
}
