//! Local verifier for contract spends
//!
//! Runs the redeem script of a P2SH spend the way an eCash node would, for the subset of
//! opcodes contract scripts use. Numbers follow consensus rules: arithmetic operands are
//! minimally encoded and at most 4 bytes, results may be wider.

use bitcoin::{
    hashes::{hash160, sha256, sha256d, Hash},
    opcodes::Opcode,
    script::Instruction,
    Script, Transaction,
};
use thiserror::Error;
use tracing::debug;

use super::script::{ContractScript, MAX_ELEMENT_SIZE};
use crate::ecash_utils::opcodes::*;
use crate::ecash_utils::{encode_script_num, schnorr_verify, Preimage, SIGHASH_ALL_FORKID};

const MAX_NUM_SIZE: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScriptError {
    #[error("malformed script: {0}")]
    Malformed(String),

    #[error("spend script must only push data")]
    PushOnly,

    #[error("redeem script does not match the contract hash")]
    ScriptHash,

    #[error("input index {0} out of bounds")]
    InputIndex(usize),

    #[error("element of {0} bytes exceeds the size limit")]
    PushSize(usize),

    #[error("stack underflow")]
    StackUnderflow,

    #[error("opcode {0:#04x} failed its check")]
    Verify(u8),

    #[error("number of {0} bytes is out of range")]
    NumOverflow(usize),

    #[error("number is not minimally encoded")]
    NonMinimal,

    #[error("split position out of range")]
    SplitRange,

    #[error("operands must have the same size")]
    OperandSize,

    #[error("division by zero")]
    DivByZero,

    #[error("number does not fit the requested size")]
    ImpossibleEncoding,

    #[error("unbalanced conditional")]
    UnbalancedConditional,

    #[error("unsupported opcode {0:#04x}")]
    Unsupported(u8),

    #[error("invalid signature encoding")]
    SigEncoding,

    #[error("non-empty signature failed to verify")]
    NullFail,

    #[error("script evaluated to false or left extra items on the stack")]
    EvalFalse,
}

type Result<T> = std::result::Result<T, ScriptError>;

/// Signature context of the input being verified.
pub struct SignatureChecker<'a> {
    pub tx: &'a Transaction,
    pub input_index: usize,
    pub value: u64,
    pub script_code: &'a [u8],
}

impl SignatureChecker<'_> {
    /// Only 64-byte Schnorr signatures flagged `ALL|FORKID` are accepted.
    fn check_sig(&self, sig: &[u8], pubkey: &[u8]) -> Result<bool> {
        let Some((&hash_type, sig)) = sig.split_last() else {
            return Ok(false);
        };
        if sig.len() != 64 || hash_type as u32 != SIGHASH_ALL_FORKID {
            return Err(ScriptError::SigEncoding);
        }
        let preimage = Preimage::new(
            self.tx,
            self.input_index,
            self.script_code,
            self.value,
            hash_type as u32,
        )
        .map_err(|_| ScriptError::InputIndex(self.input_index))?;
        Ok(schnorr_verify(sig, &preimage.sighash(), pubkey))
    }
}

/// Verify input `input_index` of `tx`, spending a coin of `value` held by `contract`.
pub fn verify_spend(
    tx: &Transaction,
    input_index: usize,
    value: u64,
    contract: &ContractScript,
) -> Result<()> {
    let input = tx
        .input
        .get(input_index)
        .ok_or(ScriptError::InputIndex(input_index))?;

    let mut pushes = Vec::new();
    for instruction in input.script_sig.instructions() {
        match instruction.map_err(|e| ScriptError::Malformed(e.to_string()))? {
            Instruction::PushBytes(data) => pushes.push(data.as_bytes().to_vec()),
            Instruction::Op(op) => pushes.push(small_int(op).ok_or(ScriptError::PushOnly)?),
        }
    }

    let redeem = pushes.pop().ok_or(ScriptError::ScriptHash)?;
    if hash160::Hash::hash(&redeem).to_byte_array() != contract.hash() {
        return Err(ScriptError::ScriptHash);
    }

    let checker = SignatureChecker {
        tx,
        input_index,
        value,
        script_code: &redeem,
    };
    let stack = execute(Script::from_bytes(&redeem), pushes, Some(&checker))?;
    if stack.len() != 1 || !cast_bool(&stack[0]) {
        return Err(ScriptError::EvalFalse);
    }

    debug!(txid = %tx.txid(), input_index, "spend verified");
    Ok(())
}

/// Run `script` over `stack`, returning the final stack. Signature opcodes fail without a
/// `checker`.
pub fn execute(
    script: &Script,
    stack: Vec<Vec<u8>>,
    checker: Option<&SignatureChecker<'_>>,
) -> Result<Vec<Vec<u8>>> {
    if let Some(item) = stack.iter().find(|item| item.len() > MAX_ELEMENT_SIZE) {
        return Err(ScriptError::PushSize(item.len()));
    }

    let mut machine = Machine { stack, checker };
    let mut conditions: Vec<bool> = Vec::new();

    for instruction in script.instructions() {
        let instruction = instruction.map_err(|e| ScriptError::Malformed(e.to_string()))?;
        let executing = conditions.iter().all(|&c| c);

        let op = match instruction {
            Instruction::PushBytes(data) => {
                if data.len() > MAX_ELEMENT_SIZE {
                    return Err(ScriptError::PushSize(data.len()));
                }
                if executing {
                    machine.stack.push(data.as_bytes().to_vec());
                }
                continue;
            }
            Instruction::Op(op) => op,
        };

        match op {
            OP_IF | OP_NOTIF => {
                let mut taken = false;
                if executing {
                    taken = cast_bool(&machine.pop()?);
                    if op == OP_NOTIF {
                        taken = !taken;
                    }
                }
                conditions.push(taken);
            }
            OP_ELSE => {
                let last = conditions
                    .last_mut()
                    .ok_or(ScriptError::UnbalancedConditional)?;
                *last = !*last;
            }
            OP_ENDIF => {
                conditions.pop().ok_or(ScriptError::UnbalancedConditional)?;
            }
            _ if executing => machine.step(op)?,
            _ => {}
        }
    }

    if !conditions.is_empty() {
        return Err(ScriptError::UnbalancedConditional);
    }
    Ok(machine.stack)
}

struct Machine<'a> {
    stack: Vec<Vec<u8>>,
    checker: Option<&'a SignatureChecker<'a>>,
}

impl Machine<'_> {
    fn step(&mut self, op: Opcode) -> Result<()> {
        if let Some(n) = small_int(op) {
            self.stack.push(n);
            return Ok(());
        }

        match op {
            OP_DROP => {
                self.pop()?;
            }
            OP_2DROP => {
                let len = self.require(2)?;
                self.stack.truncate(len - 2);
            }
            OP_DUP => {
                let top = self.peek(0)?.to_vec();
                self.stack.push(top);
            }
            OP_3DUP => {
                let len = self.require(3)?;
                let items = self.stack[len - 3..].to_vec();
                self.stack.extend(items);
            }
            OP_NIP => {
                let len = self.require(2)?;
                self.stack.remove(len - 2);
            }
            OP_OVER => {
                let item = self.peek(1)?.to_vec();
                self.stack.push(item);
            }
            OP_PICK | OP_ROLL => {
                let depth = self.pop_num()?;
                let len = self.stack.len();
                if depth < 0 || depth as usize >= len {
                    return Err(ScriptError::StackUnderflow);
                }
                let index = len - 1 - depth as usize;
                let item = if op == OP_ROLL {
                    self.stack.remove(index)
                } else {
                    self.stack[index].clone()
                };
                self.stack.push(item);
            }
            OP_ROT => {
                let len = self.require(3)?;
                let item = self.stack.remove(len - 3);
                self.stack.push(item);
            }
            OP_SWAP => {
                let len = self.require(2)?;
                self.stack.swap(len - 1, len - 2);
            }
            OP_2SWAP => {
                let len = self.require(4)?;
                let bottom: Vec<_> = self.stack.drain(len - 4..len - 2).collect();
                self.stack.extend(bottom);
            }
            OP_SIZE => {
                let size = self.peek(0)?.len() as i64;
                self.push_num(size);
            }

            OP_CAT => {
                let b = self.pop()?;
                let mut a = self.pop()?;
                if a.len() + b.len() > MAX_ELEMENT_SIZE {
                    return Err(ScriptError::PushSize(a.len() + b.len()));
                }
                a.extend(b);
                self.stack.push(a);
            }
            OP_SPLIT => {
                let position = self.pop_num()?;
                let mut data = self.pop()?;
                if position < 0 || position as usize > data.len() {
                    return Err(ScriptError::SplitRange);
                }
                let right = data.split_off(position as usize);
                self.stack.push(data);
                self.stack.push(right);
            }
            OP_NUM2BIN => {
                let size = self.pop_num()?;
                if size < 0 || size as usize > MAX_ELEMENT_SIZE {
                    return Err(ScriptError::PushSize(size.unsigned_abs() as usize));
                }
                let raw = minimally_encode(self.pop()?);
                self.stack.push(num_to_bin(raw, size as usize)?);
            }
            OP_BIN2NUM => {
                let n = minimally_encode(self.pop()?);
                if n.len() > MAX_NUM_SIZE {
                    return Err(ScriptError::NumOverflow(n.len()));
                }
                self.stack.push(n);
            }
            OP_AND => {
                let b = self.pop()?;
                let mut a = self.pop()?;
                if a.len() != b.len() {
                    return Err(ScriptError::OperandSize);
                }
                a.iter_mut().zip(&b).for_each(|(x, y)| *x &= y);
                self.stack.push(a);
            }
            OP_REVERSEBYTES => {
                let mut a = self.pop()?;
                a.reverse();
                self.stack.push(a);
            }

            OP_EQUAL | OP_EQUALVERIFY => {
                let b = self.pop()?;
                let a = self.pop()?;
                self.push_or_verify(op, a == b)?;
            }

            OP_ADD | OP_SUB | OP_DIV | OP_LESSTHAN | OP_GREATERTHANOREQUAL => {
                let b = self.pop_num()?;
                let a = self.pop_num()?;
                match op {
                    OP_ADD => self.push_num(a + b),
                    OP_SUB => self.push_num(a - b),
                    OP_DIV => {
                        if b == 0 {
                            return Err(ScriptError::DivByZero);
                        }
                        self.push_num(a / b);
                    }
                    OP_LESSTHAN => self.push_bool(a < b),
                    _ => self.push_bool(a >= b),
                }
            }

            OP_SHA256 => {
                let a = self.pop()?;
                self.stack.push(sha256::Hash::hash(&a).to_byte_array().to_vec());
            }
            OP_HASH160 => {
                let a = self.pop()?;
                self.stack.push(hash160::Hash::hash(&a).to_byte_array().to_vec());
            }
            OP_HASH256 => {
                let a = self.pop()?;
                self.stack.push(sha256d::Hash::hash(&a).to_byte_array().to_vec());
            }

            OP_CHECKSIG | OP_CHECKSIGVERIFY => {
                let checker = self.checker.ok_or(ScriptError::Unsupported(op.to_u8()))?;
                let pubkey = self.pop()?;
                let sig = self.pop()?;
                let valid = checker.check_sig(&sig, &pubkey)?;
                if !valid && !sig.is_empty() {
                    return Err(ScriptError::NullFail);
                }
                self.push_or_verify(op, valid)?;
            }
            OP_CHECKDATASIG => {
                let pubkey = self.pop()?;
                let msg = self.pop()?;
                let sig = self.pop()?;
                if !sig.is_empty() && sig.len() != 64 {
                    return Err(ScriptError::SigEncoding);
                }
                let digest = sha256::Hash::hash(&msg).to_byte_array();
                let valid = !sig.is_empty() && schnorr_verify(&sig, &digest, &pubkey);
                if !valid && !sig.is_empty() {
                    return Err(ScriptError::NullFail);
                }
                self.push_bool(valid);
            }

            _ => return Err(ScriptError::Unsupported(op.to_u8())),
        }
        Ok(())
    }

    fn push_or_verify(&mut self, op: Opcode, ok: bool) -> Result<()> {
        if op == OP_EQUALVERIFY || op == OP_CHECKSIGVERIFY {
            if !ok {
                return Err(ScriptError::Verify(op.to_u8()));
            }
            return Ok(());
        }
        self.push_bool(ok);
        Ok(())
    }

    /// Fails unless the stack holds `n` items; returns its length.
    fn require(&self, n: usize) -> Result<usize> {
        let len = self.stack.len();
        if len < n {
            return Err(ScriptError::StackUnderflow);
        }
        Ok(len)
    }

    fn peek(&self, depth: usize) -> Result<&[u8]> {
        let len = self.require(depth + 1)?;
        Ok(&self.stack[len - 1 - depth])
    }

    fn pop(&mut self) -> Result<Vec<u8>> {
        self.stack.pop().ok_or(ScriptError::StackUnderflow)
    }

    fn pop_num(&mut self) -> Result<i64> {
        decode_num(&self.pop()?)
    }

    fn push_num(&mut self, n: i64) {
        self.stack.push(encode_script_num(n));
    }

    fn push_bool(&mut self, b: bool) {
        self.stack.push(if b { vec![1] } else { Vec::new() });
    }
}

/// `OP_1NEGATE` and `OP_1`..`OP_16` as the number they push.
fn small_int(op: Opcode) -> Option<Vec<u8>> {
    match op.to_u8() {
        0x4f => Some(encode_script_num(-1)),
        code @ 0x51..=0x60 => Some(encode_script_num((code - 0x50) as i64)),
        _ => None,
    }
}

/// True unless all bytes are zero, allowing a sign bit on the last one.
pub fn cast_bool(bytes: &[u8]) -> bool {
    match bytes.split_last() {
        None => false,
        Some((&last, rest)) => rest.iter().any(|&b| b != 0) || (last & 0x7f) != 0,
    }
}

fn is_minimal(bytes: &[u8]) -> bool {
    match bytes {
        [] => true,
        [.., last] if last & 0x7f != 0 => true,
        [.., prev, _] => prev & 0x80 != 0,
        [_] => false,
    }
}

pub fn decode_num(bytes: &[u8]) -> Result<i64> {
    if bytes.len() > MAX_NUM_SIZE {
        return Err(ScriptError::NumOverflow(bytes.len()));
    }
    if !is_minimal(bytes) {
        return Err(ScriptError::NonMinimal);
    }
    let Some(&last) = bytes.last() else {
        return Ok(0);
    };

    let mut n: i64 = 0;
    for (i, &b) in bytes.iter().enumerate() {
        n |= (b as i64) << (8 * i);
    }
    if last & 0x80 != 0 {
        n &= !(0x80i64 << (8 * (bytes.len() - 1)));
        n = -n;
    }
    Ok(n)
}

/// Strip redundant high bytes, keeping the sign.
pub fn minimally_encode(mut bytes: Vec<u8>) -> Vec<u8> {
    let Some(&last) = bytes.last() else {
        return bytes;
    };
    if last & 0x7f != 0 {
        return bytes;
    }
    let len = bytes.len();
    if len > 1 && bytes[len - 2] & 0x80 != 0 {
        return bytes;
    }

    let sign = last & 0x80;
    for i in (1..len).rev() {
        if bytes[i - 1] != 0 {
            if bytes[i - 1] & 0x80 != 0 {
                bytes[i] = sign;
                bytes.truncate(i + 1);
            } else {
                bytes[i - 1] |= sign;
                bytes.truncate(i);
            }
            return bytes;
        }
    }
    Vec::new()
}

/// Pad a minimally encoded number to `size` bytes, moving the sign to the last byte.
fn num_to_bin(mut raw: Vec<u8>, size: usize) -> Result<Vec<u8>> {
    if raw.len() > size {
        return Err(ScriptError::ImpossibleEncoding);
    }
    if raw.len() == size {
        return Ok(raw);
    }
    let sign = match raw.last_mut() {
        Some(last) => {
            let sign = *last & 0x80;
            *last &= 0x7f;
            sign
        }
        None => 0,
    };
    raw.resize(size - 1, 0);
    raw.push(sign);
    Ok(raw)
}
