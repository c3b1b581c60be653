//! Contract script compiler
//!
//! The verifier program is first assembled as a small tree of [`Node`]s and lowered to
//! bytes once at the end. The layout is pinned: any change to the emitted sequence
//! changes every contract address, which is why the tests pin exact digests.
//!
//! Stack on entry, bottom to top:
//!
//! ```text
//! prevouts outputs sig version hashPrevouts hashSequence outpoint scriptCode value
//! sequence hashOutputs lockTimeAndType
//! ```

use bitcoin::{
    hashes::{hash160, Hash},
    opcodes::Opcode,
    script::{Builder, PushBytesBuf},
    Script, ScriptBuf,
};
use tracing::debug;

use super::payment::no_payout_output;
use super::shares::{min_unit_for_all_shares, min_unit_for_share};
use crate::ecash_utils::opcodes::*;
use crate::ecash_utils::{
    encode_script_num, p2sh_script, serialize_outputs, AddressKind, CashAddress,
};
use crate::error::{Error, Result, ValidationError};
use crate::types::{
    Party, ECASH_PREFIX, MAX_FEE, MAX_PARTIES, MAX_VALUE, MIN_PARTIES, SHARE_TOTAL,
};

/// Largest byte string the verifier may push or build.
pub const MAX_ELEMENT_SIZE: usize = 520;

/// Preimage bytes around the script code: every fixed-size field plus its 3-byte size prefix.
const PREIMAGE_OVERHEAD: usize = 4 + 32 + 32 + 36 + 3 + 8 + 4 + 32 + 8;

/// Scripts up to this size get a 1-byte compact size, which the overflow branch can't parse.
const MAX_SHORT_SCRIPT: usize = 252;

/// `OP_HASH160 OP_PUSHBYTES_20` as it starts a serialized P2SH locking script.
const P2SH_PREFIX: [u8; 2] = [0xa9, 0x14];
const P2SH_SCRIPT_LEN: u8 = 23;

/// Serialized P2SH locking script with its size byte.
const P2SH_OUTPUT_SCRIPT_LEN: i64 = 1 + P2SH_SCRIPT_LEN as i64;

/// One step of the verifier before lowering to bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Op(Opcode),
    /// Opcode that aborts the script when its check fails.
    Verify(Opcode),
    /// Integer literal, lowered to the shortest push.
    Num(i64),
    /// Byte string literal, always lowered as a data push.
    Data(Vec<u8>),
    /// `OP_IF <then> [OP_ELSE <otherwise>] OP_ENDIF`
    Branch {
        then: Program,
        otherwise: Option<Program>,
    },
}

/// A sequence of nodes, assembled with chained calls like [`Builder`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Program(Vec<Node>);

impl Program {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn op(mut self, op: Opcode) -> Self {
        self.0.push(Node::Op(op));
        self
    }

    pub fn ops(mut self, ops: &[Opcode]) -> Self {
        self.0.extend(ops.iter().map(|&op| Node::Op(op)));
        self
    }

    pub fn verify(mut self, op: Opcode) -> Self {
        self.0.push(Node::Verify(op));
        self
    }

    pub fn num(mut self, n: i64) -> Self {
        self.0.push(Node::Num(n));
        self
    }

    pub fn data(mut self, data: &[u8]) -> Self {
        self.0.push(Node::Data(data.to_vec()));
        self
    }

    pub fn branch(mut self, then: Program, otherwise: Option<Program>) -> Self {
        self.0.push(Node::Branch { then, otherwise });
        self
    }

    pub fn append(mut self, other: Program) -> Self {
        self.0.extend(other.0);
        self
    }

    pub fn nodes(&self) -> &[Node] {
        &self.0
    }

    pub fn lower(&self) -> Result<ScriptBuf> {
        Ok(self.lower_into(Builder::new())?.into_script())
    }

    fn lower_into(&self, mut builder: Builder) -> Result<Builder> {
        for node in &self.0 {
            builder = match node {
                Node::Op(op) | Node::Verify(op) => builder.push_opcode(*op),
                Node::Num(n) => push_num(builder, *n)?,
                Node::Data(data) => builder.push_slice(PushBytesBuf::try_from(data.clone())?),
                Node::Branch { then, otherwise } => {
                    let mut builder = then.lower_into(builder.push_opcode(OP_IF))?;
                    if let Some(otherwise) = otherwise {
                        builder = otherwise.lower_into(builder.push_opcode(OP_ELSE))?;
                    }
                    builder.push_opcode(OP_ENDIF)
                }
            };
        }
        Ok(builder)
    }
}

/// A compiled contract with its script hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractScript {
    script: ScriptBuf,
    hash: [u8; 20],
}

impl ContractScript {
    pub fn from_script(script: ScriptBuf) -> Self {
        let hash = hash160::Hash::hash(script.as_bytes()).to_byte_array();
        Self { script, hash }
    }

    pub fn as_script(&self) -> &Script {
        &self.script
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.script.as_bytes()
    }

    /// HASH160 of the script bytes.
    pub fn hash(&self) -> [u8; 20] {
        self.hash
    }

    pub fn hash_hex(&self) -> String {
        hex::encode(self.hash)
    }

    /// `ecash:` P2SH address of the contract.
    pub fn address(&self) -> String {
        CashAddress::new(ECASH_PREFIX, AddressKind::P2sh, self.hash).encode()
    }

    /// Locking script of coins held by the contract.
    pub fn script_pubkey(&self) -> ScriptBuf {
        p2sh_script(&self.hash)
    }
}

/// Check contract parameters, returning the decoded party addresses in order.
pub fn validate_contract(fee: u64, parties: &[Party]) -> Result<Vec<CashAddress>> {
    if !(MIN_PARTIES..=MAX_PARTIES).contains(&parties.len()) {
        return Err(ValidationError::PartyCount {
            got: parties.len(),
            min: MIN_PARTIES,
            max: MAX_PARTIES,
        }
        .into());
    }
    if !(1..=MAX_FEE).contains(&fee) {
        return Err(ValidationError::FeeRange { fee, max: MAX_FEE }.into());
    }

    let mut addresses = Vec::with_capacity(parties.len());
    for party in parties {
        let address = CashAddress::decode(&party.address)?;
        if address.prefix != ECASH_PREFIX {
            return Err(ValidationError::AddressPrefix {
                address: party.address.clone(),
                prefix: address.prefix,
            }
            .into());
        }
        if party.share < 1 || party.share as u64 >= SHARE_TOTAL {
            return Err(ValidationError::ShareRange {
                address: party.address.clone(),
                share: party.share,
            }
            .into());
        }
        addresses.push(address);
    }

    let total: u64 = parties.iter().map(|p| p.share as u64).sum();
    if total != SHARE_TOTAL {
        return Err(ValidationError::ShareTotal { total }.into());
    }
    Ok(addresses)
}

/// Compile the contract for `pubkey`, `fee` and the ordered `parties`.
///
/// The result depends only on its arguments; recompiling always yields the same bytes.
pub fn compile_script(pubkey: &[u8; 33], fee: u64, parties: &[Party]) -> Result<ContractScript> {
    let program = build_program(pubkey, fee, parties)?;
    let script = program.lower()?;

    let len = script.len();
    if len <= MAX_SHORT_SCRIPT || len + PREIMAGE_OVERHEAD > MAX_ELEMENT_SIZE {
        return Err(Error::Script(format!(
            "compiled script has unsupported size {len}"
        )));
    }

    let contract = ContractScript::from_script(script);
    debug!(
        size = len,
        hash = %contract.hash_hex(),
        parties = parties.len(),
        fee,
        "compiled contract script"
    );
    Ok(contract)
}

/// The verifier as a node tree, before lowering.
pub fn build_program(pubkey: &[u8; 33], fee: u64, parties: &[Party]) -> Result<Program> {
    let addresses = validate_contract(fee, parties)?;
    let fee = fee as i64;

    let program = bind_preimage()
        // any bit above MAX_VALUE set in the 8-byte little-endian value
        .op(OP_DUP)
        .data(&(!MAX_VALUE).to_le_bytes())
        .op(OP_AND)
        .branch(overflow_split(fee), Some(distribution(fee, parties, &addresses)?))
        .append(check_signature(pubkey));
    Ok(program)
}

/// `OP_0`, `OP_1NEGATE` and `OP_1..OP_16` for small values, a minimal number push otherwise.
fn push_num(builder: Builder, n: i64) -> Result<Builder> {
    Ok(match n {
        0 => builder.push_opcode(OP_PUSHBYTES_0),
        -1 => builder.push_opcode(OP_PUSHNUM_NEG1),
        1..=16 => builder.push_opcode(Opcode::from(OP_PUSHNUM_1.to_u8() + n as u8 - 1)),
        _ => builder.push_slice(PushBytesBuf::try_from(encode_script_num(n))?),
    })
}

/// Hash the prevouts and outputs pushed by the spender and compare them with the
/// preimage, leaving `outputs scriptCode value` on top of the stack.
fn bind_preimage() -> Program {
    Program::new()
        // prevouts: must hash to hashPrevouts
        .num(11)
        .op(OP_ROLL)
        .op(OP_DUP)
        .op(OP_HASH256)
        .num(9)
        .op(OP_PICK)
        .verify(OP_EQUALVERIFY)
        // a single input: the whole prevout list is the outpoint being spent
        .num(6)
        .op(OP_PICK)
        .verify(OP_EQUALVERIFY)
        // outputs: must hash to hashOutputs
        .op(OP_OVER)
        .num(11)
        .op(OP_ROLL)
        .op(OP_DUP)
        .op(OP_HASH256)
        .op(OP_ROT)
        .verify(OP_EQUALVERIFY)
        .num(5)
        .op(OP_PICK)
        .num(5)
        .op(OP_PICK)
}

/// Split the low 48 bits of a little-endian value (or output pair) into two 24-bit limbs
/// as non-negative numbers.
fn take_limb() -> Program {
    Program::new()
        .num(3)
        .op(OP_SPLIT)
        .op(OP_SWAP)
        .data(&[0x00])
        .op(OP_CAT)
        .op(OP_BIN2NUM)
        .op(OP_ROT)
}

/// Value too large for script arithmetic: the outputs must return everything but the
/// fee to this contract in two halves. The sum is checked 24 bits at a time.
fn overflow_split(fee: i64) -> Program {
    let mut own_script = vec![P2SH_SCRIPT_LEN];
    own_script.extend_from_slice(&P2SH_PREFIX);

    Program::new()
        // serialized locking script of this contract from the script code
        .data(&own_script)
        .op(OP_ROT)
        .num(3)
        .op(OP_SPLIT)
        .op(OP_NIP)
        .op(OP_HASH160)
        .data(&[OP_EQUAL.to_u8()])
        .op(OP_CAT)
        .op(OP_CAT)
        // outputs = value1 script value2 script, nothing else
        .op(OP_ROT)
        .num(8)
        .op(OP_SPLIT)
        .num(P2SH_OUTPUT_SCRIPT_LEN)
        .op(OP_SPLIT)
        .num(8)
        .op(OP_SPLIT)
        .op(OP_ROT)
        .op(OP_DUP)
        .num(5)
        .op(OP_ROLL)
        .verify(OP_EQUALVERIFY)
        .verify(OP_EQUALVERIFY)
        // low limbs plus fee, carry into the middle limbs
        .append(take_limb())
        .append(take_limb())
        .op(OP_ADD)
        .num(fee)
        .op(OP_ADD)
        .num(4)
        .op(OP_NUM2BIN)
        .num(3)
        .op(OP_SPLIT)
        .op(OP_BIN2NUM)
        .op(OP_2SWAP)
        // middle limbs plus carry, carry into the high limbs
        .append(take_limb())
        .append(take_limb())
        .op(OP_ADD)
        .num(3)
        .op(OP_ROLL)
        .op(OP_ADD)
        .num(4)
        .op(OP_NUM2BIN)
        .num(3)
        .op(OP_SPLIT)
        .op(OP_BIN2NUM)
        .op(OP_2SWAP)
        // high 16 bits
        .op(OP_BIN2NUM)
        .op(OP_SWAP)
        .op(OP_BIN2NUM)
        .op(OP_ADD)
        .op(OP_ADD)
        .num(2)
        .op(OP_NUM2BIN)
        .op(OP_CAT)
        .op(OP_CAT)
        .verify(OP_EQUALVERIFY)
}

/// Value fits script arithmetic: pay each party `unit * share` in order, or the no-payout
/// output when nobody clears dust.
fn distribution(fee: i64, parties: &[Party], addresses: &[CashAddress]) -> Result<Program> {
    // the no-payout output, read backwards as a number
    let mut no_payout = serialize_outputs(&[no_payout_output()]);
    no_payout.reverse();
    while no_payout.last() == Some(&0) {
        no_payout.pop();
    }

    let nobody_paid = Program::new()
        .op(OP_DROP)
        .op(OP_REVERSEBYTES)
        .op(OP_BIN2NUM)
        .data(&no_payout)
        .verify(OP_EQUALVERIFY);

    let mut payout = Program::new().op(OP_SWAP);
    for (party, address) in parties.iter().zip(addresses) {
        payout = payout
            .op(OP_OVER)
            .num(min_unit_for_share(party.share)? as i64)
            .op(OP_GREATERTHANOREQUAL)
            .branch(pay_party(party.share, address), None);
    }
    // all outputs consumed
    payout = payout
        .op(OP_SIZE)
        .num(0)
        .verify(OP_EQUALVERIFY)
        .op(OP_2DROP);

    Ok(Program::new()
        .op(OP_NIP)
        .op(OP_BIN2NUM)
        .num(fee)
        .op(OP_SUB)
        .num(SHARE_TOTAL as i64)
        .op(OP_DIV)
        .op(OP_DUP)
        .num(min_unit_for_all_shares(parties)? as i64)
        .op(OP_LESSTHAN)
        .branch(nobody_paid, Some(payout)))
}

/// Take the next output off `unit outputs` and check it pays `unit * share` to the party.
fn pay_party(share: u32, address: &CashAddress) -> Program {
    // the size byte is already split off the output
    let locking_script = address.script_pubkey().into_bytes();

    Program::new()
        .num(8)
        .op(OP_SPLIT)
        .num(1)
        .op(OP_SPLIT)
        .op(OP_SWAP)
        .op(OP_SPLIT)
        .op(OP_ROT)
        .op(OP_ROT)
        .data(&locking_script)
        .verify(OP_EQUALVERIFY)
        .op(OP_BIN2NUM)
        .num(share as i64)
        .op(OP_DIV)
        .num(2)
        .op(OP_PICK)
        .verify(OP_EQUALVERIFY)
}

/// Rebuild the preimage and check the one signature twice: as the transaction signature
/// and as a data signature over the preimage, which authenticates every fragment above.
fn check_signature(pubkey: &[u8; 33]) -> Program {
    Program::new()
        .ops(&[OP_CAT; 8])
        .data(pubkey)
        .op(OP_3DUP)
        .op(OP_NIP)
        .verify(OP_CHECKSIGVERIFY)
        // drop the sighash type byte
        .op(OP_ROT)
        .num(64)
        .op(OP_SPLIT)
        .op(OP_DROP)
        .op(OP_ROT)
        .op(OP_SHA256)
        .op(OP_ROT)
        .op(OP_CHECKDATASIG)
}
