//! eCash opcode names
//!
//! eCash re-enabled or reassigned several opcodes that Bitcoin left disabled. The byte
//! values are shared with the `bitcoin` crate, only the names differ.

use bitcoin::opcodes::{all, Opcode};

pub use all::{
    OP_2DROP, OP_2SWAP, OP_3DUP, OP_ADD, OP_AND, OP_CAT, OP_CHECKSIG, OP_CHECKSIGVERIFY, OP_DIV,
    OP_DROP, OP_DUP, OP_ELSE, OP_ENDIF, OP_EQUAL, OP_EQUALVERIFY, OP_GREATERTHANOREQUAL,
    OP_HASH160, OP_HASH256, OP_IF, OP_LESSTHAN, OP_NIP, OP_NOTIF, OP_OVER, OP_PICK, OP_PUSHBYTES_0,
    OP_PUSHNUM_1, OP_PUSHNUM_NEG1, OP_RETURN, OP_ROLL, OP_ROT, OP_SHA256, OP_SIZE, OP_SUB, OP_SWAP,
};

/// `OP_SUBSTR` (0x7f): split a byte string at a position.
pub const OP_SPLIT: Opcode = all::OP_SUBSTR;
/// `OP_LEFT` (0x80): encode a number into a byte string of the given size.
pub const OP_NUM2BIN: Opcode = all::OP_LEFT;
/// `OP_RIGHT` (0x81): minimally encode a byte string as a number.
pub const OP_BIN2NUM: Opcode = all::OP_RIGHT;
/// 0xba (`OP_CHECKSIGADD` in tapscript): verify a signature over SHA256(message).
pub const OP_CHECKDATASIG: Opcode = all::OP_CHECKSIGADD;
/// 0xbc: reverse a byte string.
pub const OP_REVERSEBYTES: Opcode = all::OP_RETURN_188;
