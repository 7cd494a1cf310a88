//! Opcodes, code points, and the immutable code segment they form.

use crate::hash::{keccak256, Hash256};
use crate::value::Value;

macro_rules! opcodes {
    ($($name:ident = $byte:expr),* $(,)?) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[repr(u8)]
        pub enum OpCode {
            $($name = $byte),*
        }

        impl OpCode {
            pub fn from_byte(byte: u8) -> Option<OpCode> {
                match byte {
                    $($byte => Some(OpCode::$name),)*
                    _ => None,
                }
            }

            pub fn as_byte(self) -> u8 {
                self as u8
            }

            pub fn name(self) -> &'static str {
                match self {
                    $(OpCode::$name => stringify!($name),)*
                }
            }
        }
    };
}

opcodes! {
    ADD = 0x01,
    MUL = 0x02,
    SUB = 0x03,
    DIV = 0x04,
    SDIV = 0x05,
    MOD = 0x06,
    SMOD = 0x07,
    ADDMOD = 0x08,
    MULMOD = 0x09,
    EXP = 0x0a,

    LT = 0x10,
    GT = 0x11,
    SLT = 0x12,
    SGT = 0x13,
    EQ = 0x14,
    ISZERO = 0x15,
    AND = 0x16,
    OR = 0x17,
    XOR = 0x18,
    NOT = 0x19,
    BYTE = 0x1a,
    SIGNEXTEND = 0x1b,

    HASH = 0x20,
    TYPE = 0x21,

    POP = 0x30,
    SPUSH = 0x31,
    RPUSH = 0x32,
    RSET = 0x33,
    JUMP = 0x34,
    CJUMP = 0x35,
    STACKEMPTY = 0x36,
    PCPUSH = 0x37,
    AUXPUSH = 0x38,
    AUXPOP = 0x39,
    AUXSTACKEMPTY = 0x3a,
    NOP = 0x3b,
    ERRPUSH = 0x3c,
    ERRSET = 0x3d,

    DUP0 = 0x40,
    DUP1 = 0x41,
    DUP2 = 0x42,
    SWAP1 = 0x43,
    SWAP2 = 0x44,

    TGET = 0x50,
    TSET = 0x51,
    TLEN = 0x52,

    BREAKPOINT = 0x60,
    LOG = 0x61,
    DEBUG = 0x62,

    SEND = 0x70,
    NBSEND = 0x71,
    GETTIME = 0x72,
    INBOX = 0x73,
    ERROR = 0x74,
    HALT = 0x75,
}

/// One instruction: its opcode and an optional immediate value pushed
/// onto the data stack ahead of dispatch. The opcode is stored as a raw
/// byte (not a validated [`OpCode`]) so that a code point carrying an
/// opcode unknown to this build can still be hashed, linked, and
/// marshalled for proof — it only becomes an error at dispatch time
/// (spec §4.5 point 4, "unknown opcodes transition directly to Error").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Op {
    pub opcode: u8,
    pub immediate: Option<Value>,
}

impl Op {
    pub fn new(opcode: OpCode, immediate: Option<Value>) -> Self {
        Op {
            opcode: opcode.as_byte(),
            immediate,
        }
    }

    pub fn decoded(&self) -> Option<OpCode> {
        OpCode::from_byte(self.opcode)
    }
}

/// One executable instruction plus the hash linking it to its successor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodePoint {
    pub pc: u64,
    pub op: Op,
    pub next_hash: Hash256,
}

impl CodePoint {
    /// The designated "null" code point: opcode `ERROR`, no immediate,
    /// no successor. Used as the initial `errpc` — when `errpc` is the
    /// null code point, VM-internal errors halt the machine with status
    /// `Error` instead of diverting control.
    pub fn null() -> Self {
        CodePoint {
            pc: 0,
            op: Op::new(OpCode::ERROR, None),
            next_hash: Hash256::ZERO,
        }
    }

    pub fn is_null(&self) -> bool {
        *self == CodePoint::null()
    }

    /// `hash(cp) = Keccak256(1 || opcode || immediate_field || next_hash)`
    /// per spec §4.1, where `immediate_field` is `0` (no immediate) or
    /// `1 || hash(imm)`.
    pub fn hash(&self) -> Hash256 {
        let mut buf = Vec::with_capacity(1 + 1 + 33 + 32);
        buf.push(1u8);
        buf.push(self.op.opcode);
        match &self.op.immediate {
            None => buf.push(0),
            Some(imm) => {
                buf.push(1);
                buf.extend_from_slice(&imm.hash().to_be_bytes::<32>());
            }
        }
        buf.extend_from_slice(&self.next_hash.to_be_bytes::<32>());
        keccak256(&buf)
    }
}

/// The program's immutable instruction list. Built once by the loader;
/// `pc` is the only live index into it afterwards.
#[derive(Debug, Clone)]
pub struct CodeSegment(Vec<CodePoint>);

impl CodeSegment {
    /// Links a flat list of operations into a hash-chained code
    /// segment: `code[i].next_hash == hash(code[i+1])` for all `i` but
    /// the last, whose `next_hash` is zero. Built with a single reverse
    /// pass over the freshly-assigned code points, mirroring the
    /// source's `opsToCodePoints` (spec §9: any construction yielding
    /// the same forward chain is acceptable since no cycles ever
    /// exist).
    pub fn from_ops(ops: Vec<Op>) -> Self {
        let mut code: Vec<CodePoint> = ops
            .into_iter()
            .enumerate()
            .map(|(pc, op)| CodePoint {
                pc: pc as u64,
                op,
                next_hash: Hash256::ZERO,
            })
            .collect();

        for i in (0..code.len().saturating_sub(1)).rev() {
            let next_hash = code[i + 1].hash();
            code[i].next_hash = next_hash;
        }

        CodeSegment(code)
    }

    /// Wraps an already hash-linked sequence of code points without
    /// re-deriving `pc`/`next_hash` — used when reconstructing a
    /// segment from checkpoint storage, where both are already known.
    pub fn from_linked(points: Vec<CodePoint>) -> Self {
        CodeSegment(points)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, pc: u64) -> Option<&CodePoint> {
        self.0.get(pc as usize)
    }

    pub fn as_slice(&self) -> &[CodePoint] {
        &self.0
    }

    /// Verifies the hash-chain invariant (spec §8, property 5). Used in
    /// tests and available to callers that want to re-validate a
    /// restored or externally constructed segment.
    pub fn verify_chain(&self) -> bool {
        for i in 0..self.0.len().saturating_sub(1) {
            if self.0[i].next_hash != self.0[i + 1].hash() {
                return false;
            }
        }
        match self.0.last() {
            Some(cp) => cp.next_hash == Hash256::ZERO,
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chain_links_forward_hashes() {
        let ops = vec![
            Op::new(OpCode::NOP, None),
            Op::new(OpCode::NOP, None),
            Op::new(OpCode::HALT, None),
        ];
        let seg = CodeSegment::from_ops(ops);
        assert!(seg.verify_chain());
        assert_eq!(seg.get(2).unwrap().next_hash, Hash256::ZERO);
    }

    #[test]
    fn null_code_point_is_stable() {
        assert_eq!(CodePoint::null().hash(), CodePoint::null().hash());
    }

    #[test]
    fn unknown_opcode_byte_round_trips_without_decoding() {
        let op = Op {
            opcode: 0xff,
            immediate: None,
        };
        assert_eq!(op.decoded(), None);
    }
}
