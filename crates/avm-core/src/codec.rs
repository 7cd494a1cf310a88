//! The canonical value codec shared by the program loader, proof
//! marshalling, and the checkpoint layer (spec §4.3, §4.6).
//!
//! Wire shape (big-endian throughout): a one-byte type tag —
//! `0` integer (32-byte big-endian payload), `1` code point (`pc` as a
//! big-endian `u64`, `has_immediate`/`opcode` bytes, an optional
//! recursively-encoded immediate, then a 32-byte `next_hash`), or `2`
//! tuple (`u8` arity followed by that many recursively-encoded
//! children).

use crate::code::{CodePoint, Op};
use crate::error::LoadError;
use crate::value::{Pool, Value, MAX_TUPLE_ARITY};
use crate::U256;

const TAG_INT: u8 = 0;
const TAG_CODE_POINT: u8 = 1;
const TAG_TUPLE: u8 = 2;

pub fn encode_value(value: &Value) -> Vec<u8> {
    let mut buf = Vec::new();
    write_value(value, &mut buf);
    buf
}

fn write_value(value: &Value, buf: &mut Vec<u8>) {
    match value {
        Value::Int(n) => {
            buf.push(TAG_INT);
            buf.extend_from_slice(&n.to_be_bytes::<32>());
        }
        Value::CodePoint(cp) => {
            buf.push(TAG_CODE_POINT);
            write_code_point(cp, buf);
        }
        Value::Tuple(t) => {
            buf.push(TAG_TUPLE);
            buf.push(t.arity() as u8);
            for child in t.children() {
                write_value(child, buf);
            }
        }
    }
}

fn write_code_point(cp: &CodePoint, buf: &mut Vec<u8>) {
    buf.extend_from_slice(&cp.pc.to_be_bytes());
    write_op(&cp.op, buf, true);
    buf.extend_from_slice(&cp.next_hash.to_be_bytes::<32>());
}

/// Writes `has_immediate(1) || opcode(1) || [immediate_value]?`. Shared
/// between the full code-point encoding and `marshal_proof`'s
/// `serialized_current_op`, which is exactly this shape (spec §4.6).
pub fn write_op(op: &Op, buf: &mut Vec<u8>, include_immediate: bool) {
    let has_immediate = op.immediate.is_some() && include_immediate;
    buf.push(has_immediate as u8);
    buf.push(op.opcode);
    if has_immediate {
        if let Some(imm) = &op.immediate {
            write_value(imm, buf);
        }
    }
}

struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Reader { buf, pos: 0 }
    }

    fn take(&mut self, n: usize, what: &'static str) -> Result<&'a [u8], LoadError> {
        let end = self.pos.checked_add(n).ok_or(LoadError::Truncated(what))?;
        let slice = self.buf.get(self.pos..end).ok_or(LoadError::Truncated(what))?;
        self.pos = end;
        Ok(slice)
    }

    fn u8(&mut self, what: &'static str) -> Result<u8, LoadError> {
        Ok(self.take(1, what)?[0])
    }

    fn u32(&mut self, what: &'static str) -> Result<u32, LoadError> {
        let bytes: [u8; 4] = self.take(4, what)?.try_into().map_err(|_| LoadError::Truncated(what))?;
        Ok(u32::from_be_bytes(bytes))
    }

    fn u64(&mut self, what: &'static str) -> Result<u64, LoadError> {
        let bytes: [u8; 8] = self.take(8, what)?.try_into().map_err(|_| LoadError::Truncated(what))?;
        Ok(u64::from_be_bytes(bytes))
    }

    fn u256(&mut self, what: &'static str) -> Result<U256, LoadError> {
        let bytes: [u8; 32] = self.take(32, what)?.try_into().map_err(|_| LoadError::Truncated(what))?;
        Ok(U256::from_be_bytes(bytes))
    }
}

pub fn decode_value(buf: &[u8], pool: &Pool) -> Result<(Value, usize), LoadError> {
    let mut r = Reader::new(buf);
    let v = read_value(&mut r, pool)?;
    Ok((v, r.pos))
}

fn read_value(r: &mut Reader<'_>, pool: &Pool) -> Result<Value, LoadError> {
    let tag = r.u8("value tag")?;
    match tag {
        TAG_INT => Ok(Value::Int(r.u256("integer payload")?)),
        TAG_CODE_POINT => Ok(Value::code_point(read_code_point(r, pool)?)),
        TAG_TUPLE => {
            let arity = r.u8("tuple arity")? as usize;
            if arity > MAX_TUPLE_ARITY {
                return Err(LoadError::Malformed("tuple arity exceeds maximum"));
            }
            let mut children = Vec::with_capacity(arity);
            for _ in 0..arity {
                children.push(read_value(r, pool)?);
            }
            Ok(pool.tuple(children))
        }
        other => Err(LoadError::InvalidValueEncoding(other)),
    }
}

fn read_code_point(r: &mut Reader<'_>, pool: &Pool) -> Result<CodePoint, LoadError> {
    let pc = r.u64("code point pc")?;
    let op = read_op(r, pool)?;
    let next_hash = r.u256("code point next_hash")?;
    Ok(CodePoint { pc, op, next_hash })
}

fn read_op(r: &mut Reader<'_>, pool: &Pool) -> Result<Op, LoadError> {
    let has_immediate = r.u8("has_immediate")? != 0;
    let opcode = r.u8("opcode")?;
    let immediate = if has_immediate {
        Some(read_value(r, pool)?)
    } else {
        None
    };
    Ok(Op { opcode, immediate })
}

/// Exposed for the loader, which reads a flat sequence of operations
/// (not full code points — `next_hash` is filled in afterwards).
pub fn decode_op(buf: &[u8], pool: &Pool) -> Result<(Op, usize), LoadError> {
    let mut r = Reader::new(buf);
    let op = read_op(&mut r, pool)?;
    Ok((op, r.pos))
}

pub fn u32_be(buf: &[u8], pos: &mut usize, what: &'static str) -> Result<u32, LoadError> {
    let mut r = Reader { buf, pos: *pos };
    let v = r.u32(what)?;
    *pos = r.pos;
    Ok(v)
}

pub fn u64_be(buf: &[u8], pos: &mut usize, what: &'static str) -> Result<u64, LoadError> {
    let mut r = Reader { buf, pos: *pos };
    let v = r.u64(what)?;
    *pos = r.pos;
    Ok(v)
}
