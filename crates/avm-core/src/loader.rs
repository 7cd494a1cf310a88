//! The `.ao` program binary format (spec §4.3): a fixed header, an
//! extension table, a flat list of operations, and a single static
//! value, all big-endian.

use crate::code::CodeSegment;
use crate::codec;
use crate::error::LoadError;
use crate::value::{Pool, Value};

/// Bumped whenever the wire format changes incompatibly. The loader
/// rejects any other version outright rather than attempting to
/// interpret a foreign layout.
pub const CURRENT_AO_VERSION: u32 = 1;

/// Decodes a `.ao` buffer into a linked [`CodeSegment`] and the
/// program's static value. Layout:
///
/// ```text
/// version: u32
/// extension_id: u32 (repeated, terminated by a 0 entry)
/// code_count: u64
/// op (repeated code_count times)
/// static_val
/// ```
///
/// No extension is currently defined. Per spec §4.3/§6, non-zero ids
/// are forward-compatibility scaffolding: this loader reads past them
/// and ignores them rather than rejecting the program.
pub fn load_program(bytes: &[u8], pool: &Pool) -> Result<(CodeSegment, Value), LoadError> {
    let mut pos = 0usize;

    let version = codec::u32_be(bytes, &mut pos, "version")?;
    if version != CURRENT_AO_VERSION {
        return Err(LoadError::BadVersion { expected: CURRENT_AO_VERSION, found: version });
    }

    loop {
        let extension_id = codec::u32_be(bytes, &mut pos, "extension table entry")?;
        if extension_id == 0 {
            break;
        }
        tracing::debug!(extension_id, "ignoring unknown program extension id");
    }

    let code_count = codec::u64_be(bytes, &mut pos, "code count")?;
    let mut ops = Vec::new();
    for _ in 0..code_count {
        let remaining = bytes.get(pos..).ok_or(LoadError::Truncated("operation"))?;
        let (op, consumed) = codec::decode_op(remaining, pool)?;
        pos += consumed;
        ops.push(op);
    }

    let remaining = bytes.get(pos..).ok_or(LoadError::Truncated("static value"))?;
    let (static_val, consumed) = codec::decode_value(remaining, pool)?;
    pos += consumed;

    if pos != bytes.len() {
        return Err(LoadError::Malformed("trailing bytes after static value"));
    }

    Ok((CodeSegment::from_ops(ops), static_val))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::code::{Op, OpCode};

    fn encode_program(ops: &[Op], static_val: &Value) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(&CURRENT_AO_VERSION.to_be_bytes());
        buf.extend_from_slice(&0u32.to_be_bytes());
        buf.extend_from_slice(&(ops.len() as u64).to_be_bytes());
        for op in ops {
            codec::write_op(op, &mut buf, true);
        }
        buf.extend_from_slice(&codec::encode_value(static_val));
        buf
    }

    #[test]
    fn round_trips_a_small_program() {
        let pool = Pool::new();
        let ops = vec![Op::new(OpCode::ADD, None), Op::new(OpCode::HALT, None)];
        let static_val = pool.tuple(vec![Value::int(7u64)]);
        let bytes = encode_program(&ops, &static_val);

        let (code, decoded_static) = load_program(&bytes, &pool).unwrap();
        assert_eq!(code.len(), 2);
        assert!(code.verify_chain());
        assert_eq!(decoded_static.hash(), static_val.hash());
    }

    #[test]
    fn rejects_bad_version() {
        let pool = Pool::new();
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&999u32.to_be_bytes());
        bytes.extend_from_slice(&0u32.to_be_bytes());
        bytes.extend_from_slice(&0u64.to_be_bytes());
        bytes.extend_from_slice(&codec::encode_value(&pool.empty_tuple()));
        assert!(matches!(load_program(&bytes, &pool), Err(LoadError::BadVersion { .. })));
    }

    #[test]
    fn rejects_trailing_garbage() {
        let pool = Pool::new();
        let mut bytes = encode_program(&[], &pool.empty_tuple());
        bytes.push(0xff);
        assert!(load_program(&bytes, &pool).is_err());
    }

    #[test]
    fn rejects_truncated_buffer() {
        let pool = Pool::new();
        let bytes = vec![0u8, 0, 0, 1]; // version only, truncated
        assert!(load_program(&bytes, &pool).is_err());
    }

    #[test]
    fn ignores_unknown_extension_ids() {
        let pool = Pool::new();
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&CURRENT_AO_VERSION.to_be_bytes());
        bytes.extend_from_slice(&42u32.to_be_bytes());
        bytes.extend_from_slice(&7u32.to_be_bytes());
        bytes.extend_from_slice(&0u32.to_be_bytes());
        bytes.extend_from_slice(&0u64.to_be_bytes());
        bytes.extend_from_slice(&codec::encode_value(&pool.empty_tuple()));
        let (code, _) = load_program(&bytes, &pool).unwrap();
        assert_eq!(code.len(), 0);
    }
}
