//! Content-addressed value storage (spec §4.7): `save_value` walks a
//! [`Value`] and writes one node per distinct sub-value, with tuple and
//! code-point children stored as hash references rather than inlined —
//! unlike [`avm_core::codec`], which serialises a whole value as one
//! self-contained blob. Both traversals are written iteratively so an
//! arbitrarily long stack (a chain of nested tuples) cannot blow the
//! native call stack.

use rustc_hash::{FxHashMap, FxHashSet};

use avm_core::{CodePoint, Hash256, LoadError, Op, Pool, Value};

use crate::error::{CheckpointError, StoreError};
use crate::store::CheckpointTx;

const TAG_INT: u8 = 0;
const TAG_CODE_POINT: u8 = 1;
const TAG_TUPLE: u8 = 2;

/// Writes `value` and every sub-value it transitively references,
/// skipping anything already present in the store (content-addressing
/// means an existing node's whole subtree is already persisted).
/// Returns the value's own hash, which doubles as its storage key.
pub fn save_value(tx: &mut dyn CheckpointTx, value: &Value) -> Result<Hash256, StoreError> {
    let root_hash = value.hash();
    let mut pending = vec![value.clone()];
    let mut seen: FxHashSet<Hash256> = FxHashSet::default();

    while let Some(v) = pending.pop() {
        let h = v.hash();
        if seen.contains(&h) {
            continue;
        }
        seen.insert(h);
        if tx.contains(h)? {
            continue;
        }
        tx.put_if_absent(h, encode_node(&v))?;
        match &v {
            Value::Tuple(t) => pending.extend(t.children().iter().cloned()),
            Value::CodePoint(cp) => {
                if let Some(imm) = &cp.op.immediate {
                    pending.push(imm.clone());
                }
            }
            Value::Int(_) => {}
        }
    }
    Ok(root_hash)
}

/// Reconstructs the value stored under `root`, resolving every
/// transitive child. Discovery and assembly are both iterative
/// (explicit work lists, not recursion) so a long stack chain or a
/// deeply nested message queue cannot overflow the native stack.
pub fn load_value(tx: &dyn CheckpointTx, pool: &Pool, root: Hash256) -> Result<Value, CheckpointError> {
    let mut raw: FxHashMap<Hash256, RawNode> = FxHashMap::default();
    let mut order: Vec<Hash256> = Vec::new();
    let mut visited: FxHashSet<Hash256> = FxHashSet::default();
    let mut frontier = vec![root];

    while let Some(h) = frontier.pop() {
        if visited.contains(&h) {
            continue;
        }
        visited.insert(h);
        let bytes = tx.get(h)?.ok_or(CheckpointError::MissingNode(h))?;
        let node = decode_node(&bytes).map_err(|e| CheckpointError::Corrupt(h, e))?;
        frontier.extend(node.child_hashes());
        order.push(h);
        raw.insert(h, node);
    }

    // `order` records each hash before its children (a parent is popped
    // and its children pushed in the same iteration), so walking it in
    // reverse guarantees every child is already built before its parent.
    let mut built: FxHashMap<Hash256, Value> = FxHashMap::default();
    for h in order.into_iter().rev() {
        let node = raw.remove(&h).ok_or(CheckpointError::MissingNode(h))?;
        let value = node.build(pool, &built, h)?;
        if value.hash() != h {
            return Err(CheckpointError::Corrupt(h, LoadError::Malformed("node content does not hash to its own key")));
        }
        built.insert(h, value);
    }
    built.remove(&root).ok_or(CheckpointError::MissingNode(root))
}

fn encode_node(value: &Value) -> Vec<u8> {
    match value {
        Value::Int(n) => {
            let mut buf = Vec::with_capacity(33);
            buf.push(TAG_INT);
            buf.extend_from_slice(&n.to_be_bytes::<32>());
            buf
        }
        Value::CodePoint(cp) => {
            let mut buf = Vec::with_capacity(1 + 8 + 1 + 1 + 32 + 32);
            buf.push(TAG_CODE_POINT);
            buf.extend_from_slice(&cp.pc.to_be_bytes());
            buf.push(cp.op.opcode);
            match &cp.op.immediate {
                None => buf.push(0),
                Some(imm) => {
                    buf.push(1);
                    buf.extend_from_slice(&imm.hash().to_be_bytes::<32>());
                }
            }
            buf.extend_from_slice(&cp.next_hash.to_be_bytes::<32>());
            buf
        }
        Value::Tuple(t) => {
            let mut buf = Vec::with_capacity(2 + 32 * t.arity());
            buf.push(TAG_TUPLE);
            buf.push(t.arity() as u8);
            for child in t.children() {
                buf.extend_from_slice(&child.hash().to_be_bytes::<32>());
            }
            buf
        }
    }
}

enum RawNode {
    Int(avm_core::U256),
    CodePoint { pc: u64, opcode: u8, immediate_hash: Option<Hash256>, next_hash: Hash256 },
    Tuple { children: Vec<Hash256> },
}

impl RawNode {
    fn child_hashes(&self) -> Vec<Hash256> {
        match self {
            RawNode::Int(_) => Vec::new(),
            RawNode::CodePoint { immediate_hash, .. } => immediate_hash.into_iter().copied().collect(),
            RawNode::Tuple { children } => children.clone(),
        }
    }

    fn build(&self, pool: &Pool, built: &FxHashMap<Hash256, Value>, self_hash: Hash256) -> Result<Value, CheckpointError> {
        let lookup = |h: Hash256| built.get(&h).cloned().ok_or(CheckpointError::MissingNode(h));
        match self {
            RawNode::Int(n) => Ok(Value::Int(*n)),
            RawNode::CodePoint { pc, opcode, immediate_hash, next_hash } => {
                let immediate = match immediate_hash {
                    Some(h) => Some(lookup(*h)?),
                    None => None,
                };
                Ok(Value::code_point(CodePoint { pc: *pc, op: Op { opcode: *opcode, immediate }, next_hash: *next_hash }))
            }
            RawNode::Tuple { children } => {
                let kids = children.iter().map(|h| lookup(*h)).collect::<Result<Vec<_>, _>>()?;
                if kids.len() > avm_core::value::MAX_TUPLE_ARITY {
                    return Err(CheckpointError::Corrupt(self_hash, LoadError::Malformed("tuple arity exceeds maximum")));
                }
                Ok(pool.tuple(kids))
            }
        }
    }
}

struct NodeReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> NodeReader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        NodeReader { buf, pos: 0 }
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

    fn u64(&mut self, what: &'static str) -> Result<u64, LoadError> {
        let bytes: [u8; 8] = self.take(8, what)?.try_into().map_err(|_| LoadError::Truncated(what))?;
        Ok(u64::from_be_bytes(bytes))
    }

    fn hash(&mut self, what: &'static str) -> Result<Hash256, LoadError> {
        let bytes: [u8; 32] = self.take(32, what)?.try_into().map_err(|_| LoadError::Truncated(what))?;
        Ok(Hash256::from_be_bytes(bytes))
    }
}

fn decode_node(bytes: &[u8]) -> Result<RawNode, LoadError> {
    let mut r = NodeReader::new(bytes);
    let tag = r.u8("node tag")?;
    match tag {
        TAG_INT => Ok(RawNode::Int(r.hash("integer node payload")?)),
        TAG_CODE_POINT => {
            let pc = r.u64("code point node pc")?;
            let opcode = r.u8("code point node opcode")?;
            let has_immediate = r.u8("code point node has_immediate")? != 0;
            let immediate_hash = if has_immediate { Some(r.hash("code point node immediate hash")?) } else { None };
            let next_hash = r.hash("code point node next_hash")?;
            Ok(RawNode::CodePoint { pc, opcode, immediate_hash, next_hash })
        }
        TAG_TUPLE => {
            let arity = r.u8("tuple node arity")? as usize;
            let mut children = Vec::with_capacity(arity);
            for _ in 0..arity {
                children.push(r.hash("tuple node child hash")?);
            }
            Ok(RawNode::Tuple { children })
        }
        other => Err(LoadError::InvalidValueEncoding(other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryStore;
    use crate::store::CheckpointStore;

    #[test]
    fn round_trips_a_nested_tuple() {
        let pool = Pool::new();
        let v = pool.tuple(vec![
            Value::int(1u64),
            pool.tuple(vec![Value::int(2u64), Value::int(3u64)]),
        ]);
        let store = InMemoryStore::new();
        let mut tx = store.begin();
        let hash = save_value(tx.as_mut(), &v).unwrap();
        tx.commit().unwrap();

        let tx = store.begin();
        let restored = load_value(tx.as_ref(), &pool, hash).unwrap();
        assert_eq!(restored.hash(), v.hash());
    }

    #[test]
    fn shared_subtrees_are_written_once() {
        let pool = Pool::new();
        let shared = pool.tuple(vec![Value::int(42u64)]);
        let v = pool.tuple(vec![shared.clone(), shared]);
        let store = InMemoryStore::new();
        let mut tx = store.begin();
        save_value(tx.as_mut(), &v).unwrap();
        tx.commit().unwrap();
        // one node for `v`, one for the shared child, one for the int.
        assert_eq!(store.len().unwrap(), 3);
    }

    #[test]
    fn missing_node_is_reported() {
        let pool = Pool::new();
        let store = InMemoryStore::new();
        let tx = store.begin();
        let err = load_value(tx.as_ref(), &pool, Hash256::from(123u64)).unwrap_err();
        assert!(matches!(err, CheckpointError::MissingNode(_)));
    }

    #[test]
    fn code_point_with_immediate_round_trips() {
        let pool = Pool::new();
        let cp = CodePoint {
            pc: 3,
            op: Op { opcode: 0x31, immediate: Some(Value::int(7u64)) },
            next_hash: Hash256::ZERO,
        };
        let v = Value::code_point(cp);
        let store = InMemoryStore::new();
        let mut tx = store.begin();
        let hash = save_value(tx.as_mut(), &v).unwrap();
        tx.commit().unwrap();

        let tx = store.begin();
        let restored = load_value(tx.as_ref(), &pool, hash).unwrap();
        assert_eq!(restored.hash(), v.hash());
        assert_eq!(restored.as_code_point().unwrap().pc, 3);
    }
}
