//! The tagged recursive value universe and the interning pool that gives
//! structurally-equal tuples shared storage.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use rustc_hash::FxHashMap;

use crate::code::CodePoint;
use crate::hash::{empty_tuple_hash, keccak256, Hash256};
use crate::U256;

/// Maximum number of children a tuple may hold (spec §3).
pub const MAX_TUPLE_ARITY: usize = 8;

/// `tag_byte(k) = 3 + k`, the leading byte hashed ahead of a tuple's
/// children. Kept as a free function (rather than inlined at each call
/// site) since both the hasher and the empty-tuple constant need it.
pub const fn tag_byte(arity: usize) -> u8 {
    3 + arity as u8
}

/// The body of an interned tuple: its cached hash plus its children.
/// Hashing is the hot path for the stack (a right-leaning tuple chain),
/// so the hash is computed once at construction rather than walked on
/// every `Value::hash` call.
#[derive(Debug)]
pub struct TupleBody {
    hash: Hash256,
    children: Vec<Value>,
}

impl TupleBody {
    pub fn children(&self) -> &[Value] {
        &self.children
    }

    pub fn arity(&self) -> usize {
        self.children.len()
    }
}

impl PartialEq for TupleBody {
    fn eq(&self, other: &Self) -> bool {
        self.hash == other.hash && self.children == other.children
    }
}
impl Eq for TupleBody {}

/// A value in the machine: a 256-bit integer, a code point, or a bounded
/// tuple of values. Values are logically immutable; tuples are
/// reference-counted so that sharing is free and no value outlives the
/// data it closes over (spec §9: "reference-counted immutable nodes" is
/// the recommended alternative to an ambient-GC arena).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Int(U256),
    CodePoint(Rc<CodePoint>),
    Tuple(Rc<TupleBody>),
}

impl Value {
    pub fn int(v: impl Into<U256>) -> Self {
        Value::Int(v.into())
    }

    pub fn code_point(cp: CodePoint) -> Self {
        Value::CodePoint(Rc::new(cp))
    }

    pub fn as_int(&self) -> Option<U256> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_code_point(&self) -> Option<&CodePoint> {
        match self {
            Value::CodePoint(cp) => Some(cp),
            _ => None,
        }
    }

    pub fn as_tuple(&self) -> Option<&TupleBody> {
        match self {
            Value::Tuple(t) => Some(t),
            _ => None,
        }
    }

    /// The integer type tag consumed by the `TYPE` opcode: 0 for
    /// integers, 1 for code points, 2 for tuples.
    pub fn type_tag(&self) -> u8 {
        match self {
            Value::Int(_) => 0,
            Value::CodePoint(_) => 1,
            Value::Tuple(_) => 2,
        }
    }

    /// `hash(v)` per spec §4.1.
    pub fn hash(&self) -> Hash256 {
        match self {
            Value::Int(v) => *v,
            Value::CodePoint(cp) => cp.hash(),
            Value::Tuple(t) => t.hash,
        }
    }
}

fn hash_tuple(children: &[Value]) -> Hash256 {
    let mut buf = Vec::with_capacity(1 + 32 * children.len());
    buf.push(tag_byte(children.len()));
    for child in children {
        buf.extend_from_slice(&child.hash().to_be_bytes::<32>());
    }
    keccak256(&buf)
}

/// Content-addressed intern table for tuple bodies. Owned by the
/// machine; never shared across machines (spec §5).
///
/// Because [`Value::Tuple`] already carries an `Rc`, values freely
/// outlive the pool itself — interning here is purely a structural
/// sharing optimization, not a lifetime requirement.
#[derive(Default)]
pub struct Pool {
    table: RefCell<FxHashMap<Hash256, Weak<TupleBody>>>,
}

impl Pool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds (or reuses) a tuple with the given children.
    ///
    /// # Panics
    /// Panics if `children.len() > MAX_TUPLE_ARITY`; callers that accept
    /// externally supplied arities (the loader, the value codec) must
    /// validate before calling this.
    pub fn tuple(&self, children: Vec<Value>) -> Value {
        assert!(
            children.len() <= MAX_TUPLE_ARITY,
            "tuple arity {} exceeds MAX_TUPLE_ARITY",
            children.len()
        );
        let hash = hash_tuple(&children);

        if let Some(weak) = self.table.borrow().get(&hash) {
            if let Some(existing) = weak.upgrade() {
                if existing.children == children {
                    return Value::Tuple(existing);
                }
            }
        }

        let body = Rc::new(TupleBody { hash, children });
        self.table.borrow_mut().insert(hash, Rc::downgrade(&body));
        Value::Tuple(body)
    }

    /// The arity-0 tuple, used as the sentinel for empty stacks,
    /// registers, and the initial static value.
    pub fn empty_tuple(&self) -> Value {
        self.tuple(Vec::new())
    }

    /// Periodically drop dead weak entries so the table doesn't grow
    /// unboundedly across a long-running machine's lifetime. Not
    /// required for correctness; callers may invoke this between steps.
    pub fn compact(&self) {
        self.table.borrow_mut().retain(|_, weak| weak.strong_count() > 0);
    }
}

/// Standalone form of [`Pool::empty_tuple`] for contexts that only need
/// the hash, not an interned value (e.g. asserting invariants in tests).
pub fn empty_tuple_value_hash() -> Hash256 {
    empty_tuple_hash()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_tuples_share_storage() {
        let pool = Pool::new();
        let a = pool.tuple(vec![Value::int(1u64), Value::int(2u64)]);
        let b = pool.tuple(vec![Value::int(1u64), Value::int(2u64)]);
        match (&a, &b) {
            (Value::Tuple(ra), Value::Tuple(rb)) => assert!(Rc::ptr_eq(ra, rb)),
            _ => panic!("expected tuples"),
        }
        assert_eq!(a.hash(), b.hash());
    }

    #[test]
    fn integers_hash_as_themselves() {
        let v = Value::int(42u64);
        assert_eq!(v.hash(), U256::from(42u64));
    }

    #[test]
    fn empty_tuple_hash_matches_dedicated_sentinel() {
        let pool = Pool::new();
        let empty = pool.empty_tuple();
        assert_eq!(empty.hash(), empty_tuple_hash());
    }

    #[test]
    fn distinct_tuples_hash_differently() {
        let pool = Pool::new();
        let a = pool.tuple(vec![Value::int(1u64)]);
        let b = pool.tuple(vec![Value::int(2u64)]);
        assert_ne!(a.hash(), b.hash());
    }
}
