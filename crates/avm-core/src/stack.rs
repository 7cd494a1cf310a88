//! A persistent LIFO of values, modelled as a right-leaning chain of
//! arity-2 tuples `(top, rest)` bottoming out at the empty tuple.

use crate::codec::encode_value;
use crate::error::VmError;
use crate::hash::Hash256;
use crate::value::{Pool, Value};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stack {
    head: Value,
}

impl Stack {
    pub fn new(pool: &Pool) -> Self {
        Stack {
            head: pool.empty_tuple(),
        }
    }

    /// Wraps an existing chain value as a stack, e.g. when restoring a
    /// checkpoint.
    pub fn from_head(head: Value) -> Self {
        Stack { head }
    }

    pub fn head(&self) -> &Value {
        &self.head
    }

    pub fn push(&mut self, pool: &Pool, value: Value) {
        self.head = pool.tuple(vec![value, self.head.clone()]);
    }

    pub fn pop(&mut self) -> Result<Value, VmError> {
        let (top, rest) = Self::uncons(&self.head).ok_or(VmError::StackUnderflow)?;
        self.head = rest;
        Ok(top)
    }

    /// Returns the value `depth` slots from the top without consuming
    /// anything (`peek(0)` is the top of stack).
    pub fn peek(&self, depth: usize) -> Option<Value> {
        let mut cur = self.head.clone();
        for _ in 0..depth {
            let (_, rest) = Self::uncons(&cur)?;
            cur = rest;
        }
        Self::uncons(&cur).map(|(top, _)| top)
    }

    pub fn is_empty(&self) -> bool {
        Self::uncons(&self.head).is_none()
    }

    pub fn len(&self) -> usize {
        let mut n = 0;
        let mut cur = self.head.clone();
        while let Some((_, rest)) = Self::uncons(&cur) {
            n += 1;
            cur = rest;
        }
        n
    }

    pub fn hash(&self) -> Hash256 {
        self.head.hash()
    }

    fn uncons(v: &Value) -> Option<(Value, Value)> {
        let tuple = v.as_tuple()?;
        if tuple.arity() != 2 {
            return None;
        }
        let children = tuple.children();
        Some((children[0].clone(), children[1].clone()))
    }

    /// `marshal_proof` per spec §4.2. `pops[i]` records whether the
    /// instruction consumes the element at depth `i`; this
    /// implementation strips exactly `pops.len()` elements (the deepest
    /// index any entry in `pops` refers to) and returns the witness
    /// bytes for all of them in top-to-bottom order, so the verifier
    /// can fold them back onto `hash_after_pops` to recover the
    /// pre-execution stack hash. If the stack underflows partway
    /// through (malformed proof request), the witness covers only the
    /// elements actually present and the returned hash is that of the
    /// empty tail.
    pub fn marshal_proof(&self, pops: &[bool]) -> (Hash256, Vec<u8>) {
        let mut witness = Vec::new();
        let mut cur = self.head.clone();
        for _ in pops {
            match Self::uncons(&cur) {
                Some((top, rest)) => {
                    witness.extend_from_slice(&encode_value(&top));
                    cur = rest;
                }
                None => break,
            }
        }
        (cur.hash(), witness)
    }
}
