//! Inbox/outbox messages and the ordered, hash-committed queues that
//! hold them.

use crate::hash::{keccak256, Hash256};
use crate::value::{Pool, Value};
use crate::U256;

/// `{ sender, destination, token_type, currency, payload }` (spec §3).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub sender: U256,
    pub destination: U256,
    pub token_type: U256,
    pub currency: U256,
    pub payload: Value,
}

impl Message {
    /// The value representation used both for hashing and for pushing
    /// onto the data stack when a program consumes an inbox chunk: a
    /// 5-tuple in field-declaration order.
    pub fn to_value(&self, pool: &Pool) -> Value {
        pool.tuple(vec![
            Value::Int(self.sender),
            Value::Int(self.destination),
            Value::Int(self.token_type),
            Value::Int(self.currency),
            self.payload.clone(),
        ])
    }

    /// The message's hash is defined structurally as the hash of its
    /// fixed 5-tuple representation; computed directly (without
    /// interning) since messages are typically hashed once and
    /// discarded.
    pub fn hash(&self) -> Hash256 {
        let mut buf = Vec::with_capacity(1 + 32 * 5);
        buf.push(crate::value::tag_byte(5));
        for field in [self.sender, self.destination, self.token_type, self.currency] {
            buf.extend_from_slice(&field.to_be_bytes::<32>());
        }
        buf.extend_from_slice(&self.payload.hash().to_be_bytes::<32>());
        keccak256(&buf)
    }
}

/// An ordered, hash-committed log of messages: `(message_count, head)`
/// where `head` is a right-leaning tuple chain (spec §3).
///
/// Internally this keeps the authoritative order in a `Vec` (append is
/// then O(1) amortized and `merge` is a simple `extend`); the
/// tuple-chain `head` value required for hashing and checkpointing is
/// derived on demand by folding from the back so the chain's iteration
/// order matches arrival order.
#[derive(Debug, Clone, Default)]
pub struct MessageStack {
    messages: Vec<Message>,
}

impl MessageStack {
    pub fn new() -> Self {
        MessageStack::default()
    }

    pub fn from_messages(messages: Vec<Message>) -> Self {
        MessageStack { messages }
    }

    pub fn message_count(&self) -> u64 {
        self.messages.len() as u64
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn add_message(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Bulk-merges `other` onto the end of `self`, preserving the
    /// relative order of both (spec §3, "bulk-merge").
    pub fn merge(&mut self, other: MessageStack) {
        self.messages.extend(other.messages);
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }

    /// Takes all buffered messages out, leaving this queue empty.
    /// Used by `deliver_onchain_messages` and by the `INBOX` opcode,
    /// both of which consume a queue's entire contents atomically.
    pub fn take(&mut self) -> MessageStack {
        std::mem::take(self)
    }

    /// The right-leaning tuple chain representing this queue's
    /// contents, oldest message outermost.
    pub fn head_value(&self, pool: &Pool) -> Value {
        let mut v = pool.empty_tuple();
        for message in self.messages.iter().rev() {
            v = pool.tuple(vec![message.to_value(pool), v]);
        }
        v
    }

    pub fn hash(&self, pool: &Pool) -> Hash256 {
        self.head_value(pool).hash()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msg(n: u64) -> Message {
        Message {
            sender: U256::from(n),
            destination: U256::from(n + 1),
            token_type: U256::ZERO,
            currency: U256::from(n * 10),
            payload: Value::int(n),
        }
    }

    #[test]
    fn append_and_count() {
        let mut ms = MessageStack::new();
        ms.add_message(msg(1));
        ms.add_message(msg(2));
        assert_eq!(ms.message_count(), 2);
    }

    #[test]
    fn merge_preserves_order() {
        let mut a = MessageStack::new();
        a.add_message(msg(1));
        let mut b = MessageStack::new();
        b.add_message(msg(2));
        a.merge(b);
        assert_eq!(a.messages()[0].sender, U256::from(1u64));
        assert_eq!(a.messages()[1].sender, U256::from(2u64));
    }

    #[test]
    fn take_empties_the_queue() {
        let mut ms = MessageStack::new();
        ms.add_message(msg(1));
        let taken = ms.take();
        assert_eq!(ms.message_count(), 0);
        assert_eq!(taken.message_count(), 1);
    }

    #[test]
    fn empty_queue_hashes_as_empty_tuple() {
        let pool = Pool::new();
        let ms = MessageStack::new();
        assert_eq!(ms.hash(&pool), pool.empty_tuple().hash());
    }
}
